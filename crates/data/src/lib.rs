//! # Meridian Data
//!
//! Candle sources for the simulation: the `DataHandler` trait the engine reads
//! through, an in-memory `Candles` implementation, a CSV loader, and the async
//! `LiveSource` polled in live mode.
//!
//! ## Public API
//!
//! - `DataHandler`: forward-only access to one pair's candles, bounded by the
//!   current offset so nothing downstream can see the future.
//! - `Candles`, `load_csv`: the in-memory series and its CSV loader.
//! - `DataStore`: every handler in a run, keyed by `PairKey`.
//! - `LiveSource`, `ReplaySource`: polling sources for live mode.
//! - `DataError`: the specific error types that can be returned from this crate.

use core_types::{Interval, Kline, PairKey};
use events::DataEvent;
use rust_decimal::Decimal;

// Declare the modules that constitute this crate.
pub mod candles;
pub mod error;
pub mod live;
pub mod loader;
pub mod store;

// Re-export the key components to provide a clean, public-facing API.
pub use candles::Candles;
pub use error::DataError;
pub use live::{LiveSource, ReplaySource};
pub use loader::load_csv;
pub use store::DataStore;

/// Forward-only access to one pair's candles.
///
/// `history` and the `stream_*` views only ever cover candles up to and
/// including the latest one returned by `next`.
pub trait DataHandler: Send + Sync {
    fn key(&self) -> &PairKey;

    fn interval(&self) -> Interval;

    /// Advances the cursor and returns the candle it lands on.
    fn next(&mut self) -> Option<DataEvent>;

    fn has_next(&self) -> bool;

    /// The candle most recently returned by `next`.
    fn latest(&self) -> Option<&DataEvent>;

    fn history(&self) -> &[DataEvent];

    /// Total candles loaded, read or not.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewinds to before the first candle.
    fn reset(&mut self);

    /// Appends newly arrived candles, returning how many events were added.
    fn append(&mut self, klines: &[Kline]) -> Result<usize, DataError>;

    /// The last `n` candles of the history.
    fn history_window(&self, n: usize) -> &[DataEvent] {
        let history = self.history();
        &history[history.len().saturating_sub(n)..]
    }

    fn stream_open(&self) -> Vec<Decimal> {
        self.history().iter().map(|e| e.open).collect()
    }

    fn stream_high(&self) -> Vec<Decimal> {
        self.history().iter().map(|e| e.high).collect()
    }

    fn stream_low(&self) -> Vec<Decimal> {
        self.history().iter().map(|e| e.low).collect()
    }

    fn stream_close(&self) -> Vec<Decimal> {
        self.history().iter().map(|e| e.close).collect()
    }

    fn stream_volume(&self) -> Vec<Decimal> {
        self.history().iter().map(|e| e.volume).collect()
    }

    /// Fraction of the history that was gap-filled.
    fn missing_ratio(&self) -> Decimal {
        let history = self.history();
        if history.is_empty() {
            return Decimal::ZERO;
        }
        let missing = history.iter().filter(|e| e.missing).count();
        Decimal::from(missing) / Decimal::from(history.len())
    }
}
