//! # Meridian Strategy Library
//!
//! This crate contains the trading logic the simulation replays. It defines a
//! universal `Strategy` trait and provides several concrete implementations.
//!
//! ## Architectural Principles
//!
//! - **Signals, not orders:** a strategy only states intent as a `SignalEvent`.
//!   Sizing, risk and funding belong to the portfolio.
//! - **Strategy Agnostic Engine:** By using the `Strategy` trait, the backtester
//!   can operate on any strategy without knowing its internal details.
//! - **Extensibility:** Adding a new strategy involves creating a new module,
//!   implementing the `Strategy` trait, and adding it to the `factory`.
//!
//! ## Public API
//!
//! The primary public components are:
//! - `Strategy`: The core trait all strategies implement.
//! - `create_strategy`: The factory function to construct a strategy by name.
//! - The concrete strategy structs themselves (e.g., `Rsi`).

use core_types::{AssetKind, Direction, PairKey};
use data::DataHandler;
use events::SignalEvent;
use funding::FundManager;
use portfolio::Portfolio;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use ta::Next;

// Declare all the modules that constitute this crate.
pub mod dollar_cost_average;
pub mod error;
pub mod factory;
pub mod rsi;
pub mod top_bottom;

// Re-export the key components to create a clean, public-facing API.
pub use dollar_cost_average::DollarCostAverage;
pub use error::StrategyError;
pub use factory::{STRATEGIES, create_strategy};
pub use rsi::Rsi;
pub use top_bottom::TopBottom;

/// The missing-data ratio is only judged once a history holds this many candles.
pub const MIN_QUALITY_SAMPLE: usize = 10;

/// The core trait that all trading strategies must implement.
///
/// The `&mut self` receivers are crucial, as most strategies keep indicator
/// state per pair between calls.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn supports_simultaneous(&self) -> bool;

    /// True for strategies that can only rank pairs against each other.
    fn requires_simultaneous(&self) -> bool {
        false
    }

    /// Produces the signal for the latest candle of one pair.
    ///
    /// # Returns
    ///
    /// * `Ok(SignalEvent)` - always a signal; `DoNothing` when no trade is wanted.
    /// * `Err(StrategyError)` - if evaluation fails. `TooMuchBadData` is fatal to
    ///   the run, anything else skips the data point.
    fn on_signal(
        &mut self,
        data: &dyn DataHandler,
        funds: &FundManager,
        portfolio: &Portfolio,
    ) -> Result<SignalEvent, StrategyError>;

    /// Produces one signal per pair, with every pair's latest candle in view.
    fn on_simultaneous_signals(
        &mut self,
        data: &[&dyn DataHandler],
        funds: &FundManager,
        portfolio: &Portfolio,
    ) -> Result<Vec<SignalEvent>, StrategyError> {
        data.iter()
            .map(|handler| self.on_signal(*handler, funds, portfolio))
            .collect()
    }
}

/// A `DoNothing` signal for the latest candle, or `MissingData` when that candle
/// was gap-filled. Fails once the history has too many gap-filled candles.
pub(crate) fn base_signal(
    data: &dyn DataHandler,
    max_missing_ratio: Decimal,
) -> Result<SignalEvent, StrategyError> {
    let latest = data
        .latest()
        .ok_or_else(|| StrategyError::NoData(data.key().to_string()))?;
    let ratio = data.missing_ratio();
    if data.history().len() >= MIN_QUALITY_SAMPLE && ratio > max_missing_ratio {
        return Err(StrategyError::TooMuchBadData {
            key: data.key().to_string(),
            ratio,
        });
    }
    let mut signal = SignalEvent::from_data(latest, Direction::DoNothing);
    if latest.missing {
        signal.set_direction(Direction::MissingData);
        signal.base.append_reason("candle was gap-filled, no signal generated");
    }
    Ok(signal)
}

/// An indicator fed from one pair's history.
#[derive(Debug, Clone)]
pub(crate) struct IndicatorState<I> {
    indicator: I,
    last_offset: u64,
    value: Option<f64>,
}

impl<I: Next<f64, Output = f64>> IndicatorState<I> {
    pub(crate) fn new(indicator: I) -> Self {
        Self {
            indicator,
            last_offset: 0,
            value: None,
        }
    }

    /// Feeds every close newer than the last one seen and returns the latest
    /// value. Gap-filled candles are skipped.
    pub(crate) fn update(&mut self, data: &dyn DataHandler) -> Result<Option<f64>, StrategyError> {
        let history = data.history();
        let start = history.partition_point(|e| e.base.offset <= self.last_offset);
        for event in &history[start..] {
            self.last_offset = event.base.offset;
            if event.missing {
                continue;
            }
            let close = event.close.to_f64().ok_or_else(|| {
                StrategyError::IndicatorError(format!("close {} is not representable", event.close))
            })?;
            self.value = Some(self.indicator.next(close));
        }
        Ok(self.value)
    }
}

/// `Buy` for spot pairs, `Long` for futures.
pub(crate) fn entry_direction(key: &PairKey) -> Direction {
    match key.asset {
        AssetKind::Spot => Direction::Buy,
        AssetKind::Futures => Direction::Long,
    }
}

/// `Sell` for spot pairs, `Short` for futures.
pub(crate) fn exit_direction(key: &PairKey) -> Direction {
    match key.asset {
        AssetKind::Spot => Direction::Sell,
        AssetKind::Futures => Direction::Short,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::{CurrencyPair, Interval, Kline};
    use data::Candles;
    use risk::{RiskEvaluator, Sizer};

    pub fn key(base: &str) -> PairKey {
        PairKey::new("binance", AssetKind::Spot, CurrencyPair::new(base, "USDT"))
    }

    /// Candles for `closes`, read to the end. A `None` close leaves a gap.
    pub fn candles(key: PairKey, closes: &[Option<Decimal>]) -> Candles {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let klines: Vec<Kline> = closes
            .iter()
            .enumerate()
            .filter_map(|(i, close)| {
                close.map(|close| Kline {
                    open_time: start + Duration::hours(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: Decimal::ONE_HUNDRED,
                })
            })
            .collect();
        let mut candles = Candles::from_klines(key, Interval::hours(1), &klines).unwrap();
        while candles.next().is_some() {}
        candles
    }

    pub fn series(closes: &[i64]) -> Vec<Option<Decimal>> {
        closes.iter().map(|c| Some(Decimal::from(*c))).collect()
    }

    pub fn context() -> (FundManager, Portfolio) {
        let portfolio = Portfolio::builder()
            .size_manager(Box::new(Sizer::default()))
            .risk_manager(Box::new(RiskEvaluator::default()))
            .build()
            .unwrap();
        (FundManager::new(false), portfolio)
    }
}
