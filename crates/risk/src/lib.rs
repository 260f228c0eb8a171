//! # Meridian Risk
//!
//! This crate sizes orders and decides whether they may be placed at all.
//!
//! ## Architectural Principles
//!
//! - **Sizing and risk are separate seams:** `SizeManager` answers "how much",
//!   `RiskManager` answers "may we". The portfolio composes the two and owns
//!   what happens when either says no.
//! - **Pure calculators:** neither trait touches funds. They read the order,
//!   the available funds and the configuration, and return a verdict.
//!
//! ## Public API
//!
//! - `SizeManager` / `Sizer`: fee-aware order sizing against per-pair and
//!   portfolio-wide limits.
//! - `RiskManager` / `RiskEvaluator`: leverage and concentration checks.
//! - `CollateralWeighting`: the exchange-side collaborator consulted when sizing
//!   two-legged orders.
//! - `RiskError`: the specific error types that can be returned from this crate.

use configuration::CurrencySettings;
use core_types::PairKey;
use events::{Holding, OrderEvent, Snapshot};
use rust_decimal::Decimal;

pub mod error;
pub mod evaluator;
pub mod sizing;

pub use error::RiskError;
pub use evaluator::RiskEvaluator;
pub use sizing::{SizedOrder, Sizer};

/// Computes how much of an order the available funds can support.
pub trait SizeManager: Send + Sync {
    fn size_order(
        &self,
        order: &OrderEvent,
        available_funds: Decimal,
        settings: &CurrencySettings,
    ) -> Result<SizedOrder, RiskError>;
}

/// Rejects orders that would breach leverage or concentration limits.
pub trait RiskManager: Send + Sync {
    /// `holdings` holds the latest holding of every pair; `snapshot` is the
    /// order pair's latest compliance snapshot, if any.
    fn evaluate_order(
        &self,
        order: &OrderEvent,
        holdings: &[Holding],
        snapshot: Option<&Snapshot>,
        settings: &CurrencySettings,
    ) -> Result<(), RiskError>;
}

/// Supplies the collateral weighting an exchange applies to a pair.
pub trait CollateralWeighting: Send + Sync {
    fn collateral_weight(&self, key: &PairKey) -> Option<Decimal>;
}
