//! # Meridian Analytics Engine
//!
//! This crate provides the tools for conducting quantitative analysis of a
//! simulation run. It acts as the "unbiased judge" of the system.
//!
//! ## Architectural Principles
//!
//! - **Incremental Accumulation:** The `Statistic` records every event, holding
//!   and compliance snapshot per pair and per offset while the run progresses.
//! - **Calculation at the End:** Nothing is derived until `calculate_all`, which
//!   produces a `RunSummary` from the recorded history and the funding ledger.
//!
//! ## Public API
//!
//! - `Statistic`: The accumulator and the entry point for calculations.
//! - `RunSummary` / `PairSummary` / `FundingSummary`: The standardized results.
//! - `Drawdown`: The swing scan used for every drawdown figure.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod drawdown;
pub mod error;
pub mod math;
pub mod record;
pub mod statistic;
pub mod summary;

// Re-export the key components to create a clean, public-facing API.
pub use drawdown::{Drawdown, PricePoint, Swing};
pub use error::AnalyticsError;
pub use record::{EventRecord, PairStatistic};
pub use statistic::Statistic;
pub use summary::{FundingSummary, PairSummary, Ratios, RunSummary};
