//! # Meridian Portfolio
//!
//! The portfolio sits between the strategy and the exchange simulator. It turns
//! signals into funded orders and fills into holdings, and it keeps the
//! per-pair records every later stage reads.
//!
//! ## Architectural Principles
//!
//! - **Rejections are data:** an order that cannot be funded, sized or cleared by
//!   risk comes back re-tagged as `CouldNot*` with a reason. Only broken
//!   preconditions and ledger failures surface as `PortfolioError`.
//! - **Append-only history:** holdings and compliance snapshots are only ever
//!   appended, so statistics can replay the run offset by offset.
//! - **One writer for settings:** per-pair settings live in a flat map keyed by
//!   `PairKey` behind a lock; `setup_currency_settings` is the only way in.
//!
//! ## Public API
//!
//! - `Portfolio` / `PortfolioBuilder`: the signal and fill pipeline.
//! - `HoldingsTracker`, `ComplianceManager`, `PositionTracker`: the records it keeps.
//! - `SettingsRegistry` / `Registration`: per-pair settings.
//! - `PortfolioError`: the specific error types that can be returned from this crate.

pub mod compliance;
pub mod error;
pub mod holdings;
pub mod manager;
pub mod position;
pub mod settings;

pub use compliance::ComplianceManager;
pub use error::PortfolioError;
pub use holdings::HoldingsTracker;
pub use manager::{Portfolio, PortfolioBuilder, Transaction};
pub use position::{Position, PositionChange, PositionTracker};
pub use settings::{Registration, SettingsRegistry};
