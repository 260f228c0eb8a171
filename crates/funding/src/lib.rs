//! # Meridian Funding
//!
//! The funds ledger. Every currency balance in a simulation lives in exactly one
//! `Item`; pairs are views over shared items, never separate storage.
//!
//! ## Architectural Principles
//!
//! - **Reservation before execution:** orders reserve funds when they are sized
//!   and settle against that reservation when they fill, so concurrent orders
//!   can never spend the same balance twice.
//! - **Per-item locking:** each item guards its balance with its own mutex.
//!   Operations spanning two items lock both in a stable (id) order for the
//!   whole unit of work.
//! - **Validate, then mutate:** a failing operation leaves every balance untouched.
//!
//! ## Public API
//!
//! - `Item`, `Balance`: a single currency balance.
//! - `SpotPair`, `CollateralPair`, `Funding`: views over the items behind a pair.
//! - `FundManager`: registration, lookup, transfers, liquidation, snapshots and reports.
//! - `FundingError`: the ledger's invariant violations.

pub mod error;
pub mod item;
pub mod manager;
pub mod pair;

pub use error::FundingError;
pub use item::{Balance, Item, TrackedPrice};
pub use manager::{
    FundManager, FundingReport, FundingSnapshot, ItemReport, ItemSnapshot, TransferMode,
};
pub use pair::{CollateralPair, Funding, Settlement, SpotPair};
