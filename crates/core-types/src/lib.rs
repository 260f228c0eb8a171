//! # Meridian Core Types
//!
//! The vocabulary shared by every other crate in the workspace: trade directions,
//! asset kinds, currency pairs, the composite key that identifies one simulated
//! market, candle intervals and raw klines.
//!
//! This crate has no knowledge of events, funds or strategies.

pub mod enums;
pub mod error;
pub mod interval;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AssetKind, Direction};
pub use error::CoreError;
pub use interval::Interval;
pub use structs::{CurrencyPair, Kline, PairKey};
