//! # Meridian Events
//!
//! This crate defines the closed set of events that flow through the simulation
//! loop, plus the two derived records every layer above reads: per-pair
//! `Holding` valuations and compliance `Snapshot`s.
//!
//! As a Layer 0 crate, it depends only on `core-types` and provides the definitive
//! language for all state passed between the portfolio, the exchange simulator
//! and the statistics engine.
//!
//! ## Public API
//!
//! - `Event`: `Data`, `Signal`, `Order` and `Fill`, matched exhaustively.
//! - `EventBase`: offset, pair key, time, interval and the reason trail.
//! - `Holding`: append-only valuation snapshot per pair.
//! - `Snapshot` / `SnapshotOrder`: compliance records of executed orders.

// Declare the modules that make up this crate.
pub mod compliance;
pub mod error;
pub mod event;
pub mod holding;

// Re-export the core types to provide a clean public API.
pub use compliance::{Snapshot, SnapshotOrder};
pub use error::EventsError;
pub use event::{DataEvent, Event, EventBase, FillEvent, OrderDetail, OrderEvent, SignalEvent};
pub use holding::Holding;
