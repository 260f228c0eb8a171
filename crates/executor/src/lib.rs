//! # Meridian Executor Crate
//!
//! This crate provides the simulated exchange that turns sized orders into
//! fills. It defines a generic `Executor` trait and the `SimulatedExchange` that
//! prices orders against the current candle's range and volume.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** The `Executor` trait is designed to be a pure
//!   calculator that determines the effects of an order (slippage, volume limits,
//!   fees) without touching funds. The portfolio settles the resulting fill
//!   against the ledger. This separation is key for testability and clarity.
//! - **Pluggable slippage:** how far a price moves against an order is a
//!   `SlippageModel`, chosen per run from configuration.
//! - **Never more than asked:** the simulator may shrink an order to fit the
//!   candle or the reserved funds, but never raises the requested amount.
//!
//! ## Public API
//!
//! - `Executor`: The core trait for all execution engines.
//! - `SimulatedExchange`: The "virtual exchange" for simulation. It also supplies
//!   per-pair collateral weights to the sizer.
//! - `SlippageModel` and its implementations.
//! - `ExecutorError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod exchange;
pub mod slippage;

// Re-export the key components to provide a clean, public-facing API.
pub use error::ExecutorError;
pub use exchange::{Executor, SimulatedExchange};
pub use risk::CollateralWeighting;
pub use slippage::{
    FixedSlippage, NoSlippage, OrderBookSlippage, RandomSlippage, SlippageModel, slippage_model,
};
