use core_types::Direction;
use rust_decimal::Decimal;
use thiserror::Error;

/// Ledger failures. Every variant is an invariant violation and aborts the run
/// when it escapes the portfolio layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FundingError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Amount {0} is negative or exceeds the released amount")]
    NegativeAmount(Decimal),

    #[error("Insufficient {currency} funds. Required: {required}, Available: {available}")]
    InsufficientFunds {
        currency: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient reserved {currency} funds. Required: {required}, Reserved: {reserved}")]
    InsufficientReserved {
        currency: String,
        required: Decimal,
        reserved: Decimal,
    },

    #[error("Cannot move funds between an item and itself: {0}")]
    SameItem(String),

    #[error("Cannot transfer {from} into {to}")]
    CurrencyMismatch { from: String, to: String },

    #[error("Funding item already exists: {0}")]
    AlreadyExists(String),

    #[error("Funding item {0} already backs another pair and exchange level funding is disabled")]
    SharedItem(String),

    #[error("No funding registered for {0}")]
    FundsNotFound(String),

    #[error("Direction {0} does not move funds for this pair")]
    InvalidDirection(Direction),

    #[error("Funding for {0} has been liquidated")]
    Liquidated(String),

    #[error("{0} is not backed by collateral")]
    NotCollateral(String),
}
