use core_types::Direction;
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons an order cannot be sized or is refused by the risk checks.
///
/// None of these abort a run: the portfolio turns them into a rejected order.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Risk parameters from configuration are invalid: {0}")]
    InvalidParameters(String),

    #[error("No funds available to size the order")]
    NoFunds,

    #[error("Sized amount {amount} is below the minimum order size {minimum}")]
    BelowMinimum { amount: Decimal, minimum: Decimal },

    #[error("Cannot allocate funds to both legs of the order")]
    CannotAllocate,

    #[error("Direction {0} cannot be sized")]
    InvalidDirection(Direction),

    #[error("Order leverage {0} requested but leverage is not allowed")]
    LeverageNotAllowed(Decimal),

    #[error("Leveraged order ratio {ratio} exceeds the maximum {maximum}")]
    LeverageRatioExceeded { ratio: Decimal, maximum: Decimal },

    #[error("Order leverage {rate} exceeds the maximum leverage rate {maximum}")]
    LeverageRateExceeded { rate: Decimal, maximum: Decimal },

    #[error("Holding ratio {ratio} would exceed the maximum {maximum}")]
    ExceedsHoldingRatio { ratio: Decimal, maximum: Decimal },
}
