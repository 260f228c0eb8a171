use core_types::{Direction, PairKey};
use funding::FundingError;
use risk::RiskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("No currency settings registered for {0}")]
    NoPortfolioSettings(PairKey),

    #[error("Initial funds for {0} are zero")]
    InitialFundsZero(PairKey),

    #[error("Direction {direction} is not valid for {key}")]
    InvalidDirection { key: PairKey, direction: Direction },

    #[error("Position on {0} has been liquidated")]
    PositionLiquidated(PairKey),

    #[error("A size manager must be set before building the portfolio")]
    SizeManagerUnset,

    #[error("A risk manager must be set before building the portfolio")]
    RiskManagerUnset,

    #[error("Funding error: {0}")]
    Funding(#[from] FundingError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),
}
