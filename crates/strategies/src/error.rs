use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Strategy received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("An error occurred during indicator calculation: {0}")]
    IndicatorError(String),

    #[error("Strategy of type '{0}' not found or implemented")]
    StrategyNotFound(String),

    #[error("No candle available for {0}")]
    NoData(String),

    #[error("Too much missing data for {key}: {ratio} of candles were gap-filled")]
    TooMuchBadData { key: String, ratio: Decimal },

    #[error("Strategy '{0}' only supports simultaneous signal processing")]
    SimultaneousOnly(&'static str),

    #[error("Strategy '{0}' does not support simultaneous signal processing")]
    SimultaneousUnsupported(&'static str),
}

impl StrategyError {
    /// Errors that must stop the run rather than skip the data point.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StrategyError::TooMuchBadData { .. })
    }
}
