use core_types::Direction;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("No currency settings registered with the exchange for {0}")]
    NoCurrencySettings(String),

    #[error("No candle available to fill an order for {0}")]
    NoData(String),

    #[error("The exchange cannot execute a {0} order")]
    InvalidDirection(Direction),
}
