use events::EventsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("No candles available for {0}")]
    Empty(String),

    #[error("Candles for {0} are already loaded")]
    AlreadyLoaded(String),

    #[error("Live source error: {0}")]
    Source(String),

    #[error("Event error: {0}")]
    Event(#[from] EventsError),
}
