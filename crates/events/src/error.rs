use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventsError {
    #[error("Candle rejected for {key}: {reason}")]
    InvalidCandle { key: String, reason: String },

    #[error("Expected a {expected} event but received a {received} event")]
    UnexpectedKind {
        expected: &'static str,
        received: &'static str,
    },
}
