use core_types::PairKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Offset {offset} has already been processed for {key}")]
    AlreadyProcessed { key: PairKey, offset: u64 },

    #[error("No data event has been recorded for {key} at offset {offset}")]
    NoEventAtOffset { key: PairKey, offset: u64 },

    #[error("Not enough data to perform calculation: {0}")]
    NotEnoughData(String),
}
