use crate::error::DataError;
use async_trait::async_trait;
use core_types::{Interval, Kline, PairKey};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// A source of fresh candles polled by the live loop.
#[async_trait]
pub trait LiveSource: Send + Sync {
    /// Returns any candles for `key` that became available since the last call.
    async fn fetch_latest(&self, key: &PairKey, interval: Interval) -> Result<Vec<Kline>, DataError>;
}

/// Feeds pre-recorded candles to the live loop a few at a time.
///
/// Useful for rehearsing live mode against historical data.
#[derive(Debug)]
pub struct ReplaySource {
    queues: Mutex<HashMap<PairKey, VecDeque<Kline>>>,
    batch: usize,
}

impl ReplaySource {
    pub fn new(batch: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            batch: batch.max(1),
        }
    }

    pub fn push(&self, key: PairKey, klines: impl IntoIterator<Item = Kline>) {
        self.queues.lock().entry(key).or_default().extend(klines);
    }

    pub fn remaining(&self, key: &PairKey) -> usize {
        self.queues.lock().get(key).map(VecDeque::len).unwrap_or(0)
    }
}

#[async_trait]
impl LiveSource for ReplaySource {
    async fn fetch_latest(&self, key: &PairKey, _interval: Interval) -> Result<Vec<Kline>, DataError> {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(key) else {
            return Ok(Vec::new());
        };
        let take = self.batch.min(queue.len());
        Ok(queue.drain(..take).collect())
    }
}
