use crate::DataHandler;
use crate::error::DataError;
use core_types::PairKey;
use std::collections::BTreeMap;

/// Every data handler in a run, one per pair, iterated in key order.
#[derive(Default)]
pub struct DataStore {
    handlers: BTreeMap<PairKey, Box<dyn DataHandler>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handler: Box<dyn DataHandler>) -> Result<(), DataError> {
        let key = handler.key().clone();
        if self.handlers.contains_key(&key) {
            return Err(DataError::AlreadyLoaded(key.to_string()));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    pub fn get(&self, key: &PairKey) -> Option<&dyn DataHandler> {
        self.handlers.get(key).map(|h| h.as_ref())
    }

    pub fn get_mut(&mut self, key: &PairKey) -> Option<&mut Box<dyn DataHandler>> {
        self.handlers.get_mut(key)
    }

    pub fn keys(&self) -> Vec<PairKey> {
        self.handlers.keys().cloned().collect()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn DataHandler> {
        self.handlers.values().map(|h| h.as_ref())
    }

    pub fn handlers_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn DataHandler>> {
        self.handlers.values_mut()
    }

    /// True once any handler has run out of candles.
    pub fn any_exhausted(&self) -> bool {
        self.handlers.values().any(|h| !h.has_next())
    }

    pub fn reset_all(&mut self) {
        for handler in self.handlers.values_mut() {
            handler.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candles;
    use chrono::Utc;
    use core_types::{AssetKind, CurrencyPair, Interval, Kline};
    use rust_decimal_macros::dec;

    #[test]
    fn one_handler_per_pair() {
        let key = PairKey::new("binance", AssetKind::Spot, CurrencyPair::new("BTC", "USDT"));
        let kline = Kline {
            open_time: Utc::now(),
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            volume: dec!(1),
        };
        let candles = Candles::from_klines(key.clone(), Interval::hours(1), &[kline]).unwrap();
        let mut store = DataStore::new();
        store.insert(Box::new(candles.clone())).unwrap();
        assert!(matches!(
            store.insert(Box::new(candles)),
            Err(DataError::AlreadyLoaded(_))
        ));
        assert!(!store.any_exhausted());
        store.get_mut(&key).unwrap().next();
        assert!(store.any_exhausted());
        store.reset_all();
        assert!(store.get(&key).unwrap().has_next());
    }
}
