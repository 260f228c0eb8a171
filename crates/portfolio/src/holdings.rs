use core_types::PairKey;
use events::Holding;
use std::collections::BTreeMap;

/// Append-only holding history per pair.
#[derive(Debug, Default, Clone)]
pub struct HoldingsTracker {
    series: BTreeMap<PairKey, Vec<Holding>>,
}

impl HoldingsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, holding: Holding) {
        self.series.entry(holding.key.clone()).or_default().push(holding);
    }

    pub fn latest(&self, key: &PairKey) -> Option<&Holding> {
        self.series.get(key).and_then(|series| series.last())
    }

    pub fn history(&self, key: &PairKey) -> &[Holding] {
        self.series.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// The most recent holding of every tracked pair, ordered by key.
    pub fn latest_all(&self) -> Vec<Holding> {
        self.series
            .values()
            .filter_map(|series| series.last().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{AssetKind, CurrencyPair};
    use rust_decimal_macros::dec;

    #[test]
    fn latest_per_pair() {
        let btc = PairKey::new("binance", AssetKind::Spot, CurrencyPair::new("BTC", "USDT"));
        let eth = PairKey::new("binance", AssetKind::Spot, CurrencyPair::new("ETH", "USDT"));
        let mut tracker = HoldingsTracker::new();
        tracker.push(Holding::new(btc.clone(), 1, Utc::now(), dec!(0), dec!(100), dec!(10)));
        tracker.push(Holding::new(btc.clone(), 2, Utc::now(), dec!(0), dec!(100), dec!(11)));
        tracker.push(Holding::new(eth.clone(), 1, Utc::now(), dec!(0), dec!(50), dec!(1)));

        assert_eq!(tracker.history(&btc).len(), 2);
        assert_eq!(tracker.latest(&btc).unwrap().offset, 2);
        assert_eq!(tracker.latest_all().len(), 2);
        assert!(tracker.history(&PairKey::new("kraken", AssetKind::Spot, CurrencyPair::new("BTC", "EUR"))).is_empty());
    }
}
