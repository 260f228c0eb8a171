use core_types::{Direction, PairKey};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// An open futures position.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub unrealised_pnl: Decimal,
}

impl Position {
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        match self.direction {
            Direction::Short => (self.entry_price - price) * self.amount,
            _ => (price - self.entry_price) * self.amount,
        }
    }
}

/// What a fill did to a pair's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionChange {
    /// Opened or added to; carries the new exposure.
    Exposure(Decimal),
    /// Closed outright; carries the realised PNL.
    Closed(Decimal),
}

/// Tracks open futures positions and the PNL they have realised.
#[derive(Debug, Default, Clone)]
pub struct PositionTracker {
    open: BTreeMap<PairKey, Position>,
    realised: BTreeMap<PairKey, Decimal>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_position(&self, key: &PairKey) -> Option<&Position> {
        self.open.get(key)
    }

    pub fn realised_pnl(&self, key: &PairKey) -> Decimal {
        self.realised.get(key).copied().unwrap_or_default()
    }

    pub fn unrealised_pnl(&self, key: &PairKey) -> Decimal {
        self.open.get(key).map(|p| p.unrealised_pnl).unwrap_or_default()
    }

    /// Applies a filled `Long` or `Short`. The opposite side of an open position
    /// closes it in full at `price`.
    pub fn apply(
        &mut self,
        key: &PairKey,
        direction: Direction,
        amount: Decimal,
        price: Decimal,
    ) -> PositionChange {
        match self.open.get_mut(key) {
            Some(position) if position.direction != direction => {
                let pnl = position.pnl_at(price);
                self.open.remove(key);
                *self.realised.entry(key.clone()).or_default() += pnl;
                PositionChange::Closed(pnl)
            }
            Some(position) => {
                let total = position.amount + amount;
                if !total.is_zero() {
                    position.entry_price =
                        (position.entry_price * position.amount + price * amount) / total;
                }
                position.amount = total;
                position.unrealised_pnl = position.pnl_at(price);
                PositionChange::Exposure(total)
            }
            None => {
                self.open.insert(
                    key.clone(),
                    Position {
                        direction,
                        amount,
                        entry_price: price,
                        unrealised_pnl: Decimal::ZERO,
                    },
                );
                PositionChange::Exposure(amount)
            }
        }
    }

    /// Marks the open position to `price`, returning its unrealised PNL.
    pub fn mark(&mut self, key: &PairKey, price: Decimal) -> Decimal {
        match self.open.get_mut(key) {
            Some(position) => {
                position.unrealised_pnl = position.pnl_at(price);
                position.unrealised_pnl
            }
            None => Decimal::ZERO,
        }
    }

    pub fn remove(&mut self, key: &PairKey) -> Option<Position> {
        self.open.remove(key)
    }

    /// Drops every open position on `exchange` without realising anything.
    pub fn clear_exchange(&mut self, exchange: &str) -> Vec<PairKey> {
        let keys: Vec<PairKey> = self
            .open
            .keys()
            .filter(|key| key.exchange == exchange)
            .cloned()
            .collect();
        for key in &keys {
            self.open.remove(key);
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AssetKind, CurrencyPair};
    use rust_decimal_macros::dec;

    fn key() -> PairKey {
        PairKey::new("binance", AssetKind::Futures, CurrencyPair::new("BTC", "USDT"))
    }

    #[test]
    fn averaging_then_closing_a_short() {
        let mut tracker = PositionTracker::new();
        assert_eq!(
            tracker.apply(&key(), Direction::Short, dec!(1), dec!(100)),
            PositionChange::Exposure(dec!(1))
        );
        assert_eq!(
            tracker.apply(&key(), Direction::Short, dec!(1), dec!(120)),
            PositionChange::Exposure(dec!(2))
        );
        assert_eq!(tracker.open_position(&key()).unwrap().entry_price, dec!(110));
        assert_eq!(tracker.mark(&key(), dec!(100)), dec!(20));

        assert_eq!(
            tracker.apply(&key(), Direction::Long, dec!(2), dec!(90)),
            PositionChange::Closed(dec!(40))
        );
        assert!(tracker.open_position(&key()).is_none());
        assert_eq!(tracker.realised_pnl(&key()), dec!(40));
        assert_eq!(tracker.mark(&key(), dec!(50)), dec!(0));
    }
}
