use crate::event::FillEvent;
use chrono::{DateTime, Utc};
use core_types::{Direction, PairKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A timestamped valuation of one pair's funds.
///
/// Holdings are append-only: every fill and every new candle produces a fresh
/// `Holding` derived from the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub key: PairKey,
    pub offset: u64,
    pub time: DateTime<Utc>,
    pub close_price: Decimal,

    pub base_initial_funds: Decimal,
    pub quote_initial_funds: Decimal,
    pub total_initial_value: Decimal,

    pub base_size: Decimal,
    pub base_value: Decimal,
    pub quote_size: Decimal,
    pub committed_funds: Decimal,

    pub bought_amount: Decimal,
    pub bought_value: Decimal,
    pub sold_amount: Decimal,
    pub sold_value: Decimal,
    pub total_fees: Decimal,
    pub value_lost_to_slippage: Decimal,
    pub value_lost_to_volume_sizing: Decimal,

    pub total_value: Decimal,
    pub total_value_difference: Decimal,
    /// Change versus the previous snapshot, in percent.
    pub change_in_total_value_percent: Decimal,

    pub unrealised_pnl: Decimal,
    pub realised_pnl: Decimal,
}

impl Holding {
    pub fn new(
        key: PairKey,
        offset: u64,
        time: DateTime<Utc>,
        base_initial_funds: Decimal,
        quote_initial_funds: Decimal,
        close_price: Decimal,
    ) -> Self {
        let base_value = base_initial_funds * close_price;
        let total = base_value + quote_initial_funds;
        Self {
            key,
            offset,
            time,
            close_price,
            base_initial_funds,
            quote_initial_funds,
            total_initial_value: total,
            base_size: base_initial_funds,
            base_value,
            quote_size: quote_initial_funds,
            committed_funds: Decimal::ZERO,
            bought_amount: Decimal::ZERO,
            bought_value: Decimal::ZERO,
            sold_amount: Decimal::ZERO,
            sold_value: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            value_lost_to_slippage: Decimal::ZERO,
            value_lost_to_volume_sizing: Decimal::ZERO,
            total_value: total,
            total_value_difference: Decimal::ZERO,
            change_in_total_value_percent: Decimal::ZERO,
            unrealised_pnl: Decimal::ZERO,
            realised_pnl: Decimal::ZERO,
        }
    }

    /// Folds a fill into the running totals, then revalues at the fill's close.
    ///
    /// `base_size` and `quote_size` are the ledger balances after settlement.
    pub fn apply_fill(&mut self, fill: &FillEvent, base_size: Decimal, quote_size: Decimal) {
        if fill.liquidated {
            self.base_size = Decimal::ZERO;
            self.quote_size = Decimal::ZERO;
            self.committed_funds = Decimal::ZERO;
            self.unrealised_pnl = Decimal::ZERO;
            self.revalue(fill.base.offset, fill.base.time, fill.close_price);
            return;
        }

        if fill.is_filled() {
            let notional = fill.amount * fill.purchase_price;
            match fill.direction {
                Direction::Buy | Direction::Long => {
                    self.bought_amount += fill.amount;
                    self.bought_value += notional;
                }
                Direction::Sell | Direction::Short => {
                    self.sold_amount += fill.amount;
                    self.sold_value += notional;
                }
                _ => {}
            }
            self.total_fees += fill.exchange_fee;
            self.value_lost_to_slippage +=
                (fill.purchase_price - fill.close_price).abs() * fill.amount;
        }
        if fill.requested_amount > fill.amount && fill.direction.is_tradeable() {
            self.value_lost_to_volume_sizing +=
                (fill.requested_amount - fill.amount) * fill.close_price;
        }

        self.base_size = base_size;
        self.quote_size = quote_size;
        self.committed_funds = (self.bought_value - self.sold_value).max(Decimal::ZERO);
        self.revalue(fill.base.offset, fill.base.time, fill.close_price);
    }

    /// Re-prices the holding at a new close, recording the change from the previous valuation.
    pub fn revalue(&mut self, offset: u64, time: DateTime<Utc>, close_price: Decimal) {
        let previous = self.total_value;
        self.offset = offset;
        self.time = time;
        self.close_price = close_price;
        self.base_value = self.base_size * close_price;
        self.total_value = if self.key.asset.is_futures() {
            self.quote_size + self.unrealised_pnl
        } else {
            self.base_value + self.quote_size
        };
        self.total_value_difference = self.total_value - previous;
        self.change_in_total_value_percent = if previous.is_zero() {
            Decimal::ZERO
        } else {
            self.total_value_difference / previous * Decimal::ONE_HUNDRED
        };
    }

    /// Profit or loss against the initial valuation.
    pub fn pnl(&self) -> Decimal {
        self.total_value - self.total_initial_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DataEvent, FillEvent, OrderEvent, SignalEvent};
    use chrono::TimeZone;
    use core_types::{AssetKind, CurrencyPair, Interval, Kline};
    use rust_decimal_macros::dec;

    fn key() -> PairKey {
        PairKey::new("binance", AssetKind::Spot, CurrencyPair::new("BTC", "USDT"))
    }

    fn fill(direction: Direction, amount: Decimal, price: Decimal) -> FillEvent {
        let kline = Kline {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: dec!(1000),
        };
        let data = DataEvent::from_kline(1, key(), Interval::hours(1), &kline).unwrap();
        let order = OrderEvent::from_signal(&SignalEvent::from_data(&data, direction).with_amount(amount));
        let mut fill = FillEvent::from_order(&order);
        fill.amount = amount;
        fill.purchase_price = price;
        fill.exchange_fee = amount * price * dec!(0.001);
        fill
    }

    #[test]
    fn new_holding_values_both_legs() {
        let holding = Holding::new(key(), 0, Utc::now(), dec!(1), dec!(1000), dec!(100));
        assert_eq!(holding.total_initial_value, dec!(1100));
        assert_eq!(holding.total_value, dec!(1100));
    }

    #[test]
    fn fill_updates_totals_and_change() {
        let mut holding = Holding::new(key(), 0, Utc::now(), dec!(0), dec!(1000), dec!(100));
        let buy = fill(Direction::Buy, dec!(5), dec!(100));
        holding.apply_fill(&buy, dec!(5), dec!(499.5));
        assert_eq!(holding.bought_amount, dec!(5));
        assert_eq!(holding.bought_value, dec!(500));
        assert_eq!(holding.total_fees, dec!(0.5));
        assert_eq!(holding.total_value, dec!(999.5));
        assert_eq!(holding.total_value_difference, dec!(-0.5));
        assert_eq!(holding.change_in_total_value_percent, dec!(-0.05));

        holding.revalue(2, Utc::now(), dec!(110));
        assert_eq!(holding.total_value, dec!(1049.5));
        assert_eq!(holding.pnl(), dec!(49.5));
    }
}
