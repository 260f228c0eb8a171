use crate::error::RiskError;
use crate::{CollateralWeighting, SizeManager};
use configuration::{CurrencySettings, MinMax};
use core_types::Direction;
use events::OrderEvent;
use rust_decimal::Decimal;
use std::sync::Arc;

/// A sized copy of the incoming order together with its expected fee.
#[derive(Debug, Clone, PartialEq)]
pub struct SizedOrder {
    pub order: OrderEvent,
    pub fee: Decimal,
}

/// Sizes orders against per-pair limits and portfolio-wide limits, taking the
/// smaller of the two results.
#[derive(Clone, Default)]
pub struct Sizer {
    buy_side: MinMax,
    sell_side: MinMax,
    weighting: Option<Arc<dyn CollateralWeighting>>,
}

impl Sizer {
    pub fn new(buy_side: MinMax, sell_side: MinMax) -> Self {
        Self {
            buy_side,
            sell_side,
            weighting: None,
        }
    }

    pub fn with_weighting(mut self, weighting: Arc<dyn CollateralWeighting>) -> Self {
        self.weighting = Some(weighting);
        self
    }

    fn size_one_leg(
        &self,
        order: &OrderEvent,
        price: Decimal,
        available: Decimal,
        settings: &CurrencySettings,
    ) -> Result<(Decimal, Decimal), RiskError> {
        let fee_rate = settings.fee_rate();
        if order.direction == Direction::ClosePosition {
            return Ok((available, available * price * fee_rate));
        }
        let (pair_limits, portfolio_limits, limit, quote_denominated) = match order.direction {
            Direction::Buy | Direction::Long => {
                (settings.buy_side, self.buy_side, order.buy_limit, true)
            }
            // Shorts draw on collateral, so they are sized from quote like longs.
            Direction::Short => (settings.sell_side, self.sell_side, order.sell_limit, true),
            Direction::Sell => (settings.sell_side, self.sell_side, order.sell_limit, false),
            other => return Err(RiskError::InvalidDirection(other)),
        };

        let size = |limits: &MinMax| {
            if quote_denominated {
                calculate_buy_size(price, available, fee_rate, limit, limits)
            } else {
                calculate_sell_size(price, available, fee_rate, limit, limits)
            }
        };
        let pair_size = size(&pair_limits)?;
        let portfolio_size = size(&portfolio_limits)?;
        Ok(if portfolio_size.0 < pair_size.0 {
            portfolio_size
        } else {
            pair_size
        })
    }
}

impl SizeManager for Sizer {
    fn size_order(
        &self,
        order: &OrderEvent,
        available_funds: Decimal,
        settings: &CurrencySettings,
    ) -> Result<SizedOrder, RiskError> {
        if available_funds <= Decimal::ZERO {
            return Err(RiskError::NoFunds);
        }
        let fee_rate = settings.fee_rate();
        let mut sized = order.clone();

        if order.amount > Decimal::ZERO && order.close_price > Decimal::ZERO {
            let affordable = match order.direction {
                Direction::Sell | Direction::ClosePosition => order.amount <= available_funds,
                _ => order.amount * order.close_price * (Decimal::ONE + fee_rate) <= available_funds,
            };
            if affordable {
                let fee = order.amount * order.close_price * fee_rate;
                return Ok(SizedOrder { order: sized, fee });
            }
        }

        let companion = order
            .fill_dependent
            .as_deref()
            .filter(|companion| companion.match_order_amount);
        let (amount, fee) = match companion {
            Some(companion) => {
                let weight = self
                    .weighting
                    .as_ref()
                    .and_then(|w| w.collateral_weight(&order.base.key))
                    .unwrap_or(Decimal::ONE);
                let price = order.close_price.max(companion.close_price);
                if price <= Decimal::ZERO {
                    (Decimal::ZERO, Decimal::ZERO)
                } else {
                    let (amount, fee) =
                        self.size_one_leg(order, price, available_funds * weight, settings)?;
                    if amount * weight - fee * weight < Decimal::ZERO {
                        return Err(RiskError::CannotAllocate);
                    }
                    (amount, fee)
                }
            }
            None if order.close_price <= Decimal::ZERO => (Decimal::ZERO, Decimal::ZERO),
            None => self.size_one_leg(order, order.close_price, available_funds, settings)?,
        };

        tracing::debug!(
            key = %order.base.key,
            direction = %order.direction,
            %available_funds,
            %amount,
            %fee,
            "order sized"
        );
        sized.amount = amount;
        Ok(SizedOrder { order: sized, fee })
    }
}

fn within_limits(value: Decimal, limits: &MinMax) -> bool {
    value >= limits.minimum_size
        && (limits.maximum_size.is_zero() || value <= limits.maximum_size)
}

/// Sizes an order paid for in quote currency.
///
/// Limits apply in order: explicit order limit, maximum size, maximum total spend
/// (fee included). The result never drops below `minimum_size` silently.
pub fn calculate_buy_size(
    price: Decimal,
    available: Decimal,
    fee_rate: Decimal,
    order_limit: Option<Decimal>,
    limits: &MinMax,
) -> Result<(Decimal, Decimal), RiskError> {
    if price <= Decimal::ZERO {
        return Ok((Decimal::ZERO, Decimal::ZERO));
    }
    if available <= Decimal::ZERO {
        return Err(RiskError::NoFunds);
    }
    let mut amount = available * (Decimal::ONE - fee_rate) / price;
    if let Some(limit) = order_limit {
        if limit > Decimal::ZERO && within_limits(limit, limits) && limit < amount {
            amount = limit;
        }
    }
    if limits.maximum_size > Decimal::ZERO && amount > limits.maximum_size {
        amount = limits.maximum_size;
    }
    let spend_per_unit = price * (Decimal::ONE + fee_rate);
    if limits.maximum_total > Decimal::ZERO && amount * spend_per_unit > limits.maximum_total {
        amount = limits.maximum_total / spend_per_unit;
    }
    if amount < limits.minimum_size {
        return Err(RiskError::BelowMinimum {
            amount,
            minimum: limits.minimum_size,
        });
    }
    Ok((amount, amount * price * fee_rate))
}

/// Sizes an order paid for in base currency. The fee comes out of the quote proceeds.
pub fn calculate_sell_size(
    price: Decimal,
    available: Decimal,
    fee_rate: Decimal,
    order_limit: Option<Decimal>,
    limits: &MinMax,
) -> Result<(Decimal, Decimal), RiskError> {
    if price <= Decimal::ZERO {
        return Ok((Decimal::ZERO, Decimal::ZERO));
    }
    if available <= Decimal::ZERO {
        return Err(RiskError::NoFunds);
    }
    let mut amount = available;
    if let Some(limit) = order_limit {
        if limit > Decimal::ZERO && within_limits(limit, limits) && limit < amount {
            amount = limit;
        }
    }
    if limits.maximum_size > Decimal::ZERO && amount > limits.maximum_size {
        amount = limits.maximum_size;
    }
    if limits.maximum_total > Decimal::ZERO && amount * price > limits.maximum_total {
        amount = limits.maximum_total / price;
    }
    if amount < limits.minimum_size {
        return Err(RiskError::BelowMinimum {
            amount,
            minimum: limits.minimum_size,
        });
    }
    Ok((amount, amount * price * fee_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{AssetKind, CurrencyPair, Interval, PairKey};
    use events::{EventBase, SignalEvent};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn settings() -> CurrencySettings {
        CurrencySettings {
            exchange: "binance".to_string(),
            asset: AssetKind::Spot,
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            initial_base_funds: dec!(0),
            initial_quote_funds: dec!(1000),
            maker_fee: dec!(0.001),
            taker_fee: dec!(0.001),
            buy_side: MinMax::default(),
            sell_side: MinMax::default(),
            min_slippage: dec!(0),
            max_slippage: dec!(0),
            skip_candle_volume_check: false,
            leverage: Default::default(),
            max_holding_ratio: dec!(0),
            collateral_weight: dec!(1),
            data_file: None,
        }
    }

    fn order(direction: Direction, price: Decimal) -> OrderEvent {
        let key = PairKey::new("binance", AssetKind::Spot, CurrencyPair::new("BTC", "USDT"));
        let signal = SignalEvent {
            base: EventBase::new(0, key, Utc::now(), Interval::hours(1)),
            direction,
            close_price: price,
            buy_limit: None,
            sell_limit: None,
            amount: None,
            fill_dependent: None,
            match_order_amount: false,
        };
        OrderEvent::from_signal(&signal)
    }

    #[test]
    fn buy_uses_all_funds_net_of_fee() {
        let sized = Sizer::default()
            .size_order(&order(Direction::Buy, dec!(100)), dec!(1000), &settings())
            .unwrap();
        assert_eq!(sized.order.amount, dec!(9.99));
        assert_eq!(sized.fee, dec!(0.999));
    }

    #[test]
    fn buy_limits_apply_in_order() {
        let mut pair = settings();
        pair.buy_side = MinMax {
            minimum_size: dec!(1),
            maximum_size: dec!(5),
            maximum_total: dec!(0),
        };
        let mut buy = order(Direction::Buy, dec!(100));
        buy.buy_limit = Some(dec!(3));
        let sized = Sizer::default().size_order(&buy, dec!(1000), &pair).unwrap();
        assert_eq!(sized.order.amount, dec!(3));

        // A limit outside [min, max] is ignored and max_size wins.
        buy.buy_limit = Some(dec!(7));
        let sized = Sizer::default().size_order(&buy, dec!(1000), &pair).unwrap();
        assert_eq!(sized.order.amount, dec!(5));
    }

    #[test]
    fn max_total_includes_fee() {
        let mut pair = settings();
        pair.taker_fee = dec!(0.25);
        pair.buy_side.maximum_total = dec!(250);
        let sized = Sizer::default()
            .size_order(&order(Direction::Buy, dec!(100)), dec!(1000), &pair)
            .unwrap();
        assert_eq!(sized.order.amount, dec!(2));
        assert_eq!(sized.fee, dec!(50));
    }

    #[test]
    fn portfolio_limits_win_when_smaller() {
        let portfolio = MinMax {
            minimum_size: dec!(0),
            maximum_size: dec!(0.5),
            maximum_total: dec!(0),
        };
        let sized = Sizer::new(portfolio, MinMax::default())
            .size_order(&order(Direction::Buy, dec!(100)), dec!(1000), &settings())
            .unwrap();
        assert_eq!(sized.order.amount, dec!(0.5));
    }

    #[test]
    fn below_minimum_is_rejected() {
        let mut pair = settings();
        pair.buy_side.minimum_size = dec!(20);
        let err = Sizer::default()
            .size_order(&order(Direction::Buy, dec!(100)), dec!(1000), &pair)
            .unwrap_err();
        assert!(matches!(err, RiskError::BelowMinimum { .. }));
    }

    #[test]
    fn sell_sizes_the_base_holding() {
        let mut pair = settings();
        pair.sell_side.maximum_size = dec!(1.5);
        let sized = Sizer::default()
            .size_order(&order(Direction::Sell, dec!(100)), dec!(2), &pair)
            .unwrap();
        assert_eq!(sized.order.amount, dec!(1.5));
        assert_eq!(sized.fee, dec!(0.15));
    }

    #[test]
    fn preset_amount_is_honoured_when_affordable() {
        let mut buy = order(Direction::Buy, dec!(100));
        buy.amount = dec!(2);
        let sized = Sizer::default().size_order(&buy, dec!(1000), &settings()).unwrap();
        assert_eq!(sized.order.amount, dec!(2));
        assert_eq!(sized.fee, dec!(0.2));

        buy.amount = dec!(20);
        let sized = Sizer::default().size_order(&buy, dec!(1000), &settings()).unwrap();
        assert_eq!(sized.order.amount, dec!(9.99));
    }

    #[test]
    fn no_funds_and_zero_price() {
        assert_eq!(
            Sizer::default().size_order(&order(Direction::Buy, dec!(100)), dec!(0), &settings()),
            Err(RiskError::NoFunds)
        );
        let sized = Sizer::default()
            .size_order(&order(Direction::Buy, dec!(0)), dec!(10), &settings())
            .unwrap();
        assert_eq!(sized.order.amount, dec!(0));
    }

    struct HalfWeight;

    impl CollateralWeighting for HalfWeight {
        fn collateral_weight(&self, _key: &PairKey) -> Option<Decimal> {
            Some(dec!(0.5))
        }
    }

    #[test]
    fn two_legged_orders_price_off_the_higher_close() {
        let mut buy = order(Direction::Buy, dec!(100));
        let companion_signal = SignalEvent {
            base: buy.base.clone(),
            direction: Direction::Short,
            close_price: dec!(200),
            buy_limit: None,
            sell_limit: None,
            amount: None,
            fill_dependent: None,
            match_order_amount: true,
        };
        buy.fill_dependent = Some(Box::new(companion_signal));

        let mut pair = settings();
        pair.taker_fee = dec!(0);
        let sized = Sizer::default()
            .with_weighting(Arc::new(HalfWeight))
            .size_order(&buy, dec!(1000), &pair)
            .unwrap();
        assert_eq!(sized.order.amount, dec!(2.5));
    }

    proptest! {
        #[test]
        fn buy_sizing_is_monotonic_and_capped(
            low in 1u32..100_000,
            extra in 0u32..100_000,
            max_size in 0u32..50,
            max_total in 0u32..5_000,
        ) {
            let limits = MinMax {
                minimum_size: Decimal::ZERO,
                maximum_size: Decimal::from(max_size),
                maximum_total: Decimal::from(max_total),
            };
            let price = dec!(37.5);
            let fee = dec!(0.001);
            let (small, _) = calculate_buy_size(price, Decimal::from(low), fee, None, &limits).unwrap();
            let (large, _) = calculate_buy_size(price, Decimal::from(low + extra), fee, None, &limits).unwrap();
            prop_assert!(small <= large);
            if max_size > 0 {
                prop_assert!(large <= limits.maximum_size);
            }
            if max_total > 0 {
                prop_assert!(large * price * (Decimal::ONE + fee) <= limits.maximum_total + dec!(0.000000001));
            }
        }
    }
}
