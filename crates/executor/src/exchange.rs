use crate::error::ExecutorError;
use crate::slippage::SlippageModel;
use async_trait::async_trait;
use configuration::CurrencySettings;
use core_types::{Direction, PairKey};
use data::DataHandler;
use events::{FillEvent, OrderDetail, OrderEvent};
use risk::CollateralWeighting;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// The smallest amount the exchange will trim an order by when fitting it into a
/// candle's volume.
const VOLUME_STEP: Decimal = dec!(0.00001);

/// A generic trait for an execution engine.
///
/// This trait allows the simulation loop to be agnostic about how an order is
/// priced and filled.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Prices `order` against the latest candle of `data` and returns the fill.
    ///
    /// The executor calculates what the fill would be but crucially **does not
    /// touch funds**. The caller settles the fill through the portfolio.
    async fn execute_order(
        &self,
        order: &OrderEvent,
        data: &dyn DataHandler,
    ) -> Result<FillEvent, ExecutorError>;
}

/// The "virtual exchange" for the simulation.
///
/// It holds the per-pair fee and slippage settings and implements the `Executor`
/// trait to create fills with realistic costs.
pub struct SimulatedExchange {
    settings: HashMap<PairKey, CurrencySettings>,
    slippage: Box<dyn SlippageModel>,
}

impl SimulatedExchange {
    pub fn new(slippage: Box<dyn SlippageModel>) -> Self {
        Self {
            settings: HashMap::new(),
            slippage,
        }
    }

    pub fn with_currencies(mut self, currencies: impl IntoIterator<Item = CurrencySettings>) -> Self {
        for settings in currencies {
            self.add_currency(settings);
        }
        self
    }

    pub fn add_currency(&mut self, settings: CurrencySettings) {
        self.settings.insert(settings.key(), settings);
    }

    pub fn currency_settings(&self, key: &PairKey) -> Option<&CurrencySettings> {
        self.settings.get(key)
    }
}

impl CollateralWeighting for SimulatedExchange {
    fn collateral_weight(&self, key: &PairKey) -> Option<Decimal> {
        self.settings.get(key).map(|s| s.collateral_weight)
    }
}

#[async_trait]
impl Executor for SimulatedExchange {
    async fn execute_order(
        &self,
        order: &OrderEvent,
        data: &dyn DataHandler,
    ) -> Result<FillEvent, ExecutorError> {
        let mut fill = FillEvent::from_order(order);
        if !order.direction.is_tradeable() {
            fill.liquidated = order.direction == Direction::Liquidated;
            return Ok(fill);
        }
        if order.direction == Direction::ClosePosition {
            return Err(ExecutorError::InvalidDirection(order.direction));
        }
        if order.amount <= Decimal::ZERO {
            fill.direction = Direction::DoNothing;
            fill.base.append_reason("order amount is zero");
            return Ok(fill);
        }

        let key = &order.base.key;
        let settings = self
            .settings
            .get(key)
            .ok_or_else(|| ExecutorError::NoCurrencySettings(key.to_string()))?;
        let candle = data
            .latest()
            .ok_or_else(|| ExecutorError::NoData(key.to_string()))?;
        let buy_side = order.direction.is_buy_side();

        let rate = self.slippage.estimate(order, candle, settings).max(Decimal::ZERO);
        let slipped = if buy_side {
            order.close_price * (Decimal::ONE + rate)
        } else {
            order.close_price * (Decimal::ONE - rate)
        };
        if !rate.is_zero() {
            fill.base.append_reason(format!("slippage rate {rate} applied"));
        }
        let price = slipped.max(candle.low).min(candle.high);
        if price != slipped {
            fill.base.append_reason(format!(
                "price {slipped} outside candle range, set to {price}"
            ));
        }

        let mut amount = order.amount;
        if !settings.skip_candle_volume_check && candle.volume > Decimal::ZERO && price > Decimal::ZERO {
            let fitted = fit_to_volume(amount, price, candle.volume);
            if fitted < amount {
                fill.base.append_reason(format!(
                    "amount reduced from {amount} to {fitted} to fit candle volume"
                ));
                amount = fitted;
            }
        }

        let fee_rate = settings.fee_rate();
        if !order.closing_position && price > Decimal::ZERO {
            let affordable = match order.direction {
                Direction::Buy => order.allocated_funds / (price * (Decimal::ONE + fee_rate)),
                Direction::Sell => order.allocated_funds,
                _ => order.allocated_funds * order.leverage / price,
            };
            if amount > affordable {
                fill.base.append_reason(format!(
                    "amount reduced from {amount} to {affordable} to fit allocated funds"
                ));
                amount = affordable;
            }
        }

        if amount <= Decimal::ZERO || price <= Decimal::ZERO {
            fill.direction = order.direction.failed();
            fill.base.append_reason("amount shrunk to zero");
            tracing::warn!(%key, direction = %order.direction, "order could not be filled");
            return Ok(fill);
        }

        let notional = amount * price;
        let fee = fee_rate * notional;
        fill.amount = amount;
        fill.slippage_rate = rate;
        fill.volume_adjusted_price = price;
        fill.purchase_price = price;
        fill.exchange_fee = fee;
        fill.total = if buy_side { notional + fee } else { notional - fee };
        fill.order = Some(OrderDetail {
            id: order.id,
            side: order.direction,
            price,
            amount,
            fee,
            leverage: order.leverage,
            time: order.base.time,
        });
        tracing::debug!(
            %key,
            direction = %order.direction,
            %amount,
            %price,
            %fee,
            "order filled"
        );
        Ok(fill)
    }
}

/// Trims `amount` in `VOLUME_STEP` decrements until `amount * price <= volume`.
///
/// The number of whole steps is estimated up front, then the amount keeps
/// stepping down while the rounded quotient still leaves it over the volume.
fn fit_to_volume(amount: Decimal, price: Decimal, volume: Decimal) -> Decimal {
    if amount * price <= volume {
        return amount;
    }
    let excess = amount - volume / price;
    let steps = (excess / VOLUME_STEP).ceil();
    let mut fitted = (amount - steps * VOLUME_STEP).max(Decimal::ZERO);
    while fitted > Decimal::ZERO && fitted * price > volume {
        fitted = (fitted - VOLUME_STEP).max(Decimal::ZERO);
    }
    fitted
}
