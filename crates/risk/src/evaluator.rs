use crate::RiskManager;
use crate::error::RiskError;
use configuration::{CurrencySettings, LeverageSettings};
use events::{Holding, OrderEvent, Snapshot};
use rust_decimal::Decimal;

/// Portfolio-wide leverage and concentration checks.
///
/// Evaluated per order against the latest holdings; nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct RiskEvaluator {
    leverage: LeverageSettings,
}

impl RiskEvaluator {
    pub fn new(leverage: LeverageSettings) -> Self {
        Self { leverage }
    }

    fn check_leverage(
        &self,
        order: &OrderEvent,
        snapshot: Option<&Snapshot>,
        settings: &CurrencySettings,
    ) -> Result<(), RiskError> {
        let rate = order.leverage;
        if rate <= Decimal::ONE {
            return Ok(());
        }
        if !self.leverage.can_use_leverage || !settings.leverage.can_use_leverage {
            return Err(RiskError::LeverageNotAllowed(rate));
        }

        for limits in [&settings.leverage, &self.leverage] {
            if limits.max_leverage_rate > Decimal::ZERO && rate > limits.max_leverage_rate {
                return Err(RiskError::LeverageRateExceeded {
                    rate,
                    maximum: limits.max_leverage_rate,
                });
            }
            if limits.max_orders_with_leverage_ratio > Decimal::ZERO {
                if let Some(snapshot) = snapshot.filter(|s| !s.orders.is_empty()) {
                    let ratio = Decimal::from(snapshot.leveraged_orders())
                        / Decimal::from(snapshot.orders.len());
                    if ratio > limits.max_orders_with_leverage_ratio {
                        return Err(RiskError::LeverageRatioExceeded {
                            ratio,
                            maximum: limits.max_orders_with_leverage_ratio,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_holding_ratio(
        &self,
        order: &OrderEvent,
        holdings: &[Holding],
        settings: &CurrencySettings,
    ) -> Result<(), RiskError> {
        let maximum = settings.max_holding_ratio;
        if maximum <= Decimal::ZERO || holdings.len() <= 1 {
            return Ok(());
        }
        let incoming = if order.direction.is_buy_side() {
            order.amount * order.close_price
        } else {
            Decimal::ZERO
        };
        let total: Decimal = holdings.iter().map(|h| h.base_value).sum::<Decimal>() + incoming;
        if total <= Decimal::ZERO {
            return Ok(());
        }
        let pair_value: Decimal = holdings
            .iter()
            .filter(|h| h.key == order.base.key)
            .map(|h| h.base_value)
            .sum::<Decimal>()
            + incoming;
        let ratio = pair_value / total;
        if ratio > maximum {
            return Err(RiskError::ExceedsHoldingRatio { ratio, maximum });
        }
        Ok(())
    }
}

impl RiskManager for RiskEvaluator {
    fn evaluate_order(
        &self,
        order: &OrderEvent,
        holdings: &[Holding],
        snapshot: Option<&Snapshot>,
        settings: &CurrencySettings,
    ) -> Result<(), RiskError> {
        self.check_leverage(order, snapshot, settings)?;
        self.check_holding_ratio(order, holdings, settings)?;
        Ok(())
    }
}
