use crate::error::StrategyError;
use crate::{Strategy, base_signal, entry_direction};
use core_types::Direction;
use data::DataHandler;
use events::SignalEvent;
use funding::FundManager;
use portfolio::Portfolio;
use rust_decimal::Decimal;

pub const NAME: &str = "dollarcostaverage";
pub const DESCRIPTION: &str = "Buys on every candle, letting the sizer decide how much.";

/// Buys every interval.
#[derive(Debug, Clone)]
pub struct DollarCostAverage {
    max_missing_ratio: Decimal,
}

impl DollarCostAverage {
    pub fn new(max_missing_ratio: Decimal) -> Self {
        Self { max_missing_ratio }
    }
}

impl Strategy for DollarCostAverage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn supports_simultaneous(&self) -> bool {
        true
    }

    fn on_signal(
        &mut self,
        data: &dyn DataHandler,
        _funds: &FundManager,
        _portfolio: &Portfolio,
    ) -> Result<SignalEvent, StrategyError> {
        let mut signal = base_signal(data, self.max_missing_ratio)?;
        if signal.direction == Direction::DoNothing {
            signal.set_direction(entry_direction(&signal.base.key));
            signal.base.append_reason("dollar cost average purchase");
        }
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candles, context, key, series};
    use rust_decimal_macros::dec;

    #[test]
    fn buys_every_candle_but_not_gaps() {
        let (funds, portfolio) = context();
        let mut strategy = DollarCostAverage::new(dec!(0.5));

        let data = candles(key("BTC"), &series(&[1, 2, 3]));
        let signal = strategy.on_signal(&data, &funds, &portfolio).unwrap();
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.close_price, dec!(3));

        let gappy = candles(key("BTC"), &[Some(dec!(1)), None, Some(dec!(3)), None, Some(dec!(5))]);
        let mut data = gappy.clone();
        data.reset();
        data.next();
        data.next();
        let signal = strategy.on_signal(&data, &funds, &portfolio).unwrap();
        assert_eq!(signal.direction, Direction::MissingData);
    }

    #[test]
    fn too_much_bad_data_is_fatal() {
        let (funds, portfolio) = context();
        let mut strategy = DollarCostAverage::new(dec!(0.1));
        let mut closes = Vec::new();
        for i in 0..12 {
            closes.push(if i % 3 == 1 { None } else { Some(Decimal::from(i + 1)) });
        }
        let data = candles(key("BTC"), &closes);
        let err = strategy.on_signal(&data, &funds, &portfolio).unwrap_err();
        assert!(err.is_fatal());
    }
}
