use crate::error::StrategyError;
use crate::{IndicatorState, Strategy, base_signal, entry_direction, exit_direction};
use configuration::TopBottomParams;
use core_types::{Direction, PairKey};
use data::DataHandler;
use events::SignalEvent;
use funding::FundManager;
use portfolio::Portfolio;
use rust_decimal::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use ta::indicators::RateOfChange;

pub const NAME: &str = "top2bottom2";
pub const DESCRIPTION: &str =
    "Ranks every pair by momentum, buying the two strongest and selling the two weakest.";

/// The fewest pairs a ranking can be made from.
const MIN_PAIRS: usize = 4;

/// Cross-sectional momentum: a rate of change over `lookback` candles per pair,
/// compared across all pairs at the same step.
#[derive(Debug, Clone)]
pub struct TopBottom {
    params: TopBottomParams,
    max_missing_ratio: Decimal,
    states: HashMap<PairKey, IndicatorState<RateOfChange>>,
}

impl TopBottom {
    pub fn new(params: TopBottomParams, max_missing_ratio: Decimal) -> Result<Self, StrategyError> {
        if params.lookback == 0 {
            return Err(StrategyError::InvalidParameters(
                "momentum lookback must be positive".to_string(),
            ));
        }
        Ok(Self {
            params,
            max_missing_ratio,
            states: HashMap::new(),
        })
    }

    /// The pair's momentum once its history covers the lookback.
    fn momentum(&mut self, data: &dyn DataHandler) -> Result<Option<Decimal>, StrategyError> {
        let lookback = self.params.lookback;
        let state = match self.states.entry(data.key().clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let indicator = RateOfChange::new(lookback)
                    .map_err(|e| StrategyError::IndicatorError(e.to_string()))?;
                entry.insert(IndicatorState::new(indicator))
            }
        };
        let value = state.update(data)?;
        if data.history().len() <= lookback {
            return Ok(None);
        }
        value
            .and_then(Decimal::from_f64)
            .map(|m| Some(m.round_dp(4)))
            .ok_or_else(|| StrategyError::IndicatorError(format!("momentum {value:?} is not a number")))
    }
}

impl Strategy for TopBottom {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn supports_simultaneous(&self) -> bool {
        true
    }

    fn requires_simultaneous(&self) -> bool {
        true
    }

    fn on_signal(
        &mut self,
        _data: &dyn DataHandler,
        _funds: &FundManager,
        _portfolio: &Portfolio,
    ) -> Result<SignalEvent, StrategyError> {
        Err(StrategyError::SimultaneousOnly(NAME))
    }

    fn on_simultaneous_signals(
        &mut self,
        data: &[&dyn DataHandler],
        _funds: &FundManager,
        _portfolio: &Portfolio,
    ) -> Result<Vec<SignalEvent>, StrategyError> {
        if data.len() < MIN_PAIRS {
            return Err(StrategyError::InvalidParameters(format!(
                "{NAME} needs at least {MIN_PAIRS} pairs, got {}",
                data.len()
            )));
        }

        let mut signals = Vec::with_capacity(data.len());
        let mut ranked: Vec<(Decimal, SignalEvent)> = Vec::new();
        for handler in data {
            let mut signal = base_signal(*handler, self.max_missing_ratio)?;
            if signal.direction == Direction::MissingData {
                signals.push(signal);
                continue;
            }
            match self.momentum(*handler)? {
                Some(momentum) => ranked.push((momentum, signal)),
                None => {
                    signal.base.append_reason(format!(
                        "not enough data for a {}-candle momentum",
                        self.params.lookback
                    ));
                    signals.push(signal);
                }
            }
        }

        if ranked.len() < MIN_PAIRS {
            for (_, mut signal) in ranked {
                signal
                    .base
                    .append_reason(format!("fewer than {MIN_PAIRS} pairs could be ranked"));
                signals.push(signal);
            }
        } else {
            // Stable sort: equal momentum keeps input order.
            ranked.sort_by(|a, b| b.0.cmp(&a.0));
            let bottom = ranked.len() - 2;
            for (rank, (momentum, mut signal)) in ranked.into_iter().enumerate() {
                if rank < 2 {
                    signal.set_direction(entry_direction(&signal.base.key));
                    signal.base.append_reason(format!("momentum {momentum}% ranked in the top two"));
                } else if rank >= bottom {
                    signal.set_direction(exit_direction(&signal.base.key));
                    signal.base.append_reason(format!("momentum {momentum}% ranked in the bottom two"));
                } else {
                    signal.base.append_reason(format!("momentum {momentum}% ranked mid-table"));
                }
                signals.push(signal);
            }
        }

        signals.sort_by(|a, b| a.base.key.cmp(&b.base.key));
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candles, context, key, series};
    use data::Candles;
    use rust_decimal_macros::dec;

    fn params() -> TopBottomParams {
        TopBottomParams { lookback: 2 }
    }

    fn directions(signals: &[SignalEvent]) -> Vec<(String, Direction)> {
        signals
            .iter()
            .map(|s| (s.base.key.pair.base.clone(), s.direction))
            .collect()
    }

    #[test]
    fn buys_the_strongest_and_sells_the_weakest() {
        let (funds, portfolio) = context();
        let pairs: Vec<Candles> = vec![
            candles(key("AAA"), &series(&[100, 100, 130])),
            candles(key("BBB"), &series(&[100, 100, 90])),
            candles(key("CCC"), &series(&[100, 100, 120])),
            candles(key("DDD"), &series(&[100, 100, 101])),
            candles(key("EEE"), &series(&[100, 100, 80])),
        ];
        let views: Vec<&dyn DataHandler> = pairs.iter().map(|c| c as &dyn DataHandler).collect();
        let mut strategy = TopBottom::new(params(), dec!(0.5)).unwrap();
        let signals = strategy
            .on_simultaneous_signals(&views, &funds, &portfolio)
            .unwrap();

        assert_eq!(
            directions(&signals),
            vec![
                ("AAA".to_string(), Direction::Buy),
                ("BBB".to_string(), Direction::Sell),
                ("CCC".to_string(), Direction::Buy),
                ("DDD".to_string(), Direction::DoNothing),
                ("EEE".to_string(), Direction::Sell),
            ]
        );
    }

    #[test]
    fn short_histories_do_nothing() {
        let (funds, portfolio) = context();
        let pairs: Vec<Candles> = ["AAA", "BBB", "CCC", "DDD"]
            .iter()
            .map(|base| candles(key(base), &series(&[100, 110])))
            .collect();
        let views: Vec<&dyn DataHandler> = pairs.iter().map(|c| c as &dyn DataHandler).collect();
        let mut strategy = TopBottom::new(params(), dec!(0.5)).unwrap();
        let signals = strategy
            .on_simultaneous_signals(&views, &funds, &portfolio)
            .unwrap();
        assert!(signals.iter().all(|s| s.direction == Direction::DoNothing));
    }

    #[test]
    fn requires_enough_pairs_and_simultaneous_mode() {
        let (funds, portfolio) = context();
        let pair = candles(key("AAA"), &series(&[1, 2, 3]));
        let mut strategy = TopBottom::new(params(), dec!(0.5)).unwrap();
        assert!(matches!(
            strategy.on_signal(&pair, &funds, &portfolio),
            Err(StrategyError::SimultaneousOnly(_))
        ));
        assert!(matches!(
            strategy.on_simultaneous_signals(&[&pair], &funds, &portfolio),
            Err(StrategyError::InvalidParameters(_))
        ));
    }
}
