use crate::error::StrategyError;
use crate::{IndicatorState, Strategy, base_signal, entry_direction, exit_direction};
use configuration::RsiParams;
use core_types::{Direction, PairKey};
use data::DataHandler;
use events::SignalEvent;
use funding::FundManager;
use portfolio::Portfolio;
use rust_decimal::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use ta::indicators::RelativeStrengthIndex;

pub const NAME: &str = "rsi";
pub const DESCRIPTION: &str =
    "Sells when the relative strength index reaches the high threshold and buys at the low one.";

/// A threshold strategy on the Relative Strength Index.
///
/// Each pair keeps its own indicator, fed once per candle. Gap-filled candles
/// are not fed.
#[derive(Debug, Clone)]
pub struct Rsi {
    params: RsiParams,
    max_missing_ratio: Decimal,
    states: HashMap<PairKey, IndicatorState<RelativeStrengthIndex>>,
}

impl Rsi {
    pub fn new(params: RsiParams, max_missing_ratio: Decimal) -> Result<Self, StrategyError> {
        if params.period == 0 {
            return Err(StrategyError::InvalidParameters(
                "RSI period must be positive".to_string(),
            ));
        }
        let bounds = Decimal::ZERO..=Decimal::ONE_HUNDRED;
        if !bounds.contains(&params.low) || !bounds.contains(&params.high) || params.low >= params.high {
            return Err(StrategyError::InvalidParameters(format!(
                "RSI thresholds must satisfy 0 <= low < high <= 100, got low {} high {}",
                params.low, params.high
            )));
        }
        Ok(Self {
            params,
            max_missing_ratio,
            states: HashMap::new(),
        })
    }

    fn state_for(&mut self, key: &PairKey) -> Result<&mut IndicatorState<RelativeStrengthIndex>, StrategyError> {
        match self.states.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let indicator = RelativeStrengthIndex::new(self.params.period)
                    .map_err(|e| StrategyError::IndicatorError(e.to_string()))?;
                Ok(entry.insert(IndicatorState::new(indicator)))
            }
        }
    }
}

impl Strategy for Rsi {
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
        if signal.direction == Direction::MissingData {
            return Ok(signal);
        }

        let value = self.state_for(data.key())?.update(data)?;

        if data.history().len() <= self.params.period {
            signal.base.append_reason(format!(
                "not enough data for a {}-period RSI",
                self.params.period
            ));
            return Ok(signal);
        }

        let rsi = value
            .and_then(Decimal::from_f64)
            .ok_or_else(|| StrategyError::IndicatorError(format!("RSI value {value:?} is not a number")))?
            .round_dp(2);
        signal.base.append_reason(format!("RSI at {rsi}"));
        if rsi >= self.params.high {
            signal.set_direction(exit_direction(&signal.base.key));
        } else if rsi <= self.params.low {
            signal.set_direction(entry_direction(&signal.base.key));
        }
        Ok(signal)
    }
}
