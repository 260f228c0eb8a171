use crate::error::StrategyError;
use crate::{Strategy, dollar_cost_average, rsi, top_bottom};
use crate::{DollarCostAverage, Rsi, TopBottom};
use configuration::StrategySettings;

/// Every built-in strategy as `(name, description)`.
pub const STRATEGIES: &[(&str, &str)] = &[
    (dollar_cost_average::NAME, dollar_cost_average::DESCRIPTION),
    (rsi::NAME, rsi::DESCRIPTION),
    (top_bottom::NAME, top_bottom::DESCRIPTION),
];

/// Creates a new strategy instance by name, configured from `settings`.
///
/// Names are matched case-insensitively. The strategy must agree with the
/// configured processing mode: a strategy that cannot rank pairs together is
/// refused for simultaneous processing, and a ranking strategy is refused for
/// per-pair processing.
pub fn create_strategy(
    name: &str,
    settings: &StrategySettings,
) -> Result<Box<dyn Strategy>, StrategyError> {
    let ratio = settings.max_missing_data_ratio;
    let strategy: Box<dyn Strategy> = match name.trim().to_lowercase().as_str() {
        dollar_cost_average::NAME => Box::new(DollarCostAverage::new(ratio)),
        rsi::NAME => Box::new(Rsi::new(settings.rsi.clone(), ratio)?),
        top_bottom::NAME => Box::new(TopBottom::new(settings.top_bottom.clone(), ratio)?),
        _ => return Err(StrategyError::StrategyNotFound(name.to_string())),
    };

    if settings.simultaneous_signal_processing && !strategy.supports_simultaneous() {
        return Err(StrategyError::SimultaneousUnsupported(strategy.name()));
    }
    if !settings.simultaneous_signal_processing && strategy.requires_simultaneous() {
        return Err(StrategyError::SimultaneousOnly(strategy.name()));
    }
    tracing::debug!(strategy = strategy.name(), "strategy created");
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::{RsiParams, TopBottomParams};
    use rust_decimal_macros::dec;

    fn settings(simultaneous: bool) -> StrategySettings {
        StrategySettings {
            name: String::new(),
            simultaneous_signal_processing: simultaneous,
            max_missing_data_ratio: dec!(0.1),
            rsi: RsiParams::default(),
            top_bottom: TopBottomParams::default(),
        }
    }

    #[test]
    fn builds_every_registered_strategy() {
        for (name, _) in STRATEGIES {
            let simultaneous = *name == top_bottom::NAME;
            let strategy = create_strategy(name, &settings(simultaneous)).unwrap();
            assert_eq!(strategy.name(), *name);
        }
        assert_eq!(
            create_strategy(" RSI ", &settings(false)).unwrap().name(),
            rsi::NAME
        );
    }

    #[test]
    fn unknown_names_and_mode_mismatches_fail() {
        assert!(matches!(
            create_strategy("martingale", &settings(false)),
            Err(StrategyError::StrategyNotFound(_))
        ));
        assert!(matches!(
            create_strategy(top_bottom::NAME, &settings(false)),
            Err(StrategyError::SimultaneousOnly(_))
        ));
    }
}
