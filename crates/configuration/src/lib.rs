//! # Meridian Configuration
//!
//! Loads and validates the run configuration: the markets to simulate, their
//! fees and sizing limits, the funding layout, the strategy selection and the
//! ambient logging and live-polling settings.
//!
//! ## Public API
//!
//! - `load_config`: reads a TOML file, applies `MERIDIAN__`-prefixed environment
//!   overrides and validates the result.
//! - `load_config_str`: the same pipeline over an in-memory TOML document.
//! - `logging::init_tracing`: installs the global `tracing` subscriber.

use config::{Environment, File, FileFormat};
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{
    Config, CurrencySettings, FundingItemSettings, FundingSettings, LeverageSettings,
    LiveSettings, LoggingSettings, MinMax, PortfolioSettings, RsiParams, RunSettings,
    SlippageKind, StatisticsSettings, StrategySettings, TopBottomParams,
};

const ENV_PREFIX: &str = "MERIDIAN";
const ENV_SEPARATOR: &str = "__";

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
}

/// Loads the run configuration from a TOML file.
///
/// Environment variables such as `MERIDIAN__RUN__SLIPPAGE=none` override file values.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
        .add_source(environment())
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;
    tracing::debug!(nickname = %config.nickname, pairs = config.currencies.len(), "configuration loaded");
    Ok(config)
}

/// Parses and validates a TOML document without touching the filesystem or environment.
pub fn load_config_str(toml: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?;
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::AssetKind;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use std::time::Duration;

    const BASE: &str = r#"
nickname = "dca-test"

[run]
interval = "1d"
slippage = "fixed"

[strategy]
name = "dollarcostaverage"

[[currencies]]
exchange = "Binance"
asset = "spot"
base = "btc"
quote = "usdt"
initial_quote_funds = "10000"
taker_fee = "0.001"
min_slippage = "0"
max_slippage = "0.01"

[currencies.buy_side]
maximum_size = "1"

[live]
poll_interval = "30s"
"#;

    #[test]
    fn parses_a_complete_document() {
        let config = load_config_str(BASE).unwrap();
        assert_eq!(config.nickname, "dca-test");
        assert_eq!(config.run.slippage, SlippageKind::Fixed);
        assert_eq!(config.run.interval.to_string(), "1d");
        let currency = &config.currencies[0];
        assert_eq!(currency.key().exchange, "binance");
        assert_eq!(currency.asset, AssetKind::Spot);
        assert_eq!(currency.buy_side.maximum_size, dec!(1));
        assert_eq!(currency.collateral_weight, dec!(1));
        assert_eq!(config.strategy.rsi.period, 14);
        let live = config.live.unwrap();
        assert_eq!(live.poll_interval, Duration::from_secs(30));
        assert_eq!(live.data_timeout, Duration::from_secs(300));
    }

    #[test]
    fn rejects_duplicate_pairs() {
        let doubled = format!(
            "{BASE}\n[[currencies]]\nexchange = \"binance\"\nasset = \"spot\"\nbase = \"BTC\"\nquote = \"USDT\"\n"
        );
        let err = load_config_str(&doubled).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn rejects_inverted_slippage_bounds() {
        let bad = BASE.replace("min_slippage = \"0\"", "min_slippage = \"0.05\"");
        assert!(matches!(
            load_config_str(&bad),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn exchange_level_funding_needs_items() {
        let shared = format!(
            "{BASE}\n[funding]\nuse_exchange_level_funding = true\n"
        )
        .replace("name = \"dollarcostaverage\"", "name = \"dollarcostaverage\"\nsimultaneous_signal_processing = true");
        let err = load_config_str(&shared).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("no exchange level funding item")));
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(BASE.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.currencies.len(), 1);
    }
}
