use crate::error::ConfigError;
use core_types::{AssetKind, CurrencyPair, Interval, PairKey};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for a simulation run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// A short name for the run, shown in logs and the summary table.
    pub nickname: String,
    #[serde(default)]
    pub run: RunSettings,
    pub strategy: StrategySettings,
    #[serde(default)]
    pub funding: FundingSettings,
    pub currencies: Vec<CurrencySettings>,
    #[serde(default)]
    pub portfolio: PortfolioSettings,
    #[serde(default)]
    pub statistics: StatisticsSettings,
    #[serde(default)]
    pub live: Option<LiveSettings>,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Parameters for the simulation loop and the exchange simulator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunSettings {
    #[serde(default)]
    pub interval: Interval,
    #[serde(default)]
    pub slippage: SlippageKind,
    /// Seed for the random slippage model. A fixed seed makes runs reproducible.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            interval: Interval::default(),
            slippage: SlippageKind::default(),
            seed: None,
        }
    }
}

/// Which slippage model the exchange simulator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum SlippageKind {
    None,
    Fixed,
    #[default]
    Random,
    OrderBook,
}

/// Selects the strategy and carries the parameter sets of the built-in strategies.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategySettings {
    pub name: String,
    #[serde(default)]
    pub simultaneous_signal_processing: bool,
    /// Fraction of synthesised candles a strategy tolerates before it refuses to trade.
    #[serde(default = "default_max_missing_data_ratio")]
    pub max_missing_data_ratio: Decimal,
    #[serde(default)]
    pub rsi: RsiParams,
    #[serde(default)]
    pub top_bottom: TopBottomParams,
}

fn default_max_missing_data_ratio() -> Decimal {
    dec!(0.1)
}

/// Parameters for the RSI threshold strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RsiParams {
    pub period: usize,
    pub high: Decimal,
    pub low: Decimal,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            period: 14,
            high: dec!(70),
            low: dec!(30),
        }
    }
}

/// Parameters for the top-two/bottom-two momentum ranking strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopBottomParams {
    /// Number of candles the rate of change is measured over.
    pub lookback: usize,
}

impl Default for TopBottomParams {
    fn default() -> Self {
        Self { lookback: 10 }
    }
}

/// Funding ledger layout.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FundingSettings {
    /// When enabled, pairs on the same exchange share funding items listed in `items`.
    #[serde(default)]
    pub use_exchange_level_funding: bool,
    #[serde(default)]
    pub items: Vec<FundingItemSettings>,
}

/// One exchange-level funding item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FundingItemSettings {
    pub exchange: String,
    pub asset: AssetKind,
    pub currency: String,
    pub initial_funds: Decimal,
    #[serde(default)]
    pub transfer_fee: Decimal,
}

/// Minimum, maximum and total-spend constraints for one side of the book.
///
/// A maximum of zero means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct MinMax {
    #[serde(default)]
    pub minimum_size: Decimal,
    #[serde(default)]
    pub maximum_size: Decimal,
    #[serde(default)]
    pub maximum_total: Decimal,
}

impl MinMax {
    fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if self.minimum_size < Decimal::ZERO
            || self.maximum_size < Decimal::ZERO
            || self.maximum_total < Decimal::ZERO
        {
            return Err(ConfigError::ValidationError(format!(
                "{label}: sizes must not be negative"
            )));
        }
        if self.maximum_size > Decimal::ZERO && self.minimum_size > self.maximum_size {
            return Err(ConfigError::ValidationError(format!(
                "{label}: minimum_size {} exceeds maximum_size {}",
                self.minimum_size, self.maximum_size
            )));
        }
        Ok(())
    }
}

/// Leverage rules, used both per pair and portfolio-wide.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LeverageSettings {
    #[serde(default)]
    pub can_use_leverage: bool,
    /// Maximum fraction of orders that may carry leverage. Zero disables the check.
    #[serde(default)]
    pub max_orders_with_leverage_ratio: Decimal,
    /// Maximum leverage a single order may carry. Zero disables the check.
    #[serde(default)]
    pub max_leverage_rate: Decimal,
    /// The leverage applied to orders for this pair.
    #[serde(default = "one")]
    pub order_leverage: Decimal,
}

fn one() -> Decimal {
    Decimal::ONE
}

impl Default for LeverageSettings {
    fn default() -> Self {
        Self {
            can_use_leverage: false,
            max_orders_with_leverage_ratio: Decimal::ZERO,
            max_leverage_rate: Decimal::ZERO,
            order_leverage: Decimal::ONE,
        }
    }
}

/// Everything the engine needs to know about one simulated market.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurrencySettings {
    pub exchange: String,
    pub asset: AssetKind,
    pub base: String,
    pub quote: String,
    #[serde(default)]
    pub initial_base_funds: Decimal,
    #[serde(default)]
    pub initial_quote_funds: Decimal,
    #[serde(default)]
    pub maker_fee: Decimal,
    #[serde(default)]
    pub taker_fee: Decimal,
    #[serde(default)]
    pub buy_side: MinMax,
    #[serde(default)]
    pub sell_side: MinMax,
    /// Bounds of the slippage rate, as fractions (0.01 = 1%).
    #[serde(default)]
    pub min_slippage: Decimal,
    #[serde(default)]
    pub max_slippage: Decimal,
    #[serde(default)]
    pub skip_candle_volume_check: bool,
    #[serde(default)]
    pub leverage: LeverageSettings,
    /// Maximum share of total base size this pair may hold. Zero disables the check.
    #[serde(default)]
    pub max_holding_ratio: Decimal,
    /// Weighting applied to collateral when sizing two-legged orders.
    #[serde(default = "one")]
    pub collateral_weight: Decimal,
    /// CSV file with this pair's candles.
    #[serde(default)]
    pub data_file: Option<PathBuf>,
}

impl CurrencySettings {
    pub fn key(&self) -> PairKey {
        PairKey::new(
            &self.exchange,
            self.asset,
            CurrencyPair::new(&self.base, &self.quote),
        )
    }

    /// The fee rate charged on market orders.
    pub fn fee_rate(&self) -> Decimal {
        self.taker_fee
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let key = self.key();
        let fail = |msg: String| Err(ConfigError::ValidationError(format!("{key}: {msg}")));
        if self.exchange.trim().is_empty() || self.base.trim().is_empty() || self.quote.trim().is_empty() {
            return fail("exchange, base and quote must be set".to_string());
        }
        if self.initial_base_funds < Decimal::ZERO || self.initial_quote_funds < Decimal::ZERO {
            return fail("initial funds must not be negative".to_string());
        }
        for (label, fee) in [("maker_fee", self.maker_fee), ("taker_fee", self.taker_fee)] {
            if fee < Decimal::ZERO || fee >= Decimal::ONE {
                return fail(format!("{label} {fee} must be within [0, 1)"));
            }
        }
        if self.min_slippage < Decimal::ZERO || self.max_slippage >= Decimal::ONE {
            return fail("slippage must be within [0, 1)".to_string());
        }
        if self.min_slippage > self.max_slippage {
            return fail(format!(
                "min_slippage {} exceeds max_slippage {}",
                self.min_slippage, self.max_slippage
            ));
        }
        if self.max_holding_ratio < Decimal::ZERO || self.max_holding_ratio > Decimal::ONE {
            return fail("max_holding_ratio must be within [0, 1]".to_string());
        }
        if self.collateral_weight <= Decimal::ZERO || self.collateral_weight > Decimal::ONE {
            return fail("collateral_weight must be within (0, 1]".to_string());
        }
        if self.leverage.order_leverage < Decimal::ONE {
            return fail("order_leverage must be at least 1".to_string());
        }
        self.buy_side.validate(&format!("{key} buy_side"))?;
        self.sell_side.validate(&format!("{key} sell_side"))?;
        Ok(())
    }
}

/// Portfolio-wide sizing and leverage constraints, applied on top of per-pair settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PortfolioSettings {
    #[serde(default)]
    pub leverage: LeverageSettings,
    #[serde(default)]
    pub buy_side: MinMax,
    #[serde(default)]
    pub sell_side: MinMax,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatisticsSettings {
    /// Annual risk-free rate, as a fraction (0.03 = 3%).
    #[serde(default)]
    pub risk_free_rate: Decimal,
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: Decimal::ZERO,
        }
    }
}

/// Polling behaviour for live mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LiveSettings {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// The run aborts when no new candle arrives within this window.
    #[serde(with = "humantime_serde", default = "default_data_timeout")]
    pub data_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_data_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            data_timeout: default_data_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
        }
    }
}

impl Config {
    /// Checks cross-field rules the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nickname.trim().is_empty() {
            return Err(ConfigError::ValidationError("nickname must not be empty".to_string()));
        }
        if self.strategy.name.trim().is_empty() {
            return Err(ConfigError::ValidationError("strategy.name must not be empty".to_string()));
        }
        if self.strategy.max_missing_data_ratio < Decimal::ZERO
            || self.strategy.max_missing_data_ratio > Decimal::ONE
        {
            return Err(ConfigError::ValidationError(
                "strategy.max_missing_data_ratio must be within [0, 1]".to_string(),
            ));
        }
        if self.currencies.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[currencies]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for currency in &self.currencies {
            currency.validate()?;
            if !seen.insert(currency.key()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate currency settings for {}",
                    currency.key()
                )));
            }
        }

        self.portfolio.buy_side.validate("portfolio buy_side")?;
        self.portfolio.sell_side.validate("portfolio sell_side")?;

        if self.funding.use_exchange_level_funding {
            if !self.strategy.simultaneous_signal_processing {
                return Err(ConfigError::ValidationError(
                    "exchange level funding requires simultaneous_signal_processing".to_string(),
                ));
            }
            let mut items = HashSet::new();
            for item in &self.funding.items {
                if item.initial_funds < Decimal::ZERO || item.transfer_fee < Decimal::ZERO {
                    return Err(ConfigError::ValidationError(format!(
                        "funding item {} {}: funds and fees must not be negative",
                        item.exchange, item.currency
                    )));
                }
                let id = (
                    item.exchange.to_lowercase(),
                    item.asset,
                    item.currency.to_uppercase(),
                );
                if !items.insert(id) {
                    return Err(ConfigError::ValidationError(format!(
                        "duplicate funding item {} {} {}",
                        item.exchange, item.asset, item.currency
                    )));
                }
            }
            for currency in &self.currencies {
                let key = currency.key();
                for code in [key.base(), key.quote()] {
                    if !items.contains(&(key.exchange.clone(), key.asset, code.to_string())) {
                        return Err(ConfigError::ValidationError(format!(
                            "{key}: no exchange level funding item for {code}"
                        )));
                    }
                }
            }
        }

        if let Some(live) = &self.live {
            if live.poll_interval.is_zero() || live.data_timeout.is_zero() {
                return Err(ConfigError::ValidationError(
                    "live poll_interval and data_timeout must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn currency(&self, key: &PairKey) -> Option<&CurrencySettings> {
        self.currencies.iter().find(|c| &c.key() == key)
    }
}
