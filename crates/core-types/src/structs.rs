use crate::enums::AssetKind;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A tradeable currency pair, e.g. `BTC-USDT`. Both legs are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Self {
        Self {
            base: base.as_ref().trim().to_uppercase(),
            quote: quote.as_ref().trim().to_uppercase(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = CoreError;

    /// Accepts `BTC-USDT`, `BTC/USDT` and `BTC_USDT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(['-', '/', '_']);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.trim().is_empty() && !quote.trim().is_empty() => {
                Ok(CurrencyPair::new(base, quote))
            }
            _ => Err(CoreError::InvalidInput("currency pair".to_string(), s.to_string())),
        }
    }
}

/// The value-type composite key identifying one simulated market:
/// (exchange, asset kind, base, quote).
///
/// Every per-market map in the workspace is keyed by this type. Exchange names are
/// lower-cased on construction so lookups never depend on caller casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub exchange: String,
    pub asset: AssetKind,
    pub pair: CurrencyPair,
}

impl PairKey {
    pub fn new(exchange: impl AsRef<str>, asset: AssetKind, pair: CurrencyPair) -> Self {
        Self {
            exchange: exchange.as_ref().trim().to_lowercase(),
            asset,
            pair,
        }
    }

    pub fn base(&self) -> &str {
        &self.pair.base
    }

    pub fn quote(&self) -> &str {
        &self.pair.quote
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.exchange, self.asset, self.pair)
    }
}

/// A raw OHLCV candle as delivered by a data source, before it becomes an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Kline {
    /// Checks the candle is internally consistent (low <= open/close <= high, no negatives).
    pub fn validate(&self) -> Result<(), CoreError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| p.is_sign_negative()) || self.volume.is_sign_negative() {
            return Err(CoreError::InvalidInput(
                "kline".to_string(),
                format!("negative value in candle at {}", self.open_time),
            ));
        }
        if self.low > self.high
            || self.open > self.high
            || self.close > self.high
            || self.open < self.low
            || self.close < self.low
        {
            return Err(CoreError::InvalidInput(
                "kline".to_string(),
                format!("prices outside the high/low band at {}", self.open_time),
            ));
        }
        Ok(())
    }
}
