use crate::error::CoreError;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

/// The duration of one candle.
///
/// Serialized as a short string (`"1m"`, `"15m"`, `"1h"`, `"4h"`, `"1d"`, `"1w"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval(Duration);

impl Interval {
    pub fn new(duration: Duration) -> Result<Self, CoreError> {
        if duration <= Duration::zero() {
            return Err(CoreError::InvalidInput(
                "interval".to_string(),
                "duration must be positive".to_string(),
            ));
        }
        Ok(Self(duration))
    }

    pub fn minutes(n: i64) -> Self {
        Self(Duration::minutes(n.max(1)))
    }

    pub fn hours(n: i64) -> Self {
        Self(Duration::hours(n.max(1)))
    }

    pub fn days(n: i64) -> Self {
        Self(Duration::days(n.max(1)))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// How many intervals fit into a 365-day year.
    pub fn per_year(&self) -> Decimal {
        Decimal::from(SECONDS_PER_YEAR) / Decimal::from(self.0.num_seconds().max(1))
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::hours(1)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.num_seconds();
        if secs % 604_800 == 0 {
            write!(f, "{}w", secs / 604_800)
        } else if secs % 86_400 == 0 {
            write!(f, "{}d", secs / 86_400)
        } else if secs % 3_600 == 0 {
            write!(f, "{}h", secs / 3_600)
        } else if secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl FromStr for Interval {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || CoreError::InvalidInput("interval".to_string(), s.to_string());
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (digits, unit) = trimmed.split_at(split);
        let n: i64 = digits.parse().map_err(|_| invalid())?;
        let duration = match unit {
            "s" => Duration::seconds(n),
            "m" => Duration::minutes(n),
            "h" => Duration::hours(n),
            "d" => Duration::days(n),
            "w" => Duration::weeks(n),
            _ => return Err(invalid()),
        };
        Interval::new(duration)
    }
}

impl TryFrom<String> for Interval {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_and_displays() {
        let interval: Interval = "4h".parse().unwrap();
        assert_eq!(interval.duration(), Duration::hours(4));
        assert_eq!(interval.to_string(), "4h");
        assert_eq!("1d".parse::<Interval>().unwrap().to_string(), "1d");
        assert!("0h".parse::<Interval>().is_err());
        assert!("h".parse::<Interval>().is_err());
        assert!("5y".parse::<Interval>().is_err());
    }

    #[test]
    fn per_year_for_daily_candles() {
        assert_eq!(Interval::days(1).per_year(), dec!(365));
        assert_eq!(Interval::hours(1).per_year(), dec!(8760));
    }

    #[test]
    fn serde_round_trips_as_string() {
        let json = serde_json::to_string(&Interval::minutes(15)).unwrap();
        assert_eq!(json, "\"15m\"");
        let back: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Interval::minutes(15));
    }
}
