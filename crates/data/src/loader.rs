use crate::candles::Candles;
use crate::error::DataError;
use chrono::{DateTime, NaiveDateTime, Utc};
use core_types::{Interval, Kline, PairKey};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// One CSV row. Values are read as text so decimals keep their exact precision.
#[derive(Debug, Deserialize)]
struct CsvCandle {
    open_time: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

/// Loads a candle series from a CSV file with the header
/// `open_time,open,high,low,close,volume`.
///
/// `open_time` may be RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), or a unix
/// timestamp in seconds or milliseconds.
pub fn load_csv(path: impl AsRef<Path>, key: PairKey, interval: Interval) -> Result<Candles, DataError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut klines = Vec::new();
    for (index, row) in reader.deserialize::<CsvCandle>().enumerate() {
        let row = row?;
        // The header occupies line 1.
        let line = index as u64 + 2;
        klines.push(parse_row(&row).map_err(|reason| DataError::InvalidRecord { line, reason })?);
    }
    tracing::info!(path = %path.display(), %key, candles = klines.len(), "candles loaded");
    Candles::from_klines(key, interval, &klines)
}

fn parse_row(row: &CsvCandle) -> Result<Kline, String> {
    let decimal = |name: &str, value: &str| {
        Decimal::from_str(value.trim()).map_err(|e| format!("{name} '{value}': {e}"))
    };
    Ok(Kline {
        open_time: parse_time(&row.open_time)?,
        open: decimal("open", &row.open)?,
        high: decimal("high", &row.high)?,
        low: decimal("low", &row.low)?,
        close: decimal("close", &row.close)?,
        volume: decimal("volume", &row.volume)?,
    })
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        let time = if n.abs() >= 100_000_000_000 {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        };
        return time.ok_or_else(|| format!("timestamp {n} out of range"));
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("open_time '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataHandler;
    use chrono::TimeZone;
    use core_types::{AssetKind, CurrencyPair};
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn key() -> PairKey {
        PairKey::new("binance", AssetKind::Spot, CurrencyPair::new("BTC", "USDT"))
    }

    #[test]
    fn loads_mixed_timestamp_formats() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "open_time,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,100,110,90,105.123456789,12.5").unwrap();
        writeln!(file, "2024-01-01 01:00:00,105,106,104,105,3").unwrap();
        writeln!(file, "1704074400000,105,107,100,101,4").unwrap();
        file.flush().unwrap();

        let mut candles = load_csv(file.path(), key(), Interval::hours(1)).unwrap();
        assert_eq!(candles.len(), 3);
        let first = candles.next().unwrap();
        assert_eq!(first.close, dec!(105.123456789));
        assert_eq!(first.base.time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            candles.events()[2].base.time,
            Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn bad_rows_report_their_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "open_time,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,100,110,90,105,1").unwrap();
        writeln!(file, "2024-01-01T01:00:00Z,abc,110,90,105,1").unwrap();
        file.flush().unwrap();

        let err = load_csv(file.path(), key(), Interval::hours(1)).unwrap_err();
        assert!(matches!(err, DataError::InvalidRecord { line: 3, .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_csv("/definitely/not/here.csv", key(), Interval::hours(1)).is_err());
    }
}
