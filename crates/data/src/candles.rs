use crate::DataHandler;
use crate::error::DataError;
use core_types::{Interval, Kline, PairKey};
use events::DataEvent;

/// An in-memory candle series for one pair, read forward through a cursor.
///
/// Gaps between consecutive candles are filled with flat `missing` candles at the
/// previous close so every interval in the series has exactly one event.
#[derive(Debug, Clone)]
pub struct Candles {
    key: PairKey,
    interval: Interval,
    events: Vec<DataEvent>,
    cursor: usize,
}

impl Candles {
    pub fn new(key: PairKey, interval: Interval) -> Self {
        Self {
            key,
            interval,
            events: Vec::new(),
            cursor: 0,
        }
    }

    pub fn from_klines(key: PairKey, interval: Interval, klines: &[Kline]) -> Result<Self, DataError> {
        if klines.is_empty() {
            return Err(DataError::Empty(key.to_string()));
        }
        let mut candles = Self::new(key, interval);
        candles.append(klines)?;
        Ok(candles)
    }

    /// Every loaded candle, including those not yet read.
    pub fn events(&self) -> &[DataEvent] {
        &self.events
    }

    fn next_offset(&self) -> u64 {
        self.events.len() as u64 + 1
    }
}

impl DataHandler for Candles {
    fn key(&self) -> &PairKey {
        &self.key
    }

    fn interval(&self) -> Interval {
        self.interval
    }

    fn next(&mut self) -> Option<DataEvent> {
        let event = self.events.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(event)
    }

    fn has_next(&self) -> bool {
        self.cursor < self.events.len()
    }

    fn latest(&self) -> Option<&DataEvent> {
        self.cursor.checked_sub(1).and_then(|i| self.events.get(i))
    }

    fn history(&self) -> &[DataEvent] {
        &self.events[..self.cursor]
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Sorts and de-duplicates `klines`, drops any at or before the last loaded
    /// candle, and fills interval gaps before appending.
    fn append(&mut self, klines: &[Kline]) -> Result<usize, DataError> {
        let mut sorted = klines.to_vec();
        sorted.sort_by_key(|k| k.open_time);
        sorted.dedup_by_key(|k| k.open_time);

        let step = self.interval.duration();
        let mut added = 0;
        for kline in &sorted {
            if let Some(last_time) = self.events.last().map(|e| e.base.time) {
                if kline.open_time <= last_time {
                    continue;
                }
                let mut expected = last_time + step;
                while expected < kline.open_time {
                    let offset = self.next_offset();
                    let Some(filler) = self
                        .events
                        .last()
                        .map(|previous| DataEvent::gap_fill(previous, offset, expected))
                    else {
                        break;
                    };
                    tracing::debug!(key = %self.key, time = %expected, "gap filled");
                    self.events.push(filler);
                    expected += step;
                    added += 1;
                }
            }
            let event =
                DataEvent::from_kline(self.next_offset(), self.key.clone(), self.interval, kline)?;
            self.events.push(event);
            added += 1;
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use core_types::{AssetKind, CurrencyPair};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn key() -> PairKey {
        PairKey::new("binance", AssetKind::Spot, CurrencyPair::new("BTC", "USDT"))
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn kline(hour: i64, close: Decimal) -> Kline {
        Kline {
            open_time: start() + Duration::hours(hour),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(10),
        }
    }

    #[test]
    fn gaps_are_filled_with_the_previous_close() {
        let candles = Candles::from_klines(
            key(),
            Interval::hours(1),
            &[kline(0, dec!(100)), kline(3, dec!(130)), kline(1, dec!(110))],
        )
        .unwrap();

        let closes: Vec<Decimal> = candles.events().iter().map(|e| e.close).collect();
        assert_eq!(closes, vec![dec!(100), dec!(110), dec!(110), dec!(130)]);
        assert!(candles.events()[2].missing);
        assert_eq!(candles.events()[2].volume, dec!(0));
        let offsets: Vec<u64> = candles.events().iter().map(|e| e.base.offset).collect();
        assert_eq!(offsets, vec![1, 2, 3, 4]);
    }

    #[test]
    fn cursor_bounds_history() {
        let mut candles = Candles::from_klines(
            key(),
            Interval::hours(1),
            &[kline(0, dec!(1)), kline(1, dec!(2)), kline(2, dec!(3))],
        )
        .unwrap();
        assert!(candles.latest().is_none());

        candles.next();
        candles.next();
        assert_eq!(candles.latest().unwrap().close, dec!(2));
        assert_eq!(candles.stream_close(), vec![dec!(1), dec!(2)]);
        assert_eq!(candles.history_window(1).len(), 1);
        assert_eq!(candles.history_window(10).len(), 2);

        candles.next();
        assert!(candles.next().is_none());
        candles.reset();
        assert!(candles.has_next());
        assert!(candles.history().is_empty());
    }

    #[test]
    fn append_skips_stale_candles() {
        let mut candles =
            Candles::from_klines(key(), Interval::hours(1), &[kline(0, dec!(1))]).unwrap();
        assert_eq!(candles.append(&[kline(0, dec!(5))]).unwrap(), 0);
        assert_eq!(candles.append(&[kline(1, dec!(2))]).unwrap(), 1);
        assert_eq!(candles.len(), 2);
    }

    #[test]
    fn empty_and_invalid_input() {
        assert!(matches!(
            Candles::from_klines(key(), Interval::hours(1), &[]),
            Err(DataError::Empty(_))
        ));
        let mut bad = kline(0, dec!(10));
        bad.high = dec!(5);
        assert!(matches!(
            Candles::from_klines(key(), Interval::hours(1), &[bad]),
            Err(DataError::Event(_))
        ));
    }
}
