use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A price observed at a point in the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: Decimal,
}

/// A fall from a running high to the lowest price before the next new high.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Swing {
    pub highest: PricePoint,
    pub lowest: PricePoint,
    /// Intervals between the high and the trough.
    pub intervals: usize,
    /// `(lowest - highest) / highest * 100`, never positive.
    pub percent: Decimal,
}

/// Every drawdown swing of a price series, plus its extremes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Drawdown {
    pub swings: Vec<Swing>,
    pub highest: Option<PricePoint>,
    pub lowest: Option<PricePoint>,
}

impl Drawdown {
    /// Scans `series` for swings. A close above the running high closes out the
    /// current swing, if it fell at all, and starts a new one. A still-open swing
    /// is closed at the end.
    pub fn scan(series: &[PricePoint]) -> Self {
        let Some(first) = series.first() else {
            return Self::default();
        };
        let mut drawdown = Self {
            swings: Vec::new(),
            highest: Some(*first),
            lowest: Some(*first),
        };
        let (mut high, mut low) = ((0, *first), (0, *first));

        for (index, point) in series.iter().enumerate().skip(1) {
            if point.price > high.1.price {
                drawdown.record(high, low);
                high = (index, *point);
                low = (index, *point);
            } else if point.price < low.1.price {
                low = (index, *point);
            }
            if drawdown.highest.is_some_and(|h| point.price > h.price) {
                drawdown.highest = Some(*point);
            }
            if drawdown.lowest.is_some_and(|l| point.price < l.price) {
                drawdown.lowest = Some(*point);
            }
        }
        drawdown.record(high, low);
        drawdown
    }

    fn record(&mut self, high: (usize, PricePoint), low: (usize, PricePoint)) {
        if low.1.price >= high.1.price || high.1.price.is_zero() {
            return;
        }
        self.swings.push(Swing {
            highest: high.1,
            lowest: low.1,
            intervals: low.0 - high.0,
            percent: (low.1.price - high.1.price) / high.1.price * Decimal::ONE_HUNDRED,
        });
    }

    /// The deepest swing. Ties keep the earliest.
    pub fn max(&self) -> Option<&Swing> {
        self.swings.iter().fold(None, |deepest: Option<&Swing>, swing| match deepest {
            Some(d) if d.percent <= swing.percent => Some(d),
            _ => Some(swing),
        })
    }

    /// The swing spanning the most intervals. Ties keep the earliest.
    pub fn longest(&self) -> Option<&Swing> {
        self.swings.iter().fold(None, |longest: Option<&Swing>, swing| match longest {
            Some(l) if l.intervals >= swing.intervals => Some(l),
            _ => Some(swing),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn series(prices: &[Decimal]) -> Vec<PricePoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| PricePoint {
                time: start + Duration::hours(i as i64),
                price: *price,
            })
            .collect()
    }

    #[test]
    fn deepest_swing_is_the_maximum() {
        let drawdown = Drawdown::scan(&series(&[dec!(100), dec!(90), dec!(95), dec!(80), dec!(120)]));
        assert_eq!(drawdown.swings.len(), 1);
        let max = drawdown.max().unwrap();
        assert_eq!(max.highest.price, dec!(100));
        assert_eq!(max.lowest.price, dec!(80));
        assert_eq!(max.percent, dec!(-20));
        assert_eq!(max.intervals, 3);
        assert_eq!(drawdown.highest.unwrap().price, dec!(120));
        assert_eq!(drawdown.lowest.unwrap().price, dec!(80));
    }

    #[test]
    fn open_swings_close_at_the_end() {
        let drawdown = Drawdown::scan(&series(&[
            dec!(100),
            dec!(95),
            dec!(110),
            dec!(100),
            dec!(99),
            dec!(55),
        ]));
        assert_eq!(drawdown.swings.len(), 2);
        assert_eq!(drawdown.max().unwrap().percent, dec!(-50));
        assert_eq!(drawdown.longest().unwrap().intervals, 3);
    }

    #[test]
    fn rising_series_has_no_drawdown() {
        let drawdown = Drawdown::scan(&series(&[dec!(1), dec!(2), dec!(3)]));
        assert!(drawdown.max().is_none());
        assert!(Drawdown::scan(&[]).highest.is_none());
    }
}
