use crate::drawdown::{Drawdown, PricePoint};
use crate::error::AnalyticsError;
use crate::math;
use crate::summary::{PairSummary, Ratios};
use core_types::{Interval, PairKey};
use events::{DataEvent, Event, FillEvent, Holding, OrderEvent, SignalEvent, Snapshot};
use rust_decimal::Decimal;

/// Everything that happened to one pair at one offset.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub data: DataEvent,
    pub signal: Option<SignalEvent>,
    pub order: Option<OrderEvent>,
    pub fill: Option<FillEvent>,
    pub holding: Option<Holding>,
    pub snapshot: Option<Snapshot>,
}

impl EventRecord {
    fn new(data: DataEvent) -> Self {
        Self {
            data,
            signal: None,
            order: None,
            fill: None,
            holding: None,
            snapshot: None,
        }
    }

    pub fn offset(&self) -> u64 {
        self.data.base.offset
    }
}

/// The ordered event records of one pair.
#[derive(Debug, Clone)]
pub struct PairStatistic {
    key: PairKey,
    interval: Interval,
    records: Vec<EventRecord>,
}

impl PairStatistic {
    pub(crate) fn new(key: PairKey, interval: Interval) -> Self {
        Self {
            key,
            interval,
            records: Vec::new(),
        }
    }

    pub fn key(&self) -> &PairKey {
        &self.key
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Opens the record for a new offset. Offsets must strictly increase.
    pub(crate) fn open(&mut self, data: &DataEvent) -> Result<(), AnalyticsError> {
        let offset = data.base.offset;
        if self.records.last().is_some_and(|r| r.offset() >= offset) {
            return Err(AnalyticsError::AlreadyProcessed {
                key: self.key.clone(),
                offset,
            });
        }
        self.records.push(EventRecord::new(data.clone()));
        Ok(())
    }

    pub(crate) fn record_mut(&mut self, offset: u64) -> Result<&mut EventRecord, AnalyticsError> {
        match self.records.binary_search_by_key(&offset, |r| r.offset()) {
            Ok(index) => Ok(&mut self.records[index]),
            Err(_) => Err(AnalyticsError::NoEventAtOffset {
                key: self.key.clone(),
                offset,
            }),
        }
    }

    pub(crate) fn attach(&mut self, event: &Event) -> Result<(), AnalyticsError> {
        let record = self.record_mut(event.base().offset)?;
        match event {
            Event::Data(_) => {}
            Event::Signal(signal) => record.signal = Some(signal.clone()),
            Event::Order(order) => record.order = Some(order.clone()),
            Event::Fill(fill) => record.fill = Some(fill.clone()),
        }
        Ok(())
    }

    /// Derives the pair's summary. `risk_free_rate` is annual, as a fraction.
    pub fn calculate(&self, risk_free_rate: Decimal) -> Result<PairSummary, AnalyticsError> {
        let (Some(first), Some(last)) = (self.records.first(), self.records.last()) else {
            return Err(AnalyticsError::NotEnoughData(format!("no candles recorded for {}", self.key)));
        };
        let mut summary = PairSummary::new(self.key.clone());
        summary.events = self.records.len();
        summary.missing_candles = self.records.iter().filter(|r| r.data.missing).count();
        summary.start_time = Some(first.data.base.time);
        summary.end_time = Some(last.data.base.time);
        summary.initial_close = first.data.close;
        summary.final_close = last.data.close;
        if !first.data.close.is_zero() {
            summary.market_movement =
                (last.data.close - first.data.close) / first.data.close * Decimal::ONE_HUNDRED;
        }

        let closes: Vec<PricePoint> = self
            .records
            .iter()
            .map(|r| PricePoint {
                time: r.data.base.time,
                price: r.data.close,
            })
            .collect();
        let drawdown = Drawdown::scan(&closes);
        summary.max_drawdown = drawdown.max().cloned();
        summary.longest_drawdown = drawdown.longest().cloned();
        summary.highest_close = drawdown.highest.map(|p| p.price);
        summary.lowest_close = drawdown.lowest.map(|p| p.price);

        if let Some(snapshot) = self.records.iter().rev().find_map(|r| r.snapshot.as_ref()) {
            summary.total_orders = snapshot.orders.len();
            summary.buy_orders = snapshot.orders.iter().filter(|o| o.order.side.is_buy_side()).count();
            summary.sell_orders = snapshot.orders.iter().filter(|o| o.order.side.is_sell_side()).count();
        }

        let holdings: Vec<&Holding> = self.records.iter().filter_map(|r| r.holding.as_ref()).collect();
        let (Some(initial), Some(last_holding)) = (holdings.first(), holdings.last()) else {
            tracing::warn!(key = %self.key, "no holdings recorded, performance ratios skipped");
            return Ok(summary);
        };
        summary.initial_value = initial.total_initial_value;
        summary.final_value = last_holding.total_value;
        if !initial.total_initial_value.is_zero() {
            summary.strategy_movement = (last_holding.total_value - initial.total_initial_value)
                / initial.total_initial_value
                * Decimal::ONE_HUNDRED;
        }
        let pnl = pnl_series(&holdings);
        summary.high_pnl = pnl.iter().copied().max().unwrap_or_default();
        summary.low_pnl = pnl.iter().copied().min().unwrap_or_default();
        summary.total_fees = last_holding.total_fees;
        summary.value_lost_to_slippage = last_holding.value_lost_to_slippage;
        summary.value_lost_to_volume_sizing = last_holding.value_lost_to_volume_sizing;
        summary.final_holding = Some((*last_holding).clone());

        let per_year = self.interval.per_year();
        summary.cagr = math::cagr(
            initial.total_initial_value,
            last_holding.total_value,
            self.records.len(),
            per_year,
        );
        let risk_free = risk_free_rate * Decimal::ONE_HUNDRED / per_year;
        let (returns, benchmark) = self.return_series();
        let active: Vec<Decimal> = returns.iter().zip(&benchmark).map(|(r, b)| r - b).collect();
        let max_drawdown_percent = summary.max_drawdown.as_ref().map(|s| s.percent);

        if let (Some(average), Some(average_active)) = (math::mean(&returns), math::mean(&active)) {
            summary.arithmetic = Ratios {
                sharpe: math::sharpe(average, risk_free, &returns),
                sortino: math::sortino(average, risk_free, &returns),
                information: math::information(average_active, &active),
                calmar: math::calmar(summary.cagr, max_drawdown_percent),
            };
        }
        if let (Some(average), Some(benchmark_average)) =
            (math::geometric_mean(&returns), math::geometric_mean(&benchmark))
        {
            summary.geometric = Ratios {
                sharpe: math::sharpe(average, risk_free, &returns),
                sortino: math::sortino(average, risk_free, &returns),
                information: math::information(average - benchmark_average, &active),
                calmar: math::calmar(summary.cagr, max_drawdown_percent),
            };
        }
        Ok(summary)
    }

    /// Per-interval strategy returns alongside the market's, both in percent.
    ///
    /// Each return compares the final valuation of one candle with the final
    /// valuation of the candle before it, so a fill's own revaluation never
    /// hides the price move. Candles without a holding on either side are skipped.
    fn return_series(&self) -> (Vec<Decimal>, Vec<Decimal>) {
        let mut returns = Vec::new();
        let mut benchmark = Vec::new();
        for pair in self.records.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let (Some(before), Some(after)) = (&previous.holding, &current.holding) else {
                continue;
            };
            returns.push(if before.total_value.is_zero() {
                Decimal::ZERO
            } else {
                (after.total_value - before.total_value) / before.total_value * Decimal::ONE_HUNDRED
            });
            benchmark.push(if previous.data.close.is_zero() {
                Decimal::ZERO
            } else {
                (current.data.close - previous.data.close) / previous.data.close * Decimal::ONE_HUNDRED
            });
        }
        (returns, benchmark)
    }
}

/// Quote-value change from each holding to the next. The first holding is
/// measured against its initial valuation.
fn pnl_series(holdings: &[&Holding]) -> Vec<Decimal> {
    let mut previous = match holdings.first() {
        Some(first) => first.total_initial_value,
        None => return Vec::new(),
    };
    holdings
        .iter()
        .map(|h| {
            let change = h.total_value - previous;
            previous = h.total_value;
            change
        })
        .collect()
}
