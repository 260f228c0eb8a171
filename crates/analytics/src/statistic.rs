use crate::error::AnalyticsError;
use crate::record::PairStatistic;
use crate::summary::{FundingSummary, RunSummary};
use core_types::PairKey;
use events::{DataEvent, Event, FillEvent, Holding, Snapshot};
use funding::{FundingReport, FundingSnapshot};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Accumulates every event of a run, per pair and per offset, and derives the
/// run's statistics at the end.
///
/// Pairs are reported in the order their first candle arrived.
#[derive(Debug, Clone)]
pub struct Statistic {
    strategy: String,
    risk_free_rate: Decimal,
    order: Vec<PairKey>,
    pairs: HashMap<PairKey, PairStatistic>,
}

impl Statistic {
    /// `risk_free_rate` is annual, as a fraction.
    pub fn new(strategy: impl Into<String>, risk_free_rate: Decimal) -> Self {
        Self {
            strategy: strategy.into(),
            risk_free_rate,
            order: Vec::new(),
            pairs: HashMap::new(),
        }
    }

    /// Opens the record for a new candle.
    pub fn setup_event_for_time(&mut self, data: &DataEvent) -> Result<(), AnalyticsError> {
        let key = &data.base.key;
        if !self.pairs.contains_key(key) {
            self.order.push(key.clone());
            self.pairs
                .insert(key.clone(), PairStatistic::new(key.clone(), data.base.interval));
        }
        match self.pairs.get_mut(key) {
            Some(pair) => pair.open(data),
            None => Err(AnalyticsError::NoEventAtOffset {
                key: key.clone(),
                offset: data.base.offset,
            }),
        }
    }

    /// Records `event` against its pair and offset. A data event opens the offset;
    /// any other event attaches to an offset that is already open.
    pub fn set_event_for_offset(&mut self, event: &Event) -> Result<(), AnalyticsError> {
        if let Event::Data(data) = event {
            return self.setup_event_for_time(data);
        }
        self.pair_mut(&event.base().key, event.base().offset)?.attach(event)
    }

    /// The latest holding for an offset replaces any earlier one.
    pub fn add_holdings(&mut self, holding: &Holding) -> Result<(), AnalyticsError> {
        self.pair_mut(&holding.key, holding.offset)?
            .record_mut(holding.offset)?
            .holding = Some(holding.clone());
        Ok(())
    }

    pub fn add_compliance_snapshot(
        &mut self,
        snapshot: &Snapshot,
        fill: &FillEvent,
    ) -> Result<(), AnalyticsError> {
        let record = self
            .pair_mut(&fill.base.key, fill.base.offset)?
            .record_mut(fill.base.offset)?;
        record.snapshot = Some(snapshot.clone());
        record.fill = Some(fill.clone());
        Ok(())
    }

    pub fn pair(&self, key: &PairKey) -> Option<&PairStatistic> {
        self.pairs.get(key)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &PairStatistic> {
        self.order.iter().filter_map(|key| self.pairs.get(key))
    }

    /// Derives every pair's statistics, the cross-pair leaders and the
    /// ledger-wide results.
    pub fn calculate_all(
        &self,
        funding: &FundingReport,
        funding_snapshots: &[FundingSnapshot],
    ) -> Result<RunSummary, AnalyticsError> {
        let pairs = self
            .pairs()
            .map(|pair| pair.calculate(self.risk_free_rate))
            .collect::<Result<Vec<_>, _>>()?;
        let summary = RunSummary::new(
            self.strategy.clone(),
            pairs,
            FundingSummary::new(funding, funding_snapshots),
        );
        tracing::debug!(pairs = summary.pairs.len(), "statistics calculated");
        Ok(summary)
    }

    fn pair_mut(&mut self, key: &PairKey, offset: u64) -> Result<&mut PairStatistic, AnalyticsError> {
        self.pairs
            .get_mut(key)
            .ok_or_else(|| AnalyticsError::NoEventAtOffset {
                key: key.clone(),
                offset,
            })
    }
}
