use chrono::{DateTime, Utc};
use core_types::PairKey;
use events::{Snapshot, SnapshotOrder};
use std::collections::BTreeMap;

/// Keeps, per pair, a cumulative record of every order placed.
///
/// Each snapshot lists all orders up to and including its time. An order at the
/// time of the latest snapshot extends that snapshot; any other time appends a
/// new one carrying the previous orders forward.
#[derive(Debug, Default, Clone)]
pub struct ComplianceManager {
    snapshots: BTreeMap<PairKey, Vec<Snapshot>>,
}

impl ComplianceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_order(
        &mut self,
        key: &PairKey,
        offset: u64,
        time: DateTime<Utc>,
        order: SnapshotOrder,
    ) -> &Snapshot {
        let series = self.snapshots.entry(key.clone()).or_default();
        let extends_latest = series.last().is_some_and(|last| last.time == time);
        if extends_latest {
            if let Some(last) = series.last_mut() {
                last.orders.push(order);
            }
        } else {
            let mut orders = series.last().map(|s| s.orders.clone()).unwrap_or_default();
            orders.push(order);
            series.push(Snapshot {
                offset,
                time,
                orders,
            });
        }
        &series[series.len() - 1]
    }

    pub fn latest(&self, key: &PairKey) -> Option<&Snapshot> {
        self.snapshots.get(key).and_then(|s| s.last())
    }

    pub fn snapshots(&self, key: &PairKey) -> &[Snapshot] {
        self.snapshots.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// The snapshot in force at `time`, if any order had been placed by then.
    pub fn snapshot_at(&self, key: &PairKey, time: DateTime<Utc>) -> Option<&Snapshot> {
        self.snapshots
            .get(key)?
            .iter()
            .rev()
            .find(|snapshot| snapshot.time <= time)
    }
}
