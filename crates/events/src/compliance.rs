use crate::event::{FillEvent, OrderDetail};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One executed order as recorded for compliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotOrder {
    pub close_price: Decimal,
    pub volume_adjusted_price: Decimal,
    pub slippage_rate: Decimal,
    pub cost_basis: Decimal,
    pub order: OrderDetail,
}

impl SnapshotOrder {
    /// Returns `None` for fills that never reached the exchange.
    pub fn from_fill(fill: &FillEvent) -> Option<Self> {
        let order = fill.order.clone()?;
        Some(Self {
            close_price: fill.close_price,
            volume_adjusted_price: fill.volume_adjusted_price,
            slippage_rate: fill.slippage_rate,
            cost_basis: order.cost_basis(),
            order,
        })
    }
}

/// Every order placed for a pair up to and including `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub offset: u64,
    pub time: DateTime<Utc>,
    pub orders: Vec<SnapshotOrder>,
}

impl Snapshot {
    pub fn leveraged_orders(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| o.order.leverage > Decimal::ONE)
            .count()
    }
}
