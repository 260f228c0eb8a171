use crate::error::EventsError;
use chrono::{DateTime, Utc};
use core_types::{Direction, Interval, Kline, PairKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields shared by every event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBase {
    /// Monotonic position of the candle within its data handler.
    pub offset: u64,
    pub key: PairKey,
    pub time: DateTime<Utc>,
    pub interval: Interval,
    /// Trail of human-readable notes appended as the event moves through the pipeline.
    pub reasons: Vec<String>,
}

impl EventBase {
    pub fn new(offset: u64, key: PairKey, time: DateTime<Utc>, interval: Interval) -> Self {
        Self {
            offset,
            key,
            time,
            interval,
            reasons: Vec::new(),
        }
    }

    pub fn append_reason(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !reason.is_empty() {
            self.reasons.push(reason);
        }
    }

    /// All reasons joined into one sentence-separated string.
    pub fn reason(&self) -> String {
        self.reasons.join(". ")
    }
}

/// One candle for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEvent {
    pub base: EventBase,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Set when the candle was synthesised to fill a gap in the source data.
    pub missing: bool,
}

impl DataEvent {
    pub fn from_kline(
        offset: u64,
        key: PairKey,
        interval: Interval,
        kline: &Kline,
    ) -> Result<Self, EventsError> {
        kline.validate().map_err(|e| EventsError::InvalidCandle {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base: EventBase::new(offset, key, kline.open_time, interval),
            open: kline.open,
            high: kline.high,
            low: kline.low,
            close: kline.close,
            volume: kline.volume,
            missing: false,
        })
    }

    /// A flat placeholder candle at `time` carrying the previous close and no volume.
    pub fn gap_fill(previous: &DataEvent, offset: u64, time: DateTime<Utc>) -> Self {
        let mut base = EventBase::new(offset, previous.base.key.clone(), time, previous.base.interval);
        base.append_reason("missing candle filled with previous close");
        Self {
            base,
            open: previous.close,
            high: previous.close,
            low: previous.close,
            close: previous.close,
            volume: Decimal::ZERO,
            missing: true,
        }
    }
}

/// A strategy's intent for one pair at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub base: EventBase,
    pub direction: Direction,
    pub close_price: Decimal,
    pub buy_limit: Option<Decimal>,
    pub sell_limit: Option<Decimal>,
    /// A pre-set order amount. Sizing honours it when still affordable.
    pub amount: Option<Decimal>,
    /// A companion signal raised once this signal's order fills.
    pub fill_dependent: Option<Box<SignalEvent>>,
    /// When set on the companion, it is sized to match the parent's filled amount.
    pub match_order_amount: bool,
}

impl SignalEvent {
    pub fn from_data(data: &DataEvent, direction: Direction) -> Self {
        let mut base = data.base.clone();
        base.reasons.clear();
        Self {
            base,
            direction,
            close_price: data.close,
            buy_limit: None,
            sell_limit: None,
            amount: None,
            fill_dependent: None,
            match_order_amount: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.base.append_reason(reason);
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_fill_dependent(mut self, companion: SignalEvent) -> Self {
        self.fill_dependent = Some(Box::new(companion));
        self
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }
}

/// A sized order ready for the exchange simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub base: EventBase,
    pub id: Uuid,
    pub direction: Direction,
    pub amount: Decimal,
    pub close_price: Decimal,
    /// Funds reserved in the ledger for this order.
    pub allocated_funds: Decimal,
    pub leverage: Decimal,
    pub buy_limit: Option<Decimal>,
    pub sell_limit: Option<Decimal>,
    pub closing_position: bool,
    pub fill_dependent: Option<Box<SignalEvent>>,
}

impl OrderEvent {
    pub fn from_signal(signal: &SignalEvent) -> Self {
        Self {
            base: signal.base.clone(),
            id: Uuid::new_v4(),
            direction: signal.direction,
            amount: signal.amount.unwrap_or(Decimal::ZERO),
            close_price: signal.close_price,
            allocated_funds: Decimal::ZERO,
            leverage: Decimal::ONE,
            buy_limit: signal.buy_limit,
            sell_limit: signal.sell_limit,
            closing_position: false,
            fill_dependent: signal.fill_dependent.clone(),
        }
    }

    /// Marks the order as rejected, keeping its intent in the `CouldNot*` direction.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.direction = self.direction.failed();
        self.amount = Decimal::ZERO;
        self.base.append_reason(reason);
    }
}

/// The exchange-side record of an executed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub side: Direction,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee: Decimal,
    pub leverage: Decimal,
    pub time: DateTime<Utc>,
}

impl OrderDetail {
    pub fn cost_basis(&self) -> Decimal {
        self.price * self.amount + self.fee
    }
}

/// The outcome of an order after the exchange simulator has priced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub base: EventBase,
    pub order_id: Uuid,
    pub direction: Direction,
    pub requested_amount: Decimal,
    pub amount: Decimal,
    pub close_price: Decimal,
    pub volume_adjusted_price: Decimal,
    pub purchase_price: Decimal,
    pub slippage_rate: Decimal,
    pub exchange_fee: Decimal,
    pub total: Decimal,
    pub allocated_funds: Decimal,
    pub leverage: Decimal,
    pub closing_position: bool,
    pub order: Option<OrderDetail>,
    pub fill_dependent: Option<Box<SignalEvent>>,
    pub liquidated: bool,
}

impl FillEvent {
    /// An unfilled fill mirroring the order; the simulator fills in prices and amounts.
    pub fn from_order(order: &OrderEvent) -> Self {
        Self {
            base: order.base.clone(),
            order_id: order.id,
            direction: order.direction,
            requested_amount: order.amount,
            amount: Decimal::ZERO,
            close_price: order.close_price,
            volume_adjusted_price: order.close_price,
            purchase_price: Decimal::ZERO,
            slippage_rate: Decimal::ZERO,
            exchange_fee: Decimal::ZERO,
            total: Decimal::ZERO,
            allocated_funds: order.allocated_funds,
            leverage: order.leverage,
            closing_position: order.closing_position,
            order: None,
            fill_dependent: order.fill_dependent.clone(),
            liquidated: false,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.direction.is_tradeable() && self.amount > Decimal::ZERO
    }
}

/// The closed set of events flowing through the simulation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    Data(DataEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
}

impl Event {
    pub fn base(&self) -> &EventBase {
        match self {
            Event::Data(e) => &e.base,
            Event::Signal(e) => &e.base,
            Event::Order(e) => &e.base,
            Event::Fill(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut EventBase {
        match self {
            Event::Data(e) => &mut e.base,
            Event::Signal(e) => &mut e.base,
            Event::Order(e) => &mut e.base,
            Event::Fill(e) => &mut e.base,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Data(_) => "data",
            Event::Signal(_) => "signal",
            Event::Order(_) => "order",
            Event::Fill(_) => "fill",
        }
    }

    pub fn key(&self) -> &PairKey {
        &self.base().key
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.base().time
    }

    pub fn offset(&self) -> u64 {
        self.base().offset
    }

    pub fn append_reason(&mut self, reason: impl Into<String>) {
        self.base_mut().append_reason(reason);
    }

    pub fn into_data(self) -> Result<DataEvent, EventsError> {
        match self {
            Event::Data(e) => Ok(e),
            other => Err(EventsError::UnexpectedKind {
                expected: "data",
                received: other.kind(),
            }),
        }
    }
}
