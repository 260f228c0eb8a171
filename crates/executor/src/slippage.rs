use configuration::{CurrencySettings, SlippageKind};
use events::{DataEvent, OrderEvent};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// Estimates how far the fill price moves against an order.
///
/// The returned rate is a non-negative fraction of the close price; the exchange
/// applies it upwards for buy-side orders and downwards for sell-side orders.
pub trait SlippageModel: Send + Sync {
    fn estimate(&self, order: &OrderEvent, candle: &DataEvent, settings: &CurrencySettings) -> Decimal;
}

/// Builds the model selected in configuration.
pub fn slippage_model(kind: SlippageKind, seed: Option<u64>) -> Box<dyn SlippageModel> {
    match kind {
        SlippageKind::None => Box::new(NoSlippage),
        SlippageKind::Fixed => Box::new(FixedSlippage),
        SlippageKind::Random => Box::new(RandomSlippage::new(seed)),
        SlippageKind::OrderBook => Box::new(OrderBookSlippage::default()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSlippage;

impl SlippageModel for NoSlippage {
    fn estimate(&self, _: &OrderEvent, _: &DataEvent, _: &CurrencySettings) -> Decimal {
        Decimal::ZERO
    }
}

/// Always the pair's configured maximum slippage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSlippage;

impl SlippageModel for FixedSlippage {
    fn estimate(&self, _: &OrderEvent, _: &DataEvent, settings: &CurrencySettings) -> Decimal {
        settings.max_slippage.max(Decimal::ZERO)
    }
}

/// A uniformly drawn rate within the pair's `[min_slippage, max_slippage]`.
#[derive(Debug)]
pub struct RandomSlippage {
    rng: Mutex<StdRng>,
}

const RANDOM_STEPS: u32 = 10_000;

impl RandomSlippage {
    /// A seeded model replays the same rates on every run.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl SlippageModel for RandomSlippage {
    fn estimate(&self, _: &OrderEvent, _: &DataEvent, settings: &CurrencySettings) -> Decimal {
        let min = settings.min_slippage.max(Decimal::ZERO);
        let max = settings.max_slippage.max(min);
        if max == min {
            return min;
        }
        let step: u32 = self.rng.lock().gen_range(0..=RANDOM_STEPS);
        min + (max - min) * Decimal::from(step) / Decimal::from(RANDOM_STEPS)
    }
}

/// Walks a book synthesised from the candle: liquidity is spread evenly across
/// `levels` price levels between the close and the high (buys) or low (sells).
/// Anything the book cannot absorb fills at the extreme.
#[derive(Debug, Clone, Copy)]
pub struct OrderBookSlippage {
    levels: u32,
}

impl OrderBookSlippage {
    pub fn new(levels: u32) -> Self {
        Self {
            levels: levels.max(1),
        }
    }
}

impl Default for OrderBookSlippage {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SlippageModel for OrderBookSlippage {
    fn estimate(&self, order: &OrderEvent, candle: &DataEvent, _: &CurrencySettings) -> Decimal {
        let close = candle.close;
        if close <= Decimal::ZERO || order.amount <= Decimal::ZERO || candle.volume <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let levels = Decimal::from(self.levels);
        let (far, sign) = if order.direction.is_buy_side() {
            (candle.high, Decimal::ONE)
        } else {
            (candle.low, Decimal::NEGATIVE_ONE)
        };
        let step = (far - close).abs() / levels;
        let per_level = candle.volume / levels;

        let mut remaining = order.amount;
        let mut cost = Decimal::ZERO;
        for level in 0..self.levels {
            if remaining <= Decimal::ZERO {
                break;
            }
            let price = close + sign * step * Decimal::from(level);
            let take = remaining.min(per_level);
            cost += take * price;
            remaining -= take;
        }
        if remaining > Decimal::ZERO {
            cost += remaining * far;
        }
        let average = cost / order.amount;
        (average - close).abs() / close
    }
}
