use crate::drawdown::{Drawdown, PricePoint, Swing};
use chrono::{DateTime, Utc};
use core_types::PairKey;
use events::Holding;
use funding::{FundingReport, FundingSnapshot, ItemReport};
use rust_decimal::Decimal;
use serde::Serialize;

/// Risk-adjusted return ratios. `None` where the denominator is zero or the
/// series is too short.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ratios {
    pub sharpe: Option<Decimal>,
    pub sortino: Option<Decimal>,
    pub information: Option<Decimal>,
    pub calmar: Option<Decimal>,
}

/// The results for one pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSummary {
    pub key: PairKey,
    pub events: usize,
    pub missing_candles: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub initial_close: Decimal,
    pub final_close: Decimal,
    pub highest_close: Option<Decimal>,
    pub lowest_close: Option<Decimal>,

    pub market_movement: Decimal,
    pub strategy_movement: Decimal,
    pub initial_value: Decimal,
    pub final_value: Decimal,
    pub cagr: Option<Decimal>,
    pub arithmetic: Ratios,
    pub geometric: Ratios,
    pub max_drawdown: Option<Swing>,
    pub longest_drawdown: Option<Swing>,
    pub high_pnl: Decimal,
    pub low_pnl: Decimal,

    pub buy_orders: usize,
    pub sell_orders: usize,
    pub total_orders: usize,
    pub total_fees: Decimal,
    pub value_lost_to_slippage: Decimal,
    pub value_lost_to_volume_sizing: Decimal,
    pub final_holding: Option<Holding>,
}

impl PairSummary {
    pub fn new(key: PairKey) -> Self {
        Self {
            key,
            events: 0,
            missing_candles: 0,
            start_time: None,
            end_time: None,
            initial_close: Decimal::ZERO,
            final_close: Decimal::ZERO,
            highest_close: None,
            lowest_close: None,
            market_movement: Decimal::ZERO,
            strategy_movement: Decimal::ZERO,
            initial_value: Decimal::ZERO,
            final_value: Decimal::ZERO,
            cagr: None,
            arithmetic: Ratios::default(),
            geometric: Ratios::default(),
            max_drawdown: None,
            longest_drawdown: None,
            high_pnl: Decimal::ZERO,
            low_pnl: Decimal::ZERO,
            buy_orders: 0,
            sell_orders: 0,
            total_orders: 0,
            total_fees: Decimal::ZERO,
            value_lost_to_slippage: Decimal::ZERO,
            value_lost_to_volume_sizing: Decimal::ZERO,
            final_holding: None,
        }
    }

    fn drawdown_percent(&self) -> Option<Decimal> {
        self.max_drawdown.as_ref().map(|s| s.percent)
    }
}

/// Ledger-wide results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundingSummary {
    pub initial_total_value: Decimal,
    pub final_total_value: Decimal,
    pub strategy_movement: Decimal,
    pub max_drawdown: Option<Swing>,
    pub items: Vec<ItemReport>,
}

impl FundingSummary {
    pub fn new(report: &FundingReport, snapshots: &[FundingSnapshot]) -> Self {
        let series: Vec<PricePoint> = snapshots
            .iter()
            .map(|s| PricePoint {
                time: s.time,
                price: s.total_value,
            })
            .collect();
        let strategy_movement = if report.initial_total_value.is_zero() {
            Decimal::ZERO
        } else {
            (report.final_total_value - report.initial_total_value) / report.initial_total_value
                * Decimal::ONE_HUNDRED
        };
        Self {
            initial_total_value: report.initial_total_value,
            final_total_value: report.final_total_value,
            strategy_movement,
            max_drawdown: Drawdown::scan(&series).max().cloned(),
            items: report.items.clone(),
        }
    }
}

/// The outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub strategy: String,
    pub pairs: Vec<PairSummary>,
    pub best_market_mover: Option<PairKey>,
    pub best_strategy_performer: Option<PairKey>,
    pub biggest_drawdown: Option<PairKey>,
    pub funding: FundingSummary,
    pub total_events: usize,
    pub total_orders: usize,
}

impl RunSummary {
    pub fn new(strategy: impl Into<String>, pairs: Vec<PairSummary>, funding: FundingSummary) -> Self {
        let best_market_mover = first_best(&pairs, |p| Some(p.market_movement), |a, b| a > b);
        let best_strategy_performer = first_best(&pairs, |p| Some(p.strategy_movement), |a, b| a > b);
        let biggest_drawdown = first_best(&pairs, PairSummary::drawdown_percent, |a, b| a < b);
        Self {
            strategy: strategy.into(),
            total_events: pairs.iter().map(|p| p.events).sum(),
            total_orders: pairs.iter().map(|p| p.total_orders).sum(),
            best_market_mover,
            best_strategy_performer,
            biggest_drawdown,
            pairs,
            funding,
        }
    }

    pub fn pair(&self, key: &PairKey) -> Option<&PairSummary> {
        self.pairs.iter().find(|p| &p.key == key)
    }

    /// Writes the summary to the log.
    pub fn print_results(&self) {
        tracing::info!(
            strategy = %self.strategy,
            events = self.total_events,
            orders = self.total_orders,
            "run complete"
        );
        for pair in &self.pairs {
            tracing::info!(
                key = %pair.key,
                market_movement = %pair.market_movement.round_dp(2),
                strategy_movement = %pair.strategy_movement.round_dp(2),
                orders = pair.total_orders,
                buys = pair.buy_orders,
                sells = pair.sell_orders,
                fees = %pair.total_fees,
                max_drawdown = ?pair.max_drawdown.as_ref().map(|s| s.percent.round_dp(2)),
                sharpe = ?pair.arithmetic.sharpe.map(|v| v.round_dp(4)),
                "pair results"
            );
        }
        if let Some(key) = &self.best_market_mover {
            tracing::info!(%key, "best market mover");
        }
        if let Some(key) = &self.best_strategy_performer {
            tracing::info!(%key, "best strategy performer");
        }
        if let Some(key) = &self.biggest_drawdown {
            tracing::info!(%key, "biggest drawdown");
        }
        tracing::info!(
            initial = %self.funding.initial_total_value,
            last = %self.funding.final_total_value,
            movement = %self.funding.strategy_movement.round_dp(2),
            "funding results"
        );
    }
}

/// Linear scan keeping the first pair whose metric strictly beats the best so far.
fn first_best(
    pairs: &[PairSummary],
    metric: impl Fn(&PairSummary) -> Option<Decimal>,
    better: impl Fn(Decimal, Decimal) -> bool,
) -> Option<PairKey> {
    let mut best: Option<(Decimal, &PairKey)> = None;
    for pair in pairs {
        let Some(value) = metric(pair) else {
            continue;
        };
        match best {
            Some((current, _)) if !better(value, current) => {}
            _ => best = Some((value, &pair.key)),
        }
    }
    best.map(|(_, key)| key.clone())
}
