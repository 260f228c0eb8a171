//! # Meridian Backtester
//!
//! The simulation loop. It pulls candles from the data handlers, feeds them to
//! the strategy and routes the resulting signals, orders and fills through the
//! portfolio and the exchange simulator, recording everything for statistics.
//!
//! ## Architectural Principles
//!
//! - **Explicit Context:** Every shared component lives in an `EngineContext`
//!   built by the caller. There is no global state.
//! - **Single-Threaded Loop:** Events are processed one at a time from a FIFO
//!   queue, matched exhaustively by kind.
//! - **Recoverable vs Fatal:** Rejections travel through the loop as directions
//!   with reasons. Ledger violations and bad data abort the run.

use crate::error::BacktestError;
use crate::queue::EventQueue;
use analytics::{RunSummary, Statistic};
use core_types::{Direction, Kline, PairKey};
use data::{DataHandler, DataStore};
use events::{DataEvent, Event, FillEvent, OrderEvent, SignalEvent};
use executor::{Executor, SimulatedExchange};
use funding::FundManager;
use indicatif::{ProgressBar, ProgressStyle};
use portfolio::{Portfolio, PortfolioError};
use std::sync::Arc;
use strategies::Strategy;

pub mod error;
pub mod live;
pub mod queue;
pub mod setup;

pub use setup::{build_backtester, build_backtester_with_strategy, live_data_store, load_data};

/// The components shared by every stage of the loop.
pub struct EngineContext {
    /// Fees, slippage and collateral weighting per pair.
    pub exchange: Arc<SimulatedExchange>,
    pub funding: FundManager,
    pub portfolio: Portfolio,
}

/// The main backtesting engine.
pub struct Backtester {
    nickname: String,
    context: EngineContext,
    strategy: Box<dyn Strategy>,
    simultaneous: bool,
    data: DataStore,
    statistic: Statistic,
    queue: EventQueue,
    progress: Option<ProgressBar>,
}

impl Backtester {
    pub fn new(
        nickname: impl Into<String>,
        context: EngineContext,
        strategy: Box<dyn Strategy>,
        simultaneous: bool,
        data: DataStore,
        statistic: Statistic,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            context,
            strategy,
            simultaneous,
            data,
            statistic,
            queue: EventQueue::new(),
            progress: None,
        }
    }

    /// Shows a progress bar advancing once per candle step.
    pub fn with_progress(mut self) -> Result<Self, BacktestError> {
        let steps = self.data.handlers().map(|h| h.len()).max().unwrap_or(0);
        let bar = ProgressBar::new(steps as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("=>-"),
        );
        self.progress = Some(bar);
        Ok(self)
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn statistic(&self) -> &Statistic {
        &self.statistic
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Runs the simulation until any data handler runs out of candles.
    pub async fn run(&mut self) -> Result<(), BacktestError> {
        tracing::info!(
            nickname = %self.nickname,
            strategy = self.strategy.name(),
            pairs = self.data.len(),
            simultaneous = self.simultaneous,
            "simulation started"
        );
        let outcome = self.drain().await;
        if let Some(bar) = &self.progress {
            bar.finish_with_message("Simulation complete.");
        }
        match &outcome {
            Ok(()) => tracing::info!(nickname = %self.nickname, "simulation finished"),
            Err(e) => tracing::error!(nickname = %self.nickname, error = %e, "simulation aborted"),
        }
        outcome
    }

    /// Derives the run's statistics.
    pub fn results(&self) -> Result<RunSummary, BacktestError> {
        let funding = &self.context.funding;
        Ok(self
            .statistic
            .calculate_all(&funding.report(), &funding.snapshots())?)
    }

    /// Processes queued events, loading the next candle step whenever the queue
    /// runs dry, until a handler is exhausted.
    pub(crate) async fn drain(&mut self) -> Result<(), BacktestError> {
        loop {
            match self.queue.pop() {
                Some(event) => self.handle_event(event).await?,
                None => {
                    if !self.load_next() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Advances every handler by one candle. Only the first data event is queued
    /// when the strategy processes pairs simultaneously.
    fn load_next(&mut self) -> bool {
        if self.data.is_empty() || self.data.any_exhausted() {
            return false;
        }
        let mut queued = false;
        for handler in self.data.handlers_mut() {
            let Some(event) = handler.next() else {
                continue;
            };
            if self.simultaneous && queued {
                continue;
            }
            self.queue.push(Event::Data(event));
            queued = true;
        }
        if let Some(bar) = &self.progress {
            bar.inc(1);
        }
        queued
    }

    pub(crate) fn append_candles(&mut self, key: &PairKey, klines: &[Kline]) -> Result<usize, BacktestError> {
        let handler = self
            .data
            .get_mut(key)
            .ok_or_else(|| BacktestError::DataUnavailable(key.to_string()))?;
        Ok(handler.append(klines)?)
    }

    /// Dispatches one event and queues whatever it produces.
    pub async fn handle_event(&mut self, event: Event) -> Result<(), BacktestError> {
        tracing::debug!(
            kind = event.kind(),
            key = %event.base().key,
            offset = event.base().offset,
            "handling event"
        );
        match event {
            Event::Data(data) if self.simultaneous => {
                tracing::trace!(time = %data.base.time, "simultaneous step");
                self.process_simultaneous_data()
            }
            Event::Data(data) => self.process_single_data(&data),
            Event::Signal(signal) => self.process_signal(signal),
            Event::Order(order) => self.process_order(order).await,
            Event::Fill(fill) => self.process_fill(fill),
        }
    }

    /// Records the candle, revalues the pair and checks for liquidation.
    /// Returns `false` when the candle liquidated the pair's exchange.
    fn update_stats_for_data(&mut self, data: &DataEvent) -> Result<bool, BacktestError> {
        self.statistic.setup_event_for_time(data)?;
        let holding = self
            .context
            .portfolio
            .update_holdings(data, &self.context.funding)?;
        self.statistic.add_holdings(&holding)?;
        self.context.funding.create_snapshot(data.base.time);

        match self
            .context
            .portfolio
            .check_liquidation(data, &self.context.funding)
        {
            Ok(()) => Ok(true),
            Err(PortfolioError::PositionLiquidated(key)) => {
                let zeroed = self
                    .context
                    .portfolio
                    .liquidate(data, &self.context.funding)?;
                for holding in zeroed.iter().filter(|h| h.key == key) {
                    self.statistic.add_holdings(holding)?;
                }
                self.context.funding.create_snapshot(data.base.time);
                let signal = SignalEvent::from_data(data, Direction::Liquidated)
                    .with_reason("collateral exhausted, exchange funding liquidated");
                self.queue.push(Event::Signal(signal));
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn process_single_data(&mut self, data: &DataEvent) -> Result<(), BacktestError> {
        if !self.update_stats_for_data(data)? {
            return Ok(());
        }
        let key = &data.base.key;
        let handler = self
            .data
            .get(key)
            .ok_or_else(|| BacktestError::DataUnavailable(key.to_string()))?;
        let outcome = self
            .strategy
            .on_signal(handler, &self.context.funding, &self.context.portfolio);
        match outcome {
            Ok(signal) => self.queue.push(Event::Signal(signal)),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => tracing::warn!(%key, offset = data.base.offset, error = %e, "strategy failed, data point skipped"),
        }
        Ok(())
    }

    fn process_simultaneous_data(&mut self) -> Result<(), BacktestError> {
        let latest: Vec<DataEvent> = self
            .data
            .handlers()
            .filter_map(|h| h.latest().cloned())
            .collect();
        for data in &latest {
            self.update_stats_for_data(data)?;
        }

        let handlers: Vec<&dyn DataHandler> = self.data.handlers().collect();
        let outcome = self.strategy.on_simultaneous_signals(
            &handlers,
            &self.context.funding,
            &self.context.portfolio,
        );
        match outcome {
            Ok(signals) => {
                for signal in signals {
                    self.queue.push(Event::Signal(signal));
                }
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => tracing::warn!(error = %e, "strategy failed, step skipped"),
        }
        Ok(())
    }

    fn process_signal(&mut self, signal: SignalEvent) -> Result<(), BacktestError> {
        self.statistic
            .set_event_for_offset(&Event::Signal(signal.clone()))?;
        let order = self
            .context
            .portfolio
            .on_signal(&signal, &self.context.funding)?;
        self.queue.push(Event::Order(order));
        Ok(())
    }

    async fn process_order(&mut self, order: OrderEvent) -> Result<(), BacktestError> {
        self.statistic
            .set_event_for_offset(&Event::Order(order.clone()))?;
        let key = &order.base.key;
        let handler = self
            .data
            .get(key)
            .ok_or_else(|| BacktestError::DataUnavailable(key.to_string()))?;
        let fill = self.context.exchange.execute_order(&order, handler).await?;
        self.queue.push(Event::Fill(fill));
        Ok(())
    }

    fn process_fill(&mut self, fill: FillEvent) -> Result<(), BacktestError> {
        self.statistic
            .set_event_for_offset(&Event::Fill(fill.clone()))?;
        let transaction = self
            .context
            .portfolio
            .on_fill(&fill, &self.context.funding)?;
        self.statistic.add_holdings(&transaction.holding)?;
        if let Some(snapshot) = &transaction.snapshot {
            self.statistic.add_compliance_snapshot(snapshot, &fill)?;
        }
        self.context.funding.create_snapshot(fill.base.time);

        if fill.is_filled() {
            if let Some(companion) = &fill.fill_dependent {
                let mut signal = (**companion).clone();
                if signal.match_order_amount {
                    signal.amount = Some(fill.amount);
                }
                self.queue.push(Event::Signal(signal));
            }
        }
        Ok(())
    }
}
