use crate::Backtester;
use crate::error::BacktestError;
use configuration::LiveSettings;
use core_types::{Interval, Kline, PairKey};
use data::LiveSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Batches buffered between the poller and the loop before the poller waits.
const CHANNEL_CAPACITY: usize = 64;

type Batch = (PairKey, Vec<Kline>);

impl Backtester {
    /// Runs against candles polled from `source` until `cancel` fires or no new
    /// candle arrives within `settings.data_timeout`.
    ///
    /// The poller runs as its own task and hands candles over a channel, so the
    /// data handlers are only ever touched by this loop. Every batch that adds
    /// a candle resets the watchdog and drains the queue.
    pub async fn run_live(
        &mut self,
        source: Arc<dyn LiveSource>,
        settings: &LiveSettings,
        cancel: CancellationToken,
    ) -> Result<(), BacktestError> {
        let targets: Vec<(PairKey, Interval)> = self
            .data
            .handlers()
            .map(|h| (h.key().clone(), h.interval()))
            .collect();
        tracing::info!(
            nickname = %self.nickname,
            strategy = self.strategy.name(),
            pairs = targets.len(),
            poll_interval = ?settings.poll_interval,
            data_timeout = ?settings.data_timeout,
            "live run started"
        );

        let (tx, mut rx) = mpsc::channel::<Batch>(CHANNEL_CAPACITY);
        let poller_token = cancel.child_token();
        let poller = tokio::spawn(poll(
            source,
            targets,
            settings.poll_interval,
            tx,
            poller_token.clone(),
        ));

        let watchdog = tokio::time::sleep(settings.data_timeout);
        tokio::pin!(watchdog);
        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(nickname = %self.nickname, "shutdown requested");
                    break Ok(());
                }
                _ = &mut watchdog => {
                    break Err(BacktestError::NoDataTimeout(settings.data_timeout));
                }
                batch = rx.recv() => {
                    let Some((key, klines)) = batch else {
                        break Err(BacktestError::Poller("candle channel closed".to_string()));
                    };
                    let added = match self.append_candles(&key, &klines) {
                        Ok(added) => added,
                        Err(e) => break Err(e),
                    };
                    if added == 0 {
                        continue;
                    }
                    tracing::debug!(%key, added, "candles appended");
                    watchdog.as_mut().reset(Instant::now() + settings.data_timeout);
                    if let Err(e) = self.drain().await {
                        break Err(e);
                    }
                }
            }
        };

        poller_token.cancel();
        drop(rx);
        let joined = poller.await;
        if let Some(bar) = &self.progress {
            bar.finish_with_message("Live run stopped.");
        }
        match (&outcome, joined) {
            (Ok(()), Err(e)) => return Err(BacktestError::Poller(e.to_string())),
            (Err(e), _) => tracing::error!(nickname = %self.nickname, error = %e, "live run aborted"),
            (Ok(()), Ok(())) => tracing::info!(nickname = %self.nickname, "live run finished"),
        }
        outcome
    }
}

/// Polls every pair once per tick. Fetch failures are logged and retried on the
/// next tick. No fetch starts once `cancel` has fired.
async fn poll(
    source: Arc<dyn LiveSource>,
    targets: Vec<(PairKey, Interval)>,
    every: Duration,
    tx: mpsc::Sender<Batch>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                for (key, interval) in &targets {
                    if cancel.is_cancelled() {
                        return;
                    }
                    match source.fetch_latest(key, *interval).await {
                        Ok(klines) if klines.is_empty() => {}
                        Ok(klines) => {
                            if tx.send((key.clone(), klines)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => tracing::warn!(%key, error = %e, "candle fetch failed"),
                    }
                }
            }
        }
    }
}
