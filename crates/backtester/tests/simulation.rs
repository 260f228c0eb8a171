use backtester::error::BacktestError;
use backtester::{build_backtester, build_backtester_with_strategy, live_data_store};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use configuration::{Config, LiveSettings, load_config_str};
use core_types::{Direction, Kline, PairKey};
use data::{Candles, DataHandler, DataStore, ReplaySource};
use events::SignalEvent;
use funding::FundManager;
use portfolio::Portfolio;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use strategies::{Strategy, StrategyError};
use tokio_util::sync::CancellationToken;

fn config(strategy: &str, base_funds: &str, quote_funds: &str) -> Config {
    load_config_str(&format!(
        r#"
nickname = "integration"

[run]
interval = "1h"
slippage = "none"

[strategy]
name = "{strategy}"

[[currencies]]
exchange = "binance"
asset = "spot"
base = "BTC"
quote = "USDT"
initial_base_funds = "{base_funds}"
initial_quote_funds = "{quote_funds}"
maker_fee = "0.001"
taker_fee = "0.001"
"#
    ))
    .unwrap()
}

fn klines(closes: &[Decimal]) -> Vec<Kline> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Kline {
            open_time: start + ChronoDuration::hours(i as i64),
            open: *close,
            high: *close,
            low: *close,
            close: *close,
            volume: dec!(1000000),
        })
        .collect()
}

fn store(config: &Config, closes: &[Decimal]) -> DataStore {
    let key = config.currencies[0].key();
    let candles = Candles::from_klines(key, config.run.interval, &klines(closes)).unwrap();
    let mut store = DataStore::new();
    store.insert(Box::new(candles)).unwrap();
    store
}

/// Buys two units on the first candle and sells them on the second.
struct RoundTrip;

impl Strategy for RoundTrip {
    fn name(&self) -> &'static str {
        "roundtrip"
    }

    fn description(&self) -> &'static str {
        "buys then sells"
    }

    fn supports_simultaneous(&self) -> bool {
        false
    }

    fn on_signal(
        &mut self,
        data: &dyn DataHandler,
        _funds: &FundManager,
        _portfolio: &Portfolio,
    ) -> Result<SignalEvent, StrategyError> {
        let latest = data
            .latest()
            .ok_or_else(|| StrategyError::NoData(data.key().to_string()))?;
        let signal = match latest.base.offset {
            1 => SignalEvent::from_data(latest, Direction::Buy).with_amount(dec!(2)),
            2 => SignalEvent::from_data(latest, Direction::Sell).with_amount(dec!(2)),
            _ => SignalEvent::from_data(latest, Direction::DoNothing),
        };
        Ok(signal)
    }
}

#[tokio::test]
async fn buys_without_quote_funds_are_rejected() {
    let config = config("dollarcostaverage", "1", "0");
    let key = config.currencies[0].key();
    let mut backtester = build_backtester(&config, store(&config, &[dec!(100), dec!(101), dec!(102)])).unwrap();
    backtester.run().await.unwrap();

    let records = backtester.statistic().pair(&key).unwrap().records();
    assert_eq!(records.len(), 3);
    for record in records {
        let fill = record.fill.as_ref().unwrap();
        assert_eq!(fill.direction, Direction::CouldNotBuy);
        assert!(!fill.base.reasons.is_empty());
    }

    let summary = backtester.results().unwrap();
    assert_eq!(summary.total_orders, 0);
    assert_eq!(summary.total_events, 3);
}

#[tokio::test]
async fn round_trip_pays_fees_on_both_legs() {
    let config = config("dollarcostaverage", "0", "1000");
    let key = config.currencies[0].key();
    let mut backtester = build_backtester_with_strategy(
        &config,
        store(&config, &[dec!(100), dec!(100), dec!(100)]),
        Box::new(RoundTrip),
    )
    .unwrap();
    backtester.run().await.unwrap();

    let funding = backtester.context().funding.funding_for(&key).unwrap();
    assert_eq!(funding.holdings(), (dec!(0), dec!(999.6)));

    let summary = backtester.results().unwrap();
    let pair = summary.pair(&key).unwrap();
    assert_eq!(pair.total_orders, 2);
    assert_eq!(pair.buy_orders, 1);
    assert_eq!(pair.sell_orders, 1);
    assert_eq!(pair.total_fees, dec!(0.4));
    assert_eq!(summary.strategy, "roundtrip");
}

#[tokio::test]
async fn rising_market_shows_up_in_returns_and_pnl() {
    let config = config("dollarcostaverage", "0", "1000");
    let key = config.currencies[0].key();
    let mut backtester = build_backtester(
        &config,
        store(&config, &[dec!(100), dec!(110), dec!(121), dec!(127.05)]),
    )
    .unwrap();
    backtester.run().await.unwrap();

    let records = backtester.statistic().pair(&key).unwrap().records();
    assert!(records.iter().all(|r| r.fill.is_some() && r.holding.is_some()));

    let summary = backtester.results().unwrap();
    let pair = summary.pair(&key).unwrap();
    assert!(pair.strategy_movement > dec!(0));
    assert!(pair.high_pnl > dec!(0));
    assert!(pair.arithmetic.sharpe.unwrap() > dec!(0));
}

#[test]
fn missing_data_file_is_reported() {
    let config = config("dollarcostaverage", "0", "1000");
    assert!(matches!(
        backtester::load_data(&config),
        Err(BacktestError::DataUnavailable(_))
    ));
}

#[test]
fn unknown_strategies_fail_to_build() {
    let mut config = config("dollarcostaverage", "0", "1000");
    config.strategy.name = "moonshot".to_string();
    let data = store(&config, &[dec!(100)]);
    assert!(matches!(
        build_backtester(&config, data),
        Err(BacktestError::Strategy(StrategyError::StrategyNotFound(_)))
    ));
}

fn replay(key: &PairKey, closes: &[Decimal]) -> Arc<ReplaySource> {
    let source = ReplaySource::new(1);
    source.push(key.clone(), klines(closes));
    Arc::new(source)
}

fn live_settings(data_timeout: Duration) -> LiveSettings {
    LiveSettings {
        poll_interval: Duration::from_millis(10),
        data_timeout,
    }
}

#[tokio::test]
async fn live_run_times_out_once_the_source_dries_up() {
    let config = config("dollarcostaverage", "0", "1000");
    let key = config.currencies[0].key();
    let source = replay(&key, &[dec!(100), dec!(101), dec!(102)]);
    let mut backtester = build_backtester(&config, live_data_store(&config).unwrap()).unwrap();

    let outcome = backtester
        .run_live(source, &live_settings(Duration::from_millis(300)), CancellationToken::new())
        .await;

    assert!(matches!(outcome, Err(BacktestError::NoDataTimeout(_))));
    assert_eq!(backtester.statistic().pair(&key).unwrap().records().len(), 3);
}

#[tokio::test]
async fn live_run_stops_cleanly_when_cancelled() {
    let config = config("dollarcostaverage", "0", "1000");
    let key = config.currencies[0].key();
    let source = replay(&key, &[dec!(100), dec!(101)]);
    let mut backtester = build_backtester(&config, live_data_store(&config).unwrap()).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let outcome = backtester
        .run_live(source, &live_settings(Duration::from_secs(30)), cancel)
        .await;

    assert!(outcome.is_ok());
    assert_eq!(backtester.statistic().pair(&key).unwrap().records().len(), 2);
}
