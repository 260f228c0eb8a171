use crate::error::BacktestError;
use crate::{Backtester, EngineContext};
use analytics::Statistic;
use configuration::{Config, CurrencySettings};
use core_types::AssetKind;
use data::{Candles, DataHandler, DataStore, load_csv};
use executor::{SimulatedExchange, slippage_model};
use funding::{FundManager, Item};
use portfolio::Portfolio;
use risk::{CollateralWeighting, RiskEvaluator, Sizer};
use rust_decimal::Decimal;
use std::sync::Arc;
use strategies::{Strategy, create_strategy};

/// Loads every pair's candles from the CSV file named in its settings.
pub fn load_data(config: &Config) -> Result<DataStore, BacktestError> {
    let mut store = DataStore::new();
    for currency in &config.currencies {
        let key = currency.key();
        let path = currency
            .data_file
            .as_ref()
            .ok_or_else(|| BacktestError::DataUnavailable(format!("{key}: no data_file configured")))?;
        let candles = load_csv(path, key.clone(), config.run.interval)?;
        tracing::info!(%key, candles = candles.len(), path = %path.display(), "candles loaded");
        store.insert(Box::new(candles))?;
    }
    Ok(store)
}

/// An empty candle series per pair, filled by the live poller.
pub fn live_data_store(config: &Config) -> Result<DataStore, BacktestError> {
    let mut store = DataStore::new();
    for currency in &config.currencies {
        store.insert(Box::new(Candles::new(currency.key(), config.run.interval)))?;
    }
    Ok(store)
}

/// Wires a backtester for `config` over `data`, with the strategy it names.
pub fn build_backtester(config: &Config, data: DataStore) -> Result<Backtester, BacktestError> {
    let strategy = create_strategy(&config.strategy.name, &config.strategy)?;
    build_backtester_with_strategy(config, data, strategy)
}

/// Wires a backtester for `config` over `data`, driven by `strategy`.
pub fn build_backtester_with_strategy(
    config: &Config,
    data: DataStore,
    strategy: Box<dyn Strategy>,
) -> Result<Backtester, BacktestError> {
    for currency in &config.currencies {
        let key = currency.key();
        if data.get(&key).is_none() {
            return Err(BacktestError::DataUnavailable(key.to_string()));
        }
    }

    let funding = setup_funding(config)?;
    let exchange = Arc::new(
        SimulatedExchange::new(slippage_model(config.run.slippage, config.run.seed))
            .with_currencies(config.currencies.iter().cloned()),
    );
    let weighting: Arc<dyn CollateralWeighting> = exchange.clone();
    let sizer = Sizer::new(config.portfolio.buy_side, config.portfolio.sell_side).with_weighting(weighting);
    let portfolio = Portfolio::builder()
        .size_manager(Box::new(sizer))
        .risk_manager(Box::new(RiskEvaluator::new(config.portfolio.leverage)))
        .build()?;
    for currency in &config.currencies {
        portfolio.setup_currency_settings(currency.key(), currency.clone());
    }

    let statistic = Statistic::new(strategy.name(), config.statistics.risk_free_rate);
    let context = EngineContext {
        exchange,
        funding,
        portfolio,
    };
    Ok(Backtester::new(
        config.nickname.clone(),
        context,
        strategy,
        config.strategy.simultaneous_signal_processing,
        data,
        statistic,
    ))
}

/// Builds the ledger: pair-scoped items per currency, or the configured
/// exchange-level items shared between pairs.
fn setup_funding(config: &Config) -> Result<FundManager, BacktestError> {
    let exchange_level = config.funding.use_exchange_level_funding;
    let funds = FundManager::new(exchange_level);
    if exchange_level {
        for item in &config.funding.items {
            let mut funding_item = Item::new(
                &item.exchange,
                item.asset,
                &item.currency,
                item.initial_funds,
                item.transfer_fee,
            )?;
            if item.asset.is_futures() {
                funding_item = funding_item.as_collateral();
            }
            funds.add_item(funding_item)?;
        }
    }

    for currency in &config.currencies {
        match currency.asset {
            AssetKind::Spot => link_spot(&funds, currency, exchange_level)?,
            AssetKind::Futures => link_futures(&funds, currency, exchange_level)?,
        }
    }
    tracing::debug!(pairs = funds.keys().len(), exchange_level, "funding ready");
    Ok(funds)
}

fn link_spot(
    funds: &FundManager,
    currency: &CurrencySettings,
    exchange_level: bool,
) -> Result<(), BacktestError> {
    let key = currency.key();
    let base = pair_item(funds, currency, &currency.base, currency.initial_base_funds, exchange_level)?;
    let quote = pair_item(funds, currency, &currency.quote, currency.initial_quote_funds, exchange_level)?;
    funds.add_spot_pair(&key, &base, &quote)?;
    Ok(())
}

fn link_futures(
    funds: &FundManager,
    currency: &CurrencySettings,
    exchange_level: bool,
) -> Result<(), BacktestError> {
    let key = currency.key();
    let contract = Item::new(&key.exchange, key.asset, &currency.base, Decimal::ZERO, Decimal::ZERO)?
        .for_pair(key.pair.clone())
        .as_contract();
    let contract = funds.add_item(contract)?;
    let shared = if exchange_level {
        funds.get_item(&key.exchange, key.asset, &currency.quote, Some(&key.pair))
    } else {
        None
    };
    let collateral = match shared {
        Some(item) => item,
        None => {
            let item = Item::new(
                &key.exchange,
                key.asset,
                &currency.quote,
                currency.initial_quote_funds,
                Decimal::ZERO,
            )?
            .for_pair(key.pair.clone())
            .as_collateral();
            funds.add_item(item)?
        }
    };
    funds.link_collateral(&key, &contract, &collateral)?;
    Ok(())
}

/// Reuses a configured exchange-level item when there is one, otherwise adds
/// an item scoped to the pair. Exchange-level runs fund only through their
/// configured items.
fn pair_item(
    funds: &FundManager,
    currency: &CurrencySettings,
    code: &str,
    initial_funds: Decimal,
    exchange_level: bool,
) -> Result<Arc<Item>, BacktestError> {
    let key = currency.key();
    if exchange_level {
        if let Some(item) = funds.get_item(&key.exchange, key.asset, code, Some(&key.pair)) {
            return Ok(item);
        }
    }
    let funded = if exchange_level { Decimal::ZERO } else { initial_funds };
    let item = Item::new(&key.exchange, key.asset, code, funded, Decimal::ZERO)?.for_pair(key.pair.clone());
    Ok(funds.add_item(item)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::load_config_str;
    use funding::Funding;
    use rust_decimal_macros::dec;

    const SHARED: &str = r#"
nickname = "shared"

[strategy]
name = "dollarcostaverage"

[funding]
use_exchange_level_funding = true

[[funding.items]]
exchange = "binance"
asset = "spot"
currency = "USDT"
initial_funds = "1000"

[[currencies]]
exchange = "binance"
asset = "spot"
base = "BTC"
quote = "USDT"

[[currencies]]
exchange = "binance"
asset = "spot"
base = "ETH"
quote = "USDT"
"#;

    fn spot(funding: Funding) -> funding::SpotPair {
        match funding {
            Funding::Spot(pair) => pair,
            Funding::Collateral(_) => panic!("expected a spot pair"),
        }
    }

    #[test]
    fn exchange_level_pairs_share_the_quote_item() {
        let config = load_config_str(SHARED).unwrap();
        let funds = setup_funding(&config).unwrap();
        let btc = spot(funds.funding_for(&config.currencies[0].key()).unwrap());
        let eth = spot(funds.funding_for(&config.currencies[1].key()).unwrap());

        assert!(Arc::ptr_eq(btc.quote(), eth.quote()));
        assert_eq!(btc.quote().available(), dec!(1000));
        assert_eq!(btc.base().available(), dec!(0));
        assert!(!Arc::ptr_eq(btc.base(), eth.base()));
        assert_eq!(funds.items().len(), 3);
    }

    #[test]
    fn pair_scoped_funding_uses_currency_settings() {
        let config = load_config_str(
            r#"
nickname = "scoped"

[strategy]
name = "rsi"

[[currencies]]
exchange = "binance"
asset = "futures"
base = "BTC"
quote = "USDT"
initial_quote_funds = "500"
"#,
        )
        .unwrap();
        let funds = setup_funding(&config).unwrap();
        let funding = funds.funding_for(&config.currencies[0].key()).unwrap();
        assert!(matches!(funding, Funding::Collateral(_)));
        assert_eq!(funding.initial_funds(), (dec!(0), dec!(500)));
    }

    #[test]
    fn every_pair_needs_candles() {
        let config = load_config_str(SHARED).unwrap();
        assert!(matches!(
            build_backtester(&config, DataStore::new()),
            Err(BacktestError::DataUnavailable(_))
        ));
    }
}
