use crate::error::FundingError;
use crate::item::{Item, lock_both};
use crate::pair::{CollateralPair, Funding, SpotPair};
use chrono::{DateTime, Utc};
use core_types::{AssetKind, CurrencyPair, Direction, PairKey};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// How a transfer treats the currencies of its two items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Both items must hold the same currency.
    Standard,
    /// Moves value between a spot item and collateral of a different currency.
    CollateralBridge,
}

/// One item's balance at a snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    pub item_id: u64,
    pub exchange: String,
    pub asset: AssetKind,
    pub currency: String,
    pub pair: Option<CurrencyPair>,
    pub available: Decimal,
    pub reserved: Decimal,
    pub price: Option<Decimal>,
    pub value: Decimal,
}

/// All items at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundingSnapshot {
    pub time: DateTime<Utc>,
    pub items: Vec<ItemSnapshot>,
    pub total_value: Decimal,
}

/// End-of-run summary of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub exchange: String,
    pub asset: AssetKind,
    pub currency: String,
    pub pair: Option<CurrencyPair>,
    pub initial_funds: Decimal,
    pub final_funds: Decimal,
    pub transfer_fees_paid: Decimal,
    pub initial_value: Decimal,
    pub final_value: Decimal,
    pub is_collateral: bool,
    pub is_liquidated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundingReport {
    pub exchange_level_funding: bool,
    pub items: Vec<ItemReport>,
    pub initial_total_value: Decimal,
    pub final_total_value: Decimal,
    pub snapshots_taken: usize,
}

/// The ledger: every funding item, which pairs they back, and their history.
#[derive(Debug)]
pub struct FundManager {
    items: RwLock<Vec<Arc<Item>>>,
    links: RwLock<HashMap<PairKey, Funding>>,
    exchange_level_funding: bool,
    snapshots: Mutex<Vec<FundingSnapshot>>,
}

impl FundManager {
    pub fn new(exchange_level_funding: bool) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            links: RwLock::new(HashMap::new()),
            exchange_level_funding,
            snapshots: Mutex::new(Vec::new()),
        }
    }

    pub fn is_exchange_level_funding(&self) -> bool {
        self.exchange_level_funding
    }

    /// Registers an item. Items are unique per exchange, asset, currency and pair scope.
    pub fn add_item(&self, item: Item) -> Result<Arc<Item>, FundingError> {
        let mut items = self.items.write();
        if items.iter().any(|existing| existing.equals(&item)) {
            return Err(FundingError::AlreadyExists(item.to_string()));
        }
        let item = Arc::new(item);
        tracing::debug!(item = %item, funds = %item.initial_funds(), "funding item added");
        items.push(Arc::clone(&item));
        Ok(item)
    }

    pub fn items(&self) -> Vec<Arc<Item>> {
        self.items.read().clone()
    }

    /// Finds an item, preferring one scoped to `pair` over an exchange level one.
    pub fn get_item(
        &self,
        exchange: &str,
        asset: AssetKind,
        currency: &str,
        pair: Option<&CurrencyPair>,
    ) -> Option<Arc<Item>> {
        let exchange = exchange.to_lowercase();
        let currency = currency.to_uppercase();
        let items = self.items.read();
        let matches = |item: &&Arc<Item>| {
            item.exchange() == exchange && item.asset() == asset && item.currency() == currency
        };
        items
            .iter()
            .filter(matches)
            .find(|item| item.pair() == pair)
            .or_else(|| items.iter().filter(matches).find(|item| item.pair().is_none()))
            .cloned()
    }

    fn ensure_registered(&self, item: &Arc<Item>) -> Result<(), FundingError> {
        if self.items.read().iter().any(|i| Arc::ptr_eq(i, item)) {
            Ok(())
        } else {
            Err(FundingError::FundsNotFound(item.to_string()))
        }
    }

    fn ensure_unshared(&self, links: &HashMap<PairKey, Funding>, item: &Arc<Item>) -> Result<(), FundingError> {
        if self.exchange_level_funding {
            return Ok(());
        }
        let shared = links.values().any(|funding| match funding {
            Funding::Spot(pair) => Arc::ptr_eq(pair.base(), item) || Arc::ptr_eq(pair.quote(), item),
            Funding::Collateral(pair) => {
                Arc::ptr_eq(pair.contract(), item) || Arc::ptr_eq(pair.collateral(), item)
            }
        });
        if shared {
            Err(FundingError::SharedItem(item.to_string()))
        } else {
            Ok(())
        }
    }

    /// Links a base and a quote item as the funding for a spot pair.
    pub fn add_spot_pair(
        &self,
        key: &PairKey,
        base: &Arc<Item>,
        quote: &Arc<Item>,
    ) -> Result<(), FundingError> {
        if Arc::ptr_eq(base, quote) {
            return Err(FundingError::SameItem(base.to_string()));
        }
        self.ensure_registered(base)?;
        self.ensure_registered(quote)?;
        let mut links = self.links.write();
        if links.contains_key(key) {
            return Err(FundingError::AlreadyExists(key.to_string()));
        }
        self.ensure_unshared(&links, base)?;
        self.ensure_unshared(&links, quote)?;
        base.set_paired_with(quote);
        quote.set_paired_with(base);
        links.insert(
            key.clone(),
            Funding::Spot(SpotPair::new(Arc::clone(base), Arc::clone(quote))),
        );
        Ok(())
    }

    /// Links a contract item to the collateral backing it.
    pub fn link_collateral(
        &self,
        key: &PairKey,
        contract: &Arc<Item>,
        collateral: &Arc<Item>,
    ) -> Result<(), FundingError> {
        if Arc::ptr_eq(contract, collateral) {
            return Err(FundingError::SameItem(contract.to_string()));
        }
        if !collateral.is_collateral() {
            return Err(FundingError::NotCollateral(collateral.to_string()));
        }
        self.ensure_registered(contract)?;
        self.ensure_registered(collateral)?;
        let mut links = self.links.write();
        if links.contains_key(key) {
            return Err(FundingError::AlreadyExists(key.to_string()));
        }
        self.ensure_unshared(&links, contract)?;
        self.ensure_unshared(&links, collateral)?;
        contract.set_paired_with(collateral);
        collateral.set_paired_with(contract);
        links.insert(
            key.clone(),
            Funding::Collateral(CollateralPair::new(
                Arc::clone(contract),
                Arc::clone(collateral),
                Arc::new(Mutex::new(None)),
            )),
        );
        Ok(())
    }

    pub fn funding_for(&self, key: &PairKey) -> Result<Funding, FundingError> {
        self.links
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| FundingError::FundsNotFound(key.to_string()))
    }

    pub fn keys(&self) -> Vec<PairKey> {
        let mut keys: Vec<PairKey> = self.links.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Moves `amount` from one item to another. The sender also pays its transfer fee.
    pub fn transfer(
        &self,
        amount: Decimal,
        from: &Arc<Item>,
        to: &Arc<Item>,
        mode: TransferMode,
    ) -> Result<(), FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::ZeroAmount);
        }
        if mode == TransferMode::Standard && !from.matches_currency(to) {
            return Err(FundingError::CurrencyMismatch {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let (mut sender, mut receiver) = lock_both(from, to)?;
        if sender.is_liquidated {
            return Err(FundingError::Liquidated(from.to_string()));
        }
        if receiver.is_liquidated {
            return Err(FundingError::Liquidated(to.to_string()));
        }
        let fee = from.transfer_fee();
        let required = amount + fee;
        if sender.available < required {
            return Err(FundingError::InsufficientFunds {
                currency: from.currency().to_string(),
                required,
                available: sender.available,
            });
        }
        sender.available -= required;
        sender.transfer_fees_paid += fee;
        receiver.available += amount;
        tracing::info!(from = %from, to = %to, %amount, %fee, "funds transferred");
        Ok(())
    }

    /// Liquidates every collateral pair on `exchange` and zeroes its spot items.
    pub fn liquidate_exchange(&self, exchange: &str) -> Result<(), FundingError> {
        let exchange = exchange.to_lowercase();
        for (key, funding) in self.links.read().iter() {
            if key.exchange != exchange {
                continue;
            }
            if let Funding::Collateral(pair) = funding {
                pair.liquidate()?;
            }
        }
        for item in self.items.read().iter() {
            if item.exchange() == exchange && !item.is_liquidated() {
                item.liquidate();
            }
        }
        tracing::warn!(%exchange, "exchange funding liquidated");
        Ok(())
    }

    /// Applies realised PNL to the collateral behind `key`, returning the amount applied.
    pub fn realise_pnl(&self, key: &PairKey, pnl: Decimal) -> Result<Decimal, FundingError> {
        match self.funding_for(key)? {
            Funding::Collateral(pair) => {
                let applied = pair.take_profit(pnl);
                tracing::debug!(%key, %pnl, %applied, "pnl realised");
                Ok(applied)
            }
            Funding::Spot(_) => Err(FundingError::NotCollateral(key.to_string())),
        }
    }

    /// Tracks the latest close of `key`'s base (or contract) currency for valuation.
    pub fn update_close_price(
        &self,
        key: &PairKey,
        time: DateTime<Utc>,
        price: Decimal,
    ) -> Result<(), FundingError> {
        match self.funding_for(key)? {
            Funding::Spot(pair) => pair.base().track_price(time, price),
            Funding::Collateral(pair) => pair.contract().track_price(time, price),
        }
        Ok(())
    }

    /// Records every item's balance and value at `time`. A second call for the same
    /// time replaces the earlier snapshot.
    pub fn create_snapshot(&self, time: DateTime<Utc>) {
        let items: Vec<ItemSnapshot> = self
            .items
            .read()
            .iter()
            .map(|item| {
                let balance = item.balance();
                let price = item.latest_price();
                ItemSnapshot {
                    item_id: item.id(),
                    exchange: item.exchange().to_string(),
                    asset: item.asset(),
                    currency: item.currency().to_string(),
                    pair: item.pair().cloned(),
                    available: balance.available,
                    reserved: balance.reserved,
                    price,
                    value: item.value_of(balance.total(), price),
                }
            })
            .collect();
        let total_value = items.iter().map(|i| i.value).sum();
        let snapshot = FundingSnapshot {
            time,
            items,
            total_value,
        };
        let mut snapshots = self.snapshots.lock();
        match snapshots.last_mut() {
            Some(last) if last.time == time => *last = snapshot,
            _ => snapshots.push(snapshot),
        }
    }

    pub fn snapshots(&self) -> Vec<FundingSnapshot> {
        self.snapshots.lock().clone()
    }

    pub fn report(&self) -> FundingReport {
        let items: Vec<ItemReport> = self
            .items
            .read()
            .iter()
            .map(|item| {
                let balance = item.balance();
                ItemReport {
                    exchange: item.exchange().to_string(),
                    asset: item.asset(),
                    currency: item.currency().to_string(),
                    pair: item.pair().cloned(),
                    initial_funds: item.initial_funds(),
                    final_funds: balance.total(),
                    transfer_fees_paid: balance.transfer_fees_paid,
                    initial_value: item.value_of(item.initial_funds(), item.first_price()),
                    final_value: item.value_of(balance.total(), item.latest_price()),
                    is_collateral: item.is_collateral(),
                    is_liquidated: balance.is_liquidated,
                }
            })
            .collect();
        FundingReport {
            exchange_level_funding: self.exchange_level_funding,
            initial_total_value: items.iter().map(|i| i.initial_value).sum(),
            final_total_value: items.iter().map(|i| i.final_value).sum(),
            items,
            snapshots_taken: self.snapshots.lock().len(),
        }
    }

    /// Reserves funds behind `key` for an order on `side`.
    pub fn reserve(&self, key: &PairKey, amount: Decimal, side: Direction) -> Result<(), FundingError> {
        match self.funding_for(key)? {
            Funding::Spot(pair) => pair.reserve(amount, side),
            Funding::Collateral(pair) => pair.reserve(amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn key(base: &str) -> PairKey {
        PairKey::new("binance", AssetKind::Spot, CurrencyPair::new(base, "USDT"))
    }

    fn spot_manager(exchange_level: bool) -> (FundManager, Arc<Item>, Arc<Item>) {
        let manager = FundManager::new(exchange_level);
        let base = manager
            .add_item(Item::new("binance", AssetKind::Spot, "BTC", dec!(1), dec!(0)).unwrap())
            .unwrap();
        let quote = manager
            .add_item(Item::new("binance", AssetKind::Spot, "USDT", dec!(1000), dec!(1)).unwrap())
            .unwrap();
        manager.add_spot_pair(&key("BTC"), &base, &quote).unwrap();
        (manager, base, quote)
    }

    #[test]
    fn duplicate_items_are_rejected() {
        let (manager, _, _) = spot_manager(false);
        let again = Item::new("Binance", AssetKind::Spot, "btc", dec!(5), dec!(0)).unwrap();
        assert!(matches!(manager.add_item(again), Err(FundingError::AlreadyExists(_))));

        let scoped = Item::new("binance", AssetKind::Spot, "BTC", dec!(5), dec!(0))
            .unwrap()
            .for_pair(CurrencyPair::new("BTC", "EUR"));
        assert!(manager.add_item(scoped).is_ok());
    }

    #[test]
    fn private_funding_refuses_shared_quote() {
        let (manager, _, quote) = spot_manager(false);
        let eth = manager
            .add_item(Item::new("binance", AssetKind::Spot, "ETH", dec!(1), dec!(0)).unwrap())
            .unwrap();
        assert!(matches!(
            manager.add_spot_pair(&key("ETH"), &eth, &quote),
            Err(FundingError::SharedItem(_))
        ));

        let (shared, _, quote) = spot_manager(true);
        let eth = shared
            .add_item(Item::new("binance", AssetKind::Spot, "ETH", dec!(1), dec!(0)).unwrap())
            .unwrap();
        assert!(shared.add_spot_pair(&key("ETH"), &eth, &quote).is_ok());
    }

    #[test]
    fn funding_for_unknown_pair() {
        let (manager, _, _) = spot_manager(false);
        assert!(matches!(
            manager.funding_for(&key("DOGE")),
            Err(FundingError::FundsNotFound(_))
        ));
    }

    #[test]
    fn transfer_charges_sender_fee() {
        let manager = FundManager::new(true);
        let a = manager
            .add_item(Item::new("binance", AssetKind::Spot, "USDT", dec!(100), dec!(1)).unwrap())
            .unwrap();
        let b = manager
            .add_item(Item::new("kraken", AssetKind::Spot, "USDT", dec!(0), dec!(0)).unwrap())
            .unwrap();
        let btc = manager
            .add_item(Item::new("kraken", AssetKind::Spot, "BTC", dec!(0), dec!(0)).unwrap())
            .unwrap();

        manager.transfer(dec!(50), &a, &b, TransferMode::Standard).unwrap();
        assert_eq!(a.available(), dec!(49));
        assert_eq!(b.available(), dec!(50));
        assert_eq!(manager.report().items[0].transfer_fees_paid, dec!(1));

        assert!(matches!(
            manager.transfer(dec!(49), &a, &b, TransferMode::Standard),
            Err(FundingError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            manager.transfer(dec!(1), &a, &a, TransferMode::Standard),
            Err(FundingError::SameItem(_))
        ));
        assert!(matches!(
            manager.transfer(dec!(1), &a, &btc, TransferMode::Standard),
            Err(FundingError::CurrencyMismatch { .. })
        ));
        assert!(manager.transfer(dec!(1), &a, &btc, TransferMode::CollateralBridge).is_ok());
    }

    #[test]
    fn snapshots_are_deduplicated_per_time() {
        let (manager, _, _) = spot_manager(false);
        let time = Utc::now();
        manager.update_close_price(&key("BTC"), time, dec!(100)).unwrap();
        manager.create_snapshot(time);
        manager.update_close_price(&key("BTC"), time, dec!(200)).unwrap();
        manager.create_snapshot(time);
        let snapshots = manager.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].total_value, dec!(1200));
    }

    #[test]
    fn futures_liquidation_through_the_manager() {
        let manager = FundManager::new(false);
        let key = PairKey::new("binance", AssetKind::Futures, CurrencyPair::new("BTC", "USDT"));
        let contract = manager
            .add_item(
                Item::new("binance", AssetKind::Futures, "BTC", dec!(0), dec!(0))
                    .unwrap()
                    .as_contract(),
            )
            .unwrap();
        let collateral = manager
            .add_item(
                Item::new("binance", AssetKind::Futures, "USDT", dec!(500), dec!(0))
                    .unwrap()
                    .as_collateral(),
            )
            .unwrap();
        manager.link_collateral(&key, &contract, &collateral).unwrap();
        assert_eq!(manager.realise_pnl(&key, dec!(50)).unwrap(), dec!(50));
        manager.liquidate_exchange("Binance").unwrap();
        assert!(collateral.is_liquidated());
        assert_eq!(collateral.balance().total(), dec!(0));
        assert!(!manager.funding_for(&key).unwrap().can_place_order(Direction::Long));
    }

    #[test]
    fn shared_quote_settles_concurrently() {
        let (manager, _, quote) = spot_manager(true);
        let eth = manager
            .add_item(Item::new("binance", AssetKind::Spot, "ETH", dec!(0), dec!(0)).unwrap())
            .unwrap();
        manager.add_spot_pair(&key("ETH"), &eth, &quote).unwrap();
        let btc_pair = manager.funding_for(&key("BTC")).unwrap();
        let eth_pair = manager.funding_for(&key("ETH")).unwrap();
        let btc_base = btc_pair.as_spot().unwrap().base().balance().total();

        std::thread::scope(|scope| {
            for pair in [&btc_pair, &eth_pair, &btc_pair, &eth_pair] {
                let pair = pair.as_spot().unwrap();
                scope.spawn(move || {
                    for _ in 0..200 {
                        pair.reserve(dec!(10), Direction::Buy).unwrap();
                        pair.release(dec!(10), dec!(10), dec!(0.1), Direction::Buy).unwrap();
                        pair.reserve(dec!(0.1), Direction::Sell).unwrap();
                        pair.release(dec!(0.1), dec!(0.1), dec!(10), Direction::Sell).unwrap();
                    }
                });
            }
        });

        assert_eq!(quote.balance().total(), dec!(1000));
        assert_eq!(quote.reserved(), dec!(0));
        assert_eq!(btc_pair.as_spot().unwrap().base().balance().total(), btc_base);
        assert_eq!(eth.balance().total(), dec!(0));
        assert_eq!(eth.reserved(), dec!(0));
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Buy(u32),
        Sell(u32),
        Transfer(u32),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1u32..10_000).prop_map(Step::Buy),
            (1u32..10_000).prop_map(Step::Sell),
            (1u32..50_000).prop_map(Step::Transfer),
        ]
    }

    proptest! {
        #[test]
        fn settlements_only_lose_the_fees(
            price_cents in 1i64..500_000,
            fee_bps in 0i64..50,
            steps in proptest::collection::vec(step(), 1..40)
        ) {
            let price = Decimal::new(price_cents, 2);
            let fee_rate = Decimal::new(fee_bps, 4);
            let (manager, base, quote) = spot_manager(true);
            let spare = manager
                .add_item(Item::new("kraken", AssetKind::Spot, "USDT", dec!(0), dec!(0)).unwrap())
                .unwrap();
            let funding = manager.funding_for(&key("BTC")).unwrap();
            let pair = funding.as_spot().unwrap();
            let value = || base.balance().total() * price + quote.balance().total() + spare.balance().total();
            let start = value();
            let mut fees = Decimal::ZERO;
            let mut transfer_fees = Decimal::ZERO;

            for step in steps {
                match step {
                    Step::Buy(size) => {
                        let amount = Decimal::new(i64::from(size), 4);
                        let notional = amount * price;
                        let fee = notional * fee_rate;
                        let reserved = notional + fee + Decimal::from(size % 7);
                        if pair.reserve(reserved, Direction::Buy).is_err() {
                            continue;
                        }
                        pair.release(reserved, notional + fee, amount, Direction::Buy).unwrap();
                        fees += fee;
                    }
                    Step::Sell(size) => {
                        let amount = Decimal::new(i64::from(size), 4);
                        if pair.reserve(amount, Direction::Sell).is_err() {
                            continue;
                        }
                        let notional = amount * price;
                        let fee = notional * fee_rate;
                        pair.release(amount, amount, notional - fee, Direction::Sell).unwrap();
                        fees += fee;
                    }
                    Step::Transfer(cents) => {
                        let amount = Decimal::new(i64::from(cents), 2);
                        if manager.transfer(amount, &quote, &spare, TransferMode::Standard).is_err() {
                            continue;
                        }
                        fees += quote.transfer_fee();
                        transfer_fees += quote.transfer_fee();
                    }
                }
                prop_assert_eq!(value(), start - fees);
                prop_assert_eq!(quote.reserved(), Decimal::ZERO);
                prop_assert_eq!(base.reserved(), Decimal::ZERO);
                prop_assert!(quote.available() >= Decimal::ZERO);
                prop_assert!(base.available() >= Decimal::ZERO);
            }
            prop_assert_eq!(quote.balance().transfer_fees_paid, transfer_fees);
        }
    }
}
