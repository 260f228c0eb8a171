use crate::error::FundingError;
use chrono::{DateTime, Utc};
use core_types::{AssetKind, CurrencyPair};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// The mutable part of an item, always accessed under the item's lock.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Balance {
    pub available: Decimal,
    pub reserved: Decimal,
    pub transfer_fees_paid: Decimal,
    pub is_liquidated: bool,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.available + self.reserved
    }

    pub(crate) fn reserve(&mut self, currency: &str, amount: Decimal) -> Result<(), FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::ZeroAmount);
        }
        if self.is_liquidated {
            return Err(FundingError::Liquidated(currency.to_string()));
        }
        if self.available < amount {
            return Err(FundingError::InsufficientFunds {
                currency: currency.to_string(),
                required: amount,
                available: self.available,
            });
        }
        self.available -= amount;
        self.reserved += amount;
        Ok(())
    }

    pub(crate) fn check_release(
        &self,
        currency: &str,
        amount: Decimal,
        diff: Decimal,
    ) -> Result<(), FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::ZeroAmount);
        }
        if diff < Decimal::ZERO || diff > amount {
            return Err(FundingError::NegativeAmount(diff));
        }
        if self.reserved < amount {
            return Err(FundingError::InsufficientReserved {
                currency: currency.to_string(),
                required: amount,
                reserved: self.reserved,
            });
        }
        Ok(())
    }

    /// Removes `amount` from reserved and hands `diff` of it back to available.
    pub(crate) fn release(
        &mut self,
        currency: &str,
        amount: Decimal,
        diff: Decimal,
    ) -> Result<(), FundingError> {
        self.check_release(currency, amount, diff)?;
        self.reserved -= amount;
        self.available += diff;
        Ok(())
    }

    pub(crate) fn increase(&mut self, amount: Decimal) -> Result<(), FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::ZeroAmount);
        }
        self.available += amount;
        Ok(())
    }

    pub(crate) fn decrease(&mut self, currency: &str, amount: Decimal) -> Result<(), FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::ZeroAmount);
        }
        if self.available < amount {
            return Err(FundingError::InsufficientFunds {
                currency: currency.to_string(),
                required: amount,
                available: self.available,
            });
        }
        self.available -= amount;
        Ok(())
    }

    pub(crate) fn liquidate(&mut self) {
        self.available = Decimal::ZERO;
        self.reserved = Decimal::ZERO;
        self.is_liquidated = true;
    }
}

/// A close price observed for the currency an item holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackedPrice {
    pub time: DateTime<Utc>,
    pub price: Decimal,
}

/// One currency balance on one exchange and asset kind.
///
/// The identity fields are immutable; the balance sits behind its own mutex so
/// operations on unrelated items never contend.
pub struct Item {
    id: u64,
    exchange: String,
    asset: AssetKind,
    currency: String,
    /// The pair this item is private to, when exchange level funding is off.
    pair: Option<CurrencyPair>,
    initial_funds: Decimal,
    transfer_fee: Decimal,
    is_collateral: bool,
    is_contract: bool,
    balance: Mutex<Balance>,
    paired_with: RwLock<Weak<Item>>,
    prices: Mutex<Vec<TrackedPrice>>,
}

impl Item {
    pub fn new(
        exchange: impl AsRef<str>,
        asset: AssetKind,
        currency: impl AsRef<str>,
        initial_funds: Decimal,
        transfer_fee: Decimal,
    ) -> Result<Self, FundingError> {
        if initial_funds < Decimal::ZERO {
            return Err(FundingError::NegativeAmount(initial_funds));
        }
        if transfer_fee < Decimal::ZERO {
            return Err(FundingError::NegativeAmount(transfer_fee));
        }
        Ok(Self {
            id: NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed),
            exchange: exchange.as_ref().trim().to_lowercase(),
            asset,
            currency: currency.as_ref().trim().to_uppercase(),
            pair: None,
            initial_funds,
            transfer_fee,
            is_collateral: false,
            is_contract: false,
            balance: Mutex::new(Balance {
                available: initial_funds,
                ..Balance::default()
            }),
            paired_with: RwLock::new(Weak::new()),
            prices: Mutex::new(Vec::new()),
        })
    }

    /// Scopes the item to a single pair.
    pub fn for_pair(mut self, pair: CurrencyPair) -> Self {
        self.pair = Some(pair);
        self
    }

    pub fn as_collateral(mut self) -> Self {
        self.is_collateral = true;
        self
    }

    pub fn as_contract(mut self) -> Self {
        self.is_contract = true;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn asset(&self) -> AssetKind {
        self.asset
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn pair(&self) -> Option<&CurrencyPair> {
        self.pair.as_ref()
    }

    pub fn initial_funds(&self) -> Decimal {
        self.initial_funds
    }

    pub fn transfer_fee(&self) -> Decimal {
        self.transfer_fee
    }

    pub fn is_collateral(&self) -> bool {
        self.is_collateral
    }

    pub fn is_contract(&self) -> bool {
        self.is_contract
    }

    pub fn balance(&self) -> Balance {
        *self.balance.lock()
    }

    pub fn available(&self) -> Decimal {
        self.balance.lock().available
    }

    pub fn reserved(&self) -> Decimal {
        self.balance.lock().reserved
    }

    pub fn is_liquidated(&self) -> bool {
        self.balance.lock().is_liquidated
    }

    pub fn reserve(&self, amount: Decimal) -> Result<(), FundingError> {
        self.balance.lock().reserve(&self.currency, amount)
    }

    pub fn release(&self, amount: Decimal, diff: Decimal) -> Result<(), FundingError> {
        self.balance.lock().release(&self.currency, amount, diff)
    }

    pub fn increase_available(&self, amount: Decimal) -> Result<(), FundingError> {
        self.balance.lock().increase(amount)
    }

    pub fn decrease_available(&self, amount: Decimal) -> Result<(), FundingError> {
        self.balance.lock().decrease(&self.currency, amount)
    }

    pub fn liquidate(&self) {
        self.balance.lock().liquidate();
        tracing::warn!(item = %self, "funding item liquidated");
    }

    pub fn can_place_order(&self) -> bool {
        let balance = self.balance.lock();
        !balance.is_liquidated && balance.available > Decimal::ZERO
    }

    /// Same exchange, asset, currency and pair scope.
    pub fn equals(&self, other: &Item) -> bool {
        self.id == other.id
            || (self.exchange == other.exchange
                && self.asset == other.asset
                && self.currency == other.currency
                && self.pair == other.pair)
    }

    pub fn matches_currency(&self, other: &Item) -> bool {
        self.currency == other.currency
    }

    pub fn paired_with(&self) -> Option<Arc<Item>> {
        self.paired_with.read().upgrade()
    }

    pub(crate) fn set_paired_with(&self, other: &Arc<Item>) {
        *self.paired_with.write() = Arc::downgrade(other);
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Balance> {
        self.balance.lock()
    }

    pub fn track_price(&self, time: DateTime<Utc>, price: Decimal) {
        let mut prices = self.prices.lock();
        match prices.last_mut() {
            Some(last) if last.time == time => last.price = price,
            _ => prices.push(TrackedPrice { time, price }),
        }
    }

    pub fn first_price(&self) -> Option<Decimal> {
        self.prices.lock().first().map(|p| p.price)
    }

    pub fn latest_price(&self) -> Option<Decimal> {
        self.prices.lock().last().map(|p| p.price)
    }

    /// Values a quantity of this item's currency in the pair's quote terms.
    ///
    /// Items without tracked prices are quote currencies and value one to one.
    /// Contract exposure is not cash and values at zero.
    pub fn value_of(&self, quantity: Decimal, price: Option<Decimal>) -> Decimal {
        if self.is_contract {
            return Decimal::ZERO;
        }
        quantity * price.unwrap_or(Decimal::ONE)
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("id", &self.id)
            .field("exchange", &self.exchange)
            .field("asset", &self.asset)
            .field("currency", &self.currency)
            .field("pair", &self.pair)
            .field("balance", &self.balance())
            .finish()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pair {
            Some(pair) => write!(f, "{} {} {} ({})", self.exchange, self.asset, self.currency, pair),
            None => write!(f, "{} {} {}", self.exchange, self.asset, self.currency),
        }
    }
}

/// Locks two distinct items in id order and returns the guards in argument order.
pub(crate) fn lock_both<'a>(
    a: &'a Item,
    b: &'a Item,
) -> Result<(MutexGuard<'a, Balance>, MutexGuard<'a, Balance>), FundingError> {
    if a.id == b.id {
        return Err(FundingError::SameItem(a.to_string()));
    }
    if a.id < b.id {
        let first = a.lock();
        let second = b.lock();
        Ok((first, second))
    } else {
        let second = b.lock();
        let first = a.lock();
        Ok((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usdt(funds: Decimal) -> Item {
        Item::new("binance", AssetKind::Spot, "usdt", funds, Decimal::ZERO).unwrap()
    }

    #[test]
    fn reserve_and_release() {
        let item = usdt(dec!(100));
        item.reserve(dec!(40)).unwrap();
        assert_eq!(item.available(), dec!(60));
        assert_eq!(item.reserved(), dec!(40));

        item.release(dec!(40), dec!(15)).unwrap();
        assert_eq!(item.available(), dec!(75));
        assert_eq!(item.reserved(), dec!(0));
    }

    #[test]
    fn reserve_rejects_bad_amounts() {
        let item = usdt(dec!(10));
        assert_eq!(item.reserve(dec!(0)), Err(FundingError::ZeroAmount));
        assert!(matches!(
            item.reserve(dec!(11)),
            Err(FundingError::InsufficientFunds { .. })
        ));
        assert_eq!(item.available(), dec!(10));
    }

    #[test]
    fn release_validates_before_mutating() {
        let item = usdt(dec!(10));
        item.reserve(dec!(5)).unwrap();
        assert!(matches!(
            item.release(dec!(6), dec!(0)),
            Err(FundingError::InsufficientReserved { .. })
        ));
        assert_eq!(item.release(dec!(5), dec!(6)), Err(FundingError::NegativeAmount(dec!(6))));
        assert_eq!(item.release(dec!(5), dec!(-1)), Err(FundingError::NegativeAmount(dec!(-1))));
        assert_eq!(item.reserved(), dec!(5));
    }

    #[test]
    fn liquidation_blocks_orders() {
        let item = usdt(dec!(10));
        item.liquidate();
        assert!(!item.can_place_order());
        assert_eq!(item.balance().total(), dec!(0));
        assert!(matches!(item.reserve(dec!(1)), Err(FundingError::Liquidated(_))));
    }

    #[test]
    fn identity_and_pairing() {
        let a = Arc::new(usdt(dec!(1)));
        let b = Arc::new(Item::new("Binance", AssetKind::Spot, "USDT", dec!(5), dec!(0)).unwrap());
        let c = Arc::new(Item::new("binance", AssetKind::Spot, "BTC", dec!(5), dec!(0)).unwrap());
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert!(!a.matches_currency(&c));

        a.set_paired_with(&c);
        assert_eq!(a.paired_with().map(|p| p.id()), Some(c.id()));
        drop(c);
        assert!(a.paired_with().is_none());
        assert!(lock_both(&a, &a).is_err());
    }
}
