use crate::error::FundingError;
use crate::item::{Item, lock_both};
use core_types::Direction;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// The outcome of settling one order against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Settlement {
    pub reserved: Decimal,
    pub spent: Decimal,
    pub received: Decimal,
}

/// A view over the base and quote items backing a spot pair.
#[derive(Debug, Clone)]
pub struct SpotPair {
    base: Arc<Item>,
    quote: Arc<Item>,
}

impl SpotPair {
    pub(crate) fn new(base: Arc<Item>, quote: Arc<Item>) -> Self {
        Self { base, quote }
    }

    pub fn base(&self) -> &Arc<Item> {
        &self.base
    }

    pub fn quote(&self) -> &Arc<Item> {
        &self.quote
    }

    /// The item an order on `side` draws from.
    pub fn funding_item(&self, side: Direction) -> Result<&Arc<Item>, FundingError> {
        match side.funding_side() {
            Some(Direction::Buy) => Ok(&self.quote),
            Some(Direction::Sell) => Ok(&self.base),
            _ => Err(FundingError::InvalidDirection(side)),
        }
    }

    /// Buy-side orders reserve quote, sell-side orders reserve base.
    pub fn reserve(&self, amount: Decimal, side: Direction) -> Result<(), FundingError> {
        self.funding_item(side)?.reserve(amount)
    }

    /// Settles a filled (or rejected) order.
    ///
    /// Buy: `reserved` quote is released, `reserved - sold_amount` of it returns to
    /// quote, and base is credited `bought_amount`. Sell: the mirror image, with the
    /// quote credited the proceeds net of fee. Both items stay locked for the whole
    /// settlement and nothing is mutated unless every check passes.
    pub fn release(
        &self,
        reserved: Decimal,
        sold_amount: Decimal,
        bought_amount: Decimal,
        side: Direction,
    ) -> Result<Settlement, FundingError> {
        let (source, destination) = match side.funding_side() {
            Some(Direction::Buy) => (&self.quote, &self.base),
            Some(Direction::Sell) => (&self.base, &self.quote),
            _ => return Err(FundingError::InvalidDirection(side)),
        };
        if sold_amount < Decimal::ZERO || sold_amount > reserved {
            return Err(FundingError::NegativeAmount(sold_amount));
        }
        if bought_amount < Decimal::ZERO {
            return Err(FundingError::NegativeAmount(bought_amount));
        }
        if reserved.is_zero() {
            return Ok(Settlement::default());
        }

        let (mut from, mut to) = lock_both(source, destination)?;
        from.release(source.currency(), reserved, reserved - sold_amount)?;
        if bought_amount > Decimal::ZERO {
            to.increase(bought_amount)?;
        }
        tracing::debug!(
            from = %source.currency(),
            to = %destination.currency(),
            %reserved,
            spent = %sold_amount,
            received = %bought_amount,
            "spot settlement"
        );
        Ok(Settlement {
            reserved,
            spent: sold_amount,
            received: bought_amount,
        })
    }

    pub fn can_place_order(&self, side: Direction) -> bool {
        self.funding_item(side)
            .map(|item| item.can_place_order())
            .unwrap_or(false)
    }
}

/// A view over a contract item and the collateral backing it, plus the side
/// currently held.
#[derive(Debug, Clone)]
pub struct CollateralPair {
    contract: Arc<Item>,
    collateral: Arc<Item>,
    direction: Arc<Mutex<Option<Direction>>>,
}

impl CollateralPair {
    pub(crate) fn new(
        contract: Arc<Item>,
        collateral: Arc<Item>,
        direction: Arc<Mutex<Option<Direction>>>,
    ) -> Self {
        Self {
            contract,
            collateral,
            direction,
        }
    }

    pub fn contract(&self) -> &Arc<Item> {
        &self.contract
    }

    pub fn collateral(&self) -> &Arc<Item> {
        &self.collateral
    }

    pub fn held_direction(&self) -> Option<Direction> {
        *self.direction.lock()
    }

    /// Current contract exposure.
    pub fn current_holdings(&self) -> Decimal {
        self.contract.available()
    }

    pub fn reserve(&self, amount: Decimal) -> Result<(), FundingError> {
        self.collateral.reserve(amount)
    }

    pub fn release(&self, amount: Decimal, diff: Decimal) -> Result<(), FundingError> {
        self.collateral.release(amount, diff)
    }

    /// Records the exposure after a fill on `side`.
    ///
    /// A fill on the held side sets exposure to `amount`; a fill on the other side
    /// closes the position outright and clears the held direction.
    pub fn update_contracts(&self, side: Direction, amount: Decimal) -> Result<(), FundingError> {
        if !matches!(side, Direction::Long | Direction::Short) {
            return Err(FundingError::InvalidDirection(side));
        }
        if amount < Decimal::ZERO {
            return Err(FundingError::NegativeAmount(amount));
        }
        let mut held = self.direction.lock();
        let mut contract = self.contract.lock();
        match *held {
            Some(current) if current != side => {
                contract.available = Decimal::ZERO;
                *held = None;
            }
            _ => {
                contract.available = amount;
                *held = if amount.is_zero() { None } else { Some(side) };
            }
        }
        Ok(())
    }

    /// Credits or debits realised PNL to collateral, never below zero.
    ///
    /// Returns the amount actually applied.
    pub fn take_profit(&self, pnl: Decimal) -> Decimal {
        let mut collateral = self.collateral.lock();
        let before = collateral.available;
        collateral.available = (before + pnl).max(Decimal::ZERO);
        collateral.available - before
    }

    /// Zeroes both legs, marks them liquidated and clears the held direction.
    pub fn liquidate(&self) -> Result<(), FundingError> {
        {
            let mut held = self.direction.lock();
            let (mut contract, mut collateral) = lock_both(&self.contract, &self.collateral)?;
            contract.liquidate();
            collateral.liquidate();
            *held = None;
        }
        tracing::warn!(
            contract = %self.contract,
            collateral = %self.collateral,
            "collateral pair liquidated"
        );
        Ok(())
    }

    pub fn can_place_order(&self) -> bool {
        self.collateral.can_place_order()
    }
}

/// The funding behind one pair.
#[derive(Debug, Clone)]
pub enum Funding {
    Spot(SpotPair),
    Collateral(CollateralPair),
}

impl Funding {
    pub fn as_spot(&self) -> Option<&SpotPair> {
        match self {
            Funding::Spot(pair) => Some(pair),
            Funding::Collateral(_) => None,
        }
    }

    pub fn as_collateral(&self) -> Option<&CollateralPair> {
        match self {
            Funding::Collateral(pair) => Some(pair),
            Funding::Spot(_) => None,
        }
    }

    pub fn can_place_order(&self, side: Direction) -> bool {
        match self {
            Funding::Spot(pair) => pair.can_place_order(side),
            Funding::Collateral(pair) => pair.can_place_order(),
        }
    }

    /// Funds available to an order on `side`, in the currency it draws from.
    pub fn available_for(&self, side: Direction) -> Result<Decimal, FundingError> {
        match self {
            Funding::Spot(pair) => Ok(pair.funding_item(side)?.available()),
            Funding::Collateral(pair) => Ok(pair.collateral.available()),
        }
    }

    /// Initial (base or contract, quote or collateral) funds.
    pub fn initial_funds(&self) -> (Decimal, Decimal) {
        match self {
            Funding::Spot(pair) => (pair.base.initial_funds(), pair.quote.initial_funds()),
            Funding::Collateral(pair) => (
                pair.contract.initial_funds(),
                pair.collateral.initial_funds(),
            ),
        }
    }

    /// Current (base or contract, quote or collateral) totals including reservations.
    pub fn holdings(&self) -> (Decimal, Decimal) {
        match self {
            Funding::Spot(pair) => (pair.base.balance().total(), pair.quote.balance().total()),
            Funding::Collateral(pair) => (
                pair.contract.balance().total(),
                pair.collateral.balance().total(),
            ),
        }
    }

    pub fn is_liquidated(&self) -> bool {
        match self {
            Funding::Spot(pair) => pair.base.is_liquidated() && pair.quote.is_liquidated(),
            Funding::Collateral(pair) => pair.collateral.is_liquidated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::AssetKind;
    use rust_decimal_macros::dec;

    fn spot(base: Decimal, quote: Decimal) -> SpotPair {
        SpotPair::new(
            Arc::new(Item::new("binance", AssetKind::Spot, "BTC", base, dec!(0)).unwrap()),
            Arc::new(Item::new("binance", AssetKind::Spot, "USDT", quote, dec!(0)).unwrap()),
        )
    }

    fn futures(collateral: Decimal) -> CollateralPair {
        CollateralPair::new(
            Arc::new(
                Item::new("binance", AssetKind::Futures, "BTC", dec!(0), dec!(0))
                    .unwrap()
                    .as_contract(),
            ),
            Arc::new(
                Item::new("binance", AssetKind::Futures, "USDT", collateral, dec!(0))
                    .unwrap()
                    .as_collateral(),
            ),
            Arc::new(Mutex::new(None)),
        )
    }

    #[test]
    fn buy_settlement_returns_unspent_quote() {
        let pair = spot(dec!(0), dec!(1000));
        pair.reserve(dec!(500), Direction::Buy).unwrap();
        let settlement = pair
            .release(dec!(500), dec!(450.45), dec!(4.5), Direction::Buy)
            .unwrap();
        assert_eq!(settlement.spent, dec!(450.45));
        assert_eq!(pair.quote().available(), dec!(549.55));
        assert_eq!(pair.quote().reserved(), dec!(0));
        assert_eq!(pair.base().available(), dec!(4.5));
    }

    #[test]
    fn sell_settlement_credits_net_proceeds() {
        let pair = spot(dec!(2), dec!(0));
        pair.reserve(dec!(2), Direction::Sell).unwrap();
        pair.release(dec!(2), dec!(2), dec!(199.8), Direction::Sell).unwrap();
        assert_eq!(pair.base().balance().total(), dec!(0));
        assert_eq!(pair.quote().available(), dec!(199.8));
    }

    #[test]
    fn overspending_leaves_both_legs_untouched() {
        let pair = spot(dec!(0), dec!(100));
        pair.reserve(dec!(50), Direction::Buy).unwrap();
        assert!(pair.release(dec!(50), dec!(60), dec!(1), Direction::Buy).is_err());
        assert!(pair.release(dec!(80), dec!(60), dec!(1), Direction::Buy).is_err());
        assert_eq!(pair.quote().reserved(), dec!(50));
        assert_eq!(pair.base().available(), dec!(0));
    }

    #[test]
    fn rejected_order_with_nothing_reserved_is_a_no_op() {
        let pair = spot(dec!(0), dec!(0));
        let settlement = pair.release(dec!(0), dec!(0), dec!(0), Direction::CouldNotBuy).unwrap();
        assert_eq!(settlement, Settlement::default());
    }

    #[test]
    fn update_contracts_flip_closes() {
        let pair = futures(dec!(1000));
        pair.update_contracts(Direction::Long, dec!(3)).unwrap();
        assert_eq!(pair.held_direction(), Some(Direction::Long));
        assert_eq!(pair.current_holdings(), dec!(3));

        pair.update_contracts(Direction::Long, dec!(5)).unwrap();
        assert_eq!(pair.current_holdings(), dec!(5));

        pair.update_contracts(Direction::Short, dec!(5)).unwrap();
        assert_eq!(pair.held_direction(), None);
        assert_eq!(pair.current_holdings(), dec!(0));
    }

    #[test]
    fn take_profit_floors_at_zero() {
        let pair = futures(dec!(100));
        assert_eq!(pair.take_profit(dec!(25)), dec!(25));
        assert_eq!(pair.take_profit(dec!(-500)), dec!(-125));
        assert_eq!(pair.collateral().available(), dec!(0));
    }

    #[test]
    fn liquidation_zeroes_both_legs() {
        let pair = futures(dec!(100));
        pair.reserve(dec!(40)).unwrap();
        pair.update_contracts(Direction::Short, dec!(2)).unwrap();
        pair.liquidate().unwrap();
        assert_eq!(pair.contract().balance().total(), dec!(0));
        assert_eq!(pair.collateral().balance().total(), dec!(0));
        assert!(pair.contract().is_liquidated());
        assert!(pair.collateral().is_liquidated());
        assert_eq!(pair.held_direction(), None);
        assert!(!pair.can_place_order());
    }
}
