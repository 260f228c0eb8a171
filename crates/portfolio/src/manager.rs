use crate::compliance::ComplianceManager;
use crate::error::PortfolioError;
use crate::holdings::HoldingsTracker;
use crate::position::{Position, PositionChange, PositionTracker};
use crate::settings::{Registration, SettingsRegistry};
use configuration::CurrencySettings;
use core_types::{Direction, PairKey};
use events::{DataEvent, FillEvent, Holding, OrderEvent, SignalEvent, Snapshot, SnapshotOrder};
use funding::{CollateralPair, FundManager, Funding, SpotPair};
use risk::{RiskManager, SizeManager};
use rust_decimal::Decimal;

/// A settled fill together with the records it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub fill: FillEvent,
    pub holding: Holding,
    pub snapshot: Option<Snapshot>,
}

/// Assembles a `Portfolio` from its sizing and risk collaborators.
#[derive(Default)]
pub struct PortfolioBuilder {
    size_manager: Option<Box<dyn SizeManager>>,
    risk_manager: Option<Box<dyn RiskManager>>,
}

impl PortfolioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size_manager(mut self, manager: Box<dyn SizeManager>) -> Self {
        self.size_manager = Some(manager);
        self
    }

    pub fn risk_manager(mut self, manager: Box<dyn RiskManager>) -> Self {
        self.risk_manager = Some(manager);
        self
    }

    pub fn build(self) -> Result<Portfolio, PortfolioError> {
        Ok(Portfolio {
            settings: SettingsRegistry::new(),
            size_manager: self.size_manager.ok_or(PortfolioError::SizeManagerUnset)?,
            risk_manager: self.risk_manager.ok_or(PortfolioError::RiskManagerUnset)?,
            holdings: HoldingsTracker::new(),
            compliance: ComplianceManager::new(),
            positions: PositionTracker::new(),
        })
    }
}

/// Turns signals into funded orders and fills into holdings.
///
/// The portfolio never moves money itself beyond reserving it for an order and
/// settling that reservation when the fill comes back; the ledger stays the
/// single owner of every balance.
pub struct Portfolio {
    settings: SettingsRegistry,
    size_manager: Box<dyn SizeManager>,
    risk_manager: Box<dyn RiskManager>,
    holdings: HoldingsTracker,
    compliance: ComplianceManager,
    positions: PositionTracker,
}

impl Portfolio {
    pub fn builder() -> PortfolioBuilder {
        PortfolioBuilder::new()
    }

    /// Registers (or replaces) the settings of one pair.
    pub fn setup_currency_settings(&self, key: PairKey, settings: CurrencySettings) -> Registration {
        let registration = self.settings.register(key.clone(), settings);
        tracing::debug!(%key, ?registration, "currency settings registered");
        registration
    }

    pub fn currency_settings(&self, key: &PairKey) -> Option<CurrencySettings> {
        self.settings.get(key)
    }

    pub fn registered_keys(&self) -> Vec<PairKey> {
        self.settings.keys()
    }

    /// Sizes, risk-checks and funds a signal.
    ///
    /// Rejections by funding, sizing or risk come back as `Ok` with a `CouldNot*`
    /// direction and a reason. Only broken preconditions and ledger failures are
    /// errors.
    pub fn on_signal(
        &self,
        signal: &SignalEvent,
        funds: &FundManager,
    ) -> Result<OrderEvent, PortfolioError> {
        let key = &signal.base.key;
        let mut order = OrderEvent::from_signal(signal);
        match signal.direction {
            Direction::DoNothing | Direction::TransferredFunds | Direction::Liquidated => {
                return Ok(order);
            }
            Direction::MissingData => {
                funds.create_snapshot(signal.base.time);
                return Ok(order);
            }
            direction if direction.is_rejection() => return Ok(order),
            _ => {}
        }

        let settings = self
            .settings
            .get(key)
            .ok_or_else(|| PortfolioError::NoPortfolioSettings(key.clone()))?;
        check_direction(key, signal.direction)?;
        let funding = funds.funding_for(key)?;

        if key.asset.is_futures() {
            order.leverage = settings.leverage.order_leverage.max(Decimal::ONE);
        }
        if signal.direction == Direction::ClosePosition {
            match &funding {
                Funding::Collateral(_) => return self.close_futures_position(order),
                Funding::Spot(pair) => {
                    order.direction = Direction::Sell;
                    if order.amount <= Decimal::ZERO {
                        order.amount = pair.base().available();
                    }
                }
            }
        }
        self.size_and_reserve(order, &funding, &settings, funds)
    }

    fn close_futures_position(&self, mut order: OrderEvent) -> Result<OrderEvent, PortfolioError> {
        let key = order.base.key.clone();
        let Some(position) = self.positions.open_position(&key) else {
            order.direction = Direction::DoNothing;
            order.amount = Decimal::ZERO;
            order.base.append_reason("no open position to close");
            return Ok(order);
        };
        order.direction = position
            .direction
            .opposite()
            .ok_or(PortfolioError::InvalidDirection {
                key: key.clone(),
                direction: position.direction,
            })?;
        order.amount = position.amount;
        order.closing_position = true;
        order.allocated_funds = Decimal::ZERO;
        tracing::debug!(%key, direction = %order.direction, amount = %order.amount, "closing position");
        Ok(order)
    }

    fn size_and_reserve(
        &self,
        mut order: OrderEvent,
        funding: &Funding,
        settings: &CurrencySettings,
        funds: &FundManager,
    ) -> Result<OrderEvent, PortfolioError> {
        let key = order.base.key.clone();
        let side = order.direction;
        if !funding.can_place_order(side) {
            return Ok(rejected(order, "funding cannot place an order"));
        }

        let available = funding.available_for(side)?;
        let buying_power = if key.asset.is_futures() {
            available * order.leverage
        } else {
            available
        };
        let sized = match self.size_manager.size_order(&order, buying_power, settings) {
            Ok(sized) => sized,
            Err(e) => return Ok(rejected(order, e.to_string())),
        };
        if sized.order.amount <= Decimal::ZERO {
            return Ok(rejected(order, "order sized to zero"));
        }
        let holdings = self.latest_holdings();
        if let Err(e) = self.risk_manager.evaluate_order(
            &sized.order,
            &holdings,
            self.latest_snapshot(&key),
            settings,
        ) {
            return Ok(rejected(order, e.to_string()));
        }

        order = sized.order;
        let required = match side {
            Direction::Buy => order.amount * order.close_price + sized.fee,
            Direction::Sell => order.amount,
            _ => order.amount * order.close_price / order.leverage,
        };
        let reservation = required.min(available);
        funds.reserve(&key, reservation, side)?;
        order.allocated_funds = reservation;
        tracing::debug!(
            %key,
            direction = %side,
            amount = %order.amount,
            reserved = %reservation,
            "order funded"
        );
        Ok(order)
    }

    /// Settles a fill against the ledger and records the resulting holding and
    /// compliance snapshot.
    pub fn on_fill(
        &mut self,
        fill: &FillEvent,
        funds: &FundManager,
    ) -> Result<Transaction, PortfolioError> {
        let key = fill.base.key.clone();
        let funding = funds.funding_for(&key)?;
        let (base_initial, quote_initial) = funding.initial_funds();
        if base_initial <= Decimal::ZERO && quote_initial <= Decimal::ZERO {
            return Err(PortfolioError::InitialFundsZero(key));
        }

        match &funding {
            Funding::Spot(pair) => settle_spot(pair, fill)?,
            Funding::Collateral(pair) => self.settle_futures(&key, pair, fill, funds)?,
        }

        let mut holding = match self.holdings.latest(&key) {
            Some(latest) => latest.clone(),
            None => Holding::new(
                key.clone(),
                fill.base.offset,
                fill.base.time,
                base_initial,
                quote_initial,
                fill.close_price,
            ),
        };
        holding.unrealised_pnl = self.positions.unrealised_pnl(&key);
        holding.realised_pnl = self.positions.realised_pnl(&key);
        let (base_size, quote_size) = funding.holdings();
        holding.apply_fill(fill, base_size, quote_size);
        self.holdings.push(holding.clone());

        let snapshot = match SnapshotOrder::from_fill(fill).filter(|_| fill.is_filled()) {
            Some(order) => Some(
                self.compliance
                    .add_order(&key, fill.base.offset, fill.base.time, order)
                    .clone(),
            ),
            None => self.compliance.latest(&key).cloned(),
        };

        Ok(Transaction {
            fill: fill.clone(),
            holding,
            snapshot,
        })
    }

    fn settle_futures(
        &mut self,
        key: &PairKey,
        pair: &CollateralPair,
        fill: &FillEvent,
        funds: &FundManager,
    ) -> Result<(), PortfolioError> {
        if fill.liquidated {
            pair.liquidate()?;
            self.positions.remove(key);
            return Ok(());
        }
        if fill.allocated_funds > Decimal::ZERO {
            pair.release(fill.allocated_funds, fill.allocated_funds)?;
        }
        if !fill.is_filled() {
            return Ok(());
        }
        if fill.exchange_fee > Decimal::ZERO {
            pair.take_profit(-fill.exchange_fee);
        }
        match self
            .positions
            .apply(key, fill.direction, fill.amount, fill.purchase_price)
        {
            PositionChange::Closed(pnl) => {
                let applied = funds.realise_pnl(key, pnl)?;
                pair.update_contracts(fill.direction, Decimal::ZERO)?;
                tracing::info!(%key, %pnl, %applied, "position closed");
            }
            PositionChange::Exposure(total) => pair.update_contracts(fill.direction, total)?,
        }
        Ok(())
    }

    /// Revalues the pair at a new candle and appends the result.
    pub fn update_holdings(
        &mut self,
        data: &DataEvent,
        funds: &FundManager,
    ) -> Result<Holding, PortfolioError> {
        let key = &data.base.key;
        funds.update_close_price(key, data.base.time, data.close)?;
        let funding = funds.funding_for(key)?;
        let (base_initial, quote_initial) = funding.initial_funds();
        if base_initial <= Decimal::ZERO && quote_initial <= Decimal::ZERO {
            return Err(PortfolioError::InitialFundsZero(key.clone()));
        }

        let unrealised = self.positions.mark(key, data.close);
        let mut holding = match self.holdings.latest(key) {
            Some(latest) => latest.clone(),
            None => Holding::new(
                key.clone(),
                data.base.offset,
                data.base.time,
                base_initial,
                quote_initial,
                data.close,
            ),
        };
        let (base_size, quote_size) = funding.holdings();
        holding.base_size = base_size;
        holding.quote_size = quote_size;
        holding.unrealised_pnl = unrealised;
        holding.realised_pnl = self.positions.realised_pnl(key);
        holding.revalue(data.base.offset, data.base.time, data.close);
        self.holdings.push(holding.clone());
        Ok(holding)
    }

    /// Fails with `PositionLiquidated` once an open futures position's loss at
    /// the new close has eaten all of its collateral.
    pub fn check_liquidation(
        &self,
        data: &DataEvent,
        funds: &FundManager,
    ) -> Result<(), PortfolioError> {
        let key = &data.base.key;
        if !key.asset.is_futures() {
            return Ok(());
        }
        let Some(position) = self.positions.open_position(key) else {
            return Ok(());
        };
        let pnl = position.pnl_at(data.close);
        let collateral = funds
            .funding_for(key)?
            .as_collateral()
            .map(|pair| pair.collateral().balance().total())
            .unwrap_or_default();
        if pnl < Decimal::ZERO && -pnl >= collateral {
            tracing::error!(%key, %pnl, %collateral, close = %data.close, "position liquidated");
            return Err(PortfolioError::PositionLiquidated(key.clone()));
        }
        Ok(())
    }

    /// Liquidates every item on the data event's exchange, drops its open
    /// positions and records a zeroed holding for each affected pair.
    pub fn liquidate(
        &mut self,
        data: &DataEvent,
        funds: &FundManager,
    ) -> Result<Vec<Holding>, PortfolioError> {
        let exchange = data.base.key.exchange.clone();
        funds.liquidate_exchange(&exchange)?;
        self.positions.clear_exchange(&exchange);

        let mut zeroed = Vec::new();
        for key in funds.keys().into_iter().filter(|k| k.exchange == exchange) {
            let Some(latest) = self.holdings.latest(&key) else {
                continue;
            };
            let mut holding = latest.clone();
            let close = if key == data.base.key {
                data.close
            } else {
                holding.close_price
            };
            holding.base_size = Decimal::ZERO;
            holding.quote_size = Decimal::ZERO;
            holding.committed_funds = Decimal::ZERO;
            holding.unrealised_pnl = Decimal::ZERO;
            holding.revalue(data.base.offset, data.base.time, close);
            self.holdings.push(holding.clone());
            zeroed.push(holding);
        }
        Ok(zeroed)
    }

    /// The latest holding of every pair.
    pub fn latest_holdings(&self) -> Vec<Holding> {
        self.holdings.latest_all()
    }

    pub fn holdings_for(&self, key: &PairKey) -> &[Holding] {
        self.holdings.history(key)
    }

    pub fn latest_snapshot(&self, key: &PairKey) -> Option<&Snapshot> {
        self.compliance.latest(key)
    }

    pub fn compliance(&self) -> &ComplianceManager {
        &self.compliance
    }

    pub fn open_position(&self, key: &PairKey) -> Option<&Position> {
        self.positions.open_position(key)
    }
}

fn check_direction(key: &PairKey, direction: Direction) -> Result<(), PortfolioError> {
    let valid = match direction {
        Direction::ClosePosition => true,
        Direction::Buy | Direction::Sell => !key.asset.is_futures(),
        Direction::Long | Direction::Short => key.asset.is_futures(),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(PortfolioError::InvalidDirection {
            key: key.clone(),
            direction,
        })
    }
}

fn rejected(mut order: OrderEvent, reason: impl Into<String>) -> OrderEvent {
    let reason = reason.into();
    tracing::warn!(
        key = %order.base.key,
        direction = %order.direction,
        %reason,
        "order rejected"
    );
    order.reject(reason);
    order
}

fn settle_spot(pair: &SpotPair, fill: &FillEvent) -> Result<(), PortfolioError> {
    let Some(side) = fill.direction.funding_side() else {
        return Ok(());
    };
    let reserved = fill.allocated_funds;
    if reserved <= Decimal::ZERO {
        return Ok(());
    }
    let (spent, received) = if fill.is_filled() {
        let notional = fill.amount * fill.purchase_price;
        match side {
            Direction::Buy => ((notional + fill.exchange_fee).min(reserved), fill.amount),
            _ => (
                fill.amount.min(reserved),
                (notional - fill.exchange_fee).max(Decimal::ZERO),
            ),
        }
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };
    pair.release(reserved, spent, received, side)?;
    Ok(())
}
