use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The direction carried by signals, orders and fills.
///
/// Tradeable directions (`Buy`, `Sell`, `Long`, `Short`, `ClosePosition`) can be
/// sized and executed. The `CouldNot*` variants record a tradeable intent that was
/// rejected along the way so the run can continue without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Long,
    Short,
    ClosePosition,
    DoNothing,
    MissingData,
    TransferredFunds,
    CouldNotBuy,
    CouldNotSell,
    CouldNotLong,
    CouldNotShort,
    Liquidated,
}

impl Direction {
    pub fn is_buy_side(&self) -> bool {
        matches!(self, Direction::Buy | Direction::Long)
    }

    pub fn is_sell_side(&self) -> bool {
        matches!(self, Direction::Sell | Direction::Short)
    }

    /// True for directions the exchange simulator will attempt to fill.
    pub fn is_tradeable(&self) -> bool {
        self.is_buy_side() || self.is_sell_side() || *self == Direction::ClosePosition
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Direction::CouldNotBuy
                | Direction::CouldNotSell
                | Direction::CouldNotLong
                | Direction::CouldNotShort
        )
    }

    /// Maps a tradeable direction onto its rejected counterpart.
    pub fn failed(&self) -> Direction {
        match self {
            Direction::Buy | Direction::CouldNotBuy => Direction::CouldNotBuy,
            Direction::Sell | Direction::CouldNotSell => Direction::CouldNotSell,
            Direction::Long | Direction::CouldNotLong => Direction::CouldNotLong,
            Direction::Short | Direction::CouldNotShort => Direction::CouldNotShort,
            _ => Direction::DoNothing,
        }
    }

    /// The funding leg a direction draws from, including rejected intents.
    ///
    /// Returns `Buy` or `Sell` for spot-style legs, `Long` or `Short` for
    /// contract legs, and `None` for directions that never touch funds.
    pub fn funding_side(&self) -> Option<Direction> {
        match self {
            Direction::Buy | Direction::CouldNotBuy => Some(Direction::Buy),
            Direction::Sell | Direction::CouldNotSell => Some(Direction::Sell),
            Direction::Long | Direction::CouldNotLong => Some(Direction::Long),
            Direction::Short | Direction::CouldNotShort => Some(Direction::Short),
            _ => None,
        }
    }

    /// Returns the opposite side of a directional position.
    pub fn opposite(&self) -> Option<Direction> {
        match self {
            Direction::Buy => Some(Direction::Sell),
            Direction::Sell => Some(Direction::Buy),
            Direction::Long => Some(Direction::Short),
            Direction::Short => Some(Direction::Long),
            _ => None,
        }
    }

    pub fn lower(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Buy => "Buy",
            Direction::Sell => "Sell",
            Direction::Long => "Long",
            Direction::Short => "Short",
            Direction::ClosePosition => "ClosePosition",
            Direction::DoNothing => "DoNothing",
            Direction::MissingData => "MissingData",
            Direction::TransferredFunds => "TransferredFunds",
            Direction::CouldNotBuy => "CouldNotBuy",
            Direction::CouldNotSell => "CouldNotSell",
            Direction::CouldNotLong => "CouldNotLong",
            Direction::CouldNotShort => "CouldNotShort",
            Direction::Liquidated => "Liquidated",
        };
        f.write_str(s)
    }
}

/// The kind of market a currency pair trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Spot,
    Futures,
}

impl AssetKind {
    pub fn is_futures(&self) -> bool {
        matches!(self, AssetKind::Futures)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Spot => f.write_str("spot"),
            AssetKind::Futures => f.write_str("futures"),
        }
    }
}

impl FromStr for AssetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spot" => Ok(AssetKind::Spot),
            "futures" | "perpetual" => Ok(AssetKind::Futures),
            other => Err(CoreError::InvalidInput(
                "asset kind".to_string(),
                other.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_maps_each_tradeable_direction() {
        assert_eq!(Direction::Buy.failed(), Direction::CouldNotBuy);
        assert_eq!(Direction::Sell.failed(), Direction::CouldNotSell);
        assert_eq!(Direction::Long.failed(), Direction::CouldNotLong);
        assert_eq!(Direction::Short.failed(), Direction::CouldNotShort);
        assert_eq!(Direction::ClosePosition.failed(), Direction::DoNothing);
        assert_eq!(Direction::CouldNotBuy.failed(), Direction::CouldNotBuy);
    }

    #[test]
    fn funding_side_follows_rejections() {
        assert_eq!(Direction::CouldNotSell.funding_side(), Some(Direction::Sell));
        assert_eq!(Direction::DoNothing.funding_side(), None);
    }

    #[test]
    fn asset_kind_parses_aliases() {
        assert_eq!("SPOT".parse::<AssetKind>().unwrap(), AssetKind::Spot);
        assert_eq!("perpetual".parse::<AssetKind>().unwrap(), AssetKind::Futures);
        assert!("options".parse::<AssetKind>().is_err());
    }
}
