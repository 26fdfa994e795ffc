//! Position — a single directional holding, owned by the portfolio.

use super::event::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open position in one symbol.
///
/// A position with zero quantity is semantically absent. A symbol carries
/// at most one directional position at a time; reversals go through zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    /// Realized PnL accumulated by partial closes of this position.
    pub realized_pnl: Decimal,
    /// Opening friction still to be allocated against future closes.
    pub accumulated_friction: Decimal,
}

impl Position {
    pub fn open(
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        entry_price: Decimal,
        opening_friction: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            avg_entry_price: entry_price,
            realized_pnl: Decimal::ZERO,
            accumulated_friction: opening_friction,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == Decimal::ZERO
    }

    /// Mark-to-market value: qty * (price - entry) for longs,
    /// qty * (entry - price) for shorts.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        match self.side {
            Side::Buy => self.quantity * (price - self.avg_entry_price),
            Side::Sell => self.quantity * (self.avg_entry_price - price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn long_value_rises_with_price() {
        let pos = Position::open("EURUSD", Side::Buy, dec!(10), dec!(100), dec!(0));
        assert_eq!(pos.market_value(dec!(110)), dec!(100));
        assert_eq!(pos.market_value(dec!(95)), dec!(-50));
    }

    #[test]
    fn short_value_rises_as_price_falls() {
        let pos = Position::open("EURUSD", Side::Sell, dec!(10), dec!(100), dec!(0));
        assert_eq!(pos.market_value(dec!(90)), dec!(100));
        assert_eq!(pos.market_value(dec!(105)), dec!(-50));
    }

    #[test]
    fn zero_quantity_is_flat() {
        let mut pos = Position::open("EURUSD", Side::Buy, dec!(10), dec!(100), dec!(0));
        assert!(!pos.is_flat());
        pos.quantity = Decimal::ZERO;
        assert!(pos.is_flat());
    }
}
