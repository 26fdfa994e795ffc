//! Portfolio — cash, positions, mark-to-market equity and margin control.
//!
//! Accounting rules on each fill:
//!
//! - A fill against an opposite-side position closes up to
//!   min(fill.qty, pos.qty) units first (single tracked average, FIFO at
//!   the position level). Realized PnL for the closed slice subtracts both
//!   the closing friction and a proportional share of the opening
//!   friction accumulated on the position.
//! - Any remaining fill quantity opens a fresh position on the fill side,
//!   so a flat-to-opposite flip happens in one step through zero.
//! - Adds to an existing same-side position re-average the entry price and
//!   accumulate the opening friction.
//!
//! Friction charged against cash per fill is commission + half-spread;
//! slippage is already embedded in the fill price.

use crate::domain::{Bar, Fill, Position, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One appended equity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityEntry {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
    pub cash: Decimal,
    /// Prices used for the snapshot; one entry for single-asset runs, all
    /// last-known prices for multi-asset snapshots.
    pub prices: BTreeMap<String, Decimal>,
}

/// Why an order failed pre-validation. These are observed-and-dropped
/// conditions, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRejection {
    ZeroVolumeBar,
    InsufficientCapital,
}

/// Portfolio accountant shared by the engines.
#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_cash: Decimal,
    cash: Decimal,
    margin_requirement: Decimal,
    positions: BTreeMap<String, Position>,
    equity_log: Vec<EquityEntry>,
    fill_log: Vec<Fill>,
    total_realized_pnl: Decimal,
    forced_liquidations: usize,
}

impl Portfolio {
    pub fn new(initial_cash: Decimal, margin_requirement: Decimal) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            margin_requirement,
            positions: BTreeMap::new(),
            equity_log: Vec::new(),
            fill_log: Vec::new(),
            total_realized_pnl: Decimal::ZERO,
            forced_liquidations: 0,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn initial_cash(&self) -> Decimal {
        self.initial_cash
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.total_realized_pnl
    }

    pub fn forced_liquidations(&self) -> usize {
        self.forced_liquidations
    }

    pub fn equity_log(&self) -> &[EquityEntry] {
        &self.equity_log
    }

    pub fn fill_log(&self) -> &[Fill] {
        &self.fill_log
    }

    /// Open (non-flat) position for a symbol.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol).filter(|p| !p.is_flat())
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.values().filter(|p| !p.is_flat()).count()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| !p.is_flat())
    }

    /// Last logged equity, falling back to cash before the first snapshot.
    pub fn current_equity(&self) -> Decimal {
        self.equity_log
            .last()
            .map(|e| e.equity)
            .unwrap_or(self.cash)
    }

    /// Mark-to-market equity: cash + sum of position values at `prices`.
    /// Positions without a quote are carried at zero marginal value.
    pub fn equity(&self, prices: &BTreeMap<String, Decimal>) -> Decimal {
        let mut total = self.cash;
        for (symbol, pos) in &self.positions {
            if pos.is_flat() {
                continue;
            }
            if let Some(price) = prices.get(symbol) {
                total += pos.market_value(*price);
            }
        }
        total
    }

    /// Pre-validation called by the router before submitting an order.
    pub fn validate_order(
        &self,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        bar_volume: u64,
    ) -> Result<(), OrderRejection> {
        if bar_volume == 0 {
            return Err(OrderRejection::ZeroVolumeBar);
        }
        if side == Side::Buy && quantity * price > self.cash {
            return Err(OrderRejection::InsufficientCapital);
        }
        Ok(())
    }

    /// Apply a fill: update cash, positions and realized PnL.
    pub fn apply_fill(&mut self, fill: Fill) {
        self.fill_log.push(fill.clone());
        let friction = fill.friction();
        match fill.side {
            Side::Buy => self.apply_buy(fill, friction),
            Side::Sell => self.apply_sell(fill, friction),
        }
    }

    fn apply_buy(&mut self, fill: Fill, friction: Decimal) {
        let closing_short = self
            .positions
            .get(&fill.symbol)
            .is_some_and(|p| p.side == Side::Sell && !p.is_flat());

        if closing_short {
            let pos = self.positions.get_mut(&fill.symbol).expect("checked above");
            let close_qty = fill.quantity.min(pos.quantity);
            let open_friction_share = pos.accumulated_friction * close_qty / pos.quantity;
            let pnl = close_qty * (pos.avg_entry_price - fill.fill_price)
                - friction
                - open_friction_share;
            self.total_realized_pnl += pnl;
            pos.realized_pnl += pnl;
            pos.accumulated_friction -= open_friction_share;
            pos.quantity -= close_qty;
            self.cash -= fill.fill_price * close_qty + friction;

            let remaining = fill.quantity - close_qty;
            if remaining > Decimal::ZERO {
                // Flip through zero: the remainder opens a long; friction
                // was fully charged to the closing leg.
                self.positions.insert(
                    fill.symbol.clone(),
                    Position::open(
                        fill.symbol.clone(),
                        Side::Buy,
                        remaining,
                        fill.fill_price,
                        Decimal::ZERO,
                    ),
                );
                self.cash -= fill.fill_price * remaining;
            }
        } else {
            match self.positions.get_mut(&fill.symbol) {
                Some(pos) if !pos.is_flat() => {
                    let total_qty = pos.quantity + fill.quantity;
                    pos.avg_entry_price = (pos.avg_entry_price * pos.quantity
                        + fill.fill_price * fill.quantity)
                        / total_qty;
                    pos.quantity = total_qty;
                    pos.accumulated_friction += friction;
                }
                _ => {
                    self.positions.insert(
                        fill.symbol.clone(),
                        Position::open(
                            fill.symbol.clone(),
                            Side::Buy,
                            fill.quantity,
                            fill.fill_price,
                            friction,
                        ),
                    );
                }
            }
            self.cash -= fill.fill_price * fill.quantity + friction;
        }
    }

    fn apply_sell(&mut self, fill: Fill, friction: Decimal) {
        let closing_long = self
            .positions
            .get(&fill.symbol)
            .is_some_and(|p| p.side == Side::Buy && !p.is_flat());

        if closing_long {
            let pos = self.positions.get_mut(&fill.symbol).expect("checked above");
            let close_qty = fill.quantity.min(pos.quantity);
            let open_friction_share = pos.accumulated_friction * close_qty / pos.quantity;
            let pnl = close_qty * (fill.fill_price - pos.avg_entry_price)
                - friction
                - open_friction_share;
            self.total_realized_pnl += pnl;
            pos.realized_pnl += pnl;
            pos.accumulated_friction -= open_friction_share;
            pos.quantity -= close_qty;
            self.cash += fill.fill_price * close_qty - friction;

            let remaining = fill.quantity - close_qty;
            if remaining > Decimal::ZERO {
                self.positions.insert(
                    fill.symbol.clone(),
                    Position::open(
                        fill.symbol.clone(),
                        Side::Sell,
                        remaining,
                        fill.fill_price,
                        Decimal::ZERO,
                    ),
                );
                self.cash += fill.fill_price * remaining;
            }
        } else {
            match self.positions.get_mut(&fill.symbol) {
                Some(pos) if !pos.is_flat() => {
                    let total_qty = pos.quantity + fill.quantity;
                    pos.avg_entry_price = (pos.avg_entry_price * pos.quantity
                        + fill.fill_price * fill.quantity)
                        / total_qty;
                    pos.quantity = total_qty;
                    pos.accumulated_friction += friction;
                }
                _ => {
                    self.positions.insert(
                        fill.symbol.clone(),
                        Position::open(
                            fill.symbol.clone(),
                            Side::Sell,
                            fill.quantity,
                            fill.fill_price,
                            friction,
                        ),
                    );
                }
            }
            self.cash += fill.fill_price * fill.quantity - friction;
        }
    }

    /// Append a single-asset equity snapshot at the bar's close.
    pub fn record_equity(&mut self, bar: &Bar) {
        let mut prices = BTreeMap::new();
        prices.insert(bar.symbol.clone(), bar.close);
        let equity = self.equity(&prices);
        self.equity_log.push(EquityEntry {
            timestamp: bar.timestamp,
            equity,
            cash: self.cash,
            prices,
        });
    }

    /// Append a multi-asset snapshot with all last-known prices.
    pub fn append_snapshot(&mut self, timestamp: DateTime<Utc>, prices: &BTreeMap<String, Decimal>) {
        let equity = self.equity(prices);
        self.equity_log.push(EquityEntry {
            timestamp,
            equity,
            cash: self.cash,
            prices: prices.clone(),
        });
    }

    /// Flag every symbol whose margin requirement exceeds current equity.
    ///
    /// required = |qty * price| * margin_requirement per open position;
    /// equity below the requirement flags the symbol for liquidation.
    pub fn check_margin(&self, prices: &BTreeMap<String, Decimal>) -> Vec<String> {
        let equity = self.equity(prices);
        let mut flagged = Vec::new();
        for (symbol, pos) in &self.positions {
            if pos.is_flat() {
                continue;
            }
            let Some(price) = prices.get(symbol) else {
                continue;
            };
            let required = (pos.quantity * *price).abs() * self.margin_requirement;
            if equity < required {
                flagged.push(symbol.clone());
            }
        }
        flagged
    }

    /// Force-close a position with a synthetic zero-friction fill at the
    /// current bar's price and timestamp.
    pub fn force_liquidate(
        &mut self,
        symbol: &str,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Option<Fill> {
        let pos = self.positions.get(symbol)?;
        if pos.is_flat() {
            return None;
        }
        self.forced_liquidations += 1;
        let fill = Fill {
            symbol: symbol.to_string(),
            timestamp,
            side: pos.side.closing(),
            quantity: pos.quantity,
            fill_price: price,
            commission: Decimal::ZERO,
            slippage: Decimal::ZERO,
            spread_cost: Decimal::ZERO,
        };
        self.apply_fill(fill.clone());
        Some(fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn fill(side: Side, qty: Decimal, price: Decimal, commission: Decimal) -> Fill {
        Fill {
            symbol: "EURUSD".into(),
            timestamp: ts(2),
            side,
            quantity: qty,
            fill_price: price,
            commission,
            slippage: Decimal::ZERO,
            spread_cost: Decimal::ZERO,
        }
    }

    #[test]
    fn buy_opens_long_and_debits_cash() {
        let mut p = Portfolio::new(dec!(10000), dec!(0.25));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(100), dec!(1)));
        assert_eq!(p.cash(), dec!(8999)); // 10000 - 1000 - 1
        let pos = p.position("EURUSD").unwrap();
        assert_eq!(pos.quantity, dec!(10));
        assert_eq!(pos.avg_entry_price, dec!(100));
        assert_eq!(pos.accumulated_friction, dec!(1));
    }

    #[test]
    fn add_to_long_reaverages_entry() {
        let mut p = Portfolio::new(dec!(10000), dec!(0.25));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(100), dec!(0)));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(110), dec!(0)));
        let pos = p.position("EURUSD").unwrap();
        assert_eq!(pos.quantity, dec!(20));
        assert_eq!(pos.avg_entry_price, dec!(105));
    }

    #[test]
    fn sell_closes_long_with_friction_allocation() {
        let mut p = Portfolio::new(dec!(10000), dec!(0.25));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(100), dec!(2)));
        // Close half at 110 with 1 commission: pnl = 5*10 - 1 - 2*5/10 = 48
        p.apply_fill(fill(Side::Sell, dec!(5), dec!(110), dec!(1)));
        assert_eq!(p.realized_pnl(), dec!(48));
        let pos = p.position("EURUSD").unwrap();
        assert_eq!(pos.quantity, dec!(5));
        assert_eq!(pos.accumulated_friction, dec!(1));
    }

    #[test]
    fn short_close_is_symmetric() {
        let mut p = Portfolio::new(dec!(10000), dec!(0.25));
        p.apply_fill(fill(Side::Sell, dec!(10), dec!(100), dec!(0)));
        assert_eq!(p.cash(), dec!(11000));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(90), dec!(0)));
        // Short from 100 covered at 90: +100
        assert_eq!(p.realized_pnl(), dec!(100));
        assert!(p.position("EURUSD").is_none());
        assert_eq!(p.cash(), dec!(10100));
    }

    #[test]
    fn oversized_sell_flips_long_to_short_through_zero() {
        let mut p = Portfolio::new(dec!(10000), dec!(0.25));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(100), dec!(0)));
        p.apply_fill(fill(Side::Sell, dec!(15), dec!(105), dec!(0)));
        let pos = p.position("EURUSD").unwrap();
        assert_eq!(pos.side, Side::Sell);
        assert_eq!(pos.quantity, dec!(5));
        assert_eq!(pos.avg_entry_price, dec!(105));
        assert_eq!(p.realized_pnl(), dec!(50));
    }

    #[test]
    fn equity_is_cash_plus_position_values() {
        let mut p = Portfolio::new(dec!(10000), dec!(0.25));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(100), dec!(0)));
        let mut prices = BTreeMap::new();
        prices.insert("EURUSD".to_string(), dec!(110));
        // cash 9000 + 10 * (110 - 100) = 9100
        assert_eq!(p.equity(&prices), dec!(9100));
    }

    #[test]
    fn validate_order_rejects_zero_volume_and_overspend() {
        let p = Portfolio::new(dec!(1000), dec!(0.25));
        assert_eq!(
            p.validate_order(Side::Buy, dec!(1), dec!(100), 0),
            Err(OrderRejection::ZeroVolumeBar)
        );
        assert_eq!(
            p.validate_order(Side::Buy, dec!(11), dec!(100), 500),
            Err(OrderRejection::InsufficientCapital)
        );
        assert!(p.validate_order(Side::Buy, dec!(10), dec!(100), 500).is_ok());
        // Sells are never capital-constrained here.
        assert!(p.validate_order(Side::Sell, dec!(50), dec!(100), 500).is_ok());
    }

    #[test]
    fn margin_check_flags_underwater_symbol() {
        let mut p = Portfolio::new(dec!(110), dec!(0.25));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(100), dec!(0)));
        let mut prices = BTreeMap::new();
        prices.insert("EURUSD".to_string(), dec!(1));
        // equity = 10 + 10*(1-100) = -980; required = 10*1*0.25 = 2.5
        assert_eq!(p.check_margin(&prices), vec!["EURUSD".to_string()]);
    }

    #[test]
    fn force_liquidate_closes_at_given_price_without_friction() {
        let mut p = Portfolio::new(dec!(110), dec!(0.25));
        p.apply_fill(fill(Side::Buy, dec!(10), dec!(100), dec!(0)));
        let liq = p.force_liquidate("EURUSD", dec!(1), ts(3)).unwrap();
        assert_eq!(liq.side, Side::Sell);
        assert_eq!(liq.quantity, dec!(10));
        assert_eq!(liq.commission, Decimal::ZERO);
        assert_eq!(liq.timestamp, ts(3));
        assert!(p.position("EURUSD").is_none());
        assert_eq!(p.cash(), dec!(20)); // 10 + 10*1
        assert_eq!(p.forced_liquidations(), 1);
    }

    #[test]
    fn force_liquidate_on_flat_symbol_is_noop() {
        let mut p = Portfolio::new(dec!(1000), dec!(0.25));
        assert!(p.force_liquidate("EURUSD", dec!(1), ts(3)).is_none());
        assert_eq!(p.forced_liquidations(), 0);
    }

    #[test]
    fn record_equity_appends_with_symbol_price() {
        let mut p = Portfolio::new(dec!(10000), dec!(0.25));
        let bar = Bar {
            symbol: "EURUSD".into(),
            timestamp: ts(2),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100),
            volume: 1000,
            timeframe: crate::domain::Timeframe::D1,
        };
        p.record_equity(&bar);
        assert_eq!(p.equity_log().len(), 1);
        let entry = &p.equity_log()[0];
        assert_eq!(entry.equity, dec!(10000));
        assert_eq!(entry.prices["EURUSD"], dec!(100));
    }
}
