//! Execution handler — turns pending orders into fills against the next bar.
//!
//! Orders submitted while processing bar T are only eligible from bar T+1
//! onwards, because `submit` never fills and the engine processes pending
//! orders before asking the strategy for new signals. Fill prices honor
//! both wick and body of the bar:
//!
//! - Market: this bar's open.
//! - Limit buy: low <= limit fills at the limit; limit sell symmetric on
//!   the high.
//! - Stop buy: open >= stop gaps through and fills at the open, otherwise
//!   high >= stop fills at the stop; stop sell symmetric.
//!
//! Slippage and half-spread are applied adversely (buys pay up, sells
//! receive down) and reported on the fill alongside commission.

use crate::domain::{Bar, Fill, Order, OrderKind, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Friction and commission parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionConfig {
    /// Adverse slippage as a fraction of the base price.
    pub slippage_pct: Decimal,
    /// Flat commission per trade.
    pub commission_per_trade: Decimal,
    /// Commission per share / unit.
    pub commission_per_share: Decimal,
    /// Round-trip bid/ask spread as a fraction of price; half charged per fill.
    pub spread_pct: Decimal,
}

impl Default for FrictionConfig {
    fn default() -> Self {
        Self {
            slippage_pct: Decimal::new(1, 4),         // 1 bps
            commission_per_trade: Decimal::ONE,       // 1.00 flat
            commission_per_share: Decimal::new(5, 3), // 0.005 per unit
            spread_pct: Decimal::new(2, 4),           // 2 bps round trip
        }
    }
}

impl FrictionConfig {
    /// Frictionless configuration, used by tests and synthetic fills.
    pub fn zero() -> Self {
        Self {
            slippage_pct: Decimal::ZERO,
            commission_per_trade: Decimal::ZERO,
            commission_per_share: Decimal::ZERO,
            spread_pct: Decimal::ZERO,
        }
    }

    /// Scale all friction components, used by the friction sensitivity sweep.
    pub fn scaled(&self, multiplier: Decimal) -> Self {
        Self {
            slippage_pct: self.slippage_pct * multiplier,
            commission_per_trade: self.commission_per_trade * multiplier,
            commission_per_share: self.commission_per_share * multiplier,
            spread_pct: self.spread_pct * multiplier,
        }
    }
}

/// Simulates order execution with market frictions.
///
/// Owns one ordered list of pending orders. In multi-asset runs each
/// symbol gets its own handler so a late-arriving bar on one symbol never
/// triggers another symbol's orders.
#[derive(Debug, Clone)]
pub struct ExecutionHandler {
    friction: FrictionConfig,
    pending: Vec<Order>,
}

impl ExecutionHandler {
    pub fn new(friction: FrictionConfig) -> Self {
        Self {
            friction,
            pending: Vec::new(),
        }
    }

    pub fn pending_orders(&self) -> &[Order] {
        &self.pending
    }

    /// Queue an order for execution. Never fills on the submission bar.
    pub fn submit(&mut self, order: Order) {
        self.pending.push(order);
    }

    /// Attempt to fill every pending order against this bar, in submission
    /// order. Unfilled orders remain pending. If several orders trigger on
    /// the same bar they all fill; partial fills are not modeled.
    pub fn process_bar(&mut self, bar: &Bar) -> Vec<Fill> {
        let mut fills = Vec::new();
        let mut remaining = Vec::new();

        for order in self.pending.drain(..) {
            match base_fill_price(&order, bar) {
                Some(base) => fills.push(make_fill(&self.friction, &order, bar, base)),
                None => remaining.push(order),
            }
        }

        self.pending = remaining;
        fills
    }
}

/// The untriggered/triggered decision and the pre-friction base price.
fn base_fill_price(order: &Order, bar: &Bar) -> Option<Decimal> {
    match order.kind {
        OrderKind::Market => Some(bar.open),
        OrderKind::Limit { price } => match order.side {
            Side::Buy if bar.low <= price => Some(price),
            Side::Sell if bar.high >= price => Some(price),
            _ => None,
        },
        OrderKind::Stop { price } => match order.side {
            Side::Buy if bar.open >= price => Some(bar.open), // gap-through
            Side::Buy if bar.high >= price => Some(price),
            Side::Sell if bar.open <= price => Some(bar.open), // gap-through
            Side::Sell if bar.low <= price => Some(price),
            _ => None,
        },
    }
}

fn make_fill(friction: &FrictionConfig, order: &Order, bar: &Bar, base: Decimal) -> Fill {
    let slippage = base * friction.slippage_pct;
    let half_spread = base * friction.spread_pct / Decimal::TWO;
    let fill_price = match order.side {
        Side::Buy => base + slippage + half_spread,
        Side::Sell => base - slippage - half_spread,
    };
    let commission =
        friction.commission_per_trade + friction.commission_per_share * order.quantity;

    Fill {
        symbol: order.symbol.clone(),
        timestamp: bar.timestamp,
        side: order.side,
        quantity: order.quantity,
        fill_price,
        commission,
        slippage,
        spread_cost: half_spread,
    }
}
