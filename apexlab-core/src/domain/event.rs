//! Signal, Order and Fill events plus the audit `Event` union.
//!
//! The causal order is Bar -> Signal -> Order -> Fill. All value types are
//! immutable once constructed; the price-presence invariant for orders
//! (market orders carry no price, limit/stop orders embed theirs) is
//! enforced by the `OrderKind` variants.

use super::bar::Bar;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trading signal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Long,
    Short,
    Exit,
}

/// Order / fill side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side that closes a position opened on this side.
    pub fn closing(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Strategy output for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub kind: SignalKind,
    /// Informational conviction in [0, 1]; never used for sizing.
    pub strength: Decimal,
}

/// What kind of order and its price parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fill at the next bar's open.
    Market,
    /// Fill at the limit price when the bar range reaches it.
    Limit { price: Decimal },
    /// Trigger at the stop price; gap-throughs fill at the open.
    Stop { price: Decimal },
}

/// Errors from order construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
}

/// An order awaiting execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub kind: OrderKind,
    pub side: Side,
    pub quantity: Decimal,
}

impl Order {
    /// Construct an order, rejecting non-positive quantities.
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        kind: OrderKind,
        side: Side,
        quantity: Decimal,
    ) -> Result<Self, OrderError> {
        if quantity <= Decimal::ZERO {
            return Err(OrderError::NonPositiveQuantity(quantity));
        }
        Ok(Self {
            symbol: symbol.into(),
            timestamp,
            kind,
            side,
            quantity,
        })
    }
}

/// Record of an executed order.
///
/// Slippage is already embedded in `fill_price`; the three cost fields are
/// carried separately for attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub quantity: Decimal,
    pub fill_price: Decimal,
    pub commission: Decimal,
    pub slippage: Decimal,
    pub spread_cost: Decimal,
}

impl Fill {
    /// Friction charged against cash on this fill (commission + half-spread).
    pub fn friction(&self) -> Decimal {
        self.commission + self.spread_cost
    }
}

/// Union of the four event variants that ride the FIFO queue and the
/// audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Bar(Bar),
    Signal(Signal),
    Order(Order),
    Fill(Fill),
}

impl Event {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::Bar(b) => b.timestamp,
            Event::Signal(s) => s.timestamp,
            Event::Order(o) => o.timestamp,
            Event::Fill(f) => f.timestamp,
        }
    }
}
