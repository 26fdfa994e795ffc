//! Smart-Money-Concepts state machines.
//!
//! Each detector is an independent, memory-bounded state machine driven
//! strictly by confirmed bars. Strategies own their detectors and feed
//! them once per bar in a fixed order.

pub mod fvg;
pub mod inducement;
pub mod kill_zone;
pub mod liquidity_sweep;
pub mod order_block;
pub mod premium_discount;
pub mod structure;
pub mod swing;

pub use fvg::{FairValueGap, FvgState, FvgTracker, MitigationMode};
pub use inducement::{InducementDetector, InducementPoint};
pub use kill_zone::{KillZoneFilter, Session};
pub use liquidity_sweep::{LiquiditySweep, LiquiditySweepDetector};
pub use order_block::{ObState, OrderBlock, OrderBlockDetector};
pub use premium_discount::{
    compute_premium_discount, in_ote_zone, price_zone, PremiumDiscountZone, PriceZone, TradeSide,
};
pub use structure::{BreakType, MarketStructureTracker, StructureBreak, TrendState};
pub use swing::{SwingDetector, SwingPoint};

use serde::{Deserialize, Serialize};

/// Bullish / bearish bias shared by the SMC entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }
}
