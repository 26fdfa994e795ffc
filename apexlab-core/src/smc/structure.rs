//! Market structure tracking — BOS and CHOCH detection.
//!
//! Breaks are confirmed on closes only; wicks through a swing level do not
//! count. A break in the prevailing trend direction (or from an undefined
//! trend) is a Break of Structure; a break against the trend is a Change
//! of Character and flips the trend state. At most one break fires per
//! bar, tracked by the last break's bar index.

use super::swing::SwingPoint;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;

/// Prevailing trend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendState {
    #[default]
    Undefined,
    Uptrend,
    Downtrend,
}

/// Break flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakType {
    /// Break of Structure — with-trend continuation.
    Bos,
    /// Change of Character — counter-trend break, flips the trend.
    Choch,
}

/// Immutable record of a BOS or CHOCH event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub break_type: BreakType,
    pub direction: Direction,
    pub broken_level: Decimal,
    pub timestamp: DateTime<Utc>,
    pub bar_idx: usize,
}

/// Consumes confirmed swings and bar closes, emitting structure breaks.
#[derive(Debug, Clone)]
pub struct MarketStructureTracker {
    trend: TrendState,
    max_history: usize,
    last_swing_high: Option<SwingPoint>,
    last_swing_low: Option<SwingPoint>,
    breaks: Vec<StructureBreak>,
    last_break_bar: Option<usize>,
}

impl MarketStructureTracker {
    pub fn new(max_history: usize) -> Self {
        Self {
            trend: TrendState::Undefined,
            max_history: max_history.max(1),
            last_swing_high: None,
            last_swing_low: None,
            breaks: Vec::new(),
            last_break_bar: None,
        }
    }

    pub fn trend(&self) -> TrendState {
        self.trend
    }

    pub fn breaks(&self) -> &[StructureBreak] {
        &self.breaks
    }

    pub fn last_swing_high(&self) -> Option<&SwingPoint> {
        self.last_swing_high.as_ref()
    }

    pub fn last_swing_low(&self) -> Option<&SwingPoint> {
        self.last_swing_low.as_ref()
    }

    /// Register a newly confirmed swing high as the next break level.
    pub fn on_new_swing_high(&mut self, swing: SwingPoint) {
        self.last_swing_high = Some(swing);
    }

    /// Register a newly confirmed swing low as the next break level.
    pub fn on_new_swing_low(&mut self, swing: SwingPoint) {
        self.last_swing_low = Some(swing);
    }

    /// Check whether this bar's close breaks market structure.
    pub fn on_bar_close(
        &mut self,
        close: Decimal,
        bar_idx: usize,
        timestamp: DateTime<Utc>,
    ) -> Option<StructureBreak> {
        if self.last_break_bar.is_some_and(|last| bar_idx <= last) {
            return None;
        }

        let result = if let Some(high) = self
            .last_swing_high
            .as_ref()
            .filter(|sh| close > sh.price)
        {
            let break_type = if self.trend == TrendState::Downtrend {
                BreakType::Choch
            } else {
                BreakType::Bos
            };
            self.trend = TrendState::Uptrend;
            Some(StructureBreak {
                break_type,
                direction: Direction::Bullish,
                broken_level: high.price,
                timestamp,
                bar_idx,
            })
        } else if let Some(low) = self.last_swing_low.as_ref().filter(|sl| close < sl.price) {
            let break_type = if self.trend == TrendState::Uptrend {
                BreakType::Choch
            } else {
                BreakType::Bos
            };
            self.trend = TrendState::Downtrend;
            Some(StructureBreak {
                break_type,
                direction: Direction::Bearish,
                broken_level: low.price,
                timestamp,
                bar_idx,
            })
        } else {
            None
        };

        if let Some(brk) = &result {
            self.last_break_bar = Some(bar_idx);
            self.breaks.push(brk.clone());
            if self.breaks.len() > self.max_history {
                let excess = self.breaks.len() - self.max_history;
                self.breaks.drain(..excess);
            }
        }

        result
    }
}
