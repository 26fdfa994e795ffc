//! Standalone fair-value-gap retracement strategy.
//!
//! Tracks a bounded list of open three-bar gaps, enters when price
//! retraces into one (long into a bullish gap, short into a bearish one)
//! and exits when the close breaks the prior bar's opposite extreme.
//! Unlike the SMC tracker this keeps no mitigation lifecycle — a zone is
//! consumed by the entry it produces. Zones only become tradable from the
//! bar after formation, since a bullish zone's top is the formation bar's
//! own low.

use crate::domain::{Bar, Signal, SignalKind};
use crate::smc::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BarBuffer, Strategy};

/// Gap-retracement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FvgStrategyConfig {
    /// Maximum tracked open zones; the oldest is dropped past the cap.
    pub max_open_gaps: usize,
    /// Minimum gap size as a percentage of the zone midpoint.
    pub min_gap_size_pct: Decimal,
    pub max_buffer: usize,
}

impl Default for FvgStrategyConfig {
    fn default() -> Self {
        Self {
            max_open_gaps: 5,
            min_gap_size_pct: Decimal::new(1, 1), // 0.1%
            max_buffer: BarBuffer::DEFAULT_CAPACITY,
        }
    }
}

/// An open gap zone awaiting a retracement. The list keeps zones in
/// formation order, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GapZone {
    direction: Direction,
    top: Decimal,
    bottom: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionBias {
    Flat,
    Long,
    Short,
}

/// Trades retracements into unfilled three-bar gaps.
pub struct FvgStrategy {
    symbol: String,
    config: FvgStrategyConfig,
    buffer: BarBuffer,
    open_gaps: Vec<GapZone>,
    bias: PositionBias,
}

impl FvgStrategy {
    pub fn new(symbol: impl Into<String>, config: FvgStrategyConfig) -> Self {
        let buffer = BarBuffer::new(config.max_buffer);
        Self {
            symbol: symbol.into(),
            config,
            buffer,
            open_gaps: Vec::new(),
            bias: PositionBias::Flat,
        }
    }

    fn detect_gap(&self) -> Option<GapZone> {
        if self.buffer.len() < 3 {
            return None;
        }
        let first = self.buffer.from_end(2).expect("len >= 3");
        let third = self.buffer.from_end(0).expect("len >= 3");
        let hundred = Decimal::ONE_HUNDRED;

        if first.high < third.low {
            let size = third.low - first.high;
            let mid = (third.low + first.high) / Decimal::TWO;
            if mid > Decimal::ZERO && size / mid * hundred >= self.config.min_gap_size_pct {
                return Some(GapZone {
                    direction: Direction::Bullish,
                    top: third.low,
                    bottom: first.high,
                });
            }
        }
        if first.low > third.high {
            let size = first.low - third.high;
            let mid = (first.low + third.high) / Decimal::TWO;
            if mid > Decimal::ZERO && size / mid * hundred >= self.config.min_gap_size_pct {
                return Some(GapZone {
                    direction: Direction::Bearish,
                    top: first.low,
                    bottom: third.high,
                });
            }
        }
        None
    }

    /// First open zone the bar retraces into; the zone is consumed.
    fn take_filled_gap(&mut self, bar: &Bar) -> Option<GapZone> {
        let index = self.open_gaps.iter().position(|gap| match gap.direction {
            Direction::Bullish => bar.low <= gap.top && bar.close >= gap.bottom,
            Direction::Bearish => bar.high >= gap.bottom && bar.close <= gap.top,
        })?;
        Some(self.open_gaps.remove(index))
    }

    fn signal(&self, bar: &Bar, kind: SignalKind, strength: Decimal) -> Signal {
        Signal {
            symbol: bar.symbol.clone(),
            timestamp: bar.timestamp,
            kind,
            strength,
        }
    }
}

impl Strategy for FvgStrategy {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal> {
        self.buffer.push(bar.clone());

        // Exit: close through the prior bar's opposite extreme.
        if self.bias != PositionBias::Flat {
            if let Some(prev) = self.buffer.from_end(1) {
                let stopped = match self.bias {
                    PositionBias::Long => bar.close < prev.low,
                    PositionBias::Short => bar.close > prev.high,
                    PositionBias::Flat => false,
                };
                if stopped {
                    self.bias = PositionBias::Flat;
                    return Some(self.signal(bar, SignalKind::Exit, Decimal::new(5, 1)));
                }
            }
        }

        // Entries check the zones that existed before this bar; the bar's
        // own gap registers afterwards so it cannot fill itself.
        let entry = if self.bias == PositionBias::Flat {
            self.take_filled_gap(bar)
        } else {
            None
        };

        if let Some(gap) = self.detect_gap() {
            self.open_gaps.push(gap);
            if self.open_gaps.len() > self.config.max_open_gaps {
                let excess = self.open_gaps.len() - self.config.max_open_gaps;
                self.open_gaps.drain(..excess);
            }
        }

        let gap = entry?;
        let kind = match gap.direction {
            Direction::Bullish => {
                self.bias = PositionBias::Long;
                SignalKind::Long
            }
            Direction::Bearish => {
                self.bias = PositionBias::Short;
                SignalKind::Short
            }
        };
        Some(self.signal(bar, kind, Decimal::new(7, 1)))
    }
}
