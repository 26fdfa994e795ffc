//! Order Block detection and state tracking.
//!
//! An Order Block is the last opposing candle before a displacement move
//! that breaks market structure. Scans run only when a break has just been
//! confirmed, and the displacement (current close versus the lookback
//! extreme) must reach ATR * threshold. The OB candle is always in the
//! past relative to the break bar, so there is no lookahead.

use crate::domain::Bar;
use crate::strategy::BarBuffer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::structure::StructureBreak;
use super::Direction;

/// Order block lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObState {
    Active,
    /// Price re-entered the zone.
    Mitigated,
    /// Close crossed the 50% line against the block, or the block aged out.
    Invalidated,
}

/// A tracked order block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub direction: Direction,
    pub high: Decimal,
    pub low: Decimal,
    pub midpoint: Decimal,
    pub formed_bar_idx: usize,
    pub state: ObState,
}

impl OrderBlock {
    pub fn zone_size(&self) -> Decimal {
        self.high - self.low
    }
}

/// Detects and manages order blocks triggered by structure breaks.
#[derive(Debug, Clone)]
pub struct OrderBlockDetector {
    atr_mult_threshold: Decimal,
    lookback_bars: usize,
    max_active: usize,
    max_age_bars: usize,
    /// Mitigation requires a close inside the zone instead of a wick.
    close_mitigation: bool,
    blocks: Vec<OrderBlock>,
}

impl OrderBlockDetector {
    pub fn new(
        atr_mult_threshold: Decimal,
        lookback_bars: usize,
        max_active: usize,
        max_age_bars: usize,
        close_mitigation: bool,
    ) -> Self {
        Self {
            atr_mult_threshold,
            lookback_bars: lookback_bars.max(1),
            max_active: max_active.max(1),
            max_age_bars,
            close_mitigation,
            blocks: Vec::new(),
        }
    }

    pub fn blocks(&self) -> &[OrderBlock] {
        &self.blocks
    }

    pub fn active_blocks(&self) -> Vec<&OrderBlock> {
        self.blocks
            .iter()
            .filter(|ob| ob.state == ObState::Active)
            .collect()
    }

    /// Scan for a new order block after a structure break. The displacement
    /// direction comes from the break; the scan walks backwards through the
    /// lookback window for the most recent opposing candle.
    pub fn scan_for_new_ob(
        &mut self,
        buffer: &BarBuffer,
        bar_count: usize,
        atr: Decimal,
        structure_break: &StructureBreak,
    ) -> Option<OrderBlock> {
        if buffer.len() < 3 {
            return None;
        }
        let current = buffer.from_end(0).expect("len >= 3");
        let lookback = self.lookback_bars.min(buffer.len() - 1);
        let scan_start = buffer.len() - 1 - lookback;

        let displacement = match structure_break.direction {
            Direction::Bullish => {
                let recent_low = (scan_start..buffer.len())
                    .filter_map(|i| buffer.get(i))
                    .map(|b| b.low)
                    .min()
                    .expect("non-empty window");
                current.close - recent_low
            }
            Direction::Bearish => {
                let recent_high = (scan_start..buffer.len())
                    .filter_map(|i| buffer.get(i))
                    .map(|b| b.high)
                    .max()
                    .expect("non-empty window");
                recent_high - current.close
            }
        };
        if displacement < atr * self.atr_mult_threshold {
            return None;
        }

        // Walk backwards from the bar before the break for the most recent
        // opposing candle.
        for i in (scan_start..buffer.len() - 1).rev() {
            let bar = buffer.get(i).expect("index in range");
            let opposing = match structure_break.direction {
                Direction::Bullish => bar.is_bearish(),
                Direction::Bearish => bar.is_bullish(),
            };
            if opposing {
                let formed_bar_idx = bar_count - (buffer.len() - 1 - i);
                let ob = OrderBlock {
                    direction: structure_break.direction,
                    high: bar.high,
                    low: bar.low,
                    midpoint: (bar.high + bar.low) / Decimal::TWO,
                    formed_bar_idx,
                    state: ObState::Active,
                };
                self.blocks.push(ob.clone());
                self.enforce_limits(bar_count);
                return Some(ob);
            }
        }
        None
    }

    /// Per-bar state update: mitigation on zone re-entry, invalidation on a
    /// close beyond the 50% line against the block or on age expiry.
    pub fn update_states(&mut self, bar: &Bar, bar_count: usize) {
        for ob in &mut self.blocks {
            if ob.state != ObState::Active {
                continue;
            }
            if bar_count - ob.formed_bar_idx > self.max_age_bars {
                ob.state = ObState::Invalidated;
                continue;
            }
            match ob.direction {
                Direction::Bullish => {
                    if bar.close < ob.midpoint {
                        ob.state = ObState::Invalidated;
                        continue;
                    }
                    let probe = if self.close_mitigation { bar.close } else { bar.low };
                    if probe <= ob.high && probe >= ob.low {
                        ob.state = ObState::Mitigated;
                    }
                }
                Direction::Bearish => {
                    if bar.close > ob.midpoint {
                        ob.state = ObState::Invalidated;
                        continue;
                    }
                    let probe = if self.close_mitigation { bar.close } else { bar.high };
                    if probe >= ob.low && probe <= ob.high {
                        ob.state = ObState::Mitigated;
                    }
                }
            }
        }
    }

    /// Invalidate oldest active blocks past the cap and prune stale
    /// non-active records.
    fn enforce_limits(&mut self, bar_count: usize) {
        loop {
            let mut active: Vec<usize> = self
                .blocks
                .iter()
                .enumerate()
                .filter(|(_, ob)| ob.state == ObState::Active)
                .map(|(i, _)| i)
                .collect();
            if active.len() <= self.max_active {
                break;
            }
            active.sort_by_key(|&i| self.blocks[i].formed_bar_idx);
            let oldest = active[0];
            self.blocks[oldest].state = ObState::Invalidated;
        }

        let max_age = self.max_age_bars;
        self.blocks.retain(|ob| {
            ob.state == ObState::Active || bar_count - ob.formed_bar_idx <= max_age
        });
    }
}
