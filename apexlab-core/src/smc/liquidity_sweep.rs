//! Liquidity sweep detection — stop hunts through swing levels.
//!
//! A bullish sweep wicks below an untaken swing low and closes back above
//! it; a bearish sweep mirrors that at a swing high. Shallow pokes are
//! filtered by an ATR-relative minimum depth, swept levels are marked so
//! each swing is taken at most once, and a per-level cooldown suppresses
//! repeat signals.

use crate::domain::Bar;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::swing::SwingPoint;
use super::Direction;

/// Immutable record of a confirmed liquidity sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub direction: Direction,
    /// The swing price that was taken.
    pub swept_level: Decimal,
    /// Wick tip of the sweep candle.
    pub sweep_wick: Decimal,
    pub sweep_bar_idx: usize,
    pub timestamp: DateTime<Utc>,
}

/// Detects liquidity sweeps at confirmed swing highs/lows.
#[derive(Debug, Clone)]
pub struct LiquiditySweepDetector {
    min_depth_atr_mult: Decimal,
    cooldown_bars: usize,
    max_sweeps: usize,
    sweeps: Vec<LiquiditySweep>,
    swept_levels: BTreeSet<usize>,
    cooldowns: BTreeMap<usize, usize>,
}

impl LiquiditySweepDetector {
    pub fn new(min_depth_atr_mult: Decimal, cooldown_bars: usize, max_sweeps: usize) -> Self {
        Self {
            min_depth_atr_mult,
            cooldown_bars,
            max_sweeps: max_sweeps.max(1),
            sweeps: Vec::new(),
            swept_levels: BTreeSet::new(),
            cooldowns: BTreeMap::new(),
        }
    }

    pub fn sweeps(&self) -> &[LiquiditySweep] {
        &self.sweeps
    }

    pub fn last_sweep(&self, direction: Direction) -> Option<&LiquiditySweep> {
        self.sweeps.iter().rev().find(|s| s.direction == direction)
    }

    /// Check the current bar for sweeps of the known swing levels.
    /// Returns the newly detected sweeps, typically 0 or 1.
    pub fn check_for_sweeps(
        &mut self,
        bar: &Bar,
        swing_highs: &[SwingPoint],
        swing_lows: &[SwingPoint],
        atr: Decimal,
        bar_idx: usize,
    ) -> Vec<LiquiditySweep> {
        let min_depth = self.min_depth_atr_mult * atr;
        let mut new_sweeps = Vec::new();

        for sl in swing_lows {
            if self.is_unavailable(sl.abs_idx, bar_idx) {
                continue;
            }
            if bar.low < sl.price && bar.close > sl.price {
                let depth = sl.price - bar.low;
                if depth >= min_depth {
                    let sweep = LiquiditySweep {
                        direction: Direction::Bullish,
                        swept_level: sl.price,
                        sweep_wick: bar.low,
                        sweep_bar_idx: bar_idx,
                        timestamp: bar.timestamp,
                    };
                    self.register(sweep.clone(), sl.abs_idx, bar_idx);
                    new_sweeps.push(sweep);
                }
            }
        }

        for sh in swing_highs {
            if self.is_unavailable(sh.abs_idx, bar_idx) {
                continue;
            }
            if bar.high > sh.price && bar.close < sh.price {
                let depth = bar.high - sh.price;
                if depth >= min_depth {
                    let sweep = LiquiditySweep {
                        direction: Direction::Bearish,
                        swept_level: sh.price,
                        sweep_wick: bar.high,
                        sweep_bar_idx: bar_idx,
                        timestamp: bar.timestamp,
                    };
                    self.register(sweep.clone(), sh.abs_idx, bar_idx);
                    new_sweeps.push(sweep);
                }
            }
        }

        new_sweeps
    }

    fn is_unavailable(&self, swing_abs_idx: usize, bar_idx: usize) -> bool {
        if self.swept_levels.contains(&swing_abs_idx) {
            return true;
        }
        self.cooldowns
            .get(&swing_abs_idx)
            .is_some_and(|&last| bar_idx - last < self.cooldown_bars)
    }

    fn register(&mut self, sweep: LiquiditySweep, swing_abs_idx: usize, bar_idx: usize) {
        self.swept_levels.insert(swing_abs_idx);
        self.cooldowns.insert(swing_abs_idx, bar_idx);
        self.sweeps.push(sweep);
        if self.sweeps.len() > self.max_sweeps {
            let excess = self.sweeps.len() - self.max_sweeps;
            self.sweeps.drain(..excess);
        }
    }
}
