//! Fair Value Gap detection and lifecycle tracking.
//!
//! A bullish gap forms when the bar three back leaves its high below the
//! current bar's low (symmetric for bearish). Gap states only advance:
//! OPEN -> TOUCHED -> MITIGATED -> INVERTED, with EXPIRED reachable from
//! any non-terminal state on age or memory pressure. INVERTED and EXPIRED
//! are absorbing. A gap cannot transition past OPEN on its formation bar.

use crate::domain::Bar;
use crate::strategy::BarBuffer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;

/// How far price must retrace into a gap to count as mitigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationMode {
    /// Any wick past the far edge.
    #[default]
    Wick,
    /// Wick past the midpoint.
    FiftyPercent,
    /// Close past the far edge.
    Close,
}

/// Gap lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FvgState {
    Open,
    Touched,
    Mitigated,
    Inverted,
    Expired,
}

impl FvgState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FvgState::Inverted | FvgState::Expired)
    }

    /// Ordinal used to assert forward-only progression.
    pub fn rank(&self) -> u8 {
        match self {
            FvgState::Open => 0,
            FvgState::Touched => 1,
            FvgState::Mitigated => 2,
            FvgState::Inverted => 3,
            FvgState::Expired => 4,
        }
    }
}

/// A tracked gap with its mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub direction: Direction,
    pub top: Decimal,
    pub bottom: Decimal,
    pub midpoint: Decimal,
    pub formed_bar_idx: usize,
    pub state: FvgState,
}

impl FairValueGap {
    pub fn size(&self) -> Decimal {
        self.top - self.bottom
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, FvgState::Open | FvgState::Touched)
    }
}

/// Detects gaps from the last three bars and drives their lifecycle.
#[derive(Debug, Clone)]
pub struct FvgTracker {
    max_fvgs: usize,
    max_age_bars: usize,
    min_size_atr_mult: Decimal,
    mitigation_mode: MitigationMode,
    gaps: Vec<FairValueGap>,
}

impl FvgTracker {
    pub fn new(
        max_fvgs: usize,
        max_age_bars: usize,
        min_size_atr_mult: Decimal,
        mitigation_mode: MitigationMode,
    ) -> Self {
        Self {
            max_fvgs: max_fvgs.max(1),
            max_age_bars,
            min_size_atr_mult,
            mitigation_mode,
            gaps: Vec::new(),
        }
    }

    pub fn gaps(&self) -> &[FairValueGap] {
        &self.gaps
    }

    /// Gaps still in OPEN or TOUCHED state, optionally filtered by direction.
    pub fn active_gaps(&self, direction: Option<Direction>) -> Vec<&FairValueGap> {
        self.gaps
            .iter()
            .filter(|g| g.is_active())
            .filter(|g| direction.map_or(true, |d| g.direction == d))
            .collect()
    }

    /// Detect a new gap from the last three bars and register it. The gap
    /// qualifies only when its size reaches `min_size_atr_mult * atr`.
    pub fn detect_and_register(
        &mut self,
        buffer: &BarBuffer,
        bar_idx: usize,
        atr: Decimal,
    ) -> Option<FairValueGap> {
        if buffer.len() < 3 {
            return None;
        }
        let first = buffer.from_end(2).expect("len >= 3");
        let third = buffer.from_end(0).expect("len >= 3");
        let min_size = atr * self.min_size_atr_mult;

        let gap = if first.high < third.low {
            let size = third.low - first.high;
            (size >= min_size).then(|| FairValueGap {
                direction: Direction::Bullish,
                top: third.low,
                bottom: first.high,
                midpoint: (third.low + first.high) / Decimal::TWO,
                formed_bar_idx: bar_idx,
                state: FvgState::Open,
            })
        } else if first.low > third.high {
            let size = first.low - third.high;
            (size >= min_size).then(|| FairValueGap {
                direction: Direction::Bearish,
                top: first.low,
                bottom: third.high,
                midpoint: (first.low + third.high) / Decimal::TWO,
                formed_bar_idx: bar_idx,
                state: FvgState::Open,
            })
        } else {
            None
        };

        if let Some(gap) = &gap {
            self.gaps.push(gap.clone());
            self.enforce_memory_limit();
        }
        gap
    }

    /// Advance every tracked gap against the current bar.
    pub fn update_all_states(&mut self, bar: &Bar, bar_idx: usize) {
        let mode = self.mitigation_mode;
        let max_age = self.max_age_bars;
        for gap in &mut self.gaps {
            if gap.state.is_terminal() {
                continue;
            }
            if gap.state == FvgState::Mitigated {
                check_inversion(gap, bar);
                continue;
            }
            if bar_idx - gap.formed_bar_idx > max_age {
                gap.state = FvgState::Expired;
                continue;
            }
            // Same-bar guard: no transition past OPEN on the formation bar.
            if bar_idx <= gap.formed_bar_idx {
                continue;
            }
            transition(gap, bar, mode);
        }
    }

    /// Expire oldest active gaps when the tracked count exceeds the cap
    /// (OPEN gaps first, then TOUCHED), and prune terminal gaps once the
    /// list itself outgrows the cap.
    fn enforce_memory_limit(&mut self) {
        loop {
            let active = self.gaps.iter().filter(|g| g.is_active()).count();
            if active <= self.max_fvgs {
                break;
            }
            if let Some(gap) = self.gaps.iter_mut().find(|g| g.state == FvgState::Open) {
                gap.state = FvgState::Expired;
            } else if let Some(gap) = self.gaps.iter_mut().find(|g| g.state == FvgState::Touched) {
                gap.state = FvgState::Expired;
            } else {
                break;
            }
        }

        if self.gaps.len() > self.max_fvgs {
            self.gaps.retain(|g| !g.state.is_terminal());
        }
    }
}

fn transition(gap: &mut FairValueGap, bar: &Bar, mode: MitigationMode) {
    // A touch requires the wick to actually enter the zone; a bar that
    // jumps the entire gap without trading inside it leaves the gap OPEN.
    let wick_in_zone = bar.low <= gap.top && bar.high >= gap.bottom;
    match gap.direction {
        Direction::Bullish => {
            if gap.state == FvgState::Open && wick_in_zone {
                gap.state = FvgState::Touched;
            }
            if gap.state == FvgState::Touched {
                let mitigated = match mode {
                    MitigationMode::Wick => bar.low <= gap.bottom,
                    MitigationMode::FiftyPercent => bar.low <= gap.midpoint,
                    MitigationMode::Close => bar.close < gap.bottom,
                };
                if mitigated {
                    gap.state = FvgState::Mitigated;
                }
            }
            if gap.state == FvgState::Mitigated && bar.close < gap.bottom {
                gap.state = FvgState::Inverted;
            }
        }
        Direction::Bearish => {
            if gap.state == FvgState::Open && wick_in_zone {
                gap.state = FvgState::Touched;
            }
            if gap.state == FvgState::Touched {
                let mitigated = match mode {
                    MitigationMode::Wick => bar.high >= gap.top,
                    MitigationMode::FiftyPercent => bar.high >= gap.midpoint,
                    MitigationMode::Close => bar.close > gap.top,
                };
                if mitigated {
                    gap.state = FvgState::Mitigated;
                }
            }
            if gap.state == FvgState::Mitigated && bar.close > gap.top {
                gap.state = FvgState::Inverted;
            }
        }
    }
}

fn check_inversion(gap: &mut FairValueGap, bar: &Bar) {
    let inverted = match gap.direction {
        Direction::Bullish => bar.close < gap.bottom,
        Direction::Bearish => bar.close > gap.top,
    };
    if inverted {
        gap.state = FvgState::Inverted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(day: u32, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 1000,
            timeframe: Timeframe::D1,
        }
    }

    /// Three bars forming a bullish gap: bar0 high 10.0 < bar2 low 10.5.
    fn bullish_gap_buffer() -> BarBuffer {
        let mut buf = BarBuffer::new(100);
        buf.push(bar(1, dec!(9.8), dec!(10.0), dec!(9.6), dec!(9.9)));
        buf.push(bar(2, dec!(10.0), dec!(10.6), dec!(9.9), dec!(10.5)));
        buf.push(bar(3, dec!(10.6), dec!(11.0), dec!(10.5), dec!(10.9)));
        buf
    }

    #[test]
    fn detects_bullish_gap() {
        let mut tracker = FvgTracker::new(20, 100, dec!(0.5), MitigationMode::Wick);
        let gap = tracker
            .detect_and_register(&bullish_gap_buffer(), 3, dec!(0.4))
            .unwrap();
        assert_eq!(gap.direction, Direction::Bullish);
        assert_eq!(gap.top, dec!(10.5));
        assert_eq!(gap.bottom, dec!(10.0));
        assert_eq!(gap.midpoint, dec!(10.25));
    }

    #[test]
    fn undersized_gap_is_ignored() {
        let mut tracker = FvgTracker::new(20, 100, dec!(0.5), MitigationMode::Wick);
        // min size = 0.5 * 2.0 = 1.0 > gap size 0.5
        assert!(tracker
            .detect_and_register(&bullish_gap_buffer(), 3, dec!(2.0))
            .is_none());
    }

    #[test]
    fn lifecycle_open_touched_mitigated_inverted() {
        let mut tracker = FvgTracker::new(20, 100, dec!(0.1), MitigationMode::Wick);
        tracker.detect_and_register(&bullish_gap_buffer(), 2, dec!(1.0));

        // Bar 3: high below zone, no touch.
        tracker.update_all_states(&bar(4, dec!(9.7), dec!(9.8), dec!(9.5), dec!(9.7)), 3);
        assert_eq!(tracker.gaps()[0].state, FvgState::Open);

        // Bar 4: low dips into the zone.
        tracker.update_all_states(&bar(5, dec!(10.4), dec!(10.6), dec!(10.2), dec!(10.5)), 4);
        assert_eq!(tracker.gaps()[0].state, FvgState::Touched);

        // Bar 5: wick through the bottom (wick mode mitigates).
        tracker.update_all_states(&bar(6, dec!(10.2), dec!(10.3), dec!(9.9), dec!(10.1)), 5);
        assert_eq!(tracker.gaps()[0].state, FvgState::Mitigated);

        // Bar 6: close below the bottom inverts.
        tracker.update_all_states(&bar(7, dec!(9.8), dec!(9.9), dec!(9.4), dec!(9.5)), 6);
        assert_eq!(tracker.gaps()[0].state, FvgState::Inverted);

        // Bar 7: terminal state is absorbing.
        tracker.update_all_states(&bar(8, dec!(11), dec!(12), dec!(10.5), dec!(11.5)), 7);
        assert_eq!(tracker.gaps()[0].state, FvgState::Inverted);
    }

    #[test]
    fn no_same_bar_mitigation() {
        let mut tracker = FvgTracker::new(20, 100, dec!(0.1), MitigationMode::Wick);
        tracker.detect_and_register(&bullish_gap_buffer(), 3, dec!(1.0));
        // Updating with the formation bar index leaves the gap OPEN even
        // though the bar's range covers the whole zone.
        tracker.update_all_states(&bar(3, dec!(10.6), dec!(11.0), dec!(9.0), dec!(10.9)), 3);
        assert_eq!(tracker.gaps()[0].state, FvgState::Open);
    }

    #[test]
    fn close_mode_requires_close_through() {
        let mut tracker = FvgTracker::new(20, 100, dec!(0.1), MitigationMode::Close);
        tracker.detect_and_register(&bullish_gap_buffer(), 2, dec!(1.0));
        // Wick through the bottom but close inside: touched, not mitigated.
        tracker.update_all_states(&bar(4, dec!(10.3), dec!(10.4), dec!(9.9), dec!(10.2)), 3);
        assert_eq!(tracker.gaps()[0].state, FvgState::Touched);
        // A close below the bottom mitigates, and the same close already
        // satisfies the inversion rule, so the gap lands on INVERTED.
        tracker.update_all_states(&bar(5, dec!(10.1), dec!(10.2), dec!(9.8), dec!(9.9)), 4);
        assert_eq!(tracker.gaps()[0].state, FvgState::Inverted);
    }

    #[test]
    fn age_expiry() {
        let mut tracker = FvgTracker::new(20, 5, dec!(0.1), MitigationMode::Wick);
        tracker.detect_and_register(&bullish_gap_buffer(), 3, dec!(1.0));
        tracker.update_all_states(&bar(4, dec!(12), dec!(12.5), dec!(11.5), dec!(12)), 9);
        assert_eq!(tracker.gaps()[0].state, FvgState::Expired);
    }

    #[test]
    fn memory_pressure_expires_oldest_open() {
        let mut tracker = FvgTracker::new(2, 100, dec!(0.0), MitigationMode::Wick);
        for i in 0..4usize {
            tracker.detect_and_register(&bullish_gap_buffer(), i + 3, dec!(0.1));
        }
        let active = tracker.active_gaps(None).len();
        assert!(active <= 2, "active gaps {active} exceed cap");
    }
}
