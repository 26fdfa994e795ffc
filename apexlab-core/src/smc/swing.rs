//! Fractal swing high/low detection.
//!
//! A bar at absolute index i is a confirmed swing high iff its high is
//! strictly greater than the highs of the `strength` bars on each side;
//! symmetric for lows. Confirmation is produced only once `strength` bars
//! to the right exist, which removes lookahead by construction: the swing
//! for the bar at buffer position -(strength+1) is reported `strength`
//! bars after the fact.

use crate::domain::Bar;
use crate::strategy::BarBuffer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable record of a confirmed swing high or low.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Absolute bar index in the full series (1-based bar count).
    pub abs_idx: usize,
}

/// Fractal swing detector with configurable strength.
#[derive(Debug, Clone)]
pub struct SwingDetector {
    strength: usize,
    max_history: usize,
    swing_highs: Vec<SwingPoint>,
    swing_lows: Vec<SwingPoint>,
}

impl SwingDetector {
    /// `strength` bars on each side are required to confirm a swing, so
    /// `2 * strength + 1` bars minimum. Strength 2 is the classic 5-bar
    /// fractal.
    pub fn new(strength: usize, max_history: usize) -> Self {
        assert!(strength >= 1, "swing strength must be >= 1");
        Self {
            strength,
            max_history: max_history.max(1),
            swing_highs: Vec::new(),
            swing_lows: Vec::new(),
        }
    }

    pub fn strength(&self) -> usize {
        self.strength
    }

    pub fn swing_highs(&self) -> &[SwingPoint] {
        &self.swing_highs
    }

    pub fn swing_lows(&self) -> &[SwingPoint] {
        &self.swing_lows
    }

    /// Check for newly confirmed swings. The candidate sits at buffer
    /// position -(strength+1); `bar_count` is the 1-based count of bars
    /// seen so far, so the candidate's absolute index is
    /// `bar_count - strength`. Returns (new_highs, new_lows), each
    /// typically 0 or 1 long.
    pub fn detect_confirmed_swings(
        &mut self,
        buffer: &BarBuffer,
        bar_count: usize,
    ) -> (Vec<SwingPoint>, Vec<SwingPoint>) {
        let s = self.strength;
        if buffer.len() < 2 * s + 1 {
            return (Vec::new(), Vec::new());
        }

        let candidate = buffer.from_end(s).expect("len >= 2s+1");
        let abs_idx = bar_count - s;

        let mut new_highs = Vec::new();
        let mut new_lows = Vec::new();

        if self.is_swing(buffer, candidate, s, SwingKind::High) {
            let point = SwingPoint {
                price: candidate.high,
                timestamp: candidate.timestamp,
                abs_idx,
            };
            if self.swing_highs.last().map(|p| p.abs_idx) != Some(abs_idx) {
                self.swing_highs.push(point.clone());
                new_highs.push(point);
                Self::trim(&mut self.swing_highs, self.max_history);
            }
        }

        if self.is_swing(buffer, candidate, s, SwingKind::Low) {
            let point = SwingPoint {
                price: candidate.low,
                timestamp: candidate.timestamp,
                abs_idx,
            };
            if self.swing_lows.last().map(|p| p.abs_idx) != Some(abs_idx) {
                self.swing_lows.push(point.clone());
                new_lows.push(point);
                Self::trim(&mut self.swing_lows, self.max_history);
            }
        }

        (new_highs, new_lows)
    }

    fn is_swing(&self, buffer: &BarBuffer, candidate: &Bar, s: usize, kind: SwingKind) -> bool {
        for offset in 1..=s {
            let left = buffer.from_end(s + offset).expect("len checked");
            let right = buffer.from_end(s - offset).expect("len checked");
            let beaten = match kind {
                SwingKind::High => {
                    left.high >= candidate.high || right.high >= candidate.high
                }
                SwingKind::Low => left.low <= candidate.low || right.low <= candidate.low,
            };
            if beaten {
                return false;
            }
        }
        true
    }

    fn trim(points: &mut Vec<SwingPoint>, max: usize) {
        if points.len() > max {
            let excess = points.len() - max;
            points.drain(..excess);
        }
    }
}

#[derive(Clone, Copy)]
enum SwingKind {
    High,
    Low,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(day: u32, high: Decimal, low: Decimal) -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: (high + low) / Decimal::TWO,
            high,
            low,
            close: (high + low) / Decimal::TWO,
            volume: 1000,
            timeframe: Timeframe::D1,
        }
    }

    fn feed(detector: &mut SwingDetector, bars: &[Bar]) -> (Vec<SwingPoint>, Vec<SwingPoint>) {
        let mut buffer = BarBuffer::new(100);
        let mut highs = Vec::new();
        let mut lows = Vec::new();
        for (i, b) in bars.iter().enumerate() {
            buffer.push(b.clone());
            let (h, l) = detector.detect_confirmed_swings(&buffer, i + 1);
            highs.extend(h);
            lows.extend(l);
        }
        (highs, lows)
    }

    #[test]
    fn detects_center_swing_high() {
        let mut det = SwingDetector::new(2, 50);
        let bars = vec![
            bar(1, dec!(100), dec!(90)),
            bar(2, dec!(101), dec!(91)),
            bar(3, dec!(110), dec!(95)), // the swing high
            bar(4, dec!(102), dec!(92)),
            bar(5, dec!(101), dec!(91)),
        ];
        let (highs, _) = feed(&mut det, &bars);
        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].price, dec!(110));
        assert_eq!(highs[0].abs_idx, 3);
    }

    #[test]
    fn confirmation_waits_for_right_bars() {
        let mut det = SwingDetector::new(2, 50);
        let mut buffer = BarBuffer::new(100);
        let bars = vec![
            bar(1, dec!(100), dec!(90)),
            bar(2, dec!(101), dec!(91)),
            bar(3, dec!(110), dec!(95)),
            bar(4, dec!(102), dec!(92)),
        ];
        for (i, b) in bars.iter().enumerate() {
            buffer.push(b.clone());
            let (h, _) = det.detect_confirmed_swings(&buffer, i + 1);
            // Only 1 right-side bar so far: nothing may confirm.
            assert!(h.is_empty());
        }
        buffer.push(bar(5, dec!(101), dec!(91)));
        let (h, _) = det.detect_confirmed_swings(&buffer, 5);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn equal_highs_do_not_confirm() {
        let mut det = SwingDetector::new(1, 50);
        let bars = vec![
            bar(1, dec!(110), dec!(90)),
            bar(2, dec!(110), dec!(91)), // ties the neighbor: not strict
            bar(3, dec!(100), dec!(92)),
        ];
        let (highs, _) = feed(&mut det, &bars);
        assert!(highs.is_empty());
    }

    #[test]
    fn detects_swing_low() {
        let mut det = SwingDetector::new(1, 50);
        let bars = vec![
            bar(1, dec!(100), dec!(95)),
            bar(2, dec!(99), dec!(90)), // the swing low
            bar(3, dec!(101), dec!(94)),
        ];
        let (_, lows) = feed(&mut det, &bars);
        assert_eq!(lows.len(), 1);
        assert_eq!(lows[0].price, dec!(90));
        assert_eq!(lows[0].abs_idx, 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut det = SwingDetector::new(1, 3);
        // Alternating peaks confirm a swing every other bar.
        let mut bars = Vec::new();
        for i in 0..40u32 {
            let (high, low) = if i % 2 == 0 {
                (dec!(110), dec!(100))
            } else {
                (dec!(105), dec!(95))
            };
            bars.push(bar(i % 28 + 1, high, low));
        }
        feed(&mut det, &bars);
        assert!(det.swing_highs().len() <= 3);
        assert!(det.swing_lows().len() <= 3);
    }
}
