//! Inducement (IDM) detection — minor swing traps behind a structure break.
//!
//! After a bullish break, the lowest minor swing low strictly between the
//! break bar and the current bar is the inducement level; mirror logic for
//! bearish breaks. Minor swings come from an internal secondary
//! SwingDetector running at a lower fractal strength than the structural
//! one. An IDM is cleared once price trades through its level.

use crate::domain::Bar;
use crate::strategy::BarBuffer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::structure::StructureBreak;
use super::swing::SwingDetector;
use super::Direction;

/// Immutable record of an inducement level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InducementPoint {
    pub direction: Direction,
    pub level: Decimal,
    pub idm_bar_idx: usize,
    pub cleared: bool,
    pub cleared_bar_idx: Option<usize>,
}

/// Detects and tracks inducement points after structure breaks.
#[derive(Debug, Clone)]
pub struct InducementDetector {
    secondary: SwingDetector,
    max_idm: usize,
    active: Vec<InducementPoint>,
    last_processed_break: Option<usize>,
}

impl InducementDetector {
    /// `secondary_strength` must be lower than the structural detector's
    /// strength to capture the smaller retracements retail stops sit under.
    pub fn new(secondary_strength: usize, max_idm: usize) -> Self {
        Self {
            secondary: SwingDetector::new(secondary_strength, 50),
            max_idm: max_idm.max(1),
            active: Vec::new(),
            last_processed_break: None,
        }
    }

    pub fn active_idm(&self) -> &[InducementPoint] {
        &self.active
    }

    /// Keep the internal minor-swing detector in sync; call once per bar.
    pub fn feed_bar(&mut self, buffer: &BarBuffer, bar_count: usize) {
        self.secondary.detect_confirmed_swings(buffer, bar_count);
    }

    /// Scan for a new inducement after a break. Each break is processed
    /// once, keyed by its bar index.
    pub fn detect_inducement(
        &mut self,
        structure_break: &StructureBreak,
        bar_idx: usize,
    ) -> Option<InducementPoint> {
        if self.last_processed_break == Some(structure_break.bar_idx) {
            return None;
        }
        self.last_processed_break = Some(structure_break.bar_idx);

        let between = |abs_idx: usize| {
            abs_idx > structure_break.bar_idx && abs_idx < bar_idx
        };

        let idm = match structure_break.direction {
            Direction::Bullish => self
                .secondary
                .swing_lows()
                .iter()
                .filter(|s| between(s.abs_idx))
                .min_by(|a, b| a.price.cmp(&b.price))
                .map(|lowest| InducementPoint {
                    direction: Direction::Bullish,
                    level: lowest.price,
                    idm_bar_idx: lowest.abs_idx,
                    cleared: false,
                    cleared_bar_idx: None,
                }),
            Direction::Bearish => self
                .secondary
                .swing_highs()
                .iter()
                .filter(|s| between(s.abs_idx))
                .max_by(|a, b| a.price.cmp(&b.price))
                .map(|highest| InducementPoint {
                    direction: Direction::Bearish,
                    level: highest.price,
                    idm_bar_idx: highest.abs_idx,
                    cleared: false,
                    cleared_bar_idx: None,
                }),
        };

        if let Some(idm) = &idm {
            self.active.push(idm.clone());
            if self.active.len() > self.max_idm {
                let excess = self.active.len() - self.max_idm;
                self.active.drain(..excess);
            }
        }
        idm
    }

    /// Check whether the current bar clears any uncleared IDM.
    pub fn check_idm_cleared(&mut self, bar: &Bar, bar_idx: usize) -> Option<InducementPoint> {
        for idm in &mut self.active {
            if idm.cleared {
                continue;
            }
            let cleared = match idm.direction {
                Direction::Bullish => bar.low < idm.level,
                Direction::Bearish => bar.high > idm.level,
            };
            if cleared {
                idm.cleared = true;
                idm.cleared_bar_idx = Some(bar_idx);
                return Some(idm.clone());
            }
        }
        None
    }

    /// True if any IDM in the given direction has been cleared.
    pub fn has_cleared_idm(&self, direction: Direction) -> bool {
        self.active
            .iter()
            .any(|idm| idm.cleared && idm.direction == direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use crate::smc::structure::BreakType;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn bar(day: u32, h: Decimal, l: Decimal) -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timestamp: ts(day),
            open: (h + l) / Decimal::TWO,
            high: h,
            low: l,
            close: (h + l) / Decimal::TWO,
            volume: 1000,
            timeframe: Timeframe::D1,
        }
    }

    fn bullish_break(bar_idx: usize) -> StructureBreak {
        StructureBreak {
            break_type: BreakType::Bos,
            direction: Direction::Bullish,
            broken_level: dec!(105),
            timestamp: ts(1),
            bar_idx,
        }
    }

    /// Feed bars so the secondary strength-1 detector confirms a minor
    /// swing low at abs index 3 (low 96).
    fn feed_minor_swings(det: &mut InducementDetector) {
        let bars = vec![
            bar(1, dec!(101), dec!(99)),
            bar(2, dec!(102), dec!(98)),
            bar(3, dec!(100), dec!(96)), // minor swing low
            bar(4, dec!(104), dec!(97)),
            bar(5, dec!(106), dec!(100)),
        ];
        let mut buffer = BarBuffer::new(100);
        for (i, b) in bars.iter().enumerate() {
            buffer.push(b.clone());
            det.feed_bar(&buffer, i + 1);
        }
    }

    #[test]
    fn bullish_idm_is_lowest_minor_swing_after_break() {
        let mut det = InducementDetector::new(1, 10);
        feed_minor_swings(&mut det);
        let idm = det.detect_inducement(&bullish_break(1), 6).unwrap();
        assert_eq!(idm.direction, Direction::Bullish);
        assert_eq!(idm.level, dec!(96));
        assert_eq!(idm.idm_bar_idx, 3);
        assert!(!idm.cleared);
    }

    #[test]
    fn break_is_processed_once() {
        let mut det = InducementDetector::new(1, 10);
        feed_minor_swings(&mut det);
        assert!(det.detect_inducement(&bullish_break(1), 6).is_some());
        assert!(det.detect_inducement(&bullish_break(1), 7).is_none());
    }

    #[test]
    fn idm_outside_window_is_ignored() {
        let mut det = InducementDetector::new(1, 10);
        feed_minor_swings(&mut det);
        // Break at bar 4: the swing at abs 3 is not strictly after it.
        assert!(det.detect_inducement(&bullish_break(4), 6).is_none());
    }

    #[test]
    fn trading_through_level_clears_idm() {
        let mut det = InducementDetector::new(1, 10);
        feed_minor_swings(&mut det);
        det.detect_inducement(&bullish_break(1), 6);
        assert!(!det.has_cleared_idm(Direction::Bullish));

        let cleared = det.check_idm_cleared(&bar(7, dec!(99), dec!(95)), 7).unwrap();
        assert!(cleared.cleared);
        assert_eq!(cleared.cleared_bar_idx, Some(7));
        assert!(det.has_cleared_idm(Direction::Bullish));
    }

    #[test]
    fn bar_above_level_does_not_clear() {
        let mut det = InducementDetector::new(1, 10);
        feed_minor_swings(&mut det);
        det.detect_inducement(&bullish_break(1), 6);
        assert!(det.check_idm_cleared(&bar(7, dec!(102), dec!(97)), 7).is_none());
    }
}
