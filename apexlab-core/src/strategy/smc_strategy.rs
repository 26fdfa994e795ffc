//! Combined Smart-Money-Concepts strategy.
//!
//! Pipeline per bar: buffer -> ATR -> confirmed swings -> structure
//! break -> FVG detection -> OB scan (break-triggered) -> OB/FVG state
//! updates -> exit check (priority) -> entry check.
//!
//! Entries require trend alignment, price inside an active order block,
//! and an overlapping active fair value gap in the same direction. Exits
//! fire on a counter-trend CHOCH or a freshly invalidated aligned OB.

use crate::domain::{Bar, Signal, SignalKind};
use crate::smc::{
    BreakType, Direction, FvgTracker, MarketStructureTracker, MitigationMode, ObState,
    OrderBlockDetector, StructureBreak, SwingDetector, TrendState,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{simple_atr, BarBuffer, Strategy};

/// SMC strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmcConfig {
    pub swing_strength: usize,
    pub atr_period: usize,
    /// Displacement threshold for OB detection, as an ATR multiple.
    pub atr_mult_threshold: Decimal,
    pub ob_lookback_bars: usize,
    pub max_active_obs: usize,
    pub ob_max_age_bars: usize,
    pub max_fvgs: usize,
    pub fvg_max_age_bars: usize,
    /// Minimum FVG size as an ATR multiple.
    pub fvg_min_size_atr: Decimal,
    pub mitigation_mode: MitigationMode,
    /// Bars before any signal may be generated.
    pub warmup_bars: usize,
    pub max_buffer: usize,
}

impl Default for SmcConfig {
    fn default() -> Self {
        Self {
            swing_strength: 2,
            atr_period: 14,
            atr_mult_threshold: Decimal::new(15, 1), // 1.5
            ob_lookback_bars: 10,
            max_active_obs: 5,
            ob_max_age_bars: 100,
            max_fvgs: 20,
            fvg_max_age_bars: 100,
            fvg_min_size_atr: Decimal::new(5, 1), // 0.5
            mitigation_mode: MitigationMode::Wick,
            warmup_bars: 30,
            max_buffer: BarBuffer::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PositionBias {
    Flat,
    Long,
    Short,
}

/// SMC confluence strategy over one symbol.
pub struct SmcStrategy {
    symbol: String,
    config: SmcConfig,
    buffer: BarBuffer,
    swing_detector: SwingDetector,
    structure: MarketStructureTracker,
    fvg_tracker: FvgTracker,
    ob_detector: OrderBlockDetector,
    bar_count: usize,
    bias: PositionBias,
    current_atr: Decimal,
}

impl SmcStrategy {
    pub fn new(symbol: impl Into<String>, config: SmcConfig) -> Self {
        let buffer = BarBuffer::new(config.max_buffer);
        Self {
            symbol: symbol.into(),
            swing_detector: SwingDetector::new(config.swing_strength, 50),
            structure: MarketStructureTracker::new(50),
            fvg_tracker: FvgTracker::new(
                config.max_fvgs,
                config.fvg_max_age_bars,
                config.fvg_min_size_atr,
                config.mitigation_mode,
            ),
            ob_detector: OrderBlockDetector::new(
                config.atr_mult_threshold,
                config.ob_lookback_bars,
                config.max_active_obs,
                config.ob_max_age_bars,
                false,
            ),
            buffer,
            config,
            bar_count: 0,
            bias: PositionBias::Flat,
            current_atr: Decimal::ZERO,
        }
    }

    pub fn trend(&self) -> TrendState {
        self.structure.trend()
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub(crate) fn swing_highs(&self) -> &[crate::smc::SwingPoint] {
        self.swing_detector.swing_highs()
    }

    pub(crate) fn swing_lows(&self) -> &[crate::smc::SwingPoint] {
        self.swing_detector.swing_lows()
    }

    pub(crate) fn buffer(&self) -> &BarBuffer {
        &self.buffer
    }

    /// Shared bar bookkeeping: buffer, counter, ATR, swings, structure,
    /// FVG detection, OB scan, state updates. Returns this bar's
    /// structure break, if any.
    pub(crate) fn advance_state(&mut self, bar: &Bar) -> Option<StructureBreak> {
        self.buffer.push(bar.clone());
        self.bar_count += 1;
        self.current_atr = simple_atr(&self.buffer, self.config.atr_period);

        let (new_highs, new_lows) = self
            .swing_detector
            .detect_confirmed_swings(&self.buffer, self.bar_count);
        for swing in new_highs {
            self.structure.on_new_swing_high(swing);
        }
        for swing in new_lows {
            self.structure.on_new_swing_low(swing);
        }

        let structure_break =
            self.structure
                .on_bar_close(bar.close, self.bar_count, bar.timestamp);

        if self.current_atr > Decimal::ZERO {
            self.fvg_tracker
                .detect_and_register(&self.buffer, self.bar_count, self.current_atr);
            if let Some(brk) = &structure_break {
                self.ob_detector.scan_for_new_ob(
                    &self.buffer,
                    self.bar_count,
                    self.current_atr,
                    brk,
                );
            }
        }

        self.ob_detector.update_states(bar, self.bar_count);
        self.fvg_tracker.update_all_states(bar, self.bar_count);

        structure_break
    }

    pub(crate) fn check_exit(
        &mut self,
        bar: &Bar,
        structure_break: Option<&StructureBreak>,
    ) -> Option<Signal> {
        if self.bias == PositionBias::Flat {
            return None;
        }

        let mut should_exit = false;

        if let Some(brk) = structure_break {
            if brk.break_type == BreakType::Choch {
                should_exit = matches!(
                    (self.bias, brk.direction),
                    (PositionBias::Long, Direction::Bearish)
                        | (PositionBias::Short, Direction::Bullish)
                );
            }
        }

        if !should_exit {
            let aligned = match self.bias {
                PositionBias::Long => Direction::Bullish,
                PositionBias::Short => Direction::Bearish,
                PositionBias::Flat => unreachable!(),
            };
            // A freshly invalidated aligned OB signals the setup failed.
            should_exit = self.ob_detector.blocks().iter().any(|ob| {
                ob.direction == aligned
                    && ob.state == ObState::Invalidated
                    && ob.formed_bar_idx + 5 >= self.bar_count
            });
        }

        if should_exit {
            self.bias = PositionBias::Flat;
            return Some(Signal {
                symbol: bar.symbol.clone(),
                timestamp: bar.timestamp,
                kind: SignalKind::Exit,
                strength: Decimal::new(8, 1),
            });
        }
        None
    }

    /// Trend-aligned OB + overlapping FVG confluence check. Returns the
    /// entry direction without mutating position state.
    pub(crate) fn confluence_entry(&self, bar: &Bar) -> Option<Direction> {
        match self.structure.trend() {
            TrendState::Uptrend => {
                for ob in self.ob_detector.active_blocks() {
                    if ob.direction != Direction::Bullish {
                        continue;
                    }
                    if bar.low <= ob.high && bar.close >= ob.low {
                        for fvg in self.fvg_tracker.active_gaps(Some(Direction::Bullish)) {
                            if zones_overlap(ob.low, ob.high, fvg.bottom, fvg.top) {
                                return Some(Direction::Bullish);
                            }
                        }
                    }
                }
                None
            }
            TrendState::Downtrend => {
                for ob in self.ob_detector.active_blocks() {
                    if ob.direction != Direction::Bearish {
                        continue;
                    }
                    if bar.high >= ob.low && bar.close <= ob.high {
                        for fvg in self.fvg_tracker.active_gaps(Some(Direction::Bearish)) {
                            if zones_overlap(ob.low, ob.high, fvg.bottom, fvg.top) {
                                return Some(Direction::Bearish);
                            }
                        }
                    }
                }
                None
            }
            TrendState::Undefined => None,
        }
    }

    pub(crate) fn enter(&mut self, bar: &Bar, direction: Direction) -> Signal {
        let kind = match direction {
            Direction::Bullish => {
                self.bias = PositionBias::Long;
                SignalKind::Long
            }
            Direction::Bearish => {
                self.bias = PositionBias::Short;
                SignalKind::Short
            }
        };
        Signal {
            symbol: bar.symbol.clone(),
            timestamp: bar.timestamp,
            kind,
            strength: Decimal::new(9, 1),
        }
    }

    pub(crate) fn in_position(&self) -> bool {
        self.bias != PositionBias::Flat
    }

    pub(crate) fn warmed_up(&self) -> bool {
        self.bar_count >= self.config.warmup_bars
    }
}

pub(crate) fn zones_overlap(
    a_low: Decimal,
    a_high: Decimal,
    b_low: Decimal,
    b_high: Decimal,
) -> bool {
    a_low <= b_high && b_low <= a_high
}

impl Strategy for SmcStrategy {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn current_atr(&self) -> Decimal {
        self.current_atr
    }

    fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal> {
        let structure_break = self.advance_state(bar);

        if !self.warmed_up() {
            return None;
        }

        if let Some(exit) = self.check_exit(bar, structure_break.as_ref()) {
            return Some(exit);
        }

        if self.in_position() {
            return None;
        }
        self.confluence_entry(bar).map(|dir| self.enter(bar, dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(i: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::hours(i),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 1000,
            timeframe: Timeframe::H1,
        }
    }

    #[test]
    fn warmup_suppresses_signals() {
        let mut strat = SmcStrategy::new("EURUSD", SmcConfig {
            warmup_bars: 10,
            ..SmcConfig::default()
        });
        for i in 0..9 {
            assert!(strat
                .calculate_signals(&bar(i, dec!(100), dec!(101), dec!(99), dec!(100)))
                .is_none());
        }
        assert_eq!(strat.bar_count(), 9);
    }

    #[test]
    fn state_machines_stay_in_sync_through_pipeline() {
        let mut strat = SmcStrategy::new("EURUSD", SmcConfig {
            warmup_bars: 3,
            swing_strength: 1,
            ..SmcConfig::default()
        });
        // An up-trending series: swings confirm, structure eventually breaks.
        for i in 0..30 {
            let base = dec!(100) + Decimal::from(i) * dec!(2);
            let wiggle = if i % 3 == 0 { dec!(3) } else { dec!(0) };
            strat.calculate_signals(&bar(
                i,
                base,
                base + dec!(4) + wiggle,
                base - dec!(4),
                base + dec!(2),
            ));
        }
        assert_eq!(strat.trend(), TrendState::Uptrend);
        assert!(strat.current_atr() > Decimal::ZERO);
    }

    #[test]
    fn zones_overlap_boundary() {
        assert!(zones_overlap(dec!(1), dec!(2), dec!(2), dec!(3)));
        assert!(!zones_overlap(dec!(1), dec!(2), dec!(2.1), dec!(3)));
    }
}
