//! ICT enhanced-liquidity strategy.
//!
//! Runs the full SMC pipeline and then gates entries behind the ICT
//! filters: kill-zone session, premium/discount OTE band, liquidity
//! sweep and inducement clearance. Every filter is individually
//! toggleable; exits are identical to the SMC strategy's.

use crate::domain::{Bar, Signal};
use crate::smc::{
    compute_premium_discount, in_ote_zone, Direction, InducementDetector, KillZoneFilter,
    LiquiditySweepDetector, Session, TradeSide,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::smc_strategy::{SmcConfig, SmcStrategy};
use super::Strategy;

/// ICT filter parameters on top of the SMC pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IctConfig {
    pub smc: SmcConfig,
    /// Minimum sweep depth as an ATR multiple.
    pub sweep_min_depth_atr: Decimal,
    /// Per-level sweep cooldown in bars.
    pub sweep_cooldown_bars: usize,
    /// Fractal strength of the minor-swing detector feeding IDM.
    pub idm_secondary_strength: usize,
    pub require_sweep: bool,
    pub require_idm: bool,
    pub require_kill_zone: bool,
    pub require_ote: bool,
    pub active_sessions: Vec<Session>,
}

impl Default for IctConfig {
    fn default() -> Self {
        Self {
            smc: SmcConfig::default(),
            sweep_min_depth_atr: Decimal::new(1, 1), // 0.1
            sweep_cooldown_bars: 10,
            idm_secondary_strength: 1,
            require_sweep: true,
            require_idm: false,
            require_kill_zone: true,
            require_ote: true,
            active_sessions: vec![Session::LondonOpen, Session::NyOpen, Session::NyClose],
        }
    }
}

/// SMC confluence gated by ICT order-flow filters.
pub struct IctStrategy {
    smc: SmcStrategy,
    sweep_detector: LiquiditySweepDetector,
    idm_detector: InducementDetector,
    kill_zone: KillZoneFilter,
    require_sweep: bool,
    require_idm: bool,
    require_kill_zone: bool,
    require_ote: bool,
}

impl IctStrategy {
    pub fn new(symbol: impl Into<String>, config: IctConfig) -> Self {
        Self {
            smc: SmcStrategy::new(symbol, config.smc),
            sweep_detector: LiquiditySweepDetector::new(
                config.sweep_min_depth_atr,
                config.sweep_cooldown_bars,
                30,
            ),
            idm_detector: InducementDetector::new(config.idm_secondary_strength, 10),
            kill_zone: KillZoneFilter::new(config.active_sessions),
            require_sweep: config.require_sweep,
            require_idm: config.require_idm,
            require_kill_zone: config.require_kill_zone,
            require_ote: config.require_ote,
        }
    }

    fn passes_ict_filters(&self, bar: &Bar, direction: Direction) -> bool {
        if self.require_ote {
            let highs = self.smc.swing_highs();
            let lows = self.smc.swing_lows();
            if let (Some(high), Some(low)) = (highs.last(), lows.last()) {
                let zone = compute_premium_discount(high.price, low.price);
                let side = match direction {
                    Direction::Bullish => TradeSide::Long,
                    Direction::Bearish => TradeSide::Short,
                };
                if !in_ote_zone(bar.close, &zone, side) {
                    return false;
                }
            }
        }

        if self.require_sweep && self.sweep_detector.last_sweep(direction).is_none() {
            return false;
        }

        if self.require_idm && !self.idm_detector.has_cleared_idm(direction) {
            return false;
        }

        true
    }
}

impl Strategy for IctStrategy {
    fn symbol(&self) -> &str {
        self.smc.symbol()
    }

    fn current_atr(&self) -> Decimal {
        self.smc.current_atr()
    }

    fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal> {
        let structure_break = self.smc.advance_state(bar);

        // ICT detectors run every bar so their state never drifts, even
        // during warmup or while a position is open.
        let atr = self.smc.current_atr();
        if atr > Decimal::ZERO {
            self.sweep_detector.check_for_sweeps(
                bar,
                self.smc.swing_highs(),
                self.smc.swing_lows(),
                atr,
                self.smc.bar_count(),
            );
        }
        self.idm_detector
            .feed_bar(self.smc.buffer(), self.smc.bar_count());
        if let Some(brk) = &structure_break {
            self.idm_detector.detect_inducement(brk, self.smc.bar_count());
        }
        self.idm_detector.check_idm_cleared(bar, self.smc.bar_count());

        if !self.smc.warmed_up() {
            return None;
        }

        if let Some(exit) = self.smc.check_exit(bar, structure_break.as_ref()) {
            return Some(exit);
        }
        if self.smc.in_position() {
            return None;
        }

        if self.require_kill_zone && !self.kill_zone.is_kill_zone(bar.timestamp) {
            return None;
        }

        let direction = self.smc.confluence_entry(bar)?;
        if !self.passes_ict_filters(bar, direction) {
            return None;
        }
        Some(self.smc.enter(bar, direction))
    }
}
