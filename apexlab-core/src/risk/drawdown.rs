//! Drawdown-based position scaling.

use crate::portfolio::EquityEntry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Drawdown scaler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownScalerConfig {
    /// Underwater ratio where scaling begins.
    pub max_drawdown_pct: Decimal,
    /// Underwater ratio where scaling bottoms out at `min_scale`.
    pub full_stop_pct: Decimal,
    /// Floor for the scale factor.
    pub min_scale: Decimal,
}

impl Default for DrawdownScalerConfig {
    fn default() -> Self {
        Self {
            max_drawdown_pct: Decimal::new(5, 2),  // 0.05
            full_stop_pct: Decimal::new(20, 2),    // 0.20
            min_scale: Decimal::new(25, 2),        // 0.25
        }
    }
}

/// Scales position size down linearly as the equity curve goes underwater.
#[derive(Debug, Clone)]
pub struct DrawdownScaler {
    config: DrawdownScalerConfig,
}

impl DrawdownScaler {
    pub fn new(config: DrawdownScalerConfig) -> Self {
        Self { config }
    }

    /// Scale factor for the current drawdown: 1 at or below the lower
    /// threshold, `min_scale` at or above the upper, linear in between.
    pub fn compute_scale(&self, equity_log: &[EquityEntry]) -> Decimal {
        let Some(last) = equity_log.last() else {
            return Decimal::ONE;
        };

        let peak = equity_log
            .iter()
            .map(|e| e.equity)
            .max()
            .unwrap_or(Decimal::ZERO);
        if peak <= Decimal::ZERO {
            return Decimal::ONE;
        }

        let dd = (peak - last.equity) / peak;
        if dd <= self.config.max_drawdown_pct {
            return Decimal::ONE;
        }
        if dd >= self.config.full_stop_pct {
            return self.config.min_scale;
        }

        let range = self.config.full_stop_pct - self.config.max_drawdown_pct;
        if range <= Decimal::ZERO {
            return self.config.min_scale;
        }
        let progress = (dd - self.config.max_drawdown_pct) / range;
        Decimal::ONE - progress * (Decimal::ONE - self.config.min_scale)
    }
}
