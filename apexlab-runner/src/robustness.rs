//! Robustness report — walk-forward, Monte-Carlo and sensitivity rolled
//! into one pass/fail assessment with a 0-100 composite score.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::monte_carlo::McResult;
use crate::sensitivity::SensitivityResult;
use crate::walk_forward::WfoResult;

/// Pass thresholds for the three pillars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessThresholds {
    /// Minimum mean walk-forward efficiency.
    pub wfo_efficiency: f64,
    /// MC p5 final equity must exceed initial * (1 + this).
    pub mc_return: f64,
    /// Minimum parameter stability.
    pub stability: f64,
}

impl Default for RobustnessThresholds {
    fn default() -> Self {
        Self {
            wfo_efficiency: 0.5,
            mc_return: 0.0,
            stability: 0.5,
        }
    }
}

/// Aggregated robustness assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessReport {
    pub wfo_efficiency: f64,
    pub wfo_mean_oos_sharpe: f64,
    pub wfo_n_windows: usize,
    pub wfo_pass: bool,

    pub mc_p5_equity: f64,
    pub mc_p95_equity: f64,
    pub mc_equity_percentile: f64,
    pub mc_n_trades: usize,
    pub mc_pass: bool,

    pub sensitivity_overall: f64,
    pub sensitivity_param_cv: BTreeMap<String, f64>,
    pub sensitivity_pass: bool,

    pub overall_pass: bool,
    /// 0-100 composite: efficiency (33) + MC percentile (33) + stability (34).
    pub score: f64,
}

/// Combine the three pillar results into one report.
pub fn compute_robustness(
    wfo: &WfoResult,
    mc: &McResult,
    sensitivity: &SensitivityResult,
    initial_equity: Decimal,
    thresholds: &RobustnessThresholds,
) -> RobustnessReport {
    let init = initial_equity.to_f64().unwrap_or(0.0);

    let wfo_pass = wfo.mean_efficiency >= thresholds.wfo_efficiency && !wfo.windows.is_empty();
    let mc_pass =
        mc.n_trades >= 2 && mc.p5_equity >= init * (1.0 + thresholds.mc_return);
    let sensitivity_pass = sensitivity.overall_stability >= thresholds.stability;

    let wfo_score = (wfo.mean_efficiency * 33.0).clamp(0.0, 33.0);
    let mc_score = (mc.equity_percentile / 100.0 * 33.0).clamp(0.0, 33.0);
    let sens_score = (sensitivity.overall_stability * 34.0).clamp(0.0, 34.0);

    RobustnessReport {
        wfo_efficiency: wfo.mean_efficiency,
        wfo_mean_oos_sharpe: wfo.mean_oos_sharpe,
        wfo_n_windows: wfo.windows.len(),
        wfo_pass,
        mc_p5_equity: mc.p5_equity,
        mc_p95_equity: mc.p95_equity,
        mc_equity_percentile: mc.equity_percentile,
        mc_n_trades: mc.n_trades,
        mc_pass,
        sensitivity_overall: sensitivity.overall_stability,
        sensitivity_param_cv: sensitivity.param_cv.clone(),
        sensitivity_pass,
        overall_pass: wfo_pass && mc_pass && sensitivity_pass,
        score: wfo_score + mc_score + sens_score,
    }
}
