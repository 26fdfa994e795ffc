//! Parameter sensitivity analysis.
//!
//! Perturbs each numeric strategy parameter by a fixed grid of
//! percentages, re-running the full backtest with fresh components for
//! every point. Runs are independent, so they execute on the rayon pool;
//! results are collected in deterministic (parameter, perturbation)
//! order.

use apexlab_core::domain::Bar;
use apexlab_core::strategy::Strategy;
use apexlab_core::{Engine, EngineConfig};
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::metrics::compute;

/// Perturbation grid, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    pub perturbations: Vec<f64>,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            perturbations: vec![-30.0, -20.0, -10.0, 0.0, 10.0, 20.0, 30.0],
        }
    }
}

/// One grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub param_name: String,
    pub perturbation_pct: f64,
    pub param_value: f64,
    pub sharpe: f64,
    pub net_pnl: f64,
    pub win_rate: f64,
    pub max_dd_pct: f64,
}

/// Aggregate sensitivity results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub points: Vec<SensitivityPoint>,
    /// Coefficient of variation of Sharpe per parameter.
    pub param_cv: BTreeMap<String, f64>,
    /// mean(max(0, 1 - CV)) across parameters; 1.0 = perfectly stable.
    pub overall_stability: f64,
    pub baseline_sharpe: f64,
}

/// Builds a strategy from a (possibly perturbed) parameter map.
pub type ParamStrategyFactory<'a> =
    &'a (dyn Fn(&BTreeMap<String, f64>) -> Box<dyn Strategy> + Sync);

/// Perturb each numeric parameter and measure Sharpe degradation.
pub fn run_sensitivity(
    bars: &[Bar],
    base_params: &BTreeMap<String, f64>,
    make_strategy: ParamStrategyFactory,
    engine_config: &EngineConfig,
    config: &SensitivityConfig,
) -> SensitivityResult {
    if bars.is_empty() {
        return SensitivityResult::default();
    }

    // Zero-valued parameters cannot be perturbed multiplicatively.
    let numeric: Vec<(&String, f64)> = base_params
        .iter()
        .filter(|(_, v)| **v != 0.0)
        .map(|(k, v)| (k, *v))
        .collect();

    let jobs: Vec<(String, f64, f64)> = numeric
        .iter()
        .flat_map(|(name, base)| {
            config
                .perturbations
                .iter()
                .map(|pct| ((*name).clone(), *base, *pct))
        })
        .collect();

    let points: Vec<SensitivityPoint> = jobs
        .par_iter()
        .map(|(name, base, pct)| {
            let raw = base * (1.0 + pct / 100.0);
            // Integer-valued parameters stay integral and at least 1.
            let value = if base.fract() == 0.0 {
                raw.round().max(1.0)
            } else {
                raw
            };

            let mut params = base_params.clone();
            params.insert(name.clone(), value);

            let mut engine = Engine::new(make_strategy(&params), engine_config.clone());
            let result = engine.run(bars.iter().cloned());
            let metrics = compute(
                &result.equity_log,
                &result.fill_log,
                bars[0].timeframe,
                Some(engine_config.initial_cash),
            );

            let (sharpe, net_pnl, win_rate, max_dd_pct) = match metrics {
                Ok(m) => (
                    m.sharpe_ratio.to_f64().unwrap_or(0.0),
                    m.net_pnl.to_f64().unwrap_or(0.0),
                    m.win_rate.to_f64().unwrap_or(0.0),
                    m.max_drawdown_pct.to_f64().unwrap_or(0.0),
                ),
                Err(_) => (0.0, 0.0, 0.0, 0.0),
            };

            SensitivityPoint {
                param_name: name.clone(),
                perturbation_pct: *pct,
                param_value: value,
                sharpe,
                net_pnl,
                win_rate,
                max_dd_pct,
            }
        })
        .collect();

    let baseline_sharpe = points
        .iter()
        .find(|p| p.perturbation_pct == 0.0)
        .map(|p| p.sharpe)
        .unwrap_or(0.0);

    let mut param_cv = BTreeMap::new();
    for (name, _) in &numeric {
        let sharpes: Vec<f64> = points
            .iter()
            .filter(|p| &p.param_name == *name)
            .map(|p| p.sharpe)
            .collect();
        param_cv.insert((*name).clone(), coefficient_of_variation(&sharpes));
    }

    let overall_stability = if param_cv.is_empty() {
        0.0
    } else {
        param_cv.values().map(|cv| (1.0 - cv).max(0.0)).sum::<f64>() / param_cv.len() as f64
    };

    debug!(
        params = param_cv.len(),
        overall_stability, "sensitivity sweep complete"
    );

    SensitivityResult {
        points,
        param_cv,
        overall_stability,
        baseline_sharpe,
    }
}

/// Population CV: std / |mean|, 1.0 when the mean is effectively zero.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean.abs() < 1e-10 {
        return 1.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apexlab_core::domain::{Signal, Timeframe};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Quiet;
    impl Strategy for Quiet {
        fn symbol(&self) -> &str {
            "EURUSD"
        }
        fn calculate_signals(&mut self, _bar: &Bar) -> Option<Signal> {
            None
        }
    }

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar {
                symbol: "EURUSD".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64),
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100) + Decimal::from(i as u64 % 3),
                volume: 1000,
                timeframe: Timeframe::D1,
            })
            .collect()
    }

    #[test]
    fn grid_covers_every_param_and_perturbation() {
        let mut params = BTreeMap::new();
        params.insert("lookback".to_string(), 20.0);
        params.insert("threshold".to_string(), 1.5);

        let result = run_sensitivity(
            &bars(50),
            &params,
            &|_p| Box::new(Quiet),
            &EngineConfig::default(),
            &SensitivityConfig::default(),
        );
        // 2 params x 7 perturbations.
        assert_eq!(result.points.len(), 14);
        assert_eq!(result.param_cv.len(), 2);
    }

    #[test]
    fn integer_params_round_and_floor_at_one() {
        let mut params = BTreeMap::new();
        params.insert("lookback".to_string(), 2.0);

        let result = run_sensitivity(
            &bars(30),
            &params,
            &|_p| Box::new(Quiet),
            &EngineConfig::default(),
            &SensitivityConfig {
                perturbations: vec![-90.0, 0.0],
            },
        );
        let perturbed = result
            .points
            .iter()
            .find(|p| p.perturbation_pct == -90.0)
            .unwrap();
        // 2.0 * 0.1 = 0.2 -> rounds to 0 -> floored to 1.
        assert_eq!(perturbed.param_value, 1.0);
    }

    #[test]
    fn zero_valued_params_are_skipped() {
        let mut params = BTreeMap::new();
        params.insert("disabled".to_string(), 0.0);
        let result = run_sensitivity(
            &bars(30),
            &params,
            &|_p| Box::new(Quiet),
            &EngineConfig::default(),
            &SensitivityConfig::default(),
        );
        assert!(result.points.is_empty());
        assert_eq!(result.overall_stability, 0.0);
    }

    #[test]
    fn flat_sharpe_grid_is_maximally_unstable_by_convention() {
        // A quiet strategy scores 0 Sharpe everywhere; CV defaults to 1.0
        // when the mean is zero, so stability collapses to 0.
        let mut params = BTreeMap::new();
        params.insert("lookback".to_string(), 20.0);
        let result = run_sensitivity(
            &bars(40),
            &params,
            &|_p| Box::new(Quiet),
            &EngineConfig::default(),
            &SensitivityConfig::default(),
        );
        assert_eq!(result.param_cv["lookback"], 1.0);
        assert_eq!(result.overall_stability, 0.0);
    }
}
