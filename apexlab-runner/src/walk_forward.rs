//! Rolling walk-forward validation.
//!
//! Slides a (train, test) window across the bar sequence with step size
//! defaulting to the test length. Every window gets a freshly constructed
//! strategy and engine, so no state can leak across windows. The final
//! test window may be partial.

use apexlab_core::domain::Bar;
use apexlab_core::strategy::Strategy;
use apexlab_core::{Engine, EngineConfig};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::{compute, MetricsError};

/// Window geometry in bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Training (in-sample) window length.
    pub train_bars: usize,
    /// Test (out-of-sample) window length.
    pub test_bars: usize,
    /// Slide per window; defaults to `test_bars`.
    pub step_bars: Option<usize>,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_bars: 252,
            test_bars: 63,
            step_bars: None,
        }
    }
}

/// Per-window results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WfoWindow {
    pub window_idx: usize,
    pub train_bars: usize,
    pub test_bars: usize,
    pub is_sharpe: f64,
    pub oos_sharpe: f64,
    pub is_return_pct: f64,
    pub oos_return_pct: f64,
    /// OOS Sharpe / IS Sharpe, clipped to [-5, 5]; zero when IS is flat.
    pub efficiency: f64,
}

/// Aggregate walk-forward results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WfoResult {
    pub windows: Vec<WfoWindow>,
    pub mean_oos_sharpe: f64,
    pub mean_efficiency: f64,
    pub total_oos_bars: usize,
}

/// Errors from walk-forward orchestration.
#[derive(Debug, thiserror::Error)]
pub enum WalkForwardError {
    #[error("not enough bars: {total} < train {train} + 1 test bar")]
    InsufficientData { total: usize, train: usize },
    #[error("metrics failed on window {window}: {source}")]
    MetricsFailed {
        window: usize,
        #[source]
        source: MetricsError,
    },
}

/// Run one backtest over a bar slice with a fresh engine and return
/// (annualized Sharpe, total return %).
fn run_slice(
    bars: &[Bar],
    make_strategy: &dyn Fn() -> Box<dyn Strategy>,
    engine_config: &EngineConfig,
    window: usize,
) -> Result<(f64, f64), WalkForwardError> {
    let mut engine = Engine::new(make_strategy(), engine_config.clone());
    let result = engine.run(bars.iter().cloned());
    let metrics = compute(
        &result.equity_log,
        &result.fill_log,
        bars[0].timeframe,
        Some(engine_config.initial_cash),
    )
    .map_err(|source| WalkForwardError::MetricsFailed { window, source })?;
    Ok((
        metrics.sharpe_ratio.to_f64().unwrap_or(0.0),
        metrics.total_return_pct.to_f64().unwrap_or(0.0),
    ))
}

/// Slide the window across `bars`, backtesting train and test slices with
/// fresh components per window.
pub fn run_walk_forward(
    bars: &[Bar],
    make_strategy: &dyn Fn() -> Box<dyn Strategy>,
    engine_config: &EngineConfig,
    config: &WalkForwardConfig,
) -> Result<WfoResult, WalkForwardError> {
    let step = config.step_bars.unwrap_or(config.test_bars).max(1);
    if config.train_bars == 0 || bars.len() <= config.train_bars {
        return Err(WalkForwardError::InsufficientData {
            total: bars.len(),
            train: config.train_bars,
        });
    }

    let mut windows = Vec::new();
    let mut window_start = 0usize;
    let mut window_idx = 0usize;

    while window_start + config.train_bars < bars.len() {
        let train_end = window_start + config.train_bars;
        let test_end = (train_end + config.test_bars).min(bars.len());
        if test_end == train_end {
            break;
        }

        let train_slice = &bars[window_start..train_end];
        let test_slice = &bars[train_end..test_end];

        let (is_sharpe, is_return) =
            run_slice(train_slice, make_strategy, engine_config, window_idx)?;
        let (oos_sharpe, oos_return) =
            run_slice(test_slice, make_strategy, engine_config, window_idx)?;

        let efficiency = if is_sharpe.abs() > 1e-10 {
            (oos_sharpe / is_sharpe).clamp(-5.0, 5.0)
        } else {
            0.0
        };

        debug!(
            window = window_idx,
            is_sharpe, oos_sharpe, efficiency, "walk-forward window complete"
        );

        windows.push(WfoWindow {
            window_idx,
            train_bars: train_slice.len(),
            test_bars: test_slice.len(),
            is_sharpe,
            oos_sharpe,
            is_return_pct: is_return,
            oos_return_pct: oos_return,
            efficiency,
        });

        window_start += step;
        window_idx += 1;
    }

    let n = windows.len();
    let (mean_oos_sharpe, mean_efficiency, total_oos_bars) = if n > 0 {
        (
            windows.iter().map(|w| w.oos_sharpe).sum::<f64>() / n as f64,
            windows.iter().map(|w| w.efficiency).sum::<f64>() / n as f64,
            windows.iter().map(|w| w.test_bars).sum(),
        )
    } else {
        (0.0, 0.0, 0)
    };

    Ok(WfoResult {
        windows,
        mean_oos_sharpe,
        mean_efficiency,
        total_oos_bars,
    })
}
