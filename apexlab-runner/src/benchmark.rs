//! Buy-and-hold benchmark and relative performance statistics.
//!
//! The benchmark invests the full initial equity at the first bar's close
//! and holds. Alpha/beta/IR are regression statistics over per-bar return
//! series; this is reporting-layer math, done in f64.

use apexlab_core::domain::{Bar, Timeframe};
use apexlab_core::portfolio::EquityEntry;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One point of the benchmark curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Relative performance statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub benchmark_return_pct: f64,
    pub benchmark_final_equity: f64,
    /// Annualized alpha: (strategy mean return - beta * benchmark mean
    /// return) * bars_per_year.
    pub alpha: f64,
    pub beta: f64,
    pub information_ratio: f64,
    pub correlation: f64,
    pub strategy_return_pct: f64,
}

/// Buy-and-hold equity curve: 100% invested at the first close.
pub fn compute_benchmark_equity(bars: &[Bar], initial_equity: Decimal) -> Vec<BenchmarkPoint> {
    let Some(first) = bars.first() else {
        return Vec::new();
    };
    if first.close <= Decimal::ZERO {
        return Vec::new();
    }
    let shares = initial_equity / first.close;
    bars.iter()
        .map(|bar| BenchmarkPoint {
            timestamp: bar.timestamp,
            equity: shares * bar.close,
        })
        .collect()
}

/// Alpha, beta, information ratio and correlation of the strategy curve
/// against the benchmark curve. Series are aligned by index and truncated
/// to the shorter one; alpha and the information ratio annualize with the
/// timeframe's bars-per-year figure.
pub fn compute_benchmark_metrics(
    strategy_equity: &[EquityEntry],
    benchmark_equity: &[BenchmarkPoint],
    initial_equity: Decimal,
    timeframe: Timeframe,
) -> BenchmarkMetrics {
    let init = initial_equity.to_f64().unwrap_or(0.0);
    let strat: Vec<f64> = strategy_equity
        .iter()
        .map(|e| e.equity.to_f64().unwrap_or(0.0))
        .collect();
    let bench: Vec<f64> = benchmark_equity
        .iter()
        .map(|p| p.equity.to_f64().unwrap_or(0.0))
        .collect();

    let strategy_return_pct = strat
        .last()
        .map(|e| (e / init - 1.0) * 100.0)
        .unwrap_or(0.0);
    let benchmark_return_pct = bench
        .last()
        .map(|e| (e / init - 1.0) * 100.0)
        .unwrap_or(0.0);
    let benchmark_final_equity = bench.last().copied().unwrap_or(init);

    let n = strat.len().min(bench.len());
    if n < 3 {
        return BenchmarkMetrics {
            benchmark_return_pct,
            benchmark_final_equity,
            alpha: 0.0,
            beta: 0.0,
            information_ratio: 0.0,
            correlation: 0.0,
            strategy_return_pct,
        };
    }

    let strat_rets = returns(&strat[..n]);
    let bench_rets = returns(&bench[..n]);

    let beta = {
        let var = variance(&bench_rets);
        if var > 1e-15 {
            covariance(&strat_rets, &bench_rets) / var
        } else {
            0.0
        }
    };
    let bars_per_year = timeframe.bars_per_year() as f64;
    let alpha = (mean(&strat_rets) - beta * mean(&bench_rets)) * bars_per_year;

    let active: Vec<f64> = strat_rets
        .iter()
        .zip(&bench_rets)
        .map(|(s, b)| s - b)
        .collect();
    let tracking_error = variance(&active).sqrt();
    let information_ratio = if tracking_error > 1e-15 {
        mean(&active) / tracking_error * bars_per_year.sqrt()
    } else {
        0.0
    };

    let correlation = {
        let denom = (variance(&strat_rets) * variance(&bench_rets)).sqrt();
        if denom > 1e-15 {
            covariance(&strat_rets, &bench_rets) / denom
        } else {
            0.0
        }
    };

    BenchmarkMetrics {
        benchmark_return_pct,
        benchmark_final_equity,
        alpha,
        beta,
        information_ratio,
        correlation,
        strategy_return_pct,
    }
}

fn returns(equities: &[f64]) -> Vec<f64> {
    equities
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let ma = mean(&a[..n]);
    let mb = mean(&b[..n]);
    a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / n as f64
}
