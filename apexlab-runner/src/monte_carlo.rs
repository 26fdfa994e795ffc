//! Monte-Carlo trade shuffling.
//!
//! Resamples the *order* of closed-trade PnLs against the initial equity
//! to ask whether the real equity path is distinguishable from lucky
//! sequencing. Only trade PnLs are permuted — bar prices are never
//! touched, which preserves the market structure the trades came from.
//! Permutations draw from the seed hierarchy per iteration, so the report
//! is identical for a given seed regardless of thread count.

use apexlab_core::domain::Fill;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::pair_round_trips;
use crate::rng::SeedHierarchy;

/// Monte-Carlo configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub n_permutations: usize,
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_permutations: 1000,
            seed: 42,
        }
    }
}

/// Aggregate Monte-Carlo results. Percentiles are over the permutation
/// distribution; the equity percentile locates the real (unshuffled) run
/// inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McResult {
    pub n_permutations: usize,
    pub n_trades: usize,
    pub original_final_equity: f64,
    pub original_max_dd_pct: f64,
    pub p5_equity: f64,
    pub p50_equity: f64,
    pub p95_equity: f64,
    pub p5_max_dd: f64,
    pub p50_max_dd: f64,
    pub p95_max_dd: f64,
    pub equity_percentile: f64,
}

/// Walk a PnL sequence from the initial equity; returns (final equity,
/// max drawdown percent).
fn simulate_equity_curve(pnls: &[f64], initial_equity: f64) -> (f64, f64) {
    let mut equity = initial_equity;
    let mut peak = equity;
    let mut max_dd_pct = 0.0f64;

    for pnl in pnls {
        equity += pnl;
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let dd_pct = (peak - equity) / peak * 100.0;
            if dd_pct > max_dd_pct {
                max_dd_pct = dd_pct;
            }
        }
    }
    (equity, max_dd_pct)
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let idx = (sorted.len() as f64 * pct / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Run the trade-shuffling simulation over a fill log.
pub fn run_monte_carlo(
    fill_log: &[Fill],
    initial_equity: Decimal,
    config: &MonteCarloConfig,
) -> McResult {
    // Per-trade PnLs net of the full friction on both legs; the float
    // conversion is an output-boundary move, as the resampler never feeds
    // back into the engine.
    let pnls: Vec<f64> = pair_round_trips(fill_log)
        .iter()
        .map(|t| t.pnl_after_all_friction().to_f64().unwrap_or(0.0))
        .collect();
    let init = initial_equity.to_f64().unwrap_or(0.0);
    let n_trades = pnls.len();

    if n_trades < 2 {
        let (orig_final, orig_dd) = simulate_equity_curve(&pnls, init);
        return McResult {
            n_permutations: 0,
            n_trades,
            original_final_equity: orig_final,
            original_max_dd_pct: orig_dd,
            p5_equity: orig_final,
            p50_equity: orig_final,
            p95_equity: orig_final,
            p5_max_dd: orig_dd,
            p50_max_dd: orig_dd,
            p95_max_dd: orig_dd,
            equity_percentile: 0.0,
        };
    }

    let (orig_final, orig_dd) = simulate_equity_curve(&pnls, init);
    let hierarchy = SeedHierarchy::new(config.seed);

    // Each permutation owns its seeded RNG, so the pool order is
    // irrelevant to the outcome.
    let outcomes: Vec<(f64, f64)> = (0..config.n_permutations as u64)
        .into_par_iter()
        .map(|i| {
            let mut rng = hierarchy.rng_for("monte-carlo", i);
            let mut shuffled = pnls.clone();
            shuffled.shuffle(&mut rng);
            simulate_equity_curve(&shuffled, init)
        })
        .collect();

    let mut equities: Vec<f64> = outcomes.iter().map(|(e, _)| *e).collect();
    let mut drawdowns: Vec<f64> = outcomes.iter().map(|(_, d)| *d).collect();
    equities.sort_by(|a, b| a.partial_cmp(b).expect("finite equity"));
    drawdowns.sort_by(|a, b| a.partial_cmp(b).expect("finite drawdown"));

    let rank = equities.iter().filter(|e| **e <= orig_final).count();
    let equity_percentile = rank as f64 / equities.len() as f64 * 100.0;

    debug!(
        n_trades,
        permutations = config.n_permutations,
        p5 = percentile(&equities, 5.0),
        "monte carlo complete"
    );

    McResult {
        n_permutations: config.n_permutations,
        n_trades,
        original_final_equity: orig_final,
        original_max_dd_pct: orig_dd,
        p5_equity: percentile(&equities, 5.0),
        p50_equity: percentile(&equities, 50.0),
        p95_equity: percentile(&equities, 95.0),
        p5_max_dd: percentile(&drawdowns, 5.0),
        p50_max_dd: percentile(&drawdowns, 50.0),
        p95_max_dd: percentile(&drawdowns, 95.0),
        equity_percentile,
    }
}
