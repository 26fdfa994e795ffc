//! apexlab-runner — post-loop processors over apexlab-core runs.
//!
//! - Metrics: Sharpe/Sortino/Calmar, drawdown, CAGR, trade statistics
//! - Analytics: rolling stats, calendar aggregates, trade breakdowns,
//!   MAE/MFE, friction sweep
//! - Benchmark: buy-and-hold curve with alpha/beta/IR
//! - Optimization harness: walk-forward, parameter sensitivity,
//!   Monte-Carlo trade shuffling, robustness report
//! - Deterministic seed hierarchy shared by everything random
//!
//! Every harness run constructs a fresh component graph; no state leaks
//! across windows, perturbations or permutations.

pub mod analytics;
pub mod benchmark;
pub mod metrics;
pub mod monte_carlo;
pub mod rng;
pub mod robustness;
pub mod sensitivity;
pub mod walk_forward;

pub use metrics::{compute, MetricsError, MetricsResult, TradeRecord};
pub use monte_carlo::{run_monte_carlo, McResult, MonteCarloConfig};
pub use robustness::{compute_robustness, RobustnessReport, RobustnessThresholds};
pub use sensitivity::{run_sensitivity, SensitivityConfig, SensitivityResult};
pub use walk_forward::{run_walk_forward, WalkForwardConfig, WalkForwardError, WfoResult};
