//! apexlab-core — deterministic event-driven backtesting engine.
//!
//! The crate contains the simulation core:
//! - Domain events (bars, signals, orders, fills) and portfolio state
//! - Strict-FIFO event queue feeding the audit log
//! - Execution handler with next-bar fills, slippage, spread, commission
//! - Portfolio accountant (FIFO closes, mark-to-market equity, margin
//!   monitoring with forced liquidation)
//! - Strategy contract over a bounded rolling buffer, plus concrete
//!   breakout / SMC / ICT strategies and a regime-gating decorator
//! - Risk manager (ATR sizing, Kelly, portfolio heat, drawdown scaling)
//! - SMC state machines (swings, structure, FVG, order blocks, sweeps,
//!   inducement, kill zones, premium/discount)
//! - Single-asset and chronological-merge multi-asset engines
//!
//! Everything money-valued is `rust_decimal::Decimal`, constructed from
//! string or integer literals; binary floats appear only in the post-loop
//! analytics layers of the companion runner crate.

pub mod domain;
pub mod engine;
pub mod execution;
pub mod multi_asset;
pub mod multi_strategy;
pub mod portfolio;
pub mod queue;
pub mod regime;
pub mod risk;
pub mod router;
pub mod smc;
pub mod strategy;

pub use engine::{BacktestResult, Engine, EngineConfig};
pub use execution::{ExecutionHandler, FrictionConfig};
pub use multi_asset::{merge_bars, MultiAssetEngine, MultiAssetResult};
pub use multi_strategy::{MultiStrategyResult, PortfolioRouter, StrategyAttribution};
pub use portfolio::{EquityEntry, OrderRejection, Portfolio};
pub use queue::{EventQueue, QueueError};
