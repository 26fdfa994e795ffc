//! Single-asset backtest engine.
//!
//! The engine wires strategy, execution handler, portfolio and optional
//! risk manager into the per-bar dispatch loop. It owns all of them for
//! the lifetime of a run and contains no trading logic of its own — it
//! only routes events.
//!
//! Per bar, in this exact order:
//! 1. Process pending orders against this bar; route fills to the
//!    portfolio.
//! 2. Margin check at the bar close; force-liquidate flagged symbols.
//! 3. Ask the strategy for a signal.
//! 4. Translate the signal into an order and submit it; it can only fill
//!    against a later bar, which rules out same-bar lookahead.
//! 5. Snapshot equity.

use crate::domain::{Bar, Event, Fill};
use crate::execution::{ExecutionHandler, FrictionConfig};
use crate::portfolio::{EquityEntry, Portfolio};
use crate::queue::EventQueue;
use crate::risk::RiskManager;
use crate::router::signal_to_order;
use crate::strategy::Strategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Engine construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_cash: Decimal,
    /// Forced-liquidation threshold as a fraction of position value.
    pub margin_requirement: Decimal,
    pub friction: FrictionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_cash: Decimal::from(10_000),
            margin_requirement: Decimal::new(25, 2), // 0.25
            friction: FrictionConfig::default(),
        }
    }
}

/// Backtest outputs: the portfolio logs plus the full audit trail.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub equity_log: Vec<EquityEntry>,
    pub fill_log: Vec<Fill>,
    pub event_log: Vec<Event>,
    pub final_equity: Decimal,
    pub total_bars: usize,
}

/// Event-driven backtest orchestrator for one symbol.
pub struct Engine {
    strategy: Box<dyn Strategy>,
    portfolio: Portfolio,
    execution: ExecutionHandler,
    risk: Option<RiskManager>,
    queue: EventQueue,
    event_log: Vec<Event>,
}

impl Engine {
    pub fn new(strategy: Box<dyn Strategy>, config: EngineConfig) -> Self {
        Self {
            strategy,
            portfolio: Portfolio::new(config.initial_cash, config.margin_requirement),
            execution: ExecutionHandler::new(config.friction),
            risk: None,
            queue: EventQueue::new(),
            event_log: Vec::new(),
        }
    }

    pub fn with_risk_manager(mut self, risk: RiskManager) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Consume the bar stream once and produce the run's logs.
    pub fn run(&mut self, bars: impl IntoIterator<Item = Bar>) -> BacktestResult {
        let mut total_bars = 0usize;

        for bar in bars {
            total_bars += 1;
            self.process_bar(&bar);
            // Flush this bar's events into the audit log in FIFO order.
            self.event_log.extend(self.queue.drain());
        }

        let final_equity = self
            .portfolio
            .equity_log()
            .last()
            .map(|e| e.equity)
            .unwrap_or(self.portfolio.cash());

        BacktestResult {
            equity_log: self.portfolio.equity_log().to_vec(),
            fill_log: self.portfolio.fill_log().to_vec(),
            event_log: self.event_log.clone(),
            final_equity,
            total_bars,
        }
    }

    fn process_bar(&mut self, bar: &Bar) {
        // 1. Pending orders fill against this bar.
        for fill in self.execution.process_bar(bar) {
            self.queue.push(Event::Fill(fill.clone()));
            self.portfolio.apply_fill(fill);
        }

        // 2. Margin check at this bar's close; liquidations use the bar's
        //    timestamp.
        let mut prices = std::collections::BTreeMap::new();
        prices.insert(bar.symbol.clone(), bar.close);
        for symbol in self.portfolio.check_margin(&prices) {
            if let Some(fill) = self
                .portfolio
                .force_liquidate(&symbol, bar.close, bar.timestamp)
            {
                self.queue.push(Event::Fill(fill));
            }
        }

        // 3-4. Signal, then order; the order fills no earlier than the
        //      next bar.
        if let Some(signal) = self.strategy.calculate_signals(bar) {
            self.queue.push(Event::Signal(signal.clone()));
            let atr = self.strategy.current_atr();
            if let Some(order) =
                signal_to_order(&signal, bar, &self.portfolio, atr, self.risk.as_mut())
            {
                self.queue.push(Event::Order(order.clone()));
                self.execution.submit(order);
            }
        }

        // 5. Equity snapshot.
        self.portfolio.record_equity(bar);
    }
}
