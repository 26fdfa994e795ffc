//! Multi-asset engine — chronological bar merge with per-symbol
//! execution isolation and a shared portfolio.
//!
//! The merge is a min-heap keyed on (timestamp, symbol, arrival counter):
//! symbol name breaks timestamp ties alphabetically and the counter breaks
//! (timestamp, symbol) ties by arrival order, so the stream is fully
//! deterministic and bar records are never compared directly.

use crate::domain::{Bar, Event, Fill};
use crate::execution::{ExecutionHandler, FrictionConfig};
use crate::portfolio::{EquityEntry, Portfolio};
use crate::queue::EventQueue;
use crate::risk::RiskManager;
use crate::router::signal_to_order;
use crate::strategy::Strategy;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Heap key; `Ord` is derived lexicographically over
/// (timestamp, symbol, counter).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct MergeKey {
    timestamp: DateTime<Utc>,
    symbol: String,
    counter: u64,
}

struct HeapEntry {
    key: MergeKey,
    bar: Bar,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

/// Merge N per-symbol bar iterators into one chronological stream.
pub struct MergedBars<I: Iterator<Item = Bar>> {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    iterators: BTreeMap<String, I>,
    counter: u64,
}

impl<I: Iterator<Item = Bar>> MergedBars<I> {
    pub fn new(streams: BTreeMap<String, I>) -> Self {
        let mut merged = Self {
            heap: BinaryHeap::new(),
            iterators: BTreeMap::new(),
            counter: 0,
        };
        for (symbol, mut iter) in streams {
            if let Some(bar) = iter.next() {
                merged.push(symbol.clone(), bar);
                merged.iterators.insert(symbol, iter);
            }
        }
        merged
    }

    fn push(&mut self, symbol: String, bar: Bar) {
        let key = MergeKey {
            timestamp: bar.timestamp,
            symbol,
            counter: self.counter,
        };
        self.counter += 1;
        self.heap.push(Reverse(HeapEntry { key, bar }));
    }
}

impl<I: Iterator<Item = Bar>> Iterator for MergedBars<I> {
    type Item = Bar;

    fn next(&mut self) -> Option<Bar> {
        let Reverse(entry) = self.heap.pop()?;
        let symbol = entry.key.symbol;
        if let Some(iter) = self.iterators.get_mut(&symbol) {
            match iter.next() {
                Some(next_bar) => self.push(symbol, next_bar),
                None => {
                    self.iterators.remove(&symbol);
                }
            }
        }
        Some(entry.bar)
    }
}

/// Convenience constructor mirroring the engine entry point.
pub fn merge_bars<S, I>(streams: BTreeMap<String, S>) -> MergedBars<I>
where
    S: IntoIterator<Item = Bar, IntoIter = I>,
    I: Iterator<Item = Bar>,
{
    MergedBars::new(
        streams
            .into_iter()
            .map(|(symbol, s)| (symbol, s.into_iter()))
            .collect(),
    )
}

/// Multi-asset backtest outputs.
#[derive(Debug, Clone)]
pub struct MultiAssetResult {
    pub equity_log: Vec<EquityEntry>,
    pub fill_log: Vec<Fill>,
    pub event_log: Vec<Event>,
    pub final_equity: Decimal,
    pub total_bars: usize,
}

/// Multi-symbol engine: one strategy and one execution handler per
/// symbol, one shared portfolio.
pub struct MultiAssetEngine {
    strategies: BTreeMap<String, Box<dyn Strategy>>,
    executions: BTreeMap<String, ExecutionHandler>,
    portfolio: Portfolio,
    risk: Option<RiskManager>,
    last_prices: BTreeMap<String, Decimal>,
    queue: EventQueue,
    event_log: Vec<Event>,
}

impl MultiAssetEngine {
    pub fn new(
        strategies: BTreeMap<String, Box<dyn Strategy>>,
        initial_cash: Decimal,
        margin_requirement: Decimal,
        friction: FrictionConfig,
    ) -> Self {
        let executions = strategies
            .keys()
            .map(|symbol| (symbol.clone(), ExecutionHandler::new(friction.clone())))
            .collect();
        Self {
            strategies,
            executions,
            portfolio: Portfolio::new(initial_cash, margin_requirement),
            risk: None,
            last_prices: BTreeMap::new(),
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

    /// Run over per-symbol bar streams merged chronologically. Equity is
    /// snapshotted when the merged timestamp advances and once at end of
    /// stream, using all last-known prices.
    pub fn run<S, I>(&mut self, streams: BTreeMap<String, S>) -> MultiAssetResult
    where
        S: IntoIterator<Item = Bar, IntoIter = I>,
        I: Iterator<Item = Bar>,
    {
        let mut total_bars = 0usize;
        let mut prev_ts: Option<DateTime<Utc>> = None;

        for bar in merge_bars(streams) {
            total_bars += 1;

            if let Some(ts) = prev_ts {
                if bar.timestamp != ts {
                    self.portfolio.append_snapshot(ts, &self.last_prices);
                }
            }

            self.last_prices.insert(bar.symbol.clone(), bar.close);
            self.process_bar(&bar);
            self.event_log.extend(self.queue.drain());

            prev_ts = Some(bar.timestamp);
        }

        if let Some(ts) = prev_ts {
            self.portfolio.append_snapshot(ts, &self.last_prices);
        }

        let final_equity = self
            .portfolio
            .equity_log()
            .last()
            .map(|e| e.equity)
            .unwrap_or(self.portfolio.cash());

        MultiAssetResult {
            equity_log: self.portfolio.equity_log().to_vec(),
            fill_log: self.portfolio.fill_log().to_vec(),
            event_log: self.event_log.clone(),
            final_equity,
            total_bars,
        }
    }

    fn process_bar(&mut self, bar: &Bar) {
        // 1. Only this symbol's execution handler sees the bar.
        if let Some(execution) = self.executions.get_mut(&bar.symbol) {
            for fill in execution.process_bar(bar) {
                self.queue.push(Event::Fill(fill.clone()));
                self.portfolio.apply_fill(fill);
            }
        }

        // 2. Margin check against all last-known prices.
        for symbol in self.portfolio.check_margin(&self.last_prices) {
            if let Some(price) = self.last_prices.get(&symbol).copied() {
                if let Some(fill) = self.portfolio.force_liquidate(&symbol, price, bar.timestamp)
                {
                    self.queue.push(Event::Fill(fill));
                }
            }
        }

        // 3-4. Route the bar to its bound strategy.
        if let Some(strategy) = self.strategies.get_mut(&bar.symbol) {
            if let Some(signal) = strategy.calculate_signals(bar) {
                self.queue.push(Event::Signal(signal.clone()));
                let atr = strategy.current_atr();
                if let Some(order) =
                    signal_to_order(&signal, bar, &self.portfolio, atr, self.risk.as_mut())
                {
                    self.queue.push(Event::Order(order.clone()));
                    if let Some(execution) = self.executions.get_mut(&bar.symbol) {
                        execution.submit(order);
                    }
                }
            }
        }
    }
}
