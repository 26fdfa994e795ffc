//! Multi-strategy portfolio router.
//!
//! Routes signals from several named strategies over one bar stream into
//! a single shared portfolio, so combined exposure can never exceed what
//! one account could carry. Each strategy gets an allocation weight that
//! scales the fixed-fractional sizing, and every fill is attributed back
//! to the strategy that owns the position for per-strategy PnL.

use crate::domain::{Bar, Event, Fill, Order, OrderKind, Side, Signal, SignalKind};
use crate::engine::EngineConfig;
use crate::execution::ExecutionHandler;
use crate::portfolio::{EquityEntry, Portfolio};
use crate::queue::EventQueue;
use crate::strategy::Strategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-strategy performance attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAttribution {
    pub strategy_name: String,
    pub weight: Decimal,
    /// Fills attributed to this strategy's positions.
    pub fill_log: Vec<Fill>,
    pub signal_count: usize,
    pub order_count: usize,
    pub fill_count: usize,
    /// Net PnL of the attributed round trips, including all friction.
    pub net_pnl: Decimal,
}

impl StrategyAttribution {
    fn new(strategy_name: String, weight: Decimal) -> Self {
        Self {
            strategy_name,
            weight,
            fill_log: Vec::new(),
            signal_count: 0,
            order_count: 0,
            fill_count: 0,
            net_pnl: Decimal::ZERO,
        }
    }
}

/// Results from a multi-strategy run.
#[derive(Debug, Clone)]
pub struct MultiStrategyResult {
    pub equity_log: Vec<EquityEntry>,
    pub fill_log: Vec<Fill>,
    pub event_log: Vec<Event>,
    pub final_equity: Decimal,
    pub total_bars: usize,
    pub attributions: BTreeMap<String, StrategyAttribution>,
}

/// Routes signals from multiple strategies through a shared portfolio.
///
/// Strategies are keyed by name; weights (fractions of the 10% base
/// allocation) scale their position sizes. Missing weights count as zero,
/// which silences that strategy's entries while its state keeps advancing.
pub struct PortfolioRouter {
    strategies: BTreeMap<String, Box<dyn Strategy>>,
    weights: BTreeMap<String, Decimal>,
    portfolio: Portfolio,
    execution: ExecutionHandler,
    queue: EventQueue,
    event_log: Vec<Event>,
    attributions: BTreeMap<String, StrategyAttribution>,
    /// symbol -> strategy name that opened the position there.
    position_owner: BTreeMap<String, String>,
}

impl PortfolioRouter {
    pub fn new(
        strategies: BTreeMap<String, Box<dyn Strategy>>,
        weights: BTreeMap<String, Decimal>,
        config: EngineConfig,
    ) -> Self {
        let attributions = strategies
            .keys()
            .map(|name| {
                let weight = weights.get(name).copied().unwrap_or(Decimal::ZERO);
                (name.clone(), StrategyAttribution::new(name.clone(), weight))
            })
            .collect();
        Self {
            strategies,
            weights,
            portfolio: Portfolio::new(config.initial_cash, config.margin_requirement),
            execution: ExecutionHandler::new(config.friction),
            queue: EventQueue::new(),
            event_log: Vec::new(),
            attributions,
            position_owner: BTreeMap::new(),
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Consume the bar stream once, routing every strategy's signals
    /// through the shared portfolio.
    pub fn run(&mut self, bars: impl IntoIterator<Item = Bar>) -> MultiStrategyResult {
        let mut total_bars = 0usize;

        for bar in bars {
            total_bars += 1;
            self.process_bar(&bar);
            self.event_log.extend(self.queue.drain());
        }

        let final_equity = self
            .portfolio
            .equity_log()
            .last()
            .map(|e| e.equity)
            .unwrap_or(self.portfolio.cash());

        for attribution in self.attributions.values_mut() {
            attribution.net_pnl = attributed_pnl(&attribution.fill_log);
        }

        MultiStrategyResult {
            equity_log: self.portfolio.equity_log().to_vec(),
            fill_log: self.portfolio.fill_log().to_vec(),
            event_log: self.event_log.clone(),
            final_equity,
            total_bars,
            attributions: self.attributions.clone(),
        }
    }

    fn process_bar(&mut self, bar: &Bar) {
        // 1. Pending orders fill against this bar; fills are attributed
        //    to whichever strategy owns the symbol's position.
        for fill in self.execution.process_bar(bar) {
            self.queue.push(Event::Fill(fill.clone()));
            self.portfolio.apply_fill(fill.clone());
            if let Some(owner) = self.position_owner.get(&fill.symbol) {
                if let Some(attribution) = self.attributions.get_mut(owner) {
                    attribution.fill_log.push(fill);
                    attribution.fill_count += 1;
                }
            }
        }

        // 2. Margin check at this bar's close.
        let mut prices = BTreeMap::new();
        prices.insert(bar.symbol.clone(), bar.close);
        for symbol in self.portfolio.check_margin(&prices) {
            if let Some(fill) = self
                .portfolio
                .force_liquidate(&symbol, bar.close, bar.timestamp)
            {
                self.queue.push(Event::Fill(fill));
            }
        }

        // 3. Every strategy sees every bar; orders carry the strategy's
        //    allocation weight in their size.
        for (name, strategy) in &mut self.strategies {
            let Some(signal) = strategy.calculate_signals(bar) else {
                continue;
            };
            let attribution = self
                .attributions
                .get_mut(name)
                .expect("attribution exists for every strategy");
            attribution.signal_count += 1;
            self.queue.push(Event::Signal(signal.clone()));

            let weight = self.weights.get(name).copied().unwrap_or(Decimal::ZERO);
            if let Some(order) = weighted_order(&signal, bar, &self.portfolio, weight) {
                attribution.order_count += 1;
                self.queue.push(Event::Order(order.clone()));
                if matches!(signal.kind, SignalKind::Long | SignalKind::Short) {
                    self.position_owner
                        .insert(signal.symbol.clone(), name.clone());
                }
                self.execution.submit(order);
            }
        }

        // 4. Equity snapshot.
        self.portfolio.record_equity(bar);
    }
}

/// Weight-adjusted variant of the legacy sizing: weight * 10% of equity.
fn weighted_order(
    signal: &Signal,
    bar: &Bar,
    portfolio: &Portfolio,
    weight: Decimal,
) -> Option<Order> {
    match signal.kind {
        SignalKind::Long | SignalKind::Short => {
            if bar.close <= Decimal::ZERO {
                return None;
            }
            let equity = portfolio.current_equity();
            let quantity =
                (weight * equity * Decimal::new(10, 2) / bar.close).floor();
            if quantity <= Decimal::ZERO {
                return None;
            }

            let side = match signal.kind {
                SignalKind::Long => Side::Buy,
                _ => Side::Sell,
            };
            if side == Side::Buy
                && portfolio
                    .validate_order(side, quantity, bar.close, bar.volume)
                    .is_err()
            {
                return None;
            }

            Order::new(
                signal.symbol.clone(),
                signal.timestamp,
                OrderKind::Market,
                side,
                quantity,
            )
            .ok()
        }
        SignalKind::Exit => {
            let pos = portfolio.position(&signal.symbol)?;
            Order::new(
                signal.symbol.clone(),
                signal.timestamp,
                OrderKind::Market,
                pos.side.closing(),
                pos.quantity,
            )
            .ok()
        }
    }
}

/// Net PnL from an attributed fill list: alternate entry/exit pairing,
/// with the full friction of both legs deducted.
fn attributed_pnl(fills: &[Fill]) -> Decimal {
    let mut pnl = Decimal::ZERO;
    let mut open: Option<&Fill> = None;

    for fill in fills {
        match open {
            None => open = Some(fill),
            Some(entry) if entry.side != fill.side => {
                let mut trade = match entry.side {
                    Side::Buy => (fill.fill_price - entry.fill_price) * entry.quantity,
                    Side::Sell => (entry.fill_price - fill.fill_price) * entry.quantity,
                };
                trade -= entry.commission + entry.slippage + entry.spread_cost;
                trade -= fill.commission + fill.slippage + fill.spread_cost;
                pnl += trade;
                open = None;
            }
            Some(_) => open = Some(fill),
        }
    }
    pnl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use crate::execution::FrictionConfig;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn bar(day: u32, close: Decimal) -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timestamp: ts(day),
            open: close,
            high: close + dec!(1),
            low: close - dec!(1),
            close,
            volume: 1000,
            timeframe: Timeframe::D1,
        }
    }

    /// Emits LONG on the first bar, EXIT on the given later bar.
    struct LongThenExit {
        exit_day: u32,
        fired: bool,
    }

    impl Strategy for LongThenExit {
        fn symbol(&self) -> &str {
            "EURUSD"
        }

        fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal> {
            let kind = if !self.fired {
                self.fired = true;
                SignalKind::Long
            } else if bar.timestamp == ts(self.exit_day) {
                SignalKind::Exit
            } else {
                return None;
            };
            Some(Signal {
                symbol: bar.symbol.clone(),
                timestamp: bar.timestamp,
                kind,
                strength: dec!(1),
            })
        }
    }

    fn router(
        names_and_weights: &[(&str, Decimal)],
        exit_day: u32,
    ) -> PortfolioRouter {
        let strategies: BTreeMap<String, Box<dyn Strategy>> = names_and_weights
            .iter()
            .map(|(name, _)| {
                (
                    name.to_string(),
                    Box::new(LongThenExit {
                        exit_day,
                        fired: false,
                    }) as Box<dyn Strategy>,
                )
            })
            .collect();
        let weights = names_and_weights
            .iter()
            .map(|(name, w)| (name.to_string(), *w))
            .collect();
        let config = EngineConfig {
            initial_cash: dec!(10000),
            margin_requirement: dec!(0.25),
            friction: FrictionConfig::zero(),
        };
        PortfolioRouter::new(strategies, weights, config)
    }

    #[test]
    fn weight_scales_position_size() {
        // Exit day 28 is never reached: entries only.
        let mut r = router(&[("alpha", dec!(0.5)), ("beta", dec!(0.25))], 28);
        let result = r.run(vec![bar(1, dec!(100)), bar(2, dec!(100))]);

        // alpha: floor(0.5 * 10000 * 0.10 / 100) = 5; beta: floor(2.5) = 2.
        assert_eq!(result.fill_log.len(), 2);
        assert_eq!(result.fill_log[0].quantity, dec!(5));
        assert_eq!(result.fill_log[1].quantity, dec!(2));
    }

    #[test]
    fn zero_weight_signals_without_orders() {
        let mut r = router(&[("muted", dec!(0))], 28);
        let result = r.run(vec![bar(1, dec!(100)), bar(2, dec!(100))]);

        let attribution = &result.attributions["muted"];
        assert_eq!(attribution.signal_count, 1);
        assert_eq!(attribution.order_count, 0);
        assert!(result.fill_log.is_empty());
    }

    #[test]
    fn fills_are_attributed_to_the_owning_strategy() {
        let mut r = router(&[("solo", dec!(0.5))], 3);
        let result = r.run(vec![
            bar(1, dec!(100)),
            bar(2, dec!(100)),
            bar(3, dec!(110)),
            bar(4, dec!(110)),
        ]);

        let attribution = &result.attributions["solo"];
        // Entry fill on day 2, exit fill on day 4.
        assert_eq!(attribution.fill_count, 2);
        assert_eq!(attribution.order_count, 2);
        // Round trip: buy 5 @ 100, sell 5 @ 110, no friction.
        assert_eq!(attribution.net_pnl, dec!(50));
        assert_eq!(result.final_equity, dec!(10050));
    }

    #[test]
    fn shared_portfolio_caps_combined_exposure() {
        /// Emits a single LONG on the given day.
        struct LongOnDay {
            day: u32,
        }
        impl Strategy for LongOnDay {
            fn symbol(&self) -> &str {
                "EURUSD"
            }
            fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal> {
                (bar.timestamp == ts(self.day)).then(|| Signal {
                    symbol: bar.symbol.clone(),
                    timestamp: bar.timestamp,
                    kind: SignalKind::Long,
                    strength: dec!(1),
                })
            }
        }

        // "first" longs on day 1 and its fill on day 2 consumes all cash;
        // "second" longs on day 2 and is rejected by pre-validation
        // against the shared (now empty) cash balance.
        let strategies: BTreeMap<String, Box<dyn Strategy>> = [("first", 1u32), ("second", 2)]
            .iter()
            .map(|(name, day)| {
                (
                    name.to_string(),
                    Box::new(LongOnDay { day: *day }) as Box<dyn Strategy>,
                )
            })
            .collect();
        let weights: BTreeMap<String, Decimal> = [("first", dec!(10)), ("second", dec!(10))]
            .iter()
            .map(|(n, w)| (n.to_string(), *w))
            .collect();
        // Margin disabled: the fully-invested book would otherwise be
        // liquidated the bar it opens.
        let config = EngineConfig {
            initial_cash: dec!(1000),
            margin_requirement: dec!(0),
            friction: FrictionConfig::zero(),
        };
        let mut r = PortfolioRouter::new(strategies, weights, config);
        let result = r.run(vec![bar(1, dec!(100)), bar(2, dec!(100)), bar(3, dec!(100))]);

        // weight 10 -> qty floor(10 * 1000 * 0.10 / 100) = 10, cost 1000.
        assert_eq!(result.attributions["first"].order_count, 1);
        assert_eq!(result.attributions["second"].signal_count, 1);
        assert_eq!(result.attributions["second"].order_count, 0);
        assert_eq!(result.fill_log.len(), 1);
    }

    #[test]
    fn exit_closes_through_the_shared_portfolio() {
        let mut r = router(&[("solo", dec!(0.5))], 3);
        let result = r.run(vec![
            bar(1, dec!(100)),
            bar(2, dec!(100)),
            bar(3, dec!(105)),
            bar(4, dec!(105)),
        ]);

        assert_eq!(result.fill_log.len(), 2);
        assert_eq!(result.fill_log[1].side, Side::Sell);
        assert_eq!(result.fill_log[1].quantity, dec!(5));
        assert!(r.portfolio().position("EURUSD").is_none());
    }
}
