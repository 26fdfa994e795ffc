//! Kelly criterion sizing from rolling trade history.

use crate::domain::{Fill, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kelly module configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyConfig {
    /// Rolling window of round-trip trades.
    pub lookback: usize,
    /// Kelly fraction coefficient; 0.5 = half-Kelly.
    pub fraction: Decimal,
    /// Minimum round-trips before Kelly activates.
    pub min_trades: usize,
    /// Output cap as a fraction of equity.
    pub max_kelly_pct: Decimal,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            lookback: 40,
            fraction: Decimal::new(5, 1),      // 0.5
            min_trades: 20,
            max_kelly_pct: Decimal::new(5, 2), // 0.05
        }
    }
}

/// Adaptive position sizing over the last K closed round-trips.
#[derive(Debug, Clone)]
pub struct KellyCriterion {
    config: KellyConfig,
    win_rate: Decimal,
    win_loss_ratio: Decimal,
    trade_count: usize,
}

impl KellyCriterion {
    pub fn new(config: KellyConfig) -> Self {
        Self {
            config,
            win_rate: Decimal::ZERO,
            win_loss_ratio: Decimal::ZERO,
            trade_count: 0,
        }
    }

    /// Re-derive win rate and win/loss ratio from the fill log's round trips.
    pub fn update(&mut self, fill_log: &[Fill]) {
        let pnls = extract_round_trip_pnls(fill_log);
        if pnls.is_empty() {
            self.trade_count = 0;
            return;
        }

        let start = pnls.len().saturating_sub(self.config.lookback);
        let recent = &pnls[start..];
        self.trade_count = recent.len();

        let wins: Vec<Decimal> = recent.iter().copied().filter(|p| *p > Decimal::ZERO).collect();
        let losses: Vec<Decimal> = recent.iter().copied().filter(|p| *p <= Decimal::ZERO).collect();

        self.win_rate = Decimal::from(wins.len() as u64) / Decimal::from(recent.len() as u64);

        let avg_win = if wins.is_empty() {
            Decimal::ZERO
        } else {
            wins.iter().copied().sum::<Decimal>() / Decimal::from(wins.len() as u64)
        };
        let avg_loss = if losses.is_empty() {
            Decimal::ONE
        } else {
            (losses.iter().copied().sum::<Decimal>() / Decimal::from(losses.len() as u64)).abs()
        };

        self.win_loss_ratio = if avg_loss > Decimal::ZERO {
            avg_win / avg_loss
        } else {
            Decimal::ZERO
        };
    }

    /// Adjusted Kelly fraction: W - (1 - W) / R, scaled by the user
    /// coefficient, floored at zero and capped at `max_kelly_pct`.
    /// None until `min_trades` round-trips are observed.
    pub fn kelly_fraction(&self) -> Option<Decimal> {
        if self.trade_count < self.config.min_trades {
            return None;
        }
        if self.win_loss_ratio == Decimal::ZERO {
            return Some(Decimal::ZERO);
        }

        let kelly = self.win_rate - (Decimal::ONE - self.win_rate) / self.win_loss_ratio;
        let adjusted = kelly * self.config.fraction;

        Some(adjusted.max(Decimal::ZERO).min(self.config.max_kelly_pct))
    }
}

/// Pair fills into round-trip PnLs, one open stack per symbol, net of both
/// legs' commissions.
fn extract_round_trip_pnls(fill_log: &[Fill]) -> Vec<Decimal> {
    let mut pnls = Vec::new();
    let mut open: BTreeMap<String, Vec<&Fill>> = BTreeMap::new();

    for fill in fill_log {
        let stack = open.entry(fill.symbol.clone()).or_default();
        match stack.first() {
            Some(first) if first.side != fill.side => {
                let entry = stack.remove(0);
                let qty = entry.quantity.min(fill.quantity);
                let mut pnl = match entry.side {
                    Side::Buy => (fill.fill_price - entry.fill_price) * qty,
                    Side::Sell => (entry.fill_price - fill.fill_price) * qty,
                };
                pnl -= fill.commission + entry.commission;
                pnls.push(pnl);
            }
            _ => stack.push(fill),
        }
    }
    pnls
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn fill(side: Side, price: Decimal, commission: Decimal) -> Fill {
        Fill {
            symbol: "EURUSD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            side,
            quantity: dec!(10),
            fill_price: price,
            commission,
            slippage: Decimal::ZERO,
            spread_cost: Decimal::ZERO,
        }
    }

    fn round_trip(entry: Decimal, exit: Decimal) -> [Fill; 2] {
        [fill(Side::Buy, entry, dec!(0)), fill(Side::Sell, exit, dec!(0))]
    }

    #[test]
    fn inactive_until_min_trades() {
        let mut kelly = KellyCriterion::new(KellyConfig {
            min_trades: 3,
            ..KellyConfig::default()
        });
        let mut log = Vec::new();
        log.extend(round_trip(dec!(100), dec!(110)));
        log.extend(round_trip(dec!(100), dec!(95)));
        kelly.update(&log);
        assert!(kelly.kelly_fraction().is_none());
    }

    #[test]
    fn positive_edge_produces_positive_fraction() {
        let mut kelly = KellyCriterion::new(KellyConfig {
            lookback: 40,
            fraction: dec!(0.5),
            min_trades: 4,
            max_kelly_pct: dec!(0.5),
        });
        let mut log = Vec::new();
        // 3 wins of +100, 1 loss of -50: W = 0.75, R = 2
        log.extend(round_trip(dec!(100), dec!(110)));
        log.extend(round_trip(dec!(100), dec!(110)));
        log.extend(round_trip(dec!(100), dec!(110)));
        log.extend(round_trip(dec!(100), dec!(95)));
        kelly.update(&log);
        // Kelly = 0.75 - 0.25/2 = 0.625; half-Kelly = 0.3125
        assert_eq!(kelly.kelly_fraction(), Some(dec!(0.3125)));
    }

    #[test]
    fn negative_edge_floors_at_zero() {
        let mut kelly = KellyCriterion::new(KellyConfig {
            min_trades: 2,
            ..KellyConfig::default()
        });
        let mut log = Vec::new();
        log.extend(round_trip(dec!(100), dec!(90)));
        log.extend(round_trip(dec!(100), dec!(90)));
        kelly.update(&log);
        assert_eq!(kelly.kelly_fraction(), Some(Decimal::ZERO));
    }

    #[test]
    fn output_capped_at_max() {
        let mut kelly = KellyCriterion::new(KellyConfig {
            lookback: 40,
            fraction: dec!(1),
            min_trades: 2,
            max_kelly_pct: dec!(0.05),
        });
        let mut log = Vec::new();
        log.extend(round_trip(dec!(100), dec!(150)));
        log.extend(round_trip(dec!(100), dec!(150)));
        kelly.update(&log);
        assert_eq!(kelly.kelly_fraction(), Some(dec!(0.05)));
    }

    #[test]
    fn commissions_reduce_round_trip_pnl() {
        let log = vec![
            fill(Side::Buy, dec!(100), dec!(1)),
            fill(Side::Sell, dec!(101), dec!(1)),
        ];
        let pnls = extract_round_trip_pnls(&log);
        // (101-100)*10 - 2 = 8
        assert_eq!(pnls, vec![dec!(8)]);
    }
}
