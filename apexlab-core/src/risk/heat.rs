//! Portfolio heat — total open risk as a fraction of equity.

use crate::portfolio::Portfolio;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Heat module configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatConfig {
    /// Maximum portfolio heat as a fraction of equity.
    pub max_heat_pct: Decimal,
    /// Multiplier on ATR to estimate per-unit stop distance.
    pub atr_multiplier: Decimal,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            max_heat_pct: Decimal::new(6, 2),   // 0.06
            atr_multiplier: Decimal::TWO,
        }
    }
}

/// Tracks total open risk across positions.
#[derive(Debug, Clone)]
pub struct PortfolioHeatMonitor {
    config: HeatConfig,
}

impl PortfolioHeatMonitor {
    pub fn new(config: HeatConfig) -> Self {
        Self { config }
    }

    /// Current heat: sum of per-position risk over equity. Position risk is
    /// qty * (atr * multiplier) when ATR is available, otherwise 2% of the
    /// position's marked value.
    pub fn compute_heat(
        &self,
        portfolio: &Portfolio,
        atr: Decimal,
        prices: &BTreeMap<String, Decimal>,
    ) -> Decimal {
        let equity = portfolio.equity(prices);
        if equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let stop_distance = if atr > Decimal::ZERO {
            atr * self.config.atr_multiplier
        } else {
            Decimal::ZERO
        };

        let mut total_risk = Decimal::ZERO;
        for pos in portfolio.positions() {
            if stop_distance > Decimal::ZERO {
                total_risk += pos.quantity * stop_distance;
            } else {
                let price = prices
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.avg_entry_price);
                total_risk += pos.quantity * price * Decimal::new(2, 2);
            }
        }
        total_risk / equity
    }

    /// Would adding `new_risk` (an absolute risk amount) stay within the
    /// heat limit?
    pub fn can_add_risk(
        &self,
        portfolio: &Portfolio,
        atr: Decimal,
        prices: &BTreeMap<String, Decimal>,
        new_risk: Decimal,
    ) -> bool {
        let equity = portfolio.equity(prices);
        if equity <= Decimal::ZERO {
            return false;
        }
        let current = self.compute_heat(portfolio, atr, prices);
        current + new_risk / equity <= self.config.max_heat_pct
    }
}
