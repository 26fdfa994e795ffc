//! Risk manager — position sizing and trade gating.
//!
//! Sizing pipeline: equity -> ATR stop distance (or percent-of-price
//! fallback) -> Kelly override of the risk fraction -> risk budget ->
//! raw quantity -> notional caps -> heat gate -> drawdown scaling ->
//! floor to a whole number of units.

pub mod drawdown;
pub mod heat;
pub mod kelly;

pub use drawdown::{DrawdownScaler, DrawdownScalerConfig};
pub use heat::{HeatConfig, PortfolioHeatMonitor};
pub use kelly::{KellyConfig, KellyCriterion};

use crate::domain::Bar;
use crate::portfolio::Portfolio;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Risk manager configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of equity risked per trade.
    pub risk_per_trade: Decimal,
    /// Multiplier applied to ATR to derive the stop distance.
    pub atr_multiplier: Decimal,
    /// Stop distance as a fraction of price when ATR is unavailable.
    pub fallback_risk_pct: Decimal,
    /// Single-position notional cap as a fraction of equity.
    pub max_position_pct: Decimal,
    /// Cap on simultaneously open positions.
    pub max_concurrent_positions: usize,
    /// Symbol-keyed position-count overrides.
    pub per_asset_max_positions: BTreeMap<String, usize>,
    /// Symbol-keyed notional-cap overrides.
    pub per_asset_max_pct: BTreeMap<String, Decimal>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: Decimal::new(1, 2),     // 0.01
            atr_multiplier: Decimal::TWO,
            fallback_risk_pct: Decimal::new(2, 2),  // 0.02
            max_position_pct: Decimal::new(20, 2),  // 0.20
            max_concurrent_positions: 5,
            per_asset_max_positions: BTreeMap::new(),
            per_asset_max_pct: BTreeMap::new(),
        }
    }
}

/// Central risk orchestrator.
pub struct RiskManager {
    config: RiskConfig,
    kelly: Option<KellyCriterion>,
    heat: Option<PortfolioHeatMonitor>,
    dd_scaler: Option<DrawdownScaler>,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            kelly: None,
            heat: None,
            dd_scaler: None,
        }
    }

    pub fn with_kelly(mut self, kelly: KellyCriterion) -> Self {
        self.kelly = Some(kelly);
        self
    }

    pub fn with_heat_monitor(mut self, heat: PortfolioHeatMonitor) -> Self {
        self.heat = Some(heat);
        self
    }

    pub fn with_drawdown_scaler(mut self, scaler: DrawdownScaler) -> Self {
        self.dd_scaler = Some(scaler);
        self
    }

    /// Gate: may a new trade be opened at all?
    pub fn can_trade(&self, portfolio: &Portfolio, bar: &Bar) -> bool {
        if portfolio.open_position_count() >= self.config.max_concurrent_positions {
            return false;
        }
        if let Some(&limit) = self.config.per_asset_max_positions.get(&bar.symbol) {
            let open_here = usize::from(portfolio.position(&bar.symbol).is_some());
            if open_here >= limit {
                return false;
            }
        }
        true
    }

    /// Compute the order quantity for a new entry at this bar.
    pub fn compute_quantity(
        &mut self,
        portfolio: &Portfolio,
        atr: Decimal,
        bar: &Bar,
    ) -> Decimal {
        let equity = portfolio.current_equity();
        if equity <= Decimal::ZERO || bar.close <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let stop_distance = if atr > Decimal::ZERO {
            atr * self.config.atr_multiplier
        } else {
            bar.close * self.config.fallback_risk_pct
        };
        if stop_distance <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let mut risk_per_trade = self.config.risk_per_trade;
        if let Some(kelly) = &mut self.kelly {
            kelly.update(portfolio.fill_log());
            if let Some(fraction) = kelly.kelly_fraction() {
                risk_per_trade = fraction;
            }
        }

        let risk_amount = equity * risk_per_trade;
        let mut quantity = risk_amount / stop_distance;

        let max_quantity = equity * self.config.max_position_pct / bar.close;
        quantity = quantity.min(max_quantity);

        if let Some(&asset_pct) = self.config.per_asset_max_pct.get(&bar.symbol) {
            quantity = quantity.min(equity * asset_pct / bar.close);
        }

        if let Some(heat) = &self.heat {
            let mut prices = BTreeMap::new();
            prices.insert(bar.symbol.clone(), bar.close);
            if !heat.can_add_risk(portfolio, atr, &prices, risk_amount) {
                return Decimal::ZERO;
            }
        }

        if let Some(scaler) = &self.dd_scaler {
            quantity *= scaler.compute_scale(portfolio.equity_log());
        }

        quantity.floor().max(Decimal::ZERO)
    }
}
