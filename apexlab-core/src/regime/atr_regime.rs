//! ATR-based volatility regime classification.

use crate::strategy::{simple_atr, BarBuffer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Volatility buckets relative to the rolling mean ATR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VolatilityRegime {
    Low,
    #[default]
    Normal,
    High,
}

/// Classifies volatility by comparing current ATR against its rolling mean.
#[derive(Debug, Clone)]
pub struct AtrRegimeClassifier {
    atr_period: usize,
    low_threshold: Decimal,
    high_threshold: Decimal,
    atr_history: VecDeque<Decimal>,
    regime_lookback: usize,
    current_atr: Decimal,
    regime: VolatilityRegime,
}

impl AtrRegimeClassifier {
    pub fn new(
        atr_period: usize,
        regime_lookback: usize,
        low_threshold: Decimal,
        high_threshold: Decimal,
    ) -> Self {
        Self {
            atr_period,
            low_threshold,
            high_threshold,
            atr_history: VecDeque::with_capacity(regime_lookback.max(1)),
            regime_lookback: regime_lookback.max(1),
            current_atr: Decimal::ZERO,
            regime: VolatilityRegime::Normal,
        }
    }

    pub fn regime(&self) -> VolatilityRegime {
        self.regime
    }

    pub fn current_atr(&self) -> Decimal {
        self.current_atr
    }

    /// Compute ATR from the buffer and classify. Stays NORMAL through the
    /// warmup window (fewer than `atr_period` ATR samples).
    pub fn update(&mut self, buffer: &BarBuffer) -> VolatilityRegime {
        let atr = simple_atr(buffer, self.atr_period);
        if atr == Decimal::ZERO {
            self.regime = VolatilityRegime::Normal;
            return self.regime;
        }

        self.current_atr = atr;
        if self.atr_history.len() == self.regime_lookback {
            self.atr_history.pop_front();
        }
        self.atr_history.push_back(atr);

        if self.atr_history.len() < self.atr_period {
            self.regime = VolatilityRegime::Normal;
            return self.regime;
        }

        let mean: Decimal = self.atr_history.iter().copied().sum::<Decimal>()
            / Decimal::from(self.atr_history.len() as u64);
        if mean == Decimal::ZERO {
            self.regime = VolatilityRegime::Normal;
            return self.regime;
        }

        let ratio = atr / mean;
        self.regime = if ratio < self.low_threshold {
            VolatilityRegime::Low
        } else if ratio > self.high_threshold {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Normal
        };
        self.regime
    }
}
