//! Market regime classification — ATR volatility + Wilder ADX trend
//! strength, combined through a fixed 2D matrix.

pub mod adx;
pub mod atr_regime;
pub mod gated;

pub use adx::{AdxClassifier, TrendStrength};
pub use atr_regime::{AtrRegimeClassifier, VolatilityRegime};
pub use gated::RegimeGatedStrategy;

use crate::domain::Bar;
use crate::strategy::BarBuffer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Composite regime types produced by the classification matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimeType {
    StrongTrend,
    ModerateTrend,
    WeakTrend,
    RangingLow,
    RangingNormal,
    Choppy,
}

/// Immutable snapshot of the current market regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRegime {
    pub regime_type: RegimeType,
    pub adx: Decimal,
    pub adx_rising: bool,
    pub vol_regime: VolatilityRegime,
    pub current_atr: Decimal,
    pub plus_di: Decimal,
    pub minus_di: Decimal,
    pub bullish_pressure: bool,
}

/// Lookup over (trend strength x volatility).
fn regime_matrix(trend: TrendStrength, vol: VolatilityRegime) -> RegimeType {
    use TrendStrength::*;
    use VolatilityRegime::*;
    match (trend, vol) {
        (StrongTrend, Low) => RegimeType::WeakTrend,
        (StrongTrend, Normal) | (StrongTrend, High) => RegimeType::StrongTrend,
        (Trending, Normal) => RegimeType::ModerateTrend,
        (Trending, Low) | (Trending, High) => RegimeType::WeakTrend,
        (WeakTrend, _) => RegimeType::WeakTrend,
        (Ranging, Low) => RegimeType::RangingLow,
        (Ranging, Normal) => RegimeType::RangingNormal,
        (Ranging, High) => RegimeType::Choppy,
    }
}

/// Combined ATR + ADX regime classifier.
#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    atr_clf: AtrRegimeClassifier,
    adx_clf: AdxClassifier,
    regime: Option<MarketRegime>,
    prev_adx: Decimal,
}

impl RegimeClassifier {
    pub fn new(
        atr_period: usize,
        adx_period: usize,
        regime_lookback: usize,
        low_vol_threshold: Decimal,
        high_vol_threshold: Decimal,
    ) -> Self {
        Self {
            atr_clf: AtrRegimeClassifier::new(
                atr_period,
                regime_lookback,
                low_vol_threshold,
                high_vol_threshold,
            ),
            adx_clf: AdxClassifier::new(adx_period),
            regime: None,
            prev_adx: Decimal::ZERO,
        }
    }

    pub fn regime(&self) -> Option<&MarketRegime> {
        self.regime.as_ref()
    }

    /// Update both classifiers from the current bar and its buffer, and
    /// produce a regime snapshot.
    pub fn update(&mut self, bar: &Bar, buffer: &BarBuffer) -> MarketRegime {
        let vol_regime = self.atr_clf.update(buffer);

        if let Some(prev) = buffer.from_end(1) {
            self.adx_clf.update(bar, prev);
        }
        let trend = self.adx_clf.classify();
        let adx = self.adx_clf.adx();
        let adx_rising = adx >= self.prev_adx;
        self.prev_adx = adx;

        let snapshot = MarketRegime {
            regime_type: regime_matrix(trend, vol_regime),
            adx,
            adx_rising,
            vol_regime,
            current_atr: self.atr_clf.current_atr(),
            plus_di: self.adx_clf.plus_di(),
            minus_di: self.adx_clf.minus_di(),
            bullish_pressure: self.adx_clf.plus_di() > self.adx_clf.minus_di(),
        };
        self.regime = Some(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_corners() {
        assert_eq!(
            regime_matrix(TrendStrength::StrongTrend, VolatilityRegime::Normal),
            RegimeType::StrongTrend
        );
        assert_eq!(
            regime_matrix(TrendStrength::StrongTrend, VolatilityRegime::Low),
            RegimeType::WeakTrend
        );
        assert_eq!(
            regime_matrix(TrendStrength::Ranging, VolatilityRegime::High),
            RegimeType::Choppy
        );
        assert_eq!(
            regime_matrix(TrendStrength::Ranging, VolatilityRegime::Low),
            RegimeType::RangingLow
        );
        assert_eq!(
            regime_matrix(TrendStrength::Trending, VolatilityRegime::Normal),
            RegimeType::ModerateTrend
        );
    }
}
