//! Regime-gated strategy decorator.
//!
//! Wraps an inner strategy behind a regime classifier. The inner strategy
//! is always invoked — even when its signal will be suppressed — so its
//! stateful detectors stay synchronized with the bar stream.

use crate::domain::{Bar, Signal};
use crate::strategy::{BarBuffer, Strategy};
use rust_decimal::Decimal;

use super::{MarketRegime, RegimeClassifier, RegimeType};

/// Forwards the inner strategy's signals only in allowed regimes.
pub struct RegimeGatedStrategy {
    inner: Box<dyn Strategy>,
    allowed: Vec<RegimeType>,
    classifier: RegimeClassifier,
    buffer: BarBuffer,
}

impl RegimeGatedStrategy {
    pub fn new(
        inner: Box<dyn Strategy>,
        allowed: Vec<RegimeType>,
        atr_period: usize,
        adx_period: usize,
        regime_lookback: usize,
    ) -> Self {
        Self {
            inner,
            allowed,
            classifier: RegimeClassifier::new(
                atr_period,
                adx_period,
                regime_lookback,
                Decimal::new(75, 2),  // 0.75
                Decimal::new(150, 2), // 1.50
            ),
            buffer: BarBuffer::new(BarBuffer::DEFAULT_CAPACITY),
        }
    }

    pub fn current_regime(&self) -> Option<&MarketRegime> {
        self.classifier.regime()
    }
}

impl Strategy for RegimeGatedStrategy {
    fn symbol(&self) -> &str {
        self.inner.symbol()
    }

    fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal> {
        self.buffer.push(bar.clone());
        let regime = self.classifier.update(bar, &self.buffer);

        // The inner strategy runs unconditionally to keep its state coherent.
        let signal = self.inner.calculate_signals(bar);

        if self.allowed.contains(&regime.regime_type) {
            signal
        } else {
            None
        }
    }

    fn current_atr(&self) -> Decimal {
        self.inner.current_atr()
    }
}
