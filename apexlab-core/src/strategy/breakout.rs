//! Donchian channel breakout strategy with volume confirmation.

use crate::domain::{Bar, Signal, SignalKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{simple_atr, BarBuffer, Strategy};

/// Breakout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutConfig {
    /// Channel lookback in bars (excluding the current bar).
    pub lookback: usize,
    pub atr_period: usize,
    /// Entry requires volume >= factor * average channel volume.
    pub volume_factor: Decimal,
    pub max_buffer: usize,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            atr_period: 14,
            volume_factor: Decimal::new(15, 1), // 1.5
            max_buffer: BarBuffer::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionBias {
    Flat,
    Long,
    Short,
}

/// Long above the channel high, short below the channel low, exit when
/// price closes back through the far side of the channel.
pub struct BreakoutStrategy {
    symbol: String,
    config: BreakoutConfig,
    buffer: BarBuffer,
    bias: PositionBias,
    current_atr: Decimal,
}

impl BreakoutStrategy {
    pub fn new(symbol: impl Into<String>, config: BreakoutConfig) -> Self {
        let buffer = BarBuffer::new(config.max_buffer);
        Self {
            symbol: symbol.into(),
            config,
            buffer,
            bias: PositionBias::Flat,
            current_atr: Decimal::ZERO,
        }
    }

    fn signal(&self, bar: &Bar, kind: SignalKind, strength: Decimal) -> Signal {
        Signal {
            symbol: bar.symbol.clone(),
            timestamp: bar.timestamp,
            kind,
            strength,
        }
    }
}

impl Strategy for BreakoutStrategy {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn current_atr(&self) -> Decimal {
        self.current_atr
    }

    fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal> {
        self.buffer.push(bar.clone());
        self.current_atr = simple_atr(&self.buffer, self.config.atr_period);

        if self.buffer.len() < self.config.lookback + 1 {
            return None;
        }

        // Channel over the lookback window, excluding the current bar.
        let mut channel_high = Decimal::MIN;
        let mut channel_low = Decimal::MAX;
        let mut volume_sum = 0u64;
        for k in 1..=self.config.lookback {
            let b = self.buffer.from_end(k).expect("len checked");
            channel_high = channel_high.max(b.high);
            channel_low = channel_low.min(b.low);
            volume_sum += b.volume;
        }
        let avg_volume =
            Decimal::from(volume_sum) / Decimal::from(self.config.lookback as u64);
        let volume_ok =
            Decimal::from(bar.volume) >= avg_volume * self.config.volume_factor;

        // Exit: price back through the opposite channel edge.
        match self.bias {
            PositionBias::Long if bar.close < channel_low => {
                self.bias = PositionBias::Flat;
                return Some(self.signal(bar, SignalKind::Exit, Decimal::new(5, 1)));
            }
            PositionBias::Short if bar.close > channel_high => {
                self.bias = PositionBias::Flat;
                return Some(self.signal(bar, SignalKind::Exit, Decimal::new(5, 1)));
            }
            _ => {}
        }

        if self.bias != PositionBias::Flat {
            return None;
        }

        if bar.close > channel_high && volume_ok {
            self.bias = PositionBias::Long;
            let strength = ((bar.close - channel_high) / channel_high
                * Decimal::ONE_HUNDRED)
                .min(Decimal::ONE);
            return Some(self.signal(bar, SignalKind::Long, strength));
        }
        if bar.close < channel_low && volume_ok {
            self.bias = PositionBias::Short;
            let strength = ((channel_low - bar.close) / channel_low
                * Decimal::ONE_HUNDRED)
                .min(Decimal::ONE);
            return Some(self.signal(bar, SignalKind::Short, strength));
        }

        None
    }
}
