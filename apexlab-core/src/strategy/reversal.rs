//! Mean-reversion strategy over Wilder's RSI.
//!
//! Long when the RSI drops below the oversold level, short above the
//! overbought level, exit when it crosses back through the neutral 50
//! line. The RSI is recomputed from the rolling buffer each bar: the
//! first `period` price changes seed the average gain/loss, later changes
//! apply Wilder smoothing.

use crate::domain::{Bar, Signal, SignalKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BarBuffer, Strategy};

/// Mean-reversion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalConfig {
    pub rsi_period: usize,
    /// RSI below this enters long.
    pub rsi_oversold: Decimal,
    /// RSI above this enters short.
    pub rsi_overbought: Decimal,
    pub max_buffer: usize,
}

impl Default for ReversalConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_oversold: Decimal::from(30),
            rsi_overbought: Decimal::from(70),
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

/// RSI mean-reversion over one symbol.
pub struct ReversalStrategy {
    symbol: String,
    config: ReversalConfig,
    buffer: BarBuffer,
    bias: PositionBias,
}

impl ReversalStrategy {
    pub fn new(symbol: impl Into<String>, config: ReversalConfig) -> Self {
        let buffer = BarBuffer::new(config.max_buffer);
        Self {
            symbol: symbol.into(),
            config,
            buffer,
            bias: PositionBias::Flat,
        }
    }

    fn signal(&self, bar: &Bar, kind: SignalKind, strength: Decimal) -> Signal {
        Signal {
            symbol: bar.symbol.clone(),
            timestamp: bar.timestamp,
            kind,
            strength: strength.max(Decimal::ZERO).min(Decimal::ONE).round_dp(4),
        }
    }
}

impl Strategy for ReversalStrategy {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal> {
        self.buffer.push(bar.clone());

        let rsi = wilder_rsi(&self.buffer, self.config.rsi_period)?;
        let neutral = Decimal::from(50);

        // Exit: RSI back through neutral against the position.
        match self.bias {
            PositionBias::Long if rsi > neutral => {
                self.bias = PositionBias::Flat;
                return Some(self.signal(bar, SignalKind::Exit, rsi / Decimal::ONE_HUNDRED));
            }
            PositionBias::Short if rsi < neutral => {
                self.bias = PositionBias::Flat;
                return Some(self.signal(bar, SignalKind::Exit, rsi / Decimal::ONE_HUNDRED));
            }
            _ => {}
        }

        if self.bias != PositionBias::Flat {
            return None;
        }

        if rsi < self.config.rsi_oversold {
            self.bias = PositionBias::Long;
            let strength = (self.config.rsi_oversold - rsi) / self.config.rsi_oversold;
            return Some(self.signal(bar, SignalKind::Long, strength));
        }
        if rsi > self.config.rsi_overbought {
            self.bias = PositionBias::Short;
            let strength = (rsi - self.config.rsi_overbought)
                / (Decimal::ONE_HUNDRED - self.config.rsi_overbought);
            return Some(self.signal(bar, SignalKind::Short, strength));
        }

        None
    }
}

/// Wilder RSI over the buffer's closes. None until `period + 1` bars
/// exist or when the series has no movement at all.
fn wilder_rsi(buffer: &BarBuffer, period: usize) -> Option<Decimal> {
    let n = buffer.len();
    if period == 0 || n < period + 1 {
        return None;
    }

    let closes: Vec<Decimal> = buffer.iter().map(|b| b.close).collect();
    let p = Decimal::from(period as u64);

    let mut avg_gain = Decimal::ZERO;
    let mut avg_loss = Decimal::ZERO;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > Decimal::ZERO {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= p;
    avg_loss /= p;

    for i in (period + 1)..n {
        let change = closes[i] - closes[i - 1];
        let (gain, loss) = if change > Decimal::ZERO {
            (change, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -change)
        };
        avg_gain = (avg_gain * (p - Decimal::ONE) + gain) / p;
        avg_loss = (avg_loss * (p - Decimal::ONE) + loss) / p;
    }

    if avg_gain == Decimal::ZERO && avg_loss == Decimal::ZERO {
        return None;
    }
    Some(avg_gain / (avg_gain + avg_loss) * Decimal::ONE_HUNDRED)
}
