//! Strategy contract and the bounded rolling bar buffer.

pub mod breakout;
pub mod buffer;
pub mod fvg_strategy;
pub mod ict_strategy;
pub mod reversal;
pub mod smc_strategy;

pub use breakout::{BreakoutConfig, BreakoutStrategy};
pub use buffer::BarBuffer;
pub use fvg_strategy::{FvgStrategy, FvgStrategyConfig};
pub use ict_strategy::{IctConfig, IctStrategy};
pub use reversal::{ReversalConfig, ReversalStrategy};
pub use smc_strategy::{SmcConfig, SmcStrategy};

use crate::domain::{Bar, Signal};
use rust_decimal::Decimal;

/// A trading strategy bound to one symbol.
///
/// `calculate_signals` receives each confirmed bar exactly once; the
/// strategy's rolling buffer (which includes the current bar after the
/// call) is its only window onto history. Returning an Exit signal without
/// an open position is allowed; the router drops it.
pub trait Strategy {
    fn symbol(&self) -> &str;

    /// Evaluate the current bar and optionally emit a signal.
    fn calculate_signals(&mut self, bar: &Bar) -> Option<Signal>;

    /// Current ATR estimate for risk sizing. Zero means unavailable, in
    /// which case the risk manager falls back to a percent-of-price stop.
    fn current_atr(&self) -> Decimal {
        Decimal::ZERO
    }
}

/// Simple ATR: mean of true ranges over the most recent
/// min(period, len - 1) bars of the buffer. Zero until two bars exist.
pub fn simple_atr(buffer: &BarBuffer, period: usize) -> Decimal {
    let n = buffer.len();
    if n < 2 || period == 0 {
        return Decimal::ZERO;
    }
    let span = period.min(n - 1);
    let mut sum = Decimal::ZERO;
    for k in 0..span {
        let bar = buffer.from_end(k).expect("k < len");
        let prev = buffer.from_end(k + 1).expect("k + 1 < len");
        sum += bar.true_range(prev.close);
    }
    sum / Decimal::from(span as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(day: u32, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000,
            timeframe: Timeframe::D1,
        }
    }

    #[test]
    fn atr_zero_until_two_bars() {
        let mut buf = BarBuffer::new(10);
        assert_eq!(simple_atr(&buf, 14), Decimal::ZERO);
        buf.push(bar(1, dec!(105), dec!(95), dec!(100)));
        assert_eq!(simple_atr(&buf, 14), Decimal::ZERO);
    }

    #[test]
    fn atr_averages_true_ranges() {
        let mut buf = BarBuffer::new(10);
        buf.push(bar(1, dec!(105), dec!(95), dec!(100))); // seed close 100
        buf.push(bar(2, dec!(104), dec!(96), dec!(100))); // TR 8
        buf.push(bar(3, dec!(106), dec!(100), dec!(104))); // TR max(6, 6, 0) = 6
        assert_eq!(simple_atr(&buf, 14), dec!(7));
        assert_eq!(simple_atr(&buf, 1), dec!(6));
    }
}
