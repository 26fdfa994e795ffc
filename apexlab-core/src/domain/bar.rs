//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Bar timeframe tag.
///
/// Drives annualization for Sharpe/Sortino and the bars-per-year figure
/// used by CAGR. The hourly entries use sqrt(252 * bars_per_day) with the
/// US session rounded to 7 hourly bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
    W1,
    Mo1,
}

impl Timeframe {
    /// Number of bars in one trading year.
    pub fn bars_per_year(&self) -> u64 {
        match self {
            Timeframe::M1 => 252 * 390,
            Timeframe::M5 => 252 * 78,
            Timeframe::M15 => 252 * 26,
            Timeframe::H1 => 252 * 7,
            Timeframe::H4 => 252 * 2,
            Timeframe::D1 => 252,
            Timeframe::W1 => 52,
            Timeframe::Mo1 => 12,
        }
    }

    /// Annualization factor: sqrt(bars_per_year), fixed table.
    pub fn annualization(&self) -> Decimal {
        let s = match self {
            Timeframe::M1 => "313.4965",
            Timeframe::M5 => "140.1999",
            Timeframe::M15 => "80.9444",
            Timeframe::H1 => "42.0000",
            Timeframe::H4 => "22.4499",
            Timeframe::D1 => "15.8745",
            Timeframe::W1 => "7.2111",
            Timeframe::Mo1 => "3.4641",
        };
        Decimal::from_str(s).expect("annualization table entries are valid decimals")
    }
}

/// Errors from bar validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BarError {
    #[error("bar {symbol}@{timestamp}: low {low} > high {high}")]
    LowAboveHigh {
        symbol: String,
        timestamp: DateTime<Utc>,
        low: Decimal,
        high: Decimal,
    },
    #[error("bar {symbol}@{timestamp}: {field} {value} outside [low, high]")]
    BodyOutsideRange {
        symbol: String,
        timestamp: DateTime<Utc>,
        field: &'static str,
        value: Decimal,
    },
    #[error("bar {symbol}@{timestamp}: zero volume bars must be dropped at ingestion")]
    ZeroVolume {
        symbol: String,
        timestamp: DateTime<Utc>,
    },
}

/// OHLCV bar for a single symbol at a single timestamp.
///
/// All prices are exact decimals constructed from string or integer
/// sources. Zero-volume bars are an ingestion-contract violation and must
/// never reach the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub timeframe: Timeframe,
}

impl Bar {
    /// Check the OHLCV invariants: low <= open, close <= high and volume > 0.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.low > self.high {
            return Err(BarError::LowAboveHigh {
                symbol: self.symbol.clone(),
                timestamp: self.timestamp,
                low: self.low,
                high: self.high,
            });
        }
        for (field, value) in [("open", self.open), ("close", self.close)] {
            if value < self.low || value > self.high {
                return Err(BarError::BodyOutsideRange {
                    symbol: self.symbol.clone(),
                    timestamp: self.timestamp,
                    field,
                    value,
                });
            }
        }
        if self.volume == 0 {
            return Err(BarError::ZeroVolume {
                symbol: self.symbol.clone(),
                timestamp: self.timestamp,
            });
        }
        Ok(())
    }

    /// True range against the previous bar's close.
    pub fn true_range(&self, prev_close: Decimal) -> Decimal {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Bearish body: close strictly below open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Bullish body: close strictly above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_bar() -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: dec!(100),
            high: dec!(105),
            low: dec!(98),
            close: dec!(103),
            volume: 50_000,
            timeframe: Timeframe::D1,
        }
    }

    #[test]
    fn valid_bar_passes() {
        assert!(sample_bar().validate().is_ok());
    }

    #[test]
    fn low_above_high_rejected() {
        let mut bar = sample_bar();
        bar.low = dec!(106);
        assert!(matches!(
            bar.validate(),
            Err(BarError::LowAboveHigh { .. })
        ));
    }

    #[test]
    fn body_outside_range_rejected() {
        let mut bar = sample_bar();
        bar.close = dec!(97);
        assert!(matches!(
            bar.validate(),
            Err(BarError::BodyOutsideRange { field: "close", .. })
        ));
    }

    #[test]
    fn zero_volume_rejected() {
        let mut bar = sample_bar();
        bar.volume = 0;
        assert!(matches!(bar.validate(), Err(BarError::ZeroVolume { .. })));
    }

    #[test]
    fn true_range_uses_gap_to_prev_close() {
        let bar = sample_bar();
        // Gap up from 90: TR = max(7, |105-90|, |98-90|) = 15
        assert_eq!(bar.true_range(dec!(90)), dec!(15));
    }

    #[test]
    fn annualization_daily_is_sqrt_252() {
        assert_eq!(Timeframe::D1.annualization(), dec!(15.8745));
        assert_eq!(Timeframe::D1.bars_per_year(), 252);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
