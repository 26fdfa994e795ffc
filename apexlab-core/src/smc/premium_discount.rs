//! Premium / discount zones and Optimal Trade Entry ranges.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which side a prospective entry is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

/// Price location relative to the equilibrium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceZone {
    Premium,
    Discount,
    Equilibrium,
}

/// Immutable premium/discount levels for a swing range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumDiscountZone {
    pub range_high: Decimal,
    pub range_low: Decimal,
    pub equilibrium: Decimal,
    pub ote_long_low: Decimal,
    pub ote_long_high: Decimal,
    pub ote_short_low: Decimal,
    pub ote_short_high: Decimal,
}

/// Compute equilibrium and OTE boundaries from a swing-high/swing-low
/// range. A degenerate range collapses every level to the shared price.
pub fn compute_premium_discount(swing_high: Decimal, swing_low: Decimal) -> PremiumDiscountZone {
    if swing_high == swing_low {
        return PremiumDiscountZone {
            range_high: swing_high,
            range_low: swing_low,
            equilibrium: swing_high,
            ote_long_low: swing_high,
            ote_long_high: swing_high,
            ote_short_low: swing_high,
            ote_short_high: swing_high,
        };
    }

    let span = swing_high - swing_low;
    let fib = |s: &str| Decimal::from_str(s).expect("fib constants are valid decimals");

    PremiumDiscountZone {
        range_high: swing_high,
        range_low: swing_low,
        equilibrium: (swing_high + swing_low) / Decimal::TWO,
        ote_long_low: swing_high - span * fib("0.79"),
        ote_long_high: swing_high - span * fib("0.618"),
        ote_short_low: swing_low + span * fib("0.205"),
        ote_short_high: swing_low + span * fib("0.382"),
    }
}

/// Classify a price against the zone's equilibrium.
pub fn price_zone(price: Decimal, zone: &PremiumDiscountZone) -> PriceZone {
    if price > zone.equilibrium {
        PriceZone::Premium
    } else if price < zone.equilibrium {
        PriceZone::Discount
    } else {
        PriceZone::Equilibrium
    }
}

/// True if `price` sits within the OTE band for the given side.
pub fn in_ote_zone(price: Decimal, zone: &PremiumDiscountZone, side: TradeSide) -> bool {
    match side {
        TradeSide::Long => price >= zone.ote_long_low && price <= zone.ote_long_high,
        TradeSide::Short => price >= zone.ote_short_low && price <= zone.ote_short_high,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn levels_for_simple_range() {
        let zone = compute_premium_discount(dec!(200), dec!(100));
        assert_eq!(zone.equilibrium, dec!(150));
        assert_eq!(zone.ote_long_low, dec!(121.0)); // 200 - 100*0.79
        assert_eq!(zone.ote_long_high, dec!(138.2)); // 200 - 100*0.618
        assert_eq!(zone.ote_short_low, dec!(120.5)); // 100 + 100*0.205
        assert_eq!(zone.ote_short_high, dec!(138.2)); // 100 + 100*0.382
    }

    #[test]
    fn premium_discount_classification() {
        let zone = compute_premium_discount(dec!(200), dec!(100));
        assert_eq!(price_zone(dec!(160), &zone), PriceZone::Premium);
        assert_eq!(price_zone(dec!(140), &zone), PriceZone::Discount);
        assert_eq!(price_zone(dec!(150), &zone), PriceZone::Equilibrium);
    }

    #[test]
    fn ote_band_membership() {
        let zone = compute_premium_discount(dec!(200), dec!(100));
        assert!(in_ote_zone(dec!(130), &zone, TradeSide::Long));
        assert!(!in_ote_zone(dec!(150), &zone, TradeSide::Long));
        assert!(in_ote_zone(dec!(125), &zone, TradeSide::Short));
        assert!(!in_ote_zone(dec!(110), &zone, TradeSide::Short));
    }

    #[test]
    fn degenerate_range_collapses() {
        let zone = compute_premium_discount(dec!(100), dec!(100));
        assert_eq!(zone.equilibrium, dec!(100));
        assert_eq!(zone.ote_long_low, dec!(100));
        assert!(in_ote_zone(dec!(100), &zone, TradeSide::Long));
    }
}
