//! Property tests over the core invariants: merge ordering, FVG state
//! monotonicity, swing confirmation lag, and accounting closure.

use apexlab_core::domain::{Bar, Fill, Side, Timeframe};
use apexlab_core::merge_bars;
use apexlab_core::portfolio::Portfolio;
use apexlab_core::smc::{FvgTracker, MitigationMode, SwingDetector};
use apexlab_core::strategy::BarBuffer;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn bar(symbol: &str, hour_offset: i64, o: i64, h: i64, l: i64, c: i64) -> Bar {
    Bar {
        symbol: symbol.into(),
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::hours(hour_offset),
        open: Decimal::from(o),
        high: Decimal::from(h),
        low: Decimal::from(l),
        close: Decimal::from(c),
        volume: 1000,
        timeframe: Timeframe::H1,
    }
}

/// Strategy: random sorted hour offsets per symbol.
fn symbol_streams() -> impl proptest::strategy::Strategy<Value = BTreeMap<String, Vec<i64>>> {
    proptest::collection::btree_map(
        "[A-D]{1,3}",
        proptest::collection::vec(0i64..100, 0..20).prop_map(|mut v| {
            v.sort_unstable();
            v
        }),
        1..5,
    )
}

proptest! {
    /// Merge invariant: emitted bars are ordered by (timestamp, symbol,
    /// arrival) — for equal timestamps the symbol ordering is
    /// alphabetical, and within one symbol original order is kept.
    #[test]
    fn merge_respects_total_order(streams in symbol_streams()) {
        let bar_streams: BTreeMap<String, Vec<Bar>> = streams
            .iter()
            .map(|(sym, hours)| {
                let bars = hours
                    .iter()
                    .map(|&h| bar(sym, h, 100, 101, 99, 100))
                    .collect();
                (sym.clone(), bars)
            })
            .collect();

        let merged: Vec<Bar> = merge_bars(bar_streams).collect();
        let total: usize = streams.values().map(|v| v.len()).sum();
        prop_assert_eq!(merged.len(), total);

        for pair in merged.windows(2) {
            let earlier = (&pair[0].timestamp, &pair[0].symbol);
            let later = (&pair[1].timestamp, &pair[1].symbol);
            prop_assert!(
                earlier <= later,
                "merge emitted {:?} after {:?}",
                later,
                earlier
            );
        }
    }

    /// FVG states only ever advance along the lifecycle ordering.
    #[test]
    fn fvg_states_are_monotone(
        closes in proptest::collection::vec(50i64..150, 10..60),
    ) {
        let mut tracker = FvgTracker::new(50, 1000, Decimal::ZERO, MitigationMode::Wick);
        let mut buffer = BarBuffer::new(200);
        let mut last_rank: BTreeMap<(usize, String), u8> = BTreeMap::new();

        for (i, &c) in closes.iter().enumerate() {
            let b = bar("EURUSD", i as i64, c, c + 2, c - 2, c);
            buffer.push(b.clone());
            tracker.detect_and_register(&buffer, i + 1, Decimal::ONE);
            tracker.update_all_states(&b, i + 1);

            for gap in tracker.gaps() {
                let key = (gap.formed_bar_idx, format!("{:?}{}", gap.direction, gap.top));
                let rank = gap.state.rank();
                if let Some(&prev) = last_rank.get(&key) {
                    prop_assert!(
                        rank >= prev,
                        "gap {:?} regressed from rank {} to {}",
                        key, prev, rank
                    );
                }
                last_rank.insert(key, rank);
            }
        }
    }

    /// Swing confirmation lag: a swing with absolute index i is only
    /// reported once the stream has advanced to bar i + strength.
    #[test]
    fn swings_confirm_with_exact_lag(
        highs in proptest::collection::vec(50i64..150, 10..80),
        strength in 1usize..4,
    ) {
        let mut detector = SwingDetector::new(strength, 100);
        let mut buffer = BarBuffer::new(200);

        for (i, &h) in highs.iter().enumerate() {
            let bar_count = i + 1;
            let b = bar("EURUSD", i as i64, h, h + 1, h - 10, h);
            buffer.push(b);
            let (new_highs, new_lows) = detector.detect_confirmed_swings(&buffer, bar_count);
            for point in new_highs.iter().chain(new_lows.iter()) {
                prop_assert_eq!(point.abs_idx + strength, bar_count);
            }
        }
    }

    /// Accounting closure: a sequence of round trips that ends flat
    /// reconciles exactly — final equity minus initial equals total
    /// realized PnL (friction already netted inside).
    #[test]
    fn closed_book_reconciles(
        trades in proptest::collection::vec((1i64..50, 50i64..150, 50i64..150, 0i64..3), 1..20),
    ) {
        let mut portfolio = Portfolio::new(Decimal::from(1_000_000), Decimal::new(25, 2));
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        for (qty, entry_price, exit_price, commission) in trades {
            let qty = Decimal::from(qty);
            portfolio.apply_fill(Fill {
                symbol: "EURUSD".into(),
                timestamp: t0,
                side: Side::Buy,
                quantity: qty,
                fill_price: Decimal::from(entry_price),
                commission: Decimal::from(commission),
                slippage: Decimal::ZERO,
                spread_cost: Decimal::ZERO,
            });
            portfolio.apply_fill(Fill {
                symbol: "EURUSD".into(),
                timestamp: t0,
                side: Side::Sell,
                quantity: qty,
                fill_price: Decimal::from(exit_price),
                commission: Decimal::from(commission),
                slippage: Decimal::ZERO,
                spread_cost: Decimal::ZERO,
            });
        }

        prop_assert!(portfolio.position("EURUSD").is_none());
        let final_equity = portfolio.cash();
        prop_assert_eq!(
            final_equity - Decimal::from(1_000_000),
            portfolio.realized_pnl()
        );
    }
}
