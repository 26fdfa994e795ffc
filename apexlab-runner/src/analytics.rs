//! Post-loop analytics: rolling statistics, calendar aggregates, trade
//! breakdowns, excursion analysis and the friction sweep.
//!
//! Everything here is a pure function over the run's logs; the rolling
//! and regression math runs in f64 at the reporting boundary, while
//! PnL aggregation stays in Decimal.

use apexlab_core::domain::{Bar, Fill, Side, Timeframe};
use apexlab_core::portfolio::EquityEntry;
use apexlab_core::strategy::Strategy;
use apexlab_core::{Engine, EngineConfig};
use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metrics::{compute, pair_round_trips, TradeRecord};

// ─── Calendar aggregates ─────────────────────────────────────────────

/// Monthly returns keyed year -> month, chaining last-equity-per-month.
pub fn monthly_returns(equity_log: &[EquityEntry]) -> BTreeMap<i32, BTreeMap<u32, Decimal>> {
    let mut monthly_last: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
    for entry in equity_log {
        let key = (entry.timestamp.year(), entry.timestamp.month());
        monthly_last.insert(key, entry.equity);
    }

    let keys: Vec<(i32, u32)> = monthly_last.keys().copied().collect();
    let mut result: BTreeMap<i32, BTreeMap<u32, Decimal>> = BTreeMap::new();
    for pair in keys.windows(2) {
        let prev = monthly_last[&pair[0]];
        let curr = monthly_last[&pair[1]];
        let ret = if prev > Decimal::ZERO {
            (curr - prev) / prev * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        let (year, month) = pair[1];
        result.entry(year).or_default().insert(month, ret);
    }
    result
}

// ─── Rolling statistics ──────────────────────────────────────────────

/// One rolling-window sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Annualized Sharpe over a sliding window of bar returns.
pub fn rolling_sharpe(
    equity_log: &[EquityEntry],
    window: usize,
    timeframe: Timeframe,
) -> Vec<RollingPoint> {
    if window < 2 || equity_log.len() < window + 1 {
        return Vec::new();
    }

    let equities: Vec<f64> = equity_log
        .iter()
        .map(|e| e.equity.to_f64().unwrap_or(0.0))
        .collect();
    let returns: Vec<f64> = equities
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();
    let ann = timeframe.annualization().to_f64().unwrap_or(0.0);

    let mut out = Vec::new();
    for i in (window - 1)..returns.len() {
        let slice = &returns[i + 1 - window..=i];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let variance =
            slice.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        let std = variance.sqrt();
        let sharpe = if std > 0.0 { mean / std * ann } else { 0.0 };
        out.push(RollingPoint {
            // Returns lag equities by one, so the window ends at bar i+1.
            timestamp: equity_log[i + 1].timestamp,
            value: sharpe,
        });
    }
    out
}

/// Worst drawdown within each sliding window, in (negative) percent.
pub fn rolling_drawdown(equity_log: &[EquityEntry], window: usize) -> Vec<RollingPoint> {
    if window == 0 || equity_log.len() < window {
        return Vec::new();
    }

    let equities: Vec<f64> = equity_log
        .iter()
        .map(|e| e.equity.to_f64().unwrap_or(0.0))
        .collect();

    let mut out = Vec::new();
    for i in (window - 1)..equities.len() {
        let slice = &equities[i + 1 - window..=i];
        let mut peak = slice[0];
        let mut worst = 0.0f64;
        for &eq in slice {
            if eq > peak {
                peak = eq;
            }
            if peak > 0.0 {
                let dd = (eq - peak) / peak * 100.0;
                if dd < worst {
                    worst = dd;
                }
            }
        }
        out.push(RollingPoint {
            timestamp: equity_log[i].timestamp,
            value: worst,
        });
    }
    out
}

// ─── Trade breakdown ─────────────────────────────────────────────────

/// Aggregate statistics for one breakdown bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub label: String,
    pub count: usize,
    pub total_pnl: Decimal,
    pub win_count: usize,
    pub loss_count: usize,
}

/// Trade breakdown by entry hour, weekday and dealing session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeBreakdown {
    pub by_hour: Vec<BucketStats>,
    pub by_weekday: Vec<BucketStats>,
    pub by_session: Vec<BucketStats>,
}

fn session_label(hour: u32) -> &'static str {
    match hour {
        4..=9 => "Pre-Market",
        10..=11 => "Morning",
        12..=13 => "Lunch",
        14..=15 => "Afternoon",
        16..=19 => "After-Hours",
        _ => "Off-Hours",
    }
}

/// Group round trips by entry time and accumulate PnL and win/loss counts.
pub fn trade_breakdown(fill_log: &[Fill]) -> TradeBreakdown {
    let trades = pair_round_trips(fill_log);
    if trades.is_empty() {
        return TradeBreakdown::default();
    }

    let mut by_hour: BTreeMap<u32, (usize, Decimal, usize, usize)> = BTreeMap::new();
    let mut by_weekday: BTreeMap<u32, (usize, Decimal, usize, usize)> = BTreeMap::new();
    let mut by_session: BTreeMap<&'static str, (usize, Decimal, usize, usize)> = BTreeMap::new();

    for trade in &trades {
        let entry_time = trade.entry.timestamp;
        let win = trade.is_winner();
        for (key, map) in [
            (entry_time.hour(), &mut by_hour),
            (entry_time.weekday().num_days_from_monday(), &mut by_weekday),
        ] {
            let slot = map.entry(key).or_insert((0, Decimal::ZERO, 0, 0));
            slot.0 += 1;
            slot.1 += trade.pnl;
            if win {
                slot.2 += 1;
            } else {
                slot.3 += 1;
            }
        }
        let slot = by_session
            .entry(session_label(entry_time.hour()))
            .or_insert((0, Decimal::ZERO, 0, 0));
        slot.0 += 1;
        slot.1 += trade.pnl;
        if win {
            slot.2 += 1;
        } else {
            slot.3 += 1;
        }
    }

    let weekday_names = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    TradeBreakdown {
        by_hour: by_hour
            .into_iter()
            .map(|(h, (count, pnl, wins, losses))| BucketStats {
                label: format!("{h:02}:00"),
                count,
                total_pnl: pnl,
                win_count: wins,
                loss_count: losses,
            })
            .collect(),
        by_weekday: by_weekday
            .into_iter()
            .map(|(wd, (count, pnl, wins, losses))| BucketStats {
                label: weekday_names[wd as usize].to_string(),
                count,
                total_pnl: pnl,
                win_count: wins,
                loss_count: losses,
            })
            .collect(),
        by_session: by_session
            .into_iter()
            .map(|(label, (count, pnl, wins, losses))| BucketStats {
                label: label.to_string(),
                count,
                total_pnl: pnl,
                win_count: wins,
                loss_count: losses,
            })
            .collect(),
    }
}

// ─── MAE / MFE ───────────────────────────────────────────────────────

/// Excursion record for one round trip. MAE and MFE are price deltas
/// signed against / along the trade's direction (both non-negative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExcursion {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: Decimal,
    pub mae: Decimal,
    pub mfe: Decimal,
    pub side: Side,
    pub is_win: bool,
}

/// Maximum adverse / favorable excursion per trade, read from the prices
/// the equity log recorded while the trade was open.
pub fn mae_mfe(equity_log: &[EquityEntry], fill_log: &[Fill]) -> Vec<TradeExcursion> {
    let trades: Vec<TradeRecord> = pair_round_trips(fill_log);
    let mut out = Vec::new();

    for trade in trades {
        let symbol = &trade.entry.symbol;
        let entry_time = trade.entry.timestamp;
        let exit_time = trade.exit.timestamp;
        let entry_price = trade.entry.fill_price;

        let prices: Vec<Decimal> = equity_log
            .iter()
            .filter(|e| e.timestamp >= entry_time && e.timestamp <= exit_time)
            .filter_map(|e| e.prices.get(symbol).copied())
            .collect();
        if prices.is_empty() {
            continue;
        }

        let min_price = prices.iter().copied().min().expect("non-empty");
        let max_price = prices.iter().copied().max().expect("non-empty");

        let (mae, mfe) = match trade.entry.side {
            Side::Buy => (entry_price - min_price, max_price - entry_price),
            Side::Sell => (max_price - entry_price, entry_price - min_price),
        };

        out.push(TradeExcursion {
            entry_time,
            exit_time,
            pnl: trade.pnl,
            mae,
            mfe,
            side: trade.entry.side,
            is_win: trade.pnl > Decimal::ZERO,
        });
    }
    out
}

// ─── Friction sweep ──────────────────────────────────────────────────

/// One friction-multiplier run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionSweepPoint {
    pub multiplier: Decimal,
    pub final_equity: Decimal,
    pub net_pnl: Decimal,
    pub sharpe: Decimal,
    pub trade_count: usize,
}

/// Re-run the engine with scaled friction. Every run constructs fresh
/// components, so nothing leaks between multipliers.
pub fn run_friction_sweep(
    bars: &[Bar],
    make_strategy: &dyn Fn() -> Box<dyn Strategy>,
    base_config: &EngineConfig,
    multipliers: &[Decimal],
) -> Vec<FrictionSweepPoint> {
    let mut out = Vec::new();
    for &multiplier in multipliers {
        let config = EngineConfig {
            friction: base_config.friction.scaled(multiplier),
            ..base_config.clone()
        };
        let mut engine = Engine::new(make_strategy(), config.clone());
        let result = engine.run(bars.iter().cloned());

        let (net_pnl, sharpe, trade_count) = match compute(
            &result.equity_log,
            &result.fill_log,
            bars.first().map(|b| b.timeframe).unwrap_or(Timeframe::D1),
            Some(config.initial_cash),
        ) {
            Ok(m) => (m.net_pnl, m.sharpe_ratio, m.trade_count),
            Err(_) => (Decimal::ZERO, Decimal::ZERO, 0),
        };

        out.push(FrictionSweepPoint {
            multiplier,
            final_equity: result.final_equity,
            net_pnl,
            sharpe,
            trade_count,
        });
    }
    out
}
