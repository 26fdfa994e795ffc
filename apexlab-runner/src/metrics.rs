//! Performance metrics — computed strictly post-loop from the equity and
//! fill logs.
//!
//! All ratio math stays in `Decimal`; the single f64 excursion is the
//! CAGR exponentiation, which is an output-boundary conversion.

use apexlab_core::domain::{Fill, Side, Timeframe};
use apexlab_core::portfolio::EquityEntry;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from metrics computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("empty equity log — cannot compute metrics")]
    EmptyEquityLog,
    #[error("need at least {needed} equity points for return series, got {got}")]
    InsufficientData { needed: usize, got: usize },
}

/// A paired round-trip trade extracted from the fill log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry: Fill,
    pub exit: Fill,
    /// Closed-quantity PnL net of both legs' commissions.
    pub pnl: Decimal,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    /// PnL net of the full friction on both legs (commission, slippage,
    /// half-spread), used by the Monte-Carlo resampler.
    pub fn pnl_after_all_friction(&self) -> Decimal {
        self.pnl - self.entry.slippage - self.entry.spread_cost - self.exit.slippage
            - self.exit.spread_cost
    }
}

/// Aggregate metrics for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub net_pnl: Decimal,
    pub total_return_pct: Decimal,
    pub cagr: Decimal,
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub calmar_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Longest underwater stretch, in bars.
    pub max_drawdown_duration: usize,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub expectancy: Decimal,
    pub trade_count: usize,
    /// Mean holding period in hours, at least 1 per trade.
    pub avg_holding_hours: u64,
    pub avg_rr: Decimal,
    pub exposure_pct: Decimal,
}

/// Compute all metrics from a run's logs.
pub fn compute(
    equity_log: &[EquityEntry],
    fill_log: &[Fill],
    timeframe: Timeframe,
    initial_equity: Option<Decimal>,
) -> Result<MetricsResult, MetricsError> {
    if equity_log.is_empty() {
        return Err(MetricsError::EmptyEquityLog);
    }

    let equities: Vec<Decimal> = equity_log.iter().map(|e| e.equity).collect();
    let initial = initial_equity.unwrap_or(equities[0]);
    let final_equity = *equities.last().expect("non-empty");
    let n_bars = equities.len();

    let net_pnl = final_equity - initial;
    let total_return_pct = if initial != Decimal::ZERO {
        net_pnl / initial * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    let returns = bar_returns(&equities);
    let ann_factor = timeframe.annualization();

    let sharpe_ratio = sharpe(&returns, ann_factor);
    let sortino_ratio = sortino(&returns, ann_factor);
    let (max_dd, max_dd_pct, max_dd_duration) = max_drawdown(&equities);
    let cagr = compute_cagr(initial, final_equity, n_bars, timeframe);
    // MDD% is in percent units, matching the reported drawdown figure.
    let calmar_ratio = if max_dd_pct != Decimal::ZERO {
        cagr / max_dd_pct.abs()
    } else {
        Decimal::ZERO
    };

    let trades = pair_round_trips(fill_log);
    let stats = trade_stats(&trades);

    Ok(MetricsResult {
        net_pnl,
        total_return_pct,
        cagr,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        max_drawdown: max_dd,
        max_drawdown_pct: max_dd_pct,
        max_drawdown_duration: max_dd_duration,
        win_rate: stats.win_rate,
        profit_factor: stats.profit_factor,
        expectancy: stats.expectancy,
        trade_count: trades.len(),
        avg_holding_hours: stats.avg_holding_hours,
        avg_rr: stats.avg_rr,
        exposure_pct: exposure(equity_log),
    })
}

/// Pair fills into round trips, one FIFO stack per symbol. An opposite-
/// side fill closes the oldest open fill for min(quantities); PnL nets
/// both legs' commissions.
pub fn pair_round_trips(fill_log: &[Fill]) -> Vec<TradeRecord> {
    let mut trades = Vec::new();
    let mut open: BTreeMap<String, Vec<Fill>> = BTreeMap::new();

    for fill in fill_log {
        let stack = open.entry(fill.symbol.clone()).or_default();
        match stack.first() {
            Some(first) if first.side != fill.side => {
                let entry = stack.remove(0);
                let qty = entry.quantity.min(fill.quantity);
                let mut pnl = match entry.side {
                    Side::Buy => (fill.fill_price - entry.fill_price) * qty,
                    Side::Sell => (entry.fill_price - fill.fill_price) * qty,
                };
                pnl -= fill.commission + entry.commission;
                trades.push(TradeRecord {
                    entry,
                    exit: fill.clone(),
                    pnl,
                });
            }
            _ => stack.push(fill.clone()),
        }
    }
    trades
}

/// Bar-to-bar return series; entries with a zero predecessor are skipped.
pub fn bar_returns(equities: &[Decimal]) -> Vec<Decimal> {
    equities
        .windows(2)
        .filter(|w| w[0] != Decimal::ZERO)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().copied().sum::<Decimal>() / Decimal::from(values.len() as u64)
}

/// Sample standard deviation (n - 1 denominator).
fn std_dev(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let m = mean(values);
    let variance = values
        .iter()
        .map(|v| (*v - m) * (*v - m))
        .sum::<Decimal>()
        / Decimal::from((values.len() - 1) as u64);
    variance.sqrt().unwrap_or(Decimal::ZERO)
}

fn sharpe(returns: &[Decimal], ann_factor: Decimal) -> Decimal {
    if returns.len() < 2 {
        return Decimal::ZERO;
    }
    let sd = std_dev(returns);
    if sd == Decimal::ZERO {
        return Decimal::ZERO;
    }
    mean(returns) / sd * ann_factor
}

fn sortino(returns: &[Decimal], ann_factor: Decimal) -> Decimal {
    if returns.len() < 2 {
        return Decimal::ZERO;
    }
    let downside: Vec<Decimal> = returns
        .iter()
        .copied()
        .filter(|r| *r < Decimal::ZERO)
        .collect();
    if downside.len() < 2 {
        return Decimal::ZERO;
    }
    let sd = std_dev(&downside);
    if sd == Decimal::ZERO {
        return Decimal::ZERO;
    }
    mean(returns) / sd * ann_factor
}

/// (absolute drawdown, percent of peak, duration in bars).
fn max_drawdown(equities: &[Decimal]) -> (Decimal, Decimal, usize) {
    let mut peak = equities[0];
    let mut max_dd = Decimal::ZERO;
    let mut max_dd_pct = Decimal::ZERO;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for &equity in equities {
        if equity > peak {
            peak = equity;
            current_duration = 0;
        } else {
            current_duration += 1;
        }

        let dd = peak - equity;
        if dd > max_dd {
            max_dd = dd;
        }
        if peak > Decimal::ZERO {
            let dd_pct = dd / peak * Decimal::ONE_HUNDRED;
            if dd_pct > max_dd_pct {
                max_dd_pct = dd_pct;
            }
        }
        if current_duration > max_duration {
            max_duration = current_duration;
        }
    }
    (max_dd, max_dd_pct, max_duration)
}

fn compute_cagr(
    initial: Decimal,
    final_equity: Decimal,
    n_bars: usize,
    timeframe: Timeframe,
) -> Decimal {
    if initial <= Decimal::ZERO || n_bars == 0 {
        return Decimal::ZERO;
    }
    let ratio = final_equity / initial;
    if ratio <= Decimal::ZERO {
        return Decimal::NEGATIVE_ONE;
    }
    let years = n_bars as f64 / timeframe.bars_per_year() as f64;
    if years <= 0.0 {
        return Decimal::ZERO;
    }

    // Output-boundary float excursion for the fractional power.
    let cagr = ratio.to_f64().unwrap_or(0.0).powf(1.0 / years) - 1.0;
    if !cagr.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(cagr)
        .map(|d| d.round_dp(6))
        .unwrap_or(Decimal::ZERO)
}

struct TradeStats {
    win_rate: Decimal,
    profit_factor: Decimal,
    expectancy: Decimal,
    avg_holding_hours: u64,
    avg_rr: Decimal,
}

fn trade_stats(trades: &[TradeRecord]) -> TradeStats {
    if trades.is_empty() {
        return TradeStats {
            win_rate: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            expectancy: Decimal::ZERO,
            avg_holding_hours: 0,
            avg_rr: Decimal::ZERO,
        };
    }

    let count = Decimal::from(trades.len() as u64);
    let wins: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_winner()).collect();
    let losses: Vec<&TradeRecord> = trades.iter().filter(|t| !t.is_winner()).collect();

    let total_wins: Decimal = wins.iter().map(|t| t.pnl).sum();
    let total_losses: Decimal = losses.iter().map(|t| t.pnl).sum::<Decimal>().abs();

    let win_rate = Decimal::from(wins.len() as u64) / count * Decimal::ONE_HUNDRED;
    let profit_factor = if total_losses > Decimal::ZERO {
        total_wins / total_losses
    } else {
        Decimal::ZERO
    };
    let expectancy = trades.iter().map(|t| t.pnl).sum::<Decimal>() / count;

    let total_hold_hours: i64 = trades
        .iter()
        .map(|t| (t.exit.timestamp - t.entry.timestamp).num_hours().max(1))
        .sum();
    let avg_holding_hours = (total_hold_hours / trades.len() as i64).max(0) as u64;

    let avg_win = if wins.is_empty() {
        Decimal::ZERO
    } else {
        total_wins / Decimal::from(wins.len() as u64)
    };
    let avg_loss = if losses.is_empty() {
        Decimal::ONE
    } else {
        total_losses / Decimal::from(losses.len() as u64)
    };
    let avg_rr = if avg_loss > Decimal::ZERO {
        avg_win / avg_loss
    } else {
        Decimal::ZERO
    };

    TradeStats {
        win_rate,
        profit_factor,
        expectancy,
        avg_holding_hours,
        avg_rr,
    }
}

/// Share of bars with an open position, detected as cash != equity.
fn exposure(equity_log: &[EquityEntry]) -> Decimal {
    if equity_log.is_empty() {
        return Decimal::ZERO;
    }
    let in_market = equity_log.iter().filter(|e| e.cash != e.equity).count();
    Decimal::from(in_market as u64) / Decimal::from(equity_log.len() as u64)
        * Decimal::ONE_HUNDRED
}
