//! Wilder's ADX trend-strength classifier, computed incrementally.
//!
//! Two-phase algorithm:
//! - Phase A: accumulate the first `period` raw TR / +DM / -DM values,
//!   then seed the smoothed sums.
//! - Phase B: Wilder smoothing `new = old - old/period + raw` per bar;
//!   DX from the DI pair; ADX seeded as the mean of the first `period` DX
//!   values and Wilder-smoothed afterwards.

use crate::domain::Bar;
use rust_decimal::Decimal;

/// Trend-strength buckets over ADX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendStrength {
    /// ADX < 20
    Ranging,
    /// 20 <= ADX < 25
    WeakTrend,
    /// 25 <= ADX < 40
    Trending,
    /// ADX >= 40
    StrongTrend,
}

#[derive(Debug, Clone)]
pub struct AdxClassifier {
    period: usize,
    // Phase A accumulators
    raw_tr: Vec<Decimal>,
    raw_plus_dm: Vec<Decimal>,
    raw_minus_dm: Vec<Decimal>,
    phase_a_done: bool,
    // Phase B smoothed sums
    smooth_tr: Decimal,
    smooth_plus_dm: Decimal,
    smooth_minus_dm: Decimal,
    // DI / ADX state
    plus_di: Decimal,
    minus_di: Decimal,
    dx_accumulator: Vec<Decimal>,
    adx: Decimal,
    adx_seeded: bool,
}

impl AdxClassifier {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            raw_tr: Vec::new(),
            raw_plus_dm: Vec::new(),
            raw_minus_dm: Vec::new(),
            phase_a_done: false,
            smooth_tr: Decimal::ZERO,
            smooth_plus_dm: Decimal::ZERO,
            smooth_minus_dm: Decimal::ZERO,
            plus_di: Decimal::ZERO,
            minus_di: Decimal::ZERO,
            dx_accumulator: Vec::new(),
            adx: Decimal::ZERO,
            adx_seeded: false,
        }
    }

    pub fn adx(&self) -> Decimal {
        self.adx
    }

    pub fn plus_di(&self) -> Decimal {
        self.plus_di
    }

    pub fn minus_di(&self) -> Decimal {
        self.minus_di
    }

    /// Feed a consecutive bar pair; returns the current ADX.
    pub fn update(&mut self, bar: &Bar, prev: &Bar) -> Decimal {
        let tr = bar.true_range(prev.close);
        let (plus_dm, minus_dm) = directional_movement(bar, prev);

        if self.phase_a_done {
            self.phase_b(tr, plus_dm, minus_dm);
        } else {
            self.phase_a(tr, plus_dm, minus_dm);
        }
        self.adx
    }

    /// Bucket the current ADX value.
    pub fn classify(&self) -> TrendStrength {
        if self.adx < Decimal::from(20) {
            TrendStrength::Ranging
        } else if self.adx < Decimal::from(25) {
            TrendStrength::WeakTrend
        } else if self.adx < Decimal::from(40) {
            TrendStrength::Trending
        } else {
            TrendStrength::StrongTrend
        }
    }

    fn phase_a(&mut self, tr: Decimal, plus_dm: Decimal, minus_dm: Decimal) {
        self.raw_tr.push(tr);
        self.raw_plus_dm.push(plus_dm);
        self.raw_minus_dm.push(minus_dm);
        if self.raw_tr.len() < self.period {
            return;
        }

        self.smooth_tr = self.raw_tr.iter().copied().sum();
        self.smooth_plus_dm = self.raw_plus_dm.iter().copied().sum();
        self.smooth_minus_dm = self.raw_minus_dm.iter().copied().sum();

        self.update_di();
        let dx = self.compute_dx();
        self.dx_accumulator.push(dx);

        self.phase_a_done = true;
        self.raw_tr.clear();
        self.raw_plus_dm.clear();
        self.raw_minus_dm.clear();
    }

    fn phase_b(&mut self, tr: Decimal, plus_dm: Decimal, minus_dm: Decimal) {
        let p = Decimal::from(self.period as u64);
        self.smooth_tr = self.smooth_tr - self.smooth_tr / p + tr;
        self.smooth_plus_dm = self.smooth_plus_dm - self.smooth_plus_dm / p + plus_dm;
        self.smooth_minus_dm = self.smooth_minus_dm - self.smooth_minus_dm / p + minus_dm;

        self.update_di();
        let dx = self.compute_dx();

        if self.adx_seeded {
            self.adx = (self.adx * (p - Decimal::ONE) + dx) / p;
        } else {
            self.dx_accumulator.push(dx);
            if self.dx_accumulator.len() >= self.period {
                self.adx = self.dx_accumulator.iter().copied().sum::<Decimal>() / p;
                self.adx_seeded = true;
                self.dx_accumulator.clear();
            }
        }
    }

    fn update_di(&mut self) {
        if self.smooth_tr == Decimal::ZERO {
            self.plus_di = Decimal::ZERO;
            self.minus_di = Decimal::ZERO;
            return;
        }
        self.plus_di = self.smooth_plus_dm / self.smooth_tr * Decimal::ONE_HUNDRED;
        self.minus_di = self.smooth_minus_dm / self.smooth_tr * Decimal::ONE_HUNDRED;
    }

    fn compute_dx(&self) -> Decimal {
        let di_sum = self.plus_di + self.minus_di;
        if di_sum == Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.plus_di - self.minus_di).abs() / di_sum * Decimal::ONE_HUNDRED
    }
}

fn directional_movement(bar: &Bar, prev: &Bar) -> (Decimal, Decimal) {
    let up_move = bar.high - prev.high;
    let down_move = prev.low - bar.low;

    let plus_dm = if up_move > down_move && up_move > Decimal::ZERO {
        up_move
    } else {
        Decimal::ZERO
    };
    let minus_dm = if down_move > up_move && down_move > Decimal::ZERO {
        down_move
    } else {
        Decimal::ZERO
    };
    (plus_dm, minus_dm)
}
