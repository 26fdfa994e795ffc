//! Bounded rolling window of historical bars.

use crate::domain::Bar;
use std::collections::VecDeque;

/// Append-only bounded sequence of the last N bars, oldest first.
///
/// Appending past the cap drops the oldest bar, so memory is bounded and a
/// strategy structurally cannot see further back than its window — and
/// never forward at all.
#[derive(Debug, Clone)]
pub struct BarBuffer {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl BarBuffer {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, bar: Bar) {
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bar by index from the front (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// Bar counted from the end (0 = newest).
    pub fn from_end(&self, k: usize) -> Option<&Bar> {
        self.bars.len().checked_sub(k + 1).and_then(|i| self.bars.get(i))
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Oldest-to-newest iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn bar(day: u32) -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: Decimal::from(day),
            high: Decimal::from(day),
            low: Decimal::from(day),
            close: Decimal::from(day),
            volume: 1000,
            timeframe: Timeframe::D1,
        }
    }

    #[test]
    fn push_past_capacity_drops_oldest() {
        let mut buf = BarBuffer::new(3);
        for day in 1..=5 {
            buf.push(bar(day));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.get(0).unwrap().close, Decimal::from(3));
        assert_eq!(buf.last().unwrap().close, Decimal::from(5));
    }

    #[test]
    fn from_end_counts_backwards() {
        let mut buf = BarBuffer::new(10);
        for day in 1..=4 {
            buf.push(bar(day));
        }
        assert_eq!(buf.from_end(0).unwrap().close, Decimal::from(4));
        assert_eq!(buf.from_end(3).unwrap().close, Decimal::from(1));
        assert!(buf.from_end(4).is_none());
    }

    #[test]
    fn iteration_is_oldest_first() {
        let mut buf = BarBuffer::new(10);
        for day in 1..=3 {
            buf.push(bar(day));
        }
        let closes: Vec<Decimal> = buf.iter().map(|b| b.close).collect();
        assert_eq!(
            closes,
            vec![Decimal::from(1), Decimal::from(2), Decimal::from(3)]
        );
    }
}
