//! Per-month popularity buckets
//!
//! Twelve counters indexed by calendar month (1 = January). Months outside
//! 1..=12 read as zero and are ignored on write.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonthlyCounts([i64; 12]);

impl MonthlyCounts {
    pub fn new(counts: [i64; 12]) -> Self {
        Self(counts)
    }

    fn slot(month: u32) -> Option<usize> {
        (1..=12).contains(&month).then(|| month as usize - 1)
    }

    pub fn get(&self, month: u32) -> i64 {
        Self::slot(month).map_or(0, |i| self.0[i])
    }

    pub fn set(&mut self, month: u32, value: i64) {
        if let Some(i) = Self::slot(month) {
            self.0[i] = value;
        }
    }

    pub fn increment(&mut self, month: u32) {
        if let Some(i) = Self::slot(month) {
            self.0[i] += 1;
        }
    }

    /// Sum of `months` buckets ending at `current`, wrapping into the
    /// previous year (`sum_recent(1, 3)` covers November, December, January).
    pub fn sum_recent(&self, current: u32, months: u32) -> i64 {
        if Self::slot(current).is_none() {
            return 0;
        }
        (0..months.min(12))
            .map(|back| (current + 12 - 1 - back) % 12 + 1)
            .map(|month| self.get(month))
            .sum()
    }

    /// Sum of every bucket
    pub fn total(&self) -> i64 {
        self.0.iter().sum()
    }

    pub fn as_array(&self) -> [i64; 12] {
        self.0
    }
}
