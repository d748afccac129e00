//! Technical indicators over a price [`Series`](crate::domain::series::Series).
//!
//! An `Indicator` is built once and is read-only afterwards. Lookups for
//! points that have no defined value (the warmup window) return the
//! [`NO_VALUE`] sentinel instead of failing.

pub mod ema;

use chrono::NaiveDate;
use std::collections::HashMap;

/// Returned by lookups for points without a defined value.
pub const NO_VALUE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub name: String,
    pub period: usize,
    by_timestamp: HashMap<i64, f64>,
    by_date: HashMap<NaiveDate, f64>,
}

impl Indicator {
    pub fn new(name: String, period: usize) -> Self {
        Indicator {
            name,
            period,
            by_timestamp: HashMap::new(),
            by_date: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, timestamp: i64, date: NaiveDate, value: f64) {
        self.by_timestamp.insert(timestamp, value);
        self.by_date.insert(date, value);
    }

    pub fn get(&self, timestamp: i64) -> Option<f64> {
        self.by_timestamp.get(&timestamp).copied()
    }

    pub fn get_date(&self, date: NaiveDate) -> Option<f64> {
        self.by_date.get(&date).copied()
    }

    /// Value at `timestamp`, or [`NO_VALUE`].
    pub fn for_timestamp(&self, timestamp: i64) -> f64 {
        self.get(timestamp).unwrap_or(NO_VALUE)
    }

    /// Value on `date`, or [`NO_VALUE`].
    pub fn for_date(&self, date: NaiveDate) -> f64 {
        self.get_date(date).unwrap_or(NO_VALUE)
    }

    /// Number of points with a defined value.
    pub fn len(&self) -> usize {
        self.by_timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_timestamp.is_empty()
    }
}
