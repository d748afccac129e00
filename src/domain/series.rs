//! Time-indexed price series.
//!
//! Points are stored in insertion order, which is chronological order.
//! Dates are derived from millisecond timestamps in UTC and compared at day
//! granularity.

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "v")]
    pub value: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        PricePoint { timestamp, value }
    }

    /// Point stamped at midnight UTC of `date`.
    pub fn at_midnight(date: NaiveDate, value: f64) -> Self {
        PricePoint {
            timestamp: midnight_millis(date),
            value,
        }
    }

    pub fn date(&self) -> NaiveDate {
        DateTime::from_timestamp_millis(self.timestamp)
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }

    pub fn date_string(&self) -> String {
        format_date(self.date())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series {
    points: Vec<PricePoint>,
}

impl Series {
    pub fn new() -> Self {
        Series { points: Vec::new() }
    }

    pub fn from_points(points: Vec<PricePoint>) -> Self {
        Series { points }
    }

    /// Build from `(timestamp_ms, value)` pairs as returned by price providers.
    pub fn from_tuples(tuples: &[(i64, f64)]) -> Self {
        Series {
            points: tuples
                .iter()
                .map(|&(timestamp, value)| PricePoint { timestamp, value })
                .collect(),
        }
    }

    pub fn push(&mut self, point: PricePoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PricePoint> {
        self.points.iter()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Scan for the point on `date`. When several points share the date,
    /// the last one in the series wins.
    pub fn at_date(&self, date: NaiveDate) -> Option<&PricePoint> {
        self.points.iter().rev().find(|p| p.date() == date)
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a PricePoint;
    type IntoIter = std::slice::Iter<'a, PricePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl FromIterator<PricePoint> for Series {
    fn from_iter<I: IntoIterator<Item = PricePoint>>(iter: I) -> Self {
        Series {
            points: iter.into_iter().collect(),
        }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub fn midnight_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Absolute number of whole days between two dates.
pub fn diff_days(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn point_date_is_utc_day() {
        let p = PricePoint::at_midnight(date(2024, 3, 10), 1.0);
        assert_eq!(p.date(), date(2024, 3, 10));
        assert_eq!(p.date_string(), "2024-03-10");

        let late = PricePoint::new(p.timestamp + 23 * 3_600_000, 2.0);
        assert_eq!(late.date(), date(2024, 3, 10));
    }

    #[test]
    fn at_date_finds_point() {
        let series = Series::from_points(vec![
            PricePoint::at_midnight(date(2024, 1, 1), 10.0),
            PricePoint::at_midnight(date(2024, 1, 2), 11.0),
        ]);
        assert_eq!(series.at_date(date(2024, 1, 2)).unwrap().value, 11.0);
        assert!(series.at_date(date(2024, 1, 3)).is_none());
    }

    #[test]
    fn at_date_last_match_wins() {
        let day = date(2024, 1, 1);
        let series = Series::from_points(vec![
            PricePoint::at_midnight(day, 10.0),
            PricePoint::new(midnight_millis(day) + 3_600_000, 12.0),
            PricePoint::at_midnight(date(2024, 1, 2), 13.0),
        ]);
        assert_eq!(series.at_date(day).unwrap().value, 12.0);
    }

    #[test]
    fn from_tuples_keeps_order() {
        let series = Series::from_tuples(&[(1000, 1.0), (2000, 2.0)]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().unwrap().timestamp, 1000);
        assert_eq!(series.latest().unwrap().value, 2.0);
    }

    #[test]
    fn diff_days_is_absolute() {
        assert_eq!(diff_days(date(2024, 1, 1), date(2024, 1, 31)), 30);
        assert_eq!(diff_days(date(2024, 1, 31), date(2024, 1, 1)), 30);
    }

    #[test]
    fn serializes_as_ts_v_pairs() {
        let series = Series::from_tuples(&[(1000, 1.5)]);
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(json, r#"[{"ts":1000,"v":1.5}]"#);
    }

    #[test]
    fn parse_date_trims() {
        assert_eq!(parse_date(" 2021-07-01 "), Some(date(2021, 7, 1)));
        assert_eq!(parse_date("07/01/2021"), None);
    }
}
