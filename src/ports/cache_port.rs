//! Cache port.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::YieldtraderError;

/// How long a cached entry stays valid. Entries are bucketed by the current
/// hour, day or ISO week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidationPeriod {
    Hourly,
    #[default]
    Daily,
    Weekly,
}

impl FromStr for InvalidationPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hourly" => Ok(InvalidationPeriod::Hourly),
            "daily" => Ok(InvalidationPeriod::Daily),
            "weekly" => Ok(InvalidationPeriod::Weekly),
            other => Err(format!("unknown cache period '{other}'")),
        }
    }
}

impl fmt::Display for InvalidationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationPeriod::Hourly => write!(f, "hourly"),
            InvalidationPeriod::Daily => write!(f, "daily"),
            InvalidationPeriod::Weekly => write!(f, "weekly"),
        }
    }
}

pub trait CachePort {
    /// `Ok(None)` on a miss.
    fn get(
        &self,
        key: &str,
        period: InvalidationPeriod,
    ) -> Result<Option<String>, YieldtraderError>;

    fn set(
        &self,
        key: &str,
        value: &str,
        period: InvalidationPeriod,
    ) -> Result<(), YieldtraderError>;
}
