//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1). The first n points seed the average with their SMA and get
//! no value of their own; every later point gets EMA[i] = P[i]*k + EMA[i-1]*(1-k),
//! walking forward in time from the oldest point.

use crate::domain::error::YieldtraderError;
use crate::domain::indicator::Indicator;
use crate::domain::series::Series;

pub fn calculate_ema(series: &Series, period: usize) -> Result<Indicator, YieldtraderError> {
    let name = format!("{}-Day EMA", period);
    if period == 0 || series.len() < period {
        return Err(YieldtraderError::InsufficientData {
            name,
            points: series.len(),
            period,
        });
    }

    let points = series.points();
    let k = 2.0 / (period as f64 + 1.0);
    let sum: f64 = points[..period].iter().map(|p| p.value).sum();
    let mut prev = sum / period as f64;

    let mut indicator = Indicator::new(name, period);
    for p in &points[period..] {
        let ema = p.value * k + prev * (1.0 - k);
        indicator.insert(p.timestamp, p.date(), ema);
        prev = ema;
    }

    tracing::trace!(
        name = %indicator.name,
        defined = indicator.len(),
        "computed indicator"
    );
    Ok(indicator)
}
