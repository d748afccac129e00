#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::Cell;
use std::collections::HashMap;
use yieldtrader::domain::error::YieldtraderError;
use yieldtrader::domain::market::{Fiat, Market};
use yieldtrader::domain::series::{PricePoint, Series};
use yieldtrader::ports::price_port::PricePort;

pub struct MockPricePort {
    pub markets: HashMap<String, Market>,
    pub errors: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            markets: HashMap::new(),
            errors: HashMap::new(),
            fetches: Cell::new(0),
        }
    }

    pub fn with_market(mut self, market: Market) -> Self {
        self.markets.insert(market.id.clone(), market);
        self
    }

    pub fn with_error(mut self, asset_id: &str, reason: &str) -> Self {
        self.errors.insert(asset_id.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_market(
        &self,
        asset_id: &str,
        _days: u32,
        currency: Fiat,
    ) -> Result<Market, YieldtraderError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(reason) = self.errors.get(asset_id) {
            return Err(YieldtraderError::Provider {
                asset: asset_id.to_string(),
                reason: reason.clone(),
            });
        }
        let mut market = self
            .markets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| YieldtraderError::Provider {
                asset: asset_id.to_string(),
                reason: "unknown asset".into(),
            })?;
        market.currency = currency;
        Ok(market)
    }

    fn list_assets(&self) -> Result<Vec<String>, YieldtraderError> {
        let mut ids: Vec<String> = self.markets.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One point per day starting at `start`.
pub fn daily_series(start: NaiveDate, prices: &[f64]) -> Series {
    prices
        .iter()
        .enumerate()
        .map(|(i, &v)| PricePoint::at_midnight(start + chrono::Days::new(i as u64), v))
        .collect()
}

pub fn make_market(id: &str, symbol: &str, start: NaiveDate, prices: &[f64]) -> Market {
    Market::new(id, symbol, symbol, Fiat::Usd, daily_series(start, prices))
}

pub fn constant_prices(value: f64, days: usize) -> Vec<f64> {
    vec![value; days]
}

/// Falls from 100 to 60 over `half` days, then climbs back to 100 and on to
/// 140 over `2 * half` days.
pub fn v_shaped_prices(half: usize) -> Vec<f64> {
    let step = 40.0 / half as f64;
    let mut prices: Vec<f64> = (0..=half).map(|i| 100.0 - step * i as f64).collect();
    prices.extend((1..=2 * half).map(|i| 60.0 + step * i as f64));
    prices
}

/// Rises from 100 to 140, then falls back to 60.
pub fn inverted_v_prices(half: usize) -> Vec<f64> {
    let step = 40.0 / half as f64;
    let mut prices: Vec<f64> = (0..=half).map(|i| 100.0 + step * i as f64).collect();
    prices.extend((1..=2 * half).map(|i| 140.0 - step * i as f64));
    prices
}
