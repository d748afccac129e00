//! Synthetic price paths and forecast scenarios.
//!
//! A path is driven by a cyclic list of [`PriceChangeSegment`]s. Each segment
//! moves the price linearly towards `price * (1 ± pct/100)` over its day
//! count; after the last segment the list starts over from the first.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::YieldtraderError;
use super::farm::{apr_decay_for, harvest_dates, AprFloor, LpFarm};
use super::market::{Fiat, Market};
use super::series::{format_date, PricePoint, Series};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceChangeSegment {
    pub increase_pct: f64,
    pub increase_days: u32,
    pub decrease_pct: f64,
    pub decrease_days: u32,
}

impl PriceChangeSegment {
    pub fn increase(pct: f64, days: u32) -> Self {
        PriceChangeSegment {
            increase_pct: pct,
            increase_days: days,
            ..Default::default()
        }
    }

    pub fn decrease(pct: f64, days: u32) -> Self {
        PriceChangeSegment {
            decrease_pct: pct,
            decrease_days: days,
            ..Default::default()
        }
    }

    /// Target price and day count starting from `price`, or `None` when
    /// neither direction is active.
    fn target(&self, price: f64) -> Option<(f64, u32)> {
        if self.increase_pct > 0.0 && self.increase_days > 0 {
            Some((price * (1.0 + self.increase_pct / 100.0), self.increase_days))
        } else if self.decrease_pct > 0.0 && self.decrease_days > 0 {
            Some((price * (1.0 - self.decrease_pct / 100.0), self.decrease_days))
        } else {
            None
        }
    }
}

/// Parses `+20:5` (up 20% over 5 days) or `-20:5`.
impl FromStr for PriceChangeSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (pct, days) = s
            .split_once(':')
            .ok_or_else(|| format!("segment '{s}' must look like +PCT:DAYS or -PCT:DAYS"))?;
        let days: u32 = days
            .trim()
            .parse()
            .map_err(|_| format!("invalid day count in segment '{s}'"))?;
        let pct = pct.trim();
        let (increase, magnitude) = match pct.strip_prefix('-') {
            Some(rest) => (false, rest),
            None => (true, pct.strip_prefix('+').unwrap_or(pct)),
        };
        let magnitude: f64 = magnitude
            .parse()
            .map_err(|_| format!("invalid percentage in segment '{s}'"))?;
        if !(magnitude >= 0.0) {
            return Err(format!("invalid percentage in segment '{s}'"));
        }
        Ok(if increase {
            PriceChangeSegment::increase(magnitude, days)
        } else {
            PriceChangeSegment::decrease(magnitude, days)
        })
    }
}

pub fn parse_segments(s: &str) -> Result<Vec<PriceChangeSegment>, String> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// One point per day for `days + 1` days, day 0 at `start_price`. The path
/// stops at the last representable date.
pub fn generate_series(
    segments: &[PriceChangeSegment],
    start_price: f64,
    start_date: NaiveDate,
    days: u32,
) -> Series {
    let mut series = Series::new();
    let mut price = start_price;
    let mut started = 0usize;
    let mut delta = 0.0;
    let mut remaining = 0u32;

    for day in 0..=days {
        if day > 0 && !segments.is_empty() {
            if remaining == 0 {
                let segment = segments[started % segments.len()];
                started += 1;
                if let Some((target, seg_days)) = segment.target(price) {
                    remaining = seg_days;
                    delta = (target - price) / seg_days as f64;
                }
            }

            if remaining > 0 {
                remaining -= 1;
                price += delta;
            }
        }

        let Some(date) = start_date.checked_add_days(Days::new(day as u64)) else {
            break;
        };
        series.push(PricePoint::at_midnight(date, price));
    }

    series
}

/// Terms of one farm inside a forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct FarmScenario {
    pub name: Option<String>,
    pub apr: f64,
    /// APR reached at the final harvest; ignored when not positive.
    pub final_apr: f64,
    pub apr_floor: AprFloor,
    pub monthly_investment: f64,
}

impl FarmScenario {
    pub fn new(apr: f64) -> Self {
        FarmScenario {
            name: None,
            apr,
            final_apr: 0.0,
            apr_floor: AprFloor::default(),
            monthly_investment: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForecastFarm {
    pub name: String,
    pub farm: LpFarm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub name: String,
    pub date: String,
    pub price_a: f64,
    pub price_b: f64,
    pub units_a: f64,
    pub units_b: f64,
    pub value: f64,
    pub hodl: f64,
    pub only_a: f64,
    pub only_b: f64,
    pub apr: f64,
}

pub const FORECAST_COLUMNS: [&str; 11] = [
    "Name", "Date", "Price A", "Price B", "Units A", "Units B", "Value", "HODL", "Only A",
    "Only B", "APR",
];

#[derive(Debug, Clone)]
pub struct Forecast {
    pub currency: Fiat,
    pub initial_investment: f64,
    pub start_date: NaiveDate,
    pub days: u32,
    farms: Vec<ForecastFarm>,
}

impl Forecast {
    pub fn new(currency: Fiat, initial_investment: f64, start_date: NaiveDate, days: u32) -> Self {
        Forecast {
            currency,
            initial_investment,
            start_date,
            days,
            farms: Vec::new(),
        }
    }

    pub fn create_market(
        &self,
        name: &str,
        symbol: &str,
        start_price: f64,
        segments: &[PriceChangeSegment],
    ) -> Market {
        let prices = generate_series(segments, start_price, self.start_date, self.days);
        Market::new(symbol, symbol, name, self.currency, prices)
    }

    /// Enter a farm on the start date and harvest/compound it daily for the
    /// whole forecast.
    pub fn add_lp_farm(
        &mut self,
        a: &Market,
        b: &Market,
        scenario: &FarmScenario,
    ) -> Result<&ForecastFarm, YieldtraderError> {
        let mut farm = LpFarm::new(
            a.clone(),
            b.clone(),
            self.currency,
            self.initial_investment,
            self.start_date,
            scenario.apr,
        )?;

        let dates = harvest_dates(self.start_date, self.days, None);
        farm.set_apr_decay(apr_decay_for(scenario.apr, scenario.final_apr, dates.len()));
        farm.set_apr_floor(scenario.apr_floor);
        farm.compound(&dates, scenario.monthly_investment)?;

        let name = scenario.name.clone().unwrap_or_else(|| farm.pair_name());
        tracing::debug!(%name, value = farm.total_value(), "forecast farm complete");

        self.farms.push(ForecastFarm { name, farm });
        Ok(&self.farms[self.farms.len() - 1])
    }

    pub fn farms(&self) -> &[ForecastFarm] {
        &self.farms
    }

    /// Rows ordered by date, then by the order farms were added.
    pub fn rows(&self) -> Vec<ForecastRow> {
        let mut dates: Vec<NaiveDate> = self
            .farms
            .iter()
            .flat_map(|f| f.farm.history().dates().iter().copied())
            .collect();
        dates.sort();
        dates.dedup();

        let mut rows = Vec::new();
        for date in dates {
            for f in &self.farms {
                if let Some(h) = f.farm.history().get(date) {
                    rows.push(ForecastRow {
                        name: f.name.clone(),
                        date: format_date(h.date),
                        price_a: h.price_a,
                        price_b: h.price_b,
                        units_a: h.units_a,
                        units_b: h.units_b,
                        value: h.total_value,
                        hodl: h.hodl_value,
                        only_a: h.only_a_value,
                        only_b: h.only_b_value,
                        apr: h.apr,
                    });
                }
            }
        }
        rows
    }

    /// Table as a JSON array of arrays, header row first.
    pub fn to_json(&self) -> Result<String, YieldtraderError> {
        let mut table = vec![serde_json::json!(FORECAST_COLUMNS)];
        for r in self.rows() {
            table.push(serde_json::json!([
                r.name, r.date, r.price_a, r.price_b, r.units_a, r.units_b, r.value, r.hodl,
                r.only_a, r.only_b, r.apr
            ]));
        }
        serde_json::to_string_pretty(&table).map_err(|e| YieldtraderError::Render {
            reason: format!("could not encode forecast: {e}"),
        })
    }
}
