//! Two-asset constant-product liquidity pool farm.
//!
//! The pool keeps `units_a * units_b = k` and is rebalanced to the current
//! price ratio on every mutation, with no trading fees. Yield accrues on the
//! pool value at the current APR and is handed back to the caller on harvest,
//! who decides whether to compound it with [`LpFarm::add_lp`].

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::YieldtraderError;
use super::market::{Fiat, Market};
use super::series::diff_days;

/// Lowest value the APR may decay to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AprFloor {
    #[default]
    Zero,
    HalfInitial,
}

impl AprFloor {
    pub fn value(&self, initial_apr: f64) -> f64 {
        match self {
            AprFloor::Zero => 0.0,
            AprFloor::HalfInitial => initial_apr / 2.0,
        }
    }
}

impl FromStr for AprFloor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zero" | "0" => Ok(AprFloor::Zero),
            "half_initial" | "half" => Ok(AprFloor::HalfInitial),
            other => Err(format!("unknown apr floor '{other}'")),
        }
    }
}

impl fmt::Display for AprFloor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AprFloor::Zero => write!(f, "zero"),
            AprFloor::HalfInitial => write!(f, "half_initial"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySnapshot {
    pub date: NaiveDate,
    pub price_a: f64,
    pub price_b: f64,
    pub units_a: f64,
    pub units_b: f64,
    pub total_value: f64,
    pub hodl_value: f64,
    pub only_a_value: f64,
    pub only_b_value: f64,
    pub apr: f64,
}

impl HistorySnapshot {
    /// 1 - value / hodl value
    pub fn impermanent_loss(&self) -> f64 {
        if self.hodl_value > 0.0 {
            1.0 - self.total_value / self.hodl_value
        } else {
            0.0
        }
    }
}

/// One snapshot per date. A later write for a date replaces the earlier
/// one; dates are kept in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FarmHistory {
    by_date: HashMap<NaiveDate, HistorySnapshot>,
    order: Vec<NaiveDate>,
}

impl FarmHistory {
    pub fn record(&mut self, snapshot: HistorySnapshot) {
        let date = snapshot.date;
        if self.by_date.insert(date, snapshot).is_none() {
            if let Err(pos) = self.order.binary_search(&date) {
                self.order.insert(pos, date);
            }
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&HistorySnapshot> {
        self.by_date.get(&date)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.order
    }

    pub fn first(&self) -> Option<&HistorySnapshot> {
        self.order.first().and_then(|d| self.by_date.get(d))
    }

    pub fn last(&self) -> Option<&HistorySnapshot> {
        self.order.last().and_then(|d| self.by_date.get(d))
    }

    /// Snapshots in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = &HistorySnapshot> + '_ {
        self.order.iter().filter_map(|d| self.by_date.get(d))
    }
}

#[derive(Debug, Clone)]
pub struct LpFarm {
    a: Market,
    b: Market,
    currency: Fiat,
    initial_investment: f64,
    external_deposits: f64,
    start_date: NaiveDate,
    current_apr: f64,
    initial_apr: f64,
    apr_decay_per_day: f64,
    apr_floor: AprFloor,
    last_harvest_date: NaiveDate,
    units_a: f64,
    units_b: f64,
    initial_units_a: f64,
    initial_units_b: f64,
    total_value: f64,
    hodl_value: f64,
    history: FarmHistory,
}

impl LpFarm {
    /// Enter the pool on `start_date`, splitting `initial_investment` 50/50
    /// by value between both assets.
    pub fn new(
        a: Market,
        b: Market,
        currency: Fiat,
        initial_investment: f64,
        start_date: NaiveDate,
        apr: f64,
    ) -> Result<Self, YieldtraderError> {
        let (price_a, price_b) = prices_on(&a, &b, start_date)?;

        let units_a = initial_investment / 2.0 / price_a;
        let units_b = initial_investment / 2.0 / price_b;

        let mut farm = LpFarm {
            a,
            b,
            currency,
            initial_investment,
            external_deposits: 0.0,
            start_date,
            current_apr: apr,
            initial_apr: apr,
            apr_decay_per_day: 0.0,
            apr_floor: AprFloor::default(),
            last_harvest_date: start_date,
            units_a,
            units_b,
            initial_units_a: units_a,
            initial_units_b: units_b,
            total_value: 0.0,
            hodl_value: 0.0,
            history: FarmHistory::default(),
        };
        farm.rebalance(price_a, price_b);
        farm.snapshot(start_date, price_a, price_b);

        tracing::debug!(
            pair = %farm.pair_name(),
            %start_date,
            units_a = farm.units_a,
            units_b = farm.units_b,
            "entered pool"
        );
        Ok(farm)
    }

    /// APR lost per elapsed day at each harvest.
    pub fn set_apr_decay(&mut self, per_day: f64) {
        self.apr_decay_per_day = per_day;
    }

    pub fn set_apr_floor(&mut self, floor: AprFloor) {
        self.apr_floor = floor;
    }

    pub fn prices(&self, date: NaiveDate) -> Result<(f64, f64), YieldtraderError> {
        prices_on(&self.a, &self.b, date)
    }

    fn rebalance(&mut self, price_a: f64, price_b: f64) {
        let k = self.units_a * self.units_b;
        let ratio = price_a / price_b;

        self.units_a = (k / ratio).sqrt();
        self.units_b = (k * ratio).sqrt();

        self.total_value = self.units_a * price_a + self.units_b * price_b;
        self.hodl_value = self.initial_units_a * price_a + self.initial_units_b * price_b;
    }

    fn snapshot(&mut self, date: NaiveDate, price_a: f64, price_b: f64) {
        self.history.record(HistorySnapshot {
            date,
            price_a,
            price_b,
            units_a: self.units_a,
            units_b: self.units_b,
            total_value: self.total_value,
            hodl_value: self.hodl_value,
            only_a_value: self.initial_units_a * 2.0 * price_a,
            only_b_value: self.initial_units_b * 2.0 * price_b,
            apr: self.current_apr,
        });
    }

    /// Accrue yield since the last harvest and return it without depositing.
    ///
    /// On error the farm is left untouched.
    pub fn harvest(&mut self, date: NaiveDate) -> Result<f64, YieldtraderError> {
        if date <= self.start_date {
            return Err(YieldtraderError::InvalidHarvestOrder {
                date,
                previous: self.start_date,
                boundary: "start",
            });
        }
        if date <= self.last_harvest_date {
            return Err(YieldtraderError::InvalidHarvestOrder {
                date,
                previous: self.last_harvest_date,
                boundary: "last harvest",
            });
        }

        let days = diff_days(date, self.last_harvest_date);
        if days == 0 {
            return Ok(0.0);
        }

        let (price_a, price_b) = self.prices(date)?;

        if self.apr_decay_per_day > 0.0 {
            let floor = self.apr_floor.value(self.initial_apr);
            self.current_apr =
                (self.current_apr - self.apr_decay_per_day * days as f64).max(floor);
        }

        self.rebalance(price_a, price_b);
        let harvested = self.total_value * (self.current_apr / 100.0 / 365.0) * days as f64;
        self.last_harvest_date = date;
        self.snapshot(date, price_a, price_b);

        tracing::trace!(%date, days, apr = self.current_apr, harvested, "harvest");
        Ok(harvested)
    }

    /// Add `amount` of value to the pool, split 50/50 at the prices on
    /// `date`. `external` marks outside capital as opposed to compounded
    /// yield.
    pub fn add_lp(
        &mut self,
        date: NaiveDate,
        amount: f64,
        external: bool,
    ) -> Result<(), YieldtraderError> {
        let (price_a, price_b) = self.prices(date)?;

        self.units_a += amount / 2.0 / price_a;
        self.units_b += amount / 2.0 / price_b;
        if external {
            self.external_deposits += amount;
        }

        self.rebalance(price_a, price_b);
        self.snapshot(date, price_a, price_b);
        Ok(())
    }

    /// Harvest on every date and compound the yield straight back into the
    /// pool. When `monthly_investment` is positive, that much outside
    /// capital is added on the first harvest of each new calendar month.
    /// Returns the total yield harvested.
    pub fn compound(
        &mut self,
        dates: &[NaiveDate],
        monthly_investment: f64,
    ) -> Result<f64, YieldtraderError> {
        let Some(first) = dates.first() else {
            return Ok(0.0);
        };
        let mut current_month = first.month();
        let mut total = 0.0;

        for &date in dates {
            let harvested = self.harvest(date)?;
            self.add_lp(date, harvested, false)?;
            total += harvested;

            if date.month() != current_month {
                current_month = date.month();
                if monthly_investment > 0.0 {
                    self.add_lp(date, monthly_investment, true)?;
                }
            }
        }

        Ok(total)
    }

    pub fn pair_name(&self) -> String {
        format!(
            "{}/{}",
            self.a.symbol.to_uppercase(),
            self.b.symbol.to_uppercase()
        )
    }

    pub fn asset_a(&self) -> &Market {
        &self.a
    }

    pub fn asset_b(&self) -> &Market {
        &self.b
    }

    pub fn currency(&self) -> Fiat {
        self.currency
    }

    pub fn initial_investment(&self) -> f64 {
        self.initial_investment
    }

    pub fn external_deposits(&self) -> f64 {
        self.external_deposits
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn last_harvest_date(&self) -> NaiveDate {
        self.last_harvest_date
    }

    pub fn current_apr(&self) -> f64 {
        self.current_apr
    }

    pub fn initial_apr(&self) -> f64 {
        self.initial_apr
    }

    pub fn units(&self) -> (f64, f64) {
        (self.units_a, self.units_b)
    }

    pub fn initial_units(&self) -> (f64, f64) {
        (self.initial_units_a, self.initial_units_b)
    }

    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    pub fn hodl_value(&self) -> f64 {
        self.hodl_value
    }

    pub fn impermanent_loss(&self) -> f64 {
        if self.hodl_value > 0.0 {
            1.0 - self.total_value / self.hodl_value
        } else {
            0.0
        }
    }

    pub fn history(&self) -> &FarmHistory {
        &self.history
    }
}

fn prices_on(a: &Market, b: &Market, date: NaiveDate) -> Result<(f64, f64), YieldtraderError> {
    Ok((a.price_at(date)?.value, b.price_at(date)?.value))
}

/// Daily harvest dates after `start`, at most `days` of them, none after `until`.
pub fn harvest_dates(start: NaiveDate, days: u32, until: Option<NaiveDate>) -> Vec<NaiveDate> {
    (1..=days)
        .filter_map(|i| start.checked_add_days(chrono::Days::new(i as u64)))
        .take_while(|d| until.is_none_or(|u| *d <= u))
        .collect()
}

/// Per-day decay that takes `apr` to `final_apr` over `harvests` daily
/// harvests. Zero when no final APR is set.
pub fn apr_decay_for(apr: f64, final_apr: f64, harvests: usize) -> f64 {
    if final_apr > 0.0 && harvests > 0 {
        (apr - final_apr) / harvests as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::{PricePoint, Series};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn day(i: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 3, 1).unwrap() + chrono::Days::new(i)
    }

    fn market(symbol: &str, prices: &[f64]) -> Market {
        let series = prices
            .iter()
            .enumerate()
            .map(|(i, &v)| PricePoint::at_midnight(day(i as u64), v))
            .collect::<Series>();
        Market::new(symbol, symbol, symbol, Fiat::Usd, series)
    }

    fn proportional_pair() -> (Market, Market) {
        (
            market("aaa", &[10.0, 20.0, 30.0, 40.0, 50.0]),
            market("bbb", &[1.0, 2.0, 3.0, 4.0, 5.0]),
        )
    }

    #[test]
    fn construct_splits_investment_by_value() {
        let (a, b) = proportional_pair();
        let farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 0.0).unwrap();

        assert_eq!(farm.units(), (500.0, 5_000.0));
        assert_eq!(farm.initial_units(), (500.0, 5_000.0));
        assert_eq!(farm.total_value(), 10_000.0);
        assert_eq!(farm.history().len(), 1);
        assert_eq!(farm.last_harvest_date(), day(0));
    }

    #[test]
    fn construct_without_price_fails() {
        let (a, b) = proportional_pair();
        let err = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(9), 0.0).unwrap_err();
        assert!(matches!(err, YieldtraderError::PriceNotFound { .. }));
    }

    #[test]
    fn proportional_move_has_no_impermanent_loss() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 0.0).unwrap();

        let harvested = farm.harvest(day(1)).unwrap();

        assert_eq!(harvested, 0.0);
        assert_eq!(farm.units(), farm.initial_units());
        assert_eq!(farm.total_value(), 20_000.0);
        assert_eq!(farm.impermanent_loss(), 0.0);
    }

    #[test]
    fn compounding_365_apr_for_one_day_adds_one_percent() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 365.0).unwrap();

        let harvested = farm.harvest(day(1)).unwrap();
        assert_relative_eq!(harvested, 200.0, max_relative = 1e-12);

        farm.add_lp(day(1), harvested, false).unwrap();

        let (units_a, units_b) = farm.units();
        assert_relative_eq!(units_a, 500.0 * 1.01, max_relative = 1e-12);
        assert_relative_eq!(units_b, 5_000.0 * 1.01, max_relative = 1e-12);
        assert_relative_eq!(farm.total_value(), 20_200.0, max_relative = 1e-12);
        assert_eq!(farm.external_deposits(), 0.0);
    }

    #[test]
    fn volatile_stable_pair_impermanent_loss() {
        let a = market("aaa", &[10.0, 20.0, 30.0, 40.0, 50.0]);
        let b = market("bbb", &[1.0, 1.0, 1.0, 1.0, 1.0]);
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 0.0).unwrap();

        farm.harvest(day(1)).unwrap();

        let (units_a, units_b) = farm.units();
        assert_eq!(units_a.round(), 354.0);
        assert_eq!(units_b.round(), 7_071.0);
        assert_eq!(farm.total_value().round(), 14_142.0);
        assert_eq!(farm.hodl_value(), 15_000.0);
        assert_relative_eq!(farm.impermanent_loss(), 0.0572, epsilon = 1e-4);
    }

    #[test]
    fn harvest_on_or_before_start_rejected() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(1), 0.0).unwrap();

        for date in [day(0), day(1)] {
            let err = farm.harvest(date).unwrap_err();
            assert!(matches!(
                err,
                YieldtraderError::InvalidHarvestOrder {
                    boundary: "start",
                    ..
                }
            ));
        }
    }

    #[test]
    fn harvest_not_after_last_harvest_rejected() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 100.0).unwrap();
        farm.harvest(day(2)).unwrap();

        let err = farm.harvest(day(1)).unwrap_err();
        assert!(matches!(
            err,
            YieldtraderError::InvalidHarvestOrder {
                boundary: "last harvest",
                ..
            }
        ));
        assert!(farm.harvest(day(2)).is_err());
    }

    #[test]
    fn failed_harvest_leaves_state_unchanged() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 100.0).unwrap();
        farm.set_apr_decay(1.0);

        let err = farm.harvest(day(30)).unwrap_err();
        assert!(matches!(err, YieldtraderError::PriceNotFound { .. }));
        assert_eq!(farm.current_apr(), 100.0);
        assert_eq!(farm.last_harvest_date(), day(0));
        assert_eq!(farm.history().len(), 1);
    }

    #[test]
    fn harvest_over_several_days_scales_yield_and_decay() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 365.0).unwrap();
        farm.set_apr_decay(10.0);

        let harvested = farm.harvest(day(3)).unwrap();
        // APR 365 - 10*3 = 335, value 40,000, 3 days
        assert_relative_eq!(farm.current_apr(), 335.0);
        assert_relative_eq!(harvested, 40_000.0 * 3.35 / 365.0 * 3.0, max_relative = 1e-12);
    }

    #[test]
    fn apr_decay_floors_at_zero() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 10.0).unwrap();
        farm.set_apr_decay(8.0);

        farm.harvest(day(1)).unwrap();
        assert_relative_eq!(farm.current_apr(), 2.0);
        farm.harvest(day(2)).unwrap();
        assert_eq!(farm.current_apr(), 0.0);
        assert_eq!(farm.harvest(day(3)).unwrap(), 0.0);
    }

    #[test]
    fn apr_decay_floors_at_half_initial() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 100.0).unwrap();
        farm.set_apr_decay(30.0);
        farm.set_apr_floor(AprFloor::HalfInitial);

        farm.harvest(day(1)).unwrap();
        assert_relative_eq!(farm.current_apr(), 70.0);
        farm.harvest(day(2)).unwrap();
        assert_relative_eq!(farm.current_apr(), 50.0);
    }

    #[test]
    fn same_date_snapshot_is_overwritten() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 365.0).unwrap();

        let harvested = farm.harvest(day(1)).unwrap();
        let before = farm.history().get(day(1)).unwrap().total_value;
        farm.add_lp(day(1), harvested, false).unwrap();

        assert_eq!(farm.history().len(), 2);
        let after = farm.history().get(day(1)).unwrap().total_value;
        assert!(after > before);
        assert_eq!(farm.history().last().unwrap().date, day(1));
    }

    #[test]
    fn add_lp_external_tracks_deposits() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 0.0).unwrap();

        farm.add_lp(day(2), 3_000.0, true).unwrap();
        assert_eq!(farm.external_deposits(), 3_000.0);
        assert_relative_eq!(farm.total_value(), 30_000.0 + 3_000.0);
        assert!(farm.add_lp(day(20), 1.0, true).is_err());
    }

    #[test]
    fn snapshot_only_values() {
        let a = market("aaa", &[10.0, 20.0]);
        let b = market("bbb", &[1.0, 1.0]);
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 0.0).unwrap();
        farm.harvest(day(1)).unwrap();

        let snap = farm.history().get(day(1)).unwrap();
        assert_eq!(snap.only_a_value, 20_000.0);
        assert_eq!(snap.only_b_value, 10_000.0);
        assert_eq!(snap.price_a, 20.0);
    }

    #[test]
    fn history_keeps_chronological_order() {
        let mut history = FarmHistory::default();
        for d in [day(3), day(1), day(2), day(1)] {
            history.record(HistorySnapshot {
                date: d,
                price_a: 1.0,
                price_b: 1.0,
                units_a: 1.0,
                units_b: 1.0,
                total_value: 2.0,
                hodl_value: 2.0,
                only_a_value: 2.0,
                only_b_value: 2.0,
                apr: 0.0,
            });
        }
        assert_eq!(history.dates(), &[day(1), day(2), day(3)]);
        assert_eq!(history.iter().count(), 3);
        assert_eq!(history.first().unwrap().date, day(1));
    }

    #[test]
    fn compound_adds_monthly_investment_on_month_change() {
        let prices: Vec<f64> = vec![1.0; 70];
        let a = market("aaa", &prices);
        let b = market("bbb", &prices);
        // day(0) = 2022-03-01, harvests through 2022-05-09
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 1_000.0, day(0), 0.0).unwrap();

        let dates = harvest_dates(day(0), 69, None);
        farm.compound(&dates, 100.0).unwrap();

        // April and May
        assert_eq!(farm.external_deposits(), 200.0);
        assert_relative_eq!(farm.total_value(), 1_200.0, max_relative = 1e-12);
        assert_eq!(farm.history().len(), 70);
    }

    #[test]
    fn compound_stops_on_missing_price() {
        let (a, b) = proportional_pair();
        let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 0.0).unwrap();
        let dates = harvest_dates(day(0), 10, None);
        assert!(farm.compound(&dates, 0.0).is_err());
        assert_eq!(farm.last_harvest_date(), day(4));
    }

    #[test]
    fn harvest_dates_respects_until() {
        let dates = harvest_dates(day(0), 10, Some(day(3)));
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
        assert_eq!(harvest_dates(day(0), 0, None), Vec::<NaiveDate>::new());
    }

    #[test]
    fn apr_decay_schedule() {
        assert_relative_eq!(apr_decay_for(100.0, 40.0, 60), 1.0);
        assert_eq!(apr_decay_for(100.0, 0.0, 60), 0.0);
        assert_eq!(apr_decay_for(100.0, 40.0, 0), 0.0);
    }

    #[test]
    fn apr_floor_parses() {
        assert_eq!("zero".parse::<AprFloor>().unwrap(), AprFloor::Zero);
        assert_eq!("half_initial".parse::<AprFloor>().unwrap(), AprFloor::HalfInitial);
        assert!("quarter".parse::<AprFloor>().is_err());
    }

    proptest! {
        #[test]
        fn rebalance_preserves_k(
            pa in 0.1f64..1000.0,
            pb in 0.1f64..1000.0,
        ) {
            let a = market("aaa", &[10.0, pa]);
            let b = market("bbb", &[1.0, pb]);
            let mut farm = LpFarm::new(a, b, Fiat::Usd, 10_000.0, day(0), 0.0).unwrap();
            let (ua, ub) = farm.units();
            let k = ua * ub;

            farm.harvest(day(1)).unwrap();

            let (ua, ub) = farm.units();
            prop_assert!(((ua * ub) - k).abs() / k < 1e-9);
            // A constant-product position never beats holding.
            prop_assert!(farm.total_value() <= farm.hodl_value() * (1.0 + 1e-12));
        }
    }
}
