//! Chart-ready series and summaries built from simulation results.
//!
//! Everything here is presentation-agnostic: renderers receive `ChartData`
//! with one x-axis of dates and any number of equally long named series.

use chrono::NaiveDate;
use serde::Serialize;

use super::farm::LpFarm;
use super::indicator::Indicator;
use super::series::{format_date, Series};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    pub name: String,
    /// Legend text; may carry the final value and P/L.
    pub label: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub title: String,
    pub subtitle: String,
    pub dates: Vec<String>,
    pub series: Vec<NamedSeries>,
}

impl ChartData {
    /// Every series has one value per date.
    pub fn is_aligned(&self) -> bool {
        self.series.iter().all(|s| s.values.len() == self.dates.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FarmSummary {
    pub pair: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub starting_apr: f64,
    pub final_apr: f64,
    pub initial_investment: f64,
    pub external_deposits: f64,
    pub farm_value: f64,
    pub hodl_value: f64,
    pub only_a_value: f64,
    pub only_b_value: f64,
    pub impermanent_loss: f64,
}

impl FarmSummary {
    fn pl(&self, value: f64) -> f64 {
        if self.initial_investment > 0.0 {
            value / self.initial_investment - 1.0
        } else {
            0.0
        }
    }

    pub fn farm_pl(&self) -> f64 {
        self.pl(self.farm_value)
    }

    pub fn hodl_pl(&self) -> f64 {
        self.pl(self.hodl_value)
    }

    pub fn only_a_pl(&self) -> f64 {
        self.pl(self.only_a_value)
    }

    pub fn only_b_pl(&self) -> f64 {
        self.pl(self.only_b_value)
    }
}

pub fn farm_summary(farm: &LpFarm) -> Option<FarmSummary> {
    let history = farm.history();
    let first = history.first()?;
    let last = history.last()?;
    Some(FarmSummary {
        pair: farm.pair_name(),
        first_date: first.date,
        last_date: last.date,
        starting_apr: first.apr,
        final_apr: last.apr,
        initial_investment: farm.initial_investment(),
        external_deposits: farm.external_deposits(),
        farm_value: last.total_value,
        hodl_value: last.hodl_value,
        only_a_value: last.only_a_value,
        only_b_value: last.only_b_value,
        impermanent_loss: last.impermanent_loss(),
    })
}

fn legend(name: &str, value: f64, pl: f64) -> String {
    format!("{}: {:.0} ({:.0}%)", name, value, pl * 100.0)
}

/// Farm, HODL, only-A and only-B value per history date.
pub fn farm_chart(farm: &LpFarm) -> ChartData {
    let history: Vec<_> = farm.history().iter().collect();
    let dates = history.iter().map(|h| format_date(h.date)).collect();

    let only_a = format!("Only {}", farm.asset_a().symbol.to_uppercase());
    let only_b = format!("Only {}", farm.asset_b().symbol.to_uppercase());

    let (title, subtitle, labels) = match farm_summary(farm) {
        Some(s) => (
            format!(
                "Yield Farming {} LP  --  [{} - {}]",
                s.pair,
                format_date(s.first_date),
                format_date(s.last_date)
            ),
            format!(
                "Starting APR: {:.0}% , Final APR: {:.0}% , Initial Investment: {:.0} {}",
                s.starting_apr,
                s.final_apr,
                s.initial_investment,
                farm.currency().to_string().to_uppercase()
            ),
            [
                legend("Farm", s.farm_value, s.farm_pl()),
                legend("HODL", s.hodl_value, s.hodl_pl()),
                legend(&only_a, s.only_a_value, s.only_a_pl()),
                legend(&only_b, s.only_b_value, s.only_b_pl()),
            ],
        ),
        None => (
            format!("Yield Farming {} LP", farm.pair_name()),
            String::new(),
            [
                "Farm".to_string(),
                "HODL".to_string(),
                only_a.clone(),
                only_b.clone(),
            ],
        ),
    };
    let [farm_label, hodl_label, only_a_label, only_b_label] = labels;

    let series = vec![
        NamedSeries {
            name: "Farm".into(),
            label: farm_label,
            values: history.iter().map(|h| h.total_value).collect(),
        },
        NamedSeries {
            name: "HODL".into(),
            label: hodl_label,
            values: history.iter().map(|h| h.hodl_value).collect(),
        },
        NamedSeries {
            name: only_a,
            label: only_a_label,
            values: history.iter().map(|h| h.only_a_value).collect(),
        },
        NamedSeries {
            name: only_b,
            label: only_b_label,
            values: history.iter().map(|h| h.only_b_value).collect(),
        },
    ];

    ChartData {
        title,
        subtitle,
        dates,
        series,
    }
}

/// Price with indicator overlays; undefined indicator points are NaN.
pub fn indicator_chart(title: &str, prices: &Series, indicators: &[&Indicator]) -> ChartData {
    let dates = prices.iter().map(|p| p.date_string()).collect();
    let mut series = vec![NamedSeries {
        name: "Price".into(),
        label: "Price".into(),
        values: prices.iter().map(|p| p.value).collect(),
    }];
    for ind in indicators {
        series.push(NamedSeries {
            name: ind.name.clone(),
            label: ind.name.clone(),
            values: prices
                .iter()
                .map(|p| ind.get(p.timestamp).unwrap_or(f64::NAN))
                .collect(),
        });
    }

    ChartData {
        title: title.to_string(),
        subtitle: String::new(),
        dates,
        series,
    }
}
