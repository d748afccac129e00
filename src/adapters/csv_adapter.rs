//! CSV file price provider.
//!
//! Each asset lives in `<base>/<asset_id>_<currency>.csv` with the header
//! `date,price,market_cap,total_volume`. The last two columns may be empty
//! or missing.

use crate::domain::error::YieldtraderError;
use crate::domain::market::{Fiat, Market};
use crate::domain::series::{parse_date, PricePoint, Series};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
    currency: Fiat,
}

struct Row {
    date: NaiveDate,
    price: f64,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf, currency: Fiat) -> Self {
        Self {
            base_path,
            currency,
        }
    }

    fn csv_path(&self, asset_id: &str, currency: Fiat) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", asset_id, currency))
    }

    fn read_rows(&self, asset_id: &str, currency: Fiat) -> Result<Vec<Row>, YieldtraderError> {
        let provider_err = |reason: String| YieldtraderError::Provider {
            asset: asset_id.to_string(),
            reason,
        };

        let path = self.csv_path(asset_id, currency);
        let content = fs::read_to_string(&path)
            .map_err(|e| provider_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| provider_err(format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| provider_err("missing date column".into()))?;
            let date = parse_date(date_str)
                .ok_or_else(|| provider_err(format!("invalid date '{}'", date_str)))?;

            let price: f64 = record
                .get(1)
                .ok_or_else(|| provider_err("missing price column".into()))?
                .parse()
                .map_err(|e| provider_err(format!("invalid price value: {}", e)))?;

            let optional = |idx: usize, column: &str| -> Result<Option<f64>, YieldtraderError> {
                match record.get(idx) {
                    None | Some("") => Ok(None),
                    Some(v) => v
                        .parse()
                        .map(Some)
                        .map_err(|e| provider_err(format!("invalid {} value: {}", column, e))),
                }
            };

            rows.push(Row {
                date,
                price,
                market_cap: optional(2, "market_cap")?,
                total_volume: optional(3, "total_volume")?,
            });
        }

        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }
}

impl PricePort for CsvAdapter {
    fn fetch_market(
        &self,
        asset_id: &str,
        days: u32,
        currency: Fiat,
    ) -> Result<Market, YieldtraderError> {
        let rows = self.read_rows(asset_id, currency)?;
        let Some(last) = rows.last().map(|r| r.date) else {
            return Err(YieldtraderError::Provider {
                asset: asset_id.to_string(),
                reason: "no price rows".into(),
            });
        };
        let from = last - chrono::Days::new(days as u64);

        let mut market = Market::new(asset_id, asset_id, asset_id, currency, Series::new());
        for row in rows.iter().filter(|r| r.date >= from) {
            market.prices.push(PricePoint::at_midnight(row.date, row.price));
            if let Some(cap) = row.market_cap {
                market.market_caps.push(PricePoint::at_midnight(row.date, cap));
            }
            if let Some(vol) = row.total_volume {
                market.total_volumes.push(PricePoint::at_midnight(row.date, vol));
            }
        }

        tracing::debug!(
            asset = asset_id,
            points = market.prices.len(),
            "loaded prices from csv"
        );
        Ok(market)
    }

    fn list_assets(&self) -> Result<Vec<String>, YieldtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| YieldtraderError::Provider {
            asset: "*".into(),
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", self.currency);
        let mut assets = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(id) = name_str.strip_suffix(&suffix) {
                assets.push(id.to_string());
            }
        }

        assets.sort();
        Ok(assets)
    }
}
