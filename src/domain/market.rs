//! Market records handed over by price providers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::YieldtraderError;
use super::series::{PricePoint, Series};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fiat {
    #[default]
    Usd,
    Eur,
}

impl fmt::Display for Fiat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fiat::Usd => write!(f, "usd"),
            Fiat::Eur => write!(f, "eur"),
        }
    }
}

impl FromStr for Fiat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "usd" => Ok(Fiat::Usd),
            "eur" => Ok(Fiat::Eur),
            other => Err(format!("unsupported currency '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub currency: Fiat,
    pub prices: Series,
    #[serde(default)]
    pub market_caps: Series,
    #[serde(default)]
    pub total_volumes: Series,
}

impl Market {
    pub fn new(id: &str, symbol: &str, name: &str, currency: Fiat, prices: Series) -> Self {
        Market {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            currency,
            prices,
            market_caps: Series::new(),
            total_volumes: Series::new(),
        }
    }

    /// Price on `date`, or `PriceNotFound` naming this market's symbol.
    pub fn price_at(&self, date: NaiveDate) -> Result<&PricePoint, YieldtraderError> {
        self.prices
            .at_date(date)
            .ok_or_else(|| YieldtraderError::PriceNotFound {
                asset: self.symbol.clone(),
                date,
            })
    }
}
