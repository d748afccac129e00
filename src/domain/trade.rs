//! Trade intents emitted by strategies.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::error::YieldtraderError;
use super::market::{Fiat, Market};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// An instruction to trade `size_pct` percent of the available balance:
/// fiat for buys, units for sells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeIntent {
    pub side: Side,
    pub date: NaiveDate,
    pub size_pct: f64,
    pub price: f64,
    pub currency: Fiat,
}

impl TradeIntent {
    pub fn new(
        side: Side,
        date: NaiveDate,
        size_pct: f64,
        price: f64,
        currency: Fiat,
    ) -> Result<Self, YieldtraderError> {
        validate_size(size_pct)?;
        Ok(TradeIntent {
            side,
            date,
            size_pct,
            price,
            currency,
        })
    }

    /// Intent priced at the market's close on `date`.
    pub fn at_date(
        side: Side,
        date: NaiveDate,
        size_pct: f64,
        market: &Market,
    ) -> Result<Self, YieldtraderError> {
        validate_size(size_pct)?;
        let price = market.price_at(date)?.value;
        Ok(TradeIntent {
            side,
            date,
            size_pct,
            price,
            currency: market.currency,
        })
    }

    pub fn fraction(&self) -> f64 {
        self.size_pct / 100.0
    }
}

pub fn validate_size(size_pct: f64) -> Result<(), YieldtraderError> {
    if !(size_pct > 0.0 && size_pct <= 100.0) {
        return Err(YieldtraderError::InvalidTradeSize { size: size_pct });
    }
    Ok(())
}
