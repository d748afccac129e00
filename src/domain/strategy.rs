//! EMA crossover strategy.
//!
//! - short crosses above long (from below): buy
//! - short crosses below long (from above): sell
//!
//! Points where either indicator has no value are skipped, and the first
//! eligible point only primes the previous values, so a signal needs two
//! consecutive eligible points.

use chrono::NaiveDate;

use crate::domain::error::YieldtraderError;
use crate::domain::indicator::{Indicator, NO_VALUE};
use crate::domain::market::{Fiat, Market};
use crate::domain::series::Series;
use crate::domain::trade::{validate_size, Side, TradeIntent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossover {
    pub side: Side,
    pub date: NaiveDate,
    pub timestamp: i64,
    pub price: f64,
    pub short: f64,
    pub long: f64,
}

#[derive(Debug, Clone)]
pub struct CrossoverStrategy<'a> {
    pub short: &'a Indicator,
    pub long: &'a Indicator,
    pub size_pct: f64,
}

impl<'a> CrossoverStrategy<'a> {
    /// Trades the full balance on every signal.
    pub fn new(short: &'a Indicator, long: &'a Indicator) -> Self {
        CrossoverStrategy {
            short,
            long,
            size_pct: 100.0,
        }
    }

    pub fn with_size(mut self, size_pct: f64) -> Result<Self, YieldtraderError> {
        validate_size(size_pct)?;
        self.size_pct = size_pct;
        Ok(self)
    }

    pub fn name(&self) -> String {
        format!("{}/{} CrossOver", self.short.name, self.long.name)
    }

    /// Crossing events over `series`, in chronological order.
    pub fn crossovers(&self, series: &Series) -> Vec<Crossover> {
        let mut events = Vec::new();
        let mut last: Option<(f64, f64)> = None;

        for p in series {
            let short = self.short.for_timestamp(p.timestamp);
            let long = self.long.for_timestamp(p.timestamp);
            if short == NO_VALUE || long == NO_VALUE {
                continue;
            }

            if let Some((last_short, last_long)) = last {
                let side = if last_short < last_long && short > long {
                    Some(Side::Buy)
                } else if last_short > last_long && short < long {
                    Some(Side::Sell)
                } else {
                    None
                };

                if let Some(side) = side {
                    tracing::debug!(%side, date = %p.date(), short, long, "crossover");
                    events.push(Crossover {
                        side,
                        date: p.date(),
                        timestamp: p.timestamp,
                        price: p.value,
                        short,
                        long,
                    });
                }
            }

            last = Some((short, long));
        }

        events
    }

    /// Intents priced at the crossing point of `series` itself.
    pub fn intents(&self, series: &Series, currency: Fiat) -> Vec<TradeIntent> {
        self.crossovers(series)
            .into_iter()
            .map(|c| TradeIntent {
                side: c.side,
                date: c.date,
                size_pct: self.size_pct,
                price: c.price,
                currency,
            })
            .collect()
    }

    /// Signals read from `tracking`, intents priced in `trading` on the
    /// same date.
    pub fn intents_for(
        &self,
        tracking: &Series,
        trading: &Market,
    ) -> Result<Vec<TradeIntent>, YieldtraderError> {
        self.crossovers(tracking)
            .into_iter()
            .map(|c| TradeIntent::at_date(c.side, c.date, self.size_pct, trading))
            .collect()
    }
}
