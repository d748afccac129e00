//! Portfolio replay of trade intents for a single market.

use chrono::NaiveDate;
use serde::Serialize;

use super::series::{diff_days, Series};
use super::trade::{Side, TradeIntent};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub side: Side,
    pub date: NaiveDate,
    pub price: f64,
    pub amount: f64,
    pub units: f64,
    pub fiat_balance: f64,
    pub unit_balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub fiat_balance: f64,
    pub unit_balance: f64,
}

impl Portfolio {
    pub fn new(initial_investment: f64) -> Self {
        Portfolio {
            fiat_balance: initial_investment,
            unit_balance: 0.0,
        }
    }

    /// Spend `size_pct` percent of fiat at `price`. Returns (amount, units).
    pub fn buy(&mut self, size_pct: f64, price: f64) -> (f64, f64) {
        let amount = self.fiat_balance * (size_pct / 100.0);
        let units = amount / price;
        self.fiat_balance -= amount;
        self.unit_balance += units;
        (amount, units)
    }

    /// Sell `size_pct` percent of held units at `price`. Returns (amount, units).
    pub fn sell(&mut self, size_pct: f64, price: f64) -> (f64, f64) {
        let units = self.unit_balance * (size_pct / 100.0);
        let amount = units * price;
        self.fiat_balance += amount;
        self.unit_balance -= units;
        (amount, units)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub initial_investment: f64,
    pub fiat_balance: f64,
    pub unit_balance: f64,
    pub buys: usize,
    pub sells: usize,
    pub first_buy_date: Option<NaiveDate>,
    pub last_sell_date: Option<NaiveDate>,
    /// Value of units still held at the latest price, 0 when flat.
    pub mark_to_market: f64,
    pub fills: Vec<Fill>,
}

impl SimulationResult {
    pub fn trades(&self) -> usize {
        self.buys + self.sells
    }

    pub fn final_value(&self) -> f64 {
        self.fiat_balance + self.mark_to_market
    }

    /// (final value / initial investment) - 1
    pub fn profit_loss(&self) -> f64 {
        if self.initial_investment > 0.0 {
            self.final_value() / self.initial_investment - 1.0
        } else {
            0.0
        }
    }

    /// Days between the first buy and the last sell.
    pub fn holding_days(&self) -> Option<i64> {
        match (self.first_buy_date, self.last_sell_date) {
            (Some(first), Some(last)) => Some(diff_days(first, last)),
            _ => None,
        }
    }
}

/// Replay `intents` in order. Sells before the first buy are dropped; units
/// still held at the end are marked at the latest price of `prices`.
pub fn simulate(initial_investment: f64, intents: &[TradeIntent], prices: &Series) -> SimulationResult {
    let mut portfolio = Portfolio::new(initial_investment);
    let mut result = SimulationResult {
        initial_investment,
        fiat_balance: initial_investment,
        unit_balance: 0.0,
        buys: 0,
        sells: 0,
        first_buy_date: None,
        last_sell_date: None,
        mark_to_market: 0.0,
        fills: Vec::new(),
    };

    let Some(first_buy) = intents.iter().position(|t| t.side == Side::Buy) else {
        return result;
    };
    if first_buy > 0 {
        tracing::debug!(dropped = first_buy, "skipping sells before first buy");
    }

    for intent in &intents[first_buy..] {
        let (amount, units) = match intent.side {
            Side::Buy => {
                result.buys += 1;
                result.first_buy_date.get_or_insert(intent.date);
                portfolio.buy(intent.size_pct, intent.price)
            }
            Side::Sell => {
                result.sells += 1;
                result.last_sell_date = Some(intent.date);
                portfolio.sell(intent.size_pct, intent.price)
            }
        };
        result.fills.push(Fill {
            side: intent.side,
            date: intent.date,
            price: intent.price,
            amount,
            units,
            fiat_balance: portfolio.fiat_balance,
            unit_balance: portfolio.unit_balance,
        });
    }

    if portfolio.unit_balance > 0.0 {
        if let Some(latest) = prices.latest() {
            result.mark_to_market = portfolio.unit_balance * latest.value;
        }
    }

    result.fiat_balance = portfolio.fiat_balance;
    result.unit_balance = portfolio.unit_balance;
    result
}
