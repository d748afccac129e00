//! Price provider port.

use crate::domain::error::YieldtraderError;
use crate::domain::market::{Fiat, Market};

pub trait PricePort {
    /// Daily market history for `asset_id` covering the last `days` days,
    /// quoted in `currency`.
    fn fetch_market(
        &self,
        asset_id: &str,
        days: u32,
        currency: Fiat,
    ) -> Result<Market, YieldtraderError>;

    fn list_assets(&self) -> Result<Vec<String>, YieldtraderError>;
}
