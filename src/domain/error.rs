//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for yieldtrader.
#[derive(Debug, thiserror::Error)]
pub enum YieldtraderError {
    #[error("insufficient data for {name}: have {points} points, need {period}")]
    InsufficientData {
        name: String,
        points: usize,
        period: usize,
    },

    #[error("could not find a price for {asset} on {date}")]
    PriceNotFound { asset: String, date: NaiveDate },

    #[error("invalid trade size {size}: must be a percentage in (0, 100]")]
    InvalidTradeSize { size: f64 },

    #[error("harvest date {date} is not after {boundary} date {previous}")]
    InvalidHarvestOrder {
        date: NaiveDate,
        previous: NaiveDate,
        boundary: &'static str,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price provider error for {asset}: {reason}")]
    Provider { asset: String, reason: String },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error("render error: {reason}")]
    Render { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&YieldtraderError> for std::process::ExitCode {
    fn from(err: &YieldtraderError) -> Self {
        let code: u8 = match err {
            YieldtraderError::Io(_) => 1,
            YieldtraderError::ConfigParse { .. }
            | YieldtraderError::ConfigMissing { .. }
            | YieldtraderError::ConfigInvalid { .. } => 2,
            YieldtraderError::Provider { .. } | YieldtraderError::Cache { .. } => 3,
            YieldtraderError::Render { .. } => 4,
            YieldtraderError::InsufficientData { .. }
            | YieldtraderError::PriceNotFound { .. }
            | YieldtraderError::InvalidTradeSize { .. }
            | YieldtraderError::InvalidHarvestOrder { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
