//! Core domain types and logic.

pub mod series;
pub mod market;
pub mod indicator;
pub mod trade;
pub mod strategy;
pub mod portfolio;
pub mod farm;
pub mod forecast;
pub mod performance;
pub mod config_validation;
pub mod error;
