//! Port traits for the collaborators around the simulation core.

pub mod cache_port;
pub mod chart_port;
pub mod config_port;
pub mod price_port;
