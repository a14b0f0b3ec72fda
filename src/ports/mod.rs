//! Port traits for the screener's external collaborators.

pub mod config_port;
pub mod data_port;
pub mod strategy_store_port;
