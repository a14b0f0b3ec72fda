//! Core domain types and scanning logic.

pub mod ohlcv;
pub mod timeframe;
pub mod indicator;
pub mod indicator_helpers;
pub mod condition;
pub mod condition_parser;
pub mod condition_eval;
pub mod strategy;
pub mod strategy_validation;
pub mod preset;
pub mod ranking;
pub mod universe;
pub mod scan_config;
pub mod scan;
pub mod error;
