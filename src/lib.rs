//! screener — technical-analysis stock screener.
//!
//! Hexagonal architecture: indicator math, conditions, presets and the scan
//! orchestrator live in [`domain`], collaborator traits in [`ports`], concrete
//! implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
pub mod logging;
