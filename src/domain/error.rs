//! Domain error types.

use crate::domain::strategy_validation::StrategyError;
use std::time::Duration;

/// A parse error with position information for condition parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for the screener.
#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error(transparent)]
    ConditionParse(#[from] ParseError),

    #[error(transparent)]
    StrategyInvalid(#[from] StrategyError),

    #[error("strategy not found: {id}")]
    StrategyNotFound { id: String },

    #[error("failed to fetch {code} on {exchange}: {reason}")]
    DataFetch {
        code: String,
        exchange: String,
        reason: String,
    },

    #[error("no data for {code} on {exchange}")]
    NoData { code: String, exchange: String },

    #[error("scan universe is empty")]
    EmptyUniverse,

    #[error("market data unavailable: all {attempted} symbol fetches failed")]
    AllFetchesFailed { attempted: usize },

    #[error("scan cancelled")]
    Cancelled,

    #[error("scan timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ScreenerError> for std::process::ExitCode {
    fn from(err: &ScreenerError) -> Self {
        let code: u8 = match err {
            ScreenerError::Io(_) => 1,
            ScreenerError::ConfigParse { .. }
            | ScreenerError::ConfigMissing { .. }
            | ScreenerError::ConfigInvalid { .. } => 2,
            ScreenerError::Database { .. } | ScreenerError::DatabaseQuery { .. } => 3,
            ScreenerError::ConditionParse(_)
            | ScreenerError::StrategyInvalid(_)
            | ScreenerError::StrategyNotFound { .. } => 4,
            ScreenerError::DataFetch { .. }
            | ScreenerError::NoData { .. }
            | ScreenerError::EmptyUniverse
            | ScreenerError::AllFetchesFailed { .. } => 5,
            ScreenerError::Cancelled | ScreenerError::TimedOut(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
