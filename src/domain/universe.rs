//! Scan universe selection.
//!
//! Parses code lists from configuration or the command line and narrows an
//! explicit subset to the configured universe.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

/// Splits a comma list into upper-cased codes, rejecting blanks and repeats.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UniverseSelection {
    pub codes: Vec<String>,
    /// Requested codes dropped because the configured universe lacks them.
    pub excluded: Vec<String>,
}

/// Picks the symbols a scan runs over.
///
/// Without a subset the configured universe is used as is. A subset is kept in
/// its own order and, when a configured universe exists, restricted to it.
pub fn select_universe(configured: &[String], subset: Option<&[String]>) -> UniverseSelection {
    let Some(subset) = subset else {
        return UniverseSelection {
            codes: configured.to_vec(),
            excluded: Vec::new(),
        };
    };
    if configured.is_empty() {
        return UniverseSelection {
            codes: subset.to_vec(),
            excluded: Vec::new(),
        };
    }

    let allowed: HashSet<&str> = configured.iter().map(String::as_str).collect();
    let (codes, excluded) = subset
        .iter()
        .cloned()
        .partition(|code| allowed.contains(code.as_str()));
    UniverseSelection { codes, excluded }
}
