//! Scan configuration: validated once, then passed explicitly to every scan.

use std::time::Duration;

use chrono::NaiveDate;

use crate::domain::error::ScreenerError;
use crate::domain::preset::PresetParams;
use crate::domain::strategy_validation::MAX_PERIOD;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub exchange: String,
    /// Default universe; an explicit subset is narrowed to it when non-empty.
    pub universe: Vec<String>,
    /// Upper bound on in-flight market-data fetches.
    pub max_concurrency: usize,
    pub timeout: Option<Duration>,
    /// Last calendar day of the fetch window.
    pub end_date: NaiveDate,
    pub presets: PresetParams,
}

impl ScanConfig {
    pub fn new(exchange: impl Into<String>, end_date: NaiveDate) -> Self {
        Self {
            exchange: exchange.into(),
            universe: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: None,
            end_date,
            presets: PresetParams::default(),
        }
    }

    /// Reads `[scan]` and `[presets]`. `end_date` in the file overrides `today`.
    pub fn from_config(config: &dyn ConfigPort, today: NaiveDate) -> Result<Self, ScreenerError> {
        validate_scan_config(config)?;

        let exchange = config
            .get_string("scan", "exchange")
            .map(|e| e.trim().to_uppercase())
            .ok_or_else(|| missing("scan", "exchange"))?;

        let universe = match config.get_string("scan", "codes") {
            Some(codes) if !codes.trim().is_empty() => {
                parse_codes(&codes).map_err(|e| invalid("scan", "codes", e.to_string()))?
            }
            _ => Vec::new(),
        };

        let end_date = match config.get_string("scan", "end_date") {
            Some(value) => parse_date(&value, "end_date")?,
            None => today,
        };

        let timeout = match config.get_int("scan", "timeout_secs", 0) {
            0 => None,
            secs => Some(Duration::from_secs(secs as u64)),
        };

        let defaults = PresetParams::default();
        let presets = PresetParams {
            slope_window: config.get_int("presets", "slope_window", defaults.slope_window as i64)
                as usize,
            down_to_ma200_max_slope: config.get_double(
                "presets",
                "down_to_ma200_max_slope",
                defaults.down_to_ma200_max_slope,
            ),
            magnet_resistance_pct: config.get_double(
                "presets",
                "magnet_resistance_pct",
                defaults.magnet_resistance_pct,
            ),
            resistance_window: config.get_int(
                "presets",
                "resistance_window",
                defaults.resistance_window as i64,
            ) as usize,
            zigzag_reversal_pct: config.get_double(
                "presets",
                "zigzag_reversal_pct",
                defaults.zigzag_reversal_pct,
            ),
            days: config.get_int("presets", "days", defaults.days as i64) as usize,
            top_n: config.get_int("presets", "top_n", defaults.top_n as i64) as usize,
        };

        Ok(Self {
            exchange,
            universe,
            max_concurrency: config.get_int(
                "scan",
                "max_concurrency",
                DEFAULT_MAX_CONCURRENCY as i64,
            ) as usize,
            timeout,
            end_date,
            presets,
        })
    }
}

/// Checks every scan-related key before a `ScanConfig` is built.
pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    validate_exchange(config)?;
    validate_concurrency(config)?;
    validate_timeout(config)?;
    validate_preset_params(config)?;
    Ok(())
}

fn validate_exchange(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    match config.get_string("scan", "exchange") {
        Some(e) if !e.trim().is_empty() => Ok(()),
        _ => Err(missing("scan", "exchange")),
    }
}

fn validate_concurrency(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    let value = config.get_int("scan", "max_concurrency", DEFAULT_MAX_CONCURRENCY as i64);
    if value < 1 {
        return Err(invalid(
            "scan",
            "max_concurrency",
            "max_concurrency must be at least 1",
        ));
    }
    Ok(())
}

fn validate_timeout(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    if config.get_string("scan", "timeout_secs").is_some()
        && config.get_int("scan", "timeout_secs", 0) <= 0
    {
        return Err(invalid(
            "scan",
            "timeout_secs",
            "timeout_secs must be a positive integer",
        ));
    }
    Ok(())
}

fn validate_preset_params(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    let defaults = PresetParams::default();
    let at_least = |key: &str, default: usize, min: i64| {
        let value = config.get_int("presets", key, default as i64);
        if value < min || value > MAX_PERIOD as i64 {
            return Err(invalid(
                "presets",
                key,
                format!("{} must be between {} and {}", key, min, MAX_PERIOD),
            ));
        }
        Ok(())
    };
    at_least("slope_window", defaults.slope_window, 2)?;
    at_least("resistance_window", defaults.resistance_window, 2)?;
    at_least("days", defaults.days, 1)?;
    at_least("top_n", defaults.top_n, 1)?;

    for (key, default) in [
        ("magnet_resistance_pct", defaults.magnet_resistance_pct),
        ("zigzag_reversal_pct", defaults.zigzag_reversal_pct),
    ] {
        let value = config.get_double("presets", key, default);
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid("presets", key, format!("{} must be positive", key)));
        }
    }
    let slope = config.get_double(
        "presets",
        "down_to_ma200_max_slope",
        defaults.down_to_ma200_max_slope,
    );
    if !slope.is_finite() {
        return Err(invalid(
            "presets",
            "down_to_ma200_max_slope",
            "down_to_ma200_max_slope must be finite",
        ));
    }
    Ok(())
}

fn parse_date(value: &str, key: &str) -> Result<NaiveDate, ScreenerError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| invalid("scan", key, format!("{} (expected YYYY-MM-DD)", e)))
}

fn missing(section: &str, key: &str) -> ScreenerError {
    ScreenerError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ScreenerError {
    ScreenerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}
