//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series; `value` is
//!   `None` while the indicator is still warming up (never a placeholder zero)
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values aligned 1:1 with the bars

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod extrema;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod slope;
pub mod sma;
pub mod stochastic;

pub use adx::calculate_adx;
pub use atr::calculate_atr;
pub use bollinger::calculate_bollinger;
pub use cci::calculate_cci;
pub use ema::calculate_ema;
pub use extrema::{calculate_resistance, calculate_support};
pub use macd::calculate_macd;
pub use obv::calculate_obv;
pub use rsi::calculate_rsi;
pub use slope::calculate_slope;
pub use sma::calculate_sma;
pub use stochastic::calculate_stochastic;

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<IndicatorValue>,
}

impl IndicatorPoint {
    pub fn defined(timestamp: NaiveDateTime, value: IndicatorValue) -> Self {
        Self {
            timestamp,
            value: Some(value),
        }
    }

    pub fn simple(timestamp: NaiveDateTime, value: f64) -> Self {
        Self::defined(timestamp, IndicatorValue::Simple(value))
    }

    pub fn undefined(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            value: None,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

/// Series a slope can be measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlopeSource {
    Close,
    Sma(usize),
    Ema(usize),
}

impl SlopeSource {
    pub fn indicator_type(self) -> Option<IndicatorType> {
        match self {
            SlopeSource::Close => None,
            SlopeSource::Sma(period) => Some(IndicatorType::Sma(period)),
            SlopeSource::Ema(period) => Some(IndicatorType::Ema(period)),
        }
    }

    fn min_bars(self) -> usize {
        match self {
            SlopeSource::Close => 1,
            SlopeSource::Sma(period) | SlopeSource::Ema(period) => period,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    Cci(usize),
    Obv,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Slope {
        source: SlopeSource,
        window: usize,
    },
    /// Most recent confirmed zig-zag peak above the current close.
    Resistance {
        window: usize,
        min_reversal_x100: u32,
    },
    /// Most recent confirmed zig-zag trough below the current close.
    Support {
        window: usize,
        min_reversal_x100: u32,
    },
}

impl IndicatorType {
    /// Number of bars needed before the first defined value.
    pub fn min_bars(&self) -> usize {
        match *self {
            IndicatorType::Sma(period)
            | IndicatorType::Ema(period)
            | IndicatorType::Atr(period)
            | IndicatorType::Cci(period) => period,
            IndicatorType::Rsi(period) => period.saturating_add(1),
            IndicatorType::Adx(period) => period.saturating_mul(2),
            IndicatorType::Obv => 1,
            IndicatorType::Macd { fast, slow, signal } => {
                fast.max(slow).saturating_add(signal).saturating_sub(1)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                k_period.saturating_add(d_period).saturating_sub(1)
            }
            IndicatorType::Bollinger { period, .. } => period,
            IndicatorType::Slope { source, window } => {
                source.min_bars().saturating_add(window).saturating_sub(1)
            }
            IndicatorType::Resistance { window, .. } | IndicatorType::Support { window, .. } => {
                window
            }
        }
    }

    /// Indicators whose series this one is derived from.
    pub fn dependencies(&self) -> Vec<IndicatorType> {
        match self {
            IndicatorType::Slope { source, .. } => source.indicator_type().into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn value_at(&self, index: usize) -> Option<&IndicatorValue> {
        self.values.get(index).and_then(|p| p.value.as_ref())
    }

    /// Single-valued readings; multi-line points map to `None`.
    pub fn simple_values(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| match p.value {
                Some(IndicatorValue::Simple(v)) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Computes a single indicator series from scratch. A slope computes its own
/// source here; `indicator_helpers::compute_indicators` reuses a cached one.
pub fn calculate(indicator_type: &IndicatorType, bars: &[OhlcvBar]) -> IndicatorSeries {
    match *indicator_type {
        IndicatorType::Sma(period) => calculate_sma(bars, period),
        IndicatorType::Ema(period) => calculate_ema(bars, period),
        IndicatorType::Rsi(period) => calculate_rsi(bars, period),
        IndicatorType::Atr(period) => calculate_atr(bars, period),
        IndicatorType::Adx(period) => calculate_adx(bars, period),
        IndicatorType::Cci(period) => calculate_cci(bars, period),
        IndicatorType::Obv => calculate_obv(bars),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
        IndicatorType::Stochastic { k_period, d_period } => {
            calculate_stochastic(bars, k_period, d_period)
        }
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(bars, period, stddev_mult_x100),
        IndicatorType::Slope { source, window } => {
            let source_series = source.indicator_type().map(|t| calculate(&t, bars));
            calculate_slope(bars, source, source_series.as_ref(), window)
        }
        IndicatorType::Resistance {
            window,
            min_reversal_x100,
        } => calculate_resistance(bars, window, min_reversal_x100),
        IndicatorType::Support {
            window,
            min_reversal_x100,
        } => calculate_support(bars, window, min_reversal_x100),
    }
}

fn pct_x100(value: u32) -> f64 {
    value as f64 / 100.0
}

impl fmt::Display for SlopeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlopeSource::Close => write!(f, "close"),
            SlopeSource::Sma(period) => write!(f, "SMA({})", period),
            SlopeSource::Ema(period) => write!(f, "EMA({})", period),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Cci(period) => write!(f, "CCI({})", period),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => write!(f, "BOLLINGER({},{})", period, pct_x100(*stddev_mult_x100)),
            IndicatorType::Slope { source, window } => write!(f, "SLOPE({},{})", source, window),
            IndicatorType::Resistance {
                window,
                min_reversal_x100,
            } => write!(f, "RESISTANCE({},{})", window, pct_x100(*min_reversal_x100)),
            IndicatorType::Support {
                window,
                min_reversal_x100,
            } => write!(f, "SUPPORT({},{})", window, pct_x100(*min_reversal_x100)),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::{NaiveDate, NaiveDateTime};

    pub fn day(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(i as i64)
    }

    pub fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                code: "TEST".into(),
                exchange: "TEST".into(),
                timestamp: day(i),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    pub fn make_hlc_bars(rows: &[(f64, f64, f64)]) -> Vec<OhlcvBar> {
        rows.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| OhlcvBar {
                code: "TEST".into(),
                exchange: "TEST".into(),
                timestamp: day(i),
                open: close,
                high,
                low,
                close,
                volume: 1000,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::make_bars;
    use super::*;

    #[test]
    fn indicator_type_display_sma() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_derived() {
        let slope = IndicatorType::Slope {
            source: SlopeSource::Sma(44),
            window: 5,
        };
        assert_eq!(slope.to_string(), "SLOPE(SMA(44),5)");

        let res = IndicatorType::Resistance {
            window: 30,
            min_reversal_x100: 10,
        };
        assert_eq!(res.to_string(), "RESISTANCE(30,0.1)");
    }

    #[test]
    fn min_bars_per_kind() {
        assert_eq!(IndicatorType::Sma(44).min_bars(), 44);
        assert_eq!(IndicatorType::Rsi(14).min_bars(), 15);
        assert_eq!(IndicatorType::Adx(14).min_bars(), 28);
        assert_eq!(
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
            .min_bars(),
            34
        );
        assert_eq!(
            IndicatorType::Slope {
                source: SlopeSource::Sma(200),
                window: 5
            }
            .min_bars(),
            204
        );
        assert_eq!(IndicatorType::Obv.min_bars(), 1);
    }

    #[test]
    fn min_bars_matches_first_defined_index() {
        let prices: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bars = make_bars(&prices);
        let kinds = [
            IndicatorType::Sma(10),
            IndicatorType::Ema(10),
            IndicatorType::Rsi(14),
            IndicatorType::Cci(20),
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
            },
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 200,
            },
            IndicatorType::Slope {
                source: SlopeSource::Ema(10),
                window: 5,
            },
        ];
        for kind in kinds {
            let series = calculate(&kind, &bars);
            let first = series.values.iter().position(|p| p.is_defined());
            assert_eq!(first, Some(kind.min_bars() - 1), "{}", kind);
        }
    }

    #[test]
    fn indicator_type_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorType::Sma(20), "sma20");
        map.insert(
            IndicatorType::Slope {
                source: SlopeSource::Sma(20),
                window: 5,
            },
            "slope",
        );

        assert_eq!(map.get(&IndicatorType::Sma(20)), Some(&"sma20"));
        assert_eq!(
            map.get(&IndicatorType::Slope {
                source: SlopeSource::Sma(20),
                window: 5
            }),
            Some(&"slope")
        );
        assert_eq!(map.get(&IndicatorType::Sma(50)), None);
    }

    #[test]
    fn slope_dependencies() {
        let slope = IndicatorType::Slope {
            source: SlopeSource::Ema(30),
            window: 5,
        };
        assert_eq!(slope.dependencies(), vec![IndicatorType::Ema(30)]);
        assert!(IndicatorType::Rsi(14).dependencies().is_empty());
    }
}
