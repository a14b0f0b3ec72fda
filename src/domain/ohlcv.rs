//! OHLCV bar representation and bar-series sanity checks.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub exchange: String,
    /// Exchange-local bar open time.
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Reasons a bar series is unusable. Detected, never repaired.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("empty bar series")]
    Empty,

    #[error("timestamps not strictly increasing at bar {index} ({timestamp})")]
    NonMonotonic {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("non-positive or non-finite price at bar {index}")]
    InvalidPrice { index: usize },

    #[error("negative volume at bar {index}")]
    NegativeVolume { index: usize },
}

/// Checks ordering, uniqueness and value sanity of a bar series.
pub fn validate_series(bars: &[OhlcvBar]) -> Result<(), SeriesError> {
    if bars.is_empty() {
        return Err(SeriesError::Empty);
    }

    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(SeriesError::InvalidPrice { index: i });
        }
        if bar.volume < 0 {
            return Err(SeriesError::NegativeVolume { index: i });
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(SeriesError::NonMonotonic {
                index: i,
                timestamp: bar.timestamp,
            });
        }
    }

    Ok(())
}
