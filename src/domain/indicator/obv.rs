//! OBV (On-Balance Volume).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

/// Calculate OBV (On-Balance Volume).
///
/// OBV[0] = 0
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup period; every bar is defined.
pub fn calculate_obv(bars: &[OhlcvBar]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut obv: f64 = 0.0;
    let mut prev_close: Option<f64> = None;

    for bar in bars {
        if let Some(prev) = prev_close {
            if bar.close > prev {
                obv += bar.volume as f64;
            } else if bar.close < prev {
                obv -= bar.volume as f64;
            }
        }
        prev_close = Some(bar.close);
        values.push(IndicatorPoint::simple(bar.timestamp, obv));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Obv,
        values,
    }
}
