//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded once the line is defined
//! Histogram = MACD Line - Signal Line
//!
//! Warmup: max(fast, slow) - 1 + signal - 1 bars.

use crate::domain::indicator::ema::ema_of;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint::undefined(b.timestamp))
        .collect();

    let line_start = fast.max(slow);
    if fast == 0 || slow == 0 || signal_period == 0 || bars.len() < line_start {
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_of(&closes, fast);
    let ema_slow = ema_of(&closes, slow);

    // Both EMAs are defined from line_start - 1 onwards.
    let offset = line_start - 1;
    let line: Vec<f64> = ema_fast[offset..]
        .iter()
        .zip(&ema_slow[offset..])
        .filter_map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema_of(&line, signal_period);

    for (j, (macd, sig)) in line.iter().zip(signal).enumerate() {
        if let Some(sig) = sig {
            let i = offset + j;
            values[i] = IndicatorPoint::defined(
                bars[i].timestamp,
                IndicatorValue::Macd {
                    line: *macd,
                    signal: sig,
                    histogram: macd - sig,
                },
            );
        }
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
