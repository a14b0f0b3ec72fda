//! Stochastic oscillator.
//!
//! %K = 100 × (C - LL(k)) / (HH(k) - LL(k)), undefined when the range is zero.
//! %D = SMA(d) of %K, undefined unless all d %K values are defined.
//! A point is defined only when both lines are.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stochastic(bars: &[OhlcvBar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .map(|b| IndicatorPoint::undefined(b.timestamp))
                .collect(),
        };
    }

    let k_line: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            if i + 1 < k_period {
                return None;
            }
            let window = &bars[i + 1 - k_period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = hh - ll;
            (range > 0.0).then(|| 100.0 * (bars[i].close - ll) / range)
        })
        .collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i + 1 < d_period {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            let window = &k_line[i + 1 - d_period..=i];
            let sum: Option<f64> = window.iter().copied().sum();
            match (k_line[i], sum) {
                (Some(k), Some(sum)) => IndicatorPoint::defined(
                    bar.timestamp,
                    IndicatorValue::Stochastic {
                        k,
                        d: sum / d_period as f64,
                    },
                ),
                _ => IndicatorPoint::undefined(bar.timestamp),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
