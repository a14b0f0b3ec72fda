//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! The multiplier is carried as hundredths so the type stays hashable.
//! Warmup: first (period-1) bars are undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period == 0 || i + 1 < period {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            let window = &bars[i + 1 - period..=i];
            let middle = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
            let variance = window
                .iter()
                .map(|b| (b.close - middle).powi(2))
                .sum::<f64>()
                / period as f64;
            let band = mult * variance.sqrt();

            IndicatorPoint::defined(
                bar.timestamp,
                IndicatorValue::Bollinger {
                    upper: middle + band,
                    middle,
                    lower: middle - band,
                },
            )
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}
