//! Least-squares slope of a source series over a trailing window.
//!
//! x is the bar offset within the window (0..w), so the result is in price
//! units per bar. A window containing any undefined source value is undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, SlopeSource};
use crate::domain::ohlcv::OhlcvBar;

/// `source_series` must be the computed series for `source` unless the
/// source is `Close`; without it every point is undefined.
pub fn calculate_slope(
    bars: &[OhlcvBar],
    source: SlopeSource,
    source_series: Option<&IndicatorSeries>,
    window: usize,
) -> IndicatorSeries {
    let samples: Vec<Option<f64>> = match (source, source_series) {
        (SlopeSource::Close, _) => bars.iter().map(|b| Some(b.close)).collect(),
        (_, Some(series)) => series.simple_values(),
        (_, None) => vec![None; bars.len()],
    };

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if window < 2 || i + 1 < window {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            let ys: Option<Vec<f64>> = samples[i + 1 - window..=i].iter().copied().collect();
            match ys {
                Some(ys) => IndicatorPoint::simple(bar.timestamp, least_squares_slope(&ys)),
                None => IndicatorPoint::undefined(bar.timestamp),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Slope { source, window },
        values,
    }
}

/// Slope of the best-fit line through (0, ys[0]), (1, ys[1]), ...
pub fn least_squares_slope(ys: &[f64]) -> f64 {
    let n = ys.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in ys.iter().enumerate() {
        let dx = x as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 { 0.0 } else { num / den }
}
