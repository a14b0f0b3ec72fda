//! ATR (Average True Range), Wilder-smoothed.
//!
//! TR[0] = high - low, TR[i] = max(H-L, |H-prevC|, |L-prevC|).
//! Seed ATR[n-1] = mean(TR[0..n]); then ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint::undefined(b.timestamp))
        .collect();

    if period == 0 || bars.len() < period {
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values,
        };
    }

    let tr = true_ranges(bars);
    let mut atr = tr[..period].iter().sum::<f64>() / period as f64;
    values[period - 1] = IndicatorPoint::simple(bars[period - 1].timestamp, atr);

    for i in period..bars.len() {
        atr = (atr * (period - 1) as f64 + tr[i]) / period as f64;
        values[i] = IndicatorPoint::simple(bars[i].timestamp, atr);
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

pub(crate) fn true_ranges(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| match i {
            0 => bar.high - bar.low,
            _ => bar.true_range(bars[i - 1].close),
        })
        .collect()
}
