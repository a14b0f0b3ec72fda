//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema = ema_of(&closes, period);

    let values = bars
        .iter()
        .zip(ema)
        .map(|(bar, v)| match v {
            Some(v) => IndicatorPoint::simple(bar.timestamp, v),
            None => IndicatorPoint::undefined(bar.timestamp),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// SMA-seeded EMA over raw samples. Also used for the MACD signal line.
pub(crate) fn ema_of(samples: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(samples.len());
    if period == 0 {
        out.resize(samples.len(), None);
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &x) in samples.iter().enumerate() {
        if i < period - 1 {
            sum += x;
            out.push(None);
        } else if i == period - 1 {
            sum += x;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = x * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::indicator::IndicatorValue;

    fn simple(series: &IndicatorSeries, i: usize) -> f64 {
        match series.value_at(i) {
            Some(IndicatorValue::Simple(v)) => *v,
            other => panic!("expected defined simple value at {}, got {:?}", i, other),
        }
    }

    #[test]
    fn ema_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&bars, 3);

        assert!(!series.values[0].is_defined());
        assert!(!series.values[1].is_defined());
        assert!(series.values[2].is_defined());
        assert!(series.values[3].is_defined());
        assert!(series.values[4].is_defined());
    }

    #[test]
    fn ema_period_1() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 1);

        assert!((simple(&series, 0) - 10.0).abs() < f64::EPSILON);
        assert!((simple(&series, 1) - 20.0).abs() < f64::EPSILON);
        assert!((simple(&series, 2) - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_seed_is_sma() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 3);

        let expected_sma = (10.0 + 20.0 + 30.0) / 3.0;
        assert!((simple(&series, 2) - expected_sma).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_recursive_calculation() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&bars, 3);

        let k = 2.0 / 4.0;
        let sma = (10.0 + 20.0 + 30.0) / 3.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert!((simple(&series, 3) - ema_3).abs() < f64::EPSILON);
        assert!((simple(&series, 4) - ema_4).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_equal_prices() {
        let bars = make_bars(&[100.0; 5]);
        let series = calculate_ema(&bars, 3);

        for i in 2..5 {
            assert!((simple(&series, i) - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_indicator_type() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 5);

        assert_eq!(series.indicator_type, IndicatorType::Ema(5));
        assert_eq!(series.values.len(), 3);
        assert!(series.values.iter().all(|p| !p.is_defined()));
    }

    #[test]
    fn ema_empty_bars() {
        let series = calculate_ema(&[], 3);
        assert!(series.values.is_empty());
    }
}
