//! ADX (Average Directional Index), Wilder's formulation.
//!
//! +DM / -DM and TR are Wilder-smoothed from the first `n` changes, giving
//! +DI and -DI from bar n onwards. DX = 100·|+DI − −DI| / (+DI + −DI), and
//! ADX is seeded with the mean of the first n DX values (bar 2n-1), then
//! ADX[i] = (ADX[i-1]·(n-1) + DX[i]) / n. Always within [0, 100].

use crate::domain::indicator::atr::true_ranges;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint::undefined(b.timestamp))
        .collect();

    if period == 0 || bars.len() < period.saturating_mul(2) {
        return IndicatorSeries {
            indicator_type: IndicatorType::Adx(period),
            values,
        };
    }

    let tr = true_ranges(bars);
    let mut plus_dm = vec![0.0; bars.len()];
    let mut minus_dm = vec![0.0; bars.len()];
    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let n = period as f64;
    let mut sm_tr: f64 = tr[1..=period].iter().sum();
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx = vec![0.0; bars.len()];
    dx[period] = directional_index(sm_plus, sm_minus, sm_tr);
    for i in (period + 1)..bars.len() {
        sm_tr = sm_tr - sm_tr / n + tr[i];
        sm_plus = sm_plus - sm_plus / n + plus_dm[i];
        sm_minus = sm_minus - sm_minus / n + minus_dm[i];
        dx[i] = directional_index(sm_plus, sm_minus, sm_tr);
    }

    let first = 2 * period - 1;
    let mut adx = dx[period..=first].iter().sum::<f64>() / n;
    values[first] = IndicatorPoint::simple(bars[first].timestamp, adx);
    for i in (first + 1)..bars.len() {
        adx = (adx * (n - 1.0) + dx[i]) / n;
        values[i] = IndicatorPoint::simple(bars[i].timestamp, adx);
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}

fn directional_index(plus: f64, minus: f64, tr: f64) -> f64 {
    if tr <= 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * plus / tr;
    let minus_di = 100.0 * minus / tr;
    let sum = plus_di + minus_di;
    if sum == 0.0 {
        0.0
    } else {
        (100.0 * (plus_di - minus_di).abs() / sum).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_hlc_bars;
    use crate::domain::indicator::IndicatorValue;

    fn adx_at(series: &IndicatorSeries, i: usize) -> f64 {
        match series.value_at(i) {
            Some(IndicatorValue::Simple(v)) => *v,
            other => panic!("expected ADX at {}, got {:?}", i, other),
        }
    }

    fn trending(n: usize, step: f64) -> Vec<(f64, f64, f64)> {
        (0..n)
            .map(|i| {
                let c = 100.0 + step * i as f64;
                (c + 1.0, c - 1.0, c)
            })
            .collect()
    }

    #[test]
    fn adx_warmup() {
        let bars = make_hlc_bars(&trending(30, 1.0));
        let series = calculate_adx(&bars, 5);

        assert!(!series.values[8].is_defined());
        assert!(series.values[9].is_defined());
    }

    #[test]
    fn adx_strong_uptrend_is_100() {
        // Every bar makes a higher high and a higher low: -DM is always zero.
        let bars = make_hlc_bars(&trending(30, 2.0));
        let series = calculate_adx(&bars, 5);
        assert!((adx_at(&series, 29) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn adx_flat_market_is_zero() {
        let bars = make_hlc_bars(&[(101.0, 99.0, 100.0); 20]);
        let series = calculate_adx(&bars, 5);
        assert_eq!(adx_at(&series, 19), 0.0);
    }

    #[test]
    fn adx_too_few_bars() {
        let bars = make_hlc_bars(&trending(9, 1.0));
        let series = calculate_adx(&bars, 5);
        assert!(series.values.iter().all(|p| !p.is_defined()));
    }

    #[test]
    fn adx_huge_period_is_undefined() {
        let bars = make_hlc_bars(&trending(9, 1.0));
        let series = calculate_adx(&bars, usize::MAX);
        assert!(series.values.iter().all(|p| !p.is_defined()));
        assert_eq!(IndicatorType::Adx(usize::MAX).min_bars(), usize::MAX);
    }
}
