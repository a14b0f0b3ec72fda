//! CCI (Commodity Channel Index).
//!
//! CCI = (TP - SMA(TP, n)) / (0.015 × mean absolute deviation of TP over n),
//! TP = (high + low + close) / 3. A zero deviation leaves the bar undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

const LAMBERT: f64 = 0.015;

pub fn calculate_cci(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let tp: Vec<f64> = bars.iter().map(OhlcvBar::typical_price).collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period == 0 || i + 1 < period {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            let window = &tp[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let mad = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
            if mad == 0.0 {
                IndicatorPoint::undefined(bar.timestamp)
            } else {
                IndicatorPoint::simple(bar.timestamp, (tp[i] - mean) / (LAMBERT * mad))
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Cci(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::{make_bars, make_hlc_bars};
    use crate::domain::indicator::IndicatorValue;

    #[test]
    fn cci_known_value() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_cci(&bars, 3);

        // mean 20, MAD 20/3, (30 - 20) / (0.015 * 20/3) = 100
        match series.value_at(2) {
            Some(IndicatorValue::Simple(v)) => assert!((v - 100.0).abs() < 1e-9),
            other => panic!("expected CCI, got {:?}", other),
        }
        assert!(!series.values[1].is_defined());
    }

    #[test]
    fn cci_uses_typical_price() {
        let bars = make_hlc_bars(&[(12.0, 8.0, 10.0), (24.0, 18.0, 18.0), (33.0, 27.0, 30.0)]);
        let series = calculate_cci(&bars, 3);

        let tp = [10.0, 20.0, 30.0];
        let mean = 20.0;
        let mad = tp.iter().map(|v: &f64| (v - mean).abs()).sum::<f64>() / 3.0;
        let expected = (30.0 - mean) / (0.015 * mad);
        match series.value_at(2) {
            Some(IndicatorValue::Simple(v)) => assert!((v - expected).abs() < 1e-9),
            other => panic!("expected CCI, got {:?}", other),
        }
    }

    #[test]
    fn cci_flat_window_is_undefined() {
        let series = calculate_cci(&make_bars(&[50.0; 5]), 3);
        assert!(series.values.iter().all(|p| !p.is_defined()));
    }
}
