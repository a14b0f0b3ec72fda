//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n price changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are undefined (need n price changes to seed the averages).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint::undefined(b.timestamp))
        .collect();

    if period == 0 || bars.len() <= period {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values,
        };
    }

    let mut gains: Vec<f64> = Vec::with_capacity(bars.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(bars.len() - 1);
    for pair in bars.windows(2) {
        let change = pair[1].close - pair[0].close;
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    values[period] = IndicatorPoint::simple(bars[period].timestamp, rsi_from(avg_gain, avg_loss));

    for i in (period + 1)..bars.len() {
        let change_idx = i - 1;
        avg_gain = (avg_gain * (period - 1) as f64 + gains[change_idx]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[change_idx]) / period as f64;
        values[i] = IndicatorPoint::simple(bars[i].timestamp, rsi_from(avg_gain, avg_loss));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rsi = 100.0 - (100.0 / (1.0 + avg_gain / avg_loss));
    rsi.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::indicator::IndicatorValue;

    fn simple(series: &IndicatorSeries, i: usize) -> f64 {
        match series.value_at(i) {
            Some(IndicatorValue::Simple(v)) => *v,
            other => panic!("expected defined value at {}, got {:?}", i, other),
        }
    }

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 14);
        assert_eq!(series.values.len(), 0);
    }

    #[test]
    fn rsi_single_bar() {
        let bars = make_bars(&[100.0]);
        let series = calculate_rsi(&bars, 14);
        assert_eq!(series.values.len(), 1);
        assert!(!series.values[0].is_defined());
    }

    #[test]
    fn rsi_warmup_period() {
        let prices: Vec<f64> = (1..=16).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let bars = make_bars(&prices);
        let series = calculate_rsi(&bars, 14);

        for i in 0..14 {
            assert!(!series.values[i].is_defined(), "bar {} should be undefined", i);
        }
        assert!(series.values[14].is_defined());
        assert!(series.values[15].is_defined());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);
        assert!((simple(&series, 19) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);
        assert!(simple(&series, 19).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_prices_is_100() {
        let series = calculate_rsi(&make_bars(&[50.0; 10]), 3);
        assert!((simple(&series, 9) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_known_seed() {
        // Changes: +2, -1, +3 -> avg gain 5/3, avg loss 1/3, RS 5
        let series = calculate_rsi(&make_bars(&[10.0, 12.0, 11.0, 14.0]), 3);
        let expected = 100.0 - 100.0 / 6.0;
        assert!((simple(&series, 3) - expected).abs() < 1e-9);
    }

    #[test]
    fn rsi_wilder_smoothing() {
        // Seed as above, then a -2 change.
        let series = calculate_rsi(&make_bars(&[10.0, 12.0, 11.0, 14.0, 12.0]), 3);
        let avg_gain = (5.0 / 3.0 * 2.0 + 0.0) / 3.0;
        let avg_loss = (1.0 / 3.0 * 2.0 + 2.0) / 3.0;
        let expected = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        assert!((simple(&series, 4) - expected).abs() < 1e-9);
    }
}
