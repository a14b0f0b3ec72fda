//! Zig-zag peak/trough detection and the support/resistance levels built on it.
//!
//! The zig-zag starts on an up-leg at the first sample. A sample moving further
//! in the leg's direction extends it; a move against it of at least
//! `min_reversal_pct` percent of the leg extreme confirms that extreme as a
//! pivot and starts a leg in the opposite direction. The still-open final leg
//! is never reported.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    Peak,
    Trough,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pivot {
    pub index: usize,
    pub value: f64,
    pub kind: PivotKind,
}

/// Confirmed zig-zag pivots, oldest first.
pub fn find_pivots(samples: &[f64], min_reversal_pct: f64) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    let Some(&first) = samples.first() else {
        return pivots;
    };

    let mut extreme = first;
    let mut extreme_pos = 0;
    let mut kind = PivotKind::Peak;

    for (i, &v) in samples.iter().enumerate() {
        let direction = match kind {
            PivotKind::Peak => 1.0,
            PivotKind::Trough => -1.0,
        };
        if (v - extreme) * direction >= 0.0 {
            extreme = v;
            extreme_pos = i;
        } else if extreme != 0.0 && ((v - extreme) / extreme * 100.0).abs() >= min_reversal_pct {
            pivots.push(Pivot {
                index: extreme_pos,
                value: extreme,
                kind,
            });
            extreme = v;
            extreme_pos = i;
            kind = match kind {
                PivotKind::Peak => PivotKind::Trough,
                PivotKind::Trough => PivotKind::Peak,
            };
        }
    }
    pivots
}

pub fn calculate_resistance(
    bars: &[OhlcvBar],
    window: usize,
    min_reversal_x100: u32,
) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::Resistance {
            window,
            min_reversal_x100,
        },
        values: level_series(bars, window, min_reversal_x100, |p, close| {
            p.kind == PivotKind::Peak && p.value > close
        }),
    }
}

pub fn calculate_support(
    bars: &[OhlcvBar],
    window: usize,
    min_reversal_x100: u32,
) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::Support {
            window,
            min_reversal_x100,
        },
        values: level_series(bars, window, min_reversal_x100, |p, close| {
            p.kind == PivotKind::Trough && p.value < close
        }),
    }
}

fn level_series(
    bars: &[OhlcvBar],
    window: usize,
    min_reversal_x100: u32,
    qualifies: impl Fn(&Pivot, f64) -> bool,
) -> Vec<IndicatorPoint> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let min_reversal_pct = min_reversal_x100 as f64 / 100.0;

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if window == 0 || i + 1 < window {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            let pivots = find_pivots(&closes[i + 1 - window..=i], min_reversal_pct);
            match pivots.iter().rev().find(|p| qualifies(p, bar.close)) {
                Some(p) => IndicatorPoint::simple(bar.timestamp, p.value),
                None => IndicatorPoint::undefined(bar.timestamp),
            }
        })
        .collect()
}
