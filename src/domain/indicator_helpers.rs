//! Per-symbol indicator computation with dependency reuse.

use std::collections::HashMap;

use crate::domain::indicator::{self, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

/// Computes every requested indicator (and anything they derive from) once.
///
/// Slopes are derived from their source's series; when that source was
/// already computed it is reused rather than recalculated.
pub fn compute_indicators(
    bars: &[OhlcvBar],
    required: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut cache: HashMap<IndicatorType, IndicatorSeries> = HashMap::new();
    for indicator_type in required {
        compute_into(bars, indicator_type, &mut cache);
    }
    cache
}

fn compute_into(
    bars: &[OhlcvBar],
    indicator_type: &IndicatorType,
    cache: &mut HashMap<IndicatorType, IndicatorSeries>,
) {
    if cache.contains_key(indicator_type) {
        return;
    }
    for dep in indicator_type.dependencies() {
        compute_into(bars, &dep, cache);
    }

    let series = match *indicator_type {
        IndicatorType::Slope { source, window } => {
            let source_series = source.indicator_type().and_then(|t| cache.get(&t));
            indicator::calculate_slope(bars, source, source_series, window)
        }
        _ => indicator::calculate(indicator_type, bars),
    };
    cache.insert(indicator_type.clone(), series);
}
