//! Percentage-change ranking for the top gainers / top losers presets.

use std::cmp::Ordering;

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::preset::RankOrder;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedSymbol {
    pub symbol: String,
    pub current_price: f64,
    pub change_pct: f64,
}

/// `(close[last] - close[last - days]) / close[last - days] × 100`.
///
/// `None` when the series has fewer than `days + 1` bars.
pub fn percent_change(bars: &[OhlcvBar], days: usize) -> Option<f64> {
    let last = bars.len().checked_sub(1)?;
    let from = last.checked_sub(days)?;
    let start = bars[from].close;
    let end = bars[last].close;
    if start == 0.0 {
        return None;
    }
    Some((end - start) / start * 100.0)
}

/// Sorts by change in the requested order, ties by symbol ascending, and keeps
/// the first `top_n`.
pub fn rank(mut entries: Vec<RankedSymbol>, order: RankOrder, top_n: usize) -> Vec<RankedSymbol> {
    entries.sort_by(|a, b| {
        let by_change = match order {
            RankOrder::Descending => b.change_pct.total_cmp(&a.change_pct),
            RankOrder::Ascending => a.change_pct.total_cmp(&b.change_pct),
        };
        match by_change {
            Ordering::Equal => a.symbol.cmp(&b.symbol),
            other => other,
        }
    });
    entries.truncate(top_n);
    entries
}
