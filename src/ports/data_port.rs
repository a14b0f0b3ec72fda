//! Market data port.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;

/// Source of bar series. Implementations own connection handling and any
/// retry policy; the scan engine only bounds how many fetches run at once.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Bars for `code` whose timestamps fall on `start..=end`, ascending.
    async fn fetch_bars(
        &self,
        code: &str,
        exchange: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScreenerError>;

    async fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, ScreenerError>;
}
