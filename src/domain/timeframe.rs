//! Bar timeframes and their default fetch lookback.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Min1,
    Min3,
    Min5,
    Min10,
    Min15,
    Min30,
    Hour1,
    Hour2,
    Hour4,
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown timeframe '{0}' (expected one of 1m, 3m, 5m, 10m, 15m, 30m, 1h, 2h, 4h, 1D, 1W, 1M)")]
pub struct UnknownTimeframe(pub String);

impl Timeframe {
    pub const ALL: [Timeframe; 12] = [
        Timeframe::Min1,
        Timeframe::Min3,
        Timeframe::Min5,
        Timeframe::Min10,
        Timeframe::Min15,
        Timeframe::Min30,
        Timeframe::Hour1,
        Timeframe::Hour2,
        Timeframe::Hour4,
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
    ];

    /// Calendar days of history fetched for a scan on this timeframe.
    pub fn lookback_days(self) -> i64 {
        match self {
            Timeframe::Min1 => 7,
            Timeframe::Min3 => 15,
            Timeframe::Min5 => 30,
            Timeframe::Min10 => 60,
            Timeframe::Min15 | Timeframe::Min30 => 90,
            Timeframe::Hour1 => 180,
            Timeframe::Hour2 | Timeframe::Hour4 | Timeframe::Daily => 365,
            Timeframe::Weekly => 730,
            Timeframe::Monthly => 1825,
        }
    }

    pub fn is_intraday(self) -> bool {
        !matches!(
            self,
            Timeframe::Daily | Timeframe::Weekly | Timeframe::Monthly
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::Min1 => "1m",
            Timeframe::Min3 => "3m",
            Timeframe::Min5 => "5m",
            Timeframe::Min10 => "10m",
            Timeframe::Min15 => "15m",
            Timeframe::Min30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour2 => "2h",
            Timeframe::Hour4 => "4h",
            Timeframe::Daily => "1D",
            Timeframe::Weekly => "1W",
            Timeframe::Monthly => "1M",
        }
    }
}

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == trimmed)
            .ok_or_else(|| UnknownTimeframe(trimmed.to_string()))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_sensitive_minute_and_month() {
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::Min1);
        assert_eq!("1M".parse::<Timeframe>().unwrap(), Timeframe::Monthly);
        assert_eq!(" 1D ".parse::<Timeframe>().unwrap(), Timeframe::Daily);
    }

    #[test]
    fn rejects_unknown() {
        let err = "2d".parse::<Timeframe>().unwrap_err();
        assert_eq!(err, UnknownTimeframe("2d".into()));
    }

    #[test]
    fn lookback_grows_with_bar_size() {
        assert_eq!(Timeframe::Min1.lookback_days(), 7);
        assert_eq!(Timeframe::Hour1.lookback_days(), 180);
        assert_eq!(Timeframe::Daily.lookback_days(), 365);
        assert_eq!(Timeframe::Monthly.lookback_days(), 1825);
    }

    #[test]
    fn intraday_split() {
        assert!(Timeframe::Min15.is_intraday());
        assert!(Timeframe::Hour4.is_intraday());
        assert!(!Timeframe::Daily.is_intraday());
        assert!(!Timeframe::Monthly.is_intraday());
    }
}
