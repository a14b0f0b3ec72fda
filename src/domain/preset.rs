//! The seven fixed preset strategies.
//!
//! Filtering presets are ordinary `Strategy` values built from `Condition`s,
//! so they run through the same evaluator as custom strategies. Top gainers
//! and losers rank instead of filtering; see `ranking`.

use std::fmt;
use std::str::FromStr;

use crate::domain::condition::{CompareOp, Condition, Operand};
use crate::domain::indicator::{IndicatorType, SlopeSource};
use crate::domain::strategy::{NamedOperand, Strategy};
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Ma44,
    Ma44CrossMa200,
    EmaCrossover,
    DownToMa200,
    MagnetEffect,
    TopGainers,
    TopLosers,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown preset '{0}' (expected one of MA44, MA44_CROSS_MA200, EMA_CROSSOVER, DOWN_TO_MA200, MAGNET_EFFECT, TOP_GAINERS, TOP_LOSERS)")]
pub struct UnknownPreset(pub String);

/// Tunable thresholds shared by the presets.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetParams {
    pub slope_window: usize,
    /// Down-to-MA200 requires the MA200 slope to stay below this.
    pub down_to_ma200_max_slope: f64,
    /// Magnet effect: maximum |resistance - close| / close, in percent.
    pub magnet_resistance_pct: f64,
    pub resistance_window: usize,
    pub zigzag_reversal_pct: f64,
    pub days: usize,
    pub top_n: usize,
}

impl Default for PresetParams {
    fn default() -> Self {
        Self {
            slope_window: 5,
            down_to_ma200_max_slope: 1.0,
            magnet_resistance_pct: 1.0,
            resistance_window: 30,
            zigzag_reversal_pct: 0.1,
            days: 7,
            top_n: 20,
        }
    }
}

/// Which end of the ranking a ranking preset keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    Descending,
    Ascending,
}

impl Preset {
    pub const ALL: [Preset; 7] = [
        Preset::Ma44,
        Preset::Ma44CrossMa200,
        Preset::EmaCrossover,
        Preset::DownToMa200,
        Preset::MagnetEffect,
        Preset::TopGainers,
        Preset::TopLosers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Ma44 => "MA44",
            Preset::Ma44CrossMa200 => "MA44_CROSS_MA200",
            Preset::EmaCrossover => "EMA_CROSSOVER",
            Preset::DownToMa200 => "DOWN_TO_MA200",
            Preset::MagnetEffect => "MAGNET_EFFECT",
            Preset::TopGainers => "TOP_GAINERS",
            Preset::TopLosers => "TOP_LOSERS",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Preset::Ma44 => "consolidation above a rising 44-period MA",
            Preset::Ma44CrossMa200 => "MA44 within 1% of MA200",
            Preset::EmaCrossover => "EMA10 within 0.05% of EMA30",
            Preset::DownToMa200 => "pullback to a flat or gently rising MA200",
            Preset::MagnetEffect => "close near resistance with a rising MA200",
            Preset::TopGainers => "largest % change over N days",
            Preset::TopLosers => "smallest % change over N days",
        }
    }

    /// Calendar days of daily history fetched for this preset.
    pub fn lookback_days(self) -> i64 {
        match self {
            Preset::Ma44 | Preset::EmaCrossover => 90,
            Preset::TopGainers | Preset::TopLosers => 30,
            Preset::Ma44CrossMa200 | Preset::DownToMa200 | Preset::MagnetEffect => 365,
        }
    }

    pub fn rank_order(self) -> Option<RankOrder> {
        match self {
            Preset::TopGainers => Some(RankOrder::Descending),
            Preset::TopLosers => Some(RankOrder::Ascending),
            _ => None,
        }
    }

    /// The condition set of a filtering preset; `None` for ranking presets.
    pub fn strategy(self, params: &PresetParams) -> Option<Strategy> {
        let sma = |p| Operand::indicator(IndicatorType::Sma(p));
        let ema = |p| Operand::indicator(IndicatorType::Ema(p));
        let slope_of_sma = |p| {
            Operand::indicator(IndicatorType::Slope {
                source: SlopeSource::Sma(p),
                window: params.slope_window,
            })
        };
        let lit = Operand::Constant;

        let (conditions, outputs) = match self {
            Preset::Ma44 => {
                let diff = Operand::pct_diff(sma(44), Operand::Close, sma(44));
                (
                    vec![
                        Condition::compare(slope_of_sma(44), CompareOp::Gt, lit(0.0)),
                        Condition::compare(
                            Operand::abs_pct_diff(sma(44), Operand::Close, sma(44)),
                            CompareOp::Lt,
                            lit(3.0),
                        ),
                        Condition::compare(Operand::Close, CompareOp::Gt, sma(44)),
                    ],
                    vec![
                        NamedOperand::new("ma44", sma(44)),
                        NamedOperand::new("slope", slope_of_sma(44)),
                        NamedOperand::new("diff_pct", diff),
                    ],
                )
            }
            Preset::Ma44CrossMa200 => (
                vec![Condition::compare(
                    Operand::abs_pct_diff(sma(44), sma(200), sma(200)),
                    CompareOp::Lt,
                    lit(1.0),
                )],
                vec![
                    NamedOperand::new("ma44", sma(44)),
                    NamedOperand::new("ma200", sma(200)),
                    NamedOperand::new("diff_pct", Operand::pct_diff(sma(44), sma(200), sma(200))),
                ],
            ),
            Preset::EmaCrossover => (
                vec![Condition::compare(
                    Operand::abs_pct_diff(ema(10), ema(30), ema(30)),
                    CompareOp::Lt,
                    lit(0.05),
                )],
                vec![
                    NamedOperand::new("ema10", ema(10)),
                    NamedOperand::new("ema30", ema(30)),
                    NamedOperand::new("diff_pct", Operand::pct_diff(ema(10), ema(30), ema(30))),
                ],
            ),
            Preset::DownToMa200 => {
                let diff = Operand::pct_diff(sma(200), Operand::Close, sma(200));
                (
                    vec![
                        Condition::compare(
                            Operand::abs_pct_diff(sma(200), Operand::Close, sma(200)),
                            CompareOp::Lt,
                            lit(3.0),
                        ),
                        Condition::compare(
                            slope_of_sma(200),
                            CompareOp::Lt,
                            lit(params.down_to_ma200_max_slope),
                        ),
                        Condition::compare(Operand::Close, CompareOp::Gt, sma(200)),
                    ],
                    vec![
                        NamedOperand::new("ma200", sma(200)),
                        NamedOperand::new("slope", slope_of_sma(200)),
                        NamedOperand::new("diff_pct", diff),
                    ],
                )
            }
            Preset::MagnetEffect => {
                let resistance = Operand::indicator(IndicatorType::Resistance {
                    window: params.resistance_window,
                    min_reversal_x100: (params.zigzag_reversal_pct * 100.0).round() as u32,
                });
                (
                    vec![
                        Condition::compare(slope_of_sma(200), CompareOp::Gt, lit(0.0)),
                        Condition::compare(Operand::Close, CompareOp::Gt, sma(44)),
                        Condition::compare(
                            Operand::abs_pct_diff(resistance.clone(), Operand::Close, Operand::Close),
                            CompareOp::Lt,
                            lit(params.magnet_resistance_pct),
                        ),
                    ],
                    vec![
                        NamedOperand::new("ma44", sma(44)),
                        NamedOperand::new("ma200_slope", slope_of_sma(200)),
                        NamedOperand::new("resistance", resistance.clone()),
                        NamedOperand::new(
                            "res_diff_pct",
                            Operand::pct_diff(resistance, Operand::Close, Operand::Close),
                        ),
                    ],
                )
            }
            Preset::TopGainers | Preset::TopLosers => return None,
        };

        Some(
            Strategy::new(self.as_str(), self.description(), Timeframe::Daily, conditions)
                .with_outputs(outputs),
        )
    }
}

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnknownPreset(s.trim().to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
