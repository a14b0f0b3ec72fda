//! Strategy validation, run before a strategy is stored or scanned.
//!
//! Rejects shapes the evaluator could only ever answer with "no data":
//! zero periods, inverted ranges, crosses against a literal, and fields that
//! do not belong to their indicator.

use crate::domain::condition::{Comparison, Condition, IndicatorField, IndicatorRef, Operand};
use crate::domain::indicator::{IndicatorType, SlopeSource};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("strategy name must not be empty")]
    EmptyName,

    #[error("strategy must have at least one condition")]
    NoConditions,

    #[error("condition {index}: {indicator}: {reason}")]
    InvalidIndicator {
        index: usize,
        indicator: String,
        reason: String,
    },

    #[error("condition {index}: lower bound {lower} is above upper bound {upper}")]
    InvertedRange { index: usize, lower: f64, upper: f64 },

    #[error("condition {index}: {keyword} needs a series on the right, found literal {value}")]
    CrossWithLiteral {
        index: usize,
        keyword: &'static str,
        value: f64,
    },

    #[error("condition {index}: {field:?} is not a line of {indicator}")]
    FieldMismatch {
        index: usize,
        field: IndicatorField,
        indicator: String,
    },

    #[error("condition {index}: literal must be finite")]
    NonFiniteLiteral { index: usize },
}

pub fn validate_strategy(strategy: &Strategy) -> Result<(), StrategyError> {
    if strategy.name.trim().is_empty() {
        return Err(StrategyError::EmptyName);
    }
    validate_conditions(&strategy.conditions)
}

/// Condition indices in errors are 1-based.
pub fn validate_conditions(conditions: &[Condition]) -> Result<(), StrategyError> {
    if conditions.is_empty() {
        return Err(StrategyError::NoConditions);
    }
    for (i, condition) in conditions.iter().enumerate() {
        validate_condition(i + 1, condition)?;
    }
    Ok(())
}

fn validate_condition(index: usize, condition: &Condition) -> Result<(), StrategyError> {
    match &condition.comparison {
        Comparison::Range { lower, upper, .. } => {
            if !lower.is_finite() || !upper.is_finite() {
                return Err(StrategyError::NonFiniteLiteral { index });
            }
            if lower > upper {
                return Err(StrategyError::InvertedRange {
                    index,
                    lower: *lower,
                    upper: *upper,
                });
            }
        }
        Comparison::Cross { right, .. } => {
            if let Operand::Constant(value) = right {
                return Err(StrategyError::CrossWithLiteral {
                    index,
                    keyword: condition.comparison.keyword(),
                    value: *value,
                });
            }
        }
        Comparison::Compare { .. } => {}
    }

    let mut result = Ok(());
    let mut check = |operand: &Operand| {
        if result.is_ok() {
            result = validate_operand(index, operand);
        }
    };
    condition.left.walk(&mut check);
    if let Some(right) = condition.comparison.right_operand() {
        right.walk(&mut check);
    }
    result
}

fn validate_operand(index: usize, operand: &Operand) -> Result<(), StrategyError> {
    match operand {
        Operand::Constant(v) if !v.is_finite() => Err(StrategyError::NonFiniteLiteral { index }),
        Operand::Indicator(r) => {
            check_field(index, r)?;
            check_parameters(&r.indicator_type).map_err(|reason| {
                StrategyError::InvalidIndicator {
                    index,
                    indicator: r.indicator_type.to_string(),
                    reason,
                }
            })
        }
        _ => Ok(()),
    }
}

fn check_field(index: usize, r: &IndicatorRef) -> Result<(), StrategyError> {
    let ok = match r.indicator_type {
        IndicatorType::Macd { .. } => matches!(
            r.field,
            IndicatorField::MacdLine | IndicatorField::MacdSignal | IndicatorField::MacdHistogram
        ),
        IndicatorType::Stochastic { .. } => matches!(
            r.field,
            IndicatorField::StochasticK | IndicatorField::StochasticD
        ),
        IndicatorType::Bollinger { .. } => matches!(
            r.field,
            IndicatorField::BollingerUpper
                | IndicatorField::BollingerMiddle
                | IndicatorField::BollingerLower
        ),
        _ => r.field == IndicatorField::Value,
    };
    if ok {
        Ok(())
    } else {
        Err(StrategyError::FieldMismatch {
            index,
            field: r.field,
            indicator: r.indicator_type.to_string(),
        })
    }
}

/// Largest period or window a strategy may reference.
pub const MAX_PERIOD: usize = 10_000;

fn check_parameters(indicator_type: &IndicatorType) -> Result<(), String> {
    let period = |value: usize, what: &str| {
        if value == 0 {
            Err(format!("{} must be positive", what))
        } else if value > MAX_PERIOD {
            Err(format!("{} {} exceeds {}", what, value, MAX_PERIOD))
        } else {
            Ok(())
        }
    };
    let window = |value: usize| {
        if value < 2 {
            Err("window must be at least 2".to_string())
        } else {
            period(value, "window")
        }
    };

    match *indicator_type {
        IndicatorType::Sma(p)
        | IndicatorType::Ema(p)
        | IndicatorType::Rsi(p)
        | IndicatorType::Atr(p)
        | IndicatorType::Adx(p)
        | IndicatorType::Cci(p) => period(p, "period"),
        IndicatorType::Obv => Ok(()),
        IndicatorType::Macd { fast, slow, signal } => {
            period(fast, "fast period")?;
            period(slow, "slow period")?;
            period(signal, "signal period")?;
            if fast >= slow {
                return Err(format!(
                    "fast period {} must be below slow period {}",
                    fast, slow
                ));
            }
            Ok(())
        }
        IndicatorType::Stochastic { k_period, d_period } => {
            period(k_period, "%K period")?;
            period(d_period, "%D period")
        }
        IndicatorType::Bollinger { period: p, .. } => period(p, "period"),
        IndicatorType::Slope { source, window: w } => {
            match source {
                SlopeSource::Sma(p) | SlopeSource::Ema(p) => period(p, "source period")?,
                SlopeSource::Close => {}
            }
            if w < 2 {
                return Err("slope window must be at least 2".to_string());
            }
            period(w, "slope window")
        }
        IndicatorType::Resistance {
            window: w,
            min_reversal_x100,
        }
        | IndicatorType::Support {
            window: w,
            min_reversal_x100,
        } => {
            window(w)?;
            if min_reversal_x100 == 0 {
                return Err("minimum reversal must be positive".to_string());
            }
            Ok(())
        }
    }
}
