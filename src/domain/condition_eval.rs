//! Condition evaluation against bars and pre-computed indicator series.
//!
//! # Evaluation Semantics
//!
//! - Every operand resolves to a `Reading`: a defined number, undefined
//!   (warm-up, zero-range, zero percentage base) or not computed (the series
//!   was never requested). Only defined readings are compared.
//! - A condition with any non-defined reading is `NoData`, which never counts
//!   as a pass.
//! - `CROSS_ABOVE`/`CROSS_BELOW` read both sides at `index - 1` as well and are
//!   `NoData` at index 0.

use std::collections::HashMap;
use std::fmt;

use crate::domain::condition::{
    CompareOp, Comparison, Condition, CrossDirection, IndicatorField, IndicatorRef, Operand,
    RangeOp,
};
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

/// Relative tolerance of `NEAR`.
pub const APPROX_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Defined(f64),
    Undefined,
    NotComputed,
}

impl Reading {
    pub fn value(self) -> Option<f64> {
        match self {
            Reading::Defined(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    /// At least one operand had no defined value at the bars read.
    NoData,
}

impl Outcome {
    pub fn passed(self) -> bool {
        self == Outcome::Passed
    }

    fn from_bool(pass: bool) -> Self {
        if pass { Outcome::Passed } else { Outcome::Failed }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "pass"),
            Outcome::Failed => write!(f, "fail"),
            Outcome::NoData => write!(f, "no-data"),
        }
    }
}

pub type IndicatorMap = HashMap<IndicatorType, IndicatorSeries>;

pub fn evaluate(
    condition: &Condition,
    bars: &[OhlcvBar],
    indicators: &IndicatorMap,
    index: usize,
) -> Outcome {
    let read = |operand: &Operand, i: usize| resolve(operand, bars, indicators, i).value();

    match &condition.comparison {
        Comparison::Compare { op, right } => {
            let (Some(l), Some(r)) = (read(&condition.left, index), read(right, index)) else {
                return Outcome::NoData;
            };
            Outcome::from_bool(compare(*op, l, r))
        }
        Comparison::Cross { direction, right } => {
            if index == 0 {
                return Outcome::NoData;
            }
            let readings = (
                read(&condition.left, index - 1),
                read(right, index - 1),
                read(&condition.left, index),
                read(right, index),
            );
            let (Some(l_prev), Some(r_prev), Some(l), Some(r)) = readings else {
                return Outcome::NoData;
            };
            Outcome::from_bool(match direction {
                CrossDirection::Above => l_prev <= r_prev && l > r,
                CrossDirection::Below => l_prev >= r_prev && l < r,
            })
        }
        Comparison::Range { op, lower, upper } => {
            let Some(v) = read(&condition.left, index) else {
                return Outcome::NoData;
            };
            let inside = *lower <= v && v <= *upper;
            Outcome::from_bool(match op {
                RangeOp::Between => inside,
                RangeOp::NotBetween => !inside,
            })
        }
    }
}

/// Evaluates every condition at `index`, in order.
pub fn evaluate_all(
    conditions: &[Condition],
    bars: &[OhlcvBar],
    indicators: &IndicatorMap,
    index: usize,
) -> Vec<Outcome> {
    conditions
        .iter()
        .map(|c| evaluate(c, bars, indicators, index))
        .collect()
}

fn compare(op: CompareOp, l: f64, r: f64) -> bool {
    match op {
        CompareOp::Gt => l > r,
        CompareOp::Lt => l < r,
        CompareOp::Ge => l >= r,
        CompareOp::Le => l <= r,
        CompareOp::Approx => (l - r).abs() <= APPROX_TOLERANCE * r.abs(),
    }
}

pub fn resolve(
    operand: &Operand,
    bars: &[OhlcvBar],
    indicators: &IndicatorMap,
    index: usize,
) -> Reading {
    let bar = match bars.get(index) {
        Some(bar) => bar,
        None => return Reading::Undefined,
    };
    match operand {
        Operand::Open => Reading::Defined(bar.open),
        Operand::High => Reading::Defined(bar.high),
        Operand::Low => Reading::Defined(bar.low),
        Operand::Close => Reading::Defined(bar.close),
        Operand::Volume => Reading::Defined(bar.volume as f64),
        Operand::Constant(v) => Reading::Defined(*v),
        Operand::Indicator(ind_ref) => resolve_indicator(ind_ref, indicators, index),
        Operand::PercentDiff {
            a,
            b,
            base,
            absolute,
        } => {
            let readings = [
                resolve(a, bars, indicators, index),
                resolve(b, bars, indicators, index),
                resolve(base, bars, indicators, index),
            ];
            if let Some(missing) = readings.iter().find(|r| **r == Reading::NotComputed) {
                return *missing;
            }
            match readings {
                [Reading::Defined(a), Reading::Defined(b), Reading::Defined(base)]
                    if base != 0.0 =>
                {
                    let pct = (a - b) / base * 100.0;
                    Reading::Defined(if *absolute { pct.abs() } else { pct })
                }
                _ => Reading::Undefined,
            }
        }
    }
}

fn resolve_indicator(ind_ref: &IndicatorRef, indicators: &IndicatorMap, index: usize) -> Reading {
    let Some(series) = indicators.get(&ind_ref.indicator_type) else {
        return Reading::NotComputed;
    };
    let Some(value) = series.value_at(index) else {
        return Reading::Undefined;
    };

    let picked = match (ind_ref.field, value) {
        (IndicatorField::Value, IndicatorValue::Simple(v)) => Some(*v),
        (IndicatorField::MacdLine, IndicatorValue::Macd { line, .. }) => Some(*line),
        (IndicatorField::MacdSignal, IndicatorValue::Macd { signal, .. }) => Some(*signal),
        (IndicatorField::MacdHistogram, IndicatorValue::Macd { histogram, .. }) => Some(*histogram),
        (IndicatorField::StochasticK, IndicatorValue::Stochastic { k, .. }) => Some(*k),
        (IndicatorField::StochasticD, IndicatorValue::Stochastic { d, .. }) => Some(*d),
        (IndicatorField::BollingerUpper, IndicatorValue::Bollinger { upper, .. }) => Some(*upper),
        (IndicatorField::BollingerMiddle, IndicatorValue::Bollinger { middle, .. }) => {
            Some(*middle)
        }
        (IndicatorField::BollingerLower, IndicatorValue::Bollinger { lower, .. }) => Some(*lower),
        _ => None,
    };
    picked.map_or(Reading::Undefined, Reading::Defined)
}
