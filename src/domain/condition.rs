//! Condition AST.
//!
//! - `Operand`: what can be compared (price fields, literals, indicator lines,
//!   percentage differences between operands)
//! - `Comparison`: the operator together with the right-hand shape it needs,
//!   so a range operator always carries two bounds and a comparator exactly one
//! - `Condition`: left operand plus comparison
//!
//! `Display` renders every type back into the text form the condition parser
//! reads.

use std::fmt;

use crate::domain::indicator::IndicatorType;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Constant(f64),
    Indicator(IndicatorRef),
    /// (a - b) / base × 100, or its absolute value.
    PercentDiff {
        a: Box<Operand>,
        b: Box<Operand>,
        base: Box<Operand>,
        absolute: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    StochasticK,
    StochasticD,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    /// Within 0.1% of the right-hand side.
    Approx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossDirection {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Between,
    NotBetween,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Compare { op: CompareOp, right: Operand },
    Cross { direction: CrossDirection, right: Operand },
    Range { op: RangeOp, lower: f64, upper: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: Operand,
    pub comparison: Comparison,
}

impl Operand {
    pub fn indicator(indicator_type: IndicatorType) -> Self {
        Operand::Indicator(IndicatorRef {
            indicator_type,
            field: IndicatorField::Value,
        })
    }

    pub fn pct_diff(a: Operand, b: Operand, base: Operand) -> Self {
        Operand::PercentDiff {
            a: Box::new(a),
            b: Box::new(b),
            base: Box::new(base),
            absolute: false,
        }
    }

    pub fn abs_pct_diff(a: Operand, b: Operand, base: Operand) -> Self {
        Operand::PercentDiff {
            a: Box::new(a),
            b: Box::new(b),
            base: Box::new(base),
            absolute: true,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Constant(_))
    }

    /// Bars needed before this operand can be read at the last one.
    pub fn min_bars(&self) -> usize {
        match self {
            Operand::Indicator(r) => r.indicator_type.min_bars(),
            Operand::PercentDiff { a, b, base, .. } => {
                a.min_bars().max(b.min_bars()).max(base.min_bars())
            }
            _ => 1,
        }
    }

    pub fn collect_indicators(&self, out: &mut Vec<IndicatorType>) {
        match self {
            Operand::Indicator(r) => {
                if !out.contains(&r.indicator_type) {
                    out.push(r.indicator_type.clone());
                }
            }
            Operand::PercentDiff { a, b, base, .. } => {
                a.collect_indicators(out);
                b.collect_indicators(out);
                base.collect_indicators(out);
            }
            _ => {}
        }
    }

    /// Operands nested inside this one, this one included.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Operand)) {
        visit(self);
        if let Operand::PercentDiff { a, b, base, .. } = self {
            a.walk(visit);
            b.walk(visit);
            base.walk(visit);
        }
    }
}

impl Comparison {
    pub fn right_operand(&self) -> Option<&Operand> {
        match self {
            Comparison::Compare { right, .. } | Comparison::Cross { right, .. } => Some(right),
            Comparison::Range { .. } => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Comparison::Compare { op, .. } => match op {
                CompareOp::Gt => "ABOVE",
                CompareOp::Lt => "BELOW",
                CompareOp::Ge => "AT_LEAST",
                CompareOp::Le => "AT_MOST",
                CompareOp::Approx => "NEAR",
            },
            Comparison::Cross { direction, .. } => match direction {
                CrossDirection::Above => "CROSS_ABOVE",
                CrossDirection::Below => "CROSS_BELOW",
            },
            Comparison::Range { op, .. } => match op {
                RangeOp::Between => "BETWEEN",
                RangeOp::NotBetween => "NOT_BETWEEN",
            },
        }
    }
}

impl Condition {
    pub fn compare(left: Operand, op: CompareOp, right: Operand) -> Self {
        Self {
            left,
            comparison: Comparison::Compare { op, right },
        }
    }

    pub fn cross(left: Operand, direction: CrossDirection, right: Operand) -> Self {
        Self {
            left,
            comparison: Comparison::Cross { direction, right },
        }
    }

    pub fn range(left: Operand, op: RangeOp, lower: f64, upper: f64) -> Self {
        Self {
            left,
            comparison: Comparison::Range { op, lower, upper },
        }
    }

    pub fn is_cross(&self) -> bool {
        matches!(self.comparison, Comparison::Cross { .. })
    }

    /// Bars needed to evaluate at the last bar; a cross also reads the bar before.
    pub fn min_bars(&self) -> usize {
        let operands = self
            .comparison
            .right_operand()
            .map_or(0, Operand::min_bars)
            .max(self.left.min_bars());
        if self.is_cross() {
            operands + 1
        } else {
            operands
        }
    }

    pub fn collect_indicators(&self, out: &mut Vec<IndicatorType>) {
        self.left.collect_indicators(out);
        if let Some(right) = self.comparison.right_operand() {
            right.collect_indicators(out);
        }
    }
}

impl fmt::Display for IndicatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.indicator_type;
        match (self.field, t) {
            (IndicatorField::Value, _) => write!(f, "{}", t),
            (
                IndicatorField::MacdLine | IndicatorField::MacdSignal | IndicatorField::MacdHistogram,
                IndicatorType::Macd { fast, slow, signal },
            ) => {
                let name = match self.field {
                    IndicatorField::MacdLine => "MACD_LINE",
                    IndicatorField::MacdSignal => "MACD_SIGNAL",
                    _ => "MACD_HISTOGRAM",
                };
                write!(f, "{}({},{},{})", name, fast, slow, signal)
            }
            (
                IndicatorField::StochasticK | IndicatorField::StochasticD,
                IndicatorType::Stochastic { k_period, d_period },
            ) => {
                let name = match self.field {
                    IndicatorField::StochasticK => "STOCHASTIC_K",
                    _ => "STOCHASTIC_D",
                };
                write!(f, "{}({},{})", name, k_period, d_period)
            }
            (
                IndicatorField::BollingerUpper
                | IndicatorField::BollingerMiddle
                | IndicatorField::BollingerLower,
                IndicatorType::Bollinger {
                    period,
                    stddev_mult_x100,
                },
            ) => {
                let name = match self.field {
                    IndicatorField::BollingerUpper => "BOLLINGER_UPPER",
                    IndicatorField::BollingerMiddle => "BOLLINGER_MIDDLE",
                    _ => "BOLLINGER_LOWER",
                };
                write!(
                    f,
                    "{}({},{})",
                    name,
                    period,
                    *stddev_mult_x100 as f64 / 100.0
                )
            }
            // Mismatched field/kind never passes validation; render something readable.
            (field, t) => write!(f, "{}.{:?}", t, field),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Open => write!(f, "open"),
            Operand::High => write!(f, "high"),
            Operand::Low => write!(f, "low"),
            Operand::Close => write!(f, "close"),
            Operand::Volume => write!(f, "volume"),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Indicator(r) => write!(f, "{}", r),
            Operand::PercentDiff {
                a,
                b,
                base,
                absolute,
            } => {
                let name = if *absolute { "ABS_PCT_DIFF" } else { "PCT_DIFF" };
                write!(f, "{}({},{},{})", name, a, b, base)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = self.comparison.keyword();
        match &self.comparison {
            Comparison::Compare { right, .. } | Comparison::Cross { right, .. } => {
                write!(f, "{}({}, {})", keyword, self.left, right)
            }
            Comparison::Range { lower, upper, .. } => {
                write!(f, "{}({}, {}, {})", keyword, self.left, lower, upper)
            }
        }
    }
}
