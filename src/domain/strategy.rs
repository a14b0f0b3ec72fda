//! Strategy definition: an ordered list of conditions combined with AND.

use crate::domain::condition::{Condition, Operand};
use crate::domain::indicator::IndicatorType;
use crate::domain::timeframe::Timeframe;

/// A value reported alongside a scan result under a display name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedOperand {
    pub name: String,
    pub operand: Operand,
}

impl NamedOperand {
    pub fn new(name: impl Into<String>, operand: Operand) -> Self {
        Self {
            name: name.into(),
            operand,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    /// Assigned by the strategy store; `None` for inline and preset strategies.
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub timeframe: Timeframe,
    pub conditions: Vec<Condition>,
    pub outputs: Vec<NamedOperand>,
}

impl Strategy {
    /// Builds a strategy that reports every non-literal operand its
    /// conditions compare.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        timeframe: Timeframe,
        conditions: Vec<Condition>,
    ) -> Self {
        let outputs = default_outputs(&conditions);
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            timeframe,
            conditions,
            outputs,
        }
    }

    pub fn with_outputs(mut self, outputs: Vec<NamedOperand>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Indicators referenced by conditions or outputs, first use first.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        let mut out = Vec::new();
        for condition in &self.conditions {
            condition.collect_indicators(&mut out);
        }
        for output in &self.outputs {
            output.operand.collect_indicators(&mut out);
        }
        out
    }

    /// Bars needed for every condition to be readable at the last bar.
    pub fn min_bars(&self) -> usize {
        self.conditions
            .iter()
            .map(Condition::min_bars)
            .max()
            .unwrap_or(1)
    }

    /// Conditions in DSL form, `; `-separated.
    pub fn conditions_text(&self) -> String {
        self.conditions
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn default_outputs(conditions: &[Condition]) -> Vec<NamedOperand> {
    let mut outputs: Vec<NamedOperand> = Vec::new();
    let operands = conditions
        .iter()
        .flat_map(|c| std::iter::once(&c.left).chain(c.comparison.right_operand()));
    for operand in operands {
        if operand.is_constant() {
            continue;
        }
        let name = operand.to_string();
        if outputs.iter().all(|o| o.name != name) {
            outputs.push(NamedOperand::new(name, operand.clone()));
        }
    }
    outputs
}
