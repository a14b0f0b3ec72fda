//! Condition DSL parser.
//!
//! Recursive descent over the function-style grammar, e.g.
//! `ABOVE(close, SMA(44)); BELOW(ABS_PCT_DIFF(SMA(44), close, SMA(44)), 3)`.
//! Errors carry the byte offset of the offending token.

use crate::domain::condition::{
    CompareOp, Condition, CrossDirection, IndicatorField, IndicatorRef, Operand, RangeOp,
};
use crate::domain::error::ParseError;
use crate::domain::indicator::{IndicatorType, SlopeSource};

const COMPARATORS: [(&str, CompareOp); 5] = [
    ("ABOVE", CompareOp::Gt),
    ("BELOW", CompareOp::Lt),
    ("AT_LEAST", CompareOp::Ge),
    ("AT_MOST", CompareOp::Le),
    ("NEAR", CompareOp::Approx),
];

const SINGLE_PERIOD: [(&str, fn(usize) -> IndicatorType); 6] = [
    ("SMA", IndicatorType::Sma),
    ("EMA", IndicatorType::Ema),
    ("RSI", IndicatorType::Rsi),
    ("ATR", IndicatorType::Atr),
    ("ADX", IndicatorType::Adx),
    ("CCI", IndicatorType::Cci),
];

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch), self.pos)),
            None => Err(self.error(
                format!("expected '{}', found end of input", expected),
                self.pos,
            )),
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    /// Consumes the next identifier if there is one.
    fn take_word(&mut self) -> Option<String> {
        self.skip_whitespace();
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() || word.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        self.pos += word.len();
        Some(word)
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(self.error("expected number", start));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number: {}", num_str), start))
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("expected integer", start));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<usize>()
            .map_err(|_| self.error(format!("invalid integer: {}", num_str), start))
    }

    /// Non-negative decimal stored in hundredths (e.g. `2.5` -> 250).
    fn parse_hundredths(&mut self) -> Result<u32, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let value = self.parse_number()?;
        let text = self.input[start..self.pos].trim_start();
        if text.split_once('.').is_some_and(|(_, frac)| frac.len() > 2) {
            return Err(self.error(
                format!("{} has more than two decimal places", text),
                start,
            ));
        }
        if value < 0.0 || value > u32::MAX as f64 / 100.0 {
            return Err(self.error(format!("value out of range: {}", value), start));
        }
        Ok((value * 100.0).round() as u32)
    }

    fn parse_integers<const N: usize>(&mut self) -> Result<[usize; N], ParseError> {
        self.expect_char('(')?;
        let mut out = [0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            if i > 0 {
                self.expect_char(',')?;
            }
            *slot = self.parse_integer()?;
        }
        self.expect_char(')')?;
        Ok(out)
    }

    fn parse_slope_source(&mut self) -> Result<SlopeSource, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.take_word().as_deref() {
            Some("close") => Ok(SlopeSource::Close),
            Some("SMA") => Ok(SlopeSource::Sma(self.parse_integers::<1>()?[0])),
            Some("EMA") => Ok(SlopeSource::Ema(self.parse_integers::<1>()?[0])),
            other => Err(self.error(
                format!(
                    "expected slope source (close, SMA(n), EMA(n)), found '{}'",
                    other.unwrap_or("end of input")
                ),
                start,
            )),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        let start = self.pos;
        let Some(word) = self.take_word() else {
            return Err(self.error(format!("expected operand, found '{}'", self.peek_word()), start));
        };

        let with_field = |indicator_type, field| {
            Operand::Indicator(IndicatorRef {
                indicator_type,
                field,
            })
        };

        if let Some((_, make)) = SINGLE_PERIOD.iter().find(|(name, _)| *name == word) {
            let [period] = self.parse_integers::<1>()?;
            return Ok(Operand::indicator(make(period)));
        }

        let operand = match word.as_str() {
            "open" => Operand::Open,
            "high" => Operand::High,
            "low" => Operand::Low,
            "close" => Operand::Close,
            "volume" => Operand::Volume,
            "OBV" => Operand::indicator(IndicatorType::Obv),
            "MACD_LINE" | "MACD_SIGNAL" | "MACD_HISTOGRAM" => {
                let [fast, slow, signal] = self.parse_integers::<3>()?;
                let field = match word.as_str() {
                    "MACD_LINE" => IndicatorField::MacdLine,
                    "MACD_SIGNAL" => IndicatorField::MacdSignal,
                    _ => IndicatorField::MacdHistogram,
                };
                with_field(IndicatorType::Macd { fast, slow, signal }, field)
            }
            "STOCHASTIC_K" | "STOCHASTIC_D" => {
                let [k_period, d_period] = self.parse_integers::<2>()?;
                let field = if word == "STOCHASTIC_K" {
                    IndicatorField::StochasticK
                } else {
                    IndicatorField::StochasticD
                };
                with_field(IndicatorType::Stochastic { k_period, d_period }, field)
            }
            "BOLLINGER_UPPER" | "BOLLINGER_MIDDLE" | "BOLLINGER_LOWER" => {
                self.expect_char('(')?;
                let period = self.parse_integer()?;
                self.expect_char(',')?;
                let stddev_mult_x100 = self.parse_hundredths()?;
                self.expect_char(')')?;
                let field = match word.as_str() {
                    "BOLLINGER_UPPER" => IndicatorField::BollingerUpper,
                    "BOLLINGER_MIDDLE" => IndicatorField::BollingerMiddle,
                    _ => IndicatorField::BollingerLower,
                };
                with_field(
                    IndicatorType::Bollinger {
                        period,
                        stddev_mult_x100,
                    },
                    field,
                )
            }
            "SLOPE" => {
                self.expect_char('(')?;
                let source = self.parse_slope_source()?;
                self.expect_char(',')?;
                let window = self.parse_integer()?;
                self.expect_char(')')?;
                Operand::indicator(IndicatorType::Slope { source, window })
            }
            "RESISTANCE" | "SUPPORT" => {
                self.expect_char('(')?;
                let window = self.parse_integer()?;
                self.expect_char(',')?;
                let min_reversal_x100 = self.parse_hundredths()?;
                self.expect_char(')')?;
                Operand::indicator(if word == "RESISTANCE" {
                    IndicatorType::Resistance {
                        window,
                        min_reversal_x100,
                    }
                } else {
                    IndicatorType::Support {
                        window,
                        min_reversal_x100,
                    }
                })
            }
            "PCT_DIFF" | "ABS_PCT_DIFF" => {
                self.expect_char('(')?;
                let a = self.parse_operand()?;
                self.expect_char(',')?;
                let b = self.parse_operand()?;
                self.expect_char(',')?;
                let base = self.parse_operand()?;
                self.expect_char(')')?;
                if word == "PCT_DIFF" {
                    Operand::pct_diff(a, b, base)
                } else {
                    Operand::abs_pct_diff(a, b, base)
                }
            }
            _ => {
                return Err(self.error(format!("expected operand, found '{}'", word), start));
            }
        };
        Ok(operand)
    }

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(keyword) = self.take_word() else {
            return Err(self.error(format!("expected condition, found '{}'", self.peek_word()), start));
        };

        if let Some((_, op)) = COMPARATORS.iter().find(|(name, _)| *name == keyword) {
            let (left, right) = self.parse_pair()?;
            return Ok(Condition::compare(left, *op, right));
        }

        match keyword.as_str() {
            "CROSS_ABOVE" | "CROSS_BELOW" => {
                let direction = if keyword == "CROSS_ABOVE" {
                    CrossDirection::Above
                } else {
                    CrossDirection::Below
                };
                let (left, right) = self.parse_pair()?;
                Ok(Condition::cross(left, direction, right))
            }
            "BETWEEN" | "NOT_BETWEEN" => {
                let op = if keyword == "BETWEEN" {
                    RangeOp::Between
                } else {
                    RangeOp::NotBetween
                };
                self.expect_char('(')?;
                let left = self.parse_operand()?;
                self.expect_char(',')?;
                let lower = self.parse_number()?;
                self.expect_char(',')?;
                let upper = self.parse_number()?;
                self.expect_char(')')?;
                Ok(Condition::range(left, op, lower, upper))
            }
            _ => Err(self.error(format!("expected condition, found '{}'", keyword), start)),
        }
    }

    fn parse_pair(&mut self) -> Result<(Operand, Operand), ParseError> {
        self.expect_char('(')?;
        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;
        Ok((left, right))
    }

    fn parse_list(&mut self) -> Result<Vec<Condition>, ParseError> {
        let mut conditions = vec![self.parse_condition()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(';') => {
                    self.advance();
                    self.skip_whitespace();
                    if self.peek().is_none() {
                        break;
                    }
                    conditions.push(self.parse_condition()?);
                }
                Some(_) => {
                    return Err(self.error(
                        format!("unexpected input after condition: '{}'", self.remaining()),
                        self.pos,
                    ));
                }
            }
        }
        Ok(conditions)
    }
}

/// Parses a single condition; trailing input is an error.
pub fn parse_condition(input: &str) -> Result<Condition, ParseError> {
    let mut parser = Parser::new(input);
    let condition = parser.parse_condition()?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(parser.error(
            format!("unexpected input after condition: '{}'", parser.remaining()),
            parser.pos,
        ));
    }
    Ok(condition)
}

/// Parses a `;`-separated list of conditions (a trailing `;` is allowed).
pub fn parse_conditions(input: &str) -> Result<Vec<Condition>, ParseError> {
    Parser::new(input).parse_list()
}
