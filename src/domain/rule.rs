//! Rule AST data structures.
//!
//! This module defines the abstract syntax tree for signal conditions:
//! - `Operand`: What can be compared (price fields, candle shape, constants,
//!   indicators, lagged and scaled operands)
//! - `IndicatorRef`: Reference to an indicator with a specific field
//! - `IndicatorField`: Which field of a multi-value indicator to use
//! - `Rule`: The rule AST with comparison, composite, count-threshold,
//!   temporal and candle-pattern variants
//!
//! `Display` prints a rule back in the textual rule language, so
//! `rule_parser::parse(&rule.to_string())` yields the same tree.

use std::fmt;

use crate::domain::indicator::IndicatorType;
use crate::domain::pattern::CandlePattern;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Body,
    Range,
    UpperWick,
    LowerWick,
    BodyTop,
    BodyBottom,
    Constant(f64),
    Indicator(IndicatorRef),
    /// Value of `operand` `bars` bars ago.
    Shift { operand: Box<Operand>, bars: usize },
    Scaled { operand: Box<Operand>, factor: f64 },
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
    StochRsiK,
    StochRsiD,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    CrossBelow {
        left: Operand,
        right: Operand,
    },
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    Equals {
        left: Operand,
        right: Operand,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    /// True when at least `threshold` of `rules` are true.
    AtLeast {
        threshold: usize,
        rules: Vec<Rule>,
    },
    Consecutive {
        rule: Box<Rule>,
        count: usize,
    },
    AnyOf {
        rule: Box<Rule>,
        count: usize,
    },
    Pattern(CandlePattern),
}

impl Operand {
    /// Shorthand for an indicator operand.
    pub fn indicator(indicator_type: IndicatorType, field: IndicatorField) -> Self {
        Operand::Indicator(IndicatorRef {
            indicator_type,
            field,
        })
    }

    pub fn shift(self, bars: usize) -> Self {
        Operand::Shift {
            operand: Box::new(self),
            bars,
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Operand::Scaled {
            operand: Box::new(self),
            factor,
        }
    }

    fn collect_indicators(&self, out: &mut Vec<IndicatorType>) {
        match self {
            Operand::Indicator(r) => {
                if !out.contains(&r.indicator_type) {
                    out.push(r.indicator_type.clone());
                }
            }
            Operand::Shift { operand, .. } | Operand::Scaled { operand, .. } => {
                operand.collect_indicators(out)
            }
            _ => {}
        }
    }
}

impl Rule {
    fn collect_indicators(&self, out: &mut Vec<IndicatorType>) {
        match self {
            Rule::CrossAbove { left, right }
            | Rule::CrossBelow { left, right }
            | Rule::Above { left, right }
            | Rule::Below { left, right }
            | Rule::Equals { left, right } => {
                left.collect_indicators(out);
                right.collect_indicators(out);
            }
            Rule::Between { operand, .. } => operand.collect_indicators(out),
            Rule::And(rules) | Rule::Or(rules) | Rule::AtLeast { rules, .. } => {
                for r in rules {
                    r.collect_indicators(out);
                }
            }
            Rule::Not(rule) | Rule::Consecutive { rule, .. } | Rule::AnyOf { rule, .. } => {
                rule.collect_indicators(out)
            }
            Rule::Pattern(_) => {}
        }
    }
}

/// Every indicator a rule references, in first-seen order, without duplicates.
pub fn extract_indicators(rule: &Rule) -> Vec<IndicatorType> {
    let mut out = Vec::new();
    rule.collect_indicators(&mut out);
    out
}

fn field_name(field: IndicatorField) -> &'static str {
    match field {
        IndicatorField::Value => "",
        IndicatorField::MacdLine => "MACD_LINE",
        IndicatorField::MacdSignal => "MACD_SIGNAL",
        IndicatorField::MacdHistogram => "MACD_HISTOGRAM",
        IndicatorField::StochRsiK => "STOCH_RSI_K",
        IndicatorField::StochRsiD => "STOCH_RSI_D",
        IndicatorField::BollingerUpper => "BOLLINGER_UPPER",
        IndicatorField::BollingerMiddle => "BOLLINGER_MIDDLE",
        IndicatorField::BollingerLower => "BOLLINGER_LOWER",
    }
}

impl fmt::Display for IndicatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = field_name(self.field);
        match &self.indicator_type {
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "{}({},{},{})", name, fast, slow, signal)
            }
            IndicatorType::StochRsi {
                rsi_period,
                k_period,
                d_period,
            } => write!(f, "{}({},{},{})", name, rsi_period, k_period, d_period),
            IndicatorType::Bollinger {
                period,
                up_x100,
                down_x100,
            } => write!(
                f,
                "{}({},{},{})",
                name,
                period,
                *up_x100 as f64 / 100.0,
                *down_x100 as f64 / 100.0
            ),
            other => write!(f, "{}", other),
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
            Operand::Body => write!(f, "body"),
            Operand::Range => write!(f, "range"),
            Operand::UpperWick => write!(f, "upper_wick"),
            Operand::LowerWick => write!(f, "lower_wick"),
            Operand::BodyTop => write!(f, "body_top"),
            Operand::BodyBottom => write!(f, "body_bottom"),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Indicator(r) => write!(f, "{}", r),
            Operand::Shift { operand, bars } => write!(f, "SHIFT({}, {})", operand, bars),
            Operand::Scaled { operand, factor } => write!(f, "MUL({}, {})", operand, factor),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, rules: &[Rule]) -> fmt::Result {
    for (i, r) in rules.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", r)?;
    }
    Ok(())
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::CrossAbove { left, right } => write!(f, "CROSS_ABOVE({}, {})", left, right),
            Rule::CrossBelow { left, right } => write!(f, "CROSS_BELOW({}, {})", left, right),
            Rule::Above { left, right } => write!(f, "ABOVE({}, {})", left, right),
            Rule::Below { left, right } => write!(f, "BELOW({}, {})", left, right),
            Rule::Between {
                operand,
                lower,
                upper,
            } => write!(f, "BETWEEN({}, {}, {})", operand, lower, upper),
            Rule::Equals { left, right } => write!(f, "EQUALS({}, {})", left, right),
            Rule::And(rules) => {
                write!(f, "AND(")?;
                write_list(f, rules)?;
                write!(f, ")")
            }
            Rule::Or(rules) => {
                write!(f, "OR(")?;
                write_list(f, rules)?;
                write!(f, ")")
            }
            Rule::Not(rule) => write!(f, "NOT({})", rule),
            Rule::AtLeast { threshold, rules } => {
                write!(f, "AT_LEAST({}, ", threshold)?;
                write_list(f, rules)?;
                write!(f, ")")
            }
            Rule::Consecutive { rule, count } => write!(f, "CONSECUTIVE({}, {})", rule, count),
            Rule::AnyOf { rule, count } => write!(f, "ANY_OF({}, {})", rule, count),
            Rule::Pattern(pattern) => write!(f, "{}", pattern),
        }
    }
}
