//! Rule evaluation engine.
//!
//! Evaluates rules against candles and pre-computed indicator values.
//!
//! # Evaluation Semantics
//!
//! Inside a tree every node is three-valued: `Some(true)`, `Some(false)`, or
//! `None` (undefined). A comparison that touches an undefined value is
//! undefined. Combinators follow Kleene logic, so undefined never becomes true:
//!
//! - `AND`: false if any child is false, else undefined if any child is, else true
//! - `OR`: true if any child is true, else undefined if any child is, else false
//! - `NOT`: undefined stays undefined
//! - `AT_LEAST(T, ...)`: true once T children are true; false when the true and
//!   undefined children together cannot reach T; undefined otherwise
//! - `CROSS_ABOVE`/`CROSS_BELOW`: undefined at index 0
//! - `CONSECUTIVE(rule, N)` / `ANY_OF(rule, N)`: false until N bars exist, then
//!   the Kleene AND / OR of the child over the last N bars
//!
//! [`evaluate`] collapses the root to a plain `bool` (undefined ⇒ false).
//!
//! All data access goes through [`History`], which exposes only bars up to
//! and including the evaluation index.

use crate::domain::candle::Candle;
use crate::domain::indicator::crossover::{crosses_above, crosses_below};
use crate::domain::indicator::IndicatorSet;
use crate::domain::rule::{IndicatorRef, Operand, Rule};

const EQUALS_EPSILON: f64 = 1e-9;

/// Read-only view of candles and indicators as of one bar.
///
/// Nothing after `index` is reachable: the candle slice is cut at `index` and
/// indicator lookups are bounded by it.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    candles: &'a [Candle],
    indicators: &'a IndicatorSet,
}

impl<'a> History<'a> {
    /// View as of bar `index`; `None` when `index` is past the data.
    pub fn at(candles: &'a [Candle], indicators: &'a IndicatorSet, index: usize) -> Option<Self> {
        if index >= candles.len() {
            return None;
        }
        Some(Self {
            candles: &candles[..=index],
            indicators,
        })
    }

    /// Index of the current bar.
    pub fn index(&self) -> usize {
        self.candles.len() - 1
    }

    pub fn current(&self) -> &'a Candle {
        &self.candles[self.candles.len() - 1]
    }

    /// All visible candles, the current one last.
    pub fn candles(&self) -> &'a [Candle] {
        self.candles
    }

    /// The same view `bars` bars earlier; `None` when that precedes the data.
    pub fn rewind(&self, bars: usize) -> Option<Self> {
        if bars > self.index() {
            return None;
        }
        Some(Self {
            candles: &self.candles[..self.candles.len() - bars],
            indicators: self.indicators,
        })
    }

    /// Indicator field at the current bar.
    pub fn indicator(&self, reference: &IndicatorRef) -> Option<f64> {
        self.indicators
            .field_at(&reference.indicator_type, self.index(), reference.field)
    }
}

/// Resolve an operand at the current bar. Non-finite results are undefined.
pub fn resolve_operand(operand: &Operand, history: &History) -> Option<f64> {
    let bar = history.current();
    let value = match operand {
        Operand::Open => bar.open,
        Operand::High => bar.high,
        Operand::Low => bar.low,
        Operand::Close => bar.close,
        Operand::Volume => bar.volume,
        Operand::Body => bar.body(),
        Operand::Range => bar.range(),
        Operand::UpperWick => bar.upper_wick(),
        Operand::LowerWick => bar.lower_wick(),
        Operand::BodyTop => bar.body_top(),
        Operand::BodyBottom => bar.body_bottom(),
        Operand::Constant(v) => *v,
        Operand::Indicator(reference) => history.indicator(reference)?,
        Operand::Shift { operand, bars } => resolve_operand(operand, &history.rewind(*bars)?)?,
        Operand::Scaled { operand, factor } => resolve_operand(operand, history)? * factor,
    };
    value.is_finite().then_some(value)
}

fn compare(
    left: &Operand,
    right: &Operand,
    history: &History,
    op: fn(f64, f64) -> bool,
) -> Option<bool> {
    let l = resolve_operand(left, history);
    let r = resolve_operand(right, history);
    Some(op(l?, r?))
}

fn cross(
    left: &Operand,
    right: &Operand,
    history: &History,
    test: fn(f64, f64, f64, f64) -> bool,
) -> Option<bool> {
    let prev = history.rewind(1)?;
    let prev_l = resolve_operand(left, &prev)?;
    let prev_r = resolve_operand(right, &prev)?;
    let l = resolve_operand(left, history)?;
    let r = resolve_operand(right, history)?;
    Some(test(prev_l, prev_r, l, r))
}

fn kleene_and(values: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut undefined = false;
    for v in values {
        match v {
            Some(false) => return Some(false),
            None => undefined = true,
            Some(true) => {}
        }
    }
    if undefined { None } else { Some(true) }
}

fn kleene_or(values: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut undefined = false;
    for v in values {
        match v {
            Some(true) => return Some(true),
            None => undefined = true,
            Some(false) => {}
        }
    }
    if undefined { None } else { Some(false) }
}

fn at_least(threshold: usize, rules: &[Rule], history: &History) -> Option<bool> {
    let mut true_count = 0;
    let mut undefined_count = 0;
    for (i, rule) in rules.iter().enumerate() {
        match evaluate_tristate(rule, history) {
            Some(true) => true_count += 1,
            None => undefined_count += 1,
            Some(false) => {}
        }
        if true_count >= threshold {
            return Some(true);
        }
        let unseen = rules.len() - i - 1;
        if true_count + undefined_count + unseen < threshold {
            return Some(false);
        }
    }
    if true_count >= threshold {
        Some(true)
    } else if true_count + undefined_count < threshold {
        Some(false)
    } else {
        None
    }
}

/// Evaluate each of the last `count` bars (current bar included).
fn window<'h>(
    rule: &'h Rule,
    count: usize,
    history: &'h History<'h>,
) -> impl Iterator<Item = Option<bool>> + 'h {
    (0..count).map(move |k| {
        history
            .rewind(k)
            .and_then(|earlier| evaluate_tristate(rule, &earlier))
    })
}

/// Three-valued evaluation of `rule` at the bar `history` is positioned on.
pub fn evaluate_tristate(rule: &Rule, history: &History) -> Option<bool> {
    match rule {
        Rule::CrossAbove { left, right } => cross(left, right, history, crosses_above),
        Rule::CrossBelow { left, right } => cross(left, right, history, crosses_below),
        Rule::Above { left, right } => compare(left, right, history, |l, r| l > r),
        Rule::Below { left, right } => compare(left, right, history, |l, r| l < r),
        Rule::Equals { left, right } => {
            compare(left, right, history, |l, r| (l - r).abs() < EQUALS_EPSILON)
        }
        Rule::Between {
            operand,
            lower,
            upper,
        } => {
            let v = resolve_operand(operand, history)?;
            Some(v >= *lower && v <= *upper)
        }
        Rule::And(rules) => kleene_and(rules.iter().map(|r| evaluate_tristate(r, history))),
        Rule::Or(rules) => kleene_or(rules.iter().map(|r| evaluate_tristate(r, history))),
        Rule::Not(rule) => evaluate_tristate(rule, history).map(|v| !v),
        Rule::AtLeast { threshold, rules } => at_least(*threshold, rules, history),
        Rule::Consecutive { rule, count } => {
            if history.index() + 1 < *count {
                return Some(false);
            }
            kleene_and(window(rule, *count, history))
        }
        Rule::AnyOf { rule, count } => {
            if history.index() + 1 < *count {
                return Some(false);
            }
            kleene_or(window(rule, *count, history))
        }
        Rule::Pattern(pattern) => pattern.matches(history.candles()),
    }
}

/// Evaluate `rule` at the current bar; undefined collapses to `false`.
pub fn evaluate(rule: &Rule, history: &History) -> bool {
    evaluate_tristate(rule, history).unwrap_or(false)
}

/// Convenience wrapper: evaluate at `index` over full candle and indicator data.
/// Out-of-range indices evaluate to `false`.
pub fn evaluate_at(
    rule: &Rule,
    candles: &[Candle],
    indicators: &IndicatorSet,
    index: usize,
) -> bool {
    History::at(candles, indicators, index).is_some_and(|h| evaluate(rule, &h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
    use crate::domain::pattern::CandlePattern;
    use crate::domain::rule::IndicatorField;
    use chrono::NaiveDate;

    fn make_candle(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::minutes(15 * i as i64),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn closes(values: &[f64]) -> Vec<Candle> {
        values
            .iter()
            .enumerate()
            .map(|(i, &c)| make_candle(i, 100.0, 110.0, 90.0, c, 1000.0))
            .collect()
    }

    fn simple_series(indicator_type: IndicatorType, values: &[Option<f64>]) -> IndicatorSeries {
        let candles = closes(&vec![100.0; values.len()]);
        IndicatorSeries {
            indicator_type,
            values: values
                .iter()
                .zip(&candles)
                .map(|(v, c)| IndicatorPoint {
                    timestamp: c.timestamp,
                    value: v.map(IndicatorValue::Simple),
                })
                .collect(),
        }
    }

    fn sma(period: usize) -> Operand {
        Operand::indicator(IndicatorType::Sma(period), IndicatorField::Value)
    }

    fn above(left: Operand, right: f64) -> Rule {
        Rule::Above {
            left,
            right: Operand::Constant(right),
        }
    }

    fn below(left: Operand, right: f64) -> Rule {
        Rule::Below {
            left,
            right: Operand::Constant(right),
        }
    }

    fn eval(rule: &Rule, candles: &[Candle], indicators: &IndicatorSet, i: usize) -> Option<bool> {
        evaluate_tristate(rule, &History::at(candles, indicators, i).unwrap())
    }

    /// Undefined SMA(5) everywhere, for building unknown leaves.
    fn undefined_set(len: usize) -> IndicatorSet {
        let mut set = IndicatorSet::new();
        set.insert(simple_series(IndicatorType::Sma(5), &vec![None; len]));
        set
    }

    #[test]
    fn history_hides_future_bars() {
        let candles = closes(&[1.0, 2.0, 3.0]);
        let set = IndicatorSet::new();
        let h = History::at(&candles, &set, 1).unwrap();
        assert_eq!(h.index(), 1);
        assert_eq!(h.candles().len(), 2);
        assert_eq!(h.current().close, 2.0);
        assert!(h.rewind(2).is_none());
        assert_eq!(h.rewind(1).unwrap().current().close, 1.0);
        assert!(History::at(&candles, &set, 3).is_none());
    }

    #[test]
    fn comparisons() {
        let candles = closes(&[105.0]);
        let set = IndicatorSet::new();
        assert_eq!(eval(&above(Operand::Close, 100.0), &candles, &set, 0), Some(true));
        assert_eq!(eval(&below(Operand::Close, 100.0), &candles, &set, 0), Some(false));
        let between = Rule::Between {
            operand: Operand::Close,
            lower: 100.0,
            upper: 105.0,
        };
        assert_eq!(eval(&between, &candles, &set, 0), Some(true));
        let equals = Rule::Equals {
            left: Operand::Close,
            right: Operand::Constant(105.0 + 1e-12),
        };
        assert_eq!(eval(&equals, &candles, &set, 0), Some(true));
    }

    #[test]
    fn candle_shape_operands() {
        let candles = vec![make_candle(0, 100.0, 110.0, 90.0, 104.0, 1000.0)];
        let set = IndicatorSet::new();
        let h = History::at(&candles, &set, 0).unwrap();
        assert_eq!(resolve_operand(&Operand::Body, &h), Some(4.0));
        assert_eq!(resolve_operand(&Operand::Range, &h), Some(20.0));
        assert_eq!(resolve_operand(&Operand::UpperWick, &h), Some(6.0));
        assert_eq!(resolve_operand(&Operand::LowerWick, &h), Some(10.0));
        assert_eq!(resolve_operand(&Operand::BodyTop, &h), Some(104.0));
        assert_eq!(resolve_operand(&Operand::BodyBottom, &h), Some(100.0));
        assert_eq!(resolve_operand(&Operand::Open.scaled(0.95), &h), Some(95.0));
    }

    #[test]
    fn shift_reads_earlier_bar_and_is_undefined_before_start() {
        let candles = closes(&[101.0, 102.0, 103.0]);
        let set = IndicatorSet::new();
        let h = History::at(&candles, &set, 2).unwrap();
        assert_eq!(resolve_operand(&Operand::Close.shift(2), &h), Some(101.0));
        assert_eq!(resolve_operand(&Operand::Close.shift(3), &h), None);
        assert_eq!(resolve_operand(&Operand::Close.shift(0), &h), Some(103.0));
    }

    #[test]
    fn undefined_indicator_makes_comparison_undefined() {
        let candles = closes(&[100.0, 101.0, 102.0]);
        let mut set = IndicatorSet::new();
        set.insert(simple_series(
            IndicatorType::Sma(2),
            &[None, Some(100.5), Some(101.5)],
        ));
        let rule = above(sma(2), 100.0);
        assert_eq!(eval(&rule, &candles, &set, 0), None);
        assert_eq!(eval(&rule, &candles, &set, 1), Some(true));
        assert!(!evaluate_at(&rule, &candles, &set, 0));
        assert!(evaluate_at(&rule, &candles, &set, 2));
    }

    #[test]
    fn missing_indicator_is_undefined() {
        let candles = closes(&[100.0]);
        let set = IndicatorSet::new();
        assert_eq!(eval(&above(sma(20), 1.0), &candles, &set, 0), None);
    }

    #[test]
    fn not_keeps_undefined() {
        let candles = closes(&[100.0]);
        let set = undefined_set(1);
        let rule = Rule::Not(Box::new(above(sma(5), 1.0)));
        assert_eq!(eval(&rule, &candles, &set, 0), None);
        assert!(!evaluate_at(&rule, &candles, &set, 0));
    }

    #[test]
    fn kleene_and_or() {
        let candles = closes(&[100.0]);
        let set = undefined_set(1);
        let unknown = above(sma(5), 1.0);
        let yes = above(Operand::Close, 50.0);
        let no = above(Operand::Close, 500.0);

        let and = |rules: Vec<Rule>| eval(&Rule::And(rules), &candles, &set, 0);
        let or = |rules: Vec<Rule>| eval(&Rule::Or(rules), &candles, &set, 0);

        assert_eq!(and(vec![yes.clone(), yes.clone()]), Some(true));
        assert_eq!(and(vec![unknown.clone(), no.clone()]), Some(false));
        assert_eq!(and(vec![yes.clone(), unknown.clone()]), None);
        assert_eq!(or(vec![unknown.clone(), yes.clone()]), Some(true));
        assert_eq!(or(vec![no.clone(), unknown.clone()]), None);
        assert_eq!(or(vec![no.clone(), no]), Some(false));
    }

    #[test]
    fn at_least_counts_true_children() {
        let candles = closes(&[100.0]);
        let set = undefined_set(1);
        let t = above(Operand::Close, 50.0);
        let f = above(Operand::Close, 500.0);
        let u = above(sma(5), 1.0);
        let at_least = |rules: Vec<Rule>| {
            eval(
                &Rule::AtLeast {
                    threshold: 2,
                    rules,
                },
                &candles,
                &set,
                0,
            )
        };

        assert_eq!(
            at_least(vec![t.clone(), t.clone(), f.clone(), f.clone()]),
            Some(true)
        );
        assert_eq!(
            at_least(vec![t.clone(), f.clone(), f.clone(), f.clone()]),
            Some(false)
        );
        assert_eq!(
            at_least(vec![t.clone(), u.clone(), f.clone(), f.clone()]),
            None
        );
        assert_eq!(at_least(vec![u.clone(), f.clone(), f.clone(), f]), Some(false));
        assert_eq!(at_least(vec![u.clone(), t.clone(), t]), Some(true));
    }

    #[test]
    fn cross_above_and_below() {
        let candles = closes(&[95.0, 105.0, 110.0, 95.0]);
        let set = IndicatorSet::new();
        let up = Rule::CrossAbove {
            left: Operand::Close,
            right: Operand::Constant(100.0),
        };
        let down = Rule::CrossBelow {
            left: Operand::Close,
            right: Operand::Constant(100.0),
        };
        assert_eq!(eval(&up, &candles, &set, 0), None);
        assert_eq!(eval(&up, &candles, &set, 1), Some(true));
        assert_eq!(eval(&up, &candles, &set, 2), Some(false));
        assert_eq!(eval(&down, &candles, &set, 3), Some(true));
    }

    #[test]
    fn cross_with_indicators_needs_both_bars_defined() {
        let candles = closes(&[100.0; 4]);
        let mut set = IndicatorSet::new();
        set.insert(simple_series(
            IndicatorType::Sma(10),
            &[None, None, Some(99.0), Some(102.0)],
        ));
        set.insert(simple_series(
            IndicatorType::Sma(20),
            &[None, None, Some(100.0), Some(101.0)],
        ));
        let rule = Rule::CrossAbove {
            left: sma(10),
            right: sma(20),
        };
        assert_eq!(eval(&rule, &candles, &set, 2), None);
        assert_eq!(eval(&rule, &candles, &set, 3), Some(true));
    }

    #[test]
    fn consecutive_and_any_of() {
        let candles = closes(&[95.0, 101.0, 102.0, 103.0, 95.0]);
        let set = IndicatorSet::new();
        let consecutive = Rule::Consecutive {
            rule: Box::new(above(Operand::Close, 100.0)),
            count: 3,
        };
        let any_of = Rule::AnyOf {
            rule: Box::new(above(Operand::Close, 102.5)),
            count: 2,
        };
        assert_eq!(eval(&consecutive, &candles, &set, 1), Some(false));
        assert_eq!(eval(&consecutive, &candles, &set, 2), Some(false));
        assert_eq!(eval(&consecutive, &candles, &set, 3), Some(true));
        assert_eq!(eval(&consecutive, &candles, &set, 4), Some(false));
        assert_eq!(eval(&any_of, &candles, &set, 0), Some(false));
        assert_eq!(eval(&any_of, &candles, &set, 2), Some(false));
        assert_eq!(eval(&any_of, &candles, &set, 4), Some(true));
    }

    #[test]
    fn pattern_leaf() {
        let candles = vec![
            make_candle(0, 100.0, 101.0, 99.0, 100.0, 1000.0),
            make_candle(1, 100.0, 101.0, 90.0, 94.0, 1000.0),
        ];
        let set = IndicatorSet::new();
        let big = Rule::Pattern(CandlePattern::BigBearish { min_drop_pct: 5.0 });
        assert_eq!(eval(&big, &candles, &set, 0), Some(false));
        assert_eq!(eval(&big, &candles, &set, 1), Some(true));
    }

    #[test]
    fn evaluation_ignores_later_bars() {
        let mut candles = closes(&[95.0, 105.0, 110.0]);
        let set = IndicatorSet::new();
        let rule = Rule::CrossAbove {
            left: Operand::Close,
            right: Operand::Constant(100.0),
        };
        let before = evaluate_at(&rule, &candles, &set, 1);
        candles[2].close = 1.0;
        candles.push(make_candle(3, 100.0, 110.0, 90.0, 200.0, 1000.0));
        assert_eq!(evaluate_at(&rule, &candles, &set, 1), before);
    }

    #[test]
    fn non_finite_constant_is_undefined() {
        let candles = closes(&[100.0]);
        let set = IndicatorSet::new();
        let rule = Rule::Above {
            left: Operand::Close,
            right: Operand::Constant(f64::NAN),
        };
        assert_eq!(eval(&rule, &candles, &set, 0), None);
    }
}
