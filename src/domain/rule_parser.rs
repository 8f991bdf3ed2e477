//! Rule DSL parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found tokens.
//!
//! Keywords and indicator names are upper case, operand fields lower case;
//! both are case-sensitive.

use crate::domain::error::ParseError;
use crate::domain::indicator::IndicatorType;
use crate::domain::pattern::CandlePattern;
use crate::domain::rule::{IndicatorField, IndicatorRef, Operand, Rule};

/// Indicator families and the parameter lists they take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Min,
    Max,
    PctChange,
    Sma,
    Ema,
    Rsi,
    Atr,
    Adx,
    VolumeSma,
    Macd,
    Bollinger,
    StochRsi,
}

fn single_output_family(name: &str) -> Option<Family> {
    match name {
        "MIN" => Some(Family::Min),
        "MAX" => Some(Family::Max),
        "PCT_CHANGE" => Some(Family::PctChange),
        "SMA" => Some(Family::Sma),
        "EMA" => Some(Family::Ema),
        "RSI" => Some(Family::Rsi),
        "ATR" => Some(Family::Atr),
        "ADX" => Some(Family::Adx),
        "VOLUME_SMA" => Some(Family::VolumeSma),
        _ => None,
    }
}

/// Name used inside a rule: one field of one indicator.
fn reference_name(name: &str) -> Option<(Family, IndicatorField)> {
    if let Some(family) = single_output_family(name) {
        return Some((family, IndicatorField::Value));
    }
    let found = match name {
        "MACD_LINE" => (Family::Macd, IndicatorField::MacdLine),
        "MACD_SIGNAL" => (Family::Macd, IndicatorField::MacdSignal),
        "MACD_HISTOGRAM" => (Family::Macd, IndicatorField::MacdHistogram),
        "BOLLINGER_UPPER" => (Family::Bollinger, IndicatorField::BollingerUpper),
        "BOLLINGER_MIDDLE" => (Family::Bollinger, IndicatorField::BollingerMiddle),
        "BOLLINGER_LOWER" => (Family::Bollinger, IndicatorField::BollingerLower),
        "STOCH_RSI_K" => (Family::StochRsi, IndicatorField::StochRsiK),
        "STOCH_RSI_D" => (Family::StochRsi, IndicatorField::StochRsiD),
        _ => return None,
    };
    Some(found)
}

/// Name used in an indicator declaration list: the whole indicator.
fn declaration_name(name: &str) -> Option<Family> {
    single_output_family(name).or(match name {
        "MACD" => Some(Family::Macd),
        "BOLLINGER" => Some(Family::Bollinger),
        "STOCH_RSI" => Some(Family::StochRsi),
        _ => None,
    })
}

fn operand_field(word: &str) -> Option<Operand> {
    let operand = match word {
        "open" => Operand::Open,
        "high" => Operand::High,
        "low" => Operand::Low,
        "close" => Operand::Close,
        "volume" => Operand::Volume,
        "body" => Operand::Body,
        "range" => Operand::Range,
        "upper_wick" => Operand::UpperWick,
        "lower_wick" => Operand::LowerWick,
        "body_top" => Operand::BodyTop,
        "body_bottom" => Operand::BodyBottom,
        _ => return None,
    };
    Some(operand)
}

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

    fn error(&self, position: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(
                self.pos,
                format!("expected '{}', found '{}'", expected, ch),
            )),
            None => Err(self.error(
                self.pos,
                format!("expected '{}', found end of input", expected),
            )),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(self.error(
                self.pos,
                format!("expected '{}', found '{}'", keyword, found),
            ))
        }
    }

    fn word(&self) -> &'a str {
        let remaining = self.remaining();
        let end = remaining
            .char_indices()
            .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '_'))
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        &remaining[..end]
    }

    fn peek_word(&self) -> String {
        let word = self.word();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word.to_string()
        }
    }

    /// True when the next non-blank character is `ch`; consumes it.
    fn consume_char(&mut self, ch: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
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
            return Err(self.error(start, "expected number"));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| self.error(start, format!("invalid number: {}", num_str)))
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(self.error(start, "expected integer"));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<usize>()
            .map_err(|_| self.error(start, format!("invalid integer: {}", num_str)))
    }

    /// Integer count that must be at least 1 (bar count, threshold).
    fn parse_count(&mut self, what: &str) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let n = self.parse_integer()?;
        if n == 0 {
            return Err(self.error(start, format!("{} must be at least 1", what)));
        }
        Ok(n)
    }

    fn parse_non_negative(&mut self, what: &str) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let v = self.parse_number()?;
        if v < 0.0 {
            return Err(self.error(start, format!("{} must not be negative", what)));
        }
        Ok(v)
    }

    /// Band multiplier in hundredths; finer values are rejected rather than rounded.
    fn parse_multiplier(&mut self) -> Result<u32, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let hundredths = self.parse_non_negative("band multiplier")? * 100.0;
        let rounded = hundredths.round();
        if (hundredths - rounded).abs() > 1e-6 || rounded > u32::MAX as f64 {
            return Err(self.error(
                start,
                "band multiplier must be a multiple of 0.01",
            ));
        }
        Ok(rounded as u32)
    }

    fn parse_periods<const N: usize>(&mut self) -> Result<[usize; N], ParseError> {
        let mut out = [0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            if i > 0 {
                self.expect_char(',')?;
            }
            *slot = self.parse_integer()?;
        }
        Ok(out)
    }

    fn parse_window_args(&mut self) -> Result<(usize, bool), ParseError> {
        let window = self.parse_integer()?;
        let mut lenient = false;
        if self.consume_char(',') {
            self.skip_whitespace();
            self.expect_keyword("LENIENT")?;
            lenient = true;
        }
        Ok((window, lenient))
    }

    /// Parse `(params)` following an indicator name.
    fn parse_family_params(&mut self, family: Family) -> Result<IndicatorType, ParseError> {
        self.expect_char('(')?;
        let indicator_type = match family {
            Family::Min | Family::Max | Family::PctChange => {
                let (window, lenient) = self.parse_window_args()?;
                match family {
                    Family::Min => IndicatorType::Min { window, lenient },
                    Family::Max => IndicatorType::Max { window, lenient },
                    _ => IndicatorType::PctChange { window, lenient },
                }
            }
            Family::Sma => IndicatorType::Sma(self.parse_integer()?),
            Family::Ema => IndicatorType::Ema(self.parse_integer()?),
            Family::Rsi => IndicatorType::Rsi(self.parse_integer()?),
            Family::Atr => IndicatorType::Atr(self.parse_integer()?),
            Family::Adx => IndicatorType::Adx(self.parse_integer()?),
            Family::VolumeSma => IndicatorType::VolumeSma(self.parse_integer()?),
            Family::Macd => {
                let [fast, slow, signal] = self.parse_periods::<3>()?;
                IndicatorType::Macd { fast, slow, signal }
            }
            Family::StochRsi => {
                let [rsi_period, k_period, d_period] = self.parse_periods::<3>()?;
                IndicatorType::StochRsi {
                    rsi_period,
                    k_period,
                    d_period,
                }
            }
            Family::Bollinger => {
                let period = self.parse_integer()?;
                self.expect_char(',')?;
                let up_x100 = self.parse_multiplier()?;
                let down_x100 = if self.consume_char(',') {
                    self.parse_multiplier()?
                } else {
                    up_x100
                };
                IndicatorType::Bollinger {
                    period,
                    up_x100,
                    down_x100,
                }
            }
        };
        self.expect_char(')')?;
        Ok(indicator_type)
    }

    fn parse_indicator(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();
        let word = self.word();
        let Some((family, field)) = reference_name(word) else {
            return Err(self.error(
                self.pos,
                format!("expected operand or indicator, found '{}'", self.peek_word()),
            ));
        };
        self.pos += word.len();
        let indicator_type = self.parse_family_params(family)?;
        Ok(Operand::Indicator(IndicatorRef {
            indicator_type,
            field,
        }))
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            let num = self.parse_number()?;
            return Ok(Operand::Constant(num));
        }

        let word = self.word();
        if let Some(operand) = operand_field(word) {
            self.pos += word.len();
            return Ok(operand);
        }

        if self.consume_keyword("SHIFT") {
            self.expect_char('(')?;
            let operand = self.parse_operand()?;
            self.expect_char(',')?;
            let bars = self.parse_integer()?;
            self.expect_char(')')?;
            return Ok(Operand::Shift {
                operand: Box::new(operand),
                bars,
            });
        }

        if self.consume_keyword("MUL") {
            self.expect_char('(')?;
            let operand = self.parse_operand()?;
            self.expect_char(',')?;
            let factor = self.parse_number()?;
            self.expect_char(')')?;
            return Ok(Operand::Scaled {
                operand: Box::new(operand),
                factor,
            });
        }

        self.parse_indicator()
    }

    fn parse_comparison(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        let rule = match keyword {
            "CROSS_ABOVE" => Rule::CrossAbove { left, right },
            "CROSS_BELOW" => Rule::CrossBelow { left, right },
            "ABOVE" => Rule::Above { left, right },
            "BELOW" => Rule::Below { left, right },
            _ => Rule::Equals { left, right },
        };
        Ok(rule)
    }

    fn parse_between(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("BETWEEN")?;
        self.expect_char('(')?;

        let operand = self.parse_operand()?;
        self.expect_char(',')?;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        let upper = self.parse_number()?;
        self.expect_char(')')?;

        Ok(Rule::Between {
            operand,
            lower,
            upper,
        })
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();

        for keyword in ["CROSS_ABOVE", "CROSS_BELOW", "ABOVE", "BELOW", "EQUALS"] {
            if self.peek_keyword(keyword) {
                return self.parse_comparison(keyword);
            }
        }
        if self.peek_keyword("BETWEEN") {
            return self.parse_between();
        }

        if self.peek_keyword("AND") {
            return self.parse_logical("AND");
        }
        if self.peek_keyword("OR") {
            return self.parse_logical("OR");
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }
        if self.peek_keyword("AT_LEAST") {
            return self.parse_at_least();
        }

        if self.peek_keyword("CONSECUTIVE") {
            return self.parse_temporal("CONSECUTIVE");
        }
        if self.peek_keyword("ANY_OF") {
            return self.parse_temporal("ANY_OF");
        }

        if let Some(pattern) = self.parse_pattern()? {
            return Ok(Rule::Pattern(pattern));
        }

        let word = self.peek_word();
        Err(self.error(self.pos, format!("expected rule, found '{}'", word)))
    }

    /// Comma-separated rules up to and including the closing parenthesis.
    fn parse_rule_list(&mut self) -> Result<Vec<Rule>, ParseError> {
        let mut rules = vec![self.parse_rule()?];
        loop {
            if self.consume_char(')') {
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }
        Ok(rules)
    }

    fn parse_logical(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        let start = self.pos;
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let rules = self.parse_rule_list()?;

        if rules.len() < 2 {
            return Err(self.error(start, format!("{} requires at least 2 rules", keyword)));
        }

        if keyword == "AND" {
            Ok(Rule::And(rules))
        } else {
            Ok(Rule::Or(rules))
        }
    }

    fn parse_not(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(')')?;
        Ok(Rule::Not(Box::new(rule)))
    }

    fn parse_at_least(&mut self) -> Result<Rule, ParseError> {
        let start = self.pos;
        self.expect_keyword("AT_LEAST")?;
        self.expect_char('(')?;
        let threshold = self.parse_count("threshold")?;
        self.expect_char(',')?;
        let rules = self.parse_rule_list()?;

        if threshold > rules.len() {
            return Err(self.error(
                start,
                format!(
                    "AT_LEAST threshold {} exceeds the number of rules ({})",
                    threshold,
                    rules.len()
                ),
            ));
        }

        Ok(Rule::AtLeast { threshold, rules })
    }

    fn parse_temporal(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let rule = Box::new(self.parse_rule()?);
        self.expect_char(',')?;
        let count = self.parse_count("bar count")?;
        self.expect_char(')')?;
        if keyword == "CONSECUTIVE" {
            Ok(Rule::Consecutive { rule, count })
        } else {
            Ok(Rule::AnyOf { rule, count })
        }
    }

    fn parse_pattern(&mut self) -> Result<Option<CandlePattern>, ParseError> {
        let pattern = if self.consume_keyword("DOJI") {
            self.expect_char('(')?;
            let max_body_ratio = self.parse_non_negative("body ratio")?;
            CandlePattern::Doji { max_body_ratio }
        } else if self.consume_keyword("SHOOTING_STAR") {
            self.expect_char('(')?;
            let min_upper_wick_ratio = self.parse_non_negative("wick ratio")?;
            self.expect_char(',')?;
            let max_body_ratio = self.parse_non_negative("body ratio")?;
            self.expect_char(',')?;
            let max_top_ratio = self.parse_non_negative("top ratio")?;
            CandlePattern::ShootingStar {
                min_upper_wick_ratio,
                max_body_ratio,
                max_top_ratio,
            }
        } else if self.consume_keyword("BIG_BEARISH") {
            self.expect_char('(')?;
            let min_drop_pct = self.parse_non_negative("drop percentage")?;
            CandlePattern::BigBearish { min_drop_pct }
        } else if self.consume_keyword("BEARISH_RUN") {
            self.expect_char('(')?;
            let bars = self.parse_count("bar count")?;
            CandlePattern::BearishRun { bars }
        } else {
            return Ok(None);
        };
        self.expect_char(')')?;
        Ok(Some(pattern))
    }

    fn expect_end(&mut self, what: &str) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(
                self.pos,
                format!("unexpected input after {}: '{}'", what, self.remaining()),
            ));
        }
        Ok(())
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.expect_end("rule")?;
        Ok(rule)
    }

    fn parse_declarations(&mut self) -> Result<Vec<IndicatorType>, ParseError> {
        let mut declared = Vec::new();
        self.skip_whitespace();
        if self.pos == self.input.len() {
            return Ok(declared);
        }
        loop {
            self.skip_whitespace();
            let word = self.word();
            let Some(family) = declaration_name(word) else {
                return Err(self.error(
                    self.pos,
                    format!("expected indicator declaration, found '{}'", self.peek_word()),
                ));
            };
            self.pos += word.len();
            let indicator_type = self.parse_family_params(family)?;
            if !declared.contains(&indicator_type) {
                declared.push(indicator_type);
            }
            if !self.consume_char(',') {
                break;
            }
        }
        self.expect_end("indicator list")?;
        Ok(declared)
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

/// Parse a comma-separated indicator declaration list such as
/// `PCT_CHANGE(96), RSI(14), MACD(12,26,9), BOLLINGER(20,2,2)`.
///
/// Duplicates are dropped; an empty list is allowed.
pub fn parse_indicator_list(input: &str) -> Result<Vec<IndicatorType>, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse_declarations()
}
