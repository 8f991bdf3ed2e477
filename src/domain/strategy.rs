//! Strategy configuration: what to compute and which rules to evaluate.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;

use crate::domain::indicator::IndicatorType;
use crate::domain::signal::{MutualExclusion, RuleSet};

/// Bar interval such as `15m` or `4h`. Informational: candles are not
/// resampled or checked against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeframe {
    amount: u32,
    unit: char,
}

impl Timeframe {
    pub fn duration(&self) -> Duration {
        let amount = i64::from(self.amount);
        match self.unit {
            's' => Duration::seconds(amount),
            'm' => Duration::minutes(amount),
            'h' => Duration::hours(amount),
            'd' => Duration::days(amount),
            _ => Duration::weeks(amount),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some(unit) = s.chars().last() else {
            return Err("timeframe is empty".to_string());
        };
        if !matches!(unit, 's' | 'm' | 'h' | 'd' | 'w') {
            return Err(format!(
                "unknown timeframe unit '{}', expected one of s, m, h, d, w",
                unit
            ));
        }
        let amount: u32 = s[..s.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| format!("invalid timeframe '{}'", s))?;
        if amount == 0 {
            return Err("timeframe must be positive".to_string());
        }
        Ok(Self { amount, unit })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub description: String,
    pub timeframe: Timeframe,
    /// Bars at the start of a series on which every signal is forced to 0.
    pub startup_candle_count: usize,
    pub indicators: Vec<IndicatorType>,
    pub rules: RuleSet,
    pub mutual_exclusion: MutualExclusion,
}
