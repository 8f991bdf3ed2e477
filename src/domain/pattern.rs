//! Candle-shape pattern leaves for the rule language.
//!
//! Ratios against the candle range use `range + RANGE_EPSILON` as the
//! denominator, so a zero-range candle never divides by zero:
//!
//! - `DOJI(max_body_ratio)`: body / (range + ε) < max_body_ratio
//! - `SHOOTING_STAR(min_upper_wick_ratio, max_body_ratio, max_top_ratio)`:
//!   upper_wick / (range + ε) > min_upper_wick_ratio
//!   and body / (range + ε) < max_body_ratio
//!   and (body_top - low) / (range + ε) < max_top_ratio
//! - `BIG_BEARISH(min_drop_pct)`: close < open * (1 - min_drop_pct / 100)
//! - `BEARISH_RUN(n)`: each of the last n candles closed below its open;
//!   undefined while fewer than n candles exist

use std::fmt;

use crate::domain::candle::Candle;

pub const RANGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub enum CandlePattern {
    Doji {
        max_body_ratio: f64,
    },
    ShootingStar {
        min_upper_wick_ratio: f64,
        max_body_ratio: f64,
        max_top_ratio: f64,
    },
    BigBearish {
        min_drop_pct: f64,
    },
    BearishRun {
        bars: usize,
    },
}

fn range_ratio(x: f64, candle: &Candle) -> f64 {
    x / (candle.range() + RANGE_EPSILON)
}

impl CandlePattern {
    /// Evaluate against the visible candles; the last one is the current bar.
    pub fn matches(&self, visible: &[Candle]) -> Option<bool> {
        let current = visible.last()?;
        match self {
            CandlePattern::Doji { max_body_ratio } => {
                Some(range_ratio(current.body(), current) < *max_body_ratio)
            }
            CandlePattern::ShootingStar {
                min_upper_wick_ratio,
                max_body_ratio,
                max_top_ratio,
            } => Some(
                range_ratio(current.upper_wick(), current) > *min_upper_wick_ratio
                    && range_ratio(current.body(), current) < *max_body_ratio
                    && range_ratio(current.body_top() - current.low, current) < *max_top_ratio,
            ),
            CandlePattern::BigBearish { min_drop_pct } => {
                Some(current.close < current.open * (1.0 - min_drop_pct / 100.0))
            }
            CandlePattern::BearishRun { bars } => {
                if *bars == 0 || visible.len() < *bars {
                    return None;
                }
                let run = &visible[visible.len() - bars..];
                Some(run.iter().all(|c| c.close < c.open))
            }
        }
    }
}

impl fmt::Display for CandlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandlePattern::Doji { max_body_ratio } => write!(f, "DOJI({})", max_body_ratio),
            CandlePattern::ShootingStar {
                min_upper_wick_ratio,
                max_body_ratio,
                max_top_ratio,
            } => write!(
                f,
                "SHOOTING_STAR({}, {}, {})",
                min_upper_wick_ratio, max_body_ratio, max_top_ratio
            ),
            CandlePattern::BigBearish { min_drop_pct } => write!(f, "BIG_BEARISH({})", min_drop_pct),
            CandlePattern::BearishRun { bars } => write!(f, "BEARISH_RUN({})", bars),
        }
    }
}
