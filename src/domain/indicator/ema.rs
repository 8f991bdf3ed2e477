//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorState, IndicatorValue};

/// EMA accumulator over an arbitrary input stream. MACD reuses it for both
/// price EMAs and for the signal line.
#[derive(Debug, Clone)]
pub struct EmaState {
    period: usize,
    k: f64,
    seed_sum: f64,
    seen: usize,
    ema: Option<f64>,
}

impl EmaState {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            ema: None,
        }
    }

    pub fn next(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.seen += 1;
        match self.ema {
            Some(prev) => {
                let ema = x * self.k + prev * (1.0 - self.k);
                self.ema = Some(ema);
            }
            None => {
                self.seed_sum += x;
                if self.seen == self.period {
                    self.ema = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.ema
    }
}

impl IndicatorState for EmaState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        self.next(candle.close).map(IndicatorValue::Simple)
    }
}
