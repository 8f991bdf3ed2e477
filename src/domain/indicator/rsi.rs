//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n price changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, unless avg_gain is also 0 (flat prices), then 50.
//!
//! Warmup: first n bars are invalid (need n price changes to compute initial average).

use crate::domain::candle::Candle;
use crate::domain::indicator::atr::Wilder;
use crate::domain::indicator::{IndicatorState, IndicatorValue, EPSILON};

#[derive(Debug, Clone)]
pub struct RsiState {
    prev_close: Option<f64>,
    gains: Wilder,
    losses: Wilder,
}

impl RsiState {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            gains: Wilder::new(period),
            losses: Wilder::new(period),
        }
    }

    /// Advance by one close; returns the RSI once the warm-up is over.
    pub fn next(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        let change = close - prev;
        let avg_gain = self.gains.next(change.max(0.0));
        let avg_loss = self.losses.next((-change).max(0.0));
        match (avg_gain, avg_loss) {
            (Some(gain), Some(loss)) => Some(rsi_from_averages(gain, loss)),
            _ => None,
        }
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss < EPSILON {
        if avg_gain < EPSILON { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

impl IndicatorState for RsiState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        self.next(candle.close).map(IndicatorValue::Simple)
    }
}
