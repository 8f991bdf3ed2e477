//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (k_up × StdDev)
//! - Lower: Middle - (k_down × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) bars are invalid.

use std::collections::VecDeque;

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorState, IndicatorValue};

#[derive(Debug, Clone)]
pub struct BollingerState {
    period: usize,
    up: f64,
    down: f64,
    window: VecDeque<f64>,
}

impl BollingerState {
    pub fn new(period: usize, up: f64, down: f64) -> Self {
        Self {
            period,
            up,
            down,
            window: VecDeque::new(),
        }
    }
}

impl IndicatorState for BollingerState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        if self.period == 0 {
            return None;
        }
        self.window.push_back(candle.close);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        if self.window.len() < self.period {
            return None;
        }

        let n = self.period as f64;
        let middle = self.window.iter().sum::<f64>() / n;
        let variance = self
            .window
            .iter()
            .map(|c| {
                let diff = c - middle;
                diff * diff
            })
            .sum::<f64>()
            / n;
        let stddev = variance.sqrt();

        Some(IndicatorValue::Bollinger {
            upper: middle + self.up * stddev,
            middle,
            lower: middle - self.down * stddev,
        })
    }
}
