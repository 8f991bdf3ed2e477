//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded with the SMA of the first
//! `signal` line values
//! Histogram = MACD Line - Signal Line
//!
//! Warmup: (slow - 1) + (signal - 1) bars, i.e. 33 for 12/26/9.

use crate::domain::candle::Candle;
use crate::domain::indicator::{EmaState, IndicatorState, IndicatorValue};

#[derive(Debug, Clone)]
pub struct MacdState {
    fast: EmaState,
    slow: EmaState,
    signal: EmaState,
}

impl MacdState {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: EmaState::new(fast),
            slow: EmaState::new(slow),
            signal: EmaState::new(signal),
        }
    }
}

impl IndicatorState for MacdState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        let fast = self.fast.next(candle.close);
        let slow = self.slow.next(candle.close);
        let line = fast? - slow?;
        let signal = self.signal.next(line)?;
        Some(IndicatorValue::Macd {
            line,
            signal,
            histogram: line - signal,
        })
    }
}
