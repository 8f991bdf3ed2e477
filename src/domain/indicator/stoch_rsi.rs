//! Stochastic RSI.
//!
//! %K[i] = 100 * (RSI[i] - min(RSI over k)) / (max(RSI over k) - min(RSI over k))
//! %D[i] = mean of the last d %K values
//!
//! %K is undefined while fewer than k RSI values exist and whenever the RSI
//! range over the window is below EPSILON. Both outputs are published together,
//! and only on bars where all of the last d %K values are defined.
//!
//! Warmup: rsi + k + d - 2 bars.

use std::collections::VecDeque;

use crate::domain::candle::Candle;
use crate::domain::indicator::{
    Extremum, ExtremumState, IndicatorState, IndicatorValue, RsiState, EPSILON,
};

#[derive(Debug, Clone)]
pub struct StochRsiState {
    rsi: RsiState,
    lowest: ExtremumState,
    highest: ExtremumState,
    d_period: usize,
    recent_k: VecDeque<Option<f64>>,
}

impl StochRsiState {
    pub fn new(rsi_period: usize, k_period: usize, d_period: usize) -> Self {
        Self {
            rsi: RsiState::new(rsi_period),
            lowest: ExtremumState::new(Extremum::Min, k_period, false),
            highest: ExtremumState::new(Extremum::Max, k_period, false),
            d_period,
            recent_k: VecDeque::new(),
        }
    }

    /// `None` while the RSI window is incomplete; `Some(None)` when the
    /// window is complete but flat.
    fn next_k(&mut self, close: f64) -> Option<Option<f64>> {
        let rsi = self.rsi.next(close)?;
        let low = self.lowest.next(rsi);
        let high = self.highest.next(rsi);
        let (low, high) = (low?, high?);
        let range = high - low;
        if range < EPSILON {
            return Some(None);
        }
        Some(Some(100.0 * (rsi - low) / range))
    }

    fn next_d(&mut self, k: Option<f64>) -> Option<f64> {
        if self.d_period == 0 {
            return None;
        }
        self.recent_k.push_back(k);
        if self.recent_k.len() > self.d_period {
            self.recent_k.pop_front();
        }
        if self.recent_k.len() < self.d_period {
            return None;
        }
        let mut sum = 0.0;
        for k in &self.recent_k {
            sum += (*k)?;
        }
        Some(sum / self.d_period as f64)
    }
}

impl IndicatorState for StochRsiState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        let k = self.next_k(candle.close)?;
        let d = self.next_d(k)?;
        k.map(|k| IndicatorValue::StochRsi { k, d })
    }
}
