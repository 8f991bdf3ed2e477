//! Simple Moving Average over close or volume.
//!
//! SMA(n)[i] = mean of the last n inputs. The volume baseline is the same
//! accumulator fed with volume instead of close.
//! Warmup: first (n-1) bars are invalid.

use std::collections::VecDeque;

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorState, IndicatorValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmaSource {
    Close,
    Volume,
}

/// Rolling mean over a fixed window. Also used as a building block by other
/// indicators (Stochastic-RSI %D).
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::new(),
            sum: 0.0,
        }
    }

    pub fn next(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.window.push_back(x);
        self.sum += x;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        if self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmaState {
    source: SmaSource,
    mean: RollingMean,
}

impl SmaState {
    pub fn new(source: SmaSource, period: usize) -> Self {
        Self {
            source,
            mean: RollingMean::new(period),
        }
    }
}

impl IndicatorState for SmaState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        let x = match self.source {
            SmaSource::Close => candle.close,
            SmaSource::Volume => candle.volume,
        };
        self.mean.next(x).map(IndicatorValue::Simple)
    }
}
