//! Rolling minimum / maximum of close over a trailing window.
//!
//! Strict mode: undefined until `window` closes exist.
//! Lenient mode: defined from the first bar over however many closes exist.
//!
//! A monotonic deque keeps each update amortised O(1).

use std::collections::VecDeque;

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorState, IndicatorValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

impl Extremum {
    /// Whether `candidate` should evict `existing` from the back of the deque.
    fn dominates(self, candidate: f64, existing: f64) -> bool {
        match self {
            Extremum::Min => candidate <= existing,
            Extremum::Max => candidate >= existing,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtremumState {
    kind: Extremum,
    window: usize,
    lenient: bool,
    seen: usize,
    deque: VecDeque<(usize, f64)>,
}

impl ExtremumState {
    pub fn new(kind: Extremum, window: usize, lenient: bool) -> Self {
        Self {
            kind,
            window,
            lenient,
            seen: 0,
            deque: VecDeque::new(),
        }
    }

    pub fn next(&mut self, x: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }
        let index = self.seen;
        self.seen += 1;

        while let Some(&(_, back)) = self.deque.back() {
            if self.kind.dominates(x, back) {
                self.deque.pop_back();
            } else {
                break;
            }
        }
        self.deque.push_back((index, x));

        while let Some(&(front_index, _)) = self.deque.front() {
            if front_index + self.window <= index {
                self.deque.pop_front();
            } else {
                break;
            }
        }

        if !self.lenient && self.seen < self.window {
            return None;
        }
        self.deque.front().map(|&(_, v)| v)
    }
}

impl IndicatorState for ExtremumState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        self.next(candle.close).map(IndicatorValue::Simple)
    }
}
