//! Average True Range (Wilder) and the Wilder smoother shared with RSI and ADX.
//!
//! TR[i] = max(high-low, |high-prev_close|, |low-prev_close|), from bar 1 on.
//! The first bar has no previous close and contributes no TR.
//! Seed: mean of TR[1..=n], then
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.
//! Warmup: first n bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorState, IndicatorValue};

/// Wilder smoothing: simple mean of the first `period` inputs, then
/// avg = (prev_avg * (n-1) + x) / n.
#[derive(Debug, Clone)]
pub struct Wilder {
    period: usize,
    seed_sum: f64,
    count: usize,
    avg: Option<f64>,
}

impl Wilder {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            seed_sum: 0.0,
            count: 0,
            avg: None,
        }
    }

    pub fn next(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.count += 1;
        match self.avg {
            Some(prev) => {
                let n = self.period as f64;
                self.avg = Some((prev * (n - 1.0) + x) / n);
            }
            None => {
                self.seed_sum += x;
                if self.count == self.period {
                    self.avg = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.avg
    }

    /// Number of inputs consumed so far.
    pub fn count(&self) -> usize {
        self.count
    }
}

#[derive(Debug, Clone)]
pub struct AtrState {
    prev_close: Option<f64>,
    smoother: Wilder,
}

impl AtrState {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            smoother: Wilder::new(period),
        }
    }
}

impl IndicatorState for AtrState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        let prev_close = self.prev_close.replace(candle.close)?;
        self.smoother
            .next(candle.true_range(prev_close))
            .map(IndicatorValue::Simple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{calculate, simple, IndicatorType};
    use chrono::NaiveDate;

    fn make_candle(i: i64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::minutes(15 * i),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn atr_warmup() {
        let candles: Vec<Candle> = (0..5).map(|i| make_candle(i, 110.0, 90.0, 100.0)).collect();
        let series = calculate(&IndicatorType::Atr(3), &candles);

        assert_eq!(series.len(), 5);
        assert!(!series.is_defined(0));
        assert!(!series.is_defined(2));
        assert!(series.is_defined(3));
        assert!(series.is_defined(4));
    }

    #[test]
    fn atr_seed_skips_first_bar() {
        let candles = vec![
            make_candle(0, 200.0, 50.0, 105.0),
            make_candle(1, 115.0, 105.0, 110.0),
            make_candle(2, 130.0, 110.0, 125.0),
            make_candle(3, 126.0, 120.0, 124.0),
        ];
        let series = calculate(&IndicatorType::Atr(3), &candles);
        // TR[1] = 10, TR[2] = 20, TR[3] = max(6, 1, 5) = 6
        assert!((simple(&series, 3) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let candles = vec![
            make_candle(0, 110.0, 100.0, 105.0),
            make_candle(1, 115.0, 105.0, 110.0),
            make_candle(2, 130.0, 110.0, 125.0),
            make_candle(3, 126.0, 120.0, 124.0),
            make_candle(4, 140.0, 130.0, 135.0),
        ];
        let series = calculate(&IndicatorType::Atr(3), &candles);
        // TR[4] = max(10, 16, 6) = 16
        let expected = (12.0 * 2.0 + 16.0) / 3.0;
        assert!((simple(&series, 4) - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_handles_gaps() {
        let candles = vec![
            make_candle(0, 110.0, 100.0, 105.0),
            make_candle(1, 130.0, 120.0, 125.0),
            make_candle(2, 120.0, 110.0, 115.0),
            make_candle(3, 121.0, 119.0, 120.0),
        ];
        let series = calculate(&IndicatorType::Atr(2), &candles);
        assert!(!series.is_defined(1));
        // TR[1] = |130 - 105| = 25, TR[2] = |110 - 125| = 15
        assert!((simple(&series, 2) - 20.0).abs() < 1e-9);
        // TR[3] = max(2, 6, 4) = 6
        assert!((simple(&series, 3) - 13.0).abs() < 1e-9);
    }

    #[test]
    fn wilder_counts_inputs() {
        let mut w = Wilder::new(2);
        assert_eq!(w.next(4.0), None);
        assert_eq!(w.next(6.0), Some(5.0));
        assert_eq!(w.next(9.0), Some(7.0));
        assert_eq!(w.count(), 3);
    }
}
