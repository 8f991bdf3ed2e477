//! Percentage change of close against its trailing minimum.
//!
//! PCT_CHANGE[i] = (close[i] - min[i]) / min[i] * 100, where `min` is the
//! rolling minimum with the same window and leniency. Undefined while the
//! minimum is undefined or when |min| < EPSILON.

use crate::domain::candle::Candle;
use crate::domain::indicator::{Extremum, ExtremumState, IndicatorState, IndicatorValue, EPSILON};

#[derive(Debug, Clone)]
pub struct PctChangeState {
    reference: ExtremumState,
}

impl PctChangeState {
    pub fn new(window: usize, lenient: bool) -> Self {
        Self {
            reference: ExtremumState::new(Extremum::Min, window, lenient),
        }
    }
}

impl IndicatorState for PctChangeState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        let min = self.reference.next(candle.close)?;
        if min.abs() < EPSILON {
            return None;
        }
        Some(IndicatorValue::Simple((candle.close - min) / min * 100.0))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::indicator::{calculate, make_candles, simple, IndicatorType};
    use approx::assert_relative_eq;

    #[test]
    fn surge_against_trailing_low() {
        let candles = make_candles(&[100.0, 90.0, 95.0, 120.0]);
        let series = calculate(
            &IndicatorType::PctChange {
                window: 3,
                lenient: false,
            },
            &candles,
        );
        assert!(!series.is_defined(1));
        assert_relative_eq!(simple(&series, 2), 5.0 / 90.0 * 100.0, epsilon = 1e-9);
        assert_relative_eq!(simple(&series, 3), 30.0 / 90.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_reference_is_undefined() {
        let candles = make_candles(&[0.0, 0.0, 5.0, 10.0]);
        let series = calculate(
            &IndicatorType::PctChange {
                window: 2,
                lenient: false,
            },
            &candles,
        );
        assert!(!series.is_defined(1));
        assert!(!series.is_defined(2));
        assert_relative_eq!(simple(&series, 3), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn lenient_starts_at_zero() {
        let candles = make_candles(&[50.0, 60.0]);
        let series = calculate(
            &IndicatorType::PctChange {
                window: 96,
                lenient: true,
            },
            &candles,
        );
        assert_relative_eq!(simple(&series, 0), 0.0);
        assert_relative_eq!(simple(&series, 1), 20.0, epsilon = 1e-9);
    }
}
