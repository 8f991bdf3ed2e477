//! Average Directional Index (Wilder).
//!
//! From the second bar on:
//!   +DM = high - prev_high when it exceeds prev_low - low and is positive, else 0
//!   -DM = prev_low - low when it exceeds high - prev_high and is positive, else 0
//!   TR  = true range against the previous close
//! TR, +DM and -DM are Wilder-smoothed over `period`, then
//!   DI± = 100 * smoothed DM± / smoothed TR   (0 when smoothed TR < EPSILON)
//!   DX  = 100 * |DI+ - DI-| / (DI+ + DI-)    (0 when DI+ + DI- < EPSILON)
//!   ADX = Wilder smoothing of DX
//!
//! DX is first available at bar `period`; the ADX seed (mean of the first
//! `period` DX values) lands on bar 2*period - 1 and is kept internal, so the
//! first published value is at bar 2*period.

use crate::domain::candle::Candle;
use crate::domain::indicator::atr::Wilder;
use crate::domain::indicator::{IndicatorState, IndicatorValue, EPSILON};

#[derive(Debug, Clone)]
pub struct AdxState {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    tr: Wilder,
    plus_dm: Wilder,
    minus_dm: Wilder,
    adx: Wilder,
}

impl AdxState {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            tr: Wilder::new(period),
            plus_dm: Wilder::new(period),
            minus_dm: Wilder::new(period),
            adx: Wilder::new(period),
        }
    }

    fn next_dx(&mut self, candle: &Candle) -> Option<f64> {
        let (prev_high, prev_low, prev_close) =
            self.prev.replace((candle.high, candle.low, candle.close))?;

        let up = candle.high - prev_high;
        let down = prev_low - candle.low;
        let plus = if up > down && up > 0.0 { up } else { 0.0 };
        let minus = if down > up && down > 0.0 { down } else { 0.0 };

        let tr = self.tr.next(candle.true_range(prev_close));
        let plus = self.plus_dm.next(plus);
        let minus = self.minus_dm.next(minus);
        let (tr, plus, minus) = (tr?, plus?, minus?);

        let (plus_di, minus_di) = if tr < EPSILON {
            (0.0, 0.0)
        } else {
            (100.0 * plus / tr, 100.0 * minus / tr)
        };
        let di_sum = plus_di + minus_di;
        if di_sum < EPSILON {
            return Some(0.0);
        }
        Some(100.0 * (plus_di - minus_di).abs() / di_sum)
    }
}

impl IndicatorState for AdxState {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        let dx = self.next_dx(candle)?;
        let adx = self.adx.next(dx)?;
        if self.adx.count() <= self.period {
            return None;
        }
        Some(IndicatorValue::Simple(adx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{calculate, make_candles, simple, IndicatorType};
    use approx::assert_relative_eq;

    #[test]
    fn adx_warmup_is_two_periods() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 4.0).collect();
        let series = calculate(&IndicatorType::Adx(10), &make_candles(&closes));
        assert!(!series.is_defined(19));
        assert!(series.is_defined(20));
    }

    #[test]
    fn adx_strong_uptrend_is_high() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let series = calculate(&IndicatorType::Adx(10), &make_candles(&closes));
        // Only +DM is ever positive, so DX is 100 on every bar.
        assert_relative_eq!(simple(&series, 59), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn adx_flat_market_is_zero() {
        let series = calculate(&IndicatorType::Adx(3), &make_candles(&[50.0; 12]));
        for i in 6..12 {
            assert_relative_eq!(simple(&series, i), 0.0);
        }
    }

    #[test]
    fn adx_in_range() {
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 + 8.0 * (i as f64 * 0.21).sin() + (i % 4) as f64)
            .collect();
        let series = calculate(&IndicatorType::Adx(14), &make_candles(&closes));
        for i in 28..120 {
            let v = simple(&series, i);
            assert!((0.0..=100.0).contains(&v), "ADX {v} out of range at {i}");
        }
    }

    #[test]
    fn adx_known_small_series() {
        // Period 1: every smoother is the identity, ADX publishes from bar 2.
        let candles = make_candles(&[10.0, 12.0, 11.0]);
        let series = calculate(&IndicatorType::Adx(1), &candles);
        assert!(!series.is_defined(1));
        // Bar 2: high 13 vs 13, low 10 vs 9 → both DM 0 → DX 0
        assert_relative_eq!(simple(&series, 2), 0.0);
    }
}
