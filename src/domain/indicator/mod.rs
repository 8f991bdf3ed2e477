//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series, `None` while undefined
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values aligned with the candles
//! - `IndicatorState`: Owned accumulator that advances an indicator by one candle
//! - `IndicatorSet`: The computed series for a pipeline, keyed by `IndicatorType`
//!
//! Every indicator is written once, as an accumulator. Batch computation folds
//! the accumulator over the candles, so a value at index `i` can only ever see
//! candles `0..=i`, and live updates produce exactly the batch values.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod crossover;
pub mod ema;
pub mod extremum;
pub mod macd;
pub mod pct_change;
pub mod rsi;
pub mod sma;
pub mod stoch_rsi;

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use rayon::prelude::*;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::rule::IndicatorField;

pub use adx::AdxState;
pub use atr::AtrState;
pub use bollinger::BollingerState;
pub use ema::EmaState;
pub use extremum::{Extremum, ExtremumState};
pub use macd::MacdState;
pub use pct_change::PctChangeState;
pub use rsi::RsiState;
pub use sma::{SmaSource, SmaState};
pub use stoch_rsi::StochRsiState;

/// Denominators smaller than this are treated as zero.
pub const EPSILON: f64 = 1e-12;

/// Largest window or period any indicator accepts.
pub const MAX_PERIOD: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<IndicatorValue>,
}

impl IndicatorPoint {
    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    /// `%K` and `%D` are published together once `d_period` consecutive `%K` values exist.
    StochRsi { k: f64, d: f64 },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

impl IndicatorValue {
    /// Extract one output of the indicator. `None` if the field does not belong
    /// to this indicator shape or is itself still undefined.
    pub fn field(&self, field: IndicatorField) -> Option<f64> {
        match (self, field) {
            (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
            (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine) => Some(*line),
            (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => Some(*signal),
            (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => {
                Some(*histogram)
            }
            (IndicatorValue::StochRsi { k, .. }, IndicatorField::StochRsiK) => Some(*k),
            (IndicatorValue::StochRsi { d, .. }, IndicatorField::StochRsiD) => Some(*d),
            (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => {
                Some(*upper)
            }
            (IndicatorValue::Bollinger { middle, .. }, IndicatorField::BollingerMiddle) => {
                Some(*middle)
            }
            (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => {
                Some(*lower)
            }
            _ => None,
        }
    }
}

/// Indicator identity plus parameters.
///
/// Bollinger multipliers are stored as hundredths so the type stays `Eq + Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Min { window: usize, lenient: bool },
    Max { window: usize, lenient: bool },
    PctChange { window: usize, lenient: bool },
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    StochRsi {
        rsi_period: usize,
        k_period: usize,
        d_period: usize,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        up_x100: u32,
        down_x100: u32,
    },
    Atr(usize),
    Adx(usize),
    VolumeSma(usize),
}

impl IndicatorType {
    /// Number of leading points that are undefined for these parameters.
    pub fn warmup_length(&self) -> usize {
        match self {
            IndicatorType::Min { window, lenient }
            | IndicatorType::Max { window, lenient }
            | IndicatorType::PctChange { window, lenient } => {
                if *lenient {
                    0
                } else {
                    window.saturating_sub(1)
                }
            }
            IndicatorType::Sma(period)
            | IndicatorType::Ema(period)
            | IndicatorType::VolumeSma(period) => period.saturating_sub(1),
            IndicatorType::Bollinger { period, .. } => period.saturating_sub(1),
            IndicatorType::Rsi(period) | IndicatorType::Atr(period) => *period,
            IndicatorType::StochRsi {
                rsi_period,
                k_period,
                d_period,
            } => rsi_period
                .saturating_add(k_period.saturating_sub(1))
                .saturating_add(d_period.saturating_sub(1)),
            IndicatorType::Macd { slow, signal, .. } => {
                slow.saturating_sub(1).saturating_add(signal.saturating_sub(1))
            }
            IndicatorType::Adx(period) => period.saturating_mul(2),
        }
    }

    /// Reject parameters no indicator can be computed with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: &str| {
            Err(EngineError::InvalidParameter {
                indicator: self.to_string(),
                reason: reason.to_string(),
            })
        };
        let too_long = format!("periods longer than {} bars are not supported", MAX_PERIOD);
        match self {
            IndicatorType::Min { window, .. }
            | IndicatorType::Max { window, .. }
            | IndicatorType::PctChange { window, .. } => {
                if *window == 0 {
                    return invalid("window must be at least 1");
                }
                if *window > MAX_PERIOD {
                    return invalid(&too_long);
                }
            }
            IndicatorType::Sma(p)
            | IndicatorType::Ema(p)
            | IndicatorType::Rsi(p)
            | IndicatorType::Atr(p)
            | IndicatorType::Adx(p)
            | IndicatorType::VolumeSma(p) => {
                if *p == 0 {
                    return invalid("period must be at least 1");
                }
                if *p > MAX_PERIOD {
                    return invalid(&too_long);
                }
            }
            IndicatorType::StochRsi {
                rsi_period,
                k_period,
                d_period,
            } => {
                if *rsi_period == 0 || *k_period == 0 || *d_period == 0 {
                    return invalid("all periods must be at least 1");
                }
                if [*rsi_period, *k_period, *d_period].iter().any(|p| *p > MAX_PERIOD) {
                    return invalid(&too_long);
                }
            }
            IndicatorType::Macd { fast, slow, signal } => {
                if *fast == 0 || *slow == 0 || *signal == 0 {
                    return invalid("all periods must be at least 1");
                }
                if [*fast, *slow, *signal].iter().any(|p| *p > MAX_PERIOD) {
                    return invalid(&too_long);
                }
                if fast >= slow {
                    return invalid("fast period must be shorter than slow period");
                }
            }
            IndicatorType::Bollinger { period, .. } => {
                if *period == 0 {
                    return invalid("period must be at least 1");
                }
                if *period > MAX_PERIOD {
                    return invalid(&too_long);
                }
            }
        }
        Ok(())
    }

    /// Whether `field` is one of the outputs this indicator produces.
    pub fn has_field(&self, field: IndicatorField) -> bool {
        match self {
            IndicatorType::Macd { .. } => matches!(
                field,
                IndicatorField::MacdLine | IndicatorField::MacdSignal | IndicatorField::MacdHistogram
            ),
            IndicatorType::StochRsi { .. } => {
                matches!(field, IndicatorField::StochRsiK | IndicatorField::StochRsiD)
            }
            IndicatorType::Bollinger { .. } => matches!(
                field,
                IndicatorField::BollingerUpper
                    | IndicatorField::BollingerMiddle
                    | IndicatorField::BollingerLower
            ),
            _ => field == IndicatorField::Value,
        }
    }

    /// Every output of this indicator, in export order.
    pub fn fields(&self) -> &'static [IndicatorField] {
        match self {
            IndicatorType::Macd { .. } => &[
                IndicatorField::MacdLine,
                IndicatorField::MacdSignal,
                IndicatorField::MacdHistogram,
            ],
            IndicatorType::StochRsi { .. } => &[IndicatorField::StochRsiK, IndicatorField::StochRsiD],
            IndicatorType::Bollinger { .. } => &[
                IndicatorField::BollingerUpper,
                IndicatorField::BollingerMiddle,
                IndicatorField::BollingerLower,
            ],
            _ => &[IndicatorField::Value],
        }
    }

    /// Fresh accumulator for this indicator.
    pub fn new_state(&self) -> Box<dyn IndicatorState> {
        match self {
            IndicatorType::Min { window, lenient } => {
                Box::new(ExtremumState::new(Extremum::Min, *window, *lenient))
            }
            IndicatorType::Max { window, lenient } => {
                Box::new(ExtremumState::new(Extremum::Max, *window, *lenient))
            }
            IndicatorType::PctChange { window, lenient } => {
                Box::new(PctChangeState::new(*window, *lenient))
            }
            IndicatorType::Sma(period) => Box::new(SmaState::new(SmaSource::Close, *period)),
            IndicatorType::VolumeSma(period) => {
                Box::new(SmaState::new(SmaSource::Volume, *period))
            }
            IndicatorType::Ema(period) => Box::new(EmaState::new(*period)),
            IndicatorType::Rsi(period) => Box::new(RsiState::new(*period)),
            IndicatorType::StochRsi {
                rsi_period,
                k_period,
                d_period,
            } => Box::new(StochRsiState::new(*rsi_period, *k_period, *d_period)),
            IndicatorType::Macd { fast, slow, signal } => {
                Box::new(MacdState::new(*fast, *slow, *signal))
            }
            IndicatorType::Bollinger {
                period,
                up_x100,
                down_x100,
            } => Box::new(BollingerState::new(
                *period,
                *up_x100 as f64 / 100.0,
                *down_x100 as f64 / 100.0,
            )),
            IndicatorType::Atr(period) => Box::new(AtrState::new(*period)),
            IndicatorType::Adx(period) => Box::new(AdxState::new(*period)),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lenient_suffix = |lenient: bool| if lenient { ", LENIENT" } else { "" };
        match self {
            IndicatorType::Min { window, lenient } => {
                write!(f, "MIN({}{})", window, lenient_suffix(*lenient))
            }
            IndicatorType::Max { window, lenient } => {
                write!(f, "MAX({}{})", window, lenient_suffix(*lenient))
            }
            IndicatorType::PctChange { window, lenient } => {
                write!(f, "PCT_CHANGE({}{})", window, lenient_suffix(*lenient))
            }
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::StochRsi {
                rsi_period,
                k_period,
                d_period,
            } => write!(f, "STOCH_RSI({},{},{})", rsi_period, k_period, d_period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                up_x100,
                down_x100,
            } => {
                let up = *up_x100 as f64 / 100.0;
                let down = *down_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{},{})", period, up, down)
            }
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
        }
    }
}

/// Trailing state of one indicator instance.
///
/// `update` is called exactly once per candle, in order, and returns the
/// indicator value for that candle (`None` while undefined).
pub trait IndicatorState: Send {
    fn update(&mut self, candle: &Candle) -> Option<IndicatorValue>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn new(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_defined(&self, index: usize) -> bool {
        self.values.get(index).is_some_and(IndicatorPoint::is_defined)
    }

    pub fn value(&self, index: usize) -> Option<&IndicatorValue> {
        self.values.get(index).and_then(|p| p.value.as_ref())
    }

    pub fn field_at(&self, index: usize, field: IndicatorField) -> Option<f64> {
        self.value(index).and_then(|v| v.field(field))
    }

    /// The whole series projected onto one field.
    pub fn field_values(&self, field: IndicatorField) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| p.value.as_ref().and_then(|v| v.field(field)))
            .collect()
    }

    /// Index of the first defined point, if any.
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(IndicatorPoint::is_defined)
    }
}

/// Fold a fresh accumulator over `candles`.
pub fn calculate(indicator_type: &IndicatorType, candles: &[Candle]) -> IndicatorSeries {
    let mut state = indicator_type.new_state();
    let values = candles
        .iter()
        .map(|c| IndicatorPoint {
            timestamp: c.timestamp,
            value: state.update(c),
        })
        .collect();
    IndicatorSeries {
        indicator_type: indicator_type.clone(),
        values,
    }
}

/// The computed indicator series of one pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    series: HashMap<IndicatorType, IndicatorSeries>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: IndicatorSeries) {
        self.series.insert(series.indicator_type.clone(), series);
    }

    pub fn get(&self, indicator_type: &IndicatorType) -> Option<&IndicatorSeries> {
        self.series.get(indicator_type)
    }

    pub fn contains(&self, indicator_type: &IndicatorType) -> bool {
        self.series.contains_key(indicator_type)
    }

    pub fn field_at(
        &self,
        indicator_type: &IndicatorType,
        index: usize,
        field: IndicatorField,
    ) -> Option<f64> {
        self.series
            .get(indicator_type)
            .and_then(|s| s.field_at(index, field))
    }

    pub(crate) fn push_point(&mut self, indicator_type: &IndicatorType, point: IndicatorPoint) {
        self.series
            .entry(indicator_type.clone())
            .or_insert_with(|| IndicatorSeries::new(indicator_type.clone()))
            .values
            .push(point);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndicatorType, &IndicatorSeries)> {
        self.series.iter()
    }

    /// Indicator types sorted by display name, for stable output.
    pub fn sorted_types(&self) -> Vec<&IndicatorType> {
        let mut types: Vec<&IndicatorType> = self.series.keys().collect();
        types.sort_by_key(|t| t.to_string());
        types
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Compute every indicator over the full candle history.
///
/// Indicators are independent of each other (composites own their upstream
/// accumulators), so each one runs as its own rayon task over the shared,
/// read-only candles.
pub fn compute_indicators(candles: &[Candle], types: &[IndicatorType]) -> IndicatorSet {
    let computed: Vec<IndicatorSeries> = types
        .par_iter()
        .map(|t| {
            tracing::debug!(indicator = %t, bars = candles.len(), "computing indicator");
            calculate(t, candles)
        })
        .collect();

    let mut set = IndicatorSet::new();
    for series in computed {
        set.insert(series);
    }
    set
}

/// Synthetic candles from closes, spaced 15 minutes apart.
///
/// open = prev close (or close for the first bar), high/low one unit outside
/// the body, volume 1000.
#[cfg(test)]
pub(crate) fn make_candles(closes: &[f64]) -> Vec<Candle> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + chrono::Duration::minutes(15 * i as i64),
                open,
                high: open.max(close) + 1.0,
                low: (open.min(close) - 1.0).max(0.0),
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Simple value at `index`, panicking if it is undefined or not simple.
#[cfg(test)]
pub(crate) fn simple(series: &IndicatorSeries, index: usize) -> f64 {
    match series.value(index) {
        Some(IndicatorValue::Simple(v)) => *v,
        other => panic!("expected simple value at {index}, got {other:?}"),
    }
}
