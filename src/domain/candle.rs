//! Candle (OHLCV bar) representation and the append-only candle series.

use chrono::NaiveDateTime;

use crate::domain::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// |close - open|
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// max(open, close)
    pub fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    /// min(open, close)
    pub fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.body_top()
    }

    pub fn lower_wick(&self) -> f64 {
        self.body_bottom() - self.low
    }

    fn check(&self) -> Result<(), String> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(format!("{name} is not a finite number"));
            }
            if value < 0.0 {
                return Err(format!("{name} is negative ({value})"));
            }
        }
        if self.high < self.low {
            return Err(format!("high {} is below low {}", self.high, self.low));
        }
        Ok(())
    }
}

/// Ordered, append-only sequence of candles.
///
/// Every stored candle has passed validation and carries a timestamp strictly
/// greater than its predecessor. Nothing can be removed or reordered once
/// appended.
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series by appending each candle in turn.
    pub fn from_candles<I>(candles: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = Candle>,
    {
        let mut series = Self::new();
        for candle in candles {
            series.append(candle)?;
        }
        Ok(series)
    }

    /// Validate a candle against the current tail without storing it.
    pub fn check_next(&self, candle: &Candle) -> Result<(), EngineError> {
        let index = self.candles.len();
        candle
            .check()
            .map_err(|reason| EngineError::InvalidCandle {
                index,
                timestamp: candle.timestamp,
                reason,
            })?;
        if let Some(last) = self.candles.last() {
            if candle.timestamp <= last.timestamp {
                return Err(EngineError::OutOfOrder {
                    index,
                    timestamp: candle.timestamp,
                    previous: last.timestamp,
                });
            }
        }
        Ok(())
    }

    pub fn append(&mut self, candle: Candle) -> Result<(), EngineError> {
        self.check_next(&candle)?;
        self.candles.push(candle);
        Ok(())
    }

    /// Read-only view of `[from, to)`, clamped to the series bounds.
    pub fn slice(&self, from: usize, to: usize) -> &[Candle] {
        let to = to.min(self.candles.len());
        let from = from.min(to);
        &self.candles[from..to]
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::minutes(minutes)
    }

    fn sample_candle(minutes: i64) -> Candle {
        Candle {
            timestamp: ts(minutes),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let c = sample_candle(0);
        // high-low=20, |high-100|=10, |low-100|=10 → 20
        assert!((c.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let c = sample_candle(0);
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((c.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let c = sample_candle(0);
        assert!((c.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn shape_fields() {
        let c = sample_candle(0);
        assert_eq!(c.body(), 5.0);
        assert_eq!(c.range(), 20.0);
        assert_eq!(c.body_top(), 105.0);
        assert_eq!(c.body_bottom(), 100.0);
        assert_eq!(c.upper_wick(), 5.0);
        assert_eq!(c.lower_wick(), 10.0);
    }

    #[test]
    fn append_accepts_increasing_timestamps() {
        let mut series = CandleSeries::new();
        series.append(sample_candle(0)).unwrap();
        series.append(sample_candle(15)).unwrap();
        series.append(sample_candle(30)).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.last().unwrap().timestamp, ts(30));
    }

    #[test]
    fn append_rejects_equal_timestamp() {
        let mut series = CandleSeries::new();
        series.append(sample_candle(15)).unwrap();
        let err = series.append(sample_candle(15)).unwrap_err();
        match err {
            EngineError::OutOfOrder {
                index,
                timestamp,
                previous,
            } => {
                assert_eq!(index, 1);
                assert_eq!(timestamp, ts(15));
                assert_eq!(previous, ts(15));
            }
            other => panic!("expected OutOfOrder, got {other:?}"),
        }
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn append_rejects_earlier_timestamp() {
        let mut series = CandleSeries::new();
        series.append(sample_candle(30)).unwrap();
        assert!(matches!(
            series.append(sample_candle(15)),
            Err(EngineError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn append_rejects_negative_volume() {
        let mut series = CandleSeries::new();
        let mut c = sample_candle(0);
        c.volume = -1.0;
        let err = series.append(c).unwrap_err();
        match err {
            EngineError::InvalidCandle { index, reason, .. } => {
                assert_eq!(index, 0);
                assert!(reason.contains("volume"));
            }
            other => panic!("expected InvalidCandle, got {other:?}"),
        }
        assert!(series.is_empty());
    }

    #[test]
    fn append_rejects_nan_and_inverted_range() {
        let mut series = CandleSeries::new();
        let mut c = sample_candle(0);
        c.close = f64::NAN;
        assert!(matches!(
            series.append(c),
            Err(EngineError::InvalidCandle { .. })
        ));

        let mut c = sample_candle(0);
        c.high = 80.0;
        assert!(matches!(
            series.append(c),
            Err(EngineError::InvalidCandle { .. })
        ));
    }

    #[test]
    fn slice_is_clamped() {
        let series =
            CandleSeries::from_candles((0..5).map(|i| sample_candle(i * 15))).unwrap();
        assert_eq!(series.slice(1, 3).len(), 2);
        assert_eq!(series.slice(3, 100).len(), 2);
        assert!(series.slice(10, 20).is_empty());
        assert_eq!(series.slice(1, 3)[0].timestamp, ts(15));
    }

    #[test]
    fn from_candles_stops_at_first_bad_candle() {
        let candles = vec![sample_candle(0), sample_candle(30), sample_candle(15)];
        let err = CandleSeries::from_candles(candles).unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrder { index: 2, .. }));
    }
}
