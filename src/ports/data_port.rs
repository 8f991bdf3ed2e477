//! Candle source port trait.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;

pub trait DataPort {
    /// All candles of the source, in file order. Ordering is not checked here;
    /// building a `CandleSeries` from the result does that.
    fn fetch_candles(&self) -> Result<Vec<Candle>, EngineError>;
}
