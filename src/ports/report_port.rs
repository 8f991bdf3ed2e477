//! Output port for computed signals and indicator dumps.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::signal::BarSignals;

/// Port for writing engine results.
pub trait ReportPort {
    /// One row per bar: timestamp and the four signal bits.
    fn write_signals(&mut self, bars: &[BarSignals]) -> Result<(), EngineError>;

    /// One row per candle with every indicator output; undefined points are left blank.
    fn write_indicators(
        &mut self,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<(), EngineError>;
}
