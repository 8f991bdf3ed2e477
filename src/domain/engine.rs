//! Batch and live signal engines.
//!
//! [`Engine`] checks a [`StrategyConfig`] once (indicator parameters, rule
//! references) and then runs it either over a whole [`CandleSeries`] or, via
//! [`LiveEngine`], one candle at a time. Both paths fold the same indicator
//! accumulators, so they produce identical signals for identical input.

use crate::domain::candle::{Candle, CandleSeries};
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    compute_indicators, IndicatorPoint, IndicatorSet, IndicatorState, IndicatorType,
};
use crate::domain::rule_eval::History;
use crate::domain::signal::{BarSignals, SignalEmitter, SignalKind};
use crate::domain::strategy::StrategyConfig;

/// Output of a batch run.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub bars: Vec<BarSignals>,
    pub indicators: IndicatorSet,
}

impl BatchResult {
    /// Number of bars on which `kind` fired.
    pub fn count(&self, kind: SignalKind) -> usize {
        self.bars.iter().filter(|b| b.signals.get(kind)).count()
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    config: StrategyConfig,
    indicators: Vec<IndicatorType>,
    emitter: SignalEmitter,
}

impl Engine {
    pub fn new(config: StrategyConfig) -> Result<Self, EngineError> {
        let mut indicators: Vec<IndicatorType> = Vec::new();
        for indicator in &config.indicators {
            indicator.validate()?;
            if !indicators.contains(indicator) {
                indicators.push(indicator.clone());
            }
        }

        for (kind, indicator) in config.rules.referenced_indicators() {
            if !indicators.contains(&indicator) {
                return Err(EngineError::UnknownIndicator {
                    indicator: indicator.to_string(),
                    rule: kind.key().to_string(),
                });
            }
        }

        tracing::debug!(
            strategy = %config.name,
            indicators = ?indicators.iter().map(ToString::to_string).collect::<Vec<_>>(),
            startup_candle_count = config.startup_candle_count,
            "built indicator pipeline"
        );

        let emitter = SignalEmitter::new(
            config.rules.clone(),
            config.startup_candle_count,
            config.mutual_exclusion,
        );
        Ok(Self {
            config,
            indicators,
            emitter,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Declared indicators, deduplicated, in declaration order.
    pub fn indicators(&self) -> &[IndicatorType] {
        &self.indicators
    }

    /// Every declared indicator over the full series.
    pub fn compute_indicators(&self, series: &CandleSeries) -> IndicatorSet {
        compute_indicators(series.candles(), &self.indicators)
    }

    pub fn run_batch(&self, series: &CandleSeries) -> BatchResult {
        let indicators = self.compute_indicators(series);
        let candles = series.candles();
        let bars: Vec<BarSignals> = (0..candles.len())
            .filter_map(|index| History::at(candles, &indicators, index))
            .map(|history| BarSignals {
                index: history.index(),
                timestamp: history.current().timestamp,
                signals: self.emitter.emit(&history),
            })
            .collect();

        let result = BatchResult { bars, indicators };
        tracing::info!(
            strategy = %self.config.name,
            bars = result.bars.len(),
            enter_long = result.count(SignalKind::EnterLong),
            enter_short = result.count(SignalKind::EnterShort),
            exit_long = result.count(SignalKind::ExitLong),
            exit_short = result.count(SignalKind::ExitShort),
            "batch run complete"
        );
        result
    }

    /// Fresh incremental runner with empty history.
    pub fn live(&self) -> LiveEngine {
        LiveEngine {
            states: self
                .indicators
                .iter()
                .map(|t| (t.clone(), t.new_state()))
                .collect(),
            series: CandleSeries::new(),
            indicators: IndicatorSet::new(),
            emitter: self.emitter.clone(),
        }
    }
}

/// Incremental runner: one `push` per closed candle.
pub struct LiveEngine {
    states: Vec<(IndicatorType, Box<dyn IndicatorState>)>,
    series: CandleSeries,
    indicators: IndicatorSet,
    emitter: SignalEmitter,
}

impl LiveEngine {
    /// Append `candle`, advance every indicator once and evaluate the new bar.
    ///
    /// A rejected candle leaves the engine unchanged.
    pub fn push(&mut self, candle: Candle) -> Result<BarSignals, EngineError> {
        if let Err(err) = self.series.check_next(&candle) {
            tracing::warn!(error = %err, "rejected candle");
            return Err(err);
        }

        for (indicator_type, state) in &mut self.states {
            let point = IndicatorPoint {
                timestamp: candle.timestamp,
                value: state.update(&candle),
            };
            self.indicators.push_point(indicator_type, point);
        }
        self.series.append(candle)?;

        let index = self.series.len() - 1;
        let candles = self.series.candles();
        let signals = History::at(candles, &self.indicators, index)
            .map(|history| self.emitter.emit(&history))
            .unwrap_or_default();
        Ok(BarSignals {
            index,
            timestamp: candles[index].timestamp,
            signals,
        })
    }

    pub fn candles(&self) -> &CandleSeries {
        &self.series
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }
}
