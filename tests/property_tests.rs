//! Property tests for look-ahead freedom.
//!
//! Signals and indicator values at bar `i` must not change when candles after
//! `i` are removed, and streaming the candles must reproduce the batch run.

mod common;

use barsignal::domain::engine::Engine;
use common::*;
use proptest::prelude::*;

const EVERY_INDICATOR: &str = r#"
[strategy]
name = Every indicator
timeframe = 15m
startup_candle_count = 2

[indicators]
declare = PCT_CHANGE(10), MIN(5, LENIENT), MAX(5), RSI(5), STOCH_RSI(5,3,3), MACD(3,6,3), BOLLINGER(5,2), ATR(4), ADX(3), VOLUME_SMA(4), EMA(4), SMA(6)

[rules]
enter_long = OR(CROSS_ABOVE(EMA(4), SMA(6)), AT_LEAST(2, ABOVE(RSI(5), 60), ABOVE(STOCH_RSI_K(5,3,3), 80), ABOVE(ADX(3), 25)))
enter_short = AND(ABOVE(PCT_CHANGE(10), 5), CROSS_BELOW(MACD_LINE(3,6,3), MACD_SIGNAL(3,6,3)))
exit_long = OR(BELOW(close, BOLLINGER_LOWER(5,2)), CONSECUTIVE(BELOW(close, SHIFT(close, 1)), 2), BELOW(STOCH_RSI_D(5,3,3), 20))
exit_short = OR(ABOVE(volume, MUL(VOLUME_SMA(4), 1.2)), ANY_OF(ABOVE(ATR(4), 3), 3), BELOW(close, MIN(5, LENIENT)), ABOVE(close, MAX(5)))
"#;

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        (50.0..150.0_f64).prop_map(|p| (p * 100.0).round() / 100.0),
        20..80,
    )
}

proptest! {
    #[test]
    fn signals_do_not_depend_on_later_bars(closes in arb_closes(), cut in 1usize..80) {
        let cut = cut.min(closes.len());
        let engine = engine_from_ini(EVERY_INDICATOR);
        let candles = candles_from_closes(&closes);

        let full = engine.run_batch(&series(candles.clone()));
        let truncated = engine.run_batch(&series(candles[..cut].to_vec()));

        prop_assert_eq!(&truncated.bars[..], &full.bars[..cut]);
        for indicator in engine.indicators() {
            let short = truncated.indicators.get(indicator).unwrap();
            let long = full.indicators.get(indicator).unwrap();
            prop_assert_eq!(&short.values[..], &long.values[..cut]);
        }
    }

    #[test]
    fn streaming_reproduces_batch(closes in arb_closes()) {
        let engine: Engine = engine_from_ini(EVERY_INDICATOR);
        let candles = candles_from_closes(&closes);
        let batch = engine.run_batch(&series(candles.clone()));

        let mut live = engine.live();
        for (i, candle) in candles.into_iter().enumerate() {
            let bar = live.push(candle).unwrap();
            prop_assert_eq!(bar, batch.bars[i]);
        }
        prop_assert_eq!(live.indicators(), &batch.indicators);
    }

    #[test]
    fn entries_never_both_fire(closes in arb_closes()) {
        let engine = engine_from_ini(EVERY_INDICATOR);
        let result = engine.run_batch(&series(candles_from_closes(&closes)));
        for bar in &result.bars {
            prop_assert!(!(bar.signals.enter_long && bar.signals.enter_short));
        }
    }
}
