#![allow(dead_code)]

use barsignal::adapters::file_config_adapter::FileConfigAdapter;
use barsignal::domain::candle::{Candle, CandleSeries};
use barsignal::domain::config_validation::load_strategy_config;
use barsignal::domain::engine::Engine;
use barsignal::domain::strategy::StrategyConfig;
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Write;
use std::path::PathBuf;

/// Bar `i` of a 15-minute series starting 2024-01-01 00:00.
pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(15 * i as i64)
}

/// Candles where each bar opens at the previous close and the wicks reach half
/// a unit beyond the body.
pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: ts(i),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 1000.0 + (i % 7) as f64 * 150.0,
            }
        })
        .collect()
}

/// 100 flat bars at 100, a 9-bar rally to 136, one bar dumping to 125, then a
/// slow slide: 120 bars in total. Bar 109 is the only big bearish candle.
pub fn surge_closes() -> Vec<f64> {
    let mut closes = vec![100.0; 100];
    closes.extend((1..=9).map(|k| 100.0 + 4.0 * k as f64));
    closes.push(125.0);
    closes.extend((1..=10).map(|k| 125.0 - k as f64));
    closes
}

pub const SURGE_BAR: usize = 109;

/// Trending sine wave that keeps every indicator busy.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 15.0 * (x * 0.11).sin() + 6.0 * (x * 0.37).cos() + x * 0.05
        })
        .collect()
}

pub fn series(candles: Vec<Candle>) -> CandleSeries {
    CandleSeries::from_candles(candles).unwrap()
}

pub fn strategy_path(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("strategies")
        .join(file)
}

pub fn load_strategy(file: &str) -> StrategyConfig {
    let adapter = FileConfigAdapter::from_file(strategy_path(file)).unwrap();
    load_strategy_config(&adapter).unwrap()
}

pub fn config_from_ini(content: &str) -> StrategyConfig {
    let adapter = FileConfigAdapter::from_string(content).unwrap();
    load_strategy_config(&adapter).unwrap()
}

pub fn engine_from_ini(content: &str) -> Engine {
    Engine::new(config_from_ini(content)).unwrap()
}

pub fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Candle CSV text in the reader's input format.
pub fn candles_csv(candles: &[Candle]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp.format("%Y-%m-%d %H:%M:%S"),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    out
}
