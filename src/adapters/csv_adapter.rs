//! CSV candle reader and signal/indicator writer.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::rule::IndicatorRef;
use crate::domain::signal::{BarSignals, SignalKind};
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

/// Timestamp format used for output and accepted first on input.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct CandleRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Serialize)]
struct SignalRecord {
    timestamp: String,
    enter_long: u8,
    enter_short: u8,
    exit_long: u8,
    exit_short: u8,
}

impl From<&BarSignals> for SignalRecord {
    fn from(bar: &BarSignals) -> Self {
        let [enter_long, enter_short, exit_long, exit_short] = bar.signals.to_bits();
        Self {
            timestamp: bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            enter_long,
            enter_short,
            exit_long,
            exit_short,
        }
    }
}

/// Parse `%Y-%m-%d %H:%M:%S`, its `T`-separated form, or RFC 3339.
/// RFC 3339 offsets are normalised to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Reads `timestamp,open,high,low,close,volume` rows from one file.
pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn parse_candles(&self, content: &str) -> Result<Vec<Candle>, EngineError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for (i, result) in rdr.deserialize::<CandleRecord>().enumerate() {
            let record = result?;
            // Header is row 1.
            let row = i + 2;
            let timestamp =
                parse_timestamp(&record.timestamp).ok_or_else(|| EngineError::InvalidRecord {
                    source_name: self.path.display().to_string(),
                    row,
                    reason: format!("invalid timestamp '{}'", record.timestamp),
                })?;
            candles.push(Candle {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }

        tracing::debug!(
            path = %self.path.display(),
            candles = candles.len(),
            "read candles"
        );
        Ok(candles)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_candles(&self) -> Result<Vec<Candle>, EngineError> {
        let content = fs::read_to_string(&self.path)?;
        self.parse_candles(&content)
    }
}

/// Writes signal and indicator tables as CSV to any `Write`.
pub struct CsvReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvReportWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(inner),
        }
    }

    pub fn into_inner(self) -> Result<W, EngineError> {
        self.writer
            .into_inner()
            .map_err(|e| EngineError::Io(e.into_error()))
    }
}

impl<W: Write> ReportPort for CsvReportWriter<W> {
    fn write_signals(&mut self, bars: &[BarSignals]) -> Result<(), EngineError> {
        let mut header = vec!["timestamp"];
        header.extend(SignalKind::ALL.iter().map(SignalKind::key));
        self.writer.write_record(&header)?;
        for bar in bars {
            self.writer.serialize(SignalRecord::from(bar))?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn write_indicators(
        &mut self,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<(), EngineError> {
        let columns: Vec<IndicatorRef> = indicators
            .sorted_types()
            .into_iter()
            .flat_map(|t| {
                t.fields().iter().map(|field| IndicatorRef {
                    indicator_type: t.clone(),
                    field: *field,
                })
            })
            .collect();

        let mut header = vec!["timestamp".to_string(), "close".to_string()];
        header.extend(columns.iter().map(IndicatorRef::to_string));
        self.writer.write_record(&header)?;

        for (i, candle) in candles.iter().enumerate() {
            let mut row = vec![
                candle.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                candle.close.to_string(),
            ];
            row.extend(columns.iter().map(|col| {
                indicators
                    .field_at(&col.indicator_type, i, col.field)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }));
            self.writer.write_record(&row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
