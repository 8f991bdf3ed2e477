//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, CsvReportWriter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::candle::CandleSeries;
use crate::domain::config_validation::load_strategy_config;
use crate::domain::engine::Engine;
use crate::domain::error::EngineError;
use crate::domain::signal::SignalKind;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "barsignal", about = "Per-bar trading signals from OHLCV candles")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute entry/exit signals for every candle
    Signals {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        candles: PathBuf,
        /// Output CSV file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy file
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Dump every declared indicator for every candle
    Indicators {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        candles: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Signals {
            strategy,
            candles,
            output,
        } => run_signals(&strategy, &candles, output.as_deref()),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Indicators {
            strategy,
            candles,
            output,
        } => run_indicators(&strategy, &candles, output.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load a strategy file and check it against the indicator pipeline.
pub fn load_engine(strategy_path: &Path) -> Result<Engine, EngineError> {
    let adapter = FileConfigAdapter::from_file(strategy_path)?;
    let config = load_strategy_config(&adapter)?;
    Engine::new(config)
}

fn load_candles(candles_path: &Path) -> Result<CandleSeries, EngineError> {
    let candles = CsvAdapter::new(candles_path.to_path_buf()).fetch_candles()?;
    CandleSeries::from_candles(candles)
}

fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>, EngineError> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    Ok(writer)
}

fn run_signals(
    strategy_path: &Path,
    candles_path: &Path,
    output: Option<&Path>,
) -> Result<(), EngineError> {
    let engine = load_engine(strategy_path)?;
    let series = load_candles(candles_path)?;
    let result = engine.run_batch(&series);

    let mut writer = CsvReportWriter::new(open_output(output)?);
    writer.write_signals(&result.bars)?;
    writer.into_inner()?.flush()?;

    if let Some(path) = output {
        eprintln!(
            "Wrote {} bars to {} ({})",
            result.bars.len(),
            path.display(),
            SignalKind::ALL
                .iter()
                .map(|kind| format!("{}={}", kind, result.count(*kind)))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

fn run_validate(strategy_path: &Path) -> Result<(), EngineError> {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let engine = load_engine(strategy_path)?;
    let config = engine.config();

    eprintln!("Name:      {}", config.name);
    if !config.description.is_empty() {
        eprintln!("About:     {}", config.description);
    }
    eprintln!("Timeframe: {}", config.timeframe);
    eprintln!("Startup:   {} candles", config.startup_candle_count);

    eprintln!("\nIndicators:");
    for indicator in engine.indicators() {
        eprintln!("  {} (warm-up {})", indicator, indicator.warmup_length());
    }

    for (kind, rule) in config.rules.iter() {
        eprintln!("\n{}:", kind);
        eprintln!("  {}", rule);
    }

    eprintln!("\nStrategy configuration is valid.");
    Ok(())
}

fn run_indicators(
    strategy_path: &Path,
    candles_path: &Path,
    output: Option<&Path>,
) -> Result<(), EngineError> {
    let engine = load_engine(strategy_path)?;
    let series = load_candles(candles_path)?;
    let indicators = engine.compute_indicators(&series);

    let mut writer = CsvReportWriter::new(open_output(output)?);
    writer.write_indicators(series.candles(), &indicators)?;
    writer.into_inner()?.flush()?;
    Ok(())
}
