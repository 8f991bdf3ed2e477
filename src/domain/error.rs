//! Domain error types.

use chrono::NaiveDateTime;

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for barsignal.
///
/// Warm-up gaps and guarded numeric edge cases never show up here: they are
/// carried as undefined indicator points instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("candle {index} at {timestamp} is out of order: previous bar is at {previous}")]
    OutOfOrder {
        index: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("invalid candle {index} at {timestamp}: {reason}")]
    InvalidCandle {
        index: usize,
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("invalid record on row {row} of {source_name}: {reason}")]
    InvalidRecord {
        source_name: String,
        row: usize,
        reason: String,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid parameter for {indicator}: {reason}")]
    InvalidParameter { indicator: String, reason: String },

    #[error("rule {rule} references {indicator}, which is not declared in the pipeline")]
    UnknownIndicator { indicator: String, rule: String },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. }
            | EngineError::InvalidParameter { .. }
            | EngineError::UnknownIndicator { .. } => 2,
            EngineError::OutOfOrder { .. }
            | EngineError::InvalidCandle { .. }
            | EngineError::InvalidRecord { .. }
            | EngineError::Csv(_) => 3,
            EngineError::RuleParse(_) => 4,
        };
        std::process::ExitCode::from(code)
    }
}
