//! Core domain types and logic.

pub mod candle;
pub mod indicator;
pub mod pattern;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod signal;
pub mod strategy;
pub mod engine;
pub mod config_validation;
pub mod error;
