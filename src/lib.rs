//! barsignal: per-bar trading signals from OHLCV candles.
//!
//! Hexagonal architecture: indicators, rules and the engine live in
//! [`domain`], port traits in [`ports`], file-backed implementations in
//! [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
