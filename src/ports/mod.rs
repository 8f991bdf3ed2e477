//! Port traits the domain talks to; adapters provide the implementations.

pub mod config_port;
pub mod data_port;
pub mod report_port;
