//! Data models for RabbitMQ log datasets.

pub mod log;

pub use log::{parse_timestamp, LogEntry, LogValidationError, Severity};
