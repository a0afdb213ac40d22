//! Storage traits and implementations.
//!
//! The `LogStore` trait is the boundary between the query engine and wherever
//! log entries live.

pub mod log_store;

pub use log_store::{InMemoryLogStore, LogQueryResult, LogStore, LogStoreError};
