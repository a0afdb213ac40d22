//! Configuration module for the LQT engine.
//!
//! This module contains the tuning knobs of the query engine and how they are
//! loaded from the environment.

pub mod query;

pub use query::{ConfigError, EngineConfig};
