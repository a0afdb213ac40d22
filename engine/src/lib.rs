//! LQT query engine
//!
//! Parses, validates and evaluates the RabbitMQ log query language, and
//! serves the autocomplete data used to build query editors.
//!
//! # Modules
//!
//! - [`config`] - Engine configuration
//! - [`models`] - The log entry model
//! - [`query`] - Lexer, parser, validator, autocomplete and evaluator
//! - [`storage`] - Storage traits and implementations
//!
//! # Example
//!
//! ```
//! use engine::query::{init, validate_query, DatasetCatalogs};
//!
//! init(DatasetCatalogs::unresolved()).unwrap();
//!
//! let result = validate_query("@24h :crashes | limit 50").unwrap();
//! assert!(result.valid());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod models;
pub mod query;
pub mod storage;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
