//! Query language for RabbitMQ logs.
//!
//! Query text goes through the lexer and the parser into an AST, is checked
//! against the [`SchemaRegistry`], and only then evaluated: the filter first,
//! then each pipeline stage in the order written.
//!
//! # Supported Syntax
//!
//! ```text
//! :errors
//! @24h subsystem == "connections"
//! message contains "timeout" | limit 50
//! labels any ["tls", "disconnects"]
//! (severity == error or severity == warning) and not :tls | sort timestamp desc
//! ```
//!
//! # Example
//!
//! ```
//! use engine::models::{LogEntry, Severity};
//! use engine::query::{evaluate, DatasetCatalogs, QlEngine};
//!
//! let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
//! let query = engine.prepare(":errors | limit 1").unwrap();
//!
//! let entries = vec![
//!     LogEntry::new(1, "rabbit@a", "2024-01-01 10:00:00", Severity::Error, "first"),
//!     LogEntry::new(2, "rabbit@a", "2024-01-01 10:00:01", Severity::Info, "second"),
//!     LogEntry::new(3, "rabbit@a", "2024-01-01 10:00:02", Severity::Error, "third"),
//! ];
//! let result = evaluate(&query, &entries);
//! assert_eq!(result.total, 2);
//! assert_eq!(result.entries[0].id, 1);
//! ```

mod ast;
mod autocomplete;
mod engine;
mod executor;
mod lexer;
mod parser;
mod schema;
mod suggest;
mod validator;

pub use ast::*;
pub use autocomplete::{AutocompleteData, Category, UnknownCategory};
pub use engine::{
    autocomplete_data, complete, global, init, init_with_config, suggest, validate_query,
    EngineError, QlEngine, QueryError,
};
pub use executor::{evaluate, evaluate_at, execute_query, Evaluation, EvaluationError, ExecutionError};
pub use lexer::{tokenize, LexError, Token, TokenKind};
pub use parser::{parse, parse_query, ParseError};
pub use schema::{
    Arity, Catalog, DatasetCatalogs, DurationUnit, Field, FieldKind, FieldSpec, OperatorSpec,
    Preset, PresetSpec, SchemaRegistry, SpecialFilter, StageSpec, DURATION_UNITS, FIELDS,
    OPERATORS, PIPELINE_STAGES, PRESETS, SPECIAL_FILTERS,
};
pub use validator::{validate, SemanticError, ValidatedQuery, ValidationResult};
