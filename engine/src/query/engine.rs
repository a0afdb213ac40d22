//! Engine facade: one entry point for validation, autocomplete and
//! execution.
//!
//! [`QlEngine`] is an owned engine value. The free functions ([`init`],
//! [`validate_query`], ...) operate on a process-wide engine that is built
//! once by [`init`] and read-only afterwards.

use super::autocomplete::{AutocompleteData, Category};
use super::executor::{execute_query, ExecutionError};
use super::lexer::tokenize;
use super::parser::{parse, ParseError};
use super::schema::{DatasetCatalogs, SchemaRegistry};
use super::validator::{validate, SemanticError, ValidatedQuery, ValidationResult};
use crate::config::{ConfigError, EngineConfig};
use crate::storage::{LogQueryResult, LogStore, LogStoreError};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Fatal engine errors. Problems with query text are never reported here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// [`init`] has not been called.
    #[error("Query engine is not initialized")]
    NotInitialized,

    /// [`init`] was called more than once.
    #[error("Query engine is already initialized")]
    AlreadyInitialized,

    /// A built-in preset does not compile.
    #[error("Preset '{name}' is invalid: {reason}")]
    InvalidPreset {
        /// Preset name.
        name: String,
        /// Why it failed.
        reason: String,
    },

    /// The configuration is out of range.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The dataset catalogs could not be read.
    #[error("Failed to load catalogs: {0}")]
    Store(#[from] LogStoreError),
}

/// Errors from preparing or running a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query text does not lex or parse.
    #[error("Syntax error: {0}")]
    Parse(#[from] ParseError),

    /// The query does not match the schema.
    #[error("Invalid query: {0}")]
    Semantic(#[from] SemanticError),

    /// The store failed while running the query.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// A query engine bound to one schema registry and configuration.
///
/// Cloning is cheap; clones share the registry.
///
/// # Example
///
/// ```
/// use engine::query::{Category, DatasetCatalogs, QlEngine};
///
/// let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
///
/// let result = engine.validate_query("sevrity == \"error\"");
/// assert!(!result.valid());
/// assert_eq!(result.error_position(), Some(0));
/// assert_eq!(result.suggestions()[0], "severity");
///
/// assert_eq!(engine.complete(Category::Preset, "err"), vec!["errors", "errors_and_warnings"]);
/// ```
#[derive(Debug, Clone)]
pub struct QlEngine {
    registry: Arc<SchemaRegistry>,
    config: EngineConfig,
}

impl QlEngine {
    /// Builds an engine with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in preset fails to compile.
    pub fn new(catalogs: DatasetCatalogs) -> Result<Self, EngineError> {
        Self::with_config(catalogs, EngineConfig::default())
    }

    /// Builds an engine with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range or a built-in
    /// preset fails to compile.
    pub fn with_config(catalogs: DatasetCatalogs, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let registry = SchemaRegistry::new(catalogs)?;

        tracing::info!(
            subsystems = registry.subsystems().len(),
            labels = registry.labels().len(),
            presets = registry.presets().len(),
            "Query engine initialized"
        );

        Ok(Self {
            registry: Arc::new(registry),
            config,
        })
    }

    /// Builds an engine whose subsystem and label catalogs come from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read, or as [`QlEngine::with_config`].
    pub fn from_store(store: &dyn LogStore, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_config(DatasetCatalogs::from_store(store)?, config)
    }

    /// The schema registry.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses and validates query text.
    ///
    /// # Errors
    ///
    /// Returns the first lexical, syntax or semantic error.
    pub fn prepare(&self, text: &str) -> Result<ValidatedQuery, QueryError> {
        let query = parse(&tokenize(text)).inspect_err(|e| {
            tracing::debug!(query = text, position = e.position(), error = %e, "Query failed to parse");
        })?;
        let validated = validate(&query, &self.registry, &self.config).inspect_err(|e| {
            tracing::debug!(query = text, position = e.position(), error = %e, "Query failed validation");
        })?;
        Ok(validated)
    }

    /// Validates query text for inline feedback.
    #[must_use]
    pub fn validate_query(&self, text: &str) -> ValidationResult {
        match self.prepare(text) {
            Ok(_) => ValidationResult::ok(),
            Err(QueryError::Parse(e)) => ValidationResult::from_parse_error(&e, &self.config),
            Err(QueryError::Semantic(e)) => ValidationResult::from(&e),
            // prepare never touches a store
            Err(QueryError::Execution(e)) => ValidationResult::error(e.to_string(), 0, Vec::new()),
        }
    }

    /// Prepares `text` and runs it against `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is invalid or the store fails.
    pub fn run(
        &self,
        text: &str,
        store: &dyn LogStore,
        max_results: usize,
    ) -> Result<LogQueryResult, QueryError> {
        let query = self.prepare(text)?;
        Ok(execute_query(&query, store, max_results)?)
    }

    /// Snapshot of every catalog.
    #[must_use]
    pub fn autocomplete_data(&self) -> AutocompleteData {
        self.registry.autocomplete_data()
    }

    /// Completes a partially typed name.
    #[must_use]
    pub fn complete(&self, category: Category, prefix: &str) -> Vec<String> {
        self.registry.complete(category, prefix)
    }

    /// Near matches for a possibly misspelled name.
    #[must_use]
    pub fn suggest(&self, category: Category, term: &str) -> Vec<String> {
        self.registry.suggest(category, term, &self.config)
    }
}

// ============================================================================
// Process-wide engine
// ============================================================================

static ENGINE: OnceLock<QlEngine> = OnceLock::new();

/// Builds the process-wide engine with the default configuration.
///
/// # Errors
///
/// Returns `EngineError::AlreadyInitialized` on a second call, or any error
/// from [`QlEngine::new`].
pub fn init(catalogs: DatasetCatalogs) -> Result<(), EngineError> {
    init_with_config(catalogs, EngineConfig::default())
}

/// Builds the process-wide engine.
///
/// # Errors
///
/// Same as [`init`].
pub fn init_with_config(catalogs: DatasetCatalogs, config: EngineConfig) -> Result<(), EngineError> {
    if ENGINE.get().is_some() {
        return Err(EngineError::AlreadyInitialized);
    }
    let engine = QlEngine::with_config(catalogs, config)?;
    ENGINE
        .set(engine)
        .map_err(|_| EngineError::AlreadyInitialized)
}

/// The process-wide engine.
///
/// # Errors
///
/// Returns `EngineError::NotInitialized` before [`init`].
pub fn global() -> Result<&'static QlEngine, EngineError> {
    ENGINE.get().ok_or(EngineError::NotInitialized)
}

/// Validates query text with the process-wide engine.
///
/// # Errors
///
/// Returns `EngineError::NotInitialized` before [`init`]. Problems with the
/// query itself are reported inside the [`ValidationResult`].
pub fn validate_query(text: &str) -> Result<ValidationResult, EngineError> {
    Ok(global()?.validate_query(text))
}

/// Catalog snapshot from the process-wide engine.
///
/// # Errors
///
/// Returns `EngineError::NotInitialized` before [`init`].
pub fn autocomplete_data() -> Result<AutocompleteData, EngineError> {
    Ok(global()?.autocomplete_data())
}

/// Prefix completion with the process-wide engine.
///
/// # Errors
///
/// Returns `EngineError::NotInitialized` before [`init`].
pub fn complete(category: Category, prefix: &str) -> Result<Vec<String>, EngineError> {
    Ok(global()?.complete(category, prefix))
}

/// Near-match suggestions with the process-wide engine.
///
/// # Errors
///
/// Returns `EngineError::NotInitialized` before [`init`].
pub fn suggest(category: Category, term: &str) -> Result<Vec<String>, EngineError> {
    Ok(global()?.suggest(category, term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogEntry, Severity};
    use crate::storage::InMemoryLogStore;

    fn store() -> InMemoryLogStore {
        InMemoryLogStore::with_entries(vec![
            LogEntry::new(1, "rabbit@a", "2024-03-10 11:00:00+00:00", Severity::Error, "boom")
                .with_subsystem("connections")
                .with_label("tls", true),
            LogEntry::new(2, "rabbit@a", "2024-03-10 11:01:00+00:00", Severity::Info, "ok")
                .with_subsystem("queues")
                .with_label("raft", false),
        ])
    }

    #[test]
    fn test_validate_ok() {
        let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
        let result = engine.validate_query("@24h :crashes | limit 50");
        assert_eq!(result, ValidationResult::ok());
    }

    #[test]
    fn test_validate_lex_error() {
        let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
        let result = engine.validate_query("node = \"a\"");
        assert!(!result.valid());
        assert_eq!(result.error_position(), Some(5));
        assert!(result.error_message().unwrap().contains("=="));
    }

    #[test]
    fn test_validate_unknown_stage_suggests() {
        let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
        let result = engine.validate_query(":errors | limt 5");
        assert_eq!(result.error_position(), Some(10));
        assert_eq!(result.suggestions(), &["limit"]);
    }

    #[test]
    fn test_invalid_results_always_carry_a_message() {
        let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
        for text in [
            "node = a",
            "\"unterminated",
            "(severity == error | limit 5",
            ":nope",
            "@3y",
            "| srot id",
            "id == \"x\"",
            "| limit 99999999999",
        ] {
            let result = engine.validate_query(text);
            assert!(!result.valid(), "{text}");
            assert!(result.error_position().is_some(), "{text}");
            assert!(!result.error_message().unwrap_or_default().is_empty(), "{text}");
        }
    }

    #[test]
    fn test_from_store_loads_catalogs() {
        let engine = QlEngine::from_store(&store(), EngineConfig::default()).unwrap();
        assert_eq!(engine.registry().subsystems(), &["connections", "queues"]);
        assert_eq!(engine.registry().labels(), &["raft", "tls"]);

        let result = engine.validate_query("subsystem == \"queus\"");
        assert_eq!(result.suggestions(), &["queues"]);
    }

    #[test]
    fn test_run() {
        let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
        let result = engine.run(":errors or :tls", &store(), 10).unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.logs[0].id, 1);
    }

    #[test]
    fn test_run_invalid_query() {
        let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
        let err = engine.run("sevrity == error", &store(), 10).unwrap_err();
        assert!(matches!(err, QueryError::Semantic(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            max_suggestions: 0,
            ..EngineConfig::default()
        };
        let err = QlEngine::with_config(DatasetCatalogs::unresolved(), config).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
