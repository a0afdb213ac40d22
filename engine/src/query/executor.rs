//! Query execution engine.
//!
//! Runs a validated query over log entries: the filter first, then every
//! pipeline stage in the order written.

use super::ast::{ComparisonOp, SortOrder};
use super::schema::Field;
use super::validator::{Operand, Predicate, Stage, ValidatedQuery};
use crate::models::LogEntry;
use crate::storage::{LogQueryResult, LogStore, LogStoreError};
use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

/// A problem with one entry, found while evaluating. The entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// The entry's timestamp is not in a supported layout.
    #[error("Entry {id} has an unparseable timestamp '{timestamp}'")]
    InvalidTimestamp {
        /// Entry identifier.
        id: i64,
        /// Timestamp text as stored.
        timestamp: String,
    },
}

/// Errors that can occur during query execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Storage error during execution.
    #[error("Storage error: {0}")]
    StorageError(#[from] LogStoreError),
}

/// Result of evaluating a query over a slice of entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Entries after the filter and every stage.
    pub entries: Vec<LogEntry>,
    /// Entries that matched the filter, before any stage.
    pub total: usize,
    /// Entries skipped because their data could not be evaluated.
    pub errors: Vec<EvaluationError>,
}

/// Evaluates a query relative to the current instant.
#[must_use]
pub fn evaluate(query: &ValidatedQuery, entries: &[LogEntry]) -> Evaluation {
    evaluate_at(query, entries, Utc::now())
}

/// Evaluates a query, resolving `@<duration>` clauses against `now`.
///
/// Evaluation is a pure function of its inputs.
#[must_use]
pub fn evaluate_at(query: &ValidatedQuery, entries: &[LogEntry], now: DateTime<Utc>) -> Evaluation {
    let mut errors = Vec::new();

    let mut selected: Vec<LogEntry> = match &query.filter {
        None => entries.to_vec(),
        Some(predicate) => entries
            .iter()
            .filter(|entry| match matches(predicate, entry, now) {
                Ok(keep) => keep,
                Err(e) => {
                    errors.push(e);
                    false
                }
            })
            .cloned()
            .collect(),
    };
    let total = selected.len();

    for stage in &query.stages {
        selected = match stage {
            Stage::Sort { field, order } => sort_entries(selected, *field, *order, &mut errors),
            Stage::Limit(count) => {
                selected.truncate(usize::try_from(*count).unwrap_or(usize::MAX));
                selected
            }
        };
    }

    for error in &errors {
        tracing::warn!(error = %error, "Skipping log entry");
    }
    tracing::debug!(
        scanned = entries.len(),
        matched = total,
        returned = selected.len(),
        skipped = errors.len(),
        "Query evaluated"
    );

    Evaluation {
        entries: selected,
        total,
        errors,
    }
}

/// Executes a validated query against a log store.
///
/// `max_results` is the presentation-layer cap applied after the pipeline;
/// `total_count` still reports every entry the filter matched.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
///
/// # Example
///
/// ```
/// use engine::query::{DatasetCatalogs, QlEngine, execute_query};
/// use engine::storage::InMemoryLogStore;
///
/// let engine = QlEngine::new(DatasetCatalogs::unresolved()).unwrap();
/// let store = InMemoryLogStore::new();
/// let query = engine.prepare(":errors | limit 10").unwrap();
/// let result = execute_query(&query, &store, 100).unwrap();
/// assert_eq!(result.total_count, 0);
/// ```
pub fn execute_query(
    query: &ValidatedQuery,
    store: &dyn LogStore,
    max_results: usize,
) -> Result<LogQueryResult, ExecutionError> {
    let entries = store.entries()?;
    let mut evaluation = evaluate(query, &entries);
    evaluation.entries.truncate(max_results);

    Ok(LogQueryResult {
        logs: evaluation.entries,
        total_count: evaluation.total,
    })
}

// ============================================================================
// Filtering
// ============================================================================

/// Evaluates a predicate; `and`/`or` evaluate left first and short-circuit.
fn matches(
    predicate: &Predicate,
    entry: &LogEntry,
    now: DateTime<Utc>,
) -> Result<bool, EvaluationError> {
    match predicate {
        Predicate::Compare {
            field,
            operator,
            operand,
        } => Ok(compare(*field, *operator, operand, entry)),
        Predicate::Since { seconds } => {
            let timestamp = parse_entry_timestamp(entry)?;
            Ok(match lower_bound(now, *seconds) {
                Some(bound) => timestamp >= bound,
                None => true,
            })
        }
        Predicate::LabelsAny(wanted) => Ok(entry
            .labels
            .iter()
            .any(|(label, set)| *set && wanted.iter().any(|w| w.eq_ignore_ascii_case(label)))),
        Predicate::And(left, right) => Ok(matches(left, entry, now)? && matches(right, entry, now)?),
        Predicate::Or(left, right) => Ok(matches(left, entry, now)? || matches(right, entry, now)?),
        Predicate::Not(inner) => Ok(!matches(inner, entry, now)?),
    }
}

/// `now - seconds`, or `None` when that is before any representable time.
fn lower_bound(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_sub_signed(TimeDelta::try_seconds(seconds)?)
}

fn compare(field: Field, operator: ComparisonOp, operand: &Operand, entry: &LogEntry) -> bool {
    let equal = match operand {
        Operand::Severity(severity) => entry.severity == *severity,
        Operand::Integer(id) => u64::try_from(entry.id).is_ok_and(|entry_id| entry_id == *id),
        Operand::Text(needle) => {
            // A missing value never equals nor contains anything.
            let Some(value) = text_field(field, entry) else {
                return operator == ComparisonOp::NotEq;
            };
            let value = value.to_lowercase();
            if operator == ComparisonOp::Contains {
                return value.contains(needle.as_str());
            }
            value == *needle
        }
    };

    match operator {
        ComparisonOp::Eq => equal,
        ComparisonOp::NotEq => !equal,
        ComparisonOp::Contains => false,
    }
}

fn text_field(field: Field, entry: &LogEntry) -> Option<&str> {
    match field {
        Field::Node => Some(&entry.node),
        Field::ErlangPid => Some(&entry.erlang_pid),
        Field::Message => Some(&entry.message),
        Field::Subsystem => entry.subsystem.as_deref(),
        Field::DocUrl => entry.doc_url.as_deref(),
        Field::ResolutionUrl => entry.resolution_or_discussion_url.as_deref(),
        Field::Id | Field::Timestamp | Field::Severity | Field::Labels => None,
    }
}

fn parse_entry_timestamp(entry: &LogEntry) -> Result<DateTime<Utc>, EvaluationError> {
    entry
        .parsed_timestamp()
        .map_err(|_| EvaluationError::InvalidTimestamp {
            id: entry.id,
            timestamp: entry.timestamp.clone(),
        })
}

// ============================================================================
// Sorting
// ============================================================================

/// Sort key; `Missing` orders before every present value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Missing,
    Int(i64),
    Rank(u8),
    Time(DateTime<Utc>),
    Text(String),
}

fn sort_key(field: Field, entry: &LogEntry) -> Result<SortKey, EvaluationError> {
    Ok(match field {
        Field::Id => SortKey::Int(entry.id),
        Field::Timestamp => SortKey::Time(parse_entry_timestamp(entry)?),
        Field::Severity => SortKey::Rank(entry.severity.rank()),
        // case-insensitive, like the text comparisons
        _ => text_field(field, entry)
            .map_or(SortKey::Missing, |v| SortKey::Text(v.to_lowercase())),
    })
}

/// Stable sort; entries whose key cannot be computed are dropped.
fn sort_entries(
    entries: Vec<LogEntry>,
    field: Field,
    order: SortOrder,
    errors: &mut Vec<EvaluationError>,
) -> Vec<LogEntry> {
    let mut keyed: Vec<(SortKey, LogEntry)> = Vec::with_capacity(entries.len());
    for entry in entries {
        match sort_key(field, &entry) {
            Ok(key) => keyed.push((key, entry)),
            Err(e) => errors.push(e),
        }
    }

    match order {
        SortOrder::Asc => keyed.sort_by(|a, b| a.0.cmp(&b.0)),
        SortOrder::Desc => keyed.sort_by(|a, b| b.0.cmp(&a.0)),
    }

    keyed.into_iter().map(|(_, entry)| entry).collect()
}
