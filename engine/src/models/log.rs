//! RabbitMQ log entry model.
//!
//! Defines the `LogEntry` structure as it is exposed by a log dataset and the
//! `Severity` scale used by RabbitMQ nodes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

/// Log severity as written by RabbitMQ nodes.
///
/// Variants are declared from least to most severe; [`Severity::rank`] follows
/// the declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Debug output.
    Debug,
    /// Informational messages.
    Info,
    /// Normal but significant conditions.
    Notice,
    /// Warning conditions.
    #[serde(alias = "warn")]
    Warning,
    /// Error conditions.
    Error,
    /// Critical conditions.
    Critical,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Severity; 6] = [
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// Returns the lowercase name used in datasets and queries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Returns the severity order (lower = less severe).
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Notice => 2,
            Self::Warning => 3,
            Self::Error => 4,
            Self::Critical => 5,
        }
    }

    /// Looks up a severity by name, case-insensitively.
    ///
    /// `warn` is accepted as a spelling of `warning`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name == "warn" {
            return Some(Self::Warning);
        }
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

/// A single parsed RabbitMQ log line.
///
/// The timestamp is kept exactly as the dataset provides it and parsed on
/// demand, so a malformed value only affects queries that look at time.
///
/// # Example
///
/// ```
/// use engine::models::{LogEntry, Severity};
///
/// let entry = LogEntry::new(1, "rabbit@node1", "2024-05-01T10:00:00Z", Severity::Error, "boom")
///     .with_subsystem("connections")
///     .with_label("tls", true);
///
/// assert!(entry.validate_entry().is_ok());
/// assert_eq!(entry.labels.get("tls"), Some(&true));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LogEntry {
    /// Dataset-assigned identifier.
    pub id: i64,

    /// Name of the node that wrote the line.
    #[validate(length(min = 1, message = "Node name cannot be empty"))]
    pub node: String,

    /// Timestamp text as found in the dataset.
    pub timestamp: String,

    /// Severity of the line.
    #[serde(default)]
    pub severity: Severity,

    /// Erlang process identifier, e.g. `<0.208.0>`.
    #[serde(default)]
    pub erlang_pid: String,

    /// Message body (may span several lines).
    #[serde(default)]
    pub message: String,

    /// Subsystem the line was attributed to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystem: Option<String>,

    /// Label flags assigned by the annotator.
    #[serde(default)]
    pub labels: BTreeMap<String, bool>,

    /// Link to relevant documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,

    /// Link to an issue or discussion about this kind of message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_or_discussion_url: Option<String>,
}

/// Errors that can occur during log entry validation.
#[derive(Debug, Error)]
pub enum LogValidationError {
    /// The node name is empty.
    #[error("Node name cannot be empty")]
    EmptyNode,

    /// The timestamp cannot be parsed.
    #[error("Unparseable timestamp '{0}'")]
    InvalidTimestamp(String),

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Timestamp layouts accepted besides RFC 3339.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a dataset timestamp into UTC.
///
/// Accepts RFC 3339, the RabbitMQ layout `2024-05-01 10:00:00.123456+00:00`,
/// and offset-less variants which are read as UTC.
///
/// # Errors
///
/// Returns `LogValidationError::InvalidTimestamp` if no layout matches.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, LogValidationError> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(text, format) {
            return Ok(ts.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(ts.and_utc());
        }
    }
    Err(LogValidationError::InvalidTimestamp(text.to_string()))
}

impl LogEntry {
    /// Creates a new entry with no subsystem, labels or links.
    #[must_use]
    pub fn new(
        id: i64,
        node: impl Into<String>,
        timestamp: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            node: node.into(),
            timestamp: timestamp.into(),
            severity,
            erlang_pid: String::new(),
            message: message.into(),
            subsystem: None,
            labels: BTreeMap::new(),
            doc_url: None,
            resolution_or_discussion_url: None,
        }
    }

    /// Sets the subsystem.
    #[must_use]
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    /// Sets a label flag.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>, value: bool) -> Self {
        self.labels.insert(label.into(), value);
        self
    }

    /// Sets the Erlang process identifier.
    #[must_use]
    pub fn with_erlang_pid(mut self, pid: impl Into<String>) -> Self {
        self.erlang_pid = pid.into();
        self
    }

    /// Sets the documentation link.
    #[must_use]
    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }

    /// Sets the resolution or discussion link.
    #[must_use]
    pub fn with_resolution_url(mut self, url: impl Into<String>) -> Self {
        self.resolution_or_discussion_url = Some(url.into());
        self
    }

    /// Parses the entry timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamp text is not in a supported layout.
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>, LogValidationError> {
        parse_timestamp(&self.timestamp)
    }

    /// Validates the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The node name is empty
    /// - The timestamp cannot be parsed
    pub fn validate_entry(&self) -> Result<(), LogValidationError> {
        if self.node.is_empty() {
            return Err(LogValidationError::EmptyNode);
        }
        self.validate()?;
        self.parsed_timestamp()?;
        Ok(())
    }
}
