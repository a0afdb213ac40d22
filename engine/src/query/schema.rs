//! Schema registry: the catalogs the query language is checked against.
//!
//! Fields, operators, pipeline stages, duration units, presets and special
//! filters are fixed at build time. Subsystems and labels come from the
//! dataset and may not be known yet; in that case they are held as
//! [`Catalog::Unresolved`] and every value is accepted.

use super::ast::Expr;
use super::engine::EngineError;
use super::lexer::tokenize;
use super::parser::parse;
use super::validator::{validate, Predicate};
use crate::config::EngineConfig;
use crate::models::Severity;
use crate::storage::{LogStore, LogStoreError};
use serde::Serialize;

/// How a field can be filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text: `==`, `!=`, `contains`.
    Text,
    /// A small closed set of values: `==`, `!=`.
    Enum,
    /// Integer: `==`, `!=`.
    Integer,
    /// Filtered with `@<duration>` only.
    Timestamp,
    /// Label flags, filtered with `labels any [...]`.
    Labels,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Enum => write!(f, "enum"),
            Self::Integer => write!(f, "integer"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Labels => write!(f, "labels"),
        }
    }
}

/// The queryable fields of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// `id`
    Id,
    /// `node`
    Node,
    /// `timestamp`
    Timestamp,
    /// `severity`
    Severity,
    /// `erlang_pid`
    ErlangPid,
    /// `message`
    Message,
    /// `subsystem`
    Subsystem,
    /// `labels`
    Labels,
    /// `doc_url`
    DocUrl,
    /// `resolution_or_discussion_url`
    ResolutionUrl,
}

/// Static description of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Which field this is.
    #[serde(skip)]
    pub field: Field,
    /// Canonical, case-sensitive name.
    pub name: &'static str,
    /// Lowercase alternate spellings, matched case-insensitively.
    pub aliases: &'static [&'static str],
    /// How the field can be filtered.
    pub kind: FieldKind,
    /// Whether `sort` accepts the field.
    pub sortable: bool,
    /// Human readable description.
    pub description: &'static str,
    /// Example clause.
    pub example: &'static str,
}

/// How many operands an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    /// `field op value`
    Binary,
    /// `field op [v1, v2, ...]`
    Variadic,
}

/// Static description of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatorSpec {
    /// Operator as written.
    pub symbol: &'static str,
    /// Field kinds the operator applies to.
    pub field_kinds: &'static [FieldKind],
    /// Operand count.
    pub arity: Arity,
    /// Human readable description.
    pub description: &'static str,
    /// Example clause.
    pub example: &'static str,
}

/// Static description of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageSpec {
    /// Stage keyword.
    pub name: &'static str,
    /// Syntax summary.
    pub syntax: &'static str,
    /// Human readable description.
    pub description: &'static str,
    /// Example.
    pub example: &'static str,
}

/// A duration suffix accepted after `@`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationUnit {
    /// Suffix as written, e.g. `h`.
    pub suffix: char,
    /// Seconds per unit.
    pub seconds: u64,
    /// Human readable description.
    pub description: &'static str,
}

/// Reference entry for a filter form that is not a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpecialFilter {
    /// Short name.
    pub name: &'static str,
    /// Syntax summary.
    pub syntax: &'static str,
    /// Human readable description.
    pub description: &'static str,
    /// Example.
    pub example: &'static str,
}

/// Static description of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PresetSpec {
    /// Name used after `:`.
    pub name: &'static str,
    /// Human readable description.
    pub description: &'static str,
    /// QL text the preset stands for.
    pub expansion: &'static str,
}

/// A preset with its expansion already parsed and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    /// The static description.
    pub spec: &'static PresetSpec,
    /// The parsed expansion.
    pub expr: Expr,
    pub(crate) predicate: Predicate,
}

const EQUALITY_KINDS: &[FieldKind] = &[FieldKind::Text, FieldKind::Enum, FieldKind::Integer];

/// Fields, in declaration order.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        field: Field::Id,
        name: "id",
        aliases: &[],
        kind: FieldKind::Integer,
        sortable: true,
        description: "Dataset-assigned entry identifier",
        example: "id == 42",
    },
    FieldSpec {
        field: Field::Node,
        name: "node",
        aliases: &[],
        kind: FieldKind::Text,
        sortable: true,
        description: "Name of the RabbitMQ node that logged the entry",
        example: "node == \"rabbit@sunnyvale\"",
    },
    FieldSpec {
        field: Field::Timestamp,
        name: "timestamp",
        aliases: &["time", "ts"],
        kind: FieldKind::Timestamp,
        sortable: true,
        description: "When the entry was logged; filter with @<duration>",
        example: "@24h | sort timestamp desc",
    },
    FieldSpec {
        field: Field::Severity,
        name: "severity",
        aliases: &["level", "sev"],
        kind: FieldKind::Enum,
        sortable: true,
        description: "Log level: debug, info, notice, warning, error, critical",
        example: "severity == \"error\"",
    },
    FieldSpec {
        field: Field::ErlangPid,
        name: "erlang_pid",
        aliases: &["pid"],
        kind: FieldKind::Text,
        sortable: false,
        description: "Erlang process identifier of the logging process",
        example: "erlang_pid == \"<0.208.0>\"",
    },
    FieldSpec {
        field: Field::Message,
        name: "message",
        aliases: &["msg"],
        kind: FieldKind::Text,
        sortable: false,
        description: "Log message body",
        example: "message contains \"timeout\"",
    },
    FieldSpec {
        field: Field::Subsystem,
        name: "subsystem",
        aliases: &["sub"],
        kind: FieldKind::Enum,
        sortable: true,
        description: "Subsystem the entry was attributed to",
        example: "subsystem == \"connections\"",
    },
    FieldSpec {
        field: Field::Labels,
        name: "labels",
        aliases: &[],
        kind: FieldKind::Labels,
        sortable: false,
        description: "Label flags; matches when any listed label is set",
        example: "labels any [\"tls\", \"disconnects\"]",
    },
    FieldSpec {
        field: Field::DocUrl,
        name: "doc_url",
        aliases: &["doc"],
        kind: FieldKind::Text,
        sortable: false,
        description: "Link to relevant documentation",
        example: "doc_url contains \"networking\"",
    },
    FieldSpec {
        field: Field::ResolutionUrl,
        name: "resolution_or_discussion_url",
        aliases: &["resolution_url", "discussion_url"],
        kind: FieldKind::Text,
        sortable: false,
        description: "Link to an issue or discussion about the entry",
        example: "resolution_or_discussion_url contains \"github\"",
    },
];

/// Operators, in declaration order.
pub const OPERATORS: &[OperatorSpec] = &[
    OperatorSpec {
        symbol: "==",
        field_kinds: EQUALITY_KINDS,
        arity: Arity::Binary,
        description: "Equal, case-insensitive",
        example: "severity == \"error\"",
    },
    OperatorSpec {
        symbol: "!=",
        field_kinds: EQUALITY_KINDS,
        arity: Arity::Binary,
        description: "Not equal, case-insensitive",
        example: "severity != \"debug\"",
    },
    OperatorSpec {
        symbol: "contains",
        field_kinds: &[FieldKind::Text],
        arity: Arity::Binary,
        description: "Case-insensitive substring match on free-text fields",
        example: "message contains \"timeout\"",
    },
    OperatorSpec {
        symbol: "any",
        field_kinds: &[FieldKind::Labels],
        arity: Arity::Variadic,
        description: "At least one of the listed labels is set",
        example: "labels any [\"tls\", \"disconnects\"]",
    },
];

/// Pipeline stages, in declaration order.
pub const PIPELINE_STAGES: &[StageSpec] = &[
    StageSpec {
        name: "sort",
        syntax: "sort <field> [asc|desc]",
        description: "Stable sort by a sortable field, ascending by default",
        example: "| sort timestamp desc",
    },
    StageSpec {
        name: "limit",
        syntax: "limit <count>",
        description: "Keep the first <count> entries",
        example: "| limit 50",
    },
];

/// Duration units, in declaration order.
pub const DURATION_UNITS: &[DurationUnit] = &[
    DurationUnit {
        suffix: 'm',
        seconds: 60,
        description: "minutes",
    },
    DurationUnit {
        suffix: 'h',
        seconds: 3_600,
        description: "hours",
    },
    DurationUnit {
        suffix: 'd',
        seconds: 86_400,
        description: "days",
    },
    DurationUnit {
        suffix: 'w',
        seconds: 604_800,
        description: "weeks",
    },
];

/// Special filter forms, in declaration order.
pub const SPECIAL_FILTERS: &[SpecialFilter] = &[
    SpecialFilter {
        name: "preset",
        syntax: ":<preset>",
        description: "Expand a named, pre-validated filter",
        example: ":errors",
    },
    SpecialFilter {
        name: "time_range",
        syntax: "@<N><unit>",
        description: "Entries logged within the last N units",
        example: "@24h",
    },
    SpecialFilter {
        name: "labels_any",
        syntax: "labels any [\"<label>\", ...]",
        description: "Entries with at least one of the labels set",
        example: "labels any [\"tls\", \"disconnects\"]",
    },
    SpecialFilter {
        name: "negation",
        syntax: "not <expr>",
        description: "Entries that do not match the expression",
        example: "not :errors",
    },
];

/// Presets, in declaration order.
pub const PRESETS: &[PresetSpec] = &[
    PresetSpec {
        name: "errors",
        description: "Error entries",
        expansion: "severity == \"error\"",
    },
    PresetSpec {
        name: "warnings",
        description: "Warning entries",
        expansion: "severity == \"warning\"",
    },
    PresetSpec {
        name: "notices",
        description: "Notice entries",
        expansion: "severity == \"notice\"",
    },
    PresetSpec {
        name: "crashes",
        description: "Erlang process crashes and exceptions",
        expansion: "labels any [\"erl_process_crash\", \"exceptions\"]",
    },
    PresetSpec {
        name: "disconnects",
        description: "Client disconnections",
        expansion: "labels any [\"disconnects\"]",
    },
    PresetSpec {
        name: "tls",
        description: "TLS related entries",
        expansion: "labels any [\"tls\"]",
    },
    PresetSpec {
        name: "connections",
        description: "Entries from the connections subsystem",
        expansion: "subsystem == \"connections\"",
    },
    PresetSpec {
        name: "raft",
        description: "Raft and leader election activity",
        expansion: "labels any [\"raft\", \"elections\"]",
    },
    PresetSpec {
        name: "errors_and_warnings",
        description: "Error and warning entries",
        expansion: "severity == \"error\" or severity == \"warning\"",
    },
];

/// A dataset-derived catalog that may not be loaded yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Catalog {
    /// Not loaded: values are unknown, never invalid.
    #[default]
    Unresolved,
    /// Loaded values, deduplicated, in first-seen order.
    Loaded(Vec<String>),
}

impl Catalog {
    /// Builds a loaded catalog, dropping duplicates and keeping first-seen order.
    #[must_use]
    pub fn loaded<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = Vec::new();
        for value in values {
            let value = value.into();
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        Self::Loaded(seen)
    }

    /// Returns the values, or an empty slice when unresolved.
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Self::Unresolved => &[],
            Self::Loaded(values) => values,
        }
    }

    /// Whether the catalog has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Case-insensitive membership; `None` means "don't know".
    #[must_use]
    pub fn contains(&self, value: &str) -> Option<bool> {
        match self {
            Self::Unresolved => None,
            Self::Loaded(values) => Some(values.iter().any(|v| v.eq_ignore_ascii_case(value))),
        }
    }
}

/// The dataset-derived catalogs handed to [`SchemaRegistry::new`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetCatalogs {
    /// Known subsystems.
    pub subsystems: Catalog,
    /// Known labels.
    pub labels: Catalog,
}

impl DatasetCatalogs {
    /// Catalogs that are not loaded yet.
    #[must_use]
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Catalogs from explicit value lists.
    #[must_use]
    pub fn loaded<S, L>(subsystems: S, labels: L) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            subsystems: Catalog::loaded(subsystems),
            labels: Catalog::loaded(labels),
        }
    }

    /// Reads the distinct subsystems and labels of a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn from_store(store: &dyn LogStore) -> Result<Self, LogStoreError> {
        Ok(Self {
            subsystems: Catalog::loaded(store.subsystems()?),
            labels: Catalog::loaded(store.labels()?),
        })
    }
}

/// The process-wide, read-only registry of everything a query may name.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    presets: Vec<Preset>,
    subsystems: Catalog,
    labels: Catalog,
}

impl SchemaRegistry {
    /// Builds the registry, compiling every preset.
    ///
    /// Presets are validated against the fixed catalogs only, before the
    /// dataset catalogs are attached.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidPreset` if a preset expansion does not
    /// parse or validate.
    pub fn new(catalogs: DatasetCatalogs) -> Result<Self, EngineError> {
        let mut registry = Self {
            presets: Vec::with_capacity(PRESETS.len()),
            subsystems: Catalog::Unresolved,
            labels: Catalog::Unresolved,
        };

        for spec in PRESETS {
            let (expr, predicate) = registry.compile_preset(spec)?;
            registry.presets.push(Preset {
                spec,
                expr,
                predicate,
            });
        }

        registry.subsystems = catalogs.subsystems;
        registry.labels = catalogs.labels;

        tracing::debug!(
            presets = registry.presets.len(),
            subsystems = registry.subsystems.values().len(),
            labels = registry.labels.values().len(),
            "Schema registry built"
        );

        Ok(registry)
    }

    fn compile_preset(
        &self,
        spec: &'static PresetSpec,
    ) -> Result<(Expr, Predicate), EngineError> {
        let invalid = |reason: String| EngineError::InvalidPreset {
            name: spec.name.to_string(),
            reason,
        };

        let query = parse(&tokenize(spec.expansion)).map_err(|e| invalid(e.to_string()))?;
        if !query.stages.is_empty() {
            return Err(invalid("presets cannot contain pipeline stages".to_string()));
        }
        let validated =
            validate(&query, self, &EngineConfig::default()).map_err(|e| invalid(e.to_string()))?;

        match (validated.filter.clone(), validated.into_query().filter) {
            (Some(predicate), Some(expr)) => Ok((expr, predicate)),
            _ => Err(invalid("preset expansion is empty".to_string())),
        }
    }

    /// All fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    /// Looks up a field by canonical name (case-sensitive) or alias
    /// (case-insensitive).
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        lookup_field(name)
    }

    /// All operators, in declaration order.
    #[must_use]
    pub fn operators(&self) -> &'static [OperatorSpec] {
        OPERATORS
    }

    /// Known severities, least severe first.
    #[must_use]
    pub fn severities(&self) -> Vec<&'static str> {
        Severity::ALL.iter().map(|s| s.as_str()).collect()
    }

    /// Known subsystems; empty when not loaded.
    #[must_use]
    pub fn subsystems(&self) -> &[String] {
        self.subsystems.values()
    }

    /// The subsystem catalog, including its load state.
    #[must_use]
    pub fn subsystem_catalog(&self) -> &Catalog {
        &self.subsystems
    }

    /// Known labels; empty when not loaded.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        self.labels.values()
    }

    /// The label catalog, including its load state.
    #[must_use]
    pub fn label_catalog(&self) -> &Catalog {
        &self.labels
    }

    /// All presets, in declaration order.
    #[must_use]
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Looks up a preset by name.
    #[must_use]
    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.spec.name == name)
    }

    /// All pipeline stages, in declaration order.
    #[must_use]
    pub fn pipeline_stages(&self) -> &'static [StageSpec] {
        PIPELINE_STAGES
    }

    /// All duration units, in declaration order.
    #[must_use]
    pub fn duration_units(&self) -> &'static [DurationUnit] {
        DURATION_UNITS
    }

    /// All special filter forms, in declaration order.
    #[must_use]
    pub fn special_filters(&self) -> &'static [SpecialFilter] {
        SPECIAL_FILTERS
    }
}

/// Field lookup shared by the registry and the evaluator.
fn lookup_field(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name).or_else(|| {
        let lower = name.to_ascii_lowercase();
        FIELDS.iter().find(|f| f.aliases.contains(&lower.as_str()))
    })
}

/// Looks up a duration unit by suffix.
pub(crate) fn lookup_duration_unit(suffix: &str) -> Option<&'static DurationUnit> {
    let mut chars = suffix.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => DURATION_UNITS.iter().find(|u| u.suffix == c),
        _ => None,
    }
}
