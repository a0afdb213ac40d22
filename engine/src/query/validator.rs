//! Semantic validation of parsed queries.
//!
//! Checks every name and value in a [`Query`] against the [`SchemaRegistry`]
//! and compiles the query into the plan the evaluator runs. The first
//! problem found, in query order, is reported.

use super::ast::{
    Comparison, ComparisonOp, Expr, LabelsAny, LogicalOp, PipelineStage, Query, SortOrder, Value,
};
use super::autocomplete::Category;
use super::parser::ParseError;
use super::schema::{Field, FieldKind, SchemaRegistry, DURATION_UNITS, OPERATORS};
use super::suggest;
use crate::config::EngineConfig;
use crate::models::Severity;
use serde::Serialize;
use thiserror::Error;

/// Errors found while checking a query against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    /// The field is not in the schema.
    #[error("Unknown field '{field}'")]
    UnknownField {
        /// Field name as written.
        field: String,
        /// Offset of the field name.
        position: usize,
        /// Close field names.
        suggestions: Vec<String>,
    },

    /// The operator does not apply to the field's kind.
    #[error("Operator '{operator}' cannot be used on {kind} field '{field}'")]
    OperatorNotAllowed {
        /// Operator as written.
        operator: &'static str,
        /// Field name as written.
        field: String,
        /// Kind of the field.
        kind: FieldKind,
        /// Offset of the operator.
        position: usize,
    },

    /// The value has the wrong type for the field.
    #[error("Field '{field}' expects a {expected} value, found {found}")]
    TypeMismatch {
        /// Field name as written.
        field: String,
        /// Expected value type.
        expected: &'static str,
        /// Actual value type.
        found: &'static str,
        /// Offset of the value.
        position: usize,
    },

    /// `:name` does not name a preset.
    #[error("Unknown preset ':{name}'")]
    UnknownPreset {
        /// Preset name as written.
        name: String,
        /// Offset of the name.
        position: usize,
        /// Close preset names.
        suggestions: Vec<String>,
    },

    /// A severity, subsystem or label that is not in its catalog.
    #[error("Unknown {category} '{value}'")]
    UnknownValue {
        /// Catalog the value was checked against.
        category: Category,
        /// Value as written.
        value: String,
        /// Offset of the value.
        position: usize,
        /// Close catalog values.
        suggestions: Vec<String>,
    },

    /// A time range unit that is not in the catalog.
    #[error("Unknown duration unit '{unit}'")]
    UnknownDurationUnit {
        /// Unit suffix.
        unit: char,
        /// Offset of the duration.
        position: usize,
    },

    /// `sort` on a field that cannot be sorted.
    #[error("Field '{field}' is not sortable")]
    NotSortable {
        /// Field name as written.
        field: String,
        /// Offset of the field name.
        position: usize,
        /// Close sortable field names.
        suggestions: Vec<String>,
    },

    /// `limit` above the configured ceiling.
    #[error("Limit {count} exceeds the maximum of {max}")]
    InvalidLimit {
        /// Requested count.
        count: u64,
        /// Configured ceiling.
        max: u64,
        /// Offset of the count.
        position: usize,
    },
}

impl SemanticError {
    /// Byte offset into the query the error refers to.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::UnknownField { position, .. }
            | Self::OperatorNotAllowed { position, .. }
            | Self::TypeMismatch { position, .. }
            | Self::UnknownPreset { position, .. }
            | Self::UnknownValue { position, .. }
            | Self::UnknownDurationUnit { position, .. }
            | Self::NotSortable { position, .. }
            | Self::InvalidLimit { position, .. } => *position,
        }
    }

    /// "Did you mean" candidates, best first.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::UnknownField { suggestions, .. }
            | Self::UnknownPreset { suggestions, .. }
            | Self::UnknownValue { suggestions, .. }
            | Self::NotSortable { suggestions, .. } => suggestions,
            Self::OperatorNotAllowed { .. }
            | Self::TypeMismatch { .. }
            | Self::UnknownDurationUnit { .. }
            | Self::InvalidLimit { .. } => &[],
        }
    }
}

// ============================================================================
// Validation result
// ============================================================================

/// Outcome of validating query text, ready to render as inline feedback.
///
/// A valid result never carries an error; an invalid one always carries a
/// message and a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    valid: bool,
    error_message: Option<String>,
    error_position: Option<usize>,
    suggestions: Vec<String>,
}

impl ValidationResult {
    /// A successful validation.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            error_message: None,
            error_position: None,
            suggestions: Vec::new(),
        }
    }

    /// A failed validation. `message` is never empty: every caller passes
    /// an error's `Display` output.
    #[must_use]
    pub(crate) fn error(
        message: impl Into<String>,
        position: usize,
        suggestions: Vec<String>,
    ) -> Self {
        Self {
            valid: false,
            error_message: Some(message.into()),
            error_position: Some(position),
            suggestions,
        }
    }

    /// Builds the result for a lexical or syntax error.
    #[must_use]
    pub fn from_parse_error(error: &ParseError, config: &EngineConfig) -> Self {
        Self::error(error.to_string(), error.position(), error.suggestions(config))
    }

    /// Whether the query is valid.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Error message, if invalid.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Byte offset of the error, if invalid.
    #[must_use]
    pub fn error_position(&self) -> Option<usize> {
        self.error_position
    }

    /// "Did you mean" candidates, best first.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }
}

impl From<&SemanticError> for ValidationResult {
    fn from(error: &SemanticError) -> Self {
        Self::error(error.to_string(), error.position(), error.suggestions().to_vec())
    }
}

// ============================================================================
// Compiled plan
// ============================================================================

/// Right-hand side of a compiled comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand {
    /// Lowercased for case-insensitive matching.
    Text(String),
    Integer(u64),
    Severity(Severity),
}

/// A filter with every name resolved and every preset expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Predicate {
    Compare {
        field: Field,
        operator: ComparisonOp,
        operand: Operand,
    },
    /// Logged within the last `seconds`.
    Since {
        seconds: u64,
    },
    LabelsAny(Vec<String>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Stage {
    Sort { field: Field, order: SortOrder },
    Limit(u64),
}

/// A query that passed validation. Only [`validate`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    query: Query,
    pub(crate) filter: Option<Predicate>,
    pub(crate) stages: Vec<Stage>,
}

impl ValidatedQuery {
    /// The query as parsed.
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Consumes the validated query, returning the parsed query.
    #[must_use]
    pub fn into_query(self) -> Query {
        self.query
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Checks a parsed query against the schema.
///
/// # Errors
///
/// Returns the first [`SemanticError`] found, in query order.
pub fn validate(
    query: &Query,
    registry: &SchemaRegistry,
    config: &EngineConfig,
) -> Result<ValidatedQuery, SemanticError> {
    let checker = Checker { registry, config };

    let filter = query
        .filter
        .as_ref()
        .map(|expr| checker.expr(expr))
        .transpose()?;
    let stages = query
        .stages
        .iter()
        .map(|stage| checker.stage(stage))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedQuery {
        query: query.clone(),
        filter,
        stages,
    })
}

struct Checker<'a> {
    registry: &'a SchemaRegistry,
    config: &'a EngineConfig,
}

impl Checker<'_> {
    fn expr(&self, expr: &Expr) -> Result<Predicate, SemanticError> {
        match expr {
            Expr::Preset(preset) => match self.registry.preset(&preset.name) {
                Some(found) => Ok(found.predicate.clone()),
                None => Err(SemanticError::UnknownPreset {
                    name: preset.name.clone(),
                    position: preset.span.start,
                    suggestions: self.suggest(Category::Preset, &preset.name),
                }),
            },
            Expr::TimeRange(range) => {
                let unit = DURATION_UNITS
                    .iter()
                    .find(|u| u.suffix == range.unit)
                    .ok_or(SemanticError::UnknownDurationUnit {
                        unit: range.unit,
                        position: range.span.start,
                    })?;
                Ok(Predicate::Since {
                    seconds: range.amount.saturating_mul(unit.seconds),
                })
            }
            Expr::Comparison(comparison) => self.comparison(comparison),
            Expr::LabelsAny(labels) => self.labels_any(labels),
            Expr::Combined {
                left,
                operator,
                right,
            } => {
                let left = Box::new(self.expr(left)?);
                let right = Box::new(self.expr(right)?);
                Ok(match operator {
                    LogicalOp::And => Predicate::And(left, right),
                    LogicalOp::Or => Predicate::Or(left, right),
                })
            }
            Expr::Not(inner) => Ok(Predicate::Not(Box::new(self.expr(inner)?))),
            Expr::Grouped(inner) => self.expr(inner),
        }
    }

    fn comparison(&self, c: &Comparison) -> Result<Predicate, SemanticError> {
        let spec = self.registry.field(&c.field).ok_or_else(|| SemanticError::UnknownField {
            field: c.field.clone(),
            position: c.field_span.start,
            suggestions: self.suggest(Category::Field, &c.field),
        })?;

        let symbol = c.operator.symbol();
        let allowed = OPERATORS
            .iter()
            .find(|op| op.symbol == symbol)
            .is_some_and(|op| op.field_kinds.contains(&spec.kind));
        if !allowed {
            return Err(SemanticError::OperatorNotAllowed {
                operator: symbol,
                field: c.field.clone(),
                kind: spec.kind,
                position: c.operator_span.start,
            });
        }

        let mismatch = |expected| SemanticError::TypeMismatch {
            field: c.field.clone(),
            expected,
            found: c.value.type_name(),
            position: c.value_span.start,
        };

        let operand = match (&c.value, spec.kind) {
            (Value::Integer(n), FieldKind::Integer) => Operand::Integer(*n),
            (_, FieldKind::Integer) => return Err(mismatch("integer")),
            (Value::Integer(_), _) => return Err(mismatch("string")),
            (Value::String(s), _) if spec.field == Field::Severity => {
                let severity = Severity::from_name(s).ok_or_else(|| {
                    self.unknown_value(Category::Severity, s, c.value_span.start)
                })?;
                Operand::Severity(severity)
            }
            (Value::String(s), _) => {
                if spec.field == Field::Subsystem
                    && self.registry.subsystem_catalog().contains(s) == Some(false)
                {
                    return Err(self.unknown_value(Category::Subsystem, s, c.value_span.start));
                }
                Operand::Text(s.to_lowercase())
            }
        };

        Ok(Predicate::Compare {
            field: spec.field,
            operator: c.operator,
            operand,
        })
    }

    fn labels_any(&self, labels: &LabelsAny) -> Result<Predicate, SemanticError> {
        let catalog = self.registry.label_catalog();
        if catalog.is_loaded() {
            if let Some(label) = labels
                .labels
                .iter()
                .find(|l| catalog.contains(&l.name) == Some(false))
            {
                return Err(self.unknown_value(Category::Label, &label.name, label.span.start));
            }
        }
        Ok(Predicate::LabelsAny(
            labels.labels.iter().map(|l| l.name.clone()).collect(),
        ))
    }

    fn stage(&self, stage: &PipelineStage) -> Result<Stage, SemanticError> {
        match stage {
            PipelineStage::Sort {
                field,
                field_span,
                order,
            } => {
                let spec = self.registry.field(field).ok_or_else(|| SemanticError::UnknownField {
                    field: field.clone(),
                    position: field_span.start,
                    suggestions: self.suggest(Category::Field, field),
                })?;
                if !spec.sortable {
                    let sortable = self
                        .registry
                        .fields()
                        .iter()
                        .filter(|f| f.sortable)
                        .map(|f| f.name);
                    return Err(SemanticError::NotSortable {
                        field: field.clone(),
                        position: field_span.start,
                        suggestions: suggest::rank(field, sortable, self.config),
                    });
                }
                Ok(Stage::Sort {
                    field: spec.field,
                    order: *order,
                })
            }
            PipelineStage::Limit { count, span } => {
                if *count > self.config.max_limit {
                    return Err(SemanticError::InvalidLimit {
                        count: *count,
                        max: self.config.max_limit,
                        position: span.start,
                    });
                }
                Ok(Stage::Limit(*count))
            }
        }
    }

    fn suggest(&self, category: Category, term: &str) -> Vec<String> {
        self.registry.suggest(category, term, self.config)
    }

    fn unknown_value(&self, category: Category, value: &str, position: usize) -> SemanticError {
        SemanticError::UnknownValue {
            category,
            value: value.to_string(),
            position,
            suggestions: self.suggest(category, value),
        }
    }
}
