//! Abstract Syntax Tree definitions for the query language.
//!
//! Leaves carry the [`Span`] of the text they were parsed from so that the
//! validator can point at the offending part of the query. `Display` renders a
//! tree back to QL text and ignores spans.

use serde::{Deserialize, Serialize};

/// Byte range into the original query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Offset of the first byte.
    pub start: usize,
    /// Offset one past the last byte.
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns a span covering both `self` and `other`.
    #[must_use]
    pub fn to(self, other: Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    NotEq,
    /// Case-insensitive substring match
    Contains,
}

impl ComparisonOp {
    /// Returns the operator as written in a query.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Contains => "contains",
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Logical operators for combining expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl std::fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}

/// A literal on the right-hand side of a comparison.
///
/// Bare words (`severity == error`) are read as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// String value
    String(String),
    /// Integer value
    Integer(u64),
}

impl Value {
    /// Returns a short name of the value type for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Self::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// A `:name` reference to a preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetRef {
    /// Preset name without the marker.
    pub name: String,
    /// Span of the name (after the `:`).
    pub span: Span,
}

/// A `@<N><unit>` relative time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Number of units.
    pub amount: u64,
    /// Unit suffix, e.g. `h`.
    pub unit: char,
    /// Span of the duration literal.
    pub span: Span,
}

/// A single comparison (e.g. `severity == "error"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// The field name as written.
    pub field: String,
    /// Span of the field name.
    pub field_span: Span,
    /// The comparison operator.
    pub operator: ComparisonOp,
    /// Span of the operator.
    pub operator_span: Span,
    /// The value to compare against.
    pub value: Value,
    /// Span of the value.
    pub value_span: Span,
}

/// A label literal inside `labels any [...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelName {
    /// Label name.
    pub name: String,
    /// Span of the string literal.
    pub span: Span,
}

/// `labels any ["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelsAny {
    /// Labels of which at least one must be set.
    pub labels: Vec<LabelName>,
    /// Span of the whole clause.
    pub span: Span,
}

/// A filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// `:name`
    Preset(PresetRef),
    /// `@24h`
    TimeRange(TimeRange),
    /// `field op value`
    Comparison(Comparison),
    /// `labels any [...]`
    LabelsAny(LabelsAny),
    /// Two expressions combined with a logical operator.
    Combined {
        /// Left-hand side expression.
        left: Box<Expr>,
        /// The logical operator.
        operator: LogicalOp,
        /// Right-hand side expression.
        right: Box<Expr>,
    },
    /// `not expr`
    Not(Box<Expr>),
    /// A grouped expression (parentheses).
    Grouped(Box<Expr>),
}

impl Expr {
    /// Combines two expressions with `and`.
    #[must_use]
    pub fn and(left: Expr, right: Expr) -> Self {
        Self::Combined {
            left: Box::new(left),
            operator: LogicalOp::And,
            right: Box::new(right),
        }
    }

    /// Combines two expressions with `or`.
    #[must_use]
    pub fn or(left: Expr, right: Expr) -> Self {
        Self::Combined {
            left: Box::new(left),
            operator: LogicalOp::Or,
            right: Box::new(right),
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preset(p) => write!(f, ":{}", p.name),
            Self::TimeRange(t) => write!(f, "@{}{}", t.amount, t.unit),
            Self::Comparison(c) => write!(f, "{} {} {}", c.field, c.operator, c.value),
            Self::LabelsAny(l) => {
                write!(f, "labels any [")?;
                for (i, label) in l.labels.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\"", label.name)?;
                }
                write!(f, "]")
            }
            Self::Combined {
                left,
                operator,
                right,
            } => write!(f, "{left} {operator} {right}"),
            Self::Not(inner) => write!(f, "not {inner}"),
            Self::Grouped(inner) => write!(f, "({inner})"),
        }
    }
}

/// Sort direction for a `sort` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order (oldest first for timestamps).
    #[default]
    Asc,
    /// Descending order (newest first for timestamps).
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// A post-filter transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    /// `sort field [asc|desc]`
    Sort {
        /// The field to sort by, as written.
        field: String,
        /// Span of the field name.
        field_span: Span,
        /// The sort order.
        order: SortOrder,
    },
    /// `limit N`
    Limit {
        /// Maximum number of entries to keep.
        count: u64,
        /// Span of the count literal.
        span: Span,
    },
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sort { field, order, .. } => write!(f, "sort {field} {order}"),
            Self::Limit { count, .. } => write!(f, "limit {count}"),
        }
    }
}

/// A parsed query: one filter expression followed by pipeline stages.
///
/// A missing filter matches every entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Query {
    /// The filter expression.
    pub filter: Option<Expr>,
    /// Stages, applied left to right.
    pub stages: Vec<PipelineStage>,
}

impl Query {
    /// Creates a query that matches everything and has no stages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: PipelineStage) -> Self {
        self.stages.push(stage);
        self
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref filter) = self.filter {
            write!(f, "{filter}")?;
        }

        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 || self.filter.is_some() {
                write!(f, " ")?;
            }
            write!(f, "| {stage}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(field: &str, operator: ComparisonOp, value: &str) -> Expr {
        Expr::Comparison(Comparison {
            field: field.to_string(),
            field_span: Span::default(),
            operator,
            operator_span: Span::default(),
            value: Value::String(value.to_string()),
            value_span: Span::default(),
        })
    }

    #[test]
    fn test_query_display_empty() {
        assert_eq!(Query::new().to_string(), "");
    }

    #[test]
    fn test_query_display_with_filter() {
        let query = Query::new().with_filter(comparison("severity", ComparisonOp::Eq, "error"));
        assert_eq!(query.to_string(), "severity == \"error\"");
    }

    #[test]
    fn test_query_display_full() {
        let query = Query::new()
            .with_filter(Expr::and(
                Expr::TimeRange(TimeRange {
                    amount: 24,
                    unit: 'h',
                    span: Span::default(),
                }),
                Expr::Preset(PresetRef {
                    name: "crashes".to_string(),
                    span: Span::default(),
                }),
            ))
            .with_stage(PipelineStage::Sort {
                field: "timestamp".to_string(),
                field_span: Span::default(),
                order: SortOrder::Desc,
            })
            .with_stage(PipelineStage::Limit {
                count: 50,
                span: Span::default(),
            });

        assert_eq!(
            query.to_string(),
            "@24h and :crashes | sort timestamp desc | limit 50"
        );
    }

    #[test]
    fn test_query_display_stages_only() {
        let query = Query::new().with_stage(PipelineStage::Limit {
            count: 5,
            span: Span::default(),
        });
        assert_eq!(query.to_string(), "| limit 5");
    }

    #[test]
    fn test_labels_any_display() {
        let expr = Expr::LabelsAny(LabelsAny {
            labels: vec![
                LabelName {
                    name: "tls".to_string(),
                    span: Span::default(),
                },
                LabelName {
                    name: "disconnects".to_string(),
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        });
        assert_eq!(expr.to_string(), "labels any [\"tls\", \"disconnects\"]");
    }

    #[test]
    fn test_not_and_group_display() {
        let expr = Expr::Not(Box::new(Expr::Grouped(Box::new(Expr::or(
            comparison("message", ComparisonOp::Contains, "timeout"),
            comparison("node", ComparisonOp::NotEq, "rabbit@a"),
        )))));
        assert_eq!(
            expr.to_string(),
            "not (message contains \"timeout\" or node != \"rabbit@a\")"
        );
    }

    #[test]
    fn test_string_value_display_escapes_quotes() {
        let value = Value::String("say \"hi\"".to_string());
        assert_eq!(value.to_string(), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_span_to() {
        let span = Span::new(4, 8).to(Span::new(0, 2));
        assert_eq!(span, Span::new(0, 8));
    }
}
