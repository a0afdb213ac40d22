//! Recursive-descent parser for the query language.
//!
//! Parses queries like:
//! - `:errors`
//! - `@24h subsystem == "connections"`
//! - `message contains "timeout" | limit 50`
//! - `(severity == error or severity == warning) and not labels any ["tls"]`
//!
//! Precedence, lowest to highest: `or`, `and`, `not`, comparison, grouping.
//! Top-level clauses written next to each other are joined with `and`. The
//! first error aborts parsing.

use super::ast::{
    Comparison, ComparisonOp, Expr, LabelName, LabelsAny, PipelineStage, PresetRef, Query,
    SortOrder, Span, TimeRange, Value,
};
use super::lexer::{tokenize, LexError, Token, TokenKind};
use super::schema::{lookup_duration_unit, DURATION_UNITS, PIPELINE_STAGES};
use super::suggest::rank;
use crate::config::EngineConfig;
use thiserror::Error;

/// Errors that can occur during query parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The tokenizer could not make sense of the input.
    #[error("{error}")]
    Lex {
        /// What went wrong.
        error: LexError,
        /// Offset of the offending input.
        position: usize,
    },

    /// An unexpected token was encountered.
    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
        /// Offset of the token.
        position: usize,
    },

    /// The query ended too early.
    #[error("Unexpected end of query: expected {expected}")]
    UnexpectedEnd {
        /// What was expected.
        expected: String,
        /// Offset of the end of the last token.
        position: usize,
    },

    /// A `(` was never closed.
    #[error("Unmatched '(': missing closing parenthesis")]
    UnmatchedParen {
        /// Offset of the opening parenthesis.
        position: usize,
    },

    /// A `)` without a matching `(`.
    #[error("Unexpected ')' without a matching '('")]
    UnexpectedCloseParen {
        /// Offset of the closing parenthesis.
        position: usize,
    },

    /// `@` followed by a duration with an unknown unit.
    #[error("Unknown duration unit '{unit}', expected one of: {expected}")]
    UnknownDurationUnit {
        /// The unit as written.
        unit: String,
        /// Comma separated list of valid units.
        expected: String,
        /// Offset of the unit.
        position: usize,
    },

    /// `|` followed by a name that is not a stage.
    #[error("Unknown pipeline stage '{name}'")]
    UnknownStage {
        /// The stage name as written.
        name: String,
        /// Offset of the name.
        position: usize,
    },

    /// A number that does not fit.
    #[error("Number '{literal}' is out of range")]
    InvalidNumber {
        /// The digits as written.
        literal: String,
        /// Offset of the number.
        position: usize,
    },
}

impl ParseError {
    /// Byte offset into the query the error refers to.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::Lex { position, .. }
            | Self::UnexpectedToken { position, .. }
            | Self::UnexpectedEnd { position, .. }
            | Self::UnmatchedParen { position }
            | Self::UnexpectedCloseParen { position }
            | Self::UnknownDurationUnit { position, .. }
            | Self::UnknownStage { position, .. }
            | Self::InvalidNumber { position, .. } => *position,
        }
    }

    /// "Did you mean" candidates for misspelled stage names and units.
    #[must_use]
    pub fn suggestions(&self, config: &EngineConfig) -> Vec<String> {
        match self {
            Self::UnknownStage { name, .. } => {
                rank(name, PIPELINE_STAGES.iter().map(|s| s.name), config)
            }
            Self::UnknownDurationUnit { unit, .. } => {
                let suffixes: Vec<String> =
                    DURATION_UNITS.iter().map(|u| u.suffix.to_string()).collect();
                rank(unit, suffixes.iter().map(String::as_str), config)
            }
            _ => Vec::new(),
        }
    }

    /// Whether the error came from the tokenizer rather than the grammar.
    #[must_use]
    pub fn is_lex_error(&self) -> bool {
        matches!(self, Self::Lex { .. })
    }
}

/// Tokenizes and parses a query string.
///
/// # Errors
///
/// Returns the first lexical or syntax error.
///
/// # Examples
///
/// ```
/// use engine::query::parse_query;
///
/// let query = parse_query("@24h :crashes | limit 50").unwrap();
/// assert_eq!(query.stages.len(), 1);
/// assert_eq!(query.to_string(), "@24h and :crashes | limit 50");
/// ```
pub fn parse_query(input: &str) -> Result<Query, ParseError> {
    parse(&tokenize(input))
}

/// Parses a token stream into a [`Query`].
///
/// An empty stream is a valid query that matches everything.
///
/// # Errors
///
/// Returns the first lexical or syntax error.
pub fn parse(tokens: &[Token]) -> Result<Query, ParseError> {
    Parser::new(tokens).query()
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    end: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        let end = tokens.last().map_or(0, |t| t.span.end);
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    // ========================================================================
    // Token access
    // ========================================================================

    /// Looks at the current token; invalid tokens surface as errors here.
    fn peek(&self) -> Result<Option<&'t Token>, ParseError> {
        let tokens = self.tokens;
        match tokens.get(self.pos) {
            Some(Token {
                kind: TokenKind::Invalid(error),
                span,
                ..
            }) => Err(ParseError::Lex {
                error: error.clone(),
                position: span.start,
            }),
            token => Ok(token),
        }
    }

    fn peek_kind(&self) -> Result<Option<&'t TokenKind>, ParseError> {
        Ok(self.peek()?.map(|t| &t.kind))
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    /// Returns the current token, or an end-of-input error naming `expected`.
    fn require(&self, expected: &str) -> Result<&'t Token, ParseError> {
        self.peek()?.ok_or_else(|| self.unexpected_end(expected))
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<&'t Token, ParseError> {
        let token = self.require(expected)?;
        if &token.kind == kind {
            self.bump();
            Ok(token)
        } else {
            Err(unexpected(token, expected))
        }
    }

    fn unexpected_end(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedEnd {
            expected: expected.to_string(),
            position: self.end,
        }
    }

    // ========================================================================
    // Query and clauses
    // ========================================================================

    fn query(&mut self) -> Result<Query, ParseError> {
        let mut filter: Option<Expr> = None;

        while let Some(kind) = self.peek_kind()? {
            if *kind == TokenKind::Pipe {
                break;
            }
            let clause = self.or_expr()?;
            filter = Some(match filter {
                Some(previous) => Expr::and(previous, clause),
                None => clause,
            });
        }

        let mut stages = Vec::new();
        while self.peek()?.is_some() {
            self.expect(&TokenKind::Pipe, "'|' or end of query")?;
            stages.push(self.stage()?);
        }

        Ok(Query { filter, stages })
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and_expr()?;
        while self.peek_kind()? == Some(&TokenKind::Or) {
            self.bump();
            let right = self.and_expr()?;
            expr = Expr::or(expr, right);
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.not_expr()?;
        while self.peek_kind()? == Some(&TokenKind::And) {
            self.bump();
            let right = self.not_expr()?;
            expr = Expr::and(expr, right);
        }
        Ok(expr)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek_kind()? == Some(&TokenKind::Not) {
            self.bump();
            let inner = self.not_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.require("a filter expression")?;
        match &token.kind {
            TokenKind::LParen => self.grouped(token.span),
            TokenKind::RParen => Err(ParseError::UnexpectedCloseParen {
                position: token.span.start,
            }),
            TokenKind::Colon => self.preset_ref(token.span),
            TokenKind::At => self.time_range(token.span),
            TokenKind::Ident(name) if name == "labels" && self.next_is(&TokenKind::Any) => {
                self.labels_any(token.span)
            }
            TokenKind::Ident(name) => self.comparison(name, token.span),
            _ => Err(unexpected(token, "a filter expression")),
        }
    }

    fn next_is(&self, kind: &TokenKind) -> bool {
        self.tokens.get(self.pos + 1).is_some_and(|t| &t.kind == kind)
    }

    fn grouped(&mut self, open: Span) -> Result<Expr, ParseError> {
        self.bump();
        let inner = self.or_expr()?;
        match self.peek()? {
            Some(token) if token.kind == TokenKind::RParen => {
                self.bump();
                Ok(Expr::Grouped(Box::new(inner)))
            }
            Some(token) if token.kind != TokenKind::Pipe => Err(unexpected(token, "')'")),
            // a stage or the end of input closes every open clause
            _ => Err(ParseError::UnmatchedParen {
                position: open.start,
            }),
        }
    }

    // ========================================================================
    // Markers
    // ========================================================================

    fn preset_ref(&mut self, marker: Span) -> Result<Expr, ParseError> {
        const EXPECTED: &str = "a preset name directly after ':'";
        self.bump();
        let token = self.require(EXPECTED)?;
        match &token.kind {
            TokenKind::Ident(name) if token.span.start == marker.end => {
                self.bump();
                Ok(Expr::Preset(PresetRef {
                    name: name.clone(),
                    span: token.span,
                }))
            }
            _ => Err(unexpected(token, EXPECTED)),
        }
    }

    fn time_range(&mut self, marker: Span) -> Result<Expr, ParseError> {
        const EXPECTED: &str = "a duration such as 24h directly after '@'";
        self.bump();
        let token = self.require(EXPECTED)?;
        match &token.kind {
            TokenKind::Duration { amount, unit } if token.span.start == marker.end => {
                let Some(duration_unit) = lookup_duration_unit(unit) else {
                    return Err(ParseError::UnknownDurationUnit {
                        unit: unit.clone(),
                        expected: valid_units(),
                        position: token.span.start + amount.len(),
                    });
                };
                let amount = parse_number(amount, token.span.start)?;
                self.bump();
                Ok(Expr::TimeRange(TimeRange {
                    amount,
                    unit: duration_unit.suffix,
                    span: token.span,
                }))
            }
            _ => Err(unexpected(token, EXPECTED)),
        }
    }

    // ========================================================================
    // Comparisons
    // ========================================================================

    fn comparison(&mut self, field: &str, field_span: Span) -> Result<Expr, ParseError> {
        self.bump();

        let op_token = self.require("an operator (==, !=, contains)")?;
        let operator = match op_token.kind {
            TokenKind::Eq => ComparisonOp::Eq,
            TokenKind::NotEq => ComparisonOp::NotEq,
            TokenKind::Contains => ComparisonOp::Contains,
            _ => return Err(unexpected(op_token, "an operator (==, !=, contains)")),
        };
        self.bump();

        let value_token = self.require("a value")?;
        let value = match &value_token.kind {
            TokenKind::String(s) | TokenKind::Ident(s) => Value::String(s.clone()),
            TokenKind::Number(n) => Value::Integer(parse_number(n, value_token.span.start)?),
            _ => return Err(unexpected(value_token, "a value")),
        };
        self.bump();

        Ok(Expr::Comparison(Comparison {
            field: field.to_string(),
            field_span,
            operator,
            operator_span: op_token.span,
            value,
            value_span: value_token.span,
        }))
    }

    fn labels_any(&mut self, start: Span) -> Result<Expr, ParseError> {
        // `labels` and `any`
        self.bump();
        self.bump();
        self.expect(&TokenKind::LBracket, "'['")?;

        let mut labels = Vec::new();
        loop {
            let token = self.require("a label string")?;
            let TokenKind::String(name) = &token.kind else {
                return Err(unexpected(token, "a label string"));
            };
            self.bump();
            labels.push(LabelName {
                name: name.clone(),
                span: token.span,
            });

            let token = self.require("',' or ']'")?;
            match token.kind {
                TokenKind::Comma => self.bump(),
                TokenKind::RBracket => {
                    self.bump();
                    return Ok(Expr::LabelsAny(LabelsAny {
                        labels,
                        span: start.to(token.span),
                    }));
                }
                _ => return Err(unexpected(token, "',' or ']'")),
            }
        }
    }

    // ========================================================================
    // Pipeline stages
    // ========================================================================

    fn stage(&mut self) -> Result<PipelineStage, ParseError> {
        let token = self.require("a pipeline stage (sort, limit)")?;
        let TokenKind::Ident(name) = &token.kind else {
            return Err(unexpected(token, "a pipeline stage (sort, limit)"));
        };

        if name.eq_ignore_ascii_case("sort") {
            self.bump();
            self.sort_stage()
        } else if name.eq_ignore_ascii_case("limit") {
            self.bump();
            self.limit_stage()
        } else {
            Err(ParseError::UnknownStage {
                name: name.clone(),
                position: token.span.start,
            })
        }
    }

    fn sort_stage(&mut self) -> Result<PipelineStage, ParseError> {
        let token = self.require("a field to sort by")?;
        let TokenKind::Ident(field) = &token.kind else {
            return Err(unexpected(token, "a field to sort by"));
        };
        self.bump();

        let mut order = SortOrder::default();
        if let Some(TokenKind::Ident(word)) = self.peek_kind()? {
            if word.eq_ignore_ascii_case("asc") {
                self.bump();
            } else if word.eq_ignore_ascii_case("desc") {
                order = SortOrder::Desc;
                self.bump();
            }
        }

        Ok(PipelineStage::Sort {
            field: field.clone(),
            field_span: token.span,
            order,
        })
    }

    fn limit_stage(&mut self) -> Result<PipelineStage, ParseError> {
        let token = self.require("a number")?;
        let TokenKind::Number(digits) = &token.kind else {
            return Err(unexpected(token, "a number"));
        };
        let count = parse_number(digits, token.span.start)?;
        self.bump();

        Ok(PipelineStage::Limit {
            count,
            span: token.span,
        })
    }
}

fn unexpected(token: &Token, expected: &str) -> ParseError {
    ParseError::UnexpectedToken {
        expected: expected.to_string(),
        found: token.kind.describe(),
        position: token.span.start,
    }
}

fn parse_number(digits: &str, position: usize) -> Result<u64, ParseError> {
    digits.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
        literal: digits.to_string(),
        position,
    })
}

fn valid_units() -> String {
    DURATION_UNITS
        .iter()
        .map(|u| u.suffix.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::LogicalOp;

    fn comparison_of(expr: &Expr) -> &Comparison {
        match expr {
            Expr::Comparison(c) => c,
            other => panic!("Expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_query_matches_all() {
        let query = parse_query("").unwrap();
        assert!(query.filter.is_none());
        assert!(query.stages.is_empty());

        let query = parse_query("   ").unwrap();
        assert!(query.filter.is_none());
    }

    #[test]
    fn test_parse_preset() {
        let query = parse_query(":errors").unwrap();
        match query.filter {
            Some(Expr::Preset(p)) => {
                assert_eq!(p.name, "errors");
                assert_eq!(p.span, Span::new(1, 7));
            }
            other => panic!("Expected preset, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_preset_requires_adjacent_name() {
        let err = parse_query(": errors").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 2, .. }));
    }

    #[test]
    fn test_parse_time_range() {
        let query = parse_query("@24h").unwrap();
        match query.filter {
            Some(Expr::TimeRange(t)) => {
                assert_eq!(t.amount, 24);
                assert_eq!(t.unit, 'h');
            }
            other => panic!("Expected time range, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_time_range_unknown_unit() {
        let err = parse_query("@7y").unwrap_err();
        match &err {
            ParseError::UnknownDurationUnit { unit, position, .. } => {
                assert_eq!(unit, "y");
                assert_eq!(*position, 2);
            }
            other => panic!("Expected unknown unit, got {other:?}"),
        }
        assert!(err.to_string().contains("'y'"));
    }

    #[test]
    fn test_parse_time_range_requires_adjacent_duration() {
        let err = parse_query("@ 24h").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 2, .. }));
    }

    #[test]
    fn test_parse_time_range_without_unit() {
        let err = parse_query("@24").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 1, .. }));
    }

    #[test]
    fn test_parse_comparison_string() {
        let query = parse_query("severity == \"error\"").unwrap();
        let c = comparison_of(query.filter.as_ref().unwrap());
        assert_eq!(c.field, "severity");
        assert_eq!(c.operator, ComparisonOp::Eq);
        assert_eq!(c.value, Value::String("error".to_string()));
        assert_eq!(c.field_span, Span::new(0, 8));
        assert_eq!(c.value_span, Span::new(12, 19));
    }

    #[test]
    fn test_parse_comparison_bare_word() {
        let query = parse_query("severity != debug").unwrap();
        let c = comparison_of(query.filter.as_ref().unwrap());
        assert_eq!(c.operator, ComparisonOp::NotEq);
        assert_eq!(c.value, Value::String("debug".to_string()));
    }

    #[test]
    fn test_parse_comparison_number() {
        let query = parse_query("id == 42").unwrap();
        let c = comparison_of(query.filter.as_ref().unwrap());
        assert_eq!(c.value, Value::Integer(42));
    }

    #[test]
    fn test_parse_contains() {
        let query = parse_query("message CONTAINS \"timeout\"").unwrap();
        let c = comparison_of(query.filter.as_ref().unwrap());
        assert_eq!(c.operator, ComparisonOp::Contains);
    }

    #[test]
    fn test_parse_labels_any() {
        let query = parse_query("labels any [\"tls\", \"disconnects\"]").unwrap();
        match query.filter {
            Some(Expr::LabelsAny(l)) => {
                let names: Vec<&str> = l.labels.iter().map(|l| l.name.as_str()).collect();
                assert_eq!(names, vec!["tls", "disconnects"]);
                assert_eq!(l.span, Span::new(0, 33));
            }
            other => panic!("Expected labels any, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_labels_any_empty_list() {
        let err = parse_query("labels any []").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 12, .. }));
    }

    #[test]
    fn test_parse_labels_comparison_is_plain_comparison() {
        let query = parse_query("labels == \"tls\"").unwrap();
        assert!(matches!(query.filter, Some(Expr::Comparison(_))));
    }

    #[test]
    fn test_parse_and_or_precedence() {
        // Should parse as: a OR (b AND c)
        let query = parse_query("node == a or node == b and node == c").unwrap();
        match query.filter {
            Some(Expr::Combined {
                operator, right, ..
            }) => {
                assert_eq!(operator, LogicalOp::Or);
                assert!(matches!(
                    *right,
                    Expr::Combined {
                        operator: LogicalOp::And,
                        ..
                    }
                ));
            }
            other => panic!("Expected OR at top level, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_not_binds_tighter_than_and() {
        let query = parse_query("not :errors and :tls").unwrap();
        match query.filter {
            Some(Expr::Combined { left, operator, .. }) => {
                assert_eq!(operator, LogicalOp::And);
                assert!(matches!(*left, Expr::Not(_)));
            }
            other => panic!("Expected AND at top level, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_grouped() {
        let query =
            parse_query("(severity == error or severity == warning) and node == \"rabbit@a\"")
                .unwrap();
        match query.filter {
            Some(Expr::Combined { left, operator, .. }) => {
                assert_eq!(operator, LogicalOp::And);
                assert!(matches!(*left, Expr::Grouped(_)));
            }
            other => panic!("Expected combined clause, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_implicit_and_between_clauses() {
        let query = parse_query("@24h :crashes | limit 50").unwrap();
        assert_eq!(query.to_string(), "@24h and :crashes | limit 50");
    }

    #[test]
    fn test_parse_implicit_and_wraps_whole_clause() {
        // The second clause is the whole `or` expression.
        let query = parse_query(":errors node == a or node == b").unwrap();
        match query.filter {
            Some(Expr::Combined {
                left,
                operator,
                right,
            }) => {
                assert_eq!(operator, LogicalOp::And);
                assert!(matches!(*left, Expr::Preset(_)));
                assert!(matches!(
                    *right,
                    Expr::Combined {
                        operator: LogicalOp::Or,
                        ..
                    }
                ));
            }
            other => panic!("Expected implicit AND, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_pipeline() {
        let query = parse_query("| sort timestamp desc | limit 10 | sort node").unwrap();
        assert!(query.filter.is_none());
        assert_eq!(query.stages.len(), 3);
        assert!(matches!(
            &query.stages[0],
            PipelineStage::Sort {
                order: SortOrder::Desc,
                ..
            }
        ));
        assert!(matches!(
            &query.stages[1],
            PipelineStage::Limit { count: 10, .. }
        ));
        assert!(matches!(
            &query.stages[2],
            PipelineStage::Sort {
                order: SortOrder::Asc,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_unknown_stage() {
        let err = parse_query(":errors | head 5").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownStage {
                name: "head".to_string(),
                position: 10,
            }
        );
    }

    #[test]
    fn test_parse_unknown_stage_suggestions() {
        let err = parse_query("| srot timestamp").unwrap_err();
        assert_eq!(err.suggestions(&EngineConfig::default()), vec!["sort"]);

        let err = parse_query("@3hr").unwrap_err();
        assert_eq!(err.suggestions(&EngineConfig::default()), vec!["h"]);
    }

    #[test]
    fn test_parse_limit_requires_number() {
        let err = parse_query("| limit many").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 8, .. }));
    }

    #[test]
    fn test_parse_limit_overflow() {
        let err = parse_query("| limit 99999999999999999999999").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { position: 8, .. }));
    }

    #[test]
    fn test_parse_trailing_tokens_after_stage() {
        let err = parse_query("| limit 5 :errors").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 10, .. }));
    }

    #[test]
    fn test_parse_unmatched_open_paren() {
        let err = parse_query("node == a and (severity == error").unwrap_err();
        assert_eq!(err, ParseError::UnmatchedParen { position: 14 });
    }

    #[test]
    fn test_parse_unmatched_paren_before_pipe() {
        let err = parse_query("(severity == error | limit 5").unwrap_err();
        assert_eq!(err, ParseError::UnmatchedParen { position: 0 });

        let err = parse_query(":errors (node == a or node == b | sort id").unwrap_err();
        assert_eq!(err, ParseError::UnmatchedParen { position: 8 });
    }

    #[test]
    fn test_parse_stray_close_paren() {
        let err = parse_query("node == a)").unwrap_err();
        assert_eq!(err, ParseError::UnexpectedCloseParen { position: 9 });
    }

    #[test]
    fn test_parse_missing_operator() {
        let err = parse_query("severity error").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 9, .. }));
    }

    #[test]
    fn test_parse_missing_value_at_end() {
        let err = parse_query("severity ==").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedEnd {
                expected: "a value".to_string(),
                position: 11,
            }
        );
    }

    #[test]
    fn test_parse_lex_error_surfaces_with_position() {
        let err = parse_query("node = a").unwrap_err();
        assert_eq!(
            err,
            ParseError::Lex {
                error: LexError::LoneEquals,
                position: 5,
            }
        );
        assert!(err.is_lex_error());
    }

    #[test]
    fn test_parse_unterminated_string() {
        let err = parse_query("message contains \"oops").unwrap_err();
        assert_eq!(err.position(), 17);
        assert!(err.is_lex_error());
    }

    #[test]
    fn test_parse_first_error_wins() {
        // The stray ')' comes before the invalid '#'.
        let err = parse_query(") #").unwrap_err();
        assert_eq!(err, ParseError::UnexpectedCloseParen { position: 0 });
    }
}
