//! Query tokenizer.
//!
//! Turns raw query text into a flat token stream. Tokenizing never fails:
//! characters that cannot start a token become [`TokenKind::Invalid`] so the
//! parser can report them at their exact offset.

use super::ast::Span;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map, recognize, value},
    sequence::pair,
    IResult, Parser,
};
use thiserror::Error;

/// Problems detected while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A character that cannot start any token.
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    /// A single `=`.
    #[error("unexpected '=', use '==' for equality")]
    LoneEquals,

    /// A string literal without its closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,
}

/// Token kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `[A-Za-z_][A-Za-z0-9_]*` that is not a keyword.
    Ident(String),
    /// Double-quoted string, unescaped.
    String(String),
    /// Digits only.
    Number(String),
    /// Digits directly followed by a unit; the unit is checked by the parser.
    Duration {
        /// Digits as written.
        amount: String,
        /// Suffix as written.
        unit: String,
    },
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `:` preset marker
    Colon,
    /// `@` time marker
    At,
    /// `|`
    Pipe,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,
    /// `any`
    Any,
    /// `contains`
    Contains,
    /// Unrecognised input.
    Invalid(LexError),
}

impl TokenKind {
    /// Describes the token kind for "expected X, found Y" messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::String(s) => format!("string \"{s}\""),
            Self::Number(n) => format!("number {n}"),
            Self::Duration { amount, unit } => format!("duration '{amount}{unit}'"),
            Self::Eq => "'=='".to_string(),
            Self::NotEq => "'!='".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::LBracket => "'['".to_string(),
            Self::RBracket => "']'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Colon => "':'".to_string(),
            Self::At => "'@'".to_string(),
            Self::Pipe => "'|'".to_string(),
            Self::And => "'and'".to_string(),
            Self::Or => "'or'".to_string(),
            Self::Not => "'not'".to_string(),
            Self::Any => "'any'".to_string(),
            Self::Contains => "'contains'".to_string(),
            Self::Invalid(e) => e.to_string(),
        }
    }
}

/// A token with its source text and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// The exact source text.
    pub lexeme: String,
    /// Byte offsets into the query.
    pub span: Span,
}

/// Splits a query into tokens.
///
/// Whitespace between tokens is skipped; whitespace inside string literals is
/// kept.
///
/// # Examples
///
/// ```
/// use engine::query::{tokenize, TokenKind};
///
/// let tokens = tokenize("@24h :errors");
/// assert_eq!(tokens.len(), 4);
/// assert_eq!(tokens[0].kind, TokenKind::At);
/// assert_eq!(tokens[3].span.start, 6);
/// ```
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start();
        let Some(first) = rest.chars().next() else {
            break;
        };

        let start = text.len() - rest.len();
        let (next, kind) = next_token(rest, first);
        let end = text.len() - next.len();

        tokens.push(Token {
            kind,
            lexeme: text[start..end].to_string(),
            span: Span::new(start, end),
        });
        rest = next;
    }

    tokens
}

fn next_token(input: &str, first: char) -> (&str, TokenKind) {
    if first == '"' {
        return string_literal(input);
    }

    if let Ok(token) = alt((number_or_duration, word, symbol)).parse(input) {
        return token;
    }

    let rest = &input[first.len_utf8()..];
    let error = if first == '=' {
        LexError::LoneEquals
    } else {
        LexError::UnexpectedChar(first)
    };
    (rest, TokenKind::Invalid(error))
}

// ============================================================================
// Token recognisers
// ============================================================================

fn number_or_duration(input: &str) -> IResult<&str, TokenKind> {
    map(
        pair(
            digit1,
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        ),
        |(digits, unit): (&str, &str)| {
            if unit.is_empty() {
                TokenKind::Number(digits.to_string())
            } else {
                TokenKind::Duration {
                    amount: digits.to_string(),
                    unit: unit.to_string(),
                }
            }
        },
    )
    .parse(input)
}

fn word(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        |ident: &str| keyword(ident).unwrap_or_else(|| TokenKind::Ident(ident.to_string())),
    )
    .parse(input)
}

fn keyword(ident: &str) -> Option<TokenKind> {
    match ident.to_ascii_lowercase().as_str() {
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "not" => Some(TokenKind::Not),
        "any" => Some(TokenKind::Any),
        "contains" => Some(TokenKind::Contains),
        _ => None,
    }
}

fn symbol(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Eq, tag("==")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Colon, char(':')),
        value(TokenKind::At, char('@')),
        value(TokenKind::Pipe, char('|')),
    ))
    .parse(input)
}

/// Reads a double-quoted string starting at `input[0]`.
///
/// `\"` is the only escape; any other backslash is kept as is. Without a
/// closing quote the token runs to the end of input.
fn string_literal(input: &str) -> (&str, TokenKind) {
    let body = &input[1..];
    let mut text = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if body[i + 1..].starts_with('"') => {
                text.push('"');
                chars.next();
            }
            '"' => return (&body[i + 1..], TokenKind::String(text)),
            _ => text.push(c),
        }
    }

    ("", TokenKind::Invalid(LexError::UnterminatedString))
}
