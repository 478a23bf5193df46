//! Errors produced while compiling expression source text.
//!
//! Both carry source positions so a policy author can be pointed at the
//! offending character. Evaluation has no error type: it always yields a
//! boolean plus a trace.

use thiserror::Error;

/// Tokenization failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct LexError {
    /// 0-based byte offset of the offending input.
    pub position: usize,
    pub message: String,
}

impl LexError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Grammar or builder failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    /// 0-based byte offset of the token the error was raised at.
    pub position: usize,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
    pub message: String,
}

/// Anything that can go wrong turning text into a [`Condition`](crate::Condition).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl ExpressionError {
    /// Byte offset of the failure in the source text.
    pub fn position(&self) -> usize {
        match self {
            Self::Lex(e) => e.position,
            Self::Parse(e) => e.position,
        }
    }

    /// Message without position decoration.
    pub fn message(&self) -> &str {
        match self {
            Self::Lex(e) => &e.message,
            Self::Parse(e) => &e.message,
        }
    }
}

/// Result alias for expression compilation.
pub type Result<T> = std::result::Result<T, ExpressionError>;
