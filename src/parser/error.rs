use thiserror::Error;

/// Malformed token sequence. Aborts the parse of the whole body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Syntax error at line {line}, column {column}: expected {expected}, got {token}")]
pub struct ParseError {
    pub token: String,
    pub expected: String,
    pub line: usize,
    pub column: usize,
}
