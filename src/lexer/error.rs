use thiserror::Error;

/// Recoverable tokenization problems.
///
/// The lexer records these and keeps going, so a body with a stray character
/// still reaches the parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Invalid numeric literal '{literal}' at line {line}, column {column}")]
    InvalidNumber {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Unterminated phrase at line {line}, column {column}")]
    UnterminatedPhrase { line: usize, column: usize },
    #[error("Unterminated comment at line {line}, column {column}")]
    UnterminatedComment { line: usize, column: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { line, .. }
            | LexError::InvalidNumber { line, .. }
            | LexError::UnterminatedString { line, .. }
            | LexError::UnterminatedPhrase { line, .. }
            | LexError::UnterminatedComment { line, .. } => *line,
        }
    }
}
