use thiserror::Error;

use crate::domain::DomainError;
use crate::symtab::SymbolError;

/// Errors raised while evaluating an action body.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    #[error("'self' is not available outside an operation")]
    NoSelf,
    #[error("'selected' is not available outside a where clause")]
    NoSelected,
    #[error("no parameter named '{name}'")]
    UnknownParameter { name: String },
    #[error("'{operator} {set}' used outside a for each over '{set}'")]
    NoLoop { operator: &'static str, set: String },
    #[error("cannot assign to '{target}'")]
    NotAssignable { target: String },
    #[error("expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: &'static str },
    #[error("operator '{operator}' is not defined for {left} and {right}")]
    InvalidOperands {
        operator: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("operator '{operator}' is not defined for {operand}")]
    InvalidOperand {
        operator: &'static str,
        operand: &'static str,
    },
    #[error("integer overflow in '{operator}'")]
    Overflow { operator: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("array index must be non-negative, got {index}")]
    NegativeIndex { index: i64 },
    #[error("array index {index} is out of range")]
    IndexOutOfRange { index: usize },
}

impl RuntimeError {
    /// Whether the error can be logged and skipped at the failing node.
    /// Symbol table imbalance means the evaluator itself is broken.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RuntimeError::Symbol(_))
    }
}
