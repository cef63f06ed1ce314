use thiserror::Error;

/// Failures reported by a [`Domain`](super::Domain).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown class '{class}'")]
    UnknownClass { class: String },
    #[error("class '{class}' has no attribute '{attribute}'")]
    UnknownAttribute { class: String, attribute: String },
    #[error("attribute '{class}.{attribute}' is derived and cannot be written")]
    ReadOnlyAttribute { class: String, attribute: String },
    #[error("attribute '{class}.{attribute}' expects {expected}, got {got}")]
    AttributeType {
        class: String,
        attribute: String,
        expected: String,
        got: String,
    },
    #[error("no relationship {relationship}{} from {from} to {to}", phrase_suffix(.phrase))]
    UnknownRelationship {
        from: String,
        to: String,
        relationship: String,
        phrase: Option<String>,
    },
    #[error("relationship {relationship} between {from} and {to} needs a phrase")]
    AmbiguousRelationship {
        from: String,
        to: String,
        relationship: String,
    },
    #[error("{from} and {to} are already related across {relationship}")]
    AlreadyRelated {
        from: String,
        to: String,
        relationship: String,
    },
    #[error("{from} and {to} are not related across {relationship}")]
    NotRelated {
        from: String,
        to: String,
        relationship: String,
    },
    #[error("instance {instance} is not tracked by the domain")]
    NotTracked { instance: String },
    #[error("unknown symbol '{name}'")]
    UnknownSymbol { name: String },
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error("'{owner}' has no operation '{name}'")]
    UnknownOperation { owner: String, name: String },
    #[error("unknown enumerator '{enumeration}::{name}'")]
    UnknownEnumerator { enumeration: String, name: String },
    #[error("missing argument '{name}'")]
    MissingArgument { name: String },
    #[error("invalid model: {message}")]
    InvalidModel { message: String },
}

fn phrase_suffix(phrase: &Option<String>) -> String {
    phrase
        .as_deref()
        .map(|phrase| format!(".'{phrase}'"))
        .unwrap_or_default()
}
