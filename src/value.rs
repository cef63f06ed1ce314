use std::fmt;

use crate::domain::{Event, InstanceRef, Symbol};

/// A value produced by evaluating OAL.
///
/// Instance handles and sets are produced by the [`Domain`](crate::domain::Domain)
/// and only ever copied around by the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Enumerator { enumeration: String, name: String },
    Instance(InstanceRef),
    /// Ordered, duplicate free.
    Set(Vec<InstanceRef>),
    Array(Vec<Value>),
    Event(Event),
    Symbol(Symbol),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(value) => *value,
            Value::Integer(value) => *value != 0,
            Value::Real(value) => *value != 0.0,
            Value::String(value) => !value.is_empty(),
            Value::Set(instances) => !instances.is_empty(),
            Value::Array(values) => !values.is_empty(),
            Value::Enumerator { .. } | Value::Instance(_) | Value::Event(_) | Value::Symbol(_) => {
                true
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Enumerator { .. } => "enumerator",
            Value::Instance(_) => "instance",
            Value::Set(_) => "instance set",
            Value::Array(_) => "array",
            Value::Event(_) => "event",
            Value::Symbol(_) => "symbol",
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers widen to reals; nothing else is numeric.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// Instances held by a handle, in order. `Null` holds none.
    pub fn instances(&self) -> Option<Vec<InstanceRef>> {
        match self {
            Value::Null => Some(Vec::new()),
            Value::Instance(instance) => Some(vec![instance.clone()]),
            Value::Set(instances) => Some(instances.clone()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<InstanceRef> for Value {
    fn from(value: InstanceRef) -> Self {
        Value::Instance(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Real(value) => write!(f, "{value:?}"),
            Value::String(value) => f.write_str(value),
            Value::Enumerator { enumeration, name } => write!(f, "{enumeration}::{name}"),
            Value::Instance(instance) => write!(f, "{instance}"),
            Value::Set(instances) => {
                let rendered = instances
                    .iter()
                    .map(InstanceRef::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{rendered}}}")
            }
            Value::Array(values) => {
                let rendered = values
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{rendered}]")
            }
            Value::Event(event) => write!(f, "{event}"),
            Value::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}
