use crate::domain::{Attribute, InstanceRef};
use crate::value::Value;

use super::error::RuntimeError;
use super::runtime::Runtime;

/// A storage location an expression denotes.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Place {
    /// Computed value with no storage behind it.
    Value(Value),
    Variable(String),
    Field {
        instance: InstanceRef,
        name: String,
    },
    Index {
        base: Box<Place>,
        index: usize,
    },
    /// `self.<attr>` inside the body computing `<attr>`.
    Derived,
}

impl Place {
    pub(super) fn get(&self, runtime: &mut Runtime<'_>) -> Result<Value, RuntimeError> {
        match self {
            Place::Value(value) => Ok(value.clone()),
            Place::Variable(name) => runtime.read_variable(name),
            Place::Field { instance, name } => match runtime.domain.read_attribute(instance, name)? {
                Attribute::Stored(value) => Ok(value),
                Attribute::Derived(action) => runtime.call_derived(&action, instance, name),
            },
            Place::Index { base, index } => {
                // Reading past the end of a local array grows it.
                if let Place::Variable(name) = base.as_ref() {
                    let slot = runtime
                        .symbols
                        .lookup_or_insert(name, Value::Array(Vec::new()))?;
                    let values = array_mut(slot)?;
                    extend_to(values, *index)?;
                    return Ok(values[*index].clone());
                }
                match base.get(runtime)? {
                    Value::Array(values) => Ok(values.get(*index).cloned().unwrap_or(Value::Null)),
                    Value::Null => Ok(Value::Null),
                    other => Err(RuntimeError::TypeMismatch {
                        expected: "array",
                        got: other.type_name(),
                    }),
                }
            }
            Place::Derived => Ok(runtime
                .frame
                .derived
                .as_ref()
                .map(|cell| cell.result.clone())
                .unwrap_or(Value::Null)),
        }
    }

    pub(super) fn set(&self, runtime: &mut Runtime<'_>, value: Value) -> Result<(), RuntimeError> {
        match self {
            Place::Value(current) => Err(RuntimeError::NotAssignable {
                target: current.to_string(),
            }),
            Place::Variable(name) => Ok(runtime.symbols.install(name, value)?),
            Place::Field { instance, name } => {
                Ok(runtime.domain.write_attribute(instance, name, value)?)
            }
            Place::Index { base, index } => {
                if let Place::Variable(name) = base.as_ref() {
                    let slot = runtime
                        .symbols
                        .lookup_or_insert(name, Value::Array(Vec::new()))?;
                    store(array_mut(slot)?, *index, value)?;
                    return Ok(());
                }
                let mut container = base.get(runtime)?;
                store(array_mut(&mut container)?, *index, value)?;
                base.set(runtime, container)
            }
            Place::Derived => {
                if let Some(cell) = runtime.frame.derived.as_mut() {
                    cell.result = value;
                }
                Ok(())
            }
        }
    }
}

/// Null slots become empty arrays on first indexed use.
fn array_mut(slot: &mut Value) -> Result<&mut Vec<Value>, RuntimeError> {
    if *slot == Value::Null {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(values) => Ok(values),
        other => Err(RuntimeError::TypeMismatch {
            expected: "array",
            got: other.type_name(),
        }),
    }
}

/// Longest array a local variable may grow to.
const MAX_ARRAY_LEN: usize = 1 << 24;

fn extend_to(values: &mut Vec<Value>, index: usize) -> Result<(), RuntimeError> {
    if values.len() > index {
        return Ok(());
    }
    let out_of_range = || RuntimeError::IndexOutOfRange { index };
    let len = index
        .checked_add(1)
        .filter(|len| *len <= MAX_ARRAY_LEN)
        .ok_or_else(out_of_range)?;
    values
        .try_reserve(len - values.len())
        .map_err(|_| out_of_range())?;
    values.resize(len, Value::Null);
    Ok(())
}

fn store(values: &mut Vec<Value>, index: usize, value: Value) -> Result<(), RuntimeError> {
    extend_to(values, index)?;
    values[index] = value;
    Ok(())
}
