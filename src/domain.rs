//! The object model OAL runs against.
//!
//! The interpreter only talks to the model through the [`Domain`] trait;
//! [`MemoryDomain`] is a complete in-memory implementation loaded from YAML
//! [`model`] files.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Body;
use crate::value::Value;

pub mod error;
pub mod memory;
pub mod model;

pub use error::DomainError;
pub use memory::MemoryDomain;

/// Named arguments of one call, keyed by parameter name.
pub type Arguments = BTreeMap<String, Value>;

/// Opaque handle to one instance owned by a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceRef {
    class: String,
    id: u64,
}

impl InstanceRef {
    /// Only domain implementations should mint handles.
    pub fn new(class: impl Into<String>, id: u64) -> Self {
        Self {
            class: class.into(),
            id,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.id)
    }
}

/// Global name known to the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Class(String),
    Function(String),
    Bridge(String),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Class(name) => write!(f, "<class {name}>"),
            Symbol::Function(name) => write!(f, "<function {name}>"),
            Symbol::Bridge(name) => write!(f, "<external entity {name}>"),
        }
    }
}

pub type NativeFn =
    dyn Fn(&mut dyn Domain, Option<&InstanceRef>, &Arguments) -> Result<Value, DomainError>;

/// Something that can be invoked: an OAL body or a Rust closure.
#[derive(Clone)]
pub enum Action {
    Oal { label: String, body: Rc<Body> },
    Native(Rc<NativeFn>),
}

impl Action {
    pub fn native<F>(function: F) -> Self
    where
        F: Fn(&mut dyn Domain, Option<&InstanceRef>, &Arguments) -> Result<Value, DomainError>
            + 'static,
    {
        Action::Native(Rc::new(function))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Oal { label, .. } => f.debug_struct("Oal").field("label", label).finish(),
            Action::Native(_) => f.write_str("Native"),
        }
    }
}

/// Result of reading an attribute: a stored value, or the action that
/// computes a derived one.
#[derive(Debug, Clone)]
pub enum Attribute {
    Stored(Value),
    Derived(Action),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventRecipient {
    Class(String),
    Creator(String),
    Instance(InstanceRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub label: String,
    pub meaning: Option<String>,
    pub arguments: Arguments,
    pub recipient: EventRecipient,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<event {}", self.label)?;
        if let Some(meaning) = &self.meaning {
            write!(f, ":{meaning}")?;
        }
        match &self.recipient {
            EventRecipient::Class(class) => write!(f, " to {class} class>"),
            EventRecipient::Creator(class) => write!(f, " to {class} creator>"),
            EventRecipient::Instance(instance) => write!(f, " to {instance}>"),
        }
    }
}

/// Contract between the interpreter and the object model.
///
/// Selections must come back in a stable order so that repeated identical
/// queries iterate identically.
pub trait Domain {
    fn new_instance(&mut self, class: &str) -> Result<InstanceRef, DomainError>;

    fn delete_instance(&mut self, instance: &InstanceRef) -> Result<(), DomainError>;

    fn select_many(&self, class: &str) -> Result<Vec<InstanceRef>, DomainError>;

    fn select_one(&self, class: &str) -> Result<Option<InstanceRef>, DomainError> {
        Ok(self.select_many(class)?.into_iter().next())
    }

    /// One navigation step from a single instance.
    fn navigate(
        &self,
        from: &InstanceRef,
        class: &str,
        relationship: &str,
        phrase: Option<&str>,
    ) -> Result<Vec<InstanceRef>, DomainError>;

    fn relate(
        &mut self,
        from: &InstanceRef,
        to: &InstanceRef,
        relationship: &str,
        phrase: Option<&str>,
    ) -> Result<(), DomainError>;

    fn unrelate(
        &mut self,
        from: &InstanceRef,
        to: &InstanceRef,
        relationship: &str,
        phrase: Option<&str>,
    ) -> Result<(), DomainError>;

    fn read_attribute(&self, instance: &InstanceRef, name: &str) -> Result<Attribute, DomainError>;

    fn write_attribute(
        &mut self,
        instance: &InstanceRef,
        name: &str,
        value: Value,
    ) -> Result<(), DomainError>;

    fn find_symbol(&self, name: &str) -> Result<Symbol, DomainError>;

    fn find_function(&self, name: &str) -> Result<Action, DomainError>;

    fn find_class_operation(&self, class: &str, name: &str) -> Result<Action, DomainError>;

    fn find_instance_operation(
        &self,
        instance: &InstanceRef,
        name: &str,
    ) -> Result<Action, DomainError>;

    fn find_bridge_operation(&self, entity: &str, name: &str) -> Result<Action, DomainError>;

    fn find_port_operation(&self, port: &str, name: &str) -> Result<Action, DomainError>;

    fn enumerator(&self, enumeration: &str, name: &str) -> Result<Value, DomainError>;

    fn generate_event(&mut self, event: Event) -> Result<(), DomainError>;

    fn cardinality(&self, value: &Value) -> i64 {
        match value {
            Value::Null => 0,
            Value::Set(instances) => instances.len() as i64,
            Value::Array(values) => values.len() as i64,
            _ => 1,
        }
    }
}
