//! Lexically scoped variable storage.
//!
//! A [`SymbolTable`] is a stack of [`Scope`]s, one per body activation, and
//! each scope is a stack of blocks, one per compound statement. Enter and
//! leave calls must strictly nest.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::{Domain, DomainError};
use crate::value::Value;

pub type Block = HashMap<String, Value>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("no scope to leave")]
    NoScope,
    #[error("no block to leave in the current scope")]
    NoBlock,
}

#[derive(Debug, Default)]
pub struct Scope {
    blocks: Vec<Block>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pops the current scope and returns all of its bindings in one map.
    pub fn leave_scope(&mut self) -> Result<Block, SymbolError> {
        let scope = self.scopes.pop().ok_or(SymbolError::NoScope)?;
        Ok(scope.blocks.into_iter().flatten().collect())
    }

    pub fn enter_block(&mut self) -> Result<(), SymbolError> {
        self.current_mut()?.blocks.push(Block::new());
        Ok(())
    }

    pub fn leave_block(&mut self) -> Result<Block, SymbolError> {
        self.current_mut()?.blocks.pop().ok_or(SymbolError::NoBlock)
    }

    /// Overwrites the nearest existing binding of `name` in the current scope,
    /// or creates one in the innermost block. Never shadows.
    pub fn install(&mut self, name: &str, value: Value) -> Result<(), SymbolError> {
        let scope = self.current_mut()?;
        if let Some(slot) = scope
            .blocks
            .iter_mut()
            .rev()
            .find_map(|block| block.get_mut(name))
        {
            *slot = value;
            return Ok(());
        }
        scope
            .blocks
            .last_mut()
            .ok_or(SymbolError::NoBlock)?
            .insert(name.to_string(), value);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .last()?
            .blocks
            .iter()
            .rev()
            .find_map(|block| block.get(name))
    }

    /// Returns the binding of `name`, installing `default` in the innermost
    /// block first if there is none.
    pub fn lookup_or_insert(&mut self, name: &str, default: Value) -> Result<&mut Value, SymbolError> {
        let scope = self.current_mut()?;
        let block = match scope
            .blocks
            .iter()
            .rposition(|block| block.contains_key(name))
        {
            Some(index) => &mut scope.blocks[index],
            None => scope.blocks.last_mut().ok_or(SymbolError::NoBlock)?,
        };
        Ok(block.entry(name.to_string()).or_insert(default))
    }

    /// Local binding of `name`, falling back to the domain's global names.
    pub fn resolve(&self, name: &str, domain: &dyn Domain) -> Result<Value, DomainError> {
        match self.lookup(name) {
            Some(value) => Ok(value.clone()),
            None => domain.find_symbol(name).map(Value::Symbol),
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Number of blocks open in the current scope.
    pub fn block_depth(&self) -> usize {
        self.scopes.last().map_or(0, |scope| scope.blocks.len())
    }

    fn current_mut(&mut self) -> Result<&mut Scope, SymbolError> {
        self.scopes.last_mut().ok_or(SymbolError::NoScope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MemoryDomain, Symbol};

    fn table_with_block() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.enter_block().expect("enter block");
        table
    }

    #[test]
    fn install_overwrites_outer_binding_instead_of_shadowing() {
        let mut table = table_with_block();
        table.install("x", Value::Integer(1)).expect("install");
        table.enter_block().expect("enter block");
        table.install("x", Value::Integer(2)).expect("install");
        table.install("y", Value::Integer(3)).expect("install");
        let inner = table.leave_block().expect("leave block");

        assert_eq!(inner.len(), 1);
        assert_eq!(inner.get("y"), Some(&Value::Integer(3)));
        assert_eq!(table.lookup("x"), Some(&Value::Integer(2)));
        assert_eq!(table.lookup("y"), None);
    }

    #[test]
    fn scopes_hide_caller_bindings() {
        let mut table = table_with_block();
        table.install("x", Value::Integer(1)).expect("install");
        table.enter_scope();
        assert_eq!(table.lookup("x"), None);
        table.leave_scope().expect("leave scope");
        assert_eq!(table.lookup("x"), Some(&Value::Integer(1)));
    }

    #[test]
    fn leave_scope_flattens_blocks() {
        let mut table = table_with_block();
        table.install("a", Value::Integer(1)).expect("install");
        table.enter_block().expect("enter block");
        table.install("b", Value::Integer(2)).expect("install");

        let bindings = table.leave_scope().expect("leave scope");
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.get("b"), Some(&Value::Integer(2)));
        assert_eq!(table.scope_depth(), 0);
    }

    #[test]
    fn lookup_or_insert_installs_default_once() {
        let mut table = table_with_block();
        table.enter_block().expect("enter block");
        *table
            .lookup_or_insert("items", Value::Array(Vec::new()))
            .expect("lookup") = Value::Array(vec![Value::Integer(7)]);
        let value = table
            .lookup_or_insert("items", Value::Array(Vec::new()))
            .expect("lookup");
        assert_eq!(value, &Value::Array(vec![Value::Integer(7)]));
    }

    #[test]
    fn unbalanced_calls_fail() {
        let mut table = SymbolTable::new();
        assert_eq!(table.leave_scope(), Err(SymbolError::NoScope));
        assert_eq!(table.leave_block(), Err(SymbolError::NoScope));
        table.enter_scope();
        assert_eq!(table.leave_block(), Err(SymbolError::NoBlock));
        assert_eq!(table.install("x", Value::Null), Err(SymbolError::NoBlock));
    }

    #[test]
    fn resolve_falls_back_to_domain_symbols() {
        let mut domain = MemoryDomain::new();
        domain.define_class("Dog", &[]).expect("define class");
        let table = table_with_block();

        assert_eq!(
            table.resolve("Dog", &domain),
            Ok(Value::Symbol(Symbol::Class("Dog".to_string())))
        );
        assert!(matches!(
            table.resolve("Cat", &domain),
            Err(DomainError::UnknownSymbol { .. })
        ));
    }
}
