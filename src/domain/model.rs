//! YAML description of a component: classes, associations and the OAL
//! bodies attached to them.
//!
//! ```yaml
//! component: Shop
//! enumerations:
//!   Color: [Red, Green]
//! classes:
//!   - name: Order
//!     attributes:
//!       - { name: Id, type: unique_id }
//!       - { name: total, type: integer }
//!     derived:
//!       - name: doubled
//!         body: self.doubled = self.total * 2;
//! associations:
//!   - id: R1
//!     ends:
//!       - { class: Order }
//!       - { class: Line, many: true }
//! functions:
//!   - name: main
//!     body: return 1;
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Boolean,
    Integer,
    Real,
    String,
    UniqueId,
    Instance,
}

impl AttributeType {
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::Boolean => "boolean",
            AttributeType::Integer => "integer",
            AttributeType::Real => "real",
            AttributeType::String => "string",
            AttributeType::UniqueId => "unique_id",
            AttributeType::Instance => "instance",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeModel {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: AttributeType,
}

/// A named OAL body: function, operation, bridge or derived attribute.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionModel {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassModel {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeModel>,
    #[serde(default)]
    pub derived: Vec<ActionModel>,
    /// Instance-based operations, invoked as `inst.name(..)`.
    #[serde(default)]
    pub operations: Vec<ActionModel>,
    /// Class-based operations, invoked as `Class::name(..)`.
    #[serde(default)]
    pub class_operations: Vec<ActionModel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndModel {
    pub class: String,
    #[serde(default)]
    pub phrase: Option<String>,
    #[serde(default)]
    pub many: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationModel {
    pub id: String,
    pub ends: [EndModel; 2],
    /// Associative (link) class formalizing the association.
    #[serde(default)]
    pub link: Option<String>,
}

/// External entity or port exposing operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityModel {
    pub name: String,
    #[serde(default)]
    pub operations: Vec<ActionModel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Model {
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub enumerations: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub classes: Vec<ClassModel>,
    #[serde(default)]
    pub associations: Vec<AssociationModel>,
    #[serde(default)]
    pub functions: Vec<ActionModel>,
    #[serde(default)]
    pub entities: Vec<EntityModel>,
    #[serde(default)]
    pub ports: Vec<EntityModel>,
}

impl Model {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Parsing model YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Loading model {}", path.display()))
    }
}
