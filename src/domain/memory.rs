use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use crate::parser::{self, ParseError};
use crate::value::Value;

use super::model::{ActionModel, AttributeType, EndModel, Model};
use super::{
    Action, Arguments, Attribute, Domain, DomainError, Event, EventRecipient, InstanceRef, Symbol,
};

/// An OAL body from a model that failed to parse and was left out.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidBody {
    pub label: String,
    pub error: ParseError,
}

#[derive(Debug, Default)]
struct Class {
    attributes: Vec<(String, AttributeType)>,
    derived: HashMap<String, Action>,
    operations: HashMap<String, Action>,
    class_operations: HashMap<String, Action>,
}

#[derive(Debug)]
struct Instance {
    class: String,
    attributes: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
struct End {
    class: String,
    phrase: Option<String>,
    many: bool,
}

/// One binary association between two classes.
#[derive(Debug)]
struct Leg {
    id: String,
    ends: [End; 2],
}

/// An association formalized by a link class; navigated across its two legs.
#[derive(Debug)]
struct Through {
    id: String,
    classes: [String; 2],
    phrases: [Option<String>; 2],
    link: String,
}

#[derive(Debug)]
struct Link {
    leg: usize,
    instances: [InstanceRef; 2],
}

/// One way of reading a leg: `from` and `to` index its ends.
#[derive(Debug, Clone, Copy)]
struct Orientation {
    leg: usize,
    from: usize,
    to: usize,
}

/// In-memory [`Domain`] with creation-ordered instances.
#[derive(Debug)]
pub struct MemoryDomain {
    classes: BTreeMap<String, Class>,
    legs: Vec<Leg>,
    throughs: Vec<Through>,
    links: Vec<Link>,
    instances: BTreeMap<u64, Instance>,
    next_id: u64,
    functions: HashMap<String, Action>,
    entities: HashMap<String, HashMap<String, Action>>,
    ports: HashMap<String, HashMap<String, Action>>,
    enumerations: HashMap<String, Vec<String>>,
    events: Vec<Event>,
}

impl Default for MemoryDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDomain {
    /// An empty domain with the built-in `LOG` external entity.
    pub fn new() -> Self {
        let mut domain = Self {
            classes: BTreeMap::new(),
            legs: Vec::new(),
            throughs: Vec::new(),
            links: Vec::new(),
            instances: BTreeMap::new(),
            next_id: 1,
            functions: HashMap::new(),
            entities: HashMap::new(),
            ports: HashMap::new(),
            enumerations: HashMap::new(),
            events: Vec::new(),
        };
        domain.install_log_bridge();
        domain
    }

    pub fn from_model(model: &Model) -> Result<(Self, Vec<InvalidBody>), DomainError> {
        let mut domain = Self::new();
        let invalid = domain.load_model(model)?;
        Ok((domain, invalid))
    }

    /// Adds everything `model` declares. Bodies that fail to parse are
    /// skipped and returned; structural problems abort the load.
    pub fn load_model(&mut self, model: &Model) -> Result<Vec<InvalidBody>, DomainError> {
        let mut invalid = Vec::new();

        for (name, enumerators) in &model.enumerations {
            self.enumerations.insert(name.clone(), enumerators.clone());
        }

        for class in &model.classes {
            let attributes = class
                .attributes
                .iter()
                .map(|attribute| (attribute.name.as_str(), attribute.ty))
                .collect::<Vec<_>>();
            self.define_class(&class.name, &attributes)?;
        }

        for class in &model.classes {
            let mut derived = HashMap::new();
            let mut operations = HashMap::new();
            let mut class_operations = HashMap::new();
            compile_all(
                &class.derived,
                |name| format!("{}.{name}", class.name),
                &mut derived,
                &mut invalid,
            );
            compile_all(
                &class.operations,
                |name| format!("{}.{name}", class.name),
                &mut operations,
                &mut invalid,
            );
            compile_all(
                &class.class_operations,
                |name| format!("{}::{name}", class.name),
                &mut class_operations,
                &mut invalid,
            );
            let entry = self.class_mut(&class.name)?;
            entry.derived.extend(derived);
            entry.operations.extend(operations);
            entry.class_operations.extend(class_operations);
        }

        for association in &model.associations {
            let [first, second] = &association.ends;
            match &association.link {
                Some(link) => self.define_linked_association(&association.id, first, second, link)?,
                None => self.define_association(&association.id, first, second)?,
            }
        }

        compile_all(
            &model.functions,
            |name| name.to_string(),
            &mut self.functions,
            &mut invalid,
        );
        for entity in &model.entities {
            let operations = self.entities.entry(entity.name.clone()).or_default();
            compile_all(
                &entity.operations,
                |name| format!("{}::{name}", entity.name),
                operations,
                &mut invalid,
            );
        }
        for port in &model.ports {
            let operations = self.ports.entry(port.name.clone()).or_default();
            compile_all(
                &port.operations,
                |name| format!("{}::{name}", port.name),
                operations,
                &mut invalid,
            );
        }

        for body in &invalid {
            warn!(label = %body.label, error = %body.error, "skipping unparsable body");
        }
        Ok(invalid)
    }

    pub fn define_class(
        &mut self,
        name: &str,
        attributes: &[(&str, AttributeType)],
    ) -> Result<(), DomainError> {
        if self.classes.contains_key(name) {
            return Err(invalid_model(format!("class '{name}' is defined twice")));
        }
        let class = Class {
            attributes: attributes
                .iter()
                .map(|(name, ty)| (name.to_string(), *ty))
                .collect(),
            ..Class::default()
        };
        self.classes.insert(name.to_string(), class);
        Ok(())
    }

    /// Reflexive associations need distinct phrases on both ends.
    pub fn define_association(
        &mut self,
        id: &str,
        first: &EndModel,
        second: &EndModel,
    ) -> Result<(), DomainError> {
        self.class(&first.class)?;
        self.class(&second.class)?;
        if first.class == second.class
            && (first.phrase.is_none() || second.phrase.is_none() || first.phrase == second.phrase)
        {
            return Err(invalid_model(format!(
                "reflexive association {id} needs a distinct phrase on each end"
            )));
        }
        self.legs.push(Leg {
            id: id.to_string(),
            ends: [end(first), end(second)],
        });
        Ok(())
    }

    /// Association formalized by `link`: each end class gets its own leg to
    /// the link class, both under `id`.
    pub fn define_linked_association(
        &mut self,
        id: &str,
        first: &EndModel,
        second: &EndModel,
        link: &str,
    ) -> Result<(), DomainError> {
        self.class(&first.class)?;
        self.class(&second.class)?;
        self.class(link)?;
        if first.class == second.class {
            return Err(invalid_model(format!(
                "reflexive association {id} cannot have a link class"
            )));
        }
        for (near, far) in [(first, second), (second, first)] {
            self.legs.push(Leg {
                id: id.to_string(),
                ends: [
                    End {
                        many: false,
                        ..end(near)
                    },
                    End {
                        class: link.to_string(),
                        phrase: far.phrase.clone(),
                        many: far.many,
                    },
                ],
            });
        }
        self.throughs.push(Through {
            id: id.to_string(),
            classes: [first.class.clone(), second.class.clone()],
            phrases: [first.phrase.clone(), second.phrase.clone()],
            link: link.to_string(),
        });
        Ok(())
    }

    pub fn define_function(&mut self, name: &str, action: Action) {
        self.functions.insert(name.to_string(), action);
    }

    pub fn define_bridge(&mut self, entity: &str, name: &str, action: Action) {
        self.entities
            .entry(entity.to_string())
            .or_default()
            .insert(name.to_string(), action);
    }

    pub fn define_port_operation(&mut self, port: &str, name: &str, action: Action) {
        self.ports
            .entry(port.to_string())
            .or_default()
            .insert(name.to_string(), action);
    }

    pub fn define_enumeration(&mut self, name: &str, enumerators: &[&str]) {
        self.enumerations.insert(
            name.to_string(),
            enumerators.iter().map(|name| name.to_string()).collect(),
        );
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn install_log_bridge(&mut self) {
        let message = |arguments: &Arguments| -> Result<String, DomainError> {
            arguments
                .get("message")
                .map(Value::to_string)
                .ok_or_else(|| DomainError::MissingArgument {
                    name: "message".to_string(),
                })
        };
        self.define_bridge(
            "LOG",
            "LogInfo",
            Action::native(move |_, _, arguments| {
                info!(target: "oal::log", "{}", message(arguments)?);
                Ok(Value::Null)
            }),
        );
        self.define_bridge(
            "LOG",
            "LogSuccess",
            Action::native(move |_, _, arguments| {
                info!(target: "oal::log", "SUCCESS: {}", message(arguments)?);
                Ok(Value::Null)
            }),
        );
        self.define_bridge(
            "LOG",
            "LogFailure",
            Action::native(move |_, _, arguments| {
                error!(target: "oal::log", "FAILURE: {}", message(arguments)?);
                Ok(Value::Null)
            }),
        );
        self.define_bridge(
            "LOG",
            "LogInteger",
            Action::native(move |_, _, arguments| {
                info!(target: "oal::log", "{}", message(arguments)?);
                Ok(Value::Null)
            }),
        );
        self.define_bridge(
            "LOG",
            "LogReal",
            Action::native(move |_, _, arguments| {
                let real = arguments.get("r").cloned().unwrap_or(Value::Null);
                info!(target: "oal::log", "{} {real}", message(arguments)?);
                Ok(Value::Null)
            }),
        );
    }

    fn class(&self, name: &str) -> Result<&Class, DomainError> {
        self.classes
            .get(name)
            .ok_or_else(|| DomainError::UnknownClass {
                class: name.to_string(),
            })
    }

    fn class_mut(&mut self, name: &str) -> Result<&mut Class, DomainError> {
        self.classes
            .get_mut(name)
            .ok_or_else(|| DomainError::UnknownClass {
                class: name.to_string(),
            })
    }

    fn instance(&self, instance: &InstanceRef) -> Result<&Instance, DomainError> {
        self.instances
            .get(&instance.id())
            .filter(|stored| stored.class == instance.class())
            .ok_or_else(|| not_tracked(instance))
    }

    fn orientations(&self, from: &str, to: &str, id: &str) -> Vec<Orientation> {
        let mut found = Vec::new();
        for (index, leg) in self.legs.iter().enumerate() {
            if leg.id != id {
                continue;
            }
            for (a, b) in [(0, 1), (1, 0)] {
                if leg.ends[a].class == from && leg.ends[b].class == to {
                    found.push(Orientation {
                        leg: index,
                        from: a,
                        to: b,
                    });
                }
            }
        }
        found
    }

    /// Picks the single leg reading joining `from` to `to`. A phrase must
    /// name the `to` end of the reading.
    fn orientation(
        &self,
        from: &str,
        to: &str,
        id: &str,
        phrase: Option<&str>,
    ) -> Result<Orientation, DomainError> {
        let mut found = self.orientations(from, to, id);
        if let Some(phrase) = phrase {
            found.retain(|orientation| {
                self.legs[orientation.leg].ends[orientation.to].phrase.as_deref() == Some(phrase)
            });
        }
        match found.as_slice() {
            [orientation] => Ok(*orientation),
            [] => Err(DomainError::UnknownRelationship {
                from: from.to_string(),
                to: to.to_string(),
                relationship: id.to_string(),
                phrase: phrase.map(str::to_string),
            }),
            _ => Err(DomainError::AmbiguousRelationship {
                from: from.to_string(),
                to: to.to_string(),
                relationship: id.to_string(),
            }),
        }
    }

    fn linked(&self, orientation: Orientation, from: &InstanceRef) -> Vec<InstanceRef> {
        self.links
            .iter()
            .filter(|link| link.leg == orientation.leg && &link.instances[orientation.from] == from)
            .map(|link| link.instances[orientation.to].clone())
            .collect()
    }

    fn link_position(
        &self,
        orientation: Orientation,
        from: &InstanceRef,
        to: &InstanceRef,
    ) -> Option<usize> {
        self.links.iter().position(|link| {
            link.leg == orientation.leg
                && &link.instances[orientation.from] == from
                && &link.instances[orientation.to] == to
        })
    }

    fn through(&self, from: &str, to: &str, id: &str, phrase: Option<&str>) -> Option<&Through> {
        self.throughs.iter().find(|through| {
            let far = if through.classes == [from, to] {
                1
            } else if through.classes == [to, from] {
                0
            } else {
                return false;
            };
            through.id == id
                && phrase.is_none_or(|phrase| through.phrases[far].as_deref() == Some(phrase))
        })
    }

    fn navigate_through(
        &self,
        through: &Through,
        from: &InstanceRef,
        class: &str,
    ) -> Result<Vec<InstanceRef>, DomainError> {
        let to_link = self.orientation(from.class(), &through.link, &through.id, None)?;
        let from_link = self.orientation(&through.link, class, &through.id, None)?;
        let mut seen = HashSet::new();
        let mut reached = Vec::new();
        for link in self.linked(to_link, from) {
            for instance in self.linked(from_link, &link) {
                if seen.insert(instance.clone()) {
                    reached.push(instance);
                }
            }
        }
        Ok(reached)
    }
}

impl Domain for MemoryDomain {
    fn new_instance(&mut self, class: &str) -> Result<InstanceRef, DomainError> {
        let id = self.next_id;
        let attributes = self
            .class(class)?
            .attributes
            .iter()
            .map(|(name, ty)| (name.clone(), default_value(*ty, id)))
            .collect();
        self.next_id += 1;
        self.instances.insert(
            id,
            Instance {
                class: class.to_string(),
                attributes,
            },
        );
        debug!(class, id, "created instance");
        Ok(InstanceRef::new(class, id))
    }

    fn delete_instance(&mut self, instance: &InstanceRef) -> Result<(), DomainError> {
        self.instance(instance)?;
        self.instances.remove(&instance.id());
        self.links
            .retain(|link| !link.instances.iter().any(|linked| linked == instance));
        debug!(%instance, "deleted instance");
        Ok(())
    }

    fn select_many(&self, class: &str) -> Result<Vec<InstanceRef>, DomainError> {
        self.class(class)?;
        Ok(self
            .instances
            .iter()
            .filter(|(_, instance)| instance.class == class)
            .map(|(id, _)| InstanceRef::new(class, *id))
            .collect())
    }

    fn navigate(
        &self,
        from: &InstanceRef,
        class: &str,
        relationship: &str,
        phrase: Option<&str>,
    ) -> Result<Vec<InstanceRef>, DomainError> {
        self.instance(from)?;
        self.class(class)?;
        match self.orientation(from.class(), class, relationship, phrase) {
            Ok(orientation) => Ok(self.linked(orientation, from)),
            Err(error @ DomainError::UnknownRelationship { .. }) => {
                match self.through(from.class(), class, relationship, phrase) {
                    Some(through) => self.navigate_through(through, from, class),
                    None => Err(error),
                }
            }
            Err(error) => Err(error),
        }
    }

    fn relate(
        &mut self,
        from: &InstanceRef,
        to: &InstanceRef,
        relationship: &str,
        phrase: Option<&str>,
    ) -> Result<(), DomainError> {
        self.instance(from)?;
        self.instance(to)?;
        let orientation = self.orientation(from.class(), to.class(), relationship, phrase)?;
        let leg = &self.legs[orientation.leg];
        let already = || DomainError::AlreadyRelated {
            from: from.to_string(),
            to: to.to_string(),
            relationship: relationship.to_string(),
        };
        if self.link_position(orientation, from, to).is_some() {
            return Err(already());
        }
        let to_filled = !leg.ends[orientation.to].many
            && self
                .links
                .iter()
                .any(|link| link.leg == orientation.leg && &link.instances[orientation.from] == from);
        let from_filled = !leg.ends[orientation.from].many
            && self
                .links
                .iter()
                .any(|link| link.leg == orientation.leg && &link.instances[orientation.to] == to);
        if to_filled || from_filled {
            return Err(already());
        }

        let instances = if orientation.from == 0 {
            [from.clone(), to.clone()]
        } else {
            [to.clone(), from.clone()]
        };
        self.links.push(Link {
            leg: orientation.leg,
            instances,
        });
        debug!(%from, %to, relationship, "related");
        Ok(())
    }

    fn unrelate(
        &mut self,
        from: &InstanceRef,
        to: &InstanceRef,
        relationship: &str,
        phrase: Option<&str>,
    ) -> Result<(), DomainError> {
        self.instance(from)?;
        self.instance(to)?;
        let orientation = self.orientation(from.class(), to.class(), relationship, phrase)?;
        let position = self
            .link_position(orientation, from, to)
            .ok_or_else(|| DomainError::NotRelated {
                from: from.to_string(),
                to: to.to_string(),
                relationship: relationship.to_string(),
            })?;
        self.links.remove(position);
        debug!(%from, %to, relationship, "unrelated");
        Ok(())
    }

    fn read_attribute(&self, instance: &InstanceRef, name: &str) -> Result<Attribute, DomainError> {
        let stored = self.instance(instance)?;
        let class = self.class(&stored.class)?;
        if let Some(action) = class.derived.get(name) {
            return Ok(Attribute::Derived(action.clone()));
        }
        stored
            .attributes
            .get(name)
            .cloned()
            .map(Attribute::Stored)
            .ok_or_else(|| DomainError::UnknownAttribute {
                class: stored.class.clone(),
                attribute: name.to_string(),
            })
    }

    fn write_attribute(
        &mut self,
        instance: &InstanceRef,
        name: &str,
        value: Value,
    ) -> Result<(), DomainError> {
        let class_name = self.instance(instance)?.class.clone();
        let class = self.class(&class_name)?;
        if class.derived.contains_key(name) {
            return Err(DomainError::ReadOnlyAttribute {
                class: class_name,
                attribute: name.to_string(),
            });
        }
        let ty = class
            .attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| DomainError::UnknownAttribute {
                class: class_name.clone(),
                attribute: name.to_string(),
            })?;
        let value = coerce(ty, value).map_err(|got| DomainError::AttributeType {
            class: class_name.clone(),
            attribute: name.to_string(),
            expected: ty.name().to_string(),
            got: got.to_string(),
        })?;
        if let Some(stored) = self.instances.get_mut(&instance.id()) {
            stored.attributes.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn find_symbol(&self, name: &str) -> Result<Symbol, DomainError> {
        if self.classes.contains_key(name) {
            Ok(Symbol::Class(name.to_string()))
        } else if self.functions.contains_key(name) {
            Ok(Symbol::Function(name.to_string()))
        } else if self.entities.contains_key(name) {
            Ok(Symbol::Bridge(name.to_string()))
        } else {
            Err(DomainError::UnknownSymbol {
                name: name.to_string(),
            })
        }
    }

    fn find_function(&self, name: &str) -> Result<Action, DomainError> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::UnknownFunction {
                name: name.to_string(),
            })
    }

    fn find_class_operation(&self, class: &str, name: &str) -> Result<Action, DomainError> {
        self.class(class)?
            .class_operations
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_operation(class, name))
    }

    fn find_instance_operation(
        &self,
        instance: &InstanceRef,
        name: &str,
    ) -> Result<Action, DomainError> {
        let class = &self.instance(instance)?.class;
        self.class(class)?
            .operations
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_operation(class, name))
    }

    fn find_bridge_operation(&self, entity: &str, name: &str) -> Result<Action, DomainError> {
        self.entities
            .get(entity)
            .and_then(|operations| operations.get(name))
            .cloned()
            .ok_or_else(|| unknown_operation(entity, name))
    }

    fn find_port_operation(&self, port: &str, name: &str) -> Result<Action, DomainError> {
        self.ports
            .get(port)
            .and_then(|operations| operations.get(name))
            .cloned()
            .ok_or_else(|| unknown_operation(port, name))
    }

    fn enumerator(&self, enumeration: &str, name: &str) -> Result<Value, DomainError> {
        let known = self
            .enumerations
            .get(enumeration)
            .is_some_and(|enumerators| enumerators.iter().any(|candidate| candidate == name));
        if !known {
            return Err(DomainError::UnknownEnumerator {
                enumeration: enumeration.to_string(),
                name: name.to_string(),
            });
        }
        Ok(Value::Enumerator {
            enumeration: enumeration.to_string(),
            name: name.to_string(),
        })
    }

    fn generate_event(&mut self, event: Event) -> Result<(), DomainError> {
        match &event.recipient {
            EventRecipient::Class(class) | EventRecipient::Creator(class) => {
                self.class(class)?;
            }
            EventRecipient::Instance(instance) => {
                self.instance(instance)?;
            }
        }
        debug!(%event, "queued event");
        self.events.push(event);
        Ok(())
    }
}

fn compile_all(
    actions: &[ActionModel],
    label: impl Fn(&str) -> String,
    into: &mut HashMap<String, Action>,
    invalid: &mut Vec<InvalidBody>,
) {
    for action in actions {
        let label = label(&action.name);
        match parser::parse(&action.body) {
            Ok(body) => {
                into.insert(
                    action.name.clone(),
                    Action::Oal {
                        label,
                        body: Rc::new(body),
                    },
                );
            }
            Err(error) => invalid.push(InvalidBody { label, error }),
        }
    }
}

fn end(model: &EndModel) -> End {
    End {
        class: model.class.clone(),
        phrase: model.phrase.clone(),
        many: model.many,
    }
}

fn default_value(ty: AttributeType, id: u64) -> Value {
    match ty {
        AttributeType::Boolean => Value::Boolean(false),
        AttributeType::Integer => Value::Integer(0),
        AttributeType::Real => Value::Real(0.0),
        AttributeType::String => Value::String(String::new()),
        AttributeType::UniqueId => Value::Integer(id as i64),
        AttributeType::Instance => Value::Null,
    }
}

/// Converts `value` for storage in an attribute of type `ty`, or returns the
/// offending value's type name.
fn coerce(ty: AttributeType, value: Value) -> Result<Value, &'static str> {
    match (ty, value) {
        (AttributeType::Boolean, value @ Value::Boolean(_))
        | (AttributeType::Integer | AttributeType::UniqueId, value @ Value::Integer(_))
        | (AttributeType::Real, value @ Value::Real(_))
        | (AttributeType::String, value @ Value::String(_))
        | (AttributeType::Instance, value @ (Value::Instance(_) | Value::Null)) => Ok(value),
        (AttributeType::Real, Value::Integer(value)) => Ok(Value::Real(value as f64)),
        (_, value) => Err(value.type_name()),
    }
}

fn invalid_model(message: String) -> DomainError {
    DomainError::InvalidModel { message }
}

fn not_tracked(instance: &InstanceRef) -> DomainError {
    DomainError::NotTracked {
        instance: instance.to_string(),
    }
}

fn unknown_operation(owner: &str, name: &str) -> DomainError {
    DomainError::UnknownOperation {
        owner: owner.to_string(),
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn end_model(class: &str, phrase: Option<&str>, many: bool) -> EndModel {
        EndModel {
            class: class.to_string(),
            phrase: phrase.map(str::to_string),
            many,
        }
    }

    fn two_classes() -> MemoryDomain {
        let mut domain = MemoryDomain::new();
        domain
            .define_class("A", &[("Id", AttributeType::UniqueId)])
            .expect("define A");
        domain
            .define_class("B", &[("Id", AttributeType::UniqueId)])
            .expect("define B");
        domain
    }

    #[test]
    fn selections_follow_creation_order() {
        let mut domain = two_classes();
        let first = domain.new_instance("A").expect("create");
        domain.new_instance("B").expect("create");
        let second = domain.new_instance("A").expect("create");

        assert_eq!(domain.select_many("A"), Ok(vec![first.clone(), second]));
        assert_eq!(domain.select_one("A"), Ok(Some(first)));
        assert!(matches!(
            domain.select_many("C"),
            Err(DomainError::UnknownClass { .. })
        ));
    }

    #[test]
    fn unique_ids_are_assigned_on_creation() {
        let mut domain = two_classes();
        let a = domain.new_instance("A").expect("create");
        match domain.read_attribute(&a, "Id").expect("read") {
            Attribute::Stored(value) => assert_eq!(value, Value::Integer(a.id() as i64)),
            Attribute::Derived(_) => panic!("Id is not derived"),
        }
    }

    #[test]
    fn one_to_one_rejects_second_link() {
        let mut domain = two_classes();
        domain
            .define_association("R1", &end_model("A", None, false), &end_model("B", None, false))
            .expect("define R1");
        let a = domain.new_instance("A").expect("create");
        let b1 = domain.new_instance("B").expect("create");
        let b2 = domain.new_instance("B").expect("create");

        domain.relate(&a, &b1, "R1", None).expect("relate");
        assert!(matches!(
            domain.relate(&b1, &a, "R1", None),
            Err(DomainError::AlreadyRelated { .. })
        ));
        assert!(matches!(
            domain.relate(&a, &b2, "R1", None),
            Err(DomainError::AlreadyRelated { .. })
        ));
        assert_eq!(domain.navigate(&b1, "A", "R1", None), Ok(vec![a.clone()]));

        domain.unrelate(&b1, &a, "R1", None).expect("unrelate");
        assert!(matches!(
            domain.unrelate(&a, &b1, "R1", None),
            Err(DomainError::NotRelated { .. })
        ));
        assert_eq!(domain.navigate(&a, "B", "R1", None), Ok(Vec::new()));
    }

    #[test]
    fn reflexive_association_is_read_by_phrase() {
        let mut domain = MemoryDomain::new();
        domain.define_class("Step", &[]).expect("define");
        domain
            .define_association(
                "R5",
                &end_model("Step", Some("precedes"), false),
                &end_model("Step", Some("follows"), false),
            )
            .expect("define R5");
        let first = domain.new_instance("Step").expect("create");
        let second = domain.new_instance("Step").expect("create");

        domain
            .relate(&first, &second, "R5", Some("precedes"))
            .expect("relate");
        assert_eq!(
            domain.navigate(&first, "Step", "R5", Some("precedes")),
            Ok(vec![second.clone()])
        );
        assert_eq!(
            domain.navigate(&second, "Step", "R5", Some("follows")),
            Ok(vec![first.clone()])
        );
        assert_eq!(
            domain.navigate(&first, "Step", "R5", Some("follows")),
            Ok(Vec::new())
        );
        assert!(matches!(
            domain.navigate(&first, "Step", "R5", None),
            Err(DomainError::AmbiguousRelationship { .. })
        ));
    }

    #[test]
    fn phrase_must_name_the_far_end() {
        let mut domain = two_classes();
        domain
            .define_association(
                "R1",
                &end_model("A", Some("owns"), false),
                &end_model("B", Some("is owned by"), false),
            )
            .expect("define R1");
        let a = domain.new_instance("A").expect("create");
        let b = domain.new_instance("B").expect("create");

        assert!(matches!(
            domain.relate(&a, &b, "R1", Some("owns")),
            Err(DomainError::UnknownRelationship { .. })
        ));
        domain
            .relate(&a, &b, "R1", Some("is owned by"))
            .expect("relate");
        assert_eq!(
            domain.navigate(&b, "A", "R1", Some("owns")),
            Ok(vec![a.clone()])
        );
        let wrong = domain.navigate(&a, "B", "R1", Some("no such phrase"));
        assert_eq!(
            wrong.map_err(|error| error.to_string()),
            Err("no relationship R1.'no such phrase' from A to B".to_string())
        );
        assert!(matches!(
            domain.unrelate(&a, &b, "R1", Some("owns")),
            Err(DomainError::UnknownRelationship { .. })
        ));
    }

    #[test]
    fn linked_association_checks_phrases_across_the_link() {
        let mut domain = two_classes();
        domain.define_class("L", &[]).expect("define L");
        domain
            .define_linked_association(
                "R3",
                &end_model("A", Some("attends"), true),
                &end_model("B", Some("is attended by"), true),
                "L",
            )
            .expect("define R3");
        let a = domain.new_instance("A").expect("create");
        let b = domain.new_instance("B").expect("create");
        let link = domain.new_instance("L").expect("create");

        domain
            .relate(&a, &link, "R3", Some("is attended by"))
            .expect("relate a");
        domain
            .relate(&link, &b, "R3", Some("is attended by"))
            .expect("relate b");

        assert_eq!(
            domain.navigate(&a, "B", "R3", Some("is attended by")),
            Ok(vec![b.clone()])
        );
        assert_eq!(
            domain.navigate(&b, "A", "R3", Some("attends")),
            Ok(vec![a.clone()])
        );
        assert!(matches!(
            domain.navigate(&a, "B", "R3", Some("attends")),
            Err(DomainError::UnknownRelationship { .. })
        ));
    }

    #[test]
    fn reflexive_association_without_phrases_is_invalid() {
        let mut domain = MemoryDomain::new();
        domain.define_class("Step", &[]).expect("define");
        assert!(matches!(
            domain.define_association(
                "R5",
                &end_model("Step", None, false),
                &end_model("Step", None, true)
            ),
            Err(DomainError::InvalidModel { .. })
        ));
    }

    #[test]
    fn linked_association_navigates_through_link_instances() {
        let mut domain = two_classes();
        domain.define_class("L", &[]).expect("define L");
        domain
            .define_linked_association(
                "R3",
                &end_model("A", None, true),
                &end_model("B", None, true),
                "L",
            )
            .expect("define R3");
        let a = domain.new_instance("A").expect("create");
        let b = domain.new_instance("B").expect("create");
        let link = domain.new_instance("L").expect("create");

        domain.relate(&a, &link, "R3", None).expect("relate a");
        domain.relate(&b, &link, "R3", None).expect("relate b");

        assert_eq!(domain.navigate(&a, "B", "R3", None), Ok(vec![b.clone()]));
        assert_eq!(domain.navigate(&b, "A", "R3", None), Ok(vec![a.clone()]));
        assert_eq!(domain.navigate(&link, "A", "R3", None), Ok(vec![a.clone()]));
        assert!(matches!(
            domain.relate(&a, &b, "R3", None),
            Err(DomainError::UnknownRelationship { .. })
        ));
    }

    #[test]
    fn deleting_removes_links_and_rejects_stale_handles() {
        let mut domain = two_classes();
        domain
            .define_association("R1", &end_model("A", None, true), &end_model("B", None, true))
            .expect("define R1");
        let a = domain.new_instance("A").expect("create");
        let b = domain.new_instance("B").expect("create");
        domain.relate(&a, &b, "R1", None).expect("relate");

        domain.delete_instance(&b).expect("delete");
        assert_eq!(domain.navigate(&a, "B", "R1", None), Ok(Vec::new()));
        assert!(matches!(
            domain.delete_instance(&b),
            Err(DomainError::NotTracked { .. })
        ));
        assert!(matches!(
            domain.read_attribute(&b, "Id"),
            Err(DomainError::NotTracked { .. })
        ));
    }

    #[test]
    fn attribute_writes_are_type_checked() {
        let mut domain = MemoryDomain::new();
        domain
            .define_class(
                "Tank",
                &[("level", AttributeType::Real), ("name", AttributeType::String)],
            )
            .expect("define");
        let tank = domain.new_instance("Tank").expect("create");

        domain
            .write_attribute(&tank, "level", Value::Integer(3))
            .expect("integers widen");
        assert!(matches!(
            domain.read_attribute(&tank, "level"),
            Ok(Attribute::Stored(Value::Real(level))) if level == 3.0
        ));
        assert!(matches!(
            domain.write_attribute(&tank, "name", Value::Integer(1)),
            Err(DomainError::AttributeType { .. })
        ));
        assert!(matches!(
            domain.write_attribute(&tank, "volume", Value::Integer(1)),
            Err(DomainError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn loads_model_and_reports_unparsable_bodies() {
        let model = Model::from_yaml(indoc! {"
            enumerations:
              Color: [Red, Green]
            classes:
              - name: A
                attributes:
                  - { name: Id, type: unique_id }
                operations:
                  - name: broken
                    body: return 1 +;
                class_operations:
                  - name: make
                    body: create object instance a of A; return a;
            functions:
              - name: main
                body: return 1;
            entities:
              - name: EE
                operations:
                  - name: ping
                    body: return true;
        "})
        .expect("parse model");
        let (domain, invalid) = MemoryDomain::from_model(&model).expect("load model");

        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].label, "A.broken");
        assert!(domain.find_function("main").is_ok());
        assert!(domain.find_class_operation("A", "make").is_ok());
        assert!(domain.find_bridge_operation("EE", "ping").is_ok());
        assert!(domain.find_bridge_operation("LOG", "LogInfo").is_ok());
        assert_eq!(domain.find_symbol("EE"), Ok(Symbol::Bridge("EE".to_string())));
        assert_eq!(
            domain.enumerator("Color", "Green"),
            Ok(Value::Enumerator {
                enumeration: "Color".to_string(),
                name: "Green".to_string(),
            })
        );
        assert!(matches!(
            domain.enumerator("Color", "Blue"),
            Err(DomainError::UnknownEnumerator { .. })
        ));
    }

    #[test]
    fn events_need_a_known_recipient() {
        let mut domain = two_classes();
        let a = domain.new_instance("A").expect("create");
        let event = |recipient| Event {
            label: "A1".to_string(),
            meaning: None,
            arguments: Arguments::new(),
            recipient,
        };

        domain
            .generate_event(event(EventRecipient::Instance(a)))
            .expect("instance event");
        domain
            .generate_event(event(EventRecipient::Creator("B".to_string())))
            .expect("creator event");
        assert!(matches!(
            domain.generate_event(event(EventRecipient::Class("Z".to_string()))),
            Err(DomainError::UnknownClass { .. })
        ));
        assert_eq!(domain.take_events().len(), 2);
        assert!(domain.events().is_empty());
    }
}
