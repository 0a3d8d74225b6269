// Omniclass Property System
//
// Typed, optionally computed attributes keyed by class. Stored properties
// hold a slot on the instance; computed properties derive their value
// through a getter and may accept writes through a setter.

use std::fmt;
use std::rc::Rc;

use crate::class::ClassId;
use crate::errors::{Error, Result};
use crate::object::Instance;
use crate::registry::Registry;
use crate::value::{BaseType, Value};

/// Computes a derived property value from an instance.
pub type Getter = Rc<dyn Fn(&Registry, &Instance) -> Result<Value>>;

/// Applies a write to a computed property. Receives the instance and the
/// assigned value and must return a fully updated instance; the engine
/// re-validates the result before committing it.
pub type Setter = Rc<dyn Fn(&Registry, Instance, Value) -> Result<Instance>>;

/// The class or set of classes a property value must satisfy.
#[derive(Clone)]
pub enum TypeConstraint {
    Any,
    Base(BaseType),
    Class(ClassId),
    OneOf(Vec<TypeConstraint>),
}

impl TypeConstraint {
    /// Whether `value` satisfies the constraint. A subclass satisfies a
    /// superclass constraint: the check walks the value's class chain.
    pub fn satisfied_by(&self, registry: &Registry, value: &Value) -> Result<bool> {
        match self {
            TypeConstraint::Any => Ok(true),
            TypeConstraint::Base(bt) => {
                let chain = registry.class_chain(value)?;
                Ok(chain.iter().any(|n| n == bt.name()))
            }
            TypeConstraint::Class(id) => {
                let name = &registry.class(*id)?.name;
                let chain = registry.class_chain(value)?;
                Ok(chain.iter().any(|n| n == name))
            }
            TypeConstraint::OneOf(options) => {
                for opt in options {
                    if opt.satisfied_by(registry, value)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    pub fn describe(&self, registry: &Registry) -> String {
        match self {
            TypeConstraint::Any => "any".to_string(),
            TypeConstraint::Base(bt) => bt.name().to_string(),
            TypeConstraint::Class(id) => registry
                .get_class(*id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("<class {}>", id.0)),
            TypeConstraint::OneOf(options) => options
                .iter()
                .map(|o| o.describe(registry))
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

impl fmt::Debug for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeConstraint::Any => write!(f, "Any"),
            TypeConstraint::Base(bt) => write!(f, "Base({})", bt.name()),
            TypeConstraint::Class(id) => write!(f, "Class({})", id.0),
            TypeConstraint::OneOf(opts) => f.debug_tuple("OneOf").field(opts).finish(),
        }
    }
}

/// A property declaration.
#[derive(Clone)]
pub struct PropertyDef {
    pub name: String,
    pub constraint: TypeConstraint,
    pub default: Option<Value>,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
}

impl PropertyDef {
    /// A stored property backed by an instance slot.
    pub fn stored(name: &str, constraint: TypeConstraint) -> Self {
        Self {
            name: name.to_string(),
            constraint,
            default: None,
            getter: None,
            setter: None,
        }
    }

    /// A computed property derived through a getter; read-only unless a
    /// setter is attached.
    pub fn computed(
        name: &str,
        constraint: TypeConstraint,
        getter: impl Fn(&Registry, &Instance) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            constraint,
            default: None,
            getter: Some(Rc::new(getter)),
            setter: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_setter(
        mut self,
        setter: impl Fn(&Registry, Instance, Value) -> Result<Instance> + 'static,
    ) -> Self {
        self.setter = Some(Rc::new(setter));
        self
    }

    pub fn is_computed(&self) -> bool {
        self.getter.is_some()
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("constraint", &self.constraint)
            .field("computed", &self.is_computed())
            .finish()
    }
}

impl Registry {
    /// Read a property: the getter if one is declared, else the stored
    /// slot. Unknown names fail with `PropertyNotFound`.
    pub fn get_property(&self, instance: &Instance, name: &str) -> Result<Value> {
        let cls = self.class(instance.class)?;
        let prop = cls.props.get(name).ok_or_else(|| Error::PropertyNotFound {
            property: name.to_string(),
            class: cls.name.clone(),
        })?;
        match &prop.getter {
            Some(getter) => getter(self, instance),
            None => Ok(instance.values.get(name).cloned().unwrap_or(Value::Nil)),
        }
    }

    /// Write a property and re-validate. The mutation is all-or-nothing:
    /// the candidate instance is built first, the full validator chain runs
    /// on it, and only then does it replace the original.
    pub fn set_property(&self, instance: &mut Instance, name: &str, value: Value) -> Result<()> {
        let cls = self.class(instance.class)?;
        let prop = cls
            .props
            .get(name)
            .ok_or_else(|| Error::PropertyNotFound {
                property: name.to_string(),
                class: cls.name.clone(),
            })?
            .clone();

        let candidate = if let Some(setter) = &prop.setter {
            setter(self, instance.clone(), value)?
        } else if prop.is_computed() {
            return Err(Error::Definition(format!(
                "property `{name}` of class `{}` is computed and read-only",
                cls.name
            )));
        } else {
            if !prop.constraint.satisfied_by(self, &value)? {
                return Err(Error::TypeConstraint {
                    property: name.to_string(),
                    expected: prop.constraint.describe(self),
                    actual: self.value_class_name(&value),
                });
            }
            let mut next = instance.clone();
            next.values.insert(name.to_string(), value);
            next
        };

        self.validate(&candidate)?;
        *instance = candidate;
        Ok(())
    }
}
