// Omniclass Object Construction
//
// Instances are built in two phases: fill every stored slot from supplied
// values or declared defaults, then run the full validator chain
// root-to-leaf over the completed instance. A partially invalid instance
// is never observable, and no validator ever sees a half-built one.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::class::{ClassId, Parent};
use crate::errors::{Error, Result};
use crate::registry::Registry;
use crate::value::Value;

/// An instance of a class. `class` is assigned at construction and never
/// changes; `values` holds the stored property slots in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class: ClassId,
    pub payload: Value,
    pub values: IndexMap<String, Value>,
}

impl Registry {
    /// Public construction entry: runs the class's user constructor if one
    /// was declared, else the default path. A user constructor must end by
    /// producing an instance of its own class through `new_object`.
    pub fn construct(&self, class: ClassId, props: &[(&str, Value)]) -> Result<Instance> {
        let cls = self.class(class)?;
        match cls.constructor.clone() {
            Some(ctor) => {
                let inst = ctor(self, props)?;
                if inst.class != class {
                    return Err(Error::Definition(format!(
                        "constructor for `{}` produced an instance of another class",
                        cls.name
                    )));
                }
                Ok(inst)
            }
            None => {
                let payload = self.default_payload(class)?;
                self.new_object(class, payload, props)
            }
        }
    }

    /// The construction primitive. The owning class is an explicit
    /// parameter; no caller context is inspected. Fills every stored slot
    /// of the effective property set from the caller's values or the
    /// declared defaults, constraint-checks them, and only then runs every
    /// validator root-to-leaf over the finished instance. Nothing above
    /// this class in the hierarchy is built or validated separately, so a
    /// caller can satisfy an inherited required property directly.
    pub fn new_object(
        &self,
        class: ClassId,
        payload: Value,
        props: &[(&str, Value)],
    ) -> Result<Instance> {
        let cls = self.class(class)?;

        let payload = match cls.parent {
            Parent::Root => payload,
            Parent::Base(bt) => {
                let payload = if payload == Value::Nil {
                    bt.zero()
                } else {
                    payload
                };
                if payload.base_type() != Some(bt) {
                    return Err(Error::TypeConstraint {
                        property: "<payload>".to_string(),
                        expected: bt.name().to_string(),
                        actual: self.value_class_name(&payload),
                    });
                }
                payload
            }
            Parent::Class(_) => {
                if payload == Value::Nil {
                    self.default_payload(class)?
                } else {
                    self.check_base_payload(class, &payload)?;
                    payload
                }
            }
        };

        // Caller-supplied values may target any stored property in the
        // effective set, shadowed or inherited.
        let mut supplied: FxHashMap<&str, &Value> = FxHashMap::default();
        for (name, value) in props {
            let prop = cls.props.get(*name).ok_or_else(|| Error::PropertyNotFound {
                property: (*name).to_string(),
                class: cls.name.clone(),
            })?;
            if prop.is_computed() {
                return Err(Error::Definition(format!(
                    "computed property `{name}` of class `{}` cannot be supplied at construction",
                    cls.name
                )));
            }
            supplied.insert(*name, value);
        }

        let mut inst = Instance {
            class,
            payload,
            values: IndexMap::new(),
        };
        for (name, prop) in &cls.props {
            if prop.is_computed() {
                continue;
            }
            let value = match supplied.get(name.as_str()) {
                Some(v) => (*v).clone(),
                None => prop.default.clone().unwrap_or(Value::Nil),
            };
            if !prop.constraint.satisfied_by(self, &value)? {
                return Err(Error::TypeConstraint {
                    property: name.clone(),
                    expected: prop.constraint.describe(self),
                    actual: self.value_class_name(&value),
                });
            }
            inst.values.insert(name.clone(), value);
        }

        self.validate(&inst)?;
        trace!(class = %cls.name, "constructed instance");
        Ok(inst)
    }

    /// Run the full validator chain, every ancestor before the class
    /// itself, concatenating messages root-to-leaf.
    pub fn validate(&self, instance: &Instance) -> Result<()> {
        let chain = self.ancestors(instance.class)?;
        let mut messages = Vec::new();
        for id in chain.iter().rev() {
            if let Some(validator) = &self.class(*id)?.validator {
                messages.extend(validator(self, instance));
            }
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { messages })
        }
    }

    /// Default payload for a hierarchy: the zero value of the base type it
    /// wraps, or nil for pure reference classes.
    fn default_payload(&self, class: ClassId) -> Result<Value> {
        let chain = self.ancestors(class)?;
        let last = chain
            .last()
            .copied()
            .ok_or_else(|| Error::Internal("empty ancestor chain".into()))?;
        match self.class(last)?.parent {
            Parent::Base(bt) => Ok(bt.zero()),
            Parent::Root | Parent::Class(_) => Ok(Value::Nil),
        }
    }

    /// An explicit payload handed to a non-terminal class must still
    /// satisfy the hierarchy's base terminal, if it has one.
    fn check_base_payload(&self, class: ClassId, payload: &Value) -> Result<()> {
        let chain = self.ancestors(class)?;
        let last = chain
            .last()
            .copied()
            .ok_or_else(|| Error::Internal("empty ancestor chain".into()))?;
        if let Parent::Base(bt) = self.class(last)?.parent {
            if payload.base_type() != Some(bt) {
                return Err(Error::TypeConstraint {
                    property: "<payload>".to_string(),
                    expected: bt.name().to_string(),
                    actual: self.value_class_name(payload),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyDef, TypeConstraint};
    use crate::value::BaseType;
    use std::rc::Rc;

    #[test]
    fn test_defaults_fill_unsupplied_properties() {
        let mut reg = Registry::new();
        let cls = reg
            .define_class(
                "pair",
                Parent::Root,
                vec![
                    PropertyDef::stored("a", TypeConstraint::Base(BaseType::Number))
                        .with_default(Value::Number(1.0)),
                    PropertyDef::stored("b", TypeConstraint::Base(BaseType::Number))
                        .with_default(Value::Number(2.0)),
                ],
                None,
                None,
            )
            .unwrap();
        let inst = reg.construct(cls, &[("b", Value::Number(9.0))]).unwrap();
        assert_eq!(reg.get_property(&inst, "a").unwrap(), Value::Number(1.0));
        assert_eq!(reg.get_property(&inst, "b").unwrap(), Value::Number(9.0));
    }

    #[test]
    fn test_base_wrapper_checks_payload() {
        let mut reg = Registry::new();
        let text = reg
            .define_class("text", Parent::Base(BaseType::Text), Vec::new(), None, None)
            .unwrap();
        let inst = reg
            .new_object(text, Value::Text("hi".into()), &[])
            .unwrap();
        assert_eq!(inst.payload, Value::Text("hi".into()));

        let err = reg.new_object(text, Value::Number(1.0), &[]).unwrap_err();
        assert!(matches!(err, Error::TypeConstraint { .. }));
    }

    #[test]
    fn test_child_supplies_inherited_required_property() {
        let mut reg = Registry::new();
        let a = reg
            .define_class(
                "a",
                Parent::Root,
                vec![PropertyDef::stored("n", TypeConstraint::Base(BaseType::Number))],
                None,
                None,
            )
            .unwrap();
        let b = reg
            .define_class("b", Parent::Class(a), Vec::new(), None, None)
            .unwrap();

        // `n` has no default, so the caller's value is the only way to
        // satisfy its constraint. The parent must not be checked alone.
        let inst = reg.construct(b, &[("n", Value::Number(5.0))]).unwrap();
        assert_eq!(reg.get_property(&inst, "n").unwrap(), Value::Number(5.0));

        let err = reg.construct(b, &[]).unwrap_err();
        assert!(matches!(err, Error::TypeConstraint { .. }));
    }

    #[test]
    fn test_child_inherits_parent_defaults() {
        let mut reg = Registry::new();
        let a = reg
            .define_class(
                "a",
                Parent::Root,
                vec![PropertyDef::stored("x", TypeConstraint::Base(BaseType::Number))
                    .with_default(Value::Number(5.0))],
                None,
                None,
            )
            .unwrap();
        let b = reg
            .define_class(
                "b",
                Parent::Class(a),
                vec![PropertyDef::stored("y", TypeConstraint::Base(BaseType::Number))
                    .with_default(Value::Number(6.0))],
                None,
                None,
            )
            .unwrap();
        let inst = reg.construct(b, &[]).unwrap();
        assert_eq!(reg.get_property(&inst, "x").unwrap(), Value::Number(5.0));
        assert_eq!(reg.get_property(&inst, "y").unwrap(), Value::Number(6.0));
    }

    #[test]
    fn test_validator_chain_runs_root_to_leaf() {
        let mut reg = Registry::new();
        let a = reg
            .define_class(
                "a",
                Parent::Root,
                vec![PropertyDef::stored("n", TypeConstraint::Base(BaseType::Number))
                    .with_default(Value::Number(-1.0))],
                None,
                Some(Rc::new(|reg: &Registry, inst: &Instance| {
                    match reg.get_property(inst, "n") {
                        Ok(Value::Number(n)) if n < 0.0 => vec!["n is negative".to_string()],
                        _ => Vec::new(),
                    }
                })),
            )
            .unwrap();
        let b = reg
            .define_class(
                "b",
                Parent::Class(a),
                Vec::new(),
                None,
                Some(Rc::new(|reg: &Registry, inst: &Instance| {
                    match reg.get_property(inst, "n") {
                        Ok(Value::Number(n)) if n != 0.0 => vec!["n is not zero".to_string()],
                        _ => Vec::new(),
                    }
                })),
            )
            .unwrap();
        let err = reg.construct(b, &[]).unwrap_err();
        match err {
            Error::Validation { messages } => {
                assert_eq!(messages, vec!["n is negative", "n is not zero"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_user_constructor_must_produce_own_class() {
        let mut reg = Registry::new();
        let a = reg
            .define_class("a", Parent::Root, Vec::new(), None, None)
            .unwrap();
        let bad = reg
            .define_class(
                "bad",
                Parent::Root,
                Vec::new(),
                Some(Rc::new(move |reg: &Registry, _props: &[(&str, Value)]| {
                    reg.new_object(a, Value::Nil, &[])
                })),
                None,
            )
            .unwrap();
        let err = reg.construct(bad, &[]).unwrap_err();
        assert!(matches!(err, Error::Definition(_)));
    }

    #[test]
    fn test_unknown_construction_property() {
        let mut reg = Registry::new();
        let cls = reg
            .define_class("a", Parent::Root, Vec::new(), None, None)
            .unwrap();
        let err = reg.construct(cls, &[("nope", Value::Nil)]).unwrap_err();
        assert!(matches!(err, Error::PropertyNotFound { .. }));
    }
}
