// Omniclass Class Model
//
// Class objects with a single parent link, typed property declarations,
// and ancestor-chain computation. Classes are looked up by handle; a name
// index supports interactive redefinition.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smallvec::{smallvec, SmallVec};
use tracing::trace;

use crate::errors::{Error, Result};
use crate::object::Instance;
use crate::property::PropertyDef;
use crate::registry::Registry;
use crate::value::{BaseType, Value};

/// Unique identifier for a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

/// A class's single parent link. `Root` is the universal "any" class;
/// `Base` terminates a hierarchy that wraps a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Root,
    Class(ClassId),
    Base(BaseType),
}

/// A user constructor. It receives the registry and the caller's
/// property-name/value pairs and must end by producing an instance through
/// the construction primitive.
pub type Constructor = Rc<dyn Fn(&Registry, &[(&str, Value)]) -> Result<Instance>>;

/// An instance validator: returns one message per violation, empty = valid.
pub type Validator = Rc<dyn Fn(&Registry, &Instance) -> Vec<String>>;

/// A class definition. Created at definition time; `props` is the effective
/// property set (ancestors' declarations first, shadowed by this class's
/// own), computed once when the class is defined.
#[derive(Clone)]
pub struct ClassDef {
    pub name: String,
    pub parent: Parent,
    pub constructor: Option<Constructor>,
    pub validator: Option<Validator>,
    pub own_props: Vec<PropertyDef>,
    pub props: IndexMap<String, PropertyDef>,
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("props", &self.props.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Bound on parent-chain walks. Cycles are impossible by construction for
/// fresh definitions but can be forged through redefinition, so the walk is
/// bounded instead of trusted.
pub(crate) const MAX_ANCESTOR_DEPTH: usize = 256;

impl Registry {
    /// Define a class. Redefining an existing name replaces the class in
    /// place, keeping its handle valid.
    pub fn define_class(
        &mut self,
        name: &str,
        parent: Parent,
        props: Vec<PropertyDef>,
        constructor: Option<Constructor>,
        validator: Option<Validator>,
    ) -> Result<ClassId> {
        if let Parent::Class(pid) = parent {
            if self.get_class(pid).is_none() {
                return Err(Error::Definition(format!(
                    "parent of class `{name}` does not resolve to an existing class"
                )));
            }
        }

        let mut seen = FxHashSet::default();
        for p in &props {
            if !seen.insert(p.name.clone()) {
                return Err(Error::Definition(format!(
                    "class `{name}` declares property `{}` more than once",
                    p.name
                )));
            }
        }

        // Effective set: inherited declarations in ancestor order, shadowed
        // in place by this class's own.
        let mut effective: IndexMap<String, PropertyDef> = match parent {
            Parent::Class(pid) => self.classes[pid.0 as usize].props.clone(),
            Parent::Root | Parent::Base(_) => IndexMap::new(),
        };
        for p in &props {
            effective.insert(p.name.clone(), p.clone());
        }

        let def = ClassDef {
            name: name.to_string(),
            parent,
            constructor,
            validator,
            own_props: props,
            props: effective,
        };

        let id = if let Some(&existing) = self.class_names.get(name) {
            self.classes[existing.0 as usize] = def;
            existing
        } else {
            let id = ClassId(self.classes.len() as u32);
            self.classes.push(def);
            self.class_names.insert(name.to_string(), id);
            id
        };
        trace!(class = name, id = id.0, "defined class");
        Ok(id)
    }

    /// Find a class by name.
    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    /// Get a class by handle.
    pub fn get_class(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id.0 as usize)
    }

    pub(crate) fn class(&self, id: ClassId) -> Result<&ClassDef> {
        self.get_class(id)
            .ok_or_else(|| Error::Internal(format!("dangling class handle {}", id.0)))
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Ancestor chain from `id` up to the root-most class, inclusive, most
    /// specific first. O(depth); the walk is bounded and reports an internal
    /// error rather than looping on a forged cycle.
    pub fn ancestors(&self, id: ClassId) -> Result<SmallVec<[ClassId; 8]>> {
        let mut chain: SmallVec<[ClassId; 8]> = SmallVec::new();
        let mut cur = id;
        loop {
            if chain.len() >= MAX_ANCESTOR_DEPTH {
                return Err(Error::Internal(format!(
                    "ancestor chain of class `{}` exceeds {MAX_ANCESTOR_DEPTH} links; \
                     parent cycle suspected",
                    self.class(id)?.name
                )));
            }
            chain.push(cur);
            match self.class(cur)?.parent {
                Parent::Class(p) => cur = p,
                Parent::Root | Parent::Base(_) => break,
            }
        }
        Ok(chain)
    }

    /// Ranked class-name chain of a runtime value, most specific first,
    /// always ending in `"any"`. This is the uniform view dispatch operates
    /// over, whichever source a value presents: a native instance walks its
    /// ancestors and base terminal, a primitive yields its base type, a
    /// foreign object supplies its own ranked vector.
    pub fn class_chain(&self, value: &Value) -> Result<SmallVec<[String; 8]>> {
        match value {
            Value::Instance(inst) => {
                let ids = self.ancestors(inst.class)?;
                let mut names: SmallVec<[String; 8]> = SmallVec::new();
                for id in &ids {
                    names.push(self.class(*id)?.name.clone());
                }
                let last = ids
                    .last()
                    .copied()
                    .ok_or_else(|| Error::Internal("empty ancestor chain".into()))?;
                if let Parent::Base(bt) = self.class(last)?.parent {
                    names.push(bt.name().to_string());
                }
                names.push("any".to_string());
                Ok(names)
            }
            Value::Foreign(f) => {
                let mut names: SmallVec<[String; 8]> = f.classes.iter().cloned().collect();
                if names.last().map(String::as_str) != Some("any") {
                    names.push("any".to_string());
                }
                Ok(names)
            }
            other => {
                let bt = other
                    .base_type()
                    .ok_or_else(|| Error::Internal("unclassifiable value".into()))?;
                Ok(smallvec![bt.name().to_string(), "any".to_string()])
            }
        }
    }

    /// Most specific class name of a value, for error reporting.
    pub fn value_class_name(&self, value: &Value) -> String {
        self.class_chain(value)
            .ok()
            .and_then(|c| c.first().cloned())
            .unwrap_or_else(|| "any".to_string())
    }
}
