// Omniclass Generic Functions
//
// Generics carry an ordered dispatch signature and a method table: a tree
// keyed by class name, one level per signature position. Registration is
// last-write-wins to support interactive redefinition.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::class::ClassId;
use crate::dispatch::DispatchFrame;
use crate::errors::{Error, Result};
use crate::registry::Registry;
use crate::value::{Arg, BaseType, Value};

/// Unique identifier for a generic function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericId(pub u32);

/// A method body. Receives the registry, the call's dispatch frame (for
/// next-method chaining), and the original arguments.
pub type MethodFn = Rc<dyn Fn(&Registry, &mut DispatchFrame, &[Arg]) -> Result<Value>>;

/// One level of the method table. A lookup path's existence is independent
/// across branches; a node holds a method only at signature depth.
#[derive(Clone, Default)]
pub struct MethodNode {
    pub children: FxHashMap<String, MethodNode>,
    pub method: Option<MethodFn>,
}

impl fmt::Debug for MethodNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodNode")
            .field("keys", &self.children.keys().collect::<Vec<_>>())
            .field("method", &self.method.is_some())
            .finish()
    }
}

/// A generic function.
pub struct Generic {
    pub name: String,
    pub signature: Vec<String>,
    pub table: MethodNode,
}

/// A class designator at method-registration time. A named union expands
/// into one registration per member.
#[derive(Clone, Debug)]
pub enum ClassSpec {
    Any,
    Base(BaseType),
    Class(ClassId),
    Union(String),
}

const MAX_UNION_DEPTH: usize = 32;

impl Registry {
    /// Declare a generic with its dispatch signature. Redeclaring an
    /// existing name updates the signature and keeps the method table.
    pub fn define_generic(&mut self, name: &str, signature: &[&str]) -> Result<GenericId> {
        if signature.is_empty() {
            return Err(Error::Definition(format!(
                "generic `{name}` must dispatch on at least one argument"
            )));
        }
        let signature: Vec<String> = signature.iter().map(|s| s.to_string()).collect();
        if let Some(&id) = self.generic_names.get(name) {
            self.generics[id.0 as usize].signature = signature;
            return Ok(id);
        }
        let id = GenericId(self.generics.len() as u32);
        self.generics.push(Generic {
            name: name.to_string(),
            signature,
            table: MethodNode::default(),
        });
        self.generic_names.insert(name.to_string(), id);
        trace!(generic = name, id = id.0, "defined generic");
        Ok(id)
    }

    pub fn find_generic(&self, name: &str) -> Option<GenericId> {
        self.generic_names.get(name).copied()
    }

    pub fn get_generic(&self, id: GenericId) -> Option<&Generic> {
        self.generics.get(id.0 as usize)
    }

    pub(crate) fn generic(&self, id: GenericId) -> Result<&Generic> {
        self.get_generic(id)
            .ok_or_else(|| Error::Internal(format!("dangling generic handle {}", id.0)))
    }

    pub fn generic_count(&self) -> usize {
        self.generics.len()
    }

    /// Register a named union of class designators for use in signatures.
    pub fn define_union(&mut self, name: &str, members: Vec<ClassSpec>) -> Result<()> {
        if members.is_empty() {
            return Err(Error::Definition(format!("union `{name}` has no members")));
        }
        self.unions.insert(name.to_string(), members);
        Ok(())
    }

    pub(crate) fn expand_spec(
        &self,
        spec: &ClassSpec,
        depth: usize,
        out: &mut Vec<String>,
    ) -> Result<()> {
        if depth > MAX_UNION_DEPTH {
            return Err(Error::Internal(
                "union expansion exceeds depth bound; member cycle suspected".to_string(),
            ));
        }
        match spec {
            ClassSpec::Any => out.push("any".to_string()),
            ClassSpec::Base(bt) => out.push(bt.name().to_string()),
            ClassSpec::Class(id) => out.push(self.class(*id)?.name.clone()),
            ClassSpec::Union(name) => {
                let members = self.unions.get(name).ok_or_else(|| {
                    Error::Definition(format!("unknown union `{name}` in method signature"))
                })?;
                for member in members {
                    self.expand_spec(member, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }

    /// Register a method at the table path named by `specs`, one class per
    /// signature position. Unions expand into the cartesian product of
    /// member registrations; an identical path silently overwrites.
    pub fn register_method(
        &mut self,
        generic: GenericId,
        specs: &[ClassSpec],
        method: MethodFn,
    ) -> Result<()> {
        let (name, arity) = {
            let g = self.generic(generic)?;
            (g.name.clone(), g.signature.len())
        };
        if specs.len() != arity {
            return Err(Error::Definition(format!(
                "method for `{name}` names {} classes, but its signature has {arity}",
                specs.len()
            )));
        }

        let mut keys_per_pos: Vec<Vec<String>> = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut keys = Vec::new();
            self.expand_spec(spec, 0, &mut keys)?;
            keys_per_pos.push(keys);
        }

        let mut paths: Vec<Vec<String>> = vec![Vec::new()];
        for keys in &keys_per_pos {
            let mut next = Vec::with_capacity(paths.len() * keys.len());
            for path in &paths {
                for key in keys {
                    let mut extended = path.clone();
                    extended.push(key.clone());
                    next.push(extended);
                }
            }
            paths = next;
        }

        let table = &mut self.generics[generic.0 as usize].table;
        for path in &paths {
            let mut node = &mut *table;
            for key in path {
                node = node.children.entry(key.clone()).or_default();
            }
            node.method = Some(Rc::clone(&method));
        }
        debug!(generic = %name, paths = paths.len(), "registered method");
        Ok(())
    }
}
