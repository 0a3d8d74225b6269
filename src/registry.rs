// Omniclass Registry
//
// Process-wide state with an explicit lifecycle: one registry holds every
// class, generic, union, and pending registration, and is passed to the
// engine rather than hidden in a global. Tests get isolated registries.
//
// Single-threaded by contract: tables are mutated only between calls
// (definition time) or at flush time, never concurrently with a dispatch
// in flight, so no locking is used.

use rustc_hash::FxHashMap;

use crate::class::{ClassDef, ClassId};
use crate::deferred::PendingMethod;
use crate::dispatch::LegacyHooks;
use crate::generic::{ClassSpec, Generic, GenericId};

pub struct Registry {
    pub(crate) classes: Vec<ClassDef>,
    pub(crate) class_names: FxHashMap<String, ClassId>,
    pub(crate) generics: Vec<Generic>,
    pub(crate) generic_names: FxHashMap<String, GenericId>,
    pub(crate) unions: FxHashMap<String, Vec<ClassSpec>>,
    pub(crate) pending: Vec<PendingMethod>,
    pub(crate) legacy: Option<Box<dyn LegacyHooks>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            class_names: FxHashMap::default(),
            generics: Vec::new(),
            generic_names: FxHashMap::default(),
            unions: FxHashMap::default(),
            pending: Vec::new(),
            legacy: None,
        }
    }

    /// Install the legacy-system collaborator consulted by the dispatch
    /// fallback path.
    pub fn set_legacy_hooks(&mut self, hooks: Box<dyn LegacyHooks>) {
        self.legacy = Some(hooks);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
