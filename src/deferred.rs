// Omniclass Deferred Registration
//
// A component may register a method for a generic owned by another
// component that has not loaded yet. The registration is recorded and
// applied at flush time, gated by a minimum-version check on the owner.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::errors::{Error, Result};
use crate::generic::{ClassSpec, GenericId, MethodFn};
use crate::registry::Registry;

/// An ordered component version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let mut field = |name: &str| -> Result<u32> {
            parts
                .next()
                .ok_or_else(|| Error::Definition(format!("version `{s}` is missing its {name}")))?
                .parse()
                .map_err(|_| Error::Definition(format!("malformed version `{s}`")))
        };
        let major = field("major")?;
        let minor = field("minor")?;
        let patch = field("patch")?;
        if parts.next().is_some() {
            return Err(Error::Definition(format!("malformed version `{s}`")));
        }
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A method registration waiting for its owner component to load.
pub struct PendingMethod {
    pub owner: String,
    pub generic: String,
    pub specs: Vec<ClassSpec>,
    pub min_version: Version,
    pub method: MethodFn,
}

impl Registry {
    /// Record the intention to register a method for a generic that may
    /// not exist yet. Nothing reaches any method table until the owner's
    /// flush.
    pub fn declare_external_method(
        &mut self,
        owner: &str,
        generic: &str,
        specs: Vec<ClassSpec>,
        min_version: Version,
        method: MethodFn,
    ) {
        trace!(owner, generic, %min_version, "declared external method");
        self.pending.push(PendingMethod {
            owner: owner.to_string(),
            generic: generic.to_string(),
            specs,
            min_version,
            method,
        });
    }

    /// Number of declarations still pending for `owner`.
    pub fn pending_external(&self, owner: &str) -> usize {
        self.pending.iter().filter(|p| p.owner == owner).count()
    }

    /// Apply every pending declaration for `owner`, skipping (without
    /// error) those whose minimum version exceeds the installed one.
    /// Returns the number of methods registered. A pending generic name
    /// that still does not resolve is a definition error; in that case
    /// nothing is registered and the owner's whole batch stays pending,
    /// so a later flush can retry it.
    pub fn flush_external(&mut self, owner: &str, installed: Version) -> Result<usize> {
        let pending = std::mem::take(&mut self.pending);
        let mut batch = Vec::new();
        for p in pending {
            if p.owner != owner {
                self.pending.push(p);
            } else if installed >= p.min_version {
                batch.push(p);
            } else {
                debug!(
                    owner,
                    generic = %p.generic,
                    required = %p.min_version,
                    %installed,
                    "skipping external method; installed version too old"
                );
            }
        }

        // Resolve the whole batch before touching any table: a bad entry
        // must not leave the batch half-applied or lose its siblings.
        let mut ids = Vec::with_capacity(batch.len());
        let mut failure = None;
        for p in &batch {
            match self.resolve_pending(p) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            self.pending.extend(batch);
            return Err(e);
        }

        let registered = batch.len();
        for (p, id) in batch.into_iter().zip(ids) {
            self.register_method(id, &p.specs, p.method)?;
        }
        Ok(registered)
    }

    /// Check a pending declaration against the current tables without
    /// registering it: the generic must exist, the arity must match its
    /// signature, and every named union must expand.
    fn resolve_pending(&self, p: &PendingMethod) -> Result<GenericId> {
        let id = self.find_generic(&p.generic).ok_or_else(|| {
            Error::Definition(format!(
                "deferred method from `{}` names unknown generic `{}`",
                p.owner, p.generic
            ))
        })?;
        let g = self.generic(id)?;
        if p.specs.len() != g.signature.len() {
            return Err(Error::Definition(format!(
                "deferred method from `{}` names {} classes, but `{}` dispatches on {}",
                p.owner,
                p.specs.len(),
                g.name,
                g.signature.len()
            )));
        }
        for spec in &p.specs {
            let mut keys = Vec::new();
            self.expand_spec(spec, 0, &mut keys)?;
        }
        Ok(id)
    }
}
