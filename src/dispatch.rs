// Omniclass Dispatch
//
// Most-specific-first search over the method table: position 0's ancestor
// chain is walked outermost, so it dominates ties at later positions. On
// exhaustion dispatch falls back to the legacy single- then double-dispatch
// collaborators before reporting no applicable method.

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::errors::{Error, Result};
use crate::generic::{GenericId, MethodFn, MethodNode};
use crate::registry::Registry;
use crate::value::{Arg, Value};

/// The boundary to pre-existing host object systems. Dispatch consults it
/// only after every native path is exhausted.
pub trait LegacyHooks {
    /// Ranked class vector of a legacy value, most specific first, ending
    /// in a universal root.
    fn ranked_classes(&self, value: &Value) -> Vec<String>;

    /// Single-dispatch fallback: look up a same-named method along a
    /// ranked class vector.
    fn lookup_method(&self, name: &str, ranked: &[String]) -> Option<MethodFn>;

    /// Double-dispatch fallback, consulted only if single dispatch fails.
    fn lookup_method2(&self, name: &str, class: &str) -> Option<MethodFn>;
}

/// Transient per-call state: the class chain resolved for each dispatch
/// argument and the index cursor of the currently selected table path.
/// Next-method chaining resumes the search one step past the cursor.
/// Frames are plain stack values, so nested generic calls are independent.
#[derive(Debug)]
pub struct DispatchFrame {
    generic: GenericId,
    chains: Vec<SmallVec<[String; 8]>>,
    cursor: Vec<usize>,
}

impl DispatchFrame {
    pub fn generic(&self) -> GenericId {
        self.generic
    }

    /// Class names of the currently selected path, in signature order.
    pub fn selected_path(&self) -> Vec<&str> {
        self.cursor
            .iter()
            .zip(&self.chains)
            .map(|(&i, chain)| chain[i].as_str())
            .collect()
    }
}

/// Lexicographic most-specific-first search, resuming at `start`. Position
/// 0 is the most significant index; a position whose candidate class has no
/// entry prunes its whole subtree.
fn search(
    table: &MethodNode,
    chains: &[SmallVec<[String; 8]>],
    start: &[usize],
) -> Option<(Vec<usize>, MethodFn)> {
    let mut out = vec![0usize; chains.len()];
    let method = descend(table, chains, start, 0, true, &mut out)?;
    Some((out, method))
}

fn descend(
    node: &MethodNode,
    chains: &[SmallVec<[String; 8]>],
    start: &[usize],
    depth: usize,
    on_prefix: bool,
    out: &mut Vec<usize>,
) -> Option<MethodFn> {
    if depth == chains.len() {
        return node.method.clone();
    }
    let begin = if on_prefix { start[depth] } else { 0 };
    for i in begin..chains[depth].len() {
        let Some(child) = node.children.get(chains[depth][i].as_str()) else {
            continue;
        };
        out[depth] = i;
        let deeper_prefix = on_prefix && i == begin;
        if let Some(method) = descend(child, chains, start, depth + 1, deeper_prefix, out) {
            return Some(method);
        }
    }
    None
}

impl Registry {
    /// Invoke a generic. The first `signature.len()` arguments are the
    /// dispatch arguments; they are forced only far enough to read their
    /// class chains. Remaining arguments pass through untouched.
    pub fn call(&self, generic: GenericId, args: &[Arg]) -> Result<Value> {
        let g = self.generic(generic)?;
        let arity = g.signature.len();
        if args.len() < arity {
            return Err(Error::Definition(format!(
                "`{}` dispatches on {arity} arguments, got {}",
                g.name,
                args.len()
            )));
        }

        let mut chains = Vec::with_capacity(arity);
        for arg in &args[..arity] {
            chains.push(self.class_chain(&arg.value())?);
        }

        let zeros = vec![0usize; arity];
        if let Some((cursor, method)) = search(&g.table, &chains, &zeros) {
            trace!(generic = %g.name, ?cursor, "selected method");
            let mut frame = DispatchFrame {
                generic,
                chains,
                cursor,
            };
            return method(self, &mut frame, args);
        }

        // Native paths exhausted: consult the legacy collaborators.
        if let Some(hooks) = &self.legacy {
            let first = args[0].value();
            let ranked = hooks.ranked_classes(&first);
            let found = hooks
                .lookup_method(&g.name, &ranked)
                .or_else(|| {
                    ranked
                        .first()
                        .and_then(|class| hooks.lookup_method2(&g.name, class))
                });
            if let Some(method) = found {
                debug!(generic = %g.name, "dispatched through legacy fallback");
                // A legacy method has no native path behind it; its frame
                // starts exhausted so call_next reports no applicable method.
                let mut frame = DispatchFrame {
                    generic,
                    chains,
                    cursor: Vec::new(),
                };
                return method(self, &mut frame, args);
            }
        }

        Err(self.no_applicable(generic, &chains))
    }

    /// Resume the dispatch search one step past the frame's current path.
    /// Repeated calls visit ancestor combinations in the same global order
    /// dispatch itself would have. No legacy fallback from here.
    pub fn call_next(&self, frame: &mut DispatchFrame, args: &[Arg]) -> Result<Value> {
        let g = self.generic(frame.generic)?;
        if frame.cursor.len() != g.signature.len() {
            return Err(self.no_applicable(frame.generic, &frame.chains));
        }
        let mut start = frame.cursor.clone();
        match start.last_mut() {
            Some(last) => *last += 1,
            None => return Err(self.no_applicable(frame.generic, &frame.chains)),
        }
        match search(&g.table, &frame.chains, &start) {
            Some((cursor, method)) => {
                trace!(generic = %g.name, ?cursor, "selected next method");
                frame.cursor = cursor;
                method(self, frame, args)
            }
            None => Err(self.no_applicable(frame.generic, &frame.chains)),
        }
    }

    /// Convenience: invoke a generic by name.
    pub fn call_by_name(&self, name: &str, args: &[Arg]) -> Result<Value> {
        let id = self
            .find_generic(name)
            .ok_or_else(|| Error::Definition(format!("no generic named `{name}`")))?;
        self.call(id, args)
    }

    fn no_applicable(&self, generic: GenericId, chains: &[SmallVec<[String; 8]>]) -> Error {
        let name = self
            .get_generic(generic)
            .map(|g| g.name.clone())
            .unwrap_or_default();
        Error::NoApplicableMethod {
            generic: name,
            classes: chains
                .iter()
                .map(|c| c.first().cloned().unwrap_or_else(|| "any".to_string()))
                .collect(),
        }
    }
}
