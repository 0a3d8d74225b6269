// Omniclass Value Model
//
// The host value space the engine dispatches over: primitives classified
// into a fixed set of base types, native instances, foreign objects from
// legacy systems, and deferred thunks for call arguments.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::object::Instance;

/// The fixed set of built-in base types primitives classify into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Nil,
    Logical,
    Number,
    Text,
    List,
}

impl BaseType {
    /// Class name used as a dispatch key and in printed representations.
    pub fn name(self) -> &'static str {
        match self {
            BaseType::Nil => "null",
            BaseType::Logical => "logical",
            BaseType::Number => "numeric",
            BaseType::Text => "string",
            BaseType::List => "list",
        }
    }

    /// Default payload for a class wrapping this base type.
    pub fn zero(self) -> Value {
        match self {
            BaseType::Nil => Value::Nil,
            BaseType::Logical => Value::Logical(false),
            BaseType::Number => Value::Number(0.0),
            BaseType::Text => Value::Text(String::new()),
            BaseType::List => Value::List(Vec::new()),
        }
    }
}

/// An object coming from a legacy single-dispatch system. It carries its own
/// ranked class vector (most specific first); the payload is opaque here.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignValue {
    pub classes: Vec<String>,
    pub payload: Box<Value>,
}

impl ForeignValue {
    pub fn new(classes: Vec<String>, payload: Value) -> Self {
        Self {
            classes,
            payload: Box::new(payload),
        }
    }

    /// A legacy object known only by a single class name.
    pub fn named(class: &str, payload: Value) -> Self {
        Self::new(vec![class.to_string()], payload)
    }
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Logical(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Instance(Box<Instance>),
    Foreign(ForeignValue),
}

impl Value {
    /// O(1) classification into a base type. `None` for instances and
    /// foreign objects, which carry their own class information.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Value::Nil => Some(BaseType::Nil),
            Value::Logical(_) => Some(BaseType::Logical),
            Value::Number(_) => Some(BaseType::Number),
            Value::Text(_) => Some(BaseType::Text),
            Value::List(_) => Some(BaseType::List),
            Value::Instance(_) | Value::Foreign(_) => None,
        }
    }

    pub fn instance(inst: Instance) -> Self {
        Value::Instance(Box::new(inst))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "null"),
            Value::Logical(b) => write!(f, "{b}"),
            Value::Number(n) => {
                // Integral values print without a decimal point, but only
                // within the range f64 represents integers exactly.
                const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
                if n.is_finite() && n.fract() == 0.0 && n.abs() < EXACT {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Instance(inst) => write!(f, "<instance:{}>", inst.class.0),
            Value::Foreign(fv) => match fv.classes.first() {
                Some(c) => write!(f, "<foreign {c}>"),
                None => write!(f, "<foreign>"),
            },
        }
    }
}

enum ThunkState {
    Pending(Rc<dyn Fn() -> Value>),
    Forced(Value),
}

/// A memoized deferred computation: expression plus captured environment,
/// forced at most once.
#[derive(Clone)]
pub struct Thunk(Rc<RefCell<ThunkState>>);

impl Thunk {
    pub fn new(f: impl Fn() -> Value + 'static) -> Self {
        Thunk(Rc::new(RefCell::new(ThunkState::Pending(Rc::new(f)))))
    }

    pub fn force(&self) -> Value {
        let pending = match &*self.0.borrow() {
            ThunkState::Forced(v) => return v.clone(),
            ThunkState::Pending(f) => Rc::clone(f),
        };
        let value = pending();
        *self.0.borrow_mut() = ThunkState::Forced(value.clone());
        value
    }

    pub fn is_forced(&self) -> bool {
        matches!(&*self.0.borrow(), ThunkState::Forced(_))
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.borrow() {
            ThunkState::Forced(v) => write!(f, "Thunk({v})"),
            ThunkState::Pending(_) => write!(f, "Thunk(<pending>)"),
        }
    }
}

/// A call argument: either an eager value or a deferred thunk. The engine
/// forces a thunk only when it sits in a dispatch position; pass-through
/// arguments reach the selected method unevaluated.
#[derive(Debug, Clone)]
pub enum Arg {
    Eager(Value),
    Lazy(Thunk),
}

impl Arg {
    pub fn eager(value: Value) -> Self {
        Arg::Eager(value)
    }

    pub fn lazy(f: impl Fn() -> Value + 'static) -> Self {
        Arg::Lazy(Thunk::new(f))
    }

    /// The argument's value, forcing a thunk if necessary.
    pub fn value(&self) -> Value {
        match self {
            Arg::Eager(v) => v.clone(),
            Arg::Lazy(t) => t.force(),
        }
    }

    pub fn is_forced(&self) -> bool {
        match self {
            Arg::Eager(_) => true,
            Arg::Lazy(t) => t.is_forced(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_base_type_classification() {
        assert_eq!(Value::Nil.base_type(), Some(BaseType::Nil));
        assert_eq!(Value::Number(1.5).base_type(), Some(BaseType::Number));
        assert_eq!(Value::Text("hi".into()).base_type(), Some(BaseType::Text));
        assert_eq!(
            Value::Foreign(ForeignValue::named("tbl", Value::Nil)).base_type(),
            None
        );
    }

    #[test]
    fn test_thunk_forces_once() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let t = Thunk::new(move || {
            c.set(c.get() + 1);
            Value::Number(7.0)
        });
        assert!(!t.is_forced());
        assert_eq!(t.force(), Value::Number(7.0));
        assert_eq!(t.force(), Value::Number(7.0));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_lazy_arg_shares_memo_across_clones() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let arg = Arg::lazy(move || {
            c.set(c.get() + 1);
            Value::Logical(true)
        });
        let copy = arg.clone();
        assert_eq!(arg.value(), Value::Logical(true));
        assert_eq!(copy.value(), Value::Logical(true));
        assert_eq!(count.get(), 1);
        assert!(copy.is_forced());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(6.0).to_string(), "6");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
        // Huge integral floats fall back to plain float formatting
        // instead of a truncated cast.
        assert_eq!(Value::Number(1e300).to_string(), format!("{}", 1e300f64));
        assert_ne!(Value::Number(1e300).to_string(), i64::MAX.to_string());
        assert_eq!(Value::Text("a".into()).to_string(), "\"a\"");
        assert_eq!(
            Value::List(vec![Value::Number(1.0), Value::Nil]).to_string(),
            "[1, null]"
        );
    }
}
