//! The dynamically-typed value tagged union.
//!
//! A [`Value`] is one of eight kinds: `null`, `boolean`, `integer`, `real`,
//! `string`, `array`, `object`, `function`. Strings, arrays and objects are
//! copy-on-write: cloning a `Value` is always O(1) (it bumps an `Rc` strong
//! count), and the first mutation through a unique handle clones the backing
//! storage via [`Rc::make_mut`]. Containers cannot themselves participate in
//! reference cycles (only `Variable`s can — see `variable.rs`), so ordinary
//! reference counting is sufficient here and a tracing collector is never
//! needed for `Value` storage itself.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::function::FunctionHandle;

/// A copy-on-write, insertion-ordered object. Iteration order is insertion
/// order, not key order.
pub type Object = IndexMap<Rc<str>, Value>;

/// A copy-on-write array.
pub type Array = Vec<Value>;

/// The tagged union of every value an Asteria expression can produce.
///
/// `Clone` is cheap for every variant: primitives are `Copy`-sized, and the
/// three composite variants (`String`, `Array`, `Object`) share their
/// backing storage through an `Rc` until a write forces a copy.
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Rc<str>),
    Array(Rc<Array>),
    Object(Rc<Object>),
    Function(FunctionHandle),
}

impl Value {
    /// Returns the kind name used in diagnostic messages ("array", "object",
    /// and so on).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }

    /// `null` is false, booleans are themselves, numbers are non-zero,
    /// strings/arrays/objects are non-empty, functions are always true.
    #[must_use]
    pub fn test(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Integer(n) => *n != 0,
            Self::Real(r) => *r != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Array(a) => !a.is_empty(),
            Self::Object(o) => !o.is_empty(),
            Self::Function(_) => true,
        }
    }

    #[must_use]
    pub fn new_string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into())
    }

    #[must_use]
    pub fn new_array(a: Array) -> Self {
        Self::Array(Rc::new(a))
    }

    #[must_use]
    pub fn new_object(o: Object) -> Self {
        Self::Object(Rc::new(o))
    }

    /// Structural equality. Arrays and objects compare element-by-element;
    /// functions compare by identity of their underlying handle.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a == b,
            (Self::Integer(a), Self::Real(b)) | (Self::Real(b), Self::Integer(a)) => (*a as f64) == *b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other_v| v.equals(other_v)))
            }
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering, defined only within the same kind and between int/real.
    /// `None` means the two values are incomparable (e.g. a string and an
    /// array, or a `real` NaN against anything).
    #[must_use]
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Real(a), Self::Real(b)) => a.partial_cmp(b),
            (Self::Integer(a), Self::Real(b)) => (*a as f64).partial_cmp(b),
            (Self::Real(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Pretty-printing used for the driver's composite-value report and for
/// `StderrTracer` diagnostics.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::Object(o) => {
                write!(f, "{{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Function(func) => write!(f, "<function {}>", func.header().func_name),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::new_string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::new_string(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_the_per_kind_table() {
        assert!(!Value::Null.test());
        assert!(!Value::Integer(0).test());
        assert!(Value::Integer(-1).test());
        assert!(!Value::new_string("").test());
        assert!(Value::new_string("x").test());
        assert!(!Value::new_array(vec![]).test());
        assert!(Value::new_array(vec![Value::Null]).test());
    }

    #[test]
    fn structural_equality_on_arrays() {
        let a = Value::new_array(vec![Value::Integer(1), Value::Integer(2)]);
        let b = Value::new_array(vec![Value::Integer(1), Value::Integer(2)]);
        assert!(a.equals(&b));
        let c = Value::new_array(vec![Value::Integer(1), Value::Integer(3)]);
        assert!(!a.equals(&c));
    }

    #[test]
    fn mixed_int_real_equality_and_ordering() {
        assert!(Value::Integer(2).equals(&Value::Real(2.0)));
        assert_eq!(
            Value::Integer(1).partial_compare(&Value::Real(2.0)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn values_of_different_kinds_do_not_compare() {
        assert_eq!(Value::new_string("1").partial_compare(&Value::Integer(1)), None);
    }
}
