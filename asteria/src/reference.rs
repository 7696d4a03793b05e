//! Lvalue/rvalue abstraction (`spec.md` §3 "Reference", §4.1).
//!
//! A [`Reference`] is a root plus a chain of modifiers. The root says *what
//! kind of storage* backs the reference (an unmodifiable snapshot, a
//! throwaway value, or an aliased variable); the modifiers say *how deep*
//! into that storage the reference points. This mirrors the original
//! implementation's `Reference_root` + `Reference_modifier` split
//! (`reference.cpp`, `reference_root.cpp`) one-to-one, expressed as Rust
//! sum types instead of a tagged C++ variant.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::value::{Object, Value};
use crate::variable::Variable;

/// One step in a reference's modifier chain (`spec.md` §3 "Modifier
/// variants").
#[derive(Clone, Debug)]
pub enum Modifier {
    ArrayIndex(i64),
    ObjectKey(Rc<str>),
}

/// What a reference is ultimately rooted in (`spec.md` §3 "Root variants").
#[derive(Clone)]
pub enum RefRoot {
    /// An unmodifiable snapshot, e.g. a literal.
    Constant(Value),
    /// An unnamed, movable value, e.g. an expression's intermediate result.
    Temporary(Value),
    /// An lvalue alias onto a shared [`Variable`] cell.
    Variable(Variable),
}

/// A pair `(root, modifiers)` addressing a [`Value`] (`spec.md` §3
/// "Reference").
#[derive(Clone)]
pub struct Reference {
    root: RefRoot,
    modifiers: SmallVec<[Modifier; 4]>,
}

impl Reference {
    #[must_use]
    pub fn new_constant(value: Value) -> Self {
        Self {
            root: RefRoot::Constant(value),
            modifiers: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn new_temporary(value: Value) -> Self {
        Self {
            root: RefRoot::Temporary(value),
            modifiers: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn new_variable(var: Variable) -> Self {
        Self {
            root: RefRoot::Variable(var),
            modifiers: SmallVec::new(),
        }
    }

    /// A null constant; the default "no reference yet" value used by
    /// analytic contexts and freshly-created scopes.
    #[must_use]
    pub fn null() -> Self {
        Self::new_constant(Value::Null)
    }

    pub fn push_modifier(&mut self, modifier: Modifier) {
        self.modifiers.push(modifier);
    }

    pub fn pop_modifier(&mut self) -> Option<Modifier> {
        self.modifiers.pop()
    }

    #[must_use]
    pub fn root(&self) -> &RefRoot {
        &self.root
    }

    /// Drills through every modifier and returns the effective value.
    /// Out-of-range array indices and missing object keys yield `null`
    /// (`spec.md` §4.1); indexing a value of the wrong kind is a runtime
    /// error, mirroring `reference_root.cpp`'s `read_reference_opt`.
    ///
    /// # Errors
    /// Returns a formatted message if a non-terminal modifier is applied to
    /// a value of the wrong kind.
    pub fn read(&self) -> Result<Value, String> {
        let mut value = match &self.root {
            RefRoot::Constant(v) | RefRoot::Temporary(v) => v.clone(),
            RefRoot::Variable(var) => var.get(),
        };
        for modifier in &self.modifiers {
            value = read_modifier(&value, modifier)?;
        }
        Ok(value)
    }

    /// Writes `new_value` through the modifier chain, auto-vivifying any
    /// missing array slots or object keys along the way (`spec.md` §4.1).
    ///
    /// # Errors
    /// Fails if the root is a constant or temporary (`spec.md` §4.1
    /// "Failure"), if the root variable is immutable, or if a modifier is
    /// applied to a value of the wrong kind.
    pub fn write(&self, new_value: Value) -> Result<(), String> {
        match &self.root {
            RefRoot::Constant(v) => Err(format!("the constant `{v}` cannot be modified")),
            RefRoot::Temporary(v) => Err(format!("the temporary value `{v}` cannot be modified")),
            RefRoot::Variable(var) => {
                if self.modifiers.is_empty() {
                    return var.set(new_value);
                }
                if var.is_immutable() {
                    return Err(format!(
                        "the variable having value `{}` is immutable and cannot be modified",
                        var.get()
                    ));
                }
                let mut root_value = var.get();
                apply_write(&mut root_value, &self.modifiers, new_value)?;
                var.set(root_value).expect("immutability already checked above");
                Ok(())
            }
        }
    }

    /// Dereferences and replaces the root with a temporary snapshot,
    /// discarding any variable aliasing (`spec.md` §4.1). Used by `return`
    /// when `by_ref` is false, to decouple the result from the caller's
    /// scope.
    ///
    /// # Errors
    /// Propagates a wrong-kind-modifier error from `read`.
    pub fn convert_to_temporary(&mut self) -> Result<(), String> {
        let value = self.read()?;
        self.root = RefRoot::Temporary(value);
        self.modifiers.clear();
        Ok(())
    }

    /// Converts any reference into a freshly allocated variable-root
    /// reference, used for `var`/`const` bindings and for capturing values
    /// into closures (`spec.md` §4.1).
    ///
    /// # Errors
    /// Propagates a wrong-kind-modifier error from `read`.
    pub fn materialize(&self, alloc: &mut dyn FnMut(Value, bool) -> Variable, immutable: bool) -> Result<Self, String> {
        let value = self.read()?;
        Ok(Self::new_variable(alloc(value, immutable)))
    }

    /// Reference-passing copy used when binding a `by_ref` function
    /// parameter to the caller's argument reference. Mirrors
    /// `copy_reference`'s refusal to copy a temporary root — aliasing a
    /// throwaway value by reference would silently observe a value nobody
    /// else can reach, which is never what a script author intends.
    ///
    /// # Errors
    /// Fails if `self`'s root is a `Temporary`.
    pub fn copy_for_pass_by_ref(&self) -> Result<Self, String> {
        if let RefRoot::Temporary(v) = &self.root {
            return Err(format!("the temporary value `{v}` cannot be passed by reference"));
        }
        Ok(self.clone())
    }
}

fn read_modifier(value: &Value, modifier: &Modifier) -> Result<Value, String> {
    match modifier {
        Modifier::ArrayIndex(index) => {
            let Value::Array(array) = value else {
                return Err(format!(
                    "only arrays can be indexed by integer, while the operand has type `{}`",
                    value.type_name()
                ));
            };
            Ok(normalize_index(*index, array.len())
                .map(|i| array[i].clone())
                .unwrap_or(Value::Null))
        }
        Modifier::ObjectKey(key) => {
            let Value::Object(object) = value else {
                return Err(format!(
                    "only objects can be indexed by string, while the operand has type `{}`",
                    value.type_name()
                ));
            };
            Ok(object.get(key.as_ref()).cloned().unwrap_or(Value::Null))
        }
    }
}

/// Wraps a negative index around the container length exactly once
/// (`spec.md` §3 "negative indices wrap once modulo length, still invalid if
/// < 0 after wrap"). Returns `None` if the (possibly wrapped) index is still
/// out of `[0, len)`.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let normalized = if index >= 0 { index } else { index + len as i64 };
    if normalized < 0 || normalized >= len as i64 {
        None
    } else {
        Some(normalized as usize)
    }
}

/// Recursively applies a write through the modifier chain, auto-vivifying
/// missing array slots (front or back, per `spec.md` §4.1) and object keys.
fn apply_write(value: &mut Value, modifiers: &[Modifier], new_value: Value) -> Result<(), String> {
    let Some((head, rest)) = modifiers.split_first() else {
        *value = new_value;
        return Ok(());
    };
    match head {
        Modifier::ArrayIndex(index) => {
            if matches!(value, Value::Null) {
                *value = Value::new_array(Vec::new());
            }
            let Value::Array(array_rc) = value else {
                return Err(format!(
                    "only arrays can be indexed by integer, while the operand has type `{}`",
                    value.type_name()
                ));
            };
            let array = Rc::make_mut(array_rc);
            let len = array.len() as i64;
            let normalized = if *index >= 0 { *index } else { *index + len };
            let slot = if normalized < 0 {
                let prepend = (0 - normalized) as usize;
                let mut fresh = vec![Value::Null; prepend];
                fresh.append(array);
                *array = fresh;
                0
            } else if normalized >= len {
                let append = (normalized - len + 1) as usize;
                array.resize(array.len() + append, Value::Null);
                normalized as usize
            } else {
                normalized as usize
            };
            apply_write(&mut array[slot], rest, new_value)
        }
        Modifier::ObjectKey(key) => {
            if matches!(value, Value::Null) {
                *value = Value::new_object(Object::new());
            }
            let Value::Object(object_rc) = value else {
                return Err(format!(
                    "only objects can be indexed by string, while the operand has type `{}`",
                    value.type_name()
                ));
            };
            let object = Rc::make_mut(object_rc);
            let slot = object.entry(key.clone()).or_insert(Value::Null);
            apply_write(slot, rest, new_value)
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            RefRoot::Constant(v) => write!(f, "constant {v}")?,
            RefRoot::Temporary(v) => write!(f, "temporary {v}")?,
            RefRoot::Variable(v) => write!(f, "{v:?}")?,
        }
        for modifier in &self.modifiers {
            match modifier {
                Modifier::ArrayIndex(i) => write!(f, "[{i}]")?,
                Modifier::ObjectKey(k) => write!(f, ".{k}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VariableId;

    fn var(value: Value, immutable: bool) -> Variable {
        Variable::new(VariableId(0), value, immutable)
    }

    #[test]
    fn write_then_read_round_trips_through_a_variable_root() {
        let r = Reference::new_variable(var(Value::Null, false));
        r.write(Value::Integer(7)).unwrap();
        assert!(r.read().unwrap().equals(&Value::Integer(7)));
    }

    #[test]
    fn constant_and_temporary_roots_reject_writes() {
        let c = Reference::new_constant(Value::Integer(1));
        assert!(c.write(Value::Integer(2)).is_err());
        let t = Reference::new_temporary(Value::Integer(1));
        assert!(t.write(Value::Integer(2)).is_err());
    }

    #[test]
    fn array_auto_vivification_appends_nulls() {
        let r = Reference::new_variable(var(Value::new_array(vec![]), false));
        let mut elem = r.clone();
        elem.push_modifier(Modifier::ArrayIndex(3));
        elem.write(Value::Integer(9)).unwrap();
        let Value::Array(arr) = r.read().unwrap() else {
            panic!("expected array");
        };
        assert_eq!(arr.len(), 4);
        assert!(arr[0].equals(&Value::Null));
        assert!(arr[3].equals(&Value::Integer(9)));
    }

    #[test]
    fn array_negative_index_prepends_nulls() {
        let r = Reference::new_variable(var(Value::new_array(vec![Value::Integer(1)]), false));
        let mut elem = r.clone();
        // index -3 on a length-1 array wraps to -2, still negative: prepend 2 nulls.
        elem.push_modifier(Modifier::ArrayIndex(-3));
        elem.write(Value::Integer(5)).unwrap();
        let Value::Array(arr) = r.read().unwrap() else {
            panic!("expected array");
        };
        assert_eq!(arr.len(), 3);
        assert!(arr[0].equals(&Value::Integer(5)));
        assert!(arr[2].equals(&Value::Integer(1)));
    }

    #[test]
    fn object_chained_auto_vivification() {
        let r = Reference::new_variable(var(Value::new_object(Object::new()), false));
        let mut inner = r.clone();
        inner.push_modifier(Modifier::ObjectKey(Rc::from("a")));
        inner.push_modifier(Modifier::ObjectKey(Rc::from("b")));
        inner.write(Value::Integer(1)).unwrap();
        let Value::Object(obj) = r.read().unwrap() else {
            panic!("expected object");
        };
        let Value::Object(nested) = obj.get("a").unwrap() else {
            panic!("expected nested object");
        };
        assert!(nested.get("b").unwrap().equals(&Value::Integer(1)));
    }

    #[test]
    fn out_of_range_read_yields_null() {
        let r = Reference::new_variable(var(Value::new_array(vec![Value::Integer(1)]), false));
        let mut elem = r.clone();
        elem.push_modifier(Modifier::ArrayIndex(10));
        assert!(elem.read().unwrap().equals(&Value::Null));
    }
}
