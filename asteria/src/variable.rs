//! Heap cells holding a [`Value`].
//!
//! A `Variable` is the only heap object that can participate in a reference
//! cycle (through a `Value::Function` closure that captures a reference back
//! to a variable that, transitively, holds the closure). Ordinary `Rc`
//! strong counts cannot reclaim such cycles, so `GlobalContext` tracks every
//! `Variable` it creates in a registry and a [`crate::collector::Collector`]
//! traces reachability from explicit roots instead of relying on drop order.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::value::Value;

/// Monotonically increasing identity used by the collector to tell distinct
/// variables apart even if their values happen to compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub(crate) u64);

struct VariableInner {
    id: VariableId,
    value: Value,
    immutable: bool,
}

/// A shared, mutable cell `{ value, immutable }`.
///
/// Cloning a `Variable` clones the handle, not the cell: all clones observe
/// the same mutations, which is what gives closures and `variable`-rooted
/// `Reference`s their lvalue aliasing behavior.
#[derive(Clone)]
pub struct Variable(Rc<RefCell<VariableInner>>);

/// A non-owning handle used by the collector to test reachability without
/// keeping a variable alive on its own.
#[derive(Clone)]
pub struct WeakVariable(Weak<RefCell<VariableInner>>);

impl Variable {
    pub(crate) fn new(id: VariableId, value: Value, immutable: bool) -> Self {
        Self(Rc::new(RefCell::new(VariableInner { id, value, immutable })))
    }

    #[must_use]
    pub fn id(&self) -> VariableId {
        self.0.borrow().id
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakVariable {
        WeakVariable(Rc::downgrade(&self.0))
    }

    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.0.borrow().immutable
    }

    #[must_use]
    pub fn get(&self) -> Value {
        self.0.borrow().value.clone()
    }

    /// Replaces the value unconditionally, bypassing the immutability flag.
    /// Used only by `var`/`func` definitions to install the initializer
    /// result into a variable that was just created as mutable-until-locked
    /// (`spec.md` §4.3 "a fresh tracked variable initialized to null").
    pub(crate) fn reset(&self, value: Value, immutable: bool) {
        let mut inner = self.0.borrow_mut();
        inner.value = value;
        inner.immutable = immutable;
    }

    /// Runtime-checked mutation used by `Reference::write` (`spec.md` §4.1).
    ///
    /// # Errors
    /// Returns a message suitable for wrapping in an `Exception` if the
    /// variable is locked immutable.
    pub fn set(&self, value: Value) -> Result<(), String> {
        let mut inner = self.0.borrow_mut();
        if inner.immutable {
            return Err(format!(
                "the variable having value `{}` is immutable and cannot be modified",
                inner.value
            ));
        }
        inner.value = value;
        Ok(())
    }

    /// Visits `value` (and recurses into nested variables reachable through
    /// captured closures) via `callback`. This is the `enumerate_variables`
    /// hook from `spec.md` §4.6, used by the collector to trace reachability.
    pub(crate) fn enumerate_variables(&self, callback: &mut dyn FnMut(&Variable) -> bool) {
        let value = self.0.borrow().value.clone();
        crate::collector::enumerate_value(&value, callback);
    }
}

impl WeakVariable {
    #[must_use]
    pub fn upgrade(&self) -> Option<Variable> {
        self.0.upgrade().map(Variable)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        write!(
            f,
            "Variable(#{}, {}, {})",
            inner.id.0,
            if inner.immutable { "const" } else { "var" },
            inner.value
        )
    }
}
