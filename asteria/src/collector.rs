//! Mark-and-sweep reclamation of cyclic [`Variable`](crate::variable::Variable)
//! graphs (`spec.md` §4.6 "Garbage collection").
//!
//! Ordinary `Rc` strong counts reclaim everything in this interpreter
//! except one shape: a variable whose value is (transitively) a closure
//! that captured a scope holding a reference back to that same variable.
//! `Value` storage itself is plain `Rc` (see `value.rs`) and can never
//! cycle on its own, so the collector only ever needs to trace
//! [`Variable`] cells, mirroring the original implementation's variable
//! recycler (`old/src/reference.hpp`, `tests/recycler.cpp`).

use ahash::AHashSet;

use crate::context::ContextChain;
use crate::value::{Array, Object, Value};
use crate::variable::{Variable, VariableId, WeakVariable};

/// Recursively visits every `Variable` reachable through `value`'s
/// composite structure (array elements, object values, and a function's
/// captured closure environment). Scalars contribute nothing.
pub(crate) fn enumerate_value(value: &Value, callback: &mut dyn FnMut(&Variable) -> bool) {
    match value {
        Value::Array(arr) => enumerate_array(arr, callback),
        Value::Object(obj) => enumerate_object(obj, callback),
        Value::Function(handle) => handle.enumerate_variables(callback),
        Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Real(_) | Value::String(_) => {}
    }
}

fn enumerate_array(arr: &Array, callback: &mut dyn FnMut(&Variable) -> bool) {
    for v in arr {
        enumerate_value(v, callback);
    }
}

fn enumerate_object(obj: &Object, callback: &mut dyn FnMut(&Variable) -> bool) {
    for v in obj.values() {
        enumerate_value(v, callback);
    }
}

/// A single mark-and-sweep pass over a registry of every variable a
/// [`crate::global::GlobalContext`] has ever created.
pub struct Collector;

impl Collector {
    /// Marks every variable reachable from `roots`, then sweeps `registry`:
    /// entries whose variable already has no strong owner are simply
    /// dropped from the registry, and entries that are unreachable from
    /// every root but still have a strong owner (the cyclic-garbage case)
    /// have their value forced to `null`, severing whatever outgoing
    /// references kept the cycle alive so ordinary `Rc` drop glue reclaims
    /// the rest. Returns the number of cyclic variables reclaimed this way.
    pub fn collect(registry: &mut Vec<WeakVariable>, roots: &[&ContextChain]) -> usize {
        let mut reachable: AHashSet<VariableId> = AHashSet::new();
        for root in roots {
            root.enumerate_variables(&mut |var| reachable.insert(var.id()));
        }

        let mut reclaimed = 0usize;
        registry.retain(|weak| match weak.upgrade() {
            None => false,
            Some(var) => {
                if reachable.contains(&var.id()) {
                    true
                } else {
                    var.reset(Value::Null, false);
                    reclaimed += 1;
                    false
                }
            }
        });
        reclaimed
    }
}
