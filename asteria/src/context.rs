//! Name-resolution scopes (`spec.md` §3 "Scope/Context", §4.4).
//!
//! A scope chain is a linked list of frames, innermost first, with lookup
//! walking outward only (`abstract_context.hpp`/`analytic_context.hpp` in
//! the original implementation collapse to this single Rust type instead of
//! a virtual base — the later-generation context design `spec.md` §9 Open
//! Question (b) settles on as authoritative).
//!
//! Frames are `Rc<RefCell<...>>` rather than stack-borrowed: a closure
//! captures its defining frame by cloning the `Rc`, so declarations added to
//! that frame *after* the closure is created (later statements in the same
//! block) remain visible to it, matching ordinary lexical-scope aliasing
//! rather than a point-in-time snapshot.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::reference::Reference;

/// Tags a context with the syntactic construct that introduced it. Used only
/// for diagnostics (tracer events, `Debug` rendering); name resolution never
/// inspects it, per `spec.md` §3 "Lookup walks the parent chain" — a pure,
/// kind-agnostic walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    File,
    Function,
    Block,
    Loop,
    Switch,
}

struct Frame {
    kind: ContextKind,
    names: AHashMap<Box<str>, Reference>,
}

struct Node {
    frame: RefCell<Frame>,
    parent: Option<ContextChain>,
}

/// A scope, shared by `Rc` so that closures can capture it without borrowing
/// from the call stack (`spec.md` §4.5 "a closure captures its enclosing
/// scope chain by reference").
#[derive(Clone)]
pub struct ContextChain(Rc<Node>);

impl ContextChain {
    #[must_use]
    pub fn new_root(kind: ContextKind) -> Self {
        Self(Rc::new(Node {
            frame: RefCell::new(Frame {
                kind,
                names: AHashMap::new(),
            }),
            parent: None,
        }))
    }

    #[must_use]
    pub fn new_child(&self, kind: ContextKind) -> Self {
        Self(Rc::new(Node {
            frame: RefCell::new(Frame {
                kind,
                names: AHashMap::new(),
            }),
            parent: Some(self.clone()),
        }))
    }

    #[must_use]
    pub fn kind(&self) -> ContextKind {
        self.0.frame.borrow().kind
    }

    #[must_use]
    pub fn parent(&self) -> Option<&ContextChain> {
        self.0.parent.as_ref()
    }

    /// Declares `name` in this frame, returning a bind-time error if the
    /// name is reserved (`spec.md` §3 "declaring one is a bind-time error").
    /// Shadowing a name from an outer frame is allowed; an empty name is a
    /// no-op (matching `do_safe_set_named_reference`'s "skip empty
    /// parameter names" behavior in `statement.cpp`).
    ///
    /// # Errors
    /// Returns the offending name if it is reserved.
    pub fn declare(&self, name: &str, reference: Reference) -> Result<(), String> {
        if name.is_empty() {
            return Ok(());
        }
        if name.starts_with("__") {
            return Err(format!("the name `{name}` is reserved and cannot be used"));
        }
        self.0.frame.borrow_mut().names.insert(name.into(), reference);
        Ok(())
    }

    /// Like [`ContextChain::declare`] but bypasses the reserved-name check,
    /// for the engine's own predefined names (`__file`, `__line`, `__func`,
    /// `__this`, `__varg`, `__backtrace`) described in `spec.md` §4.4.
    pub fn declare_predefined(&self, name: &str, reference: Reference) {
        self.0.frame.borrow_mut().names.insert(name.into(), reference);
    }

    /// Pre-registers dummy placeholders for every name a call frame binds at
    /// execute time (`__file`, `__line`, `__func`, `__this`, `__varg`;
    /// `spec.md` §4.4 "Predefined names inside a function"), so that binding
    /// a function body which references one of them succeeds instead of
    /// reporting a spurious "undeclared identifier" — `Function::invoke`
    /// overwrites these with the real per-call values before the body runs.
    pub fn declare_predefined_call_frame_names(&self) {
        for name in ["__file", "__line", "__func", "__this", "__varg"] {
            self.declare_predefined(name, Reference::null());
        }
    }

    /// Walks the parent chain looking for `name` (`spec.md` §4.4 `lookup`).
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Reference> {
        let mut cur = Some(self);
        while let Some(ctx) = cur {
            if let Some(r) = ctx.0.frame.borrow().names.get(name) {
                return Some(r.clone());
            }
            cur = ctx.0.parent.as_ref();
        }
        None
    }

    /// True iff `name` is declared anywhere on the chain. Used at bind time
    /// to decide whether a name reference can be resolved at all (`spec.md`
    /// §3 invariant: "Name resolution at execute time must find every name
    /// that bind time resolved").
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// True iff `self` and `other` are the very same frame (used by the
    /// binder to detect, e.g., a `switch` clause sharing one scope with its
    /// siblings).
    #[must_use]
    pub fn is_same_frame(&self, other: &ContextChain) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Visits every [`crate::variable::Variable`] directly bound in this
    /// frame or any ancestor frame, via `callback`. This is the collector's
    /// entry point for tracing a live scope chain (a root scope, or a
    /// closure's captured environment) — the actual recursion into each
    /// variable's own contents happens through
    /// [`crate::variable::Variable::enumerate_variables`].
    pub(crate) fn enumerate_variables(&self, callback: &mut dyn FnMut(&crate::variable::Variable) -> bool) {
        let mut cur = Some(self);
        while let Some(ctx) = cur {
            for reference in ctx.0.frame.borrow().names.values() {
                if let crate::reference::RefRoot::Variable(var) = reference.root() {
                    if callback(var) {
                        var.enumerate_variables(callback);
                    }
                }
            }
            cur = ctx.0.parent.as_ref();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn reserved_names_are_rejected_at_declare() {
        let root = ContextChain::new_root(ContextKind::File);
        let err = root
            .declare("__secret", Reference::new_constant(Value::Null))
            .unwrap_err();
        assert!(err.contains("reserved"));
    }

    #[test]
    fn lookup_walks_the_parent_chain() {
        let root = ContextChain::new_root(ContextKind::File);
        root.declare("x", Reference::new_constant(Value::Integer(1))).unwrap();
        let child = root.new_child(ContextKind::Block);
        assert!(child.lookup("x").is_some());
        assert!(child.lookup("y").is_none());
    }

    #[test]
    fn shadowing_does_not_mutate_the_parent() {
        let root = ContextChain::new_root(ContextKind::File);
        root.declare("x", Reference::new_constant(Value::Integer(1))).unwrap();
        let child = root.new_child(ContextKind::Block);
        child.declare("x", Reference::new_constant(Value::Integer(2))).unwrap();
        assert!(child.lookup("x").unwrap().read().unwrap().equals(&Value::Integer(2)));
        assert!(root.lookup("x").unwrap().read().unwrap().equals(&Value::Integer(1)));
    }

    #[test]
    fn declarations_after_a_closure_captures_the_frame_remain_visible() {
        let root = ContextChain::new_root(ContextKind::File);
        let captured = root.clone();
        root.declare("late", Reference::new_constant(Value::Integer(9))).unwrap();
        assert!(captured.lookup("late").is_some());
    }
}
