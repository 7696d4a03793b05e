//! The root of one interpreter run (`spec.md` §3 "Global context").
//!
//! A [`GlobalContext`] owns every [`Variable`] ever created (so the
//! [`Collector`] has something to sweep), the host-supplied
//! [`ResourceTracker`] and [`Tracer`], and the current call-stack depth.
//! Constructing one is the entire embedding API: a host picks a tracker and
//! a tracer, builds a `GlobalContext`, binds a [`Block`], and calls
//! [`GlobalContext::execute_as_function`].

use crate::context::{ContextChain, ContextKind};
use crate::exception::{Exception, SourceLocation};
use crate::reference::Reference;
use crate::resource::ResourceTracker;
use crate::statement::{Block, Status};
use crate::tracer::Tracer;
use crate::value::Value;
use crate::variable::{Variable, VariableId, WeakVariable};

/// Owns the variable registry and ambient services for one run.
pub struct GlobalContext {
    next_id: u64,
    registry: Vec<WeakVariable>,
    resource_tracker: Box<dyn ResourceTracker>,
    tracer: Box<dyn Tracer>,
    call_depth: u32,
}

impl GlobalContext {
    #[must_use]
    pub fn new(resource_tracker: Box<dyn ResourceTracker>, tracer: Box<dyn Tracer>) -> Self {
        Self { next_id: 0, registry: Vec::new(), resource_tracker, tracer, call_depth: 0 }
    }

    #[must_use]
    pub fn tracer(&self) -> &dyn Tracer {
        self.tracer.as_ref()
    }

    /// Allocates a fresh tracked variable and registers it so the collector
    /// can later reach it. This is the enforcement point for
    /// [`crate::resource::ResourceLimits::max_tracked_variables`] (`spec.md`
    /// §9 ambient stack): the host's tracker is consulted before the
    /// allocation is handed back, so every `var`/parameter-binding call site
    /// that creates a variable propagates the limit as a catchable
    /// `Exception` instead of silently exceeding it.
    ///
    /// # Errors
    /// Returns the tracker's `Exception` if the limit trips.
    pub fn create_tracked_variable(&mut self, value: Value, immutable: bool) -> Result<Variable, Exception> {
        self.resource_tracker
            .on_variable_created(self.registry.len() as u64 + 1)
            .map_err(|e| e.into_exception())?;
        let id = VariableId(self.next_id);
        self.next_id += 1;
        let var = Variable::new(id, value, immutable);
        self.registry.push(var.downgrade());
        self.tracer.on_variable_created();
        Ok(var)
    }

    /// Called on entry to a scripted function call; checks the recursion
    /// depth limit before the callee's scope is even created (`spec.md` §9
    /// ambient stack: an unbounded recursive script must not be able to
    /// abort the embedding host).
    ///
    /// # Errors
    /// Returns an `Exception` if the limit (or a cooperative cancellation
    /// request) trips.
    pub(crate) fn enter_call(&mut self, call_site: &SourceLocation) -> Result<(), Exception> {
        self.call_depth += 1;
        if let Err(e) = self.resource_tracker.check_recursion_depth(self.call_depth) {
            self.tracer.on_exception_raised(call_site);
            self.call_depth -= 1;
            return Err(e.into_exception());
        }
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.call_depth -= 1;
    }

    /// Runs one mark-and-sweep [`crate::collector::Collector`] pass rooted
    /// at `roots`, reporting the number of cyclic variables reclaimed to
    /// the tracer. A host decides when to call this (e.g. periodically, or
    /// between top-level statements); the interpreter never calls it on its
    /// own.
    pub fn collect(&mut self, roots: &[&ContextChain]) -> usize {
        let reclaimed = crate::collector::Collector::collect(&mut self.registry, roots);
        self.tracer.on_collection_run(reclaimed);
        reclaimed
    }

    #[must_use]
    pub fn live_variable_count(&self) -> usize {
        self.registry.len()
    }

    /// Binds and runs `body` as a top-level program (`spec.md` §4.5
    /// "`execute_as_function`"): a fresh root scope is created (file-scope
    /// acts as the outermost function scope, matching the original
    /// implementation's treatment of the top-level block), `__file` is
    /// bound, and the block runs to completion. A bare `return` at top
    /// level yields its value; falling off the end yields `null`.
    ///
    /// # Errors
    /// Propagates a bind-time error, or the program's uncaught `Exception`.
    pub fn execute_as_function(&mut self, file: &str, body: &Block) -> Result<Value, ExecuteError> {
        let root = ContextChain::new_root(ContextKind::File);
        root.declare_predefined("__file", Reference::new_constant(Value::new_string(file)));
        body.bind(&root).map_err(ExecuteError::Bind)?;

        let mut ref_out = Reference::null();
        match body.execute(self, &root, &mut ref_out) {
            Ok(Status::Return) => ref_out.read().map_err(Exception::from_native).map_err(ExecuteError::Runtime),
            Ok(_) => Ok(Value::Null),
            Err(exc) => Err(ExecuteError::Runtime(exc)),
        }
    }
}

/// Either stage of running a program can fail: binding rejects a malformed
/// program before anything executes, running can raise an uncaught
/// exception (`spec.md` §6 "execute_as_function").
#[derive(Debug)]
pub enum ExecuteError {
    Bind(crate::error::BindError),
    Runtime(Exception),
}

impl std::fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bind(e) => write!(f, "{e}"),
            Self::Runtime(e) => write!(f, "{}", e.render()),
        }
    }
}

impl std::error::Error for ExecuteError {}
