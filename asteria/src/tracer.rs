//! Diagnostic hooks into the tree-walker (`spec.md` §9 ambient stack).
//!
//! Adapted from the teacher's `VmTracer` trait (`crates/ouros/src/tracer.rs`):
//! there, a bytecode VM fires `on_instruction`/`on_call`/`on_cell_load`
//! events; here a statement-walking interpreter fires the equivalent
//! tree-walking events. All methods default to no-ops so implementing a
//! tracer only requires overriding what you actually want to observe, and
//! the default [`NoopTracer`] compiles down to nothing.

use std::cell::RefCell;

use crate::exception::SourceLocation;
use crate::function::FunctionHeader;
use crate::value::Value;

/// One observable event during execution.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    Statement,
    Call { header: SourceLocation, func_name: Box<str> },
    Return { func_name: Box<str> },
    VariableCreated,
    CollectionRun { reclaimed: usize },
    ExceptionRaised { origin: SourceLocation },
}

/// Observes interpreter execution without influencing it. Every method has
/// a no-op default so a tracer only needs to implement the events it cares
/// about.
pub trait Tracer {
    fn on_statement(&self) {}
    fn on_call(&self, _header: &FunctionHeader, _call_site: &SourceLocation) {}
    fn on_return(&self, _func_name: &str, _result: &Value) {}
    fn on_variable_created(&self) {}
    fn on_collection_run(&self, _reclaimed: usize) {}
    fn on_exception_raised(&self, _origin: &SourceLocation) {}
}

/// The default tracer: observes nothing, costs nothing.
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Writes one line per event to stderr, optionally stopping itself after a
/// fixed number of statements (useful for bounding output when tracing a
/// runaway script), mirroring the teacher's `StderrTracer`.
pub struct StderrTracer {
    statement_limit: Option<u64>,
    statement_count: RefCell<u64>,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self { statement_limit: None, statement_count: RefCell::new(0) }
    }

    #[must_use]
    pub fn with_limit(limit: u64) -> Self {
        Self { statement_limit: Some(limit), statement_count: RefCell::new(0) }
    }

    fn within_limit(&self) -> bool {
        let mut count = self.statement_count.borrow_mut();
        *count += 1;
        self.statement_limit.is_none_or(|limit| *count <= limit)
    }
}

impl Default for StderrTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for StderrTracer {
    fn on_statement(&self) {
        if self.within_limit() {
            eprintln!("statement");
        }
    }

    fn on_call(&self, header: &FunctionHeader, call_site: &SourceLocation) {
        eprintln!("call {} from {}", header.func_name, call_site);
    }

    fn on_return(&self, func_name: &str, result: &Value) {
        eprintln!("return from {func_name}: {result}");
    }

    fn on_variable_created(&self) {
        eprintln!("variable created");
    }

    fn on_collection_run(&self, reclaimed: usize) {
        eprintln!("collection reclaimed {reclaimed} variables");
    }

    fn on_exception_raised(&self, origin: &SourceLocation) {
        eprintln!("exception raised at {origin}");
    }
}

/// Aggregates simple execution counters instead of emitting per-event
/// output, mirroring the teacher's `ProfilingTracer`/`ProfilingReport`.
#[derive(Default)]
pub struct ProfilingTracer {
    statements: RefCell<u64>,
    calls: RefCell<u64>,
    variables_created: RefCell<u64>,
    collections: RefCell<u64>,
    reclaimed: RefCell<u64>,
    exceptions: RefCell<u64>,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        ProfilingReport {
            statements: *self.statements.borrow(),
            calls: *self.calls.borrow(),
            variables_created: *self.variables_created.borrow(),
            collections: *self.collections.borrow(),
            reclaimed: *self.reclaimed.borrow(),
            exceptions: *self.exceptions.borrow(),
        }
    }
}

impl Tracer for ProfilingTracer {
    fn on_statement(&self) {
        *self.statements.borrow_mut() += 1;
    }

    fn on_call(&self, _header: &FunctionHeader, _call_site: &SourceLocation) {
        *self.calls.borrow_mut() += 1;
    }

    fn on_variable_created(&self) {
        *self.variables_created.borrow_mut() += 1;
    }

    fn on_collection_run(&self, reclaimed: usize) {
        *self.collections.borrow_mut() += 1;
        *self.reclaimed.borrow_mut() += reclaimed as u64;
    }

    fn on_exception_raised(&self, _origin: &SourceLocation) {
        *self.exceptions.borrow_mut() += 1;
    }
}

/// A snapshot of [`ProfilingTracer`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfilingReport {
    pub statements: u64,
    pub calls: u64,
    pub variables_created: u64,
    pub collections: u64,
    pub reclaimed: u64,
    pub exceptions: u64,
}

impl std::fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} statements, {} calls, {} variables created, {} collections ({} reclaimed), {} exceptions",
            self.statements, self.calls, self.variables_created, self.collections, self.reclaimed, self.exceptions
        )
    }
}

/// Records every event verbatim, for tests and for tooling that wants to
/// replay a run, mirroring the teacher's `RecordingTracer`.
#[derive(Default)]
pub struct RecordingTracer {
    events: RefCell<Vec<TraceEvent>>,
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { events: RefCell::new(Vec::new()), limit: Some(limit) }
    }

    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    fn push(&self, event: TraceEvent) {
        let mut events = self.events.borrow_mut();
        if self.limit.is_none_or(|limit| events.len() < limit) {
            events.push(event);
        }
    }
}

impl Tracer for RecordingTracer {
    fn on_statement(&self) {
        self.push(TraceEvent::Statement);
    }

    fn on_call(&self, header: &FunctionHeader, call_site: &SourceLocation) {
        self.push(TraceEvent::Call { header: call_site.clone(), func_name: header.func_name.clone() });
    }

    fn on_return(&self, func_name: &str, _result: &Value) {
        self.push(TraceEvent::Return { func_name: func_name.into() });
    }

    fn on_variable_created(&self) {
        self.push(TraceEvent::VariableCreated);
    }

    fn on_collection_run(&self, reclaimed: usize) {
        self.push(TraceEvent::CollectionRun { reclaimed });
    }

    fn on_exception_raised(&self, origin: &SourceLocation) {
        self.push(TraceEvent::ExceptionRaised { origin: origin.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiling_tracer_counts_statements_and_calls() {
        let tracer = ProfilingTracer::new();
        tracer.on_statement();
        tracer.on_statement();
        let report = tracer.report();
        assert_eq!(report.statements, 2);
        assert_eq!(report.calls, 0);
    }

    #[test]
    fn recording_tracer_respects_its_limit() {
        let tracer = RecordingTracer::with_limit(1);
        tracer.on_statement();
        tracer.on_statement();
        assert_eq!(tracer.events().len(), 1);
    }
}
