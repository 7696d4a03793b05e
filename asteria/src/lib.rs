//! Asteria: an embeddable, dynamically-typed scripting language.
//!
//! This crate is the semantic engine only (`spec.md` §1): name resolution,
//! expression/statement evaluation, closures, control flow and exception
//! propagation for an already-parsed program. It does not lex, parse, or
//! read files — a host (or, in this repository, `asteria-cli`) supplies an
//! AST built from [`statement::Block`]/[`expression::Expression`] values and
//! drives it through [`global::GlobalContext::execute_as_function`].

mod collector;
pub mod context;
pub mod error;
pub mod exception;
pub mod expression;
pub mod function;
pub mod global;
pub mod reference;
pub mod resource;
pub mod statement;
pub mod tracer;
pub mod value;
pub mod variable;

pub use crate::context::{ContextChain, ContextKind};
pub use crate::error::BindError;
pub use crate::exception::{Exception, SourceLocation};
pub use crate::expression::{BinaryOp, ClosureDef, Expression, UnaryOp, Xpnode};
pub use crate::function::{Function, FunctionHandle, FunctionHeader, NativeFn, ParamDecl};
pub use crate::global::{ExecuteError, GlobalContext};
pub use crate::reference::{Modifier, RefRoot, Reference};
pub use crate::resource::{LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker};
pub use crate::statement::{Block, BreakTarget, ContinueTarget, Statement, StatementKind, Status, SwitchClause};
pub use crate::tracer::{NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, Tracer, TraceEvent};
pub use crate::value::{Array, Object, Value};
pub use crate::variable::{Variable, VariableId, WeakVariable};
