//! Callable values (`spec.md` §3 "Function", §4.5 "Calling convention").
//!
//! A function is either native (a host callback registered through
//! [`GlobalContext`]) or scripted (a bound block paired with the scope
//! chain it closed over). Both share one [`FunctionHeader`] so diagnostics
//! and `__func`/backtraces don't need to know which kind they're looking
//! at.

use std::rc::Rc;

use crate::context::{ContextChain, ContextKind};
use crate::exception::{Exception, SourceLocation};
use crate::global::GlobalContext;
use crate::reference::Reference;
use crate::statement::{Block, Status};
use crate::value::Value;

/// A single named parameter. `by_ref` marks a `&name` parameter, which binds
/// the caller's argument reference directly instead of copying its value
/// into a fresh variable (`spec.md` §4.5 "`&`-prefixed parameters bind by
/// reference").
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Box<str>,
    pub by_ref: bool,
}

impl ParamDecl {
    #[must_use]
    pub fn by_value(name: impl Into<Box<str>>) -> Self {
        Self { name: name.into(), by_ref: false }
    }

    #[must_use]
    pub fn by_reference(name: impl Into<Box<str>>) -> Self {
        Self { name: name.into(), by_ref: true }
    }
}

/// Identifying metadata common to every function value, used for `__func`,
/// `__file`/`__line`, backtrace rendering and the `Display` impl on
/// [`Value::Function`](crate::value::Value::Function).
#[derive(Debug, Clone)]
pub struct FunctionHeader {
    pub file: Box<str>,
    pub line: u32,
    pub func_name: Box<str>,
    pub params: Vec<ParamDecl>,
}

/// A host-provided callback. Takes already-read argument values (native
/// functions never need by-reference parameter binding) and either the
/// global context for reporting resource usage, or raises an `Exception` to
/// signal failure back into the script.
pub type NativeFn = Rc<dyn Fn(&mut GlobalContext, Vec<Value>) -> Result<Value, Exception>>;

enum Body {
    Native(NativeFn),
    Scripted { body: Rc<Block>, closure: ContextChain },
}

/// A callable value. Cheaply cloned through [`FunctionHandle`] (`Rc<Function>`);
/// identity for `==` comparisons on `Value::Function` is the `Rc` pointer,
/// matching `spec.md` §4.2 "functions compare by identity".
pub struct Function {
    header: FunctionHeader,
    body: Body,
}

/// A shared handle to a [`Function`]; this is the payload of
/// [`Value::Function`](crate::value::Value::Function).
pub type FunctionHandle = Rc<Function>;

impl Function {
    #[must_use]
    pub fn new_native(header: FunctionHeader, native: NativeFn) -> Self {
        Self { header, body: Body::Native(native) }
    }

    #[must_use]
    pub fn new_scripted(header: FunctionHeader, body: Rc<Block>, closure: ContextChain) -> Self {
        Self { header, body: Body::Scripted { body, closure } }
    }

    #[must_use]
    pub fn header(&self) -> &FunctionHeader {
        &self.header
    }

    /// Invokes the function with `args` already evaluated to references
    /// (`spec.md` §4.5):
    ///
    /// - a fresh executive context is created, rooted at the function's
    ///   closure (for scripted functions) or with no parent (native);
    /// - `__file`, `__line`, `__func`, `__this` and `__varg` are bound;
    /// - each named parameter binds either by value (a fresh variable
    ///   holding a copy) or by reference (the caller's reference, copied
    ///   into a reference that cannot itself be rebound to a different
    ///   root), with missing trailing arguments defaulting to `null`;
    /// - the body executes; `next` maps to a `null` result, `return` maps
    ///   to its value, any other status reaching here is a binder defect.
    ///
    /// # Errors
    /// Propagates the body's uncaught `Exception`, or a resource-limit
    /// violation reported as one (recursion depth, in particular).
    pub fn invoke(
        &self,
        global: &mut GlobalContext,
        this_value: Value,
        args: Vec<Reference>,
        call_site: SourceLocation,
    ) -> Result<Value, Exception> {
        match &self.body {
            Body::Native(native) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(a.read().map_err(Exception::from_native)?);
                }
                native(global, values)
            }
            Body::Scripted { body, closure } => {
                global.enter_call(&call_site)?;
                global.tracer().on_call(&self.header, &call_site);
                let result = self.invoke_scripted(global, this_value, args, body, closure);
                global.exit_call();
                if let Ok(value) = &result {
                    global.tracer().on_return(&self.header.func_name, value);
                }
                result
            }
        }
    }

    fn invoke_scripted(
        &self,
        global: &mut GlobalContext,
        this_value: Value,
        mut args: Vec<Reference>,
        body: &Rc<Block>,
        closure: &ContextChain,
    ) -> Result<Value, Exception> {
        let ctx = closure.new_child(ContextKind::Function);
        ctx.declare_predefined(
            "__file",
            Reference::new_constant(Value::new_string(self.header.file.as_ref())),
        );
        ctx.declare_predefined(
            "__line",
            Reference::new_constant(Value::Integer(i64::from(self.header.line))),
        );
        ctx.declare_predefined(
            "__func",
            Reference::new_constant(Value::new_string(self.header.func_name.as_ref())),
        );
        ctx.declare_predefined("__this", Reference::new_constant(this_value));

        let named_count = self.header.params.len();
        let varg_values: Result<Vec<Value>, Exception> = args
            .get(named_count..)
            .unwrap_or(&[])
            .iter()
            .map(|r| r.read().map_err(Exception::from_native))
            .collect();
        ctx.declare_predefined("__varg", Reference::new_constant(Value::new_array(varg_values?)));

        for (i, param) in self.header.params.iter().enumerate() {
            let reference = if i < args.len() {
                let incoming = std::mem::replace(&mut args[i], Reference::null());
                if param.by_ref {
                    incoming.copy_for_pass_by_ref().map_err(Exception::from_native)?
                } else {
                    let value = incoming.read().map_err(Exception::from_native)?;
                    Reference::new_variable(global.create_tracked_variable(value, false)?)
                }
            } else {
                Reference::new_variable(global.create_tracked_variable(Value::Null, false)?)
            };
            ctx.declare(&param.name, reference).map_err(Exception::from_native)?;
        }

        let mut ref_out = Reference::null();
        let status = body.execute(global, &ctx, &mut ref_out)?;
        match status {
            Status::Next => Ok(Value::Null),
            Status::Return => ref_out.read().map_err(Exception::from_native),
            _ => Err(Exception::from_native(
                "break or continue escaped its enclosing loop or switch",
            )),
        }
    }

    /// Traces the variables reachable through this function's captured
    /// closure environment (native functions capture nothing).
    pub(crate) fn enumerate_variables(&self, callback: &mut dyn FnMut(&crate::variable::Variable) -> bool) {
        if let Body::Scripted { closure, .. } = &self.body {
            closure.enumerate_variables(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NoLimitTracker;
    use crate::statement::{Statement, StatementKind};
    use crate::tracer::NoopTracer;

    fn fresh_global() -> GlobalContext {
        GlobalContext::new(Box::new(NoLimitTracker::default()), Box::new(NoopTracer))
    }

    #[test]
    fn a_function_with_no_return_statement_yields_null() {
        let mut global = fresh_global();
        let root = ContextChain::new_root(ContextKind::File);
        let header = FunctionHeader {
            file: "test.ast".into(),
            line: 1,
            func_name: "noop".into(),
            params: vec![],
        };
        let func = Function::new_scripted(header, Rc::new(Block::new(vec![])), root);
        let result = func
            .invoke(&mut global, Value::Null, vec![], SourceLocation::new("test.ast", 1))
            .unwrap();
        assert!(result.equals(&Value::Null));
    }

    #[test]
    fn missing_arguments_default_to_null() {
        let mut global = fresh_global();
        let root = ContextChain::new_root(ContextKind::File);
        let header = FunctionHeader {
            file: "test.ast".into(),
            line: 1,
            func_name: "identity".into(),
            params: vec![ParamDecl::by_value("x")],
        };
        let body = Block::new(vec![Statement::new(
            SourceLocation::new("test.ast", 1),
            StatementKind::Return {
                by_ref: false,
                value: crate::expression::Expression::new(vec![crate::expression::Xpnode::NamedReference("x".into())]),
            },
        )]);
        let func = Function::new_scripted(header, Rc::new(body), root);
        let result = func
            .invoke(&mut global, Value::Null, vec![], SourceLocation::new("test.ast", 1))
            .unwrap();
        assert!(result.equals(&Value::Null));
    }
}
