//! Statements and blocks (`spec.md` §3 "Statement"/"Block", §4.3).
//!
//! Every statement kind is bound once against an [`ContextChain`] used only
//! for validation (`bind`), then executed arbitrarily many times against a
//! fresh executive context per call (`execute`). This split is grounded in
//! `statement.cpp`'s `bind_in_place`/`execute_in_place` pair; unlike the
//! original, binding here doesn't resolve names to storage slots (there is
//! no bytecode to compile to), so it only checks that every name referenced
//! is declared somewhere on the chain and that `break`/`continue` targets
//! are structurally legal.
//!
//! Every [`Statement`] carries its own [`SourceLocation`]. `execute` wraps
//! the dispatch over its [`StatementKind`] so that an exception unwinding
//! through a statement picks up that statement's location as a backtrace
//! frame before propagating further out (`spec.md` §4.3: "every statement
//! that catches an in-flight exception for propagation appends its own
//! source location before rethrowing"). `throw` is the one exception to
//! this: the location it raises with is already the exception's origin, so
//! appending it again at the same statement would just duplicate the entry.

use crate::context::{ContextChain, ContextKind};
use crate::error::BindError;
use crate::exception::{Exception, SourceLocation};
use crate::expression::Expression;
use crate::function::{Function, FunctionHandle, FunctionHeader, ParamDecl};
use crate::global::GlobalContext;
use crate::reference::{Modifier, Reference};
use crate::value::Value;

/// Mirrors `Block::Execution_result` from the original implementation's
/// `block.hpp`, ordinal-for-ordinal, so the grouping (the four `break_*`
/// variants, the three `continue_*` variants) is easy to cross-check
/// against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Next = 0,
    BreakUnspec = 1,
    BreakSwitch = 2,
    BreakWhile = 3,
    BreakFor = 4,
    ContinueUnspec = 5,
    ContinueWhile = 6,
    ContinueFor = 7,
    Return = 8,
}

impl Status {
    fn is_break(self) -> bool {
        matches!(self, Status::BreakUnspec | Status::BreakSwitch | Status::BreakWhile | Status::BreakFor)
    }

    fn is_continue(self) -> bool {
        matches!(
            self,
            Status::ContinueUnspec | Status::ContinueWhile | Status::ContinueFor
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakTarget {
    Unspecified,
    Switch,
    While,
    For,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueTarget {
    Unspecified,
    While,
    For,
}

#[derive(Clone)]
pub struct SwitchClause {
    /// `None` marks the `default:` clause.
    pub case: Option<Expression>,
    pub body: Vec<Statement>,
}

/// The syntactic shape of a statement, apart from the [`SourceLocation`]
/// every [`Statement`] carries alongside it.
#[derive(Clone)]
pub enum StatementKind {
    Expr(Expression),
    Block(Block),
    VarDef {
        name: Box<str>,
        immutable: bool,
        init: Expression,
    },
    FuncDef {
        name: Box<str>,
        params: Vec<ParamDecl>,
        body: std::rc::Rc<Block>,
    },
    If {
        cond: Expression,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    Switch {
        control: Expression,
        clauses: Vec<SwitchClause>,
    },
    DoWhile {
        body: Block,
        cond: Expression,
    },
    While {
        cond: Expression,
        body: Block,
    },
    For {
        init: Box<Statement>,
        cond: Option<Expression>,
        step: Option<Expression>,
        body: Block,
    },
    ForEach {
        key_name: Box<str>,
        mapped_name: Box<str>,
        range: Expression,
        body: Block,
    },
    Try {
        body: Block,
        except_name: Box<str>,
        catch_body: Block,
    },
    Break(BreakTarget),
    Continue(ContinueTarget),
    Throw {
        value: Expression,
    },
    Return {
        by_ref: bool,
        value: Expression,
    },
}

/// A statement together with the source location it was parsed at.
#[derive(Clone)]
pub struct Statement {
    pub location: SourceLocation,
    pub kind: StatementKind,
}

impl Statement {
    #[must_use]
    pub fn new(location: SourceLocation, kind: StatementKind) -> Self {
        Self { location, kind }
    }

    fn bind(&self, ctx: &ContextChain) -> Result<(), BindError> {
        match &self.kind {
            StatementKind::Expr(e) => e.bind(ctx).map_err(BindError::new),
            StatementKind::Block(b) => b.bind(ctx),
            StatementKind::VarDef { name, init, .. } => {
                // Declared before the initializer is bound: at execute time the
                // variable exists (holding `null`) while its own initializer runs,
                // so `var x = x + 1` must resolve `x` at bind time too (`spec.md`
                // §4.3 "the name is visible to its own initializer as null").
                ctx.declare(name, Reference::null()).map_err(BindError::new)?;
                init.bind(ctx).map_err(BindError::new)
            }
            StatementKind::FuncDef { name, params, body } => {
                // Declared before the body is bound, for the same reason: a
                // function must be able to call itself by name (`spec.md` §4.3
                // "same as variable definition").
                ctx.declare(name, Reference::null()).map_err(BindError::new)?;
                let func_ctx = ctx.new_child(ContextKind::Function);
                func_ctx.declare_predefined_call_frame_names();
                for p in params {
                    func_ctx.declare(&p.name, Reference::null()).map_err(BindError::new)?;
                }
                body.bind(&func_ctx)
            }
            StatementKind::If { cond, then_branch, else_branch } => {
                cond.bind(ctx).map_err(BindError::new)?;
                then_branch.bind(ctx)?;
                if let Some(b) = else_branch {
                    b.bind(ctx)?;
                }
                Ok(())
            }
            StatementKind::Switch { control, clauses } => {
                control.bind(ctx).map_err(BindError::new)?;
                let switch_ctx = ctx.new_child(ContextKind::Switch);
                let mut seen_default = false;
                for clause in clauses {
                    if let Some(e) = &clause.case {
                        e.bind(&switch_ctx).map_err(BindError::new)?;
                    } else {
                        if seen_default {
                            return Err(BindError::new(
                                "multiple `default` clauses exist in the same `switch` statement",
                            ));
                        }
                        seen_default = true;
                    }
                    for s in &clause.body {
                        s.bind(&switch_ctx)?;
                    }
                }
                Ok(())
            }
            StatementKind::DoWhile { body, cond } => {
                // `cond` is bound against the same per-iteration scope the body's
                // own statements declare into, not the outer scope (`spec.md`
                // §4.3 "evaluate condition in that same scope") — so the two
                // share one explicit context here instead of each going through
                // `Block::bind`'s own (separate) child context.
                let loop_ctx = ctx.new_child(ContextKind::Loop);
                body.bind_statements_into(&loop_ctx)?;
                cond.bind(&loop_ctx).map_err(BindError::new)
            }
            StatementKind::While { cond, body } => {
                cond.bind(ctx).map_err(BindError::new)?;
                body.bind(ctx)
            }
            StatementKind::For { init, cond, step, body } => {
                let loop_ctx = ctx.new_child(ContextKind::Loop);
                init.bind(&loop_ctx)?;
                if let Some(c) = cond {
                    c.bind(&loop_ctx).map_err(BindError::new)?;
                }
                if let Some(s) = step {
                    s.bind(&loop_ctx).map_err(BindError::new)?;
                }
                body.bind(&loop_ctx)
            }
            StatementKind::ForEach { key_name, mapped_name, range, body } => {
                range.bind(ctx).map_err(BindError::new)?;
                let loop_ctx = ctx.new_child(ContextKind::Loop);
                loop_ctx.declare(key_name, Reference::null()).map_err(BindError::new)?;
                loop_ctx.declare(mapped_name, Reference::null()).map_err(BindError::new)?;
                body.bind(&loop_ctx)
            }
            StatementKind::Try { body, except_name, catch_body } => {
                body.bind(ctx)?;
                let catch_ctx = ctx.new_child(ContextKind::Block);
                catch_ctx.declare(except_name, Reference::null()).map_err(BindError::new)?;
                catch_ctx.declare_predefined("__backtrace", Reference::null());
                catch_body.bind(&catch_ctx)
            }
            StatementKind::Break(_) => Ok(()),
            // `continue target=switch` is illegal in the original implementation; here
            // `ContinueTarget` simply has no `Switch` variant, so the rejection is
            // structural rather than a check performed here.
            StatementKind::Continue(_) => Ok(()),
            StatementKind::Throw { value } => value.bind(ctx).map_err(BindError::new),
            StatementKind::Return { value, .. } => value.bind(ctx).map_err(BindError::new),
        }
    }

    fn execute(
        &self,
        global: &mut GlobalContext,
        ctx: &ContextChain,
        ref_out: &mut Reference,
    ) -> Result<Status, Exception> {
        match self.execute_kind(global, ctx, ref_out) {
            Ok(status) => Ok(status),
            Err(mut exc) => {
                // `throw` already stamped its own location as the exception's
                // origin; every other statement here is catching-and-rethrowing
                // something that originated elsewhere, so its own location is
                // new backtrace information.
                if !matches!(self.kind, StatementKind::Throw { .. }) {
                    exc.append_backtrace(self.location.clone());
                }
                Err(exc)
            }
        }
    }

    fn execute_kind(
        &self,
        global: &mut GlobalContext,
        ctx: &ContextChain,
        ref_out: &mut Reference,
    ) -> Result<Status, Exception> {
        global.tracer().on_statement();
        match &self.kind {
            StatementKind::Expr(e) => {
                *ref_out = e.evaluate(global, ctx)?;
                Ok(Status::Next)
            }
            StatementKind::Block(b) => Ok(b.execute(global, ctx, ref_out)?),
            StatementKind::VarDef { name, immutable, init } => {
                let var = global.create_tracked_variable(Value::Null, false)?;
                ctx.declare(name, Reference::new_variable(var.clone()))
                    .map_err(Exception::from_native)?;
                let value = init.evaluate(global, ctx)?.read().map_err(Exception::from_native)?;
                var.reset(value, *immutable);
                Ok(Status::Next)
            }
            StatementKind::FuncDef { name, params, body } => {
                let var = global.create_tracked_variable(Value::Null, false)?;
                ctx.declare(name, Reference::new_variable(var.clone()))
                    .map_err(Exception::from_native)?;
                let header = FunctionHeader {
                    file: self.location.file.clone(),
                    line: self.location.line,
                    func_name: name.clone(),
                    params: params.clone(),
                };
                let handle: FunctionHandle = std::rc::Rc::new(Function::new_scripted(header, body.clone(), ctx.clone()));
                var.reset(Value::Function(handle), true);
                Ok(Status::Next)
            }
            StatementKind::If { cond, then_branch, else_branch } => {
                let taken = cond.evaluate(global, ctx)?.read().map_err(Exception::from_native)?.test();
                if taken {
                    then_branch.execute(global, ctx, ref_out)
                } else if let Some(b) = else_branch {
                    b.execute(global, ctx, ref_out)
                } else {
                    Ok(Status::Next)
                }
            }
            StatementKind::Switch { control, clauses } => execute_switch(global, ctx, control, clauses, ref_out),
            StatementKind::DoWhile { body, cond } => loop {
                // A fresh per-iteration scope, shared by the body's statements
                // and the condition evaluated right after them (`spec.md` §4.3:
                // names the body declares must be visible to the condition).
                let loop_ctx = ctx.new_child(ContextKind::Loop);
                let status = body.execute_statements_into(global, &loop_ctx, ref_out)?;
                if status.is_break() {
                    break Ok(Status::Next);
                }
                if !status.is_continue() && status != Status::Next {
                    break Ok(status);
                }
                if !cond.evaluate(global, &loop_ctx)?.read().map_err(Exception::from_native)?.test() {
                    break Ok(Status::Next);
                }
            },
            StatementKind::While { cond, body } => loop {
                if !cond.evaluate(global, ctx)?.read().map_err(Exception::from_native)?.test() {
                    break Ok(Status::Next);
                }
                let status = body.execute(global, ctx, ref_out)?;
                if status.is_break() {
                    break Ok(Status::Next);
                }
                if !status.is_continue() && status != Status::Next {
                    break Ok(status);
                }
            },
            StatementKind::For { init, cond, step, body } => {
                let loop_ctx = ctx.new_child(ContextKind::Loop);
                init.execute(global, &loop_ctx, ref_out)?;
                loop {
                    let keep_going = match cond {
                        Some(c) => c.evaluate(global, &loop_ctx)?.read().map_err(Exception::from_native)?.test(),
                        None => true,
                    };
                    if !keep_going {
                        break;
                    }
                    let status = body.execute(global, &loop_ctx, ref_out)?;
                    if status.is_break() {
                        return Ok(Status::Next);
                    }
                    if !status.is_continue() && status != Status::Next {
                        return Ok(status);
                    }
                    if let Some(s) = step {
                        s.evaluate(global, &loop_ctx)?;
                    }
                }
                Ok(Status::Next)
            }
            StatementKind::ForEach { key_name, mapped_name, range, body } => {
                execute_for_each(global, ctx, key_name, mapped_name, range, body, ref_out)
            }
            StatementKind::Try { body, except_name, catch_body } => {
                match body.execute(global, ctx, ref_out) {
                    Ok(status) => Ok(status),
                    Err(exc) => {
                        let catch_ctx = ctx.new_child(ContextKind::Block);
                        catch_ctx
                            .declare(except_name, Reference::new_temporary(exc.value().clone()))
                            .map_err(Exception::from_native)?;
                        catch_ctx.declare_predefined("__backtrace", Reference::new_temporary(exc.backtrace_value()));
                        catch_body.execute(global, &catch_ctx, ref_out)
                    }
                }
            }
            StatementKind::Break(target) => Ok(match target {
                BreakTarget::Unspecified => Status::BreakUnspec,
                BreakTarget::Switch => Status::BreakSwitch,
                BreakTarget::While => Status::BreakWhile,
                BreakTarget::For => Status::BreakFor,
            }),
            StatementKind::Continue(target) => Ok(match target {
                ContinueTarget::Unspecified => Status::ContinueUnspec,
                ContinueTarget::While => Status::ContinueWhile,
                ContinueTarget::For => Status::ContinueFor,
            }),
            StatementKind::Throw { value } => {
                let v = value.evaluate(global, ctx)?.read().map_err(Exception::from_native)?;
                Err(Exception::new(self.location.clone(), v))
            }
            StatementKind::Return { by_ref, value } => {
                let mut r = value.evaluate(global, ctx)?;
                if !by_ref {
                    r.convert_to_temporary().map_err(Exception::from_native)?;
                }
                *ref_out = r;
                Ok(Status::Return)
            }
        }
    }

    /// Pre-registers names this statement would declare, without evaluating
    /// anything — the `fly_over_in_place` pass used by `switch` so that a
    /// clause which ends up skipped still makes its names resolvable (as
    /// `null`) to statements in sibling clauses that run instead (`spec.md`
    /// §4.3 "switch clauses share one scope").
    fn skip_declare(&self, ctx: &ContextChain) {
        match &self.kind {
            StatementKind::VarDef { name, .. } => {
                ctx.declare(name, Reference::null()).ok();
            }
            StatementKind::FuncDef { name, .. } => {
                ctx.declare(name, Reference::null()).ok();
            }
            _ => {}
        }
    }
}

fn execute_switch(
    global: &mut GlobalContext,
    ctx: &ContextChain,
    control: &Expression,
    clauses: &[SwitchClause],
    ref_out: &mut Reference,
) -> Result<Status, Exception> {
    let control_value = control.evaluate(global, ctx)?.read().map_err(Exception::from_native)?;
    let switch_ctx = ctx.new_child(ContextKind::Switch);

    for clause in clauses {
        for s in &clause.body {
            s.skip_declare(&switch_ctx);
        }
    }

    let mut match_index = None;
    let mut default_index = None;
    for (i, clause) in clauses.iter().enumerate() {
        match &clause.case {
            None => {
                if default_index.is_some() {
                    return Err(Exception::from_native(
                        "multiple `default` clauses exist in the same `switch` statement",
                    ));
                }
                default_index = Some(i);
            }
            Some(expr) => {
                let v = expr.evaluate(global, &switch_ctx)?.read().map_err(Exception::from_native)?;
                if v.equals(&control_value) {
                    match_index = Some(i);
                    break;
                }
            }
        }
    }
    let start = match match_index.or(default_index) {
        Some(i) => i,
        None => return Ok(Status::Next),
    };

    for clause in &clauses[start..] {
        for s in &clause.body {
            let status = s.execute(global, &switch_ctx, ref_out)?;
            if status == Status::BreakUnspec || status == Status::BreakSwitch {
                return Ok(Status::Next);
            }
            if status != Status::Next {
                return Ok(status);
            }
        }
    }
    Ok(Status::Next)
}

fn execute_for_each(
    global: &mut GlobalContext,
    ctx: &ContextChain,
    key_name: &str,
    mapped_name: &str,
    range: &Expression,
    body: &Block,
    ref_out: &mut Reference,
) -> Result<Status, Exception> {
    let range_ref = range.evaluate(global, ctx)?;
    let range_value = range_ref.read().map_err(Exception::from_native)?;
    match range_value {
        Value::Array(arr) => {
            for (i, _) in arr.iter().enumerate() {
                let loop_ctx = ctx.new_child(ContextKind::Loop);
                loop_ctx.declare(key_name, Reference::new_constant(Value::Integer(i as i64))).ok();
                let mut mapped = range_ref.clone();
                mapped.push_modifier(Modifier::ArrayIndex(i as i64));
                loop_ctx.declare(mapped_name, mapped).ok();
                let status = body.execute(global, &loop_ctx, ref_out)?;
                if status.is_break() {
                    return Ok(Status::Next);
                }
                if !status.is_continue() && status != Status::Next {
                    return Ok(status);
                }
            }
        }
        Value::Object(obj) => {
            for key in obj.keys() {
                let loop_ctx = ctx.new_child(ContextKind::Loop);
                loop_ctx
                    .declare(key_name, Reference::new_constant(Value::String(key.clone())))
                    .ok();
                let mut mapped = range_ref.clone();
                mapped.push_modifier(Modifier::ObjectKey(key.clone()));
                loop_ctx.declare(mapped_name, mapped).ok();
                let status = body.execute(global, &loop_ctx, ref_out)?;
                if status.is_break() {
                    return Ok(Status::Next);
                }
                if !status.is_continue() && status != Status::Next {
                    return Ok(status);
                }
            }
        }
        other => {
            return Err(Exception::from_native(format!(
                "the `for each` statement does not accept a range of type {}",
                other.type_name()
            )))
        }
    }
    Ok(Status::Next)
}

/// A sequence of statements executed in their own child scope (`spec.md`
/// §4.3 "a block introduces a fresh scope").
#[derive(Clone, Default)]
pub struct Block(Vec<Statement>);

impl Block {
    #[must_use]
    pub fn new(statements: Vec<Statement>) -> Self {
        Self(statements)
    }

    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.0
    }

    /// # Errors
    /// Returns the first bind-time error found in any statement.
    pub fn bind(&self, ctx: &ContextChain) -> Result<(), BindError> {
        // Mirrors `execute`'s own fresh child scope: a name declared by a
        // statement inside this block must not leak into `ctx` at bind time,
        // or bind-time resolution would accept names that execute-time
        // resolution (which really does scope them to the block) could never
        // see (`spec.md` §3: a mismatch here is a bug, not a runtime error).
        let child = ctx.new_child(ContextKind::Block);
        self.bind_statements_into(&child)
    }

    /// Binds every statement directly into `ctx`, without introducing a
    /// further child scope of its own. Used by constructs (`do`/`while`)
    /// that need their body's declarations and a sibling expression to share
    /// one explicit scope, rather than each getting their own.
    pub(crate) fn bind_statements_into(&self, ctx: &ContextChain) -> Result<(), BindError> {
        for s in &self.0 {
            s.bind(ctx)?;
        }
        Ok(())
    }

    /// # Errors
    /// Propagates any uncaught `Exception` from the statements it runs.
    pub fn execute(
        &self,
        global: &mut GlobalContext,
        parent_ctx: &ContextChain,
        ref_out: &mut Reference,
    ) -> Result<Status, Exception> {
        let ctx = parent_ctx.new_child(ContextKind::Block);
        self.execute_statements_into(global, &ctx, ref_out)
    }

    /// Executes every statement directly against `ctx`, without introducing
    /// a further child scope. See [`Block::bind_statements_into`].
    pub(crate) fn execute_statements_into(
        &self,
        global: &mut GlobalContext,
        ctx: &ContextChain,
        ref_out: &mut Reference,
    ) -> Result<Status, Exception> {
        for s in &self.0 {
            let status = s.execute(global, ctx, ref_out)?;
            if status != Status::Next {
                return Ok(status);
            }
        }
        Ok(Status::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Xpnode;
    use crate::resource::NoLimitTracker;
    use crate::tracer::NoopTracer;

    fn fresh_global() -> GlobalContext {
        GlobalContext::new(Box::new(NoLimitTracker::default()), Box::new(NoopTracer))
    }

    fn l(line: u32) -> SourceLocation {
        SourceLocation::new("t.ast", line)
    }

    #[test]
    fn var_def_is_visible_to_later_statements_but_not_earlier_ones() {
        let mut global = fresh_global();
        let root = ContextChain::new_root(ContextKind::File);
        let block = Block::new(vec![
            Statement::new(
                l(1),
                StatementKind::VarDef {
                    name: "x".into(),
                    immutable: false,
                    init: Expression::new(vec![Xpnode::Literal(Value::Integer(10))]),
                },
            ),
            Statement::new(l(2), StatementKind::Expr(Expression::new(vec![Xpnode::NamedReference("x".into())]))),
        ]);
        let mut ref_out = Reference::null();
        let status = block.execute(&mut global, &root, &mut ref_out).unwrap();
        assert_eq!(status, Status::Next);
        assert!(ref_out.read().unwrap().equals(&Value::Integer(10)));
    }

    #[test]
    fn while_loop_sums_with_break() {
        let mut global = fresh_global();
        let root = ContextChain::new_root(ContextKind::File);
        let var = global.create_tracked_variable(Value::Integer(0), false).unwrap();
        root.declare("sum", Reference::new_variable(var)).unwrap();
        let counter = global.create_tracked_variable(Value::Integer(0), false).unwrap();
        root.declare("i", Reference::new_variable(counter)).unwrap();

        let body = Block::new(vec![
            Statement::new(
                l(1),
                StatementKind::Expr(Expression::new(vec![
                    Xpnode::NamedReference("sum".into()),
                    Xpnode::NamedReference("i".into()),
                    Xpnode::Binary(crate::expression::BinaryOp::AddAssign),
                ])),
            ),
            Statement::new(
                l(2),
                StatementKind::Expr(Expression::new(vec![
                    Xpnode::NamedReference("i".into()),
                    Xpnode::Unary(crate::expression::UnaryOp::PreIncrement),
                ])),
            ),
        ]);
        let while_stmt = Statement::new(
            l(3),
            StatementKind::While {
                cond: Expression::new(vec![
                    Xpnode::NamedReference("i".into()),
                    Xpnode::Literal(Value::Integer(5)),
                    Xpnode::Binary(crate::expression::BinaryOp::Less),
                ]),
                body,
            },
        );
        let block = Block::new(vec![while_stmt]);
        let mut ref_out = Reference::null();
        block.execute(&mut global, &root, &mut ref_out).unwrap();
        assert!(root.lookup("sum").unwrap().read().unwrap().equals(&Value::Integer(10)));
    }

    #[test]
    fn throw_unwinds_until_caught_and_binds_the_exception_value() {
        let mut global = fresh_global();
        let root = ContextChain::new_root(ContextKind::File);
        let try_stmt = Statement::new(
            l(1),
            StatementKind::Try {
                body: Block::new(vec![Statement::new(
                    l(1),
                    StatementKind::Throw {
                        value: Expression::new(vec![Xpnode::Literal(Value::new_string("boom"))]),
                    },
                )]),
                except_name: "e".into(),
                catch_body: Block::new(vec![Statement::new(
                    l(2),
                    StatementKind::Expr(Expression::new(vec![Xpnode::NamedReference("e".into())])),
                )]),
            },
        );
        let mut ref_out = Reference::null();
        let status = Block::new(vec![try_stmt]).execute(&mut global, &root, &mut ref_out).unwrap();
        assert_eq!(status, Status::Next);
        assert!(ref_out.read().unwrap().equals(&Value::new_string("boom")));
    }

    #[test]
    fn switch_falls_through_until_break() {
        let mut global = fresh_global();
        let root = ContextChain::new_root(ContextKind::File);
        let var = global.create_tracked_variable(Value::Integer(0), false).unwrap();
        root.declare("acc", Reference::new_variable(var)).unwrap();
        let switch_stmt = Statement::new(
            l(1),
            StatementKind::Switch {
                control: Expression::new(vec![Xpnode::Literal(Value::Integer(1))]),
                clauses: vec![
                    SwitchClause {
                        case: Some(Expression::new(vec![Xpnode::Literal(Value::Integer(1))])),
                        body: vec![Statement::new(
                            l(2),
                            StatementKind::Expr(Expression::new(vec![
                                Xpnode::NamedReference("acc".into()),
                                Xpnode::Literal(Value::Integer(1)),
                                Xpnode::Binary(crate::expression::BinaryOp::AddAssign),
                            ])),
                        )],
                    },
                    SwitchClause {
                        case: Some(Expression::new(vec![Xpnode::Literal(Value::Integer(2))])),
                        body: vec![
                            Statement::new(
                                l(3),
                                StatementKind::Expr(Expression::new(vec![
                                    Xpnode::NamedReference("acc".into()),
                                    Xpnode::Literal(Value::Integer(10)),
                                    Xpnode::Binary(crate::expression::BinaryOp::AddAssign),
                                ])),
                            ),
                            Statement::new(l(4), StatementKind::Break(BreakTarget::Switch)),
                        ],
                    },
                ],
            },
        );
        let mut ref_out = Reference::null();
        Block::new(vec![switch_stmt]).execute(&mut global, &root, &mut ref_out).unwrap();
        assert!(root.lookup("acc").unwrap().read().unwrap().equals(&Value::Integer(11)));
    }

    #[test]
    fn do_while_condition_sees_names_the_body_just_declared() {
        // do { var x = 5; } while (x < 0);  The loop must execute the body at
        // least once (binding `x`), and `x` must resolve when `cond` runs
        // right after — both at bind time and at execute time, against the
        // same per-iteration scope the body declared into.
        let mut global = fresh_global();
        let root = ContextChain::new_root(ContextKind::File);
        let do_while = Statement::new(
            l(1),
            StatementKind::DoWhile {
                body: Block::new(vec![Statement::new(
                    l(1),
                    StatementKind::VarDef {
                        name: "x".into(),
                        immutable: false,
                        init: Expression::new(vec![Xpnode::Literal(Value::Integer(5))]),
                    },
                )]),
                cond: Expression::new(vec![
                    Xpnode::NamedReference("x".into()),
                    Xpnode::Literal(Value::Integer(0)),
                    Xpnode::Binary(crate::expression::BinaryOp::Less),
                ]),
            },
        );
        let block = Block::new(vec![do_while]);
        block.bind(&root).unwrap();
        let mut ref_out = Reference::null();
        let status = block.execute(&mut global, &root, &mut ref_out).unwrap();
        assert_eq!(status, Status::Next);
    }

    #[test]
    fn a_bare_block_scopes_its_declarations_identically_at_bind_and_execute_time() {
        // `{ var x = 1; } x;`  A name declared inside a bare block must not be
        // visible after it — and that must be rejected at bind time, not
        // surface as a runtime "undeclared identifier" exception.
        let root = ContextChain::new_root(ContextKind::File);
        let program = Block::new(vec![
            Statement::new(
                l(1),
                StatementKind::Block(Block::new(vec![Statement::new(
                    l(1),
                    StatementKind::VarDef {
                        name: "x".into(),
                        immutable: false,
                        init: Expression::new(vec![Xpnode::Literal(Value::Integer(1))]),
                    },
                )])),
            ),
            Statement::new(l(2), StatementKind::Expr(Expression::new(vec![Xpnode::NamedReference("x".into())]))),
        ]);
        let err = program.bind(&root).unwrap_err();
        assert!(err.to_string().contains("x"));
    }
}
