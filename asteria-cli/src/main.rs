//! A thin driver over the `asteria` library crate.
//!
//! There is no lexer or parser in scope (`spec.md` §1 "out of scope"), so
//! this binary plays the same role `ouros-cli` plays for `ouros`: it wires
//! up a [`GlobalContext`] with host-chosen ambient services, hand-assembles
//! a `Block` the way a parser would have produced one, and drives it
//! through [`GlobalContext::execute_as_function`], reporting either the
//! returned value or a formatted backtrace.

use std::process::ExitCode;

use asteria::{
    BinaryOp, Block, BreakTarget, Expression, GlobalContext, LimitedTracker, ResourceLimits, SourceLocation, Statement,
    StatementKind, StderrTracer, UnaryOp, Value, Xpnode,
};

fn loc(line: u32) -> SourceLocation {
    SourceLocation::new("demo.ast", line)
}

/// Hand-assembles the "for-each sum" end-to-end scenario from `spec.md` §8:
///
/// ```text
/// var res = 0;
/// const data = [1, 2, 3, 2*5];
/// for (each k, v in data) res += k * v;
/// for (var j = 0; j <= 3; ++j) {
///   res += data[j];
///   if (data[j] == 2) break;
/// }
/// ```
fn demo_program() -> Block {
    Block::new(vec![
        Statement::new(
            loc(1),
            StatementKind::VarDef {
                name: "res".into(),
                immutable: false,
                init: Expression::new(vec![Xpnode::Literal(Value::Integer(0))]),
            },
        ),
        Statement::new(
            loc(2),
            StatementKind::VarDef {
                name: "data".into(),
                immutable: true,
                init: Expression::new(vec![
                    Xpnode::Literal(Value::Integer(1)),
                    Xpnode::Literal(Value::Integer(2)),
                    Xpnode::Literal(Value::Integer(3)),
                    Xpnode::Literal(Value::Integer(2)),
                    Xpnode::Literal(Value::Integer(5)),
                    Xpnode::Binary(BinaryOp::Mul),
                    Xpnode::UnnamedArray(4),
                ]),
            },
        ),
        Statement::new(
            loc(3),
            StatementKind::ForEach {
                key_name: "k".into(),
                mapped_name: "v".into(),
                range: Expression::new(vec![Xpnode::NamedReference("data".into())]),
                body: Block::new(vec![Statement::new(
                    loc(3),
                    StatementKind::Expr(Expression::new(vec![
                        Xpnode::NamedReference("res".into()),
                        Xpnode::NamedReference("k".into()),
                        Xpnode::NamedReference("v".into()),
                        Xpnode::Binary(BinaryOp::Mul),
                        Xpnode::Binary(BinaryOp::AddAssign),
                    ])),
                )]),
            },
        ),
        Statement::new(
            loc(4),
            StatementKind::For {
                init: Box::new(Statement::new(
                    loc(4),
                    StatementKind::VarDef {
                        name: "j".into(),
                        immutable: false,
                        init: Expression::new(vec![Xpnode::Literal(Value::Integer(0))]),
                    },
                )),
                cond: Some(Expression::new(vec![
                    Xpnode::NamedReference("j".into()),
                    Xpnode::Literal(Value::Integer(3)),
                    Xpnode::Binary(BinaryOp::LessEqual),
                ])),
                step: Some(Expression::new(vec![
                    Xpnode::NamedReference("j".into()),
                    Xpnode::Unary(UnaryOp::PreIncrement),
                ])),
                body: Block::new(vec![
                    Statement::new(
                        loc(5),
                        StatementKind::Expr(Expression::new(vec![
                            Xpnode::NamedReference("res".into()),
                            Xpnode::NamedReference("data".into()),
                            Xpnode::NamedReference("j".into()),
                            Xpnode::Subscript,
                            Xpnode::Binary(BinaryOp::AddAssign),
                        ])),
                    ),
                    Statement::new(
                        loc(6),
                        StatementKind::If {
                            cond: Expression::new(vec![
                                Xpnode::NamedReference("data".into()),
                                Xpnode::NamedReference("j".into()),
                                Xpnode::Subscript,
                                Xpnode::Literal(Value::Integer(2)),
                                Xpnode::Binary(BinaryOp::Equal),
                            ]),
                            then_branch: Block::new(vec![Statement::new(
                                loc(6),
                                StatementKind::Break(BreakTarget::Unspecified),
                            )]),
                            else_branch: None,
                        },
                    ),
                ]),
            },
        ),
        Statement::new(
            loc(7),
            StatementKind::Return { by_ref: false, value: Expression::new(vec![Xpnode::NamedReference("res".into())]) },
        ),
    ])
}

fn main() -> ExitCode {
    let file = "demo.ast";
    let tracer: Box<dyn asteria::Tracer> = if std::env::args().any(|a| a == "--trace") {
        Box::new(StderrTracer::new())
    } else {
        Box::new(asteria::NoopTracer)
    };
    let mut global = GlobalContext::new(Box::new(LimitedTracker::new(ResourceLimits::default())), tracer);

    let program = demo_program();
    match global.execute_as_function(file, &program) {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprint!("{err}");
            ExitCode::FAILURE
        }
    }
}
