//! Lowering from the swc tree to the executable [`hir`](crate::hir).
//!
//! Everything ES5 can express lowers, along with arrows, template literals,
//! `**`, `??`, shorthand properties and methods. Syntax with no evaluation
//! semantics here (classes, generators, async functions, destructuring,
//! spread, optional chaining) is reported as
//! [`ParseError::Unsupported`] at its offset instead of being dropped.

use std::rc::Rc;

use swc_core::common::Spanned;
use swc_core::ecma::ast as swc;

use crate::error::{ParseError, Result};
use crate::hir::*;
use crate::ident::Identifier;
use crate::parse::parse;
use crate::span::offset;

/// Remaining stack below which lowering moves to a fresh segment.
const RED_ZONE: usize = 64 * 1024;

/// Segment size allocated when the red zone is hit.
const SEGMENT: usize = 1024 * 1024;

/// Parse and lower a module body in one step.
///
/// # Example
///
/// ```rust
/// use probar_js::hir::StmtKind;
///
/// let program = probar_js::compile("for (var k in o) { n++; }").unwrap();
/// assert!(matches!(program.body[0].kind, StmtKind::ForIn { .. }));
/// assert_eq!(program.body[0].span.to_string(), "0:25");
/// ```
pub fn compile(source: &str) -> Result<Program> {
    lower(&parse(source)?)
}

/// Lower a parsed script.
pub fn lower(script: &swc::Script) -> Result<Program> {
    Ok(Program {
        body: lower_stmts(&script.body)?,
        span: script.span.into(),
    })
}

/// Format a number the way JavaScript prints it for integral and special values.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

fn unsupported<T>(construct: &str, span: swc_core::common::Span) -> Result<T> {
    Err(ParseError::unsupported(construct, offset(span.lo)))
}

fn name(ident: &swc::Ident) -> Identifier {
    Identifier::new_unchecked(ident.sym.to_string())
}

fn lower_stmts(stmts: &[swc::Stmt]) -> Result<Vec<Stmt>> {
    stmts.iter().map(lower_stmt).collect()
}

fn lower_block(block: &swc::BlockStmt) -> Result<Block> {
    Ok(Block {
        body: lower_stmts(&block.stmts)?,
        span: block.span.into(),
    })
}

fn lower_boxed(stmt: &swc::Stmt) -> Result<Box<Stmt>> {
    lower_stmt(stmt).map(Box::new)
}

fn lower_stmt(stmt: &swc::Stmt) -> Result<Stmt> {
    stacker::maybe_grow(RED_ZONE, SEGMENT, || {
        let kind = match stmt {
            swc::Stmt::Expr(s) => StmtKind::Expr(lower_expr(&s.expr)?),
            swc::Stmt::Block(block) => StmtKind::Block(lower_block(block)?),
            swc::Stmt::Empty(_) => StmtKind::Empty,
            swc::Stmt::Debugger(_) => StmtKind::Debugger,
            swc::Stmt::With(s) => StmtKind::With {
                object: lower_expr(&s.obj)?,
                body: lower_boxed(&s.body)?,
            },
            swc::Stmt::Return(s) => StmtKind::Return(s.arg.as_deref().map(lower_expr).transpose()?),
            swc::Stmt::Labeled(s) => StmtKind::Labeled {
                label: name(&s.label),
                body: lower_boxed(&s.body)?,
            },
            swc::Stmt::Break(s) => StmtKind::Break(s.label.as_ref().map(name)),
            swc::Stmt::Continue(s) => StmtKind::Continue(s.label.as_ref().map(name)),
            swc::Stmt::If(s) => StmtKind::If {
                test: lower_expr(&s.test)?,
                consequent: lower_boxed(&s.cons)?,
                alternate: s.alt.as_deref().map(lower_boxed).transpose()?,
            },
            swc::Stmt::Switch(s) => StmtKind::Switch {
                discriminant: lower_expr(&s.discriminant)?,
                cases: s.cases.iter().map(lower_case).collect::<Result<_>>()?,
            },
            swc::Stmt::Throw(s) => StmtKind::Throw(lower_expr(&s.arg)?),
            swc::Stmt::Try(s) => StmtKind::Try {
                block: lower_block(&s.block)?,
                handler: s.handler.as_ref().map(lower_catch).transpose()?,
                finalizer: s.finalizer.as_ref().map(lower_block).transpose()?,
            },
            swc::Stmt::While(s) => StmtKind::While {
                test: lower_expr(&s.test)?,
                body: lower_boxed(&s.body)?,
            },
            swc::Stmt::DoWhile(s) => StmtKind::DoWhile {
                body: lower_boxed(&s.body)?,
                test: lower_expr(&s.test)?,
            },
            swc::Stmt::For(s) => StmtKind::For {
                init: s.init.as_ref().map(lower_for_init).transpose()?,
                test: s.test.as_deref().map(lower_expr).transpose()?,
                update: s.update.as_deref().map(lower_expr).transpose()?,
                body: lower_boxed(&s.body)?,
            },
            swc::Stmt::ForIn(s) => StmtKind::ForIn {
                left: lower_for_in_left(&s.left, s.span)?,
                right: lower_expr(&s.right)?,
                body: lower_boxed(&s.body)?,
            },
            swc::Stmt::Decl(decl) => lower_decl(decl)?,
            swc::Stmt::ForOf(s) => return unsupported("for-of loop", s.span),
        };
        Ok(Stmt::new(kind, stmt.span().into()))
    })
}

fn lower_decl(decl: &swc::Decl) -> Result<StmtKind> {
    match decl {
        swc::Decl::Fn(f) => Ok(StmtKind::Function(Rc::new(lower_function(
            Some(&f.ident),
            &f.function,
        )?))),
        swc::Decl::Var(var) => {
            let (kind, decls) = lower_var(var)?;
            Ok(StmtKind::Var { kind, decls })
        }
        swc::Decl::Class(class) => unsupported("class declaration", class.class.span),
        other => unsupported("declaration", other.span()),
    }
}

fn var_kind(kind: swc::VarDeclKind) -> VarKind {
    match kind {
        swc::VarDeclKind::Var => VarKind::Var,
        swc::VarDeclKind::Let => VarKind::Let,
        swc::VarDeclKind::Const => VarKind::Const,
    }
}

fn lower_var(var: &swc::VarDecl) -> Result<(VarKind, Vec<VarDeclarator>)> {
    let decls = var
        .decls
        .iter()
        .map(|decl| {
            Ok(VarDeclarator {
                name: binding(&decl.name)?,
                init: decl.init.as_deref().map(lower_expr).transpose()?,
                span: decl.span.into(),
            })
        })
        .collect::<Result<_>>()?;
    Ok((var_kind(var.kind), decls))
}

/// Name bound by a simple pattern.
fn binding(pat: &swc::Pat) -> Result<Identifier> {
    match pat {
        swc::Pat::Ident(binding) => Ok(name(&binding.id)),
        other => unsupported("destructuring pattern", other.span()),
    }
}

fn lower_for_init(init: &swc::VarDeclOrExpr) -> Result<ForInit> {
    match init {
        swc::VarDeclOrExpr::VarDecl(var) => {
            let (kind, decls) = lower_var(var)?;
            Ok(ForInit::Var { kind, decls })
        }
        swc::VarDeclOrExpr::Expr(expr) => Ok(ForInit::Expr(lower_expr(expr)?)),
    }
}

fn lower_for_in_left(head: &swc::ForHead, span: swc_core::common::Span) -> Result<ForInLeft> {
    match head {
        swc::ForHead::VarDecl(var) => match var.decls.as_slice() {
            [decl] if decl.init.is_none() => Ok(ForInLeft::Var {
                kind: var_kind(var.kind),
                name: binding(&decl.name)?,
            }),
            _ => unsupported("for-in declaration", var.span),
        },
        swc::ForHead::Pat(pat) => match &**pat {
            swc::Pat::Ident(binding) => Ok(ForInLeft::Target(Expr::new(
                ExprKind::Ident(name(&binding.id)),
                binding.id.span.into(),
            ))),
            swc::Pat::Expr(expr) => Ok(ForInLeft::Target(lower_target(expr)?)),
            other => unsupported("destructuring pattern", other.span()),
        },
        _ => unsupported("for-in head", span),
    }
}

fn lower_case(case: &swc::SwitchCase) -> Result<SwitchCase> {
    Ok(SwitchCase {
        test: case.test.as_deref().map(lower_expr).transpose()?,
        consequent: lower_stmts(&case.cons)?,
        span: case.span.into(),
    })
}

fn lower_catch(clause: &swc::CatchClause) -> Result<CatchClause> {
    Ok(CatchClause {
        param: clause.param.as_ref().map(binding).transpose()?,
        body: lower_block(&clause.body)?,
        span: clause.span.into(),
    })
}

fn lower_function(ident: Option<&swc::Ident>, function: &swc::Function) -> Result<Function> {
    if function.is_generator {
        return unsupported("generator function", function.span);
    }
    if function.is_async {
        return unsupported("async function", function.span);
    }
    let params = function
        .params
        .iter()
        .map(|param| binding(&param.pat))
        .collect::<Result<_>>()?;
    let Some(body) = &function.body else {
        return unsupported("function without body", function.span);
    };
    Ok(Function {
        name: ident.map(name),
        params,
        body: lower_block(body)?,
        is_arrow: false,
        span: function.span.into(),
    })
}

fn lower_arrow(arrow: &swc::ArrowExpr) -> Result<Function> {
    if arrow.is_async || arrow.is_generator {
        return unsupported("async arrow function", arrow.span);
    }
    let params = arrow.params.iter().map(binding).collect::<Result<_>>()?;
    let body = match &*arrow.body {
        swc::BlockStmtOrExpr::BlockStmt(block) => lower_block(block)?,
        swc::BlockStmtOrExpr::Expr(expr) => {
            let value = lower_expr(expr)?;
            let span = value.span;
            Block {
                body: vec![Stmt::new(StmtKind::Return(Some(value)), span)],
                span,
            }
        }
    };
    Ok(Function {
        name: None,
        params,
        body,
        is_arrow: true,
        span: arrow.span.into(),
    })
}

fn lower_expr(expr: &swc::Expr) -> Result<Expr> {
    stacker::maybe_grow(RED_ZONE, SEGMENT, || {
        let kind = match expr {
            swc::Expr::Paren(paren) => return lower_expr(&paren.expr),
            swc::Expr::This(_) => ExprKind::This,
            swc::Expr::Ident(ident) => ExprKind::Ident(name(ident)),
            swc::Expr::Lit(lit) => lower_lit(lit)?,
            swc::Expr::Tpl(tpl) => lower_template(tpl)?,
            swc::Expr::Array(array) => ExprKind::Array(
                array
                    .elems
                    .iter()
                    .map(|elem| elem.as_ref().map(argument).transpose())
                    .collect::<Result<_>>()?,
            ),
            swc::Expr::Object(object) => {
                ExprKind::Object(object.props.iter().map(lower_prop).collect::<Result<_>>()?)
            }
            swc::Expr::Fn(f) => {
                ExprKind::Function(Rc::new(lower_function(f.ident.as_ref(), &f.function)?))
            }
            swc::Expr::Arrow(arrow) => ExprKind::Function(Rc::new(lower_arrow(arrow)?)),
            swc::Expr::Unary(unary) => ExprKind::Unary {
                op: unary_op(unary.op),
                argument: Box::new(lower_expr(&unary.arg)?),
            },
            swc::Expr::Update(update) => ExprKind::Update {
                op: match update.op {
                    swc::UpdateOp::PlusPlus => UpdateOp::Increment,
                    swc::UpdateOp::MinusMinus => UpdateOp::Decrement,
                },
                prefix: update.prefix,
                argument: Box::new(lower_target(&update.arg)?),
            },
            swc::Expr::Bin(bin) => lower_binary(bin)?,
            swc::Expr::Assign(assign) => ExprKind::Assign {
                op: assign_op(assign.op),
                target: Box::new(lower_assign_target(&assign.left)?),
                value: Box::new(lower_expr(&assign.right)?),
            },
            swc::Expr::Member(member) => lower_member(member)?,
            swc::Expr::Cond(cond) => ExprKind::Conditional {
                test: Box::new(lower_expr(&cond.test)?),
                consequent: Box::new(lower_expr(&cond.cons)?),
                alternate: Box::new(lower_expr(&cond.alt)?),
            },
            swc::Expr::Call(call) => {
                let swc::Callee::Expr(callee) = &call.callee else {
                    return unsupported("super or import call", call.span);
                };
                ExprKind::Call {
                    callee: Box::new(lower_expr(callee)?),
                    args: arguments(&call.args)?,
                }
            }
            swc::Expr::New(new) => ExprKind::New {
                callee: Box::new(lower_expr(&new.callee)?),
                args: new
                    .args
                    .as_deref()
                    .map(arguments)
                    .transpose()?
                    .unwrap_or_default(),
            },
            swc::Expr::Seq(seq) => ExprKind::Sequence(
                seq.exprs
                    .iter()
                    .map(|expr| lower_expr(expr))
                    .collect::<Result<_>>()?,
            ),
            other => return Err(unsupported_expr(other)),
        };
        Ok(Expr::new(kind, expr.span().into()))
    })
}

fn unsupported_expr(expr: &swc::Expr) -> ParseError {
    let construct = match expr {
        swc::Expr::Class(_) => "class expression",
        swc::Expr::Yield(_) => "yield expression",
        swc::Expr::Await(_) => "await expression",
        swc::Expr::OptChain(_) => "optional chain",
        swc::Expr::TaggedTpl(_) => "tagged template",
        swc::Expr::SuperProp(_) => "super property",
        swc::Expr::MetaProp(_) => "meta property",
        _ => "expression",
    };
    ParseError::unsupported(construct, offset(expr.span().lo))
}

fn argument(arg: &swc::ExprOrSpread) -> Result<Expr> {
    if let Some(spread) = arg.spread {
        return unsupported("spread element", spread);
    }
    lower_expr(&arg.expr)
}

fn arguments(args: &[swc::ExprOrSpread]) -> Result<Vec<Expr>> {
    args.iter().map(argument).collect()
}

fn lower_lit(lit: &swc::Lit) -> Result<ExprKind> {
    Ok(match lit {
        swc::Lit::Str(s) => ExprKind::Str(s.value.to_string()),
        swc::Lit::Bool(b) => ExprKind::Bool(b.value),
        swc::Lit::Null(_) => ExprKind::Null,
        swc::Lit::Num(n) => ExprKind::Num(n.value),
        swc::Lit::Regex(regex) => ExprKind::Regex {
            pattern: regex.exp.to_string(),
            flags: regex.flags.to_string(),
        },
        other => return unsupported("literal", other.span()),
    })
}

fn lower_template(tpl: &swc::Tpl) -> Result<ExprKind> {
    let quasis = tpl
        .quasis
        .iter()
        .map(|quasi| match &quasi.cooked {
            Some(cooked) => Ok(cooked.to_string()),
            None => unsupported("invalid template escape", quasi.span),
        })
        .collect::<Result<_>>()?;
    let exprs = tpl
        .exprs
        .iter()
        .map(|expr| lower_expr(expr))
        .collect::<Result<_>>()?;
    Ok(ExprKind::Template { quasis, exprs })
}

fn unary_op(op: swc::UnaryOp) -> UnaryOp {
    match op {
        swc::UnaryOp::Minus => UnaryOp::Neg,
        swc::UnaryOp::Plus => UnaryOp::Plus,
        swc::UnaryOp::Bang => UnaryOp::Not,
        swc::UnaryOp::Tilde => UnaryOp::BitNot,
        swc::UnaryOp::TypeOf => UnaryOp::TypeOf,
        swc::UnaryOp::Void => UnaryOp::Void,
        swc::UnaryOp::Delete => UnaryOp::Delete,
    }
}

enum Operator {
    Binary(BinOp),
    Logical(LogicalOp),
}

fn operator(op: swc::BinaryOp) -> Operator {
    use swc::BinaryOp as B;
    Operator::Binary(match op {
        B::LogicalAnd => return Operator::Logical(LogicalOp::And),
        B::LogicalOr => return Operator::Logical(LogicalOp::Or),
        B::NullishCoalescing => return Operator::Logical(LogicalOp::Nullish),
        B::EqEq => BinOp::Eq,
        B::NotEq => BinOp::Ne,
        B::EqEqEq => BinOp::EqStrict,
        B::NotEqEq => BinOp::NeStrict,
        B::Lt => BinOp::Lt,
        B::LtEq => BinOp::Le,
        B::Gt => BinOp::Gt,
        B::GtEq => BinOp::Ge,
        B::LShift => BinOp::Shl,
        B::RShift => BinOp::Shr,
        B::ZeroFillRShift => BinOp::UShr,
        B::Add => BinOp::Add,
        B::Sub => BinOp::Sub,
        B::Mul => BinOp::Mul,
        B::Div => BinOp::Div,
        B::Mod => BinOp::Mod,
        B::BitOr => BinOp::BitOr,
        B::BitXor => BinOp::BitXor,
        B::BitAnd => BinOp::BitAnd,
        B::In => BinOp::In,
        B::InstanceOf => BinOp::InstanceOf,
        B::Exp => BinOp::Exp,
    })
}

fn lower_binary(bin: &swc::BinExpr) -> Result<ExprKind> {
    let left = Box::new(lower_expr(&bin.left)?);
    let right = Box::new(lower_expr(&bin.right)?);
    Ok(match operator(bin.op) {
        Operator::Binary(op) => ExprKind::Binary { op, left, right },
        Operator::Logical(op) => ExprKind::Logical { op, left, right },
    })
}

fn assign_op(op: swc::AssignOp) -> AssignOp {
    use swc::AssignOp as A;
    match op {
        A::Assign => AssignOp::Assign,
        A::AddAssign => AssignOp::Compound(BinOp::Add),
        A::SubAssign => AssignOp::Compound(BinOp::Sub),
        A::MulAssign => AssignOp::Compound(BinOp::Mul),
        A::DivAssign => AssignOp::Compound(BinOp::Div),
        A::ModAssign => AssignOp::Compound(BinOp::Mod),
        A::LShiftAssign => AssignOp::Compound(BinOp::Shl),
        A::RShiftAssign => AssignOp::Compound(BinOp::Shr),
        A::ZeroFillRShiftAssign => AssignOp::Compound(BinOp::UShr),
        A::BitOrAssign => AssignOp::Compound(BinOp::BitOr),
        A::BitXorAssign => AssignOp::Compound(BinOp::BitXor),
        A::BitAndAssign => AssignOp::Compound(BinOp::BitAnd),
        A::ExpAssign => AssignOp::Compound(BinOp::Exp),
        A::AndAssign => AssignOp::Logical(LogicalOp::And),
        A::OrAssign => AssignOp::Logical(LogicalOp::Or),
        A::NullishAssign => AssignOp::Logical(LogicalOp::Nullish),
    }
}

fn lower_assign_target(target: &swc::AssignTarget) -> Result<Expr> {
    match target {
        swc::AssignTarget::Simple(simple) => match simple {
            swc::SimpleAssignTarget::Ident(binding) => Ok(Expr::new(
                ExprKind::Ident(name(&binding.id)),
                binding.id.span.into(),
            )),
            swc::SimpleAssignTarget::Member(member) => {
                Ok(Expr::new(lower_member(member)?, member.span.into()))
            }
            swc::SimpleAssignTarget::Paren(paren) => lower_target(&paren.expr),
            other => unsupported("assignment target", other.span()),
        },
        swc::AssignTarget::Pat(pat) => unsupported("destructuring assignment", pat.span()),
    }
}

/// Operand of `++`/`--` or the expression left of a `for-in`.
fn lower_target(expr: &swc::Expr) -> Result<Expr> {
    match expr {
        swc::Expr::Paren(paren) => lower_target(&paren.expr),
        swc::Expr::Ident(_) | swc::Expr::Member(_) => lower_expr(expr),
        other => unsupported("assignment target", other.span()),
    }
}

fn lower_member(member: &swc::MemberExpr) -> Result<ExprKind> {
    let object = Box::new(lower_expr(&member.obj)?);
    match &member.prop {
        swc::MemberProp::Ident(prop) => Ok(ExprKind::Member {
            object,
            property: Identifier::new_unchecked(prop.sym.to_string()),
        }),
        swc::MemberProp::Computed(computed) => Ok(ExprKind::Index {
            object,
            index: Box::new(lower_expr(&computed.expr)?),
        }),
        swc::MemberProp::PrivateName(private) => unsupported("private name", private.span),
    }
}

fn lower_key(key: &swc::PropName) -> Result<PropertyKey> {
    Ok(match key {
        swc::PropName::Ident(ident) => PropertyKey::Static(ident.sym.to_string()),
        swc::PropName::Str(s) => PropertyKey::Static(s.value.to_string()),
        swc::PropName::Num(n) => PropertyKey::Static(format_number(n.value)),
        swc::PropName::Computed(computed) => PropertyKey::Computed(lower_expr(&computed.expr)?),
        other => return unsupported("property key", other.span()),
    })
}

fn accessor(
    body: Option<&swc::BlockStmt>,
    params: Vec<Identifier>,
    span: swc_core::common::Span,
) -> Result<Expr> {
    let Some(body) = body else {
        return unsupported("accessor without body", span);
    };
    let function = Function {
        name: None,
        params,
        body: lower_block(body)?,
        is_arrow: false,
        span: span.into(),
    };
    Ok(Expr::new(ExprKind::Function(Rc::new(function)), span.into()))
}

fn lower_prop(prop: &swc::PropOrSpread) -> Result<Property> {
    let prop = match prop {
        swc::PropOrSpread::Prop(prop) => prop,
        swc::PropOrSpread::Spread(spread) => return unsupported("object spread", spread.dot3_token),
    };
    match &**prop {
        swc::Prop::Shorthand(ident) => Ok(Property {
            key: PropertyKey::Static(ident.sym.to_string()),
            kind: PropertyKind::Init,
            value: Expr::new(ExprKind::Ident(name(ident)), ident.span.into()),
        }),
        swc::Prop::KeyValue(kv) => Ok(Property {
            key: lower_key(&kv.key)?,
            kind: PropertyKind::Init,
            value: lower_expr(&kv.value)?,
        }),
        swc::Prop::Getter(getter) => Ok(Property {
            key: lower_key(&getter.key)?,
            kind: PropertyKind::Get,
            value: accessor(getter.body.as_ref(), Vec::new(), getter.span)?,
        }),
        swc::Prop::Setter(setter) => Ok(Property {
            key: lower_key(&setter.key)?,
            kind: PropertyKind::Set,
            value: accessor(setter.body.as_ref(), vec![binding(&setter.param)?], setter.span)?,
        }),
        swc::Prop::Method(method) => Ok(Property {
            key: lower_key(&method.key)?,
            kind: PropertyKind::Init,
            value: Expr::new(
                ExprKind::Function(Rc::new(lower_function(None, &method.function)?)),
                method.function.span.into(),
            ),
        }),
        other => unsupported("object property", other.span()),
    }
}
