//! Constructors for synthesized swc nodes.
//!
//! Nodes built here carry `DUMMY_SP`: they never came from source text and
//! must not be mistaken for something a module author wrote.
//!
//! # Example
//!
//! ```rust
//! use probar_js::builder::{call, expr_stmt, ident, num, string};
//!
//! let hit = expr_stmt(call(
//!     ident("record"),
//!     vec![string("comp/index.js"), num(1.0), num(32.0)],
//! ));
//! assert_eq!(
//!     probar_js::generate_stmt(&hit).unwrap(),
//!     r#"record("comp/index.js", 1, 32);"#
//! );
//! ```

use swc_core::common::{SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::{
    CallExpr, Callee, Expr, ExprOrSpread, ExprStmt, Ident, Lit, Number, Stmt, Str,
};

/// Identifier reference `name`.
#[must_use]
pub fn ident(name: &str) -> Expr {
    Expr::Ident(Ident::new(name.into(), DUMMY_SP, SyntaxContext::empty()))
}

/// String literal with the given value.
#[must_use]
pub fn string(value: &str) -> Expr {
    Expr::Lit(Lit::Str(Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    }))
}

/// Number literal.
#[must_use]
pub fn num(value: f64) -> Expr {
    Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value,
        raw: None,
    }))
}

/// `callee(args...)`
#[must_use]
pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        callee: Callee::Expr(Box::new(callee)),
        args: args
            .into_iter()
            .map(|expr| ExprOrSpread {
                spread: None,
                expr: Box::new(expr),
            })
            .collect(),
        type_args: None,
    })
}

/// `expr;`
#[must_use]
pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(expr),
    })
}
