//! JavaScript front end for probar instrumentation, built on swc.
//!
//! [`parse`] turns a CommonJS module body into an swc
//! [`Script`](swc_core::ecma::ast::Script) whose statement spans map back
//! to byte offsets through [`Span`]. Instrumentation rewrites that tree
//! with `swc_ecma_visit` and prints it again with [`generate`]. The
//! runtime executes source by [`compile`]-ing it into the [`hir`] tree.
//!
//! # Example
//!
//! ```rust
//! use probar_js::prelude::*;
//! use swc_core::common::Spanned;
//!
//! let script = parse("exports.answer = 42;").unwrap();
//! assert_eq!(Span::from(script.body[0].span()), Span::new(0, 20));
//! assert_eq!(generate(&script).unwrap().trim_end(), "exports.answer = 42;");
//! ```
//!
//! # Nesting Limit
//!
//! Sources nested deeper than [`MAX_NESTING_DEPTH`] levels of brackets,
//! prefix operators or statements are rejected with
//! [`ParseError::TooDeep`] before any recursive pass runs over them.

#![warn(missing_docs)]
#![allow(clippy::wildcard_imports)]

pub mod builder;
pub mod codegen;
pub mod error;
pub mod hir;
pub mod ident;
pub mod lower;
pub mod parse;
pub mod span;

pub use codegen::{generate, generate_expr, generate_stmt};
pub use error::{ParseError, Result};
pub use hir::Program;
pub use ident::Identifier;
pub use lower::{compile, format_number, lower};
pub use parse::{parse, parse_with_limit, MAX_NESTING_DEPTH};
pub use span::Span;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::codegen::{generate, generate_expr, generate_stmt};
    pub use crate::error::{ParseError, Result};
    pub use crate::ident::Identifier;
    pub use crate::lower::{compile, lower};
    pub use crate::parse::{parse, parse_with_limit, MAX_NESTING_DEPTH};
    pub use crate::span::Span;
}
