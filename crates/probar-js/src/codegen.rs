//! JavaScript code generation through `swc_ecma_codegen`.
//!
//! Literals that came from source keep their raw text, so regenerated code
//! prints strings with their original quotes. Synthesized literals have no
//! raw text and are printed in swc's normalized form.

use swc_core::common::sync::Lrc;
use swc_core::common::SourceMap;
use swc_core::ecma::ast::{EsVersion, Expr, Script, Stmt};
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::codegen::{Config, Emitter, Node};

use crate::error::{ParseError, Result};
use crate::parse::{STACK_RED_ZONE, STACK_SIZE};

/// Generate source text for a whole script.
pub fn generate(script: &Script) -> Result<String> {
    emit(script)
}

/// Generate source text for a single statement, without a trailing newline.
pub fn generate_stmt(stmt: &Stmt) -> Result<String> {
    emit(stmt).map(|text| text.trim_end().to_string())
}

/// Generate source text for a single expression.
pub fn generate_expr(expr: &Expr) -> Result<String> {
    emit(expr).map(|text| text.trim_end().to_string())
}

fn emit<N: Node>(node: &N) -> Result<String> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SIZE, || {
        let cm: Lrc<SourceMap> = Lrc::default();
        let mut buf = Vec::new();
        {
            let mut cfg = Config::default();
            cfg.target = EsVersion::EsNext;
            let mut emitter = Emitter {
                cfg,
                cm: cm.clone(),
                comments: None,
                wr: JsWriter::new(cm, "\n", &mut buf, None),
            };
            node.emit_with(&mut emitter)?;
        }
        String::from_utf8(buf).map_err(|err| ParseError::Emit {
            message: err.to_string(),
        })
    })
}
