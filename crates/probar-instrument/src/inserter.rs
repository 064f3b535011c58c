//! Range Inserter: puts a recorder call before every statement of every
//! sequential statement body.
//!
//! Sequential bodies are the statement lists of the script itself, of
//! every block (function bodies, branch and loop blocks, `try`, `catch`
//! and `finally`) and of every `switch` case. Statements that are not in
//! such a list, like the body of `if (a) b();`, get no call of their own.

use crate::range::Range;
use crate::record::ModuleRecord;
use probar_js::builder::{call, expr_stmt, ident, num, string};
use probar_js::{Identifier, Span};
use std::mem;
use swc_core::common::Spanned;
use swc_core::ecma::ast::{BlockStmt, Script, Stmt, SwitchCase};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};
use tracing::trace;

/// Instrument every statement body of `record`'s tree.
///
/// Ranges are appended to the record in walk order: a body's own
/// statements first, then the bodies nested inside each of them. Does
/// nothing if the tree has already been consumed.
pub fn insert(record: &mut ModuleRecord, recorder: &Identifier) {
    let key = record.key().to_string();
    let Some(tree) = record.tree_mut() else {
        return;
    };
    let mut inserter = RangeInserter::new(&key, recorder);
    tree.visit_mut_with(&mut inserter);

    trace!(key = %key, statements = inserter.ranges.len(), "inserted recorder calls");
    for range in inserter.ranges {
        record.add_range(range);
    }
}

/// Build the statement `recorder("key", start, end);`.
#[must_use]
pub fn hit_call(recorder: &Identifier, key: &str, range: Range) -> Stmt {
    expr_stmt(call(
        ident(recorder.as_str()),
        vec![
            string(key),
            num(range.start as f64),
            num(range.end as f64),
        ],
    ))
}

struct RangeInserter<'a> {
    key: &'a str,
    recorder: &'a Identifier,
    ranges: Vec<Range>,
}

impl<'a> RangeInserter<'a> {
    const fn new(key: &'a str, recorder: &'a Identifier) -> Self {
        Self {
            key,
            recorder,
            ranges: Vec::new(),
        }
    }

    fn interleave(&mut self, stmts: &mut Vec<Stmt>) {
        let original = mem::take(stmts);
        let mut interleaved = Vec::with_capacity(original.len() * 2);
        for stmt in original {
            let range = Range::from(Span::from(stmt.span()));
            self.ranges.push(range);
            interleaved.push(hit_call(self.recorder, self.key, range));
            interleaved.push(stmt);
        }
        *stmts = interleaved;

        // Calls sit at even indices; only the original statements hold bodies.
        for stmt in stmts.iter_mut().skip(1).step_by(2) {
            stmt.visit_mut_with(self);
        }
    }
}

impl VisitMut for RangeInserter<'_> {
    fn visit_mut_script(&mut self, script: &mut Script) {
        self.interleave(&mut script.body);
    }

    fn visit_mut_block_stmt(&mut self, block: &mut BlockStmt) {
        self.interleave(&mut block.stmts);
    }

    fn visit_mut_switch_case(&mut self, case: &mut SwitchCase) {
        if let Some(test) = &mut case.test {
            test.visit_mut_with(self);
        }
        self.interleave(&mut case.cons);
    }
}
