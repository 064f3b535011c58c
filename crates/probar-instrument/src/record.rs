//! Per-module coverage state.

use crate::range::{range_key, Range};
use swc_core::ecma::ast::Script;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::Add;

/// Instrumentation and coverage state of one module.
///
/// Every range in [`ranges`](Self::ranges) has its key in exactly one of
/// [`covered`](Self::covered) or [`uncovered`](Self::uncovered). A range
/// moves to `covered` the first time its recorder call runs and only its count
/// changes afterwards.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    key: String,
    component: String,
    source: String,
    tree: Option<Script>,
    ranges: Vec<Range>,
    covered: BTreeMap<String, u64>,
    uncovered: BTreeMap<String, u64>,
    instrumented: String,
}

impl ModuleRecord {
    /// Create a freshly collected record.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        component: impl Into<String>,
        source: impl Into<String>,
        tree: Script,
    ) -> Self {
        Self {
            key: key.into(),
            component: component.into(),
            source: source.into(),
            tree: Some(tree),
            ranges: Vec::new(),
            covered: BTreeMap::new(),
            uncovered: BTreeMap::new(),
            instrumented: String::new(),
        }
    }

    /// Loader key of the module.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Component the module was collected for.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Original source text; ranges are offsets into it.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed tree, present until the instrumented source is generated.
    #[must_use]
    pub fn tree(&self) -> Option<&Script> {
        self.tree.as_ref()
    }

    pub(crate) fn tree_mut(&mut self) -> Option<&mut Script> {
        self.tree.as_mut()
    }

    pub(crate) fn take_tree(&mut self) -> Option<Script> {
        self.tree.take()
    }

    /// Ranges of instrumented statements in insertion order.
    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Execution counts of ranges that have run.
    #[must_use]
    pub fn covered(&self) -> &BTreeMap<String, u64> {
        &self.covered
    }

    /// Ranges that have not run yet, each mapped to `0`.
    #[must_use]
    pub fn uncovered(&self) -> &BTreeMap<String, u64> {
        &self.uncovered
    }

    /// Instrumented source; empty until generated.
    #[must_use]
    pub fn instrumented(&self) -> &str {
        &self.instrumented
    }

    pub(crate) fn set_instrumented(&mut self, text: String) {
        self.instrumented = text;
    }

    /// Register an instrumented range as not yet executed.
    pub(crate) fn add_range(&mut self, range: Range) {
        self.uncovered.insert(range.key(), 0);
        self.ranges.push(range);
    }

    /// Count one execution of `start:end` and return the new count.
    pub fn hit(&mut self, start: usize, end: usize) -> u64 {
        let key = range_key(start, end);
        self.uncovered.remove(&key);
        let count = self.covered.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Whether the range has executed at least once.
    #[must_use]
    pub fn is_covered(&self, range: Range) -> bool {
        self.covered.contains_key(&range.key())
    }

    /// Execution count of a range.
    #[must_use]
    pub fn count(&self, range: Range) -> u64 {
        self.covered.get(&range.key()).copied().unwrap_or(0)
    }

    /// Ranges that have not executed, in insertion order.
    #[must_use]
    pub fn uncovered_ranges(&self) -> Vec<Range> {
        self.ranges
            .iter()
            .copied()
            .filter(|range| self.uncovered.contains_key(&range.key()))
            .collect()
    }

    /// Coverage statistics over the instrumented ranges.
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        let covered = self
            .ranges
            .iter()
            .filter(|range| self.is_covered(**range))
            .count();
        CoverageSummary::new(self.ranges.len(), covered)
    }

    /// Owned snapshot for inspection and serialization.
    #[must_use]
    pub fn snapshot(&self) -> ModuleCoverage {
        ModuleCoverage {
            key: self.key.clone(),
            component: self.component.clone(),
            source: self.source.clone(),
            ranges: self.ranges.clone(),
            covered: self.covered.clone(),
            uncovered: self.uncovered.clone(),
            instrumented: self.instrumented.clone(),
        }
    }
}

/// Point-in-time copy of a [`ModuleRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCoverage {
    /// Loader key
    pub key: String,
    /// Component name
    pub component: String,
    /// Original source text
    pub source: String,
    /// Instrumented ranges in insertion order
    pub ranges: Vec<Range>,
    /// `"start:end"` to execution count
    pub covered: BTreeMap<String, u64>,
    /// `"start:end"` to `0` for ranges not yet executed
    pub uncovered: BTreeMap<String, u64>,
    /// Instrumented source
    pub instrumented: String,
}

impl ModuleCoverage {
    /// Text of a range within the original source.
    #[must_use]
    pub fn text(&self, range: Range) -> Option<&str> {
        range.slice(&self.source)
    }
}

/// Coverage summary statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Instrumented statements
    pub total: usize,
    /// Statements executed at least once
    pub covered: usize,
    /// Statements never executed
    pub uncovered: usize,
    /// Covered share in percent
    pub percent: f64,
}

impl CoverageSummary {
    /// Compute a summary from counts.
    #[must_use]
    pub fn new(total: usize, covered: usize) -> Self {
        let covered = covered.min(total);
        let percent = if total == 0 {
            100.0
        } else {
            (covered as f64 / total as f64) * 100.0
        };
        Self {
            total,
            covered,
            uncovered: total - covered,
            percent,
        }
    }

    /// Whether every statement ran.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.covered == self.total
    }
}

impl Add for CoverageSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.total + other.total, self.covered + other.covered)
    }
}

impl Sum for CoverageSummary {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(0, 0), Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> ModuleRecord {
        let source = "a();\nb();";
        let tree = probar_js::parse(source).unwrap();
        let mut record = ModuleRecord::new("m/index.js", "m", source, tree);
        record.add_range(Range::new(0, 4));
        record.add_range(Range::new(5, 9));
        record
    }

    #[test]
    fn new_ranges_start_uncovered() {
        let record = record();
        assert_eq!(record.ranges().len(), 2);
        assert_eq!(record.uncovered().get("0:4"), Some(&0));
        assert!(record.covered().is_empty());
        assert!(record.tree().is_some());
        assert_eq!(record.instrumented(), "");
    }

    #[test]
    fn hit_moves_range_once_then_counts() {
        let mut record = record();
        assert_eq!(record.hit(5, 9), 1);
        assert_eq!(record.hit(5, 9), 2);
        assert!(!record.uncovered().contains_key("5:9"));
        assert_eq!(record.count(Range::new(5, 9)), 2);
        assert_eq!(record.uncovered_ranges(), vec![Range::new(0, 4)]);
    }

    #[test]
    fn summary_counts_instrumented_ranges() {
        let mut record = record();
        assert_eq!(record.summary(), CoverageSummary::new(2, 0));
        record.hit(0, 4);
        let summary = record.summary();
        assert_eq!(summary.covered, 1);
        assert_eq!(summary.uncovered, 1);
        assert!((summary.percent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_is_complete() {
        let summary = CoverageSummary::new(0, 0);
        assert!(summary.is_complete());
        assert_eq!(summary.percent, 100.0);
    }

    #[test]
    fn summaries_add_up() {
        let total: CoverageSummary = [CoverageSummary::new(2, 1), CoverageSummary::new(3, 3)]
            .into_iter()
            .sum();
        assert_eq!(total, CoverageSummary::new(5, 4));
    }

    #[test]
    fn snapshot_serializes() {
        let mut record = record();
        record.hit(0, 4);
        let json = serde_json::to_value(record.snapshot()).unwrap();
        assert_eq!(json["key"], "m/index.js");
        assert_eq!(json["ranges"][1], serde_json::json!([5, 9]));
        assert_eq!(json["covered"]["0:4"], 1);
        assert_eq!(json["uncovered"]["5:9"], 0);
        assert_eq!(record.snapshot().text(Range::new(5, 9)), Some("b();"));
    }
}
