//! Coverage Recorder: the runtime entry point instrumented code calls.

use crate::error::{InstrumentError, Result};
use crate::record::ModuleRecord;
use probar_js_runtime::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::trace;

/// Module records shared between a session and its exposed recorder.
pub(crate) type ModuleTable = Rc<RefCell<BTreeMap<String, ModuleRecord>>>;

/// Records statement hits into a session's module table.
///
/// Cloning shares the table. Each call borrows the table for a single map
/// update, so recorder calls may nest inside module loads.
#[derive(Debug, Clone)]
pub struct CoverageRecorder {
    modules: ModuleTable,
}

impl CoverageRecorder {
    pub(crate) fn new(modules: ModuleTable) -> Self {
        Self { modules }
    }

    /// Count one execution of `start:end` in module `key`, returning the
    /// range's new count.
    pub fn record(&self, key: &str, start: usize, end: usize) -> Result<u64> {
        let mut modules = self.modules.borrow_mut();
        let record = modules
            .get_mut(key)
            .ok_or_else(|| InstrumentError::UnknownModule {
                key: key.to_string(),
            })?;
        let count = record.hit(start, end);
        trace!(key, start, end, count, "statement hit");
        Ok(count)
    }

    /// Record a call from script arguments `(key, start, end)`.
    pub fn record_args(&self, args: &[Value]) -> Result<u64> {
        let key = match args.first() {
            Some(Value::String(key)) => key,
            _ => return Err(InstrumentError::invalid_call("key must be a string")),
        };
        let start = offset(args.get(1), "start")?;
        let end = offset(args.get(2), "end")?;
        self.record(key, start, end)
    }

    /// Wrap the recorder as a native function for the global namespace.
    ///
    /// Failures are fatal to the running script: `try`/`catch` cannot
    /// intercept them.
    #[must_use]
    pub fn to_function(&self, name: &str) -> Value {
        let recorder = self.clone();
        Value::native(name, move |_, _, args| {
            recorder
                .record_args(args)
                .map(|_| Value::Undefined)
                .map_err(InstrumentError::into_fatal)
        })
    }
}

/// Read a byte offset argument: a non-negative integral number.
fn offset(value: Option<&Value>, what: &str) -> Result<usize> {
    match value {
        Some(Value::Number(n)) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
            Ok(*n as usize)
        }
        _ => Err(InstrumentError::invalid_call(format!(
            "{what} must be a non-negative integer"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::range::Range;
    use probar_js_runtime::{Runtime, RuntimeError};

    fn recorder() -> CoverageRecorder {
        let tree = probar_js::parse("a();\nb();").unwrap();
        let mut record = ModuleRecord::new("m/index.js", "m", "a();\nb();", tree);
        record.add_range(Range::new(0, 4));
        record.add_range(Range::new(5, 9));
        let table = Rc::new(RefCell::new(BTreeMap::new()));
        table.borrow_mut().insert("m/index.js".to_string(), record);
        CoverageRecorder::new(table)
    }

    #[test]
    fn records_hits() {
        let recorder = recorder();
        assert_eq!(recorder.record("m/index.js", 0, 4).unwrap(), 1);
        assert_eq!(recorder.record("m/index.js", 0, 4).unwrap(), 2);
        let modules = recorder.modules.borrow();
        let record = &modules["m/index.js"];
        assert_eq!(record.covered().get("0:4"), Some(&2));
        assert_eq!(record.uncovered().keys().collect::<Vec<_>>(), vec!["5:9"]);
    }

    #[test]
    fn unknown_module_is_rejected() {
        let err = recorder().record("m/nope.js", 0, 1).unwrap_err();
        assert!(matches!(err, InstrumentError::UnknownModule { .. }));
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let recorder = recorder();
        let bad = [
            vec![Value::Number(1.0), Value::Number(0.0), Value::Number(4.0)],
            vec![Value::from("m/index.js"), Value::Number(-1.0), Value::Number(4.0)],
            vec![Value::from("m/index.js"), Value::Number(0.5), Value::Number(4.0)],
            vec![Value::from("m/index.js"), Value::Number(0.0)],
            vec![Value::from("m/index.js"), Value::from("0"), Value::Number(4.0)],
        ];
        for args in bad {
            assert!(matches!(
                recorder.record_args(&args),
                Err(InstrumentError::InvalidCall { .. })
            ));
        }
    }

    #[test]
    fn script_calls_update_records() {
        let runtime = Runtime::new();
        let recorder = recorder();
        runtime.define_global("__rec", recorder.to_function("__rec"));
        runtime.eval("__rec('m/index.js', 5, 9); __rec('m/index.js', 5, 9);").unwrap();
        assert_eq!(
            recorder.modules.borrow()["m/index.js"].count(Range::new(5, 9)),
            2
        );
    }

    #[test]
    fn script_errors_are_fatal() {
        let runtime = Runtime::new();
        runtime.define_global("__rec", recorder().to_function("__rec"));
        let err = runtime
            .eval("try { __rec('m/nope.js', 0, 1); } catch (e) {}")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Fatal { .. }));
        assert!(err.to_string().contains("Unknown module 'm/nope.js'"));
    }
}
