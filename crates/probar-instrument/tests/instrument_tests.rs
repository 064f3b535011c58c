//! End-to-end coverage of the `math` component.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use probar_instrument::collector::collect;
use probar_instrument::patcher;
use probar_instrument::prelude::*;
use probar_instrument::session::cover;
use probar_js::Identifier;
use probar_js_runtime::{Factory, Runtime, RuntimeError, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

const INDEX: &str = "function(exports, require){
    exports.mul = require('./mul');
    exports.add = require('./add');
  }";

const MUL: &str = "function(_, _, module){
    module.exports = function(a, b){
      if ('number' == typeof a) {
        return a * b;
      }
    };
  }";

const ADD: &str = "function(_, _, module){
    module.exports = function(a, b){
      return a + b;
    };
  }";

const LODASH: &str = "function(exports){
    exports.identity = function(v){ return v; };
  }";

fn math_runtime() -> Runtime {
    let runtime = Runtime::new();
    for (key, text) in [
        ("math/index.js", INDEX),
        ("math/mul.js", MUL),
        ("math/add.js", ADD),
        ("math/deps/lodash/index.js", LODASH),
    ] {
        runtime.register(key, Factory::from_function_text(text).unwrap());
    }
    runtime
}

fn counts(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

#[test]
fn dependencies_are_not_instrumented() {
    let runtime = math_runtime();
    let session = instrument(&runtime, "math").unwrap();
    assert_eq!(
        session.keys(),
        vec!["math/add.js", "math/index.js", "math/mul.js"]
    );
    assert!(session.module("math/deps/lodash/index.js").is_none());
}

#[test]
fn requiring_the_component_covers_its_index() {
    let runtime = math_runtime();
    let session = instrument(&runtime, "math").unwrap();

    let index = session.module("math/index.js").unwrap();
    assert_eq!(index.component, "math");
    assert!(index.covered.is_empty());
    assert_eq!(index.uncovered, counts(&[("1:32", 0), ("33:64", 0)]));
    assert_eq!(index.ranges, vec![Range::new(1, 32), Range::new(33, 64)]);

    runtime.require("math").unwrap();

    let index = session.module("math/index.js").unwrap();
    assert!(index.uncovered.is_empty());
    assert_eq!(index.covered, counts(&[("1:32", 1), ("33:64", 1)]));
}

#[test]
fn untaken_branch_stays_uncovered() {
    let runtime = math_runtime();
    let session = instrument(&runtime, "math").unwrap();
    let math = runtime.require("math").unwrap();

    let mul = session.module("math/mul.js").unwrap();
    assert_eq!(mul.covered, counts(&[("1:88", 1)]));
    assert_eq!(mul.uncovered, counts(&[("36:85", 0), ("68:81", 0)]));

    let mul_fn = runtime.get_property(&math, "mul").unwrap();
    let result = runtime.call(&mul_fn, Value::Undefined, &[]).unwrap();
    assert!(matches!(result, Value::Undefined));

    let mul = session.module("math/mul.js").unwrap();
    assert_eq!(mul.covered, counts(&[("1:88", 1), ("36:85", 1)]));
    assert_eq!(mul.uncovered, counts(&[("68:81", 0)]));
    assert_eq!(mul.text(Range::new(68, 81)), Some("return a * b;"));
    assert_eq!(&mul.source[68..81], "return a * b;");
}

#[test]
fn taken_branch_counts_every_execution() {
    let runtime = math_runtime();
    let session = instrument(&runtime, "math").unwrap();
    let product = runtime
        .eval("var math = require('math'); math.mul(2, 3) + math.mul(4, 5)")
        .unwrap();
    assert_eq!(product.as_number(), Some(26.0));

    let mul = session.module("math/mul.js").unwrap();
    assert_eq!(mul.covered.get("36:85"), Some(&2));
    assert_eq!(mul.covered.get("68:81"), Some(&2));
    assert!(mul.uncovered.is_empty());
    assert!(session.module_summary("math/mul.js").unwrap().is_complete());
}

#[test]
fn instrumented_modules_behave_like_the_originals() {
    let plain = math_runtime();
    let covered = math_runtime();
    let _session = instrument(&covered, "math").unwrap();
    let script = "var m = require('math'); [m.add(2, 3), m.mul(4, 5), m.mul('x', 2), m.add('a', 'b')].join(',')";
    assert_eq!(
        plain.eval(script).unwrap().to_js_string(),
        covered.eval(script).unwrap().to_js_string()
    );
}

#[test]
fn summary_tracks_whole_component() {
    let runtime = math_runtime();
    let session = instrument(&runtime, "math").unwrap();
    assert_eq!(session.summary(), CoverageSummary::new(7, 0));

    runtime.require("math").unwrap();
    let summary = session.summary();
    assert_eq!(summary.total, 7);
    assert_eq!(summary.covered, 4);
    assert_eq!(summary.uncovered, 3);
}

#[test]
fn two_sessions_get_distinct_recorders() {
    let runtime = math_runtime();
    runtime.register(
        "geo/index.js",
        Factory::from_function_text("function(exports){ exports.pi = 3; }").unwrap(),
    );
    let math = instrument(&runtime, "math").unwrap();
    let geo = instrument(&runtime, "geo").unwrap();
    assert_ne!(math.recorder_name(), geo.recorder_name());

    runtime.require("geo").unwrap();
    assert!(geo.summary().is_complete());
    assert_eq!(math.summary().covered, 0);
}

#[test]
fn recorder_rejects_unknown_modules_fatally() {
    let runtime = math_runtime();
    let session = instrument(&runtime, "math").unwrap();
    let script = format!(
        "try {{ {}('math/missing.js', 0, 1); }} catch (e) {{}}",
        session.recorder_name()
    );
    let err = runtime.eval(&script).unwrap_err();
    assert!(matches!(err, RuntimeError::Fatal { .. }));
}

#[test]
fn snapshots_serialize_for_tooling() {
    let runtime = math_runtime();
    let session = instrument(&runtime, "math").unwrap();
    runtime.require("math").unwrap();

    let json = serde_json::to_value(session.module("math/index.js").unwrap()).unwrap();
    assert_eq!(json["key"], "math/index.js");
    assert_eq!(json["ranges"], serde_json::json!([[1, 32], [33, 64]]));
    assert_eq!(json["covered"]["33:64"], 1);
    assert!(json["instrumented"]
        .as_str()
        .unwrap()
        .contains(session.recorder_name()));
}

#[test]
fn instrumentation_emits_tracing_events() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter("probar_instrument=trace")
        .with_test_writer()
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        let runtime = math_runtime();
        let session = instrument(&runtime, "math").unwrap();
        runtime.require("math").unwrap();
        assert_eq!(session.summary().covered, 4);
    });
}

const MODERN: &str = "function(exports){
    exports.re = /ab+c/;
    exports.holes = [1,,3];
    exports.inc = (a) => a + 1;
    exports.keys = function (o) {
      var out = [];
      for (var k in o) { out.push(k); }
      return out;
    };
    exports.find = function (rows) {
      found: {
        for (var i = 0; i < rows.length; i++) {
          if (rows[i] > 1) { break found; }
        }
        return -1;
      }
      return rows[i];
    };
    exports.fail = function () { throw new Error('x'); };
  }";

const MODERN_SCRIPT: &str = "
    var m = require('modern');
    var caught;
    try { m.fail(); } catch (e) { caught = e instanceof Error && e.message; }
    [m.re.test('abbc'), m.holes.length, m.holes[1], m.inc(1), m.keys({ p: 1 }).join(), m.find([0, 2]), caught].join('|')
";

fn modern_runtime() -> Runtime {
    let runtime = Runtime::new();
    runtime.register(
        "modern/index.js",
        Factory::from_function_text(MODERN).unwrap(),
    );
    runtime
}

#[test]
fn modern_syntax_runs_instrumented() {
    let plain = modern_runtime();
    let covered = modern_runtime();
    let session = instrument(&covered, "modern").unwrap();
    assert_eq!(session.summary(), CoverageSummary::new(17, 0));

    let expected = "true|3||2|p|2|x";
    assert_eq!(plain.eval(MODERN_SCRIPT).unwrap().to_js_string(), expected);
    assert_eq!(covered.eval(MODERN_SCRIPT).unwrap().to_js_string(), expected);

    let module = session.module("modern/index.js").unwrap();
    let missed: Vec<&str> = module
        .ranges
        .iter()
        .filter(|range| module.uncovered.contains_key(&range.key()))
        .map(|range| module.text(*range).unwrap())
        .collect();
    assert_eq!(missed, vec!["return -1;"]);
    assert_eq!(session.summary(), CoverageSummary::new(17, 16));
}

#[test]
fn recorder_calls_fire_in_execution_order() {
    let body = "var a = 1;\n\
                function twice(x) {\n  var y = x * 2;\n  return y;\n}\n\
                var b = twice(a);\n\
                exports.b = b;";
    let runtime = Runtime::new();
    runtime.register(
        "order/index.js",
        Factory::from_body(&Factory::LOADER_PARAMS, body).unwrap(),
    );

    let log: Rc<RefCell<Vec<Range>>> = Rc::default();
    let sink = Rc::clone(&log);
    runtime.define_global(
        "__log",
        Value::native("__log", move |_, _, args| {
            let offset = |i: usize| args.get(i).map_or(0.0, Value::to_number) as usize;
            sink.borrow_mut().push(Range::new(offset(1), offset(2)));
            Ok(Value::Undefined)
        }),
    );

    let mut record = {
        let registry = runtime.registry();
        let record = collect(&registry, "order", "deps").next().unwrap().unwrap();
        record
    };
    cover(&mut record, &Identifier::new("__log").unwrap()).unwrap();
    patcher::replace(&runtime, &record).unwrap();

    let exports = runtime.require("order").unwrap();
    assert_eq!(
        runtime.get_property(&exports, "b").unwrap().as_number(),
        Some(2.0)
    );

    let fired: Vec<&str> = log
        .borrow()
        .iter()
        .map(|range| range.slice(record.source()).unwrap())
        .collect();
    assert_eq!(
        fired,
        vec![
            "var a = 1;",
            "function twice(x) {\n  var y = x * 2;\n  return y;\n}",
            "var b = twice(a);",
            "var y = x * 2;",
            "return y;",
            "exports.b = b;",
        ]
    );

    // Straight-line statements of one body fire in source order.
    let top_level: Vec<usize> = log
        .borrow()
        .iter()
        .filter(|range| !matches!(range.slice(record.source()), Some("var y = x * 2;" | "return y;")))
        .map(|range| range.start)
        .collect();
    assert!(top_level.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn deeply_nested_modules_are_rejected_without_patching() {
    let runtime = math_runtime();
    let body = format!("exports.v = {}1{};", "(".repeat(20_000), ")".repeat(20_000));
    runtime.register(
        "math/deep.js",
        Factory::from_body(&Factory::LOADER_PARAMS, body).unwrap(),
    );
    let before = runtime.registry().factory("math/add.js").cloned();

    let err = instrument(&runtime, "math").unwrap_err();
    assert!(
        matches!(err, InstrumentError::Parse { ref key, .. } if key == "math/deep.js"),
        "{err}"
    );
    assert!(err.to_string().contains("Nesting deeper than"));
    assert_eq!(runtime.registry().factory("math/add.js").cloned(), before);
}
