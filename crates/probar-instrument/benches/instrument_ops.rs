//! Instrumentation Benchmarks
//!
//! Measures session construction over components of increasing size and
//! the cost of running instrumented code.
//!
//! Run with: `cargo bench --bench instrument_ops`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use probar_instrument::instrument;
use probar_js_runtime::{Factory, Runtime};

/// Module body with `n` small functions, each with a branch.
fn module_body(n: usize) -> String {
    let mut body = String::new();
    for i in 0..n {
        body.push_str(&format!(
            "exports.f{i} = function(a){{\n  var r = a;\n  if (a > {i}) {{\n    r = a - {i};\n  }}\n  return r;\n}};\n"
        ));
    }
    body
}

fn component(modules: usize, functions: usize) -> Runtime {
    let runtime = Runtime::new();
    for m in 0..modules {
        let factory = Factory::from_body(&Factory::LOADER_PARAMS, module_body(functions));
        if let Ok(factory) = factory {
            runtime.register(format!("bench/m{m}.js"), factory);
        }
    }
    runtime
}

fn bench_session_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_creation");

    for (modules, functions) in [(1, 10), (10, 10), (10, 100)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{modules}x{functions}")),
            &(modules, functions),
            |bench, &(m, f)| {
                bench.iter_batched(
                    || component(m, f),
                    |runtime| {
                        let session = instrument(&runtime, "bench");
                        black_box(session.is_ok());
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_instrumented_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("instrumented_execution");

    for calls in [100, 1000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{calls}_calls")),
            &calls,
            |bench, &n| {
                let runtime = component(1, 10);
                let _session = instrument(&runtime, "bench");
                let script = format!(
                    "var m = require('bench/m0'); var t = 0; for (var i = 0; i < {n}; i++) {{ t += m.f5(i); }} t"
                );
                bench.iter(|| black_box(runtime.eval(&script).is_ok()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_session_creation,
    bench_instrumented_execution
);
criterion_main!(benches);
