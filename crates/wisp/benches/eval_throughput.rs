use std::rc::Rc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use wisp::{Eval, NullHost, build_manifest, desugar_module, parse_module, with_host};

/// Runs `code` end to end (parse, desugar, evaluate) and asserts the numeric result,
/// once outside the timed loop to catch a broken fixture early, then inside it.
///
/// Each fixture does real runtime work (loops, arithmetic) rather than folding to a
/// constant at desugar time, so the measured time reflects evaluator throughput and
/// not how much the desugarer manages to constant-fold away.
fn run_wisp(bench: &mut criterion::Bencher, code: &str, expected: f64) {
    let (module, oob) = parse_module(code);
    assert!(oob.is_empty(), "unexpected parse diagnostics: {oob:?}");
    let host = Rc::new(NullHost);
    let (env, globals) = build_manifest(host.as_ref());
    let il = Rc::new(desugar_module(&module, &env));

    let check = |value: wisp::Value| match value {
        wisp::Value::Num(n) => assert_eq!(n, expected),
        other => panic!("expected Num({expected}), got {other:?}"),
    };
    let run_once = || {
        let mut eval = Eval::new(Rc::clone(&il), globals.clone());
        with_host(Rc::clone(&host), || eval.run_to_completion(1 << 20))
    };
    check(run_once());

    bench.iter(|| black_box(run_once()));
}

/// Two locals added at runtime; no loop to fold away.
const ADD_TWO_LOCALS: &str = "
x = 1
y = 2
x + y
";

/// A tight counted loop summing a constant step 1000 times.
const LOOP_SUM_1000: &str = "
total = 0
i = 0
loop while i < 1000:
    total += 3
    i += 1
total
";

/// A `for` loop over a freshly built vector, touching indexing and push.
const FOR_OVER_VECTOR: &str = "
v = []
i = 0
loop while i < 200:
    v = v.push(i)
    i += 1
total = 0
for x in v:
    total += x
total
";

/// A recursive-shaped function call repeated through a loop rather than deep
/// self-recursion, since the language has no named recursion at the surface.
const FUNCTION_CALL_LOOP: &str = "
add = (a, b) -> a + b
total = 0
i = 0
loop while i < 500:
    total = add(total, i)
    i += 1
total
";

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("add_two_locals", |b| run_wisp(b, ADD_TWO_LOCALS, 3.0));
    c.bench_function("loop_sum_1000", |b| run_wisp(b, LOOP_SUM_1000, 3000.0));
    c.bench_function("for_over_vector_200", |b| run_wisp(b, FOR_OVER_VECTOR, 19900.0));
    c.bench_function("function_call_loop_500", |b| run_wisp(b, FUNCTION_CALL_LOOP, 124750.0));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
