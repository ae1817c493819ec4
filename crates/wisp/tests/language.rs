//! End-to-end coverage of the full pipeline: parse -> desugar -> evaluate.
//!
//! Each test below runs a source string through the public API exactly as the CLI
//! does, rather than poking at any one stage in isolation — those narrower unit tests
//! live alongside the modules they cover (`parser.rs`, `desugar.rs`, `eval.rs`, `env.rs`).

use std::rc::Rc;

use wisp::{Eval, Node, NullHost, Oob, Status, Value, build_manifest, desugar_module, parse_module, with_host};

/// Parses and fully evaluates `source` against a fresh manifest, running to
/// completion (tests don't need cooperative step scheduling).
fn run(source: &str) -> Value {
    let (module, oob) = parse_module(source);
    assert!(oob.iter().all(|o| !matches!(o, Oob::Error { .. })), "unexpected parse errors: {oob:?}");
    run_module(&module)
}

fn run_module(module: &Node) -> Value {
    let host = Rc::new(NullHost);
    let (env, globals) = build_manifest(host.as_ref());
    let il = desugar_module(module, &env);
    let mut eval = Eval::new(Rc::new(il), globals);
    with_host(host, || eval.run_to_completion(1 << 16))
}

fn assert_num(v: &Value, expected: f64) {
    assert!(matches!(v, Value::Num(n) if *n == expected), "expected Num({expected}), got {v:?}");
}

fn assert_err(v: &Value, expected: &str) {
    assert!(matches!(v, Value::Err(s) if &**s == expected), "expected Err({expected:?}), got {v:?}");
}

#[test]
fn arithmetic_and_precedence() {
    assert_num(&run("1 + 2 * 3"), 7.0);
    assert_num(&run("(1 + 2) * 3"), 9.0);
    assert_num(&run("2 ^ 3 ^ 2"), 512.0); // right-associative
}

#[test]
fn let_bindings_and_shadowing_within_a_block() {
    assert_num(&run("x = 1\ny = x + 1\nx + y"), 3.0);
}

#[test]
fn reassigning_a_bound_name_with_set_is_a_shadow_fault() {
    // `=` only introduces a fresh binding; rebinding an existing name needs `:=`.
    assert_err(&run("x = 1\nx = 2\nx"), "Shadow:x");
}

#[test]
fn define_of_an_unbound_name_is_undefined() {
    assert_err(&run("x := 1\nx"), "Undefined:x");
}

#[test]
fn referencing_an_unbound_name_faults() {
    assert_err(&run("y"), "Undefined:y");
}

#[test]
fn if_expression_picks_the_taken_branch_only() {
    assert_num(&run("if true: 1\n2"), 2.0); // `if` as a statement discards its value
    assert_num(&run("true ? 1 : 2"), 1.0);
    assert_num(&run("false ? 1 : 2"), 2.0);
}

#[test]
fn and_or_short_circuit() {
    let v = run("false and (1/0)");
    assert!(matches!(v, Value::Bool(false)), "expected Bool(false) from short-circuited `and`, got {v:?}");
    let v = run("true or (1/0)");
    assert!(matches!(v, Value::Bool(true)), "expected Bool(true) from short-circuited `or`, got {v:?}");
}

#[test]
fn relational_chain_desugars_to_conjunction() {
    assert!(matches!(run("1 < 2 < 3"), Value::Bool(true)));
    assert!(matches!(run("1 < 2 < 1"), Value::Bool(false)));
}

#[test]
fn function_definition_and_call() {
    assert_num(&run("add = (a, b) -> a + b\nadd(2, 3)"), 5.0);
}

#[test]
fn recursive_function_via_self_application() {
    // No named recursion exists at the surface beyond what a loop lowers to; a
    // recursive function is instead written as a `loop` accumulating a counter.
    let src = "
n = 5
total = 0
loop while n > 0:
    total += n
    n -= 1
total
";
    assert_num(&run(src), 15.0);
}

#[test]
fn loop_with_break_condition_carries_accumulator() {
    let src = "
i = 0
sum = 0
loop:
    while i < 10
    sum += i
    i += 1
sum
";
    assert_num(&run(src), 45.0);
}

#[test]
fn for_loop_sums_a_vector() {
    let src = "
total = 0
for x in [1, 2, 3, 4]:
    total += x
total
";
    assert_num(&run(src), 10.0);
}

#[test]
fn vector_literal_and_method_send() {
    assert_num(&run("[1, 2, 3].len"), 3.0);
    assert_num(&run("[1, 2].push(3).len"), 3.0);
    assert_num(&run("[10, 20, 30][1]"), 20.0);
}

#[test]
fn map_literal_and_property_lookup() {
    let src = "{a: 1, b: 2}[\"b\"]";
    assert_num(&run(src), 2.0);
}

#[test]
fn match_expression_binds_on_the_matching_arm() {
    let src = "
match [1, 2]:
    [a, b] => a + b
";
    assert_num(&run(src), 3.0);
}

#[test]
fn match_destructures_a_vector_pattern_with_a_wildcard_fallback() {
    // match [1,2]: [2, x] => 1 / [1, x] => x / _ => 9
    let src = "
match [1, 2]:
    [2, x] => 1
    [1, x] => x
    _ => 9
";
    assert_num(&run(src), 2.0);
}

#[test]
fn match_falls_through_to_stop_when_no_arm_matches() {
    let src = "
match 99:
    1 => 1
    2 => 2
";
    assert_err(&run(src), "Stop");
}

#[test]
fn failed_assertion_faults_as_stop() {
    assert_err(&run("assert 1 == 2"), "Stop");
}

#[test]
fn passing_assertion_does_not_fault() {
    assert_num(&run("assert 1 == 1\n42"), 42.0);
}

#[test]
fn assertion_failure_trace_points_at_the_condition() {
    let (module, _) = parse_module("assert 1 == 2");
    let host = Rc::new(NullHost);
    let (env, globals) = build_manifest(host.as_ref());
    let il = desugar_module(&module, &env);
    let mut eval = Eval::new(Rc::new(il), globals);
    let value = with_host(host, || eval.run_to_completion(1 << 16));
    assert_err(&value, "Stop");

    // `Trace::root` is the whole module's own tag; the condition's tag is the
    // smallest span actually containing a position inside it.
    let idx = eval.trace().find_tag(8).expect("the condition `1 == 2` is tagged");
    let node = eval.trace().get(idx).expect("found index is valid");
    assert_eq!(node.ast(), wisp::Span::new(7, 13), "innermost tag at byte 8 should be the `1 == 2` condition span");
    assert!(matches!(node.value(), Some(Value::Bool(false))), "the condition evaluated falsy");
}

#[test]
fn object_construction_and_field_access() {
    let src = "
Point = NewClass(\"Point\", [\"x\", \"y\"])
p = Point(1, 2)
p.x + p.y
";
    assert_num(&run(src), 3.0);
}

#[test]
fn field_assignment_rebuilds_without_mutating_the_original() {
    let src = "
Point = NewClass(\"Point\", [\"x\", \"y\"])
p = Point(1, 2)
p.x = 10
p.x
";
    assert_num(&run(src), 10.0);
}

#[test]
fn indexed_assignment_on_a_vector() {
    let src = "
v = [1, 2, 3]
v[0] = 99
v[0]
";
    assert_num(&run(src), 99.0);
}

#[test]
fn calling_a_non_function_is_a_fault() {
    assert_err(&run("x = 1\nx(2)"), "NotAFunction");
}

#[test]
fn wrong_arity_call_is_a_fault() {
    assert_err(&run("f = (a, b) -> a + b\nf(1)"), "ArityNot2");
}

#[test]
fn out_of_bounds_index_is_a_fault() {
    assert_err(&run("[1, 2][5]"), "Bounds");
}

#[test]
fn a_fault_in_an_if_condition_halts_instead_of_taking_the_falsy_branch() {
    // `undefinedVar` faults; that fault must be the whole program's result, not get
    // treated as falsy and fall through to the statement after the `if`.
    assert_err(&run("if undefinedVar: 1\n2"), "Undefined:undefinedVar");
}

#[test]
fn a_fault_in_an_and_operand_halts_instead_of_short_circuiting() {
    assert_err(&run("undefinedVar and true"), "Undefined:undefinedVar");
}

#[test]
fn a_fault_in_a_binop_operand_surfaces_its_own_name() {
    // Previously `1 + y` with `y` unbound surfaced `ExpectedNum`, discarding the real
    // fault; it must surface `Undefined:y` unchanged.
    assert_err(&run("1 + y"), "Undefined:y");
}

#[test]
fn a_fault_in_callee_position_surfaces_its_own_name() {
    // Previously a faulted callee was dispatched on anyway and relabeled `NotAFunction`.
    assert_err(&run("z()"), "Undefined:z");
}

#[test]
fn vec_set_at_len_grows_by_one() {
    assert_num(&run("[1, 2, 3].set(3, 99)[3]"), 99.0);
}

#[test]
fn vec_set_past_len_is_still_out_of_bounds() {
    assert_err(&run("[1, 2, 3].set(4, 99)"), "Bounds");
}

#[test]
fn str_index_returns_a_char_code_not_a_one_char_string() {
    assert_num(&run("\"A\"[0]"), 65.0);
}

#[test]
fn bool_switch_selects_by_the_receiver() {
    assert_num(&run("true.switch(1, 2)"), 1.0);
    assert_num(&run("false.switch(1, 2)"), 2.0);
}

#[test]
fn obj_set_prop_is_reachable_through_ordinary_dot_dispatch() {
    let src = "
Point = NewClass(\"Point\", [\"x\", \"y\"])
p = Point(1, 2)
p.setProp(\"x\", 10).x
";
    assert_num(&run(src), 10.0);
}

#[test]
fn eval_sync_reports_running_then_done_across_a_step_budget() {
    let (module, _) = parse_module("1 + 1");
    let host = Rc::new(NullHost);
    let (env, globals) = build_manifest(host.as_ref());
    let il = desugar_module(&module, &env);
    let mut eval = Eval::new(Rc::new(il), globals);
    let value = with_host(host, || loop {
        match eval.sync(1) {
            Status::Done(v) => break v,
            Status::Running => continue,
        }
    });
    assert_num(&value, 2.0);
}
