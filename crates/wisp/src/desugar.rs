//! Lowers the AST into [`Il`].
//!
//! The desugarer never aborts on a bad program: a malformed target, an unbound name,
//! a mismatched `match` arm all become an [`Il::Err`] node standing in for the
//! offending expression, tagged with its source span like everything else. The
//! program still compiles and still runs — it just faults, as an ordinary value, if
//! and when evaluation actually reaches that node. See [`crate::error`] for the full
//! rationale.
//!
//! Three lowering techniques carry essentially the whole file:
//!
//! - **Let-in chains.** A block is a right-nested sequence of one-argument
//!   applications: `x = e; rest` becomes `App(Fun(1, rest'), [e'])`, where `rest'` is
//!   lowered under an environment one scope deeper than `rest` itself would suggest —
//!   every `Il::Fun` introduces exactly one runtime frame, so the static [`Env`] used
//!   to lower its body must track that.
//! - **`select` as the only branch primitive.** `if`/`?:`/`and`/`or`/loop conditions
//!   all lower through [`select_expr`], which hands the host [`crate::behavior::select`]
//!   two zero-argument closures and applies whichever it picks. The unchosen branch's
//!   body is never even pushed onto the evaluator's task stack.
//! - **Loops as self-applying recursion.** `loop`/`loop while`/`for` compile to a
//!   closure that takes itself as an explicit extra argument and re-applies itself
//!   (see [`lower_loop`]) — the "U-combinator" trick for recursion with nothing but
//!   `Fun`/`App`/`Arg`.

use std::rc::Rc;

use crate::ast::{AssignOp, Block, BinOp, Expr, MatchCase, Node, Stmt};
use crate::behavior;
use crate::env::Env;
use crate::il::Il;
use crate::value::Value;

/// Lowers a whole parsed module (its top-level block) against the manifest `env`.
#[must_use]
pub fn desugar_module(module: &Node, env: &Env) -> Il {
    lower_node(module, env)
}

fn lower_node(node: &Node, env: &Env) -> Il {
    let il = lower_expr(&node.expr, env);
    match node.span {
        Some(span) => Il::tag(span, il),
        None => il,
    }
}

fn arg_ref(env: &Env, name: &str) -> Il {
    match env.find(name) {
        Some((ups, pos)) => Il::arg(ups, pos),
        None => Il::err(format!("Undefined:{name}")),
    }
}

/// Builds `select(cond, then, else)` where `build_then`/`build_else` receive the
/// environment matching the zero-argument frame the evaluator will actually push —
/// see the module doc's note on `Il::Fun` always introducing a frame.
fn select_expr(cond: Il, build_then: impl FnOnce(&Env) -> Il, build_else: impl FnOnce(&Env) -> Il, env: &Env) -> Il {
    let env0 = env.extend(Vec::new());
    let then_fn = Il::fun(0, build_then(&env0));
    let else_fn = Il::fun(0, build_else(&env0));
    let chosen = Il::app(Il::Val(behavior::select()), vec![cond, then_fn, else_fn]);
    Il::app(chosen, vec![])
}

fn lower_expr(expr: &Expr, env: &Env) -> Il {
    match expr {
        Expr::Name(name) => arg_ref(env, name),
        Expr::Number(text) => match text.parse::<f64>() {
            Ok(n) => Il::Val(Value::Num(n)),
            Err(_) => Il::err("badNumber"),
        },
        Expr::String(s) => Il::Val(Value::str(Rc::clone(s))),
        Expr::Vector(elems) => lower_vector(elems, env),
        Expr::Map(entries) => lower_map(entries, env),
        Expr::Binop(BinOp::And, a, b) => lower_and(a, b, env),
        Expr::Binop(BinOp::Or, a, b) => lower_or(a, b, env),
        Expr::Binop(BinOp::Apply, f, x) => Il::app(lower_node(f, env), vec![lower_node(x, env)]),
        Expr::Binop(op, a, b) => {
            Il::app(Il::Val(behavior::binop_fn(*op)), vec![lower_node(a, env), lower_node(b, env)])
        }
        Expr::Unop(crate::ast::UnOp::Not, a) => Il::app(Il::Val(behavior::not_fn()), vec![lower_node(a, env)]),
        Expr::Unop(crate::ast::UnOp::Neg, a) => Il::app(Il::Val(behavior::neg_fn()), vec![lower_node(a, env)]),
        Expr::Call(func, args) => {
            Il::app(lower_node(func, env), args.iter().map(|a| lower_node(a, env)).collect())
        }
        Expr::Dot(obj, name) => {
            Il::app(Il::Val(behavior::dot_fn(Rc::clone(name))), vec![lower_node(obj, env)])
        }
        Expr::Index(obj, idx) => {
            Il::app(Il::Val(behavior::index_fn()), vec![lower_node(obj, env), lower_node(idx, env)])
        }
        Expr::Fn(params, body) => {
            let inner = env.extend(params.clone());
            Il::fun(params.len() as u32, lower_node(body, &inner))
        }
        Expr::IIf(cond, a, b) => {
            let cond_il = lower_node(cond, env);
            select_expr(cond_il, |e| lower_node(a, e), |e| lower_node(b, e), env)
        }
        Expr::Block(block) => lower_block(block, env, None),
        Expr::Match(value, cases) => lower_match(value, cases, env),
        Expr::VecPattern(_) => Il::err("unknownExpr:VecPattern"),
        Expr::Missing | Expr::MissingBlock => Il::Val(Value::Bool(false)),
    }
}

fn lower_vector(elems: &[Node], env: &Env) -> Il {
    // `[a, b, c]` builds through the same host path a user-level "build a vec" builtin
    // would: fold `.push(x)` over an empty literal. `dot_fn` resolves the bound method
    // (one `App`), which is then itself applied to the new element (a second `App`).
    let mut il = Il::Val(Value::Vec(Rc::new(Vec::new())));
    for elem in elems {
        let push_method = Il::app(Il::Val(behavior::dot_fn("push".into())), vec![il]);
        il = Il::app(push_method, vec![lower_node(elem, env)]);
    }
    il
}

fn lower_map(entries: &[crate::ast::MapEntry], env: &Env) -> Il {
    let mut il = Il::Val(Value::Map(Rc::new(indexmap::IndexMap::default())));
    for entry in entries {
        let set_method = Il::app(Il::Val(behavior::dot_fn("set".into())), vec![il]);
        il = Il::app(set_method, vec![Il::Val(Value::str(Rc::clone(&entry.key))), lower_node(&entry.value, env)]);
    }
    il
}

fn lower_and(a: &Node, b: &Node, env: &Env) -> Il {
    let a_il = lower_node(a, env);
    let env_a = env.extend(vec!["$a".into()]);
    let body = select_expr(arg_ref(&env_a, "$a"), |e| lower_node(b, e), |e| arg_ref(e, "$a"), &env_a);
    Il::app(Il::fun(1, body), vec![a_il])
}

fn lower_or(a: &Node, b: &Node, env: &Env) -> Il {
    let a_il = lower_node(a, env);
    let env_a = env.extend(vec!["$a".into()]);
    let body = select_expr(arg_ref(&env_a, "$a"), |e| arg_ref(e, "$a"), |e| lower_node(b, e), &env_a);
    Il::app(Il::fun(1, body), vec![a_il])
}

/// A block executing inside a loop's body needs two extra continuations spliced in
/// wherever a bare `while cond` statement appears: `cont`, for "keep going", is this
/// same function called with the next statement index; `stop`, for "condition failed,
/// stop looping", calls the enclosing loop's `$post` continuation. Outside a loop,
/// `loop_ctx` is `None` and a `while` statement is simply malformed.
struct LoopCtx {
    carried: Vec<Rc<str>>,
}

fn lower_block(block: &Block, env: &Env, loop_ctx: Option<&LoopCtx>) -> Il {
    lower_stmts(&block.stmts, 0, &block.tail, env, loop_ctx)
}

fn lower_stmts(stmts: &[Stmt], idx: usize, tail: &Node, env: &Env, loop_ctx: Option<&LoopCtx>) -> Il {
    let Some(stmt) = stmts.get(idx) else {
        return match loop_ctx {
            None => lower_node(tail, env),
            Some(ctx) => {
                // The tail expression of a loop body is evaluated for effect only,
                // then the loop recurses. The recursive call is built fresh against
                // whatever env `sequence_discard` actually hands its continuation —
                // precomputing it against `env` would be one frame too shallow.
                if matches!(tail.expr, Expr::Missing) {
                    recurse_call(env, ctx)
                } else {
                    sequence_discard(lower_node(tail, env), |e| recurse_call(e, ctx), env)
                }
            }
        };
    };
    match stmt {
        Stmt::Let { target, op, value } => lower_let(target, *op, value, stmts, idx, tail, env, loop_ctx),
        Stmt::Act { act, .. } => {
            let _ = act;
            let rest = |e: &Env| lower_stmts(stmts, idx + 1, tail, e, loop_ctx);
            sequence_discard(Il::err("unimplementedAct"), rest, env)
        }
        Stmt::Case { .. } => Il::err("bad case"),
        Stmt::If { cond, then } => {
            // `if c: t` as a non-tail statement is equivalent to evaluating `c and t`
            // for effect only: this reuses the and/or short-circuit lowering instead
            // of re-lowering the remaining statements once per branch.
            let synthetic = Node::synthetic(Expr::Binop(BinOp::And, Box::new(cond.clone()), Box::new(then.clone())));
            let rest = |e: &Env| lower_stmts(stmts, idx + 1, tail, e, loop_ctx);
            sequence_discard(lower_node(&synthetic, env), rest, env)
        }
        Stmt::Assert { cond } => {
            // `assert cond` faults with the same `Stop` name a bare `.stop()` call
            // would, per the runtime fault taxonomy; the CLI front end distinguishes
            // an assertion's `Stop` from any other by checking whether the faulting
            // trace node is this statement's condition.
            let cond_il = lower_node(cond, env);
            let rest = |e: &Env| lower_stmts(stmts, idx + 1, tail, e, loop_ctx);
            select_expr(cond_il, rest, |_e| Il::err("Stop"), env)
        }
        Stmt::While { cond } => match loop_ctx {
            None => Il::err("bad repeat"),
            Some(ctx) => {
                let cond_il = lower_node(cond, env);
                let cont = |e: &Env| lower_stmts(stmts, idx + 1, tail, e, Some(ctx));
                let stop = |e: &Env| call_post(e, ctx);
                select_expr(cond_il, cont, stop, env)
            }
        },
        Stmt::Loop { block } => lower_loop(None, block, stmts, idx, tail, env, loop_ctx),
        Stmt::LoopWhile { cond, block } => lower_loop(Some(cond), block, stmts, idx, tail, env, loop_ctx),
        Stmt::For { name, seq, body } => lower_for(name, seq, body, stmts, idx, tail, env, loop_ctx),
        Stmt::Expr(value) => {
            let rest = |e: &Env| lower_stmts(stmts, idx + 1, tail, e, loop_ctx);
            sequence_discard(lower_node(value, env), rest, env)
        }
    }
}

/// `App(Fun(1, cont), [value])`, with `cont` built against the frame that `Fun`
/// introduces. This is the single building block every form of "evaluate, discard,
/// continue" sequencing in this file funnels through.
fn sequence_discard(value: Il, cont: impl FnOnce(&Env) -> Il, env: &Env) -> Il {
    let env1 = env.extend(vec!["$_".into()]);
    Il::app(Il::fun(1, cont(&env1)), vec![value])
}

fn lower_let(
    target: &Node,
    op: AssignOp,
    value: &Node,
    stmts: &[Stmt],
    idx: usize,
    tail: &Node,
    env: &Env,
    loop_ctx: Option<&LoopCtx>,
) -> Il {
    match &target.expr {
        Expr::Name(name) => {
            let value_il = match op {
                AssignOp::Set => {
                    if env.bound_locally(name) {
                        Il::err(format!("Shadow:{name}"))
                    } else {
                        lower_node(value, env)
                    }
                }
                AssignOp::Define => {
                    if env.find(name).is_none() {
                        Il::err(format!("Undefined:{name}"))
                    } else {
                        lower_node(value, env)
                    }
                }
                AssignOp::Compound(bin_op) => {
                    if env.find(name).is_none() {
                        Il::err(format!("Undefined:{name}"))
                    } else {
                        let current = arg_ref(env, name);
                        Il::app(Il::Val(behavior::binop_fn(bin_op)), vec![current, lower_node(value, env)])
                    }
                }
            };
            let inner = env.extend(vec![name.clone()]);
            let rest = lower_stmts(stmts, idx + 1, tail, &inner, loop_ctx);
            Il::app(Il::fun(1, rest), vec![value_il])
        }
        Expr::Dot(..) | Expr::Index(..) => {
            // Compound assignment to a property/index target reads-then-writes through
            // the same `lower_assign_target` path, with the binop applied to the
            // freshly read current value.
            let new_value_il = match op {
                AssignOp::Compound(bin_op) => {
                    let current = lower_node(target, env);
                    Il::app(Il::Val(behavior::binop_fn(bin_op)), vec![current, lower_node(value, env)])
                }
                AssignOp::Set | AssignOp::Define => lower_node(value, env),
            };
            match lower_assign_target(target, new_value_il, env) {
                Some((root, new_root_value)) => {
                    if env.find(&root).is_none() {
                        return Il::err(format!("Undefined:{root}"));
                    }
                    let inner = env.extend(vec![root]);
                    let rest = lower_stmts(stmts, idx + 1, tail, &inner, loop_ctx);
                    Il::app(Il::fun(1, rest), vec![new_root_value])
                }
                None => Il::err("bad target"),
            }
        }
        _ => Il::err("bad target"),
    }
}

/// Rewrites `base.field = v` / `base[i] = v` into "rebuild `base` with that slot
/// replaced", recursing until it bottoms out at a plain name — the only thing an
/// assignment ever actually rebinds.
fn lower_assign_target(target: &Node, new_value: Il, env: &Env) -> Option<(Rc<str>, Il)> {
    match &target.expr {
        Expr::Name(name) => Some((name.clone(), new_value)),
        Expr::Dot(base, field) => {
            let set = Il::app(Il::Val(behavior::with_field_fn(Rc::clone(field))), vec![lower_node(base, env), new_value]);
            lower_assign_target(base, set, env)
        }
        Expr::Index(base, index) => {
            let set = Il::app(
                Il::Val(behavior::with_index_fn()),
                vec![lower_node(base, env), lower_node(index, env), new_value],
            );
            lower_assign_target(base, set, env)
        }
        _ => None,
    }
}

fn recurse_call(env: &Env, ctx: &LoopCtx) -> Il {
    let self_ref = arg_ref(env, "$self");
    let mut args = vec![self_ref.clone()];
    args.extend(ctx.carried.iter().map(|name| arg_ref(env, name)));
    Il::app(self_ref, args)
}

fn call_post(env: &Env, ctx: &LoopCtx) -> Il {
    let post_ref = arg_ref(env, "$post");
    let args = ctx.carried.iter().map(|name| arg_ref(env, name)).collect();
    Il::app(post_ref, args)
}

/// Every name reassigned with `:=`/a compound operator at the top level of this block
/// is loop-carried: its value must flow from one iteration into the next. Assignments
/// nested inside a further `if`/`match`/inner block are not scanned — those bind a
/// fresh shadow local to that nested scope, not a loop-carried variable.
fn carried_vars(block: &Block, env: &Env) -> Vec<Rc<str>> {
    let mut names = Vec::new();
    for stmt in &block.stmts {
        if let Stmt::Let { target: Node { expr: Expr::Name(name), .. }, op: AssignOp::Define | AssignOp::Compound(_), .. } = stmt
            && env.find(name).is_some()
            && !names.contains(name)
        {
            names.push(name.clone());
        }
    }
    names
}

#[allow(clippy::too_many_arguments)]
fn lower_loop(
    precond: Option<&Node>,
    block: &Block,
    stmts: &[Stmt],
    idx: usize,
    tail: &Node,
    env: &Env,
    outer_loop_ctx: Option<&LoopCtx>,
) -> Il {
    let carried = carried_vars(block, env);

    let post_env = env.extend(carried.clone());
    let post_body = lower_stmts(stmts, idx + 1, tail, &post_env, outer_loop_ctx);
    let post_fn = Il::fun(carried.len() as u32, post_body);

    let env_post = env.extend(vec!["$post".into()]);
    let mut step_names = vec!["$self".into()];
    step_names.extend(carried.iter().cloned());
    let env_step = env_post.extend(step_names);

    let ctx = LoopCtx { carried: carried.clone() };
    let stepper_body = match precond {
        Some(cond) => {
            // The body only runs inside `select`'s then-thunk, one frame deeper than
            // `env_step` — it must be lowered against the environment `select_expr`
            // actually hands the closure, not precomputed against `env_step` itself.
            let cond_il = lower_node(cond, &env_step);
            select_expr(cond_il, |e| lower_block(block, e, Some(&ctx)), |e| call_post(e, &ctx), &env_step)
        }
        None => lower_block(block, &env_step, Some(&ctx)),
    };
    let stepper = Il::fun(1 + carried.len() as u32, stepper_body);

    let mut kickoff_args = vec![stepper.clone()];
    kickoff_args.extend(carried.iter().map(|name| arg_ref(&env_post, name)));
    let kickoff = Il::app(stepper, kickoff_args);

    Il::app(Il::fun(1, kickoff), vec![post_fn])
}

#[allow(clippy::too_many_arguments)]
fn lower_for(
    name: &Rc<str>,
    seq: &Node,
    body: &Node,
    stmts: &[Stmt],
    idx: usize,
    tail: &Node,
    env: &Env,
    outer_loop_ctx: Option<&LoopCtx>,
) -> Il {
    // `for x in seq: body` desugars to an index-counted `loop while`: bind the
    // sequence and a counter, then loop while the counter is in range, reusing
    // `lower_loop`'s recursive-closure machinery unchanged.
    let index_name: Rc<str> = "$i".into();
    let seq_name: Rc<str> = "$seq".into();
    let len_check = Node::synthetic(Expr::Binop(
        BinOp::Lt,
        Box::new(Node::synthetic(Expr::Name(index_name.clone()))),
        Box::new(Node::synthetic(Expr::Dot(Box::new(Node::synthetic(Expr::Name(seq_name.clone()))), "len".into()))),
    ));
    let elem = Node::synthetic(Expr::Index(
        Box::new(Node::synthetic(Expr::Name(seq_name.clone()))),
        Box::new(Node::synthetic(Expr::Name(index_name.clone()))),
    ));
    let body_block = as_block(body);
    let mut inner_stmts = vec![Stmt::Let { target: Node::synthetic(Expr::Name(name.clone())), op: AssignOp::Set, value: elem }];
    inner_stmts.extend(body_block.stmts.clone());
    inner_stmts.push(Stmt::Let {
        target: Node::synthetic(Expr::Name(index_name.clone())),
        op: AssignOp::Compound(BinOp::Add),
        value: Node::synthetic(Expr::Number("1".into())),
    });
    let loop_block = Block { stmts: inner_stmts, tail: body_block.tail, span: None };

    let seq_let = Stmt::Let { target: Node::synthetic(Expr::Name(seq_name)), op: AssignOp::Set, value: seq.clone() };
    let idx_let = Stmt::Let {
        target: Node::synthetic(Expr::Name(index_name)),
        op: AssignOp::Set,
        value: Node::synthetic(Expr::Number("0".into())),
    };
    let loop_stmt = Stmt::LoopWhile { cond: len_check, block: loop_block };

    let mut combined: Vec<Stmt> = vec![seq_let, idx_let, loop_stmt];
    combined.extend(stmts[idx + 1..].iter().cloned());
    lower_stmts(&combined, 0, tail, env, outer_loop_ctx)
}

fn as_block(node: &Node) -> Block {
    match &node.expr {
        Expr::Block(b) => b.clone(),
        _ => Block { stmts: Vec::new(), tail: Box::new(node.clone()), span: node.span },
    }
}

fn lower_match(value: &Node, cases: &[MatchCase], env: &Env) -> Il {
    let value_il = lower_node(value, env);
    let env_scrutinee = env.extend(vec!["$scrutinee".into()]);
    let body = build_case_chain(cases, 0, &env_scrutinee);
    Il::app(Il::fun(1, body), vec![value_il])
}

fn build_case_chain(cases: &[MatchCase], i: usize, env: &Env) -> Il {
    // A match with no matching arm falls through to the same `Stop` fault `.stop()`
    // produces, matching the "initial so-far is a fatal error" rule for case lowering.
    let Some(case) = cases.get(i) else { return Il::err("Stop") };
    // The test is evaluated as `select`'s `cond` argument, at `env`'s own depth; the
    // body, if chosen, runs one frame deeper (the thunk `select_expr` wraps it in), so
    // its bindings must be recompiled against that deeper environment rather than
    // reusing the ones computed here.
    let scrutinee = arg_ref(env, "$scrutinee");
    let (test_il, _) = compile_pattern(&case.pattern, &scrutinee, env);
    let then_branch = move |e: &Env| {
        let scrutinee = arg_ref(e, "$scrutinee");
        let (_, bindings) = compile_pattern(&case.pattern, &scrutinee, e);
        let bound_names: Vec<Rc<str>> = bindings.iter().map(|(n, _)| n.clone()).collect();
        let body_env = e.extend(bound_names);
        let body_il = lower_node(&case.body, &body_env);
        let then_fn = Il::fun(bindings.len() as u32, body_il);
        Il::app(then_fn, bindings.into_iter().map(|(_, v)| v).collect())
    };
    let else_branch = |e: &Env| build_case_chain(cases, i + 1, e);
    select_expr(test_il, then_branch, else_branch, env)
}

/// Compiles a `match` pattern against `scrutinee` (an already-lowered reference to the
/// value being matched) into a boolean test plus the `(name, value)` bindings it
/// introduces on success.
fn compile_pattern(pattern: &Node, scrutinee: &Il, env: &Env) -> (Il, Vec<(Rc<str>, Il)>) {
    match &pattern.expr {
        Expr::Name(name) => (Il::Val(Value::Bool(true)), vec![(name.clone(), scrutinee.clone())]),
        Expr::Number(_) | Expr::String(_) => {
            let literal = lower_expr(&pattern.expr, env);
            (Il::app(Il::Val(behavior::binop_fn(BinOp::Eq)), vec![scrutinee.clone(), literal]), Vec::new())
        }
        Expr::VecPattern(elems) => {
            let len_ok = Il::app(
                Il::Val(behavior::binop_fn(BinOp::Eq)),
                vec![
                    Il::app(Il::Val(behavior::dot_fn("len".into())), vec![scrutinee.clone()]),
                    Il::Val(Value::Num(elems.len() as f64)),
                ],
            );
            let mut test = len_ok;
            let mut bindings = Vec::new();
            for (i, elem) in elems.iter().enumerate() {
                let elem_ref = Il::app(Il::Val(behavior::index_fn()), vec![scrutinee.clone(), Il::Val(Value::Num(i as f64))]);
                let (elem_test, elem_bindings) = compile_pattern(elem, &elem_ref, env);
                // Plain (non-short-circuiting) boolean conjunction: both sides are
                // already-computed test values, not side-effecting thunks, so there is
                // nothing to gain from routing this through `select`.
                test = Il::app(Il::Val(behavior::bool_and_fn()), vec![test, elem_test]);
                bindings.extend(elem_bindings);
            }
            (test, bindings)
        }
        _ => (Il::err("bad pattern"), Vec::new()),
    }
}
