use std::{env, fs, process::ExitCode, rc::Rc};

use wisp::{Block, Error, ErrorTag, Eval, Expr, Fault, Span, StdHost, Status, Stmt, build_manifest, desugar_module, parse_module, with_host};

/// Operations taken before the program has produced any result at all are charged no
/// step budget; everything past parsing runs to completion in chunks of this size.
const STEP_CHUNK: u64 = 1 << 16;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(file_path) = args.get(1) else {
        eprintln!("usage: wisp <file>");
        return ExitCode::FAILURE;
    };

    let source = match fs::read_to_string(file_path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("error reading {file_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    run(file_path, &source)
}

fn run(file_path: &str, source: &str) -> ExitCode {
    let (module, oob) = parse_module(source);
    let parse_errors: Vec<(ErrorTag, Span)> = oob
        .iter()
        .filter_map(|o| match o {
            wisp::Oob::Error { tag, span } => Some((*tag, *span)),
            wisp::Oob::Comment { .. } => None,
        })
        .collect();
    if !parse_errors.is_empty() {
        report_parse_errors(file_path, source, &Error::Parse(parse_errors));
        return ExitCode::FAILURE;
    }

    // `StdHost` wires up `print`; the CLI is the one embedding that wants scripts to
    // produce visible output as they run, not just a final printed result.
    let host = Rc::new(StdHost);
    let (env, globals) = build_manifest(host.as_ref());
    let il = desugar_module(&module, &env);

    let mut eval = Eval::new(Rc::new(il), globals);
    let value = with_host(Rc::clone(&host), || loop {
        match eval.sync(STEP_CHUNK) {
            Status::Done(v) => break v,
            Status::Running => continue,
        }
    });

    if let wisp::Value::Err(name) = &value {
        let fault = Fault::named(name.to_string());
        report_fault(file_path, source, &module, &eval, &fault);
        return ExitCode::FAILURE;
    }

    println!("{value}");
    ExitCode::SUCCESS
}

/// Reports a batch of parse-time diagnostics, each already carrying its own span.
fn report_parse_errors(file_path: &str, source: &str, error: &Error) {
    let Error::Parse(errs) = error else { return };
    for (tag, span) in errs {
        let (line, col, _) = locate(source, span.start);
        eprintln!("{file_path}:{line}:{col}: Error: {tag}");
    }
}

/// Reports a runtime fault. The module itself is the outermost tagged span, so
/// `Trace::root` alone only ever points at the whole program — the span worth
/// reporting is the innermost node that evaluated falsy, found by walking down from
/// the root through whichever child was itself falsy. For a failed `assert cond`,
/// that's exactly `cond`'s own span, which is what lets this tell an assertion
/// failure apart from a `Stop` raised any other way (the two share one fault name).
fn report_fault(file_path: &str, source: &str, module: &wisp::Node, eval: &Eval, fault: &Fault) {
    let name = fault.to_string();
    let Some(root) = eval.trace().root() else {
        eprintln!("{file_path}: Error: {name}");
        return;
    };
    let target = innermost_falsy(eval, root);
    let span = eval.trace().get(target).map(wisp::ResultNode::ast).unwrap_or_default();
    let (line, col, _) = locate(source, span.start);

    if name == "Stop" && module_has_assert_at(module, span) {
        eprintln!("{file_path}:{line}:{col}: Assertion failed");
        for &child in eval.trace().get(target).map(wisp::ResultNode::children).unwrap_or_default() {
            if let Some(node) = eval.trace().get(child) {
                let (cl, cc, _) = locate(source, node.ast().start);
                eprintln!("  {file_path}:{cl}:{cc}: {}", node.value().map_or_else(|| "<error>".to_owned(), ToString::to_string));
            }
        }
    } else {
        eprintln!("{file_path}:{line}:{col}: Error: {name}");
    }
}

/// Descends from `idx` through children whose recorded value was falsy, stopping at
/// the deepest one — the first point, from the top down, where the program actually
/// produced the value that sank the enclosing `assert`/`and`/`if`. A child that itself
/// faulted counts as falsy too, without calling `Value::is_truthy` on it — that method
/// isn't defined for `Err`, since evaluation never asks it to branch on one.
fn innermost_falsy(eval: &Eval, idx: usize) -> usize {
    let Some(node) = eval.trace().get(idx) else { return idx };
    for &child in node.children() {
        if let Some(child_node) = eval.trace().get(child)
            && child_node.value().is_some_and(|v| matches!(v, wisp::Value::Err(_)) || !v.is_truthy())
        {
            return innermost_falsy(eval, child);
        }
    }
    idx
}

/// `assert` lowers through `select`, so there is no dedicated IL marker for it by the
/// time a fault is traced; this walks the original AST instead, looking for an `Assert`
/// statement whose condition's span matches the faulting trace root. A `match` with no
/// matching arm faults with the same `Stop` name but never matches here, since it has no
/// `Assert` statement to find.
fn module_has_assert_at(node: &wisp::Node, span: Span) -> bool {
    match &node.expr {
        Expr::Block(block) => block_has_assert_at(block, span),
        _ => false,
    }
}

fn block_has_assert_at(block: &Block, span: Span) -> bool {
    block.stmts.iter().any(|s| stmt_has_assert_at(s, span)) || module_has_assert_at(&block.tail, span)
}

fn stmt_has_assert_at(stmt: &Stmt, span: Span) -> bool {
    match stmt {
        Stmt::Assert { cond } => cond.span == Some(span),
        Stmt::Loop { block } | Stmt::LoopWhile { block, .. } => block_has_assert_at(block, span),
        Stmt::If { then, .. } => module_has_assert_at(then, span),
        Stmt::For { body, .. } => module_has_assert_at(body, span),
        _ => false,
    }
}

/// Maps a byte offset into `(1-based line, 1-based column, the source line's text)`.
/// The front end (this CLI) owns this mapping; the core crate deals only in byte spans.
fn locate(source: &str, offset: u32) -> (usize, usize, &str) {
    let offset = offset as usize;
    let mut line_start = 0;
    let mut line = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    let line_text = source[line_start..].split('\n').next().unwrap_or_default();
    let col = source[line_start..offset.min(source.len())].chars().count() + 1;
    (line, col, line_text)
}
