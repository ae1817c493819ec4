//! Fixture-driven coverage: every `tests/fixtures/*.wisp` file is run end to end and
//! its printed result compared against the sibling `*.expected` file. This is the
//! same thing the CLI does to a file on disk, just driven over a whole directory at
//! once instead of one test function per scenario.

use std::path::Path;
use std::rc::Rc;

use wisp::{Eval, NullHost, Status, build_manifest, desugar_module, parse_module, with_host};

fn run_fixture(path: &Path) -> datatest_stable::Result<()> {
    let source = std::fs::read_to_string(path)?;
    let expected = std::fs::read_to_string(path.with_extension("expected"))?;
    let expected = expected.trim_end();

    let (module, oob) = parse_module(&source);
    if !oob.is_empty() {
        return Err(format!("{}: unexpected parse diagnostics: {oob:?}", path.display()).into());
    }

    let host = Rc::new(NullHost);
    let (env, globals) = build_manifest(host.as_ref());
    let il = desugar_module(&module, &env);
    let mut eval = Eval::new(Rc::new(il), globals);
    let value = with_host(host, || loop {
        match eval.sync(1 << 16) {
            Status::Done(v) => break v,
            Status::Running => continue,
        }
    });

    let actual = value.to_string();
    if actual != expected {
        return Err(format!("{}: expected {expected:?}, got {actual:?}", path.display()).into());
    }
    Ok(())
}

datatest_stable::harness!(run_fixture, "tests/fixtures", r"^.*\.wisp$");
