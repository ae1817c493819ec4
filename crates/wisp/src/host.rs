//! The embedding contract: how code outside this crate plugs externally visible
//! behavior (I/O, clocks, anything not expressible as a pure [`Value`] operation) into
//! a running program without the evaluator knowing anything about the embedder.
//!
//! A [`Host`] is handed to [`crate::manifest::build`], which binds each extern name it
//! answers for into the root frame as an ordinary [`Value::HFn`]. From the evaluator's
//! point of view there is no difference between a host-provided function and one built
//! in [`crate::behavior`] — both are just callable values.

use crate::error::Fault;
use crate::value::Value;

/// Names a [`Host`] implementation is willing to answer, so [`crate::manifest::build`]
/// knows which extern bindings to wire up.
pub trait Host {
    /// The externs this host provides, e.g. `["print", "clock"]`.
    fn externs(&self) -> &[&'static str];

    /// Invokes the extern named `name` with `args`. Only ever called with a name this
    /// host listed in [`Self::externs`].
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, Fault>;
}

/// The default embedding used by the CLI binary: `print` writes `Display`-formatted
/// values to stdout and returns its argument (so `print(x)` can appear mid-expression).
pub struct StdHost;

impl Host for StdHost {
    fn externs(&self) -> &[&'static str] {
        &["print"]
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, Fault> {
        match name {
            "print" => {
                let [v] = args else { return Err(Fault::ArityNot(1)) };
                println!("{v}");
                Ok(v.clone())
            }
            _ => Err(Fault::NotFound),
        }
    }
}

/// A host with no externs, for embeddings that want a pure evaluation sandbox.
pub struct NullHost;

impl Host for NullHost {
    fn externs(&self) -> &[&'static str] {
        &[]
    }

    fn call(&self, _name: &str, _args: &[Value]) -> Result<Value, Fault> {
        Err(Fault::NotFound)
    }
}
