//! Builds the initial (root) environment every module is compiled and evaluated
//! against: `true`, `false`, `NewClass`, and whatever externs the supplied [`Host`]
//! advertises.

use std::rc::Rc;

use crate::env::Env;
use crate::error::Fault;
use crate::eval::{new_class, Frame};
use crate::host::Host;
use crate::value::Value;

/// `NewClass("Point", ["x", "y"])` builds a `Cls` value; calling that `Cls` value
/// constructs an `Obj` instance (see [`crate::eval::Eval::apply`]).
fn new_class_fn() -> Value {
    Value::HFn(Rc::new(|args: &[Value]| -> Result<Value, Fault> {
        let [name, fields] = args else { return Err(Fault::ArityNot(2)) };
        let Value::Str(name) = name else { return Err(Fault::Expected("Str")) };
        let Value::Vec(fields) = fields else { return Err(Fault::Expected("Vec")) };
        let mut names = Vec::with_capacity(fields.len());
        for f in fields.iter() {
            let Value::Str(s) = f else { return Err(Fault::Expected("Str")) };
            names.push(Rc::clone(s));
        }
        Ok(Value::Cls(new_class(Rc::clone(name), names)))
    }))
}

/// The compile-time [`Env`] and matching runtime root [`Frame`] for a module compiled
/// against `host`. Both list names in the same order — the desugarer resolves a name
/// through `Env::find` to the same `(ups, pos)` the evaluator's `Frame::get` expects.
#[must_use]
pub fn build(host: &dyn Host) -> (Env, Rc<Frame>) {
    let mut names: Vec<Rc<str>> = vec!["true".into(), "false".into(), "NewClass".into()];
    let mut values: Vec<Value> = vec![Value::Bool(true), Value::Bool(false), new_class_fn()];

    for &extern_name in host.externs() {
        names.push(extern_name.into());
        values.push(host_extern(extern_name));
    }

    let env = Env::new(names);
    let frame = Frame::child(&Frame::root(), values);
    (env, frame)
}

fn host_extern(name: &'static str) -> Value {
    Value::HFn(Rc::new(move |args: &[Value]| -> Result<Value, Fault> {
        // Re-dispatches through a thread-local-free call path: the host is captured by
        // name only, since `Value::HFn` cannot borrow a `&dyn Host` with a lifetime.
        // `crate::manifest::CURRENT_HOST` is set for the duration of one evaluation by
        // `crate::manifest::with_host`.
        CURRENT_HOST.with(|cell| {
            let host = cell.borrow();
            let host = host.as_ref().expect("set by with_host for the duration of evaluation");
            host.call(name, args)
        })
    }))
}

thread_local! {
    static CURRENT_HOST: std::cell::RefCell<Option<Rc<dyn Host>>> = const { std::cell::RefCell::new(None) };
}

/// Runs `f` with `host` installed as the target of every host-extern call bound by
/// [`build`]. Required because a [`Value::HFn`] is `'static` and so cannot directly
/// borrow the `Host` passed to [`build`].
pub fn with_host<R>(host: Rc<dyn Host>, f: impl FnOnce() -> R) -> R {
    CURRENT_HOST.with(|cell| *cell.borrow_mut() = Some(host));
    let result = f();
    CURRENT_HOST.with(|cell| *cell.borrow_mut() = None);
    result
}
