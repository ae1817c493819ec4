//! The host value/behavior system: per-kind operator and property tables.
//!
//! The IL has no operator primitives of its own — `a + b` desugars to an ordinary
//! [`crate::il::Il::App`] of a host function value (see [`binop_fn`]), and `x.name`
//! desugars to a property lookup (see [`property`]) that returns a callable the
//! surrounding `Call` then applies. This file is the dispatch root; `bool_`, `num`,
//! `str_`, `vec_`, `map_`, and `obj` each own one value kind's table.

mod bool_;
mod map_;
mod num;
mod obj;
mod str_;
mod vec_;

pub use num::format_num;

use std::rc::Rc;

use crate::ast::BinOp;
use crate::error::Fault;
use crate::value::{HostFn, Value};

fn host_fn(f: impl Fn(&[Value]) -> Result<Value, Fault> + 'static) -> Value {
    Value::HFn(Rc::new(f) as HostFn)
}

/// `cond ? then_thunk() : else_thunk()`, without ever running the unchosen branch.
///
/// [`crate::desugar`] lowers every branching construct (`if`, `?:`, `and`, `or`, loop
/// conditions) to `App(App(Val(select), [cond, Fun(then), Fun(else)]), [])`: `select`
/// only *picks* one of the two zero-argument closures, and the outer `App` is what
/// actually runs it. Because picking and running are separate `Il::App` nodes, the
/// unchosen branch's body is never even pushed onto the evaluator's task stack — this
/// is how short-circuiting falls out of an evaluator with no native `if`.
#[must_use]
pub fn select() -> Value {
    host_fn(|args| {
        let [cond, then_thunk, else_thunk] = args else {
            return Err(Fault::ArityNot(3));
        };
        Ok(if cond.is_truthy() { then_thunk.clone() } else { else_thunk.clone() })
    })
}

/// Binary-operator dispatch used by desugared `Binop` nodes (except `and`/`or`, which
/// lower through [`select`] instead so they can short-circuit).
#[must_use]
pub fn binop_fn(op: BinOp) -> Value {
    host_fn(move |args| {
        let [a, b] = args else { return Err(Fault::ArityNot(2)) };
        apply_binop(op, a, b)
    })
}

fn apply_binop(op: BinOp, a: &Value, b: &Value) -> Result<Value, Fault> {
    match op {
        BinOp::Eq => Ok(Value::Bool(a.value_eq(b))),
        BinOp::Ne => Ok(Value::Bool(!a.value_eq(b))),
        BinOp::Concat => match (a, b) {
            (Value::Str(x), Value::Str(y)) => Ok(Value::str(format!("{x}{y}"))),
            (Value::Vec(x), Value::Vec(y)) => {
                Ok(Value::Vec(Rc::new(x.iter().chain(y.iter()).cloned().collect())))
            }
            _ => Err(Fault::Expected("StrOrVec")),
        },
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, a, b),
        _ => num::arith(op, a, b),
    }
}

fn compare(op: BinOp, a: &Value, b: &Value) -> Result<Value, Fault> {
    let ordering = match (a, b) {
        (Value::Num(x), Value::Num(y)) => x.partial_cmp(y),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => return Err(Fault::Expected("Num")),
    };
    let Some(ordering) = ordering else { return Ok(Value::Bool(false)) };
    Ok(Value::Bool(match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!("filtered by apply_binop"),
    }))
}

/// `not x`: generalized truthiness negation, not restricted to `Bool`.
#[must_use]
pub fn not_fn() -> Value {
    host_fn(|args| {
        let [a] = args else { return Err(Fault::ArityNot(1)) };
        Ok(Value::Bool(!a.is_truthy()))
    })
}

/// Arithmetic negation, `Num` only.
#[must_use]
pub fn neg_fn() -> Value {
    host_fn(|args| {
        let [a] = args else { return Err(Fault::ArityNot(1)) };
        match a {
            Value::Num(n) => Ok(Value::Num(-n)),
            _ => Err(Fault::Expected("Num")),
        }
    })
}

/// Builds the host function [`crate::desugar`] lowers every `Dot` node into: a
/// one-argument callable that resolves `name` on whatever receiver it's given.
#[must_use]
pub fn dot_fn(name: Rc<str>) -> Value {
    host_fn(move |args| {
        let [recv] = args else { return Err(Fault::ArityNot(1)) };
        property(recv, &name)
    })
}

/// `obj[idx]`, dispatched directly rather than through [`dot_fn`] so a non-indexable
/// receiver reports `Expected("Indexable")` instead of the confusing "not callable"
/// that would come from applying a property-lookup failure to an index argument.
#[must_use]
pub fn index_fn() -> Value {
    host_fn(|args| {
        let [obj, idx] = args else { return Err(Fault::ArityNot(2)) };
        match obj {
            Value::Vec(v) => match idx {
                Value::Num(n) => v.get(*n as usize).cloned().ok_or(Fault::Bounds),
                _ => Err(Fault::Expected("Num")),
            },
            Value::Map(m) => match idx {
                Value::Str(s) => m.get(&**s).cloned().ok_or(Fault::NotFound),
                _ => Err(Fault::Expected("Str")),
            },
            Value::Str(s) => match idx {
                Value::Num(n) => s.chars().nth(*n as usize).map(|c| Value::Num(c as u32 as f64)).ok_or(Fault::Bounds),
                _ => Err(Fault::Expected("Num")),
            },
            _ => Err(Fault::Expected("Indexable")),
        }
    })
}

/// `base.field = v` rewrites to `base := with_field(base, "field", v)`; see
/// [`crate::desugar::lower_assign_target`].
#[must_use]
pub fn with_field_fn(name: Rc<str>) -> Value {
    host_fn(move |args| {
        let [obj, val] = args else { return Err(Fault::ArityNot(2)) };
        match obj {
            Value::Obj(class, values) => {
                let Some(idx) = class.fields.iter().position(|f| **f == *name) else {
                    return Err(Fault::UnknownProperty(name.as_ref().into()));
                };
                let mut next = (**values).clone();
                next[idx] = val.clone();
                Ok(Value::Obj(class.clone(), Rc::new(next)))
            }
            Value::Map(m) => {
                let mut next = (**m).clone();
                next.insert(Rc::clone(&name), val.clone());
                Ok(Value::Map(Rc::new(next)))
            }
            _ => Err(Fault::Expected("ObjOrMap")),
        }
    })
}

/// `base[idx] = v` rewrites to `base := with_index(base, idx, v)`; see
/// [`crate::desugar::lower_assign_target`].
#[must_use]
pub fn with_index_fn() -> Value {
    host_fn(|args| {
        let [obj, idx, val] = args else { return Err(Fault::ArityNot(3)) };
        match obj {
            Value::Vec(v) => {
                let Value::Num(n) = idx else { return Err(Fault::Expected("Num")) };
                let n = *n as usize;
                if n >= v.len() {
                    return Err(Fault::Bounds);
                }
                let mut next = (**v).clone();
                next[n] = val.clone();
                Ok(Value::Vec(Rc::new(next)))
            }
            Value::Map(m) => {
                let Value::Str(key) = idx else { return Err(Fault::Expected("Str")) };
                let mut next = (**m).clone();
                next.insert(Rc::clone(key), val.clone());
                Ok(Value::Map(Rc::new(next)))
            }
            _ => Err(Fault::Expected("Indexable")),
        }
    })
}

/// Plain, non-short-circuiting boolean conjunction of two already-computed values.
/// Used by [`crate::desugar`]'s `match`-pattern compiler to combine independent
/// sub-pattern tests, where there is nothing to short-circuit (both sides are pure
/// and cheap) and `and`'s value-preserving short-circuit semantics would be the wrong
/// tool.
#[must_use]
pub fn bool_and_fn() -> Value {
    host_fn(|args| {
        let [a, b] = args else { return Err(Fault::ArityNot(2)) };
        Ok(Value::Bool(a.is_truthy() && b.is_truthy()))
    })
}

/// `x.name`: resolves a property on `x`, returning a value a trailing `(...)` can call,
/// or a plain value for field-like properties (e.g. object fields).
pub fn property(recv: &Value, name: &str) -> Result<Value, Fault> {
    match recv {
        Value::Bool(b) => bool_::property(*b, name),
        Value::Num(n) => num::property(*n, name),
        Value::Str(s) => str_::property(s, name),
        Value::Vec(v) => vec_::property(v, name),
        Value::Map(m) => map_::property(m, name),
        Value::Obj(class, values) => obj::property(class, values, name),
        Value::Cls(class) => obj::class_property(class, name),
        Value::Fun(_) | Value::HFn(_) | Value::Err(_) => Err(Fault::UnknownProperty(name.into())),
    }
}
