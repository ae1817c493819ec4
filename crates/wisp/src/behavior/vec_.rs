//! `Vec` behavior. Every mutating-looking method (`push`, `set`, ...) returns a new
//! vector; see the module doc on [`crate::value`] for why.

use std::rc::Rc;

use crate::error::Fault;
use crate::value::Value;

pub(super) fn property(v: &Rc<Vec<Value>>, name: &str) -> Result<Value, Fault> {
    let owner = Rc::clone(v);
    match name {
        "len" => Ok(Value::Num(v.len() as f64)),
        "push" => Ok(super::host_fn(move |args| {
            let [x] = args else { return Err(Fault::ArityNot(1)) };
            let mut next = (*owner).clone();
            next.push(x.clone());
            Ok(Value::Vec(Rc::new(next)))
        })),
        "get" => Ok(super::host_fn(move |args| {
            let [idx] = args else { return Err(Fault::ArityNot(1)) };
            let Value::Num(idx) = idx else { return Err(Fault::Expected("Num")) };
            owner.get(*idx as usize).cloned().ok_or(Fault::Bounds)
        })),
        "set" => Ok(super::host_fn(move |args| {
            let [idx, val] = args else { return Err(Fault::ArityNot(2)) };
            let Value::Num(idx) = idx else { return Err(Fault::Expected("Num")) };
            let idx = *idx as usize;
            if idx > owner.len() {
                return Err(Fault::Bounds);
            }
            let mut next = (*owner).clone();
            if idx == next.len() {
                next.push(val.clone());
            } else {
                next[idx] = val.clone();
            }
            Ok(Value::Vec(Rc::new(next)))
        })),
        "slice" => Ok(super::host_fn(move |args| {
            let [start, end] = args else { return Err(Fault::ArityNot(2)) };
            let (Value::Num(start), Value::Num(end)) = (start, end) else { return Err(Fault::Expected("Num")) };
            let (start, end) = (*start as usize, *end as usize);
            if start > end || end > owner.len() {
                return Err(Fault::Bounds);
            }
            Ok(Value::Vec(Rc::new(owner[start..end].to_vec())))
        })),
        "reverse" => Ok(Value::Vec(Rc::new(v.iter().rev().cloned().collect()))),
        _ => Err(Fault::UnknownProperty(name.into())),
    }
}
