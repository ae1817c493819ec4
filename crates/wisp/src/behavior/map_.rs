//! `Map` behavior: an ordered, string-keyed association, backed by [`indexmap::IndexMap`]
//! the same way the rest of the workspace reaches for it for order-preserving lookups.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::Fault;
use crate::value::Value;

type Map = IndexMap<Rc<str>, Value, ahash::RandomState>;

pub(super) fn property(m: &Rc<Map>, name: &str) -> Result<Value, Fault> {
    let owner = Rc::clone(m);
    match name {
        "len" => Ok(Value::Num(m.len() as f64)),
        "get" => Ok(super::host_fn(move |args| {
            let [key] = args else { return Err(Fault::ArityNot(1)) };
            let Value::Str(key) = key else { return Err(Fault::Expected("Str")) };
            owner.get(&**key).cloned().ok_or(Fault::NotFound)
        })),
        "has" => Ok(super::host_fn(move |args| {
            let [key] = args else { return Err(Fault::ArityNot(1)) };
            let Value::Str(key) = key else { return Err(Fault::Expected("Str")) };
            Ok(Value::Bool(owner.contains_key(&**key)))
        })),
        "set" => Ok(super::host_fn(move |args| {
            let [key, val] = args else { return Err(Fault::ArityNot(2)) };
            let Value::Str(key) = key else { return Err(Fault::Expected("Str")) };
            let mut next = (*owner).clone();
            next.insert(Rc::clone(key), val.clone());
            Ok(Value::Map(Rc::new(next)))
        })),
        "keys" => Ok(Value::Vec(Rc::new(m.keys().map(|k| Value::str(Rc::clone(k))).collect()))),
        "values" => Ok(Value::Vec(Rc::new(m.values().cloned().collect()))),
        _ => Err(Fault::UnknownProperty(name.into())),
    }
}
