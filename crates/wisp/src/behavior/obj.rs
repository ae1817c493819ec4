//! `Obj`/`Cls` behavior: field access on instances, and `NewClass`-style construction
//! lives on the class value itself (a `Cls` is directly callable; see
//! [`crate::eval::Eval::apply`]).

use std::rc::Rc;

use crate::error::Fault;
use crate::value::{Class, Value};

pub(super) fn property(class: &Class, values: &Rc<Vec<Value>>, name: &str) -> Result<Value, Fault> {
    if let Some(idx) = class.fields.iter().position(|f| &**f == name) {
        return Ok(values[idx].clone());
    }
    match name {
        "class" => Ok(Value::Cls(class.clone())),
        // `p.setProp(name, v)` is the dot-dispatched twin of `p.name = v`, which
        // lowers straight to `super::with_field_fn` instead of through here — see
        // `crate::desugar::lower_assign_target`. Both rebuild the same way.
        "setProp" => {
            let class = class.clone();
            let values = Rc::clone(values);
            Ok(super::host_fn(move |args| {
                let [name, val] = args else { return Err(Fault::ArityNot(2)) };
                let Value::Str(name) = name else { return Err(Fault::Expected("Str")) };
                let Some(idx) = class.fields.iter().position(|f| **f == **name) else {
                    return Err(Fault::UnknownProperty(name.as_ref().into()));
                };
                let mut next = (*values).clone();
                next[idx] = val.clone();
                Ok(Value::Obj(class.clone(), Rc::new(next)))
            }))
        }
        _ => Err(Fault::UnknownProperty(name.into())),
    }
}

pub(super) fn class_property(class: &Class, name: &str) -> Result<Value, Fault> {
    match name {
        "name" => Ok(Value::str(Rc::clone(&class.name))),
        "fields" => Ok(Value::Vec(Rc::new(class.fields.iter().map(|f| Value::str(Rc::clone(f))).collect()))),
        _ => Err(Fault::UnknownProperty(name.into())),
    }
}
