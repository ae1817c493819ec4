//! `Bool` behavior. `and`/`or` are not here: they short-circuit through
//! [`super::select`] instead of going through the regular property/operator tables.

use crate::error::Fault;
use crate::value::Value;

pub(super) fn property(b: bool, name: &str) -> Result<Value, Fault> {
    match name {
        "str" => Ok(Value::str(if b { "true" } else { "false" })),
        "switch" => Ok(super::host_fn(move |args| {
            let [if_true, if_false] = args else { return Err(Fault::ArityNot(2)) };
            Ok(if b { if_true.clone() } else { if_false.clone() })
        })),
        _ => Err(Fault::UnknownProperty(name.into())),
    }
}
