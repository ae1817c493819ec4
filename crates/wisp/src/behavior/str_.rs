//! `Str` behavior: string methods. `++` and ordering comparisons live in the shared
//! binop dispatcher since they're genuine binary operators, not properties.

use std::rc::Rc;

use crate::error::Fault;
use crate::value::Value;

pub(super) fn property(s: &Rc<str>, name: &str) -> Result<Value, Fault> {
    let owner = Rc::clone(s);
    match name {
        "len" => Ok(Value::Num(s.chars().count() as f64)),
        "upper" => Ok(Value::str(s.to_uppercase())),
        "lower" => Ok(Value::str(s.to_lowercase())),
        "trim" => Ok(Value::str(s.trim())),
        "slice" => Ok(super::host_fn(move |args| {
            let [start, end] = args else { return Err(Fault::ArityNot(2)) };
            let (Value::Num(start), Value::Num(end)) = (start, end) else { return Err(Fault::Expected("Num")) };
            let chars: Vec<char> = owner.chars().collect();
            let (start, end) = (*start as usize, *end as usize);
            if start > end || end > chars.len() {
                return Err(Fault::Bounds);
            }
            Ok(Value::str(chars[start..end].iter().collect::<String>()))
        })),
        "get" => Ok(super::host_fn(move |args| {
            let [idx] = args else { return Err(Fault::ArityNot(1)) };
            let Value::Num(idx) = idx else { return Err(Fault::Expected("Num")) };
            owner
                .chars()
                .nth(*idx as usize)
                .map(|c| Value::str(c.to_string()))
                .ok_or(Fault::Bounds)
        })),
        "split" => Ok(super::host_fn(move |args| {
            let [sep] = args else { return Err(Fault::ArityNot(1)) };
            let Value::Str(sep) = sep else { return Err(Fault::Expected("Str")) };
            Ok(Value::Vec(Rc::new(owner.split(&**sep).map(Value::str).collect())))
        })),
        _ => Err(Fault::UnknownProperty(name.into())),
    }
}
