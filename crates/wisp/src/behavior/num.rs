//! `Num` behavior: arithmetic and the handful of numeric methods.

use crate::ast::BinOp;
use crate::error::Fault;
use crate::value::Value;

pub(super) fn arith(op: BinOp, a: &Value, b: &Value) -> Result<Value, Fault> {
    let (Value::Num(x), Value::Num(y)) = (a, b) else { return Err(Fault::Expected("Num")) };
    Ok(Value::Num(match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::FloorDiv => (x / y).floor(),
        BinOp::Mod => x.rem_euclid(*y),
        BinOp::Pow => x.powf(*y),
        _ => return Err(Fault::named(format!("unsupportedOp:{op}"))),
    }))
}

pub(super) fn property(n: f64, name: &str) -> Result<Value, Fault> {
    match name {
        "floor" => Ok(Value::Num(n.floor())),
        "ceil" => Ok(Value::Num(n.ceil())),
        "round" => Ok(Value::Num(n.round())),
        "abs" => Ok(Value::Num(n.abs())),
        "str" => Ok(Value::str(format_num(n))),
        _ => Err(Fault::UnknownProperty(name.into())),
    }
}

/// Renders a `Num` the way a script author would write it back: integral values with
/// no trailing `.0`, everything else via the shortest round-tripping representation.
#[must_use]
pub fn format_num(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n < 0.0 { "-Infinity".to_string() } else { "Infinity".to_string() };
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{n:.0}");
    }
    let mut buf = ryu::Buffer::new();
    buf.format_finite(n).to_string()
}
