//! Runtime values.
//!
//! Every value is cheap to clone: aggregates are `Rc`-shared and never mutated in
//! place. `x[i] = v` and `x.f = v` do not mutate `x`'s storage — they evaluate to a new
//! `Value` built from the old one, which the enclosing assignment then rebinds the name
//! to (see [`crate::desugar`]'s assignment lowering). This sidesteps aliasing entirely:
//! there is no way for two names to observe one write through the other, and no `Rc`
//! cycle is possible since a value can only reference values that already existed when
//! it was built.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::il::Il;

/// A class descriptor: an ordered list of field names, as produced by `NewClass`.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: Rc<str>,
    pub fields: Rc<[Rc<str>]>,
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.fields, &other.fields) && self.name == other.name
    }
}

/// A closure: a compiled function body plus the environment frame it closed over.
#[derive(Debug, Clone)]
pub struct Closure {
    pub arity: u32,
    pub body: Rc<Il>,
    pub captured: Rc<crate::eval::Frame>,
}

/// A host-provided callable, the escape hatch by which [`crate::behavior`] exposes
/// built-in operations (`+`, `.len`, `.push`, ...) as ordinary callable values.
pub type HostFn = Rc<dyn Fn(&[Value]) -> Result<Value, crate::error::Fault>>;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Vec(Rc<Vec<Value>>),
    /// An ordered string-keyed map, as produced by a `{ ... }` literal.
    Map(Rc<IndexMap<Rc<str>, Value, ahash::RandomState>>),
    /// An instance of a class: the class descriptor plus one value per field, in the
    /// class's field order.
    Obj(Class, Rc<Vec<Value>>),
    /// A class descriptor, itself a value so it can be bound, passed, and compared.
    Cls(Class),
    Fun(Rc<Closure>),
    HFn(HostFn),
    /// An error sentinel: carries the fault's machine name (`"Bounds"`, `"Undefined:x"`,
    /// ...). Errors are ordinary values here — nothing unwinds the Rust stack; they are
    /// produced, returned, and inspected like any other value (see [`crate::eval`]).
    Err(Rc<str>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Num(n) => write!(f, "{}", crate::behavior::format_num(*n)),
            Self::Str(s) => write!(f, "{s}"),
            Self::Vec(v) => {
                write!(f, "[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Self::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Obj(class, values) => {
                write!(f, "{}(", class.name)?;
                for (i, (name, v)) in class.fields.iter().zip(values.iter()).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                write!(f, ")")
            }
            Self::Cls(class) => write!(f, "<class {}>", class.name),
            Self::Fun(_) => write!(f, "<fn>"),
            Self::HFn(_) => write!(f, "<builtin>"),
            Self::Err(name) => write!(f, "<err {name}>"),
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Num(n) => write!(f, "Num({n})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Vec(v) => write!(f, "Vec({v:?})"),
            Self::Map(m) => write!(f, "Map({m:?})"),
            Self::Obj(c, v) => write!(f, "Obj({}, {v:?})", c.name),
            Self::Cls(c) => write!(f, "Cls({})", c.name),
            Self::Fun(_) => write!(f, "Fun(..)"),
            Self::HFn(_) => write!(f, "HFn(..)"),
            Self::Err(name) => write!(f, "Err({name:?})"),
        }
    }
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "Bool",
            Self::Num(_) => "Num",
            Self::Str(_) => "Str",
            Self::Vec(_) => "Vec",
            Self::Map(_) => "Map",
            Self::Obj(..) => "Obj",
            Self::Cls(_) => "Cls",
            Self::Fun(_) => "Fun",
            Self::HFn(_) => "HFn",
            Self::Err(_) => "Err",
        }
    }

    #[must_use]
    pub const fn is_callable(&self) -> bool {
        matches!(self, Self::Fun(_) | Self::HFn(_) | Self::Cls(_))
    }

    /// Never call this with a [`Self::Err`]: a fault halts evaluation the moment it's
    /// produced (see `Eval::apply`), so no branching construct ever gets to ask whether
    /// one is truthy — there is no well-defined answer, only an aborted computation.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Num(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Vec(v) => !v.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Obj(..) | Self::Cls(_) | Self::Fun(_) | Self::HFn(_) => true,
            Self::Err(_) => unreachable!("a fault halts evaluation before reaching a truthiness check"),
        }
    }

    /// Structural equality, used by `==`/`!=` and `match` pattern comparison. Functions
    /// and host functions compare by identity; `Obj`/`Cls` compare by class identity and
    /// field values.
    #[must_use]
    pub fn value_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Num(a), Self::Num(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Vec(a), Self::Vec(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.value_eq(y)),
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.value_eq(w)))
            }
            (Self::Obj(ca, va), Self::Obj(cb, vb)) => ca == cb && va.iter().zip(vb.iter()).all(|(x, y)| x.value_eq(y)),
            (Self::Cls(a), Self::Cls(b)) => a == b,
            (Self::Fun(a), Self::Fun(b)) => Rc::ptr_eq(a, b),
            (Self::HFn(a), Self::HFn(b)) => Rc::ptr_eq(a, b),
            (Self::Err(a), Self::Err(b)) => a == b,
            _ => false,
        }
    }

    #[must_use]
    pub fn err(desc: impl Into<Rc<str>>) -> Self {
        Self::Err(desc.into())
    }

    #[must_use]
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }
}
