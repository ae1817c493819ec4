//! Error taxonomy.
//!
//! Three layers of failure exist in this crate, and they are deliberately not unified
//! into one enum:
//!
//! - Parse-time diagnostics ([`crate::ast::Oob::Error`]) are recoverable; the parser
//!   keeps going and produces a best-effort AST.
//! - Desugar-time problems (`Undefined:x`, `bad target`, ...) never abort lowering
//!   either: they become an [`crate::il::Il::Err`] node in place of the offending
//!   expression, so a program with one bad branch can still run the branches that are
//!   fine, and the bad branch fails exactly like any other runtime [`Fault`] if reached.
//! - [`Fault`] is the runtime, host-visible failure a running program can produce or
//!   observe as an error value.
//!
//! [`Error`] is the front-end-facing umbrella used by the CLI to report whichever of
//! the above actually happened, with `From` conversions so callers can use `?` freely.

use std::fmt;

use crate::ast::ErrorTag;

/// A runtime fault: the reason a host operation refused to proceed. These are the
/// payload of the interpreter's `Err` value kind, not Rust-level panics — a fault is
/// just another value until something (the CLI, an `assert`) treats it as fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// A value had a different kind than required (e.g. indexing a bool).
    Expected(&'static str),
    /// An index or slice bound fell outside the collection.
    Bounds,
    /// A map lookup or named lookup found nothing.
    NotFound,
    /// A `.name` access named a property the value's kind does not define.
    UnknownProperty(Box<str>),
    /// A property existed but resolved to something that isn't callable.
    BadPropertyType,
    /// Attempted to call a value that is not a function.
    NotAFunction,
    /// A `match` against a vector pattern had a length mismatch.
    SwitchArity,
    /// A function was called with the wrong number of arguments.
    ArityNot(u32),
    /// An evaluation was aborted after reaching its step budget.
    Stop,
    /// A desugar-time or other named failure, carried verbatim as text
    /// (`Undefined:x`, `bad target`, `unknownExpr:Match`, ...).
    Named(Box<str>),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expected(kind) => write!(f, "Expected{kind}"),
            Self::Bounds => write!(f, "Bounds"),
            Self::NotFound => write!(f, "NotFound"),
            Self::UnknownProperty(name) => write!(f, "UnknownProperty:{name}"),
            Self::BadPropertyType => write!(f, "BadPropertyType"),
            Self::NotAFunction => write!(f, "NotAFunction"),
            Self::SwitchArity => write!(f, "SwitchArity"),
            Self::ArityNot(n) => write!(f, "ArityNot{n}"),
            Self::Stop => write!(f, "Stop"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

impl std::error::Error for Fault {}

impl Fault {
    #[must_use]
    pub fn named(desc: impl Into<Box<str>>) -> Self {
        Self::Named(desc.into())
    }
}

/// Front-end umbrella error for the CLI binary: either the module failed to parse, or
/// it ran and raised an uncaught fault.
#[derive(Debug)]
pub enum Error {
    Parse(Vec<(ErrorTag, crate::ast::Span)>),
    Runtime(Fault),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(errs) => {
                write!(f, "{} parse error(s)", errs.len())
            }
            Self::Runtime(fault) => write!(f, "{fault}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Runtime(fault) => Some(fault),
            Self::Parse(_) => None,
        }
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Self::Runtime(fault)
    }
}
