//! The intermediate language the desugarer lowers the AST into: a minimal
//! lambda calculus plus a handful of host escape hatches.
//!
//! `Il` has no notion of names, blocks, loops, or patterns — all of that is compiled
//! away by [`crate::desugar`] into lexically addressed argument references, nested
//! closures, and applications of host-provided functions. This is deliberately small:
//! the evaluator in [`crate::eval`] only ever has to handle six node shapes.

use std::rc::Rc;

use crate::ast::Span;
use crate::value::Value;

/// One node of the intermediate language.
#[derive(Debug, Clone)]
pub enum Il {
    /// A literal value, already fully built (numbers, strings, host functions).
    Val(Value),
    /// A lexically addressed reference: `ups` frames up, `pos`-th argument in that frame.
    ///
    /// `ups == 0` addresses the innermost function's own arguments; the scheme mirrors
    /// de Bruijn indices but is 2-dimensional since frames can bind more than one name.
    Arg { ups: u32, pos: u32 },
    /// A closure template: `arity` arguments, `body` evaluated in a frame extending the
    /// defining environment. Capture happens at evaluation time, not here.
    Fun { arity: u32, body: Rc<Il> },
    /// Applies `func` to `args`, left to right.
    App { func: Rc<Il>, args: Rc<[Il]> },
    /// An unconditional fault, carrying a short machine-readable description
    /// (`"Undefined:x"`, `"bad target"`, ...). Produced for both desugar-time errors
    /// (so a bad program can still be evaluated, surfacing the fault through normal
    /// error-value machinery) and some runtime conditions.
    Err(Rc<str>),
    /// Provenance wrapper: associates `il` with the AST span `ast` it was lowered from,
    /// so evaluation faults can be traced back to source position without threading
    /// spans through every `Il` variant.
    Tag { ast: Span, il: Rc<Il> },
}

impl Il {
    #[must_use]
    pub fn tag(ast: Span, il: Self) -> Self {
        Self::Tag { ast, il: Rc::new(il) }
    }

    #[must_use]
    pub fn arg(ups: u32, pos: u32) -> Self {
        Self::Arg { ups, pos }
    }

    #[must_use]
    pub fn fun(arity: u32, body: Self) -> Self {
        Self::Fun { arity, body: Rc::new(body) }
    }

    #[must_use]
    pub fn app(func: Self, args: Vec<Self>) -> Self {
        Self::App { func: Rc::new(func), args: Rc::from(args.into_boxed_slice()) }
    }

    #[must_use]
    pub fn err(desc: impl Into<Rc<str>>) -> Self {
        Self::Err(desc.into())
    }

    /// Strips any number of `Tag` wrappers, returning the innermost span seen (if any)
    /// and a reference to the first non-`Tag` node.
    #[must_use]
    pub fn untag(&self) -> (Option<Span>, &Self) {
        let mut node = self;
        let mut span = None;
        while let Self::Tag { ast, il } = node {
            span = Some(*ast);
            node = il;
        }
        (span, node)
    }
}
