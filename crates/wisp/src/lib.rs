#![doc = include_str!("../../../README.md")]

mod ast;
mod behavior;
mod desugar;
mod env;
mod error;
mod eval;
mod host;
mod il;
mod manifest;
mod parser;
mod peg;
mod value;

pub use crate::{
    ast::{BinOp, Block, ErrorTag, Expr, Node, Oob, Span, Stmt, UnOp},
    desugar::desugar_module,
    env::Env,
    error::{Error, Fault},
    eval::{Eval, Frame, ResultNode, Status, Trace},
    host::{Host, NullHost, StdHost},
    il::Il,
    manifest::{build as build_manifest, with_host},
    parser::parse_module,
    value::{Class, Closure, Value},
};
