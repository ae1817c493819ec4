//! The IL tree-walking evaluator.
//!
//! Evaluation is iterative, not recursive: instead of a Rust function calling itself
//! down the `Il` tree (which would grow the host stack one frame per nested call, the
//! very thing a script's deep recursion or long `loop` is trying to do), [`Eval`] keeps
//! its own explicit [`Task`] stack and a value stack, and drives them from a single
//! `step` loop. [`Eval::sync`] runs that loop for at most a caller-supplied number of
//! steps and returns whether the program finished, which is what lets a host cooperate
//! with other work instead of running a script to completion in one go (see the
//! concurrency notes on step-based scheduling).
//!
//! Every `Il::Tag` the evaluator passes through is recorded into a [`Trace`] arena, so
//! a finished (or faulted) evaluation can be inspected after the fact: which source
//! span produced which value, and how those spans nest. This is what lets the front end
//! show *why* an assertion failed by walking down to the first falsy sub-expression.
//!
//! A fault (`Value::Err`) is never fed into a closure, host builtin, or class
//! constructor: [`Eval::apply`] checks its callee and arguments for one before doing
//! anything else, and if it finds one, that fault becomes the result of the whole
//! application unchanged. Since every statement and branch in this language's surface
//! syntax desugars to some nested `App`, a fault produced anywhere propagates all the
//! way out to the program's final result this way, without the rest of the program's
//! tasks ever being scheduled.

use std::rc::Rc;

use crate::ast::Span;
use crate::il::Il;
use crate::value::{Class, Closure, Value};

/// A runtime argument frame: the values bound by one `Fun` application, plus a link to
/// the frame it closed over. `ups` in [`crate::il::Il::Arg`] walks this chain.
pub struct Frame {
    values: Vec<Value>,
    parent: Option<Rc<Frame>>,
}

impl Frame {
    #[must_use]
    pub fn root() -> Rc<Self> {
        Rc::new(Self { values: Vec::new(), parent: None })
    }

    #[must_use]
    pub fn child(parent: &Rc<Self>, values: Vec<Value>) -> Rc<Self> {
        Rc::new(Self { values, parent: Some(Rc::clone(parent)) })
    }

    fn get(&self, ups: u32, pos: u32) -> Value {
        let mut frame = self;
        for _ in 0..ups {
            frame = frame.parent.as_ref().expect("Env::find only ever produces addresses the desugarer can reach");
        }
        frame.values.get(pos as usize).cloned().unwrap_or_else(|| Value::err("Bounds"))
    }
}

/// One node of the provenance tree: the span that produced it, its final value, and
/// structural links to its parent/children tags.
pub struct ResultNode {
    ast: Span,
    value: Option<Value>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl ResultNode {
    #[must_use]
    pub const fn ast(&self) -> Span {
        self.ast
    }

    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    #[must_use]
    pub const fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

/// The tag-provenance arena accumulated over one evaluation.
#[derive(Default)]
pub struct Trace {
    nodes: Vec<ResultNode>,
}

impl Trace {
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&ResultNode> {
        self.nodes.get(idx)
    }

    /// `findTag`: the innermost recorded node whose span contains `pos`, i.e. the most
    /// specific sub-expression evaluated at that source position.
    #[must_use]
    pub fn find_tag(&self, pos: u32) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.ast.start <= pos && pos < n.ast.end)
            .min_by_key(|(_, n)| n.ast.end - n.ast.start)
            .map(|(i, _)| i)
    }

    /// The root-level result: the outermost tag recorded (a module's tail expression is
    /// always tagged), or `None` if nothing was ever tagged.
    #[must_use]
    pub fn root(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.parent.is_none())
    }
}

enum Task {
    Eval(Rc<Il>, Rc<Frame>),
    /// Applies the function pushed `argc + 1` value-stack slots ago (function first,
    /// then its arguments in order).
    Apply(u32),
    /// Evaluates `args[idx..]` in `frame` left to right, then performs `Apply(args.len())`.
    EvalArgs { args: Rc<[Il]>, idx: usize, frame: Rc<Frame> },
    /// Closes the tag opened for trace node `idx`: records the value now on top of the
    /// value stack (without consuming it) and pops the active-tag stack.
    CloseTag(usize),
}

/// Outcome of [`Eval::sync`].
pub enum Status {
    /// The step budget was exhausted before the program finished.
    Running,
    /// Evaluation finished with `Value`.
    Done(Value),
}

/// Drives one IL evaluation to completion (or step exhaustion).
pub struct Eval {
    tasks: Vec<Task>,
    values: Vec<Value>,
    active_tags: Vec<usize>,
    trace: Trace,
    steps: u64,
}

impl Eval {
    #[must_use]
    pub fn new(program: Rc<Il>, globals: Rc<Frame>) -> Self {
        Self {
            tasks: vec![Task::Eval(program, globals)],
            values: Vec::new(),
            active_tags: Vec::new(),
            trace: Trace::default(),
            steps: 0,
        }
    }

    #[must_use]
    pub const fn steps_taken(&self) -> u64 {
        self.steps
    }

    #[must_use]
    pub const fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Runs until the task stack empties or `max_steps` single-task steps have
    /// elapsed, whichever comes first.
    pub fn sync(&mut self, max_steps: u64) -> Status {
        let mut taken = 0u64;
        while taken < max_steps {
            let Some(task) = self.tasks.pop() else {
                let result = self.values.pop().expect("a finished evaluation always leaves exactly one value");
                return Status::Done(result);
            };
            self.step(task);
            taken += 1;
            self.steps += 1;
        }
        if self.tasks.is_empty() && self.values.len() == 1 {
            return Status::Done(self.values.pop().expect("checked len == 1 above"));
        }
        Status::Running
    }

    /// Runs to completion regardless of step count; intended for tests and the CLI,
    /// which apply their own outer step cap via [`Self::sync`] in a loop when they need
    /// to interleave with other host work.
    pub fn run_to_completion(&mut self, step_chunk: u64) -> Value {
        loop {
            if let Status::Done(v) = self.sync(step_chunk) {
                return v;
            }
        }
    }

    fn step(&mut self, task: Task) {
        match task {
            Task::Eval(il, frame) => self.eval_step(&il, &frame),
            Task::Apply(argc) => self.apply(argc),
            Task::EvalArgs { args, idx, frame } => {
                if idx < args.len() {
                    self.tasks.push(Task::EvalArgs { args: Rc::clone(&args), idx: idx + 1, frame: Rc::clone(&frame) });
                    self.tasks.push(Task::Eval(Rc::new(args[idx].clone()), frame));
                } else {
                    self.tasks.push(Task::Apply(args.len() as u32));
                }
            }
            Task::CloseTag(idx) => {
                let value = self.values.last().cloned();
                self.trace.nodes[idx].value = value;
                self.active_tags.pop();
            }
        }
    }

    fn eval_step(&mut self, il: &Il, frame: &Rc<Frame>) {
        match il {
            Il::Val(v) => self.values.push(v.clone()),
            Il::Arg { ups, pos } => self.values.push(frame.get(*ups, *pos)),
            Il::Fun { arity, body } => {
                self.values.push(Value::Fun(Rc::new(Closure { arity: *arity, body: Rc::clone(body), captured: Rc::clone(frame) })));
            }
            Il::App { func, args } => {
                self.tasks.push(Task::EvalArgs { args: Rc::clone(args), idx: 0, frame: Rc::clone(frame) });
                self.tasks.push(Task::Eval(Rc::clone(func), Rc::clone(frame)));
            }
            Il::Err(desc) => self.values.push(Value::err(Rc::clone(desc))),
            Il::Tag { ast, il } => {
                let idx = self.trace.nodes.len();
                self.trace.nodes.push(ResultNode { ast: *ast, value: None, parent: self.active_tags.last().copied(), children: Vec::new() });
                if let Some(&parent) = self.active_tags.last() {
                    self.trace.nodes[parent].children.push(idx);
                }
                self.active_tags.push(idx);
                self.tasks.push(Task::CloseTag(idx));
                self.tasks.push(Task::Eval(Rc::clone(il), Rc::clone(frame)));
            }
        }
    }

    fn apply(&mut self, argc: u32) {
        let at = self.values.len() - argc as usize;
        let args: Vec<Value> = self.values.split_off(at);
        let func = self.values.pop().expect("App always evaluates its callee first");

        // A fault in the callee or any argument aborts this application outright: the
        // fault is the result, verbatim, not whatever dispatching on it anyway would
        // produce (`NotAFunction` for a faulted callee, `ExpectedNum` for a faulted
        // operand, ...). Every computed value passes through here on its way into a
        // function — closure, host builtin, or class constructor — so this is the one
        // place that needs to check, and checking here is what makes a fault halt the
        // computation instead of silently being treated as just another value.
        if matches!(func, Value::Err(_)) {
            self.values.push(func);
            return;
        }
        if let Some(fault) = args.iter().find(|a| matches!(a, Value::Err(_))) {
            self.values.push(fault.clone());
            return;
        }

        match func {
            Value::Fun(closure) => {
                if closure.arity != argc {
                    self.values.push(Value::err(format!("ArityNot{}", closure.arity)));
                    return;
                }
                let frame = Frame::child(&closure.captured, args);
                self.tasks.push(Task::Eval(Rc::clone(&closure.body), frame));
            }
            Value::HFn(host) => match host(&args) {
                Ok(v) => self.values.push(v),
                Err(fault) => self.values.push(Value::err(fault.to_string())),
            },
            Value::Cls(class) => {
                if class.fields.len() != args.len() {
                    self.values.push(Value::err(format!("ArityNot{}", class.fields.len())));
                    return;
                }
                self.values.push(Value::Obj(class, Rc::new(args)));
            }
            _ => self.values.push(Value::err("NotAFunction")),
        }
    }
}

#[must_use]
pub fn new_class(name: impl Into<Rc<str>>, fields: Vec<Rc<str>>) -> Class {
    Class { name: name.into(), fields: fields.into() }
}

#[cfg(test)]
mod tests {
    use super::{Eval, Frame};
    use crate::il::Il;
    use crate::value::Value;
    use std::rc::Rc;

    #[test]
    fn evaluates_a_literal() {
        let mut ev = Eval::new(Rc::new(Il::Val(Value::Num(42.0))), Frame::root());
        let v = ev.run_to_completion(1000);
        assert!(matches!(v, Value::Num(n) if n == 42.0));
    }

    #[test]
    fn applies_a_closure() {
        // (x -> x)(7)
        let identity = Il::fun(1, Il::arg(0, 0));
        let call = Il::app(identity, vec![Il::Val(Value::Num(7.0))]);
        let mut ev = Eval::new(Rc::new(call), Frame::root());
        let v = ev.run_to_completion(1000);
        assert!(matches!(v, Value::Num(n) if n == 7.0));
    }

    #[test]
    fn arity_mismatch_yields_err_value() {
        let f = Il::fun(2, Il::arg(0, 0));
        let call = Il::app(f, vec![Il::Val(Value::Num(1.0))]);
        let mut ev = Eval::new(Rc::new(call), Frame::root());
        let v = ev.run_to_completion(1000);
        assert!(matches!(v, Value::Err(ref s) if &**s == "ArityNot2"));
    }

    #[test]
    fn tag_records_provenance() {
        let tagged = Il::tag(crate::ast::Span::new(3, 9), Il::Val(Value::Num(1.0)));
        let mut ev = Eval::new(Rc::new(tagged), Frame::root());
        let _ = ev.run_to_completion(1000);
        let idx = ev.trace().find_tag(5).expect("span [3,9) contains 5");
        assert!(matches!(ev.trace().get(idx).unwrap().value(), Some(Value::Num(n)) if *n == 1.0));
    }

    #[test]
    fn sync_reports_running_before_budget_exhausted() {
        let program = Il::app(Il::fun(1, Il::arg(0, 0)), vec![Il::Val(Value::Num(1.0))]);
        let mut ev = Eval::new(Rc::new(program), Frame::root());
        assert!(matches!(ev.sync(0), super::Status::Running));
    }
}
