//! A small PEG (parsing expression grammar) combinator engine.
//!
//! This is the leaf layer the parser ([`crate::parser`]) is built on. A [`Pattern`] is a
//! value-semantic matcher: `match_at(subject, pos, state) -> Option<(pos, captures, state)>`.
//! Failure is the absent option; success returns a new position that is monotonically
//! `>= pos`, the captures produced, and the (possibly updated) threaded state.
//!
//! Patterns never backtrack mid-sequence: ordered choice retries alternatives against the
//! state the caller started with, not against state mutated by a failed earlier arm. This
//! keeps state-threading explicit rather than relying on save/restore.

use std::rc::Rc;

/// A captured value produced by a pattern match.
///
/// Most captures are substrings or positions; [`Capture::Node`] lets higher layers
/// (the inline grammar) thread already-built AST fragments through `.F` transforms.
#[derive(Debug, Clone)]
pub enum Capture<T> {
    Text(Rc<str>),
    Pos(u32),
    Node(T),
}

/// Outcome of a successful match: the new position and the captures produced.
pub struct MatchOk<T, S> {
    pub pos: usize,
    pub captures: Vec<Capture<T>>,
    pub state: S,
}

type MatchFn<T, S> = dyn Fn(&str, usize, S) -> Option<MatchOk<T, S>>;

/// A value-semantic, shareable parsing expression. Cloning a `Pattern` is cheap (an
/// `Rc` bump); this is what lets grammars reference the same sub-pattern from multiple
/// alternatives without re-describing it.
#[derive(Clone)]
pub struct Pattern<T, S> {
    run: Rc<MatchFn<T, S>>,
}

impl<T: 'static, S: Clone + 'static> Pattern<T, S> {
    fn new(run: impl Fn(&str, usize, S) -> Option<MatchOk<T, S>> + 'static) -> Self {
        Self { run: Rc::new(run) }
    }

    /// Runs the match contract directly.
    pub fn match_at(&self, subject: &str, pos: usize, state: S) -> Option<MatchOk<T, S>> {
        (self.run)(subject, pos, state)
    }

    /// Matches an exact byte string.
    #[must_use]
    pub fn literal(text: &'static str) -> Self {
        Self::new(move |subject, pos, state| {
            subject[pos..].as_bytes().starts_with(text.as_bytes()).then(|| MatchOk {
                pos: pos + text.len(),
                captures: Vec::new(),
                state,
            })
        })
    }

    /// Matches any `n` bytes (fails at end of input).
    #[must_use]
    pub fn any(n: usize) -> Self {
        Self::new(move |subject, pos, state| {
            (pos + n <= subject.len()).then(|| MatchOk { pos: pos + n, captures: Vec::new(), state })
        })
    }

    /// A single char found in any of the given inclusive 2-char ranges, e.g. `R(('a','z'),('0','9'))`.
    #[must_use]
    pub fn ranges(rs: &'static [(char, char)]) -> Self {
        Self::new(move |subject, pos, state| {
            let ch = subject[pos..].chars().next()?;
            rs.iter()
                .any(|&(lo, hi)| lo <= ch && ch <= hi)
                .then(|| MatchOk { pos: pos + ch.len_utf8(), captures: Vec::new(), state })
        })
    }

    /// A single char present in `chars`.
    #[must_use]
    pub fn set(chars: &'static str) -> Self {
        Self::new(move |subject, pos, state| {
            let ch = subject[pos..].chars().next()?;
            chars.contains(ch).then(|| MatchOk { pos: pos + ch.len_utf8(), captures: Vec::new(), state })
        })
    }

    /// A single char absent from `chars`.
    #[must_use]
    pub fn not_set(chars: &'static str) -> Self {
        Self::new(move |subject, pos, state| {
            let ch = subject[pos..].chars().next()?;
            (!chars.contains(ch)).then(|| MatchOk { pos: pos + ch.len_utf8(), captures: Vec::new(), state })
        })
    }

    /// Matches empty input; captures the current position.
    #[must_use]
    pub fn cpos() -> Self {
        Self::new(|_subject, pos, state| {
            Some(MatchOk { pos, captures: vec![Capture::Pos(pos as u32)], state })
        })
    }

    /// Wraps a user-defined matcher function directly.
    #[must_use]
    pub fn from_fn(f: impl Fn(&str, usize, S) -> Option<MatchOk<T, S>> + 'static) -> Self {
        Self::new(f)
    }

    /// Sequence: match in order, captures appended. Fails (discarding everything) if
    /// any element fails.
    #[must_use]
    pub fn and(parts: Vec<Self>) -> Self {
        Self::new(move |subject, pos, state| {
            let mut pos = pos;
            let mut state = state;
            let mut captures = Vec::new();
            for p in &parts {
                let ok = p.match_at(subject, pos, state)?;
                pos = ok.pos;
                state = ok.state;
                captures.extend(ok.captures);
            }
            Some(MatchOk { pos, captures, state })
        })
    }

    /// Ordered choice: first alternative to succeed wins, tried against the caller's
    /// starting `state` each time (no cross-alternative state leakage on failure).
    #[must_use]
    pub fn or(alts: Vec<Self>) -> Self {
        Self::new(move |subject, pos, state| {
            for alt in &alts {
                if let Some(ok) = alt.match_at(subject, pos, state.clone()) {
                    return Some(ok);
                }
            }
            None
        })
    }

    /// Matches empty; captures constant values.
    #[must_use]
    pub fn constants(values: Vec<Capture<T>>) -> Self
    where
        Capture<T>: Clone,
    {
        Self::new(move |_subject, pos, state| Some(MatchOk { pos, captures: values.clone(), state }))
    }

    /// Wraps `self`, replacing captures with the single matched substring.
    #[must_use]
    pub fn capture_text(self) -> Self {
        Self::new(move |subject, pos, state| {
            let ok = self.match_at(subject, pos, state)?;
            Some(MatchOk { pos: ok.pos, captures: vec![Capture::Text(subject[pos..ok.pos].into())], state: ok.state })
        })
    }

    /// Transforms captures with an arbitrary function.
    #[must_use]
    pub fn map_captures(self, f: impl Fn(Vec<Capture<T>>) -> Vec<Capture<T>> + 'static) -> Self {
        Self::new(move |subject, pos, state| {
            let ok = self.match_at(subject, pos, state)?;
            Some(MatchOk { pos: ok.pos, captures: f(ok.captures), state: ok.state })
        })
    }

    /// At least `n` repetitions; captures appended across every repetition.
    #[must_use]
    pub fn at_least(self, n: usize) -> Self {
        Self::new(move |subject, pos, state| {
            let mut pos = pos;
            let mut state = state;
            let mut captures = Vec::new();
            let mut count = 0;
            loop {
                match self.match_at(subject, pos, state.clone()) {
                    Some(ok) if ok.pos > pos || count == 0 => {
                        count += 1;
                        pos = ok.pos;
                        state = ok.state;
                        captures.extend(ok.captures);
                    }
                    _ => break,
                }
            }
            (count >= n).then_some(MatchOk { pos, captures, state })
        })
    }

    /// Positive lookahead: succeeds without advancing or capturing.
    #[must_use]
    pub fn at(self) -> Self {
        Self::new(move |subject, pos, state| {
            self.match_at(subject, pos, state.clone())?;
            Some(MatchOk { pos, captures: Vec::new(), state })
        })
    }

    /// Negative lookahead.
    #[must_use]
    pub fn not(self) -> Self {
        Self::new(move |subject, pos, state| {
            self.match_at(subject, pos, state.clone()).is_none().then_some(MatchOk {
                pos,
                captures: Vec::new(),
                state,
            })
        })
    }

    /// Matches one char iff `self` fails there, advancing by one char.
    #[must_use]
    pub fn non(self) -> Self {
        Self::new(move |subject, pos, state| {
            if self.match_at(subject, pos, state.clone()).is_some() {
                return None;
            }
            let ch = subject[pos..].chars().next()?;
            Some(MatchOk { pos: pos + ch.len_utf8(), captures: Vec::new(), state })
        })
    }

    /// Optional: matches empty on failure.
    #[must_use]
    pub fn or_not(self) -> Self {
        Self::new(move |subject, pos, state| {
            Some(self.match_at(subject, pos, state.clone()).unwrap_or(MatchOk { pos, captures: Vec::new(), state }))
        })
    }
}

/// A named grammar: rules are looked up by name at match time, which is what lets
/// alternatives reference each other recursively (`V("expr")` inside `expr`'s own
/// definition, for instance).
pub struct Grammar<T, S> {
    rules: hashbrown::HashMap<&'static str, Pattern<T, S>>,
}

impl<T: 'static, S: Clone + 'static> Grammar<T, S> {
    #[must_use]
    pub fn new() -> Self {
        Self { rules: hashbrown::HashMap::new() }
    }

    pub fn define(&mut self, name: &'static str, pattern: Pattern<T, S>) {
        self.rules.insert(name, pattern);
    }

    /// `V(name)`: delegates to the named rule, looked up at match time.
    #[must_use]
    pub fn reference(self: &Rc<Self>, name: &'static str) -> Pattern<T, S> {
        let grammar = Rc::clone(self);
        Pattern::from_fn(move |subject, pos, state| {
            let rule = grammar.rules.get(name).unwrap_or_else(|| panic!("undefined grammar rule: {name}"));
            rule.match_at(subject, pos, state)
        })
    }
}

impl<T: 'static, S: Clone + 'static> Default for Grammar<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Capture, Pattern};

    type P = Pattern<(), ()>;

    #[test]
    fn literal_matches_exact_bytes() {
        let p = P::literal("if");
        let ok = p.match_at("if x", 0, ()).unwrap();
        assert_eq!(ok.pos, 2);
    }

    #[test]
    fn literal_fails_on_mismatch() {
        assert!(P::literal("if").match_at("while", 0, ()).is_none());
    }

    #[test]
    fn ordered_choice_tries_in_order() {
        let p = P::or(vec![P::literal("a"), P::literal("ab")]);
        let ok = p.match_at("ab", 0, ()).unwrap();
        assert_eq!(ok.pos, 1, "first alternative wins even though a longer one would also match");
    }

    #[test]
    fn and_fails_without_partial_advance_leaking() {
        let p = P::and(vec![P::literal("a"), P::literal("b")]);
        assert!(p.match_at("ac", 0, ()).is_none());
    }

    #[test]
    fn at_least_requires_minimum_count() {
        let digit = P::ranges(&[('0', '9')]);
        assert!(digit.clone().at_least(1).match_at("", 0, ()).is_none());
        let ok = digit.at_least(1).match_at("123a", 0, ()).unwrap();
        assert_eq!(ok.pos, 3);
    }

    #[test]
    fn not_lookahead_does_not_advance() {
        let p = P::literal("x").not();
        let ok = p.match_at("y", 0, ()).unwrap();
        assert_eq!(ok.pos, 0);
    }

    #[test]
    fn capture_text_wraps_matched_substring() {
        let digit = P::ranges(&[('0', '9')]).at_least(1).capture_text();
        let ok = digit.match_at("42x", 0, ()).unwrap();
        assert!(matches!(&ok.captures[..], [Capture::Text(s)] if &**s == "42"));
    }
}
