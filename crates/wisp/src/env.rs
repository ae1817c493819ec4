//! Compile-time lexical environment used by the desugarer to resolve names to
//! `(ups, pos)` argument addresses.
//!
//! This is distinct from the evaluator's runtime frames ([`crate::eval::Frame`]): `Env`
//! exists only while lowering the AST, tracking which names are in scope at each nested
//! `Fun` boundary so [`crate::desugar`] can turn a `Name` node into an [`crate::il::Il::Arg`].

use std::rc::Rc;

/// One level of lexical scope: the ordered list of names bound by the enclosing `Fun`.
struct Scope {
    names: Vec<Rc<str>>,
}

/// A chain of scopes, innermost first, shared via `Rc` so that sibling closures
/// compiled from the same enclosing scope don't need to clone the whole chain.
#[derive(Clone)]
pub struct Env {
    scopes: Rc<ScopeLink>,
}

enum ScopeLink {
    Empty,
    Cons(Scope, Rc<ScopeLink>),
}

impl Env {
    #[must_use]
    pub fn root() -> Self {
        Self { scopes: Rc::new(ScopeLink::Empty) }
    }

    /// Starts a new environment whose outermost frame binds `names` (used for the
    /// manifest/global frame every module is compiled against).
    #[must_use]
    pub fn new(names: Vec<Rc<str>>) -> Self {
        Self::root().extend(names)
    }

    /// Pushes a new innermost scope binding `names`, as when descending into a `Fun`
    /// body or a desugared `loop` continuation closure.
    #[must_use]
    pub fn extend(&self, names: Vec<Rc<str>>) -> Self {
        Self { scopes: Rc::new(ScopeLink::Cons(Scope { names }, Rc::clone(&self.scopes))) }
    }

    /// Resolves `name` to `(ups, pos)`: `ups` frames out from the innermost scope,
    /// `pos` the index within that frame. Returns `None` if unbound anywhere in scope.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<(u32, u32)> {
        let mut ups = 0u32;
        let mut link = &*self.scopes;
        loop {
            match link {
                ScopeLink::Empty => return None,
                ScopeLink::Cons(scope, rest) => {
                    if let Some(pos) = scope.names.iter().position(|n| &**n == name) {
                        return Some((ups, pos as u32));
                    }
                    ups += 1;
                    link = rest;
                }
            }
        }
    }

    /// True if `name` is bound in the innermost scope only (used to diagnose shadowing
    /// within a single `Fun`'s own parameter list or block-local `:=` targets).
    #[must_use]
    pub fn bound_locally(&self, name: &str) -> bool {
        matches!(&*self.scopes, ScopeLink::Cons(scope, _) if scope.names.iter().any(|n| &**n == name))
    }
}

#[cfg(test)]
mod tests {
    use super::Env;

    #[test]
    fn finds_innermost_binding_first() {
        let env = Env::new(vec!["x".into()]).extend(vec!["x".into(), "y".into()]);
        assert_eq!(env.find("x"), Some((0, 0)));
        assert_eq!(env.find("y"), Some((0, 1)));
    }

    #[test]
    fn finds_outer_binding_with_ups() {
        let env = Env::new(vec!["x".into()]).extend(vec!["y".into()]);
        assert_eq!(env.find("x"), Some((1, 0)));
    }

    #[test]
    fn unbound_name_is_none() {
        let env = Env::new(vec!["x".into()]);
        assert_eq!(env.find("z"), None);
    }
}
