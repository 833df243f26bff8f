//! Builtin function descriptors and the registry that resolves them.
//!
//! Every function callable from a policy is described by a [`Builtin`]:
//! a dot-segmented name, a type declaration, an optional infix symbol and
//! documentation metadata. The compiler resolves call operators through a
//! [`BuiltinRegistry`] by name or infix symbol.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::ast::{Expr, Ref, Term};
use crate::catalog;
use crate::types::Function;

/// A built-in function. Every builtin is uniquely identified by its name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Builtin {
    /// Unique name, e.g. `io.jwt.decode`.
    pub name: String,

    /// Type declaration.
    pub decl: Function,

    /// Documentation family, e.g. `strings`. Empty when undocumented.
    pub family: String,

    /// Documentation text.
    pub description: String,

    /// Unique infix operator, e.g. `==`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infix: Option<String>,

    /// Set when the builtin yields a set of output tuples.
    #[serde(skip_serializing_if = "is_false")]
    pub relation: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Builtin {
    /// Creates an undocumented builtin.
    pub fn new(name: impl Into<String>, decl: Function) -> Self {
        Self {
            name: name.into(),
            decl,
            family: String::new(),
            description: String::new(),
            infix: None,
            relation: false,
        }
    }

    /// Sets the infix operator.
    pub fn with_infix(mut self, infix: impl Into<String>) -> Self {
        self.infix = Some(infix.into());
        self
    }

    /// Sets the documentation family and description.
    pub fn documented(mut self, family: impl Into<String>, description: impl Into<String>) -> Self {
        self.family = family.into();
        self.description = description.into();
        self
    }

    /// Marks the builtin as a relation.
    pub fn relation(mut self) -> Self {
        self.relation = true;
        self
    }

    /// Number of input arguments.
    pub fn arity(&self) -> usize {
        self.decl.arity()
    }

    /// Reference naming this builtin: the first name segment as a
    /// variable, the rest as string keys.
    pub fn to_ref(&self) -> Ref {
        let mut parts = self.name.split('.');
        let mut terms = Vec::with_capacity(self.name.matches('.').count() + 1);
        if let Some(head) = parts.next() {
            terms.push(Term::var(head));
        }
        terms.extend(parts.map(Term::string));
        Ref(terms)
    }

    /// A call term for this builtin with the given operands.
    pub fn call(&self, operands: Vec<Term>) -> Term {
        let mut terms = Vec::with_capacity(operands.len() + 1);
        terms.push(Term::Ref(self.to_ref()));
        terms.extend(operands);
        Term::Call(terms)
    }

    /// A statement-level expression for this builtin with the given operands.
    pub fn expr(&self, operands: Vec<Term>) -> Expr {
        let mut terms = Vec::with_capacity(operands.len() + 1);
        terms.push(Term::Ref(self.to_ref()));
        terms.extend(operands);
        Expr { terms }
    }

    /// Returns true if a variable at operand position `i` is bound by
    /// evaluating the call, i.e. `i` is the output position.
    pub fn is_target_pos(&self, i: usize) -> bool {
        self.arity() == i
    }
}

/// Catalog of builtins indexed by name and infix symbol.
///
/// Registration needs `&mut self`; share the registry behind an `Arc` once
/// populated.
#[derive(Debug, Default)]
pub struct BuiltinRegistry {
    builtins: Vec<Arc<Builtin>>,
    index: HashMap<String, Arc<Builtin>>,
    ignore_during_partial_eval: HashSet<String>,
}

impl BuiltinRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the default catalog.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for builtin in catalog::default_builtins() {
            registry.register(builtin);
        }
        for name in catalog::IGNORE_DURING_PARTIAL_EVAL {
            registry.mark_ignored_during_partial_eval(*name);
        }
        registry
    }

    /// Adds a builtin, indexing it by name and, if set, by infix symbol.
    ///
    /// An existing entry under the same key is replaced.
    pub fn register(&mut self, builtin: Builtin) -> Arc<Builtin> {
        let builtin = Arc::new(builtin);
        self.builtins.push(Arc::clone(&builtin));
        self.index_key(builtin.name.clone(), &builtin);
        if let Some(infix) = &builtin.infix {
            self.index_key(infix.clone(), &builtin);
        }
        builtin
    }

    fn index_key(&mut self, key: String, builtin: &Arc<Builtin>) {
        if let Some(previous) = self.index.insert(key.clone(), Arc::clone(builtin)) {
            warn!(
                key = %key,
                previous = %previous.name,
                replacement = %builtin.name,
                "builtin key registered twice; replacing previous entry"
            );
        }
    }

    /// Looks up a builtin by name or infix symbol.
    pub fn get(&self, key: &str) -> Option<&Arc<Builtin>> {
        self.index.get(key)
    }

    /// Looks up the builtin a call head refers to.
    pub fn resolve_ref(&self, r: &Ref) -> Option<&Arc<Builtin>> {
        self.get(&r.dotted_name()?)
    }

    /// All registered builtins, in registration order.
    pub fn builtins(&self) -> &[Arc<Builtin>] {
        &self.builtins
    }

    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }

    /// Marks a builtin as unsafe to precompute during partial evaluation.
    pub fn mark_ignored_during_partial_eval(&mut self, name: impl Into<String>) {
        self.ignore_during_partial_eval.insert(name.into());
    }

    /// Returns true if results of `name` must not be cached or
    /// precomputed across evaluations.
    pub fn is_ignored_during_partial_eval(&self, name: &str) -> bool {
        self.ignore_during_partial_eval.contains(name)
    }

    /// Registered builtins that partial evaluation must leave alone.
    pub fn ignored_during_partial_eval(&self) -> impl Iterator<Item = &Arc<Builtin>> {
        self.ignore_during_partial_eval
            .iter()
            .filter_map(|name| self.index.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn two_arg(name: &str) -> Builtin {
        Builtin::new(name, Function::new(vec![Type::Number, Type::Number], Type::Number))
    }

    #[test]
    fn test_lookup_by_name_and_infix_is_identical() {
        let registry = BuiltinRegistry::with_defaults();
        for builtin in registry.builtins() {
            let by_name = registry.get(&builtin.name).unwrap();
            assert!(Arc::ptr_eq(by_name, builtin), "name lookup for {}", builtin.name);
            if let Some(infix) = &builtin.infix {
                let by_infix = registry.get(infix).unwrap();
                assert!(Arc::ptr_eq(by_infix, builtin), "infix lookup for {}", infix);
            }
        }
    }

    #[test]
    fn test_unknown_name_is_absent() {
        let registry = BuiltinRegistry::with_defaults();
        assert!(registry.get("no.such.builtin").is_none());
        assert!(registry.get("<=>").is_none());
    }

    #[test]
    fn test_is_target_pos() {
        let plus = two_arg("plus");
        assert!(!plus.is_target_pos(0));
        assert!(!plus.is_target_pos(1));
        assert!(plus.is_target_pos(2));
        assert!(!plus.is_target_pos(3));

        let now = Builtin::new("time.now_ns", Function::new(vec![], Type::Number));
        assert!(now.is_target_pos(0));
        assert!(!now.is_target_pos(1));
    }

    #[test]
    fn test_ref_decomposition() {
        let builtin = Builtin::new(
            "io.jwt.decode",
            Function::new(vec![Type::String], Type::any()),
        );
        assert_eq!(
            builtin.to_ref(),
            Ref(vec![Term::var("io"), Term::string("jwt"), Term::string("decode")])
        );
        assert_eq!(
            Builtin::new("count", Function::new(vec![Type::any()], Type::Number)).to_ref(),
            Ref(vec![Term::var("count")])
        );
    }

    #[test]
    fn test_call_round_trip() {
        let registry = BuiltinRegistry::with_defaults();
        let concat = registry.get("array.concat").unwrap();
        let call = concat.call(vec![Term::var("a"), Term::var("b"), Term::var("c")]);

        let Term::Call(terms) = call else {
            panic!("expected call term");
        };
        assert_eq!(terms.len() - 1, 3);
        let Term::Ref(head) = &terms[0] else {
            panic!("expected ref head");
        };
        assert_eq!(head, &concat.to_ref());
        assert!(Arc::ptr_eq(registry.resolve_ref(head).unwrap(), concat));
    }

    #[test]
    fn test_expr_shape() {
        let registry = BuiltinRegistry::with_defaults();
        let eq = registry.get("=").unwrap();
        let expr = eq.expr(vec![Term::var("x"), Term::string("a")]);
        assert_eq!(expr.operator(), Some(&eq.to_ref()));
        assert_eq!(expr.operands().len(), 2);
        assert_eq!(expr.to_string(), r#"eq(x, "a")"#);
    }

    #[test]
    fn test_reregistration_overwrites_index() {
        let mut registry = BuiltinRegistry::new();
        let first = registry.register(two_arg("custom.op").with_infix("<>"));
        let second = registry.register(two_arg("custom.op"));
        assert!(Arc::ptr_eq(registry.get("custom.op").unwrap(), &second));
        assert!(Arc::ptr_eq(registry.get("<>").unwrap(), &first));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_partial_eval_exclusions() {
        let registry = BuiltinRegistry::with_defaults();
        assert!(registry.is_ignored_during_partial_eval("time.now_ns"));
        assert!(registry.is_ignored_during_partial_eval("http.send"));
        assert!(registry.is_ignored_during_partial_eval("uuid.rfc4122"));
        assert!(!registry.is_ignored_during_partial_eval("plus"));

        let mut names: Vec<&str> = registry
            .ignored_during_partial_eval()
            .map(|b| b.name.as_str())
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["http.send", "time.now_ns", "uuid.rfc4122"]);
    }

    #[test]
    fn test_builtin_json_record() {
        let gt = BuiltinRegistry::with_defaults().get(">").cloned().unwrap();
        assert_eq!(
            serde_json::to_string(&*gt).unwrap(),
            r#"{"name":"gt","decl":{"args":[{"type":"any"},{"type":"any"}],"result":{"type":"boolean"},"type":"function"},"family":"comparisons","description":"``x`` is greater than ``y``","infix":">"}"#
        );

        let walk = BuiltinRegistry::with_defaults().get("walk").cloned().unwrap();
        let json = serde_json::to_value(&*walk).unwrap();
        assert_eq!(json["relation"], serde_json::json!(true));
        assert!(json.get("infix").is_none());
    }
}
