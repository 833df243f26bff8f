//! Compiled, immutable snapshots of the loaded module set.
//!
//! A [`Compiler`] is produced by compiling every module at once. It is
//! never mutated after construction; a policy change produces a new one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::ast::{Expr, Ref, Term};
use crate::builtins::BuiltinRegistry;
use crate::error::{CompileError, CompileErrors, PolicyError, Result};
use crate::parser::parse_module_bytes;
use crate::policy::{PolicyModule, Statement};
use crate::storage::{Store, Transaction};

/// A rule whose body has been resolved against the builtin registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub name: String,
    pub default: Option<serde_json::Value>,
    pub body: Vec<Expr>,
}

/// A compiled module.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModule {
    /// Storage identifier.
    pub id: String,

    /// `data.<package>` reference.
    pub package: Ref,

    pub rules: Vec<CompiledRule>,

    /// The parsed source.
    pub source: PolicyModule,

    /// SHA-256 of the module's canonical JSON encoding, hex encoded.
    pub digest: String,
}

/// The compiled set of all loaded modules at one point in time.
#[derive(Debug)]
pub struct Compiler {
    modules: BTreeMap<String, CompiledModule>,
    builtins: Arc<BuiltinRegistry>,
    revision: String,
    compiled_at: DateTime<Utc>,
}

impl Compiler {
    /// Compiles the complete module set.
    ///
    /// Diagnostics from every module are collected before failing, so one
    /// error reports all broken modules.
    pub fn compile(
        builtins: Arc<BuiltinRegistry>,
        modules: BTreeMap<String, PolicyModule>,
    ) -> Result<Self> {
        let mut errors = CompileErrors::default();
        let mut compiled = BTreeMap::new();

        for (id, module) in modules {
            match compile_module(&builtins, &id, module) {
                Ok(module) => {
                    compiled.insert(id, module);
                }
                Err(module_errors) => errors.0.extend(module_errors),
            }
        }

        if !errors.is_empty() {
            return Err(PolicyError::Compile(errors));
        }

        let revision = revision(&compiled);
        Ok(Self {
            modules: compiled,
            builtins,
            revision,
            compiled_at: Utc::now(),
        })
    }

    /// Compiled modules keyed by storage identifier.
    pub fn modules(&self) -> &BTreeMap<String, CompiledModule> {
        &self.modules
    }

    pub fn module(&self, id: &str) -> Option<&CompiledModule> {
        self.modules.get(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Rules defined under `package` across all modules.
    pub fn rules<'a>(&'a self, package: &'a str) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.modules
            .values()
            .filter(move |m| m.source.package == package)
            .flat_map(|m| m.rules.iter())
    }

    /// Digest over every module identifier and digest.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    /// The registry calls were resolved against.
    pub fn builtins(&self) -> &Arc<BuiltinRegistry> {
        &self.builtins
    }
}

/// Reads, parses and compiles every policy visible to `txn`.
///
/// Parse failures from all modules are reported together. Storage
/// failures abort immediately.
pub fn load_compiler_from_store(
    store: &dyn Store,
    txn: &Transaction,
    builtins: Arc<BuiltinRegistry>,
) -> Result<Compiler> {
    let mut modules = BTreeMap::new();
    let mut errors = CompileErrors::default();

    for id in store.list_policies(txn)? {
        let bytes = store.get_policy(txn, &id)?;
        match parse_module_bytes(&id, &bytes) {
            Ok(module) => {
                modules.insert(id, module);
            }
            Err(PolicyError::Compile(parse_errors)) => errors.0.extend(parse_errors.0),
            Err(other) => return Err(other),
        }
    }

    if !errors.is_empty() {
        return Err(PolicyError::Compile(errors));
    }
    Compiler::compile(builtins, modules)
}

fn package_ref(package: &str) -> Ref {
    let mut terms = vec![Term::var("data")];
    terms.extend(package.split('.').map(Term::string));
    Ref(terms)
}

fn compile_module(
    builtins: &BuiltinRegistry,
    id: &str,
    module: PolicyModule,
) -> std::result::Result<CompiledModule, Vec<CompileError>> {
    let mut errors = Vec::new();
    let mut rules = Vec::with_capacity(module.rules.len());

    for rule in &module.rules {
        let mut body = Vec::with_capacity(rule.body.len());
        for statement in &rule.body {
            match compile_statement(builtins, statement) {
                Ok(expr) => body.push(expr),
                Err(message) => errors.push(CompileError::new(id, message).in_rule(&rule.name)),
            }
        }
        rules.push(CompiledRule {
            name: rule.name.clone(),
            default: rule.default.clone(),
            body,
        });
    }

    let digest = match serde_json::to_vec(&module) {
        Ok(bytes) => hex::encode(Sha256::digest(&bytes)),
        Err(e) => {
            errors.push(CompileError::new(id, format!("cannot encode module: {}", e)));
            String::new()
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(CompiledModule {
        id: id.to_string(),
        package: package_ref(&module.package),
        rules,
        source: module,
        digest,
    })
}

fn compile_statement(
    builtins: &BuiltinRegistry,
    statement: &Statement,
) -> std::result::Result<Expr, String> {
    let builtin = builtins
        .get(&statement.call)
        .ok_or_else(|| format!("undefined function {}", statement.call))?;

    let operands: Vec<Term> = statement.args.iter().map(Term::from_json).collect();
    let arity = builtin.arity();
    if operands.len() != arity && operands.len() != arity + 1 {
        return Err(format!(
            "{}: arity mismatch: have {}, want {}",
            builtin.name,
            operands.len(),
            arity
        ));
    }

    for (i, operand) in operands.iter().enumerate() {
        if builtin.is_target_pos(i) {
            if !operand.is_var() {
                return Err(format!(
                    "{}: output operand must be a variable, got {}",
                    builtin.name, operand
                ));
            }
            continue;
        }
        let expected = &builtin.decl.args()[i];
        if let Some(actual) = operand.static_type() {
            if !expected.contains(&actual) {
                return Err(format!(
                    "{}: invalid argument {}: got {}, want {}",
                    builtin.name,
                    i + 1,
                    actual,
                    expected
                ));
            }
        }
    }

    Ok(builtin.expr(operands))
}

fn revision(modules: &BTreeMap<String, CompiledModule>) -> String {
    let mut hasher = Sha256::new();
    for (id, module) in modules {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
        hasher.update(module.digest.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Rule;
    use serde_json::json;

    fn builtins() -> Arc<BuiltinRegistry> {
        Arc::new(BuiltinRegistry::with_defaults())
    }

    fn single(id: &str, module: PolicyModule) -> BTreeMap<String, PolicyModule> {
        let mut modules = BTreeMap::new();
        modules.insert(id.to_string(), module);
        modules
    }

    fn messages(err: PolicyError) -> Vec<String> {
        err.compile_errors()
            .unwrap()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn test_compile_empty_set() {
        let compiler = Compiler::compile(builtins(), BTreeMap::new()).unwrap();
        assert!(compiler.is_empty());
        assert_eq!(compiler.revision().len(), 64);
    }

    #[test]
    fn test_compile_resolves_calls() {
        let module = PolicyModule::new("authz.rbac").with_rule(
            Rule::new("allow")
                .with_default(json!(false))
                .with_call("=", vec![json!("$input.role"), json!("admin")])
                .with_call("count", vec![json!([1, 2]), json!("$n")]),
        );
        let compiler = Compiler::compile(builtins(), single("rbac", module)).unwrap();

        let compiled = compiler.module("rbac").unwrap();
        assert_eq!(compiled.package.to_string(), "data.authz.rbac");
        let body = &compiled.rules[0].body;
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].operator().unwrap().dotted_name().as_deref(), Some("eq"));
        assert_eq!(body[1].operands().len(), 2);
        assert_eq!(compiler.rules("authz.rbac").count(), 1);
    }

    #[test]
    fn test_undefined_function() {
        let module = PolicyModule::new("p").with_rule(Rule::new("r").with_call("nope", vec![]));
        let err = Compiler::compile(builtins(), single("m", module)).unwrap_err();
        assert_eq!(messages(err), vec!["m: r: undefined function nope"]);
    }

    #[test]
    fn test_arity_mismatch() {
        let module = PolicyModule::new("p")
            .with_rule(Rule::new("r").with_call("plus", vec![json!(1)]));
        let err = Compiler::compile(builtins(), single("m", module)).unwrap_err();
        assert_eq!(messages(err), vec!["m: r: plus: arity mismatch: have 1, want 2"]);
    }

    #[test]
    fn test_output_operand_must_be_variable() {
        let module = PolicyModule::new("p")
            .with_rule(Rule::new("r").with_call("plus", vec![json!(1), json!(2), json!(3)]));
        let err = Compiler::compile(builtins(), single("m", module)).unwrap_err();
        assert_eq!(
            messages(err),
            vec!["m: r: plus: output operand must be a variable, got 3"]
        );
    }

    #[test]
    fn test_argument_type_mismatch() {
        let module = PolicyModule::new("p")
            .with_rule(Rule::new("r").with_call("count", vec![json!(5), json!("$n")]));
        let err = Compiler::compile(builtins(), single("m", module)).unwrap_err();
        assert_eq!(
            messages(err),
            vec!["m: r: count: invalid argument 1: got number, want any<array[any], set[any], object[any: any], string>"]
        );
    }

    #[test]
    fn test_errors_aggregate_across_modules() {
        let mut modules = BTreeMap::new();
        modules.insert(
            "a".to_string(),
            PolicyModule::new("a").with_rule(Rule::new("r").with_call("nope", vec![])),
        );
        modules.insert(
            "b".to_string(),
            PolicyModule::new("b").with_rule(Rule::new("r").with_call("lower", vec![json!(1)])),
        );
        let err = Compiler::compile(builtins(), modules).unwrap_err();
        assert_eq!(err.compile_errors().unwrap().len(), 2);
    }

    #[test]
    fn test_load_from_store() {
        use crate::storage::{InMemoryStore, TransactionParams};

        let mut policies = BTreeMap::new();
        policies.insert(
            "a.yaml".to_string(),
            b"package: a\nrules:\n  - name: r\n    body:\n      - call: lower\n        args: [\"A\", \"$x\"]\n".to_vec(),
        );
        policies.insert(
            "b.json".to_string(),
            br#"{"package": "b", "rules": [{"name": "r", "default": true}]}"#.to_vec(),
        );
        let store = InMemoryStore::with_policies(policies);
        let txn = store.new_transaction(TransactionParams::read()).unwrap();

        let compiler = load_compiler_from_store(&store, &txn, builtins()).unwrap();
        assert_eq!(compiler.len(), 2);
        assert_eq!(compiler.module("b.json").unwrap().rules[0].default, Some(json!(true)));
    }

    #[test]
    fn test_load_reports_every_parse_error() {
        use crate::storage::{InMemoryStore, TransactionParams};

        let mut policies = BTreeMap::new();
        policies.insert("a.yaml".to_string(), b"package: [".to_vec());
        policies.insert("b.json".to_string(), b"{".to_vec());
        policies.insert("c.yaml".to_string(), b"package: ok".to_vec());
        let store = InMemoryStore::with_policies(policies);
        let txn = store.new_transaction(TransactionParams::read()).unwrap();

        let err = load_compiler_from_store(&store, &txn, builtins()).unwrap_err();
        let modules: Vec<&str> = err
            .compile_errors()
            .unwrap()
            .iter()
            .map(|e| e.module.as_str())
            .collect();
        assert_eq!(modules, vec!["a.yaml", "b.json"]);
    }

    #[test]
    fn test_revision_tracks_content() {
        let a = PolicyModule::new("p").with_rule(Rule::new("r").with_call("lower", vec![json!("A")]));
        let b = PolicyModule::new("p").with_rule(Rule::new("r").with_call("upper", vec![json!("a")]));

        let first = Compiler::compile(builtins(), single("m", a.clone())).unwrap();
        let again = Compiler::compile(builtins(), single("m", a)).unwrap();
        let changed = Compiler::compile(builtins(), single("m", b)).unwrap();

        assert_eq!(first.revision(), again.revision());
        assert_ne!(first.revision(), changed.revision());
    }
}
