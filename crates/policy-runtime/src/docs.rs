//! Builtin metadata export for documentation tooling.
//!
//! Groups documented builtins by family and renders a usage line for each,
//! e.g. `output := count(array_or_set_or_object_or_string)`.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::builtins::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::types::Type;

/// How a builtin is implemented for the WebAssembly target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WasmSupport {
    Native,
    #[serde(rename = "SDK")]
    Sdk,
}

/// Documentation record for a single builtin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltinInfo {
    pub name: String,
    pub usage: String,
    pub description: String,
    pub wasm_support: WasmSupport,
}

/// Documented builtins keyed by family.
pub type BuiltinDocs = BTreeMap<String, Vec<BuiltinInfo>>;

fn placeholder(count: &mut u8) -> String {
    let c = char::from(b'x'.wrapping_add(*count));
    *count += 1;
    c.to_string()
}

/// Renders the usage line for a builtin.
pub fn builtin_usage(builtin: &Builtin) -> String {
    let args = builtin.decl.args();
    let returns_boolean = matches!(builtin.decl.result(), Type::Boolean);
    let mut count = 0u8;

    if let Some(infix) = &builtin.infix {
        let operands: Vec<String> = args.iter().map(|_| placeholder(&mut count)).collect();
        let rhs = operands.join(&format!(" {} ", infix));
        return if returns_boolean {
            rhs
        } else {
            format!("{} := {}", placeholder(&mut count), rhs)
        };
    }

    let operands: Vec<String> = args
        .iter()
        .map(|arg| match arg {
            Type::Any(members) if !members.is_empty() => members
                .iter()
                .map(Type::type_name)
                .collect::<Vec<_>>()
                .join("_or_"),
            Type::Array(_) => "array".to_string(),
            Type::Set(_) => "set".to_string(),
            Type::Object(_) => "object".to_string(),
            _ => placeholder(&mut count),
        })
        .collect();

    let rhs = format!("{}({})", builtin.name, operands.join(", "));
    if returns_boolean {
        rhs
    } else {
        format!("output := {}", rhs)
    }
}

/// Collects documentation for every builtin with a family.
///
/// Comparison builtins and names listed in `native` are reported as
/// natively supported; everything else falls back to the SDK.
pub fn generate(registry: &BuiltinRegistry, native: &HashSet<String>) -> BuiltinDocs {
    let mut docs = BuiltinDocs::new();
    for builtin in registry.builtins() {
        if builtin.family.is_empty() {
            continue;
        }
        let wasm_support = if builtin.family == "comparisons" || native.contains(&builtin.name) {
            WasmSupport::Native
        } else {
            WasmSupport::Sdk
        };
        docs.entry(builtin.family.clone())
            .or_default()
            .push(BuiltinInfo {
                name: builtin.name.clone(),
                usage: builtin_usage(builtin),
                description: builtin.description.clone(),
                wasm_support,
            });
    }
    docs
}

/// Renders the documentation as indented JSON.
pub fn to_json(docs: &BuiltinDocs) -> Result<String> {
    Ok(serde_json::to_string_pretty(docs)?)
}
