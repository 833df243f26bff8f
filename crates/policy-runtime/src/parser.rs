//! Policy module parser.

use crate::error::{PolicyError, Result};
use crate::policy::PolicyModule;

/// Supported module source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Yaml,
    Json,
}

impl PolicyFormat {
    /// Detects format from the module identifier's extension.
    pub fn from_extension(path: &str) -> Option<Self> {
        if path.ends_with(".yaml") || path.ends_with(".yml") {
            Some(PolicyFormat::Yaml)
        } else if path.ends_with(".json") {
            Some(PolicyFormat::Json)
        } else {
            None
        }
    }

    /// Detects format from content.
    pub fn detect(content: &str) -> Self {
        let trimmed = content.trim();
        if trimmed.starts_with('{') {
            PolicyFormat::Json
        } else {
            PolicyFormat::Yaml
        }
    }
}

/// Parses the module stored under `id`.
///
/// Any failure is reported as a compile error attributed to `id`.
pub fn parse_module(id: &str, source: &str) -> Result<PolicyModule> {
    let format = PolicyFormat::from_extension(id).unwrap_or_else(|| PolicyFormat::detect(source));
    parse_module_with_format(source, format).map_err(|err| match err {
        PolicyError::Compile(_) => err,
        other => PolicyError::compile(id, other.to_string()),
    })
}

/// Parses raw module bytes as read from storage.
pub fn parse_module_bytes(id: &str, bytes: &[u8]) -> Result<PolicyModule> {
    let source = std::str::from_utf8(bytes)
        .map_err(|e| PolicyError::compile(id, format!("module is not valid UTF-8: {}", e)))?;
    parse_module(id, source)
}

/// Parses a module with the specified format.
pub fn parse_module_with_format(content: &str, format: PolicyFormat) -> Result<PolicyModule> {
    match format {
        PolicyFormat::Yaml => PolicyModule::from_yaml(content),
        PolicyFormat::Json => PolicyModule::from_json(content),
    }
}
