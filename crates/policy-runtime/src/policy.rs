//! Policy module definition.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

/// A policy module as persisted in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyModule {
    /// Dot-separated package path, e.g. `authz.rbac`.
    pub package: String,

    /// Description of what this module does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The rules in this module.
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Module metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A named rule whose body is a conjunction of builtin calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub name: String,

    /// Value of the rule when its body is undefined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    #[serde(default)]
    pub body: Vec<Statement>,
}

/// One call in a rule body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Statement {
    /// Builtin name or infix operator.
    pub call: String,

    /// Operands. A trailing variable operand binds the builtin's output.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

const PACKAGE_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$";

const RULE_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

impl PolicyModule {
    /// Creates an empty module for `package`.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            description: None,
            rules: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a rule to the module.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parses a module from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let module: PolicyModule = serde_yaml::from_str(yaml)?;
        module.validate()?;
        Ok(module)
    }

    /// Parses a module from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let module: PolicyModule = serde_json::from_str(json)?;
        module.validate()?;
        Ok(module)
    }

    /// Serializes the module to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serializes the module to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates package and rule names.
    pub fn validate(&self) -> Result<()> {
        let package_pattern = Regex::new(PACKAGE_PATTERN)?;
        let rule_pattern = Regex::new(RULE_PATTERN)?;

        if !package_pattern.is_match(&self.package) {
            return Err(PolicyError::Validation(format!(
                "invalid package path '{}'",
                self.package
            )));
        }

        for rule in &self.rules {
            if !rule_pattern.is_match(&rule.name) {
                return Err(PolicyError::Validation(format!(
                    "invalid rule name '{}'",
                    rule.name
                )));
            }

            for statement in &rule.body {
                if statement.call.is_empty() {
                    return Err(PolicyError::Validation(format!(
                        "empty call in rule '{}'",
                        rule.name
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            body: Vec::new(),
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Appends a call to the body.
    pub fn with_call(mut self, call: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        self.body.push(Statement {
            call: call.into(),
            args,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_from_yaml() {
        let yaml = r#"
package: authz.rbac
description: Role checks
rules:
  - name: allow
    default: false
    body:
      - call: eq
        args: ["$input.role", "admin"]
"#;

        let module = PolicyModule::from_yaml(yaml).unwrap();
        assert_eq!(module.package, "authz.rbac");
        assert_eq!(module.rules.len(), 1);
        assert_eq!(module.rules[0].default, Some(json!(false)));
        assert_eq!(module.rules[0].body[0].args, vec![json!("$input.role"), json!("admin")]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "package: a\nrulez: []\n";
        assert!(PolicyModule::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(PolicyModule::new("bad package").validate().is_err());
        assert!(PolicyModule::new("a..b").validate().is_err());
        assert!(PolicyModule::new("ok")
            .with_rule(Rule::new("not-valid"))
            .validate()
            .is_err());
        assert!(PolicyModule::new("ok")
            .with_rule(Rule::new("allow").with_call("", vec![]))
            .validate()
            .is_err());
    }

    #[test]
    fn test_builder_round_trips_through_json() {
        let module = PolicyModule::new("authz")
            .with_description("test")
            .with_rule(Rule::new("allow").with_call("gt", vec![json!(2), json!(1)]));
        let json = module.to_json().unwrap();
        assert_eq!(PolicyModule::from_json(&json).unwrap(), module);
    }
}
