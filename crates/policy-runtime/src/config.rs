//! Manager configuration payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

/// Parsed manager configuration.
///
/// Service entries are kept opaque here; each is decoded when its client
/// is built. Sections owned by plugins, such as `bundle`, are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub services: Vec<serde_json::Value>,

    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl ManagerConfig {
    /// Parses a YAML or JSON payload. Empty input is the empty config.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| PolicyError::config(format!("config is not valid UTF-8: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| PolicyError::config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(ManagerConfig::parse(b"").unwrap(), ManagerConfig::default());
        assert_eq!(ManagerConfig::parse(b"  \n").unwrap(), ManagerConfig::default());
    }

    #[test]
    fn test_parse_yaml() {
        let raw = br#"
services:
  - name: acmecorp
    url: https://example.com/control-plane-api/v1
labels:
  region: west
"#;
        let config = ManagerConfig::parse(raw).unwrap();
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0]["name"], "acmecorp");
        assert_eq!(config.labels["region"], "west");
    }

    #[test]
    fn test_parse_json() {
        let raw = br#"{"services": [], "labels": {"env": "test"}}"#;
        let config = ManagerConfig::parse(raw).unwrap();
        assert_eq!(config.labels["env"], "test");
    }

    #[test]
    fn test_parse_ignores_plugin_sections() {
        let raw = br#"
services:
  - name: acmecorp
    url: https://example.com
bundle:
  name: authz
  service: acmecorp
status:
  service: acmecorp
plugins:
  custom: {}
"#;
        let config = ManagerConfig::parse(raw).unwrap();
        assert_eq!(config.services.len(), 1);
        assert!(config.labels.is_empty());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            ManagerConfig::parse(b"services: 7"),
            Err(PolicyError::Config(_))
        ));
        assert!(matches!(
            ManagerConfig::parse(b"labels: [a, b]"),
            Err(PolicyError::Config(_))
        ));
        assert!(matches!(
            ManagerConfig::parse(&[0xff, 0xfe]),
            Err(PolicyError::Config(_))
        ));
    }
}
