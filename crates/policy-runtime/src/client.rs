//! Service client registry entries.
//!
//! Clients only hold validated endpoint configuration. Transport and
//! authentication belong to whatever consumes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PolicyError, Result};

/// Configuration fragment for one remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,

    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub allow_insecure_tls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_header_timeout_seconds: Option<u64>,

    /// Keys interpreted by plugins, such as credentials.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A configured service endpoint.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    config: ServiceConfig,
    url: Url,
}

impl ServiceClient {
    /// Builds a client from an opaque config fragment.
    pub fn new(raw: &serde_json::Value) -> Result<Self> {
        let config: ServiceConfig = serde_json::from_value(raw.clone())
            .map_err(|e| PolicyError::config(format!("invalid service: {}", e)))?;

        if config.name.trim().is_empty() {
            return Err(PolicyError::config("service name must not be empty"));
        }

        let url = Url::parse(&config.url).map_err(|e| {
            PolicyError::config(format!("service {}: invalid url '{}': {}", config.name, config.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PolicyError::config(format!(
                "service {}: unsupported scheme '{}'",
                config.name,
                url.scheme()
            )));
        }

        Ok(Self { config, url })
    }

    /// The service name the client is registered under.
    pub fn service(&self) -> &str {
        &self.config.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.config.headers
    }

    /// Resolves `path` relative to the service URL.
    ///
    /// The path is always appended below the base URL, even when the base
    /// has no trailing slash.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| PolicyError::config(format!("service {}: invalid path '{}': {}", self.service(), path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_client() {
        let client = ServiceClient::new(&json!({
            "name": "acmecorp",
            "url": "https://example.com/control-plane-api/v1",
            "headers": {"x-tenant": "a"},
            "credentials": {"bearer": {"token": "secret"}}
        }))
        .unwrap();

        assert_eq!(client.service(), "acmecorp");
        assert_eq!(client.url().host_str(), Some("example.com"));
        assert_eq!(client.headers()["x-tenant"], "a");
        assert!(!client.config().allow_insecure_tls);
        assert!(client.config().extra.contains_key("credentials"));
    }

    #[test]
    fn test_endpoint() {
        let client = ServiceClient::new(&json!({
            "name": "bundles",
            "url": "http://localhost:8181/v1"
        }))
        .unwrap();

        assert_eq!(
            client.endpoint("/bundles/authz").unwrap().as_str(),
            "http://localhost:8181/v1/bundles/authz"
        );
        assert_eq!(
            client.endpoint("status").unwrap().as_str(),
            "http://localhost:8181/v1/status"
        );
    }

    #[test]
    fn test_invalid_clients() {
        for raw in [
            json!({"url": "https://example.com"}),
            json!({"name": "", "url": "https://example.com"}),
            json!({"name": "a", "url": "not a url"}),
            json!({"name": "a", "url": "ftp://example.com"}),
            json!("just a string"),
        ] {
            assert!(
                matches!(ServiceClient::new(&raw), Err(PolicyError::Config(_))),
                "accepted {}",
                raw
            );
        }
    }
}
