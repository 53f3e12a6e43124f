// File: src/config.rs
// Purpose: Server configuration parsing from liveform.toml

use anyhow::{Context, Result};
use liveform_rules::RuleSetSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Environment variable overriding the config file path.
pub const CONFIG_ENV: &str = "LIVEFORM_CONFIG";

pub const DEFAULT_CONFIG_FILE: &str = "liveform.toml";

/// Application configuration
///
/// ```toml
/// [server]
/// port = 3000
///
/// [validation]
/// allowed_namespaces = ["App\\Http\\Requests\\"]
///
/// [rule_sets."App\\Http\\Requests\\Register".rules]
/// email = "required|email"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Rule sets keyed by the identifier clients send as `_request`.
    #[serde(default)]
    pub rule_sets: BTreeMap<String, RuleSetSpec>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Validation endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Route the endpoint is mounted on.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// URL of the client script referenced by the directive.
    #[serde(default = "default_script_src")]
    pub script_src: String,

    /// Identifier prefixes a rule set must start with. Empty allows all.
    #[serde(default)]
    pub allowed_namespaces: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_endpoint() -> String {
    liveform::config::DEFAULT_ENDPOINT.to_string()
}

fn default_script_src() -> String {
    "/_liveform/liveform.js".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            script_src: default_script_src(),
            allowed_namespaces: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; a missing or empty file gives
    /// the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!(path = ?path, "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load from `$LIVEFORM_CONFIG`, else `./liveform.toml`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load(path)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(content)?)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.address(), "127.0.0.1:3000");
        assert_eq!(config.validation.endpoint, "/_liveform/validate");
        assert!(config.validation.allowed_namespaces.is_empty());
        assert!(config.rule_sets.is_empty());
    }

    #[test]
    fn test_empty_and_missing_files() {
        assert_eq!(Config::from_toml("  \n").unwrap().server.port, 3000);
        let config = Config::load("definitely/not/here/liveform.toml").unwrap();
        assert_eq!(config.validation.script_src, "/_liveform/liveform.js");
    }

    #[test]
    fn test_parse_rule_sets() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [validation]
            allowed_namespaces = ["App\\Http\\Requests\\"]

            [rule_sets."App\\Http\\Requests\\Register".rules]
            email = "required|email"
            password = "required|min:8"

            [rule_sets."App\\Http\\Requests\\Register".messages]
            "email.required" = "We need your email."
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.validation.allowed_namespaces, vec!["App\\Http\\Requests\\"]);

        let spec = &config.rule_sets["App\\Http\\Requests\\Register"];
        assert_eq!(spec.rules["email"], "required|email");
        assert_eq!(spec.messages["email.required"], "We need your email.");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("[server\nport = ").is_err());
    }
}
