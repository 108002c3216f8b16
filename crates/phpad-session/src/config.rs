//! Playground configuration loading.

#![allow(missing_docs)]

use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::SessionError;

/// Host-tunable settings with working defaults. The browser shell ships this
/// as a small TOML blob next to the page; tests construct it directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Prefix joined onto build and archive paths ("" means same-origin
    /// relative, as deployed).
    pub builds_root: String,
    /// Base URL of the remote snippet REST API.
    pub api_base: String,
    /// Description attached to newly created snippets.
    pub snippet_description: String,
    /// Whether created snippets are publicly listed.
    pub public_snippets: bool,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            builds_root: String::new(),
            api_base: "https://api.github.com".to_string(),
            snippet_description: "phpad playground".to_string(),
            public_snippets: true,
        }
    }
}

impl PlaygroundConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        toml::from_str(text)
            .map_err(|err| SessionError::InvalidConfig(SmolStr::new(err.to_string())))
    }

    /// Join a relative artifact path onto the configured builds root.
    #[must_use]
    pub fn artifact_url(&self, path: &str) -> String {
        if self.builds_root.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.builds_root.trim_end_matches('/'), path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_partial_toml() {
        let config =
            PlaygroundConfig::from_toml_str("builds_root = \"https://cdn.example/builds\"")
                .expect("parse config");
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(
            config.artifact_url("builds/php-84/ast-1.1.3/php.wasm"),
            "https://cdn.example/builds/builds/php-84/ast-1.1.3/php.wasm"
        );
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(PlaygroundConfig::from_toml_str("builds_root = [").is_err());
    }
}
