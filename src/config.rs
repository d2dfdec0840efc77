// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Platform configuration
//!
//! Read-only settings shared by stage loading and checks, loaded from a
//! YAML file and optionally overridden from the command line.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::StagehandError;
use crate::stages::Stage;

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "stagehand.yaml";

/// Platform-wide settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// DNS domain applications are published under
    #[serde(default)]
    pub dns_domain: String,

    /// Skip TLS certificate verification for HTTP checks
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// External state tracking
    #[serde(default)]
    pub state: StateConfig,

    /// Stage roots, lowest priority first
    #[serde(default)]
    pub stage_roots: Vec<PathBuf>,

    /// Base stage definitions and operational overrides
    #[serde(default)]
    pub stages: Vec<Stage>,

    /// Extra dependency edges keyed by stage id
    #[serde(default)]
    pub dependencies: HashMap<String, Vec<String>>,
}

/// Where external state lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_state_namespace")]
    pub namespace: String,

    #[serde(default = "default_state_name")]
    pub name: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_state_namespace(),
            name: default_state_name(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_state_namespace() -> String {
    "kube-system".to_string()
}

fn default_state_name() -> String {
    "stagehand-state".to_string()
}

impl PlatformConfig {
    /// Load config from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, StagehandError> {
        if !path.exists() {
            return Err(StagehandError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| StagehandError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let mut config = Self::from_yaml(&content)?;

        // Relative roots are relative to the config file
        if let Some(base) = path.parent() {
            for root in &mut config.stage_roots {
                if root.is_relative() {
                    *root = base.join(&*root);
                }
            }
        }

        Ok(config)
    }

    /// Parse config from YAML; an empty document yields defaults
    pub fn from_yaml(yaml: &str) -> Result<Self, StagehandError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, dns_domain: Option<String>, roots: Vec<PathBuf>) -> Self {
        if let Some(domain) = dns_domain {
            self.dns_domain = domain;
        }
        self.stage_roots.extend(roots);
        self
    }

    /// Check settings that would make checks fail for the wrong reason
    pub fn validate(&self) -> Result<(), StagehandError> {
        if !self.dns_domain.is_empty() {
            let re = Regex::new(r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?\.)*[a-z0-9]([-a-z0-9]*[a-z0-9])?$")
                .map_err(|e| StagehandError::invalid_config(e.to_string(), None))?;
            if !re.is_match(&self.dns_domain) {
                return Err(StagehandError::invalid_config(
                    format!("'{}' is not a valid DNS domain", self.dns_domain),
                    Some("Use a lowercase domain such as 'example.com'"),
                ));
            }
        }

        if self.state.enabled && (self.state.namespace.is_empty() || self.state.name.is_empty()) {
            return Err(StagehandError::invalid_config(
                "state tracking is enabled but its namespace or name is empty",
                Some("Set state.namespace and state.name, or state.enabled: false"),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
dns_domain: platform.example.com
skip_tls_verify: true
state:
  enabled: true
  namespace: infra
  name: install-state
stage_roots:
  - stages
stages:
  - id: dns
    manual: true
dependencies:
  ingress: [dns]
"#;

        let config = PlatformConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.dns_domain, "platform.example.com");
        assert!(config.skip_tls_verify);
        assert_eq!(config.state.namespace, "infra");
        assert!(config.stages[0].manual);
        assert_eq!(config.dependencies["ingress"], vec!["dns"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PlatformConfig::from_yaml("").unwrap();
        assert!(config.state.enabled);
        assert_eq!(config.state.name, "stagehand-state");
        assert!(config.stage_roots.is_empty());
    }

    #[test]
    fn test_invalid_domain() {
        let config = PlatformConfig {
            dns_domain: "Not A Domain".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StagehandError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = PlatformConfig::default()
            .with_overrides(Some("example.org".into()), vec![PathBuf::from("/extra")]);
        assert_eq!(config.dns_domain, "example.org");
        assert_eq!(config.stage_roots, vec![PathBuf::from("/extra")]);
    }

    #[test]
    fn test_relative_roots_follow_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "stage_roots: [stages]\n").unwrap();

        let config = PlatformConfig::from_file(&path).unwrap();
        assert_eq!(config.stage_roots, vec![dir.path().join("stages")]);
    }

    #[test]
    fn test_missing_file() {
        let err = PlatformConfig::from_file(Path::new("/no/such/stagehand.yaml")).unwrap_err();
        assert!(matches!(err, StagehandError::ConfigNotFound { .. }));
    }
}
