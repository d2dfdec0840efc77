// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Stage definition structures
//!
//! Defines the schema for per-stage `stage.yaml` descriptors and for the
//! check groups a stage declares.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::errors::StagehandError;

/// File name of the optional descriptor inside a stage directory
pub const DESCRIPTOR_FILE: &str = "stage.yaml";

/// A single pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage id (unique across all roots)
    pub id: String,

    /// Human description
    #[serde(default)]
    pub description: Option<String>,

    /// Directory holding the stage's infrastructure code
    #[serde(default)]
    pub path: PathBuf,

    /// Ids of stages that must be ordered before this one
    #[serde(default)]
    pub dependencies: BTreeSet<String>,

    /// Excluded from automatic pipelines
    #[serde(default)]
    pub manual: bool,

    /// Skipped by the pipeline driver
    #[serde(default)]
    pub disabled: bool,

    /// Position in the pipeline; raised during dependency resolution
    #[serde(default)]
    pub order: i64,

    /// Named check groups
    #[serde(default)]
    pub checks: BTreeMap<String, CheckGroup>,
}

impl Stage {
    /// Create a stage with only an id and an order
    pub fn new(id: impl Into<String>, order: i64) -> Self {
        Self {
            id: id.into(),
            description: None,
            path: PathBuf::new(),
            dependencies: BTreeSet::new(),
            manual: false,
            disabled: false,
            order,
            checks: BTreeMap::new(),
        }
    }

    /// Add a dependency
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    /// Mark as manual
    pub fn manual(mut self) -> Self {
        self.manual = true;
        self
    }

    /// Overlay a descriptor file onto this stage
    ///
    /// Relative paths in the descriptor are resolved against `dir`.
    pub fn apply_descriptor_file(&mut self, dir: &Path) -> Result<bool, StagehandError> {
        let file = dir.join(DESCRIPTOR_FILE);
        if !file.is_file() {
            return Ok(false);
        }

        let content =
            std::fs::read_to_string(&file).map_err(|e| StagehandError::FileReadError {
                path: file.clone(),
                error: e.to_string(),
            })?;

        let descriptor = StageDescriptor::from_yaml(&content).map_err(|e| {
            StagehandError::InvalidDescriptor {
                path: file.clone(),
                error: e.to_string(),
            }
        })?;

        descriptor.apply(self, dir);
        Ok(true)
    }
}

/// Contents of a `stage.yaml` file
///
/// Every field is optional; present fields replace the directory defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub dependencies: Option<BTreeSet<String>>,
    #[serde(default)]
    pub manual: Option<bool>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub checks: Option<BTreeMap<String, CheckGroup>>,
}

impl StageDescriptor {
    /// Parse a descriptor from YAML
    ///
    /// An empty document is a valid descriptor that overrides nothing.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Apply present fields onto `stage`
    pub fn apply(self, stage: &mut Stage, dir: &Path) {
        if let Some(id) = self.id {
            stage.id = id;
        }
        if let Some(description) = self.description {
            stage.description = Some(description);
        }
        if let Some(path) = self.path {
            stage.path = if path.is_absolute() { path } else { dir.join(path) };
        }
        if let Some(dependencies) = self.dependencies {
            stage.dependencies = dependencies;
        }
        if let Some(manual) = self.manual {
            stage.manual = manual;
        }
        if let Some(disabled) = self.disabled {
            stage.disabled = disabled;
        }
        if let Some(order) = self.order {
            stage.order = order;
        }
        if let Some(checks) = self.checks {
            stage.checks = checks;
        }
    }
}

/// A named bundle of checks belonging to a stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckGroup {
    /// Groups with a lower order run first
    #[serde(default)]
    pub order: i64,

    /// Events this group runs before
    #[serde(default)]
    pub before: Vec<String>,

    /// Events this group runs after
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub http: Vec<HttpCheckSpec>,

    #[serde(default)]
    pub kubernetes: Vec<KubernetesCheckSpec>,

    #[serde(default)]
    pub daemonset: Vec<DaemonSetCheckSpec>,

    #[serde(default)]
    pub state: Vec<StateCheckSpec>,
}

impl CheckGroup {
    /// Total number of declared checks
    pub fn len(&self) -> usize {
        self.http.len() + self.kubernetes.len() + self.daemonset.len() + self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Retry override for a single check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySpec {
    /// Attempt limit; 0 means unlimited
    #[serde(default)]
    pub limit: Option<u32>,

    /// Seconds to wait between attempts
    #[serde(default)]
    pub wait: Option<u64>,
}

/// HTTP check declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpCheckSpec {
    #[serde(default)]
    pub id: Option<String>,

    /// Explicit URL; wins over `app`
    #[serde(default)]
    pub url: Option<String>,

    /// Application name, expanded with the platform DNS domain
    #[serde(default)]
    pub app: Option<String>,

    /// Path appended to an app-derived URL
    #[serde(default)]
    pub path: Option<String>,

    /// Accepted status codes (200 when empty)
    #[serde(default)]
    pub status: Vec<u16>,

    #[serde(default)]
    pub content: Option<ContentMatch>,

    #[serde(default)]
    pub retry: Option<RetrySpec>,
}

/// Body validation for an HTTP check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMatch {
    /// Body must equal this literal
    Exact(String),
    /// Body must be a JSON object whose `key` holds `value`
    Json { key: String, value: String },
}

/// Kubernetes object condition check declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubernetesCheckSpec {
    #[serde(default)]
    pub id: Option<String>,

    /// Kind name or short name (e.g. `deploy`, `certificates.cert-manager.io`)
    pub kind: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    /// Condition to wait for
    #[serde(default = "default_condition")]
    pub state: String,

    /// Block until the condition is met
    #[serde(default)]
    pub wait: bool,

    /// Trigger a rolling restart before waiting
    #[serde(default)]
    pub restart: bool,

    /// Wait timeout in seconds (600 when unset or non-positive)
    #[serde(default)]
    pub timeout: Option<i64>,

    #[serde(default)]
    pub retry: Option<RetrySpec>,
}

fn default_condition() -> String {
    "Ready".to_string()
}

/// DaemonSet readiness check declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonSetCheckSpec {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    pub namespace: String,

    #[serde(default)]
    pub retry: Option<RetrySpec>,
}

/// External key/value state check declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCheckSpec {
    #[serde(default)]
    pub id: Option<String>,

    pub key: String,

    /// Expected value, compared case-insensitively
    pub value: String,

    #[serde(default)]
    pub retry: Option<RetrySpec>,
}
