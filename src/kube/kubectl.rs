// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! kubectl-backed provider
//!
//! Talks to the cluster by shelling out to `kubectl`, using whatever
//! kubeconfig and context the operator has active.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use super::{DaemonSetStatus, GroupVersionResource, KubeError, KubernetesProvider};
use crate::errors::StagehandError;
use crate::utils::OnceMap;

const PREFLIGHT: &str = "cluster";

/// Provider that runs `kubectl`
pub struct KubectlProvider {
    /// Path to kubectl binary
    kubectl: PathBuf,
    /// Optional kubeconfig context
    context: Option<String>,
    preflight: OnceMap<&'static str, KubeError>,
}

impl KubectlProvider {
    /// Locate kubectl on PATH
    pub fn new() -> Result<Self, StagehandError> {
        let kubectl = which::which("kubectl").map_err(|_| StagehandError::KubectlNotFound)?;
        Ok(Self::with_binary(kubectl))
    }

    /// Use an explicit kubectl binary
    pub fn with_binary(kubectl: impl Into<PathBuf>) -> Self {
        Self {
            kubectl: kubectl.into(),
            context: None,
            preflight: OnceMap::new(),
        }
    }

    /// Pin a kubeconfig context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Run kubectl once the cluster has answered a reachability check
    ///
    /// A successful check is kept for the life of the provider. A failed one
    /// is reported to its callers and tried again on the next call.
    async fn kubectl(&self, args: &[&str]) -> Result<String, KubeError> {
        let preflight = self
            .preflight
            .run_once(PREFLIGHT, || async {
                self.exec(&["version", "--output=json"]).await.map(|_| ())
            })
            .await;
        if let Err(e) = preflight {
            self.preflight.forget_failure(&PREFLIGHT);
            return Err(e);
        }

        self.exec(args).await
    }

    async fn exec(&self, args: &[&str]) -> Result<String, KubeError> {
        let mut cmd = Command::new(&self.kubectl);
        if let Some(ref context) = self.context {
            cmd.arg("--context").arg(context);
        }
        cmd.args(args);
        cmd.kill_on_drop(true);

        let rendered = format!("kubectl {}", args.join(" "));
        tracing::debug!(command = %rendered, "running kubectl");

        let output = cmd.output().await.map_err(|e| KubeError::CommandFailed {
            command: rendered.clone(),
            stderr: e.to_string(),
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(KubeError::CommandFailed {
                command: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn get_json(&self, resource: &str, namespace: &str, name: &str) -> Result<Value, KubeError> {
        let out = self
            .kubectl(&["get", resource, name, "-n", namespace, "-o", "json"])
            .await
            .map_err(|e| not_found_or(e, resource, namespace, name))?;

        serde_json::from_str(&out).map_err(|e| KubeError::Parse {
            message: e.to_string(),
        })
    }
}

fn not_found_or(err: KubeError, kind: &str, namespace: &str, name: &str) -> KubeError {
    match err {
        KubeError::CommandFailed { ref stderr, .. } if stderr.contains("NotFound") => {
            KubeError::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        other => other,
    }
}

/// Find `kind` in `kubectl api-resources --no-headers` output
///
/// Matches the plural name, the lowercased kind, any short name, or a
/// group-qualified form of either (`deployments.apps`).
pub fn parse_api_resources(output: &str, kind: &str) -> Option<GroupVersionResource> {
    let wanted = kind.to_lowercase();

    for line in output.lines() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        let (name, short_names, api_version, kind_col) = match cols.as_slice() {
            [name, short, api_version, _namespaced, kind] => (*name, *short, *api_version, *kind),
            [name, api_version, _namespaced, kind] => (*name, "", *api_version, *kind),
            _ => continue,
        };

        let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
        let singular = kind_col.to_lowercase();

        let mut candidates = vec![name.to_string(), singular.clone()];
        candidates.extend(short_names.split(',').filter(|s| !s.is_empty()).map(String::from));
        if !group.is_empty() {
            candidates.push(format!("{}.{}", name, group));
            candidates.push(format!("{}.{}", singular, group));
        }

        if candidates.iter().any(|c| *c == wanted) {
            return Some(GroupVersionResource::new(group, version, name));
        }
    }

    None
}

#[async_trait]
impl KubernetesProvider for KubectlProvider {
    async fn lookup_kind(&self, kind: &str) -> Result<GroupVersionResource, KubeError> {
        let out = self.kubectl(&["api-resources", "--no-headers"]).await?;
        parse_api_resources(&out, kind).ok_or_else(|| KubeError::KindNotFound {
            kind: kind.to_string(),
        })
    }

    async fn wait_condition_state(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
        state: &str,
        timeout: Duration,
    ) -> Result<(), KubeError> {
        let target = format!("{}/{}", gvr.qualified_resource(), name);
        let condition = if state.contains('=') {
            format!("--for={}", state)
        } else {
            format!("--for=condition={}", state)
        };
        let timeout_arg = format!("--timeout={}s", timeout.as_secs());

        self.kubectl(&["wait", &condition, &target, "-n", namespace, &timeout_arg])
            .await
            .map(|_| ())
            .map_err(|e| match e {
                KubeError::CommandFailed { ref stderr, .. } if stderr.contains("timed out") => {
                    KubeError::Timeout {
                        what: format!("{} to be {}", target, state),
                        seconds: timeout.as_secs(),
                    }
                }
                other => not_found_or(other, &gvr.resource, namespace, name),
            })
    }

    async fn restart(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), KubeError> {
        let target = format!("{}/{}", gvr.qualified_resource(), name);
        self.kubectl(&["rollout", "restart", &target, "-n", namespace])
            .await
            .map(|_| ())
            .map_err(|e| not_found_or(e, &gvr.resource, namespace, name))
    }

    async fn config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>, KubeError> {
        let json = self.get_json("configmap", namespace, name).await?;

        let data = json
            .get("data")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(data)
    }

    async fn daemonset_status(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<DaemonSetStatus, KubeError> {
        let json = self
            .get_json(&gvr.qualified_resource(), namespace, name)
            .await?;
        let status = json.get("status").ok_or_else(|| KubeError::Parse {
            message: format!("daemonset {}/{} has no status", namespace, name),
        })?;

        let count = |field: &str| status.get(field).and_then(Value::as_i64).unwrap_or(0);

        Ok(DaemonSetStatus {
            ready: count("numberReady"),
            desired: count("desiredNumberScheduled"),
        })
    }
}
