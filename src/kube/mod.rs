// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Kubernetes access for checks
//!
//! Checks never talk to the cluster directly; they go through a
//! [`KubernetesProvider`]. Kind names are resolved once per process through
//! a shared [`KindResolver`].

mod kubectl;

pub use kubectl::{parse_api_resources, KubectlProvider};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Provider-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KubeError {
    #[error("unknown resource kind '{kind}'")]
    KindNotFound { kind: String },

    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("unexpected response: {message}")]
    Parse { message: String },
}

/// A resolved resource kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    /// API group; empty for the core group
    pub group: String,
    pub version: String,
    /// Plural resource name, e.g. `deployments`
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }

    /// `resource.group`, or just `resource` for the core group
    pub fn qualified_resource(&self) -> String {
        if self.group.is_empty() {
            self.resource.clone()
        } else {
            format!("{}.{}", self.resource, self.group)
        }
    }
}

impl std::fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Replica counts of a DaemonSet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonSetStatus {
    pub ready: i64,
    pub desired: i64,
}

/// Cluster operations the checks rely on
#[async_trait]
pub trait KubernetesProvider: Send + Sync {
    /// Resolve a short or qualified kind name
    async fn lookup_kind(&self, kind: &str) -> Result<GroupVersionResource, KubeError>;

    /// Block until the object reports `state`, or `timeout` elapses
    async fn wait_condition_state(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
        state: &str,
        timeout: Duration,
    ) -> Result<(), KubeError>;

    /// Trigger a rolling restart
    async fn restart(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), KubeError>;

    /// Read the data of a ConfigMap
    async fn config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>, KubeError>;

    /// Read ready/desired counts of a DaemonSet
    async fn daemonset_status(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<DaemonSetStatus, KubeError>;
}

/// Process-wide cache of kind lookups
///
/// The first successful lookup for a name wins and is never invalidated.
/// The lock covers the check-then-fill of one entry, so concurrent callers
/// asking for the same kind issue a single discovery request.
pub struct KindResolver {
    provider: Arc<dyn KubernetesProvider>,
    cache: Mutex<HashMap<String, GroupVersionResource>>,
}

impl KindResolver {
    pub fn new(provider: Arc<dyn KubernetesProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `kind`, consulting the cache first
    pub async fn resolve(&self, kind: &str) -> Result<GroupVersionResource, KubeError> {
        let key = kind.to_lowercase();
        let mut cache = self.cache.lock().await;

        if let Some(gvr) = cache.get(&key) {
            return Ok(gvr.clone());
        }

        let gvr = self.provider.lookup_kind(kind).await?;
        tracing::debug!(kind, resolved = %gvr, "resolved resource kind");
        cache.insert(key, gvr.clone());
        Ok(gvr)
    }

    /// Number of cached kinds
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// The collaborators handed to checks at selection time
#[derive(Clone)]
pub struct Providers {
    pub kubernetes: Arc<dyn KubernetesProvider>,
    pub kinds: Arc<KindResolver>,
}

impl Providers {
    /// Wrap a provider with a fresh kind cache
    pub fn new(kubernetes: Arc<dyn KubernetesProvider>) -> Self {
        let kinds = Arc::new(KindResolver::new(kubernetes.clone()));
        Self { kubernetes, kinds }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory provider for tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    pub struct FakeProvider {
        pub kinds: HashMap<String, GroupVersionResource>,
        pub config_maps: HashMap<(String, String), HashMap<String, String>>,
        pub daemonsets: HashMap<(String, String), DaemonSetStatus>,
        /// Objects that satisfy any wait, keyed by `namespace/name`
        pub ready: Vec<String>,
        pub lookups: AtomicUsize,
        pub config_map_reads: AtomicUsize,
        pub restarts: StdMutex<Vec<String>>,
    }

    impl FakeProvider {
        pub fn with_kind(mut self, name: &str, gvr: GroupVersionResource) -> Self {
            self.kinds.insert(name.to_string(), gvr);
            self
        }
    }

    #[async_trait]
    impl KubernetesProvider for FakeProvider {
        async fn lookup_kind(&self, kind: &str) -> Result<GroupVersionResource, KubeError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.kinds.get(kind).cloned().ok_or_else(|| KubeError::KindNotFound {
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
            if self.ready.contains(&format!("{}/{}", namespace, name)) {
                Ok(())
            } else {
                Err(KubeError::Timeout {
                    what: format!("{} {}/{} to be {}", gvr.resource, namespace, name, state),
                    seconds: timeout.as_secs(),
                })
            }
        }

        async fn restart(
            &self,
            gvr: &GroupVersionResource,
            namespace: &str,
            name: &str,
        ) -> Result<(), KubeError> {
            if let Ok(mut restarts) = self.restarts.lock() {
                restarts.push(format!("{}/{}/{}", gvr.resource, namespace, name));
            }
            Ok(())
        }

        async fn config_map_data(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<HashMap<String, String>, KubeError> {
            self.config_map_reads.fetch_add(1, Ordering::SeqCst);
            self.config_maps
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| KubeError::NotFound {
                    kind: "configmap".into(),
                    namespace: namespace.into(),
                    name: name.into(),
                })
        }

        async fn daemonset_status(
            &self,
            _gvr: &GroupVersionResource,
            namespace: &str,
            name: &str,
        ) -> Result<DaemonSetStatus, KubeError> {
            self.daemonsets
                .get(&(namespace.to_string(), name.to_string()))
                .copied()
                .ok_or_else(|| KubeError::NotFound {
                    kind: "daemonset".into(),
                    namespace: namespace.into(),
                    name: name.into(),
                })
        }
    }
}
