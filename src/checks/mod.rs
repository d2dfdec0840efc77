// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Stage boundary checks
//!
//! This module provides the [`Check`] trait, the four built-in probe types
//! (HTTP, Kubernetes object state, DaemonSet readiness, external state),
//! the event-based selection of checks, and the concurrent engine that runs
//! them with retries.

mod daemonset;
mod engine;
mod http;
mod kubernetes;
mod select;
mod state;

pub use daemonset::DaemonSetCheck;
pub use engine::{
    backoff_delay, run_batches, run_checks, CheckObserver, CheckResult, CheckRunner,
    ChecksFailed, FailedCheck, NoopObserver,
};
pub use http::HttpCheck;
pub use kubernetes::KubernetesCheck;
pub use select::{post_checks, pre_checks, CheckBatch, EventPhase};
pub use state::StateCheck;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::PlatformConfig;
use crate::kube::{KubeError, Providers};
use crate::stages::{CheckGroup, RetrySpec};

/// Why a single check attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("invalid check configuration: {0}")]
    Config(String),

    #[error("GET {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("GET {url} returned status {status}, expected one of {expected:?}")]
    Status {
        url: String,
        status: u16,
        expected: Vec<u16>,
    },

    #[error("GET {url} (status {status}) content mismatch: {detail}")]
    Content {
        url: String,
        status: u16,
        detail: String,
    },

    #[error("daemonset {namespace}/{name} not ready: {ready}/{desired} pods ready, {missing} missing")]
    DaemonSetNotReady {
        namespace: String,
        name: String,
        ready: i64,
        desired: i64,
        missing: i64,
    },

    #[error("key not found: '{key}' is not set in {namespace}/{name}")]
    StateKeyNotFound {
        key: String,
        namespace: String,
        name: String,
    },

    #[error("value failed to match for '{key}': expected '{expected}', found '{actual}'")]
    StateMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Kube(#[from] KubeError),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("check task aborted: {0}")]
    Aborted(String),
}

impl CheckError {
    /// Errors that another attempt cannot fix
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Cancelled | Self::Aborted(_))
    }
}

/// Short type tag of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckType {
    Http,
    Kubernetes,
    DaemonSet,
    State,
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Kubernetes => write!(f, "kubernetes"),
            Self::DaemonSet => write!(f, "daemonset"),
            Self::State => write!(f, "state"),
        }
    }
}

/// How often a check is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOpts {
    /// Attempt limit; 0 means unlimited
    pub limit: u32,
    /// Seconds between attempts; 0 disables waiting
    pub wait_seconds: u64,
}

impl RetryOpts {
    pub const fn new(limit: u32, wait_seconds: u64) -> Self {
        Self {
            limit,
            wait_seconds,
        }
    }

    /// Overlay a declared override
    pub fn with_spec(self, spec: Option<RetrySpec>) -> Self {
        let Some(spec) = spec else {
            return self;
        };
        Self {
            limit: spec.limit.unwrap_or(self.limit),
            wait_seconds: spec.wait.unwrap_or(self.wait_seconds),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == 0
    }

    /// Whether attempt number `attempt` (1-based) may run
    pub fn allows(&self, attempt: u32) -> bool {
        self.is_unlimited() || attempt <= self.limit
    }
}

/// A runnable probe
#[async_trait]
pub trait Check: Send + Sync {
    /// Run one attempt
    ///
    /// Dropping the returned future abandons the attempt.
    async fn run(&self, config: &PlatformConfig) -> Result<(), CheckError>;

    /// Stable human identifier
    fn id(&self) -> String;

    fn check_type(&self) -> CheckType;

    fn retry_opts(&self) -> RetryOpts;
}

/// Expand a group into one check per declared entry
pub fn expand_group(group: &CheckGroup, providers: &Providers) -> Vec<Arc<dyn Check>> {
    let mut checks: Vec<Arc<dyn Check>> = Vec::with_capacity(group.len());

    for spec in &group.http {
        checks.push(Arc::new(HttpCheck::new(spec.clone())));
    }
    for spec in &group.kubernetes {
        checks.push(Arc::new(KubernetesCheck::new(spec.clone(), providers.clone())));
    }
    for spec in &group.daemonset {
        checks.push(Arc::new(DaemonSetCheck::new(spec.clone(), providers.clone())));
    }
    for spec in &group.state {
        checks.push(Arc::new(StateCheck::new(spec.clone(), providers.clone())));
    }

    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::fake::FakeProvider;
    use crate::stages::{DaemonSetCheckSpec, HttpCheckSpec, StateCheckSpec};

    #[test]
    fn test_retry_overrides() {
        let defaults = RetryOpts::new(30, 10);
        assert_eq!(defaults.with_spec(None), defaults);
        assert_eq!(
            defaults.with_spec(Some(RetrySpec {
                limit: Some(3),
                wait: None
            })),
            RetryOpts::new(3, 10)
        );
    }

    #[test]
    fn test_retry_limits() {
        assert!(RetryOpts::new(0, 5).allows(1_000));
        assert!(RetryOpts::new(2, 0).allows(2));
        assert!(!RetryOpts::new(2, 0).allows(3));
    }

    #[test]
    fn test_permanent_errors() {
        assert!(CheckError::Config("x".into()).is_permanent());
        assert!(!CheckError::Kube(KubeError::KindNotFound { kind: "x".into() }).is_permanent());
    }

    #[test]
    fn test_expand_group_builds_every_entry() {
        let group = CheckGroup {
            http: vec![HttpCheckSpec {
                url: Some("https://example.com".into()),
                ..Default::default()
            }],
            daemonset: vec![DaemonSetCheckSpec {
                id: None,
                name: "node-exporter".into(),
                namespace: "monitoring".into(),
                retry: None,
            }],
            state: vec![StateCheckSpec {
                id: None,
                key: "dns".into(),
                value: "done".into(),
                retry: None,
            }],
            ..Default::default()
        };
        let providers = Providers::new(Arc::new(FakeProvider::default()));

        let checks = expand_group(&group, &providers);
        let types: Vec<_> = checks.iter().map(|c| c.check_type().to_string()).collect();

        assert_eq!(types, vec!["http", "daemonset", "state"]);
    }
}
