// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Kubernetes object state check

use async_trait::async_trait;
use std::time::Duration;

use super::{Check, CheckError, CheckType, RetryOpts};
use crate::config::PlatformConfig;
use crate::kube::Providers;
use crate::stages::KubernetesCheckSpec;

/// Wait timeout used when none (or a non-positive one) is declared
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 600;

// The wait carries its own timeout, so one attempt is enough
const DEFAULT_RETRY: RetryOpts = RetryOpts::new(1, 0);

/// Restarts and/or waits on a Kubernetes object
pub struct KubernetesCheck {
    spec: KubernetesCheckSpec,
    providers: Providers,
}

impl KubernetesCheck {
    pub fn new(spec: KubernetesCheckSpec, providers: Providers) -> Self {
        Self { spec, providers }
    }

    fn timeout(&self) -> Duration {
        match self.spec.timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
        }
    }

    fn target(&self, action: &str) -> Result<(&str, &str), CheckError> {
        match (self.spec.name.as_deref(), self.spec.namespace.as_deref()) {
            (Some(name), Some(namespace)) => Ok((namespace, name)),
            _ => Err(CheckError::Config(format!(
                "{} on '{}' requires both name and namespace",
                action, self.spec.kind
            ))),
        }
    }
}

#[async_trait]
impl Check for KubernetesCheck {
    async fn run(&self, _config: &PlatformConfig) -> Result<(), CheckError> {
        // Fail on configuration before touching the cluster
        let restart_target = if self.spec.restart {
            Some(self.target("restart")?)
        } else {
            None
        };
        let wait_target = if self.spec.wait {
            Some(self.target("wait")?)
        } else {
            None
        };

        let gvr = self.providers.kinds.resolve(&self.spec.kind).await?;

        if let Some((namespace, name)) = restart_target {
            tracing::info!(kind = %gvr, namespace, name, "restarting");
            self.providers
                .kubernetes
                .restart(&gvr, namespace, name)
                .await?;
        }

        if let Some((namespace, name)) = wait_target {
            tracing::debug!(kind = %gvr, namespace, name, state = %self.spec.state, "waiting for state");
            self.providers
                .kubernetes
                .wait_condition_state(&gvr, namespace, name, &self.spec.state, self.timeout())
                .await?;
        }

        Ok(())
    }

    fn id(&self) -> String {
        if let Some(ref id) = self.spec.id {
            return id.clone();
        }
        let mut parts = vec![self.spec.kind.as_str()];
        parts.extend(self.spec.namespace.as_deref());
        parts.extend(self.spec.name.as_deref());
        parts.join("/")
    }

    fn check_type(&self) -> CheckType {
        CheckType::Kubernetes
    }

    fn retry_opts(&self) -> RetryOpts {
        DEFAULT_RETRY.with_spec(self.spec.retry)
    }
}
