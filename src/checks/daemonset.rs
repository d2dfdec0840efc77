// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! DaemonSet readiness check

use async_trait::async_trait;

use super::{Check, CheckError, CheckType, RetryOpts};
use crate::config::PlatformConfig;
use crate::kube::Providers;
use crate::stages::DaemonSetCheckSpec;

const DEFAULT_RETRY: RetryOpts = RetryOpts::new(30, 10);

/// Fails while fewer pods are ready than desired
pub struct DaemonSetCheck {
    spec: DaemonSetCheckSpec,
    providers: Providers,
}

impl DaemonSetCheck {
    pub fn new(spec: DaemonSetCheckSpec, providers: Providers) -> Self {
        Self { spec, providers }
    }
}

#[async_trait]
impl Check for DaemonSetCheck {
    async fn run(&self, _config: &PlatformConfig) -> Result<(), CheckError> {
        let gvr = self.providers.kinds.resolve("daemonset").await?;
        let status = self
            .providers
            .kubernetes
            .daemonset_status(&gvr, &self.spec.namespace, &self.spec.name)
            .await?;

        if status.ready < status.desired {
            return Err(CheckError::DaemonSetNotReady {
                namespace: self.spec.namespace.clone(),
                name: self.spec.name.clone(),
                ready: status.ready,
                desired: status.desired,
                missing: status.desired - status.ready,
            });
        }

        Ok(())
    }

    fn id(&self) -> String {
        self.spec
            .id
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.spec.namespace, self.spec.name))
    }

    fn check_type(&self) -> CheckType {
        CheckType::DaemonSet
    }

    fn retry_opts(&self) -> RetryOpts {
        DEFAULT_RETRY.with_spec(self.spec.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::fake::FakeProvider;
    use crate::kube::{DaemonSetStatus, GroupVersionResource};
    use std::sync::Arc;

    fn check(ready: i64, desired: i64) -> DaemonSetCheck {
        let mut fake = FakeProvider::default()
            .with_kind("daemonset", GroupVersionResource::new("apps", "v1", "daemonsets"));
        fake.daemonsets.insert(
            ("monitoring".into(), "node-exporter".into()),
            DaemonSetStatus { ready, desired },
        );

        DaemonSetCheck::new(
            DaemonSetCheckSpec {
                id: None,
                name: "node-exporter".into(),
                namespace: "monitoring".into(),
                retry: None,
            },
            Providers::new(Arc::new(fake)),
        )
    }

    #[tokio::test]
    async fn test_all_ready() {
        assert!(check(3, 3).run(&PlatformConfig::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_shortfall_is_reported() {
        let err = check(1, 3).run(&PlatformConfig::default()).await.unwrap_err();
        assert!(matches!(err, CheckError::DaemonSetNotReady { missing: 2, .. }));
        assert!(err.to_string().contains("2 missing"));
    }

    #[test]
    fn test_defaults() {
        let check = check(0, 0);
        assert_eq!(check.id(), "monitoring/node-exporter");
        assert_eq!(check.retry_opts(), RetryOpts::new(30, 10));
    }
}
