// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! External state check
//!
//! Compares one key of the platform state ConfigMap with an expected value.

use async_trait::async_trait;

use super::{Check, CheckError, CheckType, RetryOpts};
use crate::config::PlatformConfig;
use crate::kube::Providers;
use crate::stages::StateCheckSpec;

const DEFAULT_RETRY: RetryOpts = RetryOpts::new(0, 5);

/// Key/value check against the external state object
pub struct StateCheck {
    spec: StateCheckSpec,
    providers: Providers,
}

impl StateCheck {
    pub fn new(spec: StateCheckSpec, providers: Providers) -> Self {
        Self { spec, providers }
    }
}

#[async_trait]
impl Check for StateCheck {
    async fn run(&self, config: &PlatformConfig) -> Result<(), CheckError> {
        if !config.state.enabled {
            tracing::info!(key = %self.spec.key, "external state tracking disabled, bypassing state check");
            return Ok(());
        }

        let state = &config.state;
        let data = self
            .providers
            .kubernetes
            .config_map_data(&state.namespace, &state.name)
            .await?;

        let Some(actual) = data.get(&self.spec.key) else {
            return Err(CheckError::StateKeyNotFound {
                key: self.spec.key.clone(),
                namespace: state.namespace.clone(),
                name: state.name.clone(),
            });
        };

        if actual.to_lowercase() != self.spec.value.to_lowercase() {
            return Err(CheckError::StateMismatch {
                key: self.spec.key.clone(),
                expected: self.spec.value.clone(),
                actual: actual.clone(),
            });
        }

        Ok(())
    }

    fn id(&self) -> String {
        self.spec.id.clone().unwrap_or_else(|| self.spec.key.clone())
    }

    fn check_type(&self) -> CheckType {
        CheckType::State
    }

    fn retry_opts(&self) -> RetryOpts {
        DEFAULT_RETRY.with_spec(self.spec.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateConfig;
    use crate::kube::fake::FakeProvider;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn store() -> Arc<FakeProvider> {
        let mut fake = FakeProvider::default();
        fake.config_maps.insert(
            ("kube-system".into(), "stagehand-state".into()),
            HashMap::from([("key1".to_string(), "match".to_string())]),
        );
        Arc::new(fake)
    }

    fn check(fake: &Arc<FakeProvider>, key: &str, value: &str) -> StateCheck {
        StateCheck::new(
            StateCheckSpec {
                id: None,
                key: key.into(),
                value: value.into(),
                retry: None,
            },
            Providers::new(fake.clone()),
        )
    }

    #[tokio::test]
    async fn test_matching_value() {
        let fake = store();
        let config = PlatformConfig::default();
        assert!(check(&fake, "key1", "match").run(&config).await.is_ok());
        assert!(check(&fake, "key1", "MATCH").run(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let fake = store();
        let err = check(&fake, "key2", "match")
            .run(&PlatformConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("key not found"));
    }

    #[tokio::test]
    async fn test_mismatched_value() {
        let fake = store();
        let err = check(&fake, "key1", "mismatched")
            .run(&PlatformConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("value failed to match"));
    }

    #[tokio::test]
    async fn test_disabled_tracking_bypasses_store() {
        let fake = store();
        let config = PlatformConfig {
            state: StateConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(check(&fake, "key2", "anything").run(&config).await.is_ok());
        assert!(check(&fake, "key1", "mismatched").run(&config).await.is_ok());
        assert_eq!(fake.config_map_reads.load(Ordering::SeqCst), 0);
    }
}
