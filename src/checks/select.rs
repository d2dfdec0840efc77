// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Event-based check selection
//!
//! Picks the check groups of a stage that fire before or after an event and
//! buckets their checks by group order. Each bucket is one concurrent batch;
//! batches run in ascending order.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{expand_group, Check};
use crate::kube::Providers;
use crate::stages::{CheckGroup, Stage};

/// Checks that run concurrently
pub type CheckBatch = Vec<Arc<dyn Check>>;

/// Which side of an event a check group fires on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Before,
    After,
}

impl EventPhase {
    fn triggers(self, group: &CheckGroup) -> &[String] {
        match self {
            Self::Before => &group.before,
            Self::After => &group.after,
        }
    }
}

impl std::fmt::Display for EventPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

/// Batches to run before `event`
pub fn pre_checks(stage: &Stage, event: &str, providers: &Providers) -> Vec<CheckBatch> {
    select(stage, event, EventPhase::Before, providers)
}

/// Batches to run after `event`
pub fn post_checks(stage: &Stage, event: &str, providers: &Providers) -> Vec<CheckBatch> {
    select(stage, event, EventPhase::After, providers)
}

fn select(stage: &Stage, event: &str, phase: EventPhase, providers: &Providers) -> Vec<CheckBatch> {
    let event = event.to_lowercase();
    let mut buckets: BTreeMap<i64, CheckBatch> = BTreeMap::new();

    for (name, group) in &stage.checks {
        let triggers = phase.triggers(group);
        if triggers.is_empty() {
            continue;
        }

        for trigger in triggers {
            if trigger.to_lowercase() != event {
                continue;
            }
            tracing::debug!(stage = %stage.id, group = %name, %phase, %event, order = group.order, "selected check group");
            buckets
                .entry(group.order)
                .or_default()
                .extend(expand_group(group, providers));
        }
    }

    buckets
        .into_values()
        .filter(|batch| !batch.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::fake::FakeProvider;
    use crate::stages::StateCheckSpec;

    fn state_group(order: i64, before: &[&str], after: &[&str], keys: &[&str]) -> CheckGroup {
        CheckGroup {
            order,
            before: before.iter().map(|s| s.to_string()).collect(),
            after: after.iter().map(|s| s.to_string()).collect(),
            state: keys
                .iter()
                .map(|k| StateCheckSpec {
                    id: None,
                    key: k.to_string(),
                    value: "done".into(),
                    retry: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn ids(batches: &[CheckBatch]) -> Vec<Vec<String>> {
        batches
            .iter()
            .map(|b| b.iter().map(|c| c.id()).collect())
            .collect()
    }

    fn providers() -> Providers {
        Providers::new(Arc::new(FakeProvider::default()))
    }

    #[test]
    fn test_batches_sorted_by_order() {
        let mut stage = Stage::new("ingress", 10);
        stage.checks.insert("late".into(), state_group(5, &["apply"], &[], &["c"]));
        stage.checks.insert("early".into(), state_group(1, &["apply"], &[], &["a", "b"]));

        let batches = pre_checks(&stage, "apply", &providers());

        assert_eq!(ids(&batches), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_same_order_groups_merge_into_one_batch() {
        let mut stage = Stage::new("ingress", 10);
        stage.checks.insert("one".into(), state_group(0, &[], &["apply"], &["a"]));
        stage.checks.insert("two".into(), state_group(0, &[], &["apply"], &["b"]));

        let batches = post_checks(&stage, "apply", &providers());

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_event_match_is_case_insensitive() {
        let mut stage = Stage::new("ingress", 10);
        stage.checks.insert("g".into(), state_group(0, &["Apply"], &[], &["a"]));

        assert_eq!(pre_checks(&stage, "APPLY", &providers()).len(), 1);
        assert!(pre_checks(&stage, "destroy", &providers()).is_empty());
    }

    #[test]
    fn test_phases_are_independent() {
        let mut stage = Stage::new("ingress", 10);
        stage.checks.insert("g".into(), state_group(0, &["apply"], &[], &["a"]));

        assert!(post_checks(&stage, "apply", &providers()).is_empty());
        assert_eq!(pre_checks(&stage, "apply", &providers()).len(), 1);
    }

    #[test]
    fn test_groups_without_checks_yield_no_batch() {
        let mut stage = Stage::new("ingress", 10);
        stage.checks.insert("empty".into(), state_group(0, &["apply"], &[], &[]));

        assert!(pre_checks(&stage, "apply", &providers()).is_empty());
    }
}
