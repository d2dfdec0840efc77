// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Stage validation
//!
//! Static checks over a loaded stage map. Nothing here aborts a run; the
//! findings are reported so operators can fix them before checks fail.

use regex::Regex;
use std::collections::HashMap;

use super::{CheckGroup, Stage, StageMap};

/// Stage map validator
pub struct StageValidator;

impl StageValidator {
    /// Validate every stage in the map
    pub fn validate(stages: &StageMap) -> ValidationResult {
        let mut result = ValidationResult::new();

        if stages.is_empty() {
            result.add_error("No stages were discovered");
        }

        let id_pattern = Regex::new(r"^[a-z0-9]([-a-z0-9_]*[a-z0-9])?$").ok();

        for stage in stages.iter() {
            if let Some(re) = &id_pattern {
                if !re.is_match(&stage.id) {
                    result.add_warning(&format!(
                        "Stage '{}': id should be lowercase letters, digits, '-' or '_'",
                        stage.id
                    ));
                }
            }

            if stage.order < 0 {
                result.add_warning(&format!(
                    "Stage '{}': has no valid order (directory name lacks an '<order>-' prefix)",
                    stage.id
                ));
            }

            for dep in &stage.dependencies {
                if !stages.contains(dep) {
                    result.add_error(&format!(
                        "Stage '{}' depends on unknown stage '{}'",
                        stage.id, dep
                    ));
                }
            }

            Self::validate_checks(stage, &mut result);
        }

        result
    }

    /// Validate the check groups of one stage
    fn validate_checks(stage: &Stage, result: &mut ValidationResult) {
        for (name, group) in &stage.checks {
            let label = format!("Stage '{}', check group '{}'", stage.id, name);

            if group.is_empty() {
                result.add_warning(&format!("{}: declares no checks", label));
            }
            if group.before.is_empty() && group.after.is_empty() {
                result.add_warning(&format!("{}: has no before/after events and never runs", label));
            }

            for http in &group.http {
                if http.url.is_none() && http.app.is_none() {
                    result.add_error(&format!("{}: HTTP check needs 'url' or 'app'", label));
                }
            }

            for kube in &group.kubernetes {
                if kube.wait && (kube.name.is_none() || kube.namespace.is_none()) {
                    result.add_error(&format!(
                        "{}: kubernetes check on '{}' waits but lacks name or namespace",
                        label, kube.kind
                    ));
                }
                if kube.restart && kube.name.is_none() {
                    result.add_error(&format!(
                        "{}: kubernetes check on '{}' restarts but lacks a name",
                        label, kube.kind
                    ));
                }
            }

            for state in &group.state {
                if state.key.trim().is_empty() {
                    result.add_error(&format!("{}: state check has an empty key", label));
                }
            }
        }

        Self::warn_order_collisions(stage, result);
    }

    /// Groups that share an order and an event end up in one batch
    fn warn_order_collisions(stage: &Stage, result: &mut ValidationResult) {
        let mut seen: HashMap<(i64, String), &str> = HashMap::new();

        for (name, group) in &stage.checks {
            for event in Self::events(group) {
                if let Some(other) = seen.insert((group.order, event.clone()), name) {
                    result.add_warning(&format!(
                        "Stage '{}': check groups '{}' and '{}' share order {} for '{}' and run as one batch",
                        stage.id, other, name, group.order, event
                    ));
                }
            }
        }
    }

    fn events(group: &CheckGroup) -> Vec<String> {
        group
            .before
            .iter()
            .map(|e| format!("before {}", e.to_lowercase()))
            .chain(group.after.iter().map(|e| format!("after {}", e.to_lowercase())))
            .collect()
    }
}

/// Result of stage validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
