// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use std::path::Path;

use super::StagehandError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &StagehandError) -> Option<Self> {
        match error {
            StagehandError::UnresolvedDependencies { stages, .. } => {
                Some(Self::fix_dependency_cycle(stages))
            }
            StagehandError::InvalidDescriptor { path, .. } => Some(Self::fix_descriptor(path)),
            StagehandError::KubectlNotFound => Some(Self::install_kubectl()),
            _ => None,
        }
    }

    /// Suggest fixing a dependency cycle
    pub fn fix_dependency_cycle(stages: &[String]) -> Self {
        let steps = if stages.is_empty() {
            vec!["No cycle was found; the graph needs more ordering passes than allowed".into()]
        } else {
            vec![
                format!("Stages involved: {}", stages.join(" → ")),
                "Remove one of the 'dependencies' entries between these stages".into(),
            ]
        };

        Self {
            action: "Break the stage dependency cycle".into(),
            steps,
            commands: vec![
                "# Inspect the dependency graph:".into(),
                "stagehand graph --format mermaid".into(),
            ],
        }
    }

    /// Suggest fixing a malformed stage descriptor
    pub fn fix_descriptor(path: &Path) -> Self {
        Self {
            action: format!("Fix the YAML in {}", path.display()),
            steps: vec![
                "Keys must be snake_case stage attributes (id, order, dependencies, ...)".into(),
                "Use spaces, not tabs, for indentation".into(),
            ],
            commands: vec![
                "# Re-check every stage after editing:".into(),
                "stagehand validate".into(),
            ],
        }
    }

    /// Suggest installing kubectl
    pub fn install_kubectl() -> Self {
        Self {
            action: "Install kubectl".into(),
            steps: vec![
                "Kubernetes, DaemonSet and state checks talk to the cluster through kubectl".into(),
                "Make sure it is on PATH and points at the right context".into(),
            ],
            commands: vec![
                "kubectl version --client".into(),
                "kubectl config current-context".into(),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_suggestion_lists_stages() {
        let suggestion =
            RecoverySuggestion::fix_dependency_cycle(&["a".to_string(), "b".to_string()]);
        let text = suggestion.to_string();
        assert!(text.contains("a → b"));
        assert!(text.contains("stagehand graph"));
    }

    #[test]
    fn test_no_suggestion_for_unrelated_error() {
        let err = StagehandError::StageNotFound { stage: "x".into() };
        assert!(RecoverySuggestion::for_error(&err).is_none());
    }
}
