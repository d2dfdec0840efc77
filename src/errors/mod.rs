// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Error types with operator-facing diagnostics
//!
//! Setup and configuration problems surface as [`StagehandError`]. Individual
//! check failures are carried by [`crate::checks::CheckError`] inside check
//! results and only become a `StagehandError` once a batch is aggregated.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::checks::ChecksFailed;

/// Result type for stagehand operations
pub type StagehandResult<T> = Result<T, StagehandError>;

/// Main error type for stagehand
#[derive(Error, Debug, Diagnostic)]
pub enum StagehandError {
    // ─────────────────────────────────────────────────────────────────────────
    // Stage Discovery Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Cannot read stage root '{path}': {error}")]
    #[diagnostic(
        code(stagehand::stage_root_unreadable),
        help("Check that the directory exists and is readable, or remove it from stage_roots")
    )]
    StageRootUnreadable { path: PathBuf, error: String },

    #[error("Stage directory '{name}' does not follow the '<order>-<id>' convention: {reason}")]
    #[diagnostic(
        code(stagehand::invalid_stage_name),
        help("Rename the directory, e.g. '100-{id}', or set 'order' in its stage.yaml")
    )]
    InvalidStageName {
        name: String,
        id: String,
        reason: String,
    },

    #[error("Malformed stage descriptor '{path}': {error}")]
    #[diagnostic(
        code(stagehand::invalid_descriptor),
        help("The directory defaults were used instead; fix the YAML to apply its overrides")
    )]
    InvalidDescriptor { path: PathBuf, error: String },

    #[error(
        "Stage dependencies did not converge after {passes} passes (stages: {})",
        .stages.join(", ")
    )]
    #[diagnostic(
        code(stagehand::unresolved_dependencies),
        help("Look for a dependency cycle between the listed stages")
    )]
    UnresolvedDependencies { passes: usize, stages: Vec<String> },

    #[error("Stage '{stage}' not found")]
    #[diagnostic(code(stagehand::stage_not_found))]
    StageNotFound { stage: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Config file not found: {path}")]
    #[diagnostic(
        code(stagehand::config_not_found),
        help("Pass --config or set STAGEHAND_CONFIG to point at your platform config")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid platform configuration: {reason}")]
    #[diagnostic(code(stagehand::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(stagehand::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("kubectl not found")]
    #[diagnostic(
        code(stagehand::kubectl_not_found),
        help("Install kubectl or pass --kubectl with the path to the binary")
    )]
    KubectlNotFound,

    // ─────────────────────────────────────────────────────────────────────────
    // Check Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(transparent)]
    Checks(#[from] ChecksFailed),

    #[error("Checks {phase} '{event}' on stage '{stage}' were cancelled")]
    #[diagnostic(code(stagehand::checks_cancelled))]
    Cancelled {
        stage: String,
        event: String,
        phase: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(stagehand::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(stagehand::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(stagehand::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for StagehandError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for StagehandError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for StagehandError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl StagehandError {
    /// Create an invalid config error with a hint
    pub fn invalid_config(reason: impl Into<String>, help: Option<&str>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
            help: help.map(String::from),
        }
    }

    /// Whether the run must stop before any stage executes
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedDependencies { .. } | Self::StageRootUnreadable { .. }
        )
    }
}
