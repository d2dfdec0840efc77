// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! # stagehand - Stage ordering and boundary checks
//!
//! `stagehand` is the core of a platform provisioning driver: it discovers
//! provisioning stages from directory trees, orders them by declared
//! dependencies, and runs the checks each stage declares before and after
//! lifecycle events.
//!
//! ## Features
//!
//! - **Stage discovery** - `<order>-<id>` directories with optional `stage.yaml` overrides
//! - **Dependency ordering** - bounded relaxation with cycle diagnostics
//! - **Concurrent checks** - HTTP, Kubernetes object state, DaemonSet readiness and
//!   external state, retried with backoff and reported together
//!
//! ## Quick Start
//!
//! ```bash
//! # List stages in execution order
//! stagehand stages --root ./stages
//!
//! # Check the stage declarations
//! stagehand validate
//!
//! # Run the checks that follow 'apply' for one stage
//! stagehand checks ingress --after apply
//! ```

pub mod checks;
pub mod cli;
pub mod config;
pub mod errors;
pub mod kube;
pub mod stages;
pub mod utils;

// Re-export commonly used types
pub use checks::{CheckResult, CheckRunner, ChecksFailed};
pub use config::PlatformConfig;
pub use errors::{StagehandError, StagehandResult};
pub use stages::{Stage, StageLoader, StageMap};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
