// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Utility modules
//!
//! Terminal helpers for the CLI and small concurrency primitives.

pub mod colors;
pub mod once;
pub mod spinner;

pub use colors::*;
pub use once::OnceMap;
pub use spinner::*;
