// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Stage definitions, discovery and ordering
//!
//! Stages are discovered from one or more root directories, merged over
//! caller-supplied base stages, and then ordered so every stage runs after
//! the stages it depends on.

mod definition;
mod discovery;
mod map;
mod order;
mod validation;

pub use definition::*;
pub use discovery::{
    discover_root, load_stages, merge_stages, parse_stage_dir_name, stage_from_dir, StageLoader,
};
pub use map::StageMap;
pub use order::{resolve_order, StageGraph, MAX_ORDER_PASSES};
pub use validation::{StageValidator, ValidationResult};
