// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Progress spinner utilities
//!
//! Provides progress indicators for long-running checks.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.blue} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(TICK_CHARS)
}

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Add a spinner to a group of concurrently updated lines
pub fn add_spinner(group: &MultiProgress, message: &str) -> ProgressBar {
    group.add(create_spinner(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_message() {
        let group = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let pb = add_spinner(&group, "http grafana/api/health");

        assert_eq!(pb.message(), "http grafana/api/health");
        pb.finish_and_clear();
        assert!(pb.is_finished());
    }
}
