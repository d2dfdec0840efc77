// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Validate command - check platform config and stage declarations

use colored::Colorize;
use miette::Result;

use super::{into_report, load_config, stage_loader, GlobalOpts};
use crate::errors::RecoverySuggestion;
use crate::stages::{resolve_order, StageValidator};
use crate::utils::{print_error, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(opts: GlobalOpts) -> Result<()> {
    println!("{}", "Validating stages...".bold());
    println!();

    let config = match load_config(&opts) {
        Ok(config) => config,
        Err(e) => {
            print_error("Failed to load platform config");
            println!();
            return Err(into_report(e));
        }
    };
    print_success("Platform config is valid");

    let mut stages = stage_loader(&config).discover().map_err(into_report)?;
    print_success(&format!(
        "Discovered {} stages from {} roots",
        stages.len(),
        config.stage_roots.len()
    ));

    let mut validation = StageValidator::validate(&stages);

    let mut suggestion = None;
    match resolve_order(&mut stages) {
        Ok(passes) => print_success(&format!("Dependencies resolved in {} passes", passes)),
        Err(e) => {
            suggestion = RecoverySuggestion::for_error(&e);
            validation.add_error(&e.to_string());
        }
    }

    if !validation.errors.is_empty() {
        print_section("Errors");
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !validation.warnings.is_empty() {
        print_section("Warnings");
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if let Some(suggestion) = suggestion {
        println!();
        println!("{}", suggestion);
    }

    if opts.verbose {
        print_section("Execution order");
        for (i, stage) in stages.stages_ordered().iter().enumerate() {
            let groups = if stage.checks.is_empty() {
                String::new()
            } else {
                let names: Vec<&str> = stage.checks.keys().map(String::as_str).collect();
                format!(" [checks: {}]", names.join(", "))
            };
            println!("  {}. {} ({}){}", i + 1, stage.id, stage.order, groups.dimmed());
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Stage validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Stages are valid but have warnings.".yellow().bold());
    } else {
        println!("{}", "Stages are valid!".green().bold());
    }
    Ok(())
}
