// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Stages command - list stages in execution order

use colored::Colorize;
use miette::Result;

use super::{into_report, load_config, load_stage_map, GlobalOpts};
use crate::stages::Stage;
use crate::utils::{print_header, print_warning};

/// Run the stages command
pub async fn run(opts: GlobalOpts, all: bool) -> Result<()> {
    let config = load_config(&opts).map_err(into_report)?;
    let stages = load_stage_map(&config).map_err(into_report)?;

    let listed = if all {
        stages.all_ordered()
    } else {
        stages.stages_ordered()
    };

    if listed.is_empty() {
        print_warning("No stages found. Add a stage root with --root or 'stage_roots' in the config.");
        return Ok(());
    }

    print_header("Stages");
    for stage in listed {
        println!("  {}", describe(stage));

        if opts.verbose {
            if let Some(ref description) = stage.description {
                println!("        {}", description.dimmed());
            }
            println!("        {}", stage.path.display().to_string().dimmed());
        }
    }

    Ok(())
}

fn describe(stage: &Stage) -> String {
    let mut line = format!("{:>6}  {}", stage.order, stage.id.bold());

    if !stage.dependencies.is_empty() {
        let deps: Vec<&str> = stage.dependencies.iter().map(String::as_str).collect();
        line.push_str(&format!(" [depends: {}]", deps.join(", ")).dimmed().to_string());
    }
    if !stage.checks.is_empty() {
        line.push_str(&format!(" ({} check groups)", stage.checks.len()).dimmed().to_string());
    }
    if stage.manual {
        line.push_str(&format!(" {}", "manual".cyan()));
    }
    if stage.disabled {
        line.push_str(&format!(" {}", "disabled".yellow()));
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_flags() {
        colored::control::set_override(false);

        let stage = Stage::new("ingress", 300).depends_on("dns").manual();
        assert_eq!(describe(&stage), "   300  ingress [depends: dns] manual");
    }
}
