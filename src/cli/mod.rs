// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for stagehand.

pub mod checks;
pub mod graph;
pub mod stages;
pub mod validate;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::config::{PlatformConfig, DEFAULT_CONFIG_FILE};
use crate::errors::{RecoverySuggestion, StagehandError, StagehandResult};
use crate::stages::{StageLoader, StageMap};

/// Stage ordering and boundary checks for platform provisioning
#[derive(Parser, Debug)]
#[clap(
    name = "stagehand",
    version,
    about = "Stage ordering and pre/post-event checks for platform provisioning",
    long_about = None,
    after_help = "Examples:\n\
        stagehand stages                         List stages in execution order\n\
        stagehand graph --format mermaid         Show the stage dependency graph\n\
        stagehand validate                       Check stage declarations\n\
        stagehand checks ingress --after apply   Run the checks that follow 'apply'\n\n\
        See 'stagehand <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    #[clap(flatten)]
    pub global: GlobalOpts,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Platform config file
    #[clap(short, long, global = true, env = "STAGEHAND_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// DNS domain for HTTP checks that name an application
    #[clap(long, global = true, env = "STAGEHAND_DNS_DOMAIN", value_name = "DOMAIN")]
    pub dns_domain: Option<String>,

    /// kubectl binary (default: found on PATH)
    #[clap(long, global = true, env = "STAGEHAND_KUBECTL", value_name = "PATH")]
    pub kubectl: Option<PathBuf>,

    /// kubeconfig context for cluster checks (default: current context)
    #[clap(long, global = true, env = "STAGEHAND_KUBE_CONTEXT", value_name = "NAME")]
    pub kube_context: Option<String>,

    /// Additional stage root, applied after configured roots
    #[clap(short, long = "root", global = true, value_name = "DIR")]
    pub roots: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List stages in execution order
    Stages {
        /// Include manual stages
        #[clap(short, long)]
        all: bool,
    },

    /// Show stage dependencies as a graph
    Graph {
        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Validate stage declarations
    Validate,

    /// Run the checks a stage declares around an event
    #[clap(group(ArgGroup::new("phase").required(true).args(["before", "after"])))]
    Checks {
        /// Stage id
        stage: String,

        /// Run the checks that fire before this event
        #[clap(long, value_name = "EVENT")]
        before: Option<String>,

        /// Run the checks that fire after this event
        #[clap(long, value_name = "EVENT")]
        after: Option<String>,
    },
}

/// Graph output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Load the platform config with command-line overrides applied
///
/// Without `--config`, `stagehand.yaml` in the working directory is used
/// when present; otherwise defaults apply.
pub fn load_config(opts: &GlobalOpts) -> StagehandResult<PlatformConfig> {
    let config = match opts.config {
        Some(ref path) => PlatformConfig::from_file(path)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                PlatformConfig::from_file(default)?
            } else {
                tracing::debug!("no config file, using defaults");
                PlatformConfig::default()
            }
        }
    };

    let config = config.with_overrides(opts.dns_domain.clone(), opts.roots.clone());
    config.validate()?;
    Ok(config)
}

/// Loader for the stages the config points at
pub fn stage_loader(config: &PlatformConfig) -> StageLoader {
    StageLoader::new()
        .base(config.stages.iter().cloned())
        .roots(config.stage_roots.iter().cloned())
        .dependencies(config.dependencies.clone())
}

/// Discover, merge and order the stages the config points at
pub fn load_stage_map(config: &PlatformConfig) -> StagehandResult<StageMap> {
    stage_loader(config).load()
}

/// Turn an error into a report, printing a recovery suggestion when one applies
pub fn into_report(error: StagehandError) -> miette::Report {
    if let Some(suggestion) = RecoverySuggestion::for_error(&error) {
        eprintln!("{}", suggestion);
    }
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_checks_needs_a_phase() {
        assert!(Cli::try_parse_from(["stagehand", "checks", "ingress"]).is_err());
        assert!(Cli::try_parse_from([
            "stagehand", "checks", "ingress", "--before", "apply", "--after", "apply"
        ])
        .is_err());

        let cli = Cli::try_parse_from(["stagehand", "checks", "ingress", "--after", "apply"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Checks { after: Some(ref e), before: None, .. } if e == "apply"
        ));
    }

    #[test]
    fn test_roots_are_repeatable() {
        let cli = Cli::try_parse_from(["stagehand", "stages", "-r", "a", "--root", "b"]).unwrap();
        assert_eq!(cli.global.roots, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn test_graph_format_parsing() {
        let cli = Cli::try_parse_from(["stagehand", "graph", "--format", "mermaid"]).unwrap();
        assert!(matches!(cli.command, Commands::Graph { format: GraphFormat::Mermaid }));
        assert!(Cli::try_parse_from(["stagehand", "graph", "-f", "svg"]).is_err());
    }
}
