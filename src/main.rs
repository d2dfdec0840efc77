// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! stagehand - stage ordering and boundary checks
//!
//! Discover provisioning stages, order them by dependency and run the checks
//! they declare around lifecycle events.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stagehand::checks::EventPhase;
use stagehand::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.global.verbose {
        "stagehand=debug"
    } else {
        "stagehand=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Stages { all } => stagehand::cli::stages::run(cli.global, all).await,
        Commands::Graph { format } => stagehand::cli::graph::run(cli.global, format).await,
        Commands::Validate => stagehand::cli::validate::run(cli.global).await,
        Commands::Checks {
            stage,
            before,
            after,
        } => {
            let (phase, event) = match (before, after) {
                (Some(event), _) => (EventPhase::Before, event),
                (None, Some(event)) => (EventPhase::After, event),
                (None, None) => return Err(miette::miette!("Pass --before or --after")),
            };
            stagehand::cli::checks::run(cli.global, stage, phase, event).await
        }
    }
}
