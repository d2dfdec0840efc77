// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Graph command - visualize stage dependencies

use miette::Result;

use super::{into_report, load_config, load_stage_map, GlobalOpts, GraphFormat};
use crate::stages::StageGraph;

/// Run the graph command
pub async fn run(opts: GlobalOpts, format: GraphFormat) -> Result<()> {
    let config = load_config(&opts).map_err(into_report)?;
    let stages = load_stage_map(&config).map_err(into_report)?;

    let graph = StageGraph::build(&stages);

    let output = match format {
        GraphFormat::Text => graph.to_text(&stages),
        GraphFormat::Dot => graph.to_dot(&stages),
        GraphFormat::Mermaid => graph.to_mermaid(&stages),
    };

    print!("{}", output);

    Ok(())
}
