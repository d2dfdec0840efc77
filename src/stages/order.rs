// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Dependency ordering for stages
//!
//! Orders are adjusted with a bounded relaxation pass rather than a
//! topological sort: a stage only moves when it is not already after all
//! of its dependencies, and then only to `max(dependency orders) + 1`.
//! Hand-picked order numbers therefore survive wherever they are already
//! consistent.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};

use super::StageMap;
use crate::errors::StagehandError;

/// Passes allowed before resolution is declared unresolvable
pub const MAX_ORDER_PASSES: usize = 10;

/// Raise stage orders until every stage sorts after its dependencies
///
/// Returns the number of passes used. Dependencies on unknown stages are
/// logged and ignored.
pub fn resolve_order(stages: &mut StageMap) -> Result<usize, StagehandError> {
    let ids: Vec<String> = stages.iter().map(|s| s.id.clone()).collect();
    let mut moved = BTreeSet::new();

    for pass in 1..=MAX_ORDER_PASSES {
        moved.clear();

        for id in &ids {
            let Some(stage) = stages.get(id) else {
                continue;
            };
            if stage.dependencies.is_empty() {
                continue;
            }

            let mut max_dep: Option<i64> = None;
            for dep in &stage.dependencies {
                match stages.get(dep) {
                    Some(d) => max_dep = Some(max_dep.map_or(d.order, |m| m.max(d.order))),
                    None if pass == 1 => {
                        tracing::error!(stage = %id, dependency = %dep, "dependency not found, ignoring");
                    }
                    None => {}
                }
            }

            let Some(max_dep) = max_dep else {
                continue;
            };

            if max_dep >= stage.order {
                let Some(next) = max_dep.checked_add(1) else {
                    tracing::error!(stage = %id, order = max_dep, "dependency order has no successor");
                    return Err(StagehandError::UnresolvedDependencies {
                        passes: pass,
                        stages: vec![id.clone()],
                    });
                };
                if let Some(stage) = stages.get_mut(id) {
                    tracing::debug!(stage = %id, from = stage.order, to = next, "raising stage order");
                    stage.order = next;
                }
                moved.insert(id.clone());
            }
        }

        if moved.is_empty() {
            return Ok(pass);
        }
    }

    let cycle = StageGraph::build(stages).cycle_members();
    let stages = if cycle.is_empty() {
        moved.into_iter().collect()
    } else {
        cycle
    };

    Err(StagehandError::UnresolvedDependencies {
        passes: MAX_ORDER_PASSES,
        stages,
    })
}

/// Dependency graph over known stages, used for diagnostics and rendering
pub struct StageGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl StageGraph {
    /// Build the graph; edges to unknown stages are dropped
    pub fn build(stages: &StageMap) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for stage in stages.iter() {
            let node = graph.add_node(stage.id.clone());
            index.insert(stage.id.clone(), node);
        }

        for stage in stages.iter() {
            let to = index[&stage.id];
            for dep in &stage.dependencies {
                if let Some(&from) = index.get(dep) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self { graph, index }
    }

    /// Stage ids that sit on a dependency cycle, sorted
    pub fn cycle_members(&self) -> Vec<String> {
        let mut members: Vec<String> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| self.graph.contains_edge(n, n))
            })
            .flatten()
            .map(|n| self.graph[n].clone())
            .collect();
        members.sort();
        members
    }

    /// Direct dependencies of a stage
    pub fn dependencies(&self, id: &str) -> Option<Vec<String>> {
        self.neighbors(id, petgraph::Direction::Incoming)
    }

    /// Stages that depend directly on `id`
    pub fn dependents(&self, id: &str) -> Option<Vec<String>> {
        self.neighbors(id, petgraph::Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: petgraph::Direction) -> Option<Vec<String>> {
        let node = self.index.get(id)?;
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(*node, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        names.sort();
        Some(names)
    }

    /// Generate Mermaid diagram
    pub fn to_mermaid(&self, stages: &StageMap) -> String {
        let mut out = String::from("graph TD\n");

        for stage in stages.all_ordered() {
            out.push_str(&format!("    {}[\"{} ({})\"]\n", stage.id, stage.id, stage.order));
        }

        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    {} --> {}\n",
                self.graph[edge.source()],
                self.graph[edge.target()]
            ));
        }

        out
    }

    /// Generate DOT diagram
    pub fn to_dot(&self, stages: &StageMap) -> String {
        let mut out = String::from("digraph stages {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for stage in stages.all_ordered() {
            let style = if stage.manual { ", style=dashed" } else { "" };
            out.push_str(&format!(
                "    \"{}\" [label=\"{}\\n{}\"{}];\n",
                stage.id, stage.id, stage.order, style
            ));
        }

        out.push('\n');
        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                self.graph[edge.source()],
                self.graph[edge.target()]
            ));
        }

        out.push_str("}\n");
        out
    }

    /// Generate text listing of the execution order
    pub fn to_text(&self, stages: &StageMap) -> String {
        let mut out = String::new();

        for (i, stage) in stages.stages_ordered().iter().enumerate() {
            let deps = self.dependencies(&stage.id).unwrap_or_default();

            out.push_str(&format!("{}. {} ({})", i + 1, stage.id, stage.order));

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }
            if stage.disabled {
                out.push_str(" [disabled]");
            }

            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Stage;

    fn map(stages: Vec<Stage>) -> StageMap {
        stages.into_iter().collect()
    }

    #[test]
    fn test_raises_orders_past_dependencies() {
        let mut stages = map(vec![
            Stage::new("root", 100),
            Stage::new("stage1", 100).depends_on("root"),
            Stage::new("stage2", 100),
            Stage::new("stage3", 100)
                .depends_on("stage1")
                .depends_on("stage2"),
        ]);

        resolve_order(&mut stages).unwrap();

        assert_eq!(stages.get("root").unwrap().order, 100);
        assert_eq!(stages.get("stage1").unwrap().order, 101);
        assert_eq!(stages.get("stage2").unwrap().order, 100);
        assert_eq!(stages.get("stage3").unwrap().order, 102);
    }

    #[test]
    fn test_consistent_orders_are_untouched() {
        let mut stages = map(vec![
            Stage::new("a", 10),
            Stage::new("b", 50).depends_on("a"),
        ]);

        let passes = resolve_order(&mut stages).unwrap();

        assert_eq!(passes, 1);
        assert_eq!(stages.get("b").unwrap().order, 50);
    }

    #[test]
    fn test_every_stage_sorts_after_its_dependencies() {
        let mut stages = map(vec![
            Stage::new("d", 0).depends_on("c"),
            Stage::new("c", 0).depends_on("b"),
            Stage::new("b", 0).depends_on("a"),
            Stage::new("a", 5),
        ]);

        resolve_order(&mut stages).unwrap();

        for stage in stages.iter() {
            for dep in &stage.dependencies {
                assert!(stage.order > stages.get(dep).unwrap().order);
            }
        }
    }

    #[test]
    fn test_missing_dependency_is_ignored() {
        let mut stages = map(vec![Stage::new("a", 3).depends_on("ghost")]);

        resolve_order(&mut stages).unwrap();

        assert_eq!(stages.get("a").unwrap().order, 3);
    }

    #[test]
    fn test_manual_dependency_still_counts() {
        let mut stages = map(vec![
            Stage::new("bootstrap", 50).manual(),
            Stage::new("app", 1).depends_on("bootstrap"),
        ]);

        resolve_order(&mut stages).unwrap();

        assert_eq!(stages.get("app").unwrap().order, 51);
    }

    #[test]
    fn test_cycle_fails_after_bounded_passes() {
        let mut stages = map(vec![
            Stage::new("a", 1).depends_on("b"),
            Stage::new("b", 1).depends_on("a"),
            Stage::new("c", 1),
        ]);

        let err = resolve_order(&mut stages).unwrap_err();

        match err {
            StagehandError::UnresolvedDependencies { passes, stages } => {
                assert_eq!(passes, MAX_ORDER_PASSES);
                assert_eq!(stages, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(StagehandError::UnresolvedDependencies {
            passes: 0,
            stages: vec![]
        }
        .is_fatal());
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut stages = map(vec![Stage::new("loop", 1).depends_on("loop")]);

        let err = resolve_order(&mut stages).unwrap_err();
        assert!(matches!(
            err,
            StagehandError::UnresolvedDependencies { ref stages, .. } if stages == &vec!["loop".to_string()]
        ));
    }

    #[test]
    fn test_order_past_maximum_is_unresolved() {
        let mut stages = map(vec![
            Stage::new("last", i64::MAX),
            Stage::new("after", 0).depends_on("last"),
        ]);

        let err = resolve_order(&mut stages).unwrap_err();
        assert!(matches!(
            err,
            StagehandError::UnresolvedDependencies { passes: 1, ref stages } if stages == &vec!["after".to_string()]
        ));
        assert_eq!(stages.get("after").unwrap().order, 0);
    }

    #[test]
    fn test_graph_renderings() {
        let mut stages = map(vec![Stage::new("a", 1), Stage::new("b", 1).depends_on("a")]);
        resolve_order(&mut stages).unwrap();

        let graph = StageGraph::build(&stages);

        assert_eq!(graph.dependencies("b").unwrap(), vec!["a"]);
        assert_eq!(graph.dependents("a").unwrap(), vec!["b"]);
        assert!(graph.to_mermaid(&stages).contains("a --> b"));
        assert!(graph.to_dot(&stages).contains("\"a\" -> \"b\";"));
        assert_eq!(graph.to_text(&stages), "1. a (1)\n2. b (2) [depends: a]\n");
    }
}
