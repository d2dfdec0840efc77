// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Insertion-ordered stage collection

use std::collections::HashMap;

use super::Stage;

/// Stages keyed by id, remembering the order they were first seen
#[derive(Debug, Clone, Default)]
pub struct StageMap {
    stages: Vec<Stage>,
    index: HashMap<String, usize>,
}

impl StageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a stage, replacing any stage with the same id in place
    ///
    /// Returns the replaced stage.
    pub fn insert(&mut self, stage: Stage) -> Option<Stage> {
        match self.index.get(&stage.id) {
            Some(&idx) => Some(std::mem::replace(&mut self.stages[idx], stage)),
            None => {
                self.index.insert(stage.id.clone(), self.stages.len());
                self.stages.push(stage);
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Stage> {
        self.index.get(id).map(|&idx| &self.stages[idx])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Stage> {
        self.index.get(id).map(|&idx| &mut self.stages[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }

    /// Non-manual stages sorted by order
    ///
    /// The sort is stable, so equal orders keep insertion order.
    pub fn stages_ordered(&self) -> Vec<&Stage> {
        let mut ordered: Vec<&Stage> = self.stages.iter().filter(|s| !s.manual).collect();
        ordered.sort_by_key(|s| s.order);
        ordered
    }

    /// All stages sorted by order, manual ones included
    pub fn all_ordered(&self) -> Vec<&Stage> {
        let mut ordered: Vec<&Stage> = self.stages.iter().collect();
        ordered.sort_by_key(|s| s.order);
        ordered
    }
}

impl FromIterator<Stage> for StageMap {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        let mut map = Self::new();
        for stage in iter {
            map.insert(stage);
        }
        map
    }
}

impl IntoIterator for StageMap {
    type Item = Stage;
    type IntoIter = std::vec::IntoIter<Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_keeps_position() {
        let mut map: StageMap = vec![Stage::new("a", 1), Stage::new("b", 2)]
            .into_iter()
            .collect();

        let old = map.insert(Stage::new("a", 5));
        assert_eq!(old.unwrap().order, 1);
        assert_eq!(map.ids(), vec!["a", "b"]);
        assert_eq!(map.get("a").unwrap().order, 5);
    }

    #[test]
    fn test_manual_stages_are_not_ordered() {
        let map: StageMap = vec![
            Stage::new("a", 1),
            Stage::new("hidden", 0).manual(),
            Stage::new("b", 2),
        ]
        .into_iter()
        .collect();

        let ids: Vec<_> = map.stages_ordered().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(map.get("hidden").is_some());
        assert_eq!(map.all_ordered()[0].id, "hidden");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let map: StageMap = vec![
            Stage::new("z", 10),
            Stage::new("y", 5),
            Stage::new("x", 10),
        ]
        .into_iter()
        .collect();

        let ids: Vec<_> = map.stages_ordered().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "z", "x"]);
    }
}
