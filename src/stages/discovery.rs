// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Stage discovery from directory trees
//!
//! Every immediate subdirectory of a stage root is one stage, named
//! `<order>-<id>`. A `stage.yaml` inside the directory overrides the
//! defaults derived from the name.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::{resolve_order, Stage, StageMap};
use crate::errors::StagehandError;

/// Split a directory name into `(order, id)`
///
/// On failure the error carries the id to fall back to, and the stage
/// gets order `-1`.
pub fn parse_stage_dir_name(name: &str) -> Result<(i64, String), StagehandError> {
    let Some((prefix, id)) = name.split_once('-') else {
        return Err(StagehandError::InvalidStageName {
            name: name.to_string(),
            id: name.to_string(),
            reason: "missing '-' separator".to_string(),
        });
    };

    prefix
        .parse::<i64>()
        .map(|order| (order, id.to_string()))
        .map_err(|e| StagehandError::InvalidStageName {
            name: name.to_string(),
            id: id.to_string(),
            reason: format!("order prefix '{}' is not an integer: {}", prefix, e),
        })
}

/// Build the stage for one directory
///
/// Naming and descriptor problems are logged and defaulted around.
pub fn stage_from_dir(dir: &Path) -> Stage {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let (order, id) = match parse_stage_dir_name(&name) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), "{}", err);
            let id = match err {
                StagehandError::InvalidStageName { id, .. } => id,
                _ => name.clone(),
            };
            (-1, id)
        }
    };

    let mut stage = Stage::new(id, order);
    stage.path = dir.to_path_buf();

    let mut overlaid = stage.clone();
    match overlaid.apply_descriptor_file(dir) {
        Ok(true) => {
            tracing::debug!(stage = %overlaid.id, "applied stage descriptor");
            overlaid
        }
        Ok(false) => stage,
        Err(err) => {
            tracing::warn!(stage = %stage.id, "{}", err);
            stage
        }
    }
}

/// Discover the stages under one root, sorted by directory name
pub fn discover_root(root: &Path) -> Result<StageMap, StagehandError> {
    let unreadable = |e: std::io::Error| StagehandError::StageRootUnreadable {
        path: root.to_path_buf(),
        error: e.to_string(),
    };

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .map_err(unreadable)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let stages: StageMap = dirs.iter().map(|dir| stage_from_dir(dir)).collect();
    tracing::debug!(root = %root.display(), count = stages.len(), "discovered stages");

    Ok(stages)
}

/// Merge `incoming` into `target`
///
/// Stages already present keep their `manual` and `disabled` flags; every
/// other field comes from the incoming definition.
pub fn merge_stages(target: &mut StageMap, incoming: StageMap) {
    for mut stage in incoming {
        if let Some(existing) = target.get(&stage.id) {
            stage.manual = existing.manual;
            stage.disabled = existing.disabled;
        }
        target.insert(stage);
    }
}

/// Builder that discovers, merges and orders stages
#[derive(Debug, Default)]
pub struct StageLoader {
    base: StageMap,
    roots: Vec<PathBuf>,
    dependencies: HashMap<String, BTreeSet<String>>,
}

impl StageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed stages; their flags win over rediscovered definitions
    pub fn base(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        for stage in stages {
            self.base.insert(stage);
        }
        self
    }

    /// Add a root; later roots override earlier ones
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn roots<P: Into<PathBuf>>(mut self, roots: impl IntoIterator<Item = P>) -> Self {
        self.roots.extend(roots.into_iter().map(Into::into));
        self
    }

    /// Extra dependency edges, unioned into the merged stages
    pub fn dependencies<I, S>(mut self, deps: HashMap<String, I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (id, list) in deps {
            self.dependencies
                .entry(id)
                .or_default()
                .extend(list.into_iter().map(Into::into));
        }
        self
    }

    /// Discover, merge and order
    ///
    /// Fails on an unreadable root or when dependencies cannot be resolved.
    pub fn load(self) -> Result<StageMap, StagehandError> {
        let mut stages = self.discover()?;

        let passes = resolve_order(&mut stages)?;
        tracing::debug!(passes, stages = stages.len(), "stage order resolved");

        Ok(stages)
    }

    /// Discover and merge without ordering
    pub fn discover(self) -> Result<StageMap, StagehandError> {
        let mut stages = self.base;

        for root in &self.roots {
            let discovered = discover_root(root)?;
            merge_stages(&mut stages, discovered);
        }

        for (id, deps) in self.dependencies {
            match stages.get_mut(&id) {
                Some(stage) => stage.dependencies.extend(deps),
                None => tracing::warn!(stage = %id, "dependencies declared for unknown stage"),
            }
        }

        Ok(stages)
    }
}

/// Load stages from `roots` on top of `base`
pub fn load_stages<P: AsRef<Path>>(
    base: impl IntoIterator<Item = Stage>,
    roots: &[P],
) -> Result<StageMap, StagehandError> {
    StageLoader::new()
        .base(base)
        .roots(roots.iter().map(|r| r.as_ref().to_path_buf()))
        .load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_root(dirs: &[(&str, Option<&str>)]) -> TempDir {
        let root = TempDir::new().unwrap();
        for (name, descriptor) in dirs {
            let dir = root.path().join(name);
            fs::create_dir_all(&dir).unwrap();
            if let Some(yaml) = descriptor {
                fs::write(dir.join(super::super::DESCRIPTOR_FILE), yaml).unwrap();
            }
        }
        root
    }

    #[test]
    fn test_parse_valid_name() {
        assert_eq!(
            parse_stage_dir_name("101-foobar").unwrap(),
            (101, "foobar".to_string())
        );
        assert_eq!(
            parse_stage_dir_name("5-cert-manager").unwrap(),
            (5, "cert-manager".to_string())
        );
    }

    #[test]
    fn test_parse_name_without_separator() {
        let err = parse_stage_dir_name("foobar").unwrap_err();
        assert!(matches!(err, StagehandError::InvalidStageName { ref id, .. } if id == "foobar"));
    }

    #[test]
    fn test_parse_name_with_bad_prefix() {
        let err = parse_stage_dir_name("bad-foobar").unwrap_err();
        assert!(matches!(err, StagehandError::InvalidStageName { ref id, .. } if id == "foobar"));
    }

    #[test]
    fn test_unparseable_dir_defaults_to_minus_one() {
        let root = make_root(&[("foobar", None)]);
        let stage = stage_from_dir(&root.path().join("foobar"));
        assert_eq!(stage.id, "foobar");
        assert_eq!(stage.order, -1);
    }

    #[test]
    fn test_discover_root_reads_descriptors() {
        let root = make_root(&[
            ("10-network", None),
            ("20-ingress", Some("dependencies: [network]\ndescription: edge\n")),
        ]);
        fs::write(root.path().join("README.md"), "ignored").unwrap();

        let stages = discover_root(root.path()).unwrap();

        assert_eq!(stages.ids(), vec!["network", "ingress"]);
        let ingress = stages.get("ingress").unwrap();
        assert_eq!(ingress.order, 20);
        assert_eq!(ingress.description.as_deref(), Some("edge"));
        assert!(ingress.dependencies.contains("network"));
        assert_eq!(ingress.path, root.path().join("20-ingress"));
    }

    #[test]
    fn test_malformed_descriptor_keeps_defaults() {
        let root = make_root(&[("30-broken", Some("order: [not, a, number"))]);

        let stages = discover_root(root.path()).unwrap();

        let broken = stages.get("broken").unwrap();
        assert_eq!(broken.order, 30);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let err = discover_root(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_merge_preserves_operational_flags() {
        let mut existing = Stage::new("dns", 10);
        existing.manual = true;
        existing.disabled = true;
        let mut target: StageMap = vec![existing].into_iter().collect();

        let mut incoming = Stage::new("dns", 40);
        incoming.description = Some("rediscovered".into());
        merge_stages(&mut target, vec![incoming].into_iter().collect());

        let dns = target.get("dns").unwrap();
        assert!(dns.manual);
        assert!(dns.disabled);
        assert_eq!(dns.order, 40);
        assert_eq!(dns.description.as_deref(), Some("rediscovered"));
    }

    #[test]
    fn test_later_roots_override_fields() {
        let first = make_root(&[("10-monitoring", Some("description: first\n"))]);
        let second = make_root(&[("15-monitoring", Some("description: second\n"))]);

        let stages = load_stages(Vec::new(), &[first.path(), second.path()]).unwrap();

        let monitoring = stages.get("monitoring").unwrap();
        assert_eq!(monitoring.order, 15);
        assert_eq!(monitoring.description.as_deref(), Some("second"));
    }

    #[test]
    fn test_loader_base_flags_and_extra_dependencies() {
        let root = make_root(&[("10-network", None), ("10-storage", Some("manual: false\n"))]);

        let mut base = Stage::new("storage", 0);
        base.manual = true;

        let mut deps = HashMap::new();
        deps.insert("network".to_string(), vec!["storage"]);

        let stages = StageLoader::new()
            .base(vec![base])
            .root(root.path())
            .dependencies(deps)
            .load()
            .unwrap();

        assert!(stages.get("storage").unwrap().manual);
        assert_eq!(stages.get("network").unwrap().order, 11);
        let ordered: Vec<_> = stages.stages_ordered().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ordered, vec!["network"]);
    }

    #[test]
    fn test_loader_aborts_on_cycle() {
        let root = make_root(&[
            ("10-a", Some("dependencies: [b]\n")),
            ("10-b", Some("dependencies: [a]\n")),
        ]);

        let err = load_stages(Vec::new(), &[root.path()]).unwrap_err();
        assert!(matches!(err, StagehandError::UnresolvedDependencies { .. }));

        // Discovery alone still succeeds so the stages can be inspected
        let stages = StageLoader::new().root(root.path()).discover().unwrap();
        assert_eq!(stages.len(), 2);
    }
}
