use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::TreeStore;
use checktree_core::{NodeSpec, Result, Subtree};

/// A seed file holds either one tree or a list of trees.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Many(Vec<NodeSpec>),
    One(NodeSpec),
}

pub fn parse_seed(json: &str) -> Result<Vec<NodeSpec>> {
    let specs = match serde_json::from_str::<SeedFile>(json)? {
        SeedFile::Many(specs) => specs,
        SeedFile::One(spec) => vec![spec],
    };
    for spec in &specs {
        spec.validate()?;
    }
    Ok(specs)
}

pub fn read_seed_file<P: AsRef<Path>>(path: P) -> Result<Vec<NodeSpec>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    parse_seed(&raw)
}

impl TreeStore {
    /// Imports every tree in `path`. Each tree is its own transaction.
    pub fn seed_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Subtree>> {
        let path = path.as_ref();
        let specs = read_seed_file(path)?;
        let imported = specs
            .iter()
            .map(|spec| self.import(spec))
            .collect::<Result<Vec<_>>>()?;
        info!(path = %path.display(), trees = imported.len(), "seeded tree store");
        Ok(imported)
    }

    /// Seeds from `path` only when the store holds no nodes yet.
    pub fn seed_if_empty<P: AsRef<Path>>(&self, path: P) -> Result<Option<Vec<Subtree>>> {
        if self.count()? > 0 {
            return Ok(None);
        }
        self.seed_from_file(path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checktree_core::{CheckTreeError, NodeKind, Status};

    #[test]
    fn parses_single_tree_and_list() {
        let one = parse_seed(r#"{"type":"ROOT","name":"a"}"#).unwrap();
        assert_eq!(one.len(), 1);

        let many = parse_seed(
            r#"[{"type":"ROOT","name":"a"},{"type":"ROOT","name":"b","children":[{"type":"CHECK","name":"c","status":"PASS"}]}]"#,
        )
        .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].children[0].status, Some(Status::Pass));
    }

    #[test]
    fn rejects_unknown_status_and_bad_shape() {
        assert!(matches!(
            parse_seed(r#"{"type":"ROOT","name":"a","status":"MAYBE"}"#),
            Err(CheckTreeError::Serialization(_))
        ));
        assert!(matches!(
            parse_seed(r#"{"type":"CHECK","name":"a"}"#),
            Err(CheckTreeError::InvalidTree(_))
        ));
    }

    #[test]
    fn seed_if_empty_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"{"type":"ROOT","name":"run","children":[{"type":"CHECK","name":"lint","status":"FAIL"}]}"#,
        )
        .unwrap();

        let store = TreeStore::open_in_memory().unwrap();
        let first = store.seed_if_empty(&path).unwrap().unwrap();
        assert_eq!(first[0].root().kind, NodeKind::Root);
        assert_eq!(first[0].node_count(), 2);

        assert!(store.seed_if_empty(&path).unwrap().is_none());
        assert_eq!(store.count().unwrap(), 2);
    }
}
