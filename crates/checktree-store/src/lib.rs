//! SQLite persistence for check trees.
//!
//! [`TreeStore`] owns a single connection behind a mutex. Every call takes
//! the lock for its whole unit of work, and writes run inside an immediate
//! transaction, so overrides on the same tree are applied one at a time and
//! a failed override leaves nothing behind.

mod rows;
pub mod schema;
mod seed;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, instrument};

use checktree_core::{
    override_status, CheckTreeError, NewNode, Node, NodeId, NodeKind, NodeSpec, PropagationReport,
    Result, Status, Subtree,
};

pub use rows::SqliteNodes;
pub use seed::{parse_seed, read_seed_file};

pub(crate) fn db_err(err: rusqlite::Error) -> CheckTreeError {
    CheckTreeError::Database(err.to_string())
}

/// Result of a status override: the target's refreshed subtree and the
/// writes made on the way up.
#[derive(Debug, Clone)]
pub struct Override {
    pub subtree: Subtree,
    pub report: PropagationReport,
}

#[derive(Clone)]
pub struct TreeStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for TreeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeStore").finish_non_exhaustive()
    }
}

impl TreeStore {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(db_err)?;
        info!(path = %path.display(), journal_mode = %mode, "opened tree store");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(db_err)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Cheap round trip used by health checks.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(db_err)?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(n as usize)
    }

    pub fn get(&self, id: NodeId) -> Result<Node> {
        let conn = self.conn.lock();
        rows::find_node(&conn, id)?.ok_or(CheckTreeError::NodeNotFound(id))
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<Node>> {
        let conn = self.conn.lock();
        rows::find_children(&conn, id)
    }

    pub fn roots(&self) -> Result<Vec<Node>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM nodes WHERE type = ?1 ORDER BY id",
                rows::NODE_COLUMNS
            ))
            .map_err(db_err)?;
        let nodes = stmt
            .query_map(params![NodeKind::Root.as_str()], rows::node_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(nodes)
    }

    /// The node `id` with its whole subtree.
    #[instrument(skip(self))]
    pub fn subtree(&self, id: NodeId) -> Result<Subtree> {
        let conn = self.conn.lock();
        rows::load_subtree(&conn, id)
    }

    /// A uniformly random ROOT with its whole subtree.
    #[instrument(skip(self))]
    pub fn random_root(&self) -> Result<Subtree> {
        let conn = self.conn.lock();
        let id: Option<NodeId> = conn
            .query_row(
                "SELECT id FROM nodes WHERE type = ?1 ORDER BY RANDOM() LIMIT 1",
                params![NodeKind::Root.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        let id = id.ok_or(CheckTreeError::NoRoot)?;
        debug!(root = id, "picked random root");
        rows::load_subtree(&conn, id)
    }

    pub fn insert(&self, new: NewNode) -> Result<Node> {
        let conn = self.conn.lock();
        rows::insert_node(&conn, &new)
    }

    /// Imports a nested tree in one transaction and returns it as stored.
    #[instrument(skip(self, spec), fields(root = %spec.name))]
    pub fn import(&self, spec: &NodeSpec) -> Result<Subtree> {
        spec.validate()?;
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let root = rows::insert_node(
            &tx,
            &NewNode {
                kind: spec.kind,
                name: spec.name.clone(),
                status: spec.status,
                reason: spec.reason.clone(),
                parent_id: None,
            },
        )?;
        let mut queue: std::collections::VecDeque<(NodeId, &NodeSpec)> =
            spec.children.iter().map(|c| (root.id, c)).collect();
        while let Some((parent_id, child)) = queue.pop_front() {
            let stored = rows::insert_node(
                &tx,
                &NewNode {
                    kind: child.kind,
                    name: child.name.clone(),
                    status: child.status,
                    reason: child.reason.clone(),
                    parent_id: Some(parent_id),
                },
            )?;
            queue.extend(child.children.iter().map(|c| (stored.id, c)));
        }
        let subtree = rows::load_subtree(&tx, root.id)?;
        tx.commit().map_err(db_err)?;
        info!(root = root.id, nodes = subtree.node_count(), "imported tree");
        Ok(subtree)
    }

    /// Sets `id` to `status`, propagates up to its ROOT and commits
    /// everything as one transaction.
    #[instrument(skip(self))]
    pub fn override_status(&self, id: NodeId, status: Status) -> Result<Override> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let report = {
            let mut nodes = SqliteNodes::new(&tx);
            override_status(&mut nodes, id, status)?
        };
        let subtree = rows::load_subtree(&tx, id)?;
        tx.commit().map_err(db_err)?;
        info!(
            node = id,
            %status,
            path = report.changes.len(),
            changed = report.changed_ids().len(),
            "status overridden"
        );
        Ok(Override { subtree, report })
    }

    /// Deletes `id` and, by cascade, its whole subtree. Returns the number of
    /// nodes removed.
    #[instrument(skip(self))]
    pub fn delete(&self, id: NodeId) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let removed = rows::load_subtree(&tx, id)?.node_count();
        tx.execute("DELETE FROM nodes WHERE id = ?1", params![id])
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        info!(node = id, removed, "deleted subtree");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ROOT(1) -> CHECK(2, FAIL) -> SUB_CHECK(3, FAIL)
    fn chain_spec() -> NodeSpec {
        NodeSpec::new(NodeKind::Root, "nightly").with_child(
            NodeSpec::new(NodeKind::Check, "lint")
                .with_status(Status::Fail)
                .with_child(
                    NodeSpec::new(NodeKind::SubCheck, "clippy")
                        .with_status(Status::Fail)
                        .with_reason("3 warnings"),
                ),
        )
    }

    fn snapshot(store: &TreeStore) -> Vec<Node> {
        store
            .roots()
            .unwrap()
            .into_iter()
            .flat_map(|r| store.subtree(r.id).unwrap().nodes().cloned().collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn import_then_fetch_round_trips() {
        let store = TreeStore::open_in_memory().unwrap();
        let imported = store.import(&chain_spec()).unwrap();
        let fetched = store.subtree(imported.root().id).unwrap();

        assert_eq!(imported, fetched);
        let tree = fetched.project();
        assert_eq!(tree.kind, NodeKind::Root);
        assert_eq!(tree.name, "nightly");
        assert_eq!(tree.status, None);
        assert_eq!(tree.children.len(), 1);
        let check = &tree.children[0];
        assert_eq!((check.kind, check.status), (NodeKind::Check, Some(Status::Fail)));
        let sub = &check.children[0];
        assert_eq!(sub.kind, NodeKind::SubCheck);
        assert_eq!(sub.reason.as_deref(), Some("3 warnings"));
        assert!(sub.children.is_empty());
    }

    #[test]
    fn override_propagates_and_persists() {
        let store = TreeStore::open_in_memory().unwrap();
        let imported = store.import(&chain_spec()).unwrap();
        let ids: Vec<NodeId> = imported.nodes().map(|n| n.id).collect();
        let (root, check, leaf) = (ids[0], ids[1], ids[2]);

        let result = store.override_status(leaf, Status::Pass).unwrap();
        assert_eq!(result.subtree.root().id, leaf);
        assert_eq!(result.report.changed_ids(), vec![leaf, check, root]);

        let tree = store.subtree(root).unwrap().project();
        assert!(tree.iter().all(|n| n.status == Some(Status::Pass)));
    }

    #[test]
    fn override_of_unknown_node_changes_nothing() {
        let store = TreeStore::open_in_memory().unwrap();
        store.import(&chain_spec()).unwrap();
        let before = snapshot(&store);

        let err = store.override_status(404, Status::Pass).unwrap_err();
        assert!(matches!(err, CheckTreeError::NodeNotFound(404)));
        assert_eq!(before, snapshot(&store));
    }

    #[test]
    fn corrupted_parent_cycle_rolls_back_override() {
        let store = TreeStore::open_in_memory().unwrap();
        let imported = store.import(&chain_spec()).unwrap();
        let ids: Vec<NodeId> = imported.nodes().map(|n| n.id).collect();
        let (check, leaf) = (ids[1], ids[2]);
        store
            .conn
            .lock()
            .execute(
                "UPDATE nodes SET parent_id = ?1 WHERE id = ?2",
                params![leaf, check],
            )
            .unwrap();

        let err = store.override_status(leaf, Status::Pass).unwrap_err();
        assert!(matches!(err, CheckTreeError::InvalidTree(_)), "{err}");
        assert_eq!(store.get(leaf).unwrap().status, Some(Status::Fail));
        assert_eq!(store.get(check).unwrap().status, Some(Status::Fail));
    }

    #[test]
    fn get_returns_stored_node_or_not_found() {
        let store = TreeStore::open_in_memory().unwrap();
        let imported = store.import(&chain_spec()).unwrap();
        let leaf = &imported.descendants()[1];

        assert_eq!(&store.get(leaf.id).unwrap(), leaf);
        assert!(matches!(store.get(404), Err(CheckTreeError::NodeNotFound(404))));
    }

    #[test]
    fn overriding_root_leaves_descendants_alone() {
        let store = TreeStore::open_in_memory().unwrap();
        let imported = store.import(&chain_spec()).unwrap();
        let root = imported.root().id;

        let result = store.override_status(root, Status::Pass).unwrap();
        assert_eq!(result.report.changes.len(), 1);
        let after = store.subtree(root).unwrap();
        for (before, after) in imported.descendants().iter().zip(after.descendants()) {
            assert_eq!(before, after);
        }
        assert_eq!(after.root().status, Some(Status::Pass));
    }

    #[test]
    fn reads_do_not_mutate() {
        let store = TreeStore::open_in_memory().unwrap();
        store.import(&chain_spec()).unwrap();
        store.import(&NodeSpec::new(NodeKind::Root, "weekly")).unwrap();
        let before = snapshot(&store);

        for _ in 0..10 {
            store.random_root().unwrap();
        }
        for node in &before {
            store.subtree(node.id).unwrap();
        }
        assert_eq!(before, snapshot(&store));
    }

    #[test]
    fn random_root_without_roots_is_no_root() {
        let store = TreeStore::open_in_memory().unwrap();
        assert!(matches!(store.random_root(), Err(CheckTreeError::NoRoot)));
    }

    #[test]
    fn random_root_only_returns_roots() {
        let store = TreeStore::open_in_memory().unwrap();
        store.import(&chain_spec()).unwrap();
        store.import(&chain_spec()).unwrap();
        for _ in 0..20 {
            let picked = store.random_root().unwrap();
            assert_eq!(picked.root().kind, NodeKind::Root);
            assert_eq!(picked.node_count(), 3);
        }
    }

    #[test]
    fn delete_cascades_to_subtree() {
        let store = TreeStore::open_in_memory().unwrap();
        let imported = store.import(&chain_spec()).unwrap();
        let check = imported.descendants()[0].id;

        assert_eq!(store.delete(check).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.children(imported.root().id).unwrap().is_empty());
        assert!(matches!(store.delete(check), Err(CheckTreeError::NodeNotFound(_))));
    }

    #[test]
    fn schema_rejects_illegal_values() {
        let store = TreeStore::open_in_memory().unwrap();
        let root = store.insert(NewNode::root("run")).unwrap();
        let conn = store.conn.lock();
        let bad_status = conn.execute(
            "UPDATE nodes SET status = 'MAYBE' WHERE id = ?1",
            params![root.id],
        );
        assert!(bad_status.is_err());
        let bad_type = conn.execute(
            "INSERT INTO nodes (created_at, type, name) VALUES ('2024-01-01T00:00:00Z', 'LEAF', 'x')",
            [],
        );
        assert!(bad_type.is_err());
    }

    #[test]
    fn insert_rejects_missing_parent() {
        let store = TreeStore::open_in_memory().unwrap();
        let err = store
            .insert(NewNode::child(NodeKind::Check, "orphan", 9))
            .unwrap_err();
        assert!(matches!(err, CheckTreeError::NodeNotFound(9)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("checks.db");
        let root = {
            let store = TreeStore::open(&path).unwrap();
            let imported = store.import(&chain_spec()).unwrap();
            let leaf = imported.descendants()[1].id;
            store.override_status(leaf, Status::Pass).unwrap();
            imported.root().id
        };

        let reopened = TreeStore::open(&path).unwrap();
        let tree = reopened.subtree(root).unwrap().project();
        assert_eq!(tree.status, Some(Status::Pass));
        assert_eq!(reopened.count().unwrap(), 3);
    }

    #[test]
    fn concurrent_overrides_leave_tree_consistent() {
        let store = TreeStore::open_in_memory().unwrap();
        let spec = (0..8).fold(NodeSpec::new(NodeKind::Root, "run"), |root, i| {
            root.with_child(
                NodeSpec::new(NodeKind::Check, format!("check-{i}"))
                    .with_status(Status::Fail)
                    .with_child(
                        NodeSpec::new(NodeKind::SubCheck, format!("sub-{i}"))
                            .with_status(Status::Fail),
                    ),
            )
        });
        let imported = store.import(&spec).unwrap();
        let leaves: Vec<NodeId> = imported
            .descendants()
            .iter()
            .filter(|n| n.kind == NodeKind::SubCheck)
            .map(|n| n.id)
            .collect();

        std::thread::scope(|scope| {
            for leaf in &leaves {
                let store = store.clone();
                scope.spawn(move || store.override_status(*leaf, Status::Pass).unwrap());
            }
        });

        let tree = store.subtree(imported.root().id).unwrap().project();
        assert!(tree.iter().all(|n| n.status == Some(Status::Pass)));
    }
}
