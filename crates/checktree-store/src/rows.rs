//! Row mapping and single-connection queries shared by reads and the
//! override transaction.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};

use crate::db_err;
use checktree_core::{
    CheckTreeError, NewNode, Node, NodeId, NodeKind, NodeStore, Result, Status, Subtree,
};

pub(crate) const NODE_COLUMNS: &str = "id, created_at, type, name, status, reason, parent_id";

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = CheckTreeError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    let status = match row.get::<_, Option<String>>(4)? {
        Some(_) => Some(parse_column::<Status>(row, 4)?),
        None => None,
    };
    Ok(Node {
        id: row.get(0)?,
        created_at: row.get::<_, DateTime<Utc>>(1)?,
        kind: parse_column::<NodeKind>(row, 2)?,
        name: row.get(3)?,
        status,
        reason: row.get(5)?,
        parent_id: row.get(6)?,
    })
}

pub(crate) fn find_node(conn: &Connection, id: NodeId) -> Result<Option<Node>> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1"),
        params![id],
        node_from_row,
    )
    .optional()
    .map_err(db_err)
}

pub(crate) fn find_children(conn: &Connection, id: NodeId) -> Result<Vec<Node>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id = ?1 ORDER BY id"
        ))
        .map_err(db_err)?;
    let rows = stmt
        .query_map(params![id], node_from_row)
        .map_err(db_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
}

pub(crate) fn insert_node(conn: &Connection, new: &NewNode) -> Result<Node> {
    new.validate()?;
    if let Some(parent_id) = new.parent_id {
        if find_node(conn, parent_id)?.is_none() {
            return Err(CheckTreeError::NodeNotFound(parent_id));
        }
    }
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO nodes (created_at, type, name, status, reason, parent_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            created_at,
            new.kind.as_str(),
            new.name,
            new.status.map(|s| s.as_str()),
            new.reason,
            new.parent_id,
        ],
    )
    .map_err(db_err)?;
    Ok(Node {
        id: conn.last_insert_rowid(),
        kind: new.kind,
        name: new.name.clone(),
        status: new.status,
        reason: new.reason.clone(),
        parent_id: new.parent_id,
        created_at,
    })
}

/// Loads `id` and all of its descendants in breadth-first order.
///
/// The recursive query uses `UNION`, so a corrupted parent loop still
/// terminates; the walk below only follows links from the root down.
pub(crate) fn load_subtree(conn: &Connection, id: NodeId) -> Result<Subtree> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "WITH RECURSIVE sub(id) AS (
                 SELECT id FROM nodes WHERE id = ?1
                 UNION
                 SELECT n.id FROM nodes n JOIN sub ON n.parent_id = sub.id
             )
             SELECT {NODE_COLUMNS} FROM nodes WHERE id IN (SELECT id FROM sub) ORDER BY id"
        ))
        .map_err(db_err)?;
    let rows = stmt
        .query_map(params![id], node_from_row)
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;

    let mut root = None;
    let mut by_parent: HashMap<NodeId, Vec<Node>> = HashMap::new();
    for node in rows {
        if node.id == id {
            root = Some(node);
        } else if let Some(parent_id) = node.parent_id {
            by_parent.entry(parent_id).or_default().push(node);
        }
    }
    let root = root.ok_or(CheckTreeError::NodeNotFound(id))?;

    let mut descendants = Vec::new();
    let mut seen = HashSet::from([id]);
    let mut queue = VecDeque::from([id]);
    while let Some(current) = queue.pop_front() {
        for child in by_parent.remove(&current).unwrap_or_default() {
            if seen.insert(child.id) {
                queue.push_back(child.id);
                descendants.push(child);
            }
        }
    }
    Ok(Subtree::new(root, descendants))
}

/// [`NodeStore`] view over an open connection or transaction.
pub struct SqliteNodes<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteNodes<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl NodeStore for SqliteNodes<'_> {
    fn node(&self, id: NodeId) -> Result<Option<Node>> {
        find_node(self.conn, id)
    }

    fn children(&self, id: NodeId) -> Result<Vec<Node>> {
        find_children(self.conn, id)
    }

    fn set_status(&mut self, id: NodeId, status: Status) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE nodes SET status = ?2 WHERE id = ?1",
                params![id, status.as_str()],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(CheckTreeError::NodeNotFound(id));
        }
        Ok(())
    }
}
