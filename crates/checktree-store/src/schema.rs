use rusqlite::Connection;
use tracing::debug;

use crate::db_err;
use checktree_core::Result;

pub const SCHEMA_VERSION: i64 = 1;

/// Node table. `type` and `status` carry CHECK constraints for their legal
/// values; deleting a node cascades to its children.
const CREATE_NODES: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT    NOT NULL,
    type        TEXT    NOT NULL CHECK (type IN ('ROOT', 'CHECK', 'SUB_CHECK')),
    name        TEXT    NOT NULL,
    status      TEXT    CHECK (status IS NULL OR status IN ('PASS', 'FAIL')),
    reason      TEXT,
    parent_id   INTEGER REFERENCES nodes(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(type);
CREATE INDEX IF NOT EXISTS idx_nodes_parent_id ON nodes(parent_id);
"#;

/// Applies the schema if it is missing. Safe to call on every open.
pub fn migrate(conn: &Connection) -> Result<()> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(db_err)?;
    if version >= SCHEMA_VERSION {
        debug!(version, "schema up to date");
        return Ok(());
    }
    conn.execute_batch(CREATE_NODES).map_err(db_err)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(db_err)?;
    debug!(from = version, to = SCHEMA_VERSION, "schema migrated");
    Ok(())
}
