use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::{CheckTreeError, NodeId, NodeStore, Result, Status};

/// One status write performed during an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub id: NodeId,
    pub previous: Option<Status>,
    pub current: Status,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.current)
    }
}

/// Every write of one override, ordered from the target up to its ROOT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    pub changes: Vec<StatusChange>,
}

impl PropagationReport {
    pub fn target(&self) -> Option<&StatusChange> {
        self.changes.first()
    }

    pub fn root(&self) -> Option<&StatusChange> {
        self.changes.last()
    }

    /// Ids whose stored status actually changed.
    pub fn changed_ids(&self) -> Vec<NodeId> {
        self.changes
            .iter()
            .filter(|c| c.changed())
            .map(|c| c.id)
            .collect()
    }
}

/// Sets `id` to `status` and recomputes each ancestor from its children.
///
/// The walk follows parent links until it has updated a node without a
/// parent. A dangling parent link or a revisited node aborts with
/// [`CheckTreeError::InvalidTree`]; callers run this inside a transaction so
/// the partial walk is discarded.
pub fn override_status<S>(store: &mut S, id: NodeId, status: Status) -> Result<PropagationReport>
where
    S: NodeStore + ?Sized,
{
    let node = store.node(id)?.ok_or(CheckTreeError::NodeNotFound(id))?;
    store.set_status(id, status)?;

    let mut report = PropagationReport::default();
    report.changes.push(StatusChange {
        id,
        previous: node.status,
        current: status,
    });

    let mut visited = HashSet::from([id]);
    let mut next = node.parent_id;
    while let Some(parent_id) = next {
        if !visited.insert(parent_id) {
            return Err(CheckTreeError::InvalidTree(format!(
                "cycle detected at node {parent_id} while propagating from {id}"
            )));
        }
        let parent = store.node(parent_id)?.ok_or_else(|| {
            CheckTreeError::InvalidTree(format!("node {parent_id} is referenced as a parent but does not exist"))
        })?;
        let children = store.children(parent_id)?;
        let aggregated = Status::aggregate(children.iter().map(|c| c.status));
        store.set_status(parent_id, aggregated)?;
        debug!(
            node = parent_id,
            children = children.len(),
            status = %aggregated,
            "recomputed ancestor status"
        );
        report.changes.push(StatusChange {
            id: parent_id,
            previous: parent.status,
            current: aggregated,
        });
        next = parent.parent_id;
    }

    Ok(report)
}
