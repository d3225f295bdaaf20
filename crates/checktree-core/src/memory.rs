use std::collections::{BTreeMap, VecDeque};

use chrono::Utc;

use crate::{CheckTreeError, NewNode, Node, NodeId, NodeSpec, NodeStore, Result, Status, Subtree};

/// Arena-backed tree keyed by id, with a parent -> children index.
///
/// Children are kept in insertion order, which matches id order since ids
/// are handed out sequentially.
#[derive(Debug, Default, Clone)]
pub struct MemoryTree {
    nodes: BTreeMap<NodeId, Node>,
    children: BTreeMap<NodeId, Vec<NodeId>>,
    next_id: NodeId,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn insert(&mut self, new: NewNode) -> Result<Node> {
        new.validate()?;
        if let Some(parent_id) = new.parent_id {
            if !self.nodes.contains_key(&parent_id) {
                return Err(CheckTreeError::NodeNotFound(parent_id));
            }
        }
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        let node = Node {
            id,
            kind: new.kind,
            name: new.name,
            status: new.status,
            reason: new.reason,
            parent_id: new.parent_id,
            created_at: Utc::now(),
        };
        if let Some(parent_id) = node.parent_id {
            self.children.entry(parent_id).or_default().push(id);
        }
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    /// Inserts a nested tree breadth-first and returns the stored subtree.
    pub fn import(&mut self, spec: &NodeSpec) -> Result<Subtree> {
        spec.validate()?;
        let root = self.insert(NewNode {
            kind: spec.kind,
            name: spec.name.clone(),
            status: spec.status,
            reason: spec.reason.clone(),
            parent_id: None,
        })?;
        let mut queue: VecDeque<(NodeId, &NodeSpec)> =
            spec.children.iter().map(|c| (root.id, c)).collect();
        while let Some((parent_id, child)) = queue.pop_front() {
            let stored = self.insert(NewNode {
                kind: child.kind,
                name: child.name.clone(),
                status: child.status,
                reason: child.reason.clone(),
                parent_id: Some(parent_id),
            })?;
            queue.extend(child.children.iter().map(|c| (stored.id, c)));
        }
        self.subtree(root.id)
    }

    pub fn subtree(&self, id: NodeId) -> Result<Subtree> {
        let root = self
            .nodes
            .get(&id)
            .cloned()
            .ok_or(CheckTreeError::NodeNotFound(id))?;
        let mut descendants = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child_id in self.children.get(&current).into_iter().flatten() {
                if let Some(child) = self.nodes.get(child_id) {
                    descendants.push(child.clone());
                    queue.push_back(*child_id);
                }
            }
        }
        Ok(Subtree::new(root, descendants))
    }
}

impl NodeStore for MemoryTree {
    fn node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn children(&self, id: NodeId) -> Result<Vec<Node>> {
        Ok(self
            .children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|c| self.nodes.get(c).cloned())
            .collect())
    }

    fn set_status(&mut self, id: NodeId, status: Status) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(CheckTreeError::NodeNotFound(id))?;
        node.status = Some(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    fn sample() -> NodeSpec {
        NodeSpec::new(NodeKind::Root, "run")
            .with_child(
                NodeSpec::new(NodeKind::Check, "lint")
                    .with_status(Status::Pass)
                    .with_child(NodeSpec::new(NodeKind::SubCheck, "clippy").with_status(Status::Pass))
                    .with_child(NodeSpec::new(NodeKind::SubCheck, "fmt").with_status(Status::Pass)),
            )
            .with_child(
                NodeSpec::new(NodeKind::Check, "tests")
                    .with_status(Status::Fail)
                    .with_reason("1 failed"),
            )
    }

    #[test]
    fn import_round_trips_shape() {
        let mut tree = MemoryTree::new();
        let subtree = tree.import(&sample()).unwrap();
        let projected = subtree.project();

        assert_eq!(projected.name, "run");
        assert_eq!(projected.children.len(), 2);
        assert_eq!(projected.children[0].name, "lint");
        assert_eq!(projected.children[0].children.len(), 2);
        assert_eq!(projected.children[1].reason.as_deref(), Some("1 failed"));
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.nodes().filter(|n| n.kind == NodeKind::Root).count(), 1);
    }

    #[test]
    fn insert_requires_existing_parent() {
        let mut tree = MemoryTree::new();
        let err = tree
            .insert(NewNode::child(NodeKind::Check, "orphan", 42))
            .unwrap_err();
        assert!(matches!(err, CheckTreeError::NodeNotFound(42)));
        assert!(tree.is_empty());
    }

    #[test]
    fn insert_checks_kind_against_position() {
        let mut tree = MemoryTree::new();
        let root = tree.insert(NewNode::root("run")).unwrap();
        let mut nested_root = NewNode::root("nested");
        nested_root.parent_id = Some(root.id);
        assert!(matches!(
            tree.insert(nested_root),
            Err(CheckTreeError::InvalidTree(_))
        ));
        let mut parentless = NewNode::child(NodeKind::Check, "lint", root.id);
        parentless.parent_id = None;
        assert!(tree.insert(parentless).is_err());
    }

    #[test]
    fn subtree_of_unknown_id_fails() {
        let tree = MemoryTree::new();
        assert!(matches!(tree.subtree(7), Err(CheckTreeError::NodeNotFound(7))));
    }
}
