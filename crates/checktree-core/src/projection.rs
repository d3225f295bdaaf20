//! Tree-shaped response projection.
//!
//! A [`Subtree`] is a flat, breadth-first snapshot of a node and all of its
//! descendants. [`Subtree::project`] turns it into the nested [`NodeTree`]
//! returned to clients. Assembly runs bottom-up over the flat list, so the
//! depth of the tree never turns into call-stack depth.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Node, NodeId, NodeKind, Status};

/// Recursive response shape for a node and its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTree {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    pub status: Option<Status>,
    pub reason: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeTree>,
}

impl NodeTree {
    fn leaf(node: &Node) -> Self {
        Self {
            id: node.id,
            kind: node.kind,
            name: node.name.clone(),
            status: node.status,
            reason: node.reason.clone(),
            children: Vec::new(),
        }
    }

    /// Depth-first iterator over this node and every descendant.
    pub fn iter(&self) -> impl Iterator<Item = &NodeTree> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    pub fn find(&self, id: NodeId) -> Option<&NodeTree> {
        self.iter().find(|n| n.id == id)
    }
}

/// Flat snapshot of a node and its descendants.
///
/// `descendants` is in breadth-first order with siblings in stored order,
/// so every node appears after its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtree {
    root: Node,
    descendants: Vec<Node>,
}

impl Subtree {
    pub fn new(root: Node, descendants: Vec<Node>) -> Self {
        Self { root, descendants }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn descendants(&self) -> &[Node] {
        &self.descendants
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::once(&self.root).chain(self.descendants.iter())
    }

    pub fn node_count(&self) -> usize {
        self.descendants.len() + 1
    }

    pub fn project(&self) -> NodeTree {
        let position: HashMap<NodeId, usize> = self
            .descendants
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id, idx))
            .collect();
        let mut slots: Vec<Option<NodeTree>> =
            self.descendants.iter().map(|n| Some(NodeTree::leaf(n))).collect();
        let mut root = NodeTree::leaf(&self.root);

        // Children sit after their parent, so walking backwards finishes every
        // child before its parent is moved. Each children list fills in
        // reverse and is flipped once complete.
        for idx in (0..self.descendants.len()).rev() {
            let Some(mut tree) = slots[idx].take() else {
                continue;
            };
            tree.children.reverse();
            let parent_slot = self.descendants[idx]
                .parent_id
                .and_then(|p| position.get(&p).copied());
            match parent_slot {
                Some(p) => {
                    if let Some(parent) = slots[p].as_mut() {
                        parent.children.push(tree);
                    }
                }
                None => root.children.push(tree),
            }
        }
        root.children.reverse();
        root
    }
}
