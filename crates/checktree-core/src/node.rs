use crate::{NodeId, NodeKind, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored tree element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    pub status: Option<Status>,
    pub reason: Option<String>,
    pub parent_id: Option<NodeId>,
    pub created_at: DateTime<Utc>,
}

/// A node that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub kind: NodeKind,
    pub name: String,
    pub status: Option<Status>,
    pub reason: Option<String>,
    pub parent_id: Option<NodeId>,
}

impl NewNode {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Root,
            name: name.into(),
            status: None,
            reason: None,
            parent_id: None,
        }
    }

    pub fn child(kind: NodeKind, name: impl Into<String>, parent_id: NodeId) -> Self {
        Self {
            kind,
            name: name.into(),
            status: None,
            reason: None,
            parent_id: Some(parent_id),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// A ROOT has no parent and every other kind has one.
    pub fn validate(&self) -> crate::Result<()> {
        match (self.kind.is_root(), self.parent_id) {
            (true, Some(parent)) => Err(crate::CheckTreeError::InvalidTree(format!(
                "ROOT node {:?} cannot have parent {}",
                self.name, parent
            ))),
            (false, None) => Err(crate::CheckTreeError::InvalidTree(format!(
                "{} node {:?} needs a parent",
                self.kind, self.name
            ))),
            _ => Ok(()),
        }
    }
}

/// Nested import format used to seed whole trees.
///
/// ```json
/// { "type": "ROOT", "name": "nightly", "children": [
///     { "type": "CHECK", "name": "lint", "status": "PASS" } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            status: None,
            reason: None,
            children: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Checks that only the top of the tree is a ROOT.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.kind.is_root() {
            return Err(crate::CheckTreeError::InvalidTree(format!(
                "top-level node {:?} must be ROOT, got {}",
                self.name, self.kind
            )));
        }
        let mut stack: Vec<&NodeSpec> = self.children.iter().collect();
        while let Some(spec) = stack.pop() {
            if spec.kind.is_root() {
                return Err(crate::CheckTreeError::InvalidTree(format!(
                    "nested node {:?} cannot be ROOT",
                    spec.name
                )));
            }
            stack.extend(spec.children.iter());
        }
        Ok(())
    }
}
