use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CheckTreeError;

pub type NodeId = i64;

/// Position of a node in a check run. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Root,
    Check,
    SubCheck,
}

impl NodeKind {
    pub const ALL: [NodeKind; 3] = [NodeKind::Root, NodeKind::Check, NodeKind::SubCheck];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "ROOT",
            NodeKind::Check => "CHECK",
            NodeKind::SubCheck => "SUB_CHECK",
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, NodeKind::Root)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = CheckTreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROOT" => Ok(NodeKind::Root),
            "CHECK" => Ok(NodeKind::Check),
            "SUB_CHECK" => Ok(NodeKind::SubCheck),
            other => Err(CheckTreeError::InvalidNodeKind(other.to_string())),
        }
    }
}

/// Outcome of a check. A node without a status has never been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Status::Pass)
    }

    /// Aggregate status of a parent given its children's statuses.
    /// Absent counts as not passing.
    pub fn aggregate<I>(children: I) -> Status
    where
        I: IntoIterator<Item = Option<Status>>,
    {
        if children.into_iter().all(|s| s.is_some_and(|s| s.is_pass())) {
            Status::Pass
        } else {
            Status::Fail
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CheckTreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Status::Pass),
            "FAIL" => Ok(Status::Fail),
            other => Err(CheckTreeError::InvalidStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_only_canonical_spellings() {
        assert_eq!("PASS".parse::<Status>().unwrap(), Status::Pass);
        assert_eq!("FAIL".parse::<Status>().unwrap(), Status::Fail);
        assert!(matches!(
            "pass".parse::<Status>(),
            Err(CheckTreeError::InvalidStatus(_))
        ));
        assert!(matches!(
            "UNKNOWN".parse::<Status>(),
            Err(CheckTreeError::InvalidStatus(_))
        ));
    }

    #[test]
    fn node_kind_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&NodeKind::SubCheck).unwrap();
        assert_eq!(json, "\"SUB_CHECK\"");
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn aggregate_requires_every_child_to_pass() {
        assert_eq!(Status::aggregate([Some(Status::Pass)]), Status::Pass);
        assert_eq!(
            Status::aggregate([Some(Status::Pass), Some(Status::Fail)]),
            Status::Fail
        );
        assert_eq!(Status::aggregate([Some(Status::Pass), None]), Status::Fail);
        assert_eq!(Status::aggregate(std::iter::empty()), Status::Pass);
    }
}
