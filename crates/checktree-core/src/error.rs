use thiserror::Error;

use crate::NodeId;

#[derive(Error, Debug)]
pub enum CheckTreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("No root node found")]
    NoRoot,

    #[error("Invalid status: {0:?} (expected PASS or FAIL)")]
    InvalidStatus(String),

    #[error("Invalid node type: {0:?} (expected ROOT, CHECK or SUB_CHECK)")]
    InvalidNodeKind(String),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckTreeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CheckTreeError::NodeNotFound(_) | CheckTreeError::NoRoot)
    }
}

pub type Result<T> = std::result::Result<T, CheckTreeError>;
