//! Status propagation through the check tree.
//!
//! Overriding a node's status rewrites every ancestor on the path to its
//! ROOT so that a parent is PASS exactly when all of its direct children
//! are PASS. Sibling subtrees off that path are never touched.

mod engine;

pub use engine::*;
