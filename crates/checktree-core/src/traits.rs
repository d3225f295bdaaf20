use crate::{Node, NodeId, Result, Status};

/// Node access needed by the propagation engine.
///
/// Implementations are expected to run inside a single unit of work (a
/// transaction for persistent stores) so a failed walk leaves no partial
/// writes behind.
pub trait NodeStore {
    fn node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Direct children of `id` in stored order.
    fn children(&self, id: NodeId) -> Result<Vec<Node>>;

    fn set_status(&mut self, id: NodeId, status: Status) -> Result<()>;
}

impl<S: NodeStore + ?Sized> NodeStore for &mut S {
    fn node(&self, id: NodeId) -> Result<Option<Node>> {
        (**self).node(id)
    }

    fn children(&self, id: NodeId) -> Result<Vec<Node>> {
        (**self).children(id)
    }

    fn set_status(&mut self, id: NodeId, status: Status) -> Result<()> {
        (**self).set_status(id, status)
    }
}
