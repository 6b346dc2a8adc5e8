//! Logic network access.
//!
//! The engine never builds or rewrites the input DAG; it only reads it through
//! [`LogicNetwork`]. Topology is fixed for the duration of a run.

pub mod memory;

use crate::types::{NodeId, NodeKind, Signal};

/// Error type for network construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// A fanin or output refers to a node that does not exist yet.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    /// Gate created with the wrong number of fanins.
    #[error("Gate {function} expects {expected} fanins, got {actual}")]
    ArityMismatch {
        /// Gate function name.
        function: String,
        /// Required arity.
        expected: usize,
        /// Supplied fanin count.
        actual: usize,
    },
    /// The network already contains relay nodes.
    #[error("Network already contains relay node {0}")]
    AlreadyRelayed(NodeId),
}

/// Read-only view of a combinational logic network.
///
/// Implementations must guarantee that node ids are topologically ordered
/// (every fanin id is smaller than its consumer id) and that iteration order
/// of every method is deterministic.
pub trait LogicNetwork {
    /// Total number of nodes, constant included.
    fn size(&self) -> usize;

    /// Kind of a node.
    fn kind(&self, node: NodeId) -> NodeKind;

    /// Ordered fanins of a node (empty for constants and inputs).
    fn fanins(&self, node: NodeId) -> &[Signal];

    /// Gate and relay consumers of a node, one entry per fanin reference.
    fn fanouts(&self, node: NodeId) -> &[NodeId];

    /// Number of edges leaving a node: consumer references plus primary
    /// outputs it drives.
    fn fanout_size(&self, node: NodeId) -> usize;

    /// Primary inputs in creation order.
    fn inputs(&self) -> &[NodeId];

    /// Primary outputs in index order.
    fn outputs(&self) -> &[Signal];

    /// Whether `node` is the constant node.
    fn is_constant(&self, node: NodeId) -> bool {
        self.kind(node).is_constant()
    }

    /// Whether `node` is a primary input.
    fn is_input(&self, node: NodeId) -> bool {
        self.kind(node).is_input()
    }

    /// Whether `node` is a logic gate.
    fn is_gate(&self, node: NodeId) -> bool {
        self.kind(node).is_gate()
    }

    /// Number of primary outputs.
    fn num_outputs(&self) -> usize {
        self.outputs().len()
    }

    /// All node ids in topological order.
    fn nodes(&self) -> Box<dyn Iterator<Item = NodeId> + '_> {
        Box::new((0..self.size() as u32).map(NodeId::new))
    }

    /// Gate ids in topological order.
    fn gates(&self) -> Box<dyn Iterator<Item = NodeId> + '_> {
        Box::new(self.nodes().filter(move |&n| self.is_gate(n)))
    }

    /// Indices of the primary outputs driven by `node`.
    fn outputs_of(&self, node: NodeId) -> Vec<usize> {
        self.outputs()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.node == node)
            .map(|(i, _)| i)
            .collect()
    }
}

pub use memory::InMemoryNetwork;
