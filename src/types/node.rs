//! Node identities, signals and node kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense identifier of a node in a logic network.
///
/// Node ids are assigned in topological order: every fanin of a node has a
/// strictly smaller id than the node itself. Implements `Ord` so that maps
/// keyed by `NodeId` iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node id from a raw index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Index into per-node tables.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// A reference to a node output, optionally complemented.
///
/// Inverters are free in the target technologies, so they live on the edge
/// rather than as nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signal {
    /// The driving node.
    pub node: NodeId,
    /// Whether the edge inverts the value.
    pub complemented: bool,
}

impl Signal {
    /// Create a signal.
    pub fn new(node: NodeId, complemented: bool) -> Self {
        Self { node, complemented }
    }

    /// Non-inverted signal of `node`.
    pub fn plain(node: NodeId) -> Self {
        Self::new(node, false)
    }

    /// The same node with the inversion flag flipped.
    pub fn complement(self) -> Self {
        Self::new(self.node, !self.complemented)
    }
}

impl From<NodeId> for Signal {
    fn from(node: NodeId) -> Self {
        Self::plain(node)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.complemented {
            write!(f, "!{}", self.node)
        } else {
            write!(f, "{}", self.node)
        }
    }
}

/// Boolean function computed by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateFunction {
    /// Two-input conjunction.
    And,
    /// Two-input disjunction.
    Or,
    /// Two-input exclusive or.
    Xor,
    /// Three-input majority.
    Maj,
}

impl GateFunction {
    /// Number of fanins this function requires.
    pub fn arity(&self) -> usize {
        match self {
            Self::And | Self::Or | Self::Xor => 2,
            Self::Maj => 3,
        }
    }

    /// Parse a gate function from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "xor" => Some(Self::Xor),
            "maj" => Some(Self::Maj),
            _ => None,
        }
    }
}

impl fmt::Display for GateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Xor => write!(f, "xor"),
            Self::Maj => write!(f, "maj"),
        }
    }
}

/// What a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The constant-false node (its complement is constant true).
    Constant,
    /// Primary input.
    Input,
    /// Logic gate with a single physical output.
    Gate(GateFunction),
    /// Pass-through node inserted to delay or fan out a signal.
    Relay,
}

impl NodeKind {
    /// Whether this is the constant node.
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant)
    }

    /// Whether this is a primary input.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input)
    }

    /// Whether this is a logic gate.
    pub fn is_gate(&self) -> bool {
        matches!(self, Self::Gate(_))
    }

    /// Whether this is a relay.
    pub fn is_relay(&self) -> bool {
        matches!(self, Self::Relay)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant => write!(f, "constant"),
            Self::Input => write!(f, "input"),
            Self::Gate(func) => write!(f, "gate({})", func),
            Self::Relay => write!(f, "relay"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_ordering() {
        assert!(NodeId::new(1) < NodeId::new(2));
        assert_eq!(NodeId::new(7).index(), 7);
    }

    #[test]
    fn test_signal_complement() {
        let s = Signal::plain(NodeId::new(3));
        assert!(!s.complemented);
        assert!(s.complement().complemented);
        assert_eq!(s.complement().complement(), s);
        assert_eq!(s.complement().to_string(), "!n3");
    }

    #[test]
    fn test_gate_arity() {
        assert_eq!(GateFunction::And.arity(), 2);
        assert_eq!(GateFunction::Maj.arity(), 3);
        assert_eq!(GateFunction::from_str("MAJ"), Some(GateFunction::Maj));
        assert_eq!(GateFunction::from_str("nand"), None);
    }
}
