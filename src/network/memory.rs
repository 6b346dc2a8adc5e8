//! In-memory logic network.

use serde::{Deserialize, Serialize};

use crate::types::{GateFunction, NodeId, NodeKind, Signal};
use super::{LogicNetwork, NetworkError};

/// Append-only logic network stored in flat vectors.
///
/// Node 0 is always the constant-false node. Nodes can only reference
/// existing nodes, so creation order is a topological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryNetwork {
    /// Kind per node.
    kinds: Vec<NodeKind>,
    /// Ordered fanins per node.
    fanins: Vec<Vec<Signal>>,
    /// Consumer references per node.
    fanouts: Vec<Vec<NodeId>>,
    /// Primary outputs driven per node.
    output_refs: Vec<usize>,
    /// Primary inputs.
    inputs: Vec<NodeId>,
    /// Primary outputs.
    outputs: Vec<Signal>,
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self {
            kinds: vec![NodeKind::Constant],
            fanins: vec![Vec::new()],
            fanouts: vec![Vec::new()],
            output_refs: vec![0],
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl InMemoryNetwork {
    /// Create a network holding only the constant node.
    pub fn new() -> Self {
        Self::default()
    }

    /// The constant signal of the given value.
    pub fn constant(&self, value: bool) -> Signal {
        Signal::new(NodeId::new(0), value)
    }

    /// Add a primary input.
    pub fn add_input(&mut self) -> Signal {
        let id = self.push_node(NodeKind::Input, Vec::new());
        self.inputs.push(id);
        Signal::plain(id)
    }

    /// Add a gate computing `function` over `fanins`.
    pub fn add_gate(&mut self, function: GateFunction, fanins: &[Signal]) -> Result<Signal, NetworkError> {
        if fanins.len() != function.arity() {
            return Err(NetworkError::ArityMismatch {
                function: function.to_string(),
                expected: function.arity(),
                actual: fanins.len(),
            });
        }
        self.check_signals(fanins)?;
        let id = self.push_node(NodeKind::Gate(function), fanins.to_vec());
        Ok(Signal::plain(id))
    }

    /// Add a relay driven by `fanin`.
    pub fn add_relay(&mut self, fanin: Signal) -> Result<Signal, NetworkError> {
        self.check_signals(&[fanin])?;
        let id = self.push_node(NodeKind::Relay, vec![fanin]);
        Ok(Signal::plain(id))
    }

    /// Register `signal` as the next primary output, returning its index.
    pub fn add_output(&mut self, signal: Signal) -> Result<usize, NetworkError> {
        self.check_signals(&[signal])?;
        self.output_refs[signal.node.index()] += 1;
        self.outputs.push(signal);
        Ok(self.outputs.len() - 1)
    }

    /// Number of gates.
    pub fn num_gates(&self) -> usize {
        self.kinds.iter().filter(|k| k.is_gate()).count()
    }

    /// Number of relays.
    pub fn num_relays(&self) -> usize {
        self.kinds.iter().filter(|k| k.is_relay()).count()
    }

    /// Number of primary inputs.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// First relay node, if the network has any.
    pub fn first_relay(&self) -> Option<NodeId> {
        self.kinds
            .iter()
            .position(|k| k.is_relay())
            .map(|i| NodeId::new(i as u32))
    }

    fn check_signals(&self, signals: &[Signal]) -> Result<(), NetworkError> {
        match signals.iter().find(|s| s.node.index() >= self.kinds.len()) {
            Some(s) => Err(NetworkError::NodeNotFound(s.node)),
            None => Ok(()),
        }
    }

    fn push_node(&mut self, kind: NodeKind, fanins: Vec<Signal>) -> NodeId {
        let id = NodeId::new(self.kinds.len() as u32);
        for fi in &fanins {
            if !self.kinds[fi.node.index()].is_constant() {
                self.fanouts[fi.node.index()].push(id);
            }
        }
        self.kinds.push(kind);
        self.fanins.push(fanins);
        self.fanouts.push(Vec::new());
        self.output_refs.push(0);
        id
    }
}

impl LogicNetwork for InMemoryNetwork {
    fn size(&self) -> usize {
        self.kinds.len()
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.kinds[node.index()]
    }

    fn fanins(&self, node: NodeId) -> &[Signal] {
        &self.fanins[node.index()]
    }

    fn fanouts(&self, node: NodeId) -> &[NodeId] {
        &self.fanouts[node.index()]
    }

    fn fanout_size(&self, node: NodeId) -> usize {
        self.fanouts[node.index()].len() + self.output_refs[node.index()]
    }

    fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    fn outputs(&self) -> &[Signal] {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_query() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let c = ntk.add_input();
        let g = ntk.add_gate(GateFunction::Maj, &[a, b.complement(), c]).unwrap();
        let h = ntk.add_gate(GateFunction::And, &[g, a]).unwrap();
        ntk.add_output(h).unwrap();
        ntk.add_output(g).unwrap();

        assert_eq!(ntk.size(), 6);
        assert_eq!(ntk.num_gates(), 2);
        assert_eq!(ntk.fanouts(a.node), &[g.node, h.node]);
        assert_eq!(ntk.fanout_size(g.node), 2);
        assert_eq!(ntk.fanout_size(h.node), 1);
        assert_eq!(ntk.outputs_of(g.node), vec![1]);
        assert!(ntk.fanins(g.node)[1].complemented);
        assert_eq!(ntk.gates().collect::<Vec<_>>(), vec![g.node, h.node]);
    }

    #[test]
    fn test_constant_fanins_are_not_fanouts() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let one = ntk.constant(true);
        let g = ntk.add_gate(GateFunction::And, &[a, one]).unwrap();
        assert!(ntk.fanouts(one.node).is_empty());
        assert_eq!(ntk.fanouts(a.node), &[g.node]);
    }

    #[test]
    fn test_arity_and_missing_nodes_rejected() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let err = ntk.add_gate(GateFunction::Maj, &[a, a]).unwrap_err();
        assert!(matches!(err, NetworkError::ArityMismatch { expected: 3, actual: 2, .. }));

        let ghost = Signal::plain(NodeId::new(42));
        assert_eq!(ntk.add_output(ghost), Err(NetworkError::NodeNotFound(NodeId::new(42))));
    }

    #[test]
    fn test_relays() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        assert_eq!(ntk.first_relay(), None);
        let r = ntk.add_relay(a).unwrap();
        assert_eq!(ntk.num_relays(), 1);
        assert_eq!(ntk.first_relay(), Some(r.node));
        assert!(ntk.kind(r.node).is_relay());
    }
}
