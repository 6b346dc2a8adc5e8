//! Chunk recruitment.
//!
//! A chunk grows from a seed node through fanins whose relay tree is closed
//! on the current node and through consumers sitting right at the first
//! relay layer. Everything else adjacent to the chunk becomes an interface.

use super::ChunkOptimizer;
use crate::network::LogicNetwork;
use crate::types::{FanoutTree, NodeId};

/// Edge between a chunk member and an outside node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interface {
    /// Node inside the chunk.
    pub inner: NodeId,
    /// Node outside the chunk.
    pub outer: NodeId,
}

/// Edge between a chunk member and a primary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputInterface {
    pub inner: NodeId,
    pub output: usize,
}

/// A set of nodes moved together.
#[derive(Debug, Clone)]
pub(crate) struct Chunk {
    pub id: u32,
    pub members: Vec<NodeId>,
    /// Members fed by outside nodes.
    pub input_interfaces: Vec<Interface>,
    /// Members feeding outside nodes.
    pub output_interfaces: Vec<Interface>,
    pub po_interfaces: Vec<OutputInterface>,
}

impl Chunk {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            members: Vec::new(),
            input_interfaces: Vec::new(),
            output_interfaces: Vec::new(),
            po_interfaces: Vec::new(),
        }
    }

    /// A chunk holding only `node`, with all of its neighbors as interfaces.
    pub fn single<N: LogicNetwork>(ntk: &N, tree: &FanoutTree, node: NodeId, id: u32) -> Self {
        let mut chunk = Self::new(id);
        chunk.members.push(node);
        for fi in ntk.fanins(node) {
            if !ntk.is_constant(fi.node) {
                chunk.input_interfaces.push(Interface { inner: node, outer: fi.node });
            }
        }
        for bucket in tree {
            for &consumer in &bucket.consumers {
                chunk.output_interfaces.push(Interface { inner: node, outer: consumer });
            }
            for &output in &bucket.outputs {
                chunk.po_interfaces.push(OutputInterface { inner: node, output });
            }
        }
        chunk
    }
}

impl<'a, N: LogicNetwork> ChunkOptimizer<'a, N> {
    pub(super) fn recruit(&mut self, node: NodeId, chunk: &mut Chunk) {
        if self.epochs[node.index()] == chunk.id || chunk.members.len() > self.config.max_chunk_size {
            return;
        }
        self.epochs[node.index()] = chunk.id;
        chunk.members.push(node);
        self.recruit_fanins(node, chunk);
        self.recruit_fanouts(node, chunk);
    }

    fn recruit_fanins(&mut self, node: NodeId, chunk: &mut Chunk) {
        let ntk = self.ntk;
        for fi in ntk.fanins(node) {
            let ni = fi.node;
            if self.is_ignored(ni) || self.epochs[ni.index()] == chunk.id {
                continue;
            }
            if !self.is_fixed(ni) && self.are_close(ni, node) {
                self.recruit(ni, chunk);
            } else {
                chunk.input_interfaces.push(Interface { inner: node, outer: ni });
            }
        }
    }

    fn recruit_fanouts(&mut self, node: NodeId, chunk: &mut Chunk) {
        let tree = self.counter.tree(node);
        if tree.is_empty() {
            return;
        }
        let layers: Vec<(u32, Vec<NodeId>, Vec<usize>, u32)> = tree
            .iter()
            .map(|b| (b.relative_depth, b.consumers.clone(), b.outputs.clone(), b.edges))
            .collect();

        if self.ntk.fanout_size(node) == 1 {
            let (rd, consumers, outputs, _) = &layers[0];
            match (consumers.first(), outputs.first()) {
                (Some(&consumer), _) if *rd == 1 => self.recruit(consumer, chunk),
                (Some(&consumer), _) => chunk
                    .output_interfaces
                    .push(Interface { inner: node, outer: consumer }),
                (None, Some(&output)) => chunk
                    .po_interfaces
                    .push(OutputInterface { inner: node, output }),
                (None, None) => {}
            }
            return;
        }

        for (_, _, outputs, _) in &layers {
            for &output in outputs {
                chunk.po_interfaces.push(OutputInterface { inner: node, output });
            }
        }

        let first_hop = self.config.first_hop_capacity;
        if self.ntk.is_input(node) && first_hop > 1 {
            let mut idx = 0;
            if layers[0].0 == 1 {
                for &c in &layers[0].1 {
                    self.recruit(c, chunk);
                }
                idx = 1;
            }
            if idx < layers.len() && layers[idx].0 == 2 && layers[0].3 == first_hop {
                for &c in &layers[idx].1 {
                    self.recruit(c, chunk);
                }
                idx += 1;
            }
            for (_, consumers, _, _) in &layers[idx..] {
                for &c in consumers {
                    if self.epochs[c.index()] != chunk.id {
                        chunk.output_interfaces.push(Interface { inner: node, outer: c });
                    }
                }
            }
            return;
        }

        for (rd, consumers, _, _) in &layers {
            for &c in consumers {
                if *rd == 2 {
                    self.recruit(c, chunk);
                } else if self.epochs[c.index()] != chunk.id {
                    chunk.output_interfaces.push(Interface { inner: node, outer: c });
                }
            }
        }
    }

    /// Whether `ni`'s tree reaches `node` through its first relay layer, so
    /// moving `node` without `ni` would reshape the tree.
    fn are_close(&self, ni: NodeId, node: NodeId) -> bool {
        let tree = self.counter.tree(ni);
        let front = match tree.front() {
            Some(front) => front,
            None => return false,
        };

        let first_hop = self.config.first_hop_capacity;
        if self.ntk.is_input(ni) && first_hop > 1 {
            if front.relative_depth == 1 {
                if front.consumers.contains(&node) {
                    return true;
                }
                if front.edges < first_hop {
                    return false;
                }
            } else if self.ntk.fanout_size(ni) as u32 <= first_hop {
                return false;
            }
        }

        if tree.len() == 1 {
            return front.relative_depth == 1;
        }
        match tree.get(1) {
            Some(second) if second.relative_depth <= 2 => second.consumers.contains(&node),
            _ => false,
        }
    }

    /// Drop interfaces whose outside node was recruited later.
    pub(super) fn cleanup_interfaces(&self, chunk: &mut Chunk) {
        let id = chunk.id;
        chunk
            .input_interfaces
            .retain(|ii| self.epochs[ii.outer.index()] != id);
        chunk
            .output_interfaces
            .retain(|oi| self.epochs[oi.outer.index()] != id);
    }
}
