//! Relay counting.
//!
//! For a fixed level assignment, [`FanoutTreeCounter`] builds the layered
//! fanout tree of every node, collapses it into relays of the configured
//! capacity, and derives the minimum number of relays the node needs. It is
//! the cost oracle of the scheduler and the optimizer.
//!
//! Trees are rebuilt either for the whole network or per node. Any level
//! change invalidates the whole-graph state; queries return `None` until the
//! next [`FanoutTreeCounter::rebuild_all`].

use tracing::warn;

use crate::network::LogicNetwork;
use crate::policy::ScheduleConfig;
use crate::schedule::Schedule;
use crate::types::{FanoutTree, NodeId};

/// A level assignment that cannot be realized with relays.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// The depth-1 layer of a tree holds more edges than the node can drive.
    #[error("Node {node} needs {edges} direct edges, capacity is {capacity}")]
    CapacityExceeded {
        /// Producer.
        node: NodeId,
        /// Edges in the depth-1 layer.
        edges: u32,
        /// Direct capacity of the producer.
        capacity: u32,
    },
    /// A consumer does not sit above its producer.
    #[error("Consumer {consumer} at level {consumer_level} is not above {producer} at level {producer_level}")]
    NonIncreasingEdge {
        /// Producer.
        producer: NodeId,
        /// Producer level.
        producer_level: u32,
        /// Consumer.
        consumer: NodeId,
        /// Consumer level.
        consumer_level: u32,
    },
    /// A primary output does not sit above its driver.
    #[error("Output {output} at level {output_level} is not above {producer} at level {producer_level}")]
    OutputNotAbove {
        /// Driver.
        producer: NodeId,
        /// Driver level.
        producer_level: u32,
        /// Output index.
        output: usize,
        /// Output pseudo-level.
        output_level: u32,
    },
    /// No acceptable input phase exists at or below the required level.
    #[error("Input {node} has no acceptable level at or below {level}")]
    NoAcceptableInputLevel {
        /// The input.
        node: NodeId,
        /// Latest level the input could take.
        level: u32,
    },
}

/// Saved per-node counter state, restored verbatim on rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SavedTree {
    tree: FanoutTree,
    relays: u32,
}

/// Per-node fanout trees and relay counts for one level assignment.
#[derive(Debug, Clone)]
pub struct FanoutTreeCounter {
    first_hop_capacity: u32,
    relay_capacity: u32,
    /// Output indices driven by each node.
    driven_outputs: Vec<Vec<usize>>,
    trees: Vec<FanoutTree>,
    relays: Vec<u32>,
    total: u64,
    outdated: bool,
}

impl FanoutTreeCounter {
    /// Create a counter for `ntk`. It starts outdated.
    pub fn new<N: LogicNetwork>(ntk: &N, config: &ScheduleConfig) -> Self {
        let mut driven_outputs = vec![Vec::new(); ntk.size()];
        for (i, signal) in ntk.outputs().iter().enumerate() {
            if !ntk.is_constant(signal.node) {
                driven_outputs[signal.node.index()].push(i);
            }
        }
        Self {
            first_hop_capacity: config.first_hop_capacity,
            relay_capacity: config.relay_capacity,
            driven_outputs,
            trees: vec![FanoutTree::new(); ntk.size()],
            relays: vec![0; ntk.size()],
            total: 0,
            outdated: true,
        }
    }

    /// Whether levels changed since the last whole-graph rebuild.
    pub fn is_outdated(&self) -> bool {
        self.outdated
    }

    /// Invalidate cached counts after a level rewrite.
    pub fn mark_outdated(&mut self) {
        self.outdated = true;
    }

    /// Rebuild every tree under `schedule` and return the relay total.
    ///
    /// On error the counter stays outdated.
    pub fn rebuild_all<N: LogicNetwork>(&mut self, ntk: &N, schedule: &Schedule) -> Result<u64, InvariantViolation> {
        self.outdated = true;
        let mut result = Ok(());
        for n in ntk.nodes() {
            if ntk.is_constant(n) {
                self.trees[n.index()].clear();
                self.relays[n.index()] = 0;
                continue;
            }
            let tree = match self.build_tree(ntk, schedule, n) {
                Ok(tree) => tree,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            };
            let relays = self.relays_of(ntk, n, &tree);
            if ntk.fanout_size(n) == 0 && !ntk.is_input(n) {
                warn!(node = %n, "Dangling node drives no consumers");
            }
            self.trees[n.index()] = tree;
            self.relays[n.index()] = relays;
        }
        self.total = self.relays.iter().map(|&r| r as u64).sum();
        result?;
        self.outdated = false;
        Ok(self.total)
    }

    /// Rebuild the tree of a single node after its level or the level of one
    /// of its consumers changed.
    ///
    /// The stored tree is only replaced when the new one is realizable; the
    /// running total follows the per-node count.
    pub fn rebuild_node<N: LogicNetwork>(
        &mut self,
        ntk: &N,
        schedule: &Schedule,
        node: NodeId,
    ) -> Result<(), InvariantViolation> {
        if ntk.is_constant(node) {
            return Ok(());
        }
        let tree = self.build_tree(ntk, schedule, node)?;
        let relays = self.relays_of(ntk, node, &tree);
        self.total = self.total - self.relays[node.index()] as u64 + relays as u64;
        self.trees[node.index()] = tree;
        self.relays[node.index()] = relays;
        Ok(())
    }

    /// Relays needed below `node`, or `None` while outdated.
    pub fn relay_count(&self, node: NodeId) -> Option<u32> {
        (!self.outdated).then(|| self.relays[node.index()])
    }

    /// Relays needed in the whole network, or `None` while outdated.
    pub fn total_relays(&self) -> Option<u64> {
        (!self.outdated).then_some(self.total)
    }

    /// Running total, valid between incremental rebuilds.
    pub(crate) fn running_total(&self) -> u64 {
        self.total
    }

    /// The current tree of `node`.
    pub fn tree(&self, node: NodeId) -> &FanoutTree {
        &self.trees[node.index()]
    }

    /// Shallowest relative depth at which `node`'s tree can take one more
    /// consumer without growing.
    ///
    /// Walks the layers below the first relay: a layer is full when it holds
    /// `K` edges per relay of the layer above. The first layer that is not
    /// full, or the first skipped depth, is the spot.
    pub fn lowest_spot<N: LogicNetwork>(&self, ntk: &N, node: NodeId) -> u32 {
        let tree = &self.trees[node.index()];
        let (front, back) = match (tree.front(), tree.back()) {
            (Some(f), Some(b)) => (f, b),
            _ => return 1,
        };

        let mut rd_prev = 1;
        let mut relays_prev = 1;
        if ntk.is_input(node) && self.first_hop_capacity > 1 {
            if front.edges <= self.first_hop_capacity {
                return 1;
            }
            relays_prev = self.first_hop_capacity.saturating_sub(front.real_edges());
        } else if tree.len() == 1 {
            return 1;
        }

        for bucket in tree.iter().skip(1) {
            if bucket.relative_depth > rd_prev + 1 {
                return rd_prev + 1;
            } else if bucket.edges == self.relay_capacity * relays_prev {
                relays_prev = bucket.synthetic_edges();
                rd_prev = bucket.relative_depth;
            } else {
                return bucket.relative_depth;
            }
        }
        back.relative_depth + 1
    }

    /// Tentatively move `consumer` inside `node`'s tree from depth `from` to
    /// depth `to`. The tree must be rebuilt (or restored) before counting.
    pub fn pseudo_move(&mut self, node: NodeId, consumer: NodeId, from: u32, to: u32) -> bool {
        self.trees[node.index()].relocate_consumer(consumer, from, to)
    }

    pub(crate) fn save(&self, node: NodeId) -> SavedTree {
        SavedTree {
            tree: self.trees[node.index()].clone(),
            relays: self.relays[node.index()],
        }
    }

    pub(crate) fn restore(&mut self, node: NodeId, saved: SavedTree) {
        self.total = self.total - self.relays[node.index()] as u64 + saved.relays as u64;
        self.trees[node.index()] = saved.tree;
        self.relays[node.index()] = saved.relays;
    }

    /// Build and collapse the tree of `node` from its consumers' levels.
    fn build_tree<N: LogicNetwork>(
        &self,
        ntk: &N,
        schedule: &Schedule,
        node: NodeId,
    ) -> Result<FanoutTree, InvariantViolation> {
        let level = schedule.level(node);
        let mut tree = FanoutTree::new();

        for &consumer in ntk.fanouts(node) {
            let consumer_level = schedule.level(consumer);
            if consumer_level <= level {
                return Err(InvariantViolation::NonIncreasingEdge {
                    producer: node,
                    producer_level: level,
                    consumer,
                    consumer_level,
                });
            }
            tree.insert_consumer(consumer_level - level, consumer);
        }
        for &output in &self.driven_outputs[node.index()] {
            let output_level = schedule.po_level(output);
            if output_level <= level {
                return Err(InvariantViolation::OutputNotAbove {
                    producer: node,
                    producer_level: level,
                    output,
                    output_level,
                });
            }
            tree.insert_output(output_level - level, output);
        }

        tree.collapse(self.relay_capacity);

        if let Some(front) = tree.front() {
            let capacity = if ntk.is_input(node) { self.first_hop_capacity } else { 1 };
            if front.relative_depth == 1 && front.edges > capacity {
                return Err(InvariantViolation::CapacityExceeded {
                    node,
                    edges: front.edges,
                    capacity,
                });
            }
        }
        Ok(tree)
    }

    /// Relays implied by a collapsed tree.
    fn relays_of<N: LogicNetwork>(&self, ntk: &N, node: NodeId, tree: &FanoutTree) -> u32 {
        let front = match tree.front() {
            Some(front) => front,
            None => return 0,
        };
        if ntk.fanout_size(node) == 1 {
            return front.relative_depth - 1;
        }
        if ntk.is_input(node) && self.first_hop_capacity > 1 && tree.len() == 1 {
            return 0;
        }

        let mut count = front.synthetic_edges();
        let mut rd = front.relative_depth;
        for bucket in tree.iter().skip(1) {
            count += bucket.synthetic_edges() + bucket.relative_depth - rd - 1;
            rd = bucket.relative_depth;
        }
        count
    }
}
