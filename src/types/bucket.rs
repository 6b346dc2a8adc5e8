//! Layered fanout buckets.
//!
//! A node's relay tree is described layer by layer, keyed by relative depth
//! `d = level(consumer) - level(producer)`. Each layer records the real
//! consumers and primary-output indices that sit at that depth and the total
//! number of edges arriving at the layer, real plus synthetic (relays feeding
//! the next layer up).
//!
//! ```text
//! d=1  [ edges: 1 ]                  one relay driven by the producer
//! d=2  [ edges: 3, consumers: a b ]  a, b and one relay
//! d=3  [ edges: 2, consumers: c d ]
//! ```

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// One layer of a fanout tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutBucket {
    /// Levels between the producer and this layer.
    pub relative_depth: u32,
    /// Real gate consumers at this depth.
    pub consumers: Vec<NodeId>,
    /// Primary outputs at this depth (by output index).
    pub outputs: Vec<usize>,
    /// Edges arriving at this layer, real and synthetic.
    pub edges: u32,
}

impl FanoutBucket {
    /// Create a bucket.
    pub fn new(relative_depth: u32, consumers: Vec<NodeId>, outputs: Vec<usize>, edges: u32) -> Self {
        Self {
            relative_depth,
            consumers,
            outputs,
            edges,
        }
    }

    /// A bucket holding only synthetic edges.
    pub fn synthetic(relative_depth: u32, edges: u32) -> Self {
        Self::new(relative_depth, Vec::new(), Vec::new(), edges)
    }

    /// Number of real sinks in this layer.
    pub fn real_edges(&self) -> u32 {
        (self.consumers.len() + self.outputs.len()) as u32
    }

    /// Edges in this layer that are relays rather than real sinks.
    pub fn synthetic_edges(&self) -> u32 {
        self.edges.saturating_sub(self.real_edges())
    }
}

/// The layered fanout tree of one node, sorted by ascending relative depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutTree {
    buckets: Vec<FanoutBucket>,
}

impl FanoutTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the tree has no layers (dangling node).
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Shallowest layer.
    pub fn front(&self) -> Option<&FanoutBucket> {
        self.buckets.first()
    }

    /// Deepest layer.
    pub fn back(&self) -> Option<&FanoutBucket> {
        self.buckets.last()
    }

    /// Layer by position.
    pub fn get(&self, position: usize) -> Option<&FanoutBucket> {
        self.buckets.get(position)
    }

    /// Mutable layer by position.
    pub fn get_mut(&mut self, position: usize) -> Option<&mut FanoutBucket> {
        self.buckets.get_mut(position)
    }

    /// Iterate over layers, shallowest first.
    pub fn iter(&self) -> std::slice::Iter<'_, FanoutBucket> {
        self.buckets.iter()
    }

    /// Drop every layer.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Insert a bucket at `position`, keeping the caller responsible for order.
    pub(crate) fn insert_at(&mut self, position: usize, bucket: FanoutBucket) {
        self.buckets.insert(position, bucket);
    }

    /// Position of the first layer with depth `>= relative_depth`.
    fn lower_bound(&self, relative_depth: u32) -> usize {
        self.buckets
            .partition_point(|b| b.relative_depth < relative_depth)
    }

    /// Record a real gate consumer at `relative_depth`.
    pub fn insert_consumer(&mut self, relative_depth: u32, consumer: NodeId) {
        let pos = self.lower_bound(relative_depth);
        match self.buckets.get_mut(pos) {
            Some(b) if b.relative_depth == relative_depth => {
                b.consumers.push(consumer);
                b.edges += 1;
            }
            _ => self
                .buckets
                .insert(pos, FanoutBucket::new(relative_depth, vec![consumer], Vec::new(), 1)),
        }
    }

    /// Record a primary output at `relative_depth`.
    pub fn insert_output(&mut self, relative_depth: u32, output: usize) {
        let pos = self.lower_bound(relative_depth);
        match self.buckets.get_mut(pos) {
            Some(b) if b.relative_depth == relative_depth => {
                b.outputs.push(output);
                b.edges += 1;
            }
            _ => self
                .buckets
                .insert(pos, FanoutBucket::new(relative_depth, Vec::new(), vec![output], 1)),
        }
    }

    /// Real consumers in layer order.
    pub fn consumers(&self) -> Vec<NodeId> {
        self.buckets
            .iter()
            .flat_map(|b| b.consumers.iter().copied())
            .collect()
    }

    /// Primary outputs in layer order.
    pub fn outputs(&self) -> Vec<usize> {
        self.buckets
            .iter()
            .flat_map(|b| b.outputs.iter().copied())
            .collect()
    }

    /// Relative depth of the layer holding `consumer`, if any.
    pub fn depth_of_consumer(&self, consumer: NodeId) -> Option<u32> {
        self.buckets
            .iter()
            .find(|b| b.consumers.contains(&consumer))
            .map(|b| b.relative_depth)
    }

    /// Collapse the tree bottom-up into relays of `relay_capacity`.
    ///
    /// Walking from the deepest layer toward depth 1, each layer needs
    /// `ceil(edges / K)` relays one level shallower. Those relays either join
    /// the next shallower layer or, when that layer is more than one level
    /// away and more than one relay is needed, form a synthetic layer of their
    /// own. A depth-1 layer is created when missing. Trees with a single edge
    /// are left untouched.
    pub fn collapse(&mut self, relay_capacity: u32) {
        if self.buckets.is_empty() || (self.buckets.len() == 1 && self.buckets[0].edges == 1) {
            return;
        }
        if self.buckets[0].relative_depth > 1 {
            self.buckets.insert(0, FanoutBucket::synthetic(1, 0));
        }

        let mut pos = self.buckets.len() - 1;
        while pos > 0 {
            let needed = self.buckets[pos].edges.div_ceil(relay_capacity);
            let rd = self.buckets[pos].relative_depth;
            pos -= 1;
            if self.buckets[pos].relative_depth + 1 < rd && needed > 1 {
                pos += 1;
                self.buckets.insert(pos, FanoutBucket::synthetic(rd - 1, needed));
            } else {
                self.buckets[pos].edges += needed;
            }
        }
    }

    /// Tentatively move one reference of `consumer` from depth `from` to
    /// depth `to` (`to < from`).
    ///
    /// A new layer created at `to` is charged two edges: the moved consumer
    /// and the relay that now has to continue toward the old layers. Edge
    /// counts are no longer a collapsed tree afterwards; rebuild before
    /// counting. Returns `false` if `consumer` was not found at `from`.
    pub(crate) fn relocate_consumer(&mut self, consumer: NodeId, from: u32, to: u32) -> bool {
        let pos = self.lower_bound(to);
        match self.buckets.get_mut(pos) {
            Some(b) if b.relative_depth == to => {
                b.edges += 1;
                b.consumers.push(consumer);
            }
            Some(_) => self
                .buckets
                .insert(pos, FanoutBucket::new(to, vec![consumer], Vec::new(), 2)),
            None => return false,
        }

        for b in self.buckets[pos..].iter_mut() {
            if b.relative_depth == from {
                b.edges = b.edges.saturating_sub(1);
                return match b.consumers.iter().position(|&c| c == consumer) {
                    Some(i) => {
                        b.consumers.remove(i);
                        true
                    }
                    None => false,
                };
            }
        }
        false
    }
}

impl<'a> IntoIterator for &'a FanoutTree {
    type Item = &'a FanoutBucket;
    type IntoIter = std::slice::Iter<'a, FanoutBucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_stay_sorted() {
        let mut tree = FanoutTree::new();
        tree.insert_consumer(3, NodeId::new(10));
        tree.insert_consumer(1, NodeId::new(11));
        tree.insert_output(2, 0);
        tree.insert_consumer(3, NodeId::new(12));

        let depths: Vec<u32> = tree.iter().map(|b| b.relative_depth).collect();
        assert_eq!(depths, vec![1, 2, 3]);
        assert_eq!(tree.back().map(|b| b.edges), Some(2));
        assert_eq!(tree.consumers(), vec![NodeId::new(11), NodeId::new(10), NodeId::new(12)]);
        assert_eq!(tree.outputs(), vec![0]);
    }

    #[test]
    fn test_synthetic_edges() {
        let mut bucket = FanoutBucket::new(2, vec![NodeId::new(1)], vec![4], 2);
        assert_eq!(bucket.synthetic_edges(), 0);
        bucket.edges += 3;
        assert_eq!(bucket.synthetic_edges(), 3);
        assert_eq!(FanoutBucket::synthetic(1, 2).real_edges(), 0);
    }

    fn make_tree(consumers: &[(u32, u32)]) -> FanoutTree {
        let mut tree = FanoutTree::new();
        for &(rd, id) in consumers {
            tree.insert_consumer(rd, NodeId::new(id));
        }
        tree
    }

    #[test]
    fn test_collapse_merges_into_shallower_layers() {
        let mut tree = make_tree(&[(2, 1), (2, 2), (3, 3), (3, 4)]);
        tree.collapse(3);

        let layers: Vec<(u32, u32)> = tree.iter().map(|b| (b.relative_depth, b.edges)).collect();
        assert_eq!(layers, vec![(1, 1), (2, 3), (3, 2)]);
    }

    #[test]
    fn test_collapse_inserts_synthetic_layer() {
        let mut tree = make_tree(&[(3, 1), (3, 2), (3, 3), (3, 4)]);
        tree.collapse(2);

        let layers: Vec<(u32, u32)> = tree.iter().map(|b| (b.relative_depth, b.edges)).collect();
        assert_eq!(layers, vec![(1, 1), (2, 2), (3, 4)]);
        assert_eq!(tree.get(1).map(|b| b.synthetic_edges()), Some(2));
    }

    #[test]
    fn test_collapse_single_edge_untouched() {
        let mut tree = make_tree(&[(5, 1)]);
        tree.collapse(2);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.front().map(|b| b.relative_depth), Some(5));
    }

    #[test]
    fn test_relocate_consumer() {
        let mut tree = make_tree(&[(2, 1), (2, 2), (3, 3), (3, 4)]);
        tree.collapse(3);

        assert!(tree.relocate_consumer(NodeId::new(3), 3, 2));
        assert_eq!(tree.get(1).map(|b| b.edges), Some(4));
        assert_eq!(tree.back().map(|b| (b.edges, b.consumers.clone())), Some((1, vec![NodeId::new(4)])));

        // unknown consumer
        assert!(!tree.relocate_consumer(NodeId::new(9), 3, 2));
    }

    #[test]
    fn test_relocate_into_new_layer() {
        let mut tree = make_tree(&[(4, 1), (4, 2)]);
        tree.collapse(2);
        assert!(tree.relocate_consumer(NodeId::new(2), 4, 2));

        let layers: Vec<(u32, u32)> = tree.iter().map(|b| (b.relative_depth, b.edges)).collect();
        assert_eq!(layers, vec![(1, 1), (2, 2), (4, 1)]);
    }

    #[test]
    fn test_depth_of_consumer() {
        let mut tree = FanoutTree::new();
        tree.insert_consumer(4, NodeId::new(2));
        assert_eq!(tree.depth_of_consumer(NodeId::new(2)), Some(4));
        assert_eq!(tree.depth_of_consumer(NodeId::new(3)), None);
    }
}
