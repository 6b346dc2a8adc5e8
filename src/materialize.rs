//! Relay network emission.
//!
//! Once a schedule is final and the counter is up to date, every node's tree
//! is realized as a chain of relays, one per level down to its deepest
//! layer. Consumers tap the chain at their relative depth; a full relay is
//! replaced by a fresh one branching from one level lower. The number of
//! relays emitted must match the counter's total exactly.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::counter::FanoutTreeCounter;
use crate::network::{InMemoryNetwork, LogicNetwork, NetworkError};
use crate::policy::ScheduleConfig;
use crate::schedule::Schedule;
use crate::types::{NodeId, NodeKind, Signal};

/// Error type for materialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaterializeError {
    /// The counter does not reflect the current levels.
    #[error("Relay trees are stale, rebuild before materializing")]
    StaleBuckets,
    /// Emitted relays differ from the counted total.
    #[error("Emitted {actual} relays, counter expected {expected}")]
    RelayCountMismatch {
        /// Counter total.
        expected: u64,
        /// Relays in the emitted network.
        actual: u64,
    },
    /// A consumer asked for a depth the node's chain does not reach.
    #[error("Node {node} has no relay layer at depth {depth}")]
    LayerMissing {
        /// Producer in the source network.
        node: NodeId,
        /// Requested relative depth.
        depth: u32,
    },
    /// Building the emitted network failed.
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// A structural defect found by [`RelayNetwork::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayNetworkViolation {
    /// An edge does not span exactly one level.
    #[error("Edge {producer}@{producer_level} -> {consumer}@{consumer_level} does not span one level")]
    EdgeSpan {
        /// Producer.
        producer: NodeId,
        /// Producer level.
        producer_level: u32,
        /// Consumer.
        consumer: NodeId,
        /// Consumer level.
        consumer_level: u32,
    },
    /// An output does not sit one level above its driver.
    #[error("Output {output}@{output_level} is not one level above {driver}@{driver_level}")]
    OutputSpan {
        /// Output index.
        output: usize,
        /// Output level.
        output_level: u32,
        /// Driver.
        driver: NodeId,
        /// Driver level.
        driver_level: u32,
    },
    /// A node drives more edges than its capacity.
    #[error("Node {node} drives {fanout} edges, capacity is {capacity}")]
    Overloaded {
        /// The node.
        node: NodeId,
        /// Edges it drives.
        fanout: usize,
        /// Its capacity.
        capacity: u32,
    },
}

/// A network with explicit relays and one level per node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayNetwork {
    network: InMemoryNetwork,
    levels: Vec<u32>,
    output_levels: Vec<u32>,
    /// Source node of every emitted node; relays map to the node whose tree
    /// they belong to.
    origin: Vec<NodeId>,
    /// Levels an edge may skip after relay chains were removed.
    #[serde(default)]
    skipped_levels: u32,
}

impl RelayNetwork {
    /// The emitted network.
    pub fn network(&self) -> &InMemoryNetwork {
        &self.network
    }

    /// Level of an emitted node.
    pub fn level(&self, node: NodeId) -> u32 {
        self.levels[node.index()]
    }

    /// Level of an output.
    pub fn output_level(&self, output: usize) -> u32 {
        self.output_levels[output]
    }

    /// Source node an emitted node came from.
    pub fn origin(&self, node: NodeId) -> NodeId {
        self.origin[node.index()]
    }

    /// Relays in the emitted network.
    pub fn num_relays(&self) -> usize {
        self.network.num_relays()
    }

    /// Longest relay run removed so far, 0 for a freshly emitted network.
    pub fn skipped_levels(&self) -> u32 {
        self.skipped_levels
    }

    /// Replace runs of single-fanout relays by direct edges.
    ///
    /// A run is the maximal sequence of relays each feeding exactly one
    /// edge. Its first `m` relays are dropped, where `m` is the largest
    /// multiple of `phase_period` not above the run length and not above
    /// `max_phase_skip`; the node after them is fed by the run's source.
    /// Complemented edges along the run are folded into the new edge.
    /// Node ids are compacted. Returns the longest run removed.
    pub fn remove_relay_chains(&mut self, config: &ScheduleConfig) -> Result<u32, NetworkError> {
        let ntk = &self.network;
        let period = config.phase_period.max(1);
        let limit = config.max_phase_skip / period * period;
        let size = ntk.size();

        // source signal, run head and position of every single-fanout relay
        let mut runs: Vec<Option<(Signal, NodeId, u32)>> = vec![None; size];
        let mut run_len = vec![0u32; size];
        for n in ntk.nodes() {
            if !ntk.kind(n).is_relay() || ntk.fanout_size(n) != 1 {
                continue;
            }
            let fanin = match ntk.fanins(n) {
                [fanin] => *fanin,
                _ => continue,
            };
            let (source, head, position) = match runs[fanin.node.index()] {
                Some((source, head, position)) => (
                    Signal::new(source.node, source.complemented != fanin.complemented),
                    head,
                    position + 1,
                ),
                None => (fanin, n, 1),
            };
            runs[n.index()] = Some((source, head, position));
            run_len[head.index()] = run_len[head.index()].max(position);
        }

        let mut removed = vec![false; size];
        let mut longest = 0;
        for n in ntk.nodes() {
            if let Some((_, head, position)) = runs[n.index()] {
                let cut = limit.min(run_len[head.index()] / period * period);
                if position <= cut {
                    removed[n.index()] = true;
                    longest = longest.max(cut);
                }
            }
        }
        if longest == 0 {
            return Ok(0);
        }

        let resolve = |signal: Signal| -> Signal {
            match runs[signal.node.index()] {
                Some((source, _, _)) if removed[signal.node.index()] => {
                    Signal::new(source.node, source.complemented != signal.complemented)
                }
                _ => signal,
            }
        };

        let mut out = InMemoryNetwork::new();
        let mut mapped = vec![NodeId::new(0); size];
        let mut levels = vec![0];
        let mut origin = vec![NodeId::new(0)];
        let remap = |mapped: &[NodeId], signal: Signal| {
            let signal = resolve(signal);
            Signal::new(mapped[signal.node.index()], signal.complemented)
        };
        for n in ntk.nodes() {
            if removed[n.index()] {
                continue;
            }
            let signal = match ntk.kind(n) {
                NodeKind::Constant => continue,
                NodeKind::Input => out.add_input(),
                NodeKind::Gate(function) => {
                    let children: Vec<Signal> = ntk.fanins(n).iter().map(|&fi| remap(&mapped, fi)).collect();
                    out.add_gate(function, &children)?
                }
                NodeKind::Relay => match ntk.fanins(n) {
                    [fanin] => out.add_relay(remap(&mapped, *fanin))?,
                    other => {
                        return Err(NetworkError::ArityMismatch {
                            function: NodeKind::Relay.to_string(),
                            expected: 1,
                            actual: other.len(),
                        })
                    }
                },
            };
            mapped[n.index()] = signal.node;
            levels.push(self.levels[n.index()]);
            origin.push(self.origin[n.index()]);
        }
        for &f in ntk.outputs() {
            out.add_output(remap(&mapped, f))?;
        }

        info!(
            relays_before = ntk.num_relays(),
            relays_after = out.num_relays(),
            longest,
            "Relay chains removed"
        );
        self.network = out;
        self.levels = levels;
        self.origin = origin;
        self.skipped_levels = self.skipped_levels.max(longest);
        Ok(longest)
    }

    /// Whether an edge spanning `span` levels is legal: one level, or one
    /// level plus a removed run of whole periods.
    fn span_ok(&self, span: u32, config: &ScheduleConfig) -> bool {
        match span {
            0 => false,
            1 => true,
            _ => span - 1 <= self.skipped_levels && (span - 1) % config.phase_period.max(1) == 0,
        }
    }

    /// Check that every edge spans one level and no node exceeds its
    /// capacity. Returns every violation found, empty when well-formed.
    ///
    /// After [`remove_relay_chains`](Self::remove_relay_chains) an edge may
    /// also skip whole periods, up to the longest run removed.
    pub fn verify(&self, config: &ScheduleConfig) -> Vec<RelayNetworkViolation> {
        let ntk = &self.network;
        let mut violations = Vec::new();

        for n in ntk.nodes() {
            let capacity = match ntk.kind(n) {
                NodeKind::Constant => continue,
                NodeKind::Input => config.first_hop_capacity,
                NodeKind::Gate(_) => 1,
                NodeKind::Relay => config.relay_capacity,
            };
            let fanout = ntk.fanout_size(n);
            if fanout > capacity as usize {
                violations.push(RelayNetworkViolation::Overloaded { node: n, fanout, capacity });
            }
            for fi in ntk.fanins(n) {
                if ntk.is_constant(fi.node) {
                    continue;
                }
                if !self.span_ok(self.level(n).saturating_sub(self.level(fi.node)), config) {
                    violations.push(RelayNetworkViolation::EdgeSpan {
                        producer: fi.node,
                        producer_level: self.level(fi.node),
                        consumer: n,
                        consumer_level: self.level(n),
                    });
                }
            }
        }

        for (output, signal) in ntk.outputs().iter().enumerate() {
            if ntk.is_constant(signal.node) {
                continue;
            }
            let output_level = self.output_level(output);
            let driver_level = self.level(signal.node);
            if !self.span_ok(output_level.saturating_sub(driver_level), config) {
                violations.push(RelayNetworkViolation::OutputSpan {
                    output,
                    output_level,
                    driver: signal.node,
                    driver_level,
                });
            }
        }
        violations
    }
}

/// Relay layers of one source node; the last signal of a layer is the one
/// currently tapped.
type RelayChain = Vec<Vec<Signal>>;

/// Emits the relay network for a final schedule.
pub struct NetworkMaterializer<'a, N: LogicNetwork> {
    ntk: &'a N,
    config: &'a ScheduleConfig,
    schedule: &'a Schedule,
    counter: &'a FanoutTreeCounter,
}

struct Emitter<'c> {
    config: &'c ScheduleConfig,
    out: InMemoryNetwork,
    levels: Vec<u32>,
    origin: Vec<NodeId>,
    /// Fanout slots handed out per emitted node. A gate's children are all
    /// tapped before the gate exists, so the emitted fanout lags behind.
    taps: Vec<usize>,
}

impl<'c> Emitter<'c> {
    fn new(config: &'c ScheduleConfig) -> Self {
        Self {
            config,
            out: InMemoryNetwork::new(),
            levels: vec![0],
            origin: vec![NodeId::new(0)],
            taps: vec![0],
        }
    }

    fn record(&mut self, signal: Signal, level: u32, origin: NodeId) {
        debug_assert_eq!(signal.node.index(), self.levels.len());
        self.levels.push(level);
        self.origin.push(origin);
        self.taps.push(0);
    }

    fn reserve(&mut self, node: NodeId) {
        self.taps[node.index()] += 1;
    }

    fn relay(&mut self, from: Signal, level: u32, origin: NodeId) -> Result<Signal, NetworkError> {
        let relay = self.out.add_relay(from)?;
        self.record(relay, level, origin);
        Ok(relay)
    }

    fn capacity(&self, node: NodeId) -> usize {
        match self.out.kind(node) {
            NodeKind::Input => self.config.first_hop_capacity as usize,
            NodeKind::Relay => self.config.relay_capacity as usize,
            NodeKind::Gate(_) | NodeKind::Constant => 1,
        }
    }

    /// Signal feeding a consumer `depth + 1` levels above the source node.
    fn tap(&mut self, chain: &mut RelayChain, source: NodeId, base: u32, depth: u32) -> Result<Signal, MaterializeError> {
        let missing = MaterializeError::LayerMissing { node: source, depth };
        let current = match chain.get(depth as usize).and_then(|layer| layer.last()) {
            Some(&current) => current,
            None => return Err(missing),
        };
        if self.taps[current.node.index()] < self.capacity(current.node) {
            self.reserve(current.node);
            return Ok(current);
        }
        if depth == 0 {
            return Err(missing);
        }
        let lower = self.tap(chain, source, base, depth - 1)?;
        let fresh = self.relay(lower, base + depth, source)?;
        self.reserve(fresh.node);
        chain[depth as usize].push(fresh);
        Ok(fresh)
    }
}

impl<'a, N: LogicNetwork> NetworkMaterializer<'a, N> {
    /// Create a materializer. `counter` must hold the trees of `schedule`.
    pub fn new(
        ntk: &'a N,
        config: &'a ScheduleConfig,
        schedule: &'a Schedule,
        counter: &'a FanoutTreeCounter,
    ) -> Self {
        Self { ntk, config, schedule, counter }
    }

    /// Emit the network with relays.
    pub fn materialize(&self) -> Result<RelayNetwork, MaterializeError> {
        let expected = self.counter.total_relays().ok_or(MaterializeError::StaleBuckets)?;
        let ntk = self.ntk;

        let mut emitter = Emitter::new(self.config);
        let mut chains: Vec<RelayChain> = vec![Vec::new(); ntk.size()];

        for n in ntk.nodes() {
            let level = self.schedule.level(n);
            let signal = match ntk.kind(n) {
                NodeKind::Constant => continue,
                NodeKind::Input => {
                    let signal = emitter.out.add_input();
                    emitter.record(signal, level, n);
                    signal
                }
                kind => {
                    let mut children = Vec::with_capacity(ntk.fanins(n).len());
                    for fi in ntk.fanins(n) {
                        let s = if ntk.is_constant(fi.node) {
                            emitter.out.constant(false)
                        } else {
                            let base = self.schedule.level(fi.node);
                            let depth = level.saturating_sub(base + 1);
                            emitter.tap(&mut chains[fi.node.index()], fi.node, base, depth)?
                        };
                        children.push(if fi.complemented { s.complement() } else { s });
                    }
                    let signal = match (kind, children.as_slice()) {
                        (NodeKind::Gate(function), _) => emitter.out.add_gate(function, &children)?,
                        (_, &[child]) => emitter.out.add_relay(child)?,
                        (_, other) => {
                            return Err(NetworkError::ArityMismatch {
                                function: kind.to_string(),
                                expected: 1,
                                actual: other.len(),
                            }
                            .into())
                        }
                    };
                    emitter.record(signal, level, n);
                    signal
                }
            };
            chains[n.index()] = self.chain_for(&mut emitter, n, signal)?;
        }

        for (i, f) in ntk.outputs().iter().enumerate() {
            let s = if ntk.is_constant(f.node) {
                emitter.out.constant(false)
            } else {
                let base = self.schedule.level(f.node);
                let depth = self.schedule.po_level(i).saturating_sub(base + 1);
                emitter.tap(&mut chains[f.node.index()], f.node, base, depth)?
            };
            emitter.out.add_output(if f.complemented { s.complement() } else { s })?;
        }

        let actual = emitter.out.num_relays() as u64;
        if actual != expected {
            return Err(MaterializeError::RelayCountMismatch { expected, actual });
        }
        info!(
            nodes = emitter.out.size(),
            relays = actual,
            depth = self.schedule.depth,
            "Relay network materialized"
        );

        Ok(RelayNetwork {
            network: emitter.out,
            levels: emitter.levels,
            output_levels: self.schedule.po_levels.clone(),
            origin: emitter.origin,
            skipped_levels: 0,
        })
    }

    /// One relay per level from the node down to its deepest layer.
    fn chain_for(&self, emitter: &mut Emitter<'_>, n: NodeId, signal: Signal) -> Result<RelayChain, MaterializeError> {
        if self.ntk.fanout_size(n) == 0 {
            debug!(node = %n, "Skipping dangling node");
            return Ok(Vec::new());
        }
        let deepest = self
            .counter
            .tree(n)
            .back()
            .map(|b| b.relative_depth)
            .ok_or(MaterializeError::StaleBuckets)?;

        let base = self.schedule.level(n);
        let mut chain: RelayChain = Vec::with_capacity(deepest as usize);
        chain.push(vec![signal]);
        let mut tail = signal;
        for depth in 1..deepest {
            emitter.reserve(tail.node);
            tail = emitter.relay(tail, base + depth, n)?;
            chain.push(vec![tail]);
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{LevelAssigner, Orientation};
    use crate::types::GateFunction;

    fn materialize(ntk: &InMemoryNetwork, config: &ScheduleConfig, schedule: &Schedule) -> RelayNetwork {
        let mut counter = FanoutTreeCounter::new(ntk, config);
        counter.rebuild_all(ntk, schedule).unwrap();
        NetworkMaterializer::new(ntk, config, schedule, &counter)
            .materialize()
            .unwrap()
    }

    #[test]
    fn test_hub_tree_materializes() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let hub = ntk.add_gate(GateFunction::And, &[a, b]).unwrap();
        for _ in 0..4 {
            let c = ntk.add_input();
            let g = ntk.add_gate(GateFunction::Or, &[hub, c]).unwrap();
            ntk.add_output(g).unwrap();
        }
        let config = ScheduleConfig::default().with_capacities(1, 3);
        let schedule = LevelAssigner::new(&ntk, &config).asap();
        let relayed = materialize(&ntk, &config, &schedule);

        // hub: 3 relays; each leaf input waits 3 levels for its gate
        assert_eq!(relayed.num_relays(), 15);
        let out = relayed.network();
        let hub_relays = out
            .nodes()
            .filter(|&n| out.kind(n).is_relay() && relayed.origin(n) == hub.node)
            .count();
        assert_eq!(hub_relays, 3);
        assert!(relayed.verify(&config).is_empty());
    }

    #[test]
    fn test_single_consumer_chain() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let g = ntk.add_gate(GateFunction::And, &[a, b]).unwrap();
        ntk.add_output(g).unwrap();

        let config = ScheduleConfig::default();
        let mut schedule = Schedule::new(ntk.size(), 1, Orientation::Provided);
        schedule.set_level(g.node, 5);
        schedule.po_levels = vec![6];
        schedule.depth = 5;

        let relayed = materialize(&ntk, &config, &schedule);
        assert_eq!(relayed.num_relays(), 8);
        assert!(relayed.verify(&config).is_empty());
    }

    #[test]
    fn test_repeated_fanin_reserves_taps() {
        let mut ntk = InMemoryNetwork::new();
        let x = ntk.add_input();
        let g = ntk.add_gate(GateFunction::Maj, &[x, x, x]).unwrap();
        ntk.add_output(g).unwrap();

        let config = ScheduleConfig::default().with_capacities(1, 2);
        let schedule = LevelAssigner::new(&ntk, &config).asap();
        let mut counter = FanoutTreeCounter::new(&ntk, &config);
        counter.rebuild_all(&ntk, &schedule).unwrap();
        assert_eq!(counter.relay_count(x.node), Some(3));

        let relayed = NetworkMaterializer::new(&ntk, &config, &schedule, &counter)
            .materialize()
            .unwrap();
        assert_eq!(relayed.num_relays(), 3);
        assert!(relayed.verify(&config).is_empty());
    }

    /// `AND(!a, b)` five levels above both inputs: two runs of four relays.
    fn build_long_edges() -> (InMemoryNetwork, Schedule) {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let g = ntk.add_gate(GateFunction::And, &[a.complement(), b]).unwrap();
        ntk.add_output(g).unwrap();

        let mut schedule = Schedule::new(ntk.size(), 1, Orientation::Provided);
        schedule.set_level(g.node, 5);
        schedule.po_levels = vec![6];
        schedule.depth = 5;
        (ntk, schedule)
    }

    #[test]
    fn test_remove_relay_chains_whole_runs() {
        let (ntk, schedule) = build_long_edges();
        let config = ScheduleConfig::default();
        let mut relayed = materialize(&ntk, &config, &schedule);
        assert_eq!(relayed.num_relays(), 8);

        assert_eq!(relayed.remove_relay_chains(&config).unwrap(), 4);
        assert_eq!(relayed.num_relays(), 0);
        assert_eq!(relayed.skipped_levels(), 4);

        let out = relayed.network();
        let gate = out.gates().next().unwrap();
        assert_eq!(relayed.level(gate), 5);
        assert_eq!(
            out.fanins(gate),
            &[Signal::new(NodeId::new(1), true), Signal::plain(NodeId::new(2))]
        );
        assert_eq!(relayed.origin(gate), NodeId::new(3));
        assert!(relayed.verify(&config).is_empty());

        // nothing left to remove
        assert_eq!(relayed.remove_relay_chains(&config).unwrap(), 0);
    }

    #[test]
    fn test_remove_relay_chains_bounded_by_skip_and_period() {
        let (ntk, schedule) = build_long_edges();

        let config = ScheduleConfig {
            max_phase_skip: 2,
            ..ScheduleConfig::default()
        };
        let mut relayed = materialize(&ntk, &config, &schedule);
        assert_eq!(relayed.remove_relay_chains(&config).unwrap(), 2);
        assert_eq!(relayed.num_relays(), 4);
        assert!(relayed.verify(&config).is_empty());

        let config = ScheduleConfig::default().with_phases(3, vec![0]);
        let mut relayed = materialize(&ntk, &config, &schedule);
        assert_eq!(relayed.remove_relay_chains(&config).unwrap(), 3);
        assert_eq!(relayed.num_relays(), 2);
        let out = relayed.network();
        for relay in out.nodes().filter(|&n| out.kind(n).is_relay()) {
            assert_eq!(relayed.level(relay), 4);
        }
        assert!(relayed.verify(&config).is_empty());
    }

    #[test]
    fn test_remove_relay_chains_keeps_branching_relays() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let g1 = ntk.add_gate(GateFunction::And, &[a, a]).unwrap();
        ntk.add_output(g1).unwrap();

        // both taps share the single relay below `g1`
        let config = ScheduleConfig::default();
        let schedule = LevelAssigner::new(&ntk, &config).asap();
        let mut relayed = materialize(&ntk, &config, &schedule);
        assert_eq!(relayed.num_relays(), 1);
        assert_eq!(relayed.remove_relay_chains(&config).unwrap(), 0);
        assert_eq!(relayed.num_relays(), 1);
        assert_eq!(relayed.skipped_levels(), 0);
    }

    #[test]
    fn test_complements_and_constants_preserved() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let g = ntk.add_gate(GateFunction::And, &[a.complement(), b]).unwrap();
        let one = ntk.constant(true);
        let h = ntk.add_gate(GateFunction::Or, &[g, one]).unwrap();
        ntk.add_output(h.complement()).unwrap();
        ntk.add_output(one).unwrap();

        let config = ScheduleConfig::default();
        let schedule = LevelAssigner::new(&ntk, &config).asap();
        let relayed = materialize(&ntk, &config, &schedule);
        let out = relayed.network();

        assert_eq!(relayed.num_relays(), 0);
        let gates: Vec<NodeId> = out.gates().collect();
        assert_eq!(gates.len(), 2);
        assert!(out.fanins(gates[0])[0].complemented);
        assert_eq!(out.fanins(gates[1])[1], out.constant(true));
        assert!(out.outputs()[0].complemented);
        assert_eq!(out.outputs()[1], out.constant(true));
        assert!(relayed.verify(&config).is_empty());
    }

    #[test]
    fn test_stale_counter_rejected() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        ntk.add_output(a).unwrap();
        let config = ScheduleConfig::default();
        let schedule = LevelAssigner::new(&ntk, &config).asap();
        let counter = FanoutTreeCounter::new(&ntk, &config);

        let result = NetworkMaterializer::new(&ntk, &config, &schedule, &counter).materialize();
        assert_eq!(result.unwrap_err(), MaterializeError::StaleBuckets);
    }

    #[test]
    fn test_verify_reports_violations() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let g = ntk.add_gate(GateFunction::And, &[a, a]).unwrap();
        ntk.add_output(g).unwrap();
        let relayed = RelayNetwork {
            network: ntk,
            levels: vec![0, 0, 2],
            output_levels: vec![3],
            origin: vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)],
            skipped_levels: 0,
        };

        let violations = relayed.verify(&ScheduleConfig::default());
        assert!(violations.contains(&RelayNetworkViolation::Overloaded {
            node: a.node,
            fanout: 2,
            capacity: 1,
        }));
        assert_eq!(
            violations
                .iter()
                .filter(|v| matches!(v, RelayNetworkViolation::EdgeSpan { .. }))
                .count(),
            2
        );
    }
}
