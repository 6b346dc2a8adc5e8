//! Depth-optimal scheduling.
//!
//! `alap_depth` walks the network backwards and places every node at the
//! latest level from which a capacity-constrained relay tree can still reach
//! all of its consumers, then shifts the whole assignment down onto the
//! acceptable input phases. `asap_depth` follows it with a forward pass that
//! pulls each node as early as its relay tree permits.

use super::{LevelAssigner, Orientation, Schedule};
use crate::counter::InvariantViolation;
use crate::network::LogicNetwork;
use crate::types::NodeId;

/// Level assigned to the virtual output sink before shifting.
const SINK_LEVEL: i64 = (u32::MAX - 1) as i64;

#[derive(Debug, Clone, Copy)]
enum Sink {
    Output(usize),
    Node(NodeId),
}

/// One consumer of a node during the mobility pass.
#[derive(Debug, Clone, Copy)]
struct SinkSlot {
    sink: Sink,
    level: u32,
    slack: u32,
}

impl<'a, N: LogicNetwork> LevelAssigner<'a, N> {
    /// Depth-optimal as-late-as-possible levels.
    ///
    /// For each node the consumer levels are sorted descending and merged
    /// bottom-up: crossing each level boundary divides the number of open
    /// edges by the relay capacity, and the node sits where the remaining
    /// edges fit its direct capacity. The result is shifted down so the
    /// lowest node lands on an acceptable phase and `depth % period == 0`.
    pub fn alap_depth(&self) -> Result<Schedule, InvariantViolation> {
        let ntk = self.ntk;
        let k = self.config.relay_capacity as i64;
        let period = self.config.phase_period as i64;
        let first_phase = self.config.first_input_phase() as i64;

        let mut levels = vec![0i64; ntk.size()];
        let mut min_level = SINK_LEVEL;
        let nodes: Vec<NodeId> = ntk.nodes().collect();

        for &n in nodes.iter().rev() {
            if ntk.is_constant(n) {
                continue;
            }
            let fanouts = ntk.fanouts(n);
            let num_outputs = ntk.fanout_size(n) - fanouts.len();
            if fanouts.is_empty() && num_outputs == 0 {
                levels[n.index()] = SINK_LEVEL;
                continue;
            }

            let mut sinks: Vec<i64> = std::iter::repeat(SINK_LEVEL + 1)
                .take(num_outputs)
                .chain(fanouts.iter().map(|f| levels[f.index()]))
                .collect();
            sinks.sort_by(|a, b| b.cmp(a));

            let mut open = 0i64;
            let mut last = sinks[0];
            for &l in &sinks {
                if l != last {
                    let mut i = 0;
                    while i < last - l && open != 1 {
                        open = ceil_div(open, k);
                        i += 1;
                    }
                    last = l;
                }
                open += 1;
            }

            last -= 1;
            let capacity = if ntk.is_input(n) {
                self.config.first_hop_capacity as i64
            } else {
                1
            };
            while open > capacity {
                open = ceil_div(open, k);
                last -= 1;
            }
            levels[n.index()] = last;
            min_level = min_level.min(last);
        }

        let mut delta = min_level;
        let rem = (SINK_LEVEL - delta) % period;
        if rem != 0 {
            delta -= period - rem;
        }
        while min_level - delta < first_phase {
            delta -= period;
        }

        let depth = (SINK_LEVEL - delta) as u32;
        let mut schedule = Schedule::new(ntk.size(), ntk.num_outputs(), Orientation::Alap);
        schedule.depth = depth;

        for &n in &nodes {
            if ntk.is_constant(n) {
                continue;
            }
            let shifted = (levels[n.index()] - delta).max(0) as u32;
            let level = if ntk.is_input(n) {
                if ntk.fanout_size(n) == 0 {
                    first_phase as u32
                } else {
                    self.settle_input(n, shifted)?
                }
            } else {
                shifted
            };
            schedule.set_level(n, level);
        }

        // An output may only leave the sink level when its driver feeds no
        // gates; otherwise pulling it in could overfill the driver's tree.
        let p = self.config.phase_period;
        for (i, signal) in ntk.outputs().iter().enumerate() {
            schedule.po_levels[i] = if self.config.balance_outputs {
                depth + 1
            } else if ntk.is_constant(signal.node) {
                1
            } else if ntk.fanouts(signal.node).is_empty() {
                let reach = schedule.level(signal.node) + self.splitter_levels(signal.node);
                reach.div_ceil(p) * p + 1
            } else {
                depth + 1
            };
        }
        Ok(schedule)
    }

    /// Depth-optimal as-soon-as-possible levels, starting from `alap`.
    ///
    /// Every node carries a mobility: how far it may move earlier. Inputs
    /// start with the distance to the first acceptable phase. Each node in
    /// topological order commits its mobility and then bounds the mobility of
    /// its consumers by the slack its current relay tree leaves. With
    /// `try_regular`, a node whose consumers all sit far enough away for a
    /// balanced tree passes that slack on directly.
    pub fn asap_depth(&self, alap: &Schedule, try_regular: bool) -> Schedule {
        let ntk = self.ntk;
        let mut schedule = alap.clone();
        schedule.orientation = Orientation::Asap;
        let mut mobility = vec![u32::MAX; ntk.size()];
        let first_phase = self.config.first_input_phase();

        if !self.config.balance_outputs {
            schedule.po_levels.iter_mut().for_each(|po| *po = 0);
        }

        for &n in ntk.inputs() {
            mobility[n.index()] = schedule.level(n).saturating_sub(first_phase);
            self.commit_mobility(&mut schedule, &mut mobility, n, try_regular);
        }
        for n in ntk.gates() {
            let level = schedule.level(n);
            let m = &mut mobility[n.index()];
            *m = (*m).min(level.saturating_sub(1));
            self.commit_mobility(&mut schedule, &mut mobility, n, try_regular);
        }

        if !self.config.balance_outputs {
            let mut depth = schedule.depth;
            for po in schedule.po_levels.iter_mut() {
                *po = if *po == 0 { 1 } else { self.align_output_level(*po) };
                depth = depth.max(*po - 1);
            }
            schedule.depth = depth;
        }
        schedule
    }

    fn commit_mobility(&self, schedule: &mut Schedule, mobility: &mut [u32], n: NodeId, try_regular: bool) {
        let ntk = self.ntk;
        let k = self.config.relay_capacity;
        let depth = schedule.depth;
        let balance_outputs = self.config.balance_outputs;

        let level_n = schedule.level(n) - mobility[n.index()].min(schedule.level(n));
        schedule.set_level(n, level_n);

        let outputs = &self.driven_outputs[n.index()];

        if try_regular {
            let reach = level_n + self.splitter_levels(n) + 1;
            let consumers_fit = ntk.fanouts(n).iter().all(|&f| reach <= schedule.level(f));
            let outputs_fit = !balance_outputs || outputs.is_empty() || reach <= depth + 1;
            if consumers_fit && outputs_fit {
                for &f in ntk.fanouts(n) {
                    let m = &mut mobility[f.index()];
                    *m = (*m).min(schedule.level(f) - reach);
                }
                if !balance_outputs {
                    for &i in outputs {
                        schedule.po_levels[i] = schedule.po_levels[i].max(reach);
                    }
                }
                return;
            }
        }

        let mut slots: Vec<SinkSlot> = outputs
            .iter()
            .map(|&i| SinkSlot { sink: Sink::Output(i), level: depth + 1, slack: 0 })
            .chain(ntk.fanouts(n).iter().map(|&f| SinkSlot {
                sink: Sink::Node(f),
                level: schedule.level(f),
                slack: 0,
            }))
            .collect();
        if slots.is_empty() {
            return;
        }
        slots.sort_by(|a, b| b.level.cmp(&a.level));

        let mut open = 0u32;
        let mut last = slots[0].level;
        for i in 0..slots.len() {
            let l = slots[i].level;
            if l != last {
                let mut gained = 0;
                for _ in 0..(last - l) {
                    if open == 1 {
                        gained += 1;
                    }
                    open = open.div_ceil(k);
                }
                if gained > 0 {
                    slots[..i].iter_mut().for_each(|s| s.slack += gained);
                }
                last = l;
            }
            open += 1;
        }

        let is_input = ntk.is_input(n);
        let mut gained = 0;
        for _ in (level_n + 1)..last {
            if open == 1 || (is_input && open <= self.config.first_hop_capacity) {
                gained += 1;
            }
            open = open.div_ceil(k);
        }

        for slot in &slots {
            match slot.sink {
                Sink::Node(f) => {
                    let m = &mut mobility[f.index()];
                    *m = (*m).min(slot.slack + gained);
                }
                Sink::Output(i) if !balance_outputs => {
                    let po = &mut schedule.po_levels[i];
                    *po = (*po).max((depth + 1).saturating_sub(slot.slack + gained));
                }
                Sink::Output(_) => {}
            }
        }
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::FanoutTreeCounter;
    use crate::network::InMemoryNetwork;
    use crate::policy::ScheduleConfig;
    use crate::types::{GateFunction, Signal};

    /// One input feeding `fanout` gates, each gate an output.
    fn build_star(fanout: usize) -> (InMemoryNetwork, Signal, Vec<Signal>) {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let hub = ntk.add_gate(GateFunction::And, &[a, b]).unwrap();
        let mut leaves = Vec::new();
        for _ in 0..fanout {
            let c = ntk.add_input();
            let g = ntk.add_gate(GateFunction::Or, &[hub, c]).unwrap();
            ntk.add_output(g).unwrap();
            leaves.push(g);
        }
        (ntk, hub, leaves)
    }

    #[test]
    fn test_alap_depth_places_hub_below_tree() {
        let (ntk, hub, leaves) = build_star(4);
        let config = ScheduleConfig::default().with_capacities(1, 2);
        let schedule = LevelAssigner::new(&ntk, &config).alap_depth().unwrap();

        // 4 consumers at the same level need two relay levels with K = 2
        let leaf_level = schedule.level(leaves[0].node);
        assert!(leaves.iter().all(|g| schedule.level(g.node) == leaf_level));
        assert_eq!(schedule.level(hub.node), leaf_level - 3);
        assert_eq!(schedule.depth, leaf_level);
        assert_eq!(schedule.orientation, Orientation::Alap);
    }

    #[test]
    fn test_alap_depth_lowest_node_on_first_phase() {
        let (ntk, _, _) = build_star(3);
        let config = ScheduleConfig::default().with_phases(1, vec![2]);
        let schedule = LevelAssigner::new(&ntk, &config).alap_depth().unwrap();

        let lowest = ntk.inputs().iter().map(|&n| schedule.level(n)).min().unwrap();
        assert_eq!(lowest, 2);
        assert!(ntk.inputs().iter().all(|&n| schedule.level(n) == 2));
    }

    #[test]
    fn test_alap_depth_period_alignment() {
        let (ntk, _, _) = build_star(5);
        let config = ScheduleConfig::default().with_phases(4, vec![0]);
        let schedule = LevelAssigner::new(&ntk, &config).alap_depth().unwrap();
        assert_eq!(schedule.depth % 4, 0);
        assert!(schedule.po_levels.iter().all(|&po| po == schedule.depth + 1));
    }

    #[test]
    fn test_asap_depth_keeps_depth_and_feasibility() {
        let (ntk, _, _) = build_star(4);
        let config = ScheduleConfig::default().with_capacities(1, 2);
        let assigner = LevelAssigner::new(&ntk, &config);
        let alap = assigner.alap_depth().unwrap();
        let asap = assigner.asap_depth(&alap, false);

        assert_eq!(asap.depth, alap.depth);
        assert!(asap.is_asap());
        for n in ntk.gates() {
            assert!(asap.level(n) <= alap.level(n));
        }

        let mut counter = FanoutTreeCounter::new(&ntk, &config);
        counter.rebuild_all(&ntk, &alap).unwrap();
        counter.rebuild_all(&ntk, &asap).unwrap();
    }

    #[test]
    fn test_asap_depth_pulls_leaf_inputs_to_first_phase() {
        let (ntk, _, leaves) = build_star(2);
        let config = ScheduleConfig::default();
        let assigner = LevelAssigner::new(&ntk, &config);
        let asap = assigner.asap_depth(&assigner.alap_depth().unwrap(), true);

        for &n in ntk.inputs() {
            assert_eq!(asap.level(n), 0);
        }
        for g in &leaves {
            assert!(asap.level(g.node) >= 2);
        }
    }
}
