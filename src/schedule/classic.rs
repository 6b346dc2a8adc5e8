//! ASAP and ALAP scheduling.

use super::{LevelAssigner, Orientation, Schedule};
use crate::counter::InvariantViolation;
use crate::network::LogicNetwork;
use crate::types::NodeKind;

impl<'a, N: LogicNetwork> LevelAssigner<'a, N> {
    /// As-soon-as-possible levels.
    ///
    /// Inputs sit at the first acceptable phase; every gate sits one level
    /// above the deepest `level(fanin) + splitter_levels(fanin)`. Output
    /// levels are rounded up to the next period boundary and `depth` is the
    /// deepest of them.
    pub fn asap(&self) -> Schedule {
        let ntk = self.ntk;
        let mut schedule = Schedule::new(ntk.size(), ntk.num_outputs(), Orientation::Asap);
        let first_phase = self.config.first_input_phase();

        for n in ntk.nodes() {
            match ntk.kind(n) {
                NodeKind::Constant => {}
                NodeKind::Input => schedule.set_level(n, first_phase),
                NodeKind::Gate(_) | NodeKind::Relay => {
                    let level = ntk
                        .fanins(n)
                        .iter()
                        .filter(|fi| !ntk.is_constant(fi.node))
                        .map(|fi| schedule.level(fi.node) + self.splitter_levels(fi.node))
                        .max()
                        .unwrap_or(0);
                    schedule.set_level(n, level + 1);
                }
            }
        }

        let mut depth = 0;
        for (i, signal) in ntk.outputs().iter().enumerate() {
            let driver = signal.node;
            let po = if ntk.is_constant(driver) {
                1
            } else {
                self.align_output_level(schedule.level(driver) + self.splitter_levels(driver) + 1)
            };
            schedule.po_levels[i] = po;
            depth = depth.max(po - 1);
        }
        schedule.depth = depth;

        if self.config.balance_outputs {
            schedule.po_levels.iter_mut().for_each(|po| *po = depth + 1);
        }
        schedule
    }

    /// As-late-as-possible levels at the depth fixed by `asap`.
    ///
    /// Walks the network backwards; every node sits
    /// `splitter_levels(node) + 1` below its shallowest consumer, with outputs
    /// counted as consumers at `depth + 1`. Inputs round down to an
    /// acceptable level. Nodes without consumers keep their ASAP level.
    pub fn alap(&self, asap: &Schedule) -> Result<Schedule, InvariantViolation> {
        let ntk = self.ntk;
        let depth = asap.depth;
        let mut schedule = Schedule {
            levels: asap.levels.clone(),
            po_levels: vec![depth + 1; ntk.num_outputs()],
            depth,
            orientation: Orientation::Alap,
        };

        let mut bound: Vec<Option<u32>> = vec![None; ntk.size()];
        for signal in ntk.outputs() {
            bound[signal.node.index()] = Some(depth + 1);
        }

        for n in ntk.nodes().collect::<Vec<_>>().into_iter().rev() {
            if ntk.is_constant(n) {
                continue;
            }
            let consumer_bound = ntk.fanouts(n).iter().map(|&f| schedule.level(f)).min();
            let latest = match (bound[n.index()], consumer_bound) {
                (Some(a), Some(b)) => a.min(b),
                (a, b) => match a.or(b) {
                    Some(l) => l,
                    None => continue,
                },
            };

            let level = latest.saturating_sub(self.splitter_levels(n) + 1);
            let level = if ntk.is_input(n) {
                self.settle_input(n, level)?
            } else {
                level
            };
            schedule.set_level(n, level);
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::InMemoryNetwork;
    use crate::policy::ScheduleConfig;
    use crate::types::{GateFunction, Signal};

    /// a, b, c inputs; g1 = AND(a, b); g2 = AND(g1, c); outputs g2 and g1.
    fn build_chain() -> (InMemoryNetwork, Vec<Signal>) {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let c = ntk.add_input();
        let g1 = ntk.add_gate(GateFunction::And, &[a, b]).unwrap();
        let g2 = ntk.add_gate(GateFunction::And, &[g1, c]).unwrap();
        ntk.add_output(g2).unwrap();
        ntk.add_output(g1).unwrap();
        (ntk, vec![a, b, c, g1, g2])
    }

    #[test]
    fn test_asap_levels() {
        let (ntk, s) = build_chain();
        let config = ScheduleConfig::default();
        let schedule = LevelAssigner::new(&ntk, &config).asap();

        assert_eq!(schedule.level(s[0].node), 0);
        assert_eq!(schedule.level(s[2].node), 0);
        assert_eq!(schedule.level(s[3].node), 1);
        // g1 drives g2 and an output: one splitter level
        assert_eq!(schedule.level(s[4].node), 3);
        assert_eq!(schedule.depth, 3);
        assert_eq!(schedule.po_levels, vec![4, 4]);
        assert!(schedule.is_asap());
    }

    #[test]
    fn test_asap_unbalanced_outputs_are_period_aligned() {
        let (ntk, _) = build_chain();
        let config = ScheduleConfig::default()
            .with_phases(4, vec![0])
            .with_balancing(true, false);
        let schedule = LevelAssigner::new(&ntk, &config).asap();

        // g2 at 3 -> 4 -> aligned to 5; g1 at 1 -> 3 -> aligned to 5
        assert_eq!(schedule.po_levels, vec![5, 5]);
        assert_eq!(schedule.depth, 4);
        assert!(schedule.po_levels.iter().all(|po| (po - 1) % 4 == 0));
    }

    #[test]
    fn test_alap_levels() {
        let (ntk, s) = build_chain();
        let config = ScheduleConfig::default();
        let assigner = LevelAssigner::new(&ntk, &config);
        let schedule = assigner.alap(&assigner.asap()).unwrap();

        assert_eq!(schedule.depth, 3);
        assert_eq!(schedule.level(s[4].node), 3);
        // g1: min(g2 = 3, output = 4) - 1 - 1
        assert_eq!(schedule.level(s[3].node), 1);
        // c sits right below g2 but inputs only arrive at phase 0
        assert_eq!(schedule.level(s[2].node), 0);
        assert_eq!(schedule.orientation, Orientation::Alap);
    }

    #[test]
    fn test_alap_inputs_round_to_modular_phase() {
        let (ntk, s) = build_chain();
        let config = ScheduleConfig::default()
            .with_phases(2, vec![0])
            .with_balancing(false, true);
        let assigner = LevelAssigner::new(&ntk, &config);
        let asap = assigner.asap();
        assert_eq!(asap.depth, 4);
        let schedule = assigner.alap(&asap).unwrap();

        // c would sit at 3, rounds down to 2
        assert_eq!(schedule.level(s[2].node), 2);
        assert_eq!(schedule.level(s[0].node), 0);
    }

    #[test]
    fn test_dangling_nodes_keep_asap_level() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let unused = ntk.add_input();
        let g = ntk.add_gate(GateFunction::Or, &[a, b]).unwrap();
        let dead = ntk.add_gate(GateFunction::And, &[g, a]).unwrap();
        ntk.add_output(g).unwrap();

        let config = ScheduleConfig::default();
        let assigner = LevelAssigner::new(&ntk, &config);
        let asap = assigner.asap();
        let alap = assigner.alap(&asap).unwrap();

        assert_eq!(alap.level(unused.node), 0);
        assert_eq!(alap.level(dead.node), asap.level(dead.node));
        assert!(alap.level(g.node) < alap.level(dead.node));
    }
}
