//! Level assignment.
//!
//! A [`Schedule`] maps every node to a level (clock slot) and every primary
//! output to a pseudo-level. [`LevelAssigner`] produces the initial schedule
//! under one of the [`SchedulingPolicy`] variants.
//!
//! ## Policies
//!
//! | Policy       | Passes                                    |
//! |--------------|-------------------------------------------|
//! | `asap`       | forward                                   |
//! | `alap`       | forward (fixes depth), backward           |
//! | `alap_depth` | backward tree-collapse, shift down        |
//! | `asap_depth` | `alap_depth`, forward mobility            |
//! | `best`       | cheaper of `asap` and `alap`              |
//! | `best_depth` | cheaper of `alap_depth` and `asap_depth`  |
//! | `provided`   | caller levels, validated only             |

mod classic;
mod depth;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::counter::FanoutTreeCounter;
use crate::engine::RelayError;
use crate::network::LogicNetwork;
use crate::policy::{ConfigError, ScheduleConfig, SchedulingPolicy};
use crate::types::NodeId;

/// Which pass produced the current levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Nodes sit as early as their fanins allow.
    Asap,
    /// Nodes sit as late as their consumers allow.
    Alap,
    /// Levels were supplied by the caller.
    Provided,
}

/// A level assignment for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Level per node, indexed by node id. Constants stay at 0.
    pub levels: Vec<u32>,
    /// Pseudo-level per primary output.
    pub po_levels: Vec<u32>,
    /// Network depth, `max(po_level - 1)` when scheduled.
    pub depth: u32,
    /// Pass that produced the levels.
    pub orientation: Orientation,
}

impl Schedule {
    /// All-zero schedule for a network of `size` nodes and `num_outputs` outputs.
    pub fn new(size: usize, num_outputs: usize, orientation: Orientation) -> Self {
        Self {
            levels: vec![0; size],
            po_levels: vec![0; num_outputs],
            depth: 0,
            orientation,
        }
    }

    /// Level of a node.
    pub fn level(&self, node: NodeId) -> u32 {
        self.levels[node.index()]
    }

    /// Set the level of a node.
    pub fn set_level(&mut self, node: NodeId, level: u32) {
        self.levels[node.index()] = level;
    }

    /// Pseudo-level of a primary output.
    pub fn po_level(&self, output: usize) -> u32 {
        self.po_levels[output]
    }

    /// Levels of the primary inputs in input order.
    pub fn input_levels<N: LogicNetwork>(&self, ntk: &N) -> Vec<u32> {
        ntk.inputs().iter().map(|&n| self.level(n)).collect()
    }

    /// Whether this schedule came from an ASAP-oriented pass.
    pub fn is_asap(&self) -> bool {
        self.orientation == Orientation::Asap
    }
}

/// Smallest `k` with `base^k >= x` (0 for `x <= 1`).
pub(crate) fn ceil_log(x: u64, base: u64) -> u32 {
    let mut k = 0;
    let mut reach = 1u64;
    while reach < x {
        reach = reach.saturating_mul(base);
        k += 1;
    }
    k
}

/// Upper bound on the relay levels a balanced tree adds below `node`.
///
/// Gates need `ceil(log_K(fanout))` levels. Inputs drive up to
/// `first_hop_capacity` consumers directly and need
/// `ceil(log_K(fanout - first_hop_capacity + 1))` levels beyond that.
pub fn splitter_levels<N: LogicNetwork>(ntk: &N, config: &ScheduleConfig, node: NodeId) -> u32 {
    let fanout = ntk.fanout_size(node) as u64;
    let k = config.relay_capacity as u64;
    if ntk.is_input(node) {
        let direct = config.first_hop_capacity as u64;
        if fanout > direct {
            ceil_log(fanout - direct + 1, k)
        } else {
            0
        }
    } else {
        ceil_log(fanout, k)
    }
}

/// Produces initial level assignments.
pub struct LevelAssigner<'a, N: LogicNetwork> {
    ntk: &'a N,
    config: &'a ScheduleConfig,
    /// Output indices driven by each node.
    driven_outputs: Vec<Vec<usize>>,
}

impl<'a, N: LogicNetwork> LevelAssigner<'a, N> {
    /// Create an assigner over `ntk`.
    pub fn new(ntk: &'a N, config: &'a ScheduleConfig) -> Self {
        let mut driven_outputs = vec![Vec::new(); ntk.size()];
        for (i, signal) in ntk.outputs().iter().enumerate() {
            driven_outputs[signal.node.index()].push(i);
        }
        Self { ntk, config, driven_outputs }
    }

    /// Splitter levels of `node` under this configuration.
    pub fn splitter_levels(&self, node: NodeId) -> u32 {
        splitter_levels(self.ntk, self.config, node)
    }

    /// Run the configured policy.
    ///
    /// `counter` is used as the cost oracle by the best-of policies; it is
    /// left holding the trees of whichever schedule it evaluated last.
    pub fn schedule(&self, counter: &mut FanoutTreeCounter) -> Result<Schedule, RelayError> {
        let policy = self.config.scheduling_policy;
        let schedule = match policy {
            SchedulingPolicy::Provided => return Err(ConfigError::MissingAssignment.into()),
            SchedulingPolicy::Asap => self.asap(),
            SchedulingPolicy::Alap => self.alap(&self.asap())?,
            SchedulingPolicy::Best => {
                let asap = self.asap();
                let asap_cost = counter.rebuild_all(self.ntk, &asap)?;
                let alap = self.alap(&asap)?;
                let alap_cost = counter.rebuild_all(self.ntk, &alap)?;
                debug!(asap_cost, alap_cost, "Compared ASAP and ALAP schedules");
                if alap_cost > asap_cost {
                    asap
                } else {
                    alap
                }
            }
            SchedulingPolicy::AlapDepth => self.alap_depth()?,
            SchedulingPolicy::AsapDepth => {
                let alap = self.alap_depth()?;
                self.asap_depth(&alap, self.config.balanced_tree_snapping)
            }
            SchedulingPolicy::BestDepth => {
                let alap = self.alap_depth()?;
                let alap_cost = counter.rebuild_all(self.ntk, &alap)?;
                let asap = self.asap_depth(&alap, false);
                let asap_cost = counter.rebuild_all(self.ntk, &asap)?;
                debug!(alap_cost, asap_cost, "Compared depth-optimal schedules");
                if alap_cost < asap_cost {
                    alap
                } else {
                    asap
                }
            }
        };
        counter.mark_outdated();
        debug!(policy = %policy, depth = schedule.depth, "Initial schedule assigned");
        Ok(schedule)
    }

    /// Validate a caller-supplied assignment.
    ///
    /// Every output must sit above its driver and the derived depth,
    /// `max(po_level - 1)`, must be a multiple of the phase period.
    pub fn provided(&self, levels: Vec<u32>, po_levels: Vec<u32>) -> Result<Schedule, ConfigError> {
        if levels.len() != self.ntk.size() {
            return Err(ConfigError::AssignmentShape {
                what: "levels",
                expected: self.ntk.size(),
                actual: levels.len(),
            });
        }
        if po_levels.len() != self.ntk.num_outputs() {
            return Err(ConfigError::AssignmentShape {
                what: "output levels",
                expected: self.ntk.num_outputs(),
                actual: po_levels.len(),
            });
        }

        let mut depth = 0;
        for (output, signal) in self.ntk.outputs().iter().enumerate() {
            let level = po_levels[output];
            let driver_level = levels[signal.node.index()];
            if level <= driver_level {
                return Err(ConfigError::OutputBelowDriver { output, level, driver_level });
            }
            depth = depth.max(level - 1);
        }
        if depth % self.config.phase_period != 0 {
            return Err(ConfigError::MisalignedDepth { depth, period: self.config.phase_period });
        }

        Ok(Schedule {
            levels,
            po_levels,
            depth,
            orientation: Orientation::Provided,
        })
    }

    /// Round `level` up so that `(level - 1) % period == 0`.
    fn align_output_level(&self, level: u32) -> u32 {
        let period = self.config.phase_period;
        let rem = (level - 1) % period;
        if rem == 0 {
            level
        } else {
            level + period - rem
        }
    }

    /// Move an input down to the nearest acceptable level.
    fn settle_input(&self, node: NodeId, level: u32) -> Result<u32, crate::counter::InvariantViolation> {
        self.config
            .input_level_at_or_below(level)
            .ok_or(crate::counter::InvariantViolation::NoAcceptableInputLevel { node, level })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::InMemoryNetwork;
    use crate::types::GateFunction;

    #[test]
    fn test_ceil_log() {
        assert_eq!(ceil_log(0, 2), 0);
        assert_eq!(ceil_log(1, 2), 0);
        assert_eq!(ceil_log(2, 2), 1);
        assert_eq!(ceil_log(3, 2), 2);
        assert_eq!(ceil_log(4, 2), 2);
        assert_eq!(ceil_log(9, 3), 2);
        assert_eq!(ceil_log(10, 3), 3);
    }

    #[test]
    fn test_splitter_levels() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let gates: Vec<_> = (0..4)
            .map(|_| ntk.add_gate(GateFunction::And, &[a, b]).unwrap())
            .collect();
        for &g in &gates {
            ntk.add_output(g).unwrap();
        }
        let last = gates[3];
        ntk.add_output(last).unwrap();

        let config = ScheduleConfig::default().with_capacities(2, 2);
        // a drives 4 gates, 2 directly: ceil(log2(3)) = 2
        assert_eq!(splitter_levels(&ntk, &config, a.node), 2);
        // last gate drives 2 outputs
        assert_eq!(splitter_levels(&ntk, &config, last.node), 1);

        let config = ScheduleConfig::default().with_capacities(4, 2);
        assert_eq!(splitter_levels(&ntk, &config, a.node), 0);
    }

    #[test]
    fn test_provided_validation() {
        let mut ntk = InMemoryNetwork::new();
        let a = ntk.add_input();
        let b = ntk.add_input();
        let g = ntk.add_gate(GateFunction::And, &[a, b]).unwrap();
        ntk.add_output(g).unwrap();

        let config = ScheduleConfig::default().with_phases(2, vec![0]);
        let assigner = LevelAssigner::new(&ntk, &config);

        let ok = assigner.provided(vec![0, 0, 0, 1], vec![3]).unwrap();
        assert_eq!(ok.depth, 2);
        assert_eq!(ok.orientation, Orientation::Provided);

        assert!(matches!(
            assigner.provided(vec![0, 0, 0, 1], vec![1]),
            Err(ConfigError::OutputBelowDriver { output: 0, .. })
        ));
        assert!(matches!(
            assigner.provided(vec![0, 0, 0, 1], vec![2]),
            Err(ConfigError::MisalignedDepth { depth: 1, period: 2 })
        ));
        assert!(matches!(
            assigner.provided(vec![0, 0], vec![3]),
            Err(ConfigError::AssignmentShape { what: "levels", .. })
        ));
    }
}
