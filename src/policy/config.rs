//! Schedule configuration.
//!
//! `ScheduleConfig` gathers the technology assumptions (capacities, phase
//! period, acceptable input phases) and the algorithm knobs (scheduling
//! policy, optimization effort, bounds). It is plain data: serializable,
//! loadable from JSON, and hashed canonically so every run can be tagged with
//! the exact parameters that produced it.

use serde::{Deserialize, Serialize};
use crate::canonical::canonical_hash_hex;

/// Error type for invalid configurations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A numeric option is outside its legal range.
    #[error("Invalid {option}: {value} (must be >= {minimum})")]
    OutOfRange {
        /// Option name.
        option: &'static str,
        /// Supplied value.
        value: u64,
        /// Smallest legal value.
        minimum: u64,
    },
    /// No acceptable input phase was given.
    #[error("acceptable_input_phases must not be empty")]
    NoInputPhases,
    /// Acceptable input phases are not strictly ascending.
    #[error("acceptable_input_phases must be strictly ascending: {0:?}")]
    UnsortedInputPhases(Vec<u32>),
    /// The `provided` policy needs levels from the caller.
    #[error("Scheduling policy `provided` requires a caller-supplied assignment")]
    MissingAssignment,
    /// A caller-supplied assignment was given for a computed policy.
    #[error("Scheduling policy `{0}` computes its own assignment")]
    UnexpectedAssignment(SchedulingPolicy),
    /// A caller-supplied assignment does not match the network shape.
    #[error("Provided {what} has {actual} entries, network needs {expected}")]
    AssignmentShape {
        /// Which table is wrong.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
    /// A provided output level is not above its driver.
    #[error("Output {output} at level {level} is not above its driver at level {driver_level}")]
    OutputBelowDriver {
        /// Output index.
        output: usize,
        /// Output pseudo-level.
        level: u32,
        /// Driver level.
        driver_level: u32,
    },
    /// The depth implied by provided output levels is not period aligned.
    #[error("Depth {depth} is not a multiple of phase period {period}")]
    MisalignedDepth {
        /// Derived depth.
        depth: u32,
        /// Configured period.
        period: u32,
    },
    /// JSON could not be parsed.
    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

/// How the initial level assignment is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// Levels are supplied by the caller; no scheduling is performed.
    Provided,
    /// Classical as-soon-as-possible scheduling.
    Asap,
    /// ASAP to fix the depth, then as-late-as-possible.
    Alap,
    /// Depth-optimal ALAP followed by the forward mobility pass.
    AsapDepth,
    /// Depth-optimal as-late-as-possible.
    AlapDepth,
    /// The cheaper of ASAP and ALAP.
    Best,
    /// The cheaper of ALAP-depth and ASAP-depth.
    BestDepth,
}

impl SchedulingPolicy {
    /// Parse a policy from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "provided" => Some(Self::Provided),
            "asap" => Some(Self::Asap),
            "alap" => Some(Self::Alap),
            "asap_depth" => Some(Self::AsapDepth),
            "alap_depth" => Some(Self::AlapDepth),
            "best" => Some(Self::Best),
            "best_depth" => Some(Self::BestDepth),
            _ => None,
        }
    }

    /// Whether the policy uses the depth-optimal passes.
    pub fn is_depth_optimal(&self) -> bool {
        matches!(self, Self::AsapDepth | Self::AlapDepth | Self::BestDepth)
    }
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self::Asap
    }
}

impl std::fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provided => write!(f, "provided"),
            Self::Asap => write!(f, "asap"),
            Self::Alap => write!(f, "alap"),
            Self::AsapDepth => write!(f, "asap_depth"),
            Self::AlapDepth => write!(f, "alap_depth"),
            Self::Best => write!(f, "best"),
            Self::BestDepth => write!(f, "best_depth"),
        }
    }
}

/// How much local search runs after scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationEffort {
    /// No optimization.
    None,
    /// One chunk sweep over all nodes, then single-node cleanup.
    OnePass,
    /// Sweep until a sweep yields no improvement, then single-node cleanup.
    UntilSaturation,
}

impl Default for OptimizationEffort {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for OptimizationEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::OnePass => write!(f, "one_pass"),
            Self::UntilSaturation => write!(f, "until_saturation"),
        }
    }
}

/// Configuration of one relay-insertion run.
///
/// ## Technology parameters
///
/// - `first_hop_capacity`: direct consumers a primary input may drive
/// - `relay_capacity`: direct consumers a relay may drive (gates always drive 1)
/// - `phase_period`: clocking period; output depth must be a multiple of it
/// - `acceptable_input_phases`: levels (mod period, unless inputs are
///   balanced) at which inputs may arrive
/// - `balance_inputs` / `balance_outputs`: force inputs onto the listed
///   phases exactly and outputs onto one global depth
/// - `max_phase_skip`: most levels a direct edge may skip when runs of
///   single-fanout relays are removed after materialization
///
/// ## Algorithm parameters
///
/// - `scheduling_policy`, `optimization_effort`
/// - `max_chunk_size`: chunks larger than this are skipped
/// - `max_optimization_rounds`: bound on until-saturation sweeps
/// - `det_randomization` + `seed`: seeded shuffle of sweep order
/// - `balanced_tree_snapping`: let ASAP-depth snap to balanced trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Direct capacity of primary inputs.
    pub first_hop_capacity: u32,
    /// Direct capacity of relays.
    pub relay_capacity: u32,
    /// Clocking phase period.
    pub phase_period: u32,
    /// Acceptable input arrival phases, strictly ascending.
    pub acceptable_input_phases: Vec<u32>,
    /// Inputs must sit exactly on one of the acceptable phases.
    pub balance_inputs: bool,
    /// All outputs share a single global depth.
    pub balance_outputs: bool,
    /// Most levels a direct edge may skip after relay chain removal.
    pub max_phase_skip: u32,
    /// Initial scheduling policy.
    pub scheduling_policy: SchedulingPolicy,
    /// Local search effort.
    pub optimization_effort: OptimizationEffort,
    /// Maximum chunk size.
    pub max_chunk_size: usize,
    /// Maximum number of until-saturation sweeps.
    pub max_optimization_rounds: usize,
    /// Shuffle sweep order with a seeded RNG.
    pub det_randomization: bool,
    /// Seed for `det_randomization`.
    pub seed: u64,
    /// Allow ASAP-depth to snap to balanced trees when slack allows.
    pub balanced_tree_snapping: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            first_hop_capacity: 1,
            relay_capacity: 4,
            phase_period: 1,
            acceptable_input_phases: vec![0],
            balance_inputs: true,
            balance_outputs: true,
            max_phase_skip: 4,
            scheduling_policy: SchedulingPolicy::Asap,
            optimization_effort: OptimizationEffort::None,
            max_chunk_size: 100,
            max_optimization_rounds: 100,
            det_randomization: false,
            seed: 0,
            balanced_tree_snapping: false,
        }
    }
}

impl ScheduleConfig {
    /// Parse and validate a configuration from JSON.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every option against its legal range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn at_least(option: &'static str, value: u64, minimum: u64) -> Result<(), ConfigError> {
            if value < minimum {
                return Err(ConfigError::OutOfRange { option, value, minimum });
            }
            Ok(())
        }

        at_least("first_hop_capacity", self.first_hop_capacity as u64, 1)?;
        at_least("relay_capacity", self.relay_capacity as u64, 2)?;
        at_least("phase_period", self.phase_period as u64, 1)?;
        at_least("max_phase_skip", self.max_phase_skip as u64, 1)?;
        at_least("max_chunk_size", self.max_chunk_size as u64, 1)?;
        at_least("max_optimization_rounds", self.max_optimization_rounds as u64, 1)?;

        if self.acceptable_input_phases.is_empty() {
            return Err(ConfigError::NoInputPhases);
        }
        if self.acceptable_input_phases.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::UnsortedInputPhases(self.acceptable_input_phases.clone()));
        }
        Ok(())
    }

    /// Lowest acceptable input phase.
    pub fn first_input_phase(&self) -> u32 {
        self.acceptable_input_phases.first().copied().unwrap_or(0)
    }

    /// Whether an input may sit at `level`.
    ///
    /// With balanced inputs the level must be one of the listed phases.
    /// Otherwise it must be congruent to a listed phase modulo the period and
    /// not below it: with period 4 and phases `{5}`, levels 5 and 9 are
    /// acceptable but 1 is not.
    pub fn is_acceptable_input_level(&self, level: u32) -> bool {
        if self.balance_inputs {
            self.acceptable_input_phases.contains(&level)
        } else {
            self.acceptable_input_phases
                .iter()
                .any(|&p| level >= p && level % self.phase_period == p % self.phase_period)
        }
    }

    /// Largest acceptable input level not above `level`.
    pub fn input_level_at_or_below(&self, level: u32) -> Option<u32> {
        if self.balance_inputs {
            return self
                .acceptable_input_phases
                .iter()
                .rev()
                .find(|&&p| p <= level)
                .copied();
        }
        (0..=level).rev().find(|&l| self.is_acceptable_input_level(l))
    }

    /// Whether inputs can never move (balanced onto a single phase).
    pub fn inputs_fixed(&self) -> bool {
        self.balance_inputs && self.acceptable_input_phases.len() == 1
    }

    /// Compute a hash of the configuration.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }

    /// Set the scheduling policy.
    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.scheduling_policy = policy;
        self
    }

    /// Set the optimization effort.
    pub fn with_effort(mut self, effort: OptimizationEffort) -> Self {
        self.optimization_effort = effort;
        self
    }

    /// Set input and relay capacities.
    pub fn with_capacities(mut self, first_hop_capacity: u32, relay_capacity: u32) -> Self {
        self.first_hop_capacity = first_hop_capacity;
        self.relay_capacity = relay_capacity;
        self
    }

    /// Set the phase period and acceptable input phases.
    pub fn with_phases(mut self, phase_period: u32, acceptable_input_phases: Vec<u32>) -> Self {
        self.phase_period = phase_period;
        self.acceptable_input_phases = acceptable_input_phases;
        self
    }

    /// Set input and output balancing.
    pub fn with_balancing(mut self, balance_inputs: bool, balance_outputs: bool) -> Self {
        self.balance_inputs = balance_inputs;
        self.balance_outputs = balance_outputs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ScheduleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_capacities() {
        let config = ScheduleConfig::default().with_capacities(1, 1);
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange { option: "relay_capacity", value: 1, minimum: 2 })
        );

        let config = ScheduleConfig::default().with_capacities(0, 3);
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { option: "first_hop_capacity", .. })));
    }

    #[test]
    fn test_input_phases_validation() {
        let config = ScheduleConfig::default().with_phases(4, vec![]);
        assert_eq!(config.validate(), Err(ConfigError::NoInputPhases));

        let config = ScheduleConfig::default().with_phases(4, vec![2, 1]);
        assert!(matches!(config.validate(), Err(ConfigError::UnsortedInputPhases(_))));
    }

    #[test]
    fn test_acceptable_input_levels_modular() {
        let config = ScheduleConfig::default()
            .with_phases(4, vec![5])
            .with_balancing(false, false);
        assert!(!config.is_acceptable_input_level(1));
        assert!(config.is_acceptable_input_level(5));
        assert!(config.is_acceptable_input_level(9));
        assert!(!config.is_acceptable_input_level(6));
        assert_eq!(config.input_level_at_or_below(8), Some(5));
        assert_eq!(config.input_level_at_or_below(4), None);
    }

    #[test]
    fn test_acceptable_input_levels_balanced() {
        let config = ScheduleConfig::default().with_phases(4, vec![0, 2]);
        assert!(config.is_acceptable_input_level(2));
        assert!(!config.is_acceptable_input_level(6));
        assert_eq!(config.input_level_at_or_below(7), Some(2));
        assert!(!config.inputs_fixed());
        assert!(ScheduleConfig::default().inputs_fixed());
    }

    #[test]
    fn test_from_json_defaults_and_errors() {
        let config = ScheduleConfig::from_json_str(
            r#"{"relay_capacity": 3, "scheduling_policy": "alap_depth", "optimization_effort": "until_saturation"}"#,
        )
        .unwrap();
        assert_eq!(config.relay_capacity, 3);
        assert_eq!(config.scheduling_policy, SchedulingPolicy::AlapDepth);
        assert_eq!(config.optimization_effort, OptimizationEffort::UntilSaturation);
        assert_eq!(config.max_chunk_size, 100);

        assert!(matches!(ScheduleConfig::from_json_str("{"), Err(ConfigError::Malformed(_))));
        assert!(matches!(
            ScheduleConfig::from_json_str(r#"{"phase_period": 0}"#),
            Err(ConfigError::OutOfRange { option: "phase_period", .. })
        ));
    }

    #[test]
    fn test_params_hash_determinism() {
        let a = ScheduleConfig::default();
        let b = ScheduleConfig::default();
        assert_eq!(a.params_hash(), b.params_hash());

        let c = ScheduleConfig::default().with_policy(SchedulingPolicy::Alap);
        assert_ne!(a.params_hash(), c.params_hash());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(SchedulingPolicy::from_str("best-depth"), Some(SchedulingPolicy::BestDepth));
        assert_eq!(SchedulingPolicy::from_str("ASAP"), Some(SchedulingPolicy::Asap));
        assert!(SchedulingPolicy::AlapDepth.is_depth_optimal());
        assert!(!SchedulingPolicy::Best.is_depth_optimal());
    }
}
