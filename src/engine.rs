//! Relay insertion driver.
//!
//! [`RelayInsertion`] owns one run over one network: initial scheduling,
//! optional local search, counting, and materialization.

use tracing::{debug, info};

use crate::canonical::schedule_fingerprint;
use crate::counter::{FanoutTreeCounter, InvariantViolation};
use crate::materialize::{MaterializeError, NetworkMaterializer, RelayNetwork};
use crate::network::{LogicNetwork, NetworkError};
use crate::optimizer::{ChunkOptimizer, OptimizationReport};
use crate::policy::{ConfigError, ScheduleConfig, SchedulingPolicy};
use crate::schedule::{LevelAssigner, Schedule};
use crate::types::NodeId;

/// Error type for relay insertion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Invalid configuration or caller-supplied assignment.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// A level assignment that cannot be realized.
    #[error("Scheduling invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
    /// Defective input network.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    /// Materialization failed.
    #[error("Materialization error: {0}")]
    Materialize(#[from] MaterializeError),
    /// Relay counts were queried before the trees were rebuilt.
    #[error("Relay counts are stale, count relays first")]
    StaleBuckets,
    /// No levels were assigned yet.
    #[error("No schedule assigned, schedule first")]
    Unscheduled,
}

/// One relay insertion run.
///
/// ```ignore
/// let config = ScheduleConfig::default().with_policy(SchedulingPolicy::Alap);
/// let mut engine = RelayInsertion::new(&ntk, &config)?;
/// let relays = engine.dry_run()?;
/// let relayed = engine.materialize()?;
/// ```
pub struct RelayInsertion<'a, N: LogicNetwork> {
    ntk: &'a N,
    config: &'a ScheduleConfig,
    counter: FanoutTreeCounter,
    schedule: Option<Schedule>,
    report: Option<OptimizationReport>,
}

impl<'a, N: LogicNetwork> RelayInsertion<'a, N> {
    /// Prepare a run that computes its own initial schedule.
    ///
    /// Fails if the configuration is invalid, if the policy is `provided`
    /// (use [`RelayInsertion::with_levels`]), or if the network already
    /// contains relays.
    pub fn new(ntk: &'a N, config: &'a ScheduleConfig) -> Result<Self, RelayError> {
        if config.scheduling_policy == SchedulingPolicy::Provided {
            return Err(ConfigError::MissingAssignment.into());
        }
        Self::prepare(ntk, config)
    }

    /// Prepare a run starting from caller-supplied levels.
    ///
    /// The policy must be `provided`. `levels` is indexed by node id and
    /// `po_levels` by output index.
    pub fn with_levels(
        ntk: &'a N,
        config: &'a ScheduleConfig,
        levels: Vec<u32>,
        po_levels: Vec<u32>,
    ) -> Result<Self, RelayError> {
        if config.scheduling_policy != SchedulingPolicy::Provided {
            return Err(ConfigError::UnexpectedAssignment(config.scheduling_policy).into());
        }
        let mut engine = Self::prepare(ntk, config)?;
        let schedule = LevelAssigner::new(ntk, config).provided(levels, po_levels)?;
        engine.schedule = Some(schedule);
        Ok(engine)
    }

    fn prepare(ntk: &'a N, config: &'a ScheduleConfig) -> Result<Self, RelayError> {
        config.validate()?;
        if let Some(relay) = ntk.nodes().find(|&n| ntk.kind(n).is_relay()) {
            return Err(NetworkError::AlreadyRelayed(relay).into());
        }
        Ok(Self {
            ntk,
            config,
            counter: FanoutTreeCounter::new(ntk, config),
            schedule: None,
            report: None,
        })
    }

    /// Assign initial levels. Caller-supplied levels are kept as they are.
    pub fn schedule(&mut self) -> Result<&Schedule, RelayError> {
        if self.schedule.is_none() {
            let schedule = LevelAssigner::new(self.ntk, self.config).schedule(&mut self.counter)?;
            self.schedule = Some(schedule);
        }
        self.counter.mark_outdated();
        self.current()
    }

    /// Run the configured local search, scheduling first if needed.
    pub fn optimize(&mut self) -> Result<OptimizationReport, RelayError> {
        if self.schedule.is_none() {
            self.schedule()?;
        }
        let schedule = self.schedule.as_mut().ok_or(RelayError::Unscheduled)?;
        let report = ChunkOptimizer::new(self.ntk, self.config, schedule, &mut self.counter).optimize()?;
        self.report = Some(report.clone());
        Ok(report)
    }

    /// Rebuild every relay tree and return the total.
    pub fn count_relays(&mut self) -> Result<u64, RelayError> {
        let schedule = self.schedule.as_ref().ok_or(RelayError::Unscheduled)?;
        Ok(self.counter.rebuild_all(self.ntk, schedule)?)
    }

    /// Schedule, optimize and count without emitting a network.
    pub fn dry_run(&mut self) -> Result<u64, RelayError> {
        self.schedule()?;
        self.optimize()?;
        let total = self.count_relays()?;
        info!(
            policy = %self.config.scheduling_policy,
            effort = %self.config.optimization_effort,
            depth = self.depth().unwrap_or(0),
            relays = total,
            params_hash = %self.config.params_hash(),
            "Relay insertion finished"
        );
        Ok(total)
    }

    /// Full run: [`dry_run`](Self::dry_run) then [`materialize`](Self::materialize).
    pub fn run(&mut self) -> Result<RelayNetwork, RelayError> {
        self.dry_run()?;
        self.materialize()
    }

    /// Emit the network with relays for the current schedule.
    pub fn materialize(&self) -> Result<RelayNetwork, RelayError> {
        let schedule = self.current()?;
        if self.counter.is_outdated() {
            return Err(MaterializeError::StaleBuckets.into());
        }
        let relayed = NetworkMaterializer::new(self.ntk, self.config, schedule, &self.counter).materialize()?;
        debug!(relays = relayed.num_relays(), "Materialized relay network");
        Ok(relayed)
    }

    // Queries

    /// The current schedule, if one was assigned.
    pub fn current_schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Report of the last optimization, if one ran.
    pub fn optimization_report(&self) -> Option<&OptimizationReport> {
        self.report.as_ref()
    }

    /// Level of `node`.
    pub fn level(&self, node: NodeId) -> Option<u32> {
        self.schedule.as_ref().map(|s| s.level(node))
    }

    /// Pseudo-level of output `index`.
    pub fn po_level(&self, index: usize) -> Option<u32> {
        self.schedule.as_ref().map(|s| s.po_level(index))
    }

    /// Levels of the primary inputs in input order.
    pub fn input_levels(&self) -> Option<Vec<u32>> {
        self.schedule.as_ref().map(|s| s.input_levels(self.ntk))
    }

    /// Network depth, `max(po_level - 1)`.
    pub fn depth(&self) -> Option<u32> {
        self.schedule.as_ref().map(|s| s.depth)
    }

    /// Relays needed below `node`.
    pub fn relay_count(&self, node: NodeId) -> Result<u32, RelayError> {
        self.counter.relay_count(node).ok_or(RelayError::StaleBuckets)
    }

    /// Relays needed in the whole network.
    pub fn total_relays(&self) -> Result<u64, RelayError> {
        self.counter.total_relays().ok_or(RelayError::StaleBuckets)
    }

    /// Whether the current levels came from an ASAP-oriented pass.
    pub fn is_scheduled_asap(&self) -> bool {
        self.schedule.as_ref().is_some_and(Schedule::is_asap)
    }

    /// Canonical hash of levels, output levels, depth and relay total.
    pub fn fingerprint(&self) -> Result<String, RelayError> {
        let schedule = self.current()?;
        let total = self.total_relays()?;
        Ok(schedule_fingerprint(&schedule.levels, &schedule.po_levels, schedule.depth, total))
    }

    fn current(&self) -> Result<&Schedule, RelayError> {
        self.schedule.as_ref().ok_or(RelayError::Unscheduled)
    }
}
