//! # relay-kernel
//!
//! Level scheduling and relay-tree insertion for capacity-constrained DAGs.
//!
//! Every node of a combinational network gets an integer level. Afterwards
//! each edge must span exactly one level and no node may drive more direct
//! successors than its capacity, so the kernel inserts pass-through *relays*
//! wherever a signal has to wait or fan out. The goal is the fewest relays.
//!
//! ## Architecture
//!
//! ```text
//! LogicNetwork → LevelAssigner → FanoutTreeCounter ⇄ ChunkOptimizer → NetworkMaterializer
//!                     ↓                  ↓                                   ↓
//!                  Schedule         relay totals                        RelayNetwork
//! ```
//!
//! [`RelayInsertion`] drives one run through all stages.
//!
//! ## Determinism Guarantees
//!
//! - Same network + same configuration → identical levels and relay total
//! - Sweep order is node-id order, or a seeded shuffle with `det_randomization`
//! - [`RelayInsertion::fingerprint`] hashes the outcome canonically (xxh64)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod network;
pub mod policy;
pub mod canonical;
pub mod schedule;
pub mod counter;
pub mod optimizer;
pub mod materialize;
pub mod engine;

// Re-exports
pub use types::{NodeId, Signal, GateFunction, NodeKind, FanoutBucket, FanoutTree};
pub use network::{LogicNetwork, InMemoryNetwork, NetworkError};
pub use policy::{ScheduleConfig, SchedulingPolicy, OptimizationEffort, ConfigError};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex, schedule_fingerprint};
pub use schedule::{LevelAssigner, Schedule, Orientation, splitter_levels};
pub use counter::{FanoutTreeCounter, InvariantViolation};
pub use optimizer::{ChunkOptimizer, OptimizationReport};
pub use materialize::{NetworkMaterializer, RelayNetwork, RelayNetworkViolation, MaterializeError};
pub use engine::{RelayInsertion, RelayError};

/// Schema version of the serialized network, config and report types.
/// Increment on breaking changes to any of them.
pub const RELAY_KERNEL_SCHEMA_VERSION: &str = "1.0.0";
