//! Core types for the relay kernel.

pub mod node;
pub mod bucket;

pub use node::{NodeId, Signal, GateFunction, NodeKind};
pub use bucket::{FanoutBucket, FanoutTree};
