//! Run configuration.

pub mod config;

pub use config::{ScheduleConfig, SchedulingPolicy, OptimizationEffort, ConfigError};
