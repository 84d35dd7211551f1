//! Real-time staircase current protocols for closed-loop electrophysiology.
//!
//! - [`generator`]: the per-tick protocol engine, its parameters and variants
//! - [`host`]: the host module lifecycle and a tick scheduler
//! - [`config`]: JSON protocol files
//! - [`trace`]: CSV export of recorded ticks

pub mod config;
pub mod error;
pub mod generator;
pub mod host;
pub mod trace;

pub use error::ConfigError;
