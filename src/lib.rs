//! geyser-race - which Yellowstone Geyser node sees a transaction first?
//!
//! Subscribes to the same transaction filter on several nodes at once,
//! races every transaction signature across them, and ranks the nodes by
//! how often they delivered a transaction first.

pub mod address;
pub mod benchmark;
pub mod config;
pub mod detection;
pub mod report;
pub mod streamer_core;

pub use benchmark::{Benchmark, BenchmarkError, Progress};
pub use config::{BenchmarkConfig, CliArgs, ConfigError};
pub use report::BenchmarkReport;
