//! Record CPU, memory and disk I/O of a process tree over time, alongside
//! host network throughput from an external bandwidth monitor.

pub mod config;
pub mod format;
pub mod logging;
pub mod monitor;
pub mod network;
pub mod render;
pub mod sampler;
pub mod shutdown;
pub mod sink;
pub mod system;

pub use monitor::{MonitorOptions, MonitorReport, monitor};
pub use sampler::{AggregatedSample, RunContext, Termination};
