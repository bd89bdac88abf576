//! The multi-day engine.
//!
//! - [`Simulation`] — Runs the day cycle over the horizon and owns the random stream
//! - [`SimulationConfig`] — Horizon, policy, replications, and collection settings
//! - [`DayMetrics`] — One record per replication per day, handed to [`MetricsSink`]s
//! - [`ArrivalGenerator`] / [`RouteObserver`] — Collaborators around the engine

mod collaborators;
mod config;
mod day;
mod driver;
mod metrics;

pub use collaborators::{
    ArrivalGenerator, NoArrivals, RouteObserver, TracingObserver, UniformArrivals,
};
pub use config::{CollectionConfig, ConfigError, SimulationConfig};
pub use day::AbortReason;
pub use driver::{Simulation, SimulationBuilder, SimulationError, SimulationRun, Termination};
pub use metrics::{DayMetrics, JsonLinesSink, MemorySink, MetricsSink, PackageStats, SinkError};
