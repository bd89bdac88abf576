//! Per-day metrics and where they go.

use std::collections::HashSet;
use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PackageRegistry, RoutingSolution};
use crate::simulation::ReplicationOutcome;

/// Age and window of a set of packages, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStats {
    /// Days each package has been in the system.
    pub days_taken: Vec<usize>,
    /// Each package's window, truncated to whole units.
    pub time_window: Vec<[i64; 2]>,
}

impl PackageStats {
    /// Number of packages described.
    pub fn len(&self) -> usize {
        self.days_taken.len()
    }

    /// Returns `true` if no package is described.
    pub fn is_empty(&self) -> bool {
        self.days_taken.is_empty()
    }
}

/// Outcome of one replication of one day.
///
/// Every measured quantity is truncated to an integer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayMetrics {
    /// Zero-based day.
    pub day: usize,
    /// Zero-based replication within the day.
    pub replication: usize,
    /// Packages in the system at routing time, depots excluded.
    pub package_count: usize,
    /// Routes dispatched.
    pub vehicle_count: usize,
    /// Distance driven per vehicle.
    pub per_vehicle_distance: Vec<i64>,
    /// Time taken per vehicle.
    pub per_vehicle_time: Vec<i64>,
    /// Stops planned per vehicle.
    pub attempted_deliveries: Vec<usize>,
    /// Futile attempts per vehicle.
    pub futile_deliveries: Vec<u32>,
    /// Packages delivered in this replication.
    pub delivered: PackageStats,
    /// Packages still waiting after this replication.
    pub undelivered: PackageStats,
}

impl DayMetrics {
    /// Summarizes a replication against the registry it was planned on.
    ///
    /// A package counts as delivered when it, or any member of its
    /// alternate group, was delivered. Only the member actually visited is
    /// listed under `delivered`; the others are dropped from `undelivered`.
    pub fn from_replication(
        day: usize,
        replication: usize,
        registry: &PackageRegistry,
        solution: &RoutingSolution,
        outcome: &ReplicationOutcome,
        groups: &[Vec<usize>],
    ) -> Self {
        let delivered: Vec<usize> = outcome
            .delivered()
            .into_iter()
            .filter(|&pos| !registry.is_depot(pos))
            .collect();
        let hit: HashSet<usize> = delivered.iter().copied().collect();
        let mut satisfied = hit.clone();
        for group in groups {
            if group.iter().any(|pos| hit.contains(pos)) {
                satisfied.extend(group.iter().copied());
            }
        }
        let waiting: Vec<usize> = (registry.num_depots()..registry.len())
            .filter(|pos| !satisfied.contains(pos))
            .collect();

        Self {
            day,
            replication,
            package_count: registry.non_depot_count(),
            vehicle_count: solution.num_routes(),
            per_vehicle_distance: outcome.vehicles.iter().map(|v| v.distance as i64).collect(),
            per_vehicle_time: outcome.vehicles.iter().map(|v| v.time as i64).collect(),
            attempted_deliveries: solution.attempted_deliveries(),
            futile_deliveries: outcome.vehicles.iter().map(|v| v.futile).collect(),
            delivered: stats(registry, day, &delivered),
            undelivered: stats(registry, day, &waiting),
        }
    }
}

fn stats(registry: &PackageRegistry, day: usize, positions: &[usize]) -> PackageStats {
    let mut out = PackageStats::default();
    for package in positions.iter().filter_map(|&pos| registry.get(pos)) {
        out.days_taken.push(day.saturating_sub(package.arrival_day()));
        out.time_window.push(package.time_window().truncated());
    }
    out
}

/// Failure to hand metrics to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("metrics sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("metrics rejected: {0}")]
    Rejected(String),
}

/// Receives every [`DayMetrics`] as soon as it is produced.
pub trait MetricsSink {
    /// Stores one record.
    fn record(&mut self, metrics: &DayMetrics) -> Result<(), SinkError>;

    /// Called once after the last record.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<T: MetricsSink + ?Sized> MetricsSink for &mut T {
    fn record(&mut self, metrics: &DayMetrics) -> Result<(), SinkError> {
        (**self).record(metrics)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        (**self).finish()
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<DayMetrics>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far.
    pub fn records(&self) -> &[DayMetrics] {
        &self.records
    }

    /// Takes the records out of the sink.
    pub fn into_records(self) -> Vec<DayMetrics> {
        self.records
    }
}

impl MetricsSink for MemorySink {
    fn record(&mut self, metrics: &DayMetrics) -> Result<(), SinkError> {
        self.records.push(metrics.clone());
        Ok(())
    }
}

/// Writes one JSON object per line.
///
/// # Examples
///
/// ```
/// use u_delivery::engine::{DayMetrics, JsonLinesSink, MetricsSink};
///
/// let mut sink = JsonLinesSink::new(Vec::new());
/// sink.record(&DayMetrics::default()).unwrap();
/// let out = String::from_utf8(sink.into_inner()).unwrap();
/// assert!(out.starts_with("{\"day\":0,"));
/// assert!(out.ends_with('\n'));
/// ```
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricsSink for JsonLinesSink<W> {
    fn record(&mut self, metrics: &DayMetrics) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, metrics)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
