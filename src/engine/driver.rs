//! The multi-day run.

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{info, warn};

use super::collaborators::{ArrivalGenerator, NoArrivals, RouteObserver};
use super::config::{ConfigError, SimulationConfig};
use super::day::{AbortReason, DayCycle, DayOutcome};
use super::metrics::{DayMetrics, MetricsSink, SinkError};
use crate::collection::CollectionAllocator;
use crate::distance::GeometryProvider;
use crate::models::{InvariantViolation, Location, NewPackage, Package, PackageRegistry};
use crate::routing::RouteOptimizer;
use crate::simulation::RouteSimulator;

/// Errors that end a run without a result.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("simulation needs a {0}")]
    MissingCollaborator(&'static str),

    #[error("invariant violated on day {day}: {source}")]
    Invariant {
        day: usize,
        source: InvariantViolation,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Every configured day was simulated.
    Completed,
    /// A collaborator failed on `day`; metrics cover the days before it.
    Aborted {
        /// Day on which the run stopped.
        day: usize,
        /// What failed.
        reason: AbortReason,
    },
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    /// One record per replication per completed day, in order.
    pub metrics: Vec<DayMetrics>,
    /// How the run ended.
    pub termination: Termination,
    /// Packages left in the system at the end.
    pub registry: PackageRegistry,
    /// Collection points and their residents at the end, if configured.
    pub collection: Option<CollectionAllocator>,
}

impl SimulationRun {
    /// Returns `true` if every day was simulated.
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }

    /// Number of distinct days with metrics.
    pub fn days_completed(&self) -> usize {
        self.metrics.last().map_or(0, |m| m.day + 1)
    }
}

/// A configured multi-day delivery simulation.
///
/// Owns the run's single random stream: every day's arrivals are drawn
/// first, then the days run in order, each feeding collection sampling and
/// delivery failures from the same stream. The same seed and collaborators
/// always give the same metrics.
///
/// # Examples
///
/// ```
/// use u_delivery::distance::EuclideanGeometry;
/// use u_delivery::engine::{Simulation, SimulationConfig};
/// use u_delivery::models::{Location, NewPackage, TimeWindow};
/// use u_delivery::routing::NearestNeighborOptimizer;
///
/// let config = SimulationConfig::default().with_days(2).with_seed(1).with_day_span(0.0, 100.0);
/// let run = Simulation::builder(config)
///     .depot(Location::new(0.0, 0.0))
///     .geometry(EuclideanGeometry::new(1.0))
///     .optimizer(NearestNeighborOptimizer::new(2))
///     .arrivals(|_day: usize, _rng: &mut rand::rngs::StdRng| {
///         vec![NewPackage::new(Location::new(3.0, 4.0), TimeWindow::new(0.0, 50.0).unwrap())]
///     })
///     .build()
///     .unwrap()
///     .run()
///     .unwrap();
///
/// assert!(run.is_complete());
/// assert_eq!(run.metrics.len(), 2);
/// assert_eq!(run.metrics[1].package_count, 1);
/// ```
pub struct Simulation<'a> {
    config: SimulationConfig,
    cycle: DayCycle<'a>,
    arrivals: Box<dyn ArrivalGenerator + 'a>,
    sinks: Vec<Box<dyn MetricsSink + 'a>>,
}

impl<'a> Simulation<'a> {
    /// Starts building a simulation from `config`.
    pub fn builder(config: SimulationConfig) -> SimulationBuilder<'a> {
        SimulationBuilder::new(config)
    }

    /// The configuration in use.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current package state.
    pub fn registry(&self) -> &PackageRegistry {
        &self.cycle.registry
    }

    /// Runs every configured day.
    ///
    /// A geometry or optimizer failure stops the run early and is reported
    /// through [`Termination::Aborted`]; the metrics collected up to that
    /// day are still returned.
    pub fn run(mut self) -> Result<SimulationRun, SimulationError> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        info!(
            days = self.config.days,
            replications = self.config.replications,
            policy = ?self.config.policy,
            seed = ?self.config.seed,
            "simulation started"
        );

        let batches: Vec<Vec<NewPackage>> = (0..self.config.days)
            .map(|day| self.arrivals.generate(day, &mut rng))
            .collect();

        let mut metrics = Vec::new();
        let mut termination = Termination::Completed;
        for (day, batch) in batches.into_iter().enumerate() {
            match self.cycle.run(day, batch, &mut rng)? {
                DayOutcome::Completed(records) => {
                    for record in &records {
                        for sink in &mut self.sinks {
                            sink.record(record)?;
                        }
                    }
                    metrics.extend(records);
                }
                DayOutcome::Aborted(reason) => {
                    warn!(day, %reason, "simulation stopped early");
                    termination = Termination::Aborted { day, reason };
                    break;
                }
            }
        }
        for sink in &mut self.sinks {
            sink.finish()?;
        }

        info!(
            records = metrics.len(),
            remaining = self.cycle.registry.non_depot_count(),
            complete = termination == Termination::Completed,
            "simulation finished"
        );
        Ok(SimulationRun {
            metrics,
            termination,
            registry: self.cycle.registry,
            collection: self.cycle.collection,
        })
    }
}

/// Assembles a [`Simulation`].
///
/// Geometry, optimizer and at least one depot are required; arrivals
/// default to none.
pub struct SimulationBuilder<'a> {
    config: SimulationConfig,
    depots: Vec<Location>,
    initial: Vec<Package>,
    geometry: Option<Box<dyn GeometryProvider + 'a>>,
    optimizer: Option<Box<dyn RouteOptimizer + 'a>>,
    arrivals: Option<Box<dyn ArrivalGenerator + 'a>>,
    sinks: Vec<Box<dyn MetricsSink + 'a>>,
    observers: Vec<Box<dyn RouteObserver + 'a>>,
}

impl<'a> SimulationBuilder<'a> {
    /// Creates a builder.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            depots: Vec::new(),
            initial: Vec::new(),
            geometry: None,
            optimizer: None,
            arrivals: None,
            sinks: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Adds a depot.
    pub fn depot(mut self, location: Location) -> Self {
        self.depots.push(location);
        self
    }

    /// Adds several depots.
    pub fn depots(mut self, locations: impl IntoIterator<Item = Location>) -> Self {
        self.depots.extend(locations);
        self
    }

    /// Seeds a package already in the system before day 0.
    pub fn package(mut self, package: Package) -> Self {
        self.initial.push(package);
        self
    }

    /// Sets the travel geometry provider.
    pub fn geometry(mut self, geometry: impl GeometryProvider + 'a) -> Self {
        self.geometry = Some(Box::new(geometry));
        self
    }

    /// Sets the route optimizer.
    pub fn optimizer(mut self, optimizer: impl RouteOptimizer + 'a) -> Self {
        self.optimizer = Some(Box::new(optimizer));
        self
    }

    /// Sets the arrival generator.
    pub fn arrivals(mut self, arrivals: impl ArrivalGenerator + 'a) -> Self {
        self.arrivals = Some(Box::new(arrivals));
        self
    }

    /// Adds a metrics sink.
    pub fn sink(mut self, sink: impl MetricsSink + 'a) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Adds a route observer.
    pub fn observer(mut self, observer: impl RouteObserver + 'a) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Validates the configuration and assembles the simulation.
    pub fn build(self) -> Result<Simulation<'a>, SimulationError> {
        self.config.validate()?;
        if self.depots.is_empty() {
            return Err(SimulationError::MissingCollaborator("depot"));
        }
        let geometry = self
            .geometry
            .ok_or(SimulationError::MissingCollaborator("geometry provider"))?;
        let optimizer = self
            .optimizer
            .ok_or(SimulationError::MissingCollaborator("route optimizer"))?;

        let mut registry = PackageRegistry::new(&self.depots, self.config.day_span()?);
        for package in self.initial {
            let id = package.id();
            if !registry.insert(package) {
                return Err(ConfigError::Invalid(format!(
                    "initial package {id:?} is a depot or reuses an id"
                ))
                .into());
            }
        }

        let simulator = RouteSimulator::new(self.config.policy)
            .with_failure_probability(self.config.failure_probability);
        let collection = self.config.collection.as_ref().map(|c| c.allocator());
        let cycle = DayCycle {
            registry,
            geometry,
            optimizer,
            collection,
            observers: self.observers,
            simulator,
            replications: self.config.replications,
            missing_window: self.config.missing_window,
        };

        Ok(Simulation {
            config: self.config,
            cycle,
            arrivals: self.arrivals.unwrap_or_else(|| Box::new(NoArrivals)),
            sinks: self.sinks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::EuclideanGeometry;
    use crate::engine::MemorySink;
    use crate::models::{PackageId, TimeWindow};
    use crate::routing::NearestNeighborOptimizer;

    fn config() -> SimulationConfig {
        SimulationConfig::default()
            .with_days(3)
            .with_seed(5)
            .with_day_span(0.0, 100.0)
    }

    fn one_per_day(day: usize, _rng: &mut StdRng) -> Vec<NewPackage> {
        let tw = TimeWindow::new(0.0, 100.0).expect("valid");
        vec![NewPackage::new(Location::new(day as f64 + 1.0, 0.0), tw)]
    }

    #[test]
    fn test_build_requires_collaborators() {
        let err = Simulation::builder(config())
            .geometry(EuclideanGeometry::new(1.0))
            .optimizer(NearestNeighborOptimizer::new(1))
            .build();
        assert!(matches!(err, Err(SimulationError::MissingCollaborator("depot"))));

        let err = Simulation::builder(config())
            .depot(Location::new(0.0, 0.0))
            .optimizer(NearestNeighborOptimizer::new(1))
            .build();
        assert!(matches!(err, Err(SimulationError::MissingCollaborator(_))));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let err = Simulation::builder(config().with_replications(0))
            .depot(Location::new(0.0, 0.0))
            .geometry(EuclideanGeometry::new(1.0))
            .optimizer(NearestNeighborOptimizer::new(1))
            .build();
        assert!(matches!(err, Err(SimulationError::Config(_))));
    }

    #[test]
    fn test_build_rejects_duplicate_initial_package() {
        let tw = TimeWindow::new(0.0, 100.0).expect("valid");
        let p = Package::delivery(PackageId(4), Location::new(1.0, 1.0), tw, 0);
        let err = Simulation::builder(config())
            .depot(Location::new(0.0, 0.0))
            .package(p.clone())
            .package(p)
            .geometry(EuclideanGeometry::new(1.0))
            .optimizer(NearestNeighborOptimizer::new(1))
            .build();
        assert!(matches!(err, Err(SimulationError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_run_forwards_metrics_to_sinks() {
        let mut sink = MemorySink::new();
        let run = Simulation::builder(config())
            .depot(Location::new(0.0, 0.0))
            .geometry(EuclideanGeometry::new(1.0))
            .optimizer(NearestNeighborOptimizer::new(1))
            .arrivals(one_per_day)
            .sink(&mut sink)
            .build()
            .expect("valid")
            .run()
            .expect("valid");
        assert!(run.is_complete());
        assert_eq!(run.days_completed(), 3);
        assert_eq!(sink.records(), run.metrics.as_slice());
        assert_eq!(run.registry.non_depot_count(), 0);
    }

    #[test]
    fn test_zero_days() {
        let run = Simulation::builder(config().with_days(0))
            .depot(Location::new(0.0, 0.0))
            .geometry(EuclideanGeometry::new(1.0))
            .optimizer(NearestNeighborOptimizer::new(1))
            .build()
            .expect("valid")
            .run()
            .expect("valid");
        assert!(run.metrics.is_empty());
        assert!(run.is_complete());
        assert_eq!(run.days_completed(), 0);
    }

    #[test]
    fn test_sink_error_is_returned() {
        struct Refusing;
        impl MetricsSink for Refusing {
            fn record(&mut self, _: &DayMetrics) -> Result<(), SinkError> {
                Err(SinkError::Rejected("disk full".into()))
            }
        }
        let err = Simulation::builder(config())
            .depot(Location::new(0.0, 0.0))
            .geometry(EuclideanGeometry::new(1.0))
            .optimizer(NearestNeighborOptimizer::new(1))
            .arrivals(one_per_day)
            .sink(Refusing)
            .build()
            .expect("valid")
            .run();
        assert!(matches!(err, Err(SimulationError::Sink(SinkError::Rejected(_)))));
    }
}
