//! One simulated day.

use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{debug, error, info};

use super::collaborators::RouteObserver;
use super::metrics::DayMetrics;
use super::SimulationError;
use crate::collection::CollectionAllocator;
use crate::distance::{GeometryError, GeometryProvider};
use crate::models::{InvariantViolation, NewPackage, PackageRegistry};
use crate::routing::{OptimizationRequest, OptimizeError, RouteOptimizer};
use crate::simulation::{MissingWindow, ReplicationOutcome, RouteContext, RouteSimulator};

/// Why a run stopped before its last day.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbortReason {
    #[error("travel geometry unavailable: {0}")]
    Geometry(#[from] GeometryError),

    #[error("route optimization failed: {0}")]
    Optimizer(#[from] OptimizeError),
}

/// Result of a day that did not hit an invariant violation.
#[derive(Debug)]
pub(crate) enum DayOutcome {
    /// One record per replication.
    Completed(Vec<DayMetrics>),
    /// A collaborator failed; the run stops here.
    Aborted(AbortReason),
}

/// Package state and collaborators carried from day to day.
pub(crate) struct DayCycle<'a> {
    pub(crate) registry: PackageRegistry,
    pub(crate) geometry: Box<dyn GeometryProvider + 'a>,
    pub(crate) optimizer: Box<dyn RouteOptimizer + 'a>,
    pub(crate) collection: Option<CollectionAllocator>,
    pub(crate) observers: Vec<Box<dyn RouteObserver + 'a>>,
    pub(crate) simulator: RouteSimulator,
    pub(crate) replications: usize,
    pub(crate) missing_window: MissingWindow,
}

impl DayCycle<'_> {
    /// Runs day `day` with its pre-generated arrivals.
    ///
    /// Collaborator failures end the day with [`DayOutcome::Aborted`];
    /// broken invariants are errors.
    pub(crate) fn run(
        &mut self,
        day: usize,
        arrivals: Vec<NewPackage>,
        rng: &mut StdRng,
    ) -> Result<DayOutcome, SimulationError> {
        let admitted = self.registry.admit(arrivals, day);
        info!(
            day,
            arrivals = admitted.len(),
            packages = self.registry.non_depot_count(),
            "day started"
        );

        if let Some(allocator) = &mut self.collection {
            let diverted =
                allocator.run_day(&mut self.registry, self.geometry.as_mut(), day, rng);
            if let Err(err) = diverted {
                error!(day, %err, "collection point distances unavailable, stopping simulation");
                return Ok(DayOutcome::Aborted(err.into()));
            }
        }

        let locations = self.registry.locations();
        let matrices = match self.geometry.matrices(&locations) {
            Ok(matrices) => matrices,
            Err(err) => {
                error!(day, %err, "distance computation failed, stopping simulation");
                return Ok(DayOutcome::Aborted(err.into()));
            }
        };
        let expected = self.registry.len();
        for (what, actual) in [
            ("distance matrix", matrices.distance.size()),
            ("time matrix", matrices.time.size()),
        ] {
            if actual != expected {
                return Err(SimulationError::Invariant {
                    day,
                    source: InvariantViolation::SizeMismatch {
                        what,
                        actual,
                        expected,
                    },
                });
            }
        }

        let groups = self.registry.alternate_groups();
        let depots = self.registry.depot_indices();
        let windows = self.registry.time_windows();
        let arrival_days = self.registry.arrival_days();
        let futile_counts = self.registry.futile_counts();

        let request = OptimizationRequest {
            depots: &depots,
            distances: &matrices.distance,
            times: &matrices.time,
            time_windows: &windows,
            day,
            arrival_days: &arrival_days,
            futile_counts: &futile_counts,
            alternate_groups: &groups,
            max_vehicles: None,
        };
        let plan = match self.optimizer.optimize(&request) {
            Ok(plan) => plan,
            Err(err) => {
                error!(day, %err, "route optimization failed, stopping simulation");
                return Ok(DayOutcome::Aborted(err.into()));
            }
        };
        plan.solution
            .validate(&depots, expected)
            .map_err(|source| SimulationError::Invariant { day, source })?;
        debug!(
            day,
            routes = plan.solution.num_routes(),
            unscheduled = plan.unscheduled.len(),
            "routes planned"
        );
        for observer in &mut self.observers {
            observer.on_routes(day, &plan.solution, &locations, &matrices.distance);
        }

        // Groups without a single scheduled member were not even attempted.
        // An unscheduled alternate whose group-mate is routed is left alone.
        let scheduled = plan.solution.scheduled(&depots);
        let unattempted: Vec<usize> = groups
            .iter()
            .filter(|group| !group.iter().any(|pos| scheduled.contains(pos)))
            .flatten()
            .copied()
            .collect();
        self.registry.record_futile(&unattempted);

        let ctx = RouteContext {
            matrices: &matrices,
            time_windows: &windows,
            depots: &depots,
            day,
            arrival_days: &arrival_days,
            futile_counts: &futile_counts,
            missing_window: self.missing_window,
        };
        let mut metrics = Vec::with_capacity(self.replications);
        let mut last = ReplicationOutcome::default();
        for replication in 0..self.replications {
            let outcome = self
                .simulator
                .simulate(&ctx, &plan.solution, self.optimizer.as_mut(), rng);
            debug!(
                day,
                replication,
                delivered = outcome.delivered().len(),
                futile = outcome.total_futile(),
                "replication finished"
            );
            metrics.push(DayMetrics::from_replication(
                day,
                replication,
                &self.registry,
                &plan.solution,
                &outcome,
                &groups,
            ));
            last = outcome;
        }

        // Only the last replication carries over.
        self.registry.record_futile(&last.futile_stops());
        let delivered = last.delivered();
        let removed = self.registry.remove_groups(&delivered, &groups);
        info!(
            day,
            delivered = delivered.len(),
            removed,
            remaining = self.registry.non_depot_count(),
            "day finished"
        );

        Ok(DayOutcome::Completed(metrics))
    }
}
