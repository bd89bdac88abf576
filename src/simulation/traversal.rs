//! Route traversal.
//!
//! Every vehicle leaves its depot at time 0 and drives its route without
//! breaks. Vehicles do not interact; each route is simulated on its own and
//! the results are only combined afterwards.

use rand::Rng;
use tracing::trace;

use super::context::RouteContext;
use super::policy::{Outcome, TimeWindowPolicy};
use crate::models::RoutingSolution;
use crate::routing::RouteOptimizer;

/// What one vehicle did during a replication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleOutcome {
    /// Total distance driven.
    pub distance: f64,
    /// Time of return to the depot, waiting included.
    pub time: f64,
    /// Number of futile attempts, skipped stops included.
    pub futile: u32,
    /// Stops delivered, in order.
    pub delivered: Vec<usize>,
    /// Stops attempted without success, in order.
    pub futile_stops: Vec<usize>,
    /// Number of successful reroutes.
    pub reroutes: u32,
    /// Every location actually reached, depot ends included.
    pub path: Vec<usize>,
}

/// All vehicles of one replication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplicationOutcome {
    /// One entry per route, in solution order.
    pub vehicles: Vec<VehicleOutcome>,
}

impl ReplicationOutcome {
    /// Every delivered stop across vehicles.
    pub fn delivered(&self) -> Vec<usize> {
        self.vehicles.iter().flat_map(|v| v.delivered.iter().copied()).collect()
    }

    /// Every futile stop across vehicles.
    pub fn futile_stops(&self) -> Vec<usize> {
        self.vehicles.iter().flat_map(|v| v.futile_stops.iter().copied()).collect()
    }

    /// Total futile attempts.
    pub fn total_futile(&self) -> u32 {
        self.vehicles.iter().map(|v| v.futile).sum()
    }
}

/// Drives routes under a time-window policy.
///
/// With a non-zero `failure_probability`, each otherwise successful delivery
/// fails with that probability (nobody home). The draw comes from the
/// caller's random stream; with probability zero nothing is drawn.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use u_delivery::distance::{CostMatrix, TravelMatrices};
/// use u_delivery::models::{RoutingSolution, TimeWindow};
/// use u_delivery::routing::NearestNeighborOptimizer;
/// use u_delivery::simulation::{RouteContext, RouteSimulator, TimeWindowPolicy};
///
/// let m = CostMatrix::from_rows(&[vec![0.0, 2.0], vec![2.0, 0.0]]).unwrap();
/// let matrices = TravelMatrices::new(m.clone(), m);
/// let windows = vec![TimeWindow::new(0.0, 100.0).unwrap(); 2];
/// let ctx = RouteContext {
///     matrices: &matrices,
///     time_windows: &windows,
///     depots: &[0],
///     day: 0,
///     arrival_days: &[0, 0],
///     futile_counts: &[0, 0],
///     missing_window: Default::default(),
/// };
/// let sim = RouteSimulator::new(TimeWindowPolicy::ArrivalWait);
/// let solution = RoutingSolution::new(vec![vec![0, 1, 0]]);
/// let mut rng = StdRng::seed_from_u64(7);
/// let out = sim.simulate(&ctx, &solution, &mut NearestNeighborOptimizer::new(1), &mut rng);
/// assert_eq!(out.delivered(), vec![1]);
/// assert_eq!(out.vehicles[0].distance, 4.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RouteSimulator {
    policy: TimeWindowPolicy,
    failure_probability: f64,
}

impl RouteSimulator {
    /// Creates a simulator for `policy`.
    pub fn new(policy: TimeWindowPolicy) -> Self {
        Self {
            policy,
            failure_probability: 0.0,
        }
    }

    /// Sets the probability that an on-time delivery still fails.
    pub fn with_failure_probability(mut self, p: f64) -> Self {
        self.failure_probability = p.clamp(0.0, 1.0);
        self
    }

    /// The configured policy.
    pub fn policy(&self) -> TimeWindowPolicy {
        self.policy
    }

    /// Simulates every route of `solution`.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        ctx: &RouteContext<'_>,
        solution: &RoutingSolution,
        optimizer: &mut dyn RouteOptimizer,
        rng: &mut R,
    ) -> ReplicationOutcome {
        ReplicationOutcome {
            vehicles: solution
                .routes()
                .iter()
                .map(|route| self.simulate_route(ctx, route, optimizer, rng))
                .collect(),
        }
    }

    /// Simulates a single route.
    pub fn simulate_route<R: Rng + ?Sized>(
        &self,
        ctx: &RouteContext<'_>,
        route: &[usize],
        optimizer: &mut dyn RouteOptimizer,
        rng: &mut R,
    ) -> VehicleOutcome {
        let mut out = VehicleOutcome::default();
        let mut stops = route.to_vec();
        let mut position = 0;
        if let Some(&first) = stops.first() {
            out.path.push(first);
        }

        while position + 1 < stops.len() {
            let step = self.policy.decide(ctx, &stops, position, out.time, optimizer);
            out.distance += step.distance;
            out.time += step.time;
            let next = stops[position + 1];

            match step.outcome {
                Outcome::Delivered if self.customer_absent(rng) => {
                    out.futile += 1;
                    out.futile_stops.push(next);
                    out.path.push(next);
                    position += 1;
                }
                Outcome::Delivered => {
                    out.delivered.push(next);
                    out.path.push(next);
                    position += 1;
                }
                Outcome::Futile => {
                    out.futile += 1;
                    out.futile_stops.push(next);
                    out.path.push(next);
                    position += 1;
                }
                Outcome::AtDepot => {
                    out.path.push(next);
                    position += 1;
                }
                Outcome::Skipped {
                    remaining,
                    rerouted,
                } => {
                    trace!(stop = next, rerouted, "stop skipped before departure");
                    out.futile += 1;
                    out.futile_stops.push(next);
                    if rerouted {
                        out.reroutes += 1;
                    }
                    stops.truncate(position + 1);
                    stops.extend(remaining);
                }
            }
        }

        out
    }

    fn customer_absent<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.failure_probability > 0.0 && rng.random::<f64>() < self.failure_probability
    }
}
