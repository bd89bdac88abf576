//! Route optimizer seam.

use crate::distance::CostMatrix;
use crate::models::{RoutingSolution, TimeWindow};

/// Failure reported by a route optimizer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizeError {
    /// The request is malformed (mismatched sizes, no depot, ...).
    #[error("invalid optimization request: {0}")]
    InvalidRequest(String),
    /// No tour satisfies the constraints.
    #[error("no feasible routing: {0}")]
    Infeasible(String),
}

/// Everything an optimizer sees about one day (or one rerouting
/// sub-problem). All per-package slices are indexed by position.
#[derive(Debug, Clone, Copy)]
pub struct OptimizationRequest<'a> {
    /// Depot positions. Routes must start and end at one of these.
    pub depots: &'a [usize],
    /// Travel distances.
    pub distances: &'a CostMatrix,
    /// Travel times.
    pub times: &'a CostMatrix,
    /// Delivery time windows.
    pub time_windows: &'a [TimeWindow],
    /// Current simulation day.
    pub day: usize,
    /// Day each package arrived.
    pub arrival_days: &'a [usize],
    /// Futile attempts so far, per package.
    pub futile_counts: &'a [u32],
    /// Alternate groups; visiting one member satisfies the whole group.
    pub alternate_groups: &'a [Vec<usize>],
    /// Upper bound on routes, overriding the optimizer's own fleet size.
    pub max_vehicles: Option<usize>,
}

impl OptimizationRequest<'_> {
    /// Number of locations in the request.
    pub fn size(&self) -> usize {
        self.distances.size()
    }

    /// Checks that every table covers the same locations and that depots
    /// are in range.
    pub fn check(&self) -> Result<(), OptimizeError> {
        let n = self.size();
        let sizes = [
            ("time matrix", self.times.size()),
            ("time windows", self.time_windows.len()),
            ("arrival days", self.arrival_days.len()),
            ("futile counts", self.futile_counts.len()),
        ];
        for (what, len) in sizes {
            if len != n {
                return Err(OptimizeError::InvalidRequest(format!(
                    "{what} has {len} entries, expected {n}"
                )));
            }
        }
        if self.depots.is_empty() {
            return Err(OptimizeError::InvalidRequest("no depot given".into()));
        }
        if let Some(&d) = self.depots.iter().find(|&&d| d >= n) {
            return Err(OptimizeError::InvalidRequest(format!(
                "depot {d} out of range for {n} locations"
            )));
        }
        Ok(())
    }
}

/// Optimizer output: the day's routes plus the packages left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingPlan {
    /// Vehicle routes.
    pub solution: RoutingSolution,
    /// Non-depot positions not assigned to any route.
    pub unscheduled: Vec<usize>,
}

/// Assigns packages to vehicle routes.
///
/// Closures with the matching signature implement this trait, which keeps
/// test stubs short.
///
/// # Examples
///
/// ```
/// use u_delivery::models::RoutingSolution;
/// use u_delivery::routing::{OptimizationRequest, OptimizeError, RouteOptimizer, RoutingPlan};
///
/// let mut visit_all = |req: &OptimizationRequest<'_>| -> Result<RoutingPlan, OptimizeError> {
///     let depot = req.depots[0];
///     let mut route = vec![depot];
///     route.extend((0..req.size()).filter(|i| !req.depots.contains(i)));
///     route.push(depot);
///     Ok(RoutingPlan { solution: RoutingSolution::new(vec![route]), unscheduled: vec![] })
/// };
/// let _: &mut dyn RouteOptimizer = &mut visit_all;
/// ```
pub trait RouteOptimizer {
    /// Builds routes for the request.
    fn optimize(&mut self, request: &OptimizationRequest<'_>) -> Result<RoutingPlan, OptimizeError>;
}

impl<F> RouteOptimizer for F
where
    F: FnMut(&OptimizationRequest<'_>) -> Result<RoutingPlan, OptimizeError>,
{
    fn optimize(
        &mut self,
        request: &OptimizationRequest<'_>,
    ) -> Result<RoutingPlan, OptimizeError> {
        self(request)
    }
}
