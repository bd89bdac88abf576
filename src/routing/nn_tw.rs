//! Time-window-aware nearest-neighbor optimizer.
//!
//! # Algorithm
//!
//! Each vehicle leaves its depot at time 0 and repeatedly moves to the
//! nearest unvisited package whose window can still be met (arrival ≤ due,
//! waiting allowed when early). Visiting any member of an alternate group
//! satisfies the whole group. A stop whose only free arc leads into a
//! virtual depot (the fixed end of a rerouting path) is held back until
//! nothing else is feasible. A vehicle returns when no feasible package is
//! left; the next vehicle starts from the next depot (round-robin). Each
//! route is then polished with time-window-preserving 2-opt.
//!
//! # Complexity
//!
//! O(n²) construction, plus O(n³) per 2-opt pass.
//!
//! # Reference
//!
//! Solomon, M.M. (1987). "Algorithms for the Vehicle Routing and Scheduling
//! Problems with Time Window Constraints", *Operations Research* 35(2), 254-265.

use super::two_opt::two_opt_improve;
use super::{OptimizationRequest, OptimizeError, RouteOptimizer, RoutingPlan};
use crate::distance::VIRTUAL_ARC_COST;
use crate::models::RoutingSolution;

/// Reference optimizer: nearest-neighbor construction with 2-opt.
///
/// # Examples
///
/// ```
/// use u_delivery::distance::CostMatrix;
/// use u_delivery::models::{Location, TimeWindow};
/// use u_delivery::routing::{NearestNeighborOptimizer, OptimizationRequest, RouteOptimizer};
///
/// let dm = CostMatrix::from_locations(&[
///     Location::new(0.0, 0.0),
///     Location::new(1.0, 0.0),
///     Location::new(2.0, 0.0),
/// ]);
/// let tw = vec![TimeWindow::new(0.0, 100.0).unwrap(); 3];
/// let request = OptimizationRequest {
///     depots: &[0],
///     distances: &dm,
///     times: &dm,
///     time_windows: &tw,
///     day: 0,
///     arrival_days: &[0, 0, 0],
///     futile_counts: &[0, 0, 0],
///     alternate_groups: &[],
///     max_vehicles: None,
/// };
///
/// let plan = NearestNeighborOptimizer::new(1).optimize(&request).unwrap();
/// assert_eq!(plan.solution.routes(), &[vec![0, 1, 2, 0]]);
/// assert!(plan.unscheduled.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct NearestNeighborOptimizer {
    vehicles: usize,
    improve: bool,
}

impl NearestNeighborOptimizer {
    /// Creates an optimizer dispatching at most `vehicles` routes per day.
    pub fn new(vehicles: usize) -> Self {
        Self {
            vehicles,
            improve: true,
        }
    }

    /// Enables or disables the 2-opt pass.
    pub fn with_improvement(mut self, improve: bool) -> Self {
        self.improve = improve;
        self
    }
}

impl RouteOptimizer for NearestNeighborOptimizer {
    fn optimize(
        &mut self,
        request: &OptimizationRequest<'_>,
    ) -> Result<RoutingPlan, OptimizeError> {
        request.check()?;

        let n = request.size();
        let depots = request.depots;
        let fleet = request.max_vehicles.unwrap_or(self.vehicles);

        // group id per position; singletons for anything not listed
        let mut group_of: Vec<usize> = (0..n).collect();
        for (g, group) in request.alternate_groups.iter().enumerate() {
            for &pos in group {
                if pos < n {
                    group_of[pos] = n + g;
                }
            }
        }
        let mut served = vec![false; n + request.alternate_groups.len()];
        for &d in depots {
            served[group_of[d]] = true;
        }

        let mut routes = Vec::new();
        for vehicle in 0..fleet {
            let depot = depots[vehicle % depots.len()];
            let mut current = depot;
            let mut current_time = 0.0;
            let mut stops = Vec::new();

            loop {
                let mut best: Option<(usize, f64)> = None;
                let mut closing: Option<(usize, f64)> = None;
                for i in 0..n {
                    if served[group_of[i]] || depots.contains(&i) {
                        continue;
                    }
                    let arrival = current_time + request.times.get(current, i);
                    if request.time_windows[i].is_late(arrival) {
                        continue;
                    }
                    let d = request.distances.get(current, i);
                    let slot = if closes_route(request, i, depot) {
                        &mut closing
                    } else {
                        &mut best
                    };
                    if slot.is_none_or(|(_, best_d)| d < best_d) {
                        *slot = Some((i, d));
                    }
                }

                let Some((next, _)) = best.or(closing) else { break };
                served[group_of[next]] = true;
                let arrival = current_time + request.times.get(current, next);
                current_time = arrival + request.time_windows[next].waiting_time(arrival);
                current = next;
                stops.push(next);
                if best.is_none() {
                    break;
                }
            }

            if stops.is_empty() {
                // every later vehicle starting here would find nothing either
                if depots.len() == 1 {
                    break;
                }
                continue;
            }

            if self.improve {
                stops = two_opt_improve(
                    &stops,
                    depot,
                    request.distances,
                    request.times,
                    request.time_windows,
                )
                .0;
            }

            let mut route = Vec::with_capacity(stops.len() + 2);
            route.push(depot);
            route.extend(stops);
            route.push(depot);
            routes.push(route);
        }

        let unscheduled = (0..n)
            .filter(|i| !depots.contains(i) && !served[group_of[*i]])
            .collect();

        Ok(RoutingPlan {
            solution: RoutingSolution::new(routes),
            unscheduled,
        })
    }
}

/// Whether `stop` is the fixed end of an open path: its only free arc leads
/// into a virtual `depot` that cannot be reached any other way. Such a stop
/// is visited last.
fn closes_route(request: &OptimizationRequest<'_>, stop: usize, depot: usize) -> bool {
    request.distances.get(stop, depot) == 0.0
        && request.distances.get(depot, stop) >= VIRTUAL_ARC_COST
}
