//! Mid-route rerouting through a virtual-depot sub-problem.
//!
//! # Algorithm
//!
//! When a vehicle abandons a stop, the stops it has yet to visit are
//! resequenced from where it stands. That is an open path with a fixed start
//! (the current position) and a fixed end (the route's depot), which a tour
//! optimizer cannot express directly. The sub-problem therefore slices the
//! day's matrices down to `[end, current, rest...]` and appends a virtual
//! depot whose only free arcs are `virtual → current` and `end → virtual`
//! (see [`CostMatrix::with_virtual_depot`]). Any finite-cost closed tour from
//! the virtual depot is then exactly the wanted open path.
//!
//! Windows are shifted by the elapsed time so the sub-problem starts at 0.
//!
//! [`CostMatrix::with_virtual_depot`]: crate::distance::CostMatrix::with_virtual_depot

use super::context::RouteContext;
use crate::distance::{TravelMatrices, VIRTUAL_ARC_COST};
use crate::models::TimeWindow;
use crate::routing::{OptimizationRequest, OptimizeError, RouteOptimizer};

/// Why the remaining stops could not be resequenced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RerouteError {
    /// The optimizer itself failed.
    #[error("optimizer failed on rerouting sub-problem: {0}")]
    Optimizer(#[from] OptimizeError),
    /// The optimizer did not return exactly one route.
    #[error("expected one route for the sub-problem, got {0}")]
    RouteCount(usize),
    /// The tour does not run from the current position to the depot.
    #[error("sub-problem tour {0:?} does not run from the current position to the depot")]
    MalformedTour(Vec<usize>),
    /// Some stops could not be fitted into the tour.
    #[error("stops {0:?} could not be rescheduled")]
    Unscheduled(Vec<usize>),
}

/// A reduced routing problem over the stops a vehicle still has to visit.
#[derive(Debug, Clone)]
pub struct Subproblem {
    /// Original position of each sub-problem index.
    pub stops: Vec<usize>,
    /// Sliced matrices, augmented with the virtual depot when present.
    pub matrices: TravelMatrices,
    /// Sliced and shifted windows, one per sub-problem index.
    pub time_windows: Vec<TimeWindow>,
    /// Arrival days per sub-problem index.
    pub arrival_days: Vec<usize>,
    /// Futile counts per sub-problem index.
    pub futile_counts: Vec<u32>,
    /// Sub-problem index the tour must start from.
    pub start: usize,
    /// Sub-problem index the tour must end at.
    pub end: usize,
    /// Index of the virtual depot; `None` when start and end coincide.
    pub virtual_depot: Option<usize>,
}

impl Subproblem {
    /// Builds the sub-problem for a vehicle at `current` that still has to
    /// visit `remaining`, whose last entry is the depot it returns to.
    ///
    /// Depots other than the final one are dropped from the sequence.
    /// Returns `None` if `remaining` is empty.
    pub fn build(
        ctx: &RouteContext<'_>,
        current: usize,
        remaining: &[usize],
        elapsed: f64,
    ) -> Option<Self> {
        let &end_depot = remaining.last()?;

        let mut stops = vec![end_depot];
        let closed = current == end_depot;
        if !closed {
            stops.push(current);
        }
        for &stop in remaining {
            if !ctx.is_depot(stop) && stop != current && !stops.contains(&stop) {
                stops.push(stop);
            }
        }

        let unconstrained = TimeWindow::new(0.0, VIRTUAL_ARC_COST)?;
        let mut time_windows: Vec<TimeWindow> = stops
            .iter()
            .map(|&s| ctx.window(s).map_or(unconstrained, |tw| tw.shifted(-elapsed)))
            .collect();
        let arrival_day = |s: usize| ctx.arrival_days.get(s).copied().unwrap_or(ctx.day);
        let futile_count = |s: usize| ctx.futile_counts.get(s).copied().unwrap_or(0);
        let mut arrival_days: Vec<usize> = stops.iter().map(|&s| arrival_day(s)).collect();
        let mut futile_counts: Vec<u32> = stops.iter().map(|&s| futile_count(s)).collect();

        let sliced = ctx.matrices.submatrices(&stops);

        if closed {
            return Some(Self {
                stops,
                matrices: sliced,
                time_windows,
                arrival_days,
                futile_counts,
                start: 0,
                end: 0,
                virtual_depot: None,
            });
        }

        // the vehicle is already standing at `current`
        time_windows[1] = unconstrained;
        time_windows.push(unconstrained);
        arrival_days.push(ctx.day);
        futile_counts.push(0);

        let (start, end) = (1, 0);
        let matrices = TravelMatrices::new(
            sliced.distance.with_virtual_depot(start, end),
            sliced.time.with_virtual_depot(start, end),
        );
        let virtual_depot = stops.len();

        Some(Self {
            stops,
            matrices,
            time_windows,
            arrival_days,
            futile_counts,
            start,
            end,
            virtual_depot: Some(virtual_depot),
        })
    }

    /// Index used as the sub-problem's only depot.
    pub fn depot(&self) -> usize {
        self.virtual_depot.unwrap_or(self.end)
    }

    /// Maps an optimizer tour back to original positions.
    ///
    /// Returns the continuation: the stops to visit after the current
    /// position, ending with the depot. The tour must visit every remaining
    /// stop exactly once.
    pub fn extract(&self, tour: &[usize]) -> Result<Vec<usize>, RerouteError> {
        let depot = self.depot();
        let malformed = || RerouteError::MalformedTour(tour.to_vec());

        if tour.len() < 2 || tour[0] != depot || tour[tour.len() - 1] != depot {
            return Err(malformed());
        }
        let inner = &tour[1..tour.len() - 1];

        let path: Vec<usize> = match self.virtual_depot {
            Some(_) => {
                // strip the forced start; what is left must end at the real depot
                match inner {
                    [first, rest @ .., last] if *first == self.start && *last == self.end => {
                        let mut path = rest.to_vec();
                        path.push(self.end);
                        path
                    }
                    _ => return Err(malformed()),
                }
            }
            None => {
                let mut path = inner.to_vec();
                path.push(self.end);
                path
            }
        };

        let mut visited = vec![false; self.stops.len()];
        for &i in &path[..path.len() - 1] {
            if i == self.start || i == self.end || !visited.get(i).is_some_and(|v| !v) {
                return Err(malformed());
            }
            visited[i] = true;
        }
        let covered = visited
            .iter()
            .enumerate()
            .all(|(i, &v)| v || i == self.start || i == self.end);
        if !covered {
            return Err(malformed());
        }

        path.iter()
            .map(|&i| self.stops.get(i).copied().ok_or_else(malformed))
            .collect()
    }
}

/// Resequences `remaining` for a vehicle standing at `current` at time
/// `elapsed`.
///
/// `remaining` must end at the depot the vehicle returns to. On success the
/// returned continuation holds the same non-depot stops in a new order,
/// followed by that depot.
pub fn reroute(
    ctx: &RouteContext<'_>,
    current: usize,
    remaining: &[usize],
    elapsed: f64,
    optimizer: &mut dyn RouteOptimizer,
) -> Result<Vec<usize>, RerouteError> {
    let Some(sub) = Subproblem::build(ctx, current, remaining, elapsed) else {
        return Err(RerouteError::MalformedTour(Vec::new()));
    };

    let depots = [sub.depot()];
    let request = OptimizationRequest {
        depots: &depots,
        distances: &sub.matrices.distance,
        times: &sub.matrices.time,
        time_windows: &sub.time_windows,
        day: ctx.day,
        arrival_days: &sub.arrival_days,
        futile_counts: &sub.futile_counts,
        alternate_groups: &[],
        max_vehicles: Some(1),
    };
    let plan = optimizer.optimize(&request)?;

    let dropped: Vec<usize> = plan
        .unscheduled
        .iter()
        .filter_map(|&i| sub.stops.get(i).copied())
        .collect();
    if !dropped.is_empty() {
        return Err(RerouteError::Unscheduled(dropped));
    }

    match plan.solution.routes() {
        [tour] => sub.extract(tour),
        routes => Err(RerouteError::RouteCount(routes.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::CostMatrix;
    use crate::routing::{NearestNeighborOptimizer, RoutingPlan};
    use crate::models::{Location, RoutingSolution};

    fn line(n: usize) -> TravelMatrices {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| (i as f64 - j as f64).abs()).collect())
            .collect();
        let m = CostMatrix::from_rows(&rows).expect("square");
        TravelMatrices::new(m.clone(), m)
    }

    fn ctx<'a>(m: &'a TravelMatrices, tw: &'a [TimeWindow]) -> RouteContext<'a> {
        RouteContext {
            matrices: m,
            time_windows: tw,
            depots: &[0],
            day: 2,
            arrival_days: &[],
            futile_counts: &[],
            missing_window: Default::default(),
        }
    }

    fn open(n: usize) -> Vec<TimeWindow> {
        vec![TimeWindow::new(0.0, 1000.0).expect("valid"); n]
    }

    #[test]
    fn test_subproblem_layout() {
        let m = line(5);
        let tw = open(5);
        let c = ctx(&m, &tw);
        let sub = Subproblem::build(&c, 3, &[1, 4, 0], 10.0).expect("non-empty");
        assert_eq!(sub.stops, vec![0, 3, 1, 4]);
        assert_eq!(sub.virtual_depot, Some(4));
        assert_eq!(sub.matrices.size(), 5);
        assert_eq!(sub.time_windows.len(), 5);
        assert_eq!(sub.arrival_days, vec![2; 5]);

        // the two forced arcs cost nothing, every other virtual arc dominates
        let d = &sub.matrices.distance;
        for k in 0..5 {
            let expected_out = if k == 1 { 0.0 } else { VIRTUAL_ARC_COST };
            let expected_in = if k == 0 { 0.0 } else { VIRTUAL_ARC_COST };
            assert_eq!(d.get(4, k), expected_out);
            assert_eq!(d.get(k, 4), expected_in);
        }
        // original distances survive the slice: 3 → 1 is 2 units
        assert_eq!(d.get(1, 2), 2.0);
        // windows are shifted by elapsed time
        assert_eq!(sub.time_windows[2].ready(), -10.0);
    }

    #[test]
    fn test_reroute_round_trip() {
        let m = line(5);
        let tw = open(5);
        let c = ctx(&m, &tw);
        let mut nn = NearestNeighborOptimizer::new(3);
        // route [0, 3, 2, 1, 4, 0] skipping stop 2 while standing at 3
        let continuation = reroute(&c, 3, &[1, 4, 0], 3.0, &mut nn).expect("feasible");
        assert_eq!(continuation.len(), 3);
        assert_eq!(continuation[2], 0);
        let mut middle = continuation[..2].to_vec();
        middle.sort_unstable();
        assert_eq!(middle, vec![1, 4]);
    }

    #[test]
    fn test_reroute_prefers_shorter_order() {
        let m = line(5);
        let tw = open(5);
        let c = ctx(&m, &tw);
        let mut nn = NearestNeighborOptimizer::new(1);
        // from 3: 3 → 4 → 1 → 0 costs 1 + 3 + 1 = 5, 3 → 1 → 4 → 0 costs 9
        let continuation = reroute(&c, 3, &[1, 4, 0], 0.0, &mut nn).expect("feasible");
        assert_eq!(continuation, vec![4, 1, 0]);
    }

    #[test]
    fn test_reroute_with_depot_nearest() {
        let dm = CostMatrix::from_locations(&[
            Location::new(0.0, 0.0),
            Location::new(1.0, 0.0),
            Location::new(5.0, 0.0),
            Location::new(6.0, 0.0),
        ]);
        let m = TravelMatrices::new(dm.clone(), dm);
        let mut tw = open(4);
        tw[2] = TimeWindow::new(0.0, 4.5).expect("valid");
        let c = ctx(&m, &tw);
        let mut nn = NearestNeighborOptimizer::new(1);
        let continuation = reroute(&c, 1, &[3, 2, 0], 0.0, &mut nn).expect("feasible");
        assert_eq!(continuation, vec![2, 3, 0]);
    }

    #[test]
    fn test_reroute_closed_tour_from_depot() {
        let m = line(4);
        let tw = open(4);
        let c = ctx(&m, &tw);
        let mut nn = NearestNeighborOptimizer::new(1);
        let continuation = reroute(&c, 0, &[3, 1, 0], 0.0, &mut nn).expect("feasible");
        assert_eq!(continuation.last(), Some(&0));
        assert_eq!(continuation.len(), 3);
    }

    #[test]
    fn test_reroute_unschedulable_stop() {
        let m = line(5);
        let mut tw = open(5);
        tw[4] = TimeWindow::new(0.0, 2.0).expect("valid");
        let c = ctx(&m, &tw);
        let mut nn = NearestNeighborOptimizer::new(1);
        let err = reroute(&c, 3, &[1, 4, 0], 5.0, &mut nn).expect_err("4 closed at 2");
        assert_eq!(err, RerouteError::Unscheduled(vec![4]));
    }

    #[test]
    fn test_reroute_rejects_malformed_tour() {
        let m = line(5);
        let tw = open(5);
        let c = ctx(&m, &tw);
        // tour that starts at the depot instead of the current position
        let mut bad = |_: &OptimizationRequest<'_>| -> Result<RoutingPlan, OptimizeError> {
            Ok(RoutingPlan {
                solution: RoutingSolution::new(vec![vec![4, 0, 2, 3, 1, 4]]),
                unscheduled: vec![],
            })
        };
        let err = reroute(&c, 3, &[1, 4, 0], 0.0, &mut bad).expect_err("malformed");
        assert!(matches!(err, RerouteError::MalformedTour(_)));
    }

    #[test]
    fn test_reroute_rejects_repeated_stop() {
        let m = line(5);
        let tw = open(5);
        let c = ctx(&m, &tw);
        // sub-problem [0, 3, 1, 4] + virtual 4: stop 1 twice, stop 4 never
        let mut repeats = |_: &OptimizationRequest<'_>| -> Result<RoutingPlan, OptimizeError> {
            Ok(RoutingPlan {
                solution: RoutingSolution::new(vec![vec![4, 1, 2, 2, 0, 4]]),
                unscheduled: vec![],
            })
        };
        let err = reroute(&c, 3, &[1, 4, 0], 0.0, &mut repeats).expect_err("not a permutation");
        assert!(matches!(err, RerouteError::MalformedTour(_)));
    }

    #[test]
    fn test_extract_requires_every_stop() {
        let m = line(5);
        let tw = open(5);
        let c = ctx(&m, &tw);
        let sub = Subproblem::build(&c, 3, &[1, 4, 0], 0.0).expect("non-empty");
        assert!(sub.extract(&[4, 1, 2, 0, 4]).is_err());
        assert_eq!(sub.extract(&[4, 1, 3, 2, 0, 4]).expect("valid"), vec![4, 1, 0]);

        let closed = Subproblem::build(&c, 0, &[3, 1, 0], 0.0).expect("non-empty");
        assert!(closed.extract(&[0, 1, 0]).is_err());
        assert!(closed.extract(&[0, 1, 1, 2, 0]).is_err());
        assert_eq!(closed.extract(&[0, 2, 1, 0]).expect("valid"), vec![1, 3, 0]);
    }

    #[test]
    fn test_reroute_rejects_multiple_routes() {
        let m = line(5);
        let tw = open(5);
        let c = ctx(&m, &tw);
        let mut two = |_: &OptimizationRequest<'_>| -> Result<RoutingPlan, OptimizeError> {
            Ok(RoutingPlan {
                solution: RoutingSolution::new(vec![vec![4, 1, 2, 0, 4], vec![4, 3, 4]]),
                unscheduled: vec![],
            })
        };
        let err = reroute(&c, 3, &[1, 4, 0], 0.0, &mut two).expect_err("two routes");
        assert_eq!(err, RerouteError::RouteCount(2));
    }
}
