//! Time-window-preserving 2-opt improvement.
//!
//! # Algorithm
//!
//! For each pair of positions (i, j) in a route, reverse the segment
//! `[i..=j]` and keep the reversal when it lowers the total route cost and
//! every stop can still be reached before its window closes. Repeat until no
//! reversal helps (first-improvement strategy).
//!
//! Costs may be asymmetric, so each candidate is priced in full rather than
//! through the four-edge delta of the symmetric case.
//!
//! # Complexity
//!
//! O(n³) per pass.
//!
//! # Reference
//!
//! Croes, G.A. (1958). "A method for solving traveling salesman problems",
//! *Operations Research* 6(6), 791-812.

use crate::distance::CostMatrix;
use crate::models::TimeWindow;

/// Applies 2-opt improvement to a single route (given as a sequence of stops).
///
/// The route is assumed to start and end at `depot`. Returns the improved
/// stop sequence and its total cost.
///
/// # Arguments
///
/// * `route` — Ordered stops (excluding depot)
/// * `depot` — Depot location
/// * `costs` — Arc costs to minimise
/// * `times` — Travel times used for the window check
/// * `windows` — Time windows by location
pub fn two_opt_improve(
    route: &[usize],
    depot: usize,
    costs: &CostMatrix,
    times: &CostMatrix,
    windows: &[TimeWindow],
) -> (Vec<usize>, f64) {
    let mut current = route.to_vec();
    let mut current_cost = route_cost(&current, depot, costs);
    if current.len() < 2 {
        return (current, current_cost);
    }

    let mut improved = true;
    while improved {
        improved = false;
        let n = current.len();
        for i in 0..n - 1 {
            for j in i + 1..n {
                current[i..=j].reverse();
                let cost = route_cost(&current, depot, costs);
                if cost < current_cost - 1e-10
                    && is_time_feasible(&current, depot, times, windows)
                {
                    current_cost = cost;
                    improved = true;
                } else {
                    current[i..=j].reverse();
                }
            }
        }
    }

    (current, current_cost)
}

/// Computes the total cost of a route: `depot → route[0] → ... → route[n-1] → depot`.
pub fn route_cost(route: &[usize], depot: usize, costs: &CostMatrix) -> f64 {
    if route.is_empty() {
        return 0.0;
    }
    let mut total = costs.get(depot, route[0]);
    for w in route.windows(2) {
        total += costs.get(w[0], w[1]);
    }
    total + costs.get(route[route.len() - 1], depot)
}

/// Returns `true` if a vehicle leaving `depot` at time 0 reaches every stop
/// no later than its due time, waiting whenever it arrives early.
///
/// The return leg to the depot is not checked.
pub fn is_time_feasible(
    route: &[usize],
    depot: usize,
    times: &CostMatrix,
    windows: &[TimeWindow],
) -> bool {
    let mut time = 0.0;
    let mut prev = depot;
    for &stop in route {
        let arrival = time + times.get(prev, stop);
        match windows.get(stop) {
            Some(tw) if tw.is_late(arrival) => return false,
            Some(tw) => time = arrival + tw.waiting_time(arrival),
            None => time = arrival,
        }
        prev = stop;
    }
    true
}
