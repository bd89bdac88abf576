//! Time-window policies.
//!
//! A policy looks at the leg from `route[position]` to `route[position + 1]`
//! and decides whether the delivery at the far end succeeds, has to wait,
//! or is abandoned.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::context::{MissingWindow, RouteContext};
use super::reroute::reroute;
use crate::routing::RouteOptimizer;

/// What became of the next stop.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The vehicle reached the stop and delivered.
    Delivered,
    /// The vehicle reached the stop but could not deliver.
    Futile,
    /// The vehicle reached a depot.
    AtDepot,
    /// The vehicle abandoned the stop without driving there. It continues
    /// from its current position along `remaining`, which ends at a depot.
    Skipped {
        /// Stops to follow from the current position.
        remaining: Vec<usize>,
        /// `true` if `remaining` was resequenced by the optimizer.
        rerouted: bool,
    },
}

/// Result of one policy decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Distance driven.
    pub distance: f64,
    /// Time spent, travel plus any waiting.
    pub time: f64,
    /// What became of the next stop.
    pub outcome: Outcome,
}

/// How a driver handles arriving outside a delivery window.
///
/// | Policy | Early | Late |
/// |---|---|---|
/// | `ArrivalSkip` | delivered | futile |
/// | `ArrivalStrict` | futile | futile |
/// | `ArrivalWait` | wait, delivered | futile |
/// | `DepartureWaitReroute` | wait, delivered | skipped, rest of route rerouted |
///
/// # Examples
///
/// ```
/// use u_delivery::simulation::TimeWindowPolicy;
///
/// let p: TimeWindowPolicy = serde_json::from_str("\"arrival-wait\"").unwrap();
/// assert_eq!(p, TimeWindowPolicy::ArrivalWait);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeWindowPolicy {
    /// Decide on arrival; only a late arrival is futile.
    #[default]
    ArrivalSkip,
    /// Decide on arrival; anything outside the window is futile.
    ArrivalStrict,
    /// Decide on arrival; wait when early, futile when late.
    ArrivalWait,
    /// Decide before departing; wait when early, skip and reroute when late.
    DepartureWaitReroute,
}

impl TimeWindowPolicy {
    /// Decides the leg leaving `route[position]` at time `elapsed`.
    ///
    /// `optimizer` is only consulted by [`DepartureWaitReroute`] to
    /// resequence the rest of the route.
    ///
    /// # Panics
    ///
    /// Panics if `position + 1` is not a valid index into `route`.
    ///
    /// [`DepartureWaitReroute`]: TimeWindowPolicy::DepartureWaitReroute
    pub fn decide(
        &self,
        ctx: &RouteContext<'_>,
        route: &[usize],
        position: usize,
        elapsed: f64,
        optimizer: &mut dyn RouteOptimizer,
    ) -> Step {
        let from = route[position];
        let to = route[position + 1];
        let distance = ctx.distance(from, to, elapsed);
        let mut time = ctx.travel_time(from, to, elapsed);

        if ctx.is_depot(to) {
            return Step {
                distance,
                time,
                outcome: Outcome::AtDepot,
            };
        }

        let arrival = elapsed + time;
        let Some(tw) = ctx.window(to) else {
            return match (ctx.missing_window, self) {
                (MissingWindow::Deliver, _) => Step {
                    distance,
                    time,
                    outcome: Outcome::Delivered,
                },
                (MissingWindow::Futile, TimeWindowPolicy::DepartureWaitReroute) => {
                    skip(ctx, route, position, elapsed, optimizer)
                }
                (MissingWindow::Futile, _) => Step {
                    distance,
                    time,
                    outcome: Outcome::Futile,
                },
            };
        };

        let outcome = match self {
            TimeWindowPolicy::ArrivalSkip => {
                if tw.is_late(arrival) {
                    Outcome::Futile
                } else {
                    Outcome::Delivered
                }
            }
            TimeWindowPolicy::ArrivalStrict => {
                if tw.contains(arrival) {
                    Outcome::Delivered
                } else {
                    Outcome::Futile
                }
            }
            TimeWindowPolicy::ArrivalWait => {
                if tw.is_late(arrival) {
                    Outcome::Futile
                } else {
                    time += tw.waiting_time(arrival);
                    Outcome::Delivered
                }
            }
            TimeWindowPolicy::DepartureWaitReroute => {
                if tw.is_late(arrival) {
                    return skip(ctx, route, position, elapsed, optimizer);
                }
                time += tw.waiting_time(arrival);
                Outcome::Delivered
            }
        };

        Step {
            distance,
            time,
            outcome,
        }
    }
}

/// Abandons `route[position + 1]` and works out where to go instead.
fn skip(
    ctx: &RouteContext<'_>,
    route: &[usize],
    position: usize,
    elapsed: f64,
    optimizer: &mut dyn RouteOptimizer,
) -> Step {
    let current = route[position];
    let rest = &route[(position + 2).min(route.len())..];

    let (remaining, rerouted) = match rest.first() {
        None => (Vec::new(), false),
        Some(&next) if ctx.is_depot(next) => (rest.to_vec(), false),
        Some(_) => match reroute(ctx, current, rest, elapsed, optimizer) {
            Ok(continuation) => {
                debug!(current, ?continuation, "rerouted remaining stops");
                (continuation, true)
            }
            Err(err) => {
                warn!(current, %err, "rerouting failed, keeping remaining order");
                (rest.to_vec(), false)
            }
        },
    };

    Step {
        distance: 0.0,
        time: 0.0,
        outcome: Outcome::Skipped {
            remaining,
            rerouted,
        },
    }
}
