//! Driving the planned routes.
//!
//! - [`RouteSimulator`] — Walks each route leg by leg under a [`TimeWindowPolicy`]
//! - [`reroute`] — Resequences a partially driven route through a virtual depot
//! - [`RouteContext`] — The day's matrices and per-package data shared by all vehicles

mod context;
mod policy;
mod reroute;
mod traversal;

pub use context::{MissingWindow, RouteContext};
pub use policy::{Outcome, Step, TimeWindowPolicy};
pub use reroute::{reroute, RerouteError, Subproblem};
pub use traversal::{ReplicationOutcome, RouteSimulator, VehicleOutcome};
