//! # u-delivery
//!
//! Multi-day parcel delivery simulation: packages arrive over a horizon of
//! days, a route optimizer plans each day, and every route is driven under a
//! time-window policy that may wait, give up on, or reroute around a stop.
//! Failed deliveries are retried the next day or diverted to collection
//! points.
//!
//! ## Modules
//!
//! - [`models`] — Packages, the package registry, and routing solutions
//! - [`distance`] — Cost matrices, virtual-depot augmentation, and travel geometry
//! - [`routing`] — The route optimizer seam and a nearest-neighbor reference optimizer
//! - [`simulation`] — Route traversal under time-window policies, with mid-route rerouting
//! - [`collection`] — Capacity-limited collection points
//! - [`engine`] — Day cycle, multi-day driver, configuration, and metrics

pub mod collection;
pub mod distance;
pub mod engine;
pub mod models;
pub mod routing;
pub mod simulation;
