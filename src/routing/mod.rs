//! Route optimization.
//!
//! - [`RouteOptimizer`] — The seam through which the engine obtains routes
//! - [`NearestNeighborOptimizer`] — Time-window-aware nearest neighbor with 2-opt (Solomon, 1987)
//! - [`two_opt`] — Window-preserving 2-opt for asymmetric costs (Croes, 1958)

mod nn_tw;
mod optimizer;
pub mod two_opt;

pub use nn_tw::NearestNeighborOptimizer;
pub use optimizer::{OptimizationRequest, OptimizeError, RouteOptimizer, RoutingPlan};
