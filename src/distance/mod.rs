//! Distance and travel time matrices.
//!
//! Provides a dense cost matrix with the slicing and virtual-depot helpers
//! used for rerouting, and the geometry provider seam that produces the
//! day's matrices.

mod geometry;
mod matrix;

pub use geometry::{Bounds, EuclideanGeometry, GeometryError, GeometryProvider, TravelMatrices};
pub use matrix::{CostMatrix, VIRTUAL_ARC_COST};
