//! Domain model types for the delivery simulation.
//!
//! Provides the package records tracked across days, the ordered registry
//! that holds the active set, and the routing solution produced each day.

mod package;
mod registry;
mod solution;

pub use package::{Location, NewPackage, Package, PackageId, PackageKind, TimeWindow};
pub use registry::PackageRegistry;
pub use solution::{InvariantViolation, RoutingSolution};
