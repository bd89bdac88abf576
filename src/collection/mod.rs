//! Collection points for packages that keep failing delivery.
//!
//! - [`CollectionPoint`] — A capacity-bounded pickup location and its residents
//! - [`CollectionAllocator`] — Daily pickups by customers and diversion of futile packages

mod allocator;
mod point;

pub use allocator::{
    CollectionAllocator, DiversionOrder, DiversionReport, DEFAULT_DISTANCE_THRESHOLD,
    DEFAULT_FUTILE_THRESHOLD,
};
pub use point::{CollectionPoint, Resident};
