//! Read-only view of one day's data shared by every vehicle.

use serde::{Deserialize, Serialize};

use crate::distance::TravelMatrices;
use crate::models::TimeWindow;

/// What happens at a stop that has no time window on record.
///
/// Registry packages always carry a window, so inside a full simulation this
/// only applies when a [`RouteContext`] is built with a `time_windows` slice
/// shorter than the routes it is used with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingWindow {
    /// The attempt is always futile.
    #[default]
    Futile,
    /// The stop accepts deliveries at any time.
    Deliver,
}

/// Day data a route is simulated against. All slices are indexed by
/// registry position.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    /// Distance and time matrices.
    pub matrices: &'a TravelMatrices,
    /// Time windows.
    pub time_windows: &'a [TimeWindow],
    /// Depot positions.
    pub depots: &'a [usize],
    /// Current day.
    pub day: usize,
    /// Arrival day per package.
    pub arrival_days: &'a [usize],
    /// Futile count per package.
    pub futile_counts: &'a [u32],
    /// Handling of stops without a window.
    pub missing_window: MissingWindow,
}

impl RouteContext<'_> {
    /// Returns `true` if `stop` is a depot.
    pub fn is_depot(&self, stop: usize) -> bool {
        self.depots.contains(&stop)
    }

    /// Time window of `stop`, if one is on record.
    pub fn window(&self, stop: usize) -> Option<&TimeWindow> {
        self.time_windows.get(stop)
    }

    /// Distance of the leg `from → to` departing at `at`.
    pub fn distance(&self, from: usize, to: usize, at: f64) -> f64 {
        self.matrices.distance_at(from, to, at)
    }

    /// Travel time of the leg `from → to` departing at `at`.
    pub fn travel_time(&self, from: usize, to: usize, at: f64) -> f64 {
        self.matrices.time_at(from, to, at)
    }
}
