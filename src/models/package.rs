//! Package, location, and time window types.

use serde::{Deserialize, Serialize};

/// A delivery time window `[ready, due]`.
///
/// A delivery is on time when the vehicle arrives no earlier than `ready`
/// and no later than `due`. Both bounds are inclusive.
///
/// # Examples
///
/// ```
/// use u_delivery::models::TimeWindow;
///
/// let tw = TimeWindow::new(100.0, 200.0).unwrap();
/// assert!(tw.ready() <= tw.due());
/// assert!(tw.contains(150.0));
/// assert!(!tw.contains(250.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct TimeWindow {
    ready: f64,
    due: f64,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// Returns `None` if `ready > due` or either value is non-finite.
    pub fn new(ready: f64, due: f64) -> Option<Self> {
        if !ready.is_finite() || !due.is_finite() || ready > due {
            return None;
        }
        Some(Self { ready, due })
    }

    /// Earliest allowable arrival time.
    pub fn ready(&self) -> f64 {
        self.ready
    }

    /// Latest allowable arrival time.
    pub fn due(&self) -> f64 {
        self.due
    }

    /// Returns `true` if the given time falls within this window.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.ready && time <= self.due
    }

    /// Returns `true` if arriving at `time` is before the window opens.
    pub fn is_early(&self, time: f64) -> bool {
        time < self.ready
    }

    /// Returns `true` if arriving at `time` is after the window closes.
    pub fn is_late(&self, time: f64) -> bool {
        time > self.due
    }

    /// Returns the waiting time if arriving at the given time.
    ///
    /// Zero if the vehicle arrives within or after the window.
    pub fn waiting_time(&self, arrival: f64) -> f64 {
        if arrival < self.ready {
            self.ready - arrival
        } else {
            0.0
        }
    }

    /// Returns this window moved by `offset` on the time axis.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            ready: self.ready + offset,
            due: self.due + offset,
        }
    }

    /// Both bounds truncated to integers, as reported in metrics.
    pub fn truncated(&self) -> [i64; 2] {
        [self.ready as i64, self.due as i64]
    }
}

impl TryFrom<[f64; 2]> for TimeWindow {
    type Error = String;

    fn try_from(value: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1])
            .ok_or_else(|| format!("invalid time window [{}, {}]", value[0], value[1]))
    }
}

impl From<TimeWindow> for [f64; 2] {
    fn from(tw: TimeWindow) -> Self {
        [tw.ready, tw.due]
    }
}

/// A point on the planar service area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// X-coordinate (longitude-like).
    pub x: f64,
    /// Y-coordinate (latitude-like).
    pub y: f64,
}

impl Location {
    /// Creates a location.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another location.
    pub fn distance_to(&self, other: &Location) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Stable package identity. Survives every insertion and removal in the
/// registry, unlike a package's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId(pub u64);

/// What a registry entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageKind {
    /// Vehicle depot. Never delivered, never removed.
    Depot,
    /// A customer delivery request.
    Delivery,
    /// Synthetic stop restocking collection point `point`.
    CollectionStop {
        /// Index of the collection point.
        point: usize,
    },
}

/// A package (or depot) tracked by the simulation.
///
/// # Examples
///
/// ```
/// use u_delivery::models::{Location, Package, PackageId, PackageKind, TimeWindow};
///
/// let tw = TimeWindow::new(0.0, 100.0).unwrap();
/// let p = Package::delivery(PackageId(3), Location::new(1.0, 2.0), tw, 4);
/// assert_eq!(p.kind(), PackageKind::Delivery);
/// assert_eq!(p.arrival_day(), 4);
/// assert_eq!(p.futile_count(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    id: PackageId,
    location: Location,
    time_window: TimeWindow,
    arrival_day: usize,
    futile_count: u32,
    alternates: Vec<PackageId>,
    kind: PackageKind,
}

impl Package {
    /// Creates a depot entry.
    pub fn depot(id: PackageId, location: Location, day_span: TimeWindow) -> Self {
        Self {
            id,
            location,
            time_window: day_span,
            arrival_day: 0,
            futile_count: 0,
            alternates: Vec::new(),
            kind: PackageKind::Depot,
        }
    }

    /// Creates a delivery request that arrived on `arrival_day`.
    pub fn delivery(
        id: PackageId,
        location: Location,
        time_window: TimeWindow,
        arrival_day: usize,
    ) -> Self {
        Self {
            id,
            location,
            time_window,
            arrival_day,
            futile_count: 0,
            alternates: Vec::new(),
            kind: PackageKind::Delivery,
        }
    }

    /// Creates the synthetic stop for collection point `point`.
    pub fn collection_stop(
        id: PackageId,
        point: usize,
        location: Location,
        day_span: TimeWindow,
        arrival_day: usize,
    ) -> Self {
        Self {
            id,
            location,
            time_window: day_span,
            arrival_day,
            futile_count: 0,
            alternates: Vec::new(),
            kind: PackageKind::CollectionStop { point },
        }
    }

    /// Sets the alternate delivery points for the same customer.
    pub fn with_alternates(mut self, alternates: Vec<PackageId>) -> Self {
        self.alternates = alternates;
        self
    }

    /// Sets the futile delivery count.
    pub fn with_futile_count(mut self, count: u32) -> Self {
        self.futile_count = count;
        self
    }

    /// Stable identity.
    pub fn id(&self) -> PackageId {
        self.id
    }

    /// Delivery location.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Delivery time window.
    pub fn time_window(&self) -> &TimeWindow {
        &self.time_window
    }

    /// Day the package entered the system.
    pub fn arrival_day(&self) -> usize {
        self.arrival_day
    }

    /// Number of days the package was not delivered.
    pub fn futile_count(&self) -> u32 {
        self.futile_count
    }

    /// Alternate delivery points for the same customer.
    pub fn alternates(&self) -> &[PackageId] {
        &self.alternates
    }

    /// Entry kind.
    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    /// Returns `true` for depot entries.
    pub fn is_depot(&self) -> bool {
        self.kind == PackageKind::Depot
    }

    pub(crate) fn record_futile(&mut self) {
        self.futile_count += 1;
    }
}

/// A package produced by an arrival generator, before it has an identity.
///
/// `alternates` holds indices into the same batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPackage {
    /// Delivery location.
    pub location: Location,
    /// Delivery time window.
    pub time_window: TimeWindow,
    /// Batch-local indices of alternate points for the same customer.
    #[serde(default)]
    pub alternates: Vec<usize>,
}

impl NewPackage {
    /// Creates a new package without alternates.
    pub fn new(location: Location, time_window: TimeWindow) -> Self {
        Self {
            location,
            time_window,
            alternates: Vec::new(),
        }
    }
}
