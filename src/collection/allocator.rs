//! Diversion of chronically futile packages to collection points.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::point::CollectionPoint;
use crate::distance::{GeometryError, GeometryProvider};
use crate::models::{Location, PackageId, PackageKind, PackageRegistry};

/// Default maximum distance between a package and its collection point.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 20_000.0;

/// Default futile count at which a package becomes eligible for diversion.
pub const DEFAULT_FUTILE_THRESHOLD: u32 = 1;

/// How diversion interacts with alternate groups.
///
/// Either way the whole group of a diverted package leaves the registry.
/// The orders differ in what competes for collection-point capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiversionOrder {
    /// Every eligible package is placed on its own, then the groups of the
    /// placed packages are removed. Two members of one group can occupy two
    /// slots.
    #[default]
    DivertThenGroup,
    /// Groups are consolidated first and each group is placed once, through
    /// its first eligible member.
    GroupThenDivert,
}

/// What happened at the collection points on one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiversionReport {
    /// `(point, package)` pairs picked up by customers.
    pub collected: Vec<(usize, PackageId)>,
    /// `(point, package)` pairs newly placed at a point.
    pub diverted: Vec<(usize, PackageId)>,
    /// Registry entries removed, alternates included.
    pub removed: usize,
    /// Synthetic collection stops added to the registry.
    pub stops_added: Vec<PackageId>,
}

/// Runs the collection points for the whole simulation.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use u_delivery::collection::{CollectionAllocator, CollectionPoint};
/// use u_delivery::distance::EuclideanGeometry;
/// use u_delivery::models::{Location, Package, PackageId, PackageRegistry, TimeWindow};
///
/// let span = TimeWindow::new(0.0, 100.0).unwrap();
/// let mut registry = PackageRegistry::new(&[Location::new(0.0, 0.0)], span);
/// let tw = TimeWindow::new(10.0, 20.0).unwrap();
/// let package = Package::delivery(PackageId(1), Location::new(5.0, 0.0), tw, 0);
/// registry.insert(package.with_futile_count(2));
///
/// let point = CollectionPoint::new(Location::new(6.0, 0.0), 3);
/// let mut allocator = CollectionAllocator::new(vec![point]);
/// let mut geometry = EuclideanGeometry::new(1.0);
/// let mut rng = StdRng::seed_from_u64(0);
/// let report = allocator.run_day(&mut registry, &mut geometry, 1, &mut rng).unwrap();
///
/// assert_eq!(report.diverted, vec![(0, PackageId(1))]);
/// assert_eq!(registry.non_depot_count(), 1); // the collection stop
/// ```
#[derive(Debug, Clone)]
pub struct CollectionAllocator {
    points: Vec<CollectionPoint>,
    distance_threshold: f64,
    futile_threshold: u32,
    order: DiversionOrder,
}

impl CollectionAllocator {
    /// Creates an allocator over `points` with default thresholds.
    pub fn new(points: Vec<CollectionPoint>) -> Self {
        Self {
            points,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            futile_threshold: DEFAULT_FUTILE_THRESHOLD,
            order: DiversionOrder::default(),
        }
    }

    /// Sets the maximum package-to-point distance (exclusive).
    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Sets the futile count at which packages become eligible.
    pub fn with_futile_threshold(mut self, threshold: u32) -> Self {
        self.futile_threshold = threshold;
        self
    }

    /// Sets the diversion order.
    pub fn with_order(mut self, order: DiversionOrder) -> Self {
        self.order = order;
        self
    }

    /// The collection points.
    pub fn points(&self) -> &[CollectionPoint] {
        &self.points
    }

    /// Total number of packages waiting across all points.
    pub fn resident_count(&self) -> usize {
        self.points.iter().map(CollectionPoint::len).sum()
    }

    /// Customers pick up from every non-empty point.
    pub fn collect<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<(usize, PackageId)> {
        let mut collected = Vec::new();
        for (i, point) in self.points.iter_mut().enumerate() {
            collected.extend(point.collect(rng).into_iter().map(|id| (i, id)));
        }
        collected
    }

    /// Places eligible packages at their nearest point and removes them
    /// from the registry.
    ///
    /// A package is eligible when it is a customer delivery whose futile
    /// count has reached the threshold. It is placed only if its nearest
    /// point lies strictly within the distance threshold and has space;
    /// otherwise it stays in the delivery flow. Every point that received a
    /// package and has no collection stop in the registry gets one.
    pub fn divert(
        &mut self,
        registry: &mut PackageRegistry,
        geometry: &mut dyn GeometryProvider,
        day: usize,
    ) -> Result<DiversionReport, GeometryError> {
        let mut report = DiversionReport::default();
        if self.points.is_empty() {
            return Ok(report);
        }

        let targets: Vec<Location> = self.points.iter().map(CollectionPoint::location).collect();
        let groups = registry.alternate_groups();
        let eligible = |pos: usize| {
            registry.get(pos).is_some_and(|p| {
                p.kind() == PackageKind::Delivery && p.futile_count() >= self.futile_threshold
            })
        };
        let candidates: Vec<usize> = match self.order {
            DiversionOrder::DivertThenGroup => (registry.num_depots()..registry.len())
                .filter(|&pos| eligible(pos))
                .collect(),
            DiversionOrder::GroupThenDivert => groups
                .iter()
                .filter_map(|group| group.iter().copied().find(|&pos| eligible(pos)))
                .collect(),
        };

        // every distance lookup happens before any point is touched
        let mut nearest_points = Vec::with_capacity(candidates.len());
        for pos in candidates {
            let Some(package) = registry.get(pos) else {
                continue;
            };
            let distances = geometry.distances_from(package.location(), &targets)?;
            let nearest = distances
                .iter()
                .copied()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((point, distance)) = nearest {
                nearest_points.push((pos, package.id(), point, distance));
            }
        }

        let mut placed = Vec::new();
        let mut received = vec![false; self.points.len()];
        for (pos, id, nearest, distance) in nearest_points {
            if distance >= self.distance_threshold {
                continue;
            }
            let Some(point) = self.points.get_mut(nearest) else {
                continue;
            };
            if point.admit(id) {
                received[nearest] = true;
                report.diverted.push((nearest, id));
                placed.push(pos);
            }
        }

        report.removed = registry.remove_groups(&placed, &groups);

        let stocked: HashSet<usize> = registry
            .packages()
            .iter()
            .filter_map(|p| match p.kind() {
                PackageKind::CollectionStop { point } => Some(point),
                _ => None,
            })
            .collect();
        for (i, point) in self.points.iter().enumerate() {
            if received[i] && !stocked.contains(&i) {
                report
                    .stops_added
                    .push(registry.add_collection_stop(i, point.location(), day));
            }
        }

        if !report.diverted.is_empty() {
            debug!(
                day,
                diverted = report.diverted.len(),
                removed = report.removed,
                stops = report.stops_added.len(),
                "packages diverted to collection points"
            );
        }
        Ok(report)
    }

    /// One day at the collection points: pickups first, then diversion.
    pub fn run_day<R: Rng + ?Sized>(
        &mut self,
        registry: &mut PackageRegistry,
        geometry: &mut dyn GeometryProvider,
        day: usize,
        rng: &mut R,
    ) -> Result<DiversionReport, GeometryError> {
        let collected = self.collect(rng);
        if !collected.is_empty() {
            debug!(day, collected = collected.len(), "packages collected by customers");
        }
        let mut report = self.divert(registry, geometry, day)?;
        report.collected = collected;
        Ok(report)
    }
}
