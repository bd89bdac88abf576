//! Ordered registry of the packages currently in the system.

use std::collections::{HashMap, HashSet};

use super::{Location, NewPackage, Package, PackageId, TimeWindow};

/// The active package set for the current day.
///
/// Depots occupy the first `num_depots()` positions and are never removed.
/// A package's position is its row/column in the day's distance and time
/// matrices; positions shift whenever packages are removed, so anything that
/// must survive a removal is keyed by [`PackageId`] instead.
///
/// # Examples
///
/// ```
/// use u_delivery::models::{Location, NewPackage, PackageRegistry, TimeWindow};
///
/// let span = TimeWindow::new(0.0, 480.0).unwrap();
/// let mut registry = PackageRegistry::new(&[Location::new(0.0, 0.0)], span);
/// let tw = TimeWindow::new(60.0, 120.0).unwrap();
/// registry.admit(vec![NewPackage::new(Location::new(1.0, 1.0), tw)], 0);
///
/// assert_eq!(registry.len(), 2);
/// assert_eq!(registry.num_depots(), 1);
/// assert_eq!(registry.non_depot_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PackageRegistry {
    packages: Vec<Package>,
    num_depots: usize,
    day_span: TimeWindow,
    next_id: u64,
}

impl PackageRegistry {
    /// Creates a registry holding only the given depots.
    pub fn new(depots: &[Location], day_span: TimeWindow) -> Self {
        let packages: Vec<Package> = depots
            .iter()
            .enumerate()
            .map(|(i, &loc)| Package::depot(PackageId(i as u64), loc, day_span))
            .collect();
        Self {
            num_depots: packages.len(),
            next_id: packages.len() as u64,
            packages,
            day_span,
        }
    }

    /// Admits a batch of newly arrived packages, assigning fresh ids.
    ///
    /// Batch-local alternate indices are translated to package ids; indices
    /// outside the batch are ignored.
    pub fn admit(&mut self, batch: Vec<NewPackage>, day: usize) -> Vec<PackageId> {
        let ids: Vec<PackageId> = (0..batch.len())
            .map(|i| PackageId(self.next_id + i as u64))
            .collect();
        self.next_id += batch.len() as u64;

        for (new, &id) in batch.into_iter().zip(&ids) {
            let alternates = new
                .alternates
                .iter()
                .filter_map(|&j| ids.get(j).copied())
                .filter(|&alt| alt != id)
                .collect();
            self.packages.push(
                Package::delivery(id, new.location, new.time_window, day)
                    .with_alternates(alternates),
            );
        }
        ids
    }

    /// Appends the synthetic stop for collection point `point`.
    pub fn add_collection_stop(
        &mut self,
        point: usize,
        location: Location,
        day: usize,
    ) -> PackageId {
        let id = self.allocate_id();
        self.packages.push(Package::collection_stop(
            id,
            point,
            location,
            self.day_span,
            day,
        ));
        id
    }

    /// Appends an already-built package. Used to seed carried-over state.
    ///
    /// Returns `false` (and stores nothing) if the id is already present or
    /// the package is a depot.
    pub fn insert(&mut self, package: Package) -> bool {
        if package.is_depot() || self.position_of(package.id()).is_some() {
            return false;
        }
        self.next_id = self.next_id.max(package.id().0 + 1);
        self.packages.push(package);
        true
    }

    fn allocate_id(&mut self) -> PackageId {
        let id = PackageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// All entries, depots first.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Entry at `position`.
    pub fn get(&self, position: usize) -> Option<&Package> {
        self.packages.get(position)
    }

    /// Current position of the package with the given id.
    pub fn position_of(&self, id: PackageId) -> Option<usize> {
        self.packages.iter().position(|p| p.id() == id)
    }

    /// Number of entries, depots included.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns `true` if the registry holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Number of depots.
    pub fn num_depots(&self) -> usize {
        self.num_depots
    }

    /// Number of entries that are not depots.
    pub fn non_depot_count(&self) -> usize {
        self.packages.len() - self.num_depots
    }

    /// Depot positions (always `0..num_depots`).
    pub fn depot_indices(&self) -> Vec<usize> {
        (0..self.num_depots).collect()
    }

    /// Returns `true` if `position` is a depot.
    pub fn is_depot(&self, position: usize) -> bool {
        position < self.num_depots
    }

    /// Full working-day window used by depots and collection stops.
    pub fn day_span(&self) -> TimeWindow {
        self.day_span
    }

    /// Locations by position.
    pub fn locations(&self) -> Vec<Location> {
        self.packages.iter().map(|p| p.location()).collect()
    }

    /// Time windows by position.
    pub fn time_windows(&self) -> Vec<TimeWindow> {
        self.packages.iter().map(|p| *p.time_window()).collect()
    }

    /// Arrival days by position.
    pub fn arrival_days(&self) -> Vec<usize> {
        self.packages.iter().map(|p| p.arrival_day()).collect()
    }

    /// Futile counts by position.
    pub fn futile_counts(&self) -> Vec<u32> {
        self.packages.iter().map(|p| p.futile_count()).collect()
    }

    /// Partitions the non-depot positions into alternate groups.
    ///
    /// A package and every listed alternate still present form one group.
    /// Groups are disjoint, sorted, and ordered by their first member.
    pub fn alternate_groups(&self) -> Vec<Vec<usize>> {
        let positions: HashMap<PackageId, usize> = self
            .packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id(), i))
            .collect();

        let mut grouped = vec![false; self.packages.len()];
        let mut groups = Vec::new();

        for start in self.num_depots..self.packages.len() {
            if grouped[start] {
                continue;
            }
            let mut group = vec![start];
            grouped[start] = true;
            let mut cursor = 0;
            while cursor < group.len() {
                let member = &self.packages[group[cursor]];
                for alt in member.alternates() {
                    if let Some(&pos) = positions.get(alt) {
                        if !grouped[pos] && !self.is_depot(pos) {
                            grouped[pos] = true;
                            group.push(pos);
                        }
                    }
                }
                cursor += 1;
            }
            group.sort_unstable();
            groups.push(group);
        }
        groups
    }

    /// Increments the futile count of every non-depot package at `positions`.
    pub fn record_futile(&mut self, positions: &[usize]) {
        for &pos in positions {
            if self.is_depot(pos) {
                continue;
            }
            if let Some(p) = self.packages.get_mut(pos) {
                p.record_futile();
            }
        }
    }

    /// Ids of every member of any group containing one of `positions`.
    pub fn group_ids(&self, positions: &[usize], groups: &[Vec<usize>]) -> HashSet<PackageId> {
        let hit: HashSet<usize> = positions.iter().copied().collect();
        let mut ids = HashSet::new();
        for group in groups {
            if group.iter().any(|pos| hit.contains(pos)) {
                ids.extend(group.iter().filter_map(|&pos| self.get(pos)).map(|p| p.id()));
            }
        }
        // Positions missing from `groups` still leave on their own.
        ids.extend(
            positions
                .iter()
                .filter_map(|&pos| self.get(pos))
                .map(|p| p.id()),
        );
        ids
    }

    /// Removes every whole alternate group containing one of `positions`.
    ///
    /// Returns the number of entries removed. Depots are kept.
    pub fn remove_groups(&mut self, positions: &[usize], groups: &[Vec<usize>]) -> usize {
        let ids = self.group_ids(positions, groups);
        self.remove_ids(&ids)
    }

    /// Removes the entries with the given ids. Depots are kept.
    pub fn remove_ids(&mut self, ids: &HashSet<PackageId>) -> usize {
        let before = self.packages.len();
        self.packages
            .retain(|p| p.is_depot() || !ids.contains(&p.id()));
        before - self.packages.len()
    }
}
