//! Routing solution and its structural checks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A broken structural invariant. These indicate a defect in a collaborator
/// or in the engine itself and abort the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    /// A route has fewer than two stops.
    #[error("route {route} has {len} stops, expected at least 2")]
    RouteTooShort {
        /// Route index in the solution.
        route: usize,
        /// Actual length.
        len: usize,
    },
    /// A route does not start and end at a depot.
    #[error("route {route} must start and end at a depot")]
    MissingDepot {
        /// Route index in the solution.
        route: usize,
    },
    /// A stop index is outside the active package set.
    #[error("route {route} references index {index}, but only {len} packages are active")]
    UnknownIndex {
        /// Route index in the solution.
        route: usize,
        /// Offending index.
        index: usize,
        /// Active package count.
        len: usize,
    },
    /// A non-depot stop appears more than once in the day's routes.
    #[error("package index {index} is scheduled more than once")]
    DuplicateStop {
        /// Offending index.
        index: usize,
    },
    /// A matrix or per-package table does not match the active package count.
    #[error("{what} has size {actual}, expected {expected}")]
    SizeMismatch {
        /// Name of the misaligned table.
        what: &'static str,
        /// Actual size.
        actual: usize,
        /// Expected size.
        expected: usize,
    },
}

/// One day's vehicle routes as sequences of registry positions.
///
/// Each route begins and ends at a depot.
///
/// # Examples
///
/// ```
/// use u_delivery::models::RoutingSolution;
///
/// let sol = RoutingSolution::new(vec![vec![0, 2, 1, 0], vec![0, 3, 0]]);
/// assert_eq!(sol.num_routes(), 2);
/// assert_eq!(sol.attempted_deliveries(), vec![2, 1]);
/// assert!(sol.validate(&[0], 4).is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingSolution {
    routes: Vec<Vec<usize>>,
}

impl RoutingSolution {
    /// Creates a solution from route sequences.
    pub fn new(routes: Vec<Vec<usize>>) -> Self {
        Self { routes }
    }

    /// Returns the routes.
    pub fn routes(&self) -> &[Vec<usize>] {
        &self.routes
    }

    /// Number of routes (vehicles dispatched).
    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    /// Stops attempted per route, i.e. length minus the two depot ends.
    pub fn attempted_deliveries(&self) -> Vec<usize> {
        self.routes.iter().map(|r| r.len().saturating_sub(2)).collect()
    }

    /// Every non-depot index appearing in some route.
    pub fn scheduled(&self, depots: &[usize]) -> HashSet<usize> {
        self.routes
            .iter()
            .flatten()
            .copied()
            .filter(|i| !depots.contains(i))
            .collect()
    }

    /// Checks the structural invariants against `len` active packages.
    pub fn validate(&self, depots: &[usize], len: usize) -> Result<(), InvariantViolation> {
        let mut seen = HashSet::new();
        for (r, route) in self.routes.iter().enumerate() {
            if route.len() < 2 {
                return Err(InvariantViolation::RouteTooShort {
                    route: r,
                    len: route.len(),
                });
            }
            let first = route[0];
            let last = route[route.len() - 1];
            if !depots.contains(&first) || !depots.contains(&last) {
                return Err(InvariantViolation::MissingDepot { route: r });
            }
            for &index in route {
                if index >= len {
                    return Err(InvariantViolation::UnknownIndex { route: r, index, len });
                }
                if !depots.contains(&index) && !seen.insert(index) {
                    return Err(InvariantViolation::DuplicateStop { index });
                }
            }
        }
        Ok(())
    }
}
