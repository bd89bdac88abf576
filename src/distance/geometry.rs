//! Distance and travel time provider.

use serde::{Deserialize, Serialize};

use super::CostMatrix;
use crate::models::Location;

/// Failure to compute travel geometry. Aborts the multi-day run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A location lies outside the region the provider can route in.
    #[error("location {index} at ({x}, {y}) is outside the service region")]
    OutOfBounds {
        /// Position of the offending location in the request.
        index: usize,
        /// X-coordinate.
        x: f64,
        /// Y-coordinate.
        y: f64,
    },
    /// The provider could not be reached or returned garbage.
    #[error("geometry provider unavailable: {0}")]
    Unavailable(String),
}

/// Distance and travel time matrices for the active package set.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelMatrices {
    /// Travel distances.
    pub distance: CostMatrix,
    /// Travel times.
    pub time: CostMatrix,
}

impl TravelMatrices {
    /// Bundles a distance and a time matrix.
    pub fn new(distance: CostMatrix, time: CostMatrix) -> Self {
        Self { distance, time }
    }

    /// Number of locations covered.
    pub fn size(&self) -> usize {
        self.distance.size()
    }

    /// Distance from `from` to `to` when departing at `at`.
    ///
    /// Matrices are time-invariant, so `at` is currently unused.
    pub fn distance_at(&self, from: usize, to: usize, _at: f64) -> f64 {
        self.distance.get(from, to)
    }

    /// Travel time from `from` to `to` when departing at `at`.
    pub fn time_at(&self, from: usize, to: usize, _at: f64) -> f64 {
        self.time.get(from, to)
    }

    /// Restricts both matrices to `indices`.
    pub fn submatrices(&self, indices: &[usize]) -> Self {
        Self {
            distance: self.distance.submatrix(indices),
            time: self.time.submatrix(indices),
        }
    }
}

/// Computes travel geometry between locations.
pub trait GeometryProvider {
    /// Full distance and time matrices over `locations`, in order.
    fn matrices(&mut self, locations: &[Location]) -> Result<TravelMatrices, GeometryError>;

    /// Distances from `origin` to each of `targets`.
    fn distances_from(
        &mut self,
        origin: Location,
        targets: &[Location],
    ) -> Result<Vec<f64>, GeometryError>;
}

/// Axis-aligned rectangle of routable coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower-left corner.
    pub min: Location,
    /// Upper-right corner.
    pub max: Location,
}

impl Bounds {
    /// Creates bounds from two corners.
    pub fn new(min: Location, max: Location) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `loc` lies inside or on the boundary.
    pub fn contains(&self, loc: &Location) -> bool {
        loc.x >= self.min.x && loc.x <= self.max.x && loc.y >= self.min.y && loc.y <= self.max.y
    }
}

/// Straight-line geometry with a constant travel speed.
///
/// # Examples
///
/// ```
/// use u_delivery::distance::{EuclideanGeometry, GeometryProvider};
/// use u_delivery::models::Location;
///
/// let mut geo = EuclideanGeometry::new(2.0);
/// let m = geo.matrices(&[Location::new(0.0, 0.0), Location::new(3.0, 4.0)]).unwrap();
/// assert!((m.distance.get(0, 1) - 5.0).abs() < 1e-10);
/// assert!((m.time.get(0, 1) - 2.5).abs() < 1e-10);
/// ```
#[derive(Debug, Clone)]
pub struct EuclideanGeometry {
    speed: f64,
    bounds: Option<Bounds>,
}

impl EuclideanGeometry {
    /// Creates a provider travelling at `speed` distance units per time unit.
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            bounds: None,
        }
    }

    /// Restricts routable locations to `bounds`.
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    fn check(&self, locations: &[Location]) -> Result<(), GeometryError> {
        let Some(bounds) = &self.bounds else {
            return Ok(());
        };
        match locations.iter().position(|l| !bounds.contains(l)) {
            Some(index) => Err(GeometryError::OutOfBounds {
                index,
                x: locations[index].x,
                y: locations[index].y,
            }),
            None => Ok(()),
        }
    }
}

impl GeometryProvider for EuclideanGeometry {
    fn matrices(&mut self, locations: &[Location]) -> Result<TravelMatrices, GeometryError> {
        if self.speed.is_nan() || self.speed <= 0.0 {
            return Err(GeometryError::Unavailable(format!(
                "speed must be positive, got {}",
                self.speed
            )));
        }
        self.check(locations)?;
        let distance = CostMatrix::from_locations(locations);
        let time = distance.scaled(1.0 / self.speed);
        Ok(TravelMatrices { distance, time })
    }

    fn distances_from(
        &mut self,
        origin: Location,
        targets: &[Location],
    ) -> Result<Vec<f64>, GeometryError> {
        self.check(std::slice::from_ref(&origin))?;
        Ok(targets.iter().map(|t| origin.distance_to(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrices_scale_time_by_speed() {
        let mut geo = EuclideanGeometry::new(0.5);
        let m = geo
            .matrices(&[Location::new(0.0, 0.0), Location::new(0.0, 3.0)])
            .expect("in bounds");
        assert!((m.distance.get(1, 0) - 3.0).abs() < 1e-10);
        assert!((m.time.get(1, 0) - 6.0).abs() < 1e-10);
        assert_eq!(m.size(), 2);
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let locations = [Location::new(0.0, 0.0), Location::new(1.0, 0.0)];
        for speed in [0.0, -1.0, f64::NAN] {
            let result = EuclideanGeometry::new(speed).matrices(&locations);
            assert!(matches!(result, Err(GeometryError::Unavailable(_))));
        }
    }

    #[test]
    fn test_out_of_bounds() {
        let bounds = Bounds::new(Location::new(0.0, 0.0), Location::new(10.0, 10.0));
        let mut geo = EuclideanGeometry::new(1.0).with_bounds(bounds);
        let err = geo
            .matrices(&[Location::new(1.0, 1.0), Location::new(11.0, 1.0)])
            .expect_err("second location is outside");
        assert_eq!(
            err,
            GeometryError::OutOfBounds {
                index: 1,
                x: 11.0,
                y: 1.0
            }
        );
    }

    #[test]
    fn test_distances_from() {
        let mut geo = EuclideanGeometry::new(1.0);
        let d = geo
            .distances_from(
                Location::new(0.0, 0.0),
                &[Location::new(3.0, 4.0), Location::new(0.0, 1.0)],
            )
            .expect("no bounds");
        assert!((d[0] - 5.0).abs() < 1e-10);
        assert!((d[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_non_positive_speed() {
        let mut geo = EuclideanGeometry::new(0.0);
        assert!(matches!(
            geo.matrices(&[Location::new(0.0, 0.0)]),
            Err(GeometryError::Unavailable(_))
        ));
    }

    #[test]
    fn test_submatrices() {
        let mut geo = EuclideanGeometry::new(1.0);
        let m = geo
            .matrices(&[
                Location::new(0.0, 0.0),
                Location::new(1.0, 0.0),
                Location::new(5.0, 0.0),
            ])
            .expect("no bounds");
        let sub = m.submatrices(&[2, 1]);
        assert!((sub.distance.get(0, 1) - 4.0).abs() < 1e-10);
        assert!((sub.time_at(1, 0, 0.0) - 4.0).abs() < 1e-10);
    }
}
