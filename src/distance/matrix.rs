//! Dense cost matrix.

use crate::models::Location;

/// Cost on the arcs into and out of a virtual depot that a tour must never use.
pub const VIRTUAL_ARC_COST: f64 = 99_999_999_999_999.0;

/// A dense n×n cost matrix stored in row-major order.
///
/// Used for both travel distances and travel times. Costs need not be
/// symmetric.
///
/// # Examples
///
/// ```
/// use u_delivery::models::Location;
/// use u_delivery::distance::CostMatrix;
///
/// let locations = vec![
///     Location::new(0.0, 0.0),
///     Location::new(3.0, 4.0),
///     Location::new(6.0, 8.0),
/// ];
/// let dm = CostMatrix::from_locations(&locations);
/// assert!((dm.get(0, 1) - 5.0).abs() < 1e-10);
/// assert_eq!(dm.size(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    data: Vec<f64>,
    size: usize,
}

impl CostMatrix {
    /// Creates a cost matrix of the given size, initialized to zero.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0.0; size * size],
            size,
        }
    }

    /// Computes a Euclidean distance matrix from locations.
    pub fn from_locations(locations: &[Location]) -> Self {
        let n = locations.len();
        let mut m = Self::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                let d = locations[i].distance_to(&locations[j]);
                m.set(i, j, d);
                m.set(j, i, d);
            }
        }
        m
    }

    /// Creates a cost matrix from an explicit n×n grid.
    ///
    /// Returns `None` if the data length doesn't match `size * size`.
    pub fn from_data(size: usize, data: Vec<f64>) -> Option<Self> {
        if data.len() != size * size {
            return None;
        }
        Some(Self { data, size })
    }

    /// Creates a cost matrix from rows.
    ///
    /// Returns `None` unless every row has one entry per row.
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|r| r.len() != size) {
            return None;
        }
        Some(Self {
            data: rows.iter().flatten().copied().collect(),
            size,
        })
    }

    /// Returns the cost from location `from` to location `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.size + to]
    }

    /// Sets the cost from location `from` to location `to`.
    pub fn set(&mut self, from: usize, to: usize, cost: f64) {
        self.data[from * self.size + to] = cost;
    }

    /// Number of locations in this matrix.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns every entry multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            data: self.data.iter().map(|c| c * factor).collect(),
            size: self.size,
        }
    }

    /// Restricts the matrix to `indices`, in the given order.
    ///
    /// Entry `(i, j)` of the result is entry `(indices[i], indices[j])` of
    /// `self`.
    pub fn submatrix(&self, indices: &[usize]) -> Self {
        let n = indices.len();
        let mut m = Self::new(n);
        for (i, &from) in indices.iter().enumerate() {
            for (j, &to) in indices.iter().enumerate() {
                m.set(i, j, self.get(from, to));
            }
        }
        m
    }

    /// Appends a virtual depot that turns an open path into a closed tour.
    ///
    /// The new last row/column costs [`VIRTUAL_ARC_COST`] everywhere except
    /// `virtual → start` and `end → virtual`, which cost zero. Any tour
    /// through the virtual depot of finite cost therefore leaves it for
    /// `start` and enters it from `end`.
    ///
    /// ```
    /// use u_delivery::distance::{CostMatrix, VIRTUAL_ARC_COST};
    ///
    /// let m = CostMatrix::from_data(2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
    /// let aug = m.with_virtual_depot(1, 0);
    /// assert_eq!(aug.size(), 3);
    /// assert_eq!(aug.get(2, 1), 0.0);
    /// assert_eq!(aug.get(0, 2), 0.0);
    /// assert_eq!(aug.get(2, 0), VIRTUAL_ARC_COST);
    /// ```
    pub fn with_virtual_depot(&self, start: usize, end: usize) -> Self {
        let n = self.size + 1;
        let v = self.size;
        let mut m = Self::new(n);
        for i in 0..self.size {
            for j in 0..self.size {
                m.set(i, j, self.get(i, j));
            }
        }
        for k in 0..n {
            m.set(v, k, VIRTUAL_ARC_COST);
            m.set(k, v, VIRTUAL_ARC_COST);
        }
        m.set(v, start, 0.0);
        m.set(end, v, 0.0);
        m
    }

    /// Returns `true` if the matrix is symmetric within the given tolerance.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                if (self.get(i, j) - self.get(j, i)).abs() > tol {
                    return false;
                }
            }
        }
        true
    }
}
