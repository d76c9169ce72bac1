use crate::Vector;
use crate::geom::EPS;
use std::fmt;
use std::ops::{Add, Sub};

/// A point in 3D space. Coordinates are in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::new(0., 0., 0.)
    }

    /// Returns true if both points are very close to each other.
    pub fn is_close(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < EPS
            && (self.y - other.y).abs() < EPS
            && (self.z - other.z).abs() < EPS
    }

    /// Returns the coordinate along the given axis (0 = x, 1 = y, 2 = z).
    ///
    /// Out-of-range axes fall back to z, matching the clamping policy used
    /// throughout the voxel traversal.
    pub fn axis(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = f.precision().unwrap_or(2); // Default 2 decimals
        write!(
            f,
            "Point({:.prec$}, {:.prec$}, {:.prec$})",
            self.x,
            self.y,
            self.z,
            prec = prec
        )
    }
}

impl Add<Vector> for Point {
    type Output = Point;
    fn add(self, other: Vector) -> Self {
        Self {
            x: self.x + other.dx,
            y: self.y + other.dy,
            z: self.z + other.dz,
        }
    }
}

// Difference of two points is a vector.
impl Sub for Point {
    type Output = Vector;
    fn sub(self, other: Point) -> Vector {
        Vector::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_close() {
        let pa = Point::new(5., 5., 5.);
        let pb = Point::new(5.00000000000001, 5., 5.);
        let pc = Point::new(5.0001, 5., 5.);
        assert!(pa.is_close(&pb));
        assert!(!pa.is_close(&pc));
    }

    #[test]
    fn test_axis_access() {
        let p = Point::new(1., 2., 3.);
        assert_eq!(p.axis(0), 1.);
        assert_eq!(p.axis(1), 2.);
        assert_eq!(p.axis(2), 3.);
    }

    #[test]
    fn test_point_difference() {
        let pa = Point::new(3., 2., 1.);
        let pb = Point::new(1., 1., 1.);
        let v = pa - pb;
        assert!(v.is_close(&Vector::new(2., 1., 0.)));
    }

    #[test]
    fn test_add_vector() {
        let p = Point::new(1., 1., 1.);
        let moved = p + Vector::new(0., 0., 2.);
        assert!(moved.is_close(&Point::new(1., 1., 3.)));
    }
}
