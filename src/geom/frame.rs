use anyhow::{Result, ensure};

use crate::geom::rotation::rotate_vector_around;
use crate::{Point, Vector};

/// Tolerance for the orthonormality check of frame axes.
const AXIS_TOLERANCE: f64 = 1e-9;

/// A Cartesian reference frame: an origin plus three orthonormal axes,
/// both expressed in global coordinates.
///
/// The simulation core is frame-agnostic: the voxel model, the tube and the
/// detector each carry a frame, and rays are converted between frames at the
/// component boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    origin: Point,
    axes: [Vector; 3],
}

impl Frame {
    /// Creates a frame from an origin and three axes.
    ///
    /// The axes must be orthonormal within a small tolerance.
    pub fn new(origin: Point, axes: [Vector; 3]) -> Result<Self> {
        for (i, axis) in axes.iter().enumerate() {
            ensure!(
                (axis.length() - 1.0).abs() < AXIS_TOLERANCE,
                "frame axis {i} is not a unit vector (length {})",
                axis.length()
            );
        }
        for i in 0..3 {
            for j in (i + 1)..3 {
                ensure!(
                    axes[i].dot(&axes[j]).abs() < AXIS_TOLERANCE,
                    "frame axes {i} and {j} are not orthogonal"
                );
            }
        }
        Ok(Self { origin, axes })
    }

    /// The global frame: origin at (0,0,0), axes aligned with x/y/z.
    pub fn global() -> Self {
        Self {
            origin: Point::origin(),
            axes: [
                Vector::new(1., 0., 0.),
                Vector::new(0., 1., 0.),
                Vector::new(0., 0., 1.),
            ],
        }
    }

    /// A frame translated from the global one, axes unchanged.
    pub fn translated(origin: Point) -> Self {
        Self {
            origin,
            ..Self::global()
        }
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn axis(&self, i: usize) -> Vector {
        self.axes[i.min(2)]
    }

    /// Converts a global point into this frame's local coordinates.
    pub fn point_to_local(&self, p: Point) -> Point {
        let rel = p - self.origin;
        Point::new(
            rel.dot(&self.axes[0]),
            rel.dot(&self.axes[1]),
            rel.dot(&self.axes[2]),
        )
    }

    /// Converts a local point of this frame into global coordinates.
    pub fn point_to_global(&self, p: Point) -> Point {
        self.origin + self.axes[0] * p.x + self.axes[1] * p.y + self.axes[2] * p.z
    }

    /// Converts a global vector into this frame's local coordinates.
    pub fn vector_to_local(&self, v: Vector) -> Vector {
        Vector::new(
            v.dot(&self.axes[0]),
            v.dot(&self.axes[1]),
            v.dot(&self.axes[2]),
        )
    }

    /// Converts a local vector of this frame into global coordinates.
    pub fn vector_to_global(&self, v: Vector) -> Vector {
        self.axes[0] * v.dx + self.axes[1] * v.dy + self.axes[2] * v.dz
    }

    /// Returns a copy of this frame rotated around an axis through its origin.
    ///
    /// Rotation errors (zero axis) leave the axes unchanged, consistent with
    /// `rotate_vector_around`.
    pub fn rotated_around(&self, axis: &Vector, phi: f64) -> Self {
        Self {
            origin: self.origin,
            axes: [
                rotate_vector_around(&self.axes[0], axis, phi),
                rotate_vector_around(&self.axes[1], axis, phi),
                rotate_vector_around(&self.axes[2], axis, phi),
            ],
        }
    }
}
