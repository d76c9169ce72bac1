pub mod bboxes;
pub mod frame;
pub mod point;
pub mod rotation;
pub mod vector;

/// Geometric precision
pub const EPS: f64 = 1e-13;

/// Closeness check for scalars, using the same precision as the point/vector types.
pub trait IsClose {
    fn is_close(&self, other: f64) -> bool;
}

impl IsClose for f64 {
    fn is_close(&self, other: f64) -> bool {
        (self - other).abs() < EPS
    }
}
