use crate::Vector;
use crate::geom::IsClose;
use ndarray as nd;

/// Calculate rotation matrix for a unit vector `u` and angle `phi` (radians).
///
/// Uses the Rodrigues form, which is numerically stable:
/// R = I + sin(phi) * W + 2 * sin^2(phi/2) * W^2
/// where W is the cross-product matrix of `u`.
/// Reference: https://en.wikipedia.org/wiki/Rodrigues%27_rotation_formula
pub fn rotation_matrix(u: &Vector, phi: f64) -> nd::Array2<f64> {
    debug_assert!(u.length().is_close(1.));

    let w: nd::Array2<f64> = nd::arr2(&[[0., -u.dz, u.dy], [u.dz, 0., -u.dx], [-u.dy, u.dx, 0.]]);

    nd::Array::eye(3) + phi.sin() * &w + (2. * (phi / 2.).sin().powi(2)) * w.dot(&w)
}

/// Rotate a vector around the axis `u` by the angle `phi` (radians).
///
/// The axis is normalized internally. A near-zero axis or angle leaves the
/// vector unchanged (logged as an operation error, not a failure).
pub fn rotate_vector_around(v: &Vector, u: &Vector, phi: f64) -> Vector {
    if phi.abs().is_close(0.) {
        return *v;
    }
    let Some(axis) = u.normalize() else {
        log::warn!("rotate_vector_around: zero-length axis, returning input unchanged");
        return *v;
    };
    let rot = rotation_matrix(&axis, phi);
    let arr = nd::arr1(&[v.dx, v.dy, v.dz]);
    let out = rot.dot(&arr);
    Vector::new(out[0], out[1], out[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_quarter_turn() {
        let v = Vector::new(1., 0., 0.);
        let z = Vector::new(0., 0., 1.);
        let rotated = rotate_vector_around(&v, &z, std::f64::consts::PI / 2.);
        assert!(rotated.is_close(&Vector::new(0., 1., 0.)) || {
            // allow tiny numerical slack beyond EPS
            (rotated.dx).abs() < 1e-12 && (rotated.dy - 1.).abs() < 1e-12
        });
    }

    #[test]
    fn test_rotate_preserves_length() {
        let v = Vector::new(1., 2., 3.);
        let axis = Vector::new(0., 1., 0.);
        let rotated = rotate_vector_around(&v, &axis, 1.234);
        assert!((rotated.length() - v.length()).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_around_zero_axis_is_noop() {
        let v = Vector::new(1., 2., 3.);
        let zero = Vector::new(0., 0., 0.);
        let rotated = rotate_vector_around(&v, &zero, 1.0);
        assert!(rotated.is_close(&v));
    }

    #[test]
    fn test_rotate_zero_angle_is_noop() {
        let v = Vector::new(1., 2., 3.);
        let axis = Vector::new(0., 0., 1.);
        let rotated = rotate_vector_around(&v, &axis, 0.0);
        assert!(rotated.is_close(&v));
    }
}
