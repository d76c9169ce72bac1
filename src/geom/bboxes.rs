use crate::{Point, Vector};

/// Computes the ray parameter at which a ray enters the axis-aligned box
/// spanning `[min, max]` on every axis.
///
/// Uses the slab method: per-axis entry/exit intervals intersected across
/// axes. Returns `None` if the ray misses the box or the box lies entirely
/// behind the origin. An origin already inside the box yields a non-positive
/// entry parameter (clamped to 0).
pub fn box_entry_parameter(origin: Point, direction: Vector, min: Point, max: Point) -> Option<f64> {
    let mut t_enter = f64::NEG_INFINITY;
    let mut t_exit = f64::INFINITY;

    for axis in 0..3 {
        let o = origin.axis(axis);
        let d = direction.axis(axis);
        let lo = min.axis(axis);
        let hi = max.axis(axis);

        if d == 0.0 {
            // Parallel to this slab: must already be within it
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let t0 = (lo - o) / d;
        let t1 = (hi - o) / d;
        let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        if near > t_enter {
            t_enter = near;
        }
        if far < t_exit {
            t_exit = far;
        }
    }

    if t_enter > t_exit || t_exit < 0.0 {
        return None;
    }
    Some(t_enter.max(0.0))
}
