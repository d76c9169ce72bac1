//! Voxel-by-voxel ray traversal through a [`VoxelModel`].

use std::sync::Mutex;

use rand::rngs::StdRng;

use crate::geom::bboxes::box_entry_parameter;
use crate::model::grid::VoxelModel;
use crate::model::ray::Ray;
use crate::physics::compton::ComptonScattering;
use crate::scan::config::ScanConfig;
use crate::{Point, Vector};

/// How far past a voxel face a ray is pushed after crossing it (mm).
/// Guarantees that floating-point rounding never leaves the position on
/// the face it just resolved against.
const ENTRY_NUDGE: f64 = 1e-6;

/// Outcome of pushing one ray through a model: the attenuated ray at its
/// exit point plus any scattered siblings spawned along the way.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub ray: Ray,
    pub scattered: Vec<Ray>,
}

impl Transmission {
    fn untouched(ray: &Ray) -> Self {
        Self {
            ray: ray.clone(),
            scattered: Vec::new(),
        }
    }
}

impl VoxelModel {
    /// Transmits `ray` through the model, attenuating its spectrum per voxel
    /// crossed and spawning Compton-scattered siblings.
    ///
    /// A ray that misses the model entirely comes back unchanged. The
    /// returned ray's origin sits just outside the exit face, its direction
    /// is unmodified. `force_no_scatter` suppresses sibling creation even
    /// when scattering is enabled; attenuation proceeds normally.
    ///
    /// `rng` drives this thread's Bernoulli scattering trials; `angle_rng`
    /// is the generator shared with the scattering-angle bank.
    pub fn transmit_ray(
        &self,
        ray: &Ray,
        config: &ScanConfig,
        bank: &ComptonScattering,
        rng: &mut StdRng,
        angle_rng: &Mutex<StdRng>,
        force_no_scatter: bool,
    ) -> Transmission {
        let local_origin = self.frame().point_to_local(ray.origin);
        let local_dir = self.direction_to_local(ray.direction);
        let size = self.size();
        let max = Point::new(size[0], size[1], size[2]);

        let Some(entry) = box_entry_parameter(local_origin, local_dir, Point::origin(), max)
        else {
            return Transmission::untouched(ray);
        };

        let mut current = local_origin + local_dir * (entry + ENTRY_NUDGE);
        if !self.contains_local(current) {
            // Grazing hit: the nudge pushed the ray straight back out
            return Transmission::untouched(ray);
        }

        let exit_faces = exit_face_candidates(local_dir);
        if exit_faces.is_empty() {
            log::warn!("transmit: ray with no positive direction component, skipped");
            return Transmission::untouched(ray);
        }

        let num = self.num_voxels();
        let max_steps = num[0] + num[1] + num[2] + 2;
        let allow_scatter = config.scattering_enabled && !force_no_scatter;

        let mut out = ray.clone();
        let mut scattered = Vec::new();

        let mut steps = 0;
        while steps < max_steps {
            steps += 1;

            let indices = self.voxel_indices(current);
            let voxel = self.voxel_data(indices);

            let Some(crossing) = face_crossing(self, current, local_dir, indices, &exit_faces)
            else {
                log::warn!("transmit: no exit face resolved at {indices:?}, stopping traversal");
                break;
            };
            let travelled = crossing + ENTRY_NUDGE;

            out.properties.attenuate(&voxel, travelled);
            out.properties.voxel_hits += 1;

            let next = current + local_dir * travelled;
            if allow_scatter {
                let spawn = self.frame().point_to_global(next);
                scattered.extend(out.scatter(
                    bank, angle_rng, rng, &voxel, travelled, config, spawn,
                ));
            }

            current = next;
            if !self.contains_local(current) {
                break;
            }
        }
        if steps == max_steps && self.contains_local(current) {
            log::warn!("transmit: traversal exceeded {max_steps} steps, ray force-terminated");
        }

        out.origin = self.frame().point_to_global(current);
        Transmission { ray: out, scattered }
    }
}

/// Faces the ray can exit a voxel through, given its direction: one per
/// axis with a nonzero component, flagged by orientation.
fn exit_face_candidates(direction: Vector) -> Vec<(usize, bool)> {
    let mut faces = Vec::with_capacity(3);
    for axis in 0..3 {
        let d = direction.axis(axis);
        if d > 0.0 {
            faces.push((axis, true));
        } else if d < 0.0 {
            faces.push((axis, false));
        }
    }
    faces
}

/// Distance along the ray to the nearest candidate exit face of the voxel
/// at `indices`. Faces are checked in X, Y, Z order; on an exact tie the
/// first one wins, which is harmless because the post-crossing nudge moves
/// the ray past every tied face at once.
fn face_crossing(
    model: &VoxelModel,
    current: Point,
    direction: Vector,
    indices: [usize; 3],
    faces: &[(usize, bool)],
) -> Option<f64> {
    let voxel_size = model.voxel_size();
    let mut best: Option<f64> = None;
    for &(axis, positive) in faces {
        let d = direction.axis(axis);
        if d == 0.0 {
            continue;
        }
        let plane = if positive {
            (indices[axis] + 1) as f64 * voxel_size[axis]
        } else {
            indices[axis] as f64 * voxel_size[axis]
        };
        let t = (plane - current.axis(axis)) / d;
        if t < 0.0 {
            continue;
        }
        if best.is_none_or(|b| t < b) {
            best = Some(t);
        }
    }
    best
}
