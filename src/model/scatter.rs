//! Compton scattering of a ray inside one voxel.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rand::Rng;
use rand::rngs::StdRng;

use crate::Point;
use crate::geom::rotation::rotate_vector_around;
use crate::model::ray::{Ray, RayProperties};
use crate::model::voxel::VoxelData;
use crate::physics::compton::{ComptonScattering, compton_shifted_energy};
use crate::physics::constants::{WATER_ABSORPTION_PER_MM, WATER_ELECTRON_DENSITY_PER_MM3};
use crate::physics::spectrum::{EnergySpectrum, SpectralBin};
use crate::scan::config::ScanConfig;

/// Number of independent Bernoulli trials each spectrum bin's photon
/// population is subdivided into per scattering check.
const TRIALS_PER_BIN: usize = 16;

/// Below this fraction of water's absorption a voxel is treated as vacuum:
/// no electrons to scatter off.
const VACUUM_FACTOR: f64 = 1e-12;

impl Ray {
    /// Performs the probabilistic Compton scattering of this ray after it
    /// crossed `distance` mm of the given voxel, spawning zero or more
    /// scattered sibling rays at `origin` (model-local coordinates).
    ///
    /// Every Bernoulli success removes photon flow from the parent spectrum,
    /// whether or not the drawn angle passes the detector's angular
    /// acceptance: the photon left the primary beam either way, only its
    /// tracking is conditional.
    ///
    /// `rng` is this thread's own generator (Bernoulli trials); `angle_rng`
    /// is the shared generator behind the angle bank, locked per draw.
    pub fn scatter(
        &mut self,
        bank: &ComptonScattering,
        angle_rng: &Mutex<StdRng>,
        rng: &mut StdRng,
        voxel: &VoxelData,
        distance: f64,
        config: &ScanConfig,
        origin: Point,
    ) -> Vec<Ray> {
        // Electron density relative to water
        let coefficient_factor = voxel.absorption / WATER_ABSORPTION_PER_MM;

        let sigma_ref = bank.cross_section_at(voxel.reference_energy);
        let mu_compton_ref = sigma_ref * WATER_ELECTRON_DENSITY_PER_MM3 * coefficient_factor;
        let reference_survival = (-mu_compton_ref * distance).exp();

        if coefficient_factor < VACUUM_FACTOR {
            // Vacuum-like voxel: nothing to scatter off
            self.properties.simple_intensity *= reference_survival;
            return Vec::new();
        }

        let mut accepted: Vec<(f64, f64, f64)> = Vec::new(); // (angle, energy, photons)
        let bin_count = self.properties.spectrum.len();

        for bin_idx in 0..bin_count {
            let SpectralBin { energy, photons } = self.properties.spectrum.bins()[bin_idx];
            if photons <= 0.0 {
                continue;
            }

            let sigma = bank.cross_section_at(energy);
            let mu = sigma * WATER_ELECTRON_DENSITY_PER_MM3 * coefficient_factor;
            let scatter_probability = 1.0 - (-mu * distance).exp();
            let trial_probability =
                (scatter_probability * config.scatter_probability_correction).clamp(0.0, 1.0);

            let mut events = 0u32;
            for _ in 0..TRIALS_PER_BIN {
                if rng.r#gen::<f64>() >= trial_probability {
                    continue;
                }
                events += 1;

                let angle = bank.random_angle(energy, angle_rng);
                if angle.abs() > config.max_scatter_plane_angle {
                    // Outside the tracked angular window: photon lost
                    continue;
                }
                let shifted = compton_shifted_energy(energy, angle);
                let flow = photons * config.scattered_ray_absorption_factor
                    / TRIALS_PER_BIN as f64;
                accepted.push((angle, shifted, flow));
            }

            if events > 0 {
                let keep = 1.0
                    - config.scattered_ray_absorption_factor / TRIALS_PER_BIN as f64;
                self.properties
                    .spectrum
                    .scale_bin(bin_idx, keep.powi(events as i32));
            }
        }

        if accepted.is_empty() {
            return Vec::new();
        }

        self.spawn_grouped(bank, origin, reference_survival, &accepted)
    }

    /// Groups accepted (angle, energy, photonflow) tuples by exact angle and
    /// builds one scattered ray per distinct angle.
    fn spawn_grouped(
        &self,
        bank: &ComptonScattering,
        origin: Point,
        reference_survival: f64,
        accepted: &[(f64, f64, f64)],
    ) -> Vec<Ray> {
        let mut groups: BTreeMap<u64, Vec<(f64, f64)>> = BTreeMap::new();
        for &(angle, energy, flow) in accepted {
            groups.entry(angle.to_bits()).or_default().push((energy, flow));
        }
        let total_trials = accepted.len() as f64;

        let mut spawned = Vec::with_capacity(groups.len());
        for (angle_bits, members) in groups {
            let angle = f64::from_bits(angle_bits);
            let group_fraction = members.len() as f64 / total_trials;

            // Merge members with equal shifted energy, keep bins sorted
            let mut by_energy: BTreeMap<u64, SpectralBin> = BTreeMap::new();
            for (energy, flow) in members {
                by_energy
                    .entry(energy.to_bits())
                    .and_modify(|b| b.photons += flow)
                    .or_insert(SpectralBin {
                        energy,
                        photons: flow,
                    });
            }
            let bins: Vec<SpectralBin> = by_energy.into_values().collect();
            let Ok(spectrum) = EnergySpectrum::new(bins) else {
                log::warn!("scatter: degenerate grouped spectrum, event dropped");
                continue;
            };

            let direction =
                rotate_vector_around(&self.direction, &bank.plane_normal(), angle);
            let mut properties =
                RayProperties::new(spectrum, self.properties.pixel_index);
            properties.simple_intensity =
                self.properties.simple_intensity * group_fraction * reference_survival;
            properties.generation = self.properties.generation + 1;

            match Ray::new(origin, direction, properties) {
                Some(ray) => spawned.push(ray),
                None => log::warn!("scatter: zero-length scattered direction, event dropped"),
            }
        }
        spawned
    }
}
