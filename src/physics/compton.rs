use std::f64::consts::PI;
use std::sync::Mutex;

use anyhow::{Result, ensure};
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::Vector;
use crate::physics::constants::ELECTRON_REST_ENERGY_KEV;
use crate::physics::cross_section::ComptonCrossSection;
use crate::physics::distribution::ProbabilityDistribution;

/// Number of discretized angles per energy in the angular distribution bank.
const ANGLES_PER_ENERGY: usize = 256;

/// Klein-Nishina angular pseudo-probability at scattering angle `theta` for a
/// photon of the given energy (keV). Proportional to the differential cross
/// section; not normalized.
pub fn angle_pseudo_probability(energy: f64, theta: f64) -> f64 {
    let a = energy / ELECTRON_REST_ENERGY_KEV;
    let c = theta.cos();
    let one_minus_c = 1.0 - c;
    let denom = 1.0 + a * one_minus_c;
    let base = (1.0 + c * c) / (2.0 * denom * denom);
    base * (1.0 + a * a * one_minus_c * one_minus_c / ((1.0 + c * c) * denom))
}

/// Photon energy after Compton scattering by `theta` (keV).
pub fn compton_shifted_energy(energy: f64, theta: f64) -> f64 {
    1.0 / ((1.0 - theta.cos()) / ELECTRON_REST_ENERGY_KEV + 1.0 / energy)
}

/// Precomputed bank of Compton scattering angle distributions.
///
/// For each of a fixed set of discretized energies, holds a discrete
/// distribution over `ANGLES_PER_ENERGY` equally spaced angles in [-pi, pi),
/// weighted with the Klein-Nishina angular formula. Built once per run,
/// immutable and lock-free to read afterwards; only the random draw needs the
/// caller-supplied generator mutex.
pub struct ComptonScattering {
    start_energy: f64,
    energy_resolution: f64,
    distributions: Vec<ProbabilityDistribution>,
    plane_normal: Vector,
    cross_section: ComptonCrossSection,
}

impl ComptonScattering {
    /// Precomputes angle distributions for `num_energies` energies spanning
    /// `start_energy..=end_energy` (keV). Scattered directions are produced
    /// by rotating around `plane_normal`.
    pub fn new(
        num_energies: usize,
        start_energy: f64,
        end_energy: f64,
        plane_normal: Vector,
        cross_section: ComptonCrossSection,
    ) -> Result<Self> {
        ensure!(num_energies >= 2, "need at least two discretized energies");
        ensure!(start_energy > 0.0, "start energy must be positive");
        ensure!(end_energy > start_energy, "energy range must be non-empty");

        let energy_resolution = (end_energy - start_energy) / (num_energies - 1) as f64;
        let angle_step = 2.0 * PI / ANGLES_PER_ENERGY as f64;

        let distributions = (0..num_energies)
            .into_par_iter()
            .map(|i| {
                let energy = start_energy + i as f64 * energy_resolution;
                let pairs: Vec<(f64, f64)> = (0..ANGLES_PER_ENERGY)
                    .map(|k| {
                        let theta = -PI + k as f64 * angle_step;
                        (theta, angle_pseudo_probability(energy, theta))
                    })
                    .collect();
                ProbabilityDistribution::new(&pairs)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            start_energy,
            energy_resolution,
            distributions,
            plane_normal,
            cross_section,
        })
    }

    /// Draws a random scattering angle for a photon of the given energy.
    ///
    /// The nearest discretized energy bin is used (clamped to the bank's
    /// range). The passed mutex guards the shared generator; the distribution
    /// tables themselves are read without locking.
    pub fn random_angle(&self, energy: f64, rng: &Mutex<StdRng>) -> f64 {
        let dist = &self.distributions[self.energy_index(energy)];
        let mut generator = match rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        dist.sample(&mut generator)
    }

    /// Normal of the scattering plane; scattered rays rotate around it.
    pub fn plane_normal(&self) -> Vector {
        self.plane_normal
    }

    /// Total Compton cross section at the given energy (mm^2 per electron).
    pub fn cross_section_at(&self, energy: f64) -> f64 {
        self.cross_section.at(energy)
    }

    fn energy_index(&self, energy: f64) -> usize {
        let idx = ((energy - self.start_energy) / self.energy_resolution).round();
        (idx.max(0.0) as usize).min(self.distributions.len() - 1)
    }

    #[cfg(test)]
    fn pseudo_probabilities(&self, energy: f64) -> Vec<(f64, f64)> {
        let e = self.start_energy + self.energy_index(energy) as f64 * self.energy_resolution;
        let angle_step = 2.0 * PI / ANGLES_PER_ENERGY as f64;
        (0..ANGLES_PER_ENERGY)
            .map(|k| {
                let theta = -PI + k as f64 * angle_step;
                (theta, angle_pseudo_probability(e, theta))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_bank() -> ComptonScattering {
        let table = ComptonCrossSection::new(10.0, 150.0, 1.0).unwrap();
        ComptonScattering::new(15, 10.0, 150.0, Vector::new(0., 0., 1.), table).unwrap()
    }

    #[test]
    fn test_compton_shift() {
        // Backscatter at 511 keV halves the photon energy... more precisely:
        // E' = 1 / (2/511 + 1/511) = 511/3
        let shifted = compton_shifted_energy(ELECTRON_REST_ENERGY_KEV, PI);
        assert!((shifted - ELECTRON_REST_ENERGY_KEV / 3.0).abs() < 1e-9);
        // Forward scattering leaves the energy unchanged
        let unchanged = compton_shifted_energy(100.0, 0.0);
        assert!((unchanged - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_shift_always_reduces_energy() {
        for theta in [0.1, 0.5, 1.0, 2.0, PI] {
            assert!(compton_shifted_energy(80.0, theta) < 80.0);
        }
    }

    #[test]
    fn test_angle_pseudo_probability_symmetric() {
        for theta in [0.3, 1.0, 2.5] {
            let p_pos = angle_pseudo_probability(100.0, theta);
            let p_neg = angle_pseudo_probability(100.0, -theta);
            assert!((p_pos - p_neg).abs() < 1e-12);
        }
    }

    #[test]
    fn test_forward_peak_grows_with_energy() {
        // Higher energies scatter more forward: ratio p(0)/p(pi/2) increases
        let low = angle_pseudo_probability(20.0, 0.0) / angle_pseudo_probability(20.0, PI / 2.);
        let high = angle_pseudo_probability(140.0, 0.0) / angle_pseudo_probability(140.0, PI / 2.);
        assert!(high > low);
    }

    #[test]
    fn test_energy_index_clamps() {
        let bank = test_bank();
        assert_eq!(bank.energy_index(-100.0), 0);
        assert_eq!(bank.energy_index(1e6), 14);
    }

    #[test]
    fn test_sampled_histogram_matches_curve() {
        // Draw many angles at a fixed energy and compare the histogram
        // with the precomputed pseudo-probability curve.
        let bank = test_bank();
        let energy = 80.0;
        let rng = Mutex::new(StdRng::seed_from_u64(7));

        let n_samples = 100_000;
        let n_buckets = 32;
        let mut histogram = vec![0.0_f64; n_buckets];
        for _ in 0..n_samples {
            let theta = bank.random_angle(energy, &rng);
            let bucket = (((theta + PI) / (2.0 * PI)) * n_buckets as f64) as usize;
            histogram[bucket.min(n_buckets - 1)] += 1.0;
        }

        let curve = bank.pseudo_probabilities(energy);
        let total_weight: f64 = curve.iter().map(|(_, w)| w).sum();
        let mut expected = vec![0.0_f64; n_buckets];
        for (theta, w) in &curve {
            let bucket = (((theta + PI) / (2.0 * PI)) * n_buckets as f64) as usize;
            expected[bucket.min(n_buckets - 1)] += w / total_weight * n_samples as f64;
        }

        let total_abs_diff: f64 = histogram
            .iter()
            .zip(expected.iter())
            .map(|(o, e)| (o - e).abs())
            .sum();
        let relative = total_abs_diff / n_samples as f64;
        assert!(
            relative < 0.05,
            "sampled histogram deviates from curve by {relative}"
        );
    }
}
