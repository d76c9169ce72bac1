use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::model::voxel::VoxelData;

/// One bin of a discretized energy spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralBin {
    /// Photon energy (keV).
    pub energy: f64,
    /// Photon flow at this energy (photons/s).
    pub photons: f64,
}

/// A discretized photon-flow-vs-energy curve carried by each ray.
///
/// Bins are kept sorted by energy. Photon flows are non-negative; attenuation
/// only ever scales them down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySpectrum {
    bins: Vec<SpectralBin>,
}

impl EnergySpectrum {
    /// Creates a spectrum from (energy, photon flow) pairs.
    ///
    /// Energies must be strictly increasing and positive.
    pub fn new(bins: Vec<SpectralBin>) -> Result<Self> {
        ensure!(!bins.is_empty(), "spectrum must have at least one bin");
        for pair in bins.windows(2) {
            ensure!(
                pair[0].energy < pair[1].energy,
                "spectrum energies must be strictly increasing"
            );
        }
        ensure!(bins[0].energy > 0.0, "spectrum energies must be positive");
        Ok(Self { bins })
    }

    /// A single-bin spectrum. Useful for tests and monoenergetic sources.
    pub fn monoenergetic(energy: f64, photons: f64) -> Self {
        Self {
            bins: vec![SpectralBin { energy, photons }],
        }
    }

    pub fn bins(&self) -> &[SpectralBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Attenuates every bin over `distance` (mm) through the given voxel,
    /// Beer-Lambert per bin with the bin's own energy-dependent coefficient.
    pub fn attenuate(&mut self, voxel: &VoxelData, distance: f64) {
        for bin in &mut self.bins {
            let mu = voxel.absorption_at(bin.energy);
            bin.photons *= (-mu * distance).exp();
        }
    }

    /// Returns a copy with every bin's photon flow multiplied by `factor`.
    ///
    /// Used to split the total tube output across independently traced rays.
    pub fn evenly_scaled(&self, factor: f64) -> Self {
        let bins = self
            .bins
            .iter()
            .map(|b| SpectralBin {
                energy: b.energy,
                photons: b.photons * factor,
            })
            .collect();
        Self { bins }
    }

    /// Total radiant power: sum of energy * photon flow over all bins (keV/s).
    pub fn total_power(&self) -> f64 {
        self.bins.iter().map(|b| b.energy * b.photons).sum()
    }

    /// Photon-flow-weighted mean energy (keV). Zero for an exhausted spectrum.
    pub fn mean_energy(&self) -> f64 {
        let total: f64 = self.bins.iter().map(|b| b.photons).sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.total_power() / total
    }

    /// Photon flow at the bin closest to `energy`.
    ///
    /// Energies that fall outside every bin's half-spacing neighborhood have
    /// no photons; zero flow is returned rather than an error.
    pub fn photon_flow(&self, energy: f64) -> f64 {
        let Some((idx, diff)) = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, b)| (i, (b.energy - energy).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return 0.0;
        };
        if diff <= self.half_spacing() {
            self.bins[idx].photons
        } else {
            0.0
        }
    }

    /// Multiplies one bin's photon flow by `factor`. Out-of-range indices
    /// are logged and ignored.
    pub fn scale_bin(&mut self, index: usize, factor: f64) {
        match self.bins.get_mut(index) {
            Some(bin) => bin.photons *= factor,
            None => log::warn!(
                "scale_bin: index {index} out of range ({} bins), ignored",
                self.bins.len()
            ),
        }
    }

    fn half_spacing(&self) -> f64 {
        if self.bins.len() < 2 {
            return f64::INFINITY;
        }
        (self.bins[1].energy - self.bins[0].energy) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vecutils::almost_equal;

    fn two_bin_spectrum() -> EnergySpectrum {
        EnergySpectrum::new(vec![
            SpectralBin {
                energy: 50.0,
                photons: 100.0,
            },
            SpectralBin {
                energy: 100.0,
                photons: 200.0,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_unsorted_energies_rejected() {
        let result = EnergySpectrum::new(vec![
            SpectralBin {
                energy: 100.0,
                photons: 1.0,
            },
            SpectralBin {
                energy: 50.0,
                photons: 1.0,
            },
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_attenuate_per_bin() {
        let mut spectrum = two_bin_spectrum();
        let voxel = VoxelData::new(0.02, 100.0);
        spectrum.attenuate(&voxel, 10.0);

        // 50 keV bin: mu = 0.02 * 2^3 = 0.16
        let expected_low = 100.0 * (-0.16_f64 * 10.0).exp();
        // 100 keV bin: mu = 0.02
        let expected_high = 200.0 * (-0.02_f64 * 10.0).exp();
        let photons: Vec<f64> = spectrum.bins().iter().map(|b| b.photons).collect();
        assert!(almost_equal(&photons, &[expected_low, expected_high], 1e-9));
    }

    #[test]
    fn test_evenly_scaled() {
        let spectrum = two_bin_spectrum();
        let scaled = spectrum.evenly_scaled(0.5);
        assert!((scaled.bins()[0].photons - 50.0).abs() < 1e-12);
        assert!((scaled.bins()[1].photons - 100.0).abs() < 1e-12);
        // Original untouched
        assert!((spectrum.bins()[0].photons - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_total_power_and_mean_energy() {
        let spectrum = two_bin_spectrum();
        // 50*100 + 100*200 = 25000 keV/s
        assert!((spectrum.total_power() - 25_000.0).abs() < 1e-9);
        // Mean: 25000 / 300
        assert!((spectrum.mean_energy() - 25_000.0 / 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_photon_flow_lookup() {
        let spectrum = two_bin_spectrum();
        assert!((spectrum.photon_flow(50.0) - 100.0).abs() < 1e-12);
        // Close to a bin: nearest-bin match
        assert!((spectrum.photon_flow(95.0) - 200.0).abs() < 1e-12);
        // Far outside any bin's neighborhood: zero flow
        assert_eq!(spectrum.photon_flow(500.0), 0.0);
    }

    #[test]
    fn test_scale_bin_out_of_range_is_noop() {
        let mut spectrum = two_bin_spectrum();
        spectrum.scale_bin(99, 0.0);
        assert!((spectrum.bins()[0].photons - 100.0).abs() < 1e-12);
        spectrum.scale_bin(1, 0.5);
        assert!((spectrum.bins()[1].photons - 100.0).abs() < 1e-12);
    }
}
