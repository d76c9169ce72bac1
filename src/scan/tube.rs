//! X-ray tube: bremsstrahlung spectrum and primary beam emission.

use anyhow::{Context, Result, ensure};

use crate::Vector;
use crate::model::ray::{Ray, RayProperties};
use crate::physics::spectrum::{EnergySpectrum, SpectralBin};
use crate::scan::config::ScanConfig;
use crate::scan::detector::XRayDetector;

/// Emits one primary ray per detector pixel with a shared bremsstrahlung
/// spectrum, discretized per the configuration.
pub struct XRayTube {
    spectrum: EnergySpectrum,
}

impl XRayTube {
    /// Builds the tube spectrum from a Kramers-law continuum between the
    /// low-energy cutoff and the tube voltage, normalized so the summed
    /// photon flow equals `tube_photon_flow`.
    pub fn new(config: &ScanConfig) -> Result<Self> {
        ensure!(
            config.tube_voltage > config.spectrum_cutoff,
            "tube voltage ({} keV) must exceed the spectrum cutoff ({} keV)",
            config.tube_voltage,
            config.spectrum_cutoff
        );
        ensure!(config.num_energy_bins > 0, "tube needs at least one energy bin");

        let step = (config.tube_voltage - config.spectrum_cutoff)
            / config.num_energy_bins as f64;
        let mut bins = Vec::with_capacity(config.num_energy_bins);
        for k in 0..config.num_energy_bins {
            let energy = config.spectrum_cutoff + (k as f64 + 0.5) * step;
            // Kramers: intensity falls linearly to zero at the tube voltage
            let photons = (config.tube_voltage / energy - 1.0).max(0.0);
            bins.push(SpectralBin { energy, photons });
        }

        let raw_total: f64 = bins.iter().map(|b| b.photons).sum();
        ensure!(raw_total > 0.0, "tube spectrum has no photon flow");
        let scale = config.tube_photon_flow / raw_total;
        for bin in &mut bins {
            bin.photons *= scale;
        }

        let spectrum =
            EnergySpectrum::new(bins).context("building the tube spectrum")?;
        Ok(Self { spectrum })
    }

    pub fn spectrum(&self) -> &EnergySpectrum {
        &self.spectrum
    }

    /// Radiant power of a single primary ray at emission (keV/s).
    pub fn power_per_ray(&self, config: &ScanConfig) -> f64 {
        self.spectrum.total_power() * config.exposure_time / config.num_pixels as f64
    }

    /// One ray per detector pixel, aimed from the source at the pixel
    /// center. The tube's photon flow is split evenly between rays and
    /// scaled by the exposure time.
    pub fn emitted_beam(&self, detector: &XRayDetector, config: &ScanConfig) -> Vec<Ray> {
        let share = config.exposure_time / config.num_pixels as f64;
        let per_ray = self.spectrum.evenly_scaled(share);
        let source = detector.source();

        let mut beam = Vec::with_capacity(config.num_pixels);
        for pixel in 0..config.num_pixels {
            let towards = Vector::from_points(source, detector.pixel_position(pixel));
            let mut properties = RayProperties::new(per_ray.clone(), pixel);
            properties.definitely_hits = true;
            match Ray::new(source, towards, properties) {
                Some(ray) => beam.push(ray),
                None => log::warn!("tube: pixel {pixel} coincides with the source, skipped"),
            }
        }
        beam
    }
}
