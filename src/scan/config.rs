use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Full configuration of one acquisition setup: fan-beam geometry, tube
/// spectrum, scattering model and execution knobs.
///
/// Immutable during a `radiate()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    // Geometry
    /// Number of detector pixels on the arc.
    pub num_pixels: usize,
    /// Full fan opening angle (radians).
    pub fan_angle: f64,
    /// Distance from the focal spot to the iso-center (mm).
    pub focal_distance: f64,

    // Tube
    /// Peak tube voltage, i.e. the highest photon energy (keV).
    pub tube_voltage: f64,
    /// Low-energy filtration cutoff of the tube spectrum (keV).
    pub spectrum_cutoff: f64,
    /// Number of bins in the discretized tube spectrum.
    pub num_energy_bins: usize,
    /// Total photon flow of the tube (photons/s), split across all rays.
    pub tube_photon_flow: f64,
    /// Exposure time per frame (s).
    pub exposure_time: f64,

    // Scattering
    /// Master switch for Compton scattering.
    pub scattering_enabled: bool,
    /// Depth cap (>= 1): rays are never scattered more than this minus one
    /// times. Scattering is force-disabled on the last generation.
    pub max_scattering_depth: usize,
    /// Scales the Bernoulli test probability of each scattering trial (>= 0).
    pub scatter_probability_correction: f64,
    /// Fraction of a bin's photon flow siphoned into a scattered ray per
    /// event, in (0, 1].
    pub scattered_ray_absorption_factor: f64,
    /// Half-angle of the detector's angular acceptance (radians). Events
    /// scattering further out of the fan plane are lost, not tracked.
    pub max_scatter_plane_angle: f64,
    /// Number of discretized energies in the scattering angle bank.
    pub num_scatter_energies: usize,

    // Execution
    /// Worker thread count; `None` uses the available hardware concurrency.
    pub num_threads: Option<usize>,
    /// Base seed for all random draws; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self {
            num_pixels: 64,
            fan_angle: 50.0_f64.to_radians(),
            focal_distance: 500.0,
            tube_voltage: 120.0,
            spectrum_cutoff: 20.0,
            num_energy_bins: 40,
            tube_photon_flow: 1.0e9,
            exposure_time: 1.0e-3,
            scattering_enabled: true,
            max_scattering_depth: 3,
            scatter_probability_correction: 1.0,
            scattered_ray_absorption_factor: 0.1,
            max_scatter_plane_angle: 5.0_f64.to_radians(),
            num_scatter_energies: 20,
            num_threads: None,
            rng_seed: None,
        }
    }

    /// Checks the cross-field constraints that the acquisition relies on.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.num_pixels > 0, "need at least one detector pixel");
        ensure!(
            self.fan_angle > 0.0 && self.fan_angle < std::f64::consts::PI,
            "fan angle must be in (0, pi)"
        );
        ensure!(self.focal_distance > 0.0, "focal distance must be positive");
        ensure!(
            self.spectrum_cutoff > 0.0 && self.tube_voltage > self.spectrum_cutoff,
            "tube voltage must exceed the spectrum cutoff"
        );
        ensure!(self.num_energy_bins >= 2, "need at least two spectrum bins");
        ensure!(self.exposure_time > 0.0, "exposure time must be positive");
        ensure!(
            self.max_scattering_depth >= 1,
            "scattering depth cap must be at least 1"
        );
        ensure!(
            self.scatter_probability_correction >= 0.0,
            "scatter probability correction must be non-negative"
        );
        ensure!(
            self.scattered_ray_absorption_factor > 0.0
                && self.scattered_ray_absorption_factor <= 1.0,
            "scattered ray absorption factor must be in (0, 1]"
        );
        ensure!(
            self.num_scatter_energies >= 2,
            "need at least two scattering energies"
        );
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}
