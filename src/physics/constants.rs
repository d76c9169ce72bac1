//! Physical constants used by the attenuation and scattering models.
//!
//! Lengths are in millimeters, energies in keV.

/// Electron rest energy m_e c^2 (keV). Reduction energy of the Compton formulas.
pub const ELECTRON_REST_ENERGY_KEV: f64 = 510.998_95;

/// Classical electron radius (mm).
pub const CLASSICAL_ELECTRON_RADIUS_MM: f64 = 2.817_940_326_2e-12;

/// Electron density of water (electrons per mm^3).
pub const WATER_ELECTRON_DENSITY_PER_MM3: f64 = 3.343e20;

/// Reference energy at which voxel absorption coefficients are tabulated (keV).
pub const REFERENCE_ENERGY_KEV: f64 = 100.0;

/// Total linear attenuation coefficient of water at the reference energy (1/mm).
pub const WATER_ABSORPTION_PER_MM: f64 = 0.017_07;
