use serde::{Deserialize, Serialize};

/// Special material properties of a voxel, stored as bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoxelProperties(u8);

impl VoxelProperties {
    pub const NONE: Self = Self(0);
    pub const METAL: Self = Self(1);
    pub const UNDEFINED: Self = Self(2);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_metal(&self) -> bool {
        self.contains(Self::METAL)
    }

    pub fn is_undefined(&self) -> bool {
        self.contains(Self::UNDEFINED)
    }
}

/// Material data of a single voxel.
///
/// The absorption coefficient is the total linear attenuation (1/mm) at the
/// voxel's reference energy. Coefficients at other energies are derived via
/// the photoelectric cube law, see [`VoxelData::absorption_at`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelData {
    /// Linear attenuation coefficient at `reference_energy` (1/mm, >= 0).
    pub absorption: f64,
    /// Energy at which `absorption` was measured (keV).
    pub reference_energy: f64,
    /// Special material flags.
    pub properties: VoxelProperties,
}

impl VoxelData {
    pub fn new(absorption: f64, reference_energy: f64) -> Self {
        Self {
            absorption: absorption.max(0.0),
            reference_energy,
            properties: VoxelProperties::NONE,
        }
    }

    /// Vacuum-like voxel: no attenuation.
    pub fn empty(reference_energy: f64) -> Self {
        Self::new(0.0, reference_energy)
    }

    pub fn with_properties(mut self, properties: VoxelProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Linear attenuation coefficient at the given energy (1/mm).
    ///
    /// Scales the tabulated coefficient with the photoelectric cube law
    /// mu(E) = mu_ref * (E_ref / E)^3, which dominates attenuation in the
    /// diagnostic energy range.
    pub fn absorption_at(&self, energy: f64) -> f64 {
        if energy <= 0.0 {
            return self.absorption;
        }
        self.absorption * (self.reference_energy / energy).powi(3)
    }
}
