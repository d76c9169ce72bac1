use crate::model::voxel::VoxelData;
use crate::physics::spectrum::EnergySpectrum;
use crate::{Point, Vector};

/// Mutable per-ray state: the energy spectrum plus bookkeeping that changes
/// while the ray traverses voxels. Origin and direction live on [`Ray`].
#[derive(Debug, Clone, PartialEq)]
pub struct RayProperties {
    /// Photon-flow-vs-energy curve carried by the ray.
    pub spectrum: EnergySpectrum,
    /// Scalar intensity proxy, attenuated at the reference energy only.
    pub simple_intensity: f64,
    /// Number of voxels crossed so far.
    pub voxel_hits: u32,
    /// Detector pixel this ray was aimed at when emitted.
    pub pixel_index: usize,
    /// True for primary beam rays whose pixel is known by construction.
    pub definitely_hits: bool,
    /// Total radiant power at emission (keV/s), for normalization.
    pub initial_power: f64,
    /// How many scattering events separate this ray from the primary beam.
    pub generation: u32,
}

impl RayProperties {
    pub fn new(spectrum: EnergySpectrum, pixel_index: usize) -> Self {
        let initial_power = spectrum.total_power();
        Self {
            spectrum,
            simple_intensity: 1.0,
            voxel_hits: 0,
            pixel_index,
            definitely_hits: false,
            initial_power,
            generation: 0,
        }
    }

    /// Attenuates both the full spectrum (Beer-Lambert per bin) and the
    /// reference-energy scalar proxy over `distance` (mm) through `voxel`.
    pub fn attenuate(&mut self, voxel: &VoxelData, distance: f64) {
        self.simple_intensity *= (-voxel.absorption * distance).exp();
        self.spectrum.attenuate(voxel, distance);
    }
}

/// A parametric ray: origin plus unit direction, with mutable energy state.
///
/// Origin and direction stay fixed during one traversal step; the traversal
/// returns a new `Ray` value with the post-traversal origin, and scattering
/// spawns additional sibling values. Rays never alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    pub origin: Point,
    pub direction: Vector,
    pub properties: RayProperties,
}

impl Ray {
    /// Creates a ray. The direction is normalized; a zero direction yields
    /// `None`.
    pub fn new(origin: Point, direction: Vector, properties: RayProperties) -> Option<Self> {
        let direction = direction.normalize()?;
        Some(Self {
            origin,
            direction,
            properties,
        })
    }

    /// Returns the point along the ray at parameter `t` (mm).
    pub fn point_at(&self, t: f64) -> Point {
        self.origin + self.direction * t
    }
}
