use anyhow::{Result, ensure};

use crate::physics::constants::{CLASSICAL_ELECTRON_RADIUS_MM, ELECTRON_REST_ENERGY_KEV};

/// Total Klein-Nishina cross section for Compton scattering off a free
/// electron at the given photon energy (keV). Result in mm^2 per electron.
///
/// Closed form, see e.g. Leo, "Techniques for Nuclear and Particle Physics
/// Experiments", eq. 2.104.
pub fn klein_nishina_total(energy: f64) -> f64 {
    let e = energy / ELECTRON_REST_ENERGY_KEV;
    let l = (1.0 + 2.0 * e).ln();
    let term1 = (1.0 + e) / (e * e) * (2.0 * (1.0 + e) / (1.0 + 2.0 * e) - l / e);
    let term2 = l / (2.0 * e);
    let term3 = (1.0 + 3.0 * e) / (1.0 + 2.0 * e).powi(2);
    2.0 * std::f64::consts::PI * CLASSICAL_ELECTRON_RADIUS_MM.powi(2) * (term1 + term2 - term3)
}

/// Memoized Klein-Nishina total cross section on a uniform energy grid.
///
/// Expensive to recompute per ray, so it is built once per run and shared by
/// reference. Read-only after construction, safe to share across threads.
#[derive(Debug, Clone)]
pub struct ComptonCrossSection {
    start_energy: f64,
    resolution: f64,
    table: Vec<f64>,
}

impl ComptonCrossSection {
    /// Tabulates the cross section from `start_energy` to `end_energy` (keV)
    /// at the given resolution (keV per step).
    pub fn new(start_energy: f64, end_energy: f64, resolution: f64) -> Result<Self> {
        ensure!(start_energy > 0.0, "start energy must be positive");
        ensure!(end_energy > start_energy, "energy range must be non-empty");
        ensure!(resolution > 0.0, "energy resolution must be positive");

        let steps = ((end_energy - start_energy) / resolution).round() as usize + 1;
        let table = (0..steps)
            .map(|i| klein_nishina_total(start_energy + i as f64 * resolution))
            .collect();
        Ok(Self {
            start_energy,
            resolution,
            table,
        })
    }

    /// Nearest-bin lookup, clamped at the table ends.
    pub fn at(&self, energy: f64) -> f64 {
        let idx = ((energy - self.start_energy) / self.resolution).round();
        let idx = (idx.max(0.0) as usize).min(self.table.len() - 1);
        self.table[idx]
    }
}
