//! Arc detector opposite the tube, shared between worker threads.

use std::sync::Mutex;

use anyhow::{Result, ensure};

use crate::geom::rotation::rotate_vector_around;
use crate::model::ray::Ray;
use crate::scan::config::ScanConfig;
use crate::{Point, Vector};

/// What the detector keeps per absorbed ray. The spectrum itself is reduced
/// to its total radiant power; per-bin readout is not needed downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedRay {
    pub simple_intensity: f64,
    pub total_power: f64,
    pub voxel_hits: u32,
    pub generation: u32,
}

/// An arc of pixels centered on the beam axis, one focal distance past the
/// isocenter. Accumulation is internally locked so worker threads share the
/// detector by reference.
pub struct XRayDetector {
    source: Point,
    central: Vector,
    normal: Vector,
    pixels: Vec<Point>,
    fan_angle: f64,
    fan_increment: f64,
    detected: Mutex<Vec<Vec<DetectedRay>>>,
}

impl XRayDetector {
    /// Builds the pixel arc for a tube at `source` shining along `central`
    /// (unit vector toward the isocenter). `normal` is the rotation axis of
    /// the fan plane.
    pub fn new(
        source: Point,
        central: Vector,
        normal: Vector,
        config: &ScanConfig,
    ) -> Result<Self> {
        ensure!(config.num_pixels > 0, "detector needs at least one pixel");
        let central = central
            .normalize()
            .ok_or_else(|| anyhow::anyhow!("detector central direction must be nonzero"))?;
        let normal = normal
            .normalize()
            .ok_or_else(|| anyhow::anyhow!("detector fan normal must be nonzero"))?;

        let n = config.num_pixels;
        let fan_increment = if n > 1 {
            config.fan_angle / (n - 1) as f64
        } else {
            config.fan_angle
        };
        let radius = 2.0 * config.focal_distance;

        let mut pixels = Vec::with_capacity(n);
        for i in 0..n {
            let phi = -config.fan_angle / 2.0 + i as f64 * fan_increment;
            let towards = rotate_vector_around(&central, &normal, phi);
            pixels.push(source + towards * radius);
        }

        Ok(Self {
            source,
            central,
            normal,
            pixels,
            fan_angle: config.fan_angle,
            fan_increment,
            detected: Mutex::new(vec![Vec::new(); n]),
        })
    }

    pub fn num_pixels(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixel_position(&self, i: usize) -> Point {
        self.pixels[i.min(self.pixels.len() - 1)]
    }

    pub fn source(&self) -> Point {
        self.source
    }

    /// Absorbs a ray that has left the model. Primary rays land on the pixel
    /// they were aimed at; scattered rays are mapped through their signed fan
    /// angle and dropped when they fall outside the arc. Returns whether the
    /// ray was recorded.
    pub fn detect_ray(&self, ray: &Ray) -> bool {
        let pixel = if ray.properties.definitely_hits {
            ray.properties.pixel_index
        } else {
            match self.pixel_for_direction(ray.direction) {
                Some(i) => i,
                None => return false,
            }
        };
        if pixel >= self.pixels.len() {
            log::warn!("detector: pixel index {pixel} out of range, ray dropped");
            return false;
        }

        let record = DetectedRay {
            simple_intensity: ray.properties.simple_intensity,
            total_power: ray.properties.spectrum.total_power(),
            voxel_hits: ray.properties.voxel_hits,
            generation: ray.properties.generation,
        };
        let mut detected = match self.detected.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        detected[pixel].push(record);
        true
    }

    /// Maps a ray direction to the nearest pixel by its signed angle from
    /// the central axis, measured around the fan normal.
    fn pixel_for_direction(&self, direction: Vector) -> Option<usize> {
        let sin = self.central.cross(&direction).dot(&self.normal);
        let cos = self.central.dot(&direction);
        let phi = sin.atan2(cos);

        let half = self.fan_angle / 2.0 + self.fan_increment / 2.0;
        if phi.abs() > half {
            return None;
        }
        let raw = ((phi + self.fan_angle / 2.0) / self.fan_increment).round();
        let i = raw.clamp(0.0, (self.pixels.len() - 1) as f64) as usize;
        Some(i)
    }

    /// Total detected radiant power per pixel (keV/s).
    pub fn accumulated_power(&self) -> Vec<f64> {
        let detected = match self.detected.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        detected
            .iter()
            .map(|rays| rays.iter().map(|r| r.total_power).sum())
            .collect()
    }

    /// Highest scattering generation among all detected rays.
    pub fn max_generation(&self) -> u32 {
        let detected = match self.detected.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        detected
            .iter()
            .flatten()
            .map(|r| r.generation)
            .max()
            .unwrap_or(0)
    }

    pub fn detected_count(&self) -> usize {
        let detected = match self.detected.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        detected.iter().map(Vec::len).sum()
    }

    /// Clears every pixel's accumulator.
    pub fn reset(&self) {
        let mut detected = match self.detected.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for pixel in detected.iter_mut() {
            pixel.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<Vec<DetectedRay>> {
        match self.detected.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
