//! End-to-end acquisition of a small water phantom.

use tomosim::Point;
use tomosim::geom::frame::Frame;
use tomosim::model::grid::VoxelModel;
use tomosim::model::voxel::VoxelData;
use tomosim::physics::constants::{REFERENCE_ENERGY_KEV, WATER_ABSORPTION_PER_MM};
use tomosim::scan::config::ScanConfig;
use tomosim::scan::gantry::Gantry;

/// A 60 mm water cube centered on the origin, 3 mm voxels.
fn water_phantom() -> VoxelModel {
    VoxelModel::new(
        [20, 20, 20],
        [3.0, 3.0, 3.0],
        Frame::translated(Point::new(-30.0, -30.0, -30.0)),
        VoxelData::new(WATER_ABSORPTION_PER_MM, REFERENCE_ENERGY_KEV),
    )
    .unwrap()
}

fn scan_config() -> ScanConfig {
    let mut config = ScanConfig::new();
    config.num_pixels = 33;
    config.num_threads = Some(2);
    config.rng_seed = Some(7);
    config
}

#[test]
fn full_rotation_produces_consistent_sinogram() {
    let model = water_phantom();
    let mut config = scan_config();
    config.scattering_enabled = false;
    let mut gantry = Gantry::new(config).unwrap();

    let num_frames = 4;
    let step = std::f64::consts::TAU / num_frames as f64;
    let mut frames = Vec::new();
    for _ in 0..num_frames {
        frames.push(gantry.radiate(&model).unwrap());
        gantry.rotate(step);
    }

    for frame in &frames {
        assert_eq!(frame.values.len(), 33);
        assert_eq!(frame.detected_rays, 33);

        // Every primary ray survives with some power; rays through the cube
        // read below the vacuum baseline, rays past it read 1.0
        let center = frame.values[16];
        let edge = frame.values[0];
        assert!(center > 0.0 && center < 1.0);
        assert!((edge - 1.0).abs() < 1e-9);
    }

    // The cube is rotationally symmetric under quarter turns, so all four
    // frames must agree
    for frame in &frames[1..] {
        for (a, b) in frames[0].values.iter().zip(&frame.values) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}

#[test]
fn harder_beam_penetrates_water_better() {
    // Soft photons attenuate with the cube of their inverse energy, so
    // filtering them out at the tube must raise the normalized readout
    // behind the same water path
    let model = water_phantom();

    let mut soft = scan_config();
    soft.scattering_enabled = false;
    soft.spectrum_cutoff = 20.0;
    let soft_frame = Gantry::new(soft).unwrap().radiate(&model).unwrap();

    let mut hard = scan_config();
    hard.scattering_enabled = false;
    hard.spectrum_cutoff = 80.0;
    let hard_frame = Gantry::new(hard).unwrap().radiate(&model).unwrap();

    let soft_center = soft_frame.values[16];
    let hard_center = hard_frame.values[16];
    assert!(
        hard_center > soft_center,
        "filtered beam {hard_center} should penetrate better than {soft_center}"
    );

    // Both stay below the monochromatic reference-energy prediction: part of
    // each spectrum sits below the reference energy and attenuates harder
    let monochromatic = (-WATER_ABSORPTION_PER_MM * 60.0_f64).exp();
    assert!(soft_center < monochromatic);
}

#[test]
fn scattering_only_adds_signal() {
    let model = water_phantom();

    let mut without = scan_config();
    without.scattering_enabled = false;
    let quiet = Gantry::new(without).unwrap().radiate(&model).unwrap();

    let mut with = scan_config();
    with.num_threads = Some(1);
    with.scatter_probability_correction = 100.0;
    with.max_scatter_plane_angle = std::f64::consts::PI;
    let noisy = Gantry::new(with).unwrap().radiate(&model).unwrap();

    assert!(noisy.detected_rays > quiet.detected_rays);
    assert!(noisy.max_generation >= 1);
    assert!(quiet.max_generation == 0);
}

#[test]
fn seeded_scan_is_reproducible_end_to_end() {
    let model = water_phantom();
    let mut config = scan_config();
    config.num_threads = Some(1);
    config.scatter_probability_correction = 50.0;

    let run = |config: ScanConfig| {
        let mut gantry = Gantry::new(config).unwrap();
        let first = gantry.radiate(&model).unwrap();
        gantry.rotate(0.3);
        let second = gantry.radiate(&model).unwrap();
        (first, second)
    };

    let (a1, a2) = run(config.clone());
    let (b1, b2) = run(config);
    assert_eq!(a1, b1);
    assert_eq!(a2, b2);
}
