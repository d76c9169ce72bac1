use anyhow::Result;

use tomosim::geom::frame::Frame;
use tomosim::model::grid::VoxelModel;
use tomosim::model::voxel::{VoxelData, VoxelProperties};
use tomosim::physics::constants::{REFERENCE_ENERGY_KEV, WATER_ABSORPTION_PER_MM};
use tomosim::scan::config::ScanConfig;
use tomosim::scan::gantry::Gantry;
use tomosim::Point;

const NUM_FRAMES: usize = 8;

/// A 200 mm water cylinder phantom with an off-center metal rod, voxelized
/// at 2 mm, centered on the origin.
fn phantom() -> Result<VoxelModel> {
    let num_voxels = [100, 100, 20];
    let voxel_size = [2.0, 2.0, 2.0];
    let frame = Frame::translated(Point::new(-100.0, -100.0, -20.0));
    let mut model = VoxelModel::new(
        num_voxels,
        voxel_size,
        frame,
        VoxelData::empty(REFERENCE_ENERGY_KEV),
    )?;

    let water = VoxelData::new(WATER_ABSORPTION_PER_MM, REFERENCE_ENERGY_KEV);
    let metal = VoxelData::new(20.0 * WATER_ABSORPTION_PER_MM, REFERENCE_ENERGY_KEV)
        .with_properties(VoxelProperties::METAL);

    for x in 0..num_voxels[0] {
        for y in 0..num_voxels[1] {
            let cx = (x as f64 + 0.5) * voxel_size[0] - 100.0;
            let cy = (y as f64 + 0.5) * voxel_size[1] - 100.0;
            let in_water = cx * cx + cy * cy <= 100.0 * 100.0;
            let dx = cx - 40.0;
            let in_metal = dx * dx + cy * cy <= 10.0 * 10.0;
            for z in 0..num_voxels[2] {
                if in_metal {
                    model.set_voxel_data([x, y, z], metal);
                } else if in_water {
                    model.set_voxel_data([x, y, z], water);
                }
            }
        }
    }
    Ok(model)
}

fn main() -> Result<()> {
    env_logger::init();

    let model = phantom()?;
    let mut config = ScanConfig::new();
    config.num_pixels = 128;
    config.rng_seed = Some(1);
    let mut gantry = Gantry::new(config)?;

    let step = std::f64::consts::TAU / NUM_FRAMES as f64;
    for frame in 0..NUM_FRAMES {
        let projection = gantry.radiate(&model)?;
        let min = tomosim::vecutils::min(&projection.values);
        let mean =
            projection.values.iter().sum::<f64>() / projection.values.len() as f64;
        println!(
            "frame {frame:2}  rotation {:6.1} deg  rays {:5}  depth {}  min {:.4}  mean {:.4}",
            projection.rotation.to_degrees(),
            projection.detected_rays,
            projection.max_generation,
            min,
            mean,
        );
        gantry.rotate(step);
    }
    Ok(())
}
