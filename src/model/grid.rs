use anyhow::{Result, ensure};

use crate::geom::frame::Frame;
use crate::model::voxel::VoxelData;
use crate::{Point, Vector};

/// A dense 3D absorption model: a box of `nx * ny * nz` voxels anchored in
/// its own coordinate frame, with local coordinates spanning `[0, size]` on
/// every axis.
///
/// Voxel data is stored row-major with x varying fastest:
/// `index(x, y, z) = nx*ny*z + nx*y + x`. Minimum and maximum absorption are
/// tracked incrementally on every write.
pub struct VoxelModel {
    num_voxels: [usize; 3],
    voxel_size: [f64; 3],
    size: [f64; 3],
    data: Vec<VoxelData>,
    frame: Frame,
    min_absorption: f64,
    max_absorption: f64,
}

impl VoxelModel {
    /// Creates a model filled uniformly with `fill`.
    pub fn new(
        num_voxels: [usize; 3],
        voxel_size: [f64; 3],
        frame: Frame,
        fill: VoxelData,
    ) -> Result<Self> {
        ensure!(
            num_voxels.iter().all(|&n| n > 0),
            "voxel counts must be positive"
        );
        ensure!(
            voxel_size.iter().all(|&s| s > 0.0),
            "voxel dimensions must be positive"
        );
        let size = [
            num_voxels[0] as f64 * voxel_size[0],
            num_voxels[1] as f64 * voxel_size[1],
            num_voxels[2] as f64 * voxel_size[2],
        ];
        let data = vec![fill; num_voxels[0] * num_voxels[1] * num_voxels[2]];
        Ok(Self {
            num_voxels,
            voxel_size,
            size,
            data,
            frame,
            min_absorption: fill.absorption,
            max_absorption: fill.absorption,
        })
    }

    pub fn num_voxels(&self) -> [usize; 3] {
        self.num_voxels
    }

    pub fn voxel_size(&self) -> [f64; 3] {
        self.voxel_size
    }

    /// Physical extent of the model in local coordinates (mm per axis).
    pub fn size(&self) -> [f64; 3] {
        self.size
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn min_absorption(&self) -> f64 {
        self.min_absorption
    }

    pub fn max_absorption(&self) -> f64 {
        self.max_absorption
    }

    /// Flat data index for voxel (x, y, z). Indices are clamped to the grid
    /// (bounds errors degrade gracefully; a malformed index must not abort a
    /// running batch).
    pub fn data_index(&self, indices: [usize; 3]) -> usize {
        let [nx, ny, _] = self.num_voxels;
        let clamped = self.clamp_indices(indices);
        nx * ny * clamped[2] + nx * clamped[1] + clamped[0]
    }

    pub fn are_indices_valid(&self, indices: [usize; 3]) -> bool {
        indices[0] < self.num_voxels[0]
            && indices[1] < self.num_voxels[1]
            && indices[2] < self.num_voxels[2]
    }

    /// Voxel data at the given indices; out-of-range indices are clamped
    /// to the nearest valid voxel and logged.
    pub fn voxel_data(&self, indices: [usize; 3]) -> VoxelData {
        if !self.are_indices_valid(indices) {
            log::debug!("voxel_data: indices {indices:?} out of range, clamped");
        }
        self.data[self.data_index(indices)]
    }

    /// Writes voxel data. Out-of-range indices are logged and ignored
    /// (clamping a write would corrupt a different voxel).
    pub fn set_voxel_data(&mut self, indices: [usize; 3], data: VoxelData) {
        if !self.are_indices_valid(indices) {
            log::warn!("set_voxel_data: indices {indices:?} out of range, ignored");
            return;
        }
        let idx = self.data_index(indices);
        self.data[idx] = data;
        if data.absorption < self.min_absorption {
            self.min_absorption = data.absorption;
        }
        if data.absorption > self.max_absorption {
            self.max_absorption = data.absorption;
        }
    }

    /// Checks whether a global point lies inside the model.
    ///
    /// The local interval is closed on both ends: a coordinate exactly equal
    /// to the model size still counts as inside.
    pub fn is_point_inside(&self, p: Point) -> bool {
        self.contains_local(self.frame.point_to_local(p))
    }

    pub(crate) fn contains_local(&self, p: Point) -> bool {
        (0..3).all(|axis| {
            let c = p.axis(axis);
            c >= 0.0 && c <= self.size[axis]
        })
    }

    /// Indices of the voxel containing the given local point.
    ///
    /// Points on a voxel boundary belong to the voxel they are entering;
    /// indices are clamped to the valid range, so a coordinate equal to the
    /// model size maps to the last voxel on that axis.
    pub fn voxel_indices(&self, local: Point) -> [usize; 3] {
        let mut indices = [0usize; 3];
        for axis in 0..3 {
            let raw = (local.axis(axis) / self.voxel_size[axis]).floor();
            let max = (self.num_voxels[axis] - 1) as f64;
            indices[axis] = raw.clamp(0.0, max) as usize;
        }
        indices
    }

    /// Center of voxel (x, y, z) in local coordinates.
    pub fn voxel_center(&self, indices: [usize; 3]) -> Point {
        let clamped = self.clamp_indices(indices);
        Point::new(
            (clamped[0] as f64 + 0.5) * self.voxel_size[0],
            (clamped[1] as f64 + 0.5) * self.voxel_size[1],
            (clamped[2] as f64 + 0.5) * self.voxel_size[2],
        )
    }

    /// Center of the whole model in global coordinates.
    pub fn center(&self) -> Point {
        self.frame.point_to_global(Point::new(
            self.size[0] / 2.0,
            self.size[1] / 2.0,
            self.size[2] / 2.0,
        ))
    }

    /// Converts a global direction into the model's local frame.
    pub(crate) fn direction_to_local(&self, v: Vector) -> Vector {
        self.frame.vector_to_local(v)
    }

    fn clamp_indices(&self, indices: [usize; 3]) -> [usize; 3] {
        [
            indices[0].min(self.num_voxels[0] - 1),
            indices[1].min(self.num_voxels[1] - 1),
            indices[2].min(self.num_voxels[2] - 1),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water_cube() -> VoxelModel {
        VoxelModel::new(
            [10, 10, 10],
            [1.0, 1.0, 1.0],
            Frame::global(),
            VoxelData::new(0.02, 100.0),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result = VoxelModel::new(
            [0, 10, 10],
            [1.0, 1.0, 1.0],
            Frame::global(),
            VoxelData::empty(100.0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_row_major_index() {
        let model = water_cube();
        assert_eq!(model.data_index([0, 0, 0]), 0);
        assert_eq!(model.data_index([1, 0, 0]), 1);
        assert_eq!(model.data_index([0, 1, 0]), 10);
        assert_eq!(model.data_index([0, 0, 1]), 100);
        assert_eq!(model.data_index([3, 2, 1]), 123);
    }

    #[test]
    fn test_voxel_center_roundtrip() {
        // voxel_indices(voxel_center(x, y, z)) == (x, y, z) for all voxels
        let model = water_cube();
        for z in 0..10 {
            for y in 0..10 {
                for x in 0..10 {
                    let center = model.voxel_center([x, y, z]);
                    assert_eq!(model.voxel_indices(center), [x, y, z]);
                }
            }
        }
    }

    #[test]
    fn test_containment_boundary() {
        let model = water_cube();
        // Upper edge is inside (closed interval)
        assert!(model.is_point_inside(Point::new(10.0, 5.0, 5.0)));
        assert!(model.is_point_inside(Point::new(10.0, 10.0, 10.0)));
        // Negative coordinates are outside
        assert!(!model.is_point_inside(Point::new(-1e-12, 5.0, 5.0)));
        assert!(!model.is_point_inside(Point::new(10.0001, 5.0, 5.0)));
        // Zero is inside
        assert!(model.is_point_inside(Point::origin()));
    }

    #[test]
    fn test_boundary_point_maps_to_last_voxel() {
        let model = water_cube();
        assert_eq!(model.voxel_indices(Point::new(10.0, 10.0, 10.0)), [9, 9, 9]);
        assert_eq!(model.voxel_indices(Point::new(3.0, 0.0, 0.0)), [3, 0, 0]);
    }

    #[test]
    fn test_min_max_tracking() {
        let mut model = water_cube();
        assert_eq!(model.min_absorption(), 0.02);
        assert_eq!(model.max_absorption(), 0.02);

        model.set_voxel_data([5, 5, 5], VoxelData::new(0.5, 100.0));
        assert_eq!(model.max_absorption(), 0.5);

        model.set_voxel_data([0, 0, 0], VoxelData::empty(100.0));
        assert_eq!(model.min_absorption(), 0.0);
    }

    #[test]
    fn test_out_of_range_write_ignored() {
        let mut model = water_cube();
        model.set_voxel_data([10, 0, 0], VoxelData::new(9.0, 100.0));
        assert_eq!(model.max_absorption(), 0.02);
    }

    #[test]
    fn test_translated_frame_containment() {
        let frame = Frame::translated(Point::new(-5.0, -5.0, -5.0));
        let model = VoxelModel::new(
            [10, 10, 10],
            [1.0, 1.0, 1.0],
            frame,
            VoxelData::new(0.02, 100.0),
        )
        .unwrap();
        // Global origin is the model center now
        assert!(model.is_point_inside(Point::origin()));
        assert!(model.center().is_close(&Point::origin()));
        assert!(!model.is_point_inside(Point::new(6.0, 0.0, 0.0)));
    }
}
