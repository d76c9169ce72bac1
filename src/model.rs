pub mod grid;
pub mod ray;
pub mod scatter;
pub mod transmit;
pub mod voxel;
