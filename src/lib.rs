//! `tomosim` simulates a fan-beam CT acquisition: an X-ray tube shines a
//! polychromatic beam through a voxelized model onto an arc detector,
//! accounting for energy-dependent attenuation and Compton scattering.
//!
//! The main entry point is [`scan::gantry::Gantry`], which radiates a
//! [`model::grid::VoxelModel`] and returns one [`scan::gantry::Projection`]
//! per frame.

pub mod geom;
pub mod model;
pub mod physics;
pub mod scan;
pub mod vecutils;

pub use geom::point::Point;
pub use geom::vector::Vector;
