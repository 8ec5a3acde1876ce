use nalgebra as na;
use na::UnitQuaternion;

pub use rand::prelude::*;

pub type UnitQuat = UnitQuaternion<f64>;

pub mod density;
pub mod error;
pub mod orientation;
pub mod rotation;
pub mod s2;
pub mod symmetry;
pub mod vector3d;
#[cfg(test)]
mod tests;

pub use density::{pole_density, DensityOptions, Hemisphere, PoleDensity};
pub use error::{Error, Result};
pub use orientation::{MeanOptions, Misorientation, Orientation};
pub use rotation::{
    canonical, quat_distance, quat_dot, rotation_angle, sym_eq, EulerAngles, Rotation,
    MATRIX_TOL, QUAT_EQ_TOL, UNIT_TOL,
};
pub use s2::{sample_s2, EqualAreaGrid, MeshMethod, S2Mesh};
pub use symmetry::{
    point_group, point_groups, space_group_point_group, FundamentalSector, Laue, PointGroup,
    SymOp, SECTOR_EPS,
};
pub use vector3d::Vector3d;

/// Knobs for chunked evaluation of outer products and distance matrices.
/// Chunking is a memory/performance measure only and never changes the
/// computed values or their order.
#[derive(Debug, Clone, Copy)]
pub struct OuterOptions {
    pub chunk_size: usize,
    /// Emit a `log::info!` line per processed block.
    pub progress: bool,
}

impl Default for OuterOptions {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            progress: false,
        }
    }
}

/// Reproducible generator for the random sampling helpers.
pub fn seeded_rng(seed: u64) -> rand_pcg::Pcg64 {
    rand_pcg::Pcg64::seed_from_u64(seed)
}
