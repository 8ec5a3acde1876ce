use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the orientation and texture machinery.
///
/// Purely numerical edge cases (antipodal quaternions, zero-length
/// vectors) are clamped instead of reported through this enum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("quaternion norm {norm} is off unit by more than {tol}")]
    NonUnitQuaternion { norm: f64, tol: f64 },

    #[error("shape mismatch: left operand has {left} elements, right has {right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("matrix is not a rotation: orthonormality residual {residual}")]
    NotARotationMatrix { residual: f64 },

    #[error("operation requires a non-empty input: {what}")]
    EmptyInput { what: &'static str },

    #[error("unknown sampling method {name:?}, valid options: icosahedral_mesh, \
             spherified_cube, hexagonal_lattice, equal_area, random")]
    UnknownMethod { name: String },

    #[error("unknown hemisphere {name:?}, valid options: upper, lower, both")]
    UnknownHemisphere { name: String },

    #[error("unknown point group {name:?}, valid names are the 32 Hermann-Mauguin \
             symbols such as \"m-3m\"")]
    UnknownPointGroup { name: String },

    #[error("resolution {resolution} is outside (0, 180] degrees")]
    BadResolution { resolution: f64 },

    #[error("kernel half-width sigma {sigma} is negative")]
    BadSigma { sigma: f64 },

    #[error("point group {name} has no fundamental sector, only the 11 Laue groups do")]
    NoFundamentalSector { name: &'static str },

    #[error("space group number {number} is outside 1..=230")]
    SpaceGroupRange { number: u32 },

    #[error("expected {expected} symmetry group(s), found {found}")]
    SymmetryArity { expected: usize, found: usize },

    #[error("mean did not stabilize after {iterations} iterations, last estimate {last:?}")]
    MeanConvergence { iterations: usize, last: [f64; 4] },
}
