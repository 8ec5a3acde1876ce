use crate::error::{Error, Result};
use crate::vector3d::Vector3d;
use crate::{OuterOptions, UnitQuat};
use log::info;
use nalgebra as na;
use na::{DMatrix, Matrix3, Matrix4, Quaternion, Rotation3, Unit, Vector3};
use rand::prelude::*;
use std::f64::consts::PI;

/// Near-unit quaternions within this tolerance are renormalized on input.
pub const UNIT_TOL: f64 = 1e-6;
/// Orthonormality tolerance for rotation matrices.
pub const MATRIX_TOL: f64 = 1e-6;
/// Default tolerance for double-cover-aware quaternion equality.
pub const QUAT_EQ_TOL: f64 = 1e-10;

/// Rotation angle in [0, pi].
pub fn rotation_angle(q: &UnitQuat) -> f64 {
    // |w| rather than w: q and -q are the same rotation
    2.0 * q.w.abs().min(1.0).acos()
}

pub fn quat_dot(a: &UnitQuat, b: &UnitQuat) -> f64 {
    a.coords.dot(&b.coords)
}

/// Equality up to the double cover.
pub fn sym_eq(a: &UnitQuat, b: &UnitQuat, tol: f64) -> bool {
    quat_dot(a, b).abs() >= 1.0 - tol
}

/// Geodesic distance between two rotations in [0, pi], invariant to the
/// sign of either argument.
pub fn quat_distance(a: &UnitQuat, b: &UnitQuat) -> f64 {
    2.0 * quat_dot(a, b).abs().min(1.0).acos()
}

/// Sign normal form: scalar part positive, a zero scalar part resolved by
/// the first nonzero imaginary component.
pub fn canonical(q: &UnitQuat) -> UnitQuat {
    let flip = if q.w != 0.0 {
        q.w < 0.0
    } else if q.i != 0.0 {
        q.i < 0.0
    } else if q.j != 0.0 {
        q.j < 0.0
    } else {
        q.k < 0.0
    };
    if flip {
        UnitQuat::new_unchecked(-*q.quaternion())
    } else {
        *q
    }
}

pub(crate) fn broadcast_len(left: usize, right: usize) -> Result<usize> {
    if left == right {
        Ok(left)
    } else if left == 1 {
        Ok(right)
    } else if right == 1 {
        Ok(left)
    } else {
        Err(Error::ShapeMismatch { left, right })
    }
}

#[inline]
pub(crate) fn bcast(i: usize, len: usize) -> usize {
    if len == 1 {
        0
    } else {
        i
    }
}

/// Bunge (ZXZ) Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub phi1: f64,
    pub cap_phi: f64,
    pub phi2: f64,
}

impl EulerAngles {
    pub fn new(phi1: f64, cap_phi: f64, phi2: f64) -> Self {
        Self { phi1, cap_phi, phi2 }
    }

    pub fn from_degrees(phi1: f64, cap_phi: f64, phi2: f64) -> Self {
        Self::new(phi1.to_radians(), cap_phi.to_radians(), phi2.to_radians())
    }

    pub fn to_degrees(self) -> (f64, f64, f64) {
        (
            self.phi1.to_degrees(),
            self.cap_phi.to_degrees(),
            self.phi2.to_degrees(),
        )
    }

    /// Haar-uniform angles: phi1, phi2 in [0, 2*pi), cos(cap_phi) in [-1, 1).
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            phi1: rng.gen_range(0.0..PI * 2.0),
            cap_phi: rng.gen_range(-1.0..1.0f64).acos(),
            phi2: rng.gen_range(0.0..PI * 2.0),
        }
    }
}

impl From<EulerAngles> for UnitQuat {
    fn from(angs: EulerAngles) -> Self {
        let half_sum = (angs.phi1 + angs.phi2) * 0.5;
        let half_diff = (angs.phi1 - angs.phi2) * 0.5;
        let (sb, cb) = (angs.cap_phi * 0.5).sin_cos();
        let q = Quaternion::new(
            cb * half_sum.cos(),
            sb * half_diff.cos(),
            sb * half_diff.sin(),
            cb * half_sum.sin(),
        );
        UnitQuat::new_unchecked(q)
    }
}

impl From<UnitQuat> for EulerAngles {
    fn from(q: UnitQuat) -> Self {
        // at cap_phi = 0 or pi the two atan2 arguments vanish pairwise and
        // the z-rotation splits evenly between phi1 and phi2
        let half_sum = q.k.atan2(q.w);
        let half_diff = q.j.atan2(q.i);
        let cap_phi = 2.0 * q.i.hypot(q.j).atan2(q.w.hypot(q.k));
        Self {
            phi1: (half_sum + half_diff).rem_euclid(2.0 * PI),
            cap_phi,
            phi2: (half_sum - half_diff).rem_euclid(2.0 * PI),
        }
    }
}

/// An ordered batch of unit quaternions. Value object: every operation
/// returns a new instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    data: Vec<UnitQuat>,
}

impl Rotation {
    pub fn from_quats(data: Vec<UnitQuat>) -> Self {
        Self { data }
    }

    pub fn single(q: UnitQuat) -> Self {
        Self { data: vec![q] }
    }

    pub fn identity(n: usize) -> Self {
        Self {
            data: vec![UnitQuat::identity(); n],
        }
    }

    /// From (w, x, y, z) components; norms within `UNIT_TOL` of 1 are
    /// renormalized, anything further off is malformed input.
    pub fn from_wxyz(wxyz: &[[f64; 4]]) -> Result<Self> {
        let mut data = Vec::with_capacity(wxyz.len());
        for &[w, x, y, z] in wxyz {
            let q = Quaternion::new(w, x, y, z);
            let norm = q.norm();
            if (norm - 1.0).abs() > UNIT_TOL {
                return Err(Error::NonUnitQuaternion {
                    norm,
                    tol: UNIT_TOL,
                });
            }
            data.push(UnitQuat::new_normalize(q));
        }
        Ok(Self { data })
    }

    pub fn from_euler(angles: &[EulerAngles]) -> Self {
        Self {
            data: angles.iter().map(|&a| a.into()).collect(),
        }
    }

    /// (phi1, cap_phi, phi2) triples in degrees, Bunge convention.
    pub fn from_euler_degrees(triples: &[[f64; 3]]) -> Self {
        Self {
            data: triples
                .iter()
                .map(|&[a, b, c]| EulerAngles::from_degrees(a, b, c).into())
                .collect(),
        }
    }

    /// Axis-angle pairs; a zero-length axis yields the identity.
    pub fn from_axis_angle(pairs: &[([f64; 3], f64)]) -> Self {
        let data = pairs
            .iter()
            .map(|&([x, y, z], angle)| {
                match Unit::try_new(Vector3::new(x, y, z), 1e-12) {
                    Some(axis) => UnitQuat::from_axis_angle(&axis, angle),
                    None => UnitQuat::identity(),
                }
            })
            .collect();
        Self { data }
    }

    pub fn from_matrix(mats: &[Matrix3<f64>]) -> Result<Self> {
        let mut data = Vec::with_capacity(mats.len());
        for m in mats {
            let residual = (m * m.transpose() - Matrix3::identity()).norm()
                + (m.determinant() - 1.0).abs();
            if residual > MATRIX_TOL {
                return Err(Error::NotARotationMatrix { residual });
            }
            let r = Rotation3::from_matrix_unchecked(*m);
            data.push(UnitQuat::from_rotation_matrix(&r));
        }
        Ok(Self { data })
    }

    pub fn random(n: usize, rng: &mut impl Rng) -> Self {
        Self {
            data: (0..n).map(|_| EulerAngles::random(rng).into()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn quats(&self) -> &[UnitQuat] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitQuat> {
        self.data.iter()
    }

    pub fn get(&self, i: usize) -> Option<&UnitQuat> {
        self.data.get(i)
    }

    /// Elementwise Hamilton product; length-1 operands broadcast.
    pub fn compose(&self, other: &Rotation) -> Result<Rotation> {
        let n = broadcast_len(self.len(), other.len())?;
        let data = (0..n)
            .map(|i| self.data[bcast(i, self.len())] * other.data[bcast(i, other.len())])
            .collect();
        Ok(Rotation { data })
    }

    /// All |a| x |b| products in row-major order.
    pub fn outer_compose(&self, other: &Rotation) -> Rotation {
        let mut data = Vec::with_capacity(self.len() * other.len());
        for a in &self.data {
            for b in &other.data {
                data.push(a * b);
            }
        }
        Rotation { data }
    }

    pub fn inverse(&self) -> Rotation {
        Rotation {
            data: self.data.iter().map(|q| q.inverse()).collect(),
        }
    }

    /// Sandwich product q v q^-1, elementwise with broadcast.
    pub fn apply(&self, v: &Vector3d) -> Result<Vector3d> {
        let n = broadcast_len(self.len(), v.len())?;
        let data = (0..n)
            .map(|i| self.data[bcast(i, self.len())] * v.vecs()[bcast(i, v.len())])
            .collect();
        Ok(Vector3d::from_vecs(data))
    }

    pub fn angles(&self) -> Vec<f64> {
        self.data.iter().map(rotation_angle).collect()
    }

    /// Rotation axes; the identity has no axis and reports the zero vector.
    pub fn axes(&self) -> Vector3d {
        let data = self
            .data
            .iter()
            .map(|q| q.axis().map_or(Vector3::zeros(), |a| a.into_inner()))
            .collect();
        Vector3d::from_vecs(data)
    }

    /// Elementwise geodesic distance, double-cover invariant.
    pub fn distance(&self, other: &Rotation) -> Result<Vec<f64>> {
        let n = broadcast_len(self.len(), other.len())?;
        Ok((0..n)
            .map(|i| {
                quat_distance(
                    &self.data[bcast(i, self.len())],
                    &other.data[bcast(i, other.len())],
                )
            })
            .collect())
    }

    /// Full |a| x |b| distance matrix, evaluated in row blocks of
    /// `opts.chunk_size`. Chunking never changes the result.
    pub fn outer_distance(&self, other: &Rotation, opts: &OuterOptions) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(self.len(), other.len());
        self.outer_distance_chunks(other, opts, |row0, block| {
            for r in 0..block.nrows() {
                for c in 0..block.ncols() {
                    out[(row0 + r, c)] = block[(r, c)];
                }
            }
        });
        out
    }

    /// Streaming form of [`outer_distance`](Self::outer_distance): each row
    /// block is handed to `sink` with its starting row, so peak memory stays
    /// proportional to `chunk_size * |b|`.
    pub fn outer_distance_chunks(
        &self,
        other: &Rotation,
        opts: &OuterOptions,
        mut sink: impl FnMut(usize, &DMatrix<f64>),
    ) {
        let n = self.len();
        let chunk = opts.chunk_size.max(1);
        let mut done = 0;
        while done < n {
            let rows = chunk.min(n - done);
            let mut block = DMatrix::zeros(rows, other.len());
            for r in 0..rows {
                for (c, q) in other.data.iter().enumerate() {
                    block[(r, c)] = quat_distance(&self.data[done + r], q);
                }
            }
            if opts.progress {
                info!("outer distance rows {}..{} of {}", done, done + rows, n);
            }
            sink(done, &block);
            done += rows;
        }
    }

    /// Quaternion mean: dominant eigenvector of the accumulated outer
    /// product sum. qq^T is sign-invariant, so the double cover cannot
    /// bias the estimate.
    pub fn mean(&self) -> Result<UnitQuat> {
        if self.data.is_empty() {
            return Err(Error::EmptyInput {
                what: "mean of an empty rotation set",
            });
        }
        let mut m = Matrix4::zeros();
        for q in &self.data {
            m += q.coords * q.coords.transpose();
        }
        let eig = m.symmetric_eigen();
        let imax = eig
            .eigenvalues
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        let v = eig.eigenvectors.column(imax);
        // coords layout is (x, y, z, w)
        let q = Quaternion::new(v[3], v[0], v[1], v[2]);
        Ok(UnitQuat::new_normalize(q))
    }

    /// Sign normal form of every element, for output boundaries that want
    /// one representative of the double cover.
    pub fn canonicalized(&self) -> Rotation {
        Rotation {
            data: self.data.iter().map(canonical).collect(),
        }
    }

    pub fn to_wxyz(&self) -> Vec<[f64; 4]> {
        self.data.iter().map(|q| [q.w, q.i, q.j, q.k]).collect()
    }

    pub fn to_euler(&self) -> Vec<EulerAngles> {
        self.data.iter().map(|&q| q.into()).collect()
    }

    pub fn to_matrix(&self) -> Vec<Matrix3<f64>> {
        self.data
            .iter()
            .map(|q| q.to_rotation_matrix().into_inner())
            .collect()
    }
}
