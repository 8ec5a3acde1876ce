use crate::rotation::{bcast, broadcast_len};
use crate::symmetry::FundamentalSector;
use crate::error::Result;
use crate::OuterOptions;
use log::info;
use nalgebra as na;
use na::{DMatrix, Vector3};
use std::f64::consts::PI;

/// An ordered batch of 3-vectors, not necessarily unit length.
/// Directions are unit `Vector3d`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector3d {
    data: Vec<Vector3<f64>>,
}

impl Vector3d {
    pub fn from_vecs(data: Vec<Vector3<f64>>) -> Self {
        Self { data }
    }

    pub fn from_xyz(xyz: &[[f64; 3]]) -> Self {
        Self {
            data: xyz.iter().map(|&[x, y, z]| Vector3::new(x, y, z)).collect(),
        }
    }

    pub fn single(v: Vector3<f64>) -> Self {
        Self { data: vec![v] }
    }

    /// (azimuth, polar) pairs per ISO 31-11, unit radial distance.
    pub fn from_polar(pairs: &[(f64, f64)], degrees: bool) -> Self {
        let data = pairs
            .iter()
            .map(|&(az, pol)| {
                let (az, pol) = if degrees {
                    (az.to_radians(), pol.to_radians())
                } else {
                    (az, pol)
                };
                let (sp, cp) = pol.sin_cos();
                Vector3::new(az.cos() * sp, az.sin() * sp, cp)
            })
            .collect();
        Self { data }
    }

    pub fn xvector() -> Self {
        Self::single(Vector3::x())
    }

    pub fn yvector() -> Self {
        Self::single(Vector3::y())
    }

    pub fn zvector() -> Self {
        Self::single(Vector3::z())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn vecs(&self) -> &[Vector3<f64>] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vector3<f64>> {
        self.data.iter()
    }

    pub fn get(&self, i: usize) -> Option<&Vector3<f64>> {
        self.data.get(i)
    }

    pub fn norms(&self) -> Vec<f64> {
        self.data.iter().map(|v| v.norm()).collect()
    }

    /// Normalized copy; zero-length vectors stay zero.
    pub fn unit(&self) -> Vector3d {
        let data = self
            .data
            .iter()
            .map(|v| {
                let n = v.norm();
                if n > 0.0 {
                    v / n
                } else {
                    *v
                }
            })
            .collect();
        Self { data }
    }

    pub fn dot(&self, other: &Vector3d) -> Result<Vec<f64>> {
        let n = broadcast_len(self.len(), other.len())?;
        Ok((0..n)
            .map(|i| self.data[bcast(i, self.len())].dot(&other.data[bcast(i, other.len())]))
            .collect())
    }

    /// All |a| x |b| dot products, evaluated in row blocks of
    /// `opts.chunk_size`; chunking never changes the result.
    pub fn dot_outer(&self, other: &Vector3d, opts: &OuterOptions) -> DMatrix<f64> {
        let n = self.len();
        let chunk = opts.chunk_size.max(1);
        let mut out = DMatrix::zeros(n, other.len());
        let mut done = 0;
        while done < n {
            let rows = chunk.min(n - done);
            for r in done..done + rows {
                for (c, w) in other.data.iter().enumerate() {
                    out[(r, c)] = self.data[r].dot(w);
                }
            }
            if opts.progress {
                info!("outer dot rows {}..{} of {}", done, done + rows, n);
            }
            done += rows;
        }
        out
    }

    pub fn cross(&self, other: &Vector3d) -> Result<Vector3d> {
        let n = broadcast_len(self.len(), other.len())?;
        let data = (0..n)
            .map(|i| self.data[bcast(i, self.len())].cross(&other.data[bcast(i, other.len())]))
            .collect();
        Ok(Self { data })
    }

    /// Angles between paired vectors, cosines clamped against round-off.
    /// The angle to a zero-length vector is 0.
    pub fn angle_with(&self, other: &Vector3d) -> Result<Vec<f64>> {
        let n = broadcast_len(self.len(), other.len())?;
        Ok((0..n)
            .map(|i| {
                let a = &self.data[bcast(i, self.len())];
                let b = &other.data[bcast(i, other.len())];
                let nn = a.norm() * b.norm();
                if nn > 0.0 {
                    (a.dot(b) / nn).clamp(-1.0, 1.0).acos()
                } else {
                    0.0
                }
            })
            .collect())
    }

    pub fn mean(&self) -> Vector3<f64> {
        if self.data.is_empty() {
            return Vector3::zeros();
        }
        let sum = self.data.iter().fold(Vector3::zeros(), |acc, v| acc + v);
        sum / self.data.len() as f64
    }

    /// Azimuth in [0, 2*pi); components below round-off are treated as zero
    /// so poles report azimuth 0.
    pub fn azimuth(&self) -> Vec<f64> {
        self.data
            .iter()
            .map(|v| {
                let x = if v.x.abs() < 1e-12 { 0.0 } else { v.x };
                let y = if v.y.abs() < 1e-12 { 0.0 } else { v.y };
                let az = y.atan2(x);
                if az < 0.0 {
                    az + 2.0 * PI
                } else {
                    az
                }
            })
            .collect()
    }

    /// Polar angle from +z in [0, pi]; zero-length vectors report 0.
    pub fn polar(&self) -> Vec<f64> {
        self.data
            .iter()
            .map(|v| {
                let n = v.norm();
                if n > 0.0 {
                    (v.z / n).clamp(-1.0, 1.0).acos()
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// (azimuth, polar, radial) triples.
    pub fn to_polar(&self) -> Vec<(f64, f64, f64)> {
        let az = self.azimuth();
        let pol = self.polar();
        let r = self.norms();
        az.into_iter()
            .zip(pol)
            .zip(r)
            .map(|((a, p), r)| (a, p, r))
            .collect()
    }

    pub fn neg(&self) -> Vector3d {
        Self {
            data: self.data.iter().map(|v| -v).collect(),
        }
    }

    pub fn sector_mask(&self, sector: &FundamentalSector) -> Vec<bool> {
        self.data.iter().map(|v| sector.contains(v)).collect()
    }

    /// The subset inside the sector, relative order preserved.
    pub fn restrict_to_sector(&self, sector: &FundamentalSector) -> Vector3d {
        let data = self
            .data
            .iter()
            .filter(|v| sector.contains(v))
            .copied()
            .collect();
        Self { data }
    }
}
