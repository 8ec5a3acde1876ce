use crate::error::{Error, Result};
use crate::vector3d::Vector3d;
use nalgebra::Vector3;
use rand::prelude::*;
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::ops::Range;
use std::str::FromStr;

/// Spherical sampling strategies. All but `Random` are deterministic:
/// identical inputs produce the identical mesh in construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshMethod {
    IcosahedralMesh,
    SpherifiedCube,
    HexagonalLattice,
    EqualArea,
    Random,
}

impl MeshMethod {
    pub fn name(self) -> &'static str {
        match self {
            MeshMethod::IcosahedralMesh => "icosahedral_mesh",
            MeshMethod::SpherifiedCube => "spherified_cube",
            MeshMethod::HexagonalLattice => "hexagonal_lattice",
            MeshMethod::EqualArea => "equal_area",
            MeshMethod::Random => "random",
        }
    }
}

impl FromStr for MeshMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "icosahedral_mesh" => Ok(MeshMethod::IcosahedralMesh),
            "spherified_cube" => Ok(MeshMethod::SpherifiedCube),
            "hexagonal_lattice" => Ok(MeshMethod::HexagonalLattice),
            "equal_area" => Ok(MeshMethod::EqualArea),
            "random" => Ok(MeshMethod::Random),
            _ => Err(Error::UnknownMethod { name: s.into() }),
        }
    }
}

/// A near-uniform direction set; `weights` carries per-cell solid angles
/// when the method guarantees them (equal-area sampling).
#[derive(Debug, Clone)]
pub struct S2Mesh {
    pub points: Vector3d,
    pub weights: Option<Vec<f64>>,
}

/// Sample the unit sphere at the given angular resolution (degrees).
///
/// Deterministic methods keep the maximum nearest-neighbor gap below the
/// resolution; for `Random` the resolution instead fixes the point count
/// through the spherical-cap area relation, bounding the expected mean
/// nearest-neighbor angle. The generator is only consumed by `Random`.
pub fn sample_s2(resolution: f64, method: MeshMethod, rng: &mut impl Rng) -> Result<S2Mesh> {
    if !(resolution > 0.0 && resolution <= 180.0) {
        return Err(Error::BadResolution { resolution });
    }
    let res = resolution.to_radians();
    let points = match method {
        MeshMethod::IcosahedralMesh => icosahedral(res),
        MeshMethod::SpherifiedCube => spherified_cube(res),
        MeshMethod::HexagonalLattice => hexagonal(res),
        MeshMethod::EqualArea => {
            let grid = EqualAreaGrid::new(res);
            return Ok(S2Mesh {
                points: grid.centers(),
                weights: Some(grid.solid_angles()),
            });
        }
        MeshMethod::Random => random_mesh(res, rng),
    };
    Ok(S2Mesh {
        points,
        weights: None,
    })
}

const DEDUP_TOL: f64 = 1e-9;

// mesh points collected with duplicate suppression (shared face edges and
// vertices); spatial hash keyed on coarse cells, exact check within
struct DedupSet {
    cell: f64,
    seen: HashMap<(i64, i64, i64), Vec<usize>>,
    points: Vec<Vector3<f64>>,
}

impl DedupSet {
    fn new() -> Self {
        Self {
            cell: 1e-6,
            seen: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn key(&self, v: &Vector3<f64>) -> (i64, i64, i64) {
        (
            (v.x / self.cell).floor() as i64,
            (v.y / self.cell).floor() as i64,
            (v.z / self.cell).floor() as i64,
        )
    }

    fn insert(&mut self, v: Vector3<f64>) {
        let (kx, ky, kz) = self.key(&v);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(idxs) = self.seen.get(&(kx + dx, ky + dy, kz + dz)) {
                        for &i in idxs {
                            if (self.points[i] - v).norm() <= DEDUP_TOL {
                                return;
                            }
                        }
                    }
                }
            }
        }
        self.seen.entry((kx, ky, kz)).or_default().push(self.points.len());
        self.points.push(v);
    }

    fn into_points(self) -> Vec<Vector3<f64>> {
        self.points
    }
}

fn icosahedral(res: f64) -> Vector3d {
    // golden-ratio vertex table, circumradius 1
    let phi = (1.0 + 5.0f64.sqrt()) * 0.5;
    let inv = 1.0 / (1.0 + phi * phi).sqrt();
    let (a, b) = (inv, phi * inv);
    let verts: [Vector3<f64>; 12] = [
        Vector3::new(-a, b, 0.0),
        Vector3::new(a, b, 0.0),
        Vector3::new(-a, -b, 0.0),
        Vector3::new(a, -b, 0.0),
        Vector3::new(0.0, -a, b),
        Vector3::new(0.0, a, b),
        Vector3::new(0.0, -a, -b),
        Vector3::new(0.0, a, -b),
        Vector3::new(b, 0.0, -a),
        Vector3::new(b, 0.0, a),
        Vector3::new(-b, 0.0, -a),
        Vector3::new(-b, 0.0, a),
    ];
    const FACES: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    // the flat grid step stretches by at most 1/(face-plane distance)
    // once projected onto the sphere
    let chord = (verts[0] - verts[11]).norm();
    let face_dist = (1.0 - chord * chord / 3.0).sqrt();
    let n = (chord / (face_dist * res)).ceil().max(1.0) as usize;
    let mut dedup = DedupSet::new();
    for f in FACES {
        let (va, vb, vc) = (verts[f[0]], verts[f[1]], verts[f[2]]);
        for i in 0..=n {
            for j in 0..=(n - i) {
                let k = n - i - j;
                let p = va * i as f64 + vb * j as f64 + vc * k as f64;
                dedup.insert(p.normalize());
            }
        }
    }
    Vector3d::from_vecs(dedup.into_points())
}

fn spherified_cube(res: f64) -> Vector3d {
    let n = (FRAC_PI_2 / res).ceil().max(1.0) as usize;
    // tangent grid: equal angular steps through each face center
    let ts: Vec<f64> = (0..=n)
        .map(|i| (-FRAC_PI_4 + i as f64 * FRAC_PI_2 / n as f64).tan())
        .collect();
    let mut dedup = DedupSet::new();
    for face in 0..6 {
        for &u in &ts {
            for &v in &ts {
                let p = match face {
                    0 => Vector3::new(1.0, u, v),
                    1 => Vector3::new(-1.0, u, v),
                    2 => Vector3::new(u, 1.0, v),
                    3 => Vector3::new(u, -1.0, v),
                    4 => Vector3::new(u, v, 1.0),
                    _ => Vector3::new(u, v, -1.0),
                };
                dedup.insert(p.normalize());
            }
        }
    }
    Vector3d::from_vecs(dedup.into_points())
}

fn hexagonal(res: f64) -> Vector3d {
    // one Lambert equal-area disk per hemisphere; the projection stretches
    // planar distances by at most 1/cos(pi/4) inside a hemisphere, so the
    // lattice spacing is shrunk by that factor up front
    let d = res * FRAC_PI_4.cos();
    let row = d * 3.0f64.sqrt() / 2.0;
    let rmax = 2.0f64.sqrt();
    let jmax = (rmax / row).ceil() as i64 + 1;
    let imax = (rmax / d).ceil() as i64 + 1;
    let mut dedup = DedupSet::new();
    for upper in [true, false] {
        for j in -jmax..=jmax {
            for i in -imax..=imax {
                let px = d * (i as f64 + 0.5 * j.rem_euclid(2) as f64);
                let py = row * j as f64;
                let r = px.hypot(py);
                if r > rmax + 1e-12 {
                    continue;
                }
                let polar = 2.0 * (r / 2.0).min(1.0).asin();
                let az = py.atan2(px);
                let (sp, cp) = polar.sin_cos();
                let z = if upper { cp } else { -cp };
                dedup.insert(Vector3::new(az.cos() * sp, az.sin() * sp, z));
            }
        }
    }
    Vector3d::from_vecs(dedup.into_points())
}

fn random_mesh(res: f64, rng: &mut impl Rng) -> Vector3d {
    // a cap of half-angle res covers 2*pi*(1 - cos res) of the 4*pi sphere
    let n = (2.0 / (1.0 - res.cos())).round().max(1.0) as usize;
    let data = (0..n)
        .map(|_| {
            let z: f64 = rng.gen_range(-1.0..1.0);
            let az = rng.gen_range(0.0..2.0 * PI);
            let s = (1.0 - z * z).sqrt();
            Vector3::new(az.cos() * s, az.sin() * s, z)
        })
        .collect();
    Vector3d::from_vecs(data)
}

/// Ring grid over the sphere with per-ring azimuthal counts proportional
/// to sin(polar), giving cells of (near) equal solid angle. The ring count
/// is even so the equator is a cell boundary and hemispheres split clean.
#[derive(Debug, Clone)]
pub struct EqualAreaGrid {
    band: f64,
    ring_counts: Vec<usize>,
    offsets: Vec<usize>,
    n_cells: usize,
}

impl EqualAreaGrid {
    /// `res` is the target angular cell size in radians.
    pub fn new(res: f64) -> Self {
        let rings = 2 * ((PI / (2.0 * res)).ceil() as usize).max(1);
        let band = PI / rings as f64;
        let mut ring_counts = Vec::with_capacity(rings);
        for k in 0..rings {
            let theta_c = (k as f64 + 0.5) * band;
            let m = (2.0 * PI * theta_c.sin() / res).ceil() as usize;
            ring_counts.push(m.max(1));
        }
        let mut offsets = Vec::with_capacity(rings + 1);
        let mut acc = 0;
        for &c in &ring_counts {
            offsets.push(acc);
            acc += c;
        }
        offsets.push(acc);
        Self {
            band,
            ring_counts,
            offsets,
            n_cells: acc,
        }
    }

    pub fn len(&self) -> usize {
        self.n_cells
    }

    pub fn is_empty(&self) -> bool {
        self.n_cells == 0
    }

    pub fn rings(&self) -> usize {
        self.ring_counts.len()
    }

    /// Polar height of every ring.
    pub fn band(&self) -> f64 {
        self.band
    }

    pub fn ring_cells(&self, k: usize) -> Range<usize> {
        self.offsets[k]..self.offsets[k + 1]
    }

    /// Polar band covered by ring k.
    pub fn ring_band(&self, k: usize) -> (f64, f64) {
        (k as f64 * self.band, (k + 1) as f64 * self.band)
    }

    /// Cell holding the given direction; a zero-length vector lands in the
    /// north-pole cell (clamped edge case, not an error).
    pub fn cell_index(&self, v: &Vector3<f64>) -> usize {
        let n = v.norm();
        let polar = if n > 0.0 {
            (v.z / n).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };
        let k = ((polar / self.band) as usize).min(self.rings() - 1);
        let m = self.ring_counts[k];
        let mut az = v.y.atan2(v.x);
        if az < 0.0 {
            az += 2.0 * PI;
        }
        let j = ((az / (2.0 * PI) * m as f64) as usize).min(m - 1);
        self.offsets[k] + j
    }

    pub fn centers_vec(&self) -> Vec<Vector3<f64>> {
        let mut out = Vec::with_capacity(self.n_cells);
        for k in 0..self.rings() {
            let theta = (k as f64 + 0.5) * self.band;
            let (st, ct) = theta.sin_cos();
            let m = self.ring_counts[k];
            for j in 0..m {
                let az = (j as f64 + 0.5) * 2.0 * PI / m as f64;
                out.push(Vector3::new(az.cos() * st, az.sin() * st, ct));
            }
        }
        out
    }

    pub fn centers(&self) -> Vector3d {
        Vector3d::from_vecs(self.centers_vec())
    }

    /// Exact per-cell solid angles; equal within the per-ring rounding.
    pub fn solid_angles(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_cells);
        for k in 0..self.rings() {
            let (t0, t1) = self.ring_band(k);
            let m = self.ring_counts[k];
            let cell = (t0.cos() - t1.cos()) * 2.0 * PI / m as f64;
            for _ in 0..m {
                out.push(cell);
            }
        }
        out
    }

    /// Cells of the upper hemisphere (polar below pi/2).
    pub fn upper_cells(&self) -> Range<usize> {
        0..self.offsets[self.rings() / 2]
    }

    /// Cells of the lower hemisphere.
    pub fn lower_cells(&self) -> Range<usize> {
        self.offsets[self.rings() / 2]..self.n_cells
    }
}
