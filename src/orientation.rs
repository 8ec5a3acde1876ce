use crate::error::{Error, Result};
use crate::rotation::{canonical, quat_distance, quat_dot, Rotation};
use crate::symmetry::PointGroup;
use crate::{OuterOptions, UnitQuat};
use itertools::iproduct;
use log::info;
use nalgebra::DMatrix;
use std::cmp::Ordering;

/// Knobs of the iterative symmetry-aware mean.
#[derive(Debug, Clone, Copy)]
pub struct MeanOptions {
    /// Reference movement (radians) below which the iteration has settled.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for MeanOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 50,
        }
    }
}

// scalar part of the Hamilton product a*b
#[inline]
fn product_w(a: &UnitQuat, b: &UnitQuat) -> f64 {
    a.w * b.w - a.i * b.i - a.j * b.j - a.k * b.k
}

// min angle over all products x*y, via the max |scalar part| as in the
// classic disorientation search
fn min_equiv_angle(left: &[UnitQuat], right: &[UnitQuat]) -> f64 {
    let mut best = 0.0f64;
    for x in left {
        for y in right {
            best = best.max(product_w(x, y).abs());
        }
    }
    2.0 * best.min(1.0).acos()
}

// total order on sign-canonical quaternions; max w is min rotation angle,
// so taking the lexicographic maximum both minimizes the angle and breaks
// zone-boundary ties deterministically
fn lex_cmp(a: &UnitQuat, b: &UnitQuat) -> Ordering {
    a.w.partial_cmp(&b.w)
        .unwrap()
        .then(a.i.partial_cmp(&b.i).unwrap())
        .then(a.j.partial_cmp(&b.j).unwrap())
        .then(a.k.partial_cmp(&b.k).unwrap())
}

fn reduce_candidates(cands: impl Iterator<Item = UnitQuat>) -> UnitQuat {
    let mut best: Option<UnitQuat> = None;
    for q in cands {
        let q = canonical(&q);
        match best {
            None => best = Some(q),
            Some(b) => {
                if lex_cmp(&q, &b) == Ordering::Greater {
                    best = Some(q);
                }
            }
        }
    }
    best.expect("candidate sets contain at least the identity")
}

// candidate equivalent of q nearest to the reference, same tie-break as
// zone reduction
fn nearest_equivalent(
    q: &UnitQuat,
    reference: &UnitQuat,
    left: &[UnitQuat],
    right: &[UnitQuat],
) -> UnitQuat {
    let mut best: Option<(f64, UnitQuat)> = None;
    for (a, b) in iproduct!(left, right) {
        let cand = canonical(&(a * q * b));
        let score = quat_dot(reference, &cand).abs();
        let better = match &best {
            None => true,
            Some((s, c)) => score > *s || (score == *s && lex_cmp(&cand, c) == Ordering::Greater),
        };
        if better {
            best = Some((score, cand));
        }
    }
    best.expect("candidate sets contain at least the identity").1
}

fn sym_mean(
    qs: &[UnitQuat],
    left: &[UnitQuat],
    right: &[UnitQuat],
    opts: &MeanOptions,
) -> Result<UnitQuat> {
    if qs.is_empty() {
        return Err(Error::EmptyInput {
            what: "mean of an empty set",
        });
    }
    let mut reference = qs[0];
    for _ in 0..opts.max_iterations {
        let mapped: Vec<UnitQuat> = qs
            .iter()
            .map(|q| nearest_equivalent(q, &reference, left, right))
            .collect();
        let updated = Rotation::from_quats(mapped).mean()?;
        let moved = quat_distance(&reference, &updated);
        reference = updated;
        if moved <= opts.tolerance {
            return Ok(reference);
        }
    }
    Err(Error::MeanConvergence {
        iterations: opts.max_iterations,
        last: [reference.w, reference.i, reference.j, reference.k],
    })
}

fn copy_block(out: &mut DMatrix<f64>, row0: usize, block: &DMatrix<f64>) {
    for r in 0..block.nrows() {
        for c in 0..block.ncols() {
            out[(row0 + r, c)] = block[(r, c)];
        }
    }
}

/// A batch of rotations tagged with the point group of the crystal.
/// Two orientations describe the same crystal state iff they are related
/// by left multiplication with a group element.
#[derive(Debug, Clone)]
pub struct Orientation {
    rotation: Rotation,
    symmetry: &'static PointGroup,
}

impl Orientation {
    pub fn new(rotation: Rotation, symmetry: &'static PointGroup) -> Self {
        Self { rotation, symmetry }
    }

    /// Constructor used by phase bookkeeping, which hands symmetries over
    /// as a list; exactly one group is accepted.
    pub fn with_groups(rotation: Rotation, groups: &[&'static PointGroup]) -> Result<Self> {
        match groups {
            &[g] => Ok(Self::new(rotation, g)),
            _ => Err(Error::SymmetryArity {
                expected: 1,
                found: groups.len(),
            }),
        }
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn symmetry(&self) -> &'static PointGroup {
        self.symmetry
    }

    /// Swap the symmetry tag. The rotation data is untouched; only future
    /// reduction and distance semantics change.
    pub fn set_symmetry(&mut self, symmetry: &'static PointGroup) {
        self.symmetry = symmetry;
    }

    pub fn len(&self) -> usize {
        self.rotation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty()
    }

    /// The symmetry-reduced representative of every element: the
    /// equivalent g*o with the smallest rotation angle, boundary ties
    /// resolved by the documented lexicographic order.
    pub fn map_into_symmetry_reduced_zone(&self) -> Orientation {
        let g = self.symmetry.proper_rotations();
        let quats = self
            .rotation
            .quats()
            .iter()
            .map(|q| reduce_candidates(g.iter().map(|s| s * q)))
            .collect();
        Self {
            rotation: Rotation::from_quats(quats),
            symmetry: self.symmetry,
        }
    }

    /// Smallest rotation angle among the symmetric equivalents, per
    /// element.
    pub fn disorientation_angles(&self) -> Vec<f64> {
        let g = self.symmetry.proper_rotations();
        self.rotation
            .quats()
            .iter()
            .map(|q| min_equiv_angle(g, std::slice::from_ref(q)))
            .collect()
    }

    /// Symmetry-aware geodesic distance between elements i and j, as a
    /// dense symmetric matrix with zero diagonal.
    pub fn distance_matrix(&self, opts: &OuterOptions) -> DMatrix<f64> {
        let n = self.len();
        let mut out = DMatrix::zeros(n, n);
        self.distance_matrix_chunks(opts, |row0, block| copy_block(&mut out, row0, block));
        out
    }

    /// Streaming row blocks of [`distance_matrix`](Self::distance_matrix);
    /// peak memory is proportional to `chunk_size * n`.
    pub fn distance_matrix_chunks(
        &self,
        opts: &OuterOptions,
        mut sink: impl FnMut(usize, &DMatrix<f64>),
    ) {
        let g = self.symmetry.proper_rotations();
        let qs = self.rotation.quats();
        let n = qs.len();
        let chunk = opts.chunk_size.max(1);
        let mut done = 0;
        while done < n {
            let rows = chunk.min(n - done);
            let mut block = DMatrix::zeros(rows, n);
            for r in 0..rows {
                let inv = qs[done + r].inverse();
                let left: Vec<UnitQuat> = g.iter().map(|s| inv * s).collect();
                for (c, q) in qs.iter().enumerate() {
                    block[(r, c)] = min_equiv_angle(&left, std::slice::from_ref(q));
                }
            }
            if opts.progress {
                info!("distance matrix rows {}..{} of {}", done, done + rows, n);
            }
            sink(done, &block);
            done += rows;
        }
    }

    /// Symmetry-aware mean: every element is mapped to its equivalent
    /// nearest the running reference, averaged, and the reference updated
    /// until it settles.
    pub fn mean(&self, opts: &MeanOptions) -> Result<UnitQuat> {
        sym_mean(
            self.rotation.quats(),
            self.symmetry.proper_rotations(),
            &[UnitQuat::identity()],
            opts,
        )
    }
}

/// A batch of relative rotations between two crystals, tagged with both
/// point groups. The equivalence class of m is g1 * m * g2.
#[derive(Debug, Clone)]
pub struct Misorientation {
    rotation: Rotation,
    symmetry: (&'static PointGroup, &'static PointGroup),
}

impl Misorientation {
    pub fn new(
        rotation: Rotation,
        symmetry: (&'static PointGroup, &'static PointGroup),
    ) -> Self {
        Self { rotation, symmetry }
    }

    /// Exactly two groups are accepted.
    pub fn with_groups(rotation: Rotation, groups: &[&'static PointGroup]) -> Result<Self> {
        match groups {
            &[g1, g2] => Ok(Self::new(rotation, (g1, g2))),
            _ => Err(Error::SymmetryArity {
                expected: 2,
                found: groups.len(),
            }),
        }
    }

    /// Relative rotation o2 * o1^-1 between two orientation sets; carries
    /// the group pair (G2, G1) so that the equivalence g2 * m * g1 covers
    /// both crystals.
    pub fn between(o1: &Orientation, o2: &Orientation) -> Result<Misorientation> {
        let rotation = o2.rotation().compose(&o1.rotation().inverse())?;
        Ok(Self::new(rotation, (o2.symmetry(), o1.symmetry())))
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn symmetry(&self) -> (&'static PointGroup, &'static PointGroup) {
        self.symmetry
    }

    pub fn set_symmetry(&mut self, symmetry: (&'static PointGroup, &'static PointGroup)) {
        self.symmetry = symmetry;
    }

    pub fn len(&self) -> usize {
        self.rotation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty()
    }

    fn proper_pair(&self) -> (&[UnitQuat], &[UnitQuat]) {
        (
            self.symmetry.0.proper_rotations(),
            self.symmetry.1.proper_rotations(),
        )
    }

    /// The representative g1*m*g2 with the smallest rotation angle,
    /// boundary ties resolved by the documented lexicographic order.
    pub fn map_into_symmetry_reduced_zone(&self) -> Misorientation {
        let (g1, g2) = self.proper_pair();
        let quats = self
            .rotation
            .quats()
            .iter()
            .map(|m| reduce_candidates(iproduct!(g1, g2).map(|(a, b)| a * m * b)))
            .collect();
        Self {
            rotation: Rotation::from_quats(quats),
            symmetry: self.symmetry,
        }
    }

    /// Disorientation angle: the minimum rotation angle over all
    /// g1*m*g2 equivalents, per element.
    pub fn disorientation_angles(&self) -> Vec<f64> {
        let (g1, g2) = self.proper_pair();
        self.rotation
            .quats()
            .iter()
            .map(|m| {
                let right: Vec<UnitQuat> = g2.iter().map(|b| m * b).collect();
                min_equiv_angle(g1, &right)
            })
            .collect()
    }

    /// Keep only elements whose disorientation angle reaches `threshold`
    /// (radians); returns the filtered set and the retained indices.
    /// A pure predicate: no reduction is applied to the survivors.
    pub fn filter_by_min_angle(&self, threshold: f64) -> (Misorientation, Vec<usize>) {
        let angles = self.disorientation_angles();
        let keep: Vec<usize> = angles
            .iter()
            .enumerate()
            .filter(|(_, a)| **a >= threshold)
            .map(|(i, _)| i)
            .collect();
        let quats = keep.iter().map(|&i| self.rotation.quats()[i]).collect();
        (
            Self {
                rotation: Rotation::from_quats(quats),
                symmetry: self.symmetry,
            },
            keep,
        )
    }

    /// Symmetry-aware distance d(m_i, m_j) = min angle(m_i^-1 a m_j b)
    /// over (a, b) in G1 x G2, the geodesic metric of the quotient space.
    pub fn distance_matrix(&self, opts: &OuterOptions) -> DMatrix<f64> {
        let n = self.len();
        let mut out = DMatrix::zeros(n, n);
        self.distance_matrix_chunks(opts, |row0, block| copy_block(&mut out, row0, block));
        out
    }

    /// Streaming row blocks of [`distance_matrix`](Self::distance_matrix).
    pub fn distance_matrix_chunks(
        &self,
        opts: &OuterOptions,
        mut sink: impl FnMut(usize, &DMatrix<f64>),
    ) {
        let (g1, g2) = self.proper_pair();
        let qs = self.rotation.quats();
        let n = qs.len();
        // right-hand candidates m_j * b, shared by every row
        let right: Vec<Vec<UnitQuat>> = qs
            .iter()
            .map(|m| g2.iter().map(|b| m * b).collect())
            .collect();
        let chunk = opts.chunk_size.max(1);
        let mut done = 0;
        while done < n {
            let rows = chunk.min(n - done);
            let mut block = DMatrix::zeros(rows, n);
            for r in 0..rows {
                let inv = qs[done + r].inverse();
                let left: Vec<UnitQuat> = g1.iter().map(|a| inv * a).collect();
                for (c, rhs) in right.iter().enumerate() {
                    block[(r, c)] = min_equiv_angle(&left, rhs);
                }
            }
            if opts.progress {
                info!("distance matrix rows {}..{} of {}", done, done + rows, n);
            }
            sink(done, &block);
            done += rows;
        }
    }

    /// Symmetry-aware mean over the two-sided equivalence class.
    pub fn mean(&self, opts: &MeanOptions) -> Result<UnitQuat> {
        let (g1, g2) = self.proper_pair();
        sym_mean(self.rotation.quats(), g1, g2, opts)
    }
}
