use crate::error::{Error, Result};
use crate::rotation::{canonical, sym_eq, QUAT_EQ_TOL};
use crate::vector3d::Vector3d;
use crate::UnitQuat;
use nalgebra as na;
use na::{Unit, Vector3};
use std::cmp::Ordering;
use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::OnceLock;

/// Non-strict slack of the sector half-space inequalities.
pub const SECTOR_EPS: f64 = 1e-9;

/// One point-group element: a proper rotation, or inversion composed with
/// one when `improper` is set.
#[derive(Debug, Clone, Copy)]
pub struct SymOp {
    pub quat: UnitQuat,
    pub improper: bool,
}

impl SymOp {
    pub fn identity() -> Self {
        Self {
            quat: UnitQuat::identity(),
            improper: false,
        }
    }

    pub fn inversion() -> Self {
        Self {
            quat: UnitQuat::identity(),
            improper: true,
        }
    }

    pub fn rotation(axis: Vector3<f64>, angle: f64) -> Self {
        Self {
            quat: UnitQuat::from_axis_angle(&Unit::new_normalize(axis), angle),
            improper: false,
        }
    }

    /// Rotoinversion -n: inversion composed with an n-fold rotation.
    pub fn rotoinversion(axis: Vector3<f64>, angle: f64) -> Self {
        Self {
            quat: UnitQuat::from_axis_angle(&Unit::new_normalize(axis), angle),
            improper: true,
        }
    }

    /// Mirror through the plane with the given normal (= rotoinversion
    /// by pi about it).
    pub fn mirror(normal: Vector3<f64>) -> Self {
        Self::rotoinversion(normal, PI)
    }

    pub fn compose(&self, other: &SymOp) -> SymOp {
        SymOp {
            quat: self.quat * other.quat,
            improper: self.improper ^ other.improper,
        }
    }

    pub fn apply(&self, v: &Vector3<f64>) -> Vector3<f64> {
        let r = self.quat * v;
        if self.improper {
            -r
        } else {
            r
        }
    }

    fn eq_op(&self, other: &SymOp) -> bool {
        self.improper == other.improper && sym_eq(&self.quat, &other.quat, QUAT_EQ_TOL)
    }
}

/// The 11 Laue classes, named by Schoenflies symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Laue {
    Ci,
    C2h,
    D2h,
    C4h,
    D4h,
    S6,
    D3d,
    C6h,
    D6h,
    Th,
    Oh,
}

impl Laue {
    pub const ALL: [Laue; 11] = [
        Laue::Ci,
        Laue::C2h,
        Laue::D2h,
        Laue::C4h,
        Laue::D4h,
        Laue::S6,
        Laue::D3d,
        Laue::C6h,
        Laue::D6h,
        Laue::Th,
        Laue::Oh,
    ];

    /// Hermann-Mauguin name of the centrosymmetric group of the class.
    pub fn name(self) -> &'static str {
        match self {
            Laue::Ci => "-1",
            Laue::C2h => "2/m",
            Laue::D2h => "mmm",
            Laue::C4h => "4/m",
            Laue::D4h => "4/mmm",
            Laue::S6 => "-3",
            Laue::D3d => "-3m",
            Laue::C6h => "6/m",
            Laue::D6h => "6/mmm",
            Laue::Th => "m-3",
            Laue::Oh => "m-3m",
        }
    }

    pub fn point_group(self) -> &'static PointGroup {
        registry()
            .iter()
            .find(|g| g.name == self.name())
            .expect("the registry holds all 11 Laue groups")
    }
}

/// Intersection of half-spaces whose boundaries are great circles; a
/// direction is inside iff it satisfies every inequality (non-strict).
#[derive(Debug, Clone)]
pub struct FundamentalSector {
    normals: Vec<Vector3<f64>>,
}

impl FundamentalSector {
    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    pub fn contains(&self, v: &Vector3<f64>) -> bool {
        self.normals.iter().all(|n| v.dot(n) >= -SECTOR_EPS)
    }
}

/// A crystallographic point group: a closed set of symmetry operations,
/// built once and shared for the whole process.
#[derive(Debug, Clone)]
pub struct PointGroup {
    pub name: &'static str,
    pub schoenflies: &'static str,
    pub laue: Laue,
    elements: Vec<SymOp>,
    proper: Vec<UnitQuat>,
    sector: Option<FundamentalSector>,
}

impl PointGroup {
    /// Number of symmetry operations, improper ones included.
    pub fn order(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[SymOp] {
        &self.elements
    }

    /// The proper-rotation subgroup, the candidate set for zone reduction
    /// and symmetry-aware distances.
    pub fn proper_rotations(&self) -> &[UnitQuat] {
        &self.proper
    }

    pub fn is_laue(&self) -> bool {
        self.name == self.laue.name()
    }

    /// Fundamental sector on the sphere; defined for the 11 Laue groups
    /// only, everything else is an explicit error.
    pub fn fundamental_sector(&self) -> Result<&FundamentalSector> {
        self.sector
            .as_ref()
            .ok_or(Error::NoFundamentalSector { name: self.name })
    }

    /// All symmetric equivalents of every vector, vector-major: the |G|
    /// images of `v[0]` first, then of `v[1]`, and so on.
    pub fn symmetrise(&self, v: &Vector3d) -> Vector3d {
        let mut out = Vec::with_capacity(v.len() * self.elements.len());
        for vec in v.iter() {
            for op in &self.elements {
                out.push(op.apply(vec));
            }
        }
        Vector3d::from_vecs(out)
    }

    /// Like [`symmetrise`](Self::symmetrise) but with duplicates within
    /// `tol` dropped, first occurrence kept. A direction with a trivial
    /// stabilizer keeps all |G| images; one on a symmetry element fewer.
    pub fn symmetrise_unique(&self, v: &Vector3d, tol: f64) -> Vector3d {
        let mut out: Vec<Vector3<f64>> = Vec::new();
        for vec in v.iter() {
            for op in &self.elements {
                let u = op.apply(vec);
                if !out.iter().any(|w| (w - u).norm() <= tol) {
                    out.push(u);
                }
            }
        }
        Vector3d::from_vecs(out)
    }
}

fn contains_op(ops: &[SymOp], op: &SymOp) -> bool {
    ops.iter().any(|o| o.eq_op(op))
}

/// Fixpoint closure of a generator set, deduplicated up to the double
/// cover, signs canonicalized, sorted by the documented total order
/// (proper first, then descending w, x, y, z).
fn close_group(generators: &[SymOp]) -> Vec<SymOp> {
    let mut elems = vec![SymOp::identity()];
    for g in generators {
        if !contains_op(&elems, g) {
            elems.push(*g);
        }
    }
    loop {
        let mut fresh: Vec<SymOp> = Vec::new();
        for a in &elems {
            for b in &elems {
                let c = a.compose(b);
                if !contains_op(&elems, &c) && !contains_op(&fresh, &c) {
                    fresh.push(c);
                }
            }
        }
        if fresh.is_empty() {
            break;
        }
        elems.extend(fresh);
    }
    for e in &mut elems {
        e.quat = canonical(&e.quat);
    }
    elems.sort_by(op_order);
    elems
}

fn op_order(a: &SymOp, b: &SymOp) -> Ordering {
    a.improper
        .cmp(&b.improper)
        .then(b.quat.w.partial_cmp(&a.quat.w).unwrap())
        .then(b.quat.i.partial_cmp(&a.quat.i).unwrap())
        .then(b.quat.j.partial_cmp(&a.quat.j).unwrap())
        .then(b.quat.k.partial_cmp(&a.quat.k).unwrap())
}

// boundary plane through z at azimuth `az`, pointing to smaller azimuths
fn az_ceiling(az: f64) -> Vector3<f64> {
    Vector3::new(az.sin(), -az.cos(), 0.0)
}

// same plane, pointing to larger azimuths
fn az_floor(az: f64) -> Vector3<f64> {
    Vector3::new(-az.sin(), az.cos(), 0.0)
}

fn laue_sector(laue: Laue) -> FundamentalSector {
    let x = Vector3::x();
    let y = Vector3::y();
    let z = Vector3::z();
    let normals = match laue {
        Laue::Ci => vec![z],
        Laue::C2h => vec![z, y],
        Laue::D2h => vec![z, y, x],
        Laue::C4h => vec![z, y, x],
        Laue::D4h => vec![z, y, az_ceiling(PI / 4.0)],
        Laue::S6 => vec![z, y, az_ceiling(2.0 * PI / 3.0)],
        // the trigonal mirror traces sit at azimuth 30 + k*60 degrees, so
        // the sector window must start there, not at zero
        Laue::D3d => vec![z, az_floor(PI / 6.0), az_ceiling(FRAC_PI_2)],
        Laue::C6h => vec![z, y, az_ceiling(PI / 3.0)],
        Laue::D6h => vec![z, y, az_ceiling(PI / 6.0)],
        Laue::Th => vec![
            x,
            y,
            Vector3::new(-1.0, 0.0, 1.0).normalize(),
            Vector3::new(0.0, -1.0, 1.0).normalize(),
        ],
        Laue::Oh => vec![
            y,
            Vector3::new(1.0, -1.0, 0.0).normalize(),
            Vector3::new(-1.0, 0.0, 1.0).normalize(),
        ],
    };
    FundamentalSector { normals }
}

static REGISTRY: OnceLock<Vec<PointGroup>> = OnceLock::new();

fn registry() -> &'static [PointGroup] {
    REGISTRY.get_or_init(build_registry)
}

fn build_registry() -> Vec<PointGroup> {
    let x = Vector3::x();
    let z = Vector3::z();
    let diag = Vector3::new(1.0, 1.0, 1.0);
    let two = PI;
    let three = 2.0 * PI / 3.0;
    let four = FRAC_PI_2;
    let six = PI / 3.0;

    let rot = SymOp::rotation;
    let roto = SymOp::rotoinversion;
    let inv = SymOp::inversion();

    // standard settings: principal axis on z, secondary two-fold on x,
    // cubic three-fold on [111]
    let defs: Vec<(&'static str, &'static str, Laue, Vec<SymOp>)> = vec![
        ("1", "C1", Laue::Ci, vec![]),
        ("-1", "Ci", Laue::Ci, vec![inv]),
        ("2", "C2", Laue::C2h, vec![rot(z, two)]),
        ("m", "Cs", Laue::C2h, vec![SymOp::mirror(z)]),
        ("2/m", "C2h", Laue::C2h, vec![rot(z, two), inv]),
        ("222", "D2", Laue::D2h, vec![rot(z, two), rot(x, two)]),
        ("mm2", "C2v", Laue::D2h, vec![rot(z, two), SymOp::mirror(x)]),
        ("mmm", "D2h", Laue::D2h, vec![rot(z, two), rot(x, two), inv]),
        ("4", "C4", Laue::C4h, vec![rot(z, four)]),
        ("-4", "S4", Laue::C4h, vec![roto(z, four)]),
        ("4/m", "C4h", Laue::C4h, vec![rot(z, four), inv]),
        ("422", "D4", Laue::D4h, vec![rot(z, four), rot(x, two)]),
        ("4mm", "C4v", Laue::D4h, vec![rot(z, four), SymOp::mirror(x)]),
        ("-42m", "D2d", Laue::D4h, vec![roto(z, four), rot(x, two)]),
        ("4/mmm", "D4h", Laue::D4h, vec![rot(z, four), rot(x, two), inv]),
        ("3", "C3", Laue::S6, vec![rot(z, three)]),
        ("-3", "S6", Laue::S6, vec![rot(z, three), inv]),
        ("32", "D3", Laue::D3d, vec![rot(z, three), rot(x, two)]),
        ("3m", "C3v", Laue::D3d, vec![rot(z, three), SymOp::mirror(x)]),
        ("-3m", "D3d", Laue::D3d, vec![rot(z, three), rot(x, two), inv]),
        ("6", "C6", Laue::C6h, vec![rot(z, six)]),
        ("-6", "C3h", Laue::C6h, vec![roto(z, six)]),
        ("6/m", "C6h", Laue::C6h, vec![rot(z, six), inv]),
        ("622", "D6", Laue::D6h, vec![rot(z, six), rot(x, two)]),
        ("6mm", "C6v", Laue::D6h, vec![rot(z, six), SymOp::mirror(x)]),
        ("-62m", "D3h", Laue::D6h, vec![roto(z, six), rot(x, two)]),
        ("6/mmm", "D6h", Laue::D6h, vec![rot(z, six), rot(x, two), inv]),
        ("23", "T", Laue::Th, vec![rot(z, two), rot(diag, three)]),
        ("m-3", "Th", Laue::Th, vec![rot(z, two), rot(diag, three), inv]),
        ("432", "O", Laue::Oh, vec![rot(z, four), rot(diag, three)]),
        ("-43m", "Td", Laue::Oh, vec![roto(z, four), rot(diag, three)]),
        ("m-3m", "Oh", Laue::Oh, vec![rot(z, four), rot(diag, three), inv]),
    ];

    defs.into_iter()
        .map(|(name, schoenflies, laue, gens)| {
            let elements = close_group(&gens);
            let proper = elements
                .iter()
                .filter(|e| !e.improper)
                .map(|e| e.quat)
                .collect();
            let sector = (name == laue.name()).then(|| laue_sector(laue));
            PointGroup {
                name,
                schoenflies,
                laue,
                elements,
                proper,
                sector,
            }
        })
        .collect()
}

/// Look up one of the 32 point groups by Hermann-Mauguin name.
pub fn point_group(name: &str) -> Result<&'static PointGroup> {
    registry()
        .iter()
        .find(|g| g.name == name)
        .ok_or_else(|| Error::UnknownPointGroup { name: name.into() })
}

pub fn point_groups() -> impl Iterator<Item = &'static PointGroup> {
    registry().iter()
}

// International-Tables ranges: (last space group of the range, point group)
const SPACE_GROUP_RANGES: [(u32, &str); 32] = [
    (1, "1"),
    (2, "-1"),
    (5, "2"),
    (9, "m"),
    (15, "2/m"),
    (24, "222"),
    (46, "mm2"),
    (74, "mmm"),
    (80, "4"),
    (82, "-4"),
    (88, "4/m"),
    (98, "422"),
    (110, "4mm"),
    (122, "-42m"),
    (142, "4/mmm"),
    (146, "3"),
    (148, "-3"),
    (155, "32"),
    (161, "3m"),
    (167, "-3m"),
    (173, "6"),
    (174, "-6"),
    (176, "6/m"),
    (182, "622"),
    (186, "6mm"),
    (190, "-62m"),
    (194, "6/mmm"),
    (199, "23"),
    (206, "m-3"),
    (214, "432"),
    (220, "-43m"),
    (230, "m-3m"),
];

/// Parent point group of an International-Tables space group (1..=230).
pub fn space_group_point_group(number: u32) -> Result<&'static PointGroup> {
    if !(1..=230).contains(&number) {
        return Err(Error::SpaceGroupRange { number });
    }
    let name = SPACE_GROUP_RANGES
        .iter()
        .find(|&&(last, _)| number <= last)
        .map(|&(_, name)| name)
        .expect("the table covers 1..=230");
    point_group(name)
}
