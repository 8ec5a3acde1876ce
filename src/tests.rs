use crate::*;
use approx::assert_abs_diff_eq;
use nalgebra::{Unit, Vector3};
use rand_pcg::Pcg64;
use std::f64::consts::{FRAC_PI_2, PI};

fn random_dirs(n: usize, rng: &mut impl Rng) -> Vector3d {
    Vector3d::from_vecs(
        (0..n)
            .map(|_| {
                let z: f64 = rng.gen_range(-1.0..1.0);
                let az = rng.gen_range(0.0..2.0 * PI);
                let s = (1.0 - z * z).sqrt();
                Vector3::new(az.cos() * s, az.sin() * s, z)
            })
            .collect(),
    )
}

fn small_rotation(max_angle: f64, rng: &mut impl Rng) -> UnitQuat {
    let axis = Unit::new_normalize(random_dirs(1, rng).vecs()[0]);
    UnitQuat::from_axis_angle(&axis, rng.gen_range(0.0..max_angle))
}

#[test]
fn test_inverse_compose_is_identity() {
    let mut rng = Pcg64::seed_from_u64(0);
    let r = Rotation::random(1000, &mut rng);
    for q in r.iter() {
        assert_abs_diff_eq!(rotation_angle(&(q.inverse() * q)), 0.0, epsilon = 1e-7);
    }
}

#[test]
fn test_double_cover_distance_is_zero() {
    let mut rng = Pcg64::seed_from_u64(1);
    for q in Rotation::random(1000, &mut rng).iter() {
        let neg = UnitQuat::new_unchecked(-*q.quaternion());
        assert_abs_diff_eq!(quat_distance(q, &neg), 0.0, epsilon = 1e-7);
        assert!(sym_eq(q, &neg, 1e-12));
    }
}

#[test]
fn test_euler_quaternion_round_trip() {
    let mut rng = Pcg64::seed_from_u64(2);
    for _ in 0..100_000 {
        let angs = EulerAngles::random(&mut rng);
        let q: UnitQuat = angs.into();
        let back: UnitQuat = EulerAngles::from(q).into();
        assert!(sym_eq(&q, &back, 1e-10), "{:?}", angs);
    }
    // degenerate cap_phi: the round trip must still reproduce the rotation
    for &cap_phi in &[0.0, PI] {
        let angs = EulerAngles::new(1.0, cap_phi, 2.0);
        let q: UnitQuat = angs.into();
        let back: UnitQuat = EulerAngles::from(q).into();
        assert!(sym_eq(&q, &back, 1e-10));
    }
}

#[test]
fn test_bunge_convention_fixed_values() {
    let q: UnitQuat = EulerAngles::from_degrees(90.0, 0.0, 0.0).into();
    let expect = UnitQuat::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
    assert!(sym_eq(&q, &expect, 1e-12));

    let q: UnitQuat = EulerAngles::from_degrees(0.0, 90.0, 0.0).into();
    let expect = UnitQuat::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
    assert!(sym_eq(&q, &expect, 1e-12));

    // intrinsic z-x-z composition
    let q: UnitQuat = EulerAngles::from_degrees(30.0, 40.0, 50.0).into();
    let expect = UnitQuat::from_axis_angle(&Vector3::z_axis(), 30f64.to_radians())
        * UnitQuat::from_axis_angle(&Vector3::x_axis(), 40f64.to_radians())
        * UnitQuat::from_axis_angle(&Vector3::z_axis(), 50f64.to_radians());
    assert!(sym_eq(&q, &expect, 1e-12));
}

#[test]
fn test_axis_angle_round_trip() {
    let mut rng = Pcg64::seed_from_u64(3);
    let pairs: Vec<([f64; 3], f64)> = (0..200)
        .map(|_| {
            let v = random_dirs(1, &mut rng).vecs()[0];
            ([v.x, v.y, v.z], rng.gen_range(0.01..PI - 0.01))
        })
        .collect();
    let r = Rotation::from_axis_angle(&pairs);
    let angles = r.angles();
    let axes = r.axes();
    for i in 0..pairs.len() {
        assert_abs_diff_eq!(angles[i], pairs[i].1, epsilon = 1e-9);
        let expect = Vector3::new(pairs[i].0[0], pairs[i].0[1], pairs[i].0[2]);
        assert!((axes.vecs()[i] - expect).norm() < 1e-9);
    }
    // zero axis is the clamped identity, not an error
    let r = Rotation::from_axis_angle(&[([0.0, 0.0, 0.0], 1.0)]);
    assert_abs_diff_eq!(r.angles()[0], 0.0, epsilon = 1e-12);
}

#[test]
fn test_matrix_round_trip() {
    let mut rng = Pcg64::seed_from_u64(4);
    let r = Rotation::random(200, &mut rng);
    let back = Rotation::from_matrix(&r.to_matrix()).unwrap();
    for (a, b) in r.iter().zip(back.iter()) {
        assert!(sym_eq(a, b, 1e-9));
    }
    // a reflection is rejected
    let m = nalgebra::Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
    assert!(matches!(
        Rotation::from_matrix(&[m]),
        Err(Error::NotARotationMatrix { .. })
    ));
}

#[test]
fn test_wxyz_normalization() {
    assert!(matches!(
        Rotation::from_wxyz(&[[0.9, 0.0, 0.0, 0.0]]),
        Err(Error::NonUnitQuaternion { .. })
    ));
    let r = Rotation::from_wxyz(&[[1.0 + 1e-9, 0.0, 0.0, 0.0]]).unwrap();
    assert!(sym_eq(&r.quats()[0], &UnitQuat::identity(), 1e-12));
}

#[test]
fn test_compose_shapes_and_broadcast() {
    let a = Rotation::identity(3);
    let b = Rotation::identity(2);
    assert!(matches!(
        a.compose(&b),
        Err(Error::ShapeMismatch { left: 3, right: 2 })
    ));
    assert_eq!(a.compose(&Rotation::identity(1)).unwrap().len(), 3);

    let mut rng = Pcg64::seed_from_u64(5);
    let x = Rotation::random(2, &mut rng);
    let y = Rotation::random(3, &mut rng);
    let outer = x.outer_compose(&y);
    assert_eq!(outer.len(), 6);
    for i in 0..2 {
        for j in 0..3 {
            let expect = x.quats()[i] * y.quats()[j];
            assert!(sym_eq(&outer.quats()[i * 3 + j], &expect, 1e-12));
        }
    }
}

#[test]
fn test_apply_rotates_vectors() {
    let r = Rotation::from_axis_angle(&[([1.0, 0.0, 0.0], FRAC_PI_2)]);
    let v = r.apply(&Vector3d::zvector()).unwrap();
    assert!((v.vecs()[0] - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-12);
}

#[test]
fn test_outer_distance_matches_scalar_and_chunking() {
    let mut rng = Pcg64::seed_from_u64(6);
    let a = Rotation::random(7, &mut rng);
    let b = Rotation::random(5, &mut rng);
    let full = a.outer_distance(&b, &OuterOptions::default());
    let tiny = a.outer_distance(
        &b,
        &OuterOptions {
            chunk_size: 2,
            progress: false,
        },
    );
    assert_eq!(full, tiny);
    for i in 0..7 {
        for j in 0..5 {
            assert_abs_diff_eq!(
                full[(i, j)],
                quat_distance(&a.quats()[i], &b.quats()[j]),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn test_quaternion_mean_recovers_cluster() {
    let mut rng = Pcg64::seed_from_u64(7);
    let base: UnitQuat = EulerAngles::random(&mut rng).into();
    let quats: Vec<UnitQuat> = (0..50)
        .map(|_| small_rotation(0.02, &mut rng) * base)
        .collect();
    let mean = Rotation::from_quats(quats.clone()).mean().unwrap();
    assert!(quat_distance(&mean, &base) < 0.03);

    // flipping signs must not move the mean
    let flipped: Vec<UnitQuat> = quats
        .iter()
        .enumerate()
        .map(|(i, q)| {
            if i % 2 == 0 {
                UnitQuat::new_unchecked(-*q.quaternion())
            } else {
                *q
            }
        })
        .collect();
    let mean2 = Rotation::from_quats(flipped).mean().unwrap();
    assert!(sym_eq(&mean, &mean2, 1e-9));

    assert!(matches!(
        Rotation::from_quats(vec![]).mean(),
        Err(Error::EmptyInput { .. })
    ));
}

#[test]
fn test_point_group_orders() {
    let expected = [
        ("1", 1),
        ("-1", 2),
        ("2", 2),
        ("m", 2),
        ("2/m", 4),
        ("222", 4),
        ("mm2", 4),
        ("mmm", 8),
        ("4", 4),
        ("-4", 4),
        ("4/m", 8),
        ("422", 8),
        ("4mm", 8),
        ("-42m", 8),
        ("4/mmm", 16),
        ("3", 3),
        ("-3", 6),
        ("32", 6),
        ("3m", 6),
        ("-3m", 12),
        ("6", 6),
        ("-6", 6),
        ("6/m", 12),
        ("622", 12),
        ("6mm", 12),
        ("-62m", 12),
        ("6/mmm", 24),
        ("23", 12),
        ("m-3", 24),
        ("432", 24),
        ("-43m", 24),
        ("m-3m", 48),
    ];
    assert_eq!(point_groups().count(), 32);
    for (name, order) in expected {
        let g = point_group(name).unwrap();
        assert_eq!(g.order(), order, "group {}", name);
        // identity leads the documented element order
        let first = &g.elements()[0];
        assert!(!first.improper);
        assert_abs_diff_eq!(first.quat.w, 1.0, epsilon = 1e-12);
    }
    assert_eq!(point_group("m-3m").unwrap().proper_rotations().len(), 24);
    assert_eq!(point_group("-43m").unwrap().proper_rotations().len(), 12);
    assert_eq!(point_group("-3m").unwrap().proper_rotations().len(), 6);
    assert_eq!(point_group("m").unwrap().proper_rotations().len(), 1);
    assert!(matches!(
        point_group("5"),
        Err(Error::UnknownPointGroup { .. })
    ));
}

#[test]
fn test_laue_classes() {
    assert_eq!(point_group("432").unwrap().laue, Laue::Oh);
    assert_eq!(point_group("3m").unwrap().laue, Laue::D3d);
    assert!(point_group("m-3m").unwrap().is_laue());
    assert!(!point_group("432").unwrap().is_laue());
    for g in point_groups() {
        let laue = g.laue.point_group();
        let centro = g
            .elements()
            .iter()
            .any(|op| op.improper && rotation_angle(&op.quat) < 1e-9);
        // the Laue group is the centrosymmetric closure
        assert_eq!(laue.order(), if centro { g.order() } else { 2 * g.order() });
        for q in g.proper_rotations() {
            assert!(laue.proper_rotations().iter().any(|p| sym_eq(p, q, 1e-9)));
        }
    }
}

#[test]
fn test_space_group_table() {
    assert_eq!(space_group_point_group(1).unwrap().name, "1");
    assert_eq!(space_group_point_group(2).unwrap().name, "-1");
    assert_eq!(space_group_point_group(62).unwrap().name, "mmm");
    assert_eq!(space_group_point_group(143).unwrap().name, "3");
    assert_eq!(space_group_point_group(167).unwrap().name, "-3m");
    assert_eq!(space_group_point_group(186).unwrap().name, "6mm");
    assert_eq!(space_group_point_group(194).unwrap().name, "6/mmm");
    assert_eq!(space_group_point_group(225).unwrap().name, "m-3m");
    assert_eq!(space_group_point_group(230).unwrap().name, "m-3m");
    assert!(matches!(
        space_group_point_group(0),
        Err(Error::SpaceGroupRange { .. })
    ));
    assert!(matches!(
        space_group_point_group(231),
        Err(Error::SpaceGroupRange { .. })
    ));
}

#[test]
fn test_fundamental_sector_membership() {
    let oh = point_group("m-3m").unwrap();
    let fs = oh.fundamental_sector().unwrap();
    assert!(fs.contains(&Vector3::new(0.3, 0.2, 0.9)));
    assert!(!fs.contains(&Vector3::new(0.2, 0.3, 0.9)));
    // boundary is non-strict
    assert!(fs.contains(&Vector3::new(0.0, 0.0, 1.0)));

    assert!(matches!(
        point_group("432").unwrap().fundamental_sector(),
        Err(Error::NoFundamentalSector { name: "432" })
    ));
    let with_sector = point_groups()
        .filter(|g| g.fundamental_sector().is_ok())
        .count();
    assert_eq!(with_sector, 11);
}

#[test]
fn test_sector_holds_one_orbit_member() {
    // a fundamental sector contains exactly one symmetric equivalent of a
    // generic direction, for every Laue class
    let mut rng = Pcg64::seed_from_u64(8);
    for laue in Laue::ALL {
        let g = laue.point_group();
        let fs = g.fundamental_sector().unwrap();
        for _ in 0..50 {
            let v = random_dirs(1, &mut rng);
            let orbit = g.symmetrise(&v);
            let inside = orbit.sector_mask(fs).iter().filter(|&&b| b).count();
            assert_eq!(inside, 1, "laue {:?}, direction {:?}", laue, v.vecs()[0]);
        }
    }
}

#[test]
fn test_sector_filter_preserves_order() {
    let fs = point_group("m-3m").unwrap().fundamental_sector().unwrap();
    let v = Vector3d::from_xyz(&[
        [0.3, 0.2, 0.9],
        [-0.5, 0.1, 0.2],
        [0.25, 0.1, 0.95],
        [0.2, 0.3, 0.9],
    ]);
    let kept = v.restrict_to_sector(fs);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept.vecs()[0], v.vecs()[0]);
    assert_eq!(kept.vecs()[1], v.vecs()[2]);
}

#[test]
fn test_symmetrise_unique_counts() {
    let d3d = point_group("-3m").unwrap();
    let generic = Vector3d::from_xyz(&[[0.31, 0.47, 0.82]]);
    assert_eq!(d3d.symmetrise(&generic).len(), 12);
    assert_eq!(d3d.symmetrise_unique(&generic, 1e-6).len(), 12);
    // [1,0,0] sits on a two-fold axis of -3m, half the images coincide
    assert_eq!(d3d.symmetrise_unique(&Vector3d::xvector(), 1e-6).len(), 6);

    let oh = point_group("m-3m").unwrap();
    assert_eq!(oh.symmetrise_unique(&generic, 1e-6).len(), 48);
    assert_eq!(oh.symmetrise_unique(&Vector3d::zvector(), 1e-6).len(), 6);
}

#[test]
fn test_symmetrised_axis_angles_are_reproducible() {
    // the orbit of [1,0,0] under -3m is the equatorial hexagon: nearest
    // distinct members are 60 degrees apart
    let d3d = point_group("-3m").unwrap();
    let orbit = d3d.symmetrise_unique(&Vector3d::xvector(), 1e-6);
    assert_eq!(orbit.len(), 6);
    let mut closest = f64::INFINITY;
    for i in 0..orbit.len() {
        for j in 0..orbit.len() {
            if i != j {
                let a = orbit.vecs()[i].dot(&orbit.vecs()[j]).clamp(-1.0, 1.0).acos();
                closest = closest.min(a);
            }
        }
    }
    assert_abs_diff_eq!(closest, PI / 3.0, epsilon = 1e-9);
}

#[test]
fn test_zone_reduction_idempotent_and_bounded() {
    let mut rng = Pcg64::seed_from_u64(9);
    let g = point_group("m-3m").unwrap();
    let o = Orientation::new(Rotation::random(100, &mut rng), g);
    let reduced = o.map_into_symmetry_reduced_zone();
    let twice = reduced.map_into_symmetry_reduced_zone();
    for (a, b) in reduced.rotation().iter().zip(twice.rotation().iter()) {
        assert!(sym_eq(a, b, 1e-9));
    }
    // reduced angles match the disorientation search and stay below the
    // cubic bound of 62.8 degrees
    let angles = reduced.rotation().angles();
    let diso = o.disorientation_angles();
    for (a, d) in angles.iter().zip(&diso) {
        assert_abs_diff_eq!(*a, *d, epsilon = 1e-9);
        assert!(*a <= 62.81f64.to_radians());
    }
}

#[test]
fn test_zone_boundary_tie_break() {
    // exact two-candidate tie: a 90 degree z-rotation under the group 2
    // reduces to itself or its inverse at identical angle; the documented
    // lexicographic order picks the +k representative
    let g = point_group("2").unwrap();
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let o = Orientation::new(Rotation::from_wxyz(&[[h, 0.0, 0.0, h]]).unwrap(), g);
    let reduced = o.map_into_symmetry_reduced_zone();
    let q = reduced.rotation().quats()[0];
    assert_abs_diff_eq!(rotation_angle(&q), FRAC_PI_2, epsilon = 1e-9);
    assert!(q.k > 0.0);
}

#[test]
fn test_orientation_distance_matrix_properties() {
    let mut rng = Pcg64::seed_from_u64(10);
    let g = point_group("m-3m").unwrap();
    let o = Orientation::new(Rotation::random(8, &mut rng), g);
    let d = o.distance_matrix(&OuterOptions::default());
    for i in 0..8 {
        assert_abs_diff_eq!(d[(i, i)], 0.0, epsilon = 1e-7);
        for j in 0..8 {
            assert_abs_diff_eq!(d[(i, j)], d[(j, i)], epsilon = 1e-9);
            for k in 0..8 {
                assert!(d[(i, j)] <= d[(i, k)] + d[(k, j)] + 1e-9);
            }
        }
    }
    // chunking is invisible in the output
    let chunked = o.distance_matrix(&OuterOptions {
        chunk_size: 3,
        progress: false,
    });
    assert_eq!(d, chunked);
}

#[test]
fn test_misorientation_distance_matrix_properties() {
    let mut rng = Pcg64::seed_from_u64(11);
    let d6 = point_group("622").unwrap();
    let m = Misorientation::new(Rotation::random(6, &mut rng), (d6, d6));
    let d = m.distance_matrix(&OuterOptions::default());
    for i in 0..6 {
        assert_abs_diff_eq!(d[(i, i)], 0.0, epsilon = 1e-7);
        for j in 0..6 {
            assert_abs_diff_eq!(d[(i, j)], d[(j, i)], epsilon = 1e-9);
            for k in 0..6 {
                assert!(d[(i, j)] <= d[(i, k)] + d[(k, j)] + 1e-9);
            }
        }
    }
    let chunked = m.distance_matrix(&OuterOptions {
        chunk_size: 2,
        progress: false,
    });
    assert_eq!(d, chunked);

    // hexagonal-hexagonal disorientations stay below 93.9 degrees
    let diso = m.disorientation_angles();
    for a in diso {
        assert!(a <= 93.9f64.to_radians());
    }
}

#[test]
fn test_misorientation_reduction_consistency() {
    let mut rng = Pcg64::seed_from_u64(12);
    let d6 = point_group("622").unwrap();
    let m = Misorientation::new(Rotation::random(40, &mut rng), (d6, d6));
    let reduced = m.map_into_symmetry_reduced_zone();
    let twice = reduced.map_into_symmetry_reduced_zone();
    for (a, b) in reduced.rotation().iter().zip(twice.rotation().iter()) {
        assert!(sym_eq(a, b, 1e-9));
    }
    let angles = reduced.rotation().angles();
    let diso = m.disorientation_angles();
    for (a, d) in angles.iter().zip(&diso) {
        assert_abs_diff_eq!(*a, *d, epsilon = 1e-9);
    }
}

#[test]
fn test_hexagonal_twin_disorientation() {
    // 64.40 degrees about [100] between two hexagonal crystals must survive
    // the 12x12 equivalence search as its own disorientation, axis on +-x
    let d6 = point_group("622").unwrap();
    let twin = Rotation::from_axis_angle(&[([1.0, 0.0, 0.0], 64.40f64.to_radians())]);
    let m = Misorientation::new(twin, (d6, d6));
    let diso = m.disorientation_angles()[0];
    assert!((diso.to_degrees() - 64.40).abs() <= 4.5);
    let reduced = m.map_into_symmetry_reduced_zone();
    let axis = reduced.rotation().axes().vecs()[0];
    assert!(axis.x.abs() / axis.norm() > 4.5f64.to_radians().cos());
}

#[test]
fn test_symmetry_aware_mean() {
    let mut rng = Pcg64::seed_from_u64(13);
    let g = point_group("m-3m").unwrap();
    let syms = g.proper_rotations().to_vec();
    let base: UnitQuat = EulerAngles::random(&mut rng).into();
    // a tight cluster scattered over symmetric equivalents
    let quats: Vec<UnitQuat> = (0..40)
        .map(|i| syms[i % syms.len()] * small_rotation(0.02, &mut rng) * base)
        .collect();
    let o = Orientation::new(Rotation::from_quats(quats), g);
    let mean = o.mean(&MeanOptions::default()).unwrap();
    let pair = Orientation::new(Rotation::from_quats(vec![mean, base]), g);
    let d = pair.distance_matrix(&OuterOptions::default());
    assert!(d[(0, 1)] < 0.03);
}

#[test]
fn test_mean_convergence_error() {
    let mut rng = Pcg64::seed_from_u64(14);
    let g = point_group("m-3m").unwrap();
    let o = Orientation::new(Rotation::random(5, &mut rng), g);
    let err = o.mean(&MeanOptions {
        tolerance: 1e-9,
        max_iterations: 0,
    });
    assert!(matches!(
        err,
        Err(Error::MeanConvergence { iterations: 0, .. })
    ));
}

#[test]
fn test_symmetry_arity() {
    let g = point_group("m-3m").unwrap();
    let r = Rotation::identity(1);
    assert!(Orientation::with_groups(r.clone(), &[g]).is_ok());
    assert!(matches!(
        Orientation::with_groups(r.clone(), &[g, g]),
        Err(Error::SymmetryArity {
            expected: 1,
            found: 2
        })
    ));
    assert!(Misorientation::with_groups(r.clone(), &[g, g]).is_ok());
    assert!(matches!(
        Misorientation::with_groups(r, &[g]),
        Err(Error::SymmetryArity {
            expected: 2,
            found: 1
        })
    ));
}

#[test]
fn test_symmetry_reassignment_keeps_rotation() {
    let mut rng = Pcg64::seed_from_u64(15);
    let mut o = Orientation::new(Rotation::random(4, &mut rng), point_group("1").unwrap());
    let before = o.rotation().clone();
    o.set_symmetry(point_group("m-3m").unwrap());
    assert_eq!(o.rotation(), &before);
    assert_eq!(o.symmetry().name, "m-3m");
}

#[test]
fn test_misorientation_angle_filter() {
    let d6 = point_group("622").unwrap();
    let quats = Rotation::from_axis_angle(&[
        ([1.0, 0.0, 0.0], 0.5f64.to_radians()),
        ([1.0, 0.0, 0.0], 30.0f64.to_radians()),
        ([0.0, 0.0, 1.0], 1.0f64.to_radians()),
        ([0.0, 1.0, 0.0], 45.0f64.to_radians()),
    ]);
    let m = Misorientation::new(quats, (d6, d6));
    let (kept, idx) = m.filter_by_min_angle(5.0f64.to_radians());
    assert_eq!(idx, vec![1, 3]);
    assert_eq!(kept.len(), 2);
}

#[test]
fn test_misorientation_between() {
    let mut rng = Pcg64::seed_from_u64(16);
    let g = point_group("432").unwrap();
    let o1 = Orientation::new(Rotation::random(3, &mut rng), g);
    let o2 = Orientation::new(Rotation::random(3, &mut rng), g);
    let m = Misorientation::between(&o1, &o2).unwrap();
    assert_eq!(m.len(), 3);
    for i in 0..3 {
        let expect = o2.rotation().quats()[i] * o1.rotation().quats()[i].inverse();
        assert!(sym_eq(&m.rotation().quats()[i], &expect, 1e-12));
    }
}

#[test]
fn test_vector3d_polar_round_trip() {
    let mut rng = Pcg64::seed_from_u64(17);
    let v = random_dirs(500, &mut rng);
    let polar: Vec<(f64, f64)> = v
        .to_polar()
        .into_iter()
        .map(|(az, pol, _)| (az, pol))
        .collect();
    let back = Vector3d::from_polar(&polar, false);
    for (a, b) in v.iter().zip(back.iter()) {
        assert!((a - b).norm() < 1e-9);
    }
    let x = Vector3d::xvector().angle_with(&Vector3d::yvector()).unwrap();
    assert_abs_diff_eq!(x[0], FRAC_PI_2, epsilon = 1e-12);
    // zero-length vectors are clamped, not errors
    let zero = Vector3d::from_xyz(&[[0.0, 0.0, 0.0]]);
    assert_eq!(zero.unit().vecs()[0], Vector3::zeros());
    assert_abs_diff_eq!(zero.angle_with(&Vector3d::zvector()).unwrap()[0], 0.0);
}

#[test]
fn test_dot_outer_chunking() {
    let mut rng = Pcg64::seed_from_u64(18);
    let a = random_dirs(9, &mut rng);
    let b = random_dirs(4, &mut rng);
    let full = a.dot_outer(&b, &OuterOptions::default());
    let tiny = a.dot_outer(
        &b,
        &OuterOptions {
            chunk_size: 2,
            progress: false,
        },
    );
    assert_eq!(full, tiny);
    for i in 0..9 {
        for j in 0..4 {
            assert_abs_diff_eq!(
                full[(i, j)],
                a.vecs()[i].dot(&b.vecs()[j]),
                epsilon = 1e-12
            );
        }
    }
}

fn max_nearest_neighbor_gap(v: &Vector3d) -> f64 {
    let mut worst = 0.0f64;
    for (i, a) in v.iter().enumerate() {
        let mut best = f64::INFINITY;
        for (j, b) in v.iter().enumerate() {
            if i != j {
                best = best.min(a.dot(b).clamp(-1.0, 1.0).acos());
            }
        }
        worst = worst.max(best);
    }
    worst
}

#[test]
fn test_deterministic_sampling_gap_bound() {
    let methods = [
        MeshMethod::IcosahedralMesh,
        MeshMethod::SpherifiedCube,
        MeshMethod::HexagonalLattice,
        MeshMethod::EqualArea,
    ];
    let mut rng = Pcg64::seed_from_u64(19);
    for method in methods {
        let mesh = sample_s2(10.0, method, &mut rng).unwrap();
        assert!(mesh.points.len() > 100, "{:?}", method);
        for p in mesh.points.iter() {
            assert_abs_diff_eq!(p.norm(), 1.0, epsilon = 1e-9);
        }
        let gap = max_nearest_neighbor_gap(&mesh.points);
        assert!(
            gap <= 10.0f64.to_radians() * 1.05,
            "{:?}: gap {} degrees",
            method,
            gap.to_degrees()
        );
    }
}

#[test]
fn test_sampling_determinism() {
    let mut rng = Pcg64::seed_from_u64(20);
    for method in [
        MeshMethod::IcosahedralMesh,
        MeshMethod::SpherifiedCube,
        MeshMethod::HexagonalLattice,
        MeshMethod::EqualArea,
    ] {
        let a = sample_s2(13.0, method, &mut rng).unwrap();
        let b = sample_s2(13.0, method, &mut rng).unwrap();
        assert_eq!(a.points, b.points, "{:?}", method);
    }
}

#[test]
fn test_equal_area_weights() {
    let mut rng = Pcg64::seed_from_u64(21);
    let mesh = sample_s2(10.0, MeshMethod::EqualArea, &mut rng).unwrap();
    let weights = mesh.weights.expect("equal-area mesh carries solid angles");
    assert_eq!(weights.len(), mesh.points.len());
    let total: f64 = weights.iter().sum();
    assert_abs_diff_eq!(total, 4.0 * PI, epsilon = 1e-9);
}

#[test]
fn test_random_sampling_count() {
    let res = 10.0f64;
    let mesh = sample_s2(res, MeshMethod::Random, &mut seeded_rng(22)).unwrap();
    let expected = (2.0 / (1.0 - res.to_radians().cos())).round() as usize;
    assert_eq!(mesh.points.len(), expected);
    for p in mesh.points.iter() {
        assert_abs_diff_eq!(p.norm(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn test_sampling_config_errors() {
    let mut rng = Pcg64::seed_from_u64(23);
    assert!(matches!(
        sample_s2(0.0, MeshMethod::EqualArea, &mut rng),
        Err(Error::BadResolution { .. })
    ));
    assert!(matches!(
        "simple_cubic".parse::<MeshMethod>(),
        Err(Error::UnknownMethod { .. })
    ));
    assert!(matches!(
        "north".parse::<Hemisphere>(),
        Err(Error::UnknownHemisphere { .. })
    ));
    for method in [
        MeshMethod::IcosahedralMesh,
        MeshMethod::SpherifiedCube,
        MeshMethod::HexagonalLattice,
        MeshMethod::EqualArea,
        MeshMethod::Random,
    ] {
        assert_eq!(method.name().parse::<MeshMethod>().unwrap(), method);
    }
}

#[test]
fn test_pole_density_uniform_converges_to_one() {
    let opts = DensityOptions {
        resolution: 10.0,
        sigma: 0.0,
        hemisphere: Hemisphere::Both,
        log: false,
    };
    let mut stds = Vec::new();
    for (i, &n) in [10_000usize, 100_000, 1_000_000].iter().enumerate() {
        let mut rng = Pcg64::seed_from_u64(24 + i as u64);
        let dirs = random_dirs(n, &mut rng);
        let fields = pole_density(&dirs, None, &opts).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].hemisphere, Hemisphere::Upper);
        assert_eq!(fields[1].hemisphere, Hemisphere::Lower);
        let values: Vec<f64> = fields
            .iter()
            .flat_map(|f| f.values.iter().copied())
            .collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var =
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
        assert!((mean - 1.0).abs() < 0.05, "mean {} at n {}", mean, n);
        stds.push(var.sqrt());
    }
    assert!(stds[0] > stds[1] && stds[1] > stds[2], "stds {:?}", stds);
}

#[test]
fn test_pole_density_histogram_mass_balance() {
    // sigma = 0 is a plain equal-area histogram whose solid-angle-weighted
    // mean is exactly 1 on a populated hemisphere
    let mut rng = Pcg64::seed_from_u64(27);
    let dirs = random_dirs(2000, &mut rng);
    let opts = DensityOptions {
        resolution: 15.0,
        sigma: 0.0,
        hemisphere: Hemisphere::Upper,
        log: false,
    };
    let fields = pole_density(&dirs, None, &opts).unwrap();
    assert_eq!(fields.len(), 1);
    let grid = EqualAreaGrid::new(opts.resolution.to_radians());
    let omega = grid.solid_angles();
    let upper = grid.upper_cells();
    let omega_h: f64 = omega[upper.clone()].iter().sum();
    let weighted: f64 = fields[0]
        .values
        .iter()
        .zip(&omega[upper])
        .map(|(v, o)| v * o / omega_h)
        .sum();
    assert_abs_diff_eq!(weighted, 1.0, epsilon = 1e-9);
}

#[test]
fn test_pole_density_peak_and_kernel() {
    let dirs = Vector3d::zvector();
    let opts = DensityOptions {
        resolution: 5.0,
        sigma: 5.0,
        hemisphere: Hemisphere::Upper,
        log: false,
    };
    let fields = pole_density(&dirs, None, &opts).unwrap();
    let field = &fields[0];
    let imax = field
        .values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .unwrap()
        .0;
    let peak = field.centers.vecs()[imax];
    assert!(peak.z.clamp(-1.0, 1.0).acos() <= 10.0f64.to_radians());
    // beyond three half-widths nothing accumulates
    for (c, v) in field.centers.iter().zip(&field.values) {
        if c.z.clamp(-1.0, 1.0).acos() > 25.0f64.to_radians() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_pole_density_weights_match_duplication() {
    let d1 = Vector3::new(0.1, 0.2, 0.97).normalize();
    let d2 = Vector3::new(-0.5, 0.3, 0.8).normalize();
    let opts = DensityOptions {
        resolution: 10.0,
        sigma: 0.0,
        hemisphere: Hemisphere::Upper,
        log: false,
    };
    let weighted = pole_density(
        &Vector3d::from_vecs(vec![d1, d2]),
        Some(&[3.0, 1.0]),
        &opts,
    )
    .unwrap();
    let duplicated =
        pole_density(&Vector3d::from_vecs(vec![d1, d1, d1, d2]), None, &opts).unwrap();
    for (a, b) in weighted[0].values.iter().zip(&duplicated[0].values) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
    }
}

#[test]
fn test_pole_density_config_errors_and_log() {
    let dirs = Vector3d::zvector();
    let bad_sigma = DensityOptions {
        sigma: -1.0,
        ..Default::default()
    };
    assert!(matches!(
        pole_density(&dirs, None, &bad_sigma),
        Err(Error::BadSigma { .. })
    ));
    assert!(matches!(
        pole_density(&dirs, Some(&[1.0, 2.0]), &DensityOptions::default()),
        Err(Error::ShapeMismatch { .. })
    ));

    let lin = pole_density(&dirs, None, &DensityOptions::default()).unwrap();
    let log = pole_density(
        &dirs,
        None,
        &DensityOptions {
            log: true,
            ..Default::default()
        },
    )
    .unwrap();
    for (a, b) in lin[0].values.iter().zip(&log[0].values) {
        assert_abs_diff_eq!(*b, a.ln_1p(), epsilon = 1e-12);
    }
}
