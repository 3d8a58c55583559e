// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end kernel scenarios: entity graph in, validated solids out.

use ifc_mend_geometry::{
    bbox::curve_bounds,
    boolean::{combine, combine_with_report, BooleanOp},
    curve::{Arc, Curve, Line},
    opening::{HostAxis, HostFragment, OpeningResolver},
    profile::{create_circle, Plane, Profile},
    sanitize::{sanitize_loop, SHORT_CURVE_TOLERANCE},
    solid::Solid,
    sweep::{extrude_profile, sweep_profile_along_curve},
    BuildContext, ShapeRouter, Validator,
};
use ifc_mend_model::{
    AttributeValue, Diagnostics, Entity, EntityArena, EntityKind, StepId, UnitScale,
};
use nalgebra::{Matrix4, Point2, Point3, Vector3};

fn unit_square_profile() -> Profile {
    Profile::new(
        Plane::new(Point3::origin(), Vector3::x(), Vector3::y()).unwrap(),
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ],
    )
    .unwrap()
}

fn unit_box_at(offset: Vector3<f64>) -> Solid {
    extrude_profile(&unit_square_profile(), Vector3::z(), 1.0)
        .unwrap()
        .translated(&offset)
}

#[test]
fn extrude_unit_square_gives_six_faces_and_unit_volume() {
    let solid = extrude_profile(&unit_square_profile(), Vector3::z(), 1.0).unwrap();

    assert_eq!(solid.face_count(), 6);
    let volume = solid.volume().unwrap();
    assert!((volume - 1.0).abs() < 1e-9, "volume {volume}");

    let mut validator = Validator::new();
    assert!(validator.is_valid(&solid));
}

#[test]
fn sweep_disk_along_quarter_arc_approximates_torus_segment() {
    let disk = create_circle(1.0, None).unwrap();
    let directrix = Curve::Arc(
        Arc::new(
            Point3::origin(),
            5.0,
            Vector3::x(),
            Vector3::y(),
            (0.0, std::f64::consts::FRAC_PI_2),
        )
        .unwrap(),
    );

    let solid = sweep_profile_along_curve(&disk, &directrix).unwrap();

    let mut validator = Validator::new();
    let findings = validator.diagnose(&solid);
    assert!(findings.is_empty(), "invalid sweep: {findings:?}");

    let volume = solid.volume().unwrap();
    let analytic = std::f64::consts::PI * 5.0 * std::f64::consts::FRAC_PI_2;
    assert!(volume > 0.0);
    assert!(
        (volume - analytic).abs() / analytic < 0.05,
        "volume {volume} vs analytic {analytic}"
    );
}

#[test]
fn combine_degenerate_operand_table() {
    let mut validator = Validator::new();
    let mut diag = Diagnostics::new();
    let ids = (Some(StepId(1)), Some(StepId(2)));
    let cube = || unit_box_at(Vector3::zeros());

    let a_union = combine(
        Some(cube()),
        None,
        BooleanOp::Union,
        None,
        &mut validator,
        &mut diag,
        ids,
    );
    assert!((a_union.unwrap().volume().unwrap() - 1.0).abs() < 1e-9);

    let b_union = combine(
        None,
        Some(cube()),
        BooleanOp::Union,
        None,
        &mut validator,
        &mut diag,
        ids,
    );
    assert!((b_union.unwrap().volume().unwrap() - 1.0).abs() < 1e-9);

    let a_diff = combine(
        Some(cube()),
        None,
        BooleanOp::Difference,
        None,
        &mut validator,
        &mut diag,
        ids,
    );
    assert!(a_diff.is_some());

    let no_intersect = combine(
        None,
        Some(cube()),
        BooleanOp::Intersect,
        None,
        &mut validator,
        &mut diag,
        ids,
    );
    assert!(no_intersect.is_none());
}

#[test]
fn boundary_disjoint_union_succeeds_without_perturbation() {
    let mut validator = Validator::new();
    let mut diag = Diagnostics::new();

    let (solid, report) = combine_with_report(
        Some(unit_box_at(Vector3::zeros())),
        Some(unit_box_at(Vector3::new(4.0, 0.0, 0.0))),
        BooleanOp::Union,
        None,
        &mut validator,
        &mut diag,
        (Some(StepId(1)), Some(StepId(2))),
    );

    assert_eq!(report.attempts, 1);
    assert!(!report.nudged);
    let volume = solid.unwrap().volume().unwrap();
    assert!((volume - 2.0).abs() < 1e-6, "volume {volume}");
}

#[test]
fn coincident_face_difference_resolves_within_three_attempts() {
    let mut validator = Validator::new();
    let mut diag = Diagnostics::new();

    // The tool shares the host's y and z boundary planes exactly
    let host = unit_box_at(Vector3::zeros());
    let tool = unit_box_at(Vector3::new(0.5, 0.0, 0.0));

    let (solid, report) = combine_with_report(
        Some(host),
        Some(tool),
        BooleanOp::Difference,
        None,
        &mut validator,
        &mut diag,
        (Some(StepId(1)), Some(StepId(2))),
    );

    let solid = solid.expect("difference result");
    assert!(report.attempts <= 3);
    assert!(!report.degraded, "fell back to first operand");
    assert!(validator.is_valid(&solid));

    let volume = solid.volume().unwrap();
    assert!((volume - 0.5).abs() < 0.01, "volume {volume}");
}

#[test]
fn sanitizer_is_idempotent_and_strictly_shrinks_duplicates() {
    let mut diag = Diagnostics::new();
    let clean = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(2.0, 2.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
        Point3::new(0.0, 0.0, 0.0),
    ];

    // Idempotence on already-clean input
    let once = sanitize_loop(&clean, None, true, SHORT_CURVE_TOLERANCE, &mut diag).unwrap();
    assert_eq!(once.points, clean);
    let twice = sanitize_loop(&once.points, None, true, SHORT_CURVE_TOLERANCE, &mut diag).unwrap();
    assert_eq!(twice.points, once.points);

    // A near-duplicate adjacent pair never survives, and the output is
    // strictly shorter than the input
    let mut dirty = clean.clone();
    dirty.insert(1, Point3::new(1e-6, 0.0, 0.0));
    let out = sanitize_loop(&dirty, None, true, SHORT_CURVE_TOLERANCE, &mut diag).unwrap();
    assert!(out.points.len() < dirty.len());
    for pair in out.points.windows(2) {
        assert!((pair[1] - pair[0]).norm() >= SHORT_CURVE_TOLERANCE);
    }
}

#[test]
fn arc_bounding_box_contains_every_tessellated_sample() {
    let arc = Arc::new(
        Point3::new(-1.0, 2.0, 0.3),
        2.5,
        Vector3::new(0.8, 0.0, 0.6),
        Vector3::y(),
        (0.4, 4.9),
    )
    .unwrap();
    let curve = Curve::Arc(arc.clone());
    let bounds = curve_bounds(&curve).unwrap();

    for i in 0..=1000 {
        let t = 0.4 + (4.9 - 0.4) * i as f64 / 1000.0;
        let p = arc.point_at(t);
        assert!(bounds.contains_point(&p), "sample at t={t} outside box");
    }
}

#[test]
fn opening_spanning_two_of_three_fragments_registers_two_voids() {
    let mut arena = EntityArena::new();
    let mut validator = Validator::new();
    let mut diag = Diagnostics::new();

    let opening = arena.insert(Entity::new(StepId(900), EntityKind::OpeningElement));

    let fragment = |id: u32, base: f64, top: f64| HostFragment {
        id: StepId(id),
        placement: Matrix4::identity(),
        axis: HostAxis::Line(Line::bounded(Point3::origin(), Vector3::x(), 0.0, 12.0).unwrap()),
        base_elevation: base,
        top_elevation: top,
    };
    let fragments = vec![
        fragment(1, 0.0, 2.8),
        fragment(2, 2.8, 5.6),
        fragment(3, 5.6, 8.4),
    ];

    // Window spanning stories 1 and 2, clear of story 3
    let window = vec![
        Point3::new(4.0, 0.0, 2.0),
        Point3::new(5.2, 0.0, 2.0),
        Point3::new(5.2, 0.0, 3.4),
        Point3::new(4.0, 0.0, 3.4),
    ];

    let resolver = OpeningResolver::new(&fragments);
    let (cut, relationships) = resolver
        .resolve(
            &mut arena,
            opening,
            &window,
            Vector3::y(),
            0.36,
            &fragments[0],
            &mut validator,
            &mut diag,
        )
        .expect("window should resolve");

    assert!((cut.width - 1.2).abs() < 1e-9);
    assert!((cut.height - 1.4).abs() < 1e-9);

    assert_eq!(relationships.len(), 2, "exactly 2 voids: {relationships:?}");
    assert_ne!(relationships[0].host, relationships[1].host);
    assert_eq!(relationships[0].opening, opening);
    assert_ne!(relationships[1].opening, opening);
    assert!(arena.get(relationships[1].opening).is_some());
}

#[test]
fn entity_graph_wall_with_cut_end_to_end() {
    let mut arena = EntityArena::new();

    let seed_direction = |arena: &mut EntityArena, id: u32, ratios: [f64; 3]| {
        arena.insert(Entity::new(StepId(id), EntityKind::Direction).with(
            "DirectionRatios",
            AttributeValue::List(ratios.iter().map(|&v| AttributeValue::Float(v)).collect()),
        ))
    };
    let seed_box = |arena: &mut EntityArena, base: u32, x: f64, y: f64, depth: f64| {
        let profile = arena.insert(
            Entity::new(StepId(base), EntityKind::RectangleProfile)
                .with("XDim", AttributeValue::Float(x))
                .with("YDim", AttributeValue::Float(y)),
        );
        let dir = seed_direction(arena, base + 1, [0.0, 0.0, 1.0]);
        arena.insert(
            Entity::new(StepId(base + 2), EntityKind::ExtrudedAreaSolid)
                .with("SweptArea", AttributeValue::EntityRef(profile))
                .with("ExtrudedDirection", AttributeValue::EntityRef(dir))
                .with("Depth", AttributeValue::Float(depth)),
        )
    };

    let wall = seed_box(&mut arena, 1, 6.0, 0.3, 2.8);
    let cut = seed_box(&mut arena, 10, 1.2, 1.0, 1.4);
    let clipped = arena.insert(
        Entity::new(StepId(20), EntityKind::BooleanResult)
            .with("Operator", AttributeValue::Enum("DIFFERENCE".to_string()))
            .with("FirstOperand", AttributeValue::EntityRef(wall))
            .with("SecondOperand", AttributeValue::EntityRef(cut)),
    );

    let mut router = ShapeRouter::new();
    let mut ctx = BuildContext::new(&arena, UnitScale::identity());

    let solid = router.build_shape(&mut ctx, clipped).expect("clipped wall builds");
    assert!(!ctx.diagnostics().has_fatal());

    // Wall 6.0*0.3*2.8 minus the 1.2*0.3*1.4 overlap
    let volume = solid.volume().unwrap();
    let expected = 6.0 * 0.3 * 2.8 - 1.2 * 0.3 * 1.4;
    assert!((volume - expected).abs() < 0.02, "volume {volume} vs {expected}");

    // The cached operand is reused, not rebuilt
    let again = router.build_shape(&mut ctx, wall).expect("wall cached");
    assert!((again.volume().unwrap() - 6.0 * 0.3 * 2.8).abs() < 1e-9);
}

#[test]
fn millimeter_unit_scaling_reaches_geometry() {
    let mut arena = EntityArena::new();
    let profile = arena.insert(
        Entity::new(StepId(1), EntityKind::RectangleProfile)
            .with("XDim", AttributeValue::Float(1000.0))
            .with("YDim", AttributeValue::Float(500.0)),
    );
    let dir = arena.insert(Entity::new(StepId(2), EntityKind::Direction).with(
        "DirectionRatios",
        AttributeValue::List(vec![
            AttributeValue::Float(0.0),
            AttributeValue::Float(0.0),
            AttributeValue::Float(1.0),
        ]),
    ));
    let solid_id = arena.insert(
        Entity::new(StepId(3), EntityKind::ExtrudedAreaSolid)
            .with("SweptArea", AttributeValue::EntityRef(profile))
            .with("ExtrudedDirection", AttributeValue::EntityRef(dir))
            .with("Depth", AttributeValue::Float(2000.0)),
    );

    let mut router = ShapeRouter::new();
    let mut ctx = BuildContext::new(&arena, UnitScale::new(0.001).unwrap());
    let solid = router.build_shape(&mut ctx, solid_id).expect("scaled box builds");

    // 1.0m x 0.5m x 2.0m
    let volume = solid.volume().unwrap();
    assert!((volume - 1.0).abs() < 1e-9, "volume {volume}");
}
