//! Strand Simulation Tests
//!
//! Tests for:
//! - Verlet integration and kinematic roots
//! - Length constraint convergence
//! - Global/local shape constraints and capsule collision
//! - Shock propagation
//! - Degenerate edges
//! - The full solver pass sequence

use glam::{Quat, Vec3, Vec4};

use myth_hair::resources::capsule::{Capsule, CapsuleSet};
use myth_hair::resources::strand_asset::StrandAsset;
use myth_hair::scene::attachment::RigidTransform;
use myth_hair::simulation::constraints::{
    apply_global_shape_constraint, apply_length_constraint, apply_local_shape_constraint,
    max_length_deviation, propagate_shock,
};
use myth_hair::simulation::integrate::{integrate, pose_rigidly, pre_warm};
use myth_hair::simulation::{
    ConstraintSolver, GlobalForces, SimulationParameters, SimulationState, SolverFrame,
};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

/// Vertical strand hanging from `root`, `count` vertices `spacing` apart.
fn vertical(root: Vec3, count: usize, spacing: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| root - Vec3::Y * (i as f32 * spacing))
        .collect()
}

fn single_strand(count: usize, spacing: f32) -> StrandAsset {
    StrandAsset::from_guides(&[vertical(Vec3::ZERO, count, spacing)], &[], 1.0).unwrap()
}

fn state_for(asset: &StrandAsset) -> SimulationState {
    SimulationState::new(asset.rest_positions(), asset.vertices_per_strand())
}

fn no_gravity() -> GlobalForces {
    GlobalForces {
        gravity: Vec3::ZERO,
        wind: Vec3::ZERO,
    }
}

// ============================================================================
// End-to-end: free fall, then one length iteration
// ============================================================================

#[test]
fn integrate_matches_free_fall_displacement() {
    let asset = single_strand(4, 1.0);
    let mut state = state_for(&asset);
    let params = SimulationParameters::unconstrained();
    let capsules = CapsuleSet::new();
    let dt = 1.0 / 60.0;
    let frame = SolverFrame::new(RigidTransform::IDENTITY, &capsules, dt);

    integrate(&mut state, &asset, &params, &frame);

    let drop = 0.5 * 9.8 * dt * dt;
    let v1 = state.current()[1].truncate();
    assert!(
        approx_vec(v1, Vec3::new(0.0, -1.0 - drop, 0.0)),
        "vertex 1 should fall by ½·g·Δt², got {v1}"
    );
    assert_eq!(state.current()[0].truncate(), Vec3::ZERO);
}

#[test]
fn one_length_iteration_pulls_edge_back_partially() {
    let asset = single_strand(4, 1.0);
    let mut state = state_for(&asset);
    let params = SimulationParameters::unconstrained();
    let capsules = CapsuleSet::new();
    let dt = 0.1;
    let frame = SolverFrame::new(RigidTransform::IDENTITY, &capsules, dt);

    integrate(&mut state, &asset, &params, &frame);
    let stretched = state.current()[0]
        .truncate()
        .distance(state.current()[1].truncate());
    assert!(stretched > 1.0);

    apply_length_constraint(&mut state, &asset, 1, 1.0);

    let edge = state.current()[0].truncate().distance(state.current()[1].truncate());
    assert!(
        (edge - 1.0).abs() < (stretched - 1.0).abs(),
        "edge {edge} should be closer to 1.0 than {stretched}"
    );
    // A single relaxation iteration is not a hard solve.
    assert!(edge > 1.0 + 1e-3);
}

// ============================================================================
// Root kinematic invariant
// ============================================================================

#[test]
fn roots_follow_the_rigid_transform_exactly() {
    let guides = [
        vertical(Vec3::new(0.0, 0.0, 0.0), 6, 0.1),
        vertical(Vec3::new(0.2, 0.1, 0.0), 6, 0.1),
    ];
    let asset = StrandAsset::from_guides(&guides, &[Vec3::new(0.01, 0.0, 0.0)], 0.5).unwrap();
    let mut state = state_for(&asset);
    let params = SimulationParameters::default();
    let capsules = CapsuleSet::new();
    let solver = ConstraintSolver::new();

    let mut previous = RigidTransform::IDENTITY;
    for k in 0..10 {
        let transform = RigidTransform::new(
            Quat::from_rotation_y(0.1 * k as f32),
            Vec3::new(0.05 * k as f32, 0.0, 0.0),
            1.0,
        );
        let frame = SolverFrame::new(transform, &capsules, 1.0 / 60.0)
            .with_previous_transform(previous)
            .with_pre_warm(k == 0);

        let mut integrated = state.clone();
        integrate(&mut integrated, &asset, &params, &frame);
        for strand in 0..asset.strand_count() {
            let root = asset.strand_vertices(strand).start;
            let expected = transform.transform_point(asset.rest_positions()[root].truncate());
            let actual = integrated.current()[root].truncate();
            assert!(
                approx_vec(actual, expected),
                "frame {k}, strand {strand}: integrated root {actual} != {expected}"
            );
        }

        solver.step(&mut state, &asset, &params, &frame);

        for strand in 0..asset.strand_count() {
            let root = asset.strand_vertices(strand).start;
            let expected = transform.transform_point(asset.rest_positions()[root].truncate());
            let actual = state.current()[root].truncate();
            assert!(
                approx_vec(actual, expected),
                "frame {k}, strand {strand}: root {actual} != {expected}"
            );
        }
        previous = transform;
    }
}

#[test]
fn integrate_places_root_bit_exactly() {
    let asset = single_strand(3, 0.5);
    let mut state = state_for(&asset);
    let params = SimulationParameters::default();
    let capsules = CapsuleSet::new();
    let transform = RigidTransform::new(
        Quat::from_rotation_z(0.3),
        Vec3::new(1.0, 2.0, 3.0),
        1.5,
    );
    let frame = SolverFrame::new(transform, &capsules, 1.0 / 60.0);

    integrate(&mut state, &asset, &params, &frame);

    let expected = transform.transform_point(asset.rest_positions()[0].truncate());
    assert_eq!(state.current()[0].truncate(), expected);
}

#[test]
fn integrate_places_follow_roots_with_the_guide() {
    let asset = StrandAsset::from_guides(
        &[vertical(Vec3::ZERO, 4, 0.1)],
        &[Vec3::new(0.1, 0.0, 0.0)],
        1.0,
    )
    .unwrap();
    let mut state = state_for(&asset);
    let params = SimulationParameters::default();
    let capsules = CapsuleSet::new();
    let transform = RigidTransform::new(Quat::from_rotation_y(0.5), Vec3::X, 1.0);
    let frame = SolverFrame::new(transform, &capsules, 1.0 / 60.0);

    integrate(&mut state, &asset, &params, &frame);

    let follow_root = asset.strand_vertices(1).start;
    let expected = transform.transform_point(Vec3::new(0.1, 0.0, 0.0));
    assert!(approx_vec(
        asset.rest_positions()[follow_root].truncate(),
        Vec3::new(0.1, 0.0, 0.0)
    ));
    assert!(approx_vec(state.current()[follow_root].truncate(), expected));
    // Only the root moves; the rest of the follow strand waits for the follow pass.
    assert_eq!(state.current()[follow_root + 1], state.previous()[follow_root + 1]);
}

// ============================================================================
// Pre-warm
// ============================================================================

const TIME_STEP: f32 = 1.0 / 60.0;

fn max_deviation(actual: &[Vec4], expected: impl Iterator<Item = Vec3>) -> f32 {
    actual
        .iter()
        .zip(expected)
        .map(|(a, e)| a.truncate().distance(e))
        .fold(0.0, f32::max)
}

#[test]
fn pre_warm_leaves_no_velocity_history() {
    let asset = single_strand(6, 0.1);
    let params = SimulationParameters::default();
    let capsules = CapsuleSet::new();
    let frame = SolverFrame::new(RigidTransform::IDENTITY, &capsules, TIME_STEP).with_pre_warm(true);

    let mut warmed = state_for(&asset);
    pre_warm(&mut warmed, &asset, &params, &frame);
    assert_eq!(warmed.previous(), warmed.current());
    assert_eq!(warmed.previous_previous(), warmed.current());

    let mut stepped = state_for(&asset);
    ConstraintSolver::new().step(&mut stepped, &asset, &params, &frame);
    assert_eq!(stepped.previous(), stepped.previous_previous());
}

#[test]
fn first_pre_warm_snaps_to_posed_rest() {
    let asset = single_strand(5, 0.2);
    let mut state = state_for(&asset);
    let params = SimulationParameters::default();
    let capsules = CapsuleSet::new();
    let transform = RigidTransform::new(Quat::from_rotation_z(0.4), Vec3::new(5.0, 0.0, 0.0), 1.0);
    let frame = SolverFrame::new(transform, &capsules, TIME_STEP)
        .with_forces(no_gravity())
        .with_pre_warm(true);

    pre_warm(&mut state, &asset, &params, &frame);

    let posed = || {
        asset
            .rest_positions()
            .iter()
            .map(|p| transform.transform_point(p.truncate()))
    };
    assert!(max_deviation(state.current(), posed()) < EPSILON);
    assert!(max_deviation(state.previous(), posed()) < EPSILON);
    assert!(max_deviation(state.previous_previous(), posed()) < EPSILON);
}

#[test]
fn reentry_pre_warm_carries_frozen_strands_with_the_bone() {
    let guides = [
        vertical(Vec3::ZERO, 8, 0.05),
        vertical(Vec3::new(0.1, 0.0, 0.0), 8, 0.05),
    ];
    let asset = StrandAsset::from_guides(&guides, &[], 1.0).unwrap();
    let mut state = state_for(&asset);
    let params = SimulationParameters::default();
    let capsules = CapsuleSet::new();
    let solver = ConstraintSolver::new();
    let identity = RigidTransform::IDENTITY;

    for k in 0..120 {
        let frame = SolverFrame::new(identity, &capsules, TIME_STEP).with_pre_warm(k == 0);
        solver.step(&mut state, &asset, &params, &frame);
    }
    let frozen = state.current().to_vec();

    let mut control = state.clone();
    solver.step(
        &mut control,
        &asset,
        &params,
        &SolverFrame::new(identity, &capsules, TIME_STEP),
    );
    let regular = max_deviation(control.current(), frozen.iter().map(|p| p.truncate()));

    // The bone moved while the group was hidden.
    let moved = RigidTransform::new(Quat::from_rotation_y(0.7), Vec3::new(0.5, 0.2, 0.0), 1.0);
    let frame = SolverFrame::new(moved, &capsules, TIME_STEP)
        .with_previous_transform(identity)
        .with_pre_warm(true);
    let stats = solver.step(&mut state, &asset, &params, &frame);

    let half_gravity_step = 0.5 * 9.8 * TIME_STEP * TIME_STEP;
    let deviation = max_deviation(
        state.current(),
        frozen.iter().map(|p| moved.transform_point(p.truncate())),
    );
    assert!(
        deviation <= regular + 2.0 * half_gravity_step + 1e-4,
        "re-entry moved strands {deviation} away from the carried pose"
    );
    assert_eq!(stats.shock_strands, 0);
}

// ============================================================================
// Length constraint
// ============================================================================

fn perturbed(asset: &StrandAsset, f: impl Fn(usize) -> Vec3) -> SimulationState {
    let mut state = state_for(asset);
    for (i, p) in state.current_mut().iter_mut().enumerate() {
        *p = f(i).extend(p.w);
    }
    state
}

#[test]
fn length_deviation_never_grows_across_iterations() {
    let asset = single_strand(8, 0.25);
    let shapes: [Box<dyn Fn(usize) -> Vec3>; 2] = [
        Box::new(|i| {
            let i = i as f32;
            Vec3::new(
                0.1 * (i * 1.3).sin() * i,
                -i * 0.32,
                0.05 * i * if i as usize % 2 == 0 { 1.0 } else { -1.0 },
            )
        }),
        Box::new(|i| {
            let i = i as f32;
            Vec3::new(0.03 * i * i, -i * 0.25 - 0.02 * i * i, 0.0)
        }),
    ];

    for shape in &shapes {
        let initial = perturbed(&asset, shape);
        let mut last = max_length_deviation(initial.current(), &asset, 1.0);
        for iterations in 1..=7 {
            let mut state = initial.clone();
            apply_length_constraint(&mut state, &asset, iterations, 1.0);
            let deviation = max_length_deviation(state.current(), &asset, 1.0);
            assert!(
                deviation <= last + 1e-5,
                "{iterations} iterations: deviation {deviation} grew from {last}"
            );
            last = deviation;
        }
        let start = max_length_deviation(initial.current(), &asset, 1.0);
        assert!(last < start);
    }
}

#[test]
fn length_constraint_honors_bone_scale() {
    let asset = single_strand(2, 1.0);
    let mut state = perturbed(&asset, |i| Vec3::new(0.0, -(i as f32) * 3.0, 0.0));
    apply_length_constraint(&mut state, &asset, 1, 2.0);
    let edge = state.current()[0].truncate().distance(state.current()[1].truncate());
    assert!(approx(edge, 2.0));
}

#[test]
fn degenerate_edges_are_skipped_without_nan() {
    let mut guide = vertical(Vec3::ZERO, 4, 0.5);
    guide[2] = guide[1];
    let asset = StrandAsset::from_guides(&[guide], &[], 1.0).unwrap();
    let mut state = state_for(&asset);

    let skipped = apply_length_constraint(&mut state, &asset, 3, 1.0);

    assert_eq!(skipped, 1);
    assert!(state.current().iter().all(|p| p.is_finite()));
    assert!(state.tangents().iter().all(|t| t.is_finite()));
}

// ============================================================================
// Shape constraints
// ============================================================================

#[test]
fn global_constraint_leaves_tips_free() {
    let asset = single_strand(10, 0.1);
    let mut state = perturbed(&asset, |i| Vec3::new(0.5, -(i as f32) * 0.1, 0.0));
    state.current_mut()[0] = Vec4::new(0.0, 0.0, 0.0, 0.0);
    let before = state.current().to_vec();

    let params = SimulationParameters {
        global_constraint_stiffness: 0.5,
        global_constraint_range: 0.3,
        ..SimulationParameters::unconstrained()
    };
    let capsules = CapsuleSet::new();
    let frame = SolverFrame::new(RigidTransform::IDENTITY, &capsules, 1.0 / 60.0);
    apply_global_shape_constraint(&mut state, &asset, &params, &frame);

    // 0.3 * 10 vertices: locals 1 and 2 are pulled, the rest untouched.
    for local in 1..3 {
        assert!(approx(state.current()[local].x, 0.25), "local {local}");
    }
    for local in 3..10 {
        assert_eq!(state.current()[local], before[local], "local {local}");
    }
}

#[test]
fn local_constraint_restores_rest_curvature() {
    let points = vec![
        Vec3::ZERO,
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, -2.0, 0.0),
    ];
    let asset = StrandAsset::from_guides(&[points.clone()], &[], 1.0).unwrap();
    let mut state = perturbed(&asset, |i| Vec3::new(0.0, -(i as f32), 0.0));

    let params = SimulationParameters {
        local_constraint_stiffness: 1.0,
        local_constraint_iterations: 20,
        ..SimulationParameters::unconstrained()
    };
    let capsules = CapsuleSet::new();
    let frame = SolverFrame::new(RigidTransform::IDENTITY, &capsules, 1.0 / 60.0);

    let error = |state: &SimulationState| -> f32 {
        state
            .current()
            .iter()
            .zip(&points)
            .map(|(p, r)| p.truncate().distance(*r))
            .sum()
    };
    let before = error(&state);
    apply_local_shape_constraint(&mut state, &asset, &params, &frame);
    let after = error(&state);

    assert!(after < before * 0.5, "shape error {before} -> {after}");
    assert_eq!(state.current()[0].truncate(), Vec3::ZERO);
}

// ============================================================================
// Capsules
// ============================================================================

#[test]
fn capsule_pushes_penetrating_vertices_to_surface() {
    let asset = single_strand(5, 0.25);
    let mut state = state_for(&asset);
    let capsule = Capsule::uniform(Vec3::new(-1.0, -0.5, 0.05), Vec3::new(1.0, -0.5, 0.05), 0.2);
    let capsules = CapsuleSet::from_capsules([capsule]).unwrap();
    let params = SimulationParameters::unconstrained();
    let frame = SolverFrame::new(RigidTransform::IDENTITY, &capsules, 1.0 / 60.0);

    let contacts = apply_global_shape_constraint(&mut state, &asset, &params, &frame);

    // Only the vertex at y = -0.5 penetrates; it leaves along -z.
    assert_eq!(contacts, 1);
    assert!(approx_vec(
        state.current()[2].truncate(),
        Vec3::new(0.0, -0.5, -0.15)
    ));
    assert_eq!(state.current()[1], asset.rest_positions()[1]);
    assert_eq!(state.current()[0].truncate(), Vec3::ZERO);
}

// ============================================================================
// Damping and shock propagation
// ============================================================================

#[test]
fn damping_reduces_retained_velocity() {
    let asset = single_strand(2, 1.0);
    let capsules = CapsuleSet::new();
    let frame = SolverFrame::new(RigidTransform::IDENTITY, &capsules, 0.1);

    let fall = |damping: f32| -> f32 {
        let mut state = state_for(&asset);
        let params = SimulationParameters {
            damping,
            ..SimulationParameters::unconstrained()
        };
        for _ in 0..5 {
            integrate(&mut state, &asset, &params, &frame);
        }
        -1.0 - state.current()[1].y
    };

    assert!(fall(0.1) < fall(0.0));
}

#[test]
fn shock_carries_root_motion_down_the_strand() {
    let asset = single_strand(5, 0.25);
    let mut state = state_for(&asset);
    let capsules = CapsuleSet::new();
    let dt = 1.0 / 60.0;
    let params = SimulationParameters {
        shock_propagation_strength: 1.0,
        shock_propagation_acceleration_threshold: 10.0,
        ..SimulationParameters::unconstrained()
    };

    // Root jumps sideways in a single frame.
    let moved = RigidTransform::from_translation(Vec3::new(0.2, 0.0, 0.0));
    let frame = SolverFrame::new(moved, &capsules, dt).with_forces(no_gravity());
    integrate(&mut state, &asset, &params, &frame);
    let before: Vec<f32> = state.current().iter().map(|p| p.x).collect();

    let corrected = propagate_shock(&mut state, &asset, &params, &frame);

    assert_eq!(corrected, 1);
    let after: Vec<f32> = state.current().iter().map(|p| p.x).collect();
    assert!(approx(after[0], 0.2));
    // Weight falls off linearly: the second vertex moves most, the tip not at all.
    assert!(after[1] > before[1] + 0.1);
    assert!(after[1] > after[2] && after[2] > after[3]);
    assert!(approx(after[4], before[4]));
}

#[test]
fn gentle_root_motion_does_not_trigger_shock() {
    let asset = single_strand(4, 0.25);
    let mut state = state_for(&asset);
    let capsules = CapsuleSet::new();
    let params = SimulationParameters::default();
    let frame = SolverFrame::new(
        RigidTransform::from_translation(Vec3::new(1e-5, 0.0, 0.0)),
        &capsules,
        1.0 / 60.0,
    );
    integrate(&mut state, &asset, &params, &frame);
    assert_eq!(propagate_shock(&mut state, &asset, &params, &frame), 0);
}

// ============================================================================
// Full step
// ============================================================================

#[test]
fn solver_step_counts_frames_and_stays_finite() {
    let asset = StrandAsset::from_guides(
        &[vertical(Vec3::ZERO, 8, 0.05), vertical(Vec3::X * 0.1, 8, 0.05)],
        &[Vec3::new(0.005, 0.0, 0.0), Vec3::new(-0.005, 0.0, 0.0)],
        0.3,
    )
    .unwrap();
    let mut state = state_for(&asset);
    let capsules = CapsuleSet::from_capsules([Capsule::uniform(
        Vec3::new(0.03, -0.2, -0.1),
        Vec3::new(0.03, -0.2, 0.1),
        0.05,
    )])
    .unwrap();
    let params = SimulationParameters::default();
    let solver = ConstraintSolver::new();

    for k in 0..30 {
        let frame = SolverFrame::new(RigidTransform::IDENTITY, &capsules, 1.0 / 60.0)
            .with_pre_warm(k == 0);
        solver.step(&mut state, &asset, &params, &frame);
    }

    assert_eq!(state.frames_simulated(), 30);
    assert!(state.current().iter().all(|p| p.is_finite()));
    assert!(max_length_deviation(state.current(), &asset, 1.0) < 0.05);
}

#[test]
fn rigid_pose_matches_transformed_rest() {
    let asset = single_strand(4, 0.5);
    let mut state = state_for(&asset);
    let transform = RigidTransform::new(Quat::from_rotation_x(1.0), Vec3::ONE, 2.0);

    pose_rigidly(&mut state, &asset, &transform);

    for (p, r) in state.current().iter().zip(asset.rest_positions()) {
        assert!(approx_vec(p.truncate(), transform.transform_point(r.truncate())));
    }
    assert_eq!(state.previous(), state.current());
}
