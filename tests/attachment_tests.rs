//! Bone-Attachment Tests
//!
//! Tests for:
//! - Rigid transform extraction from joint matrices
//! - Inverse bind handling
//! - Capsule placement in world space
//! - Skeleton query and capsule binding errors

use glam::{Mat4, Quat, Vec3};

use myth_hair::errors::HairError;
use myth_hair::resources::capsule::{Capsule, MAX_CAPSULES};
use myth_hair::scene::attachment::{
    BoneAttachment, RigPoses, RigidTransform, SkeletonRig, place_capsules, resolve_attachment,
};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

fn head_rig(joint: Mat4) -> (RigPoses, usize) {
    let mut poses = RigPoses::new();
    let rig = poses.add_rig(vec![Mat4::IDENTITY, joint]);
    (poses, rig)
}

// ============================================================================
// Transform Resolution
// ============================================================================

#[test]
fn resolves_joint_pose_with_uniform_scale_factored_out() {
    let joint = Mat4::from_scale_rotation_translation(
        Vec3::splat(1.5),
        Quat::from_rotation_x(0.4),
        Vec3::new(0.0, 1.7, 0.1),
    );
    let (poses, rig) = head_rig(joint);
    let attachment = BoneAttachment::new(rig, 1);

    let resolved = resolve_attachment(&poses, &attachment, &[], &[]).unwrap();

    assert!(approx(resolved.transform.scale, 1.5));
    assert!(approx_vec(resolved.transform.translation, Vec3::new(0.0, 1.7, 0.1)));
    assert!(
        resolved
            .transform
            .rotation
            .angle_between(Quat::from_rotation_x(0.4))
            < EPSILON
    );
    assert!(resolved.capsules.is_empty());
}

#[test]
fn inverse_bind_maps_authoring_pose_to_identity() {
    let bind = Mat4::from_translation(Vec3::new(0.0, 1.6, 0.0));
    let (mut poses, rig) = head_rig(bind);
    let attachment = BoneAttachment::new(rig, 1).with_inverse_bind(bind.inverse());

    let at_bind = resolve_attachment(&poses, &attachment, &[], &[]).unwrap();
    assert!(approx_vec(at_bind.transform.translation, Vec3::ZERO));
    assert!(at_bind.transform.rotation.angle_between(Quat::IDENTITY) < EPSILON);

    // Moving the head moves the hair by the same delta.
    poses
        .set_joint(rig, 1, Mat4::from_translation(Vec3::new(0.3, 1.6, 0.0)))
        .unwrap();
    let moved = resolve_attachment(&poses, &attachment, &[], &[]).unwrap();
    assert!(approx_vec(moved.transform.translation, Vec3::new(0.3, 0.0, 0.0)));
}

#[test]
fn delta_rotation_between_frames() {
    let a = RigidTransform::new(Quat::from_rotation_y(0.2), Vec3::ZERO, 1.0);
    let b = RigidTransform::new(Quat::from_rotation_y(0.5), Vec3::X, 1.0);
    let delta = b.delta_rotation_from(&a);
    assert!(delta.angle_between(Quat::from_rotation_y(0.3)) < EPSILON);
}

// ============================================================================
// Capsules
// ============================================================================

#[test]
fn capsules_follow_the_joint_and_scale_radii() {
    let joint = Mat4::from_scale_rotation_translation(
        Vec3::splat(2.0),
        Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
        Vec3::new(0.0, 1.0, 0.0),
    );
    let (poses, rig) = head_rig(joint);
    let defs = [
        Capsule::new(Vec3::ZERO, 0.1, Vec3::X, 0.05),
        Capsule::uniform(Vec3::Y, Vec3::Z, 0.2),
    ];

    let resolved = resolve_attachment(&poses, &BoneAttachment::new(rig, 1), &defs, &[0]).unwrap();

    assert_eq!(resolved.capsules.len(), 1);
    let capsule = resolved.capsules.as_slice()[0];
    assert!(approx_vec(capsule.center0, Vec3::new(0.0, 1.0, 0.0)));
    // +X rotated a quarter turn about Z is +Y, doubled.
    assert!(approx_vec(capsule.center1, Vec3::new(0.0, 3.0, 0.0)));
    assert!(approx(capsule.radius0, 0.2));
    assert!(approx(capsule.radius1, 0.1));
}

#[test]
fn capsule_index_out_of_range_is_rejected() {
    let defs = [Capsule::uniform(Vec3::ZERO, Vec3::X, 0.1)];
    let err = place_capsules(&RigidTransform::IDENTITY, &defs, &[0, 3]).unwrap_err();
    assert!(matches!(
        err,
        HairError::CapsuleOutOfRange {
            index: 3,
            available: 1
        }
    ));
}

#[test]
fn capsule_capacity_is_bounded() {
    let defs = vec![Capsule::uniform(Vec3::ZERO, Vec3::X, 0.1); MAX_CAPSULES + 1];
    let indices: Vec<usize> = (0..=MAX_CAPSULES).collect();
    let err = place_capsules(&RigidTransform::IDENTITY, &defs, &indices).unwrap_err();
    assert!(matches!(err, HairError::TooManyCapsules { .. }));
}

// ============================================================================
// Skeleton Queries
// ============================================================================

#[test]
fn missing_joint_is_reported() {
    let (poses, rig) = head_rig(Mat4::IDENTITY);
    let err = resolve_attachment(&poses, &BoneAttachment::new(rig, 7), &[], &[]).unwrap_err();
    assert!(matches!(err, HairError::JointNotFound { joint: 7, .. }));
    assert!(!err.is_fatal());

    assert!(poses.joint_world_matrix(rig + 1, 0).is_err());
}
