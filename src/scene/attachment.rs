//! Bone-Attachment Resolver
//!
//! Maps a hair group's rest pose through a skeletal joint to produce the
//! scale-free rigid transform (plus a separate uniform scale) consumed by the
//! solver, and places the group's collision capsules in world space.
//!
//! The resolver is a pure function of (rig state, joint, capsule definitions).
//! Non-uniform bone scale is unsupported; the three axis scales are averaged.

use glam::{Affine3A, Mat4, Quat, Vec3};

use crate::errors::{HairError, Result};
use crate::resources::capsule::{Capsule, CapsuleSet};

/// Rotation + translation with the uniform scale factored out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: f32,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
        scale: 1.0,
    };

    #[must_use]
    pub fn new(rotation: Quat, translation: Vec3, scale: f32) -> Self {
        Self {
            rotation: rotation.normalize(),
            translation,
            scale,
        }
    }

    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Decomposes a joint matrix, assuming orthogonal axes and uniform scale.
    #[must_use]
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        let uniform = (scale.x.abs() + scale.y.abs() + scale.z.abs()) / 3.0;
        Self::new(rotation, translation, uniform)
    }

    #[inline]
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.translation
    }

    #[inline]
    #[must_use]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * (vector * self.scale)
    }

    /// Maps a world-space point back into rest space.
    #[must_use]
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        let inv_scale = if self.scale.abs() > f32::EPSILON {
            1.0 / self.scale
        } else {
            0.0
        };
        (self.rotation.inverse() * (point - self.translation)) * inv_scale
    }

    /// Rotation taking `previous` to `self`, ignoring translation and scale.
    #[must_use]
    pub fn delta_rotation_from(&self, previous: &RigidTransform) -> Quat {
        (self.rotation * previous.rotation.inverse()).normalize()
    }

    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }

    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }
}

/// Query interface of the external skeletal animation system.
pub trait SkeletonRig {
    /// World matrix of `joint` in `rig` for the current frame.
    fn joint_world_matrix(&self, rig: usize, joint: usize) -> Result<Mat4>;
}

/// In-memory joint pose table, one matrix list per rig.
#[derive(Debug, Clone, Default)]
pub struct RigPoses {
    rigs: Vec<Vec<Mat4>>,
}

impl RigPoses {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rig and returns its index.
    pub fn add_rig(&mut self, joints: Vec<Mat4>) -> usize {
        self.rigs.push(joints);
        self.rigs.len() - 1
    }

    pub fn set_joint(&mut self, rig: usize, joint: usize, matrix: Mat4) -> Result<()> {
        let slot = self
            .rigs
            .get_mut(rig)
            .and_then(|joints| joints.get_mut(joint))
            .ok_or(HairError::JointNotFound { rig, joint })?;
        *slot = matrix;
        Ok(())
    }
}

impl SkeletonRig for RigPoses {
    fn joint_world_matrix(&self, rig: usize, joint: usize) -> Result<Mat4> {
        self.rigs
            .get(rig)
            .and_then(|joints| joints.get(joint))
            .copied()
            .ok_or(HairError::JointNotFound { rig, joint })
    }
}

/// Binding of a hair group to a skeletal joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneAttachment {
    pub rig: usize,
    pub joint: usize,
    /// Inverse of the joint's world matrix in the pose the hair was authored in.
    pub inverse_bind: Mat4,
}

impl BoneAttachment {
    #[must_use]
    pub fn new(rig: usize, joint: usize) -> Self {
        Self {
            rig,
            joint,
            inverse_bind: Mat4::IDENTITY,
        }
    }

    #[must_use]
    pub fn with_inverse_bind(mut self, inverse_bind: Mat4) -> Self {
        self.inverse_bind = inverse_bind;
        self
    }

    /// Queries the joint once and returns the rest-to-world transform.
    pub fn world_transform(&self, rig: &dyn SkeletonRig) -> Result<RigidTransform> {
        let joint_world = rig.joint_world_matrix(self.rig, self.joint)?;
        Ok(RigidTransform::from_matrix(joint_world * self.inverse_bind))
    }
}

/// Per-frame output of the resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAttachment {
    pub transform: RigidTransform,
    pub capsules: CapsuleSet,
}

/// Resolves one hair group's world pose and capsule placement.
///
/// Capsules are authored in the same space as the strand rest pose, so they
/// follow the hair through the same transform; radii scale with the bone.
pub fn resolve_attachment(
    rig: &dyn SkeletonRig,
    attachment: &BoneAttachment,
    capsule_defs: &[Capsule],
    capsule_indices: &[usize],
) -> Result<ResolvedAttachment> {
    let transform = attachment.world_transform(rig)?;
    let capsules = place_capsules(&transform, capsule_defs, capsule_indices)?;
    Ok(ResolvedAttachment {
        transform,
        capsules,
    })
}

/// Transforms the selected capsule definitions into world space.
pub fn place_capsules(
    transform: &RigidTransform,
    capsule_defs: &[Capsule],
    capsule_indices: &[usize],
) -> Result<CapsuleSet> {
    let mut capsules = CapsuleSet::new();
    for &index in capsule_indices {
        let local = capsule_defs
            .get(index)
            .ok_or(HairError::CapsuleOutOfRange {
                index,
                available: capsule_defs.len(),
            })?;
        capsules.push(Capsule::new(
            transform.transform_point(local.center0),
            local.radius0 * transform.scale,
            transform.transform_point(local.center1),
            local.radius1 * transform.scale,
        ))?;
    }
    Ok(capsules)
}
