//! Capsule collision primitives.
//!
//! A capsule here is a truncated cone with rounded ends: two sphere centers
//! and two radii, swept along the segment between them. Capsules are defined
//! in a bone's local space and transformed into world space once per frame.

use arrayvec::ArrayVec;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::errors::{HairError, Result};

/// Compile-time capsule capacity of a single hair group.
pub const MAX_CAPSULES: usize = 8;

/// Segment lengths below this are treated as a single sphere.
const DEGENERATE_AXIS: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub center0: Vec3,
    pub center1: Vec3,
    pub radius0: f32,
    pub radius1: f32,
}

impl Capsule {
    #[must_use]
    pub fn new(center0: Vec3, radius0: f32, center1: Vec3, radius1: f32) -> Self {
        Self {
            center0,
            center1,
            radius0: radius0.max(0.0),
            radius1: radius1.max(0.0),
        }
    }

    /// A capsule with equal radii at both ends.
    #[must_use]
    pub fn uniform(center0: Vec3, center1: Vec3, radius: f32) -> Self {
        Self::new(center0, radius, center1, radius)
    }

    /// Closest point on the axis and the interpolated radius at that point.
    #[inline]
    fn axis_point(&self, point: Vec3) -> (Vec3, f32) {
        let axis = self.center1 - self.center0;
        let len_sq = axis.length_squared();
        let t = if len_sq > DEGENERATE_AXIS {
            ((point - self.center0).dot(axis) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (
            self.center0 + axis * t,
            self.radius0 + (self.radius1 - self.radius0) * t,
        )
    }

    /// Returns `true` when `point` lies strictly inside the capsule.
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        let (center, radius) = self.axis_point(point);
        point.distance_squared(center) < radius * radius
    }

    /// Pushes a penetrating point to the capsule surface along the separating
    /// axis. Points outside are returned unchanged, as are points exactly on
    /// the axis (no separating direction exists).
    #[must_use]
    pub fn push_out(&self, point: Vec3) -> Vec3 {
        let (center, radius) = self.axis_point(point);
        let offset = point - center;
        let dist_sq = offset.length_squared();
        if dist_sq >= radius * radius || dist_sq <= f32::EPSILON {
            return point;
        }
        center + offset * (radius / dist_sq.sqrt())
    }

    /// Wireframe outline for debug drawing: a ring around each end plus
    /// `segments` lines joining the rings.
    #[must_use]
    pub fn debug_lines(&self, segments: usize) -> Vec<[Vec3; 2]> {
        let segments = segments.max(3);
        let axis = (self.center1 - self.center0).normalize_or(Vec3::Y);
        let (u, v) = axis.any_orthonormal_pair();

        let ring = |center: Vec3, radius: f32| -> Vec<Vec3> {
            (0..segments)
                .map(|k| {
                    let angle = std::f32::consts::TAU * k as f32 / segments as f32;
                    center + (u * angle.cos() + v * angle.sin()) * radius
                })
                .collect()
        };
        let ring0 = ring(self.center0, self.radius0);
        let ring1 = ring(self.center1, self.radius1);

        let mut lines = Vec::with_capacity(segments * 3);
        for k in 0..segments {
            let next = (k + 1) % segments;
            lines.push([ring0[k], ring0[next]]);
            lines.push([ring1[k], ring1[next]]);
            lines.push([ring0[k], ring1[k]]);
        }
        lines
    }
}

/// Fixed-capacity capsule collection owned by a hair group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapsuleSet {
    capsules: ArrayVec<Capsule, MAX_CAPSULES>,
}

impl CapsuleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from any capsule iterator, rejecting overflow.
    pub fn from_capsules(capsules: impl IntoIterator<Item = Capsule>) -> Result<Self> {
        let mut set = Self::new();
        for capsule in capsules {
            set.push(capsule)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, capsule: Capsule) -> Result<()> {
        self.capsules
            .try_push(capsule)
            .map_err(|_| HairError::TooManyCapsules {
                requested: MAX_CAPSULES + 1,
                max: MAX_CAPSULES,
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.capsules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.capsules.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Capsule> {
        self.capsules.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Capsule] {
        &self.capsules
    }

    /// Debug wireframe of every capsule in the set.
    #[must_use]
    pub fn debug_lines(&self, segments: usize) -> Vec<[Vec3; 2]> {
        self.capsules
            .iter()
            .flat_map(|capsule| capsule.debug_lines(segments))
            .collect()
    }

    /// Resolves penetration against every capsule in turn.
    #[must_use]
    pub fn resolve(&self, point: Vec3) -> Vec3 {
        self.capsules
            .iter()
            .fold(point, |p, capsule| capsule.push_out(p))
    }
}

impl<'a> IntoIterator for &'a CapsuleSet {
    type Item = &'a Capsule;
    type IntoIter = std::slice::Iter<'a, Capsule>;

    fn into_iter(self) -> Self::IntoIter {
        self.capsules.iter()
    }
}
