//! Axis-aligned bounds used for hair-group visibility.

use glam::{Affine3A, Vec3, Vec3A, Vec4};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// An "inverted" box that any union will overwrite.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tight bounds over the xyz part of a point set. Returns `None` for an empty set.
    pub fn from_points(points: &[Vec4]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut bbox = Self::EMPTY;
        for p in points {
            bbox.min = bbox.min.min(p.truncate());
            bbox.max = bbox.max.max(p.truncate());
        }
        Some(bbox)
    }

    /// True for [`BoundingBox::EMPTY`] and any box with a negative extent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Bounds of a current-positions buffer, or `EMPTY` when there are none.
    #[must_use]
    pub fn from_points_or_empty(points: &[Vec4]) -> Self {
        Self::from_points(points).unwrap_or(Self::EMPTY)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Bounds of this box after `matrix`. The half extent is carried through
    /// the absolute linear part, so the result is tight for rotations.
    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }
        let half = Vec3A::from(self.size() * 0.5);
        let linear = matrix.matrix3;
        let reach = linear.x_axis.abs() * half.x
            + linear.y_axis.abs() * half.y
            + linear.z_axis.abs() * half.z;
        let center = matrix.transform_point3(self.center());
        let reach = Vec3::from(reach);
        Self::new(center - reach, center + reach)
    }

    /// Grows the box by `amount` in every direction.
    pub fn expand(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(amount),
            max: self.max + Vec3::splat(amount),
        }
    }
}
