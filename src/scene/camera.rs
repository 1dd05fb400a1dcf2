//! Camera and Frustum
//!
//! The camera drives both hair visibility (frustum vs. group bounds) and the
//! OIT rasterizer (view-projection, viewport mapping, view direction used for
//! quad expansion).
//!
//! Depth follows the wgpu convention: NDC z in `[0, 1]`, smaller is closer.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::resources::bounds::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone)]
pub struct Camera {
    // === Projection ===
    pub projection_type: ProjectionType,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Half-height of the orthographic volume.
    pub ortho_size: f32,

    // === Cached matrices ===
    position: Vec3,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,
}

impl Camera {
    /// `fov` is given in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            projection_type: ProjectionType::Perspective,
            fov: fov.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 1.0,
            position: Vec3::ZERO,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.update_projection_matrix();
        cam
    }

    #[must_use]
    pub fn new_orthographic(ortho_size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::new_perspective(45.0, aspect, near, far);
        cam.projection_type = ProjectionType::Orthographic;
        cam.ortho_size = ortho_size;
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let h = self.ortho_size;
                let w = h * self.aspect;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };
        self.refresh();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    /// Places the camera at `eye`, looking at `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.position = eye;
        self.view_matrix = Mat4::look_at_rh(eye, target, up);
        self.refresh();
    }

    fn refresh(&mut self) {
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Direction from `point` toward the eye, used to orient fiber quads.
    #[must_use]
    pub fn view_direction(&self, point: Vec3) -> Vec3 {
        match self.projection_type {
            ProjectionType::Perspective => (self.position - point).normalize_or_zero(),
            ProjectionType::Orthographic => {
                // Camera forward is the third row of the view rotation.
                self.view_matrix.row(2).truncate().normalize_or_zero()
            }
        }
    }

    /// World point to `(pixel.xy, depth)`; `None` behind the eye.
    #[must_use]
    pub fn project(&self, point: Vec3, viewport: Vec2) -> Option<Vec3> {
        let clip = self.view_projection_matrix * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec3::new(
            (ndc.x * 0.5 + 0.5) * viewport.x,
            (0.5 - ndc.y * 0.5) * viewport.y,
            ndc.z,
        ))
    }

    /// World-space length that covers one pixel at `point`.
    #[must_use]
    pub fn pixel_world_size(&self, point: Vec3, viewport_height: f32) -> f32 {
        let height = match self.projection_type {
            ProjectionType::Perspective => {
                let distance = (self.view_matrix * point.extend(1.0)).z.abs().max(self.near);
                2.0 * distance * (self.fov * 0.5).tan()
            }
            ProjectionType::Orthographic => 2.0 * self.ortho_size,
        };
        height / viewport_height.max(1.0)
    }
}

/// Six clip planes extracted from a view-projection matrix (Gribb-Hartmann).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    /// Left, Right, Bottom, Top, Near, Far; normals point inward.
    planes: [Vec4; 6],
}

impl Frustum {
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            // wgpu NDC z is [0, 1]
            rows[2],
            rows[3] - rows[2],
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }

        Self { planes }
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    /// Conservative AABB test using the positive vertex of each plane.
    #[must_use]
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        if bounds.is_empty() {
            return false;
        }
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), bounds.max, bounds.min);
            normal.dot(positive) + plane.w >= 0.0
        })
    }
}
