use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Lights beyond this count neither shade hair nor receive a hair shadow map.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Depth offset applied before comparing against the hair shadow map.
    pub bias: f32,
    /// Half-extent of the orthographic shadow volume around the hair bounds.
    pub padding: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            bias: 0.002,
            padding: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// Direction the light travels in (toward the scene).
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadows: bool,
    pub shadow: ShadowConfig,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::new(-0.3, -1.0, -0.4), Vec3::ONE, 1.0)
    }
}

impl DirectionalLight {
    #[must_use]
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or(Vec3::NEG_Y),
            color,
            intensity,
            cast_shadows: true,
            shadow: ShadowConfig::default(),
        }
    }

    #[must_use]
    pub fn with_shadows(mut self, cast_shadows: bool) -> Self {
        self.cast_shadows = cast_shadows;
        self
    }

    /// Unit vector pointing from the surface toward the light.
    #[inline]
    #[must_use]
    pub fn to_light(&self) -> Vec3 {
        -self.direction
    }

    /// Light-space view matrix looking down `direction` at `center`.
    #[must_use]
    pub fn view_matrix(&self, center: Vec3, distance: f32) -> Mat4 {
        let up = if self.direction.abs().dot(Vec3::Y) > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(center - self.direction * distance, center, up)
    }
}
