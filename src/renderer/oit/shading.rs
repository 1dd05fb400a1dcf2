//! Kajiya-Kay hair shading with two shifted specular lobes.
//!
//! ```text
//! diffuse   = base · sin(T, L)
//! specular  = Σ lobe.color · strength · sin(T', H)^power,   T' = shift(T, lobe.shift)
//! color     = ambient + Σ_lights (diffuse + specular) · light · shadow + headlight
//! ```
//!
//! The secondary lobe is tinted by the strand color; the headlight is a
//! diffuse-only term lit from the eye.

use glam::Vec3;

use crate::resources::shading::{HairShadingParams, SpecularLobe};
use crate::scene::light::{DirectionalLight, MAX_DIRECTIONAL_LIGHTS};

/// Surface sample handed to the shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HairSurface {
    pub position: Vec3,
    pub tangent: Vec3,
    /// Normalized arc length, 0 at the root.
    pub t: f32,
}

#[inline]
fn sin_between(a: Vec3, b: Vec3) -> f32 {
    let cos = a.dot(b).clamp(-1.0, 1.0);
    (1.0 - cos * cos).max(0.0).sqrt()
}

/// Tangent tilted toward the normal to displace the highlight along the strand.
#[inline]
fn shift_tangent(tangent: Vec3, normal: Vec3, shift: f32) -> Vec3 {
    (tangent + normal * shift).normalize_or(tangent)
}

#[inline]
fn lobe(tangent: Vec3, normal: Vec3, half: Vec3, spec: &SpecularLobe) -> f32 {
    let shifted = shift_tangent(tangent, normal, spec.shift);
    spec.strength * sin_between(shifted, half).powf(spec.power)
}

/// Shades hair fragments for one set of lights and one eye position.
#[derive(Debug, Clone, Copy)]
pub struct HairShader<'a> {
    lights: &'a [DirectionalLight],
    eye: Vec3,
}

impl<'a> HairShader<'a> {
    /// Lights past [`MAX_DIRECTIONAL_LIGHTS`] are ignored.
    #[must_use]
    pub fn new(lights: &'a [DirectionalLight], eye: Vec3) -> Self {
        let lights = &lights[..lights.len().min(MAX_DIRECTIONAL_LIGHTS)];
        Self { lights, eye }
    }

    #[inline]
    #[must_use]
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Linear color of one fragment. `shadow(i)` returns the transmittance
    /// toward light `i` in `[0, 1]`.
    #[must_use]
    pub fn shade(
        &self,
        params: &HairShadingParams,
        surface: &HairSurface,
        mut shadow: impl FnMut(usize) -> f32,
    ) -> Vec3 {
        let base = params.base_color(surface.t);
        let tangent = surface.tangent.normalize_or(Vec3::Y);
        let view = (self.eye - surface.position).normalize_or(Vec3::Z);
        // Hair has no geometric normal; use the view vector projected off the tangent.
        let normal = (view - tangent * tangent.dot(view)).normalize_or(view);

        let mut color = base * params.ambient_strength;

        for (i, light) in self.lights.iter().enumerate() {
            let to_light = light.to_light();
            let half = (to_light + view).normalize_or(to_light);
            let diffuse = base * params.diffuse_strength * sin_between(tangent, to_light);
            let primary = params.primary.color * lobe(tangent, normal, half, &params.primary);
            let secondary =
                params.secondary.color * base * lobe(tangent, normal, half, &params.secondary);

            let transmittance = if light.cast_shadows { shadow(i) } else { 1.0 };
            color += (diffuse + primary + secondary) * light.color * light.intensity * transmittance;
        }

        color + base * params.headlight_strength * sin_between(tangent, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tangent_parallel_to_light_gets_no_diffuse() {
        let params = HairShadingParams {
            ambient_strength: 0.0,
            headlight_strength: 0.0,
            primary: SpecularLobe {
                strength: 0.0,
                ..HairShadingParams::default().primary
            },
            secondary: SpecularLobe {
                strength: 0.0,
                ..HairShadingParams::default().secondary
            },
            ..HairShadingParams::default()
        };
        let light = DirectionalLight::new(Vec3::NEG_Y, Vec3::ONE, 1.0);
        let lights = [light];
        let shader = HairShader::new(&lights, Vec3::new(0.0, 0.0, 5.0));

        let along = HairSurface {
            position: Vec3::ZERO,
            tangent: Vec3::Y,
            t: 0.5,
        };
        let across = HairSurface {
            tangent: Vec3::X,
            ..along
        };
        assert!(shader.shade(&params, &along, |_| 1.0).length() < 1e-5);
        assert!(shader.shade(&params, &across, |_| 1.0).length() > 0.0);
    }

    #[test]
    fn full_shadow_leaves_ambient_and_headlight() {
        let params = HairShadingParams::default();
        let lights = [DirectionalLight::default()];
        let shader = HairShader::new(&lights, Vec3::new(0.0, 0.0, 5.0));
        let surface = HairSurface {
            position: Vec3::ZERO,
            tangent: Vec3::Y,
            t: 0.0,
        };
        let lit = shader.shade(&params, &surface, |_| 1.0);
        let dark = shader.shade(&params, &surface, |_| 0.0);
        assert!(dark.x < lit.x);

        let no_lights = HairShader::new(&[], Vec3::new(0.0, 0.0, 5.0));
        assert!((no_lights.shade(&params, &surface, |_| 1.0) - dark).length() < 1e-5);
    }
}
