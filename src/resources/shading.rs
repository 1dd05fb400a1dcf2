//! Per-hair-group shading parameters.
//!
//! Kajiya-Kay style diffuse plus two shifted specular lobes (a sharp primary
//! reflection and a broader, tinted secondary one), with a root-to-tip color
//! gradient selected from a named palette.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Named root/strand color pairs exposed to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HairPalette {
    Black,
    Brown,
    Blonde,
    Ginger,
    White,
    Custom { root: Vec3, strand: Vec3 },
}

impl HairPalette {
    /// Linear-space (root, strand) colors.
    #[must_use]
    pub fn colors(self) -> (Vec3, Vec3) {
        match self {
            HairPalette::Black => (Vec3::new(0.01, 0.01, 0.01), Vec3::new(0.03, 0.025, 0.02)),
            HairPalette::Brown => (Vec3::new(0.08, 0.04, 0.02), Vec3::new(0.2, 0.1, 0.05)),
            HairPalette::Blonde => (Vec3::new(0.5, 0.38, 0.2), Vec3::new(0.9, 0.8, 0.6)),
            HairPalette::Ginger => (Vec3::new(0.3, 0.08, 0.02), Vec3::new(0.5, 0.2, 0.05)),
            HairPalette::White => (Vec3::new(0.8, 0.8, 0.8), Vec3::new(0.95, 0.95, 0.95)),
            HairPalette::Custom { root, strand } => (root, strand),
        }
    }

    /// Looks a palette up by its display name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "black" => Some(HairPalette::Black),
            "brown" => Some(HairPalette::Brown),
            "blonde" => Some(HairPalette::Blonde),
            "ginger" | "red" => Some(HairPalette::Ginger),
            "white" | "gray" | "grey" => Some(HairPalette::White),
            _ => None,
        }
    }
}

/// Specular lobe of the hair BSDF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecularLobe {
    pub color: Vec3,
    pub power: f32,
    pub strength: f32,
    /// Tangent shift along the normal, emulating tilted cuticle scales.
    pub shift: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HairShadingParams {
    pub palette: HairPalette,
    pub diffuse_strength: f32,
    pub ambient_strength: f32,
    pub primary: SpecularLobe,
    pub secondary: SpecularLobe,
    /// Camera-aligned fill term so hair never goes fully black facing away from lights.
    pub headlight_strength: f32,
    /// Strand opacity before coverage is applied.
    pub opacity: f32,
}

impl Default for HairShadingParams {
    fn default() -> Self {
        Self {
            palette: HairPalette::Brown,
            diffuse_strength: 0.8,
            ambient_strength: 0.15,
            primary: SpecularLobe {
                color: Vec3::new(0.34, 0.17, 0.09),
                power: 160.0,
                strength: 0.27,
                shift: 0.005,
            },
            secondary: SpecularLobe {
                color: Vec3::new(0.54, 0.5, 0.43),
                power: 400.0,
                strength: 0.07,
                shift: -0.06,
            },
            headlight_strength: 0.1,
            opacity: 0.6,
        }
    }
}

impl HairShadingParams {
    /// Returns a copy with every scalar forced into its valid range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.diffuse_strength = self.diffuse_strength.max(0.0);
        self.ambient_strength = self.ambient_strength.max(0.0);
        self.headlight_strength = self.headlight_strength.max(0.0);
        self.opacity = self.opacity.clamp(0.0, 1.0);
        for lobe in [&mut self.primary, &mut self.secondary] {
            lobe.power = lobe.power.max(1.0);
            lobe.strength = lobe.strength.max(0.0);
        }
        self
    }

    pub fn set_palette(&mut self, palette: HairPalette) {
        self.palette = palette;
    }

    /// Color at normalized arc length `t` (0 = root, 1 = tip).
    #[must_use]
    pub fn base_color(&self, t: f32) -> Vec3 {
        let (root, strand) = self.palette.colors();
        root.lerp(strand, t.clamp(0.0, 1.0))
    }
}

/// GPU layout of [`HairShadingParams`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GpuHairShading {
    pub root_color: [f32; 4],
    pub strand_color: [f32; 4],
    /// rgb = color, a = power
    pub primary: [f32; 4],
    /// rgb = color, a = power
    pub secondary: [f32; 4],
    /// primary strength, primary shift, secondary strength, secondary shift
    pub lobes: [f32; 4],
    /// diffuse, ambient, headlight, opacity
    pub terms: [f32; 4],
}

impl From<&HairShadingParams> for GpuHairShading {
    fn from(p: &HairShadingParams) -> Self {
        let (root, strand) = p.palette.colors();
        Self {
            root_color: root.extend(1.0).to_array(),
            strand_color: strand.extend(1.0).to_array(),
            primary: p.primary.color.extend(p.primary.power).to_array(),
            secondary: p.secondary.color.extend(p.secondary.power).to_array(),
            lobes: [
                p.primary.strength,
                p.primary.shift,
                p.secondary.strength,
                p.secondary.shift,
            ],
            terms: [
                p.diffuse_strength,
                p.ambient_strength,
                p.headlight_strength,
                p.opacity,
            ],
        }
    }
}
