//! Hair System Settings
//!
//! Global configuration consumed once when the [`HairSystem`](crate::HairSystem)
//! is created. Per-group physical constants live in
//! [`SimulationParameters`](crate::simulation::SimulationParameters) instead.
//!
//! Settings deserialize from JSON with every field optional:
//!
//! ```rust,ignore
//! use myth_hair::HairSettings;
//!
//! let settings = HairSettings::from_json_str(r#"{
//!     "time_step": 0.008333,
//!     "forces": { "wind": [2.0, 0.0, 0.0] },
//!     "oit": { "fiber_alpha": 0.4 }
//! }"#)?;
//! ```
//!
//! Every scalar is clamped into range when loaded or assigned, never at solve time.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::simulation::params::GlobalForces;

// ---------------------------------------------------------------------------
// OitSettings
// ---------------------------------------------------------------------------

/// Compositing and hair-shadow constants shared by every hair group.
///
/// | Field            | Description                                        | Default  |
/// |------------------|----------------------------------------------------|----------|
/// | `fiber_alpha`    | Opacity of a single fully covering fiber           | `0.5`    |
/// | `fiber_radius`   | World-space fiber half-width                       | `0.0008` |
/// | `fiber_spacing`  | Average spacing between fibers along a light ray   | `0.0004` |
/// | `shadow_alpha`   | Light absorbed per fiber in the hair shadow map    | `0.35`   |
/// | `expand_pixels`  | Widen sub-pixel quads to one pixel, scaling alpha  | `true`   |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OitSettings {
    pub fiber_alpha: f32,
    pub fiber_radius: f32,
    pub fiber_spacing: f32,
    pub shadow_alpha: f32,
    /// When set, fibers thinner than a pixel are rasterized one pixel wide and
    /// their alpha is scaled by the true coverage instead.
    pub expand_pixels: bool,
}

impl Default for OitSettings {
    fn default() -> Self {
        Self {
            fiber_alpha: 0.5,
            fiber_radius: 0.0008,
            fiber_spacing: 0.0004,
            shadow_alpha: 0.35,
            expand_pixels: true,
        }
    }
}

impl OitSettings {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.fiber_alpha = clamp_unit(self.fiber_alpha);
        self.shadow_alpha = clamp_unit(self.shadow_alpha);
        self.fiber_radius = clamp_positive(self.fiber_radius, 1e-6);
        self.fiber_spacing = clamp_positive(self.fiber_spacing, 1e-6);
        self
    }
}

// ---------------------------------------------------------------------------
// HairSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HairSettings {
    // === Simulation ===
    /// Fixed simulation step in seconds; the solver never sees the wall clock.
    pub time_step: f32,
    /// Gravity and wind, shared by every group.
    pub forces: GlobalForces,

    // === Rendering ===
    pub oit: OitSettings,
    /// Edge length of each square hair shadow map.
    pub shadow_map_size: u32,
    /// Emit capsule wireframes for debugging.
    pub show_capsules: bool,
    /// Fraction of the longest strand added around the group bounds when culling.
    pub bounds_padding: f32,
}

impl Default for HairSettings {
    fn default() -> Self {
        Self {
            time_step: 1.0 / 60.0,
            forces: GlobalForces::default(),
            oit: OitSettings::default(),
            shadow_map_size: 512,
            show_capsules: false,
            bounds_padding: 0.1,
        }
    }
}

impl HairSettings {
    /// Parses JSON settings; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.clamped())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.time_step = clamp_positive(self.time_step, 1e-5);
        self.oit = self.oit.clamped();
        self.shadow_map_size = self.shadow_map_size.clamp(16, 8192);
        self.bounds_padding = clamp_positive(self.bounds_padding, 0.0);
        if !self.forces.gravity.is_finite() {
            self.forces.gravity = GlobalForces::default().gravity;
        }
        if !self.forces.wind.is_finite() {
            self.forces.wind = glam::Vec3::ZERO;
        }
        self
    }

    pub fn set_time_step(&mut self, seconds: f32) {
        self.time_step = clamp_positive(seconds, 1e-5);
    }

    pub fn set_wind(&mut self, wind: glam::Vec3) {
        if wind.is_finite() {
            self.forces.wind = wind;
        }
    }
}

#[inline]
fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[inline]
fn clamp_positive(value: f32, min: f32) -> f32 {
    if value.is_nan() { min } else { value.max(min) }
}
