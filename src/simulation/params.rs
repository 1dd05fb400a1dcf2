//! Simulation Parameter Set
//!
//! Per-hair-group physical constants plus the per-frame global forces shared by
//! every group. All ranges are enforced when a value is assigned; the solver
//! assumes validated inputs.
//!
//! The clamps are empirical tuning limits. Stiffness values near 1.0 combined
//! with high iteration counts are not guaranteed to be stable.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::resources::capsule::MAX_CAPSULES;
use crate::scene::attachment::RigidTransform;

/// Upper bound for both iterated constraint passes.
pub const MAX_CONSTRAINT_ITERATIONS: u32 = 20;
/// Upper bound for damping.
pub const MAX_DAMPING: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    pub damping: f32,
    pub global_constraint_stiffness: f32,
    /// Fraction of each strand (from the root) affected by the global constraint.
    pub global_constraint_range: f32,
    pub shock_propagation_strength: f32,
    pub shock_propagation_acceleration_threshold: f32,
    pub local_constraint_stiffness: f32,
    pub local_constraint_iterations: u32,
    pub length_constraint_iterations: u32,
    pub tip_separation_factor: f32,
    /// Indices into the owning group's capsule definitions.
    pub capsule_indices: SmallVec<[usize; MAX_CAPSULES]>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            damping: 0.035,
            global_constraint_stiffness: 0.05,
            global_constraint_range: 0.3,
            shock_propagation_strength: 0.8,
            shock_propagation_acceleration_threshold: 10.0,
            local_constraint_stiffness: 0.9,
            local_constraint_iterations: 2,
            length_constraint_iterations: 2,
            tip_separation_factor: 1.0,
            capsule_indices: SmallVec::new(),
        }
    }
}

impl SimulationParameters {
    /// Parameters with every constraint disabled; useful as a starting point.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self {
            damping: 0.0,
            global_constraint_stiffness: 0.0,
            global_constraint_range: 0.0,
            shock_propagation_strength: 0.0,
            shock_propagation_acceleration_threshold: 0.0,
            local_constraint_stiffness: 0.0,
            local_constraint_iterations: 0,
            length_constraint_iterations: 0,
            tip_separation_factor: 1.0,
            capsule_indices: SmallVec::new(),
        }
    }

    /// Returns a copy with every field forced into its valid range.
    ///
    /// Capsule indices beyond the fixed capacity are dropped with a warning.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.damping = clamp_finite(self.damping, 0.0, MAX_DAMPING);
        self.global_constraint_stiffness = clamp_finite(self.global_constraint_stiffness, 0.0, 1.0);
        self.global_constraint_range = clamp_finite(self.global_constraint_range, 0.0, 1.0);
        self.shock_propagation_strength = clamp_finite(self.shock_propagation_strength, 0.0, 1.0);
        self.shock_propagation_acceleration_threshold =
            clamp_finite(self.shock_propagation_acceleration_threshold, 0.0, f32::MAX);
        self.local_constraint_stiffness = clamp_finite(self.local_constraint_stiffness, 0.0, 1.0);
        self.local_constraint_iterations =
            self.local_constraint_iterations.min(MAX_CONSTRAINT_ITERATIONS);
        self.length_constraint_iterations =
            self.length_constraint_iterations.min(MAX_CONSTRAINT_ITERATIONS);
        self.tip_separation_factor = clamp_finite(self.tip_separation_factor, 0.0, f32::MAX);
        if self.capsule_indices.len() > MAX_CAPSULES {
            log::warn!(
                "Hair group binds {} capsules, keeping the first {MAX_CAPSULES}",
                self.capsule_indices.len()
            );
            self.capsule_indices.truncate(MAX_CAPSULES);
        }
        self
    }

    // === Control surface ===

    pub fn set_damping(&mut self, value: f32) {
        self.damping = clamp_finite(value, 0.0, MAX_DAMPING);
    }

    pub fn set_global_constraint_stiffness(&mut self, value: f32) {
        self.global_constraint_stiffness = clamp_finite(value, 0.0, 1.0);
    }

    pub fn set_global_constraint_range(&mut self, value: f32) {
        self.global_constraint_range = clamp_finite(value, 0.0, 1.0);
    }

    pub fn set_shock_propagation_strength(&mut self, value: f32) {
        self.shock_propagation_strength = clamp_finite(value, 0.0, 1.0);
    }

    pub fn set_shock_propagation_acceleration_threshold(&mut self, value: f32) {
        self.shock_propagation_acceleration_threshold = clamp_finite(value, 0.0, f32::MAX);
    }

    pub fn set_local_constraint_stiffness(&mut self, value: f32) {
        self.local_constraint_stiffness = clamp_finite(value, 0.0, 1.0);
    }

    pub fn set_local_constraint_iterations(&mut self, value: u32) {
        self.local_constraint_iterations = value.min(MAX_CONSTRAINT_ITERATIONS);
    }

    pub fn set_length_constraint_iterations(&mut self, value: u32) {
        self.length_constraint_iterations = value.min(MAX_CONSTRAINT_ITERATIONS);
    }

    pub fn set_tip_separation_factor(&mut self, value: f32) {
        self.tip_separation_factor = clamp_finite(value, 0.0, f32::MAX);
    }

    #[inline]
    pub fn shock_propagation_enabled(&self) -> bool {
        self.shock_propagation_strength > 0.0
    }

    #[inline]
    pub fn local_constraint_enabled(&self) -> bool {
        self.local_constraint_iterations > 0 && self.local_constraint_stiffness > 0.0
    }
}

/// NaN collapses to the lower bound.
#[inline]
fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// External accelerations shared by every hair group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalForces {
    pub gravity: Vec3,
    pub wind: Vec3,
}

impl Default for GlobalForces {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            wind: Vec3::ZERO,
        }
    }
}

impl GlobalForces {
    #[inline]
    pub fn acceleration(&self) -> Vec3 {
        self.gravity + self.wind
    }
}

/// GPU layout of the per-group simulation constants.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GpuSimulationParams {
    /// Rotation quaternion of the bone transform.
    pub rotation: [f32; 4],
    /// xyz = translation, w = uniform scale
    pub translation_scale: [f32; 4],
    /// xyz = gravity + wind, w = time step
    pub acceleration_dt: [f32; 4],
    /// damping, global stiffness, global range, tip separation
    pub shape: [f32; 4],
    /// shock strength, shock threshold, local stiffness, unused
    pub shock_local: [f32; 4],
    /// vertices per strand, strand count, local iterations, length iterations
    pub counts: [u32; 4],
    /// follow hairs per guide, capsule count, unused, unused
    pub extra: [u32; 4],
}

impl GpuSimulationParams {
    #[must_use]
    pub fn new(
        params: &SimulationParameters,
        forces: &GlobalForces,
        transform: &RigidTransform,
        time_step: f32,
        vertices_per_strand: usize,
        strand_count: usize,
        follow_hairs_per_guide: usize,
        capsule_count: usize,
    ) -> Self {
        Self {
            rotation: transform.rotation.to_array(),
            translation_scale: transform.translation.extend(transform.scale).to_array(),
            acceleration_dt: forces.acceleration().extend(time_step).to_array(),
            shape: [
                params.damping,
                params.global_constraint_stiffness,
                params.global_constraint_range,
                params.tip_separation_factor,
            ],
            shock_local: [
                params.shock_propagation_strength,
                params.shock_propagation_acceleration_threshold,
                params.local_constraint_stiffness,
                0.0,
            ],
            counts: [
                vertices_per_strand as u32,
                strand_count as u32,
                params.local_constraint_iterations,
                params.length_constraint_iterations,
            ],
            extra: [follow_hairs_per_guide as u32, capsule_count as u32, 0, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_enforces_ranges() {
        let p = SimulationParameters {
            damping: 0.5,
            global_constraint_stiffness: 2.0,
            global_constraint_range: -1.0,
            shock_propagation_strength: f32::NAN,
            local_constraint_iterations: 1000,
            ..SimulationParameters::default()
        }
        .clamped();

        assert_eq!(p.damping, MAX_DAMPING);
        assert_eq!(p.global_constraint_stiffness, 1.0);
        assert_eq!(p.global_constraint_range, 0.0);
        assert_eq!(p.shock_propagation_strength, 0.0);
        assert_eq!(p.local_constraint_iterations, MAX_CONSTRAINT_ITERATIONS);
    }

    #[test]
    fn setters_clamp_on_assignment() {
        let mut p = SimulationParameters::default();
        p.set_damping(-3.0);
        p.set_local_constraint_stiffness(7.0);
        assert_eq!(p.damping, 0.0);
        assert_eq!(p.local_constraint_stiffness, 1.0);
    }
}
