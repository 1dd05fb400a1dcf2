//! Constraint Solver
//!
//! Advances one hair group's [`SimulationState`] by exactly one fixed time step.
//!
//! # Pass order
//!
//! ```text
//! [PreWarm]? → Integrate → GlobalShape(+capsules) → [ShockPropagation]?
//!           → [LocalShape × N (+capsules)]? → Length × M (+tangents) → [FollowHairs]?
//! ```
//!
//! Every pass reads only what the previous pass finished writing; on the GPU
//! each arrow is a full pipeline barrier. Passes must not be reordered.
//!
//! Only guide strands are simulated. Follow hairs are rebuilt from their guide
//! at the end of the frame.

use glam::Vec3;

use crate::resources::capsule::CapsuleSet;
use crate::resources::strand_asset::StrandAsset;
use crate::scene::attachment::RigidTransform;
use crate::simulation::constraints::{
    apply_global_shape_constraint, apply_length_constraint, apply_local_shape_constraint,
    propagate_shock,
};
use crate::simulation::follow::update_follow_hairs;
use crate::simulation::integrate::{integrate, pre_warm};
use crate::simulation::params::{GlobalForces, SimulationParameters};
use crate::simulation::state::SimulationState;

/// Per-frame solver inputs for one hair group.
#[derive(Debug, Clone, Copy)]
pub struct SolverFrame<'a> {
    /// Rest-to-world transform for this frame.
    pub transform: RigidTransform,
    /// Rest-to-world transform of the previous simulated frame.
    pub previous_transform: RigidTransform,
    /// World-space capsules.
    pub capsules: &'a CapsuleSet,
    pub forces: GlobalForces,
    pub time_step: f32,
    /// Run the warm-up integration before the regular passes.
    pub pre_warm: bool,
}

impl<'a> SolverFrame<'a> {
    #[must_use]
    pub fn new(transform: RigidTransform, capsules: &'a CapsuleSet, time_step: f32) -> Self {
        Self {
            transform,
            previous_transform: transform,
            capsules,
            forces: GlobalForces::default(),
            time_step,
            pre_warm: false,
        }
    }

    #[must_use]
    pub fn with_forces(mut self, forces: GlobalForces) -> Self {
        self.forces = forces;
        self
    }

    #[must_use]
    pub fn with_previous_transform(mut self, previous: RigidTransform) -> Self {
        self.previous_transform = previous;
        self
    }

    #[must_use]
    pub fn with_pre_warm(mut self, pre_warm: bool) -> Self {
        self.pre_warm = pre_warm;
        self
    }

    /// World-space rest position of global vertex `index`.
    #[inline]
    pub(crate) fn rest_target(&self, asset: &StrandAsset, index: usize) -> Vec3 {
        self.transform
            .transform_point(asset.rest_positions()[index].truncate())
    }
}

/// Counters describing what the solver skipped or corrected this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// Edges with (near) zero rest length left uncorrected.
    pub skipped_edges: usize,
    /// Strands whose root acceleration triggered shock propagation.
    pub shock_strands: usize,
    /// Vertex positions pushed out of a capsule.
    pub capsule_contacts: usize,
}

impl SolveStats {
    pub fn accumulate(&mut self, other: SolveStats) {
        self.skipped_edges += other.skipped_edges;
        self.shock_strands += other.shock_strands;
        self.capsule_contacts += other.capsule_contacts;
    }
}

/// Stateless driver for the fixed pass sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintSolver;

impl ConstraintSolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs every pass once for one frame.
    pub fn step(
        &self,
        state: &mut SimulationState,
        asset: &StrandAsset,
        params: &SimulationParameters,
        frame: &SolverFrame<'_>,
    ) -> SolveStats {
        let mut stats = SolveStats::default();

        if frame.pre_warm {
            pre_warm(state, asset, params, frame);
        }

        integrate(state, asset, params, frame);

        stats.capsule_contacts += apply_global_shape_constraint(state, asset, params, frame);

        if params.shock_propagation_enabled() {
            stats.shock_strands += propagate_shock(state, asset, params, frame);
        }

        if params.local_constraint_enabled() {
            stats.capsule_contacts += apply_local_shape_constraint(state, asset, params, frame);
        }

        stats.skipped_edges += apply_length_constraint(
            state,
            asset,
            params.length_constraint_iterations,
            frame.transform.scale,
        );

        if asset.follow_hairs_per_guide() > 0 {
            update_follow_hairs(state, asset, params, &frame.transform);
        }

        state.mark_simulated();

        if stats.skipped_edges > 0 {
            log::trace!(
                "Hair solver skipped {} degenerate edges",
                stats.skipped_edges
            );
        }
        stats
    }
}
