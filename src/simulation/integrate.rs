//! Integration passes: pre-warm, Verlet integration and the rigid fallback.

use glam::Vec4;

use crate::resources::strand_asset::StrandAsset;
use crate::scene::attachment::RigidTransform;
use crate::simulation::params::SimulationParameters;
use crate::simulation::solver::SolverFrame;
use crate::simulation::state::SimulationState;

/// Warm-up integration for a group that just became visible.
///
/// Runs the integration step and then equates the history buffers with the
/// result so the following regular integration starts from zero velocity.
///
/// A state that has never been simulated is first snapped to the transformed
/// rest pose so it does not start from asset space. A state frozen while its
/// group was hidden is carried rigidly from `frame.previous_transform` to
/// `frame.transform`, so bone motion during the hidden time does not tear the
/// strands away from their roots.
pub fn pre_warm(
    state: &mut SimulationState,
    asset: &StrandAsset,
    params: &SimulationParameters,
    frame: &SolverFrame<'_>,
) {
    if state.frames_simulated() == 0 {
        let posed = posed_rest(asset, &frame.transform);
        state.reset_to(&posed);
    } else if frame.previous_transform != frame.transform {
        let carried: Vec<Vec4> = state
            .current()
            .iter()
            .map(|p| {
                let local = frame.previous_transform.inverse_transform_point(p.truncate());
                frame.transform.transform_point(local).extend(p.w)
            })
            .collect();
        state.reset_to(&carried);
    }
    integrate(state, asset, params, frame);
    state.equalize_history();
}

/// Verlet-style integration of every guide vertex.
///
/// Rotates the ring buffer first: the oldest buffer receives
/// `x + (1 - damping)(x - x_prev) + ½·a·Δt²`. Strand roots are kinematic and
/// placed exactly at their transformed rest position, follow strands included.
/// The rest of a follow strand carries its previous positions until the
/// follow-hair pass rebuilds it.
pub fn integrate(
    state: &mut SimulationState,
    asset: &StrandAsset,
    params: &SimulationParameters,
    frame: &SolverFrame<'_>,
) {
    state.rotate();

    let retain = 1.0 - params.damping;
    let half_accel_dt2 = 0.5 * frame.forces.acceleration() * frame.time_step * frame.time_step;
    let rest = asset.rest_positions();

    let (current, previous, previous_previous) = state.split_mut();

    for strand in 0..asset.strand_count() {
        let range = asset.strand_vertices(strand);
        let root = range.start;
        let is_guide = asset.is_guide(strand);
        if !is_guide {
            current[range.clone()].copy_from_slice(&previous[range.clone()]);
        }
        current[root] = frame.rest_target(asset, root).extend(rest[root].w);
        if !is_guide {
            continue;
        }

        for i in root + 1..range.end {
            let x = previous[i].truncate();
            let x_old = previous_previous[i].truncate();
            let next = x + retain * (x - x_old) + half_accel_dt2;
            current[i] = next.extend(rest[i].w);
        }
    }
}

/// Places every vertex at its transformed rest position.
///
/// Used when the backend cannot run the simulation: hair then follows its
/// bone rigidly.
pub fn pose_rigidly(state: &mut SimulationState, asset: &StrandAsset, transform: &RigidTransform) {
    let posed = posed_rest(asset, transform);
    state.reset_to(&posed);
    state.recompute_tangents(asset.vertices_per_strand());
}

fn posed_rest(asset: &StrandAsset, transform: &RigidTransform) -> Vec<Vec4> {
    asset
        .rest_positions()
        .iter()
        .map(|p| transform.transform_point(p.truncate()).extend(p.w))
        .collect()
}
