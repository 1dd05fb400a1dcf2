//! Shape, shock and length constraint passes.
//!
//! All passes operate in place on the current position buffer and touch guide
//! strands only. Strand roots (local index 0) are never moved.

use glam::{Vec3, Vec4};

use crate::resources::capsule::CapsuleSet;
use crate::resources::strand_asset::StrandAsset;
use crate::simulation::params::SimulationParameters;
use crate::simulation::solver::SolverFrame;
use crate::simulation::state::SimulationState;
use crate::utils::math::rotation_from_x_axis;

/// Rest lengths at or below this are treated as degenerate edges.
pub const MIN_REST_LENGTH: f32 = 1e-6;
/// Current edge lengths at or below this have no usable direction.
const MIN_EDGE_LENGTH: f32 = 1e-7;

/// Pulls free vertices toward their transformed rest position.
///
/// Only vertices whose local index is below `global_constraint_range *
/// vertices_per_strand` are affected, so tips stay free. Capsule penetration
/// is resolved afterwards for every free guide vertex. Returns the number of
/// capsule contacts.
pub fn apply_global_shape_constraint(
    state: &mut SimulationState,
    asset: &StrandAsset,
    params: &SimulationParameters,
    frame: &SolverFrame<'_>,
) -> usize {
    let stiffness = params.global_constraint_stiffness;
    let effective = params.global_constraint_range * asset.vertices_per_strand() as f32;
    let current = state.current_mut();

    if stiffness > 0.0 && effective > 0.0 {
        for strand in asset.guide_strands() {
            let range = asset.strand_vertices(strand);
            for (local, i) in range.enumerate().skip(1) {
                if local as f32 >= effective {
                    break;
                }
                let target = frame.rest_target(asset, i);
                let p = current[i].truncate();
                current[i] = (p + stiffness * (target - p)).extend(current[i].w);
            }
        }
    }

    resolve_capsules(current, asset, frame.capsules)
}

/// Carries abrupt root motion down each strand.
///
/// When a strand root accelerates faster than the configured threshold, the
/// rigid motion of the root frame between the previous and the current frame
/// is applied to the rest of the strand with a weight that falls off linearly
/// from `shock_propagation_strength` at the root to zero at the tip. History
/// buffers receive the same displacement so no velocity spike is introduced.
///
/// Runs per strand rather than per vertex. Returns the number of strands that
/// were corrected.
pub fn propagate_shock(
    state: &mut SimulationState,
    asset: &StrandAsset,
    params: &SimulationParameters,
    frame: &SolverFrame<'_>,
) -> usize {
    let dt2 = (frame.time_step * frame.time_step).max(f32::EPSILON);
    let strength = params.shock_propagation_strength;
    let threshold = params.shock_propagation_acceleration_threshold;
    let last = (asset.vertices_per_strand() - 1) as f32;
    let rotation = frame.transform.delta_rotation_from(&frame.previous_transform);

    let (current, previous, previous_previous) = state.split_mut();
    let mut corrected = 0;

    for strand in asset.guide_strands() {
        let range = asset.strand_vertices(strand);
        let r0 = range.start;

        let root_now = current[r0].truncate();
        let root_prev = previous[r0].truncate();
        let root_prev2 = previous_previous[r0].truncate();
        let acceleration = (root_now - 2.0 * root_prev + root_prev2) / dt2;
        if acceleration.length() <= threshold {
            continue;
        }

        let translation = root_now - rotation * root_prev;

        for (local, i) in range.enumerate().skip(1) {
            let weight = strength * (1.0 - local as f32 / last);
            if weight <= 0.0 {
                break;
            }
            let carry = |p: Vec4| -> Vec4 {
                let x = p.truncate();
                (x + weight * (rotation * x + translation - x)).extend(p.w)
            };
            let shift = carry(previous[i]) - previous[i];
            current[i] += shift;
            previous[i] = carry(previous[i]);
            previous_previous[i] = carry(previous_previous[i]);
        }
        corrected += 1;
    }
    corrected
}

/// Preserves rest curvature while following the strand's bulk motion.
///
/// Each iteration walks every guide strand from root to tip, rebuilding the
/// next vertex from its rest-frame reference vector rotated by the running
/// frame estimate, then re-deriving the frame from the corrected edge. The
/// frame of a strand starts at the bone rotation times the strand's rest
/// rotation. Iterations are separated by a barrier; capsules are resolved
/// after each one. Returns the number of capsule contacts.
pub fn apply_local_shape_constraint(
    state: &mut SimulationState,
    asset: &StrandAsset,
    params: &SimulationParameters,
    frame: &SolverFrame<'_>,
) -> usize {
    let stiffness = 0.5 * params.local_constraint_stiffness;
    let scale = frame.transform.scale;
    let refs = asset.reference_local_frame_vectors();
    let rotations = asset.global_rotations();
    let current = state.current_mut();
    let mut contacts = 0;

    for _ in 0..params.local_constraint_iterations {
        for strand in asset.guide_strands() {
            let range = asset.strand_vertices(strand);
            let mut rotation = frame.transform.rotation * rotations[strand];

            for (local, i) in range.clone().enumerate().take(range.len() - 1) {
                let mut p = current[i].truncate();
                let mut q = current[i + 1].truncate();

                let target = p + rotation * (refs[i + 1] * scale);
                let delta = stiffness * (target - q);
                if local > 0 {
                    p -= delta;
                }
                q += delta;

                current[i] = p.extend(current[i].w);
                current[i + 1] = q.extend(current[i + 1].w);

                let local_dir = rotation.inverse() * (q - p);
                rotation = (rotation * rotation_from_x_axis(local_dir)).normalize();
            }
        }
        contacts += resolve_capsules(current, asset, frame.capsules);
    }
    contacts
}

/// Projects every guide edge back to its rest length.
///
/// Each iteration sweeps every strand from root to tip; the root edge moves
/// only its outer vertex, other edges split the correction evenly. Edges with
/// zero rest length are skipped. Tangents are recomputed once all iterations
/// have run. Returns the number of degenerate edges skipped per iteration.
pub fn apply_length_constraint(
    state: &mut SimulationState,
    asset: &StrandAsset,
    iterations: u32,
    scale: f32,
) -> usize {
    let rest_lengths = asset.rest_lengths();
    let mut skipped = 0;

    {
        let current = state.current_mut();
        for iteration in 0..iterations {
            for strand in asset.guide_strands() {
                let range = asset.strand_vertices(strand);
                for (local, i) in range.clone().enumerate().take(range.len() - 1) {
                    if rest_lengths[i] <= MIN_REST_LENGTH {
                        if iteration == 0 {
                            skipped += 1;
                        }
                        continue;
                    }
                    let p = current[i].truncate();
                    let q = current[i + 1].truncate();
                    let delta = q - p;
                    let distance = delta.length();
                    if distance <= MIN_EDGE_LENGTH {
                        continue;
                    }
                    let correction = delta * (1.0 - rest_lengths[i] * scale / distance);
                    let (p, q) = if local == 0 {
                        (p, q - correction)
                    } else {
                        (p + 0.5 * correction, q - 0.5 * correction)
                    };
                    current[i] = p.extend(current[i].w);
                    current[i + 1] = q.extend(current[i + 1].w);
                }
            }
        }
    }

    state.recompute_tangents(asset.vertices_per_strand());
    skipped
}

/// Soft collision: pushes free guide vertices out of every capsule.
fn resolve_capsules(current: &mut [Vec4], asset: &StrandAsset, capsules: &CapsuleSet) -> usize {
    if capsules.is_empty() {
        return 0;
    }
    let mut contacts = 0;
    for strand in asset.guide_strands() {
        for i in asset.strand_vertices(strand).skip(1) {
            let p: Vec3 = current[i].truncate();
            let resolved = capsules.resolve(p);
            if resolved != p {
                current[i] = resolved.extend(current[i].w);
                contacts += 1;
            }
        }
    }
    contacts
}

/// Largest absolute deviation from rest length over all guide edges.
#[must_use]
pub fn max_length_deviation(positions: &[Vec4], asset: &StrandAsset, scale: f32) -> f32 {
    let rest_lengths = asset.rest_lengths();
    let mut worst = 0.0_f32;
    for strand in asset.guide_strands() {
        let range = asset.strand_vertices(strand);
        for i in range.start..range.end - 1 {
            let d = positions[i].truncate().distance(positions[i + 1].truncate());
            worst = worst.max((d - rest_lengths[i] * scale).abs());
        }
    }
    worst
}
