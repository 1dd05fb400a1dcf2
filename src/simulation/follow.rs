//! Follow-hair reconstruction.
//!
//! Follow hairs are never simulated. Each frame they are rebuilt from their
//! guide by adding the strand's root offset, rotated and scaled with the bone,
//! and tapered toward the tip:
//!
//! ```text
//! follow[i] = guide[i] + R·s·offset · tip_separation · (1 - t),  t = i / (n - 1)
//! ```
//!
//! A tip separation of zero collapses every follow hair onto its guide.

use crate::resources::strand_asset::StrandAsset;
use crate::scene::attachment::RigidTransform;
use crate::simulation::params::SimulationParameters;
use crate::simulation::state::SimulationState;

/// Rebuilds every follow strand from its guide, then recomputes tangents.
pub fn update_follow_hairs(
    state: &mut SimulationState,
    asset: &StrandAsset,
    params: &SimulationParameters,
    transform: &RigidTransform,
) {
    let vps = asset.vertices_per_strand();
    let follows = asset.follow_hairs_per_guide();
    let offsets = asset.follow_hair_root_offsets();
    let rest = asset.rest_positions();
    let last = (vps - 1) as f32;

    let current = state.current_mut();
    for guide in asset.guide_strands() {
        let guide_start = guide * vps;
        for slot in 1..=follows {
            let strand = guide + slot;
            let offset = transform.transform_vector(offsets[strand]) * params.tip_separation_factor;
            let follow_start = strand * vps;

            for local in 0..vps {
                let taper = 1.0 - local as f32 / last;
                let anchor = current[guide_start + local].truncate();
                let i = follow_start + local;
                current[i] = (anchor + offset * taper).extend(rest[i].w);
            }
        }
    }

    state.recompute_tangents(vps);
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn root_of_follow_hair_sits_at_offset() {
        let guide = vec![Vec3::ZERO, Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, -2.0, 0.0)];
        let asset =
            StrandAsset::from_guides(&[guide], &[Vec3::new(0.1, 0.0, 0.0)], 1.0).unwrap();
        let mut state = SimulationState::new(asset.rest_positions(), asset.vertices_per_strand());
        let params = SimulationParameters::default();

        update_follow_hairs(&mut state, &asset, &params, &RigidTransform::IDENTITY);

        let follow = asset.strand_vertices(1);
        let root = state.current()[follow.start].truncate();
        let tip = state.current()[follow.end - 1].truncate();
        assert!((root - Vec3::new(0.1, 0.0, 0.0)).length() < 1e-6);
        assert!((tip - Vec3::new(0.0, -2.0, 0.0)).length() < 1e-6);
    }
}
