//! Strand Asset Model
//!
//! Immutable per-hair-group geometry and topology, produced once by the
//! importer and owned by the hair group for its lifetime.
//!
//! # Layout
//!
//! Strands are stored interleaved: every guide strand is immediately followed by
//! its `follow_hairs_per_guide` follow hairs.
//!
//! ```text
//! strand:  | G0 | F0.0 | F0.1 | G1 | F1.0 | F1.1 | ...
//! vertex:  | 0 .. vps | vps .. 2*vps | ...
//! ```
//!
//! A follow vertex at index `i` in follow slot `k` (1-based) therefore maps to
//! guide vertex `i - k * vertices_per_strand`.
//!
//! Per-vertex arrays (`rest_positions`, `rest_lengths`,
//! `reference_local_frame_vectors`, `thickness_coefficients`) are indexed by
//! global vertex index. `rest_lengths[i]` is the length of edge `i -> i + 1`;
//! the slot of the last vertex of each strand is unused and kept at zero.
//! Per-strand arrays (`global_rotations`, `follow_hair_root_offsets`) are
//! indexed by strand index.

use std::ops::Range;

use glam::{Quat, Vec3, Vec4};

use crate::errors::{HairError, Result};
use crate::resources::bounds::BoundingBox;
use crate::utils::math::{frame_from_segment, rotation_from_x_axis};

/// Raw importer output, validated by [`StrandAsset::new`].
#[derive(Debug, Clone, Default)]
pub struct StrandAssetDesc {
    pub vertices_per_strand: usize,
    pub guide_strand_count: usize,
    pub follow_hairs_per_guide: usize,
    /// xyz = rest position, w = inverse mass (0 for strand roots).
    pub rest_positions: Vec<Vec4>,
    pub rest_lengths: Vec<f32>,
    pub reference_local_frame_vectors: Vec<Vec3>,
    pub global_rotations: Vec<Quat>,
    pub follow_hair_root_offsets: Vec<Vec3>,
    pub thickness_coefficients: Vec<f32>,
    pub triangle_indices: Vec<u32>,
}

/// Validated, immutable strand geometry.
#[derive(Debug, Clone)]
pub struct StrandAsset {
    vertex_count: usize,
    vertices_per_strand: usize,
    guide_strand_count: usize,
    follow_hairs_per_guide: usize,
    rest_positions: Vec<Vec4>,
    rest_lengths: Vec<f32>,
    reference_local_frame_vectors: Vec<Vec3>,
    global_rotations: Vec<Quat>,
    follow_hair_root_offsets: Vec<Vec3>,
    thickness_coefficients: Vec<f32>,
    triangle_indices: Vec<u32>,

    rest_bounds: BoundingBox,
    max_strand_length: f32,
}

impl StrandAsset {
    /// Validates importer output.
    ///
    /// Rejects assets whose vertex count does not match the strand layout,
    /// whose per-vertex or per-strand arrays have the wrong length, or whose
    /// index buffer references vertices outside the expanded quad range.
    pub fn new(desc: StrandAssetDesc) -> Result<Self> {
        let vertex_count = desc.rest_positions.len();
        let expected =
            desc.guide_strand_count * desc.vertices_per_strand * (1 + desc.follow_hairs_per_guide);
        if vertex_count != expected {
            return Err(HairError::TopologyMismatch {
                vertex_count,
                expected,
            });
        }
        if desc.vertices_per_strand < 2 {
            return Err(HairError::InvalidAsset(format!(
                "strands need at least 2 vertices, got {}",
                desc.vertices_per_strand
            )));
        }
        if vertex_count == 0 {
            return Err(HairError::InvalidAsset("asset has no strands".into()));
        }

        let strand_count = desc.guide_strand_count * (1 + desc.follow_hairs_per_guide);
        check_len("rest_lengths", desc.rest_lengths.len(), vertex_count)?;
        check_len(
            "reference_local_frame_vectors",
            desc.reference_local_frame_vectors.len(),
            vertex_count,
        )?;
        check_len(
            "thickness_coefficients",
            desc.thickness_coefficients.len(),
            vertex_count,
        )?;
        check_len("global_rotations", desc.global_rotations.len(), strand_count)?;
        check_len(
            "follow_hair_root_offsets",
            desc.follow_hair_root_offsets.len(),
            strand_count,
        )?;

        if desc.triangle_indices.len() % 3 != 0 {
            return Err(HairError::InvalidAsset(format!(
                "triangle index count {} is not a multiple of 3",
                desc.triangle_indices.len()
            )));
        }
        let expanded_vertices = 2 * vertex_count;
        if let Some(bad) = desc
            .triangle_indices
            .iter()
            .find(|&&i| i as usize >= expanded_vertices)
        {
            return Err(HairError::InvalidAsset(format!(
                "triangle index {bad} out of bounds ({expanded_vertices} expanded vertices)"
            )));
        }

        let rest_bounds =
            BoundingBox::from_points(&desc.rest_positions).unwrap_or(BoundingBox::EMPTY);
        let vps = desc.vertices_per_strand;
        let max_strand_length = desc
            .rest_lengths
            .chunks(vps)
            .map(|lengths| lengths[..vps - 1].iter().sum::<f32>())
            .fold(0.0_f32, f32::max);

        Ok(Self {
            vertex_count,
            vertices_per_strand: desc.vertices_per_strand,
            guide_strand_count: desc.guide_strand_count,
            follow_hairs_per_guide: desc.follow_hairs_per_guide,
            rest_positions: desc.rest_positions,
            rest_lengths: desc.rest_lengths,
            reference_local_frame_vectors: desc.reference_local_frame_vectors,
            global_rotations: desc.global_rotations,
            follow_hair_root_offsets: desc.follow_hair_root_offsets,
            thickness_coefficients: desc.thickness_coefficients,
            triangle_indices: desc.triangle_indices,
            rest_bounds,
            max_strand_length,
        })
    }

    /// Builds a complete asset from guide polylines.
    ///
    /// Every guide receives one follow hair per entry of `follow_offsets`; the
    /// follow's rest pose is the guide shifted by the offset, tapering to the
    /// guide at the tip. Rest lengths, local frames, tapering and the quad index
    /// buffer are derived from the polylines.
    pub fn from_guides(
        guides: &[Vec<Vec3>],
        follow_offsets: &[Vec3],
        tip_thickness: f32,
    ) -> Result<Self> {
        let Some(first) = guides.first() else {
            return Err(HairError::InvalidAsset("no guide strands".into()));
        };
        let vps = first.len();
        if let Some(bad) = guides.iter().find(|g| g.len() != vps) {
            return Err(HairError::InvalidAsset(format!(
                "guide strands must share a vertex count ({vps} vs {})",
                bad.len()
            )));
        }
        if vps < 2 {
            return Err(HairError::InvalidAsset(format!(
                "strands need at least 2 vertices, got {vps}"
            )));
        }

        let follow_count = follow_offsets.len();
        let strand_count = guides.len() * (1 + follow_count);
        let vertex_count = strand_count * vps;

        let mut desc = StrandAssetDesc {
            vertices_per_strand: vps,
            guide_strand_count: guides.len(),
            follow_hairs_per_guide: follow_count,
            rest_positions: Vec::with_capacity(vertex_count),
            rest_lengths: Vec::with_capacity(vertex_count),
            reference_local_frame_vectors: Vec::with_capacity(vertex_count),
            global_rotations: Vec::with_capacity(strand_count),
            follow_hair_root_offsets: Vec::with_capacity(strand_count),
            thickness_coefficients: Vec::with_capacity(vertex_count),
            triangle_indices: Vec::with_capacity(strand_count * (vps - 1) * 6),
        };

        let tip_thickness = tip_thickness.clamp(0.0, 1.0);
        let last = (vps - 1) as f32;

        for guide in guides {
            let mut strands: Vec<(Vec<Vec3>, Vec3)> = Vec::with_capacity(1 + follow_count);
            strands.push((guide.clone(), Vec3::ZERO));
            for &offset in follow_offsets {
                let follow = guide
                    .iter()
                    .enumerate()
                    .map(|(i, p)| *p + offset * (1.0 - i as f32 / last))
                    .collect();
                strands.push((follow, offset));
            }

            for (points, root_offset) in strands {
                let strand_base = desc.rest_positions.len() as u32;
                let (rotation, refs) = compute_local_frames(&points);
                desc.global_rotations.push(rotation);
                desc.follow_hair_root_offsets.push(root_offset);
                desc.reference_local_frame_vectors.extend(refs);

                for (i, p) in points.iter().enumerate() {
                    let inv_mass = if i == 0 { 0.0 } else { 1.0 };
                    desc.rest_positions.push(p.extend(inv_mass));
                    desc.rest_lengths.push(
                        points
                            .get(i + 1)
                            .map_or(0.0, |next| next.distance(*p)),
                    );
                    let t = i as f32 / last;
                    desc.thickness_coefficients
                        .push(1.0 + (tip_thickness - 1.0) * t);
                }

                for i in 0..(vps as u32 - 1) {
                    let v = 2 * (strand_base + i);
                    desc.triangle_indices
                        .extend_from_slice(&[v, v + 1, v + 2, v + 2, v + 1, v + 3]);
                }
            }
        }

        Self::new(desc)
    }

    // ------------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------------

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    pub fn vertices_per_strand(&self) -> usize {
        self.vertices_per_strand
    }

    #[inline]
    pub fn guide_strand_count(&self) -> usize {
        self.guide_strand_count
    }

    #[inline]
    pub fn follow_hairs_per_guide(&self) -> usize {
        self.follow_hairs_per_guide
    }

    /// Total number of strands, guides and follow hairs together.
    #[inline]
    pub fn strand_count(&self) -> usize {
        self.guide_strand_count * (1 + self.follow_hairs_per_guide)
    }

    #[inline]
    pub fn is_guide(&self, strand: usize) -> bool {
        strand % (1 + self.follow_hairs_per_guide) == 0
    }

    /// Strand index of the guide that drives `strand` (itself for guides).
    #[inline]
    pub fn guide_of(&self, strand: usize) -> usize {
        strand - strand % (1 + self.follow_hairs_per_guide)
    }

    /// Global vertex range of a strand.
    #[inline]
    pub fn strand_vertices(&self, strand: usize) -> Range<usize> {
        let start = strand * self.vertices_per_strand;
        start..start + self.vertices_per_strand
    }

    /// Iterator over the strand indices of all guides.
    pub fn guide_strands(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.strand_count()).step_by(1 + self.follow_hairs_per_guide)
    }

    // ------------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------------

    #[inline]
    pub fn rest_positions(&self) -> &[Vec4] {
        &self.rest_positions
    }

    #[inline]
    pub fn rest_lengths(&self) -> &[f32] {
        &self.rest_lengths
    }

    #[inline]
    pub fn reference_local_frame_vectors(&self) -> &[Vec3] {
        &self.reference_local_frame_vectors
    }

    #[inline]
    pub fn global_rotations(&self) -> &[Quat] {
        &self.global_rotations
    }

    #[inline]
    pub fn follow_hair_root_offsets(&self) -> &[Vec3] {
        &self.follow_hair_root_offsets
    }

    #[inline]
    pub fn thickness_coefficients(&self) -> &[f32] {
        &self.thickness_coefficients
    }

    #[inline]
    pub fn triangle_indices(&self) -> &[u32] {
        &self.triangle_indices
    }

    /// Bounds of the rest pose in asset space.
    #[inline]
    pub fn rest_bounds(&self) -> BoundingBox {
        self.rest_bounds
    }

    /// Arc length of the longest strand in the rest pose.
    #[inline]
    pub fn max_strand_length(&self) -> f32 {
        self.max_strand_length
    }
}

fn check_len(name: &str, actual: usize, expected: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(HairError::InvalidAsset(format!(
            "{name} has {actual} entries, expected {expected}"
        )))
    }
}

/// Derives the root frame rotation and the per-vertex reference vectors of a
/// strand: `refs[i + 1]` is edge `i -> i + 1` expressed in the frame of vertex
/// `i`. `refs[0]` is unused.
fn compute_local_frames(points: &[Vec3]) -> (Quat, Vec<Vec3>) {
    let root_rotation = frame_from_segment(points[0], points[1]);
    let mut refs = Vec::with_capacity(points.len());
    refs.push(Vec3::ZERO);

    let mut frame = root_rotation;
    for pair in points.windows(2) {
        let local = frame.inverse() * (pair[1] - pair[0]);
        refs.push(local);
        frame *= rotation_from_x_axis(local);
    }
    (root_rotation, refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(0.0, -(i as f32), 0.0)).collect()
    }

    #[test]
    fn local_frames_of_straight_strand_point_along_x() {
        let (rot, refs) = compute_local_frames(&straight(4));
        assert!((rot * Vec3::X - Vec3::NEG_Y).length() < 1e-5);
        for r in &refs[1..] {
            assert!((*r - Vec3::X).length() < 1e-5, "got {r}");
        }
    }

    #[test]
    fn local_frames_reconstruct_bent_strand() {
        let points = vec![
            Vec3::ZERO,
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.5, -1.8, 0.0),
            Vec3::new(1.4, -2.1, 0.3),
        ];
        let (rot, refs) = compute_local_frames(&points);

        let mut frame = rot;
        let mut p = points[0];
        for i in 1..points.len() {
            p += frame * refs[i];
            assert!((p - points[i]).length() < 1e-4, "vertex {i}: {p} vs {}", points[i]);
            frame *= rotation_from_x_axis(refs[i]);
        }
    }

    #[test]
    fn index_buffer_covers_every_segment() {
        let asset = StrandAsset::from_guides(&[straight(3)], &[], 0.5).unwrap();
        assert_eq!(asset.triangle_indices(), &[0, 1, 2, 2, 1, 3, 2, 3, 4, 4, 3, 5]);
    }
}
