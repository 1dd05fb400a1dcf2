//! Strand rasterizer.
//!
//! Strands are drawn as camera-facing ribbons: every strand vertex is expanded
//! into two quad vertices offset along `tangent × view`, and the asset's
//! triangle index buffer (six indices per segment) stitches them together.
//!
//! ```text
//!   2i ●───────● 2i+1        vertex i
//!      │ ╲     │
//!      │   ╲   │
//!      │     ╲ │
//! 2i+2 ●───────● 2i+3        vertex i+1
//! ```
//!
//! Triangles are scan-converted at pixel centers with a consistent tie-break
//! rule, so the shared diagonal of a quad never produces two fragments.

use glam::{Vec2, Vec3};

use crate::renderer::oit::{HairDrawBatch, OitFragment};
use crate::scene::camera::Camera;
use crate::settings::OitSettings;

/// One expanded ribbon vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadVertex {
    pub position: Vec3,
    pub tangent: Vec3,
    /// Normalized arc length along the strand, 0 at the root.
    pub t: f32,
    /// Fraction of the (possibly widened) ribbon actually covered by the fiber.
    pub coverage: f32,
}

/// A rasterized hair fragment with the surface data needed for shading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterFragment {
    pub oit: OitFragment,
    pub position: Vec3,
    pub tangent: Vec3,
    pub t: f32,
    /// Index of the draw batch this fragment came from.
    pub batch: usize,
}

/// Expands every strand vertex of a batch into two ribbon vertices.
///
/// Fibers narrower than a pixel are widened to one pixel when
/// `expand_pixels` is set; the lost width is returned as reduced coverage.
#[must_use]
pub fn expand_strand_quads(
    batch: &HairDrawBatch<'_>,
    camera: &Camera,
    viewport_height: f32,
    settings: &OitSettings,
) -> Vec<QuadVertex> {
    let vps = batch.asset.vertices_per_strand();
    let last = (vps - 1) as f32;
    let thickness = batch.asset.thickness_coefficients();

    let mut quads = Vec::with_capacity(batch.positions.len() * 2);
    for (i, (p, tangent)) in batch.positions.iter().zip(batch.tangents).enumerate() {
        let position = p.truncate();
        let t = (i % vps) as f32 / last;

        let view = camera.view_direction(position);
        let mut side = tangent.cross(view).normalize_or_zero();
        if side == Vec3::ZERO {
            side = tangent.normalize_or(Vec3::Y).any_orthonormal_vector();
        }

        let mut half_width = settings.fiber_radius * thickness[i];
        let mut coverage = 1.0;
        if settings.expand_pixels {
            let pixel = camera.pixel_world_size(position, viewport_height);
            if 2.0 * half_width < pixel {
                coverage = 2.0 * half_width / pixel;
                half_width = 0.5 * pixel;
            }
        }

        for sign in [-1.0, 1.0] {
            quads.push(QuadVertex {
                position: position + side * (sign * half_width),
                tangent: *tangent,
                t,
                coverage,
            });
        }
    }
    quads
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Tie-break: exactly one of the two triangles sharing an edge owns pixels on it.
#[inline]
fn owns_edge(a: Vec2, b: Vec2) -> bool {
    let d = b - a;
    d.y > 0.0 || (d.y == 0.0 && d.x < 0.0)
}

#[inline]
fn inside(w: f32, a: Vec2, b: Vec2) -> bool {
    w > 0.0 || (w == 0.0 && owns_edge(a, b))
}

/// Rasterizes one batch into `out`.
///
/// `base_alpha` is the opacity of a fully covering fiber. Fragments outside
/// the `[0, 1]` depth range are clipped.
pub fn rasterize_batch(
    batch: &HairDrawBatch<'_>,
    batch_index: usize,
    camera: &Camera,
    size: (u32, u32),
    settings: &OitSettings,
    base_alpha: f32,
    out: &mut Vec<RasterFragment>,
) {
    let (width, height) = size;
    let viewport = Vec2::new(width as f32, height as f32);
    let quads = expand_strand_quads(batch, camera, viewport.y, settings);
    let projected: Vec<Option<Vec3>> = quads
        .iter()
        .map(|q| camera.project(q.position, viewport))
        .collect();

    for tri in batch.asset.triangle_indices().chunks_exact(3) {
        let mut ids = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (Some(sa), Some(mut sb), Some(mut sc)) =
            (projected[ids[0]], projected[ids[1]], projected[ids[2]])
        else {
            continue;
        };

        let mut area = edge(sa.truncate(), sb.truncate(), sc.truncate());
        if area.abs() <= f32::EPSILON {
            continue;
        }
        if area < 0.0 {
            std::mem::swap(&mut sb, &mut sc);
            ids.swap(1, 2);
            area = -area;
        }
        let (a, b, c) = (sa.truncate(), sb.truncate(), sc.truncate());

        let min = a.min(b).min(c);
        let max = a.max(b).max(c);
        let x0 = (min.x - 0.5).floor().max(0.0) as i64;
        let y0 = (min.y - 0.5).floor().max(0.0) as i64;
        let x1 = ((max.x - 0.5).ceil() as i64).min(i64::from(width) - 1);
        let y1 = ((max.y - 0.5).ceil() as i64).min(i64::from(height) - 1);
        if x1 < x0 || y1 < y0 {
            continue;
        }

        let [qa, qb, qc] = [quads[ids[0]], quads[ids[1]], quads[ids[2]]];

        for py in y0..=y1 {
            for px in x0..=x1 {
                let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(b, c, p);
                let w1 = edge(c, a, p);
                let w2 = edge(a, b, p);
                if !(inside(w0, b, c) && inside(w1, c, a) && inside(w2, a, b)) {
                    continue;
                }
                let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);

                let depth = l0 * sa.z + l1 * sb.z + l2 * sc.z;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }
                let coverage = l0 * qa.coverage + l1 * qb.coverage + l2 * qc.coverage;

                out.push(RasterFragment {
                    oit: OitFragment {
                        x: px as u32,
                        y: py as u32,
                        depth,
                        alpha: (base_alpha * coverage).clamp(0.0, 1.0),
                    },
                    position: l0 * qa.position + l1 * qb.position + l2 * qc.position,
                    tangent: (l0 * qa.tangent + l1 * qb.tangent + l2 * qc.tangent)
                        .normalize_or_zero(),
                    t: l0 * qa.t + l1 * qb.t + l2 * qc.t,
                    batch: batch_index,
                });
            }
        }
    }
}
