//! K-Buffer Order-Independent Transparency for Hair
//!
//! Composites thousands of unsorted, sub-pixel, alpha-blended fibers without a
//! per-primitive sort. Every pixel keeps a fixed budget of the
//! [`KBUFFER_LAYERS`] nearest fragments; only those are shaded and blended,
//! while every fragment still contributes to the total transmittance.
//!
//! # Pass Sequence
//!
//! ```text
//!  ┌───────┐   ┌────────────┐   ┌───────────────┐   ┌────────────┐   ┌───────────────┐
//!  │ Clear │──►│ Depth Peel │──►│ Depth Resolve │──►│ Fill Color │──►│ Color Resolve │──► FrameTargets
//!  └───────┘   └────────────┘   └───────────────┘   └────────────┘   └───────────────┘
//!               k nearest +      min(k-th, scene)    Σ c·a, Σ a        dst·Πᵢ(1-aᵢ)
//!               Πᵢ (1 - aᵢ)                          within k          + c̄·(1-Πᵢ(1-aᵢ))
//! ```
//!
//! All visible hair groups are batched into a single run: the k-buffer is a
//! frame-scoped resource shared per pixel by every group, and both insertion
//! and accumulation are order-independent at the fragment level.
//!
//! Hair shadow maps are rendered before the peel and sampled in the fill pass.

pub mod raster;
pub mod shading;
pub mod shadow;
pub mod targets;

use glam::{Vec3, Vec4};

use crate::errors::Result;
use crate::resources::hair_type::HairType;
use crate::resources::shading::HairShadingParams;
use crate::resources::strand_asset::StrandAsset;
use crate::scene::camera::Camera;
use crate::scene::light::DirectionalLight;
use crate::settings::OitSettings;

pub use raster::{RasterFragment, rasterize_batch};
pub use shading::{HairShader, HairSurface};
pub use shadow::{HairShadowMap, HairShadowMaps};
pub use targets::{EMPTY_DEPTH, FrameTargets, KBUFFER_LAYERS, OitTargets};

/// Accumulated alpha below this leaves the destination untouched.
pub const MIN_RESOLVE_ALPHA: f32 = 1.0 / 255.0;

/// A single hair fragment as seen by the k-buffer passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OitFragment {
    pub x: u32,
    pub y: u32,
    pub depth: f32,
    pub alpha: f32,
}

/// Strands of one visible hair group, ready to draw.
#[derive(Debug, Clone, Copy)]
pub struct HairDrawBatch<'a> {
    pub asset: &'a StrandAsset,
    pub positions: &'a [Vec4],
    pub tangents: &'a [Vec3],
    pub shading: &'a HairShadingParams,
    pub hair_type: HairType,
}

/// Counters of one composite run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeStats {
    pub batches: usize,
    pub fragments: usize,
    /// Fragments that passed the fill depth test and were shaded.
    pub shaded_fragments: usize,
    pub shadow_maps: usize,
    /// Pixels the color resolve wrote to.
    pub resolved_pixels: usize,
}

/// Owner of the k-buffer surfaces and the per-frame pass sequence.
#[derive(Debug, Clone)]
pub struct OitPipeline {
    targets: OitTargets,
    settings: OitSettings,
    shadow_map_size: u32,
}

impl OitPipeline {
    pub fn new(width: u32, height: u32, settings: OitSettings, shadow_map_size: u32) -> Result<Self> {
        Ok(Self {
            targets: OitTargets::new(width, height)?,
            settings: settings.clamped(),
            shadow_map_size,
        })
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &OitTargets {
        &self.targets
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &OitSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: OitSettings) {
        self.settings = settings.clamped();
    }

    /// Recreates the k-buffer surfaces for a new frame size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.targets.resize(width, height)
    }

    // ── Passes ───────────────────────────────────────────────────────────────

    /// Resets the k-buffer to the empty sentinel, transmittance to one and
    /// accumulated color to zero.
    pub fn clear(&mut self) {
        self.targets.clear();
    }

    /// Inserts each fragment's depth into its pixel's k nearest (insertion
    /// sort, farthest drops out) and multiplies transmittance by `1 - alpha`.
    /// Fragments behind the scene depth are discarded.
    pub fn depth_peel(&mut self, frame: &FrameTargets, fragments: &[OitFragment]) {
        for fragment in fragments {
            if fragment.depth > frame.depth(fragment.x, fragment.y) {
                continue;
            }
            let i = self.targets.index(fragment.x, fragment.y);

            let slots = &mut self.targets.depths[i];
            let mut depth = fragment.depth;
            for slot in slots.iter_mut() {
                if depth < *slot {
                    std::mem::swap(&mut depth, slot);
                }
            }

            self.targets.inv_alpha[i] *= 1.0 - fragment.alpha;
        }
    }

    /// Reconciles the peeled ranking with opaque geometry: the fill pass may
    /// only accept fragments up to the k-th nearest hair depth and never
    /// behind the scene depth.
    pub fn depth_resolve(&mut self, frame: &FrameTargets) {
        let scene = frame.depth_buffer();
        for ((resolved, slots), scene_depth) in self
            .targets
            .resolved_depth
            .iter_mut()
            .zip(&self.targets.depths)
            .zip(scene)
        {
            *resolved = slots[KBUFFER_LAYERS - 1].min(*scene_depth);
        }
    }

    /// Accumulates `(color·alpha, alpha)` for fragments within the resolved
    /// depth. `shade` is only called for fragments that pass the test.
    /// Returns the number of shaded fragments.
    pub fn fill_colors(
        &mut self,
        fragments: &[OitFragment],
        mut shade: impl FnMut(usize, &OitFragment) -> Vec3,
    ) -> usize {
        let mut shaded = 0;
        for (index, fragment) in fragments.iter().enumerate() {
            let i = self.targets.index(fragment.x, fragment.y);
            if fragment.depth > self.targets.resolved_depth[i] {
                continue;
            }
            let color = shade(index, fragment);
            self.targets.accum[i] += (color * fragment.alpha).extend(fragment.alpha);
            shaded += 1;
        }
        shaded
    }

    /// Normalizes the accumulated color and blends it over the frame:
    /// `dst = dst·T + (Σca / Σa)·(1 - T)` with `T` the transmittance.
    /// Returns the number of pixels written.
    pub fn color_resolve(&self, frame: &mut FrameTargets) -> usize {
        let mut written = 0;
        for ((dst, accum), inv_alpha) in frame
            .color_buffer_mut()
            .iter_mut()
            .zip(&self.targets.accum)
            .zip(&self.targets.inv_alpha)
        {
            let alpha = 1.0 - *inv_alpha;
            if alpha < MIN_RESOLVE_ALPHA || accum.w <= 0.0 {
                continue;
            }
            let color = accum.truncate() / accum.w;
            let blended = dst.truncate() * *inv_alpha + color * alpha;
            *dst = blended.extend(dst.w);
            written += 1;
        }
        written
    }

    // ── Full run ─────────────────────────────────────────────────────────────

    /// Runs every pass once for the whole visible set.
    pub fn composite(
        &mut self,
        frame: &mut FrameTargets,
        camera: &Camera,
        lights: &[DirectionalLight],
        batches: &[HairDrawBatch<'_>],
    ) -> Result<CompositeStats> {
        self.resize(frame.width(), frame.height())?;
        let size = (frame.width(), frame.height());

        let shadows = HairShadowMaps::render(lights, batches, self.shadow_map_size);

        let mut fragments = Vec::new();
        for (index, batch) in batches.iter().enumerate() {
            let base_alpha = self.settings.fiber_alpha * batch.shading.opacity;
            rasterize_batch(batch, index, camera, size, &self.settings, base_alpha, &mut fragments);
        }
        let oit_fragments: Vec<OitFragment> = fragments.iter().map(|f| f.oit).collect();

        self.clear();
        self.depth_peel(frame, &oit_fragments);
        self.depth_resolve(frame);

        let shader = HairShader::new(lights, camera.position());
        let settings = self.settings;
        let shaded = self.fill_colors(&oit_fragments, |index, _| {
            let fragment = &fragments[index];
            let batch = &batches[fragment.batch];
            let surface = HairSurface {
                position: fragment.position,
                tangent: fragment.tangent,
                t: fragment.t,
            };
            shader.shade(batch.shading, &surface, |light| {
                shadows.transmittance(light, fragment.position, &settings)
            })
        });

        let resolved = self.color_resolve(frame);

        let stats = CompositeStats {
            batches: batches.len(),
            fragments: fragments.len(),
            shaded_fragments: shaded,
            shadow_maps: shadows.len(),
            resolved_pixels: resolved,
        };
        log::trace!("Hair OIT composite: {stats:?}");
        Ok(stats)
    }
}
