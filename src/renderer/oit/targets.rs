//! Per-pixel surfaces of the k-buffer pipeline and the main frame targets.
//!
//! Depth convention: wgpu NDC z in `[0, 1]`, smaller is closer. The frame's
//! depth buffer clears to `1.0`.

use glam::{Vec3, Vec4};

use crate::errors::{HairError, Result};

/// Number of nearest fragments tracked per pixel.
pub const KBUFFER_LAYERS: usize = 3;
/// Sentinel stored in an empty k-buffer slot.
pub const EMPTY_DEPTH: f32 = f32::MAX;

fn check_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(HairError::InvalidTargetSize { width, height });
    }
    Ok(())
}

// ── FrameTargets ─────────────────────────────────────────────────────────────

/// Main color and scene depth of the frame the hair is composited into.
///
/// Owned by the host frame; opaque geometry and the skybox are expected to be
/// in place before hair is composited.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTargets {
    width: u32,
    height: u32,
    /// Linear RGBA.
    color: Vec<Vec4>,
    depth: Vec<f32>,
}

impl FrameTargets {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        check_size(width, height)?;
        let len = (width * height) as usize;
        Ok(Self {
            width,
            height,
            color: vec![Vec4::new(0.0, 0.0, 0.0, 1.0); len],
            depth: vec![1.0; len],
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height)?;
        }
        Ok(())
    }

    /// Fills color with `clear_color` and resets depth to the far plane.
    pub fn clear(&mut self, clear_color: Vec3) {
        self.color.fill(clear_color.extend(1.0));
        self.depth.fill(1.0);
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    #[inline]
    pub fn color(&self, x: u32, y: u32) -> Vec4 {
        self.color[self.index(x, y)]
    }

    #[inline]
    pub fn depth(&self, x: u32, y: u32) -> f32 {
        self.depth[self.index(x, y)]
    }

    pub fn set_color(&mut self, x: u32, y: u32, color: Vec4) {
        let i = self.index(x, y);
        self.color[i] = color;
    }

    pub fn set_depth(&mut self, x: u32, y: u32, depth: f32) {
        let i = self.index(x, y);
        self.depth[i] = depth;
    }

    #[inline]
    pub fn color_buffer(&self) -> &[Vec4] {
        &self.color
    }

    #[inline]
    pub fn color_buffer_mut(&mut self) -> &mut [Vec4] {
        &mut self.color
    }

    #[inline]
    pub fn depth_buffer(&self) -> &[f32] {
        &self.depth
    }

    /// 8-bit sRGB-encoded RGBA, row-major, for image export.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        let encode = |c: f32| -> u8 {
            let c = c.clamp(0.0, 1.0);
            let srgb = if c <= 0.003_130_8 {
                c * 12.92
            } else {
                1.055 * c.powf(1.0 / 2.4) - 0.055
            };
            (srgb * 255.0 + 0.5) as u8
        };
        self.color
            .iter()
            .flat_map(|c| {
                [
                    encode(c.x),
                    encode(c.y),
                    encode(c.z),
                    (c.w.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
                ]
            })
            .collect()
    }
}

// ── OitTargets ───────────────────────────────────────────────────────────────

/// Frame-scoped k-buffer surfaces shared by every hair group.
#[derive(Debug, Clone, PartialEq)]
pub struct OitTargets {
    width: u32,
    height: u32,
    /// k nearest depths per pixel, ascending.
    pub(crate) depths: Vec<[f32; KBUFFER_LAYERS]>,
    /// Product of `(1 - alpha)` over every fragment.
    pub(crate) inv_alpha: Vec<f32>,
    /// rgb = Σ color·alpha, a = Σ alpha over fragments within the k-buffer.
    pub(crate) accum: Vec<Vec4>,
    /// Depth limit for the fill pass.
    pub(crate) resolved_depth: Vec<f32>,
}

impl OitTargets {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        check_size(width, height)?;
        let len = (width * height) as usize;
        Ok(Self {
            width,
            height,
            depths: vec![[EMPTY_DEPTH; KBUFFER_LAYERS]; len],
            inv_alpha: vec![1.0; len],
            accum: vec![Vec4::ZERO; len],
            resolved_depth: vec![1.0; len],
        })
    }

    /// Reallocates every surface when the size changes. Contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height)?;
            log::info!("Hair OIT targets resized to {width}x{height}");
        }
        Ok(())
    }

    /// Resets every surface to its sentinel.
    pub fn clear(&mut self) {
        self.depths.fill([EMPTY_DEPTH; KBUFFER_LAYERS]);
        self.inv_alpha.fill(1.0);
        self.accum.fill(Vec4::ZERO);
        self.resolved_depth.fill(1.0);
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    #[inline]
    pub fn kbuffer(&self, x: u32, y: u32) -> &[f32; KBUFFER_LAYERS] {
        &self.depths[self.index(x, y)]
    }

    /// Number of occupied k-buffer slots at a pixel.
    #[must_use]
    pub fn layer_count(&self, x: u32, y: u32) -> usize {
        self.kbuffer(x, y)
            .iter()
            .take_while(|d| **d != EMPTY_DEPTH)
            .count()
    }

    #[inline]
    pub fn inv_alpha(&self, x: u32, y: u32) -> f32 {
        self.inv_alpha[self.index(x, y)]
    }

    #[inline]
    pub fn accumulated(&self, x: u32, y: u32) -> Vec4 {
        self.accum[self.index(x, y)]
    }

    #[inline]
    pub fn resolved_depth(&self, x: u32, y: u32) -> f32 {
        self.resolved_depth[self.index(x, y)]
    }
}
