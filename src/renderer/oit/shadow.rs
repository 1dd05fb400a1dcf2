//! Hair shadow maps.
//!
//! One depth-only orthographic map per (shadow-casting light, hair type),
//! rendered before the peeling passes. Each texel stores the light-space
//! distance of the nearest hair fiber. A receiver further along the ray is
//! attenuated by the number of fibers it is assumed to pass through:
//!
//! ```text
//! transmittance = (1 - shadow_alpha) ^ ((d - d_nearest) / fiber_spacing)
//! ```

use glam::{Mat4, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::renderer::oit::HairDrawBatch;
use crate::resources::bounds::BoundingBox;
use crate::resources::hair_type::HairType;
use crate::scene::light::{DirectionalLight, MAX_DIRECTIONAL_LIGHTS};
use crate::settings::OitSettings;

const EMPTY: f32 = f32::MAX;

#[derive(Debug, Clone, PartialEq)]
pub struct HairShadowMap {
    size: u32,
    /// Light view followed by the orthographic projection onto `[-1, 1]²`.
    light_view: Mat4,
    /// Half-extent of the orthographic volume.
    extent: f32,
    bias: f32,
    depths: Vec<f32>,
}

impl HairShadowMap {
    /// Creates an empty map framing `bounds` as seen from `light`.
    #[must_use]
    pub fn new(light: &DirectionalLight, bounds: &BoundingBox, size: u32) -> Self {
        let size = size.max(1);
        let extent = (bounds.size().length() * 0.5 + light.shadow.padding).max(1e-4);
        let light_view = light.view_matrix(bounds.center(), 2.0 * extent);
        Self {
            size,
            light_view,
            extent,
            bias: light.shadow.bias,
            depths: vec![EMPTY; (size * size) as usize],
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// (texel x, texel y, distance along the light) of a world point.
    fn to_texel(&self, point: Vec3) -> Option<(u32, u32, f32)> {
        let view = self.light_view * point.extend(1.0);
        let uv = (view.truncate().truncate() / self.extent) * 0.5 + 0.5;
        if !(0.0..1.0).contains(&uv.x) || !(0.0..1.0).contains(&uv.y) {
            return None;
        }
        let x = (uv.x * self.size as f32) as u32;
        let y = ((1.0 - uv.y) * self.size as f32) as u32;
        Some((x.min(self.size - 1), y.min(self.size - 1), -view.z))
    }

    fn splat(&mut self, point: Vec3) {
        if let Some((x, y, d)) = self.to_texel(point) {
            let texel = &mut self.depths[(y * self.size + x) as usize];
            *texel = texel.min(d);
        }
    }

    /// Renders every strand segment of `positions` into the map.
    pub fn render_strands(&mut self, positions: &[Vec4], vertices_per_strand: usize) {
        let texel_world = 2.0 * self.extent / self.size as f32;
        for strand in positions.chunks(vertices_per_strand.max(1)) {
            for segment in strand.windows(2) {
                let (a, b) = (segment[0].truncate(), segment[1].truncate());
                let steps = (a.distance(b) / texel_world).ceil().max(1.0) as usize;
                for k in 0..=steps {
                    self.splat(a.lerp(b, k as f32 / steps as f32));
                }
            }
            if let [single] = strand {
                self.splat(single.truncate());
            }
        }
    }

    /// Transmittance toward the light at `point`; 1.0 outside the map.
    #[must_use]
    pub fn transmittance(&self, point: Vec3, settings: &OitSettings) -> f32 {
        let Some((x, y, d)) = self.to_texel(point) else {
            return 1.0;
        };
        let nearest = self.depths[(y * self.size + x) as usize];
        if nearest == EMPTY {
            return 1.0;
        }
        let behind = (d - nearest - self.bias).max(0.0);
        (1.0 - settings.shadow_alpha).powf(behind / settings.fiber_spacing)
    }
}

/// All hair shadow maps of one frame.
#[derive(Debug, Clone, Default)]
pub struct HairShadowMaps {
    maps: FxHashMap<(usize, HairType), HairShadowMap>,
}

impl HairShadowMaps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders one map per shadow-casting light per hair type present in
    /// `batches`, each framing the union of that type's bounds.
    #[must_use]
    pub fn render(
        lights: &[DirectionalLight],
        batches: &[HairDrawBatch<'_>],
        size: u32,
    ) -> Self {
        let mut bounds_by_type: FxHashMap<HairType, BoundingBox> = FxHashMap::default();
        for batch in batches {
            let bounds = BoundingBox::from_points_or_empty(batch.positions);
            bounds_by_type
                .entry(batch.hair_type)
                .and_modify(|b| *b = b.union(&bounds))
                .or_insert(bounds);
        }

        let mut maps = FxHashMap::default();
        for (light_index, light) in lights.iter().enumerate().take(MAX_DIRECTIONAL_LIGHTS) {
            if !light.cast_shadows {
                continue;
            }
            for (&hair_type, bounds) in &bounds_by_type {
                if bounds.is_empty() {
                    continue;
                }
                let mut map = HairShadowMap::new(light, bounds, size);
                for batch in batches.iter().filter(|b| b.hair_type == hair_type) {
                    map.render_strands(batch.positions, batch.asset.vertices_per_strand());
                }
                maps.insert((light_index, hair_type), map);
            }
        }
        Self { maps }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    #[must_use]
    pub fn get(&self, light: usize, hair_type: HairType) -> Option<&HairShadowMap> {
        self.maps.get(&(light, hair_type))
    }

    /// Product of the transmittance through every hair type's map for `light`.
    #[must_use]
    pub fn transmittance(&self, light: usize, point: Vec3, settings: &OitSettings) -> f32 {
        self.maps
            .iter()
            .filter(|((index, _), _)| *index == light)
            .map(|(_, map)| map.transmittance(point, settings))
            .product()
    }
}
