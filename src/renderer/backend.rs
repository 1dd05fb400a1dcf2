//! Rendering Collaborator Interface
//!
//! The hair core never touches binding slots or descriptor indices. Each hair
//! group, each frame in flight and each shadow-casting light owns an opaque
//! [`BindingHandle`] handed out by the backend; the core only passes those
//! handles back together with the data to upload.
//!
//! Backend differences are resolved once, at initialization, into
//! [`BackendCapabilities`]:
//!
//! | Capability                             | Effect on the hair pipeline                 |
//! |----------------------------------------|---------------------------------------------|
//! | `supports_compute_hair_simulation`     | `false`: groups follow their bone rigidly   |
//! | `preferred_hair_depth_resource_kind`   | k-buffer storage: texture or raw buffer     |

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{HairError, Result};
use crate::resources::shading::GpuHairShading;
use crate::scene::light::MAX_DIRECTIONAL_LIGHTS;
use crate::simulation::params::GpuSimulationParams;

/// Per-group resources are duplicated this many times so the CPU can write
/// frame `n + 1` while the GPU still reads frame `n`.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Storage used for the per-pixel k-buffer depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HairDepthResourceKind {
    /// `R32Uint` storage texture with one layer per k slot.
    #[default]
    Texture,
    /// Flat storage buffer, `k` words per pixel.
    Buffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub supports_compute_hair_simulation: bool,
    pub preferred_hair_depth_resource_kind: HairDepthResourceKind,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            supports_compute_hair_simulation: true,
            preferred_hair_depth_resource_kind: HairDepthResourceKind::Texture,
        }
    }
}

/// Opaque binding handle resolved by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingHandle(u64);

impl BindingHandle {
    #[inline]
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Every handle owned by one hair group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBindings {
    /// Static per-group resources (rest pose, index buffer).
    pub group: BindingHandle,
    /// Per-frame-in-flight simulation/shading uniforms.
    pub frames: SmallVec<[BindingHandle; FRAMES_IN_FLIGHT]>,
    /// Per-light shadow bindings.
    pub lights: SmallVec<[BindingHandle; MAX_DIRECTIONAL_LIGHTS]>,
}

impl GroupBindings {
    #[must_use]
    pub fn frame(&self, frame_index: u64) -> BindingHandle {
        let slot = (frame_index % self.frames.len().max(1) as u64) as usize;
        self.frames.get(slot).copied().unwrap_or(self.group)
    }
}

/// Sizes and static data needed to allocate one group's resources.
#[derive(Debug, Clone, Copy)]
pub struct GroupResourceDesc<'a> {
    pub label: &'a str,
    pub vertex_count: usize,
    pub triangle_indices: &'a [u32],
    pub rest_positions: &'a [Vec4],
    pub light_count: usize,
}

impl GroupResourceDesc<'_> {
    /// Bytes the backend must allocate for this group.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        let vertex_bytes = (self.vertex_count * std::mem::size_of::<GpuStrandVertex>()) as u64;
        let index_bytes = std::mem::size_of_val(self.triangle_indices) as u64;
        let uniform_bytes = (std::mem::size_of::<GpuSimulationParams>()
            + std::mem::size_of::<GpuHairShading>()) as u64;
        // current, previous, previous-previous, rest
        4 * vertex_bytes + index_bytes + FRAMES_IN_FLIGHT as u64 * uniform_bytes
    }
}

/// Per-vertex record uploaded for rendering.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuStrandVertex {
    /// xyz = position, w = inverse mass
    pub position: [f32; 4],
    /// xyz = tangent, w = thickness coefficient
    pub tangent: [f32; 4],
}

/// Packs positions, tangents and thickness into the vertex stream.
#[must_use]
pub fn pack_strand_vertices(
    positions: &[Vec4],
    tangents: &[Vec3],
    thickness: &[f32],
) -> Vec<GpuStrandVertex> {
    positions
        .iter()
        .zip(tangents)
        .zip(thickness)
        .map(|((p, t), w)| GpuStrandVertex {
            position: p.to_array(),
            tangent: t.extend(*w).to_array(),
        })
        .collect()
}

/// Data uploaded for a visible group once per frame.
#[derive(Debug, Clone, Copy)]
pub struct GroupUpload<'a> {
    pub frame_index: u64,
    pub vertices: &'a [GpuStrandVertex],
    pub simulation: &'a GpuSimulationParams,
    pub shading: &'a GpuHairShading,
}

/// Interface of the external rendering collaborator.
pub trait HairRenderBackend {
    /// Resolved once at initialization; must not change afterwards.
    fn capabilities(&self) -> BackendCapabilities;

    /// Allocates every resource a hair group needs. Failure rejects the group.
    fn create_group_bindings(&mut self, desc: &GroupResourceDesc<'_>) -> Result<GroupBindings>;

    /// Writes per-frame data. Any error here aborts the frame.
    fn upload_group(&mut self, bindings: &GroupBindings, upload: &GroupUpload<'_>) -> Result<()>;

    fn release_group(&mut self, bindings: &GroupBindings);

    /// Recreates size-dependent resources (k-buffer, accumulation targets).
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;
}

// ── HeadlessBackend ──────────────────────────────────────────────────────────

/// Last upload seen for one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedUpload {
    pub frame_index: u64,
    pub frame_binding: Option<BindingHandle>,
    pub vertices: Vec<GpuStrandVertex>,
    pub uploads: u64,
}

/// Backend without a device: tracks allocations against a memory budget and
/// records every upload. Used by tests and the headless demo.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    capabilities: BackendCapabilities,
    memory_budget: u64,
    allocated: u64,
    allocations: FxHashMap<BindingHandle, u64>,
    uploads: FxHashMap<BindingHandle, RecordedUpload>,
    next_handle: u64,
    fail_uploads: bool,
    size: (u32, u32),
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(BackendCapabilities::default())
    }
}

impl HeadlessBackend {
    #[must_use]
    pub fn new(capabilities: BackendCapabilities) -> Self {
        Self {
            capabilities,
            memory_budget: u64::MAX,
            allocated: 0,
            allocations: FxHashMap::default(),
            uploads: FxHashMap::default(),
            next_handle: 1,
            fail_uploads: false,
            size: (0, 0),
        }
    }

    #[must_use]
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Makes every following upload fail with [`HairError::OutOfMemory`].
    pub fn set_fail_uploads(&mut self, fail: bool) {
        self.fail_uploads = fail;
    }

    #[must_use]
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated
    }

    #[must_use]
    pub fn live_groups(&self) -> usize {
        self.allocations.len()
    }

    #[must_use]
    pub fn last_upload(&self, bindings: &GroupBindings) -> Option<&RecordedUpload> {
        self.uploads.get(&bindings.group)
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    fn next(&mut self) -> BindingHandle {
        let handle = BindingHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl HairRenderBackend for HeadlessBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn create_group_bindings(&mut self, desc: &GroupResourceDesc<'_>) -> Result<GroupBindings> {
        let bytes = desc.byte_size();
        if self.allocated.saturating_add(bytes) > self.memory_budget {
            return Err(HairError::GpuAllocation(format!(
                "'{}' needs {bytes} bytes, {} of {} in use",
                desc.label, self.allocated, self.memory_budget
            )));
        }

        let group = self.next();
        let frames = (0..FRAMES_IN_FLIGHT).map(|_| self.next()).collect();
        let lights = (0..desc.light_count.min(MAX_DIRECTIONAL_LIGHTS))
            .map(|_| self.next())
            .collect();

        self.allocated += bytes;
        self.allocations.insert(group, bytes);
        Ok(GroupBindings {
            group,
            frames,
            lights,
        })
    }

    fn upload_group(&mut self, bindings: &GroupBindings, upload: &GroupUpload<'_>) -> Result<()> {
        if self.fail_uploads {
            return Err(HairError::OutOfMemory);
        }
        if !self.allocations.contains_key(&bindings.group) {
            return Err(HairError::GpuAllocation(format!(
                "upload to released binding {:?}",
                bindings.group
            )));
        }
        let record = self.uploads.entry(bindings.group).or_default();
        record.frame_index = upload.frame_index;
        record.frame_binding = Some(bindings.frame(upload.frame_index));
        record.vertices.clear();
        record.vertices.extend_from_slice(upload.vertices);
        record.uploads += 1;
        Ok(())
    }

    fn release_group(&mut self, bindings: &GroupBindings) {
        if let Some(bytes) = self.allocations.remove(&bindings.group) {
            self.allocated -= bytes;
        }
        self.uploads.remove(&bindings.group);
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(HairError::InvalidTargetSize { width, height });
        }
        self.size = (width, height);
        Ok(())
    }
}
