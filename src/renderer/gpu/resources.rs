//! wgpu implementation of the rendering collaborator.
//!
//! # GPU Resources
//!
//! Per hair group:
//! - **Rest StorageBuffer**: rest positions, written once.
//! - **Index Buffer**: the asset's ribbon triangle indices, written once.
//! - **Vertex StorageBuffer × FRAMES_IN_FLIGHT**: [`GpuStrandVertex`] stream.
//! - **Uniform Buffer × FRAMES_IN_FLIGHT**: simulation + shading constants.
//!
//! Per frame size ([`GpuOitTargets`]):
//! - k-buffer depths, either a layered `R32Uint` texture or a storage buffer
//!   depending on [`HairDepthResourceKind`].
//! - Transmittance (`R16Float`) and accumulated color (`Rgba16Float`).

use bytemuck::cast_slice;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{HairError, Result};
use crate::renderer::backend::{
    BackendCapabilities, BindingHandle, FRAMES_IN_FLIGHT, GpuStrandVertex, GroupBindings,
    GroupResourceDesc, GroupUpload, HairDepthResourceKind, HairRenderBackend,
};
use crate::renderer::gpu::blend::{ACCUM_FORMAT, INV_ALPHA_FORMAT, KBUFFER_DEPTH_FORMAT};
use crate::renderer::oit::KBUFFER_LAYERS;
use crate::resources::shading::GpuHairShading;
use crate::scene::light::MAX_DIRECTIONAL_LIGHTS;
use crate::simulation::params::GpuSimulationParams;

// ── Constants ────────────────────────────────────────────────────────────────

const SIMULATION_UNIFORM_SIZE: u64 = std::mem::size_of::<GpuSimulationParams>() as u64;
const SHADING_UNIFORM_SIZE: u64 = std::mem::size_of::<GpuHairShading>() as u64;

/// Upper bound of `min_uniform_buffer_offset_alignment` across backends.
const UNIFORM_ALIGN: u64 = 256;

fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

// ── Capabilities ─────────────────────────────────────────────────────────────

/// Derives the hair capabilities of an adapter once, at initialization.
#[must_use]
pub fn resolve_capabilities(adapter: &wgpu::Adapter) -> BackendCapabilities {
    let downlevel = adapter.get_downlevel_capabilities();
    let info = adapter.get_info();
    let preferred_hair_depth_resource_kind = if info.backend == wgpu::Backend::Gl {
        HairDepthResourceKind::Buffer
    } else {
        HairDepthResourceKind::Texture
    };
    BackendCapabilities {
        supports_compute_hair_simulation: downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
        preferred_hair_depth_resource_kind,
    }
}

// ── Per-group buffers ────────────────────────────────────────────────────────

struct GroupBuffers {
    rest: wgpu::Buffer,
    indices: wgpu::Buffer,
    vertices: SmallVec<[wgpu::Buffer; FRAMES_IN_FLIGHT]>,
    uniforms: SmallVec<[wgpu::Buffer; FRAMES_IN_FLIGHT]>,
    bytes: u64,
}

// ── OIT targets ──────────────────────────────────────────────────────────────

pub enum KBufferStorage {
    Texture(wgpu::Texture),
    Buffer(wgpu::Buffer),
}

/// Size-dependent surfaces of the k-buffer pipeline.
pub struct GpuOitTargets {
    pub width: u32,
    pub height: u32,
    pub depths: KBufferStorage,
    pub inv_alpha: wgpu::Texture,
    pub accum: wgpu::Texture,
}

impl GpuOitTargets {
    pub fn new(
        device: &wgpu::Device,
        kind: HairDepthResourceKind,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(HairError::InvalidTargetSize { width, height });
        }
        let limit = device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(HairError::GpuAllocation(format!(
                "hair OIT targets {width}x{height} exceed the {limit} texture limit"
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let surface = |label: &str, format: wgpu::TextureFormat| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };

        let depths = match kind {
            HairDepthResourceKind::Texture => {
                KBufferStorage::Texture(device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Hair KBuffer Depths"),
                    size: wgpu::Extent3d {
                        depth_or_array_layers: KBUFFER_LAYERS as u32,
                        ..size
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: KBUFFER_DEPTH_FORMAT,
                    usage: wgpu::TextureUsages::STORAGE_BINDING,
                    view_formats: &[],
                }))
            }
            HairDepthResourceKind::Buffer => {
                let bytes = u64::from(width) * u64::from(height) * KBUFFER_LAYERS as u64 * 4;
                if bytes > u64::from(device.limits().max_storage_buffer_binding_size) {
                    return Err(HairError::GpuAllocation(format!(
                        "k-buffer of {bytes} bytes exceeds the storage binding limit"
                    )));
                }
                KBufferStorage::Buffer(device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Hair KBuffer Depths StorageBuffer"),
                    size: bytes,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }))
            }
        };

        Ok(Self {
            width,
            height,
            depths,
            inv_alpha: surface("Hair OIT Transmittance", INV_ALPHA_FORMAT),
            accum: surface("Hair OIT Accumulated Color", ACCUM_FORMAT),
        })
    }
}

// ── WgpuHairBackend ──────────────────────────────────────────────────────────

/// Owns every hair GPU resource on one device.
pub struct WgpuHairBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: BackendCapabilities,
    groups: FxHashMap<BindingHandle, GroupBuffers>,
    oit: Option<GpuOitTargets>,
    next_handle: u64,
}

impl WgpuHairBackend {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, capabilities: BackendCapabilities) -> Self {
        Self {
            device,
            queue,
            capabilities,
            groups: FxHashMap::default(),
            oit: None,
            next_handle: 1,
        }
    }

    #[must_use]
    pub fn oit_targets(&self) -> Option<&GpuOitTargets> {
        self.oit.as_ref()
    }

    #[must_use]
    pub fn live_groups(&self) -> usize {
        self.groups.len()
    }

    fn next(&mut self) -> BindingHandle {
        let handle = BindingHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer> {
        let limit = self.device.limits().max_buffer_size;
        if size > limit {
            return Err(HairError::GpuAllocation(format!(
                "{label}: {size} bytes exceeds the {limit} byte buffer limit"
            )));
        }
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(4),
            usage,
            mapped_at_creation: false,
        }))
    }
}

impl HairRenderBackend for WgpuHairBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn create_group_bindings(&mut self, desc: &GroupResourceDesc<'_>) -> Result<GroupBindings> {
        let vertex_bytes = (desc.vertex_count * std::mem::size_of::<GpuStrandVertex>()) as u64;
        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;

        let rest = self.create_buffer(
            &format!("{} Rest StorageBuffer", desc.label),
            std::mem::size_of_val(desc.rest_positions) as u64,
            storage,
        )?;
        let indices = self.create_buffer(
            &format!("{} Index Buffer", desc.label),
            std::mem::size_of_val(desc.triangle_indices) as u64,
            wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        )?;
        self.queue.write_buffer(&rest, 0, cast_slice(desc.rest_positions));
        self.queue.write_buffer(&indices, 0, cast_slice(desc.triangle_indices));

        let uniform_size =
            align_up(SIMULATION_UNIFORM_SIZE, UNIFORM_ALIGN) + SHADING_UNIFORM_SIZE;
        let mut vertices = SmallVec::new();
        let mut uniforms = SmallVec::new();
        for frame in 0..FRAMES_IN_FLIGHT {
            vertices.push(self.create_buffer(
                &format!("{} Vertices[{frame}]", desc.label),
                vertex_bytes,
                storage | wgpu::BufferUsages::VERTEX,
            )?);
            uniforms.push(self.create_buffer(
                &format!("{} Uniforms[{frame}]", desc.label),
                uniform_size,
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            )?);
        }

        let group = self.next();
        let frames = (0..FRAMES_IN_FLIGHT).map(|_| self.next()).collect();
        let lights = (0..desc.light_count.min(MAX_DIRECTIONAL_LIGHTS))
            .map(|_| self.next())
            .collect();

        let bytes = desc.byte_size();
        self.groups.insert(
            group,
            GroupBuffers {
                rest,
                indices,
                vertices,
                uniforms,
                bytes,
            },
        );
        log::debug!("Allocated {bytes} bytes of hair resources for '{}'", desc.label);

        Ok(GroupBindings {
            group,
            frames,
            lights,
        })
    }

    fn upload_group(&mut self, bindings: &GroupBindings, upload: &GroupUpload<'_>) -> Result<()> {
        let buffers = self.groups.get(&bindings.group).ok_or_else(|| {
            HairError::GpuAllocation(format!("upload to released binding {:?}", bindings.group))
        })?;
        let slot = (upload.frame_index % FRAMES_IN_FLIGHT as u64) as usize;

        let vertex_buffer = &buffers.vertices[slot];
        let bytes: &[u8] = cast_slice(upload.vertices);
        if bytes.len() as u64 > vertex_buffer.size() {
            return Err(HairError::OutOfMemory);
        }
        self.queue.write_buffer(vertex_buffer, 0, bytes);

        let uniforms = &buffers.uniforms[slot];
        self.queue
            .write_buffer(uniforms, 0, bytemuck::bytes_of(upload.simulation));
        self.queue.write_buffer(
            uniforms,
            align_up(SIMULATION_UNIFORM_SIZE, UNIFORM_ALIGN),
            bytemuck::bytes_of(upload.shading),
        );
        Ok(())
    }

    fn release_group(&mut self, bindings: &GroupBindings) {
        if let Some(buffers) = self.groups.remove(&bindings.group) {
            buffers.rest.destroy();
            buffers.indices.destroy();
            for buffer in buffers.vertices.iter().chain(&buffers.uniforms) {
                buffer.destroy();
            }
            log::debug!("Released {} bytes of hair resources", buffers.bytes);
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self
            .oit
            .as_ref()
            .is_some_and(|t| t.width == width && t.height == height)
        {
            return Ok(());
        }
        self.oit = Some(GpuOitTargets::new(
            &self.device,
            self.capabilities.preferred_hair_depth_resource_kind,
            width,
            height,
        )?);
        log::info!("Hair GPU OIT targets resized to {width}x{height}");
        Ok(())
    }
}
