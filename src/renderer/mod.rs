//! Hair Renderer
//!
//! - [`backend`]: the rendering collaborator interface and a headless backend
//! - [`oit`]: the k-buffer compositing pipeline, rasterizer, shading and shadows
//! - [`gpu`]: wgpu resources and fixed-function states

pub mod backend;
pub mod gpu;
pub mod oit;

pub use backend::{
    BackendCapabilities, BindingHandle, FRAMES_IN_FLIGHT, GpuStrandVertex, GroupBindings,
    GroupResourceDesc, GroupUpload, HairDepthResourceKind, HairRenderBackend, HeadlessBackend,
};
pub use gpu::WgpuHairBackend;
pub use oit::{CompositeStats, FrameTargets, HairDrawBatch, OitFragment, OitPipeline};
