//! GPU-facing side of the hair renderer: blend/target states of the k-buffer
//! passes and the wgpu resource backend.

pub mod blend;
pub mod resources;

pub use resources::{GpuOitTargets, KBufferStorage, WgpuHairBackend, resolve_capabilities};
