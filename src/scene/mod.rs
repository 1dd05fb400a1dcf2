//! Scene Module
//!
//! Everything the hair system reads from the host scene each frame:
//! - [`Camera`]: view/projection matrices and frustum culling
//! - [`DirectionalLight`]: hair shading and hair shadow maps
//! - [`attachment`]: skeletal joint queries and bone-attachment resolution

pub mod attachment;
pub mod camera;
pub mod light;

pub use attachment::{
    BoneAttachment, ResolvedAttachment, RigPoses, RigidTransform, SkeletonRig, resolve_attachment,
};
pub use camera::{Camera, Frustum, ProjectionType};
pub use light::{DirectionalLight, MAX_DIRECTIONAL_LIGHTS, ShadowConfig};
