//! Immutable hair resources, independent of the GPU:
//! - [`StrandAsset`]: strand topology and rest geometry
//! - [`Capsule`] / [`CapsuleSet`]: collision primitives
//! - [`HairShadingParams`]: material presets
//! - [`HairType`]: grouping key for batching and shadow maps
//! - [`BoundingBox`]: visibility bounds

pub mod bounds;
pub mod capsule;
pub mod hair_type;
pub mod shading;
pub mod strand_asset;

pub use bounds::BoundingBox;
pub use capsule::{Capsule, CapsuleSet, MAX_CAPSULES};
pub use hair_type::HairType;
pub use shading::{GpuHairShading, HairPalette, HairShadingParams, SpecularLobe};
pub use strand_asset::{StrandAsset, StrandAssetDesc};
