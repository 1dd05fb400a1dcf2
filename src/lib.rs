#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod settings;
pub mod simulation;
pub mod system;
pub mod utils;

pub use errors::{HairError, Result};
pub use renderer::{
    BackendCapabilities, FrameTargets, HairDepthResourceKind, HairRenderBackend, HeadlessBackend,
    OitPipeline, WgpuHairBackend,
};
pub use resources::{
    Capsule, CapsuleSet, HairPalette, HairShadingParams, HairType, StrandAsset, StrandAssetDesc,
};
pub use scene::{BoneAttachment, Camera, DirectionalLight, RigPoses, RigidTransform, SkeletonRig};
pub use settings::{HairSettings, OitSettings};
pub use simulation::{ConstraintSolver, GlobalForces, SimulationParameters, SimulationState};
pub use system::{
    FrameInputs, FrameReport, HairGroup, HairGroupDesc, HairGroupKey, HairGroupVisibility,
    HairSystem, SimulationPhase,
};
