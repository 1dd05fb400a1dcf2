//! Frame Orchestrator
//!
//! [`HairSystem`] owns every hair group and sequences the hair pipeline once
//! per displayed frame:
//!
//! ```text
//!  (a) visibility          (b) per visible group              (c) once
//!  ┌──────────────┐   ┌──────────────────────────────┐   ┌──────────────────┐
//!  │ frustum test │──►│ place capsules ──► solve     │──►│ upload + OIT run │
//!  │ every group  │   │ (or pose rigidly)            │   │ for visible set  │
//!  └──────────────┘   └──────────────────────────────┘   └──────────────────┘
//! ```
//!
//! Per-group state machine:
//!
//! ```text
//! Hidden ──(enters frustum)──► PreWarming ──(next frame)──► Simulating
//!   ▲                                                           │
//!   └───────────────────────(leaves frustum)────────────────────┘
//! ```
//!
//! A hidden group's buffers are never touched: no physics time accumulates
//! offscreen and the state stays bit-identical until the group is seen again.

use glam::Vec3;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::errors::{HairError, Result};
use crate::renderer::backend::{
    GroupBindings, GroupResourceDesc, GroupUpload, HairRenderBackend, pack_strand_vertices,
};
use crate::renderer::oit::{CompositeStats, FrameTargets, HairDrawBatch, OitPipeline};
use crate::resources::bounds::BoundingBox;
use crate::resources::capsule::{Capsule, CapsuleSet};
use crate::resources::hair_type::HairType;
use crate::resources::shading::{GpuHairShading, HairShadingParams};
use crate::resources::strand_asset::StrandAsset;
use crate::scene::attachment::{
    BoneAttachment, RigidTransform, SkeletonRig, place_capsules,
};
use crate::scene::camera::Camera;
use crate::scene::light::{DirectionalLight, MAX_DIRECTIONAL_LIGHTS};
use crate::settings::HairSettings;
use crate::simulation::integrate::pose_rigidly;
use crate::simulation::params::{GpuSimulationParams, SimulationParameters};
use crate::simulation::solver::{ConstraintSolver, SolveStats, SolverFrame};
use crate::simulation::state::SimulationState;

new_key_type! {
    pub struct HairGroupKey;
}

/// Wireframe segments per capsule ring in the debug overlay.
const CAPSULE_DEBUG_SEGMENTS: usize = 12;

// ============================================================================
// Visibility
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HairGroupVisibility {
    /// Result of the last frustum test.
    pub in_view: bool,
    /// Set on every Hidden → Visible transition, cleared by the solver.
    pub needs_pre_warm: bool,
}

impl Default for HairGroupVisibility {
    fn default() -> Self {
        Self {
            in_view: false,
            needs_pre_warm: true,
        }
    }
}

impl HairGroupVisibility {
    /// Records a frustum test result. Returns `true` if the group just entered view.
    pub fn update(&mut self, in_view: bool) -> bool {
        let entered = in_view && !self.in_view;
        if entered {
            self.needs_pre_warm = true;
        }
        self.in_view = in_view;
        entered
    }

    /// Consumes the one-shot pre-warm request.
    pub fn take_pre_warm(&mut self) -> bool {
        std::mem::take(&mut self.needs_pre_warm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationPhase {
    #[default]
    Hidden,
    PreWarming,
    Simulating,
}

// ============================================================================
// Hair Group
// ============================================================================

/// Everything needed to build one hair group.
#[derive(Debug, Clone)]
pub struct HairGroupDesc {
    pub name: String,
    pub hair_type: HairType,
    pub asset: StrandAsset,
    pub attachment: BoneAttachment,
    /// Capsule definitions in the rest space of the asset, selected by
    /// `parameters.capsule_indices`.
    pub capsules: Vec<Capsule>,
    pub parameters: SimulationParameters,
    pub shading: HairShadingParams,
}

impl HairGroupDesc {
    #[must_use]
    pub fn new(name: impl Into<String>, asset: StrandAsset, attachment: BoneAttachment) -> Self {
        Self {
            name: name.into(),
            hair_type: HairType::Scalp,
            asset,
            attachment,
            capsules: Vec::new(),
            parameters: SimulationParameters::default(),
            shading: HairShadingParams::default(),
        }
    }

    #[must_use]
    pub fn with_hair_type(mut self, hair_type: HairType) -> Self {
        self.hair_type = hair_type;
        self
    }

    /// Collides against every capsule in `capsules`. Set the parameters first:
    /// [`with_parameters`](Self::with_parameters) replaces the binding.
    #[must_use]
    pub fn with_capsules(mut self, capsules: Vec<Capsule>) -> Self {
        self.parameters.capsule_indices = (0..capsules.len()).collect();
        self.capsules = capsules;
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: SimulationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_shading(mut self, shading: HairShadingParams) -> Self {
        self.shading = shading;
        self
    }
}

pub struct HairGroup {
    name: String,
    hair_type: HairType,
    asset: StrandAsset,
    attachment: BoneAttachment,
    capsule_defs: Vec<Capsule>,
    parameters: SimulationParameters,
    shading: HairShadingParams,

    state: SimulationState,
    visibility: HairGroupVisibility,
    phase: SimulationPhase,
    bindings: GroupBindings,
    /// Transform of the last processed frame, `None` before the first one.
    last_transform: Option<RigidTransform>,
    world_capsules: CapsuleSet,
}

impl HairGroup {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn hair_type(&self) -> HairType {
        self.hair_type
    }

    #[inline]
    #[must_use]
    pub fn asset(&self) -> &StrandAsset {
        &self.asset
    }

    #[inline]
    #[must_use]
    pub fn attachment(&self) -> &BoneAttachment {
        &self.attachment
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &SimulationParameters {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn shading(&self) -> &HairShadingParams {
        &self.shading
    }

    pub fn set_shading(&mut self, shading: HairShadingParams) {
        self.shading = shading.clamped();
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    #[inline]
    #[must_use]
    pub fn visibility(&self) -> HairGroupVisibility {
        self.visibility
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &GroupBindings {
        &self.bindings
    }

    #[inline]
    #[must_use]
    pub fn last_transform(&self) -> Option<RigidTransform> {
        self.last_transform
    }

    /// Capsules placed for the last processed frame.
    #[inline]
    #[must_use]
    pub fn world_capsules(&self) -> &CapsuleSet {
        &self.world_capsules
    }

    /// Padded rest bounds carried through `transform`.
    #[must_use]
    pub fn world_bounds(&self, transform: &RigidTransform, padding_fraction: f32) -> BoundingBox {
        self.asset
            .rest_bounds()
            .expand(self.asset.max_strand_length() * padding_fraction)
            .transform(&transform.to_affine())
    }

}

// ============================================================================
// Frame I/O
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub camera: &'a Camera,
    pub lights: &'a [DirectionalLight],
    /// Monotonic frame counter; selects the frame-in-flight resources.
    pub frame_index: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub visible_groups: usize,
    pub culled_groups: usize,
    pub pre_warmed_groups: usize,
    /// Groups whose joint could not be queried this frame.
    pub skipped_groups: usize,
    pub solve_stats: SolveStats,
    pub composite: Option<CompositeStats>,
    /// Capsule wireframes, filled when `show_capsules` is set.
    pub capsule_lines: Vec<[Vec3; 2]>,
}

// ============================================================================
// Hair System
// ============================================================================

pub struct HairSystem {
    settings: HairSettings,
    solver: ConstraintSolver,
    groups: SlotMap<HairGroupKey, HairGroup>,
    by_type: FxHashMap<HairType, SmallVec<[HairGroupKey; 4]>>,
}

impl Default for HairSystem {
    fn default() -> Self {
        Self::new(HairSettings::default())
    }
}

impl HairSystem {
    #[must_use]
    pub fn new(settings: HairSettings) -> Self {
        Self {
            settings: settings.clamped(),
            solver: ConstraintSolver::new(),
            groups: SlotMap::with_key(),
            by_type: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &HairSettings {
        &self.settings
    }

    /// Mutable settings; values are re-clamped before the next frame uses them.
    #[inline]
    pub fn settings_mut(&mut self) -> &mut HairSettings {
        &mut self.settings
    }

    /// A compositing pipeline configured from the current settings.
    pub fn create_oit_pipeline(&self, width: u32, height: u32) -> Result<OitPipeline> {
        OitPipeline::new(
            width,
            height,
            self.settings.oit,
            self.settings.shadow_map_size,
        )
    }

    /// Resizes the backend's size-dependent hair targets.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
        backend: &mut dyn HairRenderBackend,
    ) -> Result<()> {
        log::info!("Resizing hair targets to {width}x{height}");
        backend.resize(width, height)
    }

    // ------------------------------------------------------------------------
    // Group management
    // ------------------------------------------------------------------------

    /// Builds a hair group and its GPU resources.
    ///
    /// On failure the error is logged and returned, and the system is left
    /// exactly as it was.
    pub fn add_group(
        &mut self,
        desc: HairGroupDesc,
        backend: &mut dyn HairRenderBackend,
    ) -> Result<HairGroupKey> {
        let name = desc.name.clone();
        match Self::build_group(desc, backend) {
            Ok(group) => {
                let hair_type = group.hair_type;
                let vertices = group.asset.vertex_count();
                let key = self.groups.insert(group);
                self.by_type.entry(hair_type).or_default().push(key);
                log::info!(
                    "Added {} hair group '{name}' ({vertices} vertices)",
                    hair_type.label()
                );
                Ok(key)
            }
            Err(err) => {
                log::warn!("Rejected hair group '{name}': {err}");
                Err(err)
            }
        }
    }

    fn build_group(
        desc: HairGroupDesc,
        backend: &mut dyn HairRenderBackend,
    ) -> Result<HairGroup> {
        // Capsule bindings are validated up front so a bad index never reaches a frame.
        let world_capsules = place_capsules(
            &RigidTransform::IDENTITY,
            &desc.capsules,
            &desc.parameters.capsule_indices,
        )?;

        let asset = desc.asset;
        let bindings = backend.create_group_bindings(&GroupResourceDesc {
            label: &desc.name,
            vertex_count: asset.vertex_count(),
            triangle_indices: asset.triangle_indices(),
            rest_positions: asset.rest_positions(),
            light_count: MAX_DIRECTIONAL_LIGHTS,
        })?;

        let state = SimulationState::new(asset.rest_positions(), asset.vertices_per_strand());
        Ok(HairGroup {
            name: desc.name,
            hair_type: desc.hair_type,
            asset,
            attachment: desc.attachment,
            capsule_defs: desc.capsules,
            parameters: desc.parameters.clamped(),
            shading: desc.shading.clamped(),
            state,
            visibility: HairGroupVisibility::default(),
            phase: SimulationPhase::Hidden,
            bindings,
            last_transform: None,
            world_capsules,
        })
    }

    /// Removes a group and releases its GPU resources.
    pub fn remove_group(
        &mut self,
        key: HairGroupKey,
        backend: &mut dyn HairRenderBackend,
    ) -> Result<()> {
        let group = self.groups.remove(key).ok_or(HairError::GroupNotFound)?;
        if let Some(keys) = self.by_type.get_mut(&group.hair_type) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_type.remove(&group.hair_type);
            }
        }
        backend.release_group(&group.bindings);
        log::info!("Removed hair group '{}'", group.name);
        Ok(())
    }

    #[must_use]
    pub fn group(&self, key: HairGroupKey) -> Option<&HairGroup> {
        self.groups.get(key)
    }

    pub fn group_mut(&mut self, key: HairGroupKey) -> Option<&mut HairGroup> {
        self.groups.get_mut(key)
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> impl Iterator<Item = (HairGroupKey, &HairGroup)> {
        self.groups.iter()
    }

    #[must_use]
    pub fn groups_of_type(&self, hair_type: HairType) -> &[HairGroupKey] {
        match self.by_type.get(&hair_type) {
            Some(keys) => keys.as_slice(),
            None => &[],
        }
    }

    /// `true` if any group of `hair_type` passed the last frustum test.
    #[must_use]
    pub fn type_in_view(&self, hair_type: HairType) -> bool {
        self.groups_of_type(hair_type)
            .iter()
            .filter_map(|key| self.groups.get(*key))
            .any(|group| group.visibility.in_view)
    }

    /// Replaces a group's simulation parameters, clamped into range.
    pub fn set_parameters(
        &mut self,
        key: HairGroupKey,
        parameters: SimulationParameters,
    ) -> Result<()> {
        let group = self.groups.get_mut(key).ok_or(HairError::GroupNotFound)?;
        group.parameters = parameters.clamped();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Runs the whole hair pipeline for one displayed frame.
    ///
    /// A group whose joint cannot be queried is skipped with a warning. Upload
    /// and compositing failures abort the frame.
    pub fn frame(
        &mut self,
        inputs: &FrameInputs<'_>,
        rig: &dyn SkeletonRig,
        backend: &mut dyn HairRenderBackend,
        oit: Option<(&mut OitPipeline, &mut FrameTargets)>,
    ) -> Result<FrameReport> {
        self.settings = self.settings.clone().clamped();
        let capabilities = backend.capabilities();
        let mut report = FrameReport::default();

        // (a) Visibility
        let frustum = inputs.camera.frustum();
        // The joint is queried once per group; the transform is reused below.
        let mut visible: Vec<(HairGroupKey, RigidTransform)> = Vec::new();
        for (key, group) in &mut self.groups {
            let transform = match group.attachment.world_transform(rig) {
                Ok(transform) => transform,
                Err(err) => {
                    log::warn!("Skipping hair group '{}': {err}", group.name);
                    report.skipped_groups += 1;
                    continue;
                }
            };
            let bounds = group.world_bounds(&transform, self.settings.bounds_padding);
            let in_view = frustum.intersects_box(&bounds);
            let was_in_view = group.visibility.in_view;
            if group.visibility.update(in_view) {
                log::debug!("Hair group '{}' entered view", group.name);
            } else if was_in_view && !in_view {
                log::debug!("Hair group '{}' left view", group.name);
            }

            if in_view {
                visible.push((key, transform));
            } else {
                group.phase = SimulationPhase::Hidden;
                report.culled_groups += 1;
            }
        }

        // (b) Place capsules, then solve
        let mut processed: Vec<(HairGroupKey, RigidTransform)> = Vec::with_capacity(visible.len());
        for (key, transform) in visible {
            let Some(group) = self.groups.get_mut(key) else {
                continue;
            };
            let capsules = match place_capsules(
                &transform,
                &group.capsule_defs,
                &group.parameters.capsule_indices,
            ) {
                Ok(capsules) => capsules,
                Err(err) if !err.is_fatal() => {
                    log::warn!("Skipping hair group '{}': {err}", group.name);
                    report.skipped_groups += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let pre_warm = group.visibility.take_pre_warm();
            group.phase = if pre_warm {
                report.pre_warmed_groups += 1;
                SimulationPhase::PreWarming
            } else {
                SimulationPhase::Simulating
            };

            if capabilities.supports_compute_hair_simulation {
                // On re-entry the pre-warm carries the frozen strands from here.
                let previous = group.last_transform.unwrap_or(transform);
                let frame = SolverFrame::new(
                    transform,
                    &capsules,
                    self.settings.time_step,
                )
                .with_forces(self.settings.forces)
                .with_previous_transform(previous)
                .with_pre_warm(pre_warm);
                let stats = self
                    .solver
                    .step(&mut group.state, &group.asset, &group.parameters, &frame);
                report.solve_stats.accumulate(stats);
            } else {
                pose_rigidly(&mut group.state, &group.asset, &transform);
            }

            group.last_transform = Some(transform);
            group.world_capsules = capsules;
            processed.push((key, transform));
        }
        report.visible_groups = processed.len();

        if report.solve_stats.skipped_edges > 0 {
            log::warn!(
                "Hair solver skipped {} degenerate edges this frame",
                report.solve_stats.skipped_edges
            );
        }

        // (c) Upload, then one composite for the whole visible set
        for (key, transform) in &processed {
            let Some(group) = self.groups.get(*key) else {
                continue;
            };
            let vertices = pack_strand_vertices(
                group.state.current(),
                group.state.tangents(),
                group.asset.thickness_coefficients(),
            );
            let simulation = GpuSimulationParams::new(
                &group.parameters,
                &self.settings.forces,
                transform,
                self.settings.time_step,
                group.asset.vertices_per_strand(),
                group.asset.strand_count(),
                group.asset.follow_hairs_per_guide(),
                group.world_capsules.len(),
            );
            let shading = GpuHairShading::from(&group.shading);
            backend.upload_group(
                &group.bindings,
                &GroupUpload {
                    frame_index: inputs.frame_index,
                    vertices: &vertices,
                    simulation: &simulation,
                    shading: &shading,
                },
            )?;

            if self.settings.show_capsules {
                report
                    .capsule_lines
                    .extend(group.world_capsules.debug_lines(CAPSULE_DEBUG_SEGMENTS));
            }
        }

        if let Some((pipeline, targets)) = oit {
            let batches: Vec<HairDrawBatch<'_>> = processed
                .iter()
                .filter_map(|(key, _)| self.groups.get(*key))
                .map(|group| HairDrawBatch {
                    asset: &group.asset,
                    positions: group.state.current(),
                    tangents: group.state.tangents(),
                    shading: &group.shading,
                    hair_type: group.hair_type,
                })
                .collect();
            pipeline.set_settings(self.settings.oit);
            report.composite =
                Some(pipeline.composite(targets, inputs.camera, inputs.lights, &batches)?);
        }

        log::trace!(
            "Hair frame {}: {} visible, {} culled, {} skipped",
            inputs.frame_index,
            report.visible_groups,
            report.culled_groups,
            report.skipped_groups
        );
        Ok(report)
    }
}
