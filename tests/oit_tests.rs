//! Order-Independent Transparency Tests
//!
//! Tests for:
//! - Single opaque fragment per pixel composites to its shaded color exactly
//! - K-buffer insertion keeps the k nearest depths in order
//! - Transmittance accumulation and color normalization
//! - Scene depth occlusion in peel and resolve
//! - Full composite run over rasterized strands

use glam::{Vec3, Vec4};

use myth_hair::renderer::oit::{
    EMPTY_DEPTH, FrameTargets, HairDrawBatch, KBUFFER_LAYERS, OitFragment, OitPipeline,
};
use myth_hair::resources::hair_type::HairType;
use myth_hair::resources::shading::HairShadingParams;
use myth_hair::resources::strand_asset::StrandAsset;
use myth_hair::scene::camera::Camera;
use myth_hair::scene::light::DirectionalLight;
use myth_hair::settings::OitSettings;
use myth_hair::simulation::SimulationState;

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn fragment(x: u32, y: u32, depth: f32, alpha: f32) -> OitFragment {
    OitFragment { x, y, depth, alpha }
}

fn pipeline(width: u32, height: u32) -> OitPipeline {
    OitPipeline::new(width, height, OitSettings::default(), 64).unwrap()
}

/// Runs every pass with per-fragment colors.
fn run(
    pipeline: &mut OitPipeline,
    frame: &mut FrameTargets,
    fragments: &[OitFragment],
    colors: &[Vec3],
) -> (usize, usize) {
    pipeline.clear();
    pipeline.depth_peel(frame, fragments);
    pipeline.depth_resolve(frame);
    let shaded = pipeline.fill_colors(fragments, |index, _| colors[index]);
    let resolved = pipeline.color_resolve(frame);
    (shaded, resolved)
}

// ============================================================================
// Single Fragment Idempotence
// ============================================================================

#[test]
fn single_opaque_fragment_per_pixel_composites_exactly() {
    let mut frame = FrameTargets::new(4, 4).unwrap();
    frame.clear(Vec3::new(0.2, 0.3, 0.4));
    let mut oit = pipeline(4, 4);

    let mut fragments = Vec::new();
    let mut colors = Vec::new();
    for y in 0..4 {
        for x in 0..4 {
            if (x + y) % 2 == 0 {
                fragments.push(fragment(x, y, 0.1 + 0.05 * x as f32, 1.0));
                colors.push(Vec3::new(0.1 * x as f32, 0.7, 0.05 * y as f32 + 0.013));
            }
        }
    }

    let (shaded, resolved) = run(&mut oit, &mut frame, &fragments, &colors);
    assert_eq!(shaded, fragments.len());
    assert_eq!(resolved, fragments.len());

    for (f, color) in fragments.iter().zip(&colors) {
        let out = frame.color(f.x, f.y);
        assert_eq!(out.truncate(), *color, "pixel ({}, {})", f.x, f.y);
        assert_eq!(out.w, 1.0);
    }
    // Pixels without hair are untouched.
    assert_eq!(frame.color(1, 0), Vec4::new(0.2, 0.3, 0.4, 1.0));
}

// ============================================================================
// K-Buffer
// ============================================================================

#[test]
fn kbuffer_keeps_nearest_depths_in_order() {
    let frame = FrameTargets::new(2, 2).unwrap();
    let mut oit = pipeline(2, 2);
    oit.clear();

    let depths = [0.5, 0.2, 0.9, 0.1, 0.7];
    let fragments: Vec<_> = depths.iter().map(|d| fragment(1, 1, *d, 0.5)).collect();
    oit.depth_peel(&frame, &fragments);

    assert_eq!(KBUFFER_LAYERS, 3);
    assert_eq!(*oit.targets().kbuffer(1, 1), [0.1_f32, 0.2, 0.5]);
    assert_eq!(oit.targets().layer_count(1, 1), 3);
    assert_eq!(oit.targets().layer_count(0, 0), 0);
    assert_eq!(*oit.targets().kbuffer(0, 0), [EMPTY_DEPTH; KBUFFER_LAYERS]);
    // Every fragment attenuates, not just the k nearest.
    assert!(approx(oit.targets().inv_alpha(1, 1), 0.5_f32.powi(5)));
}

#[test]
fn only_k_nearest_fragments_are_shaded() {
    let mut frame = FrameTargets::new(1, 1).unwrap();
    let mut oit = pipeline(1, 1);
    let fragments: Vec<_> = [0.6, 0.3, 0.8, 0.1, 0.4]
        .iter()
        .map(|d| fragment(0, 0, *d, 0.3))
        .collect();
    let colors = vec![Vec3::ONE; fragments.len()];

    let (shaded, _) = run(&mut oit, &mut frame, &fragments, &colors);

    assert_eq!(shaded, KBUFFER_LAYERS);
    assert!(approx(oit.targets().resolved_depth(0, 0), 0.4));
    assert!(approx(oit.targets().accumulated(0, 0).w, 0.9));
}

#[test]
fn result_does_not_depend_on_fragment_order() {
    let fragments = vec![
        fragment(0, 0, 0.3, 0.4),
        fragment(0, 0, 0.1, 0.6),
        fragment(0, 0, 0.2, 0.5),
        fragment(0, 0, 0.5, 0.2),
    ];
    let colors = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
    ];

    let mut forward = FrameTargets::new(1, 1).unwrap();
    run(&mut pipeline(1, 1), &mut forward, &fragments, &colors);

    let reversed_fragments: Vec<_> = fragments.iter().rev().copied().collect();
    let reversed_colors: Vec<_> = colors.iter().rev().copied().collect();
    let mut reversed = FrameTargets::new(1, 1).unwrap();
    run(&mut pipeline(1, 1), &mut reversed, &reversed_fragments, &reversed_colors);

    let (a, b) = (forward.color(0, 0), reversed.color(0, 0));
    assert!((a - b).length() < EPSILON, "{a} vs {b}");
}

// ============================================================================
// Resolve
// ============================================================================

#[test]
fn color_resolve_blends_average_color_by_coverage() {
    let mut frame = FrameTargets::new(1, 1).unwrap();
    frame.clear(Vec3::new(1.0, 1.0, 1.0));
    let mut oit = pipeline(1, 1);

    let fragments = [fragment(0, 0, 0.2, 0.5), fragment(0, 0, 0.3, 0.5)];
    let colors = [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)];
    run(&mut oit, &mut frame, &fragments, &colors);

    // T = 0.25, average color (0.5, 0, 0.5).
    let expected = Vec3::ONE * 0.25 + Vec3::new(0.5, 0.0, 0.5) * 0.75;
    assert!((frame.color(0, 0).truncate() - expected).length() < EPSILON);
}

#[test]
fn nearly_transparent_pixels_are_left_alone() {
    let mut frame = FrameTargets::new(1, 1).unwrap();
    frame.clear(Vec3::splat(0.5));
    let mut oit = pipeline(1, 1);

    let (_, resolved) = run(
        &mut oit,
        &mut frame,
        &[fragment(0, 0, 0.5, 1e-4)],
        &[Vec3::new(1.0, 0.0, 0.0)],
    );

    assert_eq!(resolved, 0);
    assert_eq!(frame.color(0, 0), Vec4::new(0.5, 0.5, 0.5, 1.0));
}

// ============================================================================
// Scene Depth
// ============================================================================

#[test]
fn fragments_behind_opaque_geometry_are_discarded() {
    let mut frame = FrameTargets::new(2, 1).unwrap();
    frame.set_depth(0, 0, 0.4);
    let mut oit = pipeline(2, 1);

    let fragments = [fragment(0, 0, 0.6, 0.8), fragment(1, 0, 0.6, 0.8)];
    let colors = [Vec3::X, Vec3::X];
    let (shaded, resolved) = run(&mut oit, &mut frame, &fragments, &colors);

    assert_eq!(shaded, 1);
    assert_eq!(resolved, 1);
    assert_eq!(oit.targets().inv_alpha(0, 0), 1.0);
    assert_eq!(oit.targets().layer_count(0, 0), 0);
    assert!(approx(oit.targets().resolved_depth(0, 0), 0.4));
    assert_eq!(frame.color(0, 0), Vec4::new(0.0, 0.0, 0.0, 1.0));
}

#[test]
fn resolved_depth_is_capped_by_scene_depth() {
    let mut frame = FrameTargets::new(1, 1).unwrap();
    frame.set_depth(0, 0, 0.25);
    let mut oit = pipeline(1, 1);
    oit.clear();
    oit.depth_peel(&frame, &[fragment(0, 0, 0.1, 0.5), fragment(0, 0, 0.2, 0.5)]);
    oit.depth_resolve(&frame);

    // Fewer than k layers: the empty slot must not let the fill pass see past
    // the opaque surface.
    assert!(approx(oit.targets().resolved_depth(0, 0), 0.25));
}

#[test]
fn resize_rejects_zero_extent() {
    let mut oit = pipeline(8, 8);
    assert!(oit.resize(0, 8).is_err());
    assert!(FrameTargets::new(8, 0).is_err());
    oit.resize(16, 4).unwrap();
    assert_eq!(oit.targets().width(), 16);
}

// ============================================================================
// Full Composite
// ============================================================================

struct Scene {
    asset: StrandAsset,
    state: SimulationState,
    shading: HairShadingParams,
    camera: Camera,
}

fn strand_scene() -> Scene {
    // Slightly off-center so the one-pixel ribbon never sits exactly between pixel centers.
    let guide: Vec<Vec3> = (0..8)
        .map(|i| Vec3::new(0.01, 0.5 - i as f32 * (1.0 / 7.0), 0.0))
        .collect();
    let asset = StrandAsset::from_guides(&[guide], &[], 0.5).unwrap();
    let state = SimulationState::new(asset.rest_positions(), asset.vertices_per_strand());
    let mut camera = Camera::new_perspective(45.0, 1.0, 0.1, 10.0);
    camera.look_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Y);
    Scene {
        asset,
        state,
        shading: HairShadingParams::default(),
        camera,
    }
}

fn batch(scene: &Scene) -> HairDrawBatch<'_> {
    HairDrawBatch {
        asset: &scene.asset,
        positions: scene.state.current(),
        tangents: scene.state.tangents(),
        shading: &scene.shading,
        hair_type: HairType::Scalp,
    }
}

#[test]
fn composite_draws_visible_strands() {
    let scene = strand_scene();
    let mut frame = FrameTargets::new(64, 64).unwrap();
    let mut oit = pipeline(64, 64);
    let lights = [DirectionalLight::default()];

    let stats = oit
        .composite(&mut frame, &scene.camera, &lights, &[batch(&scene)])
        .unwrap();

    assert_eq!(stats.batches, 1);
    assert_eq!(stats.shadow_maps, 1);
    assert!(stats.fragments > 0);
    assert!(stats.resolved_pixels > 0);
    assert!(
        frame
            .color_buffer()
            .iter()
            .any(|c| c.truncate() != Vec3::ZERO)
    );
}

#[test]
fn composite_respects_opaque_depth() {
    let scene = strand_scene();
    let mut frame = FrameTargets::new(32, 32).unwrap();
    for y in 0..32 {
        for x in 0..32 {
            frame.set_depth(x, y, 0.0);
        }
    }
    let mut oit = pipeline(32, 32);
    let lights = [DirectionalLight::default().with_shadows(false)];

    let stats = oit
        .composite(&mut frame, &scene.camera, &lights, &[batch(&scene)])
        .unwrap();

    assert_eq!(stats.shadow_maps, 0);
    assert_eq!(stats.shaded_fragments, 0);
    assert_eq!(stats.resolved_pixels, 0);
}

#[test]
fn composite_follows_frame_size() {
    let scene = strand_scene();
    let mut frame = FrameTargets::new(40, 24).unwrap();
    let mut oit = pipeline(8, 8);
    oit.composite(&mut frame, &scene.camera, &[], &[batch(&scene)])
        .unwrap();
    assert_eq!(oit.targets().width(), 40);
    assert_eq!(oit.targets().height(), 24);
}
