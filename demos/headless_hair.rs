//! Headless hair demo.
//!
//! Builds a scalp of guide strands on a sphere cap, sways the head joint for a
//! number of frames and writes the composited result to a PNG.
//!
//! ```text
//! cargo run --example headless_hair -- [--frames N] [--out hair.png]
//!     [--palette blonde] [--settings hair.json] [--gpu]
//! ```
//!
//! `--gpu` uploads through a real wgpu device instead of the recording
//! backend; the image is composited on the CPU either way.

use std::f32::consts::{FRAC_PI_2, TAU};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use glam::{Mat4, Quat, Vec3};

use myth_hair::{
    BoneAttachment, Camera, Capsule, DirectionalLight, FrameInputs, FrameTargets, HairGroupDesc,
    HairPalette, HairRenderBackend, HairSettings, HairShadingParams, HairSystem, HeadlessBackend,
    RigPoses, StrandAsset, WgpuHairBackend,
};

const WIDTH: u32 = 512;
const HEIGHT: u32 = 512;
const HEAD_RADIUS: f32 = 0.1;

struct Options {
    frames: u64,
    out: PathBuf,
    palette: HairPalette,
    settings: HairSettings,
    gpu: bool,
}

fn parse_options() -> Result<Options> {
    let mut options = Options {
        frames: 120,
        out: PathBuf::from("hair.png"),
        palette: HairPalette::Brown,
        settings: HairSettings::default(),
        gpu: false,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                let value = args.next().context("--frames needs a value")?;
                options.frames = value.parse().context("--frames must be an integer")?;
            }
            "--out" => options.out = args.next().context("--out needs a path")?.into(),
            "--palette" => {
                let name = args.next().context("--palette needs a name")?;
                options.palette = HairPalette::from_name(&name)
                    .with_context(|| format!("unknown palette '{name}'"))?;
            }
            "--settings" => {
                let path = args.next().context("--settings needs a path")?;
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {path}"))?;
                options.settings = HairSettings::from_json_str(&json)?;
            }
            "--gpu" => options.gpu = true,
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(options)
}

/// Guide strands rooted on the upper half of the head, hanging down.
fn build_scalp() -> Result<StrandAsset> {
    const RINGS: usize = 6;
    const PER_RING: usize = 16;
    const VERTICES: usize = 16;
    const LENGTH: f32 = 0.25;

    let mut guides = Vec::with_capacity(RINGS * PER_RING);
    for ring in 0..RINGS {
        let polar = (ring as f32 + 0.5) / RINGS as f32 * FRAC_PI_2;
        for i in 0..PER_RING {
            let azimuth = i as f32 / PER_RING as f32 * TAU;
            let normal = Vec3::new(
                polar.sin() * azimuth.cos(),
                polar.cos(),
                polar.sin() * azimuth.sin(),
            );
            let root = normal * HEAD_RADIUS;
            let step = LENGTH / (VERTICES - 1) as f32;
            let strand = (0..VERTICES)
                .map(|v| {
                    let t = v as f32 * step;
                    // Leave the scalp along the normal, then fall with gravity.
                    root + normal * t.min(0.03) + Vec3::NEG_Y * (t - 0.03).max(0.0)
                })
                .collect();
            guides.push(strand);
        }
    }

    let follow_offsets = [
        Vec3::new(0.004, 0.0, 0.0),
        Vec3::new(-0.004, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.004),
    ];
    Ok(StrandAsset::from_guides(&guides, &follow_offsets, 0.2)?)
}

fn create_gpu_backend() -> Result<WgpuHairBackend> {
    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    let capabilities = myth_hair::renderer::gpu::resolve_capabilities(&adapter);
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Hair Demo Device"),
        memory_hints: wgpu::MemoryHints::Performance,
        ..Default::default()
    }))?;
    log::info!("Using adapter {:?}", adapter.get_info().name);
    Ok(WgpuHairBackend::new(device, queue, capabilities))
}

fn main() -> Result<()> {
    env_logger::init();
    let options = parse_options()?;

    let mut backend: Box<dyn HairRenderBackend> = if options.gpu {
        match create_gpu_backend() {
            Ok(backend) => Box::new(backend),
            Err(err) => {
                log::warn!("No GPU backend ({err}), falling back to headless");
                Box::new(HeadlessBackend::default())
            }
        }
    } else {
        Box::new(HeadlessBackend::default())
    };

    let mut rig = RigPoses::new();
    let head = rig.add_rig(vec![Mat4::IDENTITY]);

    let mut system = HairSystem::new(options.settings);
    system.resize(WIDTH, HEIGHT, backend.as_mut())?;

    let mut shading = HairShadingParams::default();
    shading.set_palette(options.palette);
    let skull = Capsule::new(
        Vec3::new(0.0, -0.02, 0.0),
        HEAD_RADIUS,
        Vec3::new(0.0, 0.02, 0.0),
        HEAD_RADIUS,
    );
    let neck = Capsule::new(Vec3::new(0.0, -0.1, 0.0), 0.05, Vec3::new(0.0, -0.3, 0.0), 0.06);
    let key = system.add_group(
        HairGroupDesc::new("scalp", build_scalp()?, BoneAttachment::new(head, 0))
            .with_capsules(vec![skull, neck])
            .with_shading(shading),
        backend.as_mut(),
    )?;

    let mut camera = Camera::new_perspective(35.0, WIDTH as f32 / HEIGHT as f32, 0.05, 20.0);
    camera.look_at(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, -0.05, 0.0), Vec3::Y);
    let lights = [
        DirectionalLight::new(Vec3::new(-0.4, -1.0, -0.6), Vec3::ONE, 1.2),
        DirectionalLight::new(Vec3::new(0.8, -0.2, 0.5), Vec3::new(0.6, 0.7, 1.0), 0.4)
            .with_shadows(false),
    ];

    let mut pipeline = system.create_oit_pipeline(WIDTH, HEIGHT)?;
    let mut targets = FrameTargets::new(WIDTH, HEIGHT)?;
    let time_step = system.settings().time_step;

    for frame_index in 0..options.frames {
        let time = frame_index as f32 * time_step;
        let sway = Quat::from_rotation_y(0.6 * (time * 2.0).sin());
        let nod = Quat::from_rotation_x(0.2 * (time * 3.0).sin());
        rig.set_joint(head, 0, Mat4::from_quat(sway * nod))?;

        let last = frame_index + 1 == options.frames;
        if last {
            targets.clear(Vec3::new(0.05, 0.05, 0.06));
        }
        let inputs = FrameInputs {
            camera: &camera,
            lights: &lights,
            frame_index,
        };
        let oit = last.then_some((&mut pipeline, &mut targets));
        let report = system.frame(&inputs, &rig, backend.as_mut(), oit)?;

        if frame_index % 30 == 0 || last {
            log::info!(
                "frame {frame_index}: {} visible, {} capsule contacts, {} shock strands",
                report.visible_groups,
                report.solve_stats.capsule_contacts,
                report.solve_stats.shock_strands
            );
        }
        if let Some(composite) = report.composite {
            log::info!("composite: {composite:?}");
        }
    }

    if let Some(group) = system.group(key) {
        log::info!(
            "'{}' simulated {} frames",
            group.name(),
            group.state().frames_simulated()
        );
    }

    image::save_buffer(
        &options.out,
        &targets.to_rgba8(),
        WIDTH,
        HEIGHT,
        image::ColorType::Rgba8,
    )
    .with_context(|| format!("failed to write {}", options.out.display()))?;
    log::info!("Wrote {}", options.out.display());
    Ok(())
}
