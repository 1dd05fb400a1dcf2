//! Fixed-function blend and target states of the hair k-buffer passes.
//!
//! | Pass          | Target              | Format        | Blend                        |
//! |---------------|---------------------|---------------|------------------------------|
//! | Depth peel    | transmittance       | `R16Float`    | `dst · (1 - src.a)`          |
//! | Fill colors   | accumulated color   | `Rgba16Float` | `src + dst`                  |
//! | Color resolve | main color          | host format   | `src + dst · src.a`          |
//!
//! The color resolve shader outputs `rgb = c̄ · (1 - T)` and `a = T`, so the
//! blend unit computes `dst · T + c̄ · (1 - T)`.

/// Transmittance surface format.
pub const INV_ALPHA_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;
/// Accumulated color surface format.
pub const ACCUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Per-layer k-buffer depth format when stored in a texture (bit-cast depths, atomic min).
pub const KBUFFER_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Uint;
/// Hair shadow map format.
pub const SHADOW_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Multiplies the destination by `1 - src.a`.
#[must_use]
pub fn inv_alpha_blend_state() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

/// Plain additive accumulation.
#[must_use]
pub fn accumulate_blend_state() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

/// `dst · src.a + src` on color; destination alpha is preserved.
#[must_use]
pub fn color_resolve_blend_state() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::SrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Zero,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

#[must_use]
pub fn depth_peel_target_states() -> [Option<wgpu::ColorTargetState>; 1] {
    [Some(wgpu::ColorTargetState {
        format: INV_ALPHA_FORMAT,
        blend: Some(inv_alpha_blend_state()),
        write_mask: wgpu::ColorWrites::RED,
    })]
}

#[must_use]
pub fn fill_target_states() -> [Option<wgpu::ColorTargetState>; 1] {
    [Some(wgpu::ColorTargetState {
        format: ACCUM_FORMAT,
        blend: Some(accumulate_blend_state()),
        write_mask: wgpu::ColorWrites::ALL,
    })]
}

#[must_use]
pub fn color_resolve_target_state(format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: Some(color_resolve_blend_state()),
        write_mask: wgpu::ColorWrites::COLOR,
    }
}

/// Hair passes test against the scene depth but never write it.
#[must_use]
pub fn hair_depth_stencil_state(format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: Some(false),
        depth_compare: Some(wgpu::CompareFunction::LessEqual),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_blend_keeps_destination_alpha() {
        let state = color_resolve_blend_state();
        assert_eq!(state.alpha.src_factor, wgpu::BlendFactor::Zero);
        assert_eq!(state.alpha.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::SrcAlpha);
    }

    #[test]
    fn peel_writes_only_transmittance() {
        let [Some(target)] = depth_peel_target_states() else {
            panic!("peel pass has one color target");
        };
        assert_eq!(target.format, INV_ALPHA_FORMAT);
        assert_eq!(target.write_mask, wgpu::ColorWrites::RED);
    }

    #[test]
    fn hair_depth_tests_without_writing() {
        let state = hair_depth_stencil_state(wgpu::TextureFormat::Depth32Float);
        assert_eq!(state.depth_write_enabled, Some(false));
        assert_eq!(state.depth_compare, Some(wgpu::CompareFunction::LessEqual));
    }
}
