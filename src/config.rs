//! Renderer configuration.
//!
//! All knobs are plain fields on [`RendererConfig`] and are set in code before
//! [`crate::flow::run`] is called. The only environment input is `RUST_LOG`,
//! which `env_logger` reads when the event loop starts.

use crate::{data_structures::light::LightCapacity, shadow::PcfMode};

/// Face culling attributes applied to every triangle pipeline.
///
/// Point and line styles never cull.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceCulling {
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
}

impl FaceCulling {
    pub const DISABLED: Self = Self {
        cull_mode: None,
        front_face: wgpu::FrontFace::Ccw,
    };
}

impl Default for FaceCulling {
    fn default() -> Self {
        Self {
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Ccw,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Upper bound of lights per kind. Clamped to
    /// [`crate::data_structures::light::MAX_LIGHTS_PER_KIND`].
    pub light_capacity: LightCapacity,
    /// Edge length of every shadow map in texels.
    pub shadow_map_size: u32,
    /// Subtracted from a fragment's light-space depth before comparing it
    /// with the stored shadow-map depth.
    pub shadow_bias: f32,
    pub pcf_mode: PcfMode,
    pub pcf_spread: f32,
    pub face_culling: FaceCulling,
    /// Length of the world axes overlay. `None` hides the axes.
    pub axis_length: Option<f32>,
    pub clear_colour: wgpu::Color,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "prism-ngin".to_string(),
            width: 1920,
            height: 1080,
            light_capacity: LightCapacity::default(),
            shadow_map_size: 1024,
            shadow_bias: 0.002,
            pcf_mode: PcfMode::Off,
            pcf_spread: 1.0,
            face_culling: FaceCulling::default(),
            axis_length: Some(100.0),
            clear_colour: wgpu::Color::BLACK,
        }
    }
}
