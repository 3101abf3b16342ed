//! Shader programs and the dispatch from model state to program.
//!
//! Every colour program shares one pipeline layout:
//! - group 0: lights
//! - group 1: per-model uniform
//! - group 2: diffuse texture and sampler
//!
//! The shadowed Phong program adds group 3, the shadow map array and its
//! parameters. The depth program only binds the per-caster light matrix.

pub mod basic;

use std::collections::HashMap;

use crate::{
    config::FaceCulling,
    data_structures::{
        model::{LightingMode, RenderStyle, Topology},
        texture::Texture,
    },
    shadow,
};

const COMMON: &str = include_str!("common.wgsl");
const LIGHTING: &str = include_str!("lighting.wgsl");

/// One compiled colour program. Flat and Gouraud lighting share a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramId {
    PureColor(Topology),
    VaryingColor(Topology),
    Textured,
    Gouraud,
    Phong,
    ShadowPhong,
}

impl ProgramId {
    pub const ALL: [ProgramId; 12] = [
        ProgramId::PureColor(Topology::Points),
        ProgramId::PureColor(Topology::Lines),
        ProgramId::PureColor(Topology::LineStrip),
        ProgramId::PureColor(Topology::Triangles),
        ProgramId::VaryingColor(Topology::Points),
        ProgramId::VaryingColor(Topology::Lines),
        ProgramId::VaryingColor(Topology::LineStrip),
        ProgramId::VaryingColor(Topology::Triangles),
        ProgramId::Textured,
        ProgramId::Gouraud,
        ProgramId::Phong,
        ProgramId::ShadowPhong,
    ];

    pub fn topology(self) -> Topology {
        match self {
            ProgramId::PureColor(topology) | ProgramId::VaryingColor(topology) => topology,
            _ => Topology::Triangles,
        }
    }

    pub fn uses_shadows(self) -> bool {
        self == ProgramId::ShadowPhong
    }

    fn label(self) -> String {
        format!("{:?} Pipeline", self)
    }

    fn source(self) -> String {
        match self {
            ProgramId::PureColor(_) => format!("{COMMON}{}", include_str!("pure_color.wgsl")),
            ProgramId::VaryingColor(_) => format!("{COMMON}{}", include_str!("varying_color.wgsl")),
            ProgramId::Textured => format!("{COMMON}{}", include_str!("texture.wgsl")),
            ProgramId::Gouraud => format!("{COMMON}{LIGHTING}{}", include_str!("gouraud.wgsl")),
            ProgramId::Phong => format!("{COMMON}{LIGHTING}{}", include_str!("phong.wgsl")),
            ProgramId::ShadowPhong => {
                format!("{COMMON}{LIGHTING}{}", include_str!("phong_shadow.wgsl"))
            }
        }
    }
}

/// (render style, lighting mode) → program, built once.
#[derive(Clone, Debug)]
pub struct ShaderTable {
    programs: HashMap<(RenderStyle, LightingMode), ProgramId>,
}

impl ShaderTable {
    pub fn new() -> Self {
        let programs = RenderStyle::ALL
            .iter()
            .flat_map(|&style| LightingMode::ALL.iter().map(move |&mode| (style, mode)))
            .map(|(style, mode)| ((style, mode), Self::select(style, mode)))
            .collect();
        Self { programs }
    }

    fn select(style: RenderStyle, mode: LightingMode) -> ProgramId {
        match (style, mode) {
            (RenderStyle::LitWithShadow, _) => ProgramId::ShadowPhong,
            (RenderStyle::Lit, LightingMode::Phong) => ProgramId::Phong,
            (RenderStyle::Lit, LightingMode::Flat | LightingMode::Gouraud) => ProgramId::Gouraud,
            (RenderStyle::Textured, _) => ProgramId::Textured,
            (
                RenderStyle::VaryingColorPoints
                | RenderStyle::VaryingColorLines
                | RenderStyle::VaryingColorLineStrip
                | RenderStyle::VaryingColorTriangles,
                _,
            ) => ProgramId::VaryingColor(style.topology()),
            (
                RenderStyle::PureColorPoints
                | RenderStyle::PureColorLines
                | RenderStyle::PureColorLineStrip
                | RenderStyle::PureColorTriangles,
                _,
            ) => ProgramId::PureColor(style.topology()),
        }
    }

    /// Falls back to pure-colour triangles for any pair missing from the table.
    pub fn lookup(&self, style: RenderStyle, mode: LightingMode) -> ProgramId {
        self.programs
            .get(&(style, mode))
            .copied()
            .unwrap_or(ProgramId::PureColor(Topology::Triangles))
    }
}

impl Default for ShaderTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct BindGroupLayouts {
    pub lights: wgpu::BindGroupLayout,
    pub model: wgpu::BindGroupLayout,
    pub texture: wgpu::BindGroupLayout,
    pub shadow: wgpu::BindGroupLayout,
    pub depth: wgpu::BindGroupLayout,
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some(label),
    })
}

pub fn texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("texture_bind_group_layout"),
    })
}

impl BindGroupLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            lights: uniform_layout(device, "lights_bind_group_layout"),
            model: uniform_layout(device, "model_bind_group_layout"),
            texture: texture_layout(device),
            shadow: shadow::shadow_bind_group_layout(device),
            depth: shadow::depth_bind_group_layout(device),
        }
    }
}

/// Every pipeline the renderer draws with, created up front.
#[derive(Debug)]
pub struct Pipelines {
    programs: HashMap<ProgramId, wgpu::RenderPipeline>,
    pub depth: wgpu::RenderPipeline,
    pub axes: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        color_format: wgpu::TextureFormat,
        culling: FaceCulling,
    ) -> Self {
        let color_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Color Pipeline Layout"),
            bind_group_layouts: &[&layouts.lights, &layouts.model, &layouts.texture],
            push_constant_ranges: &[],
        });
        let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadowed Color Pipeline Layout"),
            bind_group_layouts: &[
                &layouts.lights,
                &layouts.model,
                &layouts.texture,
                &layouts.shadow,
            ],
            push_constant_ranges: &[],
        });
        let depth_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Depth Pipeline Layout"),
            bind_group_layouts: &[&layouts.depth],
            push_constant_ranges: &[],
        });

        let programs = ProgramId::ALL
            .iter()
            .map(|&program| {
                let label = program.label();
                let layout = if program.uses_shadows() {
                    &shadow_layout
                } else {
                    &color_layout
                };
                let pipeline = basic::mk_render_pipeline(
                    device,
                    &label,
                    layout,
                    color_format,
                    Some(Texture::DEPTH_FORMAT),
                    &basic::SURFACE_LAYOUTS,
                    program.topology(),
                    culling,
                    wgpu::ShaderModuleDescriptor {
                        label: Some(label.as_str()),
                        source: wgpu::ShaderSource::Wgsl(program.source().into()),
                    },
                );
                (program, pipeline)
            })
            .collect();

        let depth = basic::mk_depth_pipeline(
            device,
            &depth_layout,
            Texture::DEPTH_FORMAT,
            culling,
            wgpu::ShaderModuleDescriptor {
                label: Some("Shadow Depth Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("depth.wgsl").into()),
            },
        );
        let axes = basic::mk_render_pipeline(
            device,
            "Axes Pipeline",
            &color_layout,
            color_format,
            Some(Texture::DEPTH_FORMAT),
            &[basic::AXIS_LAYOUT],
            Topology::Lines,
            culling,
            wgpu::ShaderModuleDescriptor {
                label: Some("Axes Shader"),
                source: wgpu::ShaderSource::Wgsl(
                    format!("{COMMON}{}", include_str!("axes.wgsl")).into(),
                ),
            },
        );
        log::debug!("Created {} colour pipelines", ProgramId::ALL.len());

        Self {
            programs,
            depth,
            axes,
        }
    }

    pub fn get(&self, program: ProgramId) -> Option<&wgpu::RenderPipeline> {
        self.programs.get(&program)
    }
}
