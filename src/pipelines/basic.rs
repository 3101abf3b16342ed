use crate::{config::FaceCulling, data_structures::model::Topology};

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const TEX_COORD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];
const AXIS_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Positions only, as drawn by the shadow depth passes.
pub const POSITION_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: 3 * 4,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &POSITION_ATTRIBUTES,
};

/// The separate position, texture coordinate and normal streams of a
/// registered model, in vertex buffer slots 0, 1 and 2.
pub const SURFACE_LAYOUTS: [wgpu::VertexBufferLayout<'static>; 3] = [
    POSITION_LAYOUT,
    wgpu::VertexBufferLayout {
        array_stride: 2 * 4,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &TEX_COORD_ATTRIBUTES,
    },
    wgpu::VertexBufferLayout {
        array_stride: 3 * 4,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &NORMAL_ATTRIBUTES,
    },
];

/// Interleaved position and colour of the world axes.
pub const AXIS_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: 6 * 4,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &AXIS_ATTRIBUTES,
};

fn primitive_state(topology: Topology, culling: FaceCulling) -> wgpu::PrimitiveState {
    // only filled triangles have faces to cull
    let culling = if topology == Topology::Triangles {
        culling
    } else {
        FaceCulling::DISABLED
    };
    wgpu::PrimitiveState {
        topology: topology.primitive(),
        strip_index_format: (topology == Topology::LineStrip).then_some(wgpu::IndexFormat::Uint32),
        front_face: culling.front_face,
        cull_mode: culling.cull_mode,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

fn depth_stencil(format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    topology: Topology,
    culling: FaceCulling,
    shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: primitive_state(topology, culling),
        depth_stencil: depth_format.map(depth_stencil),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

/// Position-only pipeline without a fragment stage that fills a shadow map
/// layer.
pub fn mk_depth_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    depth_format: wgpu::TextureFormat,
    culling: FaceCulling,
    shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Shadow Depth Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[POSITION_LAYOUT],
            compilation_options: Default::default(),
        },
        fragment: None,
        primitive: primitive_state(Topology::Triangles, culling),
        depth_stencil: Some(depth_stencil(depth_format)),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}
