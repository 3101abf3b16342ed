//! Shadow mapping.
//!
//! Every registered light owns one shadow slot: directional lights first, then
//! point lights, then spot lights, each in registration order. A frame first
//! renders scene depth from every light into that light's layer of the shadow
//! map array, then runs the colour pass, where shadow-enabled models compare
//! their light-space depth against the stored depth.
//!
//! Light cameras use fixed frusta. A point light only looks towards the world
//! origin, so it casts shadows in that direction alone.

use std::{iter::FusedIterator, mem, num::NonZeroU64};

use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3, ortho, perspective};
use wgpu::util::DeviceExt;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    config::RendererConfig,
    data_structures::{light::LightRegistry, mesh::GpuGeometry, texture::Texture},
};

/// Distance from the origin at which directional lights are placed.
pub const DIRECTIONAL_DISTANCE: f32 = 50.0;
/// Half width and height of the directional light's orthographic frustum.
pub const DIRECTIONAL_HALF_EXTENT: f32 = 25.0;
pub const LIGHT_NEAR: f32 = 0.1;
pub const LIGHT_FAR: f32 = 200.0;
pub const LIGHT_FOV: Deg<f32> = Deg(90.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// Where a light's shadow map lives. `slot` is the array layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShadowSlot {
    pub kind: LightKind,
    pub index: usize,
    pub slot: usize,
}

pub fn shadow_slots(lights: &LightRegistry) -> Vec<ShadowSlot> {
    let kinds = [
        (LightKind::Directional, lights.directional_lights().len()),
        (LightKind::Point, lights.point_lights().len()),
        (LightKind::Spot, lights.spot_lights().len()),
    ];
    kinds
        .into_iter()
        .flat_map(|(kind, count)| (0..count).map(move |index| (kind, index)))
        .enumerate()
        .map(|(slot, (kind, index))| ShadowSlot { kind, index, slot })
        .collect()
}

/// View-projection of the light behind `slot`, in OpenGL clip conventions.
pub fn light_view_projection(lights: &LightRegistry, slot: &ShadowSlot) -> Matrix4<f32> {
    match slot.kind {
        LightKind::Directional => {
            let direction = lights.directional_lights()[slot.index].direction;
            let direction = if direction.magnitude2() > 0.0 {
                direction.normalize()
            } else {
                -Vector3::unit_y()
            };
            let eye = Point3::origin() - direction * DIRECTIONAL_DISTANCE;
            let e = DIRECTIONAL_HALF_EXTENT;
            ortho(-e, e, -e, e, LIGHT_NEAR, LIGHT_FAR) * look_along(eye, direction)
        }
        LightKind::Point => {
            let eye = Point3::from_vec(lights.point_lights()[slot.index].location);
            let towards_origin = Point3::origin() - eye;
            let direction = if towards_origin.magnitude2() > 0.0 {
                towards_origin
            } else {
                -Vector3::unit_y()
            };
            perspective(LIGHT_FOV, 1.0, LIGHT_NEAR, LIGHT_FAR) * look_along(eye, direction)
        }
        LightKind::Spot => {
            let light = &lights.spot_lights()[slot.index];
            let direction = if light.direction.magnitude2() > 0.0 {
                light.direction
            } else {
                -Vector3::unit_y()
            };
            perspective(LIGHT_FOV, 1.0, LIGHT_NEAR, LIGHT_FAR)
                * look_along(Point3::from_vec(light.location), direction)
        }
    }
}

fn look_along(eye: Point3<f32>, direction: Vector3<f32>) -> Matrix4<f32> {
    let direction = direction.normalize();
    let up = if direction.dot(Vector3::unit_y()).abs() > 0.99 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    };
    Matrix4::look_at_rh(eye, eye + direction, up)
}

/// Maps clip coordinates in [-1, 1]³ to [0, 1]³.
#[rustfmt::skip]
pub fn bias_matrix() -> Matrix4<f32> {
    Matrix4::new(
        0.5, 0.0, 0.0, 0.0,
        0.0, 0.5, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.0,
        0.5, 0.5, 0.5, 1.0,
    )
}

/// A fragment is shadowed only when the occluder is nearer than the fragment
/// by more than `bias`.
pub fn is_in_shadow(fragment_depth: f32, stored_depth: f32, bias: f32) -> bool {
    stored_depth < fragment_depth - bias
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PcfMode {
    /// One lookup, hard edges.
    #[default]
    Off,
    /// An 8×8 grid of lookups around the fragment.
    Sample64,
    /// Four lookups in a pattern alternating per 2×2 pixel block.
    Sample4Dithered,
}

impl PcfMode {
    fn shader_id(self) -> f32 {
        match self {
            PcfMode::Off => 0.0,
            PcfMode::Sample64 => 1.0,
            PcfMode::Sample4Dithered => 2.0,
        }
    }
}

/// Lookup offsets in shadow-map texels for a fragment at `frag_coord`
/// (framebuffer pixels).
pub fn pcf_offsets(mode: PcfMode, spread: f32, frag_coord: [f32; 2]) -> Vec<[f32; 2]> {
    match mode {
        PcfMode::Off => vec![[0.0, 0.0]],
        PcfMode::Sample64 => (0..8)
            .flat_map(|y| (0..8).map(move |x| [(x as f32 - 3.5) * spread, (y as f32 - 3.5) * spread]))
            .collect(),
        PcfMode::Sample4Dithered => {
            let ox = frag_coord[0].floor().rem_euclid(2.0) * spread;
            let oy = frag_coord[1].floor().rem_euclid(2.0) * spread;
            vec![
                [-1.5 * spread + ox, 1.5 * spread - oy],
                [-1.5 * spread + ox, -0.5 * spread - oy],
                [0.5 * spread + ox, 1.5 * spread - oy],
                [0.5 * spread + ox, -0.5 * spread - oy],
            ]
        }
    }
}

/// Share of lookups that are not in shadow.
pub fn lit_fraction(stored_depths: &[f32], fragment_depth: f32, bias: f32) -> f32 {
    if stored_depths.is_empty() {
        return 1.0;
    }
    let lit = stored_depths
        .iter()
        .filter(|&&stored| !is_in_shadow(fragment_depth, stored, bias))
        .count();
    lit as f32 / stored_depths.len() as f32
}

/// Passes of one frame: a depth pass per shadow slot, then the colour pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    DepthPass(usize),
    ColorPass,
}

#[derive(Clone, Debug)]
pub struct FrameSchedule {
    phase: FramePhase,
    slots: usize,
    finished: bool,
}

impl FrameSchedule {
    pub fn new(slots: usize) -> Self {
        Self {
            phase: FramePhase::Idle,
            slots,
            finished: false,
        }
    }

    /// Moves to the next phase; after the colour pass the schedule is idle again.
    pub fn advance(&mut self) -> FramePhase {
        self.phase = match self.phase {
            FramePhase::Idle if self.slots > 0 => FramePhase::DepthPass(0),
            FramePhase::Idle => FramePhase::ColorPass,
            FramePhase::DepthPass(i) if i + 1 < self.slots => FramePhase::DepthPass(i + 1),
            FramePhase::DepthPass(_) => FramePhase::ColorPass,
            FramePhase::ColorPass => FramePhase::Idle,
        };
        self.phase
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }
}

/// Yields the passes of a single frame, then nothing.
impl Iterator for FrameSchedule {
    type Item = FramePhase;

    fn next(&mut self) -> Option<FramePhase> {
        if self.finished {
            return None;
        }
        if self.phase == FramePhase::ColorPass {
            self.advance();
            self.finished = true;
            return None;
        }
        Some(self.advance())
    }
}

impl FusedIterator for FrameSchedule {}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowParams {
    /// PCF mode, spread, depth bias, shadow slot count
    pub pcf: [f32; 4],
}

/// One dynamic-offset entry of the depth pass. Padded to the default uniform
/// offset alignment.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DepthUniform {
    pub light_model: [[f32; 4]; 4],
    _padding: [[f32; 4]; 12],
}

pub const DEPTH_UNIFORM_SIZE: u64 = mem::size_of::<DepthUniform>() as u64;

impl DepthUniform {
    pub fn new(light_model: Matrix4<f32>) -> Self {
        Self {
            light_model: light_model.into(),
            _padding: [[0.0; 4]; 12],
        }
    }
}

pub fn shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2Array,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("shadow_bind_group_layout"),
    })
}

pub fn depth_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(DEPTH_UNIFORM_SIZE),
            },
            count: None,
        }],
        label: Some("shadow_depth_bind_group_layout"),
    })
}

/// GPU side of the shadow subsystem: the layered depth map, the parameters
/// the colour pass reads and the per-light, per-caster depth matrices.
#[derive(Debug)]
pub struct ShadowMaps {
    slots: Vec<ShadowSlot>,
    view_projections: Vec<Matrix4<f32>>,
    #[allow(unused)]
    map: Texture,
    layer_views: Vec<wgpu::TextureView>,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    depth_layout: wgpu::BindGroupLayout,
    depth_buffer: wgpu::Buffer,
    depth_bind_group: wgpu::BindGroup,
    depth_capacity: usize,
    casters: usize,
}

impl ShadowMaps {
    /// Allocates one layer per registered light. The renderer rebuilds the
    /// maps when [`shadow_slots`] of its registry no longer match
    /// [`ShadowMaps::slots`].
    pub fn new(
        device: &wgpu::Device,
        shadow_layout: &wgpu::BindGroupLayout,
        depth_layout: &wgpu::BindGroupLayout,
        lights: &LightRegistry,
        config: &RendererConfig,
    ) -> Self {
        let slots = shadow_slots(lights);
        let (map, layer_views) =
            Texture::create_shadow_map_array(device, config.shadow_map_size, slots.len() as u32);
        log::info!(
            "Allocated {} shadow map(s) of {}x{}",
            slots.len(),
            config.shadow_map_size,
            config.shadow_map_size
        );

        let params = ShadowParams {
            pcf: [
                config.pcf_mode.shader_id(),
                config.pcf_spread,
                config.shadow_bias,
                slots.len() as f32,
            ],
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Shadow Params Buffer"),
            contents: bytemuck::cast_slice(&[params]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
            label: Some("shadow_bind_group"),
        });

        let (depth_buffer, depth_bind_group) = Self::depth_entries(device, depth_layout, 1);
        let view_projections = slots
            .iter()
            .map(|slot| light_view_projection(lights, slot))
            .collect();

        Self {
            slots,
            view_projections,
            map,
            layer_views,
            params_buffer,
            bind_group,
            depth_layout: depth_layout.clone(),
            depth_buffer,
            depth_bind_group,
            depth_capacity: 1,
            casters: 0,
        }
    }

    fn depth_entries(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Depth Uniform Buffer"),
            size: DEPTH_UNIFORM_SIZE * capacity.max(1) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(DEPTH_UNIFORM_SIZE),
                }),
            }],
            label: Some("shadow_depth_bind_group"),
        });
        (buffer, bind_group)
    }

    pub fn slots(&self) -> &[ShadowSlot] {
        &self.slots
    }

    /// Light view-projections in slot order, OpenGL clip conventions.
    pub fn view_projections(&self) -> &[Matrix4<f32>] {
        &self.view_projections
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn set_pcf(&self, queue: &wgpu::Queue, mode: PcfMode, spread: f32, bias: f32) {
        let params = ShadowParams {
            pcf: [mode.shader_id(), spread, bias, self.slots.len() as f32],
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[params]));
    }

    /// True when `lights` maps to different slots than the allocated layers.
    pub fn is_stale(&self, lights: &LightRegistry) -> bool {
        shadow_slots(lights) != self.slots
    }

    /// Recomputes every light's view-projection and uploads `light · model`
    /// for every slot and caster. Entry `slot * casters + caster` holds the
    /// matrix of that pair.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        lights: &LightRegistry,
        caster_models: &[Matrix4<f32>],
    ) {
        self.view_projections = self
            .slots
            .iter()
            .map(|slot| light_view_projection(lights, slot))
            .collect();
        self.casters = caster_models.len();
        let needed = self.slots.len() * self.casters;
        if needed == 0 {
            return;
        }
        if needed > self.depth_capacity {
            let (buffer, bind_group) = Self::depth_entries(device, &self.depth_layout, needed);
            self.depth_buffer = buffer;
            self.depth_bind_group = bind_group;
            self.depth_capacity = needed;
        }

        let entries: Vec<DepthUniform> = self
            .view_projections
            .iter()
            .flat_map(|light_vp| {
                caster_models
                    .iter()
                    .map(move |model| DepthUniform::new(OPENGL_TO_WGPU_MATRIX * *light_vp * *model))
            })
            .collect();
        queue.write_buffer(&self.depth_buffer, 0, bytemuck::cast_slice(&entries));
    }

    /// Renders the casters' depth into the layer of `slot`. `casters` must be
    /// in the order their matrices were passed to [`ShadowMaps::update`].
    pub fn encode_depth_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        slot: usize,
        casters: &[&GpuGeometry],
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Depth Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.layer_views[slot],
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(pipeline);
        for (caster, geometry) in casters.iter().enumerate().take(self.casters) {
            let offset = (slot * self.casters + caster) as u64 * DEPTH_UNIFORM_SIZE;
            render_pass.set_bind_group(0, &self.depth_bind_group, &[offset as u32]);
            render_pass.set_vertex_buffer(0, geometry.positions.slice(..));
            geometry.draw(&mut render_pass);
        }
    }
}
