//! Frame composition.
//!
//! [`Renderer`] owns the model and light registries together with the GPU
//! state mirroring them: one geometry upload, uniform buffer and bind group per
//! model, the texture store, every pipeline and the shadow maps.
//!
//! One frame is encoded by [`Renderer::encode_frame`]. It walks the
//! [`FrameSchedule`]: a depth pass per shadow slot, then a single colour pass
//! that draws the axes overlay followed by every model with the program the
//! [`ShaderTable`] selects for it.

use std::{path::Path, rc::Rc};

use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    config::RendererConfig,
    data_structures::{
        light::LightRegistry,
        mesh::{GeometryData, GpuGeometry, MeshProvider},
        model::{AttributeWarning, ModelId, ModelRegistry, RenderStyle, Topology},
        texture::{Texture, TextureHandle, TextureOptions},
    },
    lighting::{LightsUniform, ModelUniform},
    pipelines::{BindGroupLayouts, Pipelines, ShaderTable},
    resources,
    shadow::{FramePhase, FrameSchedule, PcfMode, ShadowMaps},
};

/// GPU side of one registered model.
#[derive(Debug)]
struct GpuModel {
    geometry: GpuGeometry,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct BoundTexture {
    #[allow(unused)]
    texture: Texture,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct Axes {
    vertices: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Position and colour of the three axis lines starting at the origin.
/// One line per axis through the origin, from `-length` to `length`.
///
/// The colour brightens from 0.25 at the negative end towards the positive
/// end and saturates past the midpoint of the positive half.
fn axis_vertices(length: f32) -> [[f32; 6]; 6] {
    let mut vertices = [[0.0; 6]; 6];
    for axis in 0..3 {
        for (end, sign) in [-1.0f32, 1.0].into_iter().enumerate() {
            let vertex = &mut vertices[axis * 2 + end];
            vertex[axis] = sign * length;
            vertex[3 + axis] = sign * 0.5 + 0.75;
        }
    }
    vertices
}

fn uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some(label),
    })
}

fn model_uniform_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&[ModelUniform::default()]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

#[derive(Debug)]
pub struct Renderer {
    pub models: ModelRegistry,
    pub lights: LightRegistry,
    config: RendererConfig,
    shader_table: ShaderTable,
    layouts: BindGroupLayouts,
    pipelines: Pipelines,
    gpu_models: Vec<GpuModel>,
    textures: Vec<BoundTexture>,
    lights_buffer: wgpu::Buffer,
    lights_bind_group: wgpu::BindGroup,
    axes: Option<Axes>,
    shadows: Option<ShadowMaps>,
}

impl Renderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        config: &RendererConfig,
    ) -> Self {
        let layouts = BindGroupLayouts::new(device);
        let pipelines = Pipelines::new(device, &layouts, color_format, config.face_culling);

        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::cast_slice(&[LightsUniform::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let lights_bind_group =
            uniform_bind_group(device, &layouts.lights, &lights_buffer, "lights_bind_group");

        let axes = config.axis_length.map(|length| {
            let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Axes Vertex Buffer"),
                contents: bytemuck::cast_slice(&axis_vertices(length)),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let uniform_buffer = model_uniform_buffer(device, "Axes Uniform Buffer");
            let bind_group =
                uniform_bind_group(device, &layouts.model, &uniform_buffer, "axes_bind_group");
            Axes {
                vertices,
                uniform_buffer,
                bind_group,
            }
        });

        let mut renderer = Self {
            models: ModelRegistry::new(),
            lights: LightRegistry::new(config.light_capacity),
            config: config.clone(),
            shader_table: ShaderTable::new(),
            layouts,
            pipelines,
            gpu_models: Vec::new(),
            textures: Vec::new(),
            lights_buffer,
            lights_bind_group,
            axes,
            shadows: None,
        };
        // order matches TextureHandle::WHITE and TextureHandle::MISSING
        let white = Texture::create_solid(device, queue, [255, 255, 255, 255], "white_texture");
        renderer.add_texture(device, white);
        let missing = Texture::create_solid(device, queue, [0, 0, 0, 255], "missing_texture");
        renderer.add_texture(device, missing);
        renderer
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Registers `provider` and uploads its geometry. The buffers are never
    /// reallocated.
    pub fn add_model(
        &mut self,
        device: &wgpu::Device,
        provider: Rc<dyn MeshProvider>,
        style: RenderStyle,
    ) -> ModelId {
        let data = GeometryData::from_provider(provider.as_ref());
        let id = self.models.insert(provider, style, &data);
        let label = format!("Model {}", id);

        let geometry = GpuGeometry::upload(device, &label, &data);
        let uniform_buffer = model_uniform_buffer(device, &format!("{} Uniform Buffer", label));
        let bind_group = uniform_bind_group(
            device,
            &self.layouts.model,
            &uniform_buffer,
            &format!("{} bind_group", label),
        );
        self.gpu_models.push(GpuModel {
            geometry,
            uniform_buffer,
            bind_group,
        });
        log::debug!("Registered model {} as {:?} ({:?})", id, style, data.draw_command());
        id
    }

    pub fn add_texture(&mut self, device: &wgpu::Device, texture: Texture) -> TextureHandle {
        let fallback_sampler;
        let sampler = match &texture.sampler {
            Some(sampler) => sampler,
            None => {
                fallback_sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());
                &fallback_sampler
            }
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layouts.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some("texture_bind_group"),
        });
        self.textures.push(BoundTexture {
            texture,
            bind_group,
        });
        TextureHandle(self.textures.len() - 1)
    }

    /// Loads an image from `assets/`. Failures are logged and yield
    /// [`TextureHandle::MISSING`].
    pub fn load_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: impl AsRef<Path>,
        options: TextureOptions,
    ) -> TextureHandle {
        let path = path.as_ref();
        match resources::load_texture(path, device, queue, options) {
            Ok(texture) => self.add_texture(device, texture),
            Err(e) => {
                log::error!("Failed to load texture {}: {:#}", path.display(), e);
                TextureHandle::MISSING
            }
        }
    }

    pub fn set_texture_from_file(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: ModelId,
        path: impl AsRef<Path>,
        weight: f32,
        options: TextureOptions,
    ) -> TextureHandle {
        let handle = self.load_texture(device, queue, path, options);
        self.models.set_texture(id, handle, weight);
        handle
    }

    /// Validates the registered models and allocates one shadow map layer per
    /// registered light. Runs before the first frame if nobody called it;
    /// later frames reallocate the maps whenever lights are added.
    pub fn prepare(&mut self, device: &wgpu::Device) -> Vec<AttributeWarning> {
        let warnings = self.models.check_model_attributes();
        self.rebuild_shadow_maps(device);
        warnings
    }

    fn rebuild_shadow_maps(&mut self, device: &wgpu::Device) {
        self.shadows = Some(ShadowMaps::new(
            device,
            &self.layouts.shadow,
            &self.layouts.depth,
            &self.lights,
            &self.config,
        ));
    }

    /// Changes the shadow filtering of the following frames.
    pub fn set_pcf(&mut self, queue: &wgpu::Queue, mode: PcfMode, spread: f32) {
        self.config.pcf_mode = mode;
        self.config.pcf_spread = spread;
        if let Some(shadows) = &self.shadows {
            shadows.set_pcf(queue, mode, spread, self.config.shadow_bias);
        }
    }

    pub fn shadow_maps(&self) -> Option<&ShadowMaps> {
        self.shadows.as_ref()
    }

    /// Records all passes of one frame into `encoder`.
    ///
    /// `view` is the camera's view matrix and `proj` the projection in wgpu
    /// clip space. `time_seconds` drives model rotation.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        view: Matrix4<f32>,
        proj: Matrix4<f32>,
        time_seconds: f32,
    ) {
        let stale = self
            .shadows
            .as_ref()
            .map(|shadows| shadows.is_stale(&self.lights));
        match stale {
            None => {
                self.prepare(device);
            }
            Some(true) => {
                log::info!("Light registry changed, reallocating shadow maps");
                self.rebuild_shadow_maps(device);
            }
            Some(false) => (),
        }

        let matrices: Vec<Matrix4<f32>> = self
            .models
            .iter()
            .map(|(_, entry)| entry.model_matrix(time_seconds))
            .collect();
        let casters: Vec<ModelId> = self
            .models
            .iter()
            .filter(|(_, entry)| {
                entry.casts_shadow
                    && entry.style.topology() == Topology::Triangles
                    && entry.draw.vertex_count() > 0
            })
            .map(|(id, _)| id)
            .collect();
        let caster_matrices: Vec<_> = casters.iter().map(|id| matrices[id.index()]).collect();
        if let Some(shadows) = self.shadows.as_mut() {
            shadows.update(device, queue, &self.lights, &caster_matrices);
        }
        let Some(shadows) = self.shadows.as_ref() else {
            return;
        };

        let lights = LightsUniform::from_registry(&self.lights, view);
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::cast_slice(&[lights]));
        for (id, entry) in self.models.iter() {
            let uniform = ModelUniform::new(
                entry,
                matrices[id.index()],
                view,
                proj,
                shadows.view_projections(),
            );
            queue.write_buffer(
                &self.gpu_models[id.index()].uniform_buffer,
                0,
                bytemuck::cast_slice(&[uniform]),
            );
        }
        if let Some(axes) = &self.axes {
            let uniform = ModelUniform {
                model: Matrix4::<f32>::identity().into(),
                model_view: view.into(),
                proj: proj.into(),
                ..Default::default()
            };
            queue.write_buffer(&axes.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
        }

        let caster_geometry: Vec<&GpuGeometry> = casters
            .iter()
            .map(|id| &self.gpu_models[id.index()].geometry)
            .collect();
        for phase in FrameSchedule::new(shadows.slots().len()) {
            match phase {
                FramePhase::DepthPass(slot) => {
                    shadows.encode_depth_pass(encoder, &self.pipelines.depth, slot, &caster_geometry)
                }
                FramePhase::ColorPass => self.encode_color_pass(encoder, color_view, depth_view),
                FramePhase::Idle => (),
            }
        }
    }

    fn encode_color_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Color Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.config.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let white = &self.textures[TextureHandle::WHITE.index()];
        render_pass.set_bind_group(0, &self.lights_bind_group, &[]);

        if let Some(axes) = &self.axes {
            render_pass.set_pipeline(&self.pipelines.axes);
            render_pass.set_bind_group(1, &axes.bind_group, &[]);
            render_pass.set_bind_group(2, &white.bind_group, &[]);
            render_pass.set_vertex_buffer(0, axes.vertices.slice(..));
            render_pass.draw(0..6, 0..1);
        }

        for (id, entry) in self.models.iter() {
            if entry.draw.vertex_count() == 0 {
                continue;
            }
            let program = self.shader_table.lookup(entry.style, entry.lighting_mode);
            let Some(pipeline) = self.pipelines.get(program) else {
                log::error!("No pipeline for {:?}", program);
                continue;
            };
            let gpu = &self.gpu_models[id.index()];
            let texture = entry
                .texture
                .and_then(|handle| self.textures.get(handle.index()))
                .unwrap_or(white);

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(1, &gpu.bind_group, &[]);
            render_pass.set_bind_group(2, &texture.bind_group, &[]);
            if program.uses_shadows() {
                if let Some(shadows) = &self.shadows {
                    render_pass.set_bind_group(3, shadows.bind_group(), &[]);
                }
            }
            render_pass.set_vertex_buffer(0, gpu.geometry.positions.slice(..));
            render_pass.set_vertex_buffer(1, gpu.geometry.tex_coords.slice(..));
            render_pass.set_vertex_buffer(2, gpu.geometry.normals.slice(..));
            gpu.geometry.draw(&mut render_pass);
        }
    }
}
