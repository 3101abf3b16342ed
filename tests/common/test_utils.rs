#![cfg(feature = "integration-tests")]

use std::time::Duration;

use prism_ngin::{
    Deg, Matrix4, Point3, Renderer, RendererConfig,
    camera::{Camera, Projection},
    data_structures::texture::Texture,
};

pub(crate) const SIZE: u32 = 256;
pub(crate) const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

pub(crate) fn f_to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Offscreen target and renderer on a window-less device.
pub(crate) struct Headless {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) renderer: Renderer,
    pub(crate) camera: Camera,
    pub(crate) projection: Projection,
    target: wgpu::Texture,
    depth: Texture,
}

impl Headless {
    /// `None` when the machine has no usable adapter.
    pub(crate) fn new(config: &RendererConfig) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = futures::executor::block_on(instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .ok()?;
        let (device, queue) = futures::executor::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("test device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            },
        ))
        .ok()?;

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d {
                width: SIZE,
                height: SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = Texture::create_depth_texture(&device, [SIZE, SIZE], "test depth");
        let renderer = Renderer::new(&device, &queue, FORMAT, config);

        Some(Self {
            device,
            queue,
            renderer,
            camera: Camera::default(),
            projection: Projection::new(SIZE, SIZE, Deg(60.0), 0.1, 1000.0),
            target,
            depth,
        })
    }

    pub(crate) fn look_from(&mut self, eye: [f32; 3], up: [f32; 3]) {
        self.camera = Camera::new(eye, [0.0, 0.0, 0.0], up);
    }

    pub(crate) fn view_projection(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.camera.view_matrix()
    }

    /// Pixel that `point` lands on with the current camera.
    pub(crate) fn pixel_of(&self, point: Point3<f32>) -> (u32, u32) {
        let clip = self.view_projection() * point.to_homogeneous();
        let ndc = clip.truncate() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * SIZE as f32;
        let y = (1.0 - ndc.y) * 0.5 * SIZE as f32;
        (x as u32, y as u32)
    }

    /// Draws one frame and copies it back to the CPU.
    pub(crate) fn render(&mut self) -> image::RgbaImage {
        let view = self
            .target
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("test encoder"),
            });
        self.renderer.encode_frame(
            &self.device,
            &self.queue,
            &mut encoder,
            &view,
            &self.depth.view,
            self.camera.view_matrix(),
            self.projection.calc_matrix(),
            0.0,
        );

        // SIZE * 4 is already a multiple of COPY_BYTES_PER_ROW_ALIGNMENT
        let bytes_per_row = SIZE * 4;
        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("test readback"),
            size: (bytes_per_row * SIZE) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(SIZE),
                },
            },
            wgpu::Extent3d {
                width: SIZE,
                height: SIZE,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = output.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).unwrap();
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(10)),
            })
            .unwrap();
        futures::executor::block_on(rx.receive()).unwrap().unwrap();

        let data = slice.get_mapped_range();
        let image = image::RgbaImage::from_raw(SIZE, SIZE, data.to_vec()).unwrap();
        drop(data);
        output.unmap();
        image
    }
}

/// Sum of the colour channels, enough to tell lit from unlit pixels.
pub(crate) fn brightness(pixel: &image::Rgba<u8>) -> u32 {
    pixel.0[..3].iter().map(|c| *c as u32).sum()
}

/// 8-bit value an sRGB target stores for the linear intensity `v`.
pub(crate) fn linear_to_srgb_u8(v: f32) -> u8 {
    let v = v.clamp(0.0, 1.0);
    let encoded = if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}
