//! GPU textures and texture creation utilities.
//!
//! [`Texture`] wraps a wgpu texture with its view and optional sampler.
//! Colour textures come from decoded images or a solid fill. Depth textures
//! serve as the screen depth buffer and as the layered shadow-map array.

use anyhow::*;
use image::{GenericImageView, ImageFormat, imageops::FilterType, load_from_memory_with_format};

/// Index into the renderer's texture store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) usize);

impl TextureHandle {
    /// 1×1 white, bound to models without a texture.
    pub const WHITE: Self = Self(0);
    /// 1×1 black, returned when loading a texture fails.
    pub const MISSING: Self = Self(1);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Anisotropy level used when [`TextureOptions::anisotropic`] is set.
pub const MAX_ANISOTROPY: u16 = 16;

/// Sampling quality of an image texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureOptions {
    /// Build the full mip chain and blend between levels.
    pub mipmaps: bool,
    pub anisotropic: bool,
}

impl TextureOptions {
    pub const FILTERED: Self = Self {
        mipmaps: true,
        anisotropic: true,
    };
}

/// Number of levels down to 1×1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

pub fn sampler_descriptor(options: TextureOptions) -> wgpu::SamplerDescriptor<'static> {
    // anisotropic sampling requires linear filtering on every axis
    let linear_mips = options.mipmaps || options.anisotropic;
    wgpu::SamplerDescriptor {
        label: Some("texture_sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: if linear_mips {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        },
        anisotropy_clamp: if options.anisotropic { MAX_ANISOTROPY } else { 1 },
        ..Default::default()
    }
}

#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Screen depth buffer, recreated whenever the surface is resized.
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// One square depth layer per shadow-casting light.
    ///
    /// `view` spans every layer and is what the colour pass samples. The
    /// returned per-layer views are the depth attachments of the shadow passes.
    pub fn create_shadow_map_array(
        device: &wgpu::Device,
        size: u32,
        layers: u32,
    ) -> (Self, Vec<wgpu::TextureView>) {
        let layers = layers.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow_map_array"),
            size: wgpu::Extent3d {
                width: size.max(1),
                height: size.max(1),
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("shadow_map_array_view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("shadow_map_layer_{}", layer)),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        (
            Self {
                texture,
                view,
                sampler: None,
            },
            layer_views,
        )
    }

    /// A 1×1 texture of one colour.
    pub fn create_solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        label: &str,
    ) -> Texture {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            1,
            1,
            image::Rgba(rgba),
        ));
        Self::upload(device, queue, &img, Some(label), TextureOptions::default())
    }

    /// Decode raw image file contents. `format` is a file extension hint
    /// such as "png"; without it the format is guessed.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
        options: TextureOptions,
    ) -> Result<Self> {
        let img = match format {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => {
                let format = ImageFormat::from_extension(fmt)
                    .with_context(|| format!("Unknown image format {fmt} for {label}"))?;
                load_from_memory_with_format(bytes, format)?
            }
        };
        Ok(Self::from_image(device, queue, &img, Some(label), options))
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
        options: TextureOptions,
    ) -> Self {
        Self::upload(device, queue, img, label, options)
    }

    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
        options: TextureOptions,
    ) -> Self {
        let (width, height) = img.dimensions();
        let rgba = img.to_rgba8();
        let levels = if options.mipmaps {
            mip_level_count(width, height)
        } else {
            1
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for level in 0..levels {
            let level_width = (width >> level).max(1);
            let level_height = (height >> level).max(1);
            let scaled;
            let pixels = if level == 0 {
                &rgba
            } else {
                scaled = image::imageops::resize(
                    &rgba,
                    level_width,
                    level_height,
                    FilterType::Triangle,
                );
                &scaled
            };
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: level,
                    origin: wgpu::Origin3d::ZERO,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * level_width),
                    rows_per_image: Some(level_height),
                },
                wgpu::Extent3d {
                    width: level_width,
                    height: level_height,
                    depth_or_array_layers: 1,
                },
            );
        }
        log::debug!(
            "Uploaded {:?} with {} mip level(s), anisotropic: {}",
            label,
            levels,
            options.anisotropic
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(device.create_sampler(&sampler_descriptor(options)));

        Self {
            texture,
            view,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_reaches_one_texel() {
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(300, 20), 9);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn plain_textures_sample_a_single_level() {
        let desc = sampler_descriptor(TextureOptions::default());
        assert_eq!(desc.mipmap_filter, wgpu::FilterMode::Nearest);
        assert_eq!(desc.anisotropy_clamp, 1);
    }

    #[test]
    fn filtered_textures_blend_levels() {
        let desc = sampler_descriptor(TextureOptions {
            mipmaps: true,
            anisotropic: false,
        });
        assert_eq!(desc.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.anisotropy_clamp, 1);

        let desc = sampler_descriptor(TextureOptions::FILTERED);
        assert_eq!(desc.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.anisotropy_clamp, MAX_ANISOTROPY);
    }
}
