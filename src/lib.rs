//! prism-ngin
//!
//! A small real-time 3D scene renderer on top of wgpu. Callers register
//! meshes through the [`data_structures::mesh::MeshProvider`] trait, attach
//! colours, materials and textures, add directional, point and spot lights,
//! and get one composited frame per redraw, optionally with shadow maps.
//!
//! High-level modules
//! - `camera`: orbit camera, projection and mouse navigation
//! - `config`: renderer settings
//! - `context`: window, surface, device and navigation state
//! - `data_structures`: meshes, models, lights, materials and textures
//! - `lighting`: uniform blocks and the CPU mirror of the lighting equations
//! - `shadow`: shadow slots, light transforms, PCF and the frame schedule
//! - `pipelines`: shader dispatch and every render pipeline
//! - `render`: the renderer that owns the scene and encodes frames
//! - `resources`: asset loading (textures, OBJ meshes)
//! - `flow`: the winit event loop
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod lighting;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod shadow;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use config::{FaceCulling, RendererConfig};
pub use data_structures::{
    light::{Attenuation, DirectionalLight, LightCapacity, PointLight, SpotLight},
    material::Material,
    mesh::{MeshData, MeshProvider},
    model::{LightingMode, ModelId, RenderStyle},
    texture::{TextureHandle, TextureOptions},
};
pub use render::Renderer;
pub use shadow::PcfMode;
pub use winit::event::WindowEvent;
