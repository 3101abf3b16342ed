//! Scene data: meshes, models, lights, materials and textures.
//!
//! Everything here is plain CPU-side state except [`texture`] and the
//! [`mesh::GpuGeometry`] upload helper. The registries can be built and
//! inspected without a GPU.

pub mod light;
pub mod material;
pub mod mesh;
pub mod model;
pub mod texture;
