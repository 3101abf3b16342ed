//! Mesh Provider contract and GPU geometry.
//!
//! A [`MeshProvider`] hands out vertex attribute streams either as flat float
//! arrays (non-indexed) or as per-vertex vectors plus an index list. Every
//! accessor has an empty default, so a provider only implements what it can
//! supply and advertises it through the `supplies_*` flags. Callers check a
//! flag before asking for the data.
//!
//! Tangents are part of the contract for providers shared with other
//! consumers. No pipeline here reads them, so they are never uploaded.

use wgpu::util::DeviceExt;

pub trait MeshProvider {
    fn supplies_vertices(&self) -> bool {
        false
    }
    fn supplies_tex_coords(&self) -> bool {
        false
    }
    fn supplies_normals(&self) -> bool {
        false
    }
    fn supplies_tangents(&self) -> bool {
        false
    }
    fn supplies_indices(&self) -> bool {
        false
    }

    /// Three floats per vertex, one entry per drawn vertex.
    fn vertices_array(&self) -> Vec<f32> {
        Vec::new()
    }
    fn tex_coords_array(&self) -> Vec<f32> {
        Vec::new()
    }
    fn normals_array(&self) -> Vec<f32> {
        Vec::new()
    }
    fn s_tangents_array(&self) -> Vec<f32> {
        Vec::new()
    }
    fn t_tangents_array(&self) -> Vec<f32> {
        Vec::new()
    }

    fn indices(&self) -> Vec<u32> {
        Vec::new()
    }
    fn vertices(&self) -> Vec<[f32; 3]> {
        Vec::new()
    }
    fn tex_coords(&self) -> Vec<[f32; 2]> {
        Vec::new()
    }
    fn normals(&self) -> Vec<[f32; 3]> {
        Vec::new()
    }
    fn s_tangents(&self) -> Vec<[f32; 3]> {
        Vec::new()
    }
    fn t_tangents(&self) -> Vec<[f32; 3]> {
        Vec::new()
    }
}

/// How a model is submitted to the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawCommand {
    Indexed { count: u32 },
    Arrays { count: u32 },
}

impl DrawCommand {
    pub fn vertex_count(&self) -> u32 {
        match self {
            DrawCommand::Indexed { count } | DrawCommand::Arrays { count } => *count,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, DrawCommand::Indexed { .. })
    }
}

/// Attribute streams pulled out of a provider, ready for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryData {
    pub positions: Vec<f32>,
    pub tex_coords: Option<Vec<f32>>,
    pub normals: Option<Vec<f32>>,
    pub indices: Option<Vec<u32>>,
}

impl GeometryData {
    /// Prefers the indexed accessors when the provider supplies indices.
    pub fn from_provider(provider: &dyn MeshProvider) -> Self {
        if !provider.supplies_vertices() {
            return Self::default();
        }

        if provider.supplies_indices() {
            Self {
                positions: flatten(&provider.vertices()),
                tex_coords: provider
                    .supplies_tex_coords()
                    .then(|| flatten(&provider.tex_coords())),
                normals: provider
                    .supplies_normals()
                    .then(|| flatten(&provider.normals())),
                indices: Some(provider.indices()),
            }
        } else {
            Self {
                positions: provider.vertices_array(),
                tex_coords: provider
                    .supplies_tex_coords()
                    .then(|| provider.tex_coords_array()),
                normals: provider.supplies_normals().then(|| provider.normals_array()),
                indices: None,
            }
        }
    }

    pub fn vertex_len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn draw_command(&self) -> DrawCommand {
        match &self.indices {
            Some(indices) => DrawCommand::Indexed {
                count: indices.len() as u32,
            },
            None => DrawCommand::Arrays {
                count: self.vertex_len() as u32,
            },
        }
    }
}

fn flatten<const N: usize>(items: &[[f32; N]]) -> Vec<f32> {
    items.iter().flatten().copied().collect()
}

/// GPU buffers of one registered model.
///
/// Texture coordinates and normals always have a buffer so every pipeline can
/// draw every model. Missing streams are zero-filled.
#[derive(Debug)]
pub struct GpuGeometry {
    pub positions: wgpu::Buffer,
    pub tex_coords: wgpu::Buffer,
    pub normals: wgpu::Buffer,
    pub indices: Option<wgpu::Buffer>,
    pub draw: DrawCommand,
}

impl GpuGeometry {
    pub fn upload(device: &wgpu::Device, label: &str, data: &GeometryData) -> Self {
        let vertex_len = data.vertex_len().max(1);
        let vertex_buffer = |name: &str, contents: &[f32]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} {} Buffer", label, name)),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::VERTEX,
            })
        };
        let or_zeroed = |stream: Option<&Vec<f32>>, components: usize| match stream {
            Some(values) if !values.is_empty() => values.clone(),
            _ => vec![0.0; vertex_len * components],
        };

        let positions = vertex_buffer("Position", &or_zeroed(Some(&data.positions), 3)[..]);
        let tex_coords = vertex_buffer("TexCoord", &or_zeroed(data.tex_coords.as_ref(), 2)[..]);
        let normals = vertex_buffer("Normal", &or_zeroed(data.normals.as_ref(), 3)[..]);
        let indices = data.indices.as_ref().map(|indices| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Index Buffer", label)),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        Self {
            positions,
            tex_coords,
            normals,
            indices,
            draw: data.draw_command(),
        }
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        match (self.draw, &self.indices) {
            (DrawCommand::Indexed { count }, Some(indices)) => {
                render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..count, 0, 0..1);
            }
            (draw, _) => render_pass.draw(0..draw.vertex_count(), 0..1),
        }
    }
}

/// In-memory geometry, for meshes built in code.
///
/// Supplies indices whenever `indices` is non-empty, otherwise the per-vertex
/// streams are handed out as flat arrays in vertex order.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub s_tangents: Vec<[f32; 3]>,
    pub t_tangents: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            ..Default::default()
        }
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = indices;
        self
    }

    pub fn with_tex_coords(mut self, tex_coords: Vec<[f32; 2]>) -> Self {
        self.tex_coords = tex_coords;
        self
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_tangents(mut self, s_tangents: Vec<[f32; 3]>, t_tangents: Vec<[f32; 3]>) -> Self {
        self.s_tangents = s_tangents;
        self.t_tangents = t_tangents;
        self
    }

    /// Expands the index list into a triangle soup with the same draw order.
    pub fn unindexed(&self) -> Self {
        if self.indices.is_empty() {
            return self.clone();
        }
        fn gather<T: Copy>(stream: &[T], indices: &[u32]) -> Vec<T> {
            if stream.is_empty() {
                return Vec::new();
            }
            indices.iter().map(|&i| stream[i as usize]).collect()
        }
        Self {
            positions: gather(&self.positions, &self.indices),
            tex_coords: gather(&self.tex_coords, &self.indices),
            normals: gather(&self.normals, &self.indices),
            s_tangents: gather(&self.s_tangents, &self.indices),
            t_tangents: gather(&self.t_tangents, &self.indices),
            indices: Vec::new(),
        }
    }
}

impl MeshProvider for MeshData {
    fn supplies_vertices(&self) -> bool {
        !self.positions.is_empty()
    }
    fn supplies_tex_coords(&self) -> bool {
        !self.tex_coords.is_empty()
    }
    fn supplies_normals(&self) -> bool {
        !self.normals.is_empty()
    }
    fn supplies_tangents(&self) -> bool {
        !self.s_tangents.is_empty() && !self.t_tangents.is_empty()
    }
    fn supplies_indices(&self) -> bool {
        !self.indices.is_empty()
    }

    fn vertices_array(&self) -> Vec<f32> {
        flatten(&self.positions)
    }
    fn tex_coords_array(&self) -> Vec<f32> {
        flatten(&self.tex_coords)
    }
    fn normals_array(&self) -> Vec<f32> {
        flatten(&self.normals)
    }
    fn s_tangents_array(&self) -> Vec<f32> {
        flatten(&self.s_tangents)
    }
    fn t_tangents_array(&self) -> Vec<f32> {
        flatten(&self.t_tangents)
    }

    fn indices(&self) -> Vec<u32> {
        self.indices.clone()
    }
    fn vertices(&self) -> Vec<[f32; 3]> {
        self.positions.clone()
    }
    fn tex_coords(&self) -> Vec<[f32; 2]> {
        self.tex_coords.clone()
    }
    fn normals(&self) -> Vec<[f32; 3]> {
        self.normals.clone()
    }
    fn s_tangents(&self) -> Vec<[f32; 3]> {
        self.s_tangents.clone()
    }
    fn t_tangents(&self) -> Vec<[f32; 3]> {
        self.t_tangents.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshData {
        MeshData::new(vec![
            [-1.0, 0.0, -1.0],
            [1.0, 0.0, -1.0],
            [1.0, 0.0, 1.0],
            [-1.0, 0.0, 1.0],
        ])
        .with_normals(vec![[0.0, 1.0, 0.0]; 4])
        .with_indices(vec![0, 2, 1, 0, 3, 2])
    }

    #[test]
    fn indexed_providers_draw_by_index_count() {
        let data = GeometryData::from_provider(&quad());
        assert_eq!(data.draw_command(), DrawCommand::Indexed { count: 6 });
        assert_eq!(data.positions.len(), 12);
        assert_eq!(data.normals.as_ref().map(Vec::len), Some(12));
        assert_eq!(data.tex_coords, None);
    }

    #[test]
    fn triangle_soups_draw_by_vertex_count() {
        let soup = quad().unindexed();
        let data = GeometryData::from_provider(&soup);
        assert_eq!(data.draw_command(), DrawCommand::Arrays { count: 6 });
        assert_eq!(data.indices, None);
        assert_eq!(&data.positions[0..3], &[-1.0, 0.0, -1.0]);
        assert_eq!(&data.positions[3..6], &[1.0, 0.0, 1.0]);
    }

    #[test]
    fn both_paths_yield_three_vertices_per_triangle() {
        let triangles = 2;
        let indexed = GeometryData::from_provider(&quad()).draw_command();
        let soup = GeometryData::from_provider(&quad().unindexed()).draw_command();
        assert_eq!(indexed.vertex_count(), 3 * triangles);
        assert_eq!(soup.vertex_count(), 3 * triangles);
        assert!(indexed.is_indexed());
        assert!(!soup.is_indexed());
    }

    #[test]
    fn flat_array_only_providers_are_supported() {
        struct Flat;
        impl MeshProvider for Flat {
            fn supplies_vertices(&self) -> bool {
                true
            }
            fn vertices_array(&self) -> Vec<f32> {
                vec![0.0; 9]
            }
        }
        let data = GeometryData::from_provider(&Flat);
        assert_eq!(data.draw_command(), DrawCommand::Arrays { count: 3 });
        assert_eq!(data.normals, None);
    }

    #[test]
    fn providers_without_vertices_are_empty() {
        struct Nothing;
        impl MeshProvider for Nothing {}
        let data = GeometryData::from_provider(&Nothing);
        assert_eq!(data.draw_command().vertex_count(), 0);
    }
}
