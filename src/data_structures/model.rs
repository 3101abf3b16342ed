//! Registered models and their per-model render attributes.
//!
//! [`ModelRegistry`] owns one [`ModelEntry`] per registered mesh. Entries are
//! addressed by the dense, stable [`ModelId`] returned at registration and are
//! never removed.

use std::{fmt, rc::Rc};

use cgmath::{InnerSpace, Matrix4, Rad, SquareMatrix, Vector3, Vector4};

use crate::data_structures::{
    material::Material,
    mesh::{DrawCommand, GeometryData, MeshProvider},
    texture::TextureHandle,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    Triangles,
}

impl Topology {
    pub fn primitive(self) -> wgpu::PrimitiveTopology {
        match self {
            Topology::Points => wgpu::PrimitiveTopology::PointList,
            Topology::Lines => wgpu::PrimitiveTopology::LineList,
            Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderStyle {
    PureColorPoints,
    PureColorLines,
    PureColorLineStrip,
    PureColorTriangles,
    /// Colour derived from the vertex position.
    VaryingColorPoints,
    VaryingColorLines,
    VaryingColorLineStrip,
    VaryingColorTriangles,
    Textured,
    /// Material and/or texture under the registered lights.
    Lit,
    /// Like [`RenderStyle::Lit`] with Phong shading and shadow lookups.
    LitWithShadow,
}

impl RenderStyle {
    pub const ALL: [RenderStyle; 11] = [
        RenderStyle::PureColorPoints,
        RenderStyle::PureColorLines,
        RenderStyle::PureColorLineStrip,
        RenderStyle::PureColorTriangles,
        RenderStyle::VaryingColorPoints,
        RenderStyle::VaryingColorLines,
        RenderStyle::VaryingColorLineStrip,
        RenderStyle::VaryingColorTriangles,
        RenderStyle::Textured,
        RenderStyle::Lit,
        RenderStyle::LitWithShadow,
    ];

    pub fn topology(self) -> Topology {
        match self {
            RenderStyle::PureColorPoints | RenderStyle::VaryingColorPoints => Topology::Points,
            RenderStyle::PureColorLines | RenderStyle::VaryingColorLines => Topology::Lines,
            RenderStyle::PureColorLineStrip | RenderStyle::VaryingColorLineStrip => {
                Topology::LineStrip
            }
            RenderStyle::PureColorTriangles
            | RenderStyle::VaryingColorTriangles
            | RenderStyle::Textured
            | RenderStyle::Lit
            | RenderStyle::LitWithShadow => Topology::Triangles,
        }
    }

    pub fn is_lit(self) -> bool {
        matches!(self, RenderStyle::Lit | RenderStyle::LitWithShadow)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LightingMode {
    /// One lighting result per triangle, taken from its first vertex.
    Flat,
    /// Lighting per vertex, interpolated across the triangle.
    #[default]
    Gouraud,
    /// Lighting per fragment.
    Phong,
}

impl LightingMode {
    pub const ALL: [LightingMode; 3] = [LightingMode::Flat, LightingMode::Gouraud, LightingMode::Phong];
}

/// Continuous spin: the model turns by `time * rate` radians around `axis`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    pub axis: Vector3<f32>,
    pub rate: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelId(pub(crate) usize);

impl ModelId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct ModelEntry {
    pub provider: Rc<dyn MeshProvider>,
    pub style: RenderStyle,
    pub color: Vector4<f32>,
    pub texture: Option<TextureHandle>,
    pub texture_weight: f32,
    pub material: Option<Material>,
    pub material_weight: f32,
    pub lighting_mode: LightingMode,
    pub rotation: Option<Rotation>,
    pub casts_shadow: bool,
    pub draw: DrawCommand,
    has_normals: bool,
    has_tex_coords: bool,
}

impl ModelEntry {
    fn new(provider: Rc<dyn MeshProvider>, style: RenderStyle, data: &GeometryData) -> Self {
        Self {
            provider,
            style,
            color: Vector4::new(1.0, 1.0, 1.0, 1.0),
            texture: None,
            texture_weight: 0.0,
            material: None,
            material_weight: 0.0,
            lighting_mode: LightingMode::default(),
            rotation: None,
            casts_shadow: true,
            draw: data.draw_command(),
            has_normals: data.normals.as_ref().is_some_and(|n| !n.is_empty()),
            has_tex_coords: data.tex_coords.as_ref().is_some_and(|t| !t.is_empty()),
        }
    }

    pub fn model_matrix(&self, time_seconds: f32) -> Matrix4<f32> {
        match self.rotation {
            Some(Rotation { axis, rate }) if axis.magnitude2() > 0.0 => {
                Matrix4::from_axis_angle(axis.normalize(), Rad(time_seconds * rate))
            }
            _ => Matrix4::identity(),
        }
    }

    pub fn material_or_default(&self) -> Material {
        self.material.unwrap_or_default()
    }
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("style", &self.style)
            .field("lighting_mode", &self.lighting_mode)
            .field("draw", &self.draw)
            .field("texture", &self.texture)
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

/// A misconfiguration found by [`ModelRegistry::check_model_attributes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeWarning {
    NoVertices(ModelId),
    MissingNormals(ModelId),
    NoSurface(ModelId),
    MissingTexture(ModelId),
    MissingTexCoords(ModelId),
}

impl fmt::Display for AttributeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeWarning::NoVertices(id) => write!(f, "Model {} supplies no vertices", id),
            AttributeWarning::MissingNormals(id) => write!(
                f,
                "Model {} is rendered with lighting but supplies no normals",
                id
            ),
            AttributeWarning::NoSurface(id) => write!(
                f,
                "Model {} is rendered with lighting but has neither a material nor a texture",
                id
            ),
            AttributeWarning::MissingTexture(id) => {
                write!(f, "Model {} is rendered textured but has no texture", id)
            }
            AttributeWarning::MissingTexCoords(id) => write!(
                f,
                "Model {} samples a texture but supplies no texture coordinates",
                id
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Rc<dyn MeshProvider>, style: RenderStyle) -> ModelId {
        let data = GeometryData::from_provider(provider.as_ref());
        self.insert(provider, style, &data)
    }

    /// Registers a provider whose streams were already pulled into `data`.
    pub fn insert(
        &mut self,
        provider: Rc<dyn MeshProvider>,
        style: RenderStyle,
        data: &GeometryData,
    ) -> ModelId {
        let id = ModelId(self.entries.len());
        self.entries.push(ModelEntry::new(provider, style, data));
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ModelId) -> &ModelEntry {
        assert!(id.0 < self.entries.len(), "Invalid model handle {}", id);
        &self.entries[id.0]
    }

    fn get_mut(&mut self, id: ModelId) -> &mut ModelEntry {
        assert!(id.0 < self.entries.len(), "Invalid model handle {}", id);
        &mut self.entries[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &ModelEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (ModelId(index), entry))
    }

    pub fn set_render_style(&mut self, id: ModelId, style: RenderStyle) {
        self.get_mut(id).style = style;
    }

    pub fn set_color(&mut self, id: ModelId, color: Vector4<f32>) {
        self.get_mut(id).color = color;
    }

    pub fn set_texture(&mut self, id: ModelId, texture: TextureHandle, weight: f32) {
        let entry = self.get_mut(id);
        entry.texture = Some(texture);
        entry.texture_weight = weight;
    }

    pub fn set_material(&mut self, id: ModelId, material: Material, weight: f32) {
        let entry = self.get_mut(id);
        entry.material = Some(material);
        entry.material_weight = weight;
    }

    pub fn set_lighting_mode(&mut self, id: ModelId, mode: LightingMode) {
        self.get_mut(id).lighting_mode = mode;
    }

    pub fn set_model_rotation(&mut self, id: ModelId, axis: Vector3<f32>, rate: f32) {
        self.get_mut(id).rotation = Some(Rotation { axis, rate });
    }

    pub fn set_casts_shadow(&mut self, id: ModelId, casts_shadow: bool) {
        self.get_mut(id).casts_shadow = casts_shadow;
    }

    /// Logs and returns every configuration that would render incorrectly.
    /// Nothing is changed; the models still render, just wrongly.
    pub fn check_model_attributes(&self) -> Vec<AttributeWarning> {
        let mut warnings = Vec::new();
        for (id, entry) in self.iter() {
            if entry.draw.vertex_count() == 0 {
                warnings.push(AttributeWarning::NoVertices(id));
                continue;
            }
            if entry.style.is_lit() {
                if !entry.has_normals {
                    warnings.push(AttributeWarning::MissingNormals(id));
                }
                if entry.material.is_none() && entry.texture.is_none() {
                    warnings.push(AttributeWarning::NoSurface(id));
                }
            }
            if entry.style == RenderStyle::Textured && entry.texture.is_none() {
                warnings.push(AttributeWarning::MissingTexture(id));
            }
            let samples_texture = entry.style == RenderStyle::Textured
                || (entry.style.is_lit() && entry.texture.is_some());
            if samples_texture && !entry.has_tex_coords {
                warnings.push(AttributeWarning::MissingTexCoords(id));
            }
        }
        for warning in &warnings {
            log::warn!("{}", warning);
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::Vector4;

    use super::*;
    use crate::data_structures::mesh::MeshData;

    fn triangle() -> MeshData {
        MeshData::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    #[test]
    fn handles_are_dense_and_stable() {
        let mut models = ModelRegistry::new();
        let a = models.register(Rc::new(triangle()), RenderStyle::PureColorTriangles);
        let b = models.register(Rc::new(triangle()), RenderStyle::Lit);
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(models.get(a).style, RenderStyle::PureColorTriangles);
        assert_eq!(models.get(b).style, RenderStyle::Lit);
    }

    #[test]
    fn registration_applies_defaults() {
        let mut models = ModelRegistry::new();
        let id = models.register(Rc::new(triangle()), RenderStyle::Lit);
        let entry = models.get(id);
        assert_eq!(entry.color, Vector4::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(entry.lighting_mode, LightingMode::Gouraud);
        assert_eq!(entry.texture_weight, 0.0);
        assert_eq!(entry.material_weight, 0.0);
        assert!(entry.casts_shadow);
        assert_eq!(entry.draw, DrawCommand::Arrays { count: 3 });
    }

    #[test]
    fn setters_update_only_their_model() {
        let mut models = ModelRegistry::new();
        let a = models.register(Rc::new(triangle()), RenderStyle::Lit);
        let b = models.register(Rc::new(triangle()), RenderStyle::Lit);

        models.set_material(a, Material::gold(), 0.5);
        models.set_texture(a, TextureHandle(3), 0.7);
        models.set_color(a, Vector4::new(1.0, 0.0, 0.0, 1.0));
        models.set_lighting_mode(a, LightingMode::Phong);
        models.set_render_style(a, RenderStyle::LitWithShadow);
        models.set_casts_shadow(a, false);

        let entry = models.get(a);
        assert_eq!(entry.material, Some(Material::gold()));
        assert_eq!(entry.material_weight, 0.5);
        assert_eq!(entry.texture, Some(TextureHandle(3)));
        assert_eq!(entry.texture_weight, 0.7);
        assert_eq!(entry.lighting_mode, LightingMode::Phong);
        assert_eq!(entry.style, RenderStyle::LitWithShadow);
        assert!(!entry.casts_shadow);

        let untouched = models.get(b);
        assert_eq!(untouched.material, None);
        assert_eq!(untouched.style, RenderStyle::Lit);
    }

    #[test]
    #[should_panic(expected = "Invalid model handle")]
    fn unknown_handles_are_rejected() {
        let mut models = ModelRegistry::new();
        models.register(Rc::new(triangle()), RenderStyle::Lit);
        models.set_color(ModelId(1), Vector4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn rotation_spins_with_time() {
        let mut models = ModelRegistry::new();
        let id = models.register(Rc::new(triangle()), RenderStyle::Lit);
        assert_eq!(models.get(id).model_matrix(12.0), Matrix4::identity());

        models.set_model_rotation(id, Vector3::new(0.0, 2.0, 0.0), std::f32::consts::FRAC_PI_2);
        let rotated = models.get(id).model_matrix(1.0) * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(rotated.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn lit_models_without_normals_are_reported() {
        let mut models = ModelRegistry::new();
        let bare = models.register(Rc::new(triangle()), RenderStyle::Lit);
        let complete = models.register(
            Rc::new(triangle().with_normals(vec![[0.0, 0.0, 1.0]; 3])),
            RenderStyle::Lit,
        );
        models.set_material(complete, Material::jade(), 1.0);

        let warnings = models.check_model_attributes();
        assert!(warnings.contains(&AttributeWarning::MissingNormals(bare)));
        assert!(warnings.contains(&AttributeWarning::NoSurface(bare)));
        assert!(warnings.iter().all(|w| match w {
            AttributeWarning::MissingNormals(id) | AttributeWarning::NoSurface(id) => *id != complete,
            _ => true,
        }));
    }

    #[test]
    fn textured_models_need_a_texture_and_coordinates() {
        let mut models = ModelRegistry::new();
        let id = models.register(Rc::new(triangle()), RenderStyle::Textured);
        assert_eq!(
            models.check_model_attributes(),
            vec![
                AttributeWarning::MissingTexture(id),
                AttributeWarning::MissingTexCoords(id)
            ]
        );
    }

    #[test]
    fn empty_meshes_are_reported() {
        struct Nothing;
        impl MeshProvider for Nothing {}
        let mut models = ModelRegistry::new();
        let id = models.register(Rc::new(Nothing), RenderStyle::PureColorPoints);
        assert_eq!(models.check_model_attributes(), vec![AttributeWarning::NoVertices(id)]);
    }
}
