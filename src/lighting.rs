//! Uniform blocks for lit rendering and a CPU mirror of the lighting equations.
//!
//! [`LightsUniform`] is rebuilt every frame from the [`LightRegistry`] and the
//! current view matrix, so all light positions and directions are uploaded in
//! view space. [`ModelUniform`] carries the per-model matrices, material and
//! blend weights.
//!
//! The shader (`pipelines/lighting.wgsl`) accumulates four terms over every
//! active light:
//! - ambient `+= light.ambient * scale`
//! - diffuse `+= light.diffuse * max(N·L, 0) * scale`
//! - material specular `+= light.specular * max(R·V, 0)^shininess * scale`
//! - texture specular `+= light.specular * max(R·V, 0) * scale`
//!
//! `scale` is 1 for directional lights, the distance attenuation for point
//! lights, and attenuation times the cone strength for spot lights. Shadowed
//! lights scale diffuse and both specular terms by their visibility. The
//! terms are finally blended by [`compose_color`]. [`LightsUniform::evaluate`]
//! performs the same arithmetic on the CPU.

use cgmath::{
    ElementWise, InnerSpace, Matrix, Matrix4, SquareMatrix, Vector3, Vector4, Zero,
};

use crate::{
    data_structures::{
        light::{Attenuation, LightRegistry, MAX_LIGHTS_PER_KIND},
        material::Material,
        model::{LightingMode, ModelEntry},
    },
    shadow,
};

/// One shadow slot per light of every kind.
pub const MAX_SHADOW_SLOTS: usize = 3 * MAX_LIGHTS_PER_KIND;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightRaw {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub direction: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub location: [f32; 4],
    /// constant, linear, quadratic, unused
    pub attenuation: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotLightRaw {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub location: [f32; 4],
    pub direction: [f32; 4],
    pub attenuation: [f32; 4],
    /// cutoff angle, exponent, unused, unused
    pub cone: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    pub global_ambient: [f32; 4],
    /// directional, point, spot, unused
    pub counts: [u32; 4],
    pub directional: [DirectionalLightRaw; MAX_LIGHTS_PER_KIND],
    pub point: [PointLightRaw; MAX_LIGHTS_PER_KIND],
    pub spot: [SpotLightRaw; MAX_LIGHTS_PER_KIND],
}

fn attenuation_raw(attenuation: &Attenuation) -> [f32; 4] {
    [attenuation.constant, attenuation.linear, attenuation.quadratic, 0.0]
}

impl LightsUniform {
    /// Snapshot of the registry with positions and directions in view space.
    pub fn from_registry(lights: &LightRegistry, view: Matrix4<f32>) -> Self {
        let mut uniform = Self {
            global_ambient: lights.global_ambient().into(),
            counts: [
                lights.directional_lights().len() as u32,
                lights.point_lights().len() as u32,
                lights.spot_lights().len() as u32,
                0,
            ],
            ..Default::default()
        };

        for (raw, light) in uniform.directional.iter_mut().zip(lights.directional_lights()) {
            *raw = DirectionalLightRaw {
                ambient: light.ambient.into(),
                diffuse: light.diffuse.into(),
                specular: light.specular.into(),
                direction: (view * light.direction.extend(0.0)).into(),
            };
        }
        for (raw, light) in uniform.point.iter_mut().zip(lights.point_lights()) {
            *raw = PointLightRaw {
                ambient: light.ambient.into(),
                diffuse: light.diffuse.into(),
                specular: light.specular.into(),
                location: (view * light.location.extend(1.0)).into(),
                attenuation: attenuation_raw(&light.attenuation),
            };
        }
        for (raw, light) in uniform.spot.iter_mut().zip(lights.spot_lights()) {
            *raw = SpotLightRaw {
                ambient: light.ambient.into(),
                diffuse: light.diffuse.into(),
                specular: light.specular.into(),
                location: (view * light.location.extend(1.0)).into(),
                direction: (view * light.direction.extend(0.0)).into(),
                attenuation: attenuation_raw(&light.attenuation),
                cone: [light.cutoff, light.exponent, 0.0, 0.0],
            };
        }
        uniform
    }

    pub fn active_counts(&self) -> [usize; 3] {
        [
            self.counts[0] as usize,
            self.counts[1] as usize,
            self.counts[2] as usize,
        ]
    }

    /// CPU version of `accumulate_lights` in the shaders, for a view-space
    /// surface point. `visibility` receives the light's shadow slot
    /// (directional first, then point, then spot) and returns 0..=1.
    pub fn evaluate(
        &self,
        position: Vector3<f32>,
        normal: Vector3<f32>,
        shininess: f32,
        visibility: impl Fn(usize) -> f32,
    ) -> LightingTerms {
        let mut terms = LightingTerms {
            ambient: xyz(self.global_ambient),
            ..LightingTerms::zero()
        };
        let [directional, point, spot] = self.active_counts();
        let n = normal.normalize();
        let surface = Surface {
            position,
            normal: n,
            shininess,
        };

        for (i, light) in self.directional[..directional].iter().enumerate() {
            let l = -xyz(light.direction).normalize();
            terms += surface.contribution(
                [light.ambient, light.diffuse, light.specular],
                l,
                1.0,
                visibility(i),
            );
        }
        for (i, light) in self.point[..point].iter().enumerate() {
            let to_light = xyz(light.location) - position;
            let distance = to_light.magnitude();
            let scale = attenuation_factor(light.attenuation, distance);
            terms += surface.contribution(
                [light.ambient, light.diffuse, light.specular],
                to_light.normalize(),
                scale,
                visibility(directional + i),
            );
        }
        for (i, light) in self.spot[..spot].iter().enumerate() {
            let to_light = xyz(light.location) - position;
            let l = to_light.normalize();
            let scale = attenuation_factor(light.attenuation, to_light.magnitude())
                * spot_strength(-l, xyz(light.direction), light.cone[0], light.cone[1]);
            terms += surface.contribution(
                [light.ambient, light.diffuse, light.specular],
                l,
                scale,
                visibility(directional + point + i),
            );
        }
        terms
    }
}

fn xyz(v: [f32; 4]) -> Vector3<f32> {
    Vector3::new(v[0], v[1], v[2])
}

fn attenuation_factor(constants: [f32; 4], distance: f32) -> f32 {
    Attenuation {
        constant: constants[0],
        linear: constants[1],
        quadratic: constants[2],
    }
    .factor(distance)
}

/// `cos^exponent` of the angle between the light's axis and the ray towards
/// the surface, zero outside the cone.
pub fn spot_strength(ray: Vector3<f32>, axis: Vector3<f32>, cutoff: f32, exponent: f32) -> f32 {
    let cos_off_axis = ray.normalize().dot(axis.normalize());
    if cos_off_axis > cutoff.cos() {
        cos_off_axis.powf(exponent)
    } else {
        0.0
    }
}

struct Surface {
    position: Vector3<f32>,
    normal: Vector3<f32>,
    shininess: f32,
}

impl Surface {
    fn contribution(
        &self,
        [ambient, diffuse, specular]: [[f32; 4]; 3],
        l: Vector3<f32>,
        scale: f32,
        visibility: f32,
    ) -> LightingTerms {
        let v = (-self.position).normalize();
        let r = reflect(-l, self.normal);
        let r_dot_v = r.dot(v).max(0.0);
        let lit = scale * visibility;
        LightingTerms {
            ambient: xyz(ambient) * scale,
            diffuse: xyz(diffuse) * self.normal.dot(l).max(0.0) * lit,
            material_specular: xyz(specular) * r_dot_v.powf(self.shininess) * lit,
            texture_specular: xyz(specular) * r_dot_v * lit,
        }
    }
}

fn reflect(incident: Vector3<f32>, normal: Vector3<f32>) -> Vector3<f32> {
    incident - normal * (2.0 * normal.dot(incident))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightingTerms {
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub material_specular: Vector3<f32>,
    pub texture_specular: Vector3<f32>,
}

impl LightingTerms {
    pub fn zero() -> Self {
        Self {
            ambient: Vector3::zero(),
            diffuse: Vector3::zero(),
            material_specular: Vector3::zero(),
            texture_specular: Vector3::zero(),
        }
    }
}

impl std::ops::AddAssign for LightingTerms {
    fn add_assign(&mut self, rhs: Self) {
        self.ambient += rhs.ambient;
        self.diffuse += rhs.diffuse;
        self.material_specular += rhs.material_specular;
        self.texture_specular += rhs.texture_specular;
    }
}

/// Blends texture and material contributions. Each side only counts when
/// its weight is non-zero; the weights are not normalised.
pub fn compose_color(
    terms: &LightingTerms,
    material: &Material,
    material_weight: f32,
    texture_weight: f32,
    texel: Vector4<f32>,
) -> Vector4<f32> {
    let mut color = Vector4::zero();
    if texture_weight != 0.0 {
        let light = terms.ambient * 0.3 + terms.diffuse * 0.4 + terms.texture_specular * 0.4;
        color += texel.mul_element_wise(light.extend(1.0)) * texture_weight;
    }
    if material_weight != 0.0 {
        let reflected = xyz(material.ambient.into()).mul_element_wise(terms.ambient)
            + xyz(material.diffuse.into()).mul_element_wise(terms.diffuse)
            + xyz(material.specular.into()).mul_element_wise(terms.material_specular);
        color += reflected.extend(1.0) * material_weight;
    }
    color
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    /// Inverse transpose of `model_view`.
    pub normal: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub material_ambient: [f32; 4],
    pub material_diffuse: [f32; 4],
    pub material_specular: [f32; 4],
    /// shininess, material weight, texture weight, flat shading (0 or 1)
    pub params: [f32; 4],
    /// `bias * light_view_projection * model` per shadow slot.
    pub shadow_matrices: [[[f32; 4]; 4]; MAX_SHADOW_SLOTS],
}

impl ModelUniform {
    pub fn new(
        entry: &ModelEntry,
        model: Matrix4<f32>,
        view: Matrix4<f32>,
        proj: Matrix4<f32>,
        light_view_projections: &[Matrix4<f32>],
    ) -> Self {
        let model_view = view * model;
        let normal = model_view
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix4::identity);
        let material = entry.material_or_default();
        let flat = if entry.lighting_mode == LightingMode::Flat {
            1.0
        } else {
            0.0
        };

        let mut shadow_matrices = [[[0.0; 4]; 4]; MAX_SHADOW_SLOTS];
        for (slot, light_vp) in shadow_matrices.iter_mut().zip(light_view_projections) {
            *slot = (shadow::bias_matrix() * *light_vp * model).into();
        }

        Self {
            model: model.into(),
            model_view: model_view.into(),
            proj: proj.into(),
            normal: normal.into(),
            color: entry.color.into(),
            material_ambient: material.ambient.into(),
            material_diffuse: material.diffuse.into(),
            material_specular: material.specular.into(),
            params: [
                material.shininess,
                entry.material_weight,
                entry.texture_weight,
                flat,
            ],
            shadow_matrices,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use approx::assert_relative_eq;
    use cgmath::{Point3, Rad, Vector3, Vector4};

    use super::*;
    use crate::data_structures::{
        light::{Attenuation, DirectionalLight, LightCapacity, PointLight, SpotLight},
        mesh::MeshData,
        model::{ModelRegistry, RenderStyle},
    };

    fn grey(v: f32) -> Vector4<f32> {
        Vector4::new(v, v, v, 1.0)
    }

    fn sun(direction: Vector3<f32>) -> DirectionalLight {
        (grey(0.1), grey(0.8), grey(0.5), direction).into()
    }

    fn lights_with_ambient(ambient: f32) -> LightRegistry {
        let mut lights = LightRegistry::new(LightCapacity::default());
        lights.set_global_ambient(grey(ambient));
        lights
    }

    #[test]
    fn upload_counts_match_registered_lights() {
        let mut lights = lights_with_ambient(0.0);
        for _ in 0..3 {
            lights.add_directional_light(sun(Vector3::new(0.0, -1.0, 0.0)));
        }
        lights.add_point_light((
            grey(0.1),
            grey(1.0),
            grey(1.0),
            Vector3::new(0.0, 2.0, 0.0),
            Attenuation::NONE,
        ));
        let uniform = LightsUniform::from_registry(&lights, Matrix4::identity());
        assert_eq!(uniform.active_counts(), [3, 1, 0]);
    }

    #[test]
    fn no_lights_leave_only_global_ambient() {
        let lights = lights_with_ambient(0.25);
        let uniform = LightsUniform::from_registry(&lights, Matrix4::identity());
        let terms = uniform.evaluate(
            Vector3::new(0.0, 0.0, -5.0),
            Vector3::new(0.0, 0.0, 1.0),
            32.0,
            |_| 1.0,
        );
        assert_eq!(terms.ambient, Vector3::new(0.25, 0.25, 0.25));
        assert_eq!(terms.diffuse, Vector3::zero());
        assert_eq!(terms.material_specular, Vector3::zero());

        let color = compose_color(&terms, &Material::silver(), 1.0, 0.0, grey(1.0));
        assert_relative_eq!(color.x, 0.19225 * 0.25, epsilon = 1e-6);
        assert_relative_eq!(color.w, 1.0);
    }

    #[test]
    fn head_on_directional_light_is_fully_diffuse() {
        let mut lights = lights_with_ambient(0.0);
        lights.add_directional_light(sun(Vector3::new(0.0, 0.0, -1.0)));
        let uniform = LightsUniform::from_registry(&lights, Matrix4::identity());
        let terms = uniform.evaluate(
            Vector3::new(0.0, 0.0, -5.0),
            Vector3::new(0.0, 0.0, 1.0),
            8.0,
            |_| 1.0,
        );
        assert_relative_eq!(terms.ambient.x, 0.1, epsilon = 1e-6);
        assert_relative_eq!(terms.diffuse.x, 0.8, epsilon = 1e-6);
        // reflection points straight back at the eye
        assert_relative_eq!(terms.material_specular.x, 0.5, epsilon = 1e-6);
        assert_relative_eq!(terms.texture_specular.x, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn shadowed_lights_keep_their_ambient() {
        let mut lights = lights_with_ambient(0.0);
        lights.add_directional_light(sun(Vector3::new(0.0, 0.0, -1.0)));
        let uniform = LightsUniform::from_registry(&lights, Matrix4::identity());
        let terms = uniform.evaluate(
            Vector3::new(0.0, 0.0, -5.0),
            Vector3::new(0.0, 0.0, 1.0),
            8.0,
            |_| 0.0,
        );
        assert_relative_eq!(terms.ambient.x, 0.1, epsilon = 1e-6);
        assert_eq!(terms.diffuse, Vector3::zero());
        assert_eq!(terms.texture_specular, Vector3::zero());
    }

    #[test]
    fn point_lights_fall_off_with_distance() {
        let mut lights = lights_with_ambient(0.0);
        let lamp: PointLight = (
            grey(0.0),
            grey(1.0),
            grey(0.0),
            Vector3::new(0.0, 0.0, -1.0),
            Attenuation {
                constant: 1.0,
                linear: 0.0,
                quadratic: 1.0,
            },
        )
            .into();
        lights.add_point_light(lamp);
        let uniform = LightsUniform::from_registry(&lights, Matrix4::identity());
        let terms = uniform.evaluate(
            Vector3::new(0.0, 0.0, -3.0),
            Vector3::new(0.0, 0.0, 1.0),
            8.0,
            |_| 1.0,
        );
        assert_relative_eq!(terms.diffuse.x, 1.0 / 5.0, epsilon = 1e-6);
    }

    #[test]
    fn spot_lights_only_reach_inside_their_cone() {
        let axis = Vector3::new(0.0, -1.0, 0.0);
        assert_eq!(spot_strength(Vector3::new(1.0, -0.1, 0.0), axis, 0.5, 1.0), 0.0);
        assert_relative_eq!(spot_strength(axis, axis, 0.5, 4.0), 1.0);
        let inside = Vector3::new(0.2, -1.0, 0.0);
        let cos = inside.normalize().dot(axis);
        assert_relative_eq!(spot_strength(inside, axis, 0.5, 3.0), cos.powf(3.0), epsilon = 1e-6);
    }

    #[test]
    fn spot_light_slots_follow_directional_and_point_lights() {
        let mut lights = lights_with_ambient(0.0);
        lights.add_directional_light(sun(Vector3::new(0.0, 0.0, -1.0)));
        let spot: SpotLight = (
            grey(0.0),
            grey(1.0),
            grey(0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            0.3,
            1.0,
        )
            .into();
        lights.add_spot_light(spot);
        let uniform = LightsUniform::from_registry(&lights, Matrix4::identity());
        let terms = uniform.evaluate(
            Vector3::new(0.0, 0.0, -2.0),
            Vector3::new(0.0, 0.0, 1.0),
            8.0,
            |slot| if slot == 1 { 0.0 } else { 1.0 },
        );
        assert_relative_eq!(terms.diffuse.x, 0.8, epsilon = 1e-6);
    }

    #[test]
    fn lights_are_uploaded_in_view_space() {
        let mut lights = lights_with_ambient(0.0);
        lights.add_directional_light(sun(Vector3::new(1.0, 0.0, 0.0)));
        lights.add_point_light((
            grey(0.0),
            grey(1.0),
            grey(0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Attenuation::NONE,
        ));
        let view = Matrix4::look_at_rh(
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::unit_y(),
        ) * Matrix4::from_angle_y(Rad(std::f32::consts::FRAC_PI_2));
        let uniform = LightsUniform::from_registry(&lights, view);

        let direction = uniform.directional[0].direction;
        assert_relative_eq!(direction[2], -1.0, epsilon = 1e-6);
        assert_eq!(direction[3], 0.0);
        let location = uniform.point[0].location;
        assert_relative_eq!(location[2], -6.0, epsilon = 1e-5);
        assert_eq!(location[3], 1.0);
    }

    #[test]
    fn blend_weights_are_not_normalised() {
        let mut terms = LightingTerms::zero();
        terms.ambient = Vector3::new(1.0, 1.0, 1.0);
        let material = Material::new([1.0; 4], [0.0; 4], [0.0; 4], 1.0);
        let color = compose_color(&terms, &material, 1.0, 1.0, grey(1.0));
        assert_relative_eq!(color.x, 1.3, epsilon = 1e-6);
        assert_relative_eq!(color.w, 2.0);
    }

    #[test]
    fn zero_weights_contribute_nothing() {
        let mut terms = LightingTerms::zero();
        terms.ambient = Vector3::new(1.0, 1.0, 1.0);
        let color = compose_color(&terms, &Material::gold(), 0.0, 0.0, grey(1.0));
        assert_eq!(color, Vector4::zero());
    }

    #[test]
    fn model_uniform_carries_weights_and_normal_matrix() {
        let mut models = ModelRegistry::new();
        let id = models.register(
            Rc::new(MeshData::new(vec![[0.0; 3]; 3])),
            RenderStyle::Lit,
        );
        models.set_material(id, Material::bronze(), 0.5);
        models.set_lighting_mode(id, LightingMode::Flat);

        let scale = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let uniform = ModelUniform::new(
            models.get(id),
            scale,
            Matrix4::identity(),
            Matrix4::identity(),
            &[Matrix4::identity()],
        );
        assert_eq!(uniform.params, [25.6, 0.5, 0.0, 1.0]);
        assert_relative_eq!(uniform.normal[0][0], 0.5);
        // bias * identity * scale maps x = 1 to 0.5 * 2 + 0.5
        assert_relative_eq!(uniform.shadow_matrices[0][0][0], 1.0);
        assert_relative_eq!(uniform.shadow_matrices[0][3][0], 0.5);
        assert_eq!(uniform.shadow_matrices[1], [[0.0; 4]; 4]);
    }
}
