//! Light descriptors and the bounded light registry.
//!
//! Lights are registered once before the frame loop starts. Each kind has its
//! own capacity; a light beyond it is dropped with a warning and the renderer
//! keeps going with the lights it has.

use cgmath::{Vector3, Vector4};

/// Shader-side array length for every light kind.
pub const MAX_LIGHTS_PER_KIND: usize = 10;

pub type Colour = Vector4<f32>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightCapacity {
    pub directional: usize,
    pub point: usize,
    pub spot: usize,
}

impl LightCapacity {
    /// Limits every kind to what the shaders can hold.
    pub fn clamped(self) -> Self {
        let clamp = |kind: &str, n: usize| {
            if n > MAX_LIGHTS_PER_KIND {
                log::warn!(
                    "Requested {} {} lights but shaders support at most {}!",
                    n,
                    kind,
                    MAX_LIGHTS_PER_KIND
                );
            }
            n.min(MAX_LIGHTS_PER_KIND)
        };
        Self {
            directional: clamp("directional", self.directional),
            point: clamp("point", self.point),
            spot: clamp("spot", self.spot),
        }
    }
}

impl Default for LightCapacity {
    fn default() -> Self {
        Self {
            directional: MAX_LIGHTS_PER_KIND,
            point: MAX_LIGHTS_PER_KIND,
            spot: MAX_LIGHTS_PER_KIND,
        }
    }
}

/// Constant, linear and quadratic distance falloff: `1 / (c + l*d + q*d^2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Attenuation {
    pub const NONE: Self = Self {
        constant: 1.0,
        linear: 0.0,
        quadratic: 0.0,
    };

    pub fn factor(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub ambient: Colour,
    pub diffuse: Colour,
    pub specular: Colour,
    /// World-space direction the light travels in.
    pub direction: Vector3<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub ambient: Colour,
    pub diffuse: Colour,
    pub specular: Colour,
    pub location: Vector3<f32>,
    pub attenuation: Attenuation,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLight {
    pub ambient: Colour,
    pub diffuse: Colour,
    pub specular: Colour,
    pub location: Vector3<f32>,
    pub direction: Vector3<f32>,
    /// Half-angle of the cone in radians.
    pub cutoff: f32,
    pub exponent: f32,
    pub attenuation: Attenuation,
}

impl From<(Colour, Colour, Colour, Vector3<f32>)> for DirectionalLight {
    fn from((ambient, diffuse, specular, direction): (Colour, Colour, Colour, Vector3<f32>)) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            direction,
        }
    }
}

impl From<(Colour, Colour, Colour, Vector3<f32>, Attenuation)> for PointLight {
    fn from(
        (ambient, diffuse, specular, location, attenuation): (
            Colour,
            Colour,
            Colour,
            Vector3<f32>,
            Attenuation,
        ),
    ) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            location,
            attenuation,
        }
    }
}

impl From<(Colour, Colour, Colour, Vector3<f32>, Vector3<f32>, f32, f32)> for SpotLight {
    fn from(
        (ambient, diffuse, specular, location, direction, cutoff, exponent): (
            Colour,
            Colour,
            Colour,
            Vector3<f32>,
            Vector3<f32>,
            f32,
            f32,
        ),
    ) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            location,
            direction,
            cutoff,
            exponent,
            attenuation: Attenuation::NONE,
        }
    }
}

#[derive(Debug)]
pub struct LightRegistry {
    global_ambient: Colour,
    directional: Vec<DirectionalLight>,
    point: Vec<PointLight>,
    spot: Vec<SpotLight>,
    capacity: LightCapacity,
}

impl LightRegistry {
    pub fn new(capacity: LightCapacity) -> Self {
        Self {
            global_ambient: Vector4::new(0.0, 0.0, 0.0, 1.0),
            directional: Vec::new(),
            point: Vec::new(),
            spot: Vec::new(),
            capacity: capacity.clamped(),
        }
    }

    pub fn set_global_ambient(&mut self, colour: Colour) {
        self.global_ambient = colour;
    }

    pub fn global_ambient(&self) -> Colour {
        self.global_ambient
    }

    /// Returns `false` when the registry is full and the light was dropped.
    pub fn add_directional_light(&mut self, light: impl Into<DirectionalLight>) -> bool {
        push_bounded(&mut self.directional, light.into(), self.capacity.directional, "Directional")
    }

    pub fn add_point_light(&mut self, light: impl Into<PointLight>) -> bool {
        push_bounded(&mut self.point, light.into(), self.capacity.point, "Point")
    }

    pub fn add_spot_light(&mut self, light: impl Into<SpotLight>) -> bool {
        push_bounded(&mut self.spot, light.into(), self.capacity.spot, "Spot")
    }

    pub fn directional_lights(&self) -> &[DirectionalLight] {
        &self.directional
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point
    }

    pub fn spot_lights(&self) -> &[SpotLight] {
        &self.spot
    }

    pub fn capacity(&self) -> LightCapacity {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.directional.len() + self.point.len() + self.spot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LightRegistry {
    fn default() -> Self {
        Self::new(LightCapacity::default())
    }
}

fn push_bounded<T>(lights: &mut Vec<T>, light: T, capacity: usize, kind: &str) -> bool {
    if lights.len() >= capacity {
        log::warn!("{} light sources number exceed the limit of {}!", kind, capacity);
        return false;
    }
    lights.push(light);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> Colour {
        Vector4::new(1.0, 1.0, 1.0, 1.0)
    }

    fn sun() -> DirectionalLight {
        (white(), white(), white(), Vector3::new(0.0, -1.0, 0.0)).into()
    }

    #[test]
    fn accepts_lights_up_to_capacity() {
        let mut lights = LightRegistry::new(LightCapacity {
            directional: 2,
            point: 1,
            spot: 0,
        });
        assert!(lights.add_directional_light(sun()));
        assert!(lights.add_directional_light(sun()));
        assert!(!lights.add_directional_light(sun()));
        assert_eq!(lights.directional_lights().len(), 2);

        let lamp = (white(), white(), white(), Vector3::new(0.0, 2.0, 0.0), Attenuation::NONE);
        assert!(lights.add_point_light(lamp));
        assert!(!lights.add_point_light(lamp));
        assert_eq!(lights.point_lights().len(), 1);
        assert_eq!(lights.len(), 3);
    }

    #[test]
    fn overflow_keeps_the_first_lights() {
        let mut lights = LightRegistry::new(LightCapacity {
            directional: 1,
            point: 0,
            spot: 0,
        });
        lights.add_directional_light(sun());
        let mut other = sun();
        other.direction = Vector3::new(1.0, 0.0, 0.0);
        lights.add_directional_light(other);
        assert_eq!(lights.directional_lights()[0], sun());
    }

    #[test]
    fn capacity_is_clamped_to_shader_arrays() {
        let lights = LightRegistry::new(LightCapacity {
            directional: 64,
            point: 3,
            spot: 11,
        });
        assert_eq!(
            lights.capacity(),
            LightCapacity {
                directional: MAX_LIGHTS_PER_KIND,
                point: 3,
                spot: MAX_LIGHTS_PER_KIND,
            }
        );
    }

    #[test]
    fn spot_lights_from_fields_do_not_attenuate() {
        let spot: SpotLight = (
            white(),
            white(),
            white(),
            Vector3::new(0.0, 5.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            0.5,
            2.0,
        )
            .into();
        assert_eq!(spot.attenuation, Attenuation::NONE);
        assert_eq!(spot.attenuation.factor(42.0), 1.0);
    }

    #[test]
    fn attenuation_is_inverse_quadratic() {
        let attenuation = Attenuation {
            constant: 1.0,
            linear: 0.5,
            quadratic: 0.25,
        };
        assert_eq!(attenuation.factor(2.0), 1.0 / 3.0);
    }
}
