//! Phong material coefficients and a handful of classic presets.

use cgmath::Vector4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub ambient: Vector4<f32>,
    pub diffuse: Vector4<f32>,
    pub specular: Vector4<f32>,
    pub shininess: f32,
}

impl Material {
    pub fn new(
        ambient: [f32; 4],
        diffuse: [f32; 4],
        specular: [f32; 4],
        shininess: f32,
    ) -> Self {
        Self {
            ambient: ambient.into(),
            diffuse: diffuse.into(),
            specular: specular.into(),
            shininess,
        }
    }

    pub fn gold() -> Self {
        Self::new(
            [0.24725, 0.1995, 0.0745, 1.0],
            [0.75164, 0.60648, 0.22648, 1.0],
            [0.62828, 0.5558, 0.36607, 1.0],
            51.2,
        )
    }

    pub fn silver() -> Self {
        Self::new(
            [0.19225, 0.19225, 0.19225, 1.0],
            [0.50754, 0.50754, 0.50754, 1.0],
            [0.50827, 0.50827, 0.50827, 1.0],
            51.2,
        )
    }

    pub fn bronze() -> Self {
        Self::new(
            [0.2125, 0.1275, 0.054, 1.0],
            [0.714, 0.4284, 0.1814, 1.0],
            [0.3936, 0.2719, 0.1667, 1.0],
            25.6,
        )
    }

    pub fn jade() -> Self {
        Self::new(
            [0.135, 0.2225, 0.1575, 0.95],
            [0.54, 0.89, 0.63, 0.95],
            [0.3162, 0.3162, 0.3162, 0.95],
            12.8,
        )
    }

    pub fn pearl() -> Self {
        Self::new(
            [0.25, 0.20725, 0.20725, 0.922],
            [1.0, 0.829, 0.829, 0.922],
            [0.2966, 0.2966, 0.2966, 0.922],
            51.2,
        )
    }
}

/// No reflectance at all; what a model uses until a material is set.
impl Default for Material {
    fn default() -> Self {
        Self::new([0.0; 4], [0.0; 4], [0.0; 4], 1.0)
    }
}
