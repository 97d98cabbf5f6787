// ABOUTME: Point materials for particle groups and the render settings applied to them.
// ABOUTME: Passed to the renderer untouched; only point sizing is computed here.

use serde::{Deserialize, Serialize};

use psx_core::Color;

/// How particle fragments combine with what is already drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Blending {
    None,
    #[default]
    Normal,
    Additive,
    Subtractive,
    Multiply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    pub depth_write: bool,
    pub blending: Blending,
    pub transparent: bool,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            depth_write: true,
            blending: Blending::Normal,
            transparent: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Material {
    /// Flat colored points, attenuated by distance
    Points { size: f32, color: Color },
    /// Textured points scaled per particle by the `size` attribute
    Sparkle {
        size: f32,
        pixel_ratio: f32,
        color: Color,
        /// Name of the alpha texture, resolved by the renderer
        texture: Option<String>,
    },
}

impl Default for Material {
    fn default() -> Self {
        Material::Points {
            size: 0.1,
            color: Color::PARTICLE_GREEN,
        }
    }
}

impl Material {
    pub fn sparkle(size: f32, color: Color) -> Self {
        Material::Sparkle {
            size,
            pixel_ratio: 1.0,
            color,
            texture: None,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Material::Points { color, .. } | Material::Sparkle { color, .. } => *color,
        }
    }

    /// On-screen point diameter in pixels.
    ///
    /// `view_depth` is the distance in front of the camera; points at or
    /// behind the camera get size zero.
    pub fn point_size(&self, attribute_size: f32, viewport_height: f32, view_depth: f32) -> f32 {
        if view_depth.is_nan() || view_depth <= 0.0 {
            return 0.0;
        }
        let size = match self {
            Material::Points { size, .. } => size * viewport_height * 0.5,
            Material::Sparkle {
                size, pixel_ratio, ..
            } => size * attribute_size * viewport_height * pixel_ratio,
        };
        let size = size / view_depth;
        if size.is_finite() {
            size.max(0.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_plain_points() {
        let settings = ParticleSettings::default();
        assert!(settings.depth_write);
        assert!(!settings.transparent);
        assert_eq!(settings.blending, Blending::Normal);
        assert_eq!(
            Material::default(),
            Material::Points {
                size: 0.1,
                color: Color::rgb(0.0, 1.0, 0.0)
            }
        );
    }

    #[test]
    fn points_shrink_with_distance() {
        let m = Material::default();
        let near = m.point_size(1.0, 240.0, 1.0);
        let far = m.point_size(1.0, 240.0, 4.0);
        assert_eq!(near, 12.0);
        assert_eq!(far, 3.0);
        assert_eq!(m.point_size(1.0, 240.0, 0.0), 0.0);
        assert_eq!(m.point_size(1.0, 240.0, -2.0), 0.0);
    }

    #[test]
    fn sparkle_uses_attribute_size() {
        let m = Material::sparkle(0.25, Color::WHITE);
        assert_eq!(m.point_size(0.5, 200.0, 2.0), 12.5);
        assert_eq!(m.point_size(0.0, 200.0, 2.0), 0.0);
    }
}
