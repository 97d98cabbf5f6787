// ABOUTME: Color representation shared by the post-processing stages.
// ABOUTME: Linear RGBA floats with the arithmetic the effect stages need.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn gray(v: f32) -> Self {
        Self::rgb(v, v, v)
    }

    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    /// Default sparkle particle tint (#00ff00)
    pub const PARTICLE_GREEN: Self = Self::rgb(0.0, 1.0, 0.0);

    /// Convert to 8-bit channels, clamping to the displayable range
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_array(v: [f32; 4]) -> Self {
        Self::rgba(v[0], v[1], v[2], v[3])
    }

    /// Apply `f` to the color channels, leaving alpha alone
    pub fn map_rgb(self, f: impl Fn(f32) -> f32) -> Self {
        Self::rgba(f(self.r), f(self.g), f(self.b), self.a)
    }

    /// Multiply the color channels by `s`
    pub fn scale_rgb(self, s: f32) -> Self {
        self.map_rgb(|c| c * s)
    }

    /// Linear interpolation of all four channels, exact at both ends
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let s = 1.0 - t;
        Self::rgba(
            self.r * s + other.r * t,
            self.g * s + other.g * t,
            self.b * s + other.b * t,
            self.a * s + other.a * t,
        )
    }

    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    pub fn max_channel(self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    pub fn min_channel(self) -> f32 {
        self.r.min(self.g).min(self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}
