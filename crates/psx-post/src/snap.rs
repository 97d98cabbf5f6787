// ABOUTME: Vertex projection with optional snapping of clip positions to a coarse grid.
// ABOUTME: Chosen once when the scene is built and handed to whatever projects vertices.

use nalgebra::{Matrix4, Vector3, Vector4};

use psx_core::VertexSnapSettings;

/// Matrices applied to a vertex, in stage order
#[derive(Debug, Clone, PartialEq)]
pub struct DrawTransforms {
    /// Per-draw matrix of a batched mesh, applied first
    pub batching: Option<Matrix4<f32>>,
    /// Per-instance matrix, applied after batching
    pub instance: Option<Matrix4<f32>>,
    pub model_view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

impl Default for DrawTransforms {
    fn default() -> Self {
        Self {
            batching: None,
            instance: None,
            model_view: Matrix4::identity(),
            projection: Matrix4::identity(),
        }
    }
}

impl DrawTransforms {
    pub fn new(model_view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        Self {
            model_view,
            projection,
            ..Default::default()
        }
    }

    /// Clip-space position of an object-space point
    pub fn to_clip(&self, position: &Vector3<f32>) -> Vector4<f32> {
        let mut p = position.push(1.0);
        if let Some(batching) = &self.batching {
            p = batching * p;
        }
        if let Some(instance) = &self.instance {
            p = instance * p;
        }
        self.projection * (self.model_view * p)
    }
}

/// Vertex stage hook: object-space position in, clip-space position out
pub trait VertexProjection {
    fn project(&self, position: &Vector3<f32>, transforms: &DrawTransforms) -> Vector4<f32>;
}

/// Plain projection with no snapping
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StandardProjection;

impl VertexProjection for StandardProjection {
    fn project(&self, position: &Vector3<f32>, transforms: &DrawTransforms) -> Vector4<f32> {
        transforms.to_clip(position)
    }
}

/// Snaps projected vertices to a `grid[0] x grid[1]` lattice in normalized device space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexSnap {
    grid: [f32; 2],
}

impl VertexSnap {
    pub fn new(settings: &VertexSnapSettings) -> Self {
        let jitter = if settings.jitter_strength.is_nan() {
            0.0
        } else {
            settings.jitter_strength.clamp(0.0, 1.0)
        };
        let axis = |r: u32| (r as f32 * (1.0 - jitter)).floor().max(1.0);
        let grid = [axis(settings.resolution[0]), axis(settings.resolution[1])];
        tracing::debug!("Vertex snap grid {}x{}", grid[0], grid[1]);
        Self { grid }
    }

    pub fn grid(&self) -> [f32; 2] {
        self.grid
    }

    /// Snap a clip-space position. Positions with a zero or non-finite `w`
    /// come back unchanged.
    pub fn snap(&self, clip: Vector4<f32>) -> Vector4<f32> {
        let w = clip.w;
        if w == 0.0 || !w.is_finite() {
            return clip;
        }
        let x = (self.grid[0] * (clip.x / w)).floor() / self.grid[0];
        let y = (self.grid[1] * (clip.y / w)).floor() / self.grid[1];
        Vector4::new(x * w, y * w, clip.z, w)
    }
}

impl VertexProjection for VertexSnap {
    fn project(&self, position: &Vector3<f32>, transforms: &DrawTransforms) -> Vector4<f32> {
        self.snap(transforms.to_clip(position))
    }
}

/// The projection a scene renders with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneTransform {
    Standard(StandardProjection),
    Snapped(VertexSnap),
}

impl SceneTransform {
    pub fn from_settings(settings: &VertexSnapSettings) -> Self {
        if settings.enabled {
            SceneTransform::Snapped(VertexSnap::new(settings))
        } else {
            SceneTransform::Standard(StandardProjection)
        }
    }
}

impl Default for SceneTransform {
    fn default() -> Self {
        SceneTransform::Standard(StandardProjection)
    }
}

impl VertexProjection for SceneTransform {
    fn project(&self, position: &Vector3<f32>, transforms: &DrawTransforms) -> Vector4<f32> {
        match self {
            SceneTransform::Standard(p) => p.project(position, transforms),
            SceneTransform::Snapped(p) => p.project(position, transforms),
        }
    }
}

/// Pixel position and `[0, 1]` depth of a clip-space point in a `width x height`
/// buffer whose rows run top to bottom. `None` behind the camera.
pub fn ndc_to_pixel(clip: &Vector4<f32>, width: usize, height: usize) -> Option<(f32, f32, f32)> {
    if clip.w <= 0.0 || !clip.w.is_finite() {
        return None;
    }
    let ndc = clip.xyz() / clip.w;
    let x = (ndc.x * 0.5 + 0.5) * width as f32;
    let y = (0.5 - ndc.y * 0.5) * height as f32;
    let depth = ndc.z * 0.5 + 0.5;
    Some((x, y, depth))
}
