// ABOUTME: Procedural demo scene: a spinning cube over a checkered floor.
// ABOUTME: Rasterized in software through the scene's vertex transform into a framebuffer.

use nalgebra::{Matrix4, Point3, Rotation3, Vector3};

use psx_core::Color;
use psx_post::{ndc_to_pixel, DrawTransforms, Framebuffer, SceneTransform, VertexProjection};

pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 20.0;

const FLOOR_TILES: i32 = 8;
const FLOOR_EXTENT: f32 = 4.0;

pub struct Camera {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        let eye = Point3::new(0.0, 1.5, 4.0);
        let target = Point3::new(0.0, 0.0, 0.0);
        Self {
            view: Matrix4::look_at_rh(&eye, &target, &Vector3::y()),
            projection: Matrix4::new_perspective(
                aspect,
                60f32.to_radians(),
                CAMERA_NEAR,
                CAMERA_FAR,
            ),
        }
    }

    pub fn transforms(&self, model: Matrix4<f32>) -> DrawTransforms {
        DrawTransforms::new(self.view * model, self.projection)
    }
}

struct Triangle {
    vertices: [Vector3<f32>; 3],
    color: Color,
}

/// Projected vertex: pixel position plus linear depth in `[0, 1]`
#[derive(Debug, Clone, Copy)]
pub struct ScreenVertex {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
}

pub struct Scene {
    transform: SceneTransform,
    camera: Camera,
    cube: Vec<Triangle>,
    floor: Vec<Triangle>,
}

impl Scene {
    pub fn new(transform: SceneTransform, aspect: f32) -> Self {
        Self {
            transform,
            camera: Camera::new(aspect),
            cube: cube(),
            floor: floor(),
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Project a vertex. `None` when it is behind the camera.
    pub fn project(
        &self,
        position: &Vector3<f32>,
        transforms: &DrawTransforms,
        fb: &Framebuffer,
    ) -> Option<ScreenVertex> {
        let clip = self.transform.project(position, transforms);
        let (x, y, _) = ndc_to_pixel(&clip, fb.width, fb.height)?;
        let depth = ((clip.w - CAMERA_NEAR) / (CAMERA_FAR - CAMERA_NEAR)).clamp(0.0, 1.0);
        Some(ScreenVertex { x, y, depth })
    }

    /// Draw the scene at `time` seconds into `fb`
    pub fn draw(&self, fb: &mut Framebuffer, time: f32) {
        fb.clear(Color::rgb(0.05, 0.04, 0.1));

        let floor = self.camera.transforms(Matrix4::identity());
        self.draw_mesh(fb, &self.floor, &floor);

        let spin = Rotation3::from_euler_angles(time * 0.4, time * 0.9, 0.0).to_homogeneous();
        let cube = self.camera.transforms(spin);
        self.draw_mesh(fb, &self.cube, &cube);
    }

    fn draw_mesh(&self, fb: &mut Framebuffer, mesh: &[Triangle], transforms: &DrawTransforms) {
        for triangle in mesh {
            let projected: Option<Vec<ScreenVertex>> = triangle
                .vertices
                .iter()
                .map(|v| self.project(v, transforms, fb))
                .collect();
            if let Some(v) = projected {
                fill_triangle(fb, [v[0], v[1], v[2]], triangle.color);
            }
        }
    }
}

fn edge(a: ScreenVertex, b: ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

fn fill_triangle(fb: &mut Framebuffer, [a, b, c]: [ScreenVertex; 3], color: Color) {
    let area = edge(a, b, c.x, c.y);
    if area.abs() < 1e-6 {
        return;
    }

    let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as i64;
    let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as i64;
    let max_x = a.x.max(b.x).max(c.x).ceil().min(fb.width as f32 - 1.0) as i64;
    let max_y = a.y.max(b.y).max(c.y).ceil().min(fb.height as f32 - 1.0) as i64;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, px, py) / area;
            let w1 = edge(c, a, px, py) / area;
            let w2 = edge(a, b, px, py) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let depth = w0 * a.depth + w1 * b.depth + w2 * c.depth;
            fb.set_pixel_with_depth(x, y, depth, color);
        }
    }
}

fn quad(corners: [Vector3<f32>; 4], color: Color, out: &mut Vec<Triangle>) {
    out.push(Triangle {
        vertices: [corners[0], corners[1], corners[2]],
        color,
    });
    out.push(Triangle {
        vertices: [corners[0], corners[2], corners[3]],
        color,
    });
}

fn cube() -> Vec<Triangle> {
    let v = |x: f32, y: f32, z: f32| Vector3::new(x, y, z) * 0.6;
    let faces = [
        (
            [v(-1., -1., 1.), v(1., -1., 1.), v(1., 1., 1.), v(-1., 1., 1.)],
            Color::rgb(0.9, 0.2, 0.2),
        ),
        (
            [v(1., -1., -1.), v(-1., -1., -1.), v(-1., 1., -1.), v(1., 1., -1.)],
            Color::rgb(0.2, 0.8, 0.3),
        ),
        (
            [v(-1., 1., 1.), v(1., 1., 1.), v(1., 1., -1.), v(-1., 1., -1.)],
            Color::rgb(0.95, 0.85, 0.3),
        ),
        (
            [v(-1., -1., -1.), v(1., -1., -1.), v(1., -1., 1.), v(-1., -1., 1.)],
            Color::rgb(0.3, 0.3, 0.9),
        ),
        (
            [v(1., -1., 1.), v(1., -1., -1.), v(1., 1., -1.), v(1., 1., 1.)],
            Color::rgb(0.8, 0.4, 0.9),
        ),
        (
            [v(-1., -1., -1.), v(-1., -1., 1.), v(-1., 1., 1.), v(-1., 1., -1.)],
            Color::rgb(0.3, 0.9, 0.9),
        ),
    ];
    let mut triangles = Vec::with_capacity(12);
    for (corners, color) in faces {
        quad(corners, color, &mut triangles);
    }
    triangles
}

fn floor() -> Vec<Triangle> {
    let tile = 2.0 * FLOOR_EXTENT / FLOOR_TILES as f32;
    let y = -1.2;
    let mut triangles = Vec::with_capacity((FLOOR_TILES * FLOOR_TILES * 2) as usize);
    for i in 0..FLOOR_TILES {
        for j in 0..FLOOR_TILES {
            let x0 = -FLOOR_EXTENT + i as f32 * tile;
            let z0 = -FLOOR_EXTENT + j as f32 * tile;
            let color = if (i + j) % 2 == 0 {
                Color::gray(0.55)
            } else {
                Color::gray(0.2)
            };
            quad(
                [
                    Vector3::new(x0, y, z0),
                    Vector3::new(x0 + tile, y, z0),
                    Vector3::new(x0 + tile, y, z0 + tile),
                    Vector3::new(x0, y, z0 + tile),
                ],
                color,
                &mut triangles,
            );
        }
    }
    triangles
}
