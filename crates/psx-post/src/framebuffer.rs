// ABOUTME: Borrowed color and depth views handed to the effect pipeline each frame.
// ABOUTME: The renderer owns the buffers; effects only ever see them for one frame.

use psx_core::Color;

use crate::pipeline::PostError;

/// Color buffer plus optional depth buffer for one frame.
///
/// Rows are stored top to bottom. Effects receive fragments in the usual
/// bottom-left origin convention, see [`Fragment`].
pub struct FrameTarget<'a> {
    width: usize,
    height: usize,
    color: &'a mut [Color],
    depth: Option<&'a [f32]>,
}

impl<'a> FrameTarget<'a> {
    pub fn new(width: usize, height: usize, color: &'a mut [Color]) -> Result<Self, PostError> {
        if color.len() != width * height {
            return Err(PostError::BufferSize {
                expected: width * height,
                actual: color.len(),
            });
        }
        Ok(Self {
            width,
            height,
            color,
            depth: None,
        })
    }

    /// Attach a linear depth buffer in `[0, 1]`.
    ///
    /// A buffer of the wrong size is not attached; depth-dependent stages
    /// then pass their input through.
    pub fn with_depth(mut self, depth: &'a [f32]) -> Self {
        if depth.len() == self.width * self.height {
            self.depth = Some(depth);
        } else {
            tracing::warn!(
                "Depth buffer has {} entries, expected {}; ignoring it",
                depth.len(),
                self.width * self.height
            );
        }
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    pub fn color(&self) -> &[Color] {
        self.color
    }

    pub(crate) fn parts(&mut self) -> (&mut [Color], Option<&[f32]>) {
        (&mut *self.color, self.depth)
    }
}

/// Per-pixel inputs shared by every effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    /// Normalized screen position, origin bottom-left
    pub uv: [f32; 2],
    /// Pixel coordinate, origin bottom-left
    pub coord: [u32; 2],
    /// Linear depth, `None` when no depth buffer is attached
    pub depth: Option<f32>,
}

impl Fragment {
    /// Fragment for the pixel stored at `(x, row)` in a top-to-bottom buffer
    pub fn for_pixel(
        x: usize,
        row: usize,
        width: usize,
        height: usize,
        depth: Option<f32>,
    ) -> Self {
        let y = height - 1 - row;
        Self {
            uv: [
                (x as f32 + 0.5) / width as f32,
                (y as f32 + 0.5) / height as f32,
            ],
            coord: [x as u32, y as u32],
            depth,
        }
    }

    /// Fragment center in pixels, as a fragment shader would see it
    pub fn frag_coord(&self) -> [f32; 2] {
        [self.coord[0] as f32 + 0.5, self.coord[1] as f32 + 0.5]
    }
}

/// Owned color and depth storage, the shape a software renderer hands over
pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    pub color: Vec<Color>,
    pub depth: Vec<f32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            color: vec![Color::BLACK; width * height],
            depth: vec![1.0; width * height],
        }
    }

    pub fn clear(&mut self, color: Color) {
        self.color.fill(color);
        self.depth.fill(1.0);
    }

    /// Write a pixel if it is in bounds and closer than what is stored
    pub fn set_pixel_with_depth(&mut self, x: i64, y: i64, z: f32, color: Color) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        let idx = y as usize * self.width + x as usize;
        if z < self.depth[idx] {
            self.depth[idx] = z;
            self.color[idx] = color;
            return true;
        }
        false
    }

    /// Borrow both buffers for one pass of the pipeline
    pub fn target(&mut self) -> FrameTarget<'_> {
        FrameTarget {
            width: self.width,
            height: self.height,
            color: &mut self.color,
            depth: Some(&self.depth),
        }
    }

    /// Pack into RGBA8 rows, top to bottom
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.color.iter().flat_map(|c| c.to_rgba8()).collect()
    }
}
