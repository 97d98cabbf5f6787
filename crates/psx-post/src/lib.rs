// ABOUTME: Retro post-processing: ordered dithering, CRT, depth cueing and vertex snapping.
// ABOUTME: Software rendition of the effect chain, run over borrowed color and depth buffers.

mod blend;
pub mod dither;
pub mod effects;
pub mod framebuffer;
pub mod pipeline;
pub mod snap;

pub use blend::blend;
pub use effects::Effect;
pub use framebuffer::{Fragment, FrameTarget, Framebuffer};
pub use pipeline::{EffectComposer, EffectId, FrameState, PostError};
pub use snap::{
    ndc_to_pixel, DrawTransforms, SceneTransform, StandardProjection, VertexProjection, VertexSnap,
};
