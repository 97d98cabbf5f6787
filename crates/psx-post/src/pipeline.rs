// ABOUTME: Ordered effect chain applied to a borrowed frame, one full pass per stage.
// ABOUTME: Owns the frame clock and the per-stage enable, blend and opacity state.

use psx_core::{BlendFunction, EffectConfig};

use crate::blend::blend;
use crate::effects::{self, Effect};
use crate::framebuffer::{Fragment, FrameTarget};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PostError {
    #[error("Unknown effect: {0:?}")]
    UnknownEffect(EffectId),

    #[error("Cannot apply {given} settings to a {expected} effect")]
    KindMismatch {
        expected: &'static str,
        given: &'static str,
    },

    #[error("Buffer holds {actual} pixels, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Clock shared by every stage for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameState {
    /// Seconds since the composer was created; never goes backwards
    pub time: f32,
    /// Seconds since the previous frame
    pub delta: f32,
    /// Frames rendered so far, including this one
    pub frame: u64,
}

impl FrameState {
    /// Step to the next frame. Negative or non-finite deltas count as zero.
    pub fn advance(&mut self, dt: f32) {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.delta = dt;
        self.time += dt;
        self.frame += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(pub u64);

struct Slot {
    id: EffectId,
    enabled: bool,
    opacity: f32,
    effect: Box<dyn Effect>,
    /// Set while the stage is being skipped, so the warning is logged once
    skipped: bool,
}

pub struct EffectComposer {
    slots: Vec<Slot>,
    frame: FrameState,
    next_id: u64,
}

impl Default for EffectComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectComposer {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            frame: FrameState::default(),
            next_id: 0,
        }
    }

    /// Build a chain with one stage per entry, in order
    pub fn from_config(configs: &[EffectConfig]) -> Self {
        let mut composer = Self::new();
        for config in configs {
            composer.add(effects::build(config));
        }
        tracing::debug!(
            "Effect chain: {}",
            configs.iter().map(|c| c.kind()).collect::<Vec<_>>().join(" -> ")
        );
        composer
    }

    /// Append a stage to the end of the chain
    pub fn add(&mut self, effect: Box<dyn Effect>) -> EffectId {
        self.insert(self.slots.len(), effect)
    }

    /// Insert a stage at `index`, clamped to the chain length
    pub fn insert(&mut self, index: usize, effect: Box<dyn Effect>) -> EffectId {
        let id = EffectId(self.next_id);
        self.next_id += 1;
        let index = index.min(self.slots.len());
        self.slots.insert(
            index,
            Slot {
                id,
                enabled: true,
                opacity: 1.0,
                effect,
                skipped: false,
            },
        );
        id
    }

    pub fn remove(&mut self, id: EffectId) -> Result<Box<dyn Effect>, PostError> {
        let index = self.index_of(id)?;
        Ok(self.slots.remove(index).effect)
    }

    /// Move a stage to `index` in the chain, clamped to the last position
    pub fn move_to(&mut self, id: EffectId, index: usize) -> Result<(), PostError> {
        let from = self.index_of(id)?;
        let slot = self.slots.remove(from);
        let index = index.min(self.slots.len());
        self.slots.insert(index, slot);
        Ok(())
    }

    pub fn set_enabled(&mut self, id: EffectId, enabled: bool) -> Result<(), PostError> {
        self.slot_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Strength of the blended stage output, clamped to `[0, 1]`
    pub fn set_opacity(&mut self, id: EffectId, opacity: f32) -> Result<(), PostError> {
        let opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
        self.slot_mut(id)?.opacity = opacity;
        Ok(())
    }

    /// Replace a stage's settings; they take effect on the next render
    pub fn set_settings(&mut self, id: EffectId, config: EffectConfig) -> Result<(), PostError> {
        let slot = self.slot_mut(id)?;
        let expected = slot.effect.name();
        slot.effect
            .set_config(config)
            .map_err(|rejected| PostError::KindMismatch {
                expected,
                given: rejected.kind(),
            })
    }

    /// Stage ids in chain order
    pub fn ids(&self) -> Vec<EffectId> {
        self.slots.iter().map(|s| s.id).collect()
    }

    /// Current chain as configuration, including settings not yet applied
    pub fn configs(&self) -> Vec<EffectConfig> {
        self.slots.iter().map(|s| s.effect.config()).collect()
    }

    pub fn effect(&self, id: EffectId) -> Option<&dyn Effect> {
        self.slots
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.effect.as_ref())
    }

    pub fn is_enabled(&self, id: EffectId) -> Option<bool> {
        self.slots.iter().find(|s| s.id == id).map(|s| s.enabled)
    }

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Advance the clock by `dt` seconds and run every enabled stage over `target`
    pub fn render(&mut self, target: &mut FrameTarget<'_>, dt: f32) {
        self.frame.advance(dt);

        let width = target.width();
        let height = target.height();
        let (color, depth) = target.parts();

        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            slot.effect.update(&self.frame);

            if slot.effect.requires_depth() && depth.is_none() {
                if !slot.skipped {
                    tracing::warn!(
                        "Skipping {} effect: no depth buffer attached",
                        slot.effect.name()
                    );
                    slot.skipped = true;
                }
                continue;
            }
            slot.skipped = false;

            let function = slot.effect.blend();
            if function == BlendFunction::Skip {
                continue;
            }

            for row in 0..height {
                for x in 0..width {
                    let i = row * width + x;
                    let fragment = Fragment::for_pixel(x, row, width, height, depth.map(|d| d[i]));
                    let input = color[i];
                    let shaded = slot.effect.shade(input, &fragment);
                    if !shaded.is_finite() {
                        continue;
                    }
                    let output = blend(function, input, shaded, slot.opacity);
                    if output.is_finite() {
                        color[i] = output;
                    }
                }
            }
        }
    }

    fn index_of(&self, id: EffectId) -> Result<usize, PostError> {
        self.slots
            .iter()
            .position(|s| s.id == id)
            .ok_or(PostError::UnknownEffect(id))
    }

    fn slot_mut(&mut self, id: EffectId) -> Result<&mut Slot, PostError> {
        self.slots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(PostError::UnknownEffect(id))
    }
}
