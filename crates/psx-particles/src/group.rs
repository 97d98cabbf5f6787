// ABOUTME: Particle group description handed to the manager: attributes, material and lifetime.
// ABOUTME: Groups are validated before anything is allocated for them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::ParticleError;
use crate::material::{Material, ParticleSettings};

/// Callback run once when a group leaves the scene
pub type DisposeCallback = Box<dyn FnOnce() + Send + 'static>;

/// Conventional attribute names
pub const POSITION: &str = "position";
pub const SIZE: &str = "size";
pub const TIME_MULTIPLIER: &str = "time_multiplier";

/// Flat per-particle attribute buffer with `item_size` floats per particle
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub data: Vec<f32>,
    pub item_size: usize,
}

impl Attribute {
    pub fn new(data: Vec<f32>, item_size: usize) -> Self {
        Self { data, item_size }
    }

    /// Number of whole items in the buffer
    pub fn items(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.data.len() / self.item_size
        }
    }

    /// Values of particle `index`
    pub fn item(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.item_size)?;
        self.data.get(start..start + self.item_size)
    }
}

pub struct ParticleGroup {
    pub id: String,
    pub count: usize,
    /// Lifetime; `None` or zero keeps the group until it is disposed
    pub duration: Option<Duration>,
    pub attributes: BTreeMap<String, Attribute>,
    /// `None` uses the default green points material
    pub material: Option<Material>,
    pub settings: ParticleSettings,
    pub on_dispose: Option<DisposeCallback>,
}

impl ParticleGroup {
    pub fn new(id: impl Into<String>, count: usize) -> Self {
        Self {
            id: id.into(),
            count,
            duration: None,
            attributes: BTreeMap::new(),
            material: None,
            settings: ParticleSettings::default(),
            on_dispose: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_settings(mut self, settings: ParticleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn on_dispose(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_dispose = Some(Box::new(callback));
        self
    }

    pub fn validate(&self) -> Result<(), ParticleError> {
        if self.id.is_empty() {
            return Err(ParticleError::EmptyId);
        }
        if self.count == 0 {
            return Err(ParticleError::ZeroCount(self.id.clone()));
        }
        for (name, attribute) in &self.attributes {
            let expected = self.count.checked_mul(attribute.item_size).ok_or_else(|| {
                ParticleError::CountOverflow {
                    id: self.id.clone(),
                    count: self.count,
                }
            })?;
            if attribute.item_size == 0 || attribute.data.len() != expected {
                return Err(ParticleError::AttributeLength {
                    id: self.id.clone(),
                    name: name.clone(),
                    expected,
                    actual: attribute.data.len(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ParticleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleGroup")
            .field("id", &self.id)
            .field("count", &self.count)
            .field("duration", &self.duration)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("material", &self.material)
            .field("settings", &self.settings)
            .field("on_dispose", &self.on_dispose.is_some())
            .finish()
    }
}

/// Animation progress of one particle: the group's linear progress sped up
/// by the particle's time multiplier, saturating at 1
pub fn particle_progress(group_progress: f32, time_multiplier: f32) -> f32 {
    let p = group_progress * time_multiplier;
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_groups() {
        assert_eq!(ParticleGroup::new("", 3).validate(), Err(ParticleError::EmptyId));
        assert_eq!(
            ParticleGroup::new("a", 0).validate(),
            Err(ParticleError::ZeroCount("a".into()))
        );

        let short =
            ParticleGroup::new("a", 3).with_attribute(POSITION, Attribute::new(vec![0.0; 8], 3));
        assert_eq!(
            short.validate(),
            Err(ParticleError::AttributeLength {
                id: "a".into(),
                name: POSITION.into(),
                expected: 9,
                actual: 8,
            })
        );

        let zero_items = ParticleGroup::new("a", 3).with_attribute(SIZE, Attribute::new(vec![], 0));
        assert!(zero_items.validate().is_err());
    }

    #[test]
    fn validate_rejects_counts_too_large_for_attributes() {
        let huge = ParticleGroup::new("x", usize::MAX / 2)
            .with_attribute(POSITION, Attribute::new(vec![0.0; 3], 3));
        assert_eq!(
            huge.validate(),
            Err(ParticleError::CountOverflow {
                id: "x".into(),
                count: usize::MAX / 2,
            })
        );
    }

    #[test]
    fn validate_accepts_matching_attributes() {
        let group = ParticleGroup::new("burst", 2)
            .with_attribute(POSITION, Attribute::new(vec![0.0; 6], 3))
            .with_attribute(SIZE, Attribute::new(vec![0.5, 1.0], 1));
        assert_eq!(group.validate(), Ok(()));
        assert_eq!(group.attributes[POSITION].item(1), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(group.attributes[SIZE].item(2), None);
    }

    #[test]
    fn progress_saturates() {
        assert_eq!(particle_progress(0.25, 2.0), 0.5);
        assert_eq!(particle_progress(0.75, 1.5), 1.0);
        assert_eq!(particle_progress(f32::NAN, 1.0), 0.0);
    }
}
