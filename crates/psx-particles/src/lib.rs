// ABOUTME: Particle bursts for the retro renderer: groups, lifetimes and the draw set.
// ABOUTME: A manager owns the registry; a tokio service serialises requests and expiry.

pub mod backend;
pub mod clock;
pub mod error;
pub mod generators;
pub mod group;
pub mod manager;
pub mod material;
pub mod scheduler;
pub mod service;

pub use backend::{
    DrawEntry, DrawSetChange, DrawSetReader, GeometryHandle, MaterialHandle, ParticleBackend,
    PointBatch, ResourceCounters, SceneDrawSet,
};
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use error::ParticleError;
pub use group::{particle_progress, Attribute, DisposeCallback, ParticleGroup};
pub use manager::{GroupState, ParticleManager};
pub use material::{Blending, Material, ParticleSettings};
pub use service::{Command, ParticleEmitter, ParticleService};
