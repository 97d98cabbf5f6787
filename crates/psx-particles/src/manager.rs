// ABOUTME: Registry of live particle groups keyed by id, with timed expiry.
// ABOUTME: Owns every GPU-side handle and releases each exactly once.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::backend::{DrawEntry, DrawSetChange, GeometryHandle, MaterialHandle, ParticleBackend};
use crate::clock::Clock;
use crate::error::ParticleError;
use crate::group::{DisposeCallback, ParticleGroup};
use crate::material::Material;
use crate::scheduler::{Scheduler, TimerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Absent,
    Live,
    /// Lifetime is over but the group has not been collected yet
    Expiring,
}

struct Entry {
    generation: u64,
    geometry: GeometryHandle,
    material: MaterialHandle,
    created: Instant,
    duration: Option<Duration>,
    deadline: Option<Instant>,
    timer: Option<TimerId>,
    on_dispose: Option<DisposeCallback>,
}

pub struct ParticleManager<B: ParticleBackend, C: Clock> {
    backend: B,
    clock: C,
    entries: HashMap<String, Entry>,
    scheduler: Scheduler<String>,
    next_generation: u64,
    default_material: Material,
}

impl<B: ParticleBackend, C: Clock> ParticleManager<B, C> {
    pub fn new(backend: B, clock: C) -> Self {
        Self {
            backend,
            clock,
            entries: HashMap::new(),
            scheduler: Scheduler::new(),
            next_generation: 0,
            default_material: Material::default(),
        }
    }

    /// Material used by groups that do not bring their own
    pub fn with_default_material(mut self, material: Material) -> Self {
        self.default_material = material;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Add a group, replacing any live group with the same id.
    ///
    /// The replaced group is swapped out of the draw set in the same change
    /// that brings the new one in, then its resources are released and its
    /// dispose callback runs.
    pub fn add_group(&mut self, group: ParticleGroup) -> Result<(), ParticleError> {
        group.validate()?;
        let ParticleGroup {
            id,
            count,
            duration,
            attributes,
            material,
            settings,
            on_dispose,
        } = group;

        let now = self.clock.now();
        let (duration, deadline) = match duration.filter(|d| !d.is_zero()) {
            Some(d) => match now.checked_add(d) {
                Some(deadline) => (Some(d), Some(deadline)),
                None => {
                    tracing::warn!(
                        "Lifetime of particle group {} is out of range, it will not expire",
                        id
                    );
                    (None, None)
                }
            },
            None => (None, None),
        };

        let previous = self.take_entry(&id);

        let geometry = self.backend.upload_geometry(count, attributes);
        let material = self
            .backend
            .create_material(material.as_ref().unwrap_or(&self.default_material), &settings);

        self.backend.update_draw_set(DrawSetChange {
            remove: previous.as_ref().map(|_| id.clone()),
            insert: Some(DrawEntry {
                group_id: id.clone(),
                geometry: geometry.id(),
                material: material.id(),
            }),
        });

        if let Some(previous) = previous {
            tracing::debug!("Replacing particle group {}", id);
            self.release(previous, None);
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let timer = deadline.map(|at| self.scheduler.schedule(at, id.clone(), generation));

        tracing::debug!("Added particle group {} ({} particles, {:?})", id, count, duration);
        self.entries.insert(
            id,
            Entry {
                generation,
                geometry,
                material,
                created: now,
                duration,
                deadline,
                timer,
                on_dispose,
            },
        );
        Ok(())
    }

    /// Remove a group now. Runs the group's own callback, then `on_dispose`.
    /// Returns false, without running anything, when no such group is live.
    pub fn dispose_group(&mut self, id: &str, on_dispose: Option<DisposeCallback>) -> bool {
        match self.take_entry(id) {
            Some(entry) => {
                self.backend.update_draw_set(DrawSetChange {
                    remove: Some(id.to_string()),
                    insert: None,
                });
                self.release(entry, on_dispose);
                tracing::debug!("Disposed particle group {}", id);
                true
            }
            None => false,
        }
    }

    /// Dispose every group whose lifetime has run out. Returns how many went.
    pub fn expire_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut expired = 0;
        while let Some((id, generation)) = self.scheduler.pop_due(now) {
            let current = self.entries.get_mut(&id).filter(|e| e.generation == generation);
            match current {
                Some(entry) => {
                    entry.timer = None;
                    tracing::debug!("Particle group {} expired", id);
                    self.dispose_group(&id, None);
                    expired += 1;
                }
                None => tracing::debug!("Ignoring stale timer for {}", id),
            }
        }
        expired
    }

    /// Dispose every live group, in id order
    pub fn dispose_all(&mut self) -> usize {
        let ids = self.live_ids();
        for id in &ids {
            self.dispose_group(id, None);
        }
        ids.len()
    }

    pub fn state(&self, id: &str) -> GroupState {
        match self.entries.get(id) {
            None => GroupState::Absent,
            Some(entry) => match entry.deadline {
                Some(deadline) if self.clock.now() >= deadline => GroupState::Expiring,
                _ => GroupState::Live,
            },
        }
    }

    /// True while the group is registered, including when it is expiring
    pub fn is_live(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Registered group ids, sorted
    pub fn live_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending expiry
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Linear lifetime progress in `[0, 1]`. `None` for unknown groups and
    /// groups that live until disposed.
    pub fn progress(&self, id: &str) -> Option<f32> {
        let entry = self.entries.get(id)?;
        let duration = entry.duration?;
        let elapsed = self.clock.now().saturating_duration_since(entry.created);
        Some((elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0))
    }

    /// Unregister a group and cancel its timer, leaving its resources to the caller
    fn take_entry(&mut self, id: &str) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        if let Some(timer) = entry.timer {
            self.scheduler.cancel(timer);
        }
        Some(entry)
    }

    fn release(&mut self, entry: Entry, extra: Option<DisposeCallback>) {
        self.backend.release_geometry(entry.geometry);
        self.backend.release_material(entry.material);
        if let Some(callback) = entry.on_dispose {
            callback();
        }
        if let Some(callback) = extra {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DrawSetReader, SceneDrawSet};
    use crate::clock::ManualClock;
    use crate::group::{Attribute, POSITION};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn manager() -> (ParticleManager<SceneDrawSet, ManualClock>, DrawSetReader, ManualClock) {
        let backend = SceneDrawSet::new();
        let reader = backend.reader();
        let clock = ManualClock::new();
        (ParticleManager::new(backend, clock.clone()), reader, clock)
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn group(id: &str, count: usize) -> ParticleGroup {
        ParticleGroup::new(id, count)
            .with_attribute(POSITION, Attribute::new(vec![0.0; count * 3], 3))
    }

    #[test]
    fn same_id_replaces_and_notifies_once() {
        let (mut m, reader, _) = manager();
        let (first_fired, first_cb) = counter();
        let (second_fired, second_cb) = counter();

        m.add_group(group("x", 4).on_dispose(first_cb)).unwrap();
        m.add_group(group("x", 8).on_dispose(second_cb)).unwrap();

        assert_eq!(first_fired.load(Ordering::SeqCst), 1);
        assert_eq!(second_fired.load(Ordering::SeqCst), 0);
        assert_eq!(m.len(), 1);
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.get("x").map(|b| b.count), Some(8));

        let counters = reader.counters();
        assert_eq!(counters.live_geometries(), 1);
        assert_eq!(counters.live_materials(), 1);
    }

    #[test]
    fn replaced_group_timer_does_not_fire() {
        let (mut m, reader, clock) = manager();
        let (old_fired, old_cb) = counter();
        m.add_group(
            group("x", 1)
                .with_duration(Duration::from_millis(100))
                .on_dispose(old_cb),
        )
        .unwrap();
        m.add_group(group("x", 1)).unwrap();
        assert_eq!(old_fired.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_millis(500));
        assert_eq!(m.expire_due(), 0);
        assert!(reader.contains("x"));
        assert_eq!(m.state("x"), GroupState::Live);
        assert_eq!(old_fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn group_expires_after_duration() {
        let (mut m, reader, clock) = manager();
        let (fired, cb) = counter();
        m.add_group(
            group("demo", 100)
                .with_duration(Duration::from_millis(2000))
                .on_dispose(cb),
        )
        .unwrap();

        clock.advance(Duration::from_millis(1999));
        assert_eq!(m.expire_due(), 0);
        assert_eq!(m.state("demo"), GroupState::Live);
        assert!(m.progress("demo").unwrap() < 1.0);

        clock.advance(Duration::from_millis(1));
        assert_eq!(m.state("demo"), GroupState::Expiring);
        assert_eq!(m.progress("demo"), Some(1.0));
        assert_eq!(m.expire_due(), 1);

        assert_eq!(m.state("demo"), GroupState::Absent);
        assert!(!reader.contains("demo"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(10));
        assert_eq!(m.expire_due(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn manual_dispose_cancels_timer() {
        let (mut m, reader, clock) = manager();
        let (own, own_cb) = counter();
        let (extra, extra_cb) = counter();
        m.add_group(
            group("demo", 3)
                .with_duration(Duration::from_millis(2000))
                .on_dispose(own_cb),
        )
        .unwrap();

        clock.advance(Duration::from_millis(500));
        assert!(m.dispose_group("demo", Some(Box::new(extra_cb))));
        assert_eq!(m.next_deadline(), None);

        clock.advance(Duration::from_millis(2000));
        assert_eq!(m.expire_due(), 0);
        assert_eq!(own.load(Ordering::SeqCst), 1);
        assert_eq!(extra.load(Ordering::SeqCst), 1);
        assert!(reader.is_empty());

        let counters = reader.counters();
        assert_eq!(counters.geometries_released, 1);
        assert_eq!(counters.materials_released, 1);
    }

    #[test]
    fn disposing_unknown_id_is_a_no_op() {
        let (mut m, _, _) = manager();
        let (fired, cb) = counter();
        assert!(!m.dispose_group("ghost", Some(Box::new(cb))));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_group_allocates_nothing() {
        let (mut m, reader, _) = manager();
        let bad = ParticleGroup::new("bad", 2)
            .with_attribute(POSITION, Attribute::new(vec![0.0; 5], 3));
        assert!(m.add_group(bad).is_err());
        assert_eq!(reader.counters(), Default::default());
        assert_eq!(m.state("bad"), GroupState::Absent);
    }

    #[test]
    fn zero_duration_lives_until_disposed() {
        let (mut m, _, clock) = manager();
        m.add_group(group("still", 1).with_duration(Duration::ZERO)).unwrap();
        clock.advance(Duration::from_secs(60));
        assert_eq!(m.expire_due(), 0);
        assert_eq!(m.state("still"), GroupState::Live);
        assert_eq!(m.progress("still"), None);
    }

    #[test]
    fn out_of_range_lifetime_never_expires() {
        let (mut m, reader, clock) = manager();
        let (fired, cb) = counter();
        m.add_group(group("forever", 2).with_duration(Duration::MAX).on_dispose(cb))
            .unwrap();

        assert_eq!(m.len(), 1);
        assert!(reader.contains("forever"));
        assert_eq!(m.next_deadline(), None);
        assert_eq!(m.progress("forever"), None);

        clock.advance(Duration::from_secs(3600));
        assert_eq!(m.expire_due(), 0);
        assert_eq!(m.state("forever"), GroupState::Live);

        assert!(m.dispose_group("forever", None));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(reader.counters().live_geometries(), 0);
        assert_eq!(reader.counters().live_materials(), 0);
    }

    #[test]
    fn default_material_is_green_points() {
        let (mut m, reader, _) = manager();
        m.add_group(group("g", 1)).unwrap();
        assert_eq!(reader.get("g").map(|b| b.material), Some(Material::default()));
    }

    #[test]
    fn dispose_all_clears_everything() {
        let (mut m, reader, _) = manager();
        for id in ["b", "a", "c"] {
            m.add_group(group(id, 2).with_duration(Duration::from_secs(1))).unwrap();
        }
        assert_eq!(m.live_ids(), ["a", "b", "c"]);
        assert_eq!(m.dispose_all(), 3);
        assert!(m.is_empty());
        assert!(reader.is_empty());
        assert_eq!(m.next_deadline(), None);
        assert_eq!(reader.counters().live_geometries(), 0);
    }
}
