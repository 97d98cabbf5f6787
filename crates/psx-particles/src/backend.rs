// ABOUTME: Renderer-facing side of the particle system: resource handles and the draw set.
// ABOUTME: SceneDrawSet keeps everything in memory and serves snapshots to the renderer.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::group::{Attribute, POSITION};
use crate::material::{Material, ParticleSettings};

/// Uploaded attribute buffers. Consumed when released.
#[derive(Debug, PartialEq, Eq)]
pub struct GeometryHandle(u64);

impl GeometryHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Created material. Consumed when released.
#[derive(Debug, PartialEq, Eq)]
pub struct MaterialHandle(u64);

impl MaterialHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawEntry {
    pub group_id: String,
    pub geometry: u64,
    pub material: u64,
}

/// One atomic edit of the draw set: drop a group, add one, or swap them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawSetChange {
    pub remove: Option<String>,
    pub insert: Option<DrawEntry>,
}

pub trait ParticleBackend {
    fn upload_geometry(
        &mut self,
        count: usize,
        attributes: BTreeMap<String, Attribute>,
    ) -> GeometryHandle;

    fn create_material(
        &mut self,
        material: &Material,
        settings: &ParticleSettings,
    ) -> MaterialHandle;

    fn release_geometry(&mut self, handle: GeometryHandle);

    fn release_material(&mut self, handle: MaterialHandle);

    /// Apply `change` so that no reader sees it half done
    fn update_draw_set(&mut self, change: DrawSetChange);
}

/// Everything the renderer needs to draw one group
#[derive(Debug, Clone, PartialEq)]
pub struct PointBatch {
    pub group_id: String,
    pub count: usize,
    pub attributes: Arc<BTreeMap<String, Attribute>>,
    pub material: Material,
    pub settings: ParticleSettings,
}

impl PointBatch {
    pub fn positions(&self) -> Option<&Attribute> {
        self.attributes.get(POSITION)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// Allocation totals since the draw set was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounters {
    pub geometries_allocated: u64,
    pub geometries_released: u64,
    pub materials_allocated: u64,
    pub materials_released: u64,
}

impl ResourceCounters {
    pub fn live_geometries(&self) -> u64 {
        self.geometries_allocated - self.geometries_released
    }

    pub fn live_materials(&self) -> u64 {
        self.materials_allocated - self.materials_released
    }
}

struct Geometry {
    count: usize,
    attributes: Arc<BTreeMap<String, Attribute>>,
}

#[derive(Default)]
struct Store {
    geometries: HashMap<u64, Geometry>,
    materials: HashMap<u64, (Material, ParticleSettings)>,
    /// Groups in the order they were added
    draw: Vec<DrawEntry>,
    counters: ResourceCounters,
}

impl Store {
    fn batch(&self, entry: &DrawEntry) -> Option<PointBatch> {
        let geometry = self.geometries.get(&entry.geometry)?;
        let (material, settings) = self.materials.get(&entry.material)?;
        Some(PointBatch {
            group_id: entry.group_id.clone(),
            count: geometry.count,
            attributes: geometry.attributes.clone(),
            material: material.clone(),
            settings: settings.clone(),
        })
    }
}

/// In-memory draw set shared with any number of [`DrawSetReader`]s
pub struct SceneDrawSet {
    store: Arc<RwLock<Store>>,
    next_id: u64,
}

impl Default for SceneDrawSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneDrawSet {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            next_id: 1,
        }
    }

    pub fn reader(&self) -> DrawSetReader {
        DrawSetReader {
            store: self.store.clone(),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl ParticleBackend for SceneDrawSet {
    fn upload_geometry(
        &mut self,
        count: usize,
        attributes: BTreeMap<String, Attribute>,
    ) -> GeometryHandle {
        let id = self.allocate_id();
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.geometries.insert(
            id,
            Geometry {
                count,
                attributes: Arc::new(attributes),
            },
        );
        store.counters.geometries_allocated += 1;
        GeometryHandle(id)
    }

    fn create_material(
        &mut self,
        material: &Material,
        settings: &ParticleSettings,
    ) -> MaterialHandle {
        let id = self.allocate_id();
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.materials.insert(id, (material.clone(), settings.clone()));
        store.counters.materials_allocated += 1;
        MaterialHandle(id)
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        if store.geometries.remove(&handle.0).is_some() {
            store.counters.geometries_released += 1;
        } else {
            tracing::warn!("Released unknown geometry {}", handle.0);
        }
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        if store.materials.remove(&handle.0).is_some() {
            store.counters.materials_released += 1;
        } else {
            tracing::warn!("Released unknown material {}", handle.0);
        }
    }

    fn update_draw_set(&mut self, change: DrawSetChange) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = &change.remove {
            store.draw.retain(|entry| &entry.group_id != id);
        }
        if let Some(entry) = change.insert {
            store.draw.push(entry);
        }
    }
}

/// Read-only view of a [`SceneDrawSet`] for the render loop
#[derive(Clone)]
pub struct DrawSetReader {
    store: Arc<RwLock<Store>>,
}

impl DrawSetReader {
    /// Every drawable group, in insertion order
    pub fn snapshot(&self) -> Vec<PointBatch> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store.draw.iter().filter_map(|entry| store.batch(entry)).collect()
    }

    pub fn get(&self, group_id: &str) -> Option<PointBatch> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store
            .draw
            .iter()
            .find(|entry| entry.group_id == group_id)
            .and_then(|entry| store.batch(entry))
    }

    pub fn contains(&self, group_id: &str) -> bool {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store.draw.iter().any(|entry| entry.group_id == group_id)
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap_or_else(PoisonError::into_inner).draw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counters(&self) -> ResourceCounters {
        self.store.read().unwrap_or_else(PoisonError::into_inner).counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, geometry: &GeometryHandle, material: &MaterialHandle) -> DrawEntry {
        DrawEntry {
            group_id: id.into(),
            geometry: geometry.id(),
            material: material.id(),
        }
    }

    #[test]
    fn swap_replaces_in_one_change() {
        let mut set = SceneDrawSet::new();
        let reader = set.reader();

        let g1 = set.upload_geometry(1, BTreeMap::new());
        let m1 = set.create_material(&Material::default(), &ParticleSettings::default());
        set.update_draw_set(DrawSetChange {
            remove: None,
            insert: Some(entry("a", &g1, &m1)),
        });
        assert_eq!(reader.get("a").map(|b| b.count), Some(1));

        let g2 = set.upload_geometry(5, BTreeMap::new());
        let sparkle = Material::sparkle(0.2, psx_core::Color::WHITE);
        let m2 = set.create_material(&sparkle, &ParticleSettings::default());
        set.update_draw_set(DrawSetChange {
            remove: Some("a".into()),
            insert: Some(entry("a", &g2, &m2)),
        });
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.get("a").map(|b| b.count), Some(5));

        set.release_geometry(g1);
        set.release_material(m1);
        let counters = reader.counters();
        assert_eq!(counters.live_geometries(), 1);
        assert_eq!(counters.live_materials(), 1);
    }

    #[test]
    fn snapshot_keeps_insertion_order() {
        let mut set = SceneDrawSet::new();
        for id in ["b", "a", "c"] {
            let g = set.upload_geometry(1, BTreeMap::new());
            let m = set.create_material(&Material::default(), &ParticleSettings::default());
            set.update_draw_set(DrawSetChange {
                remove: None,
                insert: Some(entry(id, &g, &m)),
            });
        }
        let ids: Vec<_> = set.reader().snapshot().into_iter().map(|b| b.group_id).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }
}
