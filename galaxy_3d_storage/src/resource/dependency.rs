/// Instance dependency tracking.
///
/// Renderable instances are owned by the scene layer, not by the storage
/// layer. They register here once (held weakly) and receive an
/// `InstanceKey`. Resources that instances can be built from (meshes,
/// lights) carry an `Instantiable` back-reference set of those keys, and
/// every change or removal of the resource fans out through the registry.
///
/// Invariants:
/// - a back-reference never keeps an instance alive
/// - each instance appears at most once per back-reference set, so one
///   logical event produces at most one callback per instance
/// - a resource being freed drains its set before its storage is released

use std::sync::{Arc, Weak};
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use crate::resource::handle::{InstanceKey, MaterialHandle, Rid};

// ===== INSTANCE CAPABILITY =====

/// Callbacks an external instance receives from the storage layer
///
/// Callbacks run on the render/update thread while the `ResourceManager` is
/// borrowed, so they cannot call back into it. Instances that want to
/// rebuild or detach should record the event and act on it afterwards.
pub trait InstanceBase: Send + Sync {
    /// The shape or content of `base` changed (surface added, light range changed, ...)
    fn base_changed(&self, base: Rid);

    /// A material used by `base` (or `base` itself, for directly owned
    /// materials) was rebuilt
    fn base_material_changed(&self, base: Rid);

    /// `base` is being freed. The dependency is already gone when this runs.
    fn base_removed(&self, base: Rid);

    /// A material this instance owned directly was freed
    fn material_removed(&self, material: MaterialHandle) {
        self.base_material_changed(material.rid());
    }
}

// ===== NOTIFICATION =====

/// Event delivered to instances by `InstanceRegistry::dispatch`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    BaseChanged(Rid),
    BaseMaterialChanged(Rid),
    BaseRemoved(Rid),
    MaterialRemoved(MaterialHandle),
}

// ===== INSTANTIABLE =====

/// Back-reference set of the instances depending on a resource
#[derive(Debug, Default)]
pub struct Instantiable {
    instances: FxHashSet<InstanceKey>,
}

impl Instantiable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a back-reference. Returns `false` if it was already present.
    pub fn add_instance(&mut self, instance: InstanceKey) -> bool {
        self.instances.insert(instance)
    }

    /// Remove a back-reference. Returns `false` if it was not present.
    pub fn remove_instance(&mut self, instance: InstanceKey) -> bool {
        self.instances.remove(&instance)
    }

    pub fn contains(&self, instance: InstanceKey) -> bool {
        self.instances.contains(&instance)
    }

    /// Number of dependent instances
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Copy of the current back-references, safe to iterate while the set changes
    pub fn snapshot(&self) -> Vec<InstanceKey> {
        self.instances.iter().copied().collect()
    }

    /// Empty the set, returning what it held
    pub(crate) fn drain(&mut self) -> Vec<InstanceKey> {
        self.instances.drain().collect()
    }
}

/// Resources carrying an `Instantiable` capability
pub trait AsInstantiable {
    fn instantiable(&self) -> &Instantiable;
    fn instantiable_mut(&mut self) -> &mut Instantiable;
}

// ===== INSTANCE REGISTRY =====

/// Registration record of one external instance
pub(crate) struct InstanceRecord {
    observer: Weak<dyn InstanceBase>,
    /// Instantiable resources this instance depends on
    pub(crate) bases: FxHashSet<Rid>,
    /// Materials this instance owns directly
    pub(crate) materials: FxHashSet<Rid>,
}

/// Registry of external instances, keyed by `InstanceKey`
pub struct InstanceRegistry {
    records: SlotMap<InstanceKey, InstanceRecord>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self {
            records: SlotMap::with_key(),
        }
    }

    /// Register an instance (held weakly)
    pub fn register(&mut self, observer: &Arc<dyn InstanceBase>) -> InstanceKey {
        self.records.insert(InstanceRecord {
            observer: Arc::downgrade(observer),
            bases: FxHashSet::default(),
            materials: FxHashSet::default(),
        })
    }

    pub(crate) fn remove(&mut self, key: InstanceKey) -> Option<InstanceRecord> {
        self.records.remove(key)
    }

    pub(crate) fn record_mut(&mut self, key: InstanceKey) -> Option<&mut InstanceRecord> {
        self.records.get_mut(key)
    }

    pub fn contains(&self, key: InstanceKey) -> bool {
        self.records.contains_key(key)
    }

    /// Strong reference to a live instance
    pub fn observer(&self, key: InstanceKey) -> Option<Arc<dyn InstanceBase>> {
        self.records.get(key)?.observer.upgrade()
    }

    /// Instantiable resources an instance depends on
    pub fn bases(&self, key: InstanceKey) -> Vec<Rid> {
        self.records.get(key)
            .map(|r| r.bases.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Deliver `notification` to each target.
    ///
    /// Unknown keys are skipped. Returns the keys whose instance has been
    /// dropped without unregistering, so the caller can prune them.
    pub fn dispatch(&self, targets: &[InstanceKey], notification: Notification) -> Vec<InstanceKey> {
        let mut dead = Vec::new();
        for &key in targets {
            let record = match self.records.get(key) {
                Some(record) => record,
                None => continue,
            };
            let observer = match record.observer.upgrade() {
                Some(observer) => observer,
                None => {
                    dead.push(key);
                    continue;
                }
            };
            match notification {
                Notification::BaseChanged(base) => observer.base_changed(base),
                Notification::BaseMaterialChanged(base) => observer.base_material_changed(base),
                Notification::BaseRemoved(base) => observer.base_removed(base),
                Notification::MaterialRemoved(material) => observer.material_removed(material),
            }
        }
        dead
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "dependency_tests.rs"]
mod tests;
