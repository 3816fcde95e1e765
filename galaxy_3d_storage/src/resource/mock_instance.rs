/// Recording instance for tests
///
/// Implements `InstanceBase` by appending every callback it receives to an
/// event list, so tests can assert on exactly what was delivered.

use std::sync::{Arc, Mutex};
use crate::resource::dependency::InstanceBase;
use crate::resource::handle::{MaterialHandle, Rid};

/// One delivered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceEvent {
    BaseChanged(Rid),
    BaseMaterialChanged(Rid),
    BaseRemoved(Rid),
    MaterialRemoved(MaterialHandle),
}

/// Instance that records its callbacks
#[derive(Debug, Default)]
pub struct MockInstance {
    events: Mutex<Vec<InstanceEvent>>,
}

impl MockInstance {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All callbacks received so far, in order
    pub fn events(&self) -> Vec<InstanceEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, event: InstanceEvent) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }

    pub fn changed_count(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, InstanceEvent::BaseChanged(_))).count()
    }

    pub fn material_changed_count(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, InstanceEvent::BaseMaterialChanged(_))).count()
    }

    pub fn removed_count(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, InstanceEvent::BaseRemoved(_))).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: InstanceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl InstanceBase for MockInstance {
    fn base_changed(&self, base: Rid) {
        self.record(InstanceEvent::BaseChanged(base));
    }

    fn base_material_changed(&self, base: Rid) {
        self.record(InstanceEvent::BaseMaterialChanged(base));
    }

    fn base_removed(&self, base: Rid) {
        self.record(InstanceEvent::BaseRemoved(base));
    }

    fn material_removed(&self, material: MaterialHandle) {
        self.record(InstanceEvent::MaterialRemoved(material));
    }
}
