//! Explicit registry of active renderers.
//!
//! Renderers register when enabled and unregister when disabled. The
//! coordinator is constructed by the application and shared by handle; there
//! is no process-global instance.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Identifies one registration.
pub type RendererId = u64;

#[derive(Debug, Default)]
pub struct RenderCoordinator {
    renderers: BTreeMap<RendererId, String>,
    next_id: RendererId,
}

impl RenderCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, label: impl Into<String>) -> RendererId {
        let id = self.next_id;
        self.next_id += 1;
        let label = label.into();
        debug!(id, label = %label, "Renderer registered");
        self.renderers.insert(id, label);
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unregister(&mut self, id: RendererId) -> bool {
        let removed = self.renderers.remove(&id).is_some();
        if removed {
            debug!(id, "Renderer unregistered");
        }
        removed
    }

    pub fn is_registered(&self, id: RendererId) -> bool {
        self.renderers.contains_key(&id)
    }

    /// Registered renderers in registration order.
    pub fn registered(&self) -> Vec<(RendererId, String)> {
        self.renderers
            .iter()
            .map(|(&id, label)| (id, label.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

pub type SharedCoordinator = Arc<Mutex<RenderCoordinator>>;

pub fn new_shared_coordinator() -> SharedCoordinator {
    Arc::new(Mutex::new(RenderCoordinator::new()))
}

pub fn lock(coordinator: &SharedCoordinator) -> MutexGuard<'_, RenderCoordinator> {
    coordinator.lock().unwrap_or_else(PoisonError::into_inner)
}
