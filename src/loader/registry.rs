//! Refcounted residency of decoded payloads.
//!
//! Loading an asset that is already resident shares the payload and bumps
//! its refcount instead of decoding it again. The payload is dropped when
//! the last holder releases it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::splat::SplatFrame;

#[derive(Debug)]
struct Resident {
    payload: Arc<SplatFrame>,
    refcount: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    pub acquisitions: u64,
    pub shared_hits: u64,
    pub releases: u64,
    pub frees: u64,
    pub unknown_releases: u64,
}

#[derive(Debug, Default)]
pub struct AssetRegistry {
    resident: HashMap<String, Resident>,
    stats: RegistryStats,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take another reference to a resident asset.
    pub fn acquire_resident(&mut self, asset: &str) -> Option<Arc<SplatFrame>> {
        let resident = self.resident.get_mut(asset)?;
        resident.refcount += 1;
        self.stats.acquisitions += 1;
        self.stats.shared_hits += 1;
        Some(resident.payload.clone())
    }

    /// Register a freshly decoded payload.
    ///
    /// If another load finished first, the existing payload wins and the new
    /// one is dropped.
    pub fn insert_or_share(&mut self, asset: &str, payload: Arc<SplatFrame>) -> Arc<SplatFrame> {
        self.stats.acquisitions += 1;
        if let Some(resident) = self.resident.get_mut(asset) {
            resident.refcount += 1;
            self.stats.shared_hits += 1;
            return resident.payload.clone();
        }
        self.resident.insert(
            asset.to_string(),
            Resident {
                payload: payload.clone(),
                refcount: 1,
            },
        );
        payload
    }

    /// Drop one reference. Returns true if the asset was freed.
    pub fn release(&mut self, asset: &str) -> bool {
        let Some(resident) = self.resident.get_mut(asset) else {
            warn!(asset, "Release of non-resident asset");
            self.stats.unknown_releases += 1;
            return false;
        };

        self.stats.releases += 1;
        resident.refcount = resident.refcount.saturating_sub(1);
        if resident.refcount > 0 {
            return false;
        }

        self.resident.remove(asset);
        self.stats.frees += 1;
        debug!(asset, "Freed asset");
        true
    }

    pub fn refcount(&self, asset: &str) -> usize {
        self.resident.get(asset).map(|r| r.refcount).unwrap_or(0)
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident.values().map(|r| r.payload.byte_size()).sum()
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}

/// Registry shared between the tick thread and loader tasks.
pub type SharedRegistry = Arc<Mutex<AssetRegistry>>;

pub fn new_shared_registry() -> SharedRegistry {
    Arc::new(Mutex::new(AssetRegistry::new()))
}

/// Lock the registry. A poisoned lock still holds consistent counts.
pub fn lock(registry: &SharedRegistry) -> MutexGuard<'_, AssetRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
