//! Tokio-task based asset loader.
//!
//! Each request runs on its own task: resident assets are shared through the
//! registry, everything else goes through the decoder. Results are posted
//! back to the requesting cache, never applied here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::loader::decoder::FrameDecoder;
use crate::loader::registry::{self, SharedRegistry};
use crate::loader::{AssetLoader, FrameHandle, LoadError, LoadRequest};

#[derive(Debug, Default)]
struct LoaderCounters {
    spawned: AtomicU64,
    decoded: AtomicU64,
    failed: AtomicU64,
    orphaned: AtomicU64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoaderStats {
    pub spawned: u64,
    pub decoded: u64,
    pub failed: u64,
    /// Results whose requester was gone; released immediately.
    pub orphaned: u64,
}

/// Loader that decodes frames on tokio tasks.
pub struct TaskAssetLoader {
    runtime: Handle,
    decoder: Arc<dyn FrameDecoder>,
    registry: SharedRegistry,
    counters: Arc<LoaderCounters>,
}

impl TaskAssetLoader {
    /// Create a loader spawning onto the given runtime.
    pub fn new(runtime: Handle, decoder: Arc<dyn FrameDecoder>, registry: SharedRegistry) -> Self {
        Self {
            runtime,
            decoder,
            registry,
            counters: Arc::new(LoaderCounters::default()),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            spawned: self.counters.spawned.load(Ordering::Relaxed),
            decoded: self.counters.decoded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            orphaned: self.counters.orphaned.load(Ordering::Relaxed),
        }
    }
}

impl AssetLoader for TaskAssetLoader {
    fn load(&self, request: LoadRequest) {
        let decoder = self.decoder.clone();
        let registry = self.registry.clone();
        let counters = self.counters.clone();
        counters.spawned.fetch_add(1, Ordering::Relaxed);

        self.runtime.spawn(async move {
            let key = request.key;
            let name = request.frame.name.clone();

            let result = if !request.frame.is_valid() {
                Err(LoadError::InvalidReference(key))
            } else {
                let resident = registry::lock(&registry).acquire_resident(&name);
                match resident {
                    Some(payload) => {
                        debug!(key, asset = %name, "Sharing resident asset");
                        Ok(payload)
                    }
                    None => match decoder.decode(&request.frame).await {
                        Ok(frame) => {
                            counters.decoded.fetch_add(1, Ordering::Relaxed);
                            Ok(registry::lock(&registry).insert_or_share(&name, Arc::new(frame)))
                        }
                        Err(e) => Err(e),
                    },
                }
            };

            if let Err(e) = &result {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key, asset = %name, error = %e, "Frame load failed");
            }

            if let Err(unsent) = request.complete(result) {
                counters.orphaned.fetch_add(1, Ordering::Relaxed);
                if let Ok(handle) = unsent.result {
                    registry::lock(&registry).release(handle.asset());
                }
            }
        });
    }

    fn release(&self, handle: FrameHandle) {
        let freed = registry::lock(&self.registry).release(handle.asset());
        debug!(key = handle.key(), asset = handle.asset(), freed, "Released frame");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::loader::decoder::SyntheticDecoder;
    use crate::loader::registry::new_shared_registry;
    use crate::source::FrameRef;

    fn loader() -> TaskAssetLoader {
        let decoder = Arc::new(SyntheticDecoder::new(32, 0, Duration::ZERO).with_failure("bad"));
        TaskAssetLoader::new(Handle::current(), decoder, new_shared_registry())
    }

    #[tokio::test]
    async fn test_load_and_release() {
        let loader = loader();
        let (tx, mut rx) = mpsc::unbounded_channel();

        loader.load(LoadRequest::new(0, 1, FrameRef::named("a"), tx.clone()));
        loader.load(LoadRequest::new(1, 2, FrameRef::named("a"), tx));

        let first = rx.recv().await.unwrap().result.unwrap();
        let second = rx.recv().await.unwrap().result.unwrap();
        assert!(Arc::ptr_eq(first.payload(), second.payload()));
        assert_eq!(registry::lock(loader.registry()).refcount("a"), 2);

        loader.release(first);
        loader.release(second);
        assert_eq!(registry::lock(loader.registry()).resident_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_and_invalid_loads() {
        let loader = loader();
        let (tx, mut rx) = mpsc::unbounded_channel();

        loader.load(LoadRequest::new(0, 1, FrameRef::named("bad"), tx.clone()));
        let completion = rx.recv().await.unwrap();
        assert!(matches!(completion.result, Err(LoadError::Decoder(_))));

        loader.load(LoadRequest::new(4, 2, FrameRef::named(""), tx));
        let completion = rx.recv().await.unwrap();
        assert!(matches!(completion.result, Err(LoadError::InvalidReference(4))));
        assert_eq!(loader.stats().failed, 2);
    }

    #[tokio::test]
    async fn test_orphaned_result_is_released() {
        let loader = loader();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        loader.load(LoadRequest::new(0, 1, FrameRef::named("a"), tx));
        for _ in 0..100 {
            if loader.stats().orphaned == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(loader.stats().orphaned, 1);
        assert_eq!(registry::lock(loader.registry()).resident_count(), 0);
    }
}
