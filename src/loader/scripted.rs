//! A deterministic loader driven by hand.
//!
//! Requests are parked until the caller completes or fails them, which makes
//! completion order, late completions and releases fully observable. Used by
//! tests and tooling that must not depend on timing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::frame::FrameKey;
use crate::loader::{AssetLoader, FrameHandle, LoadError, LoadRequest};
use crate::splat::SplatFrame;

#[derive(Debug, Default)]
struct ScriptedState {
    parked: Vec<LoadRequest>,
    requested: Vec<FrameKey>,
    released: Vec<FrameKey>,
}

/// Cloneable handle; clones share the same script.
#[derive(Debug, Clone)]
pub struct ScriptedLoader {
    state: Arc<Mutex<ScriptedState>>,
    splats_per_frame: usize,
    sh_bands: u8,
}

impl ScriptedLoader {
    pub fn new(splats_per_frame: usize, sh_bands: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState::default())),
            splats_per_frame,
            sh_bands,
        }
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every key ever requested, in request order.
    pub fn requested(&self) -> Vec<FrameKey> {
        self.state().requested.clone()
    }

    /// Keys with a parked (uncompleted) request.
    pub fn parked(&self) -> Vec<FrameKey> {
        self.state().parked.iter().map(|r| r.key).collect()
    }

    /// Every key whose handle was released, in release order.
    pub fn released(&self) -> Vec<FrameKey> {
        self.state().released.clone()
    }

    fn take(&self, key: FrameKey) -> Option<LoadRequest> {
        let mut state = self.state();
        let pos = state.parked.iter().position(|r| r.key == key)?;
        Some(state.parked.remove(pos))
    }

    fn deliver(&self, request: LoadRequest, result: Result<Arc<SplatFrame>, LoadError>) {
        let key = request.key;
        if let Err(unsent) = request.complete(result) {
            if unsent.result.is_ok() {
                self.state().released.push(key);
            }
        }
    }

    /// Complete the oldest parked request for `key` successfully.
    pub fn complete(&self, key: FrameKey) -> bool {
        let Some(request) = self.take(key) else {
            return false;
        };
        let payload = SplatFrame::synthetic(key as u64, self.splats_per_frame, self.sh_bands);
        self.deliver(request, Ok(Arc::new(payload)));
        true
    }

    /// Fail the oldest parked request for `key`.
    pub fn fail(&self, key: FrameKey) -> bool {
        let Some(request) = self.take(key) else {
            return false;
        };
        let name = request.frame.name.clone();
        self.deliver(request, Err(LoadError::Decoder(name)));
        true
    }

    /// Complete every parked request in request order.
    pub fn complete_all(&self) -> usize {
        let parked = std::mem::take(&mut self.state().parked);
        let count = parked.len();
        for request in parked {
            let payload =
                SplatFrame::synthetic(request.key as u64, self.splats_per_frame, self.sh_bands);
            self.deliver(request, Ok(Arc::new(payload)));
        }
        count
    }
}

impl AssetLoader for ScriptedLoader {
    fn load(&self, request: LoadRequest) {
        let mut state = self.state();
        state.requested.push(request.key);
        state.parked.push(request);
    }

    fn release(&self, handle: FrameHandle) {
        self.state().released.push(handle.key());
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::source::FrameRef;

    #[test]
    fn test_parks_until_completed() {
        let loader = ScriptedLoader::new(4, 0);
        let (tx, mut rx) = mpsc::unbounded_channel();

        loader.load(LoadRequest::new(2, 1, FrameRef::named("c"), tx.clone()));
        loader.load(LoadRequest::new(5, 2, FrameRef::named("f"), tx));
        assert_eq!(loader.parked(), vec![2, 5]);
        assert!(rx.try_recv().is_err());

        assert!(loader.fail(5));
        assert!(loader.complete(2));
        assert!(!loader.complete(2));

        assert!(rx.try_recv().unwrap().result.is_err());
        assert_eq!(rx.try_recv().unwrap().result.unwrap().payload().count(), 4);
        assert_eq!(loader.requested(), vec![2, 5]);
    }
}
