use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::engine::RecognitionEngine;

/// Engine slot shared between the task using it and whoever cleans up.
/// `None` once the engine has been terminated.
pub type SharedEngine = Arc<tokio::sync::Mutex<Option<Box<dyn RecognitionEngine>>>>;

/// Terminate the engine in `slot` unless that already happened
pub async fn terminate_shared(slot: &SharedEngine) {
    let engine = slot.lock().await.take();
    if let Some(mut engine) = engine {
        engine.terminate().await;
    }
}

/// Every engine created during one pipeline run.
///
/// Engines are registered as soon as they exist, so they can still be
/// terminated after a worker panics or the run is dropped mid-flight.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Arc<Mutex<Vec<SharedEngine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a freshly created engine
    pub fn register(&self, engine: Box<dyn RecognitionEngine>) -> SharedEngine {
        let slot: SharedEngine = Arc::new(tokio::sync::Mutex::new(Some(engine)));
        self.engines.lock().push(Arc::clone(&slot));
        slot
    }

    /// Engines not yet swept by [`terminate_all`](Self::terminate_all)
    pub fn len(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.lock().is_empty()
    }

    /// Terminate every registered engine. A slot leaves the registry only
    /// after its engine is terminated, so an interrupted sweep loses nothing.
    pub async fn terminate_all(&self) {
        loop {
            let next = self.engines.lock().first().cloned();
            let Some(slot) = next else {
                break;
            };

            terminate_shared(&slot).await;
            self.engines.lock().retain(|other| !Arc::ptr_eq(other, &slot));
        }
    }

    /// Guard that sweeps the registry in the background if dropped while
    /// engines are still registered
    pub fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard {
            registry: self.clone(),
        }
    }
}

pub struct CleanupGuard {
    registry: EngineRegistry,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.registry.is_empty() {
            return;
        }

        let registry = self.registry.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Run dropped with {} engines alive; terminating", registry.len());
                handle.spawn(async move {
                    registry.terminate_all().await;
                });
            }
            Err(_) => {
                warn!(
                    "Run dropped outside a runtime; {} engines left unterminated",
                    registry.len()
                );
            }
        }
    }
}
