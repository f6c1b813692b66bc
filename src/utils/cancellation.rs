use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared abort flag. One writer (the caller or the orchestrator), any number of readers.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
    parent: Option<Box<CancellationFlag>>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag that also reads as cancelled once `self` or any of its
    /// ancestors is. Cancelling the child leaves the parent untouched.
    pub fn child(&self) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_cancelled())
    }
}

/// Completed region jobs. Advisory only; nothing branches on it.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    completed: Arc<AtomicUsize>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.completed.store(0, Ordering::Relaxed);
    }
}
