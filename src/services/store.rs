use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::match_record::MatchRecord;

/// Where finished match records go. Implemented by the host application.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Persist a new record and return its id
    async fn save(&self, record: &MatchRecord) -> Result<String, String>;

    /// Replace an existing record
    async fn update(&self, id: &str, record: &MatchRecord) -> Result<(), String>;
}

/// Process-local store, handy for tests and one-shot tools
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    records: Mutex<HashMap<String, MatchRecord>>,
    next_id: Mutex<u64>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<MatchRecord> {
        self.records.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn save(&self, record: &MatchRecord) -> Result<String, String> {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            format!("match-{}", *next)
        };
        self.records.lock().insert(id.clone(), record.clone());
        Ok(id)
    }

    async fn update(&self, id: &str, record: &MatchRecord) -> Result<(), String> {
        let mut records = self.records.lock();
        match records.get_mut(id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(format!("No match record with id '{}'", id)),
        }
    }
}
