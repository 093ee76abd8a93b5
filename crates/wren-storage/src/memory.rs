//! In-memory document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use wren_common::errors::StorageError;

use crate::store::{DocumentStore, Query, Record, Scope};

/// A process-local store backend. Useful for tests and incognito sessions,
/// where nothing may touch disk.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Scope, Vec<Record>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn make_id(&self) -> String {
        format!("doc-{:08x}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn merge_shallow(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, scope: Scope, query: &Query) -> Result<Vec<Record>, StorageError> {
        let collections = self.collections.lock().unwrap();
        let records = collections
            .get(&scope)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| query.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn find_one(
        &self,
        scope: Scope,
        query: &Query,
    ) -> Result<Option<Record>, StorageError> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(&scope)
            .and_then(|records| records.iter().find(|r| query.matches(r)).cloned()))
    }

    async fn insert(&self, scope: Scope, value: Value) -> Result<Record, StorageError> {
        let record = Record {
            id: self.make_id(),
            value,
        };
        let mut collections = self.collections.lock().unwrap();
        collections.entry(scope).or_default().push(record.clone());
        debug!(?scope, id = %record.id, "record inserted");
        Ok(record)
    }

    async fn update(
        &self,
        scope: Scope,
        query: &Query,
        patch: Value,
        multi: bool,
    ) -> Result<usize, StorageError> {
        let mut collections = self.collections.lock().unwrap();
        let Some(records) = collections.get_mut(&scope) else {
            return Ok(0);
        };

        let mut updated = 0;
        for record in records.iter_mut() {
            if !query.matches(record) {
                continue;
            }
            merge_shallow(&mut record.value, &patch);
            updated += 1;
            if !multi {
                break;
            }
        }
        Ok(updated)
    }

    async fn remove(
        &self,
        scope: Scope,
        query: &Query,
        multi: bool,
    ) -> Result<usize, StorageError> {
        let mut collections = self.collections.lock().unwrap();
        let Some(records) = collections.get_mut(&scope) else {
            return Ok(0);
        };

        let before = records.len();
        if multi {
            records.retain(|r| !query.matches(r));
        } else if let Some(pos) = records.iter().position(|r| query.matches(r)) {
            records.remove(pos);
        }
        Ok(before - records.len())
    }
}
