use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use wren_common::errors::StorageError;

/// The fixed set of document scopes the chrome persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    Favicons,
    Bookmarks,
    History,
    FormFill,
    StartupTabs,
    Permissions,
}

impl Scope {
    pub const ALL: [Scope; 6] = [
        Scope::Favicons,
        Scope::Bookmarks,
        Scope::History,
        Scope::FormFill,
        Scope::StartupTabs,
        Scope::Permissions,
    ];
}

/// A stored document: an opaque id plus a JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub value: Value,
}

/// An exact-match query over a record's top-level fields. `_id` matches the
/// record id; an empty query matches every record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query(Map<String, Value>);

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = Map::new();
        map.insert(key.into(), value.into());
        Self(map)
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::field("_id", Value::String(id.into()))
    }

    pub fn and(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.0.iter().all(|(key, expected)| {
            if key == "_id" {
                return expected.as_str() == Some(record.id.as_str());
            }
            record.value.get(key) == Some(expected)
        })
    }
}

/// The find/insert/update/remove surface of the document store.
///
/// `find` returns cloned snapshots; callers iterate their own copy and never
/// observe concurrent mutation of the backing collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, scope: Scope, query: &Query) -> Result<Vec<Record>, StorageError>;

    async fn find_one(&self, scope: Scope, query: &Query)
        -> Result<Option<Record>, StorageError>;

    async fn insert(&self, scope: Scope, value: Value) -> Result<Record, StorageError>;

    /// Shallow-merge `patch` into every matching record (the first match
    /// only unless `multi`). Returns the number of records updated.
    async fn update(
        &self,
        scope: Scope,
        query: &Query,
        patch: Value,
        multi: bool,
    ) -> Result<usize, StorageError>;

    /// Remove matching records (the first match only unless `multi`).
    /// Returns the number removed.
    async fn remove(&self, scope: Scope, query: &Query, multi: bool)
        -> Result<usize, StorageError>;
}
