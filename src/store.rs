//! Abstract persistence (spec §6, §9): an `EventStore` for the bet actor's
//! append-only streams, and a `StateStore` for the latest-snapshot form used
//! by wallet/odds/sport-event/bet-index. Implementers may back either with
//! an append-only log, a relational table, or an object store; this crate
//! ships an in-memory implementation (used by every actor by default and by
//! all tests) and a `sled`-backed implementation for a real deployment.

use crate::error::DomainError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// One append-only event stream per aggregate id (`bet:<betId>` per spec §6).
#[async_trait]
pub trait EventStore<E>: Send + Sync
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn append(&self, stream_key: &str, events: &[E]) -> Result<(), DomainError>;
    async fn read(&self, stream_key: &str) -> Result<Vec<E>, DomainError>;
}

/// Latest-serialized-state snapshot per `{entity}:{id}` (spec §6), written
/// after every successful operation.
#[async_trait]
pub trait StateStore<V>: Send + Sync
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn put(&self, key: &str, value: &V) -> Result<(), DomainError>;
    async fn get(&self, key: &str) -> Result<Option<V>, DomainError>;
}

/// In-memory event store. Streams never delete, matching spec §6.
#[derive(Default)]
pub struct InMemoryEventStore {
    streams: DashMap<String, Vec<serde_json::Value>>,
}

impl InMemoryEventStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl<E> EventStore<E> for InMemoryEventStore
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn append(&self, stream_key: &str, events: &[E]) -> Result<(), DomainError> {
        let mut entry = self.streams.entry(stream_key.to_string()).or_default();
        for event in events {
            let value = serde_json::to_value(event)
                .map_err(|e| DomainError::PersistenceError(e.to_string()))?;
            entry.push(value);
        }
        Ok(())
    }

    async fn read(&self, stream_key: &str) -> Result<Vec<E>, DomainError> {
        match self.streams.get(stream_key) {
            Some(values) => values
                .iter()
                .map(|v| {
                    serde_json::from_value(v.clone())
                        .map_err(|e| DomainError::PersistenceError(e.to_string()))
                })
                .collect(),
            None => Ok(Vec::new()),
        }
    }
}

/// In-memory snapshot store.
#[derive(Default)]
pub struct InMemoryStateStore {
    values: DashMap<String, serde_json::Value>,
}

impl InMemoryStateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl<V> StateStore<V> for InMemoryStateStore
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn put(&self, key: &str, value: &V) -> Result<(), DomainError> {
        let json = serde_json::to_value(value)
            .map_err(|e| DomainError::PersistenceError(e.to_string()))?;
        self.values.insert(key.to_string(), json);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<V>, DomainError> {
        match self.values.get(key) {
            Some(v) => Ok(Some(
                serde_json::from_value(v.clone())
                    .map_err(|e| DomainError::PersistenceError(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}

/// `sled`-backed event store: a real append-only log on disk, one `sled` tree
/// keyed by stream key holding a JSON array. Adequate for a single-node
/// deployment; a clustered store is out of scope (spec §1 Non-goals on
/// persistence durability guarantees beyond at-least-once/read-your-writes).
pub struct SledEventStore {
    tree: sled::Tree,
}

impl SledEventStore {
    pub fn open(db: &sled::Db, tree_name: &str) -> Result<Arc<Self>, DomainError> {
        let tree = db
            .open_tree(tree_name)
            .map_err(|e| DomainError::PersistenceError(e.to_string()))?;
        Ok(Arc::new(SledEventStore { tree }))
    }
}

#[async_trait]
impl<E> EventStore<E> for SledEventStore
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn append(&self, stream_key: &str, events: &[E]) -> Result<(), DomainError> {
        let mut current: Vec<serde_json::Value> = match self
            .tree
            .get(stream_key)
            .map_err(|e| DomainError::PersistenceError(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| DomainError::PersistenceError(e.to_string()))?,
            None => Vec::new(),
        };
        for event in events {
            current.push(
                serde_json::to_value(event)
                    .map_err(|e| DomainError::PersistenceError(e.to_string()))?,
            );
        }
        let bytes = serde_json::to_vec(&current)
            .map_err(|e| DomainError::PersistenceError(e.to_string()))?;
        self.tree
            .insert(stream_key, bytes)
            .map_err(|e| DomainError::PersistenceError(e.to_string()))?;
        Ok(())
    }

    async fn read(&self, stream_key: &str) -> Result<Vec<E>, DomainError> {
        match self
            .tree
            .get(stream_key)
            .map_err(|e| DomainError::PersistenceError(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| DomainError::PersistenceError(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        n: u32,
    }

    #[tokio::test]
    async fn in_memory_event_store_appends_and_reads_back() {
        let store = InMemoryEventStore::new();
        EventStore::<Dummy>::append(&*store, "s1", &[Dummy { n: 1 }, Dummy { n: 2 }])
            .await
            .unwrap();
        EventStore::<Dummy>::append(&*store, "s1", &[Dummy { n: 3 }])
            .await
            .unwrap();
        let events: Vec<Dummy> = EventStore::<Dummy>::read(&*store, "s1").await.unwrap();
        assert_eq!(events, vec![Dummy { n: 1 }, Dummy { n: 2 }, Dummy { n: 3 }]);
    }

    #[tokio::test]
    async fn in_memory_state_store_overwrites() {
        let store = InMemoryStateStore::new();
        StateStore::<Dummy>::put(&*store, "k", &Dummy { n: 1 })
            .await
            .unwrap();
        StateStore::<Dummy>::put(&*store, "k", &Dummy { n: 2 })
            .await
            .unwrap();
        let value: Option<Dummy> = StateStore::<Dummy>::get(&*store, "k").await.unwrap();
        assert_eq!(value, Some(Dummy { n: 2 }));
    }
}
