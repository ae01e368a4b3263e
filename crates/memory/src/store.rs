/// Durable key-value collaborator: whole-value reads and writes only.
use std::{collections::HashMap, sync::Arc};

use {async_trait::async_trait, serde_json::Value, tokio::sync::RwLock};

/// Snapshot key holding the serialized memory records.
pub const KEY_MEMORIES: &str = "memories";
/// Snapshot key holding the id to vector table.
pub const KEY_EMBEDDINGS: &str = "embeddings";
/// Key holding the persisted embedding provider settings.
pub const KEY_EMBEDDING_SETTINGS: &str = "embedding_settings";

/// Durable key-value storage. `set` replaces each given key wholesale, and
/// one call applies atomically: all keys land or none do. There are no
/// partial updates, which is what makes concurrent whole-snapshot writers
/// able to overwrite each other.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> anyhow::Result<HashMap<String, Value>>;

    async fn set(&self, entries: HashMap<String, Value>) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, keys: &[&str]) -> anyhow::Result<HashMap<String, Value>> {
        (**self).get(keys).await
    }

    async fn set(&self, entries: HashMap<String, Value>) -> anyhow::Result<()> {
        (**self).set(entries).await
    }
}

/// Volatile store for tests and throwaway sessions.
#[derive(Default)]
pub struct InMemoryKvStore {
    data: RwLock<HashMap<String, Value>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, keys: &[&str]) -> anyhow::Result<HashMap<String, Value>> {
        let data = self.data.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| ((*key).to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.extend(entries);
        Ok(())
    }
}
