/// Memory manager: owns the collection, embeds on add, persists snapshots.
use std::collections::{BTreeMap, HashMap};

use {
    serde_json::Value,
    tokio::sync::RwLock,
    tracing::{debug, info},
};

use crate::{
    embeddings::EmbeddingProvider,
    search::{self, SearchHit, SearchOptions},
    store::{KEY_EMBEDDINGS, KEY_MEMORIES, KvStore},
    types::{Memory, MemoryStats, NewMemory, new_memory_id},
};

/// Failures surfaced by [`MemoryManager`].
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("embedding failed: {0}")]
    Embedding(anyhow::Error),
    /// The snapshot write failed. The record is in memory but not durable,
    /// and the caller has to know that.
    #[error("persistence failed: {0}")]
    Persistence(anyhow::Error),
    #[error("storage read failed: {0}")]
    Storage(anyhow::Error),
}

/// In-memory collection of memories plus their embedding vectors, mirrored to
/// the key-value collaborator as one whole `{memories, embeddings}` snapshot
/// after every add.
///
/// Reads always hit memory; the snapshot exists only to survive restarts.
/// Concurrent `add` calls each write the full snapshot, so a slow writer can
/// land after a faster one and drop its records from the durable copy. The
/// in-memory collection is never affected. This matches the storage contract
/// of whole-value writes; `concurrent_adds_can_lose_a_snapshot` pins the
/// behavior down.
pub struct MemoryManager {
    kv: Box<dyn KvStore>,
    embedder: Box<dyn EmbeddingProvider>,
    memories: RwLock<Vec<Memory>>,
    embeddings: RwLock<HashMap<String, Vec<f32>>>,
}

impl MemoryManager {
    /// Empty manager over the given collaborators.
    pub fn new(kv: Box<dyn KvStore>, embedder: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            kv,
            embedder,
            memories: RwLock::new(Vec::new()),
            embeddings: RwLock::new(HashMap::new()),
        }
    }

    /// Manager hydrated from the persisted snapshot. Missing keys mean a
    /// fresh store and hydrate to an empty collection.
    pub async fn load(kv: Box<dyn KvStore>, embedder: Box<dyn EmbeddingProvider>) -> Result<Self, MemoryError> {
        let mut stored = kv.get(&[KEY_MEMORIES, KEY_EMBEDDINGS]).await.map_err(MemoryError::Storage)?;
        let memories: Vec<Memory> = match stored.remove(KEY_MEMORIES) {
            Some(value) => serde_json::from_value(value).map_err(|e| MemoryError::Storage(e.into()))?,
            None => Vec::new(),
        };
        let embeddings: HashMap<String, Vec<f32>> = match stored.remove(KEY_EMBEDDINGS) {
            Some(value) => serde_json::from_value(value).map_err(|e| MemoryError::Storage(e.into()))?,
            None => HashMap::new(),
        };
        info!(memories = memories.len(), "hydrated memory snapshot");
        Ok(Self {
            kv,
            embedder,
            memories: RwLock::new(memories),
            embeddings: RwLock::new(embeddings),
        })
    }

    /// Embed the content, append the record, then persist the snapshot.
    /// The append and the snapshot write are separate critical sections.
    pub async fn add(&self, record: NewMemory) -> Result<Memory, MemoryError> {
        let vector = self.embedder.embed(&record.content).await.map_err(MemoryError::Embedding)?;
        let memory = Memory {
            id: new_memory_id(),
            kind: record.kind,
            content: record.content,
            metadata: record.metadata,
            tags: record.tags,
            created_at: chrono::Utc::now(),
        };
        {
            let mut memories = self.memories.write().await;
            memories.push(memory.clone());
        }
        {
            let mut embeddings = self.embeddings.write().await;
            embeddings.insert(memory.id.clone(), vector);
        }
        self.persist().await?;
        info!(id = %memory.id, kind = %memory.kind, "stored memory");
        Ok(memory)
    }

    /// Write the whole `{memories, embeddings}` snapshot to the collaborator.
    pub async fn persist(&self) -> Result<(), MemoryError> {
        let snapshot = self.snapshot().await.map_err(MemoryError::Persistence)?;
        self.kv.set(snapshot).await.map_err(MemoryError::Persistence)
    }

    async fn snapshot(&self) -> anyhow::Result<HashMap<String, Value>> {
        let memories = self.memories.read().await;
        let embeddings = self.embeddings.read().await;
        Ok(HashMap::from([
            (KEY_MEMORIES.to_string(), serde_json::to_value(&*memories)?),
            (KEY_EMBEDDINGS.to_string(), serde_json::to_value(&*embeddings)?),
        ]))
    }

    /// Rank stored memories against `query`.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>, MemoryError> {
        let query_vector = self.embedder.embed(query).await.map_err(MemoryError::Embedding)?;
        let memories = self.memories.read().await;
        let embeddings = self.embeddings.read().await;
        let hits = search::rank(&memories, &embeddings, &query_vector, options);
        debug!(hits = hits.len(), scanned = memories.len(), "ranked memories");
        Ok(hits)
    }

    /// Collection totals, grouped by kind.
    pub async fn stats(&self) -> MemoryStats {
        let memories = self.memories.read().await;
        let mut by_kind = BTreeMap::new();
        for memory in memories.iter() {
            *by_kind.entry(memory.kind.as_str().to_string()).or_insert(0) += 1;
        }
        MemoryStats {
            total: memories.len(),
            by_kind,
        }
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }
}
