/// Memory records and the kinds the agent files them under.
use std::collections::{BTreeMap, BTreeSet};

use {
    chrono::{DateTime, Utc},
    rand::Rng,
    serde::{Deserialize, Serialize},
};

/// Kind of a stored memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A captured web page.
    WebPage,
    /// A query the agent processed.
    Query,
    /// One search result item recorded after a successful run.
    SearchResult,
    /// Free-form note.
    #[default]
    Note,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebPage => "web_page",
            Self::Query => "query",
            Self::SearchResult => "search_result",
            Self::Note => "note",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored content unit. Records are immutable once created; the collection
/// only grows. The embedding vector lives in a parallel id-keyed table so the
/// persisted snapshot keeps its two-part `{memories, embeddings}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub kind: MemoryKind,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for [`crate::manager::MemoryManager::add`]. The manager assigns the
/// id and timestamp.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub kind: MemoryKind,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub tags: BTreeSet<String>,
}

impl NewMemory {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Collection totals, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 6;

/// Generate a memory id: unix-millis prefix plus a random suffix. Time-sortable
/// and unique enough for an in-process collection, not cryptographic.
pub fn new_memory_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("mem_{millis}_{suffix}")
}
