/// Persisted embedding provider settings.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::store::{KEY_EMBEDDING_SETTINGS, KvStore};

/// Which embedding backend to prefer, and how to reach it. Stored through the
/// key-value collaborator so the choice survives restarts; the fallback chain
/// puts this provider first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Backend name: `openai`, `gemini`, or `ollama`.
    pub provider: String,
    /// Credential for the configured backend, when it needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            api_key: None,
            model: None,
            dimensions: None,
        }
    }
}

impl EmbeddingSettings {
    /// Load persisted settings; `None` when nothing was stored yet.
    pub async fn load(store: &dyn KvStore) -> anyhow::Result<Option<Self>> {
        let mut values = store.get(&[KEY_EMBEDDING_SETTINGS]).await?;
        match values.remove(KEY_EMBEDDING_SETTINGS) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, store: &dyn KvStore) -> anyhow::Result<()> {
        let entries = HashMap::from([(KEY_EMBEDDING_SETTINGS.to_string(), serde_json::to_value(self)?)]);
        store.set(entries).await
    }
}
