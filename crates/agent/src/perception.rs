/// Page captures handed over by the content-extraction collaborator.
use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

/// One pre-split segment of a captured page. Segmentation happens on the
/// extraction side; the agent only counts and stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedChunk {
    pub text: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// Normalized payload for one captured page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCapture {
    pub url: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub chunks: Vec<CapturedChunk>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PageCapture {
    /// Whether the capture carries enough text to be worth embedding.
    /// Whitespace padding does not count.
    pub fn has_enough_content(&self, min_bytes: usize) -> bool {
        self.content.trim().len() >= min_bytes
    }
}
