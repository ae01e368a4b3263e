/// The action-execution collaborator surface.
use {async_trait::async_trait, serde_json::Value};

/// Per-run context supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// URL of the page currently in front of the agent, if any. Last-resort
    /// navigation target.
    pub current_url: Option<String>,
}

/// Host-side executor for plan steps. Implementations talk to the browsing
/// host; failures come back as errors and are recorded by the engine, never
/// thrown past it.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run a search. Returns one value per result item.
    async fn execute_search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Value>>;

    /// Navigate to `url`, optionally via a link labelled `link_text`.
    async fn execute_navigation(&self, url: &str, link_text: Option<&str>) -> anyhow::Result<()>;

    /// Highlight `text` within the optional `target` element. Returns the
    /// match count.
    async fn execute_highlight(&self, target: Option<&str>, text: &str) -> anyhow::Result<u64>;

    /// Whether the last navigation has settled. Polled by the readiness
    /// wait; hosts without a meaningful signal report ready immediately.
    async fn navigation_ready(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}
