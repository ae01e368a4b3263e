/// Query orchestration: perceive, retrieve, plan, execute, record back.
use {
    serde::Serialize,
    serde_json::{Map, Value, json},
    tracing::{debug, info, warn},
};

use {
    tidemark_execution::{
        actions::ExecutionContext,
        engine::{ExecutionEngine, ExecutionReport},
    },
    tidemark_memory::{
        manager::{MemoryError, MemoryManager},
        search::{SearchHit, SearchOptions},
        types::{Memory, MemoryKind, NewMemory},
    },
    tidemark_planning::{
        analysis::{self, QueryAnalysis},
        plan::Plan,
        planner::Planner,
    },
};

use crate::perception::PageCapture;

/// Orchestration tuning.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// How many remembered pages to retrieve per query.
    pub retrieval_limit: usize,
    /// Similarity floor for retrieval.
    pub retrieval_min_score: f32,
    /// Captures with less trimmed content than this are not stored.
    pub min_content_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            retrieval_limit: 5,
            retrieval_min_score: 0.3,
            min_content_bytes: 80,
        }
    }
}

/// What one query produced. Pipeline failures land here too; nothing escapes
/// the agent boundary as an error.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Whether the plan ran to natural completion. An unfinished run is
    /// unsuccessful but carries no `error`.
    pub success: bool,
    pub query: String,
    /// Data payloads of successful steps, in execution order.
    pub results: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryOutcome {
    fn failure(query: &str, error: String) -> Self {
        Self {
            success: false,
            query: query.to_string(),
            results: Vec::new(),
            error: Some(error),
        }
    }
}

/// The browsing agent: one memory manager, one planner, one execution engine,
/// driven query by query.
pub struct Agent {
    memory: MemoryManager,
    planner: Planner,
    engine: ExecutionEngine,
    config: AgentConfig,
}

impl Agent {
    pub fn new(memory: MemoryManager, engine: ExecutionEngine, config: AgentConfig) -> Self {
        Self {
            memory,
            planner: Planner::new(),
            engine,
            config,
        }
    }

    /// Run the full pipeline for one query. Failures at any stage are caught
    /// here and come back as an unsuccessful outcome.
    pub async fn process_query(&self, query: &str, context: &ExecutionContext) -> QueryOutcome {
        match self.run_pipeline(query, context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(query, error = %e, "query pipeline failed");
                QueryOutcome::failure(query, e.to_string())
            }
        }
    }

    async fn run_pipeline(&self, query: &str, context: &ExecutionContext) -> anyhow::Result<QueryOutcome> {
        let analysis = analysis::analyze(query);
        debug!(intent = %analysis.intent, entities = analysis.entities.len(), "analyzed query");

        let hits = self.retrieve(query).await?;
        let mut plan = match self.planner.create_plan(&analysis) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(query, error = %e, "planning failed, degrading to the fallback plan");
                self.planner.fallback_plan(query)
            }
        };
        plan.shortcuts = shortcut_urls(&hits);
        if !plan.shortcuts.is_empty() {
            debug!(shortcuts = plan.shortcuts.len(), "annotated plan with remembered urls");
        }

        let report = self.engine.run(&plan, context).await;
        self.record_outcome(&analysis, &report).await?;
        info!(query, success = report.success, iterations = report.iterations, "query pipeline finished");

        Ok(QueryOutcome {
            success: report.success,
            query: query.to_string(),
            results: report.data,
            error: None,
        })
    }

    /// Remembered pages most similar to the query.
    async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>, MemoryError> {
        let options = SearchOptions {
            limit: self.config.retrieval_limit,
            kind: Some(MemoryKind::WebPage),
            min_score: self.config.retrieval_min_score,
        };
        let hits = self.memory.search(query, &options).await?;
        debug!(hits = hits.len(), "retrieved remembered pages");
        Ok(hits)
    }

    /// Write the query memory; on success, fan out one search-result memory
    /// per returned item.
    async fn record_outcome(&self, analysis: &QueryAnalysis, report: &ExecutionReport) -> Result<(), MemoryError> {
        let items = search_items(&report.data);

        let mut metadata = Map::new();
        metadata.insert("intent".into(), json!(analysis.intent.as_str()));
        metadata.insert("success".into(), json!(report.success));
        metadata.insert("result_count".into(), json!(items.len()));
        self.memory
            .add(NewMemory {
                kind: MemoryKind::Query,
                content: analysis.query.clone(),
                metadata,
                tags: Default::default(),
            })
            .await?;

        if !report.success {
            return Ok(());
        }
        for item in items {
            let mut metadata = Map::new();
            metadata.insert("query".into(), json!(analysis.query));
            if let Some(url) = item.get("url").and_then(Value::as_str) {
                metadata.insert("url".into(), json!(url));
            }
            if let Some(title) = item.get("title").and_then(Value::as_str) {
                metadata.insert("title".into(), json!(title));
            }
            self.memory
                .add(NewMemory {
                    kind: MemoryKind::SearchResult,
                    content: search_result_content(item),
                    metadata,
                    tags: Default::default(),
                })
                .await?;
        }
        Ok(())
    }

    /// Store one captured page as a web-page memory. Thin captures are
    /// skipped, not failed.
    pub async fn remember_page(&self, capture: PageCapture) -> Result<Option<Memory>, MemoryError> {
        if !capture.has_enough_content(self.config.min_content_bytes) {
            debug!(url = %capture.url, "capture too thin to remember");
            return Ok(None);
        }
        let mut metadata = capture.metadata;
        metadata.insert("url".into(), json!(capture.url));
        metadata.insert("title".into(), json!(capture.title));
        if !capture.chunks.is_empty() {
            metadata.insert("chunk_count".into(), json!(capture.chunks.len()));
        }
        let memory = self
            .memory
            .add(NewMemory {
                kind: MemoryKind::WebPage,
                content: capture.content,
                metadata,
                tags: Default::default(),
            })
            .await?;
        Ok(Some(memory))
    }

    /// Rank stored memories against `query`.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>, MemoryError> {
        self.memory.search(query, options).await
    }

    /// Store one memory directly, bypassing the pipeline.
    pub async fn remember(&self, record: NewMemory) -> Result<Memory, MemoryError> {
        self.memory.add(record).await
    }

    /// Run an already-built plan against the injected executor.
    pub async fn run_plan(&self, plan: &Plan, context: &ExecutionContext) -> ExecutionReport {
        self.engine.run(plan, context).await
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }
}

/// Candidate navigation targets from retrieved memories, in rank order.
fn shortcut_urls(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .filter_map(|hit| hit.memory.metadata.get("url"))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Individual search items inside the report payloads. Search steps report an
/// array per attempt; other payload shapes are not items.
fn search_items(data: &[Value]) -> Vec<&Value> {
    data.iter().filter_map(Value::as_array).flatten().collect()
}

/// Text worth embedding for one search item: title and snippet when present,
/// the raw JSON otherwise.
fn search_result_content(item: &Value) -> String {
    let title = item.get("title").and_then(Value::as_str).unwrap_or_default();
    let snippet = item.get("snippet").and_then(Value::as_str).unwrap_or_default();
    let joined = [title, snippet].iter().filter(|s| !s.is_empty()).cloned().collect::<Vec<_>>().join(": ");
    if joined.is_empty() { item.to_string() } else { joined }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::{Arc, Mutex};

    use {
        async_trait::async_trait,
        tidemark_execution::{actions::ActionExecutor, engine::EngineConfig},
        tidemark_memory::{embeddings::EmbeddingProvider, store::InMemoryKvStore},
    };

    use super::*;
    use crate::perception::CapturedChunk;

    const KEYWORDS: [&str; 8] = [
        "fox", "rust", "database", "browser", "search", "network", "cooking", "music",
    ];

    fn keyword_embedding(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect()
    }

    struct MockEmbedder;

    #[async_trait]
    impl EmbeddingProvider for MockEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(keyword_embedding(text))
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }

        fn dimensions(&self) -> usize {
            KEYWORDS.len()
        }

        fn provider_key(&self) -> &str {
            "mock"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("embedder offline")
        }

        fn model_name(&self) -> &str {
            "failing-model"
        }

        fn dimensions(&self) -> usize {
            0
        }

        fn provider_key(&self) -> &str {
            "failing"
        }
    }

    /// Records every action; always succeeds.
    #[derive(Default)]
    struct RecordingActions {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ActionExecutor for RecordingActions {
        async fn execute_search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Value>> {
            self.calls.lock().unwrap().push(format!("search:{query}:{limit}"));
            Ok(vec![
                json!({"title": "Rust Blog", "url": "https://blog.rust-lang.org/", "snippet": "news about rust"}),
                json!({"title": "Docs", "url": "https://docs.rs/", "snippet": "crate documentation"}),
            ])
        }

        async fn execute_navigation(&self, url: &str, _link_text: Option<&str>) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("navigate:{url}"));
            Ok(())
        }

        async fn execute_highlight(&self, _target: Option<&str>, text: &str) -> anyhow::Result<u64> {
            self.calls.lock().unwrap().push(format!("highlight:{text}"));
            Ok(2)
        }
    }

    fn agent_with_embedder(embedder: Box<dyn EmbeddingProvider>) -> (Agent, Arc<Mutex<Vec<String>>>) {
        let memory = MemoryManager::new(Box::new(InMemoryKvStore::new()), embedder);
        let actions = RecordingActions::default();
        let calls = Arc::clone(&actions.calls);
        let engine = ExecutionEngine::new(Box::new(actions), EngineConfig::default());
        (Agent::new(memory, engine, AgentConfig::default()), calls)
    }

    fn agent() -> (Agent, Arc<Mutex<Vec<String>>>) {
        agent_with_embedder(Box::new(MockEmbedder))
    }

    #[tokio::test]
    async fn a_remembered_page_comes_back_for_its_keyword() {
        let (agent, _) = agent();
        let mut metadata = Map::new();
        metadata.insert("url".into(), json!("http://a"));
        agent
            .remember(NewMemory {
                kind: MemoryKind::WebPage,
                content: "The quick brown fox".into(),
                metadata,
                tags: Default::default(),
            })
            .await
            .unwrap();

        let options = SearchOptions {
            kind: Some(MemoryKind::WebPage),
            min_score: 0.0,
            ..Default::default()
        };
        let hits = agent.search("fox", &options).await.unwrap();
        assert_eq!(hits.len(), 1, "exactly the remembered page comes back");
        assert_eq!(hits[0].memory.metadata["url"], json!("http://a"));
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn a_lookup_query_searches_and_records() {
        let (agent, calls) = agent();
        let outcome = agent.process_query("find rust articles", &ExecutionContext::default()).await;

        assert!(outcome.success);
        assert_eq!(outcome.query, "find rust articles");
        assert_eq!(outcome.results.len(), 1, "the basic plan runs a single search step");
        assert_eq!(calls.lock().unwrap().as_slice(), ["search:find rust articles:5"]);

        let stats = agent.memory().stats().await;
        assert_eq!(stats.by_kind["query"], 1);
        assert_eq!(stats.by_kind["search_result"], 2, "one memory per search item");
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_borrows_a_remembered_url() {
        let (agent, calls) = agent();
        let mut metadata = Map::new();
        metadata.insert("url".into(), json!("https://blog.rust-lang.org/"));
        agent
            .remember(NewMemory {
                kind: MemoryKind::WebPage,
                content: "rust release notes and blog posts".into(),
                metadata,
                tags: Default::default(),
            })
            .await
            .unwrap();

        let outcome = agent.process_query("go to the rust blog", &ExecutionContext::default()).await;

        assert!(outcome.success);
        let recorded = calls.lock().unwrap().clone();
        assert_eq!(recorded[0], "search:go to the rust blog:5");
        assert_eq!(recorded[1], "navigate:https://blog.rust-lang.org/");
    }

    #[tokio::test(start_paused = true)]
    async fn planning_failure_degrades_to_the_fallback_plan() {
        let (agent, calls) = agent();
        let context = ExecutionContext {
            current_url: Some("https://example.com/home".into()),
        };
        let outcome = agent.process_query("", &context).await;

        assert!(outcome.success, "the fallback plan still runs to completion");
        let recorded = calls.lock().unwrap().clone();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0], "search::5");
        assert_eq!(recorded[1], "navigate:https://example.com/home");
    }

    #[tokio::test]
    async fn failures_stay_inside_the_agent() {
        let (agent, calls) = agent_with_embedder(Box::new(FailingEmbedder));
        let outcome = agent.process_query("find rust articles", &ExecutionContext::default()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.query, "find rust articles");
        let error = outcome.error.unwrap();
        assert!(error.contains("embedding failed"), "error: {error}");
        assert!(calls.lock().unwrap().is_empty(), "execution never started");
    }

    #[tokio::test(start_paused = true)]
    async fn unfinished_plans_record_no_search_results() {
        let (agent, _) = agent();
        // Navigate intent, but no remembered pages and no current page: the
        // navigation step has no target and retries until the budget is gone.
        let outcome = agent.process_query("go to the rust blog", &ExecutionContext::default()).await;

        assert!(!outcome.success);
        assert!(outcome.error.is_none(), "an unfinished run is not a pipeline error");
        assert_eq!(outcome.results.len(), 1, "the search payload is still delivered");

        let stats = agent.memory().stats().await;
        assert_eq!(stats.by_kind["query"], 1);
        assert!(!stats.by_kind.contains_key("search_result"), "fan-out happens only on success");
    }

    #[tokio::test(start_paused = true)]
    async fn the_query_memory_captures_the_outcome() {
        let (agent, _) = agent();
        agent.process_query("find rust articles", &ExecutionContext::default()).await;

        let options = SearchOptions {
            kind: Some(MemoryKind::Query),
            min_score: 0.0,
            ..Default::default()
        };
        let hits = agent.search("find rust articles", &options).await.unwrap();
        assert_eq!(hits.len(), 1);
        let metadata = &hits[0].memory.metadata;
        assert_eq!(metadata["intent"], json!("lookup"));
        assert_eq!(metadata["success"], json!(true));
        assert_eq!(metadata["result_count"], json!(2));
    }

    #[tokio::test]
    async fn thin_captures_are_skipped() {
        let (agent, _) = agent();
        let capture = PageCapture {
            url: "https://example.com/a".into(),
            title: "Tiny".into(),
            content: "too small".into(),
            chunks: Vec::new(),
            metadata: Map::new(),
        };
        let stored = agent.remember_page(capture).await.unwrap();
        assert!(stored.is_none());
        assert_eq!(agent.memory().stats().await.total, 0);
    }

    #[tokio::test]
    async fn rich_captures_become_web_page_memories() {
        let (agent, _) = agent();
        let capture = PageCapture {
            url: "https://example.com/rustc".into(),
            title: "Compiler notes".into(),
            content: "rust compiler internals ".repeat(8),
            chunks: vec![CapturedChunk {
                text: "rust compiler internals".into(),
                meta: Map::new(),
            }],
            metadata: Map::new(),
        };
        let stored = agent.remember_page(capture).await.unwrap().unwrap();
        assert_eq!(stored.kind, MemoryKind::WebPage);
        assert_eq!(stored.metadata["url"], json!("https://example.com/rustc"));
        assert_eq!(stored.metadata["title"], json!("Compiler notes"));
        assert_eq!(stored.metadata["chunk_count"], json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn prebuilt_plans_run_unchanged() {
        let (agent, calls) = agent();
        let plan = Planner::new().fallback_plan("manual query");
        let context = ExecutionContext {
            current_url: Some("https://example.com/x".into()),
        };
        let report = agent.run_plan(&plan, &context).await;

        assert!(report.success);
        assert_eq!(report.results.len(), 2);
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(agent.memory().stats().await.total, 0, "run_plan writes no memories");
    }
}
