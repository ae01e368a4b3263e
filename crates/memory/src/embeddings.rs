/// Embedding provider abstraction and the sticky multi-provider fallback chain.
use std::sync::atomic::{AtomicUsize, Ordering};

use {
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use crate::{
    chunker::{self, ChunkPolicy},
    config::EmbeddingSettings,
    embeddings_gemini::GeminiEmbeddingProvider,
    embeddings_ollama::OllamaEmbeddingProvider,
    embeddings_openai::OpenAiEmbeddingProvider,
};

/// Text to fixed-dimension vector. Each implementation adapts one backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Stable fingerprint of backend, base URL, and model. Vectors from
    /// different provider keys are not comparable.
    fn provider_key(&self) -> &str;

    /// Request-size threshold above which input is chunked and mean-pooled.
    fn max_input_bytes(&self) -> usize {
        8 * 1024
    }
}

/// Typed embedding failures. These travel through `anyhow::Error` at the
/// trait boundary and stay downcastable for callers that need to tell them
/// apart.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The provider needs a credential and none was configured. Fatal for
    /// that provider only; the chain falls through to the next one.
    #[error("{provider}: missing api credential")]
    MissingCredential { provider: &'static str },

    #[error("{provider}: rate limited")]
    RateLimited { provider: &'static str },

    #[error("{provider}: http failure: {message}")]
    Http { provider: &'static str, message: String },

    #[error("{provider}: unexpected response: {message}")]
    InvalidResponse { provider: &'static str, message: String },

    /// Every provider in the fallback chain failed for one call.
    #[error("all embedding providers failed: {detail}")]
    AllProvidersFailed { detail: String },
}

/// Default provider order when settings do not promote one.
const DEFAULT_PRIORITY: [&str; 3] = ["openai", "gemini", "ollama"];

/// Tries providers in priority order. The first success becomes sticky: later
/// calls start at that provider and never re-probe the ones before it.
pub struct FallbackEmbedder {
    providers: Vec<Box<dyn EmbeddingProvider>>,
    active: AtomicUsize,
}

impl FallbackEmbedder {
    pub fn new(providers: Vec<Box<dyn EmbeddingProvider>>) -> Self {
        Self {
            providers,
            active: AtomicUsize::new(0),
        }
    }

    /// Build the chain from persisted settings: the configured provider goes
    /// first with its credential and model, the remaining defaults follow.
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        let mut order: Vec<&str> = Vec::with_capacity(DEFAULT_PRIORITY.len());
        if DEFAULT_PRIORITY.contains(&settings.provider.as_str()) {
            order.push(settings.provider.as_str());
        } else {
            warn!(provider = %settings.provider, "unknown embedding provider in settings, using defaults");
        }
        for name in DEFAULT_PRIORITY {
            if !order.contains(&name) {
                order.push(name);
            }
        }
        let providers = order
            .into_iter()
            .map(|name| build_provider(name, settings, name == settings.provider))
            .collect();
        Self::new(providers)
    }

    /// Index of the provider currently answering calls.
    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Embed through one provider, chunking and mean-pooling when the text
    /// exceeds its request-size threshold.
    async fn embed_with(provider: &dyn EmbeddingProvider, text: &str) -> anyhow::Result<Vec<f32>> {
        if text.len() <= provider.max_input_bytes() {
            return provider.embed(text).await;
        }
        let policy = ChunkPolicy::for_limit(provider.max_input_bytes());
        let chunks = chunker::split_sentences(text, policy, None);
        debug!(
            chunks = chunks.len(),
            bytes = text.len(),
            model = provider.model_name(),
            "chunking oversized embedding input"
        );
        let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
        let vectors = provider.embed_batch(&texts).await?;
        if vectors.is_empty() {
            anyhow::bail!("provider returned no vectors for chunked input");
        }
        Ok(chunker::mean_pool(&vectors))
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let start = self.active.load(Ordering::Relaxed);
        let mut failures = Vec::new();
        for (index, provider) in self.providers.iter().enumerate().skip(start) {
            match Self::embed_with(provider.as_ref(), text).await {
                Ok(vector) => {
                    if index != start {
                        info!(model = provider.model_name(), "embedding provider switched");
                    }
                    self.active.store(index, Ordering::Relaxed);
                    return Ok(vector);
                }
                Err(e) => {
                    warn!(model = provider.model_name(), error = %e, "embedding provider failed, falling through");
                    failures.push(format!("{}: {e}", provider.model_name()));
                }
            }
        }
        let detail = if failures.is_empty() {
            "no providers configured".to_string()
        } else {
            failures.join("; ")
        };
        Err(EmbedError::AllProvidersFailed { detail }.into())
    }

    fn model_name(&self) -> &str {
        self.providers.get(self.active_index()).map_or("unconfigured", |p| p.model_name())
    }

    fn dimensions(&self) -> usize {
        self.providers.get(self.active_index()).map_or(0, |p| p.dimensions())
    }

    fn provider_key(&self) -> &str {
        self.providers.get(self.active_index()).map_or("unconfigured", |p| p.provider_key())
    }

    fn max_input_bytes(&self) -> usize {
        self.providers.get(self.active_index()).map_or(8 * 1024, |p| p.max_input_bytes())
    }
}

fn build_provider(name: &str, settings: &EmbeddingSettings, configured: bool) -> Box<dyn EmbeddingProvider> {
    let api_key = if configured {
        settings.api_key.clone().unwrap_or_default()
    } else {
        String::new()
    };
    match name {
        "gemini" => {
            let mut provider = GeminiEmbeddingProvider::new(api_key);
            if configured && let Some(model) = &settings.model {
                provider = provider.with_model(model.clone(), settings.dimensions.unwrap_or(768));
            }
            Box::new(provider)
        }
        "ollama" => {
            let mut provider = OllamaEmbeddingProvider::new();
            if configured && let Some(model) = &settings.model {
                provider = provider.with_model(model.clone(), settings.dimensions.unwrap_or(768));
            }
            Box::new(provider)
        }
        _ => {
            let mut provider = OpenAiEmbeddingProvider::new(api_key);
            if configured && let Some(model) = &settings.model {
                provider = provider.with_model(model.clone(), settings.dimensions.unwrap_or(1536));
            }
            Box::new(provider)
        }
    }
}
