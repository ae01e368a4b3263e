/// Ollama embeddings provider for a local server. No credential required.
use {
    async_trait::async_trait,
    reqwest::StatusCode,
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
    tracing::debug,
};

use crate::embeddings::{EmbedError, EmbeddingProvider};

const PROVIDER: &str = "ollama";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    provider_key: String,
}

fn compute_provider_key(base_url: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"ollama:");
    hasher.update(base_url.as_bytes());
    hasher.update(b":");
    hasher.update(model.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

impl OllamaEmbeddingProvider {
    pub fn new() -> Self {
        let base_url = DEFAULT_BASE_URL.to_string();
        let model = "nomic-embed-text".to_string();
        let provider_key = compute_provider_key(&base_url, &model);
        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
            dims: 768,
            provider_key,
        }
    }

    pub fn with_model(mut self, model: String, dims: usize) -> Self {
        self.model = model;
        self.dims = dims;
        self.provider_key = compute_provider_key(&self.base_url, &self.model);
        self
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self.provider_key = compute_provider_key(&self.base_url, &self.model);
        self
    }

    /// Pre-0.3 servers only expose `/api/embeddings` with one prompt per call.
    async fn embed_batch_legacy(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let req = LegacyEmbedRequest {
                model: self.model.clone(),
                prompt: text.clone(),
            };
            let resp = self
                .client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&req)
                .send()
                .await
                .map_err(|e| EmbedError::Http {
                    provider: PROVIDER,
                    message: e.to_string(),
                })?;
            if !resp.status().is_success() {
                return Err(EmbedError::Http {
                    provider: PROVIDER,
                    message: format!("status {}", resp.status()),
                }
                .into());
            }
            let body: LegacyEmbedResponse = resp.json().await.map_err(|e| EmbedError::InvalidResponse {
                provider: PROVIDER,
                message: e.to_string(),
            })?;
            vectors.push(body.embedding);
        }
        Ok(vectors)
    }
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct LegacyEmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct LegacyEmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()]).await?.pop().ok_or_else(|| {
            EmbedError::InvalidResponse {
                provider: PROVIDER,
                message: "empty embedding response".into(),
            }
            .into()
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let req = EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };
        let resp = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(|e| EmbedError::Http {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(model = %self.model, "no /api/embed endpoint, using legacy /api/embeddings");
            return self.embed_batch_legacy(texts).await;
        }
        if !resp.status().is_success() {
            return Err(EmbedError::Http {
                provider: PROVIDER,
                message: format!("status {}", resp.status()),
            }
            .into());
        }

        let body: EmbedResponse = resp.json().await.map_err(|e| EmbedError::InvalidResponse {
            provider: PROVIDER,
            message: e.to_string(),
        })?;
        Ok(body.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_key(&self) -> &str {
        &self.provider_key
    }

    fn max_input_bytes(&self) -> usize {
        16_000
    }
}
