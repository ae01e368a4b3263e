/// Gemini embeddings provider using the `models/{model}:embedContent` endpoint.
use {
    async_trait::async_trait,
    reqwest::StatusCode,
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
};

use crate::embeddings::{EmbedError, EmbeddingProvider};

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: secrecy::Secret<String>,
    base_url: String,
    model: String,
    dims: usize,
    provider_key: String,
}

fn compute_provider_key(base_url: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"gemini:");
    hasher.update(base_url.as_bytes());
    hasher.update(b":");
    hasher.update(model.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

impl GeminiEmbeddingProvider {
    pub fn new(api_key: String) -> Self {
        let base_url = DEFAULT_BASE_URL.trim_end_matches('/').to_string();
        let model = "gemini-embedding-001".to_string();
        let provider_key = compute_provider_key(&base_url, &model);
        Self {
            client: reqwest::Client::new(),
            api_key: secrecy::Secret::new(api_key),
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

    fn embed_content_endpoint(&self) -> String {
        format!("{}/v1/models/{}:embedContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
struct EmbedContentRequest {
    content: Content,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(EmbedError::MissingCredential { provider: PROVIDER }.into());
        }

        let req = EmbedContentRequest {
            content: Content {
                parts: vec![Part { text: text.to_string() }],
            },
        };

        let resp = self
            .client
            .post(self.embed_content_endpoint())
            .query(&[("key", self.api_key.expose_secret().as_str())])
            .json(&req)
            .send()
            .await
            .map_err(|e| EmbedError::Http {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbedError::RateLimited { provider: PROVIDER }.into());
        }
        if !resp.status().is_success() {
            return Err(EmbedError::Http {
                provider: PROVIDER,
                message: format!("status {}", resp.status()),
            }
            .into());
        }

        let body: EmbedContentResponse = resp.json().await.map_err(|e| EmbedError::InvalidResponse {
            provider: PROVIDER,
            message: e.to_string(),
        })?;
        if body.embedding.values.len() != self.dims {
            return Err(EmbedError::InvalidResponse {
                provider: PROVIDER,
                message: format!("expected {} dimensions, got {}", self.dims, body.embedding.values.len()),
            }
            .into());
        }
        Ok(body.embedding.values)
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
        9_000
    }
}
