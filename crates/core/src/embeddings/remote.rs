use crate::embeddings::{EmbeddingModelConfig, EmbeddingProvider};
use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_REMOTE_DIMENSIONS: usize = 1_536;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Known model-name prefixes and their vector dimensions.
const DIMENSION_RULES: &[(&str, usize)] = &[
    ("text-embedding-3-large", 3_072),
    ("text-embedding-3-small", 1_536),
    ("text-embedding-ada", 1_536),
    ("text-embedding", 1_536),
];

/// Dimension for a model name by longest-prefix match against the known
/// naming rules, with a fixed fallback when nothing matches.
pub fn infer_dimension(model: &str) -> usize {
    let lowered = model.to_lowercase();
    DIMENSION_RULES
        .iter()
        .filter(|(prefix, _)| lowered.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, dimensions)| *dimensions)
        .unwrap_or(DEFAULT_REMOTE_DIMENSIONS)
}

/// Embedding provider speaking the OpenAI-compatible `POST /embeddings`
/// wire format over HTTP.
pub struct RemoteApiProvider {
    config: EmbeddingModelConfig,
    client: Client,
    endpoint: String,
    dimensions: usize,
}

impl RemoteApiProvider {
    pub fn new(config: EmbeddingModelConfig) -> Result<Self, EmbedError> {
        if config.name.trim().is_empty() {
            return Err(EmbedError::InvalidConfig(
                "remote provider requires a model name".to_string(),
            ));
        }

        let base = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base)?;
        let endpoint = format!("{}/embeddings", base.trim_end_matches('/'));

        let client = Client::builder().timeout(config.timeout).build()?;
        let dimensions = config
            .dimensions
            .unwrap_or_else(|| infer_dimension(&config.name));

        Ok(Self {
            config,
            client,
            endpoint,
            dimensions,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsPayload {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for RemoteApiProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = json!({
            "model": self.config.name,
            "input": texts,
        });
        if let Value::Object(map) = &mut body {
            for (key, value) in &self.config.extra_params {
                map.insert(key.clone(), value.clone());
            }
        }

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(EmbedError::Provider {
                provider: self.config.name.clone(),
                details: format!("{status}: {details}"),
            });
        }

        let mut payload: EmbeddingsPayload = response.json().await?;
        // The API may return entries out of order; the index field restores
        // input order.
        payload.data.sort_by_key(|entry| entry.index);

        if payload.data.len() != texts.len() {
            return Err(EmbedError::Provider {
                provider: self.config.name.clone(),
                details: format!(
                    "returned {} embeddings for {} inputs",
                    payload.data.len(),
                    texts.len()
                ),
            });
        }

        Ok(payload.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn config(&self) -> &EmbeddingModelConfig {
        &self.config
    }
}
