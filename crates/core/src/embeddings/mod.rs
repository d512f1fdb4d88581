pub mod local;
pub mod remote;
pub mod retry;
pub mod service;

pub use local::{HashEmbeddingProvider, DEFAULT_LOCAL_DIMENSIONS};
pub use remote::{infer_dimension, RemoteApiProvider, DEFAULT_REMOTE_DIMENSIONS};
pub use retry::RetryPolicy;
pub use service::{EmbedMetadata, EmbeddingResponse, EmbeddingService};

use crate::error::EmbedError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Network-backed provider speaking an OpenAI-compatible wire format.
    Remote,
    /// In-process model, loaded once at construction.
    Local,
}

/// Configuration for one embedding model. Immutable once the service has
/// been configured with it.
#[derive(Debug, Clone)]
pub struct EmbeddingModelConfig {
    pub name: String,
    pub kind: ProviderKind,
    /// Declared vector dimension; when unset, remote providers infer it
    /// from the model name and local providers use their own default.
    pub dimensions: Option<usize>,
    pub batch_size: usize,
    pub max_retries: usize,
    pub timeout: Duration,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Provider-specific parameters merged into remote request bodies.
    pub extra_params: Map<String, Value>,
}

impl EmbeddingModelConfig {
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            dimensions: None,
            batch_size: 32,
            max_retries: 3,
            timeout: Duration::from_secs(30),
            api_key: None,
            base_url: None,
            extra_params: Map::new(),
        }
    }
}

/// Capability set every embedding backend implements. `embed_texts` MUST
/// return vectors in the same order as the input batch; all downstream
/// zip-by-position logic depends on it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn dimension(&self) -> usize;

    fn config(&self) -> &EmbeddingModelConfig;

    fn kind(&self) -> ProviderKind {
        self.config().kind
    }

    fn model_name(&self) -> &str {
        &self.config().name
    }

    /// Releases held resources. Providers without external resources keep
    /// the default no-op.
    async fn close(&self) {}
}
