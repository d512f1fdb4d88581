use crate::embeddings::{
    EmbeddingModelConfig, EmbeddingProvider, HashEmbeddingProvider, ProviderKind,
    RemoteApiProvider, RetryPolicy,
};
use crate::error::EmbedError;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// How many times a failing batch may be halved before the remaining texts
/// fall back to zero vectors.
const MAX_BATCH_HALVINGS: usize = 3;

/// Per-call bookkeeping returned alongside the vectors. `degraded_indices`
/// is how callers detect which inputs received the zero-vector fallback;
/// the vectors themselves are indistinguishable from legitimately zero
/// embeddings by design.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbedMetadata {
    pub provider: Option<ProviderKind>,
    pub batch_size: usize,
    pub num_batches: usize,
    /// Input positions that fell back to zero vectors after retries and
    /// batch-size degradation were exhausted.
    pub degraded_indices: Vec<usize>,
    /// Inputs that were empty or whitespace-only and were zero-filled
    /// without calling the provider.
    pub empty_inputs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingResponse {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub dimensions: usize,
    /// Whitespace-token count over all inputs; a rough accounting figure,
    /// not a tokenizer-accurate one.
    pub total_token_estimate: usize,
    pub metadata: EmbedMetadata,
}

impl EmbeddingResponse {
    fn empty() -> Self {
        Self {
            embeddings: Vec::new(),
            model: String::new(),
            dimensions: 0,
            total_token_estimate: 0,
            metadata: EmbedMetadata::default(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.metadata.degraded_indices.is_empty()
    }
}

/// Registry of embedding providers plus the batching/retry/fallback logic
/// around them. Configure it fully (register + default) before sharing it;
/// registration takes `&mut self`, so configuration happens-before any
/// embedding call once the service is behind an `Arc`.
pub struct EmbeddingService {
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
    default_model: Option<String>,
    retry: RetryPolicy,
    /// End-to-end budget for one `embed` call across all batches and
    /// retries. Once spent, remaining batches degrade to zero vectors
    /// instead of waiting out further backoff.
    operation_deadline: Option<std::time::Duration>,
}

impl Default for EmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService {
    pub fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::default())
    }

    pub fn with_retry_policy(retry: RetryPolicy) -> Self {
        Self {
            providers: HashMap::new(),
            default_model: None,
            retry,
            operation_deadline: None,
        }
    }

    pub fn set_operation_deadline(&mut self, deadline: Option<std::time::Duration>) {
        self.operation_deadline = deadline;
    }

    /// Builds and registers a provider from its model config. The first
    /// registered model becomes the default until one is set explicitly.
    pub fn register(&mut self, config: EmbeddingModelConfig) -> Result<(), EmbedError> {
        let provider: Arc<dyn EmbeddingProvider> = match config.kind {
            ProviderKind::Remote => Arc::new(RemoteApiProvider::new(config)?),
            ProviderKind::Local => Arc::new(HashEmbeddingProvider::new(config)),
        };
        self.register_provider(provider);
        Ok(())
    }

    /// Registers an already constructed provider (used by tests and custom
    /// backends).
    pub fn register_provider(&mut self, provider: Arc<dyn EmbeddingProvider>) {
        let name = provider.model_name().to_string();
        if self.default_model.is_none() {
            self.default_model = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    pub fn set_default_model(&mut self, name: &str) -> Result<(), EmbedError> {
        if !self.providers.contains_key(name) {
            return Err(EmbedError::UnknownModel(name.to_string()));
        }
        self.default_model = Some(name.to_string());
        Ok(())
    }

    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    pub fn dimension(&self, model: Option<&str>) -> Result<usize, EmbedError> {
        Ok(self.resolve(model)?.dimension())
    }

    fn resolve(&self, model: Option<&str>) -> Result<Arc<dyn EmbeddingProvider>, EmbedError> {
        let name = match model {
            Some(name) => name,
            None => self
                .default_model
                .as_deref()
                .ok_or(EmbedError::NoDefaultProvider)?,
        };
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| EmbedError::UnknownModel(name.to_string()))
    }

    /// Embeds `texts`, returning exactly one vector per input in input
    /// order. Provider failures are retried with backoff, then the batch is
    /// halved, and finally the remaining texts receive zero vectors; the
    /// call itself only fails for configuration errors. Empty inputs are
    /// zero-filled in place without touching the provider.
    pub async fn embed(
        &self,
        texts: &[String],
        model: Option<&str>,
        batch_size: Option<usize>,
    ) -> Result<EmbeddingResponse, EmbedError> {
        if texts.is_empty() {
            return Ok(EmbeddingResponse::empty());
        }

        let provider = self.resolve(model)?;
        let batch_size = batch_size.unwrap_or(provider.config().batch_size).max(1);
        let dimension = provider.dimension();

        let mut embeddings: Vec<Vec<f32>> = vec![vec![0.0; dimension]; texts.len()];
        let mut degraded: Vec<usize> = Vec::new();
        let mut empty_inputs = 0usize;

        let workable: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter_map(|(position, text)| {
                if text.trim().is_empty() {
                    empty_inputs += 1;
                    None
                } else {
                    Some(position)
                }
            })
            .collect();

        let batches: Vec<Vec<usize>> = workable
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let num_batches = batches.len();
        let mut dimension_warned = false;
        let started = std::time::Instant::now();

        for positions in batches {
            let mut queue: VecDeque<(Vec<usize>, usize)> = VecDeque::new();
            queue.push_back((positions, 0));

            while let Some((positions, halvings)) = queue.pop_front() {
                if let Some(deadline) = self.operation_deadline {
                    if started.elapsed() >= deadline {
                        warn!(
                            model = provider.model_name(),
                            texts = positions.len(),
                            "operation deadline exceeded, substituting zero vectors"
                        );
                        degraded.extend(positions);
                        continue;
                    }
                }

                let batch_texts: Vec<String> =
                    positions.iter().map(|p| texts[*p].clone()).collect();

                match self.call_with_retry(provider.as_ref(), &batch_texts).await {
                    Ok(vectors) => {
                        if !dimension_warned {
                            if let Some(first) = vectors.first() {
                                if first.len() != dimension {
                                    warn!(
                                        model = provider.model_name(),
                                        expected = dimension,
                                        got = first.len(),
                                        "embedding dimension mismatch"
                                    );
                                    dimension_warned = true;
                                }
                            }
                        }
                        for (position, vector) in positions.iter().zip(vectors) {
                            embeddings[*position] = vector;
                        }
                    }
                    Err(error) if error.is_configuration() => return Err(error),
                    Err(error) => {
                        if positions.len() > 1 && halvings < MAX_BATCH_HALVINGS {
                            warn!(
                                model = provider.model_name(),
                                batch = positions.len(),
                                %error,
                                "batch failed after retries, halving batch size"
                            );
                            let mid = positions.len() / 2;
                            let (left, right) = positions.split_at(mid);
                            queue.push_front((right.to_vec(), halvings + 1));
                            queue.push_front((left.to_vec(), halvings + 1));
                        } else {
                            warn!(
                                model = provider.model_name(),
                                texts = positions.len(),
                                %error,
                                "embedding failed, substituting zero vectors"
                            );
                            degraded.extend(positions);
                        }
                    }
                }
            }
        }

        degraded.sort_unstable();

        Ok(EmbeddingResponse {
            embeddings,
            model: provider.model_name().to_string(),
            dimensions: dimension,
            total_token_estimate: texts
                .iter()
                .map(|text| text.split_whitespace().count())
                .sum(),
            metadata: EmbedMetadata {
                provider: Some(provider.kind()),
                batch_size,
                num_batches,
                degraded_indices: degraded,
                empty_inputs,
            },
        })
    }

    async fn call_with_retry(
        &self,
        provider: &dyn EmbeddingProvider,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        // The tighter of the service policy and the model config wins.
        let max_attempts = self
            .retry
            .max_attempts
            .min(provider.config().max_retries)
            .max(1);
        let mut attempt = 0usize;

        loop {
            let result = provider.embed_texts(texts).await.and_then(|vectors| {
                if vectors.len() == texts.len() {
                    Ok(vectors)
                } else {
                    Err(EmbedError::Provider {
                        provider: provider.model_name().to_string(),
                        details: format!(
                            "returned {} vectors for {} texts",
                            vectors.len(),
                            texts.len()
                        ),
                    })
                }
            });

            match result {
                Ok(vectors) => return Ok(vectors),
                Err(error) if error.is_configuration() => return Err(error),
                Err(error) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(error);
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    debug!(
                        model = provider.model_name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "provider call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Releases every provider's resources.
    pub async fn close(&self) {
        for provider in self.providers.values() {
            provider.close().await;
        }
    }
}
