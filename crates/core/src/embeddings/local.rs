use crate::embeddings::{EmbeddingModelConfig, EmbeddingProvider};
use crate::error::EmbedError;
use async_trait::async_trait;

pub const DEFAULT_LOCAL_DIMENSIONS: usize = 128;

/// In-process character-ngram model. The "model" is built once when the
/// provider is constructed; embedding is a direct invocation with no I/O,
/// and the output dimension is read from the model itself.
#[derive(Debug, Clone)]
struct NgramHashModel {
    dimensions: usize,
}

impl NgramHashModel {
    fn load(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn output_dimension(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

/// Local-inference embedding provider backed by [`NgramHashModel`].
/// Deterministic and dependency-free, which also makes it the test and CLI
/// default.
pub struct HashEmbeddingProvider {
    config: EmbeddingModelConfig,
    model: NgramHashModel,
}

impl HashEmbeddingProvider {
    pub fn new(config: EmbeddingModelConfig) -> Self {
        let model = NgramHashModel::load(config.dimensions.unwrap_or(DEFAULT_LOCAL_DIMENSIONS));
        Self { config, model }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.model.embed(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.model.output_dimension()
    }

    fn config(&self) -> &EmbeddingModelConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::ProviderKind;

    fn provider(dimensions: Option<usize>) -> HashEmbeddingProvider {
        let mut config = EmbeddingModelConfig::new("ngram-hash", ProviderKind::Local);
        config.dimensions = dimensions;
        HashEmbeddingProvider::new(config)
    }

    #[tokio::test]
    async fn embedder_is_deterministic() {
        let provider = provider(None);
        let texts = vec!["Hydraulic pressure and flow".to_string()];
        let first = provider.embed_texts(&texts).await.unwrap();
        let second = provider.embed_texts(&texts).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn output_length_matches_declared_dimension() {
        let provider = provider(Some(32));
        assert_eq!(provider.dimension(), 32);
        let vectors = provider
            .embed_texts(&["abc".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0].len(), 32);
    }

    #[tokio::test]
    async fn batch_order_matches_input_order() {
        let provider = provider(None);
        let texts = vec![
            "first text".to_string(),
            "second text".to_string(),
            "third text".to_string(),
        ];
        let batch = provider.embed_texts(&texts).await.unwrap();
        assert_eq!(batch.len(), 3);
        for (text, vector) in texts.iter().zip(batch.iter()) {
            let single = provider.embed_texts(&[text.clone()]).await.unwrap();
            assert_eq!(&single[0], vector);
        }
    }

    #[tokio::test]
    async fn embeddings_are_unit_length() {
        let provider = provider(None);
        let vectors = provider
            .embed_texts(&["some meaningful text".to_string()])
            .await
            .unwrap();
        let magnitude: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }
}
