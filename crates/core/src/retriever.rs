use crate::embeddings::EmbeddingService;
use crate::error::SearchError;
use crate::models::{DistanceMetric, ScopeFilter, SearchResult};
use crate::traits::{ChunkReranker, ChunkStore, LexicalScorer};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Default result count when the caller passes zero.
    pub top_k: usize,
    /// At most this many results are handed to the reranker.
    pub rerank_top_k: usize,
    /// Weight of the dense score in hybrid fusion; the lexical score gets
    /// the complement. Tunable, deliberately nothing fancier than a
    /// weighted sum.
    pub fusion_weight: f32,
    /// Candidates below this dense similarity are dropped before fusion.
    pub similarity_threshold: Option<f32>,
    /// Must match the metric the vectors were stored under.
    pub metric: DistanceMetric,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 50,
            rerank_top_k: 10,
            fusion_weight: 0.7,
            similarity_threshold: None,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Multi-stage relevance search: dense nearest-neighbour lookup, optional
/// lexical fusion, optional reranking of the shortlist.
pub struct HybridRetriever<S, L, R>
where
    S: ChunkStore,
    L: LexicalScorer,
    R: ChunkReranker,
{
    store: S,
    lexical: L,
    reranker: R,
    embeddings: Arc<EmbeddingService>,
    config: RetrieverConfig,
}

impl<S, L, R> HybridRetriever<S, L, R>
where
    S: ChunkStore + Send + Sync,
    L: LexicalScorer + Send + Sync,
    R: ChunkReranker + Send + Sync,
{
    pub fn new(
        store: S,
        lexical: L,
        reranker: R,
        embeddings: Arc<EmbeddingService>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            store,
            lexical,
            reranker,
            embeddings,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs a query against the stored chunks. A query that embeds to the
    /// all-zero fallback vector degrades to zero similarity everywhere
    /// (usually an empty result set under a threshold), never an error.
    pub async fn search(
        &self,
        query: &str,
        scope: &ScopeFilter,
        top_k: usize,
        use_hybrid: bool,
        use_reranker: bool,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let top_k = if top_k == 0 { self.config.top_k } else { top_k };

        let response = self
            .embeddings
            .embed(&[query.to_string()], None, None)
            .await
            .map_err(|error| SearchError::Embedding(error.to_string()))?;
        if response.is_degraded() {
            warn!("query embedding degraded to the zero-vector fallback");
        }
        let query_vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("no query vector returned".to_string()))?;

        let nearest = self
            .store
            .query_nearest(&query_vector, scope, top_k, self.config.metric)
            .await?;

        // Distance-to-similarity conversion for a normalized metric space.
        let mut scored: Vec<(f32, SearchResult)> = nearest
            .into_iter()
            .map(|hit| {
                let similarity = 1.0 - hit.distance;
                let result = SearchResult {
                    chunk_id: hit.chunk.chunk_id.clone(),
                    document_id: hit.chunk.document_id.clone(),
                    score: similarity,
                    text: hit.chunk.text.clone(),
                    metadata: hit.chunk.metadata_snapshot(),
                };
                (similarity, result)
            })
            .collect();

        if let Some(threshold) = self.config.similarity_threshold {
            scored.retain(|(similarity, _)| *similarity >= threshold);
        }

        if use_hybrid && !scored.is_empty() {
            let texts: Vec<String> = scored
                .iter()
                .map(|(_, result)| result.text.clone())
                .collect();
            let lexical_scores = self.lexical.score(query, &texts).await?;
            let weight = self.config.fusion_weight;
            for ((dense, result), lexical) in scored.iter_mut().zip(lexical_scores) {
                result.score = weight * *dense + (1.0 - weight) * lexical;
            }
        }

        let mut results: Vec<SearchResult> =
            scored.into_iter().map(|(_, result)| result).collect();
        results.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.chunk_id.cmp(&right.chunk_id))
        });
        results.truncate(top_k);

        if use_reranker && !results.is_empty() {
            let head = self.config.rerank_top_k.min(results.len());
            match self.reranker.rerank(query, &results[..head]).await {
                Ok(reranked) => {
                    let tail = results.split_off(head);
                    results = reranked;
                    results.extend(tail);
                }
                Err(error) => {
                    // Reranking is best-effort; the fused order stands.
                    warn!(%error, "reranker failed, keeping fused order");
                }
            }
        }

        debug!(
            query_len = query.len(),
            returned = results.len(),
            use_hybrid,
            use_reranker,
            "search complete"
        );

        Ok(results)
    }
}
