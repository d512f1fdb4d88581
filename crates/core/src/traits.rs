use crate::error::SearchError;
use crate::models::{
    DistanceMetric, DocumentRecord, DocumentStatus, NearestChunk, ScopeFilter, SearchResult,
    TextChunk,
};
use async_trait::async_trait;

/// Persistence collaborator: rows of chunks with vectors, plus the owning
/// document records. The core consumes this; it never owns storage layout.
#[async_trait]
pub trait ChunkStore {
    async fn get_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, SearchError>;

    /// Persists one batch of chunks with their vectors. Each call is an
    /// independent checkpoint, not part of a document-wide transaction.
    async fn insert_chunks(&self, chunks: &[(TextChunk, Vec<f32>)]) -> Result<(), SearchError>;

    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<(), SearchError>;

    /// Nearest stored chunks to `vector` under `metric`, restricted to the
    /// caller's scope, ordered by ascending distance.
    async fn query_nearest(
        &self,
        vector: &[f32],
        scope: &ScopeFilter,
        limit: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<NearestChunk>, SearchError>;

    /// Highest chunk_index already persisted for a document, if any. Lets
    /// a re-submitted document resume at (document_id, chunk_index) instead
    /// of re-embedding everything.
    async fn max_chunk_index(&self, document_id: &str) -> Result<Option<usize>, SearchError>;
}

#[async_trait]
impl<T: ChunkStore + Send + Sync> ChunkStore for std::sync::Arc<T> {
    async fn get_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, SearchError> {
        self.as_ref().get_document(document_id).await
    }

    async fn insert_chunks(&self, chunks: &[(TextChunk, Vec<f32>)]) -> Result<(), SearchError> {
        self.as_ref().insert_chunks(chunks).await
    }

    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<(), SearchError> {
        self.as_ref()
            .update_document_status(document_id, status, error)
            .await
    }

    async fn query_nearest(
        &self,
        vector: &[f32],
        scope: &ScopeFilter,
        limit: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<NearestChunk>, SearchError> {
        self.as_ref()
            .query_nearest(vector, scope, limit, metric)
            .await
    }

    async fn max_chunk_index(&self, document_id: &str) -> Result<Option<usize>, SearchError> {
        self.as_ref().max_chunk_index(document_id).await
    }
}

/// Sparse/lexical leg of hybrid search. The scoring formula lives behind
/// this seam; the retriever only fuses the numbers.
#[async_trait]
pub trait LexicalScorer {
    /// One score per candidate text, higher is better, in candidate order.
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, SearchError>;
}

/// Second-pass reranking collaborator. May reorder the shortlist using a
/// more expensive relevance signal.
#[async_trait]
pub trait ChunkReranker {
    async fn rerank(
        &self,
        query: &str,
        shortlist: &[SearchResult],
    ) -> Result<Vec<SearchResult>, SearchError>;
}
