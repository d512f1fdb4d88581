use crate::error::SearchError;
use crate::models::{
    DistanceMetric, DocumentRecord, DocumentStatus, NearestChunk, ScopeFilter, TextChunk,
};
use crate::similarity::{euclidean_distance, top_k_similar};
use crate::traits::ChunkStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process [`ChunkStore`] used by the CLI and tests. Chunk rows and
/// their vectors live in a `RwLock`ed table; nearest-neighbour queries run
/// over the scoped subset with the similarity primitives.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, DocumentRecord>,
    chunks: Vec<StoredChunk>,
}

struct StoredChunk {
    chunk: TextChunk,
    vector: Vec<f32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document row. Document lifecycle is owned by the caller;
    /// this is the entry point the surrounding app uses before processing.
    pub async fn insert_document(&self, record: DocumentRecord) {
        let mut inner = self.inner.write().await;
        inner
            .documents
            .insert(record.document_id.clone(), record);
    }

    pub async fn chunk_count(&self) -> usize {
        self.inner.read().await.chunks.len()
    }

    pub async fn document_count(&self) -> usize {
        self.inner.read().await.documents.len()
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn get_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, SearchError> {
        let inner = self.inner.read().await;
        Ok(inner.documents.get(document_id).cloned())
    }

    async fn insert_chunks(&self, chunks: &[(TextChunk, Vec<f32>)]) -> Result<(), SearchError> {
        let mut inner = self.inner.write().await;
        for (chunk, vector) in chunks {
            let mut chunk = chunk.clone();
            chunk.embedding = Some(vector.clone());
            inner.chunks.push(StoredChunk {
                chunk,
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<(), SearchError> {
        let mut inner = self.inner.write().await;
        match inner.documents.get_mut(document_id) {
            Some(record) => {
                record.status = status;
                record.error_message = error;
                record.updated_at = Utc::now();
                Ok(())
            }
            None => Err(SearchError::Store {
                backend: "memory".to_string(),
                details: format!("unknown document: {document_id}"),
            }),
        }
    }

    async fn query_nearest(
        &self,
        vector: &[f32],
        scope: &ScopeFilter,
        limit: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<NearestChunk>, SearchError> {
        let inner = self.inner.read().await;

        let in_scope: Vec<&StoredChunk> = inner
            .chunks
            .iter()
            .filter(|stored| {
                scope.permits_document(&stored.chunk.document_id)
                    && inner
                        .documents
                        .get(&stored.chunk.document_id)
                        .is_some_and(|record| record.owner_id == scope.owner_id)
            })
            .collect();

        let hits = match metric {
            DistanceMetric::Cosine => {
                let corpus: Vec<Vec<f32>> =
                    in_scope.iter().map(|stored| stored.vector.clone()).collect();
                top_k_similar(vector, &corpus, limit)
                    .into_iter()
                    .map(|(index, similarity)| NearestChunk {
                        chunk: in_scope[index].chunk.clone(),
                        distance: 1.0 - similarity,
                    })
                    .collect()
            }
            DistanceMetric::L2 => {
                let mut scored: Vec<NearestChunk> = in_scope
                    .iter()
                    .map(|stored| NearestChunk {
                        chunk: stored.chunk.clone(),
                        distance: euclidean_distance(vector, &stored.vector),
                    })
                    .collect();
                scored.sort_by(|left, right| left.distance.total_cmp(&right.distance));
                scored.truncate(limit);
                scored
            }
        };

        Ok(hits)
    }

    async fn max_chunk_index(&self, document_id: &str) -> Result<Option<usize>, SearchError> {
        let inner = self.inner.read().await;
        Ok(inner
            .chunks
            .iter()
            .filter(|stored| stored.chunk.document_id == document_id)
            .map(|stored| stored.chunk.chunk_index)
            .max())
    }
}
