use crate::chunking::{chunk_text_from, ChunkingConfig};
use crate::embeddings::EmbeddingService;
use crate::error::{EmbedError, IngestError, SearchError};
use crate::extract::{extract_text, is_supported_file};
use crate::models::{DocumentStatus, TextChunk};
use crate::traits::ChunkStore;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Stored error messages are truncated to keep status rows bounded.
const MAX_ERROR_LEN: usize = 500;

const DEFAULT_COMMIT_BATCH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
    pub chunking: ChunkingConfig,
    /// Embedding model to use; the service default when unset.
    pub embed_model: Option<String>,
    /// Chunks embedded and committed per checkpoint.
    pub embed_batch_size: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub document_id: String,
    pub status: DocumentStatus,
    pub chunks_persisted: usize,
    /// Chunks skipped because the store already held their indexes
    /// (resume after a partial run).
    pub chunks_skipped: usize,
    /// Chunks whose embeddings fell back to zero vectors.
    pub degraded_embeddings: usize,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error("store error: {0}")]
    Store(#[from] SearchError),
}

/// Drives one document through extract → chunk → embed → persist. Each
/// embedding batch is committed as its own checkpoint; a crash mid-document
/// leaves a resumable partial state keyed by (document_id, chunk_index).
pub struct DocumentProcessor<S: ChunkStore> {
    store: Arc<S>,
    embeddings: Arc<EmbeddingService>,
    config: ProcessorConfig,
}

impl<S: ChunkStore + Send + Sync> DocumentProcessor<S> {
    pub fn new(store: Arc<S>, embeddings: Arc<EmbeddingService>, config: ProcessorConfig) -> Self {
        Self {
            store,
            embeddings,
            config,
        }
    }

    /// Processes one document. Document-level failure is recorded on the
    /// status row and reported in the outcome; it is not propagated as an
    /// error and there is no automatic retry here. The `Err` case is
    /// reserved for the store itself failing to record status.
    pub async fn process_document(
        &self,
        document_id: &str,
        path: &Path,
    ) -> Result<ProcessingOutcome, SearchError> {
        self.store
            .update_document_status(document_id, DocumentStatus::Processing, None)
            .await?;

        match self.run_pipeline(document_id, path).await {
            Ok((persisted, skipped, degraded)) => {
                self.store
                    .update_document_status(document_id, DocumentStatus::Processed, None)
                    .await?;
                info!(
                    document_id,
                    chunks = persisted,
                    skipped,
                    degraded,
                    "document processed"
                );
                Ok(ProcessingOutcome {
                    document_id: document_id.to_string(),
                    status: DocumentStatus::Processed,
                    chunks_persisted: persisted,
                    chunks_skipped: skipped,
                    degraded_embeddings: degraded,
                    error: None,
                })
            }
            Err(error) => {
                let message = truncate_error(&error.to_string());
                warn!(document_id, error = %message, "document processing failed");
                self.store
                    .update_document_status(
                        document_id,
                        DocumentStatus::Failed,
                        Some(message.clone()),
                    )
                    .await?;
                Ok(ProcessingOutcome {
                    document_id: document_id.to_string(),
                    status: DocumentStatus::Failed,
                    chunks_persisted: 0,
                    chunks_skipped: 0,
                    degraded_embeddings: 0,
                    error: Some(message),
                })
            }
        }
    }

    async fn run_pipeline(
        &self,
        document_id: &str,
        path: &Path,
    ) -> Result<(usize, usize, usize), PipelineError> {
        let pages = extract_text(path)?;
        let resume_from = self.store.max_chunk_index(document_id).await?;

        let mut chunks: Vec<TextChunk> = Vec::new();
        let mut cursor = 0usize;
        for page in pages {
            let page_chunks = chunk_text_from(
                &page.text,
                document_id,
                &self.config.chunking,
                None,
                cursor,
                page.number,
            )?;
            cursor = page_chunks
                .last()
                .map(|chunk| chunk.chunk_index + 1)
                .unwrap_or(cursor);
            chunks.extend(page_chunks);
        }

        let total = chunks.len();
        let pending: Vec<TextChunk> = match resume_from {
            Some(max_index) => chunks
                .into_iter()
                .filter(|chunk| chunk.chunk_index > max_index)
                .collect(),
            None => chunks,
        };
        let skipped = total - pending.len();
        if skipped > 0 {
            info!(document_id, skipped, "resuming past already persisted chunks");
        }

        let batch_size = self.config.embed_batch_size.unwrap_or(DEFAULT_COMMIT_BATCH);
        let mut persisted = 0usize;
        let mut degraded = 0usize;

        for batch in pending.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let response = self
                .embeddings
                .embed(&texts, self.config.embed_model.as_deref(), Some(batch_size))
                .await?;
            degraded += response.metadata.degraded_indices.len();

            let rows: Vec<(TextChunk, Vec<f32>)> = batch
                .iter()
                .cloned()
                .zip(response.embeddings)
                .collect();
            self.store.insert_chunks(&rows).await?;
            persisted += rows.len();
        }

        Ok((persisted, skipped, degraded))
    }
}

fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// Deterministic document id derived from the source path.
pub fn document_id_for_path(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Recursively lists the supported source files under a folder, sorted for
/// reproducible ingestion order.
pub fn discover_supported_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_supported_file(entry.path()))
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort_unstable();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingModelConfig, ProviderKind};
    use crate::models::DocumentRecord;
    use crate::stores::MemoryStore;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn embeddings() -> Arc<EmbeddingService> {
        let mut service = EmbeddingService::new();
        let mut config = EmbeddingModelConfig::new("ngram-hash", ProviderKind::Local);
        config.dimensions = Some(16);
        service.register(config).unwrap();
        Arc::new(service)
    }

    fn processor(store: Arc<MemoryStore>) -> DocumentProcessor<MemoryStore> {
        DocumentProcessor::new(
            store,
            embeddings(),
            ProcessorConfig {
                chunking: ChunkingConfig {
                    detect_language: false,
                    ..ChunkingConfig::default()
                },
                ..ProcessorConfig::default()
            },
        )
    }

    async fn registered(store: &MemoryStore, document_id: &str, path: &Path) {
        store
            .insert_document(DocumentRecord::new(
                document_id,
                "user-1",
                "Test",
                path.to_string_lossy(),
            ))
            .await;
    }

    #[tokio::test]
    async fn text_file_ends_up_processed_with_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("sample.txt");
        let mut file = File::create(&path)?;
        writeln!(file, "First paragraph with enough words to matter.")?;
        writeln!(file)?;
        writeln!(file, "Second paragraph keeps the chunker honest.")?;

        let store = Arc::new(MemoryStore::new());
        registered(&store, "doc-1", &path).await;

        let outcome = processor(store.clone())
            .process_document("doc-1", &path)
            .await?;

        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert!(outcome.chunks_persisted > 0);
        assert_eq!(outcome.chunks_persisted, store.chunk_count().await);
        assert_eq!(outcome.error, None);

        let record = store.get_document("doc-1").await?.unwrap();
        assert_eq!(record.status, DocumentStatus::Processed);
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_type_fails_the_document_without_persisting() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let path = dir.path().join("slides.pptx");
        fs::write(&path, b"not supported")?;

        let store = Arc::new(MemoryStore::new());
        registered(&store, "doc-1", &path).await;

        let outcome = processor(store.clone())
            .process_document("doc-1", &path)
            .await?;

        assert_eq!(outcome.status, DocumentStatus::Failed);
        assert!(outcome.error.as_deref().unwrap().contains("unsupported"));
        assert_eq!(store.chunk_count().await, 0);

        let record = store.get_document("doc-1").await?.unwrap();
        assert_eq!(record.status, DocumentStatus::Failed);
        assert!(record.error_message.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn reprocessing_skips_already_persisted_chunks() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let path = dir.path().join("sample.txt");
        fs::write(
            &path,
            "A reasonably long paragraph of text that will produce at least one chunk.",
        )?;

        let store = Arc::new(MemoryStore::new());
        registered(&store, "doc-1", &path).await;
        let processor = processor(store.clone());

        let first = processor.process_document("doc-1", &path).await?;
        assert!(first.chunks_persisted > 0);
        assert_eq!(first.chunks_skipped, 0);

        let second = processor.process_document("doc-1", &path).await?;
        assert_eq!(second.chunks_persisted, 0);
        assert_eq!(second.chunks_skipped, first.chunks_persisted);
        assert_eq!(store.chunk_count().await, first.chunks_persisted);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_document_id_surfaces_a_store_error() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let path = dir.path().join("sample.txt");
        fs::write(&path, "text")?;

        let store = Arc::new(MemoryStore::new());
        let result = processor(store).process_document("missing", &path).await;
        assert!(matches!(result, Err(SearchError::Store { .. })));
        Ok(())
    }

    #[test]
    fn long_error_messages_are_truncated() {
        let long = "x".repeat(2_000);
        assert_eq!(truncate_error(&long).len(), MAX_ERROR_LEN);
        assert_eq!(truncate_error("short"), "short");
    }

    #[test]
    fn discovery_finds_supported_files_recursively() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("a.txt"), b"text")?;
        fs::write(nested.join("b.pdf"), b"%PDF-1.4")?;
        fs::write(nested.join("c.docx"), b"nope")?;

        let files = discover_supported_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| is_supported_file(p)));
        Ok(())
    }

    #[test]
    fn document_ids_are_stable_per_path() {
        let a = document_id_for_path(Path::new("/tmp/report.pdf"));
        let b = document_id_for_path(Path::new("/tmp/report.pdf"));
        let c = document_id_for_path(Path::new("/tmp/other.pdf"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
