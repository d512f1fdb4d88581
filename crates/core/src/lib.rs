pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod lexical;
pub mod models;
pub mod normalize;
pub mod processor;
pub mod retriever;
pub mod similarity;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_text, chunk_text_from, ChunkingConfig};
pub use embeddings::{
    EmbedMetadata, EmbeddingModelConfig, EmbeddingProvider, EmbeddingResponse, EmbeddingService,
    HashEmbeddingProvider, ProviderKind, RemoteApiProvider, RetryPolicy,
};
pub use error::{EmbedError, IngestError, SearchError};
pub use extract::{
    extract_text, is_supported_file, PageText, PdfExtractor, PlainTextExtractor, TextExtractor,
};
pub use lexical::{TermOverlapReranker, TermOverlapScorer};
pub use models::{
    DistanceMetric, DocumentRecord, DocumentStatus, NearestChunk, ScopeFilter, SearchResult,
    TextChunk,
};
pub use normalize::normalize_text;
pub use processor::{
    discover_supported_files, document_id_for_path, DocumentProcessor, ProcessingOutcome,
    ProcessorConfig,
};
pub use retriever::{HybridRetriever, RetrieverConfig};
pub use similarity::{cosine_similarity, euclidean_distance, top_k_similar};
pub use stores::MemoryStore;
pub use traits::{ChunkReranker, ChunkStore, LexicalScorer};
