use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A bounded contiguous excerpt of a document's text with positional and
/// semantic metadata. Created in bulk by the chunker; immutable afterwards
/// except for the later attachment of an embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_id: String,
    pub document_id: String,
    /// Zero-based, unique, and strictly increasing within a document,
    /// including across page boundaries.
    pub chunk_index: usize,
    pub text: String,
    pub page_number: Option<u32>,
    /// Nearest preceding heading, when heading splitting is enabled.
    pub section: Option<String>,
    /// Detected language tag (e.g. "eng"); unset when detection fails.
    pub language: Option<String>,
    pub metadata: Map<String, Value>,
    pub embedding: Option<Vec<f32>>,
}

impl TextChunk {
    /// Metadata snapshot carried on search results: the free-form map plus
    /// the structured fields callers usually want alongside the text.
    pub fn metadata_snapshot(&self) -> Map<String, Value> {
        let mut snapshot = self.metadata.clone();
        snapshot.insert("chunk_index".into(), Value::from(self.chunk_index));
        if let Some(page) = self.page_number {
            snapshot.insert("page_number".into(), Value::from(page));
        }
        if let Some(section) = &self.section {
            snapshot.insert("section".into(), Value::from(section.clone()));
        }
        if let Some(language) = &self.language {
            snapshot.insert("language".into(), Value::from(language.clone()));
        }
        snapshot
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    /// Processed and failed are terminal; resubmission is an external
    /// decision, never an automatic retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Processed | DocumentStatus::Failed)
    }
}

/// Document row as seen by the core. The core consumes its identifier and
/// raw text and signals completion through status updates; it does not own
/// the document lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub owner_id: String,
    pub title: String,
    pub source_path: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(
        document_id: impl Into<String>,
        owner_id: impl Into<String>,
        title: impl Into<String>,
        source_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            document_id: document_id.into(),
            owner_id: owner_id.into(),
            title: title.into(),
            source_path: source_path.into(),
            status: DocumentStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Caller-permitted search scope: owner identity plus an optional
/// document-id allowlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub owner_id: String,
    pub document_ids: Option<Vec<String>>,
}

impl ScopeFilter {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            document_ids: None,
        }
    }

    pub fn permits_document(&self, document_id: &str) -> bool {
        match &self.document_ids {
            Some(ids) => ids.iter().any(|id| id == document_id),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    L2,
}

/// A chunk returned from the store's nearest-neighbour query together with
/// its distance under the query metric.
#[derive(Debug, Clone)]
pub struct NearestChunk {
    pub chunk: TextChunk,
    pub distance: f32,
}

/// Transient per-query result; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub document_id: String,
    /// Relevance, higher is better.
    pub score: f32,
    pub text: String,
    pub metadata: Map<String, Value>,
}
