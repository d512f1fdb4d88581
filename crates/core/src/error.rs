use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("no default embedding provider configured and no model specified")]
    NoDefaultProvider,

    #[error("no provider registered for model: {0}")]
    UnknownModel(String),

    #[error("invalid provider config: {0}")]
    InvalidConfig(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("provider {provider} failed: {details}")]
    Provider { provider: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbedError {
    /// Configuration problems are surfaced immediately and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EmbedError::NoDefaultProvider
                | EmbedError::UnknownModel(_)
                | EmbedError::InvalidConfig(_)
                | EmbedError::Url(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("invalid response from {backend}: {details}")]
    Store { backend: String, details: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("search request failed: {0}")]
    Request(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
