use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_search_core::{
    chunk_text_from, discover_supported_files, document_id_for_path, extract_text, ChunkingConfig,
    DocumentProcessor, DocumentRecord, DocumentStatus, EmbeddingModelConfig, EmbeddingService,
    HybridRetriever, MemoryStore, ProcessorConfig, ProviderKind, RetrieverConfig, ScopeFilter,
    TermOverlapReranker, TermOverlapScorer,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector dimension for the local embedding model.
    #[arg(long, default_value = "128")]
    dimensions: usize,

    /// OpenAI-compatible endpoint for remote embeddings.
    #[arg(long)]
    remote_base_url: Option<String>,

    /// Remote embedding model; when set it becomes the default provider.
    #[arg(long)]
    remote_model: Option<String>,

    /// API key for the remote endpoint.
    #[arg(long, env = "EMBEDDINGS_API_KEY")]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a single document and print the resulting segments.
    Chunk {
        /// Path to a .pdf or .txt file.
        #[arg(long)]
        file: String,
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
        #[arg(long, default_value = "200")]
        chunk_overlap: usize,
    },
    /// Ingest a folder into the in-process store and run a query.
    Search {
        /// Folder containing .pdf and .txt files, searched recursively.
        #[arg(long)]
        folder: String,
        /// Search query.
        #[arg(long)]
        query: String,
        /// Number of results to return.
        #[arg(long, default_value = "10")]
        top_k: usize,
        /// Disable the lexical leg of hybrid scoring.
        #[arg(long, default_value_t = false)]
        no_hybrid: bool,
        /// Disable shortlist reranking.
        #[arg(long, default_value_t = false)]
        no_rerank: bool,
        /// Drop candidates below this dense similarity.
        #[arg(long)]
        threshold: Option<f32>,
        /// Owner identity used to scope the search.
        #[arg(long, default_value = "local")]
        owner: String,
    },
}

fn build_embeddings(cli: &Cli) -> anyhow::Result<Arc<EmbeddingService>> {
    let mut service = EmbeddingService::new();

    let mut local = EmbeddingModelConfig::new("ngram-hash", ProviderKind::Local);
    local.dimensions = Some(cli.dimensions);
    service
        .register(local)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    if let Some(model) = &cli.remote_model {
        let mut remote = EmbeddingModelConfig::new(model.clone(), ProviderKind::Remote);
        remote.base_url = cli.remote_base_url.clone();
        remote.api_key = cli.api_key.clone();
        service
            .register(remote)
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;
        service
            .set_default_model(model)
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    }

    Ok(Arc::new(service))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "doc-search boot"
    );

    match &cli.command {
        Command::Chunk {
            file,
            chunk_size,
            chunk_overlap,
        } => {
            let config = ChunkingConfig {
                chunk_size: *chunk_size,
                chunk_overlap: *chunk_overlap,
                ..ChunkingConfig::default()
            };
            let path = Path::new(file);
            let document_id = document_id_for_path(path);
            let pages =
                extract_text(path).map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let mut cursor = 0usize;
            for page in pages {
                let chunks = chunk_text_from(&page.text, &document_id, &config, None, cursor, page.number)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                cursor = chunks.last().map(|c| c.chunk_index + 1).unwrap_or(cursor);
                for chunk in &chunks {
                    let preview: String = chunk.text.chars().take(80).collect();
                    println!(
                        "chunk={} page={} section={} len={}",
                        chunk.chunk_index,
                        chunk
                            .page_number
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "-".into()),
                        chunk.section.as_deref().unwrap_or("-"),
                        chunk.text.len()
                    );
                    println!("  {preview}");
                }
            }
            println!("{cursor} chunks");
        }
        Command::Search {
            folder,
            query,
            top_k,
            no_hybrid,
            no_rerank,
            threshold,
            owner,
        } => {
            let embeddings = build_embeddings(&cli)?;
            let store = Arc::new(MemoryStore::new());
            let processor = DocumentProcessor::new(
                store.clone(),
                embeddings.clone(),
                ProcessorConfig::default(),
            );

            let files = discover_supported_files(Path::new(folder));
            if files.is_empty() {
                anyhow::bail!("no supported files found in {folder}");
            }

            let mut failed = 0usize;
            for path in &files {
                let document_id = document_id_for_path(path);
                let title = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string_lossy().to_string());
                store
                    .insert_document(DocumentRecord::new(
                        document_id.clone(),
                        owner.clone(),
                        title,
                        path.to_string_lossy(),
                    ))
                    .await;

                let outcome = processor
                    .process_document(&document_id, path)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

                if outcome.status == DocumentStatus::Failed {
                    failed += 1;
                    warn!(
                        path = %path.display(),
                        reason = outcome.error.as_deref().unwrap_or("unknown"),
                        "skipped document"
                    );
                }
            }
            info!(
                documents = files.len(),
                failed,
                chunks = store.chunk_count().await,
                "ingestion complete"
            );

            let retriever = HybridRetriever::new(
                store.clone(),
                TermOverlapScorer,
                TermOverlapReranker,
                embeddings,
                RetrieverConfig {
                    similarity_threshold: *threshold,
                    ..RetrieverConfig::default()
                },
            );

            let results = retriever
                .search(
                    query,
                    &ScopeFilter::for_owner(owner.clone()),
                    *top_k,
                    !no_hybrid,
                    !no_rerank,
                )
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("query: {query}");
            if results.is_empty() {
                println!("no matches");
            }
            for hit in results {
                println!(
                    "score={:.4} chunk={} document_id={}",
                    hit.score, hit.chunk_id, hit.document_id
                );
                if let Some(section) = hit.metadata.get("section").and_then(|v| v.as_str()) {
                    println!("  section={section}");
                }
                println!("  {}", hit.text);
            }
        }
    }

    Ok(())
}
