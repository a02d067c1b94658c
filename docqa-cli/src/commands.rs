use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use docqa_rag::{
    AppConfig, DocumentLoader, EmbeddingMode, LocalModel, OpenRouterCompletionProvider,
    OpenRouterEmbeddingProvider, RagEngine, SqliteVectorStore, VectorIndex, WordWindowChunker,
    write_chunks_json,
};
use tracing::{info, warn};

/// Open the index and wire providers according to `config`.
pub async fn build_engine(config: &AppConfig) -> anyhow::Result<RagEngine> {
    let store = SqliteVectorStore::open(&config.index_path)
        .await
        .with_context(|| format!("failed to open index at {}", config.index_path.display()))?;

    let dimensions = config.rag.embedding_dimensions;
    let local = LocalModel::load_from(&config.local_model, dimensions, &config.model_dir);
    let mut index = VectorIndex::new(Arc::new(store), &config.rag, local);

    let mut builder = RagEngine::builder()
        .config(config.rag.clone())
        .persona(config.persona.clone())
        .remote_configured(config.providers.is_configured());

    if config.providers.is_configured() {
        let embeddings = OpenRouterEmbeddingProvider::new(&config.providers, dimensions)
            .context("failed to configure remote embeddings")?;
        index = index.with_remote(Arc::new(embeddings));

        let completion = OpenRouterCompletionProvider::new(&config.providers)
            .context("failed to configure remote completions")?;
        builder = builder.completion_provider(Arc::new(completion));
    } else {
        info!("no remote credential configured, answers use the built-in summary");
    }

    let index = Arc::new(index);
    index.ensure_collection().await.context("failed to prepare index collection")?;

    Ok(builder.index(index).build()?)
}

pub async fn ingest(
    engine: &RagEngine,
    config: &AppConfig,
    dir: &Path,
    rebuild: bool,
    remote: bool,
    dump: Option<&Path>,
) -> anyhow::Result<()> {
    let existing = engine.index().stats().await?.total_chunks;
    if existing > 0 && !rebuild {
        bail!("index already holds {existing} chunks; pass --rebuild to replace them");
    }

    let chunker =
        Arc::new(WordWindowChunker::new(config.rag.chunk_size, config.rag.chunk_overlap));
    let loader = DocumentLoader::new(dir, chunker);
    let (chunks, report) = RagEngine::load_documents(&loader)
        .with_context(|| format!("failed to load documents from {}", dir.display()))?;

    if let Some(path) = dump {
        write_chunks_json(&chunks, path)
            .with_context(|| format!("failed to write chunks to {}", path.display()))?;
    }

    let mode = if remote {
        warn!("questions are embedded locally; remote document embeddings may rank poorly");
        EmbeddingMode::PreferRemote
    } else {
        EmbeddingMode::Local
    };

    let summary = if rebuild {
        engine.rebuild_from_chunks(&chunks, report, mode).await
    } else {
        engine.ingest_chunks(&chunks, report, mode).await
    }
    .with_context(|| format!("ingestion from {} failed", dir.display()))?;

    for file in &summary.report.files {
        println!("{:>5} chunks  {:>4} pages  {}", file.chunks, file.pages, file.file);
    }
    for file in &summary.report.skipped {
        println!("    skipped          {file}");
    }
    println!("Indexed {} chunks from {} documents.", summary.stored, summary.report.files.len());
    Ok(())
}

pub async fn ask(engine: &RagEngine, question: &str, json: bool) -> anyhow::Result<()> {
    let result = engine.answer(question).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}\n", result.answer);
    if !result.sources.is_empty() {
        println!("Sources:");
        for source in &result.sources {
            println!("  - {source}");
        }
    }
    if !result.links.is_empty() {
        println!("Links:");
        for link in &result.links {
            println!("  - {link}");
        }
    }
    println!("Confidence: {:.3} ({} passages)", result.confidence, result.retrieved_docs_count);
    Ok(())
}

pub async fn status(engine: &RagEngine, json: bool) -> anyhow::Result<()> {
    let status = engine.status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Vector store:     {}", status.vector_store_status);
    println!("Chunks:           {}", status.total_documents);
    let approx = if status.sources_exact { "" } else { " (sampled, may undercount)" };
    println!("Source files:     {}{approx}", status.unique_sources);
    for file in &status.source_files {
        println!("  - {file}");
    }
    let degraded = if status.embedding_degraded { " (degraded: zero vectors)" } else { "" };
    println!("Embedding model:  {}{degraded}", status.embedding_method);
    let remote = if status.remote_configured { "configured" } else { "not configured" };
    println!("Remote provider:  {remote}");
    let answers = if status.completion_configured { "enabled" } else { "fallback summary" };
    println!("LLM answers:      {answers}");
    Ok(())
}

pub async fn clear(engine: &RagEngine) -> anyhow::Result<()> {
    engine.index().clear().await.context("failed to clear index")?;
    println!("Index cleared.");
    Ok(())
}
