//! Command-line interface.

pub mod workflow;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets, Cell, ContentArrangement, Table};

use crate::adapters::completion::{OpenAiCompletionModel, ScriptedCompletionModel};
use crate::adapters::embeddings::{DeterministicEmbeddingProvider, OpenAiEmbeddingProvider};
use crate::adapters::retry::RetryPolicy;
use crate::adapters::tools::{CsvExportTool, CsvLoadTool, SqlQueryTool};
use crate::adapters::vector::{MemoryVectorStore, SqliteVectorStore};
use crate::application::{AgentExecutor, ProcessOrchestrator};
use crate::domain::models::{CollectionConfig, EngineConfig, VectorProvider};
use crate::domain::ports::{CompletionModel, EmbeddingProvider, Tool, VectorStore};
use crate::infrastructure::ConfigLoader;
use crate::services::assembler::ContextAssembler;
use crate::services::chunker::{Chunker, ChunkingConfig};
use crate::services::ingest::IngestionPipeline;
use crate::services::retrieval::RetrievalEngine;
use workflow::WorkflowFile;

#[derive(Parser)]
#[command(
    name = "weaver",
    about = "Knowledge-augmented multi-agent task orchestration",
    version
)]
pub struct Cli {
    /// Configuration file (defaults to weaver.yaml plus WEAVER_* env vars)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use offline deterministic collaborators instead of the API
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest knowledge files into a collection
    Ingest {
        /// Source files (.txt, .md, .pdf)
        paths: Vec<PathBuf>,

        /// Collection name override
        #[arg(long)]
        collection: Option<String>,
    },

    /// Retrieve the most similar chunks for a query
    Query {
        query: String,

        /// Number of chunks to return
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,

        /// Collection name override
        #[arg(long)]
        collection: Option<String>,
    },

    /// Execute a workflow file
    Run {
        /// Workflow YAML declaring agents and tasks
        workflow: PathBuf,

        /// User identity recorded with the run
        #[arg(long, default_value = "cli")]
        user: String,
    },
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    match cli.command {
        Command::Ingest { paths, collection } => ingest(&config, cli.offline, &paths, collection).await,
        Command::Query { query, top_k, collection } => {
            run_query(&config, cli.offline, &query, top_k, collection).await
        }
        Command::Run { workflow, user } => run_workflow(&config, cli.offline, &workflow, &user).await,
    }
}

async fn ingest(
    config: &EngineConfig,
    offline: bool,
    paths: &[PathBuf],
    collection: Option<String>,
) -> Result<()> {
    if paths.is_empty() {
        bail!("no input files given");
    }
    let collection = resolve_collection(config, collection)?;
    let store = build_store(config).await?;
    let embedder = build_embedder(config, offline)?;

    let pipeline = IngestionPipeline::new(
        build_chunker(config)?,
        embedder,
        store,
        RetryPolicy::from(&config.retry),
    );
    let report = pipeline.load_knowledge(paths, &collection).await?;

    let mut table = list_table(&["file", "chunks", "embedded", "skipped"]);
    for (path, ingest) in &report.ingested {
        table.add_row(vec![
            Cell::new(path),
            Cell::new(ingest.chunks_total),
            Cell::new(ingest.chunks_embedded),
            Cell::new(ingest.chunks_skipped),
        ]);
    }
    println!("{table}");

    for failure in &report.failed {
        eprintln!("warning: {failure}");
    }
    if report.ingested.is_empty() && !report.failed.is_empty() {
        bail!("all input files failed to ingest");
    }
    Ok(())
}

async fn run_query(
    config: &EngineConfig,
    offline: bool,
    query: &str,
    top_k: usize,
    collection: Option<String>,
) -> Result<()> {
    let collection = resolve_collection(config, collection)?;
    let store = build_store(config).await?;
    let embedder = build_embedder(config, offline)?;

    let engine = RetrievalEngine::new(embedder, store);
    let result = engine.retrieve(query, &collection, top_k).await?;

    if result.is_empty() {
        println!("No matching chunks in '{}'.", collection.collection_name);
        return Ok(());
    }

    let mut table = list_table(&["score", "source", "chunk", "text"]);
    for hit in &result.hits {
        table.add_row(vec![
            Cell::new(format!("{:.3}", hit.score)),
            Cell::new(&hit.chunk.document_id[..hit.chunk.document_id.len().min(12)]),
            Cell::new(hit.chunk.sequence_index),
            Cell::new(excerpt(&hit.chunk.text, 80)),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn run_workflow(config: &EngineConfig, offline: bool, path: &PathBuf, user: &str) -> Result<()> {
    let file = WorkflowFile::load(path)?;
    let scope = resolve_collection(config, None)?;

    let sql_tool: Arc<dyn Tool> = Arc::new(
        SqlQueryTool::open(".weaver/tools.db")
            .await
            .context("failed to open the tool database")?,
    );
    let csv_load: Arc<dyn Tool> = Arc::new(CsvLoadTool::new("."));
    let csv_export: Arc<dyn Tool> = Arc::new(CsvExportTool::new("."));
    let (agents, tasks, mode) = file.resolve(&scope, |name| match name {
        "sql_query" => Some(sql_tool.clone()),
        "csv_load" => Some(csv_load.clone()),
        "csv_export" => Some(csv_export.clone()),
        _ => None,
    })?;

    let store = build_store(config).await?;
    let embedder = build_embedder(config, offline)?;
    let model = build_completion(config, offline)?;

    // Ingest declared knowledge before any task starts.
    let pipeline = IngestionPipeline::new(
        build_chunker(config)?,
        embedder.clone(),
        store.clone(),
        RetryPolicy::from(&config.retry),
    );
    for agent in &agents {
        if agent.knowledge.is_empty() {
            continue;
        }
        let report = pipeline.load_knowledge(&agent.knowledge, &scope).await?;
        for failure in &report.failed {
            eprintln!("warning: {failure}");
        }
    }

    let executor = AgentExecutor::new(
        model,
        Arc::new(RetrievalEngine::new(embedder, store)),
        ContextAssembler::new(config.completion.context_budget_chars),
        RetryPolicy::from(&config.retry),
        Duration::from_secs(config.call_timeout_secs),
    );
    let orchestrator = ProcessOrchestrator::new(
        Arc::new(executor),
        config.max_concurrency,
        Duration::from_secs(config.run_timeout_secs),
    );

    let outcome = orchestrator.run(agents, tasks, mode, user).await?;

    let mut table = list_table(&["task", "status", "output"]);
    for result in &outcome.results {
        let summary = match &result.error {
            Some(error) => excerpt(error, 80),
            None => excerpt(&result.output_text, 80),
        };
        table.add_row(vec![
            Cell::new(result.task_id),
            Cell::new(result.status.as_str()),
            Cell::new(summary),
        ]);
    }
    println!("{table}");

    if let Some(cause) = &outcome.cancel_cause {
        eprintln!("run canceled: {cause}");
    }
    if !outcome.all_completed() {
        bail!("run finished with failed or skipped tasks");
    }
    Ok(())
}

fn resolve_collection(config: &EngineConfig, name_override: Option<String>) -> Result<CollectionConfig> {
    let provider = VectorProvider::parse(&config.knowledge.provider)?;
    let name = name_override.unwrap_or_else(|| config.knowledge.collection_name.clone());
    Ok(CollectionConfig::new(provider, name, config.knowledge.path.clone()))
}

fn build_chunker(config: &EngineConfig) -> Result<Chunker> {
    Chunker::with_config(ChunkingConfig {
        chunk_size: config.knowledge.chunk_size,
        chunk_overlap: config.knowledge.chunk_overlap,
        respect_boundaries: true,
    })
    .map_err(|e| anyhow::anyhow!("invalid chunking config: {e}"))
}

async fn build_store(config: &EngineConfig) -> Result<Arc<dyn VectorStore>> {
    match VectorProvider::parse(&config.knowledge.provider)? {
        VectorProvider::Memory => Ok(Arc::new(MemoryVectorStore::new())),
        VectorProvider::Sqlite => {
            if let Some(parent) = std::path::Path::new(&config.knowledge.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Ok(Arc::new(SqliteVectorStore::open(&config.knowledge.path).await?))
        }
    }
}

fn build_embedder(config: &EngineConfig, offline: bool) -> Result<Arc<dyn EmbeddingProvider>> {
    if offline {
        return Ok(Arc::new(DeterministicEmbeddingProvider::new(config.embedding.dimension)));
    }
    Ok(Arc::new(OpenAiEmbeddingProvider::from_env(
        config.embedding.clone(),
        config.call_timeout_secs,
    )?))
}

fn build_completion(config: &EngineConfig, offline: bool) -> Result<Arc<dyn CompletionModel>> {
    if offline {
        return Ok(Arc::new(ScriptedCompletionModel::always_answers(
            "offline mode: no completion collaborator configured",
        )));
    }
    Ok(Arc::new(OpenAiCompletionModel::from_env(
        config.completion.clone(),
        config.call_timeout_secs,
    )?))
}

/// Borderless list table, matching the rest of the CLI output.
fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h.to_uppercase())));
    table
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.len() <= max_chars {
        return flat;
    }
    let mut cut = max_chars;
    while cut > 0 && !flat.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &flat[..cut])
}
