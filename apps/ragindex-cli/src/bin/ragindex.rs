//! ragindex command-line front end.
//!
//! ```bash
//! ragindex chunk                      # raw *.txt -> data/processed/chunks*.jsonl
//! ragindex build                      # chunks.jsonl -> data/index
//! ragindex query "who founded CMU" --mode hybrid -k 5
//! ragindex prompt "who founded CMU"   # render the generator prompt
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragindex_core::config::{Config, Settings};
use ragindex_core::corpus::{average_chars, read_chunks, write_chunks};
use ragindex_core::data_processor::DataProcessor;
use ragindex_core::types::{ChunkStrategy, RetrievedChunk, SearchMode};
use ragindex_embed::get_default_embedder;
use ragindex_hybrid::{build_generation, build_prompt, FusionRanker, IndexStore, RetrievalService};

/// Hybrid BM25 + dense passage retrieval.
#[derive(Parser)]
#[command(name = "ragindex", version, about)]
struct Cli {
    /// Configuration file (default: ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split raw documents into chunk files, one per strategy
    Chunk {
        /// Directory of raw *.txt documents
        #[arg(long)]
        raw_dir: Option<PathBuf>,
    },
    /// Build and save a new index generation from a chunk file
    Build {
        /// Chunk file (default: <chunks_dir>/chunks.jsonl)
        #[arg(long)]
        chunks: Option<PathBuf>,
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
    /// Retrieve the top chunks for a query
    Query {
        #[command(flatten)]
        search: SearchArgs,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the generator prompt for a query
    Prompt {
        #[command(flatten)]
        search: SearchArgs,
    },
}

#[derive(Args)]
struct SearchArgs {
    query: String,
    /// lexical, dense or hybrid
    #[arg(short, long)]
    mode: Option<SearchMode>,
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
    #[arg(long)]
    index_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let settings = config.settings()?;

    match cli.command {
        Command::Chunk { raw_dir } => chunk(&settings, raw_dir),
        Command::Build { chunks, index_dir } => build(&settings, chunks, index_dir).await,
        Command::Query { search, json } => {
            let results = run_search(&settings, &search).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
            Ok(())
        }
        Command::Prompt { search } => {
            let results = run_search(&settings, &search).await?;
            println!("{}", build_prompt(&search.query, &results, settings.retrieval.context_chars));
            Ok(())
        }
    }
}

fn chunk(settings: &Settings, raw_dir: Option<PathBuf>) -> Result<()> {
    let raw_dir = raw_dir.unwrap_or_else(|| settings.data.raw_dir());
    let out_dir = settings.data.chunks_dir();
    let processor = DataProcessor::new(settings.chunking.clone())?;
    let docs = processor.load_documents(&raw_dir)?;
    for strategy in ChunkStrategy::ALL {
        let chunks = processor.chunk_documents(&docs, strategy);
        let path = out_dir.join(format!("chunks_{strategy}.jsonl"));
        write_chunks(&path, &chunks)?;
        info!("{strategy}: {} chunks, avg {} chars -> {}", chunks.len(), average_chars(&chunks), path.display());
        if strategy == settings.chunking.strategy {
            write_chunks(&settings.data.chunks_file(), &chunks)?;
        }
    }
    info!("Indexing corpus uses the {} strategy: {}", settings.chunking.strategy, settings.data.chunks_file().display());
    Ok(())
}

async fn build(settings: &Settings, chunks: Option<PathBuf>, index_dir: Option<PathBuf>) -> Result<()> {
    let chunks_path = chunks.unwrap_or_else(|| settings.data.chunks_file());
    let chunks = read_chunks(&chunks_path)?;
    info!("Loaded {} chunks from {}", chunks.len(), chunks_path.display());
    let embedder = get_default_embedder(&settings.embedding)?;
    let store = IndexStore::new(index_dir.unwrap_or_else(|| settings.data.index_dir()));
    let manifest = build_generation(&store, &chunks, embedder.as_ref(), settings.embedding.batch_size).await?;
    println!("Built generation {} ({} chunks, {}) at {}", manifest.generation, manifest.chunk_count, manifest.embedder_id, store.root().display());
    Ok(())
}

async fn run_search(settings: &Settings, args: &SearchArgs) -> Result<Vec<RetrievedChunk>> {
    let store = IndexStore::new(args.index_dir.clone().unwrap_or_else(|| settings.data.index_dir()));
    let generation = store.load().await?;
    let service = RetrievalService::new(generation, FusionRanker::new(settings.retrieval.rrf_k))?;
    let mode = args.mode.unwrap_or(settings.retrieval.mode);
    let k = args.top_k.unwrap_or(settings.retrieval.top_k);
    service.search(&args.query, mode, k).await
}

fn print_results(results: &[RetrievedChunk]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, r) in results.iter().enumerate() {
        let preview: String = r.chunk.text.chars().take(160).collect();
        println!("[{}] {:.4} {} | {}", i + 1, r.score, r.chunk.id, r.chunk.title);
        println!("    {preview}");
        if !r.chunk.source.is_empty() { println!("    {}", r.chunk.source); }
    }
}
