//! `docqa` - ingest a folder of documents and ask questions about it.

mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docqa_rag::AppConfig;

#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Question answering over a folder of procedural documents",
    version
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path of the vector index database (overrides DOCQA_INDEX_PATH)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and index the documents in a directory
    Ingest {
        /// Document directory (overrides DOCQA_DOCS_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Clear the index before ingesting
        #[arg(long)]
        rebuild: bool,
        /// Embed with the remote provider, falling back to the local model
        #[arg(long)]
        remote_embeddings: bool,
        /// Also write the processed chunks to this JSON file
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Answer a question from the indexed documents
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index and provider status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every indexed chunk
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.json_logs);

    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    if let Some(index) = cli.index {
        config.index_path = index;
    }

    let engine = commands::build_engine(&config).await?;

    match cli.command {
        Command::Ingest { dir, rebuild, remote_embeddings, dump } => {
            let dir = dir.unwrap_or_else(|| config.docs_dir.clone());
            let remote = remote_embeddings || config.providers.use_remote_embeddings;
            commands::ingest(&engine, &config, &dir, rebuild, remote, dump.as_deref()).await
        }
        Command::Ask { question, json } => commands::ask(&engine, &question.join(" "), json).await,
        Command::Status { json } => commands::status(&engine, json).await,
        Command::Clear => commands::clear(&engine).await,
    }
}
