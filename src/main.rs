//! # Lunfardo CLI
//!
//! Commands for building the vector index from the phrase table and article
//! feed, inspecting retrieval, and running translations.
//!
//! ## Usage
//!
//! ```bash
//! lunfardo --config ./config/lunfardo.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lunfardo ingest` | Rebuild the vector index from all sources |
//! | `lunfardo search "<query>"` | Run a retrieval query and print ranked chunks |
//! | `lunfardo translate "<text>"` | Translate input into Argentinian Spanish |
//! | `lunfardo sources` | Show source feed and index health |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lunfardo::{config, ingest, search, sources, translate};

/// Lunfardo — retrieval-augmented translation into Argentinian Spanish.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lunfardo.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lunfardo",
    about = "Retrieval-augmented translation into Argentinian Spanish",
    version,
    long_about = "Lunfardo ingests a curated phrase table and an article feed into a \
    persisted vector index, then translates English or Spanish input into authentic \
    Argentinian Spanish using retrieved phrases and excerpts as context."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lunfardo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Rebuild the vector index from all sources.
    ///
    /// Loads the phrase table and article feed, cleans and chunks them,
    /// embeds every chunk, and writes a fresh index generation. The live
    /// pointer moves only after the new generation is fully written.
    Ingest {
        /// Show document and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of documents to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run a retrieval query and print ranked chunks.
    ///
    /// Useful for inspecting what context the translator would see for a
    /// given input.
    Search {
        /// The query string.
        query: String,

        /// Number of chunks to return (defaults to the configured top_k).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Translate input into Argentinian Spanish.
    ///
    /// Routes on input language first: English and Spanish are translated,
    /// anything else is refused with the detected language named.
    Translate {
        /// The text to translate.
        text: String,
    },

    /// Show source feed and index health.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lunfardo=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { dry_run, limit } => {
            ingest::run_ingest(&cfg, dry_run, limit).await?;
        }
        Commands::Search { query, k } => {
            search::run_search(&cfg, &query, k).await?;
        }
        Commands::Translate { text } => {
            translate::run_translate(&cfg, &text).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
    }

    Ok(())
}
