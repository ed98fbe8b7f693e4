//! # PV Harness CLI (`pvh`)
//!
//! Question answering over a folder of photovoltaic-energy PDFs.
//!
//! ## Usage
//!
//! ```bash
//! pvh --config ./config/pvh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pvh ingest [PATHS..]` | Extract and index documents (default: the documents folder) |
//! | `pvh ask "<question>"` | Answer a question from the ingested documents |
//! | `pvh search "<query>"` | Show the fragments a question would retrieve |
//! | `pvh docs` | List stored documents |
//! | `pvh forget <name>` | Remove a document and its fragments |
//! | `pvh reindex` | Rebuild the index from the document store |
//! | `pvh serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest every PDF under ./documents
//! pvh ingest
//!
//! # Ask in Spanish (the default answer language)
//! pvh ask "¿Cómo funcionan los paneles solares?"
//!
//! # Inspect retrieval with a wider window
//! pvh search "inversor" --top-k 5 --max-chars 4000
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pv_harness::{ask, config, docs, ingest, logging, search, server};

/// PV Harness CLI: retrieval-grounded Q&A over photovoltaic documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "pvh",
    about = "PV Harness: retrieval-grounded Q&A over photovoltaic documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pvh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and index documents.
    ///
    /// Without PATHS, scans `[documents].root` using the include/exclude
    /// globs. Each document is handled independently; one that fails to
    /// extract is reported and skipped.
    Ingest {
        /// Explicit files to ingest instead of the documents folder.
        paths: Vec<PathBuf>,

        /// Report what would be ingested without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the ingested documents.
    Ask {
        question: String,

        /// Print the full answer (status, text, sources) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the fragments retrieved for a query, without calling the model.
    Search {
        query: String,

        /// Number of fragments to consider (overrides `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Character budget (overrides `[retrieval].max_total_chars`).
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// List stored documents with their fragment counts.
    Docs,

    /// Remove a document and its fragments.
    Forget {
        /// Document name as shown by `pvh docs`.
        identity: String,
    },

    /// Discard the index (and any snapshot) and rebuild it from the store.
    Reindex,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_or_default(&cli.config)?;
    logging::init_with_config(&cfg.logging);

    match cli.command {
        Commands::Ingest { paths, dry_run } => {
            ingest::run_ingest(&cfg, &paths, dry_run).await?;
        }
        Commands::Ask { question, json } => {
            ask::run_ask(&cfg, &question, json).await?;
        }
        Commands::Search {
            query,
            top_k,
            max_chars,
        } => {
            search::run_search(&cfg, &query, top_k, max_chars).await?;
        }
        Commands::Docs => {
            docs::run_docs(&cfg).await?;
        }
        Commands::Forget { identity } => {
            docs::run_forget(&cfg, &identity).await?;
        }
        Commands::Reindex => {
            ingest::run_reindex(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
