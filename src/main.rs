//! # ACL RAG CLI (`aclrag`)
//!
//! Command-line front end for access-controlled semantic retrieval.
//!
//! ## Usage
//!
//! ```bash
//! aclrag [--config ./config/aclrag.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `aclrag init` | Create the SQLite index schema |
//! | `aclrag demo` | Print the dataset and run scripted searches with audit output |
//! | `aclrag matrix` | Print the principal × document access matrix |
//! | `aclrag search "<query>" --user <id>` | Search as a principal |
//! | `aclrag index` | Embed the dataset into the configured index |
//! | `aclrag show` | Compare cached index metadata with the dataset |
//!
//! Without `--dataset`, commands use the built-in sample dataset.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use acl_rag::sqlite_index::SqliteIndex;
use acl_rag::{config, demo, inspect, logging, search};

/// ACL RAG: semantic search that only returns documents the caller may read.
#[derive(Parser)]
#[command(
    name = "aclrag",
    about = "Access-controlled semantic retrieval with owner/group/other permissions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    /// Log filter when `ACLRAG_LOG` is unset. Overrides `[logging] level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the SQLite index schema.
    ///
    /// Requires `[index] backend = "sqlite"`. Safe to run repeatedly.
    Init,

    /// Show the dataset and access matrix, then run scripted searches.
    ///
    /// Each search prints its results followed by one audit line per
    /// candidate examined.
    Demo {
        /// Dataset file (TOML or JSON).
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Print which principals can read which documents.
    Matrix {
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Search as a principal.
    Search {
        /// The search query string.
        query: String,

        /// Principal id to search as.
        #[arg(long)]
        user: String,

        /// Group memberships to use instead of the dataset's. Repeatable.
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Maximum number of results (defaults to `[retrieval] top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Embed every dataset document into the configured index.
    Index {
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Delete all existing entries first (sqlite backend only).
        #[arg(long)]
        reset: bool,
    },

    /// List index entries with cached and current permissions.
    Show {
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_or_default(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&cfg.logging.level);
    logging::init_logging(level, cli.log_json)?;

    match cli.command {
        Commands::Init => match (cfg.index.backend.as_str(), cfg.index.path.as_deref()) {
            ("sqlite", Some(path)) => {
                let index = SqliteIndex::open(path).await?;
                index.close().await;
                println!("Index initialized at {}.", path.display());
            }
            _ => println!("Memory index backend needs no initialization."),
        },
        Commands::Demo { dataset } => {
            demo::run_demo(&cfg, dataset.as_deref()).await?;
        }
        Commands::Matrix { dataset } => {
            demo::run_matrix(dataset.as_deref())?;
        }
        Commands::Search {
            query,
            user,
            groups,
            top_k,
            dataset,
            json,
        } => {
            let request = search::SearchRequest {
                query,
                user,
                groups,
                top_k,
            };
            search::run_search(&cfg, dataset.as_deref(), &request, json).await?;
        }
        Commands::Index { dataset, reset } => {
            inspect::run_index(&cfg, dataset.as_deref(), reset).await?;
        }
        Commands::Show { dataset } => {
            inspect::run_show(&cfg, dataset.as_deref()).await?;
        }
    }

    Ok(())
}
