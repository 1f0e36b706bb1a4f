//! # framesift CLI
//!
//! ## Usage
//!
//! ```bash
//! framesift --config ./config/framesift.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `framesift search "<query>"` | Rank corpus images against a query |
//! | `framesift segments` | Rank images once per transcript segment |
//! | `framesift chunk "<text>"` | Show how text is split into query chunks |
//! | `framesift corpus` | List the images an index build would see |
//!
//! Logs go to stderr (`-v` for debug detail); reports go to stdout.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use framesift::config::{self, Config};
use framesift::progress::ProgressMode;
use framesift::search;

/// framesift: find the images that match a piece of narration.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "framesift",
    about = "framesift: cross-modal image retrieval over a frame corpus",
    version,
    long_about = "framesift embeds a corpus of images and a natural-language query into a shared \
    space, links the images into a hierarchical proximity graph, and returns the images closest \
    to the query, ranked by cosine similarity."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/framesift.toml")]
    config: PathBuf,

    /// Log debug detail to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Build progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Index overrides shared by the retrieval commands.
#[derive(clap::Args)]
struct IndexArgs {
    /// Number of results to return.
    #[arg(long)]
    top_k: Option<usize>,

    /// Beam width at query time.
    #[arg(long)]
    ef_search: Option<usize>,

    /// Maximum neighbors per node per layer.
    #[arg(long)]
    m: Option<usize>,

    /// Beam width while building.
    #[arg(long)]
    ef_construction: Option<usize>,

    /// Query chunk length budget, in characters.
    #[arg(long)]
    max_chars: Option<usize>,

    /// Seed for the graph's level draws.
    #[arg(long)]
    seed: Option<u64>,
}

impl IndexArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(v) = self.top_k {
            cfg.retrieval.top_k = v;
        }
        if let Some(v) = self.ef_search {
            cfg.index.ef_search = v;
        }
        if let Some(v) = self.m {
            cfg.index.m = v;
        }
        if let Some(v) = self.ef_construction {
            cfg.index.ef_construction = v;
        }
        if let Some(v) = self.max_chars {
            cfg.chunking.max_chars = v;
        }
        if self.seed.is_some() {
            cfg.index.seed = self.seed;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rank corpus images against a query.
    ///
    /// Builds the index over the configured corpus, embeds the query
    /// sentence by sentence, and prints the top matches.
    Search {
        /// The query text.
        query: Option<String>,

        /// Read the query from a file instead.
        #[arg(long, conflicts_with = "query")]
        query_file: Option<PathBuf>,

        /// Write the JSON result array here (overrides `[output] json_path`).
        #[arg(long)]
        json: Option<PathBuf>,

        #[command(flatten)]
        index: IndexArgs,
    },

    /// Run one query per transcript segment against a single index.
    Segments {
        /// Transcript file (overrides `[transcript] path`).
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Write the JSON segment reports here (overrides `[output] json_path`).
        #[arg(long)]
        json: Option<PathBuf>,

        #[command(flatten)]
        index: IndexArgs,
    },

    /// Show how text is split into query chunks. Needs no model.
    Chunk {
        text: String,

        /// Chunk length budget, in characters.
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// List the images an index build would see. Needs no model.
    Corpus,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    // Commands that don't require a config file
    if let Commands::Chunk { text, max_chars } = &cli.command {
        let cfg = if cli.config.exists() {
            config::load_config(&cli.config)?
        } else {
            Config::minimal()
        };
        let max_chars = max_chars.unwrap_or(cfg.chunking.max_chars);
        if max_chars == 0 {
            bail!("--max-chars must be > 0");
        }
        return search::run_chunk(text, max_chars);
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Search {
            query,
            query_file,
            json,
            index,
        } => {
            index.apply(&mut cfg);
            cfg.validate()?;
            let query = match (query, query_file) {
                (Some(q), _) => q,
                (None, Some(path)) => search::read_query_file(&path)?,
                (None, None) => bail!("Provide a query or --query-file"),
            };
            search::run_search(&cfg, &query, json, progress).await?;
        }
        Commands::Segments {
            transcript,
            json,
            index,
        } => {
            index.apply(&mut cfg);
            cfg.validate()?;
            search::run_segments(&cfg, transcript, json, progress).await?;
        }
        Commands::Corpus => {
            search::run_corpus(&cfg)?;
        }
        Commands::Chunk { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
