//! CLI entry points for the retrieval commands.
//!
//! Each runner builds a [`Session`], builds the index once, and prints the
//! text report on stdout. Status lines and progress go to stderr.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use framesift_core::chunk::segment;
use framesift_core::RetrievalError;

use crate::config::Config;
use crate::corpus::scan_corpus;
use crate::embedding::create_provider;
use crate::progress::ProgressMode;
use crate::report::{format_results, format_segments, write_json};
use crate::session::Session;
use crate::transcript::load_transcript;

fn open_session(config: &Config, progress: ProgressMode) -> Result<Session> {
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider = \"local\" in config.");
    }
    let provider = create_provider(&config.embedding)?;
    Ok(Session::new(config.clone(), provider).with_progress(progress.reporter()))
}

fn json_target(config: &Config, json: Option<PathBuf>) -> Option<PathBuf> {
    json.or_else(|| config.output.json_path.clone())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    json: Option<PathBuf>,
    progress: ProgressMode,
) -> Result<()> {
    // Reject before paying for the corpus embedding.
    if segment(query, config.chunking.max_chars).is_empty() {
        return Err(RetrievalError::EmptyQuery.into());
    }

    let session = open_session(config, progress)?;
    let corpus = session.build_index().await?;
    let results = session.query(&corpus, query).await?;

    print!("{}", format_results(&results, config.retrieval.top_k));

    if let Some(path) = json_target(config, json) {
        write_json(&path, &results)?;
        eprintln!("Wrote {} results to {}", results.len(), path.display());
    }
    Ok(())
}

pub async fn run_segments(
    config: &Config,
    transcript: Option<PathBuf>,
    json: Option<PathBuf>,
    progress: ProgressMode,
) -> Result<()> {
    let Some(path) = transcript.or_else(|| config.transcript.path.clone()) else {
        bail!("No transcript given. Pass --transcript or set [transcript] path in config.");
    };
    let segments = load_transcript(&path)?;
    eprintln!("Loaded {} segments from {}", segments.len(), path.display());

    let session = open_session(config, progress)?;
    let corpus = session.build_index().await?;
    let reports = session.query_segments(&corpus, &segments).await?;

    print!("{}", format_segments(&reports, config.retrieval.top_k));

    if let Some(path) = json_target(config, json) {
        write_json(&path, &reports)?;
        eprintln!("Wrote {} segment reports to {}", reports.len(), path.display());
    }
    Ok(())
}

/// Print the chunks a query would be split into.
pub fn run_chunk(text: &str, max_chars: usize) -> Result<()> {
    let chunks = segment(text, max_chars);
    if chunks.is_empty() {
        return Err(RetrievalError::EmptyQuery.into());
    }
    for (i, chunk) in chunks.iter().enumerate() {
        println!("{}\t{}\t{}", i + 1, chunk.chars().count(), chunk);
    }
    Ok(())
}

/// List the images an index build would see, in insertion order.
pub fn run_corpus(config: &Config) -> Result<()> {
    let items = scan_corpus(&config.corpus)?;
    if items.is_empty() {
        return Err(RetrievalError::EmptyCorpus.into());
    }
    for (id, item) in items.iter().enumerate() {
        let ts = item
            .timestamp
            .map(|t| format!("{:.3}", t))
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}\t{}", id, ts, item.relative);
    }
    eprintln!("{} images under {}", items.len(), config.corpus.root.display());
    Ok(())
}

/// Read a query from a file, for narration too long for the command line.
pub fn read_query_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read query file: {}", path.display()))
}
