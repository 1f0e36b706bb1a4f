//! Query pipeline and result ranking.
//!
//! The core search path operates entirely through the
//! [`EmbeddingProvider`] trait and a [`FrozenIndex`], with no configuration
//! or filesystem dependencies. The calling application builds the index,
//! keeps the item paths, and passes both in.
//!
//! # Query Algorithm
//!
//! 1. Segment the query into chunks of at most `max_chars` characters.
//! 2. Embed all chunks in one provider call.
//! 3. L2-normalize each chunk vector (a zero vector rejects the query).
//! 4. Average the chunk vectors into one query vector.
//! 5. Beam-search the index for the top `top_k` items with width `ef_search`.
//! 6. Attach 1-based ranks and resolve item IDs to paths.

use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::chunk::segment;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::index::FrozenIndex;
use crate::models::{RankedResult, SearchHit};
use crate::vector::{aggregate, normalize_batch};

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Maximum results to return.
    pub top_k: usize,
    /// Beam width at query time; raised to `top_k` if smaller.
    pub ef_search: usize,
    /// Chunk length budget for the query text, in characters.
    pub max_chars: usize,
}

/// Bundles all inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    /// Free-form query text.
    pub query: &'a str,
    /// Retrieval tuning parameters.
    pub params: SearchParams,
}

/// Turn query text into one aggregated query vector.
///
/// # Errors
///
/// - [`RetrievalError::EmptyQuery`] when the text yields no chunks; the
///   provider is never called in that case.
/// - [`RetrievalError::ZeroVector`] when a chunk embeds to a zero vector.
/// - [`RetrievalError::DimensionMismatch`] when chunk vectors disagree in length.
/// - Any provider error, or a provider returning the wrong number of vectors.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    query: &str,
    max_chars: usize,
) -> Result<Vec<f32>> {
    let chunks = segment(query, max_chars);
    if chunks.is_empty() {
        return Err(RetrievalError::EmptyQuery.into());
    }
    debug!(chunks = chunks.len(), "query segmented");

    let raw = provider.embed_text(&chunks).await?;
    if raw.len() != chunks.len() {
        bail!(
            "Embedding provider returned {} vectors for {} chunks",
            raw.len(),
            chunks.len()
        );
    }

    let normalized = normalize_batch(&raw)
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(aggregate(&normalized)?)
}

/// Attach ranks and paths to raw hits, preserving their order.
///
/// Hits whose ID has no path are dropped with a warning; ranks stay
/// contiguous over the remaining results.
pub fn rank(hits: &[SearchHit], paths: &[PathBuf]) -> Vec<RankedResult> {
    hits.iter()
        .filter_map(|hit| match paths.get(hit.id as usize) {
            Some(path) => Some((hit, path)),
            None => {
                warn!(id = hit.id, "search hit has no stored path; dropping");
                None
            }
        })
        .enumerate()
        .map(|(i, (hit, path))| RankedResult {
            rank: i + 1,
            item_id: hit.id,
            path: path.display().to_string(),
            score: hit.score,
        })
        .collect()
}

/// Run the full query pipeline against a built index.
///
/// This is the core search function the CLI delegates to. `paths[id]` must
/// be the source path of item `id`.
pub async fn search(
    provider: &dyn EmbeddingProvider,
    index: &FrozenIndex,
    paths: &[PathBuf],
    req: &SearchRequest<'_>,
) -> Result<Vec<RankedResult>> {
    let query_vec = embed_query(provider, req.query, req.params.max_chars).await?;
    let hits = index.search(&query_vec, req.params.top_k, req.params.ef_search)?;
    Ok(rank(&hits, paths))
}
