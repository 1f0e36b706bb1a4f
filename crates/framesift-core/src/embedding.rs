//! Embedding provider trait.
//!
//! Defines the [`EmbeddingProvider`] trait that maps query chunks and corpus
//! images into one shared vector space. The model itself is opaque to the
//! core; concrete providers (fastembed CLIP, disabled) live in the
//! `framesift` app crate.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

/// A cross-modal embedding backend.
///
/// Implementations must return one vector per input, in input order, and the
/// same dimensionality ([`dims`](EmbeddingProvider::dims)) for every call in a
/// session. Embedding is the only step of a query expected to block or take
/// noticeable time, so the methods are async.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"clip-vit-b-32"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `512`).
    fn dims(&self) -> usize;

    /// Embed a batch of text chunks.
    async fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a batch of image files.
    ///
    /// A failure anywhere in the batch fails the whole call; callers that
    /// need per-image recovery retry the batch one image at a time.
    async fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>>;
}
