//! Embedding provider implementations.
//!
//! Implements the core [`EmbeddingProvider`] trait for the app:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`LocalProvider`]**: runs a paired text + image encoder locally via
//!   fastembed; no network calls after the first model download.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the appropriate provider based
//! on the configuration:
//!
//! ```rust,no_run
//! # use framesift::config::EmbeddingConfig;
//! # use framesift::embedding::create_provider;
//! let config = EmbeddingConfig {
//!     provider: "disabled".to_string(),
//!     ..EmbeddingConfig::default()
//! };
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! # Model Pairs
//!
//! Cross-modal retrieval only works when text and images land in the same
//! space, so a local model name selects a *pair*:
//!
//! | Config value | Text encoder | Image encoder | Dims |
//! |--------------|--------------|---------------|------|
//! | `clip-vit-b-32` (default) | CLIP ViT-B/32 text | CLIP ViT-B/32 vision | 512 |
//! | `nomic-embed-v1.5` | nomic-embed-text-v1.5 | nomic-embed-vision-v1.5 | 768 |

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;

pub use framesift_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;

/// Default local model pair.
pub const DEFAULT_LOCAL_MODEL: &str = "clip-vit-b-32";

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
/// Commands that never embed (`chunk`, `corpus`) run fine with it.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_text(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider = \"local\" in config.")
    }
    async fn embed_images(&self, _paths: &[PathBuf]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider = \"local\" in config.")
    }
}

// ============ Local Provider (fastembed) ============

/// A text encoder and image encoder that share one embedding space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPair {
    ClipVitB32,
    NomicV15,
}

impl ModelPair {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "clip-vit-b-32" => Ok(ModelPair::ClipVitB32),
            "nomic-embed-v1.5" => Ok(ModelPair::NomicV15),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: clip-vit-b-32, nomic-embed-v1.5",
                other
            ),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelPair::ClipVitB32 => "clip-vit-b-32",
            ModelPair::NomicV15 => "nomic-embed-v1.5",
        }
    }

    pub fn dims(&self) -> usize {
        match self {
            ModelPair::ClipVitB32 => 512,
            ModelPair::NomicV15 => 768,
        }
    }

    /// Task prefix the text encoder expects on retrieval queries.
    fn query_prefix(&self) -> &'static str {
        match self {
            ModelPair::ClipVitB32 => "",
            ModelPair::NomicV15 => "search_query: ",
        }
    }
}

/// Embedding provider for local inference through fastembed.
///
/// Models are downloaded on first use from Hugging Face and cached. Each
/// encoder is loaded at most once per provider, on its first call, and reused
/// for every later batch. Inference runs on the blocking thread pool.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    pair: ModelPair,
    batch_size: usize,
    text: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
    image: std::sync::Arc<std::sync::Mutex<Option<fastembed::ImageEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let name = config.model.as_deref().unwrap_or(DEFAULT_LOCAL_MODEL);
        Ok(Self {
            pair: ModelPair::from_name(name)?,
            batch_size: config.batch_size,
            text: Default::default(),
            image: Default::default(),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn text_model(pair: ModelPair) -> fastembed::EmbeddingModel {
    match pair {
        ModelPair::ClipVitB32 => fastembed::EmbeddingModel::ClipVitB32,
        ModelPair::NomicV15 => fastembed::EmbeddingModel::NomicEmbedTextV15,
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn image_model(pair: ModelPair) -> fastembed::ImageEmbeddingModel {
    match pair {
        ModelPair::ClipVitB32 => fastembed::ImageEmbeddingModel::ClipVitB32,
        ModelPair::NomicV15 => fastembed::ImageEmbeddingModel::NomicEmbedVisionV15,
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        self.pair.name()
    }
    fn dims(&self) -> usize {
        self.pair.dims()
    }

    async fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let slot = std::sync::Arc::clone(&self.text);
        let pair = self.pair;
        let batch_size = self.batch_size;
        let prefix = pair.query_prefix();
        let texts: Vec<String> = texts.iter().map(|t| format!("{}{}", prefix, t)).collect();

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| anyhow::anyhow!("Text model lock poisoned"))?;
            if guard.is_none() {
                tracing::info!(model = pair.name(), "loading text encoder");
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(text_model(pair)).with_show_download_progress(true),
                )
                .map_err(|e| anyhow::anyhow!("Failed to initialize local text model: {}", e))?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("Text model not initialized"))?;

            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local text embedding failed: {}", e))
        })
        .await?
    }

    async fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>> {
        let slot = std::sync::Arc::clone(&self.image);
        let pair = self.pair;
        let batch_size = self.batch_size;
        let paths = paths.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| anyhow::anyhow!("Image model lock poisoned"))?;
            if guard.is_none() {
                tracing::info!(model = pair.name(), "loading image encoder");
                let model = fastembed::ImageEmbedding::try_new(
                    fastembed::ImageInitOptions::new(image_model(pair))
                        .with_show_download_progress(true),
                )
                .map_err(|e| anyhow::anyhow!("Failed to initialize local image model: {}", e))?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("Image model not initialized"))?;

            model
                .embed(paths, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local image embedding failed: {}", e))
        })
        .await?
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// # Supported Providers
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"local"` | `LocalProvider` (fastembed, see features) |
///
/// # Errors
///
/// Returns an error for unknown provider or model names, or when the
/// local provider was compiled out.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
