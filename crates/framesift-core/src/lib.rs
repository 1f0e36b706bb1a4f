//! # framesift core
//!
//! Shared retrieval logic for framesift: query chunking, vector
//! normalization and aggregation, the hierarchical proximity graph
//! ([`index::HnswIndex`]), and result ranking.
//!
//! This crate contains no tokio, filesystem I/O, or model runtime. The
//! embedding model is reached only through the [`embedding::EmbeddingProvider`]
//! trait, implemented by the `framesift` app crate.
//!
//! ## Pipeline
//!
//! ```text
//! query text ─▶ chunk::segment ─▶ EmbeddingProvider::embed_text
//!            ─▶ vector::normalize ─▶ vector::aggregate ─▶ FrozenIndex::search
//!            ─▶ search::rank ─▶ RankedResult
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod search;
pub mod vector;

pub use error::RetrievalError;
