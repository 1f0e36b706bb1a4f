//! # framesift
//!
//! Cross-modal image retrieval for offline curation: given narration text,
//! find the frames of a video (or any image folder) that best match it.
//!
//! framesift embeds every image with a CLIP-style encoder, links the vectors
//! into a hierarchical proximity graph, and answers each query by embedding
//! its sentences with the paired text encoder, averaging them, and walking
//! the graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Corpus    │──▶│ Image encoder │──▶│  HNSW graph   │
//! │ walk + glob │   │  (fastembed)  │   │ (core index)  │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!  query ─▶ chunk ─▶ text encoder ─▶ mean ─▶ search ─▶ rank ─▶ report
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! framesift search "A developer announces the release." --config ./config/framesift.toml
//! framesift segments --transcript ./transcript.md --json out/segments.json
//! framesift chunk "Long narration. Split into sentences." --max-chars 20
//! framesift corpus
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus`] | Image discovery and frame timestamps |
//! | [`embedding`] | Embedding provider implementations |
//! | [`session`] | Index build and query orchestration |
//! | [`transcript`] | Timed narration segments |
//! | [`report`] | Text and JSON result output |
//! | [`search`] | CLI command runners |
//! | [`progress`] | Build progress on stderr |

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod progress;
pub mod report;
pub mod search;
pub mod session;
pub mod transcript;

pub use framesift_core as core;
