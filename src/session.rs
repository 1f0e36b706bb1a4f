//! Retrieval session: one provider, one config, one built index.
//!
//! A [`Session`] owns everything a run needs, so there is no process-wide
//! state. [`Session::build_index`] embeds the corpus and freezes the graph
//! into a [`CorpusIndex`]; queries then borrow that index immutably.
//!
//! # Build
//!
//! 1. Fail with `EmptyCorpus` before any embedding if there are no items.
//! 2. Embed images in batches of `embedding.batch_size`. A failed batch is
//!    retried one image at a time; images that still fail are skipped as
//!    `UnreadableItem`.
//! 3. Normalize; zero vectors are skipped as `ZeroVector`.
//! 4. Insert survivors in corpus order, so item `id` is `items[id]`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use framesift_core::embedding::EmbeddingProvider;
use framesift_core::index::{FrozenIndex, HnswIndex, HnswParams};
use framesift_core::models::RankedResult;
use framesift_core::search::{search, SearchParams, SearchRequest};
use framesift_core::vector::normalize;
use framesift_core::RetrievalError;

use crate::config::Config;
use crate::corpus::{scan_corpus, CorpusItem};
use crate::progress::{BuildProgressEvent, BuildProgressReporter, NoProgress};
use crate::report::{SegmentHit, SegmentReport};
use crate::transcript::{group_by_segment, Segment};

/// A frozen index plus the corpus items it was built from.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    pub index: FrozenIndex,
    /// `items[id]` is the item behind graph node `id`.
    pub items: Vec<CorpusItem>,
    paths: Vec<PathBuf>,
    /// Items left out of the index, with the reason.
    pub skipped: Vec<(CorpusItem, RetrievalError)>,
}

impl CorpusIndex {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

pub struct Session {
    config: Config,
    provider: Box<dyn EmbeddingProvider>,
    progress: Box<dyn BuildProgressReporter>,
}

impl Session {
    pub fn new(config: Config, provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            provider,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn BuildProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    fn search_params(&self) -> SearchParams {
        SearchParams {
            top_k: self.config.retrieval.top_k,
            ef_search: self.config.index.ef_search,
            max_chars: self.config.chunking.max_chars,
        }
    }

    /// Scan the configured corpus root and build an index over it.
    pub async fn build_index(&self) -> Result<CorpusIndex> {
        let items = scan_corpus(&self.config.corpus)?;
        info!(
            root = %self.config.corpus.root.display(),
            items = items.len(),
            "corpus scanned"
        );
        self.build_index_from(items).await
    }

    /// Build an index over an explicit item list.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::EmptyCorpus`] when `items` is empty or no item
    ///   could be embedded.
    /// - [`RetrievalError::DimensionMismatch`] when the provider returns
    ///   vectors of different lengths.
    pub async fn build_index_from(&self, items: Vec<CorpusItem>) -> Result<CorpusIndex> {
        if items.is_empty() {
            return Err(RetrievalError::EmptyCorpus.into());
        }
        let total = items.len() as u64;
        self.progress
            .report(BuildProgressEvent::Discovered { total });

        let embedded = self.embed_corpus(&items).await?;

        let mut kept: Vec<(CorpusItem, Vec<f32>)> = Vec::with_capacity(items.len());
        let mut skipped = Vec::new();
        for (item, outcome) in items.into_iter().zip(embedded) {
            match outcome.and_then(|v| normalize(&v)) {
                Ok(v) => kept.push((item, v)),
                Err(e) if e.is_recoverable() => {
                    warn!(path = %item.path.display(), code = e.status_code(), "skipping corpus item: {}", e);
                    skipped.push((item, e));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let Some(dims) = kept.first().map(|(_, v)| v.len()) else {
            let first = skipped
                .first()
                .map(|(_, e)| e.to_string())
                .unwrap_or_default();
            return Err(anyhow::Error::from(RetrievalError::EmptyCorpus).context(format!(
                "none of the {} corpus items could be embedded; first failure: {}",
                skipped.len(),
                first
            )));
        };

        let params = HnswParams {
            m: self.config.index.m,
            ef_construction: self.config.index.ef_construction,
            capacity: kept.len(),
            seed: self.config.index.seed,
        };
        let mut index = HnswIndex::new(dims, params)?;
        let n_kept = kept.len() as u64;
        let report_every = (n_kept / 20).max(1);

        let mut corpus_items = Vec::with_capacity(kept.len());
        for (item, vector) in kept {
            let id = index.insert(&vector).with_context(|| {
                format!("Failed to index {}", item.path.display())
            })?;
            let n = u64::from(id) + 1;
            if n % report_every == 0 || n == n_kept {
                self.progress
                    .report(BuildProgressEvent::Indexing { n, total: n_kept });
            }
            corpus_items.push(item);
        }

        info!(
            indexed = corpus_items.len(),
            skipped = skipped.len(),
            dims,
            max_level = index.graph().max_level(),
            "index built"
        );

        let paths = corpus_items.iter().map(|i| i.path.clone()).collect();
        Ok(CorpusIndex {
            index: index.freeze(),
            items: corpus_items,
            paths,
            skipped,
        })
    }

    /// Embed every item, one outcome per item in input order.
    ///
    /// Only per-item failures are returned inside the vector; a provider that
    /// returns vectors of inconsistent length fails the whole build.
    async fn embed_corpus(
        &self,
        items: &[CorpusItem],
    ) -> Result<Vec<std::result::Result<Vec<f32>, RetrievalError>>> {
        let batch_size = self.config.embedding.batch_size.max(1);
        let total = items.len() as u64;
        let mut outcomes = Vec::with_capacity(items.len());
        let mut dims: Option<usize> = None;

        for batch in items.chunks(batch_size) {
            let paths: Vec<PathBuf> = batch.iter().map(|i| i.path.clone()).collect();

            let batch_outcomes = match self.provider.embed_images(&paths).await {
                Ok(vectors) if vectors.len() == paths.len() => {
                    vectors.into_iter().map(Ok).collect()
                }
                Ok(vectors) => {
                    warn!(
                        expected = paths.len(),
                        got = vectors.len(),
                        "image batch returned wrong vector count; retrying one by one"
                    );
                    self.embed_one_by_one(&paths).await
                }
                Err(e) => {
                    warn!(size = paths.len(), error = %e, "image batch failed; retrying one by one");
                    self.embed_one_by_one(&paths).await
                }
            };

            for outcome in &batch_outcomes {
                if let Ok(v) = outcome {
                    let expected = *dims.get_or_insert(v.len());
                    if v.len() != expected {
                        return Err(RetrievalError::DimensionMismatch {
                            expected,
                            actual: v.len(),
                        }
                        .into());
                    }
                }
            }

            outcomes.extend(batch_outcomes);
            debug!(done = outcomes.len(), total, "image batch embedded");
            self.progress.report(BuildProgressEvent::Embedding {
                n: outcomes.len() as u64,
                total,
            });
        }

        Ok(outcomes)
    }

    async fn embed_one_by_one(
        &self,
        paths: &[PathBuf],
    ) -> Vec<std::result::Result<Vec<f32>, RetrievalError>> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let single = std::slice::from_ref(path);
            let outcome = match self.provider.embed_images(single).await {
                Ok(mut vectors) if vectors.len() == 1 => Ok(vectors.remove(0)),
                Ok(vectors) => Err(RetrievalError::UnreadableItem {
                    path: path.clone(),
                    reason: format!("provider returned {} vectors for one image", vectors.len()),
                }),
                Err(e) => Err(RetrievalError::UnreadableItem {
                    path: path.clone(),
                    reason: format!("{:#}", e),
                }),
            };
            out.push(outcome);
        }
        out
    }

    /// Run one free-text query against a built index.
    pub async fn query(&self, corpus: &CorpusIndex, text: &str) -> Result<Vec<RankedResult>> {
        let req = SearchRequest {
            query: text,
            params: self.search_params(),
        };
        search(self.provider.as_ref(), &corpus.index, corpus.paths(), &req).await
    }

    /// Run one query per transcript segment against the same index.
    ///
    /// Segments whose text has nothing to embed are reported as skipped.
    /// Each report also lists the corpus frames grouped under its segment.
    pub async fn query_segments(
        &self,
        corpus: &CorpusIndex,
        segments: &[Segment],
    ) -> Result<Vec<SegmentReport>> {
        let mut reports = Vec::with_capacity(segments.len());
        let groups = group_by_segment(&corpus.items, segments);

        for (segment, frames) in segments.iter().zip(groups) {
            let mut report = SegmentReport {
                segment: segment.index,
                start: segment.start,
                end: segment.end,
                text: segment.text.clone(),
                frames: frames.iter().map(|item| item.relative.clone()).collect(),
                results: Vec::new(),
                skipped: None,
            };

            match self.query(corpus, &segment.text).await {
                Ok(results) => {
                    report.results = results
                        .into_iter()
                        .map(|r| {
                            let timestamp = corpus
                                .items
                                .get(r.item_id as usize)
                                .and_then(|item| item.timestamp);
                            SegmentHit {
                                in_segment: timestamp.is_some_and(|t| segment.contains(t)),
                                rank: r.rank,
                                path: r.path,
                                score: r.score,
                                timestamp,
                            }
                        })
                        .collect();
                }
                Err(e) => match e.downcast_ref::<RetrievalError>() {
                    Some(err @ (RetrievalError::EmptyQuery | RetrievalError::ZeroVector)) => {
                        warn!(segment = segment.index, code = err.status_code(), "skipping segment");
                        report.skipped = Some(err.status_code().to_string());
                    }
                    _ => {
                        return Err(e.context(format!("Segment {} query failed", segment.index)));
                    }
                },
            }

            reports.push(report);
        }

        Ok(reports)
    }
}
