//! Hierarchical navigable small-world (HNSW) index.
//!
//! The index has two phases with different ownership:
//!
//! | Phase | Type | Access |
//! |-------|------|--------|
//! | Build | [`HnswIndex`] | `&mut self`, single writer, owns the level RNG |
//! | Query | [`FrozenIndex`] | `&self` only, `Send + Sync`, shareable via `Arc` |
//!
//! [`HnswIndex::freeze`] moves the graph from the first into the second, so
//! no mutable access survives into the query phase.
//!
//! # Insertion
//!
//! 1. Draw a top layer `l = ⌊-ln(U) · mL⌋`, `mL = 1/ln(M)`.
//! 2. Greedy descent from the entry point down to layer `l + 1`.
//! 3. On each layer `min(l, max_level) ..= 0`: beam search of width
//!    `ef_construction`, link to the heuristic-selected best `M` (`2M` on
//!    layer 0), add reverse edges and prune overfull neighbors.
//!    On layer 0 one of the links is also recorded as the node's tree edge
//!    to a parent, which pruning never removes. Without it, runs of
//!    identical vectors (static shots) prune the newest copy out of every
//!    list and leave it unreachable.
//! 4. If `l` is above the current top layer, the new node becomes the entry
//!    point.
//!
//! Similarity is the inner product; vectors must be L2-normalized first
//! for scores to be cosine similarities.

mod graph;
mod search;

pub use graph::Graph;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::debug;

use crate::error::{Result, RetrievalError};
use crate::models::{ItemId, SearchHit};

/// Layer ceiling for the level draw.
const MAX_LEVEL: usize = 16;

/// Default maximum neighbors per node per layer.
pub const DEFAULT_M: usize = 16;
/// Default beam width while inserting.
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;
/// Default beam width while querying.
pub const DEFAULT_EF_SEARCH: usize = 64;

/// Construction parameters, fixed for the lifetime of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct HnswParams {
    /// Maximum neighbors per node on layers above 0 (`2M` on layer 0).
    pub m: usize,
    /// Candidate list size used while inserting.
    pub ef_construction: usize,
    /// Maximum number of items; storage is preallocated for this many.
    pub capacity: usize,
    /// Seed for the level RNG. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl HnswParams {
    /// Default parameters for an index holding up to `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            m: DEFAULT_M,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            capacity,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.m < 2 {
            return Err(RetrievalError::InvalidParams(format!(
                "m must be >= 2, got {}",
                self.m
            )));
        }
        if self.ef_construction < 1 {
            return Err(RetrievalError::InvalidParams(
                "ef_construction must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `mL = 1 / ln(M)`: the probability of reaching layer `l + 1` from
    /// layer `l` is `1 / M`.
    pub fn level_multiplier(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}

/// Mutable, build-phase HNSW index.
pub struct HnswIndex {
    params: HnswParams,
    graph: Graph,
    rng: Box<dyn RngCore + Send>,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("params", &self.params)
            .field("len", &self.graph.len())
            .field("max_level", &self.graph.max_level())
            .finish()
    }
}

impl HnswIndex {
    /// Create an empty index for `dims`-dimensional vectors.
    ///
    /// The level RNG is seeded from `params.seed` when set.
    pub fn new(dims: usize, params: HnswParams) -> Result<Self> {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(dims, params, rng)
    }

    /// Create an empty index drawing levels from an explicit random source.
    pub fn with_rng(dims: usize, params: HnswParams, rng: impl RngCore + Send + 'static) -> Result<Self> {
        params.validate()?;
        if dims == 0 {
            return Err(RetrievalError::InvalidParams(
                "dims must be > 0".to_string(),
            ));
        }
        Ok(Self {
            graph: Graph::with_capacity(dims, params.m, params.capacity),
            params,
            rng: Box::new(rng),
        })
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.graph.dims()
    }

    pub fn capacity(&self) -> usize {
        self.params.capacity
    }

    fn draw_level(&mut self) -> usize {
        // 1 - [0, 1) keeps U in (0, 1] so ln(U) is finite.
        let u: f64 = 1.0 - self.rng.gen::<f64>();
        let level = (-u.ln() * self.params.level_multiplier()).floor() as usize;
        level.min(MAX_LEVEL)
    }

    /// Insert one normalized vector and return its dense ID.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::CapacityExceeded`] when the index is full; items
    ///   already inserted are left untouched.
    /// - [`RetrievalError::DimensionMismatch`] when `vector.len() != dims`.
    pub fn insert(&mut self, vector: &[f32]) -> Result<ItemId> {
        if self.graph.len() >= self.params.capacity {
            return Err(RetrievalError::CapacityExceeded {
                capacity: self.params.capacity,
            });
        }
        if vector.len() != self.graph.dims() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.graph.dims(),
                actual: vector.len(),
            });
        }

        let level = self.draw_level();
        let entry = self.graph.entry_point();
        let max_level = self.graph.max_level();
        let id = self.graph.push_node(vector, level);

        let Some(entry) = entry else {
            self.graph.set_entry_point(id, level);
            return Ok(id);
        };

        let start = SearchHit::new(entry, self.graph.similarity(entry, vector));
        let nearest = search::greedy_descend(&self.graph, vector, start, max_level, level);

        let mut entry_points = vec![nearest];
        for layer in (0..=level.min(max_level)).rev() {
            let candidates = search::search_layer(
                &self.graph,
                vector,
                &entry_points,
                self.params.ef_construction,
                layer,
            );

            let cap = self.graph.layer_cap(layer);
            let mut selected = search::select_neighbors(&self.graph, &candidates, cap);
            if layer == 0 {
                self.attach_to_tree(id, &candidates, &mut selected, cap);
            }

            for &neighbor in &selected {
                if self.graph.add_edge(neighbor, layer, id) > cap {
                    self.prune(neighbor, layer, cap);
                }
            }
            self.graph.set_neighbors(id, layer, selected);

            entry_points = candidates;
        }

        if level > max_level {
            debug!(id, level, "new entry point");
            self.graph.set_entry_point(id, level);
        }

        Ok(id)
    }

    /// Insert every vector in order, stopping at the first error.
    ///
    /// On error the vectors inserted before the failing one remain indexed.
    pub fn insert_batch(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<ItemId>> {
        let mut ids = Vec::with_capacity(vectors.len());
        for v in vectors {
            ids.push(self.insert(v)?);
        }
        Ok(ids)
    }

    /// Pick a layer-0 parent for `id` and make sure it is among `selected`.
    ///
    /// The parent is the best selected neighbor with a free tree slot, or
    /// failing that the nearest node with one found by walking layer 0.
    fn attach_to_tree(
        &mut self,
        id: ItemId,
        candidates: &[SearchHit],
        selected: &mut Vec<ItemId>,
        cap: usize,
    ) {
        let parent = selected
            .iter()
            .copied()
            .find(|&n| self.graph.tree_degree(n) < cap)
            .or_else(|| {
                candidates
                    .first()
                    .and_then(|c| self.graph.find_tree_slot(c.id, cap))
            });
        let Some(parent) = parent else {
            return;
        };

        if !selected.contains(&parent) {
            if selected.len() >= cap {
                selected.pop();
            }
            selected.push(parent);
        }
        self.graph.set_parent(id, parent);
    }

    /// Shrink `node`'s list on `layer` back to `cap`.
    ///
    /// Layer-0 tree edges are always kept; the heuristic fills the rest.
    fn prune(&mut self, node: ItemId, layer: usize, cap: usize) {
        let (mut kept, rest): (Vec<ItemId>, Vec<ItemId>) = self
            .graph
            .neighbors(node, layer)
            .iter()
            .copied()
            .partition(|&n| layer == 0 && self.graph.is_tree_edge(node, n));

        let mut candidates: Vec<SearchHit> = rest
            .into_iter()
            .map(|n| SearchHit::new(n, self.graph.similarity_between(node, n)))
            .collect();
        candidates.sort_by(|a, b| b.cmp(a));

        let free = cap.saturating_sub(kept.len());
        kept.extend(search::select_neighbors(&self.graph, &candidates, free));
        self.graph.set_neighbors(node, layer, kept);
    }

    /// Search during the build phase. See [`FrozenIndex::search`].
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<SearchHit>> {
        check_query(&self.graph, query)?;
        Ok(search::knn(&self.graph, query, k, ef))
    }

    /// End the build phase.
    pub fn freeze(self) -> FrozenIndex {
        FrozenIndex {
            params: self.params,
            graph: self.graph,
        }
    }
}

/// Read-only, query-phase index.
#[derive(Debug, Clone)]
pub struct FrozenIndex {
    params: HnswParams,
    graph: Graph,
}

impl FrozenIndex {
    /// Approximate top-`k` neighbors of `query`.
    ///
    /// Results are sorted by descending score, ties by ascending ID, and hold
    /// at most `min(k, len)` distinct items. `ef` is the beam width and is
    /// raised to `k` when smaller; larger values trade latency for recall.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::DimensionMismatch`] when the query length differs
    /// from the index dimensionality.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<SearchHit>> {
        check_query(&self.graph, query)?;
        Ok(search::knn(&self.graph, query, k, ef))
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.graph.dims()
    }
}

fn check_query(graph: &Graph, query: &[f32]) -> Result<()> {
    if query.len() != graph.dims() {
        return Err(RetrievalError::DimensionMismatch {
            expected: graph.dims(),
            actual: query.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{inner_product, normalize};

    fn unit(v: &[f32]) -> Vec<f32> {
        normalize(v).unwrap()
    }

    fn random_unit_vectors(n: usize, dims: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
                unit(&v)
            })
            .collect()
    }

    fn seeded(capacity: usize, seed: u64) -> HnswParams {
        HnswParams {
            seed: Some(seed),
            ..HnswParams::with_capacity(capacity)
        }
    }

    fn brute_force(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<ItemId> {
        let mut hits: Vec<SearchHit> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| SearchHit::new(i as ItemId, inner_product(v, query)))
            .collect();
        hits.sort_by(|a, b| b.cmp(a));
        hits.into_iter().take(k).map(|h| h.id).collect()
    }

    fn build(vectors: &[Vec<f32>], seed: u64) -> FrozenIndex {
        let dims = vectors[0].len();
        let mut index = HnswIndex::new(dims, seeded(vectors.len(), seed)).unwrap();
        index.insert_batch(vectors).unwrap();
        index.freeze()
    }

    #[test]
    fn test_five_vector_scenario() {
        let vectors: Vec<Vec<f32>> = [
            [1.0, 0.0],
            [0.0, 1.0],
            [0.9, 0.1],
            [-1.0, 0.0],
            [0.0, -1.0],
        ]
        .iter()
        .map(|v| unit(v))
        .collect();
        let index = build(&vectors, 7);

        let hits = index.search(&[1.0, 0.0], 3, DEFAULT_EF_SEARCH).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].id, 2);
        assert!((hits[1].score - 0.9939).abs() < 1e-3);
        assert!(hits[2].id == 1 || hits[2].id == 4);
        assert!(hits[2].score.abs() < 1e-6);
        assert!(hits.iter().all(|h| h.id != 3));

        let all = index.search(&[1.0, 0.0], 5, DEFAULT_EF_SEARCH).unwrap();
        assert_eq!(all.last().map(|h| h.id), Some(3));
        assert!((all[4].score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_capacity_exceeded_keeps_prior_items() {
        let vectors = random_unit_vectors(4, 8, 1);
        let mut index = HnswIndex::new(8, seeded(3, 1)).unwrap();
        for v in &vectors[..3] {
            index.insert(v).unwrap();
        }

        let err = index.insert(&vectors[3]).unwrap_err();
        assert_eq!(err, RetrievalError::CapacityExceeded { capacity: 3 });
        assert_eq!(index.len(), 3);

        let hits = index.search(&vectors[1], 3, 10).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn test_insert_batch_stops_at_overflow() {
        let vectors = random_unit_vectors(5, 4, 2);
        let mut index = HnswIndex::new(4, seeded(4, 2)).unwrap();
        let err = index.insert_batch(&vectors).unwrap_err();
        assert_eq!(err, RetrievalError::CapacityExceeded { capacity: 4 });
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = HnswIndex::new(3, seeded(10, 0)).unwrap();
        index.insert(&unit(&[1.0, 0.0, 0.0])).unwrap();
        assert_eq!(
            index.insert(&[1.0, 0.0]),
            Err(RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(index.len(), 1);

        let frozen = index.freeze();
        assert!(matches!(
            frozen.search(&[1.0, 0.0, 0.0, 0.0], 1, 10),
            Err(RetrievalError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_params() {
        let params = HnswParams {
            m: 1,
            ..HnswParams::with_capacity(10)
        };
        assert!(matches!(
            HnswIndex::new(4, params),
            Err(RetrievalError::InvalidParams(_))
        ));
        assert!(matches!(
            HnswIndex::new(0, HnswParams::with_capacity(10)),
            Err(RetrievalError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = HnswIndex::new(4, seeded(10, 0)).unwrap().freeze();
        assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 5, 64).unwrap().is_empty());
    }

    #[test]
    fn test_fewer_items_than_k() {
        let vectors = random_unit_vectors(3, 6, 3);
        let index = build(&vectors, 3);
        let hits = index.search(&vectors[0], 10, 64).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_degree_bounded_and_layer0_connected() {
        let vectors = random_unit_vectors(200, 16, 11);
        let index = build(&vectors, 11);
        let graph = index.graph();
        assert!(graph.degrees_bounded());
        assert_eq!(graph.reachable_at_layer0(), 200);
        let entry = graph.entry_point().unwrap();
        assert_eq!(graph.level(entry), graph.max_level());
    }

    fn build_with(vectors: &[Vec<f32>], m: usize, ef_construction: usize, seed: u64) -> FrozenIndex {
        let mut index = HnswIndex::new(
            vectors[0].len(),
            HnswParams {
                m,
                ef_construction,
                capacity: vectors.len(),
                seed: Some(seed),
            },
        )
        .unwrap();
        index.insert_batch(vectors).unwrap();
        index.freeze()
    }

    /// `copies` exact copies of each center, interleaved.
    fn duplicate_heavy(centers: &[Vec<f32>], copies: usize) -> Vec<Vec<f32>> {
        (0..copies)
            .flat_map(|_| centers.iter().cloned())
            .collect()
    }

    fn assert_exact_search(index: &FrozenIndex, vectors: &[Vec<f32>], queries: &[Vec<f32>], k: usize) {
        let ef = vectors.len();
        for q in queries {
            let approx: Vec<ItemId> = index.search(q, k, ef).unwrap().iter().map(|h| h.id).collect();
            assert_eq!(approx, brute_force(vectors, q, k));
        }
    }

    #[test]
    fn test_small_m_keeps_bounds() {
        let vectors = random_unit_vectors(120, 8, 5);
        let index = build_with(&vectors, 4, 32, 5);
        assert!(index.graph().degrees_bounded());
        assert_eq!(index.graph().reachable_at_layer0(), 120);
        for id in 0..120 {
            assert!(index.graph().neighbors(id, 0).len() <= 8);
        }
    }

    #[test]
    fn test_minimum_m_stays_connected() {
        let vectors = random_unit_vectors(200, 2, 4);
        let index = build_with(&vectors, 2, 2, 4);
        let graph = index.graph();
        assert!(graph.degrees_bounded());
        assert_eq!(graph.reachable_at_layer0(), 200);

        let queries = random_unit_vectors(10, 2, 44);
        assert_exact_search(&index, &vectors, &queries, 10);
    }

    #[test]
    fn test_minimum_m_on_clustered_vectors() {
        let centers = random_unit_vectors(4, 16, 12);
        let mut rng = StdRng::seed_from_u64(12);
        let vectors: Vec<Vec<f32>> = (0..200)
            .map(|i| {
                let jittered: Vec<f32> = centers[i % 4]
                    .iter()
                    .map(|x| x + rng.gen_range(-0.01f32..0.01))
                    .collect();
                unit(&jittered)
            })
            .collect();
        let index = build_with(&vectors, 2, 8, 12);
        assert!(index.graph().degrees_bounded());
        assert_eq!(index.graph().reachable_at_layer0(), 200);
        assert_exact_search(&index, &vectors, &centers, 20);
    }

    #[test]
    fn test_repeated_frame_keeps_every_copy_reachable() {
        let mut vectors = vec![vec![1.0, 0.0]; 60];
        vectors.push(vec![0.0, 1.0]);
        let index = build(&vectors, 1);
        let graph = index.graph();
        assert!(graph.degrees_bounded());
        assert_eq!(graph.reachable_at_layer0(), 61);

        let all = index.search(&[1.0, 0.0], 61, 200).unwrap();
        assert_eq!(all.len(), 61);
        assert_eq!(all.last().map(|h| h.id), Some(60));

        let top: Vec<ItemId> = index
            .search(&[1.0, 0.0], 50, 200)
            .unwrap()
            .iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(top, (0..50).collect::<Vec<ItemId>>());

        let odd = index.search(&[0.0, 1.0], 1, 200).unwrap();
        assert_eq!(odd[0].id, 60);
    }

    #[test]
    fn test_duplicate_clusters_connected_across_seeds() {
        let centers = random_unit_vectors(5, 8, 3);
        let vectors = duplicate_heavy(&centers, 40);
        for seed in 0..5 {
            let index = build(&vectors, seed);
            assert!(index.graph().degrees_bounded());
            assert_eq!(index.graph().reachable_at_layer0(), 200, "seed {}", seed);
            let queries = random_unit_vectors(10, 8, 100 + seed);
            assert_exact_search(&index, &vectors, &queries, 50);
        }
    }

    #[test]
    fn test_recall_matches_brute_force_with_generous_ef() {
        let vectors = random_unit_vectors(150, 12, 21);
        let index = build(&vectors, 21);
        let queries = random_unit_vectors(20, 12, 99);

        for q in &queries {
            let approx: Vec<ItemId> = index
                .search(q, 10, 200)
                .unwrap()
                .iter()
                .map(|h| h.id)
                .collect();
            assert_eq!(approx, brute_force(&vectors, q, 10));
        }
    }

    #[test]
    fn test_ranking_validity() {
        let vectors = random_unit_vectors(80, 10, 4);
        let index = build(&vectors, 4);
        for q in random_unit_vectors(10, 10, 40) {
            for k in [1, 5, 20, 100] {
                let hits = index.search(&q, k, 32).unwrap();
                assert!(hits.len() <= k && hits.len() <= 80);
                assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
                let mut ids: Vec<ItemId> = hits.iter().map(|h| h.id).collect();
                ids.sort_unstable();
                ids.dedup();
                assert_eq!(ids.len(), hits.len());
            }
        }
    }

    #[test]
    fn test_identical_vectors_ordered_by_id() {
        let mut vectors = random_unit_vectors(30, 6, 8);
        let dup = unit(&[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        vectors[5] = dup.clone();
        vectors[17] = dup.clone();
        vectors[23] = dup.clone();
        let index = build(&vectors, 8);

        for _ in 0..5 {
            let hits = index.search(&dup, 3, 64).unwrap();
            let ids: Vec<ItemId> = hits.iter().map(|h| h.id).collect();
            assert_eq!(ids, vec![5, 17, 23]);
        }
    }

    #[test]
    fn test_seeded_build_is_reproducible() {
        let vectors = random_unit_vectors(60, 8, 13);
        let a = build(&vectors, 77);
        let b = build(&vectors, 77);
        assert_eq!(a.graph().entry_point(), b.graph().entry_point());
        assert_eq!(a.graph().max_level(), b.graph().max_level());
        for id in 0..60 {
            for layer in 0..=a.graph().level(id) {
                assert_eq!(a.graph().neighbors(id, layer), b.graph().neighbors(id, layer));
            }
        }
    }

    #[test]
    fn test_level_multiplier() {
        let params = HnswParams::with_capacity(1);
        assert!((params.level_multiplier() - 1.0 / 16f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_frozen_index_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FrozenIndex>();

        let vectors = random_unit_vectors(50, 8, 6);
        let index = std::sync::Arc::new(build(&vectors, 6));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let index = std::sync::Arc::clone(&index);
                let q = vectors[i * 10].clone();
                std::thread::spawn(move || index.search(&q, 1, 64).unwrap()[0].id)
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), (i * 10) as ItemId);
        }
    }
}
