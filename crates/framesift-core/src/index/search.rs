//! Graph traversal: greedy descent, beam search within a layer, and the
//! diversity heuristic used to pick neighbors.
//!
//! All scores are inner products, so "closer" means a *larger* score and
//! [`SearchHit`]'s ordering (score, then lower ID) picks the better node.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use super::graph::Graph;
use crate::models::{ItemId, SearchHit};

/// Walk to the locally best node on each layer from `top` down to
/// `bottom + 1`, one greedy step at a time.
pub(crate) fn greedy_descend(
    graph: &Graph,
    query: &[f32],
    mut current: SearchHit,
    top: usize,
    bottom: usize,
) -> SearchHit {
    for layer in (bottom + 1..=top).rev() {
        let mut changed = true;
        while changed {
            changed = false;
            for &n in graph.neighbors(current.id, layer) {
                let hit = SearchHit::new(n, graph.similarity(n, query));
                if hit > current {
                    current = hit;
                    changed = true;
                }
            }
        }
    }
    current
}

/// Beam search over one layer.
///
/// Keeps at most `ef` results and expands the best unexpanded candidate until
/// the best remaining candidate is worse than the worst kept result. Returns
/// the kept results best-first.
pub(crate) fn search_layer(
    graph: &Graph,
    query: &[f32],
    entry_points: &[SearchHit],
    ef: usize,
    layer: usize,
) -> Vec<SearchHit> {
    let ef = ef.max(1);
    let mut visited: HashSet<ItemId> = HashSet::with_capacity(ef.saturating_mul(4).min(graph.len()));
    let mut candidates: BinaryHeap<SearchHit> = BinaryHeap::new();
    let mut results: BinaryHeap<Reverse<SearchHit>> = BinaryHeap::with_capacity(ef.min(graph.len()) + 1);

    for &ep in entry_points {
        if !visited.insert(ep.id) {
            continue;
        }
        candidates.push(ep);
        results.push(Reverse(ep));
        if results.len() > ef {
            results.pop();
        }
    }

    while let Some(current) = candidates.pop() {
        if let Some(Reverse(worst)) = results.peek() {
            if results.len() >= ef && current < *worst {
                break;
            }
        }

        for &n in graph.neighbors(current.id, layer) {
            if !visited.insert(n) {
                continue;
            }

            let hit = SearchHit::new(n, graph.similarity(n, query));
            let admit = match results.peek() {
                Some(Reverse(worst)) => results.len() < ef || hit > *worst,
                None => true,
            };
            if admit {
                candidates.push(hit);
                results.push(Reverse(hit));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    // Ascending order of Reverse<_> is descending order of the hits.
    results.into_sorted_vec().into_iter().map(|r| r.0).collect()
}

/// Choose up to `cap` neighbors from `candidates` (best-first, scored
/// against the node being linked).
///
/// A candidate is kept when it is closer to the base node than to every
/// neighbor already kept, which spreads edges across directions instead of
/// into one cluster. Slots left over are back-filled with the best rejected
/// candidates so sparse regions stay connected.
pub(crate) fn select_neighbors(graph: &Graph, candidates: &[SearchHit], cap: usize) -> Vec<ItemId> {
    if candidates.len() <= cap {
        return candidates.iter().map(|c| c.id).collect();
    }

    let mut selected: Vec<SearchHit> = Vec::with_capacity(cap);
    let mut rejected: Vec<SearchHit> = Vec::new();

    for &candidate in candidates {
        if selected.len() >= cap {
            break;
        }
        let diverse = selected
            .iter()
            .all(|s| graph.similarity_between(candidate.id, s.id) < candidate.score);
        if diverse {
            selected.push(candidate);
        } else {
            rejected.push(candidate);
        }
    }

    for candidate in rejected {
        if selected.len() >= cap {
            break;
        }
        selected.push(candidate);
    }

    selected.into_iter().map(|c| c.id).collect()
}

/// Approximate top-`k` search over the whole graph.
///
/// `ef` is raised to `k` when smaller. Returns at most `k` hits, fewer when
/// the graph has fewer nodes.
pub(crate) fn knn(graph: &Graph, query: &[f32], k: usize, ef: usize) -> Vec<SearchHit> {
    let Some(entry) = graph.entry_point() else {
        return Vec::new();
    };
    if k == 0 {
        return Vec::new();
    }

    let start = SearchHit::new(entry, graph.similarity(entry, query));
    let nearest = greedy_descend(graph, query, start, graph.max_level(), 0);

    let mut hits = search_layer(graph, query, &[nearest], ef.max(k), 0);
    hits.truncate(k);
    hits
}
