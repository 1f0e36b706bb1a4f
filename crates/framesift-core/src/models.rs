//! Result types shared by the search engine, ranker, and app crate.

use std::cmp::Ordering;

use serde::Serialize;

/// Dense 0-based identifier assigned to a corpus item on insertion.
pub type ItemId = u32;

/// One raw search hit: an item and its inner-product score.
///
/// Ordered so that the *better* hit compares greater: higher score first,
/// then lower ID. Sorting a `Vec<SearchHit>` descending therefore yields the
/// canonical result order with deterministic tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: ItemId,
    pub score: f32,
}

impl SearchHit {
    pub fn new(id: ItemId, score: f32) -> Self {
        Self { id, score }
    }
}

impl Eq for SearchHit {}

impl PartialOrd for SearchHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchHit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A ranked, presentation-ready search result.
///
/// Serializes as `{rank, path, score}`; the internal item ID is kept for
/// callers but left out of JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// 1-based position in the result list.
    pub rank: usize,
    #[serde(skip)]
    pub item_id: ItemId,
    /// Source path of the corpus item.
    pub path: String,
    /// Cosine similarity in `[-1.0, 1.0]` (for a unit query).
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_score_is_greater() {
        assert!(SearchHit::new(5, 0.9) > SearchHit::new(1, 0.1));
    }

    #[test]
    fn equal_scores_prefer_lower_id() {
        assert!(SearchHit::new(1, 0.5) > SearchHit::new(2, 0.5));

        let mut hits = vec![
            SearchHit::new(3, 0.5),
            SearchHit::new(1, 0.5),
            SearchHit::new(2, 0.7),
        ];
        hits.sort_by(|a, b| b.cmp(a));
        let ids: Vec<ItemId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn ranked_result_json_shape() {
        let r = RankedResult {
            rank: 1,
            item_id: 7,
            path: "frames/a.png".into(),
            score: 0.5,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"rank": 1, "path": "frames/a.png", "score": 0.5})
        );
    }
}
