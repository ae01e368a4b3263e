/// Exact linear-scan cosine ranking over the in-memory collection.
use std::collections::HashMap;

use {serde::Serialize, tracing::debug};

use crate::types::{Memory, MemoryKind};

/// Options for [`crate::manager::MemoryManager::search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Maximum hits returned.
    pub limit: usize,
    /// Restrict to one memory kind.
    pub kind: Option<MemoryKind>,
    /// Similarity floor; hits below it are dropped before the limit applies.
    pub min_score: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            kind: None,
            min_score: 0.0,
        }
    }
}

/// One ranked result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub memory: Memory,
    pub score: f32,
}

/// Cosine similarity over equal-length vectors. A length mismatch or a
/// zero-magnitude side yields 0.0 so scores are always comparable, never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom) as f32
}

/// Score every memory against `query_vector` and rank the survivors.
/// Memories without a stored vector or with a different dimension are
/// silently skipped. The sort is stable, so equal scores keep insertion
/// order.
pub fn rank(
    memories: &[Memory],
    embeddings: &HashMap<String, Vec<f32>>,
    query_vector: &[f32],
    options: &SearchOptions,
) -> Vec<SearchHit> {
    let mut skipped_dims = 0usize;
    let mut hits: Vec<SearchHit> = Vec::new();
    for memory in memories {
        if let Some(kind) = options.kind
            && memory.kind != kind
        {
            continue;
        }
        let Some(vector) = embeddings.get(&memory.id) else {
            continue;
        };
        if vector.len() != query_vector.len() {
            skipped_dims += 1;
            continue;
        }
        let score = cosine_similarity(query_vector, vector);
        if score >= options.min_score {
            hits.push(SearchHit {
                memory: memory.clone(),
                score,
            });
        }
    }
    if skipped_dims > 0 {
        debug!(skipped = skipped_dims, "excluded memories with mismatched embedding dimensions");
    }
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(options.limit);
    hits
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;

    use super::*;

    fn memory(id: &str, kind: MemoryKind, content: &str) -> Memory {
        Memory {
            id: id.to_string(),
            kind,
            content: content.to_string(),
            metadata: serde_json::Map::new(),
            tags: Default::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cosine_of_a_vector_with_itself_is_one() {
        let v = [0.3, -1.2, 4.5];
        let score = cosine_similarity(&v, &v);
        assert!((score - 1.0).abs() < 1e-6, "got {score}");
    }

    #[test]
    fn cosine_of_opposite_vectors_is_minus_one() {
        let v = [0.3, -1.2, 4.5];
        let opposite: Vec<f32> = v.iter().map(|x| -x).collect();
        let score = cosine_similarity(&v, &opposite);
        assert!((score + 1.0).abs() < 1e-6, "got {score}");
    }

    #[test]
    fn cosine_with_a_zero_vector_is_exactly_zero() {
        let score = cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
        assert_eq!(score, 0.0);
        assert!(!score.is_nan());
    }

    #[test]
    fn cosine_with_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn rank_orders_by_descending_score() {
        let memories = vec![
            memory("far", MemoryKind::Note, "far"),
            memory("near", MemoryKind::Note, "near"),
        ];
        let embeddings = HashMap::from([
            ("far".to_string(), vec![0.0, 1.0]),
            ("near".to_string(), vec![1.0, 0.1]),
        ]);
        let hits = rank(&memories, &embeddings, &[1.0, 0.0], &SearchOptions::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].memory.id, "near");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let memories = vec![
            memory("first", MemoryKind::Note, "a"),
            memory("second", MemoryKind::Note, "b"),
            memory("third", MemoryKind::Note, "c"),
        ];
        let same = vec![0.5, 0.5];
        let embeddings = HashMap::from([
            ("first".to_string(), same.clone()),
            ("second".to_string(), same.clone()),
            ("third".to_string(), same),
        ]);
        let hits = rank(&memories, &embeddings, &[1.0, 1.0], &SearchOptions::default());
        let ids: Vec<&str> = hits.iter().map(|h| h.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"], "stable sort must preserve insertion order");
    }

    #[test]
    fn min_score_drops_low_matches() {
        let memories = vec![
            memory("hit", MemoryKind::Note, "a"),
            memory("miss", MemoryKind::Note, "b"),
        ];
        let embeddings = HashMap::from([
            ("hit".to_string(), vec![1.0, 0.0]),
            ("miss".to_string(), vec![0.0, 1.0]),
        ]);
        let options = SearchOptions {
            min_score: 0.5,
            ..Default::default()
        };
        let hits = rank(&memories, &embeddings, &[1.0, 0.0], &options);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id, "hit");
        assert!(hits.iter().all(|h| h.score >= 0.5));
    }

    #[test]
    fn kind_filter_applies_before_scoring() {
        let memories = vec![
            memory("page", MemoryKind::WebPage, "a"),
            memory("note", MemoryKind::Note, "b"),
        ];
        let embeddings = HashMap::from([
            ("page".to_string(), vec![1.0, 0.0]),
            ("note".to_string(), vec![1.0, 0.0]),
        ]);
        let options = SearchOptions {
            kind: Some(MemoryKind::WebPage),
            ..Default::default()
        };
        let hits = rank(&memories, &embeddings, &[1.0, 0.0], &options);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id, "page");
    }

    #[test]
    fn mismatched_dimensions_are_excluded_not_fatal() {
        let memories = vec![
            memory("short", MemoryKind::Note, "a"),
            memory("full", MemoryKind::Note, "b"),
            memory("orphan", MemoryKind::Note, "c"),
        ];
        let embeddings = HashMap::from([
            ("short".to_string(), vec![1.0]),
            ("full".to_string(), vec![1.0, 0.0]),
        ]);
        let hits = rank(&memories, &embeddings, &[1.0, 0.0], &SearchOptions::default());
        assert_eq!(hits.len(), 1, "only the dimension-matched memory should rank");
        assert_eq!(hits[0].memory.id, "full");
    }

    #[test]
    fn limit_truncates_after_sorting() {
        let memories: Vec<Memory> = (0..5).map(|i| memory(&format!("m{i}"), MemoryKind::Note, "x")).collect();
        let embeddings: HashMap<String, Vec<f32>> = (0..5)
            .map(|i| (format!("m{i}"), vec![1.0, i as f32 / 10.0]))
            .collect();
        let options = SearchOptions {
            limit: 2,
            ..Default::default()
        };
        let hits = rank(&memories, &embeddings, &[1.0, 1.0], &options);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].memory.id, "m4", "closest vector should survive the cut");
    }
}
