use std::collections::HashMap;

use ragindex_core::types::{SearchHit, SourceKind};

pub const DEFAULT_RRF_K: usize = 60;

/// Reciprocal Rank Fusion over two ranked lists.
#[derive(Debug, Clone, Copy)]
pub struct FusionRanker {
    k: usize,
}

impl Default for FusionRanker {
    fn default() -> Self { Self { k: DEFAULT_RRF_K } }
}

impl FusionRanker {
    pub fn new(k: usize) -> Self { Self { k } }

    /// Each occurrence at 0-based rank `r` of its own list contributes
    /// `1 / (k + r + 1)`; input scores are ignored. The result holds every id
    /// once, best first, ties kept in first-seen order across `a` then `b`.
    pub fn combine(&self, a: &[SearchHit], b: &[SearchHit]) -> Vec<SearchHit> {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut fused: Vec<(SearchHit, f64)> = Vec::new();
        for list in [a, b] {
            for (rank, hit) in list.iter().enumerate() {
                let contribution = 1.0 / (self.k + rank + 1) as f64;
                match slots.get(hit.id.as_str()) {
                    Some(&i) => fused[i].1 += contribution,
                    None => {
                        slots.insert(hit.id.as_str(), fused.len());
                        fused.push((hit.clone(), contribution));
                    }
                }
            }
        }
        // sort_by is stable
        fused.sort_by(|x, y| y.1.total_cmp(&x.1));
        fused.into_iter()
            .map(|(hit, score)| SearchHit { score: score as f32, source: SourceKind::Fused, ..hit })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(ids: &[&str]) -> Vec<SearchHit> {
        ids.iter().enumerate()
            .map(|(i, id)| SearchHit { id: id.to_string(), row: i, score: 100.0 - i as f32, source: SourceKind::Lexical })
            .collect()
    }

    fn ids(fused: &[SearchHit]) -> Vec<&str> { fused.iter().map(|h| h.id.as_str()).collect() }

    #[test]
    fn chunk_in_both_lists_outranks_single_list_chunk() {
        let fused = FusionRanker::default().combine(&hits(&["a", "b"]), &hits(&["c", "b"]));
        assert_eq!(ids(&fused), vec!["b", "a", "c"]);
        let expected_b = 2.0 / 62.0;
        assert!((fused[0].score as f64 - expected_b).abs() < 1e-6);
        assert!(fused.iter().all(|h| h.source == SourceKind::Fused));
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let fused = FusionRanker::default().combine(&hits(&["a", "b"]), &hits(&["c", "d"]));
        assert_eq!(ids(&fused), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn swapping_inputs_keeps_scores() {
        let ranker = FusionRanker::new(10);
        let a = hits(&["x", "y", "z"]);
        let b = hits(&["z", "w"]);
        let ab = ranker.combine(&a, &b);
        let ba = ranker.combine(&b, &a);
        let scores = |v: &[SearchHit]| {
            let mut m: Vec<(String, f32)> = v.iter().map(|h| (h.id.clone(), h.score)).collect();
            m.sort_by(|p, q| p.0.cmp(&q.0));
            m
        };
        assert_eq!(scores(&ab), scores(&ba));
    }

    #[test]
    fn input_scores_are_ignored() {
        let mut a = hits(&["a", "b"]);
        a[1].score = 1e9;
        let fused = FusionRanker::default().combine(&a, &[]);
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        assert!(FusionRanker::default().combine(&[], &[]).is_empty());
    }
}
