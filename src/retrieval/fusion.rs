use crate::types::{SearchResult, meta};
use std::collections::HashMap;

/// Standard RRF damping constant
pub const RRF_K_CONSTANT: f32 = 60.0;

/// One ranked leg fed into [`reciprocal_rank_fusion`]
#[derive(Debug, Clone)]
pub struct RankedList {
    /// Leg name used for the `<leg>_rank` metadata key
    pub leg: String,
    pub weight: f32,
    /// Best first
    pub results: Vec<SearchResult>,
}

impl RankedList {
    pub fn new(leg: impl Into<String>, weight: f32, results: Vec<SearchResult>) -> Self {
        Self {
            leg: leg.into(),
            weight,
            results,
        }
    }
}

struct Fused {
    result: SearchResult,
    score: f32,
    legs: Vec<String>,
}

/// Weighted Reciprocal Rank Fusion keyed on result id
///
/// A result at 1-indexed rank `r` in a leg with weight `w` contributes
/// `w / (k + r)`. Incoming scores are ignored; only positions matter. The fused
/// score replaces `.score` and is also written to `rrf_score`, alongside the
/// rank each contributing leg gave the result. A result seen by several legs
/// keeps the first leg's copy plus any metadata keys only later legs wrote.
/// Ties keep first-seen order.
pub fn reciprocal_rank_fusion(lists: Vec<RankedList>, k: f32) -> Vec<SearchResult> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut fused: Vec<Fused> = Vec::new();

    for list in lists {
        for (rank, result) in list.results.into_iter().enumerate() {
            let rank = rank + 1;
            let contribution = list.weight / (k + rank as f32);

            let slot = match index.get(&result.id) {
                Some(&slot) => {
                    fused[slot].result.metadata.merge_missing(result.metadata);
                    slot
                }
                None => {
                    index.insert(result.id.clone(), fused.len());
                    fused.push(Fused {
                        result,
                        score: 0.0,
                        legs: Vec::new(),
                    });
                    fused.len() - 1
                }
            };

            let entry = &mut fused[slot];
            entry.score += contribution;
            entry
                .result
                .metadata
                .insert(meta::leg_rank(&list.leg), rank as u64);
            if !entry.legs.contains(&list.leg) {
                entry.legs.push(list.leg.clone());
            }
        }
    }

    let mut results: Vec<SearchResult> = fused
        .into_iter()
        .map(|entry| {
            let mut result = entry.result;
            result.score = entry.score;
            result.metadata.insert(meta::RRF_SCORE, entry.score as f64);
            result.metadata.insert(meta::HYBRID_LEGS, entry.legs);
            result
        })
        .collect();

    super::sort_by_score_desc(&mut results);
    results
}
