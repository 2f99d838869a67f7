//! Code-aware reranking
//!
//! Vector similarity alone misses strong lexical hints in code search: a query
//! mentioning "parse user" should favour `parse_user`, a query asking for a
//! class should favour classes. The reranker blends five sub-scores, each in
//! `[0, 1]`, into one composite score.

use crate::config::RerankConfig;
use crate::types::{ChunkType, SearchResult, meta};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word pattern"));

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "can", "that", "this",
    "these", "those", "i", "you", "he", "she", "it", "we", "they", "find", "show", "get",
    "search", "look", "where", "what", "how",
];

/// Query trigger words per preferred chunk type, checked in this order
const TYPE_TRIGGERS: &[(ChunkType, &[&str])] = &[
    (ChunkType::Function, &["function", "method", "def", "func"]),
    (ChunkType::Class, &["class", "object", "type"]),
    (ChunkType::Method, &["method", "member function"]),
];

const FUZZY_THRESHOLD: f32 = 0.8;

/// Relative weight of each sub-score in the composite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankWeights {
    pub vector: f32,
    pub name_match: f32,
    pub description: f32,
    pub chunk_type: f32,
    pub file_path: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            vector: 0.4,
            name_match: 0.25,
            description: 0.15,
            chunk_type: 0.1,
            file_path: 0.1,
        }
    }
}

impl From<&RerankConfig> for RerankWeights {
    fn from(config: &RerankConfig) -> Self {
        Self {
            vector: config.vector_weight,
            name_match: config.name_weight,
            description: config.description_weight,
            chunk_type: config.chunk_type_weight,
            file_path: config.file_path_weight,
        }
    }
}

/// Breakdown of one result's composite score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    pub vector: f32,
    pub name_match: f32,
    pub description: f32,
    pub chunk_type: f32,
    pub file_path: f32,
    pub total: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Reranker {
    weights: RerankWeights,
}

impl Reranker {
    pub fn new(weights: RerankWeights) -> Self {
        tracing::info!("Reranker initialized with weights: {:?}", weights);
        Self { weights }
    }

    pub fn weights(&self) -> &RerankWeights {
        &self.weights
    }

    /// Rescore and re-sort `results` for `query`
    ///
    /// Each result's score is replaced by its composite and the breakdown is
    /// added to its metadata. Upstream metadata is left in place.
    pub fn rerank(&self, mut results: Vec<SearchResult>, query: &str) -> Vec<SearchResult> {
        if results.is_empty() {
            return results;
        }

        let keywords = extract_keywords(query);
        tracing::debug!("Reranking {} results with keywords {:?}", results.len(), keywords);

        for result in results.iter_mut() {
            let score = self.score(result, query, &keywords);
            result.score = score.total;

            let m = &mut result.metadata;
            m.insert(meta::RERANK_SCORE, score.total as f64);
            m.insert(meta::VECTOR_SCORE, score.vector as f64);
            m.insert(meta::NAME_MATCH_SCORE, score.name_match as f64);
            m.insert(meta::DESCRIPTION_SCORE, score.description as f64);
            m.insert(meta::CHUNK_TYPE_SCORE, score.chunk_type as f64);
            m.insert(meta::FILE_PATH_SCORE, score.file_path as f64);
            m.insert(meta::RERANKED, true);
        }

        super::sort_by_score_desc(&mut results);
        results
    }

    pub fn score(&self, result: &SearchResult, query: &str, keywords: &[String]) -> RerankScore {
        let vector = result.score.clamp(0.0, 1.0);
        let name_match = name_match_score(&result.name, keywords);
        let description = description_score(result.description.as_deref(), keywords);
        let chunk_type = chunk_type_score(result.chunk_type, query);
        let file_path = file_path_score(&result.file_path, keywords);

        let w = &self.weights;
        let total = w.vector * vector
            + w.name_match * name_match
            + w.description * description
            + w.chunk_type * chunk_type
            + w.file_path * file_path;

        RerankScore {
            vector,
            name_match,
            description,
            chunk_type,
            file_path,
            total,
        }
    }
}

/// Lowercase word tokens of `query` minus stop words and tokens of two chars or fewer
pub fn extract_keywords(query: &str) -> Vec<String> {
    let query = query.to_lowercase();
    WORD.find_iter(&query)
        .map(|m| m.as_str())
        .filter(|word| word.chars().count() > 2 && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Split an identifier on camelCase humps, e.g. `HTTPServerError` -> http, server, error
fn camel_case_parts(name: &str) -> Vec<String> {
    let mut parts = Vec::new();

    for segment in name.split(|c: char| !c.is_ascii_alphabetic()) {
        let chars: Vec<char> = segment.chars().collect();
        let mut start = 0;
        for i in 1..chars.len() {
            let prev = chars[i - 1];
            let cur = chars[i];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_ascii_lowercase());
            // fooBar | FOOBar
            let boundary = (prev.is_ascii_lowercase() && cur.is_ascii_uppercase())
                || (prev.is_ascii_uppercase() && cur.is_ascii_uppercase() && next_is_lower);
            if boundary {
                parts.push(chars[start..i].iter().collect::<String>().to_lowercase());
                start = i;
            }
        }
        if start < chars.len() {
            parts.push(chars[start..].iter().collect::<String>().to_lowercase());
        }
    }

    parts
}

fn name_parts(name: &str) -> HashSet<String> {
    let mut parts: HashSet<String> = camel_case_parts(name).into_iter().collect();
    parts.extend(
        name.to_lowercase()
            .split('_')
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    );
    parts
}

/// Jaccard similarity of the two character sets reaches the threshold
fn fuzzy_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let union = set_a.union(&set_b).count();
    let intersection = set_a.intersection(&set_b).count();
    union > 0 && intersection as f32 / union as f32 >= FUZZY_THRESHOLD
}

pub fn name_match_score(name: &str, keywords: &[String]) -> f32 {
    if name.is_empty() || keywords.is_empty() {
        return 0.0;
    }

    let name_lower = name.to_lowercase();

    // Keywords that spell out the whole identifier, e.g. "parse user data" for
    // `parse_user_data`, are a full-name match
    let compact: String = name_lower.chars().filter(|c| c.is_alphanumeric()).collect();
    if keywords.len() > 1 && compact == keywords.concat() {
        return 1.0;
    }

    let parts = name_parts(name);
    let total: f32 = keywords
        .iter()
        .map(|keyword| {
            if *keyword == name_lower {
                1.0
            } else if parts.contains(keyword) {
                0.8
            } else if name_lower.contains(keyword.as_str()) {
                0.5
            } else if fuzzy_match(keyword, &name_lower) {
                0.3
            } else {
                0.0
            }
        })
        .sum();

    (total / keywords.len() as f32).min(1.0)
}

pub fn description_score(description: Option<&str>, keywords: &[String]) -> f32 {
    let Some(description) = description.filter(|d| !d.is_empty()) else {
        return 0.0;
    };
    if keywords.is_empty() {
        return 0.0;
    }

    let description = description.to_lowercase();
    let total: f32 = keywords
        .iter()
        .map(|keyword| {
            let count = description.matches(keyword.as_str()).count();
            if count > 0 {
                (0.3 * (1.0 + 0.5 * count as f32)).min(0.5)
            } else {
                0.0
            }
        })
        .sum();

    (total / keywords.len() as f32).min(1.0)
}

pub fn chunk_type_score(chunk_type: ChunkType, query: &str) -> f32 {
    let query = query.to_lowercase();
    let callable = |t: ChunkType| matches!(t, ChunkType::Function | ChunkType::Method);

    for (preferred, triggers) in TYPE_TRIGGERS {
        if !triggers.iter().any(|t| query.contains(t)) {
            continue;
        }
        if chunk_type == *preferred {
            return 1.0;
        }
        if callable(chunk_type) && callable(*preferred) {
            return 0.7;
        }
    }

    match chunk_type {
        ChunkType::Function => 0.8,
        ChunkType::Class => 0.7,
        ChunkType::Method => 0.6,
        ChunkType::Text => 0.3,
        ChunkType::Other => 0.5,
    }
}

pub fn file_path_score(file_path: &str, keywords: &[String]) -> f32 {
    if file_path.is_empty() || keywords.is_empty() {
        return 0.0;
    }
    let path = file_path.to_lowercase();
    let hits = keywords.iter().filter(|k| path.contains(k.as_str())).count();
    (hits as f32 * 0.5 / keywords.len() as f32).min(1.0)
}
