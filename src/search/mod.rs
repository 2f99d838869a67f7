//! Search orchestration
//!
//! [`SearchEngine`] maps each [`SearchType`] onto a fixed pipeline of the
//! retrieval stages. Nothing here returns an error: an unavailable stage is
//! logged and the pipeline degrades (HyDE to semantic, description fallback to
//! HyDE), and a failed query embedding yields an empty list for that branch.

use crate::config::Config;
use crate::embedding::{EmbeddingIntent, EmbeddingService};
use crate::retrieval::hyde::build_stage_context;
use crate::retrieval::{
    ConfidenceFilter, DiversityFilter, HydeGenerator, PassthroughTranslator, RankedList,
    RelevanceJudge, RerankWeights, Reranker, Translator, reciprocal_rank_fusion,
    sort_by_score_desc,
};
use crate::types::{ChunkType, SearchFilters, SearchRequest, SearchResult, SearchType, meta};
use crate::vector_db::{VectorIndex, VectorSpace};
use rayon::prelude::*;
use std::sync::Arc;

// search_method values
const METHOD_SEMANTIC: &str = "semantic";
const METHOD_KEYWORD: &str = "keyword";
const METHOD_DESCRIPTION: &str = "description";
const METHOD_HYDE: &str = "hyde";
const METHOD_SCAN: &str = "scan";

/// Tunables for routing and fusion
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    /// Result count for requests that do not name one
    pub default_top_k: usize,
    pub rrf_k: f32,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub hyde_weight: f32,
    pub description_weight: f32,
    /// Candidates enumerated for lexical scoring
    pub keyword_pool_size: usize,
    /// Fan-out of the stage-one search in two-stage HyDE
    pub preliminary_top_k: usize,
    /// Stage-one results rendered into the stage-two context
    pub context_results: usize,
    pub context_chars: usize,
    /// Reranking sees `top_k * candidate_multiplier` candidates
    pub candidate_multiplier: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            rrf_k: 60.0,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            hyde_weight: 0.6,
            description_weight: 0.4,
            keyword_pool_size: 1000,
            preliminary_top_k: 5,
            context_results: 3,
            context_chars: 3000,
            candidate_multiplier: 2,
        }
    }
}

impl From<&Config> for SearchSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_top_k: config.search.default_top_k,
            rrf_k: config.search.rrf_k,
            semantic_weight: config.search.semantic_weight,
            keyword_weight: config.search.keyword_weight,
            hyde_weight: config.hyde.hybrid_hyde_weight,
            description_weight: config.hyde.hybrid_description_weight,
            keyword_pool_size: config.search.keyword_pool_size,
            preliminary_top_k: config.hyde.preliminary_top_k,
            context_results: config.hyde.context_results,
            context_chars: config.hyde.context_chars,
            candidate_multiplier: config.rerank.candidate_multiplier,
        }
    }
}

/// Borrowed view of the parts of a request every leg needs
#[derive(Clone, Copy)]
struct Query<'a> {
    text: &'a str,
    codebase: &'a str,
    filters: &'a SearchFilters,
}

/// Multi-strategy code search over one vector index
///
/// Built once with its collaborators; holds no per-request state, so one
/// engine serves concurrent searches.
pub struct SearchEngine {
    embeddings: EmbeddingService,
    index: Arc<dyn VectorIndex>,
    hyde: HydeGenerator,
    translator: Arc<dyn Translator>,
    judge: Option<Arc<dyn RelevanceJudge>>,
    reranker: Reranker,
    confidence: ConfidenceFilter,
    diversity: DiversityFilter,
    settings: SearchSettings,
}

impl SearchEngine {
    /// Engine with HyDE, translation and judging disabled and default tunables
    pub fn new(embeddings: EmbeddingService, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embeddings,
            index,
            hyde: HydeGenerator::disabled(),
            translator: Arc::new(PassthroughTranslator),
            judge: None,
            reranker: Reranker::default(),
            confidence: ConfidenceFilter::default(),
            diversity: DiversityFilter::default(),
            settings: SearchSettings::default(),
        }
    }

    /// Apply every tunable from `config`
    pub fn configured(mut self, config: &Config) -> Self {
        self.settings = SearchSettings::from(config);
        self.reranker = Reranker::new(RerankWeights::from(&config.rerank));
        self.confidence = ConfidenceFilter::new(config.rerank.min_score);
        self.diversity = DiversityFilter::new(config.rerank.max_per_file);
        self
    }

    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_hyde(mut self, hyde: HydeGenerator) -> Self {
        self.hyde = hyde;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    /// Judges are only consulted when they report themselves available
    pub fn with_judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.judge = judge.is_available().then_some(judge);
        self
    }

    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn with_filters(mut self, confidence: ConfidenceFilter, diversity: DiversityFilter) -> Self {
        self.confidence = confidence;
        self.diversity = diversity;
        self
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn hyde_available(&self) -> bool {
        self.hyde.is_available()
    }

    pub fn embeddings(&self) -> &EmbeddingService {
        &self.embeddings
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Run one search; at most `request.top_k` (or the default) results, best first
    ///
    /// With reranking the pipeline is rerank, confidence filter, diversity
    /// filter, truncate.
    pub async fn search(&self, request: &SearchRequest) -> Vec<SearchResult> {
        let query = Query {
            text: &request.query,
            codebase: &request.codebase_name,
            filters: &request.filters,
        };
        let top_k = request.top_k_or(self.settings.default_top_k);
        let fetch_k = if request.use_reranking {
            top_k * self.settings.candidate_multiplier.max(1)
        } else {
            top_k
        };

        tracing::info!(
            "Search '{}' in '{}' (type: {}, top_k: {}, hyde: {}, rerank: {})",
            request.query,
            request.codebase_name,
            request.search_type,
            top_k,
            request.use_hyde,
            request.use_reranking
        );

        let mut results = self
            .route(query, request.search_type, request.use_hyde, fetch_k)
            .await;

        if request.use_reranking && !results.is_empty() {
            // Hybrid output carries raw RRF scores (at most 1 / (rrf_k + 1)) into the
            // vector sub-score, so lexical signals decide the order of fused results
            // and hits with no lexical support fall under the confidence floor.
            results = self.reranker.rerank(results, &request.query);
            results = self.confidence.filter(results);
            results = self.diversity.filter(results);
        }

        results.truncate(top_k);
        tracing::info!("Search returned {} results", results.len());
        results
    }

    async fn route(
        &self,
        query: Query<'_>,
        search_type: SearchType,
        use_hyde: bool,
        top_k: usize,
    ) -> Vec<SearchResult> {
        match search_type {
            SearchType::Semantic if use_hyde && self.hyde.is_available() => {
                self.quick_hyde_search(query, top_k).await
            }
            SearchType::Semantic => self.semantic_search(query, top_k).await,
            SearchType::Hybrid if use_hyde => self.hyde_description_hybrid(query, top_k).await,
            SearchType::Hybrid => self.semantic_keyword_hybrid(query, top_k).await,
            SearchType::Keyword => self.keyword_search(query, top_k).await,
            SearchType::Description => self.description_search(query, top_k).await,
            SearchType::Hyde => self.hyde_search(query, top_k).await,
            SearchType::HydeFull => self.full_hyde_search(query, top_k).await,
            SearchType::DescriptionFallback => self.description_with_fallback(query, top_k).await,
            SearchType::Unrecognized => {
                tracing::warn!("Unknown search type, using semantic");
                self.semantic_search(query, top_k).await
            }
        }
    }

    /// Nearest neighbors of `vector`, with distances converted to similarities
    async fn vector_search(
        &self,
        query: Query<'_>,
        vector: &[f32],
        top_k: usize,
        space: VectorSpace,
    ) -> Vec<SearchResult> {
        let hits = match self
            .index
            .search(query.codebase, vector, top_k, query.filters, space)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!(
                    "Vector search ({}) failed for codebase '{}': {:#}",
                    space.as_str(),
                    query.codebase,
                    e
                );
                return Vec::new();
            }
        };

        hits.into_iter()
            .map(|hit| {
                let similarity = 1.0 - hit.distance;
                let mut result = SearchResult::from_record(hit.record, similarity);
                result.metadata.insert(meta::DISTANCE, hit.distance as f64);
                result.metadata.insert(meta::SIMILARITY, similarity as f64);
                result
            })
            .collect()
    }

    /// Embed `text` with `intent` and search `space`; empty if embedding fails
    async fn embed_and_search(
        &self,
        query: Query<'_>,
        text: &str,
        intent: EmbeddingIntent,
        top_k: usize,
        space: VectorSpace,
    ) -> Vec<SearchResult> {
        let Some(vector) = self.embeddings.embed(text, intent).await else {
            tracing::error!("Failed to generate {} embedding", intent.as_str());
            return Vec::new();
        };
        self.vector_search(query, &vector, top_k, space).await
    }

    pub(crate) async fn semantic_search_for(
        &self,
        query: &str,
        codebase: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let query = Query {
            text: query,
            codebase,
            filters,
        };
        self.semantic_search(query, top_k).await
    }

    async fn semantic_search(&self, query: Query<'_>, top_k: usize) -> Vec<SearchResult> {
        let mut results = self
            .embed_and_search(
                query,
                query.text,
                EmbeddingIntent::Query,
                top_k,
                VectorSpace::Content,
            )
            .await;
        tag(&mut results, meta::SEARCH_METHOD, METHOD_SEMANTIC);
        results
    }

    /// Lexical scoring over an enumerated candidate pool
    ///
    /// Each query word found in the content scores 1, each found in the name
    /// scores 2. Results with no matches are dropped.
    async fn keyword_search(&self, query: Query<'_>, top_k: usize) -> Vec<SearchResult> {
        let words: Vec<String> = query
            .text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if words.is_empty() {
            return Vec::new();
        }

        let records = match self
            .index
            .scan(query.codebase, self.settings.keyword_pool_size, query.filters)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Keyword candidate scan failed for '{}': {:#}", query.codebase, e);
                return Vec::new();
            }
        };
        let pool = records.len();

        let mut results: Vec<SearchResult> = records
            .into_par_iter()
            .filter_map(|record| {
                let content = record.content.to_lowercase();
                let name = record.name.to_lowercase();
                let content_score = words.iter().filter(|w| content.contains(w.as_str())).count();
                let name_score = 2 * words.iter().filter(|w| name.contains(w.as_str())).count();
                let total = content_score + name_score;
                if total == 0 {
                    return None;
                }

                let mut result = SearchResult::from_record(record, total as f32);
                result.metadata.insert(meta::SEARCH_METHOD, METHOD_KEYWORD);
                result.metadata.insert(meta::KEYWORD_MATCHES, total as u64);
                Some(result)
            })
            .collect();

        sort_by_score_desc(&mut results);
        results.truncate(top_k);
        tracing::debug!("Keyword search matched {} of {} candidates", results.len(), pool);
        results
    }

    /// Query against description vectors, translating Korean queries first
    async fn description_search(&self, query: Query<'_>, top_k: usize) -> Vec<SearchResult> {
        let translated = if self.translator.is_available() {
            self.translator.translate(query.text).await
        } else {
            query.text.to_string()
        };
        let was_translated = translated != query.text;
        if was_translated {
            tracing::info!("Description search using translated query: {}", translated);
        }

        let mut results = self
            .embed_and_search(
                query,
                &translated,
                EmbeddingIntent::Query,
                top_k,
                VectorSpace::Description,
            )
            .await;

        for result in results.iter_mut() {
            let m = &mut result.metadata;
            m.insert(meta::SEARCH_METHOD, METHOD_DESCRIPTION);
            m.insert(meta::ORIGINAL_QUERY, query.text);
            if was_translated {
                m.insert(meta::TRANSLATED_QUERY, translated.as_str());
            }
        }
        results
    }

    /// Search content vectors with generated code embedded as a document
    async fn code_search(&self, query: Query<'_>, code: &str, top_k: usize) -> Vec<SearchResult> {
        self.embed_and_search(
            query,
            code,
            EmbeddingIntent::Document,
            top_k,
            VectorSpace::Content,
        )
        .await
    }

    /// Semantic search routed through a single quick HyDE call
    async fn quick_hyde_search(&self, query: Query<'_>, top_k: usize) -> Vec<SearchResult> {
        let Some(code) = self.hyde.generate_quick(query.text).await else {
            tracing::warn!("Quick HyDE failed, falling back to semantic search");
            return self.semantic_search(query, top_k).await;
        };

        let mut results = self.code_search(query, &code, top_k).await;
        for result in results.iter_mut() {
            let m = &mut result.metadata;
            m.insert(meta::SEARCH_METHOD, METHOD_HYDE);
            m.insert(meta::HYDE_VARIANT, "quick");
            m.insert(meta::HYDE_STAGE1_CHARS, code.chars().count() as u64);
        }
        results
    }

    /// Single-stage HyDE; plain semantic search when generation is unavailable or fails
    async fn hyde_search(&self, query: Query<'_>, top_k: usize) -> Vec<SearchResult> {
        if !self.hyde.is_available() {
            tracing::warn!("HyDE unavailable, falling back to semantic search");
            return self.semantic_search(query, top_k).await;
        }
        let Some(code) = self.hyde.generate_stage_one(query.text).await else {
            tracing::warn!("HyDE generation failed, falling back to semantic search");
            return self.semantic_search(query, top_k).await;
        };

        let mut results = self.code_search(query, &code, top_k).await;
        for result in results.iter_mut() {
            let m = &mut result.metadata;
            m.insert(meta::SEARCH_METHOD, METHOD_HYDE);
            m.insert(meta::HYDE_VARIANT, "single");
            m.insert(meta::HYDE_STAGE1_CHARS, code.chars().count() as u64);
        }
        results
    }

    /// Two-stage HyDE
    ///
    /// Stage-one code drives a small preliminary search whose hits become
    /// context for a second, codebase-aware generation. Stage-one failure
    /// falls back to semantic search, an empty preliminary search returns
    /// nothing, and a stage-two failure returns the preliminary hits.
    async fn full_hyde_search(&self, query: Query<'_>, top_k: usize) -> Vec<SearchResult> {
        if !self.hyde.is_available() {
            tracing::warn!("HyDE unavailable, falling back to semantic search");
            return self.semantic_search(query, top_k).await;
        }
        let Some(stage_one) = self.hyde.generate_stage_one(query.text).await else {
            tracing::warn!("HyDE stage 1 failed, falling back to semantic search");
            return self.semantic_search(query, top_k).await;
        };
        let stage_one_chars = stage_one.chars().count() as u64;

        let mut preliminary = self
            .code_search(query, &stage_one, self.settings.preliminary_top_k)
            .await;
        if preliminary.is_empty() {
            tracing::warn!("HyDE stage 1 search found nothing, no context for stage 2");
            return preliminary;
        }

        let context = build_stage_context(&preliminary, self.settings.context_results);
        let Some(stage_two) = self
            .hyde
            .generate_stage_two(query.text, &stage_one, &context, self.settings.context_chars)
            .await
        else {
            tracing::warn!("HyDE stage 2 failed, returning stage 1 results");
            preliminary.truncate(top_k);
            for result in preliminary.iter_mut() {
                let m = &mut result.metadata;
                m.insert(meta::SEARCH_METHOD, METHOD_HYDE);
                m.insert(meta::HYDE_VARIANT, "full");
                m.insert(meta::HYDE_STAGE1_CHARS, stage_one_chars);
                m.insert(meta::HYDE_FALLBACK_STAGE1, true);
            }
            return preliminary;
        };

        let mut results = self.code_search(query, &stage_two, top_k * 2).await;
        results.truncate(top_k);
        let stage_two_chars = stage_two.chars().count() as u64;
        for result in results.iter_mut() {
            let m = &mut result.metadata;
            m.insert(meta::SEARCH_METHOD, METHOD_HYDE);
            m.insert(meta::HYDE_VARIANT, "full");
            m.insert(meta::HYDE_STAGE1_CHARS, stage_one_chars);
            m.insert(meta::HYDE_STAGE2_CHARS, stage_two_chars);
        }
        results
    }

    /// RRF of semantic and keyword legs, run concurrently
    async fn semantic_keyword_hybrid(&self, query: Query<'_>, top_k: usize) -> Vec<SearchResult> {
        let (semantic, keyword) = tokio::join!(
            self.semantic_search(query, top_k * 2),
            self.keyword_search(query, top_k * 2)
        );
        tracing::debug!(
            "Hybrid legs: {} semantic, {} keyword",
            semantic.len(),
            keyword.len()
        );

        let mut fused = reciprocal_rank_fusion(
            vec![
                RankedList::new(METHOD_SEMANTIC, self.settings.semantic_weight, semantic),
                RankedList::new(METHOD_KEYWORD, self.settings.keyword_weight, keyword),
            ],
            self.settings.rrf_k,
        );
        fused.truncate(top_k);
        fused
    }

    /// RRF of a HyDE leg and a description leg, run concurrently
    async fn hyde_description_hybrid(&self, query: Query<'_>, top_k: usize) -> Vec<SearchResult> {
        let (hyde, description) = tokio::join!(
            self.hyde_search(query, top_k * 2),
            self.description_search(query, top_k * 2)
        );
        tracing::debug!(
            "HyDE hybrid legs: {} hyde, {} description",
            hyde.len(),
            description.len()
        );

        let mut fused = reciprocal_rank_fusion(
            vec![
                RankedList::new(METHOD_HYDE, self.settings.hyde_weight, hyde),
                RankedList::new(METHOD_DESCRIPTION, self.settings.description_weight, description),
            ],
            self.settings.rrf_k,
        );
        fused.truncate(top_k);
        fused
    }

    /// Description search, switching to two-stage HyDE when it comes back
    /// empty or a relevance judge rejects its top hit
    async fn description_with_fallback(
        &self,
        query: Query<'_>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let description = self.description_search(query, top_k).await;

        let reason = if description.is_empty() {
            "no_description_results"
        } else if let Some(ref judge) = self.judge {
            if judge.judge(query.text, &description[0]).await {
                return description;
            }
            "top_result_irrelevant"
        } else {
            return description;
        };

        tracing::info!("Description search fallback to HyDE ({})", reason);
        let mut results = self.full_hyde_search(query, top_k).await;
        if results.is_empty() && !description.is_empty() {
            tracing::warn!("HyDE fallback found nothing, keeping description results");
            return description;
        }
        tag(&mut results, meta::FALLBACK_REASON, reason);
        results
    }

    /// Semantic search restricted to one chunk type
    pub async fn search_by_type(
        &self,
        query: &str,
        codebase: &str,
        chunk_type: ChunkType,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let filters = SearchFilters::default().with_chunk_type(chunk_type.as_str());
        self.semantic_search_for(query, codebase, &filters, top_k).await
    }

    /// Semantic search restricted to one language
    pub async fn search_by_language(
        &self,
        query: &str,
        codebase: &str,
        language: &str,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let filters = SearchFilters::default().with_language(language);
        self.semantic_search_for(query, codebase, &filters, top_k).await
    }

    /// Hybrid search for functions resembling `function_name`
    pub async fn find_similar_functions(
        &self,
        function_name: &str,
        codebase: &str,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let text = format!("function {}", function_name);
        let filters = SearchFilters::default().with_chunk_type(ChunkType::Function.as_str());
        let query = Query {
            text: &text,
            codebase,
            filters: &filters,
        };
        let mut results = self.semantic_keyword_hybrid(query, top_k).await;
        results.truncate(top_k);
        results
    }

    /// Chunks whose enclosing scope is `class_name`, in file and line order
    pub async fn find_class_methods(
        &self,
        class_name: &str,
        codebase: &str,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let filters = SearchFilters::default().with_parent_name(class_name);
        let records = match self
            .index
            .scan(codebase, self.settings.keyword_pool_size, &filters)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Class method scan failed for '{}': {:#}", codebase, e);
                return Vec::new();
            }
        };

        let mut results: Vec<SearchResult> = records
            .into_iter()
            .map(|record| {
                let mut result = SearchResult::from_record(record, 1.0);
                result.metadata.insert(meta::SEARCH_METHOD, METHOD_SCAN);
                result
            })
            .collect();
        results.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.line_start.cmp(&b.line_start))
        });
        results.truncate(top_k);
        results
    }
}

fn tag(results: &mut [SearchResult], key: &str, value: &str) {
    for result in results.iter_mut() {
        result.metadata.insert(key, value);
    }
}
