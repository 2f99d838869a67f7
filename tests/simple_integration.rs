/// End-to-end retrieval tests driving RagClient over deterministic embeddings
use anyhow::Result;
use codebase_rag::config::Config;
use codebase_rag::embedding::{EmbeddingIntent, EmbeddingProvider};
use codebase_rag::types::{CodebaseStatsRequest, meta};
use codebase_rag::vector_db::{InMemoryVectorIndex, LanceVectorIndex, VectorIndex};
use codebase_rag::{
    ChunkRecord, ChunkType, IndexChunksRequest, RagClient, SearchRequest, SearchType,
};
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 128;

/// Hashed bag-of-words: identical token sets embed identically
struct BagOfWords;

impl EmbeddingProvider for BagOfWords {
    fn embed_batch(&self, texts: Vec<String>, _intent: EmbeddingIntent) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; DIM];
                for token in text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                {
                    let hash = token
                        .bytes()
                        .fold(0x811c9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x01000193));
                    vector[hash as usize % DIM] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "bag-of-words"
    }
}

fn record(
    id: &str,
    name: &str,
    file_path: &str,
    content: &str,
    description: Option<&str>,
) -> ChunkRecord {
    ChunkRecord {
        id: id.to_string(),
        content: content.to_string(),
        chunk_type: ChunkType::Function,
        name: name.to_string(),
        parent_name: None,
        file_path: file_path.to_string(),
        language: "python".to_string(),
        line_start: 1,
        line_end: 4,
        description: description.map(str::to_string),
    }
}

fn sample_chunks() -> Vec<ChunkRecord> {
    vec![
        record(
            "auth",
            "authenticate_user",
            "auth.py",
            "def authenticate_user(username, password):\n    user = find_user(username)\n    return user.check_password(password)",
            Some("Authenticate a user by username and password"),
        ),
        record(
            "json",
            "parse_json",
            "util.py",
            "def parse_json(text):\n    return json.loads(text)",
            Some("Parse a JSON document"),
        ),
    ]
}

async fn client_over(index: Arc<dyn VectorIndex>) -> Result<RagClient> {
    let client = RagClient::with_components(Config::ephemeral(), Arc::new(BagOfWords), index);
    let response = client
        .index_chunks(IndexChunksRequest {
            codebase_name: "demo".to_string(),
            chunks: sample_chunks(),
        })
        .await?;
    assert_eq!(response.chunks_stored, 2);
    assert_eq!(response.descriptions_embedded, 2);
    Ok(client)
}

async fn memory_client() -> Result<RagClient> {
    client_over(Arc::new(InMemoryVectorIndex::new())).await
}

#[tokio::test]
async fn test_hybrid_reranked_search_prefers_named_function() -> Result<()> {
    let client = memory_client().await?;

    let mut request = SearchRequest::new("authenticate user", "demo");
    request.search_type = SearchType::Hybrid;
    request.use_reranking = true;
    let response = client.search(request).await?;

    assert_eq!(response.results[0].name, "authenticate_user");
    let top = &response.results[0].metadata;
    assert_eq!(top.get_bool(meta::RERANKED), Some(true));
    assert!(top.contains_key(meta::RRF_SCORE));
    assert!(top.get_f64(meta::NAME_MATCH_SCORE).unwrap() > 0.9);

    // parse_json is either gone or strictly behind
    if let Some(pos) = response.results.iter().position(|r| r.name == "parse_json") {
        assert!(pos > 0);
        assert!(response.results[pos].score < response.results[0].score);
    }
    for result in &response.results {
        assert!(result.score >= 0.3);
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_keyword_query_returns_nothing() -> Result<()> {
    let client = memory_client().await?;

    let mut request = SearchRequest::new("", "demo");
    request.search_type = SearchType::Keyword;
    let response = client.search(request).await?;

    assert!(response.results.is_empty());
    assert_eq!(response.summary.as_deref(), Some("No results found for query: ''"));
    Ok(())
}

#[tokio::test]
async fn test_empty_codebase_returns_nothing_for_every_type() -> Result<()> {
    let client = RagClient::with_components(
        Config::ephemeral(),
        Arc::new(BagOfWords),
        Arc::new(InMemoryVectorIndex::new()),
    );

    for search_type in [
        SearchType::Semantic,
        SearchType::Hybrid,
        SearchType::Keyword,
        SearchType::Description,
        SearchType::Hyde,
        SearchType::HydeFull,
        SearchType::DescriptionFallback,
        SearchType::Unrecognized,
    ] {
        for use_hyde in [false, true] {
            let mut request = SearchRequest::new("authenticate user", "empty");
            request.search_type = search_type;
            request.use_hyde = use_hyde;
            request.use_reranking = true;
            let response = client.search(request).await?;
            assert!(response.results.is_empty(), "{} returned results", search_type);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_hyde_without_backend_degrades_to_semantic() -> Result<()> {
    let client = memory_client().await?;

    let mut request = SearchRequest::new("authenticate user password", "demo");
    request.search_type = SearchType::HydeFull;
    let response = client.search(request).await?;

    assert_eq!(response.results[0].name, "authenticate_user");
    assert_eq!(
        response.results[0].metadata.get_str(meta::SEARCH_METHOD),
        Some("semantic")
    );
    Ok(())
}

#[tokio::test]
async fn test_description_search_uses_descriptions() -> Result<()> {
    let client = memory_client().await?;

    let mut request = SearchRequest::new("json document", "demo");
    request.search_type = SearchType::Description;
    let response = client.search(request).await?;

    assert_eq!(response.results[0].name, "parse_json");
    assert_eq!(
        response.results[0].metadata.get_str(meta::ORIGINAL_QUERY),
        Some("json document")
    );
    Ok(())
}

#[tokio::test]
async fn test_search_filters_apply_end_to_end() -> Result<()> {
    let client = memory_client().await?;

    let mut request = SearchRequest::new("authenticate user", "demo");
    request.filters = codebase_rag::SearchFilters::default().with_language("rust");
    let response = client.search(request).await?;
    assert!(response.results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_lancedb_round_trip() -> Result<()> {
    let db_dir = TempDir::new()?;
    let index = LanceVectorIndex::with_path(&db_dir.path().to_string_lossy()).await?;
    let client = client_over(Arc::new(index)).await?;

    let mut request = SearchRequest::new("authenticate user password", "demo");
    request.search_type = SearchType::Hybrid;
    let response = client.search(request).await?;
    assert_eq!(response.results[0].name, "authenticate_user");

    let stats = client
        .codebase_stats(CodebaseStatsRequest {
            codebase_name: "demo".to_string(),
        })
        .await?;
    assert_eq!(stats.total_chunks, 2);
    assert_eq!(stats.chunks_with_description, 2);

    assert_eq!(client.list_codebases().await?.codebases, vec!["demo"]);
    Ok(())
}
