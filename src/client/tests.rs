use super::*;
use crate::vector_db::InMemoryVectorIndex;
use tempfile::TempDir;

const DIM: usize = 64;

/// Token-bucket embedder; texts containing "boom" fail, texts containing "slow" stall
struct TestEmbedder;

fn bucket_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIM];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let hash = token.bytes().fold(5381u64, |h, b| h.wrapping_mul(33) ^ b as u64);
        vector[(hash % DIM as u64) as usize] += 1.0;
    }
    vector
}

impl EmbeddingProvider for TestEmbedder {
    fn embed_batch(
        &self,
        texts: Vec<String>,
        _intent: EmbeddingIntent,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains("slow")) {
            std::thread::sleep(Duration::from_millis(1500));
        }
        if texts.iter().any(|t| t.contains("boom")) {
            anyhow::bail!("embedding failure");
        }
        Ok(texts.iter().map(|t| bucket_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "test-embedder"
    }
}

// Helper to create a test client over the in-memory index
fn create_test_client() -> RagClient {
    create_client_with(Config::ephemeral())
}

fn create_client_with(config: Config) -> RagClient {
    RagClient::with_components(
        config,
        Arc::new(TestEmbedder),
        Arc::new(InMemoryVectorIndex::new()),
    )
}

fn chunk(id: &str, name: &str, content: &str, description: Option<&str>) -> ChunkRecord {
    ChunkRecord {
        id: id.to_string(),
        content: content.to_string(),
        chunk_type: ChunkType::Function,
        name: name.to_string(),
        parent_name: None,
        file_path: format!("src/{}.py", name),
        language: "python".to_string(),
        line_start: 1,
        line_end: 3,
        description: description.map(str::to_string),
    }
}

async fn seeded_client() -> RagClient {
    seeded_client_with(Config::ephemeral()).await
}

async fn seeded_client_with(config: Config) -> RagClient {
    let client = create_client_with(config);
    client
        .index_chunks(IndexChunksRequest {
            codebase_name: "demo".to_string(),
            chunks: vec![
                chunk(
                    "1",
                    "authenticate_user",
                    "def authenticate_user(username, password):\n    return check(username, password)",
                    Some("Authenticate a user with a password"),
                ),
                chunk(
                    "2",
                    "parse_json",
                    "def parse_json(text):\n    return json.loads(text)",
                    None,
                ),
            ],
        })
        .await
        .unwrap();
    client
}

// ===== Client Initialization Tests =====

#[test]
fn test_client_clone_and_accessors() {
    let client = create_test_client();
    let cloned = client.clone();
    assert_eq!(cloned.embedding_dimension(), DIM);
    assert_eq!(client.config().vector_db.backend, "memory");
    assert!(!client.engine().hyde_available());
}

#[tokio::test]
async fn test_with_config_rejects_unknown_backend() {
    let mut config = Config::ephemeral();
    config.vector_db.backend = "qdrant".to_string();
    let result = RagClient::with_config(config).await;
    assert!(result.is_err());
}

// ===== Search Tests =====

#[tokio::test]
async fn test_search_validates_request() {
    let client = create_test_client();

    let err = client
        .search(SearchRequest::new("q", ""))
        .await
        .unwrap_err();
    assert!(err.is_user_error());

    let mut request = SearchRequest::new("q", "demo");
    request.top_k = Some(0);
    assert!(client.search(request).await.unwrap_err().is_user_error());

    let mut config = Config::ephemeral();
    config.search.max_top_k = 10;
    let client = create_client_with(config);
    let mut request = SearchRequest::new("q", "demo");
    request.top_k = Some(20);
    assert!(client.search(request).await.unwrap_err().is_user_error());
}

#[tokio::test]
async fn test_search_uses_configured_default_top_k() {
    let mut config = Config::ephemeral();
    config.search.default_top_k = 1;
    let client = seeded_client_with(config).await;

    let response = client
        .search(SearchRequest::new("def return", "demo"))
        .await
        .unwrap();
    assert_eq!(response.total_results, 1);

    let response = client
        .search(SearchRequest::new("def return", "demo").with_top_k(2))
        .await
        .unwrap();
    assert_eq!(response.total_results, 2);
}

#[tokio::test]
async fn test_search_builds_context_and_summary() {
    let client = seeded_client().await;
    let response = client
        .search(SearchRequest::new("authenticate user password", "demo"))
        .await
        .unwrap();

    assert_eq!(response.results[0].name, "authenticate_user");
    assert_eq!(response.total_results, response.results.len());
    let context = response.context.unwrap();
    assert!(context.starts_with("Query: authenticate user password"));
    assert!(context.contains("## File: src/authenticate_user.py"));
    assert!(response.summary.unwrap().starts_with("Search Results for:"));
}

#[tokio::test]
async fn test_search_without_context() {
    let client = seeded_client().await;
    let mut request = SearchRequest::new("parse json", "demo");
    request.include_context = false;

    let response = client.search(request).await.unwrap();
    assert!(response.context.is_none());
    assert!(response.summary.is_none());
    assert!(!response.results.is_empty());
}

#[tokio::test]
async fn test_search_unknown_codebase_is_empty() {
    let client = create_test_client();
    let response = client
        .search(SearchRequest::new("anything", "missing"))
        .await
        .unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.context.as_deref(), Some("No relevant code found."));
}

#[tokio::test]
async fn test_search_timeout_reports_request() {
    let mut config = Config::ephemeral();
    config.search.timeout_secs = 1;
    let client = create_client_with(config);

    let err = client
        .search(SearchRequest::new("slow query", "demo"))
        .await
        .unwrap_err();
    match err {
        RagError::Search(SearchError::TimedOut {
            query,
            codebase_name,
            secs,
        }) => {
            assert_eq!(query, "slow query");
            assert_eq!(codebase_name, "demo");
            assert_eq!(secs, 1);
        }
        other => panic!("expected timeout, got {}", other),
    }
}

// ===== Ingestion Tests =====

#[tokio::test]
async fn test_index_chunks_counts() {
    let client = create_test_client();
    let response = client
        .index_chunks(IndexChunksRequest {
            codebase_name: "demo".to_string(),
            chunks: vec![
                chunk("1", "a", "def a(): pass", Some("does a")),
                chunk("2", "b", "def b(): boom", None),
                chunk("3", "c", "def c(): pass", Some("boom description")),
                chunk("4", "d", "def d(): pass", Some("   ")),
            ],
        })
        .await
        .unwrap();

    assert_eq!(response.chunks_received, 4);
    assert_eq!(response.chunks_stored, 3);
    assert_eq!(response.descriptions_embedded, 1);
    assert_eq!(response.errors.len(), 2);
    assert!(response.errors[0].contains("content of chunk '2'"));
    assert!(response.errors[1].contains("description of chunk '3'"));
}

#[tokio::test]
async fn test_index_chunks_validates() {
    let client = create_test_client();
    let result = client
        .index_chunks(IndexChunksRequest {
            codebase_name: "bad name!".to_string(),
            chunks: vec![],
        })
        .await;
    assert!(result.unwrap_err().is_user_error());

    let result = client
        .index_chunks(IndexChunksRequest {
            codebase_name: "demo".to_string(),
            chunks: vec![chunk(" ", "a", "def a(): pass", None)],
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_index_empty_chunk_list() {
    let client = create_test_client();
    let response = client
        .index_chunks(IndexChunksRequest {
            codebase_name: "demo".to_string(),
            chunks: vec![],
        })
        .await
        .unwrap();
    assert_eq!(response.chunks_stored, 0);
    assert!(client.list_codebases().await.unwrap().codebases.is_empty());
}

// ===== Codebase Management Tests =====

#[tokio::test]
async fn test_list_stats_and_delete() {
    let client = seeded_client().await;

    assert_eq!(client.list_codebases().await.unwrap().codebases, vec!["demo"]);

    let stats = client
        .codebase_stats(CodebaseStatsRequest {
            codebase_name: "demo".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(stats.total_chunks, 2);
    assert_eq!(stats.chunks_with_description, 1);
    assert_eq!(stats.language_breakdown[0].key, "python");
    assert_eq!(stats.language_breakdown[0].count, 2);

    let deleted = client
        .delete_codebase(DeleteCodebaseRequest {
            codebase_name: "demo".to_string(),
        })
        .await
        .unwrap();
    assert!(deleted.success);

    let again = client
        .delete_codebase(DeleteCodebaseRequest {
            codebase_name: "demo".to_string(),
        })
        .await
        .unwrap();
    assert!(!again.success);
    assert!(again.message.contains("was not indexed"));
}

#[tokio::test]
async fn test_stats_for_unknown_codebase_are_zero() {
    let client = create_test_client();
    let stats = client
        .codebase_stats(CodebaseStatsRequest {
            codebase_name: "missing".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(stats.total_chunks, 0);
    assert!(stats.chunk_type_breakdown.is_empty());
}

// ===== Embedding Cache Tests =====

#[tokio::test]
async fn test_embedding_cache_persists_across_clients() {
    let temp_dir = TempDir::new().unwrap();
    let cache_path = temp_dir.path().join("embeddings.json");
    let mut config = Config::ephemeral();
    config.cache.persist = true;
    config.cache.embedding_cache_path = cache_path.clone();

    let client = create_client_with(config.clone());
    client
        .index_chunks(IndexChunksRequest {
            codebase_name: "demo".to_string(),
            chunks: vec![chunk("1", "a", "def a(): pass", None)],
        })
        .await
        .unwrap();
    assert!(cache_path.exists());

    let reloaded = create_client_with(config);
    assert_eq!(reloaded.engine().embeddings().cache_len(), 1);
}
