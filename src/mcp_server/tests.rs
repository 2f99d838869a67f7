use super::*;
use crate::embedding::{EmbeddingIntent, EmbeddingProvider};
use crate::vector_db::InMemoryVectorIndex;

/// Character-frequency embedder, enough to tell chunks apart
struct LetterEmbedder;

impl EmbeddingProvider for LetterEmbedder {
    fn embed_batch(
        &self,
        texts: Vec<String>,
        _intent: EmbeddingIntent,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; 26];
                for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                    vector[(c as u8 - b'a') as usize] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        26
    }

    fn model_name(&self) -> &str {
        "letters"
    }
}

fn create_server() -> RagMcpServer {
    let client = RagClient::with_components(
        Config::ephemeral(),
        Arc::new(LetterEmbedder),
        Arc::new(InMemoryVectorIndex::new()),
    );
    RagMcpServer::with_client(Arc::new(client))
}

fn chunk(id: &str, name: &str, content: &str) -> ChunkRecord {
    ChunkRecord {
        id: id.to_string(),
        content: content.to_string(),
        chunk_type: ChunkType::Function,
        name: name.to_string(),
        parent_name: None,
        file_path: "src/lib.rs".to_string(),
        language: "rust".to_string(),
        line_start: 1,
        line_end: 3,
        description: None,
    }
}

async fn index_demo(server: &RagMcpServer) -> serde_json::Value {
    let output = server
        .index_chunks(Parameters(IndexChunksRequest {
            codebase_name: "demo".to_string(),
            chunks: vec![
                chunk("1", "open_file", "fn open_file(path: &Path) -> File"),
                chunk("2", "zip_archive", "fn zip_archive(zz: &[u8]) -> Vec<u8>"),
            ],
        }))
        .await
        .unwrap();
    serde_json::from_str(&output).unwrap()
}

#[test]
fn test_get_info() {
    let server = create_server();
    let info = server.get_info();

    assert_eq!(info.server_info.name, "codebase-rag");
    assert!(info.server_info.title.is_some());
    assert!(info.instructions.is_some());
    assert!(info.capabilities.tools.is_some());
    assert!(info.capabilities.prompts.is_some());
}

#[test]
fn test_client_accessor() {
    let server = create_server();
    assert_eq!(server.client().embedding_dimension(), 26);
}

#[tokio::test]
async fn test_index_chunks_tool() {
    let server = create_server();
    let response = index_demo(&server).await;
    assert_eq!(response["chunks_received"], 2);
    assert_eq!(response["chunks_stored"], 2);
}

#[tokio::test]
async fn test_search_codebase_tool() {
    let server = create_server();
    index_demo(&server).await;

    let mut request = SearchRequest::new("zip archive", "demo");
    request.top_k = Some(1);
    let output = server.search_codebase(Parameters(request)).await.unwrap();
    let response: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(response["total_results"], 1);
    assert_eq!(response["results"][0]["name"], "zip_archive");
    assert_eq!(response["search_type"], "semantic");
    assert!(response["context"].as_str().unwrap().contains("zip_archive"));
}

#[tokio::test]
async fn test_search_codebase_reports_validation_errors() {
    let server = create_server();
    let mut request = SearchRequest::new("q", "demo");
    request.top_k = Some(500);

    let err = server.search_codebase(Parameters(request)).await.unwrap_err();
    assert!(err.contains("top_k"));
}

#[tokio::test]
async fn test_management_tools() {
    let server = create_server();
    index_demo(&server).await;

    let listed = server
        .list_codebases(Parameters(ListCodebasesRequest::default()))
        .await
        .unwrap();
    assert!(listed.contains("\"demo\""));

    let stats = server
        .get_codebase_stats(Parameters(CodebaseStatsRequest {
            codebase_name: "demo".to_string(),
        }))
        .await
        .unwrap();
    let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
    assert_eq!(stats["total_chunks"], 2);

    let deleted = server
        .delete_codebase(Parameters(DeleteCodebaseRequest {
            codebase_name: "demo".to_string(),
        }))
        .await
        .unwrap();
    let deleted: serde_json::Value = serde_json::from_str(&deleted).unwrap();
    assert_eq!(deleted["success"], true);
}

#[tokio::test]
async fn test_search_prompt() {
    let server = create_server();
    let result = server
        .search_prompt(Parameters(serde_json::json!({
            "query": "parse config",
            "codebase_name": "demo"
        })))
        .await
        .unwrap();

    assert_eq!(result.messages.len(), 1);
    assert_eq!(
        result.description.as_deref(),
        Some("Search 'demo' for parse config")
    );
}
