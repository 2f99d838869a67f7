use crate::client::RagClient;
use crate::config::Config;
use crate::types::*;

use anyhow::{Context, Result};
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::prompt::PromptRouter, tool::ToolRouter, wrapper::Parameters},
    model::*,
    prompt, prompt_handler, prompt_router, tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct RagMcpServer {
    client: Arc<RagClient>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl RagMcpServer {
    /// Create a new RAG MCP server with default configuration
    pub async fn new() -> Result<Self> {
        let client = RagClient::new().await?;
        Ok(Self::with_client(Arc::new(client)))
    }

    /// Create a new RAG MCP server with an existing client
    pub fn with_client(client: Arc<RagClient>) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    /// Get the underlying client
    pub fn client(&self) -> &RagClient {
        &self.client
    }
}

fn to_json<T: Serialize>(response: &T) -> Result<String, String> {
    serde_json::to_string_pretty(response).map_err(|e| format!("Serialization failed: {}", e))
}

#[tool_router(router = tool_router)]
impl RagMcpServer {
    #[tool(
        description = "Search an indexed codebase. search_type selects the strategy: semantic, hybrid (semantic + keyword fused with RRF), keyword, description, hyde (hypothetical code generation), hyde_full (two-stage HyDE) or description_fallback. Set use_reranking for code-aware reranking with confidence and per-file diversity filtering."
    )]
    async fn search_codebase(
        &self,
        Parameters(req): Parameters<SearchRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .search(req)
            .await
            .map_err(|e| e.to_user_string())?;

        to_json(&response)
    }

    #[tool(
        description = "Add pre-parsed code chunks to a codebase index. Content and optional descriptions are embedded; chunks with an existing id are replaced."
    )]
    async fn index_chunks(
        &self,
        Parameters(req): Parameters<IndexChunksRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .index_chunks(req)
            .await
            .map_err(|e| e.to_user_string())?;

        to_json(&response)
    }

    #[tool(description = "List the names of all indexed codebases")]
    async fn list_codebases(
        &self,
        Parameters(_req): Parameters<ListCodebasesRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .list_codebases()
            .await
            .map_err(|e| e.to_user_string())?;

        to_json(&response)
    }

    #[tool(description = "Get chunk counts by language and chunk type for one codebase")]
    async fn get_codebase_stats(
        &self,
        Parameters(req): Parameters<CodebaseStatsRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .codebase_stats(req)
            .await
            .map_err(|e| e.to_user_string())?;

        to_json(&response)
    }

    #[tool(description = "Delete every indexed chunk of one codebase")]
    async fn delete_codebase(
        &self,
        Parameters(req): Parameters<DeleteCodebaseRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .delete_codebase(req)
            .await
            .map_err(|e| e.to_user_string())?;

        to_json(&response)
    }
}

// Prompts for slash commands
#[prompt_router]
impl RagMcpServer {
    #[prompt(
        name = "search",
        description = "Search an indexed codebase (hybrid search with reranking)"
    )]
    async fn search_prompt(
        &self,
        Parameters(args): Parameters<serde_json::Value>,
    ) -> Result<GetPromptResult, McpError> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let codebase = args
            .get("codebase_name")
            .and_then(|v| v.as_str())
            .unwrap_or("default");

        let messages = vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Please search the codebase '{}' for: {}. Use search_codebase with search_type 'hybrid' and use_reranking enabled.",
                codebase, query
            ),
        )];

        Ok(GetPromptResult {
            description: Some(format!("Search '{}' for {}", codebase, query)),
            messages,
        })
    }
}

#[tool_handler(router = self.tool_router)]
#[prompt_handler]
impl ServerHandler for RagMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "codebase-rag".into(),
                title: Some("Codebase RAG - Multi-stage Code Retrieval".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Code retrieval over indexed codebases. \
                Use index_chunks to add parsed chunks, search_codebase to search \
                (semantic, hybrid, keyword, description, hyde, hyde_full, description_fallback), \
                and list_codebases / get_codebase_stats / delete_codebase to manage indexes."
                    .into(),
            ),
        }
    }
}

impl RagMcpServer {
    /// Serve over stdio until the client disconnects
    pub async fn serve_stdio(config_path: Option<&Path>) -> Result<()> {
        tracing::info!("Starting RAG MCP server");

        let config = Config::load(config_path).context("Failed to load configuration")?;
        let client = Arc::new(
            RagClient::with_config(config)
                .await
                .context("Failed to create RAG client")?,
        );
        let server = Self::with_client(Arc::clone(&client));

        let transport = rmcp::transport::io::stdio();

        server.serve(transport).await?.waiting().await?;

        if client.config().cache.persist
            && let Err(e) = client.save_embedding_cache()
        {
            tracing::warn!("Failed to save embedding cache on shutdown: {}", e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
