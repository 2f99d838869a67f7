//! # Codebase RAG - Multi-stage Code Retrieval
//!
//! A retrieval core for code search over vector-indexed codebases, usable as a
//! library or through a Model Context Protocol (MCP) server.
//!
//! ## Overview
//!
//! Natural-language questions about code rarely share vocabulary with the code
//! that answers them. Codebase RAG combines several strategies to close that gap:
//! plain semantic search, lexical keyword scoring, search over natural-language
//! descriptions of each chunk (with Korean queries translated first), and HyDE,
//! which generates hypothetical code for the query and searches with that.
//! Results from two strategies can be fused with Reciprocal Rank Fusion, then
//! reranked with code-aware heuristics and filtered for confidence and diversity.
//!
//! ## Key Features
//!
//! - **Semantic Search**: FastEmbed (multilingual-e5-small by default) for local embeddings
//! - **Hybrid Search**: semantic + keyword, or HyDE + description, fused with weighted RRF
//! - **HyDE**: single-stage and two-stage (codebase-aware) hypothetical code generation
//!   via Gemini or any OpenAI-compatible endpoint
//! - **Reranking**: name, description, chunk type and path signals blended with vector similarity
//! - **Graceful Degradation**: every optional stage falls back instead of failing the search
//! - **Storage**: LanceDB (embedded, default) or an in-memory index
//!
//! ## Architecture
//!
//! ```text
//!  MCP client ── stdio ── RagMcpServer
//!                              │
//!                          RagClient ── Config, ContextBuilder
//!                              │
//!                         SearchEngine
//!        ┌───────────┬─────────┼──────────┬─────────────┐
//!   Embedding    VectorIndex  HydeGenerator Translator  RelevanceJudge
//!   Service      (Lance/mem)        └──── GenerationBackend ────┘
//! ```
//!
//! ## Modules
//!
//! - [`mcp_server`]: MCP protocol server with tools and prompts
//! - [`client`]: library entry point owning configuration and collaborators
//! - [`search`]: routing of each search type onto the retrieval stages
//! - [`retrieval`]: fusion, reranking, filters, HyDE, translation, judging, context
//! - [`embedding`]: embedding providers and the cached embedding service
//! - [`vector_db`]: vector index abstraction (LanceDB and in-memory)
//! - [`llm`]: text generation backends (Gemini, OpenAI-compatible)
//! - [`cache`]: persistent embedding cache
//! - [`config`]: configuration management with environment variable support
//! - [`types`]: request/response types with JSON schema
//! - [`error`]: error types
//! - [`paths`]: platform-specific paths
//!
//! ## Usage Example
//!
//! ```no_run
//! use codebase_rag::{Config, RagClient, SearchRequest, SearchType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RagClient::with_config(Config::new()?).await?;
//!
//!     let mut request = SearchRequest::new("where are passwords hashed", "backend");
//!     request.search_type = SearchType::HydeFull;
//!     request.use_reranking = true;
//!
//!     let response = client.search(request).await?;
//!     if let Some(context) = response.context {
//!         println!("{}", context);
//!     }
//!     Ok(())
//! }
//! ```

/// Persistent content-addressed embedding cache
pub mod cache;

/// Library client owning configuration and collaborators
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding generation using FastEmbed
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Text generation backends for HyDE, translation and relevance judging
pub mod llm;

/// MCP server implementation with tools and prompts
pub mod mcp_server;

/// Platform-specific data, cache and config paths
pub mod paths;

/// Retrieval stages: fusion, reranking, filtering, HyDE, translation, judging, context
pub mod retrieval;

/// Search orchestration across retrieval strategies
pub mod search;

/// Request/response types with JSON schema definitions
pub mod types;

/// Vector index abstraction supporting LanceDB and an in-memory index
pub mod vector_db;

pub use client::RagClient;
pub use config::Config;
pub use error::{RagError, SearchError};
pub use search::{SearchEngine, SearchSettings};
pub use types::{
    ChunkRecord, ChunkType, IndexChunksRequest, IndexChunksResponse, SearchFilters,
    SearchRequest, SearchResponse, SearchResult, SearchType,
};
