use anyhow::Result;
use clap::Parser;
use codebase_rag::mcp_server::RagMcpServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Multi-stage code retrieval MCP server (stdio transport)
#[derive(Parser, Debug)]
#[command(name = "codebase-rag", version, about)]
struct Args {
    /// Path to a TOML config file (overrides the platform default location)
    #[arg(short, long, env = "CODEBASE_RAG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(
        "codebase-rag {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    RagMcpServer::serve_stdio(args.config.as_deref()).await?;

    Ok(())
}
