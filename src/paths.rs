/// Centralized platform-specific path computation
///
/// Base directories come from the `dirs` crate (XDG Base Directory specification
/// on Linux, Known Folders on Windows, standard locations on macOS). When a base
/// directory cannot be resolved the current directory is used instead.
use std::path::PathBuf;

/// Directory name used below every platform base directory
pub const APP_DIR_NAME: &str = "codebase-rag";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Base data directory (`$XDG_DATA_HOME`, `~/Library/Application Support`, `%APPDATA%`)
    pub fn data_dir() -> PathBuf {
        dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Base cache directory (`$XDG_CACHE_HOME`, `~/Library/Caches`, `%LOCALAPPDATA%`)
    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Base config directory (`$XDG_CONFIG_HOME`, `~/Library/Application Support`, `%APPDATA%`)
    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {data_dir}/codebase-rag
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_DIR_NAME)
    }

    /// Returns: {cache_dir}/codebase-rag
    pub fn project_cache_dir() -> PathBuf {
        Self::cache_dir().join(APP_DIR_NAME)
    }

    /// Returns: {config_dir}/codebase-rag
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR_NAME)
    }

    /// Returns: {data_dir}/codebase-rag/lancedb
    pub fn default_lancedb_path() -> PathBuf {
        Self::project_data_dir().join("lancedb")
    }

    /// Returns: {cache_dir}/codebase-rag/embedding_cache.json
    pub fn default_embedding_cache_path() -> PathBuf {
        Self::project_cache_dir().join("embedding_cache.json")
    }

    /// Returns: {config_dir}/codebase-rag/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}
