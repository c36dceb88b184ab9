use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CodeseekError;

/// Top-level configuration loaded from `.codeseek.toml`.
///
/// Every section is optional; missing keys fall back to their defaults.
///
/// # Examples
///
/// ```
/// use codeseek_core::CodeseekConfig;
///
/// let config = CodeseekConfig::default();
/// assert_eq!(config.index.window, 50);
/// assert_eq!(config.index.overlap, 5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeseekConfig {
    /// Embedding service settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Chunking and persistence settings.
    #[serde(default)]
    pub index: IndexConfig,
    /// Which files to ingest.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CodeseekConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Io`] if the file cannot be read,
    /// [`CodeseekError::Toml`] if the content is not valid TOML, or
    /// [`CodeseekError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codeseek_core::CodeseekConfig;
    /// use std::path::Path;
    ///
    /// let config = CodeseekConfig::from_file(Path::new(".codeseek.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, CodeseekError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Toml`] if parsing fails, or
    /// [`CodeseekError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeseek_core::CodeseekConfig;
    ///
    /// let toml = r#"
    /// [index]
    /// window = 80
    /// overlap = 10
    /// "#;
    /// let config = CodeseekConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.index.window, 80);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CodeseekError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), CodeseekError> {
        if self.index.window == 0 {
            return Err(CodeseekError::Config("index.window must be at least 1".into()));
        }
        if self.index.overlap >= self.index.window {
            return Err(CodeseekError::Config(format!(
                "index.overlap ({}) must be smaller than index.window ({})",
                self.index.overlap, self.index.window
            )));
        }
        if self.embedding.timeout_secs == 0 {
            return Err(CodeseekError::Config(
                "embedding.timeout_secs must be at least 1".into(),
            ));
        }
        if self.workspace.extensions.is_empty() {
            return Err(CodeseekError::Config(
                "workspace.extensions must list at least one extension".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the embedding service.
///
/// The defaults target a local Ollama instance.
///
/// # Examples
///
/// ```
/// use codeseek_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.base_url, "http://localhost:11434");
/// assert_eq!(config.model, "nomic-embed-text");
/// assert_eq!(config.max_retries, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after a failed embed call (default: 0, fail on first error).
    #[serde(default)]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds; doubles on each attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Chunking and persistence configuration.
///
/// # Examples
///
/// ```
/// use codeseek_core::IndexConfig;
///
/// let config = IndexConfig::default();
/// assert_eq!(config.path.to_str(), Some(".codeseek/index.json"));
/// assert!(config.fail_fast);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Where the index is saved and loaded from.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Lines per chunk (default: 50).
    #[serde(default = "default_window")]
    pub window: usize,
    /// Lines shared by consecutive chunks (default: 5).
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Abort ingestion on the first failing file (default: true).
    ///
    /// When `false`, failures are collected per file and the run continues.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".codeseek/index.json")
}

fn default_window() -> usize {
    50
}

fn default_overlap() -> usize {
    5
}

fn default_fail_fast() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            window: default_window(),
            overlap: default_overlap(),
            fail_fast: default_fail_fast(),
        }
    }
}

/// Which files are ingested.
///
/// # Examples
///
/// ```
/// use codeseek_core::WorkspaceConfig;
///
/// let config = WorkspaceConfig::default();
/// assert!(config.extensions.iter().any(|e| e == ".go"));
/// assert!(config.exclude.iter().any(|e| e == "node_modules"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory to walk (default: `.`).
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// File extensions to ingest, with or without the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns to skip.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extensions() -> Vec<String> {
    [
        ".go", ".py", ".js", ".ts", ".java", ".cpp", ".c", ".h", ".php", ".rs",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_exclude() -> Vec<String> {
    ["*.git*", "node_modules", "*.log", "*.tmp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extensions: default_extensions(),
            exclude: default_exclude(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (default: `"info"`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
