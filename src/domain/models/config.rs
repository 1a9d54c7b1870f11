//! Engine configuration structures.

use serde::{Deserialize, Serialize};

/// Main configuration for the weaver engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Maximum concurrent tasks in parallel mode (1-64).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Wall-clock budget for a whole run, seconds. 0 disables the budget.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// Per-collaborator call timeout, seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_run_timeout_secs() -> u64 {
    600
}

const fn default_call_timeout_secs() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            run_timeout_secs: default_run_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            knowledge: KnowledgeConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Knowledge ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KnowledgeConfig {
    /// Vector store backend name: "memory" or "sqlite".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Collection namespace.
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Backend storage path (sqlite database file).
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Maximum chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_provider() -> String {
    "sqlite".to_string()
}

fn default_collection_name() -> String {
    "knowledge".to_string()
}

fn default_storage_path() -> String {
    ".weaver/knowledge.db".to_string()
}

const fn default_chunk_size() -> usize {
    1600
}

const fn default_chunk_overlap() -> usize {
    200
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            collection_name: default_collection_name(),
            path: default_storage_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Embedding collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    /// Base URL for the embeddings API.
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Embedding model identifier. Stored alongside each vector; a change
    /// invalidates stored vectors on re-ingest.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector dimension.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Maximum texts per API request.
    #[serde(default = "default_embedding_batch")]
    pub max_batch_size: usize,
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimension() -> usize {
    1536
}

const fn default_embedding_batch() -> usize {
    256
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            max_batch_size: default_embedding_batch(),
        }
    }
}

/// Completion model collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionConfig {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Character budget for assembled prompt context.
    #[serde(default = "default_context_budget_chars")]
    pub context_budget_chars: usize,
}

fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_context_budget_chars() -> usize {
    48_000
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            context_budget_chars: default_context_budget_chars(),
        }
    }
}

/// Retry policy configuration for transient collaborator errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = EngineConfig::default();
        assert!(config.knowledge.chunk_overlap < config.knowledge.chunk_size);
        assert!(config.retry.initial_backoff_ms < config.retry.max_backoff_ms);
        assert_eq!(config.max_concurrency, 4);
    }

    #[test]
    fn yaml_roundtrip_with_partial_input() {
        let yaml = "knowledge:\n  provider: memory\n  collection_name: kb1\n";
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.knowledge.provider, "memory");
        assert_eq!(config.knowledge.collection_name, "kb1");
        // Untouched fields keep defaults.
        assert_eq!(config.knowledge.chunk_size, default_chunk_size());
        assert_eq!(config.completion.model, default_completion_model());
    }
}
