/// Configuration system for vector-sync
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, SyncError};
use crate::paths::PlatformPaths;
use crate::types::ChunkStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Sync run configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Chunking thresholds and strategy table
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index backend: "lancedb", "pinecone" or "memory"
    #[serde(default = "default_index_backend")]
    pub backend: String,

    /// LanceDB data directory path
    #[serde(default = "default_lancedb_path")]
    pub lancedb_path: PathBuf,

    /// Pinecone index host, e.g. https://my-index-abc123.svc.pinecone.io
    #[serde(default)]
    pub pinecone_host: String,

    /// Environment variable holding the Pinecone API key
    #[serde(default = "default_pinecone_api_key_env")]
    pub pinecone_api_key_env: String,

    /// Partition key applied to every index operation
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Vector dimension the index was created with
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum records per upsert request
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Fallback provider: "huggingface", "fastembed" or "none"
    #[serde(default = "default_fallback_provider")]
    pub fallback_provider: String,

    /// Base URL of the feature-extraction endpoint; the model id is appended
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Timeout in seconds for one provider call
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Retries per provider after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries, doubled on each attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Minimum delay between two calls to the same provider
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Normalized input is truncated to this many characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// What to do with chunks no provider could embed: "exclude" or "mark_low_confidence"
    #[serde(default = "default_failure_policy")]
    pub failure_policy: String,

    /// Length of the content preview stored in vector metadata
    #[serde(default = "default_metadata_content_chars")]
    pub metadata_content_chars: usize,
}

/// Sync run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Files processed concurrently per batch
    #[serde(default = "default_sync_batch_size")]
    pub batch_size: usize,

    /// Process files classified as tests
    #[serde(default)]
    pub include_tests: bool,

    /// State file, relative to the repository root unless absolute
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Repository name stored in vector metadata; defaults to the working tree directory name
    #[serde(default)]
    pub repository_name: String,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Files with fewer lines than this collapse to one chunk
    #[serde(default = "default_small_file_lines")]
    pub small_file_lines: usize,

    /// Files smaller than this many bytes collapse to one chunk
    #[serde(default = "default_small_file_bytes")]
    pub small_file_bytes: u64,

    /// Block size of the line-based fallback chunker
    #[serde(default = "default_fallback_block_lines")]
    pub fallback_block_lines: usize,

    #[serde(default = "default_class_heavy_min_classes")]
    pub class_heavy_min_classes: usize,

    #[serde(default = "default_class_heavy_max_functions_per_class")]
    pub class_heavy_max_functions_per_class: usize,

    /// Strategy for well-structured, function-oriented files
    #[serde(default = "default_clean_modules")]
    pub clean_modules: ChunkStrategy,

    /// Strategy for class-heavy files
    #[serde(default = "default_complex_modules")]
    pub complex_modules: ChunkStrategy,

    /// Strategy for high-complexity files
    #[serde(default = "default_monolithic_files")]
    pub monolithic_files: ChunkStrategy,
}

// Default value functions
fn default_index_backend() -> String {
    "lancedb".to_string()
}

fn default_lancedb_path() -> PathBuf {
    PlatformPaths::default_lancedb_path()
}

fn default_pinecone_api_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

fn default_namespace() -> String {
    "main".to_string()
}

fn default_dimension() -> usize {
    768
}

fn default_upsert_batch_size() -> usize {
    100
}

fn default_primary_model() -> String {
    "microsoft/graphcodebert-base".to_string()
}

fn default_fallback_model() -> String {
    "sentence-transformers/all-mpnet-base-v2".to_string()
}

fn default_fallback_provider() -> String {
    "huggingface".to_string()
}

fn default_api_url() -> String {
    "https://api-inference.huggingface.co/pipeline/feature-extraction".to_string()
}

fn default_token_env() -> String {
    "HUGGINGFACE_TOKEN".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_request_delay_ms() -> u64 {
    100
}

fn default_max_input_chars() -> usize {
    2048
}

fn default_failure_policy() -> String {
    "exclude".to_string()
}

fn default_metadata_content_chars() -> usize {
    1000
}

fn default_sync_batch_size() -> usize {
    20
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".vector-sync.json")
}

fn default_small_file_lines() -> usize {
    40
}

fn default_small_file_bytes() -> u64 {
    1024
}

fn default_fallback_block_lines() -> usize {
    50
}

fn default_class_heavy_min_classes() -> usize {
    3
}

fn default_class_heavy_max_functions_per_class() -> usize {
    2
}

fn default_clean_modules() -> ChunkStrategy {
    ChunkStrategy::FunctionLevel
}

fn default_complex_modules() -> ChunkStrategy {
    ChunkStrategy::ClassLevel
}

fn default_monolithic_files() -> ChunkStrategy {
    ChunkStrategy::Hybrid
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            lancedb_path: default_lancedb_path(),
            pinecone_host: String::new(),
            pinecone_api_key_env: default_pinecone_api_key_env(),
            namespace: default_namespace(),
            dimension: default_dimension(),
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            fallback_provider: default_fallback_provider(),
            api_url: default_api_url(),
            token_env: default_token_env(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_delay_ms: default_request_delay_ms(),
            max_input_chars: default_max_input_chars(),
            failure_policy: default_failure_policy(),
            metadata_content_chars: default_metadata_content_chars(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_sync_batch_size(),
            include_tests: false,
            state_file: default_state_file(),
            repository_name: String::new(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            small_file_lines: default_small_file_lines(),
            small_file_bytes: default_small_file_bytes(),
            fallback_block_lines: default_fallback_block_lines(),
            class_heavy_min_classes: default_class_heavy_min_classes(),
            class_heavy_max_functions_per_class: default_class_heavy_max_functions_per_class(),
            clean_modules: default_clean_modules(),
            complex_modules: default_complex_modules(),
            monolithic_files: default_monolithic_files(),
        }
    }
}

const INDEX_BACKENDS: &[&str] = &["lancedb", "pinecone", "memory"];
const FALLBACK_PROVIDERS: &[&str] = &["huggingface", "fastembed", "none"];
const FAILURE_POLICIES: &[&str] = &["exclude", "mark_low_confidence"];

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration following the lookup order:
    /// explicit path, `<repo>/.vector-sync.toml`, platform config file, defaults
    pub fn load(explicit: Option<&Path>, repo_root: &Path) -> Result<Self, SyncError> {
        if let Some(path) = explicit {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let repo_config = PlatformPaths::repo_config_path(repo_root);
        if repo_config.exists() {
            tracing::info!("Loading config from: {}", repo_config.display());
            return Self::from_file(&repo_config);
        }

        let user_config = PlatformPaths::default_config_path();
        if user_config.exists() {
            tracing::info!("Loading config from: {}", user_config.display());
            Self::from_file(&user_config)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), SyncError> {
        one_of("index.backend", &self.index.backend, INDEX_BACKENDS)?;
        one_of(
            "embedding.fallback_provider",
            &self.embedding.fallback_provider,
            FALLBACK_PROVIDERS,
        )?;
        one_of(
            "embedding.failure_policy",
            &self.embedding.failure_policy,
            FAILURE_POLICIES,
        )?;

        if self.index.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "index.namespace".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if self.index.backend == "pinecone" && self.index.pinecone_host.trim().is_empty() {
            return Err(ConfigError::MissingRequired("index.pinecone_host".to_string()).into());
        }

        positive("index.dimension", self.index.dimension)?;
        positive("index.upsert_batch_size", self.index.upsert_batch_size)?;
        positive("sync.batch_size", self.sync.batch_size)?;
        positive("embedding.max_input_chars", self.embedding.max_input_chars)?;
        positive("chunking.fallback_block_lines", self.chunking.fallback_block_lines)?;

        if self.embedding.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("VECTOR_SYNC_INDEX_BACKEND") {
            self.index.backend = backend;
        }

        if let Ok(namespace) = std::env::var("VECTOR_SYNC_NAMESPACE") {
            self.index.namespace = namespace;
        }

        if let Ok(path) = std::env::var("VECTOR_SYNC_LANCEDB_PATH") {
            self.index.lancedb_path = PathBuf::from(path);
        }

        if let Ok(host) = std::env::var("VECTOR_SYNC_PINECONE_HOST") {
            self.index.pinecone_host = host;
        }

        if let Ok(model) = std::env::var("VECTOR_SYNC_PRIMARY_MODEL") {
            self.embedding.primary_model = model;
        }

        if let Ok(model) = std::env::var("VECTOR_SYNC_FALLBACK_MODEL") {
            self.embedding.fallback_model = model;
        }

        if let Ok(batch_size) = std::env::var("VECTOR_SYNC_BATCH_SIZE")
            && let Ok(size) = batch_size.parse()
        {
            self.sync.batch_size = size;
        }

        if let Ok(include) = std::env::var("VECTOR_SYNC_INCLUDE_TESTS")
            && let Ok(include) = include.parse()
        {
            self.sync.include_tests = include;
        }
    }

    /// Load, apply environment overrides and validate
    pub fn new(explicit: Option<&Path>, repo_root: &Path) -> Result<Self, SyncError> {
        let mut config = Self::load(explicit, repo_root)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn low_confidence_policy(&self) -> bool {
        self.embedding.failure_policy == "mark_low_confidence"
    }
}

fn one_of(key: &str, value: &str, allowed: &[&str]) -> Result<(), SyncError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("must be one of {:?}, got '{}'", allowed, value),
        }
        .into())
    }
}

fn positive(key: &str, value: usize) -> Result<(), SyncError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must be greater than 0".to_string(),
        }
        .into());
    }
    Ok(())
}
