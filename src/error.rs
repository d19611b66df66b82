/// Centralized error types for vector-sync using thiserror
///
/// Environment errors are fatal to a run, per-file errors are recovered by the
/// orchestrator and only counted, state persistence errors are surfaced loudly.
use crate::types::SyncReport;
use thiserror::Error;

/// Main error type for a synchronization run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No baseline commit: the repository was never synced and no --since-commit was given")]
    NoBaselineCommit,

    #[error("Another sync run is in progress for {0}")]
    RunInProgress(String),

    #[error("Sync applied index changes up to {} but the state could not be persisted: {source}", report.to_commit)]
    StatePersistence {
        report: Box<SyncReport>,
        source: StateError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by the repository diff source
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Not a git repository: {0}")]
    NotAGitRepository(String),

    #[error("Unknown commit: {0}")]
    UnknownCommit(String),

    #[error("Repository has no commits yet")]
    EmptyRepository,

    #[error("Failed to compute diff: {0}")]
    DiffFailed(String),

    #[error("Failed to read '{path}' at {commit}: {reason}")]
    ReadFailed {
        path: String,
        commit: String,
        reason: String,
    },

    #[error("File is not valid UTF-8: {0}")]
    NotUtf8(String),
}

/// Errors related to code chunking
#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("Failed to parse code: {0}")]
    ParseFailed(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("AST parsing failed: {0}")]
    AstParsingFailed(String),
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Missing API token (set {0})")]
    MissingToken(String),

    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Embedding provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding input is empty")]
    EmptyInput,

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

impl EmbeddingError {
    /// Transient failures worth another attempt against the same provider
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::RequestFailed(_) | EmbeddingError::Timeout(_) => true,
            EmbeddingError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors related to vector index operations
#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Failed to connect to vector index: {0}")]
    ConnectionFailed(String),

    #[error("Failed to upsert vectors: {0}")]
    UpsertFailed(String),

    #[error("Failed to query vectors: {0}")]
    QueryFailed(String),

    #[error("Failed to delete vectors: {0}")]
    DeleteFailed(String),

    #[error("Failed to get statistics: {0}")]
    StatisticsFailed(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to the persisted sync state
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to load state from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to save state to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },

    #[error("Failed to parse state file: {0}")]
    ParseFailed(String),

    #[error("Unsupported state version: {0}")]
    UnsupportedVersion(String),

    #[error("Failed to acquire run lock: {0}")]
    LockFailed(String),
}

// Conversion from anyhow::Error to SyncError
impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Other(format!("{:#}", err))
    }
}

impl SyncError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        SyncError::Other(msg.into())
    }

    /// Environment errors abort a run before any state change
    pub fn is_environment_error(&self) -> bool {
        matches!(
            self,
            SyncError::Repo(RepoError::NotAGitRepository(_))
                | SyncError::Repo(RepoError::UnknownCommit(_))
                | SyncError::Repo(RepoError::EmptyRepository)
                | SyncError::NoBaselineCommit
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::VectorIndex(VectorIndexError::ConnectionFailed(_)) => true,
            SyncError::Embedding(e) => e.is_retryable(),
            SyncError::RunInProgress(_) | SyncError::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Repo(RepoError::UnknownCommit("abc123".to_string()));
        assert_eq!(err.to_string(), "Repository error: Unknown commit: abc123");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let sync_err: SyncError = io_err.into();
        assert!(matches!(sync_err, SyncError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("test error");
        let sync_err: SyncError = anyhow_err.into();
        assert!(matches!(sync_err, SyncError::Other(_)));
    }

    #[test]
    fn test_environment_errors() {
        assert!(SyncError::NoBaselineCommit.is_environment_error());
        assert!(
            SyncError::Repo(RepoError::NotAGitRepository("/tmp".to_string()))
                .is_environment_error()
        );
        assert!(!SyncError::other("boom").is_environment_error());
    }

    #[test]
    fn test_embedding_retryable() {
        assert!(EmbeddingError::Timeout(30).is_retryable());
        assert!(
            EmbeddingError::Http {
                status: 429,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            EmbeddingError::Http {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !EmbeddingError::Http {
                status: 400,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !EmbeddingError::DimensionMismatch {
                expected: 768,
                actual: 384
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_is_retryable() {
        let retryable =
            SyncError::VectorIndex(VectorIndexError::ConnectionFailed("test".to_string()));
        assert!(retryable.is_retryable());

        let not_retryable = SyncError::NoBaselineCommit;
        assert!(!not_retryable.is_retryable());
    }

    #[test]
    fn test_embedding_error_dimension_mismatch() {
        let err = EmbeddingError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "Invalid embedding dimension: expected 768, got 384"
        );
    }

    #[test]
    fn test_state_error_load_failed() {
        let err = StateError::LoadFailed {
            path: "/tmp/.vector-sync.json".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load state from '/tmp/.vector-sync.json': permission denied"
        );
    }

    #[test]
    fn test_config_error_invalid_value() {
        let err = ConfigError::InvalidValue {
            key: "sync.batch_size".to_string(),
            reason: "must be greater than 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'sync.batch_size': must be greater than 0"
        );
    }

    #[test]
    fn test_error_chain() {
        let embedding_err = EmbeddingError::RequestFailed("connection reset".to_string());
        let sync_err: SyncError = embedding_err.into();
        assert!(matches!(sync_err, SyncError::Embedding(_)));
        assert_eq!(
            sync_err.to_string(),
            "Embedding error: Embedding request failed: connection reset"
        );
        assert!(sync_err.is_retryable());
    }
}
