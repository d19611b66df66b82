use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of one entry in a commit-to-commit diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Renamed => "renamed",
        }
    }
}

/// Immutable snapshot of one diff entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path at the target commit (old path for deletions)
    pub path: String,
    pub status: ChangeStatus,
    /// Path before a rename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    /// Blob size at the target commit; absent for deletions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Lowercased extension without the dot, empty when there is none
    pub extension: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        let path = path.into();
        let extension = extension_of(&path);
        Self {
            path,
            status,
            previous_path: None,
            size_bytes: None,
            extension,
        }
    }

    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        let mut change = Self::new(to, ChangeStatus::Renamed);
        change.previous_path = Some(from.into());
        change
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }
}

/// Lowercased extension of a path, empty when the file name has none
pub fn extension_of(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// File category assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Priority,
    Normal,
    Test,
    Config,
    Ignore,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Priority => "priority",
            Category::Normal => "normal",
            Category::Test => "test",
            Category::Config => "config",
            Category::Ignore => "ignore",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

/// Named chunking strategy
///
/// `Hybrid` is the sliding-window strategy used for files without reliable
/// structure; it windows with the same overlap as `SlidingWindowWithOverlap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    FileLevel,
    FunctionLevel,
    ClassLevel,
    SlidingWindow,
    SlidingWindowWithOverlap,
    SlidingWindowWithHighOverlap,
    Hybrid,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::FileLevel => "file_level",
            ChunkStrategy::FunctionLevel => "function_level",
            ChunkStrategy::ClassLevel => "class_level",
            ChunkStrategy::SlidingWindow => "sliding_window",
            ChunkStrategy::SlidingWindowWithOverlap => "sliding_window_with_overlap",
            ChunkStrategy::SlidingWindowWithHighOverlap => "sliding_window_with_high_overlap",
            ChunkStrategy::Hybrid => "hybrid",
        }
    }

    /// Overlap between consecutive windows, in percent of the window size
    pub fn window_overlap_percent(&self) -> Option<usize> {
        match self {
            ChunkStrategy::SlidingWindow => Some(10),
            ChunkStrategy::SlidingWindowWithOverlap | ChunkStrategy::Hybrid => Some(25),
            ChunkStrategy::SlidingWindowWithHighOverlap => Some(50),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file_level" => Ok(ChunkStrategy::FileLevel),
            "function_level" => Ok(ChunkStrategy::FunctionLevel),
            "class_level" => Ok(ChunkStrategy::ClassLevel),
            "sliding_window" => Ok(ChunkStrategy::SlidingWindow),
            "sliding_window_with_overlap" => Ok(ChunkStrategy::SlidingWindowWithOverlap),
            "sliding_window_with_high_overlap" => Ok(ChunkStrategy::SlidingWindowWithHighOverlap),
            "hybrid" => Ok(ChunkStrategy::Hybrid),
            other => Err(format!("unknown chunking strategy '{}'", other)),
        }
    }
}

/// Classifier output for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Lowercase language id, `unknown` when the extension is not recognized
    pub language: String,
    pub category: Category,
    pub initial_strategy: ChunkStrategy,
}

/// Content-derived analysis of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub path: String,
    pub language: String,
    pub category: Category,
    pub complexity: Complexity,
    pub size_bytes: u64,
    /// Lines that are neither blank nor comment-only
    pub source_line_count: usize,
    pub total_lines: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub chunking_strategy: ChunkStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Class,
    File,
    Window,
    Fallback,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::File => "file",
            ChunkType::Window => "window",
            ChunkType::Fallback => "fallback",
        }
    }
}

/// File-level metadata attached to a chunk before embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOrigin {
    pub category: Category,
    pub change_type: ChangeStatus,
    pub repository: String,
    pub commit: String,
    pub complexity: Complexity,
}

/// A contiguous slice of a file treated as one embeddable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub content: String,
    pub source_path: String,
    pub strategy: ChunkStrategy,
    pub language: String,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive
    pub end_line: usize,
    pub chunk_type: ChunkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ChunkOrigin>,
}

/// Which provider produced a vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingSource {
    Primary,
    Fallback,
    /// Deterministic placeholder produced after every provider failed
    Synthetic,
}

impl EmbeddingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingSource::Primary => "primary",
            EmbeddingSource::Fallback => "fallback",
            EmbeddingSource::Synthetic => "synthetic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: CodeChunk,
    pub vector: Vec<f32>,
    pub model_id: String,
    pub dimension: usize,
    pub source: EmbeddingSource,
}

impl EmbeddedChunk {
    pub fn embedding_failed(&self) -> bool {
        self.source == EmbeddingSource::Synthetic
    }
}

/// Record as sent to the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl VectorRecord {
    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get("file_path").and_then(|v| v.as_str())
    }
}

/// Options for a single sync run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Baseline commit overriding the stored last synced commit
    pub since_commit: Option<String>,
    /// Process the range even when baseline equals the current commit
    pub force: bool,
    pub dry_run: bool,
    /// Overrides `sync.include_tests` from the configuration
    pub include_tests: Option<bool>,
}

/// Aggregate statistics for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total_files: usize,
    pub added_files: usize,
    pub modified_files: usize,
    pub renamed_files: usize,
    pub deleted_files: usize,
    pub skipped_files: usize,
    pub total_chunks: usize,
    pub total_embeddings: usize,
    pub failed_embeddings: usize,
    pub vectors_upserted: usize,
    /// Sum of known filtered-delete counts; unknown counts are not included
    pub vectors_deleted: usize,
    pub error_count: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Baseline equals the current commit, nothing was processed
    UpToDate,
    Completed,
    CompletedWithErrors,
}

/// Structured summary returned by every run that reaches finalize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub outcome: RunOutcome,
    pub from_commit: String,
    pub to_commit: String,
    pub dry_run: bool,
    pub stats: RunStats,
    /// One entry per failed file or failed deletion
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.stats.error_count == 0
    }
}

#[cfg(test)]
mod tests;
