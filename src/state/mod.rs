//! Persisted synchronization state
//!
//! The state document is split into sections. Each section is changed only
//! through its typed patch: `Some` fields overwrite, `None` fields keep the
//! stored value, and statistics accumulate instead of being replaced.

mod lock;
mod store;

pub use lock::SyncLock;
pub use store::SyncStateStore;

use crate::types::ChunkStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Newest state document layout this build understands
pub const STATE_VERSION: u32 = 1;

fn default_version() -> u32 {
    STATE_VERSION
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    CompletedWithErrors,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

/// Stored at the top level of the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingInfo {
    #[serde(default)]
    pub last_synced_commit: Option<String>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ProcessingStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorizationInfo {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub embedding_model: String,
    #[serde(default)]
    pub fallback_model: Option<String>,
    #[serde(default)]
    pub embedding_dimension: usize,
}

/// Totals accumulated over every run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeStats {
    #[serde(default)]
    pub files_processed: u64,
    #[serde(default)]
    pub chunks_created: u64,
    #[serde(default)]
    pub vectors_stored: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub runs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingDefaults {
    pub clean_modules: ChunkStrategy,
    pub complex_modules: ChunkStrategy,
    pub monolithic_files: ChunkStrategy,
}

impl Default for ChunkingDefaults {
    fn default() -> Self {
        Self {
            clean_modules: ChunkStrategy::FunctionLevel,
            complex_modules: ChunkStrategy::ClassLevel,
            monolithic_files: ChunkStrategy::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateConfiguration {
    #[serde(default)]
    pub include_tests: bool,
    #[serde(default)]
    pub chunking_defaults: ChunkingDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub repository: RepositoryInfo,
    #[serde(flatten)]
    pub processing: ProcessingInfo,
    #[serde(default)]
    pub vectorization: VectorizationInfo,
    #[serde(default)]
    pub stats: CumulativeStats,
    #[serde(default)]
    pub configuration: StateConfiguration,
}

impl SyncState {
    /// State of a repository that has never been synchronized
    pub fn new(repository_name: &str) -> Self {
        Self {
            version: STATE_VERSION,
            repository: RepositoryInfo {
                name: repository_name.to_string(),
                ..RepositoryInfo::default()
            },
            processing: ProcessingInfo::default(),
            vectorization: VectorizationInfo::default(),
            stats: CumulativeStats::default(),
            configuration: StateConfiguration::default(),
        }
    }

    pub fn last_synced_commit(&self) -> Option<&str> {
        self.processing.last_synced_commit.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepositoryPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub default_branch: Option<String>,
}

impl RepositoryPatch {
    pub fn apply(self, target: &mut RepositoryInfo) {
        if let Some(name) = self.name {
            target.name = name;
        }
        if let Some(url) = self.url {
            target.url = Some(url);
        }
        if let Some(branch) = self.default_branch {
            target.default_branch = Some(branch);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingPatch {
    pub last_synced_commit: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub status: Option<ProcessingStatus>,
}

impl ProcessingPatch {
    pub fn apply(self, target: &mut ProcessingInfo) {
        if let Some(commit) = self.last_synced_commit {
            target.last_synced_commit = Some(commit);
        }
        if let Some(at) = self.last_synced_at {
            target.last_synced_at = Some(at);
        }
        if let Some(status) = self.status {
            target.status = status;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VectorizationPatch {
    pub provider: Option<String>,
    pub namespace: Option<String>,
    pub embedding_model: Option<String>,
    pub fallback_model: Option<String>,
    pub embedding_dimension: Option<usize>,
}

impl VectorizationPatch {
    pub fn apply(self, target: &mut VectorizationInfo) {
        if let Some(provider) = self.provider {
            target.provider = provider;
        }
        if let Some(namespace) = self.namespace {
            target.namespace = namespace;
        }
        if let Some(model) = self.embedding_model {
            target.embedding_model = model;
        }
        if let Some(model) = self.fallback_model {
            target.fallback_model = Some(model);
        }
        if let Some(dimension) = self.embedding_dimension {
            target.embedding_dimension = dimension;
        }
    }
}

/// Counts from one run, added onto the cumulative totals
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsDelta {
    pub files_processed: u64,
    pub chunks_created: u64,
    pub vectors_stored: u64,
    pub error_count: u64,
}

impl StatsDelta {
    pub fn apply(self, target: &mut CumulativeStats) {
        target.files_processed += self.files_processed;
        target.chunks_created += self.chunks_created;
        target.vectors_stored += self.vectors_stored;
        target.error_count += self.error_count;
        target.runs += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigurationPatch {
    pub include_tests: Option<bool>,
    pub chunking_defaults: Option<ChunkingDefaults>,
}

impl ConfigurationPatch {
    pub fn apply(self, target: &mut StateConfiguration) {
        if let Some(include_tests) = self.include_tests {
            target.include_tests = include_tests;
        }
        if let Some(defaults) = self.chunking_defaults {
            target.chunking_defaults = defaults;
        }
    }
}
