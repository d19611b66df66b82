//! # vector-sync - incremental git to vector index synchronization
//!
//! Keeps a vector index of a code repository current as commits land. Each
//! run diffs the last synchronized commit against `HEAD`, removes vectors of
//! deleted and rewritten files, and chunks, embeds and upserts what changed.
//!
//! ## Architecture
//!
//! ```text
//!  RepoDiffSource ──► FileClassifier ──► ChunkingEngine ──► EmbeddingCoordinator
//!   (git2 diff)        (globset)          (tree-sitter)      (HuggingFace / FastEmbed)
//!        │                                                          │
//!        └────────────── SyncOrchestrator ◄─────────────────────────┘
//!                          │          │
//!                 SyncStateStore   VectorIndex
//!                  (JSON + flock)   (LanceDB / Pinecone / memory)
//! ```
//!
//! ## Modules
//!
//! - [`repo`]: commit resolution, rename-aware diffs and blob reads
//! - [`indexer`]: classification, boundary extraction, analysis and chunking
//! - [`embedding`]: embedding providers and the fallback coordinator
//! - [`vector_db`]: vector index abstraction and its backends
//! - [`state`]: persisted sync state and the run lock
//! - [`sync`]: the orchestrator tying a run together
//! - [`config`]: configuration with environment variable overrides
//! - [`types`]: shared data types
//! - [`error`]: error types
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::path::Path;
//! use vector_sync::config::Config;
//! use vector_sync::sync::SyncOrchestrator;
//! use vector_sync::types::SyncOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let repo = Path::new(".");
//!     let config = Config::new(None, repo)?;
//!     let orchestrator = SyncOrchestrator::from_config(&config, repo).await?;
//!
//!     let report = orchestrator.run(SyncOptions::default()).await?;
//!     println!("{} vectors upserted", report.stats.vectors_upserted);
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding providers and the primary/fallback coordinator
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Glob set helpers shared by path classification
pub mod glob_utils;

/// File classification, boundary extraction, and code chunking
pub mod indexer;

/// Platform-specific directories and state file resolution
pub mod paths;

/// Git change detection
pub mod repo;

/// Persisted sync state and the single-writer run lock
pub mod state;

/// Sync run orchestration
pub mod sync;

/// Shared data types
pub mod types;

/// Vector index abstraction supporting LanceDB, Pinecone and an in-memory index
pub mod vector_db;
