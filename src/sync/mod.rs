//! Incremental synchronization of a git repository into a vector index
//!
//! One run moves the index from the last synchronized commit to `HEAD`:
//! deletions are applied first, then changed files are classified, chunked,
//! embedded and upserted in bounded concurrent batches. Failures are scoped
//! to the file they happen in; the run still completes and the stored commit
//! pointer still advances.

use crate::config::{ChunkingConfig, Config};
use crate::embedding::EmbeddingCoordinator;
use crate::error::SyncError;
use crate::indexer::language::UNKNOWN_LANGUAGE;
use crate::indexer::{ChunkingEngine, FileClassifier, FileMeta, analyze, is_indexable};
use crate::paths::PlatformPaths;
use crate::repo::{GitDiffSource, RepoDiffSource};
use crate::state::{
    ChunkingDefaults, ConfigurationPatch, ProcessingPatch, ProcessingStatus, RepositoryPatch,
    StatsDelta, SyncLock, SyncState, SyncStateStore, VectorizationPatch,
};
use crate::types::{
    ChangeStatus, ChunkOrigin, Classification, CodeChunk, EmbeddedChunk, FileAnalysis, FileChange,
    RunOutcome, RunStats, SyncOptions, SyncReport, VectorRecord,
};
use crate::vector_db::{IndexStats, MetadataFilter, VectorIndex, VectorMatch, open_index};
use futures::future::join_all;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Run parameters taken from the configuration
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub namespace: String,
    pub batch_size: usize,
    pub include_tests: bool,
    /// Upsert synthetic vectors flagged `low_confidence` instead of dropping them
    pub upsert_low_confidence: bool,
    pub metadata_content_chars: usize,
    /// Overrides the name reported by the repository when non-empty
    pub repository_name: String,
    pub chunking: ChunkingConfig,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            namespace: config.index.namespace.clone(),
            batch_size: config.sync.batch_size,
            include_tests: config.sync.include_tests,
            upsert_low_confidence: config.low_confidence_policy(),
            metadata_content_chars: config.embedding.metadata_content_chars,
            repository_name: config.sync.repository_name.clone(),
            chunking: config.chunking.clone(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to one changed file
#[derive(Debug, Default)]
struct FileOutcome {
    skipped: bool,
    chunks: usize,
    embeddings: usize,
    failed_embeddings: usize,
    upserted: usize,
    deleted: usize,
    error: Option<String>,
}

/// Per-run values shared by every file task
struct RunContext<'a> {
    commit: &'a str,
    repository: &'a str,
    dry_run: bool,
    include_tests: bool,
}

/// Deterministic vector id for the `ordinal`-th chunk of a file
pub fn chunk_id(path: &str, ordinal: usize, start_line: usize, end_line: usize) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}-{}", path, ordinal, start_line, end_line));
    let mut hex = format!("{:x}", digest);
    hex.truncate(32);
    hex
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}

fn preview(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}

pub struct SyncOrchestrator {
    repo: Arc<dyn RepoDiffSource>,
    embedder: EmbeddingCoordinator,
    index: Arc<dyn VectorIndex>,
    store: SyncStateStore,
    classifier: FileClassifier,
    chunker: Arc<ChunkingEngine>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        repo: Arc<dyn RepoDiffSource>,
        embedder: EmbeddingCoordinator,
        index: Arc<dyn VectorIndex>,
        store: SyncStateStore,
        settings: SyncSettings,
    ) -> Result<Self, SyncError> {
        let classifier = FileClassifier::new()?;
        let chunker = Arc::new(ChunkingEngine::new(settings.chunking.fallback_block_lines)?);

        Ok(Self {
            repo,
            embedder,
            index,
            store,
            classifier,
            chunker,
            settings,
        })
    }

    /// Wire every component from configuration for the repository at `repo_root`
    pub async fn from_config(config: &Config, repo_root: &Path) -> Result<Self, SyncError> {
        let repo = GitDiffSource::discover(repo_root)?;
        let state_path = PlatformPaths::resolve_state_path(repo.root(), &config.sync.state_file);
        let embedder = EmbeddingCoordinator::from_config(config)?;
        let index = open_index(config).await?;

        tracing::info!(
            "Sync target: {} index, namespace '{}', state {}",
            index.name(),
            config.index.namespace,
            state_path.display()
        );

        Self::new(
            Arc::new(repo),
            embedder,
            index,
            SyncStateStore::new(state_path),
            SyncSettings::from_config(config),
        )
    }

    pub fn store(&self) -> &SyncStateStore {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.settings.namespace
    }

    fn repository_name(&self) -> String {
        if self.settings.repository_name.is_empty() {
            self.repo.repository_name()
        } else {
            self.settings.repository_name.clone()
        }
    }

    /// Persisted state, `None` if the repository was never synchronized
    pub fn state(&self) -> Result<Option<SyncState>, SyncError> {
        Ok(self.store.load()?)
    }

    pub async fn index_stats(&self) -> Result<IndexStats, SyncError> {
        Ok(self
            .index
            .describe_stats(Some(&self.settings.namespace))
            .await?)
    }

    /// Nearest chunks to a natural-language or code query
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>, SyncError> {
        let vector = self.embedder.embed_query(query).await?;
        Ok(self
            .index
            .query_by_vector(&vector, top_k, filter, &self.settings.namespace)
            .await?)
    }

    /// Synchronize the index from the baseline commit to `HEAD`
    ///
    /// Environment failures (no repository, unknown baseline, a concurrent
    /// run) abort before anything is mutated. Per-file failures are counted
    /// in the report instead.
    pub async fn run(&self, options: SyncOptions) -> Result<SyncReport, SyncError> {
        let started = Instant::now();

        let _lock = SyncLock::try_acquire(self.store.path())?
            .ok_or_else(|| SyncError::RunInProgress(self.store.path().display().to_string()))?;

        let state = self.store.load()?;
        let baseline = match &options.since_commit {
            Some(commit) => commit.clone(),
            None => state
                .as_ref()
                .and_then(|s| s.last_synced_commit())
                .map(str::to_string)
                .ok_or(SyncError::NoBaselineCommit)?,
        };
        let baseline = self.repo.resolve_commit(&baseline)?;
        let current = self.repo.current_commit()?;
        let repository = self.repository_name();

        let span = tracing::info_span!(
            "sync_run",
            repository = %repository,
            namespace = %self.settings.namespace,
            from = %short(&baseline),
            to = %short(&current),
            dry_run = options.dry_run,
        );

        self.run_range(state, baseline, current, repository, options, started)
            .instrument(span)
            .await
    }

    async fn run_range(
        &self,
        state: Option<SyncState>,
        baseline: String,
        current: String,
        repository: String,
        options: SyncOptions,
        started: Instant,
    ) -> Result<SyncReport, SyncError> {
        if baseline == current && !options.force {
            tracing::info!("Index is up to date at {}", short(&current));
            return Ok(SyncReport {
                outcome: RunOutcome::UpToDate,
                from_commit: baseline,
                to_commit: current,
                dry_run: options.dry_run,
                stats: RunStats {
                    duration_ms: started.elapsed().as_millis() as u64,
                    ..RunStats::default()
                },
                errors: Vec::new(),
            });
        }

        let changes = self.changes_between(&baseline, &current).await?;
        tracing::info!(
            "{} changed files between {} and {}",
            changes.len(),
            short(&baseline),
            short(&current)
        );

        let mut state = state.unwrap_or_else(|| SyncState::new(&repository));
        if options.dry_run {
            tracing::info!("[dry-run] would mark the run in progress");
        } else {
            ProcessingPatch {
                status: Some(ProcessingStatus::InProgress),
                ..ProcessingPatch::default()
            }
            .apply(&mut state.processing);
            self.store.save(&state)?;
        }

        let include_tests = options
            .include_tests
            .unwrap_or(self.settings.include_tests);
        let ctx = RunContext {
            commit: &current,
            repository: &repository,
            dry_run: options.dry_run,
            include_tests,
        };

        let mut stats = RunStats {
            total_files: changes.len(),
            ..RunStats::default()
        };
        let mut errors = Vec::new();

        let (deleted, active): (Vec<&FileChange>, Vec<&FileChange>) = changes
            .iter()
            .partition(|change| change.status == ChangeStatus::Deleted);

        for change in deleted {
            stats.deleted_files += 1;
            match self.delete_path(&change.path, ctx.dry_run).await {
                Ok(count) => stats.vectors_deleted += count,
                Err(e) => {
                    tracing::error!("Failed to delete vectors for {}: {}", change.path, e);
                    stats.error_count += 1;
                    errors.push(format!("{}: {}", change.path, e));
                }
            }
        }

        for change in &active {
            match change.status {
                ChangeStatus::Added => stats.added_files += 1,
                ChangeStatus::Modified => stats.modified_files += 1,
                ChangeStatus::Renamed => stats.renamed_files += 1,
                ChangeStatus::Deleted => {}
            }
        }

        let batch_size = self.settings.batch_size.max(1);
        for (number, batch) in active.chunks(batch_size).enumerate() {
            tracing::debug!("Processing batch {} ({} files)", number + 1, batch.len());

            let outcomes = join_all(batch.iter().map(|change| {
                let span = tracing::info_span!(
                    "sync_file",
                    path = %change.path,
                    status = change.status.as_str()
                );
                self.sync_file(change, &ctx).instrument(span)
            }))
            .await;

            for (change, outcome) in batch.iter().zip(outcomes) {
                if outcome.skipped {
                    stats.skipped_files += 1;
                }
                stats.total_chunks += outcome.chunks;
                stats.total_embeddings += outcome.embeddings;
                stats.failed_embeddings += outcome.failed_embeddings;
                stats.vectors_upserted += outcome.upserted;
                stats.vectors_deleted += outcome.deleted;
                if let Some(error) = outcome.error {
                    stats.error_count += 1;
                    errors.push(format!("{}: {}", change.path, error));
                }
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        let outcome = if stats.error_count > 0 {
            RunOutcome::CompletedWithErrors
        } else {
            RunOutcome::Completed
        };

        tracing::info!(
            "Processed {} files ({} added, {} modified, {} renamed, {} deleted, {} skipped): \
             {} chunks, {} vectors upserted, {} errors in {}ms",
            stats.total_files,
            stats.added_files,
            stats.modified_files,
            stats.renamed_files,
            stats.deleted_files,
            stats.skipped_files,
            stats.total_chunks,
            stats.vectors_upserted,
            stats.error_count,
            stats.duration_ms
        );

        let report = SyncReport {
            outcome,
            from_commit: baseline,
            to_commit: current,
            dry_run: options.dry_run,
            stats,
            errors,
        };

        if options.dry_run {
            tracing::info!(
                "[dry-run] would advance lastSyncedCommit to {}",
                short(&report.to_commit)
            );
            return Ok(report);
        }

        self.record_run(&mut state, &report, &repository, include_tests);
        if let Err(source) = self.store.save(&state) {
            tracing::error!(
                "Index updated to {} but sync state could not be saved: {}",
                short(&report.to_commit),
                source
            );
            return Err(SyncError::StatePersistence {
                report: Box::new(report),
                source,
            });
        }

        tracing::info!("lastSyncedCommit advanced to {}", short(&report.to_commit));
        Ok(report)
    }

    fn record_run(
        &self,
        state: &mut SyncState,
        report: &SyncReport,
        repository: &str,
        include_tests: bool,
    ) {
        let stats = &report.stats;
        let status = match report.outcome {
            RunOutcome::CompletedWithErrors => ProcessingStatus::CompletedWithErrors,
            _ => ProcessingStatus::Completed,
        };

        ProcessingPatch {
            last_synced_commit: Some(report.to_commit.clone()),
            last_synced_at: Some(chrono::Utc::now()),
            status: Some(status),
        }
        .apply(&mut state.processing);

        RepositoryPatch {
            name: Some(repository.to_string()),
            ..RepositoryPatch::default()
        }
        .apply(&mut state.repository);

        VectorizationPatch {
            provider: Some(self.index.name().to_string()),
            namespace: Some(self.settings.namespace.clone()),
            embedding_model: Some(self.embedder.primary_model().to_string()),
            fallback_model: self.embedder.fallback_model().map(str::to_string),
            embedding_dimension: Some(self.embedder.dimension()),
        }
        .apply(&mut state.vectorization);

        StatsDelta {
            files_processed: (stats.total_files - stats.skipped_files) as u64,
            chunks_created: stats.total_chunks as u64,
            vectors_stored: stats.vectors_upserted as u64,
            error_count: stats.error_count as u64,
        }
        .apply(&mut state.stats);

        ConfigurationPatch {
            include_tests: Some(include_tests),
            chunking_defaults: Some(ChunkingDefaults {
                clean_modules: self.settings.chunking.clean_modules,
                complex_modules: self.settings.chunking.complex_modules,
                monolithic_files: self.settings.chunking.monolithic_files,
            }),
        }
        .apply(&mut state.configuration);
    }

    /// Rename-aware diff, computed on a blocking thread
    async fn changes_between(&self, from: &str, to: &str) -> Result<Vec<FileChange>, SyncError> {
        let repo = Arc::clone(&self.repo);
        let (from, to) = (from.to_string(), to.to_string());

        let changes = tokio::task::spawn_blocking(move || {
            if repo.has_changes(&from, &to)? {
                repo.diff(&from, &to)
            } else {
                Ok(Vec::new())
            }
        })
        .await
        .map_err(|e| SyncError::other(format!("Diff task failed: {}", e)))??;
        Ok(changes)
    }

    /// Remove every vector tagged with `path`; returns the known delete count
    async fn delete_path(&self, path: &str, dry_run: bool) -> Result<usize, SyncError> {
        if dry_run {
            tracing::info!("[dry-run] would delete vectors for {}", path);
            return Ok(0);
        }

        let filter = MetadataFilter::eq("file_path", path);
        let deleted = self
            .index
            .delete_by_filter(&filter, &self.settings.namespace)
            .await?;
        match deleted {
            Some(count) => tracing::debug!("Deleted {} vectors for {}", count, path),
            None => tracing::debug!("Deleted vectors for {}", path),
        }
        Ok(deleted.unwrap_or(0))
    }

    async fn sync_file(&self, change: &FileChange, ctx: &RunContext<'_>) -> FileOutcome {
        let mut outcome = FileOutcome::default();
        if let Err(e) = self.try_sync_file(change, ctx, &mut outcome).await {
            tracing::error!("Failed to sync {}: {}", change.path, e);
            outcome.error = Some(e.to_string());
        }
        outcome
    }

    async fn try_sync_file(
        &self,
        change: &FileChange,
        ctx: &RunContext<'_>,
        outcome: &mut FileOutcome,
    ) -> Result<(), SyncError> {
        // The old path is gone after a rename whether or not the new one is indexed
        if let Some(previous) = &change.previous_path {
            outcome.deleted += self.delete_path(previous, ctx.dry_run).await?;
        }

        // Vectors from the previous content go even if the file is no longer indexed
        if matches!(change.status, ChangeStatus::Modified | ChangeStatus::Renamed) {
            outcome.deleted += self.delete_path(&change.path, ctx.dry_run).await?;
        }

        let classification = self.classifier.classify(&change.path);
        if !is_indexable(classification.category, ctx.include_tests)
            || classification.language == UNKNOWN_LANGUAGE
        {
            tracing::debug!(
                "Skipping {} ({}, {})",
                change.path,
                classification.category.as_str(),
                classification.language
            );
            outcome.skipped = true;
            return Ok(());
        }

        let (analysis, mut chunks) = {
            let repo = Arc::clone(&self.repo);
            let chunker = Arc::clone(&self.chunker);
            let chunking = self.settings.chunking.clone();
            let commit = ctx.commit.to_string();
            let path = change.path.clone();

            tokio::task::spawn_blocking(move || {
                read_and_chunk(
                    repo.as_ref(),
                    &chunker,
                    &chunking,
                    &classification,
                    &commit,
                    &path,
                )
            })
            .await
            .map_err(|e| SyncError::other(format!("Chunking task failed: {}", e)))??
        };

        let origin = ChunkOrigin {
            category: analysis.category,
            change_type: change.status,
            repository: ctx.repository.to_string(),
            commit: ctx.commit.to_string(),
            complexity: analysis.complexity,
        };
        for chunk in &mut chunks {
            chunk.origin = Some(origin.clone());
        }
        outcome.chunks = chunks.len();

        tracing::debug!(
            "{}: {} lines, {} complexity, {} -> {} chunks",
            change.path,
            analysis.total_lines,
            analysis.complexity.as_str(),
            analysis.chunking_strategy,
            chunks.len()
        );

        if chunks.is_empty() {
            return Ok(());
        }

        if ctx.dry_run {
            tracing::info!(
                "[dry-run] would embed and upsert {} chunks for {}",
                chunks.len(),
                change.path
            );
            outcome.embeddings = chunks.len();
            return Ok(());
        }

        let embedded = self.embedder.embed(chunks).await;
        outcome.failed_embeddings = embedded.iter().filter(|e| e.embedding_failed()).count();
        outcome.embeddings = embedded.len() - outcome.failed_embeddings;

        let records: Vec<VectorRecord> = embedded
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.embedding_failed() || self.settings.upsert_low_confidence)
            .map(|(ordinal, e)| self.to_record(ordinal, e))
            .collect();

        if !records.is_empty() {
            outcome.upserted = self
                .index
                .upsert(records, &self.settings.namespace)
                .await?;
        }

        if outcome.failed_embeddings > 0 {
            outcome.error = Some(format!(
                "{} of {} chunks could not be embedded",
                outcome.failed_embeddings,
                embedded.len()
            ));
        }
        Ok(())
    }

    fn to_record(&self, ordinal: usize, embedded: &EmbeddedChunk) -> VectorRecord {
        let chunk = &embedded.chunk;
        let mut metadata = Map::new();
        metadata.insert("file_path".into(), json!(chunk.source_path));
        metadata.insert("language".into(), json!(chunk.language));
        if let Some(origin) = &chunk.origin {
            metadata.insert("category".into(), json!(origin.category.as_str()));
            metadata.insert("change_type".into(), json!(origin.change_type.as_str()));
            metadata.insert("repository".into(), json!(origin.repository));
            metadata.insert("commit".into(), json!(origin.commit));
            metadata.insert("complexity".into(), json!(origin.complexity.as_str()));
        }
        metadata.insert("chunk_type".into(), json!(chunk.chunk_type.as_str()));
        metadata.insert("strategy".into(), json!(chunk.strategy.as_str()));
        metadata.insert("start_line".into(), json!(chunk.start_line));
        metadata.insert("end_line".into(), json!(chunk.end_line));
        if let Some(name) = &chunk.function_name {
            metadata.insert("function_name".into(), json!(name));
        }
        if let Some(name) = &chunk.class_name {
            metadata.insert("class_name".into(), json!(name));
        }
        metadata.insert(
            "content".into(),
            Value::String(preview(&chunk.content, self.settings.metadata_content_chars).to_string()),
        );
        metadata.insert("model_id".into(), json!(embedded.model_id));
        metadata.insert("embedding_source".into(), json!(embedded.source.as_str()));
        metadata.insert("low_confidence".into(), json!(embedded.embedding_failed()));

        VectorRecord {
            id: chunk_id(&chunk.source_path, ordinal, chunk.start_line, chunk.end_line),
            vector: embedded.vector.clone(),
            metadata,
        }
    }
}

/// Read `path` as of `commit`, then analyze and chunk it
///
/// Runs on a blocking thread: both the blob read and the parse are synchronous.
fn read_and_chunk(
    repo: &dyn RepoDiffSource,
    chunker: &ChunkingEngine,
    chunking: &ChunkingConfig,
    classification: &Classification,
    commit: &str,
    path: &str,
) -> Result<(FileAnalysis, Vec<CodeChunk>), SyncError> {
    let content = repo.read_file(commit, path)?;
    let boundaries = chunker.boundaries(&content, &classification.language);
    let analysis = analyze(
        path,
        classification,
        &content,
        boundaries.as_deref().unwrap_or(&[]),
        chunking,
    );

    let meta = FileMeta {
        path,
        language: &analysis.language,
    };
    let chunks =
        chunker.chunk_with_boundaries(&content, analysis.chunking_strategy, meta, Some(boundaries));
    Ok((analysis, chunks))
}
