//! End-to-end sync runs against a real git repository
//!
//! Uses a libgit2 repository in a temp dir, an in-memory index and a
//! deterministic hashing embedder, so no network or model download is needed.

use async_trait::async_trait;
use git2::{Commit, Repository, Signature};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vector_sync::embedding::{
    CoordinatorSettings, EmbeddingCoordinator, EmbeddingProvider, RawEmbedding,
};
use vector_sync::error::{EmbeddingError, SyncError};
use vector_sync::repo::GitDiffSource;
use vector_sync::state::SyncStateStore;
use vector_sync::sync::{SyncOrchestrator, SyncSettings};
use vector_sync::types::{RunOutcome, SyncOptions, VectorRecord};
use vector_sync::vector_db::MemoryVectorIndex;

const DIM: usize = 8;

struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<RawEmbedding, EmbeddingError> {
        let digest = Sha256::digest(text.as_bytes());
        Ok(RawEmbedding::Single(
            digest[..DIM].iter().map(|b| *b as f32 / 255.0 + 0.1).collect(),
        ))
    }

    fn model_id(&self) -> &str {
        "hash-embedder"
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

struct Workspace {
    repo_dir: TempDir,
    _state_dir: TempDir,
    repo: Repository,
    index: Arc<MemoryVectorIndex>,
    orchestrator: SyncOrchestrator,
}

impl Workspace {
    fn new() -> Self {
        let repo_dir = TempDir::new().unwrap();
        let state_dir = TempDir::new().unwrap();
        let repo = Repository::init(repo_dir.path()).unwrap();

        let index = Arc::new(MemoryVectorIndex::new(DIM));
        let embedder = EmbeddingCoordinator::new(
            Arc::new(HashEmbedder),
            None,
            CoordinatorSettings {
                timeout: Duration::from_secs(5),
                max_retries: 0,
                retry_backoff: Duration::ZERO,
                request_delay: Duration::ZERO,
                max_input_chars: 4096,
                dimension: DIM,
            },
        );
        let orchestrator = SyncOrchestrator::new(
            Arc::new(GitDiffSource::discover(repo_dir.path()).unwrap()),
            embedder,
            index.clone(),
            SyncStateStore::new(state_dir.path().join("state.json")),
            SyncSettings::default(),
        )
        .unwrap();

        Self {
            repo_dir,
            _state_dir: state_dir,
            repo,
            index,
            orchestrator,
        }
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.repo_dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(path)).unwrap();
        index.write().unwrap();
    }

    fn remove(&self, path: &str) {
        fs::remove_file(self.repo_dir.path().join(path)).unwrap();
        let mut index = self.repo.index().unwrap();
        index.remove_path(Path::new(path)).unwrap();
        index.write().unwrap();
    }

    fn rename(&self, from: &str, to: &str) {
        let content = fs::read_to_string(self.repo_dir.path().join(from)).unwrap();
        self.remove(from);
        self.write(to, &content);
    }

    fn commit(&self, message: &str) -> String {
        let mut index = self.repo.index().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    fn records_for(&self, path: &str) -> Vec<VectorRecord> {
        let mut records: Vec<VectorRecord> = self
            .index
            .records("main")
            .into_iter()
            .filter(|r| r.file_path() == Some(path))
            .collect();
        records.sort_by_key(|r| line(r, "start_line"));
        records
    }

    async fn sync_since(&self, commit: &str) -> vector_sync::types::SyncReport {
        self.orchestrator
            .run(SyncOptions {
                since_commit: Some(commit.to_string()),
                ..SyncOptions::default()
            })
            .await
            .unwrap()
    }
}

fn line(record: &VectorRecord, key: &str) -> u64 {
    record.metadata[key].as_u64().unwrap()
}

/// A single exported function spanning 50 lines and well over 1KB
fn auth_module(salt: &str) -> String {
    let mut source =
        String::from("export function authenticate(user: string, secret: string): number {\n");
    for i in 0..47 {
        source.push_str(&format!(
            "  const round{i} = user.length + secret.length + {i} * {salt};\n"
        ));
    }
    source.push_str("  return user.length;\n}\n");
    source
}

fn util_module() -> String {
    "export function clamp(value: number): number {\n  return Math.max(0, value);\n}\n".to_string()
}

/// Four functions followed by trailing declarations, long enough for function-level chunking
fn multi_function_module() -> String {
    let mut source = String::from("import { config } from './settings';\n\n");
    for f in 0..4 {
        source.push_str(&format!("export function stage{f}(first: number, second: number): number {{\n"));
        for i in 0..10 {
            source.push_str(&format!(
                "  const total{i} = first + second + config.offset + {i};\n"
            ));
        }
        source.push_str("  return first;\n}\n\n");
    }
    source.push_str("export const STAGES = 4;\nexport const NAME = 'pipeline';\n");
    source
}

#[tokio::test]
async fn test_modified_function_scenario() {
    let ws = Workspace::new();
    ws.write("README.md", "# demo\n");
    let initial = ws.commit("initial");

    ws.write("src/auth.ts", &auth_module("3"));
    ws.write("src/util.ts", &util_module());
    let a = ws.commit("add auth and util");

    let first = ws.sync_since(&initial).await;
    assert_eq!(first.stats.added_files, 2);
    assert_eq!(first.stats.error_count, 0);
    let util_before = ws.records_for("src/util.ts");
    assert_eq!(util_before.len(), 1);
    assert_eq!(ws.records_for("src/auth.ts").len(), 1);

    ws.write("src/auth.ts", &auth_module("5"));
    let b = ws.commit("tweak auth");

    let report = ws.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(report.from_commit, a);
    assert_eq!(report.to_commit, b);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.stats.total_files, 1);
    assert_eq!(report.stats.modified_files, 1);
    assert_eq!(report.stats.total_chunks, 1);
    assert_eq!(report.stats.vectors_upserted, 1);

    let auth = ws.records_for("src/auth.ts");
    assert_eq!(auth.len(), 1);
    assert_eq!(auth[0].metadata["change_type"], "modified");
    assert_eq!(auth[0].metadata["commit"].as_str(), Some(b.as_str()));
    assert_eq!(auth[0].metadata["function_name"], "authenticate");
    assert_eq!(line(&auth[0], "start_line"), 1);
    assert_eq!(line(&auth[0], "end_line"), 50);

    assert_eq!(ws.records_for("src/util.ts"), util_before);

    let state = ws.orchestrator.state().unwrap().unwrap();
    assert_eq!(state.last_synced_commit(), Some(b.as_str()));
    assert_eq!(state.stats.runs, 2);
}

#[tokio::test]
async fn test_second_run_is_noop() {
    let ws = Workspace::new();
    let initial = ws.commit("initial");
    ws.write("src/util.ts", &util_module());
    let head = ws.commit("add util");

    ws.sync_since(&initial).await;
    let records = ws.index.records("main");

    let report = ws.orchestrator.run(SyncOptions::default()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::UpToDate);
    assert_eq!(report.stats.vectors_upserted, 0);
    assert_eq!(report.stats.vectors_deleted, 0);
    assert_eq!(ws.index.records("main"), records);
    assert_eq!(
        ws.orchestrator.state().unwrap().unwrap().last_synced_commit(),
        Some(head.as_str())
    );
}

#[tokio::test]
async fn test_rename_and_delete() {
    let ws = Workspace::new();
    let initial = ws.commit("initial");
    ws.write("src/a.ts", &auth_module("2"));
    ws.write("src/x.ts", &util_module());
    ws.commit("add files");
    ws.sync_since(&initial).await;
    assert!(!ws.records_for("src/a.ts").is_empty());
    assert!(!ws.records_for("src/x.ts").is_empty());

    ws.rename("src/a.ts", "src/b.ts");
    ws.remove("src/x.ts");
    ws.commit("rename a, drop x");

    let report = ws.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(report.stats.renamed_files, 1);
    assert_eq!(report.stats.deleted_files, 1);
    assert!(ws.records_for("src/a.ts").is_empty());
    assert!(!ws.records_for("src/b.ts").is_empty());
    assert!(ws.records_for("src/x.ts").is_empty());
}

#[tokio::test]
async fn test_function_chunks_cover_file() {
    let ws = Workspace::new();
    let initial = ws.commit("initial");
    let source = multi_function_module();
    ws.write("src/pipeline.ts", &source);
    ws.commit("add pipeline");

    let report = ws.sync_since(&initial).await;
    assert_eq!(report.stats.error_count, 0);

    let records = ws.records_for("src/pipeline.ts");
    assert!(records.len() >= 4, "expected one chunk per function");
    assert!(
        records
            .iter()
            .all(|r| r.metadata["strategy"] == "function_level")
    );

    let total_lines = source.lines().count() as u64;
    assert_eq!(line(&records[0], "start_line"), 1);
    for pair in records.windows(2) {
        assert_eq!(line(&pair[1], "start_line"), line(&pair[0], "end_line") + 1);
    }
    assert_eq!(line(records.last().unwrap(), "end_line"), total_lines);
}

#[tokio::test]
async fn test_dry_run_leaves_index_and_state() {
    let ws = Workspace::new();
    let initial = ws.commit("initial");
    ws.write("src/util.ts", &util_module());
    let a = ws.commit("add util");
    ws.sync_since(&initial).await;
    let records = ws.index.records("main");

    ws.write("src/auth.ts", &auth_module("9"));
    ws.remove("src/util.ts");
    ws.commit("add auth, drop util");

    let report = ws
        .orchestrator
        .run(SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        })
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.stats.total_files, 2);
    assert!(report.stats.total_chunks > 0);
    assert_eq!(ws.index.records("main"), records);
    assert_eq!(
        ws.orchestrator.state().unwrap().unwrap().last_synced_commit(),
        Some(a.as_str())
    );
}

#[tokio::test]
async fn test_first_run_needs_baseline() {
    let ws = Workspace::new();
    ws.write("src/util.ts", &util_module());
    ws.commit("initial");

    let result = ws.orchestrator.run(SyncOptions::default()).await;
    assert!(matches!(result, Err(SyncError::NoBaselineCommit)));
}
