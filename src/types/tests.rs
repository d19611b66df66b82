use super::*;

#[test]
fn test_file_change_extension() {
    let change = FileChange::new("src/Auth.TS", ChangeStatus::Added);
    assert_eq!(change.extension, "ts");
    assert!(change.previous_path.is_none());
    assert!(change.size_bytes.is_none());
}

#[test]
fn test_file_change_without_extension() {
    let change = FileChange::new("Makefile", ChangeStatus::Modified);
    assert_eq!(change.extension, "");
}

#[test]
fn test_file_change_renamed() {
    let change = FileChange::renamed("a.ts", "b.ts").with_size(42);
    assert_eq!(change.status, ChangeStatus::Renamed);
    assert_eq!(change.path, "b.ts");
    assert_eq!(change.previous_path.as_deref(), Some("a.ts"));
    assert_eq!(change.size_bytes, Some(42));
}

#[test]
fn test_change_status_serialization() {
    let json = serde_json::to_string(&ChangeStatus::Renamed).unwrap();
    assert_eq!(json, "\"renamed\"");
    assert_eq!(ChangeStatus::Deleted.as_str(), "deleted");
}

#[test]
fn test_chunk_strategy_parse_and_display() {
    for name in [
        "file_level",
        "function_level",
        "class_level",
        "sliding_window",
        "sliding_window_with_overlap",
        "sliding_window_with_high_overlap",
        "hybrid",
    ] {
        let strategy: ChunkStrategy = name.parse().unwrap();
        assert_eq!(strategy.to_string(), name);
    }
    assert!("line_level".parse::<ChunkStrategy>().is_err());
}

#[test]
fn test_chunk_strategy_serde_matches_as_str() {
    let json = serde_json::to_string(&ChunkStrategy::SlidingWindowWithHighOverlap).unwrap();
    assert_eq!(json, "\"sliding_window_with_high_overlap\"");
}

#[test]
fn test_window_overlap_percent() {
    assert_eq!(ChunkStrategy::SlidingWindow.window_overlap_percent(), Some(10));
    assert_eq!(
        ChunkStrategy::SlidingWindowWithOverlap.window_overlap_percent(),
        Some(25)
    );
    assert_eq!(
        ChunkStrategy::SlidingWindowWithHighOverlap.window_overlap_percent(),
        Some(50)
    );
    assert_eq!(ChunkStrategy::Hybrid.window_overlap_percent(), Some(25));
    assert_eq!(ChunkStrategy::FunctionLevel.window_overlap_percent(), None);
    assert_eq!(ChunkStrategy::FileLevel.window_overlap_percent(), None);
}

#[test]
fn test_complexity_ordering() {
    assert!(Complexity::Low < Complexity::Medium);
    assert!(Complexity::Medium < Complexity::High);
}

#[test]
fn test_embedded_chunk_failed_flag() {
    let chunk = CodeChunk {
        content: "fn main() {}".to_string(),
        source_path: "src/main.rs".to_string(),
        strategy: ChunkStrategy::FileLevel,
        language: "rust".to_string(),
        start_line: 1,
        end_line: 1,
        chunk_type: ChunkType::File,
        function_name: None,
        class_name: None,
        origin: None,
    };
    let mut embedded = EmbeddedChunk {
        chunk,
        vector: vec![0.0; 4],
        model_id: "model".to_string(),
        dimension: 4,
        source: EmbeddingSource::Primary,
    };
    assert!(!embedded.embedding_failed());
    embedded.source = EmbeddingSource::Synthetic;
    assert!(embedded.embedding_failed());
}

#[test]
fn test_vector_record_file_path() {
    let mut metadata = serde_json::Map::new();
    metadata.insert("file_path".to_string(), "src/lib.rs".into());
    let record = VectorRecord {
        id: "abc".to_string(),
        vector: vec![1.0],
        metadata,
    };
    assert_eq!(record.file_path(), Some("src/lib.rs"));
}

#[test]
fn test_run_stats_camel_case() {
    let stats = RunStats {
        total_files: 3,
        error_count: 1,
        ..Default::default()
    };
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["totalFiles"], 3);
    assert_eq!(json["errorCount"], 1);
    assert_eq!(json["durationMs"], 0);
}

#[test]
fn test_sync_report_success() {
    let mut report = SyncReport {
        outcome: RunOutcome::Completed,
        from_commit: "a".to_string(),
        to_commit: "b".to_string(),
        dry_run: false,
        stats: RunStats::default(),
        errors: vec![],
    };
    assert!(report.is_success());
    report.stats.error_count = 2;
    assert!(!report.is_success());
}

#[test]
fn test_sync_options_default() {
    let options = SyncOptions::default();
    assert!(options.since_commit.is_none());
    assert!(!options.force);
    assert!(!options.dry_run);
    assert!(options.include_tests.is_none());
}
