use super::*;
use serde_json::json;
use tempfile::TempDir;

async fn open(temp_dir: &TempDir) -> LanceVectorIndex {
    let db_path = temp_dir.path().join("lancedb").to_string_lossy().to_string();
    LanceVectorIndex::with_path(&db_path, 3).await.unwrap()
}

fn record(id: &str, path: &str, vector: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: id.to_string(),
        vector,
        metadata: json!({
            "file_path": path,
            "language": "rust",
            "category": "normal",
            "chunk_type": "function",
            "content": format!("fn {}() {{}}", id),
            "start_line": 1,
        })
        .as_object()
        .cloned()
        .unwrap(),
    }
}

#[test]
fn test_sql_literal_escapes_quotes() {
    assert_eq!(sql_literal("src/it's.rs"), "'src/it''s.rs'");
}

#[test]
fn test_predicate() {
    let filter = MetadataFilter::eq("file_path", "src/a.rs").and("language", "rust");
    assert_eq!(
        LanceVectorIndex::predicate("main", Some(&filter)).unwrap(),
        "namespace = 'main' AND file_path = 'src/a.rs' AND language = 'rust'"
    );

    let unsupported = MetadataFilter::eq("function_name", "login");
    assert!(matches!(
        LanceVectorIndex::predicate("main", Some(&unsupported)),
        Err(VectorIndexError::UnsupportedFilter(_))
    ));
}

#[tokio::test]
async fn test_empty_index_before_first_upsert() {
    let temp_dir = TempDir::new().unwrap();
    let index = open(&temp_dir).await;

    let hits = index.query_by_vector(&[1.0, 0.0, 0.0], 5, None, "main").await.unwrap();
    assert!(hits.is_empty());

    let deleted = index
        .delete_by_filter(&MetadataFilter::eq("file_path", "a.rs"), "main")
        .await
        .unwrap();
    assert_eq!(deleted, Some(0));

    let stats = index.describe_stats(None).await.unwrap();
    assert_eq!(stats.total_vectors, 0);
    assert_eq!(stats.dimension, Some(3));
}

#[tokio::test]
async fn test_upsert_and_query() {
    let temp_dir = TempDir::new().unwrap();
    let index = open(&temp_dir).await;

    let written = index
        .upsert(
            vec![
                record("a", "src/a.rs", vec![1.0, 0.0, 0.0]),
                record("b", "src/b.rs", vec![0.0, 1.0, 0.0]),
            ],
            "main",
        )
        .await
        .unwrap();
    assert_eq!(written, 2);

    let hits = index.query_by_vector(&[1.0, 0.0, 0.0], 1, None, "main").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "a");
    assert_eq!(
        hits[0].metadata.get("file_path").and_then(Value::as_str),
        Some("src/a.rs")
    );
    assert_eq!(hits[0].metadata.get("start_line"), Some(&json!(1)));
}

#[tokio::test]
async fn test_upsert_replaces_same_id() {
    let temp_dir = TempDir::new().unwrap();
    let index = open(&temp_dir).await;

    index
        .upsert(vec![record("a", "src/a.rs", vec![1.0, 0.0, 0.0])], "main")
        .await
        .unwrap();
    index
        .upsert(vec![record("a", "src/a.rs", vec![0.0, 0.0, 1.0])], "main")
        .await
        .unwrap();

    let stats = index.describe_stats(Some("main")).await.unwrap();
    assert_eq!(stats.total_vectors, 1);
}

#[tokio::test]
async fn test_delete_by_filter_reports_count() {
    let temp_dir = TempDir::new().unwrap();
    let index = open(&temp_dir).await;

    index
        .upsert(
            vec![
                record("a1", "src/a.rs", vec![1.0, 0.0, 0.0]),
                record("a2", "src/a.rs", vec![0.9, 0.1, 0.0]),
                record("b1", "src/b.rs", vec![0.0, 1.0, 0.0]),
            ],
            "main",
        )
        .await
        .unwrap();

    let deleted = index
        .delete_by_filter(&MetadataFilter::eq("file_path", "src/a.rs"), "main")
        .await
        .unwrap();
    assert_eq!(deleted, Some(2));

    let stats = index.describe_stats(None).await.unwrap();
    assert_eq!(stats.total_vectors, 1);
}

#[tokio::test]
async fn test_namespaces_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let index = open(&temp_dir).await;

    index
        .upsert(vec![record("a", "src/a.rs", vec![1.0, 0.0, 0.0])], "main")
        .await
        .unwrap();
    index
        .upsert(vec![record("a", "src/a.rs", vec![1.0, 0.0, 0.0])], "feature")
        .await
        .unwrap();

    index.delete_by_ids(&["a".to_string()], "feature").await.unwrap();

    let stats = index.describe_stats(None).await.unwrap();
    assert_eq!(stats.namespaces.get("main"), Some(&1));
    assert_eq!(stats.namespaces.get("feature"), None);

    let hits = index.query_by_vector(&[1.0, 0.0, 0.0], 5, None, "feature").await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_dimension_mismatch_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let index = open(&temp_dir).await;

    let err = index
        .upsert(vec![record("a", "src/a.rs", vec![1.0])], "main")
        .await
        .unwrap_err();
    assert!(matches!(err, VectorIndexError::DimensionMismatch { expected: 3, actual: 1 }));
}
