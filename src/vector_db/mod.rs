// LanceDB is the default embedded index; Pinecone is reached over REST
pub mod lance_client;
pub mod memory;
pub mod pinecone_client;

pub use lance_client::LanceVectorIndex;
pub use memory::MemoryVectorIndex;
pub use pinecone_client::PineconeVectorIndex;

use crate::config::Config;
use crate::error::VectorIndexError;
use crate::types::VectorRecord;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Conjunction of equality conditions on string metadata fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    fields: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::default().and(key, value)
    }

    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether a metadata map satisfies every condition
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.fields
            .iter()
            .all(|(key, expected)| match metadata.get(key) {
                Some(Value::String(actual)) => actual == expected,
                Some(Value::Bool(actual)) => actual.to_string() == *expected,
                Some(Value::Number(actual)) => actual.to_string() == *expected,
                _ => false,
            })
    }
}

/// One similarity-search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorMatch {
    pub id: String,
    /// Higher is more similar
    pub score: f32,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_vectors: usize,
    pub dimension: Option<usize>,
    /// Vector count per namespace
    pub namespaces: BTreeMap<String, usize>,
}

/// Operations the sync pipeline needs from a vector index
///
/// Every operation is scoped to a namespace. `delete_by_filter` returns
/// `None` when the backend cannot report how many vectors it removed.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by id, returning how many were written
    async fn upsert(
        &self,
        records: Vec<VectorRecord>,
        namespace: &str,
    ) -> Result<usize, VectorIndexError>;

    async fn query_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
        namespace: &str,
    ) -> Result<Vec<VectorMatch>, VectorIndexError>;

    async fn delete_by_ids(&self, ids: &[String], namespace: &str)
    -> Result<(), VectorIndexError>;

    async fn delete_by_filter(
        &self,
        filter: &MetadataFilter,
        namespace: &str,
    ) -> Result<Option<usize>, VectorIndexError>;

    /// Counts for one namespace, or for the whole index when `None`
    async fn describe_stats(&self, namespace: Option<&str>)
    -> Result<IndexStats, VectorIndexError>;

    /// Backend name for logs and status output
    fn name(&self) -> &'static str;
}

/// Open the backend selected by `index.backend`
pub async fn open_index(config: &Config) -> Result<Arc<dyn VectorIndex>, VectorIndexError> {
    let index = &config.index;
    match index.backend.as_str() {
        "lancedb" => {
            let path = index.lancedb_path.to_string_lossy();
            let lance = LanceVectorIndex::with_path(&path, index.dimension).await?;
            Ok(Arc::new(lance))
        }
        "pinecone" => {
            let api_key = std::env::var(&index.pinecone_api_key_env).map_err(|_| {
                VectorIndexError::ConnectionFailed(format!(
                    "{} is not set",
                    index.pinecone_api_key_env
                ))
            })?;
            Ok(Arc::new(PineconeVectorIndex::new(
                &index.pinecone_host,
                &api_key,
                index.upsert_batch_size,
            )?))
        }
        "memory" => Ok(Arc::new(MemoryVectorIndex::new(index.dimension))),
        other => Err(VectorIndexError::ConnectionFailed(format!(
            "unknown index backend '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_matches_all_fields() {
        let filter = MetadataFilter::eq("file_path", "src/auth.ts").and("language", "typescript");
        assert!(filter.matches(&metadata(json!({
            "file_path": "src/auth.ts",
            "language": "typescript",
            "start_line": 1
        }))));
        assert!(!filter.matches(&metadata(json!({
            "file_path": "src/auth.ts",
            "language": "javascript"
        }))));
        assert!(!filter.matches(&metadata(json!({ "file_path": "src/auth.ts" }))));
    }

    #[test]
    fn test_filter_matches_scalars() {
        let filter = MetadataFilter::eq("low_confidence", "true").and("start_line", "10");
        assert!(filter.matches(&metadata(json!({
            "low_confidence": true,
            "start_line": 10
        }))));
    }

    #[test]
    fn test_empty_filter() {
        let filter = MetadataFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&Map::new()));
        assert_eq!(filter.fields().count(), 0);
    }

    #[tokio::test]
    async fn test_open_memory_index() {
        let mut config = Config::default();
        config.index.backend = "memory".to_string();
        let index = open_index(&config).await.unwrap();
        assert_eq!(index.name(), "memory");
    }

    #[tokio::test]
    async fn test_open_unknown_backend() {
        let mut config = Config::default();
        config.index.backend = "faiss".to_string();
        assert!(matches!(
            open_index(&config).await,
            Err(VectorIndexError::ConnectionFailed(_))
        ));
    }
}
