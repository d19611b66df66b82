//! Pinecone data-plane client over REST

use super::{IndexStats, MetadataFilter, VectorIndex, VectorMatch};
use crate::error::VectorIndexError;
use crate::types::VectorRecord;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

pub struct PineconeVectorIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    batch_size: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    namespaces: BTreeMap<String, NamespaceSummary>,
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: usize,
}

/// `{"field": {"$eq": value}}` for each condition
fn filter_json(filter: &MetadataFilter) -> Value {
    let conditions: Map<String, Value> = filter
        .fields()
        .map(|(key, value)| (key.to_string(), json!({ "$eq": value })))
        .collect();
    Value::Object(conditions)
}

/// Pinecone rejects null metadata values
fn strip_nulls(metadata: &Map<String, Value>) -> Map<String, Value> {
    metadata
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn upsert_body(records: &[VectorRecord], namespace: &str) -> Value {
    let vectors: Vec<Value> = records
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "values": r.vector,
                "metadata": strip_nulls(&r.metadata),
            })
        })
        .collect();
    json!({ "vectors": vectors, "namespace": namespace })
}

fn stats_from_response(response: StatsResponse, namespace: Option<&str>) -> IndexStats {
    let namespaces: BTreeMap<String, usize> = response
        .namespaces
        .into_iter()
        .filter(|(name, _)| namespace.is_none_or(|n| n == name.as_str()))
        .map(|(name, summary)| (name, summary.vector_count))
        .collect();

    let total_vectors = match namespace {
        Some(_) => namespaces.values().sum(),
        None => response.total_vector_count,
    };

    IndexStats {
        total_vectors,
        dimension: response.dimension,
        namespaces,
    }
}

impl PineconeVectorIndex {
    pub fn new(host: &str, api_key: &str, batch_size: usize) -> Result<Self, VectorIndexError> {
        if host.trim().is_empty() {
            return Err(VectorIndexError::ConnectionFailed(
                "Pinecone host is not configured".to_string(),
            ));
        }

        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VectorIndexError::ConnectionFailed(e.to_string()))?;

        tracing::info!("Using Pinecone index at: {}", host);
        Ok(Self {
            client,
            host,
            api_key: api_key.to_string(),
            batch_size: batch_size.max(1),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}{}", self.host, path);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        let text = response.text().await.context("Failed to read response body")?;
        if !status.is_success() {
            anyhow::bail!("{} returned HTTP {}: {}", path, status.as_u16(), text);
        }

        // Delete returns an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).with_context(|| format!("Invalid response from {}", path))
    }
}

#[async_trait::async_trait]
impl VectorIndex for PineconeVectorIndex {
    async fn upsert(
        &self,
        records: Vec<VectorRecord>,
        namespace: &str,
    ) -> Result<usize, VectorIndexError> {
        let mut written = 0;
        for batch in records.chunks(self.batch_size) {
            let response: UpsertResponse = self
                .post("/vectors/upsert", &upsert_body(batch, namespace))
                .await
                .map_err(|e| VectorIndexError::UpsertFailed(format!("{:#}", e)))?;
            written += response.upserted_count;
        }
        Ok(written)
    }

    async fn query_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
        namespace: &str,
    ) -> Result<Vec<VectorMatch>, VectorIndexError> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "namespace": namespace,
            "includeMetadata": true,
        });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = filter_json(filter);
        }

        let response: QueryResponse = self
            .post("/query", &body)
            .await
            .map_err(|e| VectorIndexError::QueryFailed(format!("{:#}", e)))?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[String], namespace: &str) -> Result<(), VectorIndexError> {
        for batch in ids.chunks(1000) {
            let _: Value = self
                .post(
                    "/vectors/delete",
                    &json!({ "ids": batch, "namespace": namespace }),
                )
                .await
                .map_err(|e| VectorIndexError::DeleteFailed(format!("{:#}", e)))?;
        }
        Ok(())
    }

    async fn delete_by_filter(
        &self,
        filter: &MetadataFilter,
        namespace: &str,
    ) -> Result<Option<usize>, VectorIndexError> {
        if filter.is_empty() {
            return Err(VectorIndexError::UnsupportedFilter(
                "refusing to delete with an empty filter".to_string(),
            ));
        }

        let _: Value = self
            .post(
                "/vectors/delete",
                &json!({ "filter": filter_json(filter), "namespace": namespace }),
            )
            .await
            .map_err(|e| VectorIndexError::DeleteFailed(format!("{:#}", e)))?;

        // Pinecone does not report how many vectors matched
        Ok(None)
    }

    async fn describe_stats(&self, namespace: Option<&str>) -> Result<IndexStats, VectorIndexError> {
        let response: StatsResponse = self
            .post("/describe_index_stats", &json!({}))
            .await
            .map_err(|e| VectorIndexError::StatisticsFailed(format!("{:#}", e)))?;
        Ok(stats_from_response(response, namespace))
    }

    fn name(&self) -> &'static str {
        "pinecone"
    }
}
