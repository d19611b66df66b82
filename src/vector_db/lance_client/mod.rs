//! LanceDB vector index (embedded, no server required)
//!
//! All namespaces share one table; `namespace` and the commonly filtered
//! metadata fields are stored as columns so deletes and queries can be
//! expressed as SQL predicates. The full metadata map is kept as JSON.

use super::{IndexStats, MetadataFilter, VectorIndex, VectorMatch};
use crate::error::VectorIndexError;
use crate::types::VectorRecord;
use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metadata keys mirrored into their own column
const FILTER_COLUMNS: &[&str] = &["file_path", "language", "category", "chunk_type"];

pub struct LanceVectorIndex {
    connection: Connection,
    table_name: String,
    db_path: String,
    dimension: usize,
}

/// Quote a value for a LanceDB SQL predicate
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl LanceVectorIndex {
    pub async fn with_path(db_path: &str, dimension: usize) -> Result<Self, VectorIndexError> {
        tracing::info!("Connecting to LanceDB at: {}", db_path);

        let connection = lancedb::connect(db_path)
            .execute()
            .await
            .map_err(|e| VectorIndexError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            connection,
            table_name: "code_chunks".to_string(),
            db_path: db_path.to_string(),
            dimension,
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("id", DataType::Utf8, false),
            Field::new("namespace", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("language", DataType::Utf8, false),
            Field::new("category", DataType::Utf8, false),
            Field::new("chunk_type", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
        ]))
    }

    /// The table, or `None` before the first upsert
    async fn table(&self) -> Result<Option<Table>> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        if !names.contains(&self.table_name) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .context("Failed to open table")?;
        Ok(Some(table))
    }

    async fn table_or_create(&self) -> Result<Table> {
        if let Some(table) = self.table().await? {
            return Ok(table);
        }

        let schema = Self::create_schema(self.dimension);
        let empty = RecordBatch::new_empty(schema.clone());
        let batches = RecordBatchIterator::new(vec![empty].into_iter().map(Ok), schema);

        let table = self
            .connection
            .create_table(&self.table_name, Box::new(batches))
            .execute()
            .await
            .context("Failed to create table")?;
        tracing::info!("Created table '{}' in {}", self.table_name, self.db_path);
        Ok(table)
    }

    fn create_record_batch(&self, records: &[VectorRecord], namespace: &str) -> Result<RecordBatch> {
        let field = |r: &VectorRecord, key: &str| -> String {
            r.metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let column = |key: &str| {
            StringArray::from(records.iter().map(|r| field(r, key)).collect::<Vec<_>>())
        };

        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            records
                .iter()
                .map(|r| Some(r.vector.iter().copied().map(Some))),
            self.dimension as i32,
        );
        let metadata_json = records
            .iter()
            .map(|r| serde_json::to_string(&r.metadata))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to serialize metadata")?;

        RecordBatch::try_new(
            Self::create_schema(self.dimension),
            vec![
                Arc::new(vector_array),
                Arc::new(StringArray::from(
                    records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(vec![namespace; records.len()])),
                Arc::new(column("file_path")),
                Arc::new(column("language")),
                Arc::new(column("category")),
                Arc::new(column("chunk_type")),
                Arc::new(column("content")),
                Arc::new(StringArray::from(metadata_json)),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// SQL predicate for a namespace plus an optional metadata filter
    fn predicate(
        namespace: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<String, VectorIndexError> {
        let mut clauses = vec![format!("namespace = {}", sql_literal(namespace))];
        if let Some(filter) = filter {
            for (key, value) in filter.fields() {
                if !FILTER_COLUMNS.contains(&key) {
                    return Err(VectorIndexError::UnsupportedFilter(format!(
                        "'{}' is not a filterable field (expected one of {:?})",
                        key, FILTER_COLUMNS
                    )));
                }
                clauses.push(format!("{} = {}", key, sql_literal(value)));
            }
        }
        Ok(clauses.join(" AND "))
    }

    async fn upsert_inner(&self, records: Vec<VectorRecord>, namespace: &str) -> Result<usize> {
        let table = self.table_or_create().await?;

        let ids = records
            .iter()
            .map(|r| sql_literal(&r.id))
            .collect::<Vec<_>>()
            .join(", ");
        table
            .delete(&format!(
                "namespace = {} AND id IN ({})",
                sql_literal(namespace),
                ids
            ))
            .await
            .context("Failed to replace existing records")?;

        let schema = Self::create_schema(self.dimension);
        let batch = self.create_record_batch(&records, namespace)?;
        let count = batch.num_rows();
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .context("Failed to add records to table")?;

        tracing::debug!("Stored {} vectors in namespace '{}'", count, namespace);
        Ok(count)
    }

    async fn query_inner(
        &self,
        vector: &[f32],
        top_k: usize,
        predicate: String,
    ) -> Result<Vec<VectorMatch>> {
        let Some(table) = self.table().await? else {
            return Ok(Vec::new());
        };

        let stream = table
            .vector_search(vector.to_vec())
            .context("Failed to create vector search")?
            .only_if(predicate)
            .limit(top_k)
            .execute()
            .await
            .context("Failed to execute search")?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect search results")?;

        let mut matches = Vec::new();
        for batch in batches {
            let ids = string_column(&batch, "id")?;
            let metadata = string_column(&batch, "metadata")?;
            let distances = batch
                .column_by_name("_distance")
                .context("Missing _distance column")?
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("Invalid _distance type")?;

            for i in 0..batch.num_rows() {
                let parsed: Map<String, Value> = serde_json::from_str(metadata.value(i))
                    .context("Invalid metadata JSON in table")?;
                matches.push(VectorMatch {
                    id: ids.value(i).to_string(),
                    score: 1.0 / (1.0 + distances.value(i)),
                    metadata: parsed,
                });
            }
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(matches)
    }

    async fn delete_inner(&self, predicate: &str) -> Result<usize> {
        let Some(table) = self.table().await? else {
            return Ok(0);
        };

        // Count first; delete does not report how many rows it removed
        let count = table
            .count_rows(Some(predicate.to_string()))
            .await
            .context("Failed to count matching rows")?;
        if count > 0 {
            table
                .delete(predicate)
                .await
                .context("Failed to delete records")?;
        }
        Ok(count)
    }

    async fn stats_inner(&self, namespace: Option<&str>) -> Result<IndexStats> {
        let Some(table) = self.table().await? else {
            return Ok(IndexStats {
                dimension: Some(self.dimension),
                ..IndexStats::default()
            });
        };

        let mut query = table
            .query()
            .select(lancedb::query::Select::Columns(vec!["namespace".to_string()]));
        if let Some(ns) = namespace {
            query = query.only_if(format!("namespace = {}", sql_literal(ns)));
        }
        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .context("Failed to query namespaces")?
            .try_collect()
            .await
            .context("Failed to collect namespace data")?;

        let mut namespaces: BTreeMap<String, usize> = BTreeMap::new();
        for batch in batches {
            let column = string_column(&batch, "namespace")?;
            for i in 0..batch.num_rows() {
                *namespaces.entry(column.value(i).to_string()).or_insert(0) += 1;
            }
        }

        Ok(IndexStats {
            total_vectors: namespaces.values().sum(),
            dimension: Some(self.dimension),
            namespaces,
        })
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing {} column", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("Invalid {} type", name))
}

#[async_trait::async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn upsert(
        &self,
        records: Vec<VectorRecord>,
        namespace: &str,
    ) -> Result<usize, VectorIndexError> {
        if records.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        self.upsert_inner(records, namespace)
            .await
            .map_err(|e| VectorIndexError::UpsertFailed(format!("{:#}", e)))
    }

    async fn query_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
        namespace: &str,
    ) -> Result<Vec<VectorMatch>, VectorIndexError> {
        let predicate = Self::predicate(namespace, filter)?;
        self.query_inner(vector, top_k, predicate)
            .await
            .map_err(|e| VectorIndexError::QueryFailed(format!("{:#}", e)))
    }

    async fn delete_by_ids(&self, ids: &[String], namespace: &str) -> Result<(), VectorIndexError> {
        if ids.is_empty() {
            return Ok(());
        }
        let list = ids.iter().map(|id| sql_literal(id)).collect::<Vec<_>>().join(", ");
        let predicate = format!("namespace = {} AND id IN ({})", sql_literal(namespace), list);
        self.delete_inner(&predicate)
            .await
            .map(|_| ())
            .map_err(|e| VectorIndexError::DeleteFailed(format!("{:#}", e)))
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
        let predicate = Self::predicate(namespace, Some(filter))?;
        self.delete_inner(&predicate)
            .await
            .map(Some)
            .map_err(|e| VectorIndexError::DeleteFailed(format!("{:#}", e)))
    }

    async fn describe_stats(&self, namespace: Option<&str>) -> Result<IndexStats, VectorIndexError> {
        self.stats_inner(namespace)
            .await
            .map_err(|e| VectorIndexError::StatisticsFailed(format!("{:#}", e)))
    }

    fn name(&self) -> &'static str {
        "lancedb"
    }
}

#[cfg(test)]
mod tests;
