//! In-process vector index
//!
//! Keeps records in a map per namespace and scores queries with cosine
//! similarity. Used by tests and for experiments without a real backend.

use super::{IndexStats, MetadataFilter, VectorIndex, VectorMatch};
use crate::error::VectorIndexError;
use crate::types::VectorRecord;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type Namespaces = HashMap<String, BTreeMap<String, VectorRecord>>;

pub struct MemoryVectorIndex {
    dimension: usize,
    namespaces: RwLock<Namespaces>,
}

impl MemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// All records stored in a namespace, ordered by id
    pub fn records(&self, namespace: &str) -> Vec<VectorRecord> {
        self.namespaces
            .read()
            .map(|ns| {
                ns.get(namespace)
                    .map(|records| records.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn poisoned(e: impl std::fmt::Display) -> VectorIndexError {
        VectorIndexError::ConnectionFailed(format!("index lock poisoned: {}", e))
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(
        &self,
        records: Vec<VectorRecord>,
        namespace: &str,
    ) -> Result<usize, VectorIndexError> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        let mut namespaces = self.namespaces.write().map_err(Self::poisoned)?;
        let target = namespaces.entry(namespace.to_string()).or_default();
        let count = records.len();
        for record in records {
            target.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    async fn query_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
        namespace: &str,
    ) -> Result<Vec<VectorMatch>, VectorIndexError> {
        let namespaces = self.namespaces.read().map_err(Self::poisoned)?;
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = records
            .values()
            .filter(|r| filter.is_none_or(|f| f.matches(&r.metadata)))
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine(vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_by_ids(&self, ids: &[String], namespace: &str) -> Result<(), VectorIndexError> {
        let mut namespaces = self.namespaces.write().map_err(Self::poisoned)?;
        if let Some(records) = namespaces.get_mut(namespace) {
            for id in ids {
                records.remove(id);
            }
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

        let mut namespaces = self.namespaces.write().map_err(Self::poisoned)?;
        let Some(records) = namespaces.get_mut(namespace) else {
            return Ok(Some(0));
        };
        let before = records.len();
        records.retain(|_, r| !filter.matches(&r.metadata));
        Ok(Some(before - records.len()))
    }

    async fn describe_stats(&self, namespace: Option<&str>) -> Result<IndexStats, VectorIndexError> {
        let namespaces = self.namespaces.read().map_err(Self::poisoned)?;
        let counts: BTreeMap<String, usize> = namespaces
            .iter()
            .filter(|(name, _)| namespace.is_none_or(|n| n == name.as_str()))
            .map(|(name, records)| (name.clone(), records.len()))
            .collect();

        Ok(IndexStats {
            total_vectors: counts.values().sum(),
            dimension: Some(self.dimension),
            namespaces: counts,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
