use super::{EmbeddingProvider, FastEmbedProvider, HuggingFaceProvider, SYNTHETIC_MODEL_ID};
use crate::config::Config;
use crate::error::EmbeddingError;
use crate::types::{CodeChunk, EmbeddedChunk, EmbeddingSource};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Call pattern shared by every provider
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Bound on one provider call
    pub timeout: Duration,
    /// Extra attempts on retryable failures
    pub max_retries: u32,
    /// Doubled after every retry
    pub retry_backoff: Duration,
    /// Minimum gap between two calls to the same provider
    pub request_delay: Duration,
    pub max_input_chars: usize,
    /// Dimension every vector must have to be accepted by the index
    pub dimension: usize,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        let embedding = &config.embedding;
        Self {
            timeout: Duration::from_secs(embedding.timeout_secs),
            max_retries: embedding.max_retries,
            retry_backoff: Duration::from_millis(embedding.retry_backoff_ms),
            request_delay: Duration::from_millis(embedding.request_delay_ms),
            max_input_chars: embedding.max_input_chars,
            dimension: config.index.dimension,
        }
    }
}

/// A provider plus the gate serializing calls to it
struct GatedProvider {
    provider: Arc<dyn EmbeddingProvider>,
    /// Completion time of the previous call
    last_call: Mutex<Option<Instant>>,
}

impl GatedProvider {
    fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            last_call: Mutex::new(None),
        }
    }
}

/// Collapse whitespace runs and keep at most `max_chars` characters
///
/// Truncation keeps a prefix, so the same input always yields the same text.
pub fn prepare_text(text: &str, max_chars: usize) -> String {
    let mut normalized = String::with_capacity(text.len().min(max_chars * 4));
    let mut kept = 0;
    for word in text.split_whitespace() {
        if kept > 0 {
            if kept >= max_chars {
                break;
            }
            normalized.push(' ');
            kept += 1;
        }
        for c in word.chars() {
            if kept >= max_chars {
                break;
            }
            normalized.push(c);
            kept += 1;
        }
    }
    normalized.truncate(normalized.trim_end().len());
    normalized
}

/// Deterministic unit-length placeholder derived from the text's hash
pub fn synthetic_vector(text: &str, dimension: usize) -> Vec<f32> {
    let seed = Sha256::digest(text.as_bytes());
    let mut values = Vec::with_capacity(dimension);
    let mut block: u64 = 0;

    while values.len() < dimension {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();
        for word in digest.chunks_exact(4) {
            if values.len() == dimension {
                break;
            }
            let raw = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            values.push(raw as f32 / u32::MAX as f32 * 2.0 - 1.0);
        }
        block += 1;
    }

    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
    values
}

/// Obtains one vector per chunk from a primary provider, a fallback
/// provider, or as a last resort a flagged synthetic vector
pub struct EmbeddingCoordinator {
    primary: GatedProvider,
    fallback: Option<GatedProvider>,
    settings: CoordinatorSettings,
}

impl EmbeddingCoordinator {
    pub fn new(
        primary: Arc<dyn EmbeddingProvider>,
        fallback: Option<Arc<dyn EmbeddingProvider>>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            primary: GatedProvider::new(primary),
            fallback: fallback.map(GatedProvider::new),
            settings,
        }
    }

    /// HuggingFace primary plus the configured fallback provider
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingError> {
        let embedding = &config.embedding;
        let dimension = config.index.dimension;

        let primary: Arc<dyn EmbeddingProvider> = Arc::new(HuggingFaceProvider::from_config(
            embedding,
            &embedding.primary_model,
            dimension,
        )?);

        let fallback: Option<Arc<dyn EmbeddingProvider>> =
            match embedding.fallback_provider.as_str() {
                "huggingface" => Some(Arc::new(HuggingFaceProvider::from_config(
                    embedding,
                    &embedding.fallback_model,
                    dimension,
                )?)),
                "fastembed" => {
                    let provider = FastEmbedProvider::new(&embedding.fallback_model)?;
                    if provider.dimension() != dimension {
                        return Err(EmbeddingError::DimensionMismatch {
                            expected: dimension,
                            actual: provider.dimension(),
                        });
                    }
                    Some(Arc::new(provider))
                }
                _ => None,
            };

        Ok(Self::new(primary, fallback, CoordinatorSettings::from_config(config)))
    }

    pub fn primary_model(&self) -> &str {
        self.primary.provider.model_id()
    }

    pub fn fallback_model(&self) -> Option<&str> {
        self.fallback.as_ref().map(|f| f.provider.model_id())
    }

    pub fn dimension(&self) -> usize {
        self.settings.dimension
    }

    /// Embed chunks one after another
    pub async fn embed(&self, chunks: Vec<CodeChunk>) -> Vec<EmbeddedChunk> {
        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            embedded.push(self.embed_chunk(chunk).await);
        }
        embedded
    }

    /// Embed one chunk; never fails, but a synthetic result is flagged
    pub async fn embed_chunk(&self, chunk: CodeChunk) -> EmbeddedChunk {
        let text = prepare_text(&chunk.content, self.settings.max_input_chars);

        match self.call_with_retries(&self.primary, &text).await {
            Ok(vector) => {
                return self.finish(chunk, vector, &self.primary, EmbeddingSource::Primary);
            }
            Err(e) => tracing::warn!(
                "Primary embedding failed for {}:{}: {}",
                chunk.source_path,
                chunk.start_line,
                e
            ),
        }

        if let Some(fallback) = &self.fallback {
            match self.call_with_retries(fallback, &text).await {
                Ok(vector) => {
                    return self.finish(chunk, vector, fallback, EmbeddingSource::Fallback);
                }
                Err(e) => tracing::warn!(
                    "Fallback embedding failed for {}:{}: {}",
                    chunk.source_path,
                    chunk.start_line,
                    e
                ),
            }
        }

        tracing::warn!(
            "All embedding providers failed for {}:{}, substituting synthetic vector",
            chunk.source_path,
            chunk.start_line
        );
        EmbeddedChunk {
            vector: synthetic_vector(&text, self.settings.dimension),
            chunk,
            model_id: SYNTHETIC_MODEL_ID.to_string(),
            dimension: self.settings.dimension,
            source: EmbeddingSource::Synthetic,
        }
    }

    /// Embed a search query; fails instead of substituting a vector
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = prepare_text(query, self.settings.max_input_chars);
        match self.call_with_retries(&self.primary, &text).await {
            Ok(vector) => Ok(vector),
            Err(primary_err) => match &self.fallback {
                Some(fallback) => self.call_with_retries(fallback, &text).await,
                None => Err(primary_err),
            },
        }
    }

    fn finish(
        &self,
        chunk: CodeChunk,
        vector: Vec<f32>,
        gated: &GatedProvider,
        source: EmbeddingSource,
    ) -> EmbeddedChunk {
        EmbeddedChunk {
            dimension: vector.len(),
            vector,
            chunk,
            model_id: gated.provider.model_id().to_string(),
            source,
        }
    }

    async fn call_with_retries(
        &self,
        gated: &GatedProvider,
        text: &str,
    ) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut attempt = 0;
        loop {
            match self.call_once(gated, text).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    let backoff = self.settings.retry_backoff * 2u32.saturating_pow(attempt);
                    tracing::debug!(
                        "{} attempt {} failed: {}; retrying in {:?}",
                        gated.provider.model_id(),
                        attempt + 1,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once(
        &self,
        gated: &GatedProvider,
        text: &str,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let mut last_call = gated.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.settings.request_delay {
                tokio::time::sleep(self.settings.request_delay - elapsed).await;
            }
        }

        let outcome = tokio::time::timeout(self.settings.timeout, gated.provider.embed(text)).await;
        *last_call = Some(Instant::now());
        drop(last_call);

        let vector = outcome
            .map_err(|_| EmbeddingError::Timeout(self.settings.timeout.as_secs()))??
            .into_vector()?;

        if vector.len() != self.settings.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.settings.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests;
