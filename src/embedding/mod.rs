//! Embedding providers and the coordinator that drives them
//!
//! Providers turn one text into one vector. The [`EmbeddingCoordinator`]
//! adds rate limiting, timeouts, retries and the primary → fallback →
//! synthetic degradation chain on top.

mod coordinator;
mod fastembed_manager;
mod huggingface;

pub use coordinator::{CoordinatorSettings, EmbeddingCoordinator, prepare_text, synthetic_vector};
pub use fastembed_manager::FastEmbedProvider;
pub use huggingface::HuggingFaceProvider;

use crate::error::EmbeddingError;
use async_trait::async_trait;

/// Model id reported for vectors that no provider produced
pub const SYNTHETIC_MODEL_ID: &str = "synthetic";

/// A provider response before pooling
#[derive(Debug, Clone, PartialEq)]
pub enum RawEmbedding {
    /// One sentence-level vector
    Single(Vec<f32>),
    /// One vector per input token
    Tokens(Vec<Vec<f32>>),
}

impl RawEmbedding {
    /// Collapse to one vector, mean-pooling token vectors element-wise
    pub fn into_vector(self) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            RawEmbedding::Single(vector) if vector.is_empty() => Err(
                EmbeddingError::InvalidResponse("empty embedding vector".to_string()),
            ),
            RawEmbedding::Single(vector) => Ok(vector),
            RawEmbedding::Tokens(tokens) => mean_pool(&tokens),
        }
    }
}

fn mean_pool(tokens: &[Vec<f32>]) -> Result<Vec<f32>, EmbeddingError> {
    let width = match tokens.first() {
        Some(first) if !first.is_empty() => first.len(),
        _ => {
            return Err(EmbeddingError::InvalidResponse(
                "no token vectors in response".to_string(),
            ));
        }
    };

    let mut sum = vec![0.0f32; width];
    for token in tokens {
        if token.len() != width {
            return Err(EmbeddingError::InvalidResponse(format!(
                "ragged token vectors: expected width {}, got {}",
                width,
                token.len()
            )));
        }
        for (acc, value) in sum.iter_mut().zip(token) {
            *acc += value;
        }
    }

    let count = tokens.len() as f32;
    Ok(sum.into_iter().map(|v| v / count).collect())
}

/// Turns text into a fixed-length vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<RawEmbedding, EmbeddingError>;

    /// Model identifier recorded with every vector this provider produces
    fn model_id(&self) -> &str;

    /// Dimension of the vectors this provider produces
    fn dimension(&self) -> usize;
}
