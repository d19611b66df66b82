use super::{EmbeddingProvider, RawEmbedding};
use crate::error::EmbeddingError;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Model ids understood by the local provider, with their dimensions
fn resolve_model(model_id: &str) -> Option<(EmbeddingModel, usize)> {
    let name = model_id.rsplit('/').next().unwrap_or(model_id);
    match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
        "all-minilm-l12-v2" => Some((EmbeddingModel::AllMiniLML12V2, 384)),
        "bge-base-en-v1.5" => Some((EmbeddingModel::BGEBaseENV15, 768)),
        "bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        _ => None,
    }
}

/// Local ONNX embeddings through FastEmbed
///
/// The model is loaded (and downloaded if needed) on the first call, so
/// constructing the provider is cheap and works offline.
pub struct FastEmbedProvider {
    model: EmbeddingModel,
    model_id: String,
    dimension: usize,
    loaded: OnceCell<Arc<Mutex<TextEmbedding>>>,
}

impl FastEmbedProvider {
    pub fn new(model_id: &str) -> Result<Self, EmbeddingError> {
        let (model, dimension) = resolve_model(model_id).ok_or_else(|| {
            EmbeddingError::InitializationFailed(format!(
                "'{}' is not available as a local model",
                model_id
            ))
        })?;

        Ok(Self {
            model,
            model_id: model_id.to_string(),
            dimension,
            loaded: OnceCell::new(),
        })
    }

    async fn model(&self) -> Result<Arc<Mutex<TextEmbedding>>, EmbeddingError> {
        self.loaded
            .get_or_try_init(|| async {
                let model = self.model.clone();
                tracing::info!("Initializing FastEmbed model: {:?}", model);
                tokio::task::spawn_blocking(move || {
                    let mut options = InitOptions::default();
                    options.model_name = model;
                    options.show_download_progress = false;
                    TextEmbedding::try_new(options)
                        .map(|m| Arc::new(Mutex::new(m)))
                        .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))
                })
                .await
                .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))
                .and_then(|loaded| loaded)
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<RawEmbedding, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let model = self.model().await?;
        let text = text.to_string();

        // TextEmbedding::embed needs &mut self and is CPU bound
        let embeddings = tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|e| EmbeddingError::LockPoisoned(e.to_string()))?;
            guard
                .embed(vec![text], None)
                .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))??;

        embeddings
            .into_iter()
            .next()
            .map(RawEmbedding::Single)
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_models() {
        let provider = FastEmbedProvider::new("sentence-transformers/all-MiniLM-L6-v2").unwrap();
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_id(), "sentence-transformers/all-MiniLM-L6-v2");

        let provider = FastEmbedProvider::new("BAAI/bge-base-en-v1.5").unwrap();
        assert_eq!(provider.dimension(), 768);
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(matches!(
            FastEmbedProvider::new("microsoft/graphcodebert-base"),
            Err(EmbeddingError::InitializationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_loading() {
        let provider = FastEmbedProvider::new("all-MiniLM-L6-v2").unwrap();
        assert!(matches!(
            provider.embed("").await,
            Err(EmbeddingError::EmptyInput)
        ));
    }

    #[tokio::test]
    #[ignore = "downloads the model"]
    async fn test_embedding_generation() {
        let provider = FastEmbedProvider::new("all-MiniLM-L6-v2").unwrap();
        let raw = provider
            .embed("fn main() { println!(\"Hello, world!\"); }")
            .await
            .unwrap();
        assert_eq!(raw.into_vector().unwrap().len(), 384);
    }
}
