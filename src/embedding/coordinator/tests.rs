use super::*;
use crate::embedding::RawEmbedding;
use crate::types::{ChunkStrategy, ChunkType};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Provider replaying a fixed outcome and counting calls
struct ScriptedProvider {
    model_id: String,
    outcome: fn() -> Result<RawEmbedding, EmbeddingError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(model_id: &str, outcome: fn() -> Result<RawEmbedding, EmbeddingError>) -> Arc<Self> {
        Arc::new(Self {
            model_id: model_id.to_string(),
            outcome,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn slow(model_id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            model_id: model_id.to_string(),
            outcome: ok_vector,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedProvider {
    async fn embed(&self, _text: &str) -> Result<RawEmbedding, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.outcome)()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        4
    }
}

fn ok_vector() -> Result<RawEmbedding, EmbeddingError> {
    Ok(RawEmbedding::Single(vec![0.5, 0.5, 0.5, 0.5]))
}

fn ok_tokens() -> Result<RawEmbedding, EmbeddingError> {
    Ok(RawEmbedding::Tokens(vec![
        vec![1.0, 0.0, 1.0, 0.0],
        vec![0.0, 1.0, 0.0, 1.0],
    ]))
}

fn wrong_dimension() -> Result<RawEmbedding, EmbeddingError> {
    Ok(RawEmbedding::Single(vec![1.0, 2.0]))
}

fn transient() -> Result<RawEmbedding, EmbeddingError> {
    Err(EmbeddingError::Http {
        status: 503,
        body: "overloaded".to_string(),
    })
}

fn permanent() -> Result<RawEmbedding, EmbeddingError> {
    Err(EmbeddingError::Http {
        status: 401,
        body: "unauthorized".to_string(),
    })
}

fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        timeout: Duration::from_secs(5),
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
        request_delay: Duration::ZERO,
        max_input_chars: 2048,
        dimension: 4,
    }
}

fn chunk(content: &str) -> CodeChunk {
    CodeChunk {
        content: content.to_string(),
        source_path: "src/auth.ts".to_string(),
        strategy: ChunkStrategy::FunctionLevel,
        language: "typescript".to_string(),
        start_line: 1,
        end_line: 3,
        chunk_type: ChunkType::Function,
        function_name: Some("login".to_string()),
        class_name: None,
        origin: None,
    }
}

#[test]
fn test_prepare_text_collapses_whitespace() {
    assert_eq!(
        prepare_text("  fn  main()\n\t{\n    run();\n}  ", 100),
        "fn main() { run(); }"
    );
}

#[test]
fn test_prepare_text_truncates_prefix_on_char_boundary() {
    assert_eq!(prepare_text("abcdef", 3), "abc");
    assert_eq!(prepare_text("héllo wörld", 8), "héllo wö");
    assert_eq!(prepare_text("ab cd", 3), "ab");
    assert_eq!(prepare_text("same input", 4), prepare_text("same input", 4));
}

#[test]
fn test_synthetic_vector_deterministic_unit_length() {
    let a = synthetic_vector("fn main() {}", 768);
    let b = synthetic_vector("fn main() {}", 768);
    let c = synthetic_vector("fn other() {}", 768);

    assert_eq!(a.len(), 768);
    assert_eq!(a, b);
    assert_ne!(a, c);
    let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_primary_success() {
    let primary = ScriptedProvider::new("primary-model", ok_vector);
    let fallback = ScriptedProvider::new("fallback-model", ok_vector);
    let coordinator =
        EmbeddingCoordinator::new(primary.clone(), Some(fallback.clone()), settings());

    let embedded = coordinator.embed_chunk(chunk("login()")).await;
    assert_eq!(embedded.source, EmbeddingSource::Primary);
    assert_eq!(embedded.model_id, "primary-model");
    assert_eq!(embedded.dimension, 4);
    assert!(!embedded.embedding_failed());
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_token_vectors_pooled() {
    let primary = ScriptedProvider::new("primary-model", ok_tokens);
    let coordinator = EmbeddingCoordinator::new(primary, None, settings());

    let embedded = coordinator.embed_chunk(chunk("login()")).await;
    assert_eq!(embedded.vector, vec![0.5, 0.5, 0.5, 0.5]);
}

#[tokio::test]
async fn test_permanent_failure_goes_to_fallback_without_retry() {
    let primary = ScriptedProvider::new("primary-model", permanent);
    let fallback = ScriptedProvider::new("fallback-model", ok_vector);
    let coordinator =
        EmbeddingCoordinator::new(primary.clone(), Some(fallback.clone()), settings());

    let embedded = coordinator.embed_chunk(chunk("login()")).await;
    assert_eq!(embedded.source, EmbeddingSource::Fallback);
    assert_eq!(embedded.model_id, "fallback-model");
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn test_transient_failure_retried_then_falls_back() {
    let primary = ScriptedProvider::new("primary-model", transient);
    let fallback = ScriptedProvider::new("fallback-model", ok_vector);
    let coordinator =
        EmbeddingCoordinator::new(primary.clone(), Some(fallback.clone()), settings());

    let embedded = coordinator.embed_chunk(chunk("login()")).await;
    assert_eq!(embedded.source, EmbeddingSource::Fallback);
    assert_eq!(primary.calls(), 3);
}

#[tokio::test]
async fn test_dimension_mismatch_falls_back() {
    let primary = ScriptedProvider::new("primary-model", wrong_dimension);
    let fallback = ScriptedProvider::new("fallback-model", ok_vector);
    let coordinator = EmbeddingCoordinator::new(primary, Some(fallback), settings());

    let embedded = coordinator.embed_chunk(chunk("login()")).await;
    assert_eq!(embedded.source, EmbeddingSource::Fallback);
    assert_eq!(embedded.vector.len(), 4);
}

#[tokio::test]
async fn test_all_providers_fail_flags_synthetic() {
    let primary = ScriptedProvider::new("primary-model", permanent);
    let fallback = ScriptedProvider::new("fallback-model", transient);
    let coordinator = EmbeddingCoordinator::new(primary, Some(fallback), settings());

    let embedded = coordinator.embed_chunk(chunk("login()")).await;
    assert!(embedded.embedding_failed());
    assert_eq!(embedded.source, EmbeddingSource::Synthetic);
    assert_eq!(embedded.model_id, SYNTHETIC_MODEL_ID);
    assert_eq!(embedded.vector, synthetic_vector("login()", 4));
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let primary = ScriptedProvider::slow("slow-model", Duration::from_millis(500));
    let fallback = ScriptedProvider::new("fallback-model", ok_vector);
    let coordinator = EmbeddingCoordinator::new(
        primary.clone(),
        Some(fallback),
        CoordinatorSettings {
            timeout: Duration::from_millis(20),
            max_retries: 0,
            ..settings()
        },
    );

    let embedded = coordinator.embed_chunk(chunk("login()")).await;
    assert_eq!(embedded.source, EmbeddingSource::Fallback);
    assert_eq!(primary.calls(), 1);
}

#[tokio::test]
async fn test_request_delay_spaces_calls() {
    let primary = ScriptedProvider::new("primary-model", ok_vector);
    let coordinator = EmbeddingCoordinator::new(
        primary.clone(),
        None,
        CoordinatorSettings {
            request_delay: Duration::from_millis(40),
            ..settings()
        },
    );

    let started = std::time::Instant::now();
    let embedded = coordinator
        .embed(vec![chunk("a()"), chunk("b()"), chunk("c()")])
        .await;
    assert_eq!(embedded.len(), 3);
    assert_eq!(primary.calls(), 3);
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn test_embed_query_does_not_substitute() {
    let primary = ScriptedProvider::new("primary-model", permanent);
    let coordinator = EmbeddingCoordinator::new(primary, None, settings());

    assert!(coordinator.embed_query("where is login").await.is_err());
}

#[tokio::test]
async fn test_empty_text_never_reaches_provider() {
    let primary = ScriptedProvider::new("primary-model", ok_vector);
    let coordinator = EmbeddingCoordinator::new(primary.clone(), None, settings());

    let embedded = coordinator.embed_chunk(chunk("   \n  ")).await;
    assert!(embedded.embedding_failed());
    assert_eq!(primary.calls(), 0);
}
