use super::{EmbeddingProvider, RawEmbedding};
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Response shapes returned by feature-extraction endpoints
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Sentence(Vec<f32>),
    Tokens(Vec<Vec<f32>>),
    /// Batch of one input, each with token vectors
    Batched(Vec<Vec<Vec<f32>>>),
}

pub(crate) fn parse_response(body: &str) -> Result<RawEmbedding, EmbeddingError> {
    let parsed: FeatureResponse = serde_json::from_str(body).map_err(|e| {
        EmbeddingError::InvalidResponse(format!("unexpected response shape: {}", e))
    })?;

    match parsed {
        FeatureResponse::Sentence(vector) => Ok(RawEmbedding::Single(vector)),
        FeatureResponse::Tokens(tokens) => Ok(RawEmbedding::Tokens(tokens)),
        FeatureResponse::Batched(batch) => batch
            .into_iter()
            .next()
            .map(RawEmbedding::Tokens)
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty batch".to_string())),
    }
}

/// HuggingFace-style feature-extraction endpoint over HTTP
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    token_env: String,
    model_id: String,
    dimension: usize,
    timeout: Duration,
}

impl HuggingFaceProvider {
    pub fn new(
        api_url: &str,
        model_id: &str,
        token: Option<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}", api_url.trim_end_matches('/'), model_id),
            token,
            token_env: String::new(),
            model_id: model_id.to_string(),
            dimension,
            timeout,
        })
    }

    /// Provider for `model_id`, reading the token from the configured
    /// environment variable
    pub fn from_config(
        config: &EmbeddingConfig,
        model_id: &str,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        if token.is_none() {
            tracing::warn!(
                "{} is not set; requests to {} will fail",
                config.token_env,
                model_id
            );
        }

        let mut provider = Self::new(
            &config.api_url,
            model_id,
            token,
            dimension,
            Duration::from_secs(config.timeout_secs),
        )?;
        provider.token_env = config.token_env.clone();
        Ok(provider)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceProvider {
    async fn embed(&self, text: &str) -> Result<RawEmbedding, EmbeddingError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| EmbeddingError::MissingToken(self.token_env.clone()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&json!({
                "inputs": text,
                "options": { "wait_for_model": true }
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout(self.timeout.as_secs())
                } else {
                    EmbeddingError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(EmbeddingError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
