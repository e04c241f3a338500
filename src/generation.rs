use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::GenerationConfig;
use crate::constants::USER_AGENT;
use crate::extract::{ParseError, RecipeExtractor, TolerantJsonExtractor};
use crate::quantity::clamp_count;
use crate::Recipe;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("rate limited by the generation endpoint (429): {body}")]
    RateLimited { body: String },

    #[error("generation endpoint rejected the credentials (status={status}): {body}")]
    Auth { status: u16, body: String },

    #[error("generation endpoint returned status {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("request to the generation endpoint failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl GenerationError {
    /// Credential and setup problems won't go away by asking again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Auth { .. } | Self::Client(_))
    }
}

/// A request for `count` recipes; `count` is always within 1..=3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub ingredients: String,
    pub count: u32,
}

impl GenerationRequest {
    pub fn new(ingredients: impl Into<String>, count: u32) -> Self {
        Self {
            ingredients: ingredients.into(),
            count: clamp_count(count),
        }
    }
}

/// Anything that can turn ingredients into recipes.
#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Recipe>, GenerationError>;
}

/// Notified before each backoff pause.
pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, attempt: u32, delay: Duration, error: &GenerationError);
}

// Request body for the OpenRouter Responses API
#[derive(Serialize, Debug)]
struct ResponsesRequest<'a> {
    input: Vec<InputMessage<'a>>,
    model: &'a str,
    generation: GenerationParams,
}

#[derive(Serialize, Debug)]
struct InputMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct GenerationParams {
    temperature: f64,
    max_output_tokens: u32,
}

pub fn build_prompt(ingredients: &str, count: u32) -> String {
    format!(
        "Actúa como un chef profesional. Con estos ingredientes: \"{}\", propone {} receta(s). \
        Devuelve únicamente un array JSON válido, sin texto adicional, con este formato exacto: \
        [{{\"title\":\"...\",\"description\":\"...\"}}]",
        ingredients, count
    )
}

/// HTTP client for the remote text-generation endpoint.
pub struct GenerationClient {
    http: Client,
    config: GenerationConfig,
    extractor: Arc<dyn RecipeExtractor>,
    observer: Option<Arc<dyn RetryObserver>>,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(GenerationError::Client)?;

        Ok(Self {
            http,
            config,
            extractor: Arc::new(TolerantJsonExtractor),
            observer: None,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn RecipeExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Convenience wrapper that builds (and clamps) the request.
    pub async fn generate_recipes(
        &self,
        ingredients: &str,
        count: u32,
    ) -> Result<Vec<Recipe>, GenerationError> {
        self.generate(&GenerationRequest::new(ingredients, count)).await
    }

    async fn attempt(&self, payload: &ResponsesRequest<'_>) -> Result<Vec<Recipe>, GenerationError> {
        let mut request = self
            .http
            .post(&self.config.endpoint)
            .header(ACCEPT, "application/json")
            .json(payload);
        if let Some(key) = self.config.bearer_token() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(GenerationError::Network)?;
        let status = response.status();
        let body = response.text().await.map_err(GenerationError::Network)?;

        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(GenerationError::RateLimited { body }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(GenerationError::Auth {
                    status: status.as_u16(),
                    body,
                })
            }
            s if !s.is_success() => {
                return Err(GenerationError::Remote {
                    status: s.as_u16(),
                    body,
                })
            }
            _ => {}
        }

        debug!(body_len = body.len(), "Received generation response");
        Ok(self.extractor.extract(&body)?)
    }
}

#[async_trait]
impl RecipeGenerator for GenerationClient {
    #[instrument(skip(self, request), fields(count = request.count))]
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Recipe>, GenerationError> {
        let count = clamp_count(request.count);
        let prompt = build_prompt(&request.ingredients, count);
        let payload = ResponsesRequest {
            input: vec![InputMessage {
                kind: "message",
                role: "user",
                content: &prompt,
            }],
            model: &self.config.model,
            generation: GenerationParams {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        if self.config.bearer_token().is_none() {
            warn!("No API key configured; the generation request may be rejected");
        }

        let policy = self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.attempt(&payload).await {
                Ok(recipes) => {
                    info!(attempt, recipes = recipes.len(), "Generated recipes");
                    return Ok(recipes);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!(attempt, error = %err, "Generation failed, not retrying");
                return Err(err);
            }
            if attempt >= max_attempts {
                error!(attempt, error = %err, "Generation failed, attempts exhausted");
                return Err(err);
            }

            let delay = policy.delay_after(attempt);
            match &err {
                GenerationError::RateLimited { .. } => {
                    info!(attempt, ?delay, "Rate limited, backing off")
                }
                _ => warn!(attempt, ?delay, error = %err, "Generation attempt failed, retrying"),
            }
            if let Some(observer) = &self.observer {
                observer.on_retry(attempt, delay, &err);
            }
            tokio::time::sleep(delay).await;
        }
    }
}
