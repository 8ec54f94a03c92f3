//! Answer-generation backends.
//!
//! Defines the [`QaBackend`] trait and concrete implementations:
//! - **[`GeminiBackend`]**: Google Generative Language `generateContent`.
//! - **[`HttpQaBackend`]**: any service speaking the `{question, context}` →
//!   `{answer}` JSON contract.
//! - **[`DisabledBackend`]**: always fails; used when no provider is configured.
//!
//! Use [`create_qa_backend`] to instantiate the configured provider.
//!
//! # Retry Strategy
//!
//! The Gemini backend retries transient errors with exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other HTTP 4xx → fail immediately
//! - network errors and timeouts → retry
//! - backoff: 1s, 2s, 4s, ... (capped at 2^5)

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::QaConfig;
use crate::error::BackendError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Produces a natural-language answer for a question and optional context.
#[async_trait]
pub trait QaBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Answer `question`, grounded in `context` when one is given.
    async fn answer(&self, question: &str, context: Option<&str>) -> Result<String, BackendError>;
}

/// Build the grounded prompt sent to a raw language model.
pub fn build_prompt(question: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) => format!(
            "Answer strictly based on the given context. If unknown, say you are not sure.\n\nContext:\n{}\n\nQuestion: {}",
            ctx, question
        ),
        None => question.to_string(),
    }
}

// ============ Disabled Backend ============

pub struct DisabledBackend;

#[async_trait]
impl QaBackend for DisabledBackend {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn answer(&self, _question: &str, _context: Option<&str>) -> Result<String, BackendError> {
        Err(BackendError::Disabled("no QA provider configured"))
    }
}

// ============ Gemini Backend ============

pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
}

impl GeminiBackend {
    /// # Errors
    ///
    /// Fails if the API key environment variable is unset.
    pub fn new(config: &QaConfig) -> anyhow::Result<Self> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("{} environment variable not set", config.api_key_env),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config
                .endpoint
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl QaBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn answer(&self, question: &str, context: Option<&str>) -> Result<String, BackendError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": build_prompt(question, context) }] }]
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying Gemini request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_gemini_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err =
                        BackendError::Rejected(format!("Gemini API error {}: {}", status, body_text));
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, "Gemini request failed, will retry");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    warn!(error = %e, "Gemini request failed, will retry");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| BackendError::Rejected("Gemini failed after retries".to_string())))
    }
}

/// Concatenate `candidates[0].content.parts[].text`.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String, BackendError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("missing candidates");
            BackendError::InvalidResponse(format!("Gemini returned no answer: {}", reason))
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Ok(text)
}

// ============ HTTP Backend ============

#[derive(Debug, Serialize)]
struct QaRequest<'a> {
    question: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QaResponse {
    answer: Option<String>,
    error: Option<String>,
}

/// Backend for a service that already implements the QA contract.
pub struct HttpQaBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpQaBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl QaBackend for HttpQaBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn answer(&self, question: &str, context: Option<&str>) -> Result<String, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&QaRequest { question, context })
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let parsed: Option<QaResponse> = serde_json::from_str(&text).ok();

        match parsed {
            Some(QaResponse {
                answer: Some(answer),
                ..
            }) if status.is_success() => Ok(answer),
            Some(QaResponse {
                error: Some(message),
                ..
            }) => Err(BackendError::Rejected(message)),
            _ if status.is_success() => Err(BackendError::InvalidResponse(
                "response has no answer field".to_string(),
            )),
            _ => Err(BackendError::Rejected(format!("QA service error {}: {}", status, text))),
        }
    }
}

/// Create the [`QaBackend`] selected by configuration.
///
/// | Config Value | Backend |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledBackend`] |
/// | `"gemini"` | [`GeminiBackend`] |
/// | `"http"` | [`HttpQaBackend`] |
pub fn create_qa_backend(config: &QaConfig) -> anyhow::Result<Box<dyn QaBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledBackend)),
        "gemini" => Ok(Box::new(GeminiBackend::new(config)?)),
        "http" => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| anyhow::anyhow!("qa.endpoint required for http provider"))?;
            Ok(Box::new(HttpQaBackend::new(
                endpoint,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        other => bail!("Unknown QA provider: {}", other),
    }
}
