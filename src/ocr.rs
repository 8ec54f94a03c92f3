//! OCR backends for image uploads.
//!
//! - [`OcrSpaceBackend`] calls the hosted OCR.space `parse/image` API. It is
//!   the high-accuracy primary.
//! - [`TesseractBackend`] runs a local `tesseract` binary as the last
//!   resort.
//!
//! Both report "no text" as `Ok(None)` and infrastructure or processing
//! problems as [`BackendError`]; the image chain treats the two alike.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use docqa_core::models::MediaKind;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::BackendError;
use crate::extract::{ExtractOptions, TextBackend};

/// Hosted OCR via OCR.space.
pub struct OcrSpaceBackend {
    client: reqwest::Client,
    url: String,
    api_key: String,
    language: String,
    engine: u8,
}

impl OcrSpaceBackend {
    pub fn new(config: &OcrConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.ocr_space_url.clone(),
            api_key: config.resolved_api_key(),
            language: config.language.clone(),
            engine: config.engine,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OcrSpaceResponse {
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    is_errored: bool,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<serde_json::Value>,
    #[serde(rename = "ErrorDetails", default)]
    error_details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ParsedResult {
    #[serde(rename = "ParsedText", default)]
    parsed_text: Option<String>,
}

impl OcrSpaceResponse {
    fn text(&self) -> Option<&str> {
        self.parsed_results
            .as_ref()?
            .first()?
            .parsed_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Flatten `ErrorMessage` / `ErrorDetails` (string or array of strings).
    fn error(&self) -> Option<String> {
        let flatten = |v: &serde_json::Value| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        };
        self.error_message
            .as_ref()
            .and_then(flatten)
            .or_else(|| self.error_details.as_ref().and_then(flatten))
            .filter(|m| !m.is_empty())
    }

    fn into_outcome(self) -> Result<Option<String>, BackendError> {
        if let Some(text) = self.text() {
            return Ok(Some(text.to_string()));
        }
        match self.error() {
            Some(msg) => Err(BackendError::Rejected(msg)),
            None if self.is_errored => {
                Err(BackendError::Rejected("OCR processing error".to_string()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TextBackend for OcrSpaceBackend {
    fn name(&self) -> &str {
        "ocr-space"
    }

    async fn try_extract(
        &self,
        bytes: &[u8],
        kind: &MediaKind,
        _options: &ExtractOptions,
    ) -> Result<Option<String>, BackendError> {
        let data_uri = format!("data:{};base64,{}", kind.mime(), STANDARD.encode(bytes));
        let form = [
            ("apikey", self.api_key.clone()),
            ("language", self.language.clone()),
            ("isOverlayRequired", "false".to_string()),
            ("OCREngine", self.engine.to_string()),
            ("scale", "true".to_string()),
            ("detectOrientation", "true".to_string()),
            ("isTable", "true".to_string()),
            ("base64Image", data_uri),
        ];

        let response = self.client.post(&self.url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected(format!(
                "OCR.space error {}: {}",
                status, body
            )));
        }

        let parsed: OcrSpaceResponse = response.json().await?;
        debug!(errored = parsed.is_errored, "OCR.space responded");
        parsed.into_outcome()
    }
}

/// Local OCR through the `tesseract` command-line tool.
pub struct TesseractBackend {
    binary: String,
    language: String,
    timeout: Duration,
}

impl TesseractBackend {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_bin.clone(),
            language: config.language.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn args(&self) -> Vec<&str> {
        vec![
            "stdin",
            "stdout",
            "-l",
            self.language.as_str(),
            "--psm",
            "6",
            "--dpi",
            "300",
            "-c",
            "preserve_interword_spaces=1",
        ]
    }
}

#[async_trait]
impl TextBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn try_extract(
        &self,
        bytes: &[u8],
        _kind: &MediaKind,
        _options: &ExtractOptions,
    ) -> Result<Option<String>, BackendError> {
        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Rejected("tesseract stdin unavailable".to_string()))?;
        let input = bytes.to_vec();
        let feed = async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        };

        // Feed stdin while draining stdout so neither pipe can fill and stall.
        let (fed, output) = tokio::time::timeout(self.timeout, async {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_| BackendError::Timeout(self.timeout))?;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Rejected(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if let Err(e) = fed {
            debug!(error = %e, "tesseract closed stdin early");
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}
