//! TOML configuration.
//!
//! Every section and field has a default, so `docqa` runs without a config
//! file. Values are validated once at load time; the engine assumes a
//! validated [`Config`].
//!
//! ```toml
//! [chunking]
//! size = 900
//! overlap = 150
//!
//! [retrieval]
//! top_k = 3
//! max_context_chars = 8000
//!
//! [ocr]
//! primary = "ocr_space"
//! fallback = "tesseract"
//!
//! [qa]
//! provider = "gemini"
//! model = "gemini-1.5-flash"
//! ```

use anyhow::{bail, Context, Result};
use docqa_core::chunk::{ChunkParams, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use docqa_core::context::{
    RetrievalParams, DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_SEPARATOR,
};
use docqa_core::search::DEFAULT_TOP_K;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub extraction: ExtractionConfig,
    pub ocr: OcrConfig,
    pub qa: QaConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub separator: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pages read from a PDF unless the upload asks for the full document.
    pub pdf_page_limit: usize,
    pub pdf_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_page_limit: 20,
            pdf_timeout_secs: 60,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OcrConfig {
    /// `"ocr_space"` or `"disabled"`.
    pub primary: String,
    /// `"tesseract"` or `"disabled"`.
    pub fallback: String,
    pub ocr_space_url: String,
    pub ocr_space_api_key: String,
    pub language: String,
    pub engine: u8,
    pub tesseract_bin: String,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            primary: "ocr_space".to_string(),
            fallback: "tesseract".to_string(),
            ocr_space_url: "https://api.ocr.space/parse/image".to_string(),
            // OCR.space public test key; rate-limited.
            ocr_space_api_key: "helloworld".to_string(),
            language: "eng".to_string(),
            engine: 2,
            tesseract_bin: "tesseract".to_string(),
            timeout_secs: 60,
        }
    }
}

impl OcrConfig {
    /// The OCR.space key, with `OCR_SPACE_API_KEY` taking precedence.
    pub fn resolved_api_key(&self) -> String {
        std::env::var("OCR_SPACE_API_KEY").unwrap_or_else(|_| self.ocr_space_api_key.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QaConfig {
    /// `"gemini"`, `"http"`, or `"disabled"`.
    pub provider: String,
    pub model: String,
    /// Endpoint for the `"http"` provider, or a base URL override for `"gemini"`.
    pub endpoint: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            endpoint: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl QaConfig {
    /// Worst-case wall time of one answer: every attempt timing out plus
    /// the backoff sleeps between them.
    pub fn deadline(&self) -> Duration {
        let attempts = u64::from(self.max_retries) + 1;
        let backoff: u64 = (0..self.max_retries).map(|i| 1u64 << i.min(5)).sum();
        Duration::from_secs(self.timeout_secs * attempts + backoff)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7340".to_string(),
        }
    }
}

impl Config {
    pub fn chunk_params(&self) -> Result<ChunkParams> {
        ChunkParams::new(self.chunking.size, self.chunking.overlap)
            .with_context(|| "Invalid [chunking] section")
    }

    pub fn retrieval_params(&self) -> Result<RetrievalParams> {
        RetrievalParams::new(
            self.retrieval.top_k,
            self.retrieval.max_context_chars,
            self.retrieval.separator.clone(),
        )
        .with_context(|| "Invalid [retrieval] section")
    }

    /// Check cross-field constraints not expressible in serde.
    pub fn validate(&self) -> Result<()> {
        self.chunk_params()?;
        self.retrieval_params()?;

        if self.extraction.pdf_page_limit == 0 {
            bail!("extraction.pdf_page_limit must be >= 1");
        }
        if self.extraction.pdf_timeout_secs == 0 || self.ocr.timeout_secs == 0 {
            bail!("extraction and OCR timeouts must be > 0");
        }
        if self.qa.timeout_secs == 0 {
            bail!("qa.timeout_secs must be > 0");
        }

        match self.ocr.primary.as_str() {
            "ocr_space" | "disabled" => {}
            other => bail!(
                "Unknown OCR primary backend: '{}'. Must be ocr_space or disabled.",
                other
            ),
        }
        match self.ocr.fallback.as_str() {
            "tesseract" | "disabled" => {}
            other => bail!(
                "Unknown OCR fallback backend: '{}'. Must be tesseract or disabled.",
                other
            ),
        }

        match self.qa.provider.as_str() {
            "gemini" | "disabled" => {}
            "http" => {
                if self.qa.endpoint.is_none() {
                    bail!("qa.endpoint must be specified when provider is 'http'");
                }
            }
            other => bail!(
                "Unknown QA provider: '{}'. Must be gemini, http, or disabled.",
                other
            ),
        }

        Ok(())
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
