//! Fallback-capable text extraction.
//!
//! Each supported format owns an [`ExtractorChain`]: an ordered list of
//! [`TextBackend`]s sharing one interface, tried in turn until one yields
//! non-empty text. Backend errors never escape a chain; they are recorded as
//! [`BackendAttempt`]s and the chain moves on (or stops, depending on its
//! [`FallbackPolicy`]).
//!
//! | Format | Chain | Policy |
//! |--------|-------|--------|
//! | `text/plain` | `plain-text` | advance on error |
//! | `application/pdf` | `pdf-extract` → `lopdf` | advance on error |
//! | `image/*` | `ocr-space` → `tesseract` | advance on error or empty |
//!
//! Any other declared type yields an `Unsupported` result without touching a
//! backend.

use async_trait::async_trait;
use docqa_core::models::{
    AttemptOutcome, BackendAttempt, ExtractionResult, ExtractionStatus, MediaKind,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::BackendError;
use crate::ocr::{OcrSpaceBackend, TesseractBackend};
use crate::pdf::{LopdfBackend, PdfExtractBackend};

/// Per-upload extraction switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Read every PDF page instead of stopping at the configured page limit.
    pub process_full_document: bool,
}

/// One way of turning file bytes into text.
///
/// `Ok(None)` and `Ok(Some(""))` both mean "ran fine, found nothing".
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Short identifier recorded in [`ExtractionResult::backend`].
    fn name(&self) -> &str;

    async fn try_extract(
        &self,
        bytes: &[u8],
        kind: &MediaKind,
        options: &ExtractOptions,
    ) -> Result<Option<String>, BackendError>;
}

/// When a chain moves past a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Only an error advances; an empty success ends the chain.
    AdvanceOnError,
    /// An error, no text, or whitespace-only text advances.
    AdvanceOnErrorOrEmpty,
}

/// An ordered fallback list of backends for one format.
pub struct ExtractorChain {
    policy: FallbackPolicy,
    backends: Vec<Arc<dyn TextBackend>>,
}

impl ExtractorChain {
    pub fn new(policy: FallbackPolicy) -> Self {
        Self {
            policy,
            backends: Vec::new(),
        }
    }

    /// Append a backend to the end of the chain.
    pub fn with(mut self, backend: Arc<dyn TextBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Run backends in order until one produces non-empty text.
    ///
    /// The result is `Extracted` on the first usable text; otherwise
    /// `Empty` if any backend ran without error, else `Failed`.
    pub async fn run(
        &self,
        bytes: &[u8],
        kind: &MediaKind,
        options: &ExtractOptions,
    ) -> ExtractionResult {
        let mut attempts = Vec::with_capacity(self.backends.len());
        let mut ran_clean = false;

        for backend in &self.backends {
            let started = Instant::now();
            let outcome = backend.try_extract(bytes, kind, options).await;
            let elapsed = started.elapsed();

            match outcome {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    let chars = text.chars().count();
                    info!(backend = backend.name(), chars, ?elapsed, "extracted text");
                    attempts.push(BackendAttempt {
                        backend: backend.name().to_string(),
                        outcome: AttemptOutcome::Text(chars),
                    });
                    return ExtractionResult {
                        status: ExtractionStatus::Extracted,
                        text,
                        backend: Some(backend.name().to_string()),
                        attempts,
                    };
                }
                Ok(_) => {
                    debug!(backend = backend.name(), ?elapsed, "backend found no text");
                    ran_clean = true;
                    attempts.push(BackendAttempt {
                        backend: backend.name().to_string(),
                        outcome: AttemptOutcome::Empty,
                    });
                    if self.policy == FallbackPolicy::AdvanceOnError {
                        break;
                    }
                }
                Err(e) => {
                    warn!(backend = backend.name(), ?elapsed, error = %e, "backend failed");
                    attempts.push(BackendAttempt {
                        backend: backend.name().to_string(),
                        outcome: AttemptOutcome::Error(e.to_string()),
                    });
                }
            }
        }

        ExtractionResult {
            status: if ran_clean {
                ExtractionStatus::Empty
            } else {
                ExtractionStatus::Failed
            },
            text: String::new(),
            backend: None,
            attempts,
        }
    }
}

/// Strict UTF-8 decode. Invalid input counts as empty text, not an error.
pub struct PlainTextBackend;

#[async_trait]
impl TextBackend for PlainTextBackend {
    fn name(&self) -> &str {
        "plain-text"
    }

    async fn try_extract(
        &self,
        bytes: &[u8],
        _kind: &MediaKind,
        _options: &ExtractOptions,
    ) -> Result<Option<String>, BackendError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(Some(s.to_string())),
            Err(e) => {
                debug!(error = %e, "text upload is not valid UTF-8");
                Ok(None)
            }
        }
    }
}

/// The full set of chains, one per supported format.
pub struct Extractors {
    pub text: ExtractorChain,
    pub pdf: ExtractorChain,
    pub image: ExtractorChain,
}

impl Extractors {
    /// Build the production chains described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pdf_timeout = Duration::from_secs(config.extraction.pdf_timeout_secs);
        let page_limit = config.extraction.pdf_page_limit;

        let pdf = ExtractorChain::new(FallbackPolicy::AdvanceOnError)
            .with(Arc::new(PdfExtractBackend::new(page_limit, pdf_timeout)))
            .with(Arc::new(LopdfBackend::new(page_limit, pdf_timeout)));

        let mut image = ExtractorChain::new(FallbackPolicy::AdvanceOnErrorOrEmpty);
        if config.ocr.primary == "ocr_space" {
            image = image.with(Arc::new(OcrSpaceBackend::new(&config.ocr)?));
        }
        if config.ocr.fallback == "tesseract" {
            image = image.with(Arc::new(TesseractBackend::new(&config.ocr)));
        }

        Ok(Self {
            text: ExtractorChain::new(FallbackPolicy::AdvanceOnError)
                .with(Arc::new(PlainTextBackend)),
            pdf,
            image,
        })
    }

    pub fn chain_for(&self, kind: &MediaKind) -> Option<&ExtractorChain> {
        match kind {
            MediaKind::PlainText => Some(&self.text),
            MediaKind::Pdf => Some(&self.pdf),
            MediaKind::Image(_) => Some(&self.image),
            MediaKind::Unsupported(_) => None,
        }
    }

    /// Extract text from `bytes` of the declared media type.
    pub async fn extract(
        &self,
        bytes: &[u8],
        declared_type: &str,
        options: &ExtractOptions,
    ) -> ExtractionResult {
        let kind = MediaKind::parse(declared_type);
        match self.chain_for(&kind) {
            Some(chain) => chain.run(bytes, &kind, options).await,
            None => {
                debug!(declared_type, "no extractor for media type");
                ExtractionResult::unsupported()
            }
        }
    }
}

/// Guess a media type from a file extension, for callers without one.
pub fn guess_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "txt" | "text" | "md" => "text/plain",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Script {
        Text(&'static str),
        Nothing,
        Fail,
    }

    struct FakeBackend {
        name: &'static str,
        script: Script,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new(name: &'static str, script: Script) -> Arc<Self> {
            Arc::new(Self {
                name,
                script,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextBackend for FakeBackend {
        fn name(&self) -> &str {
            self.name
        }

        async fn try_extract(
            &self,
            _bytes: &[u8],
            _kind: &MediaKind,
            _options: &ExtractOptions,
        ) -> Result<Option<String>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Text(t) => Ok(Some(t.to_string())),
                Script::Nothing => Ok(None),
                Script::Fail => Err(BackendError::Rejected("boom".to_string())),
            }
        }
    }

    fn image() -> MediaKind {
        MediaKind::Image("png".to_string())
    }

    #[tokio::test]
    async fn primary_text_skips_secondary() {
        let primary = FakeBackend::new("primary", Script::Text("hello"));
        let secondary = FakeBackend::new("secondary", Script::Text("other"));
        let chain = ExtractorChain::new(FallbackPolicy::AdvanceOnErrorOrEmpty)
            .with(primary.clone())
            .with(secondary.clone());

        let result = chain.run(b"img", &image(), &ExtractOptions::default()).await;
        assert!(result.success());
        assert_eq!(result.text, "hello");
        assert_eq!(result.backend.as_deref(), Some("primary"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn whitespace_primary_falls_back_once() {
        let primary = FakeBackend::new("primary", Script::Text("  \n "));
        let secondary = FakeBackend::new("secondary", Script::Text("recognized"));
        let chain = ExtractorChain::new(FallbackPolicy::AdvanceOnErrorOrEmpty)
            .with(primary.clone())
            .with(secondary.clone());

        let result = chain.run(b"img", &image(), &ExtractOptions::default()).await;
        assert_eq!(result.text, "recognized");
        assert_eq!(result.backend.as_deref(), Some("secondary"));
        assert_eq!(secondary.calls(), 1);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::Empty);
    }

    #[tokio::test]
    async fn error_primary_falls_back() {
        let primary = FakeBackend::new("primary", Script::Fail);
        let secondary = FakeBackend::new("secondary", Script::Text("ok"));
        let chain = ExtractorChain::new(FallbackPolicy::AdvanceOnErrorOrEmpty)
            .with(primary)
            .with(secondary.clone());

        let result = chain.run(b"img", &image(), &ExtractOptions::default()).await;
        assert!(result.success());
        assert!(matches!(
            result.attempts[0].outcome,
            AttemptOutcome::Error(ref m) if m == "boom"
        ));
    }

    #[tokio::test]
    async fn all_empty_reports_empty() {
        let primary = FakeBackend::new("primary", Script::Nothing);
        let secondary = FakeBackend::new("secondary", Script::Fail);
        let chain = ExtractorChain::new(FallbackPolicy::AdvanceOnErrorOrEmpty)
            .with(primary.clone())
            .with(secondary.clone());

        let result = chain.run(b"img", &image(), &ExtractOptions::default()).await;
        assert_eq!(result.status, ExtractionStatus::Empty);
        assert!(result.text.is_empty());
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn all_errors_report_failed() {
        let chain = ExtractorChain::new(FallbackPolicy::AdvanceOnErrorOrEmpty)
            .with(FakeBackend::new("a", Script::Fail))
            .with(FakeBackend::new("b", Script::Fail));

        let result = chain.run(b"img", &image(), &ExtractOptions::default()).await;
        assert_eq!(result.status, ExtractionStatus::Failed);
        assert_eq!(result.attempts.len(), 2);
    }

    #[tokio::test]
    async fn advance_on_error_stops_at_empty_success() {
        let primary = FakeBackend::new("primary", Script::Nothing);
        let secondary = FakeBackend::new("secondary", Script::Text("never"));
        let chain = ExtractorChain::new(FallbackPolicy::AdvanceOnError)
            .with(primary)
            .with(secondary.clone());

        let result = chain.run(b"%PDF", &MediaKind::Pdf, &ExtractOptions::default()).await;
        assert_eq!(result.status, ExtractionStatus::Empty);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn advance_on_error_retries_after_error() {
        let secondary = FakeBackend::new("secondary", Script::Text("page one"));
        let chain = ExtractorChain::new(FallbackPolicy::AdvanceOnError)
            .with(FakeBackend::new("primary", Script::Fail))
            .with(secondary.clone());

        let result = chain.run(b"%PDF", &MediaKind::Pdf, &ExtractOptions::default()).await;
        assert_eq!(result.text, "page one");
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn plain_text_decodes_utf8_and_strips_bom() {
        let out = PlainTextBackend
            .try_extract(
                b"\xEF\xBB\xBFhello",
                &MediaKind::PlainText,
                &ExtractOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn plain_text_invalid_utf8_is_empty() {
        let out = PlainTextBackend
            .try_extract(b"\xff\xfe\xfd", &MediaKind::PlainText, &ExtractOptions::default())
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn unsupported_type_runs_nothing() {
        let spy = FakeBackend::new("spy", Script::Text("x"));
        let extractors = Extractors {
            text: ExtractorChain::new(FallbackPolicy::AdvanceOnError).with(spy.clone()),
            pdf: ExtractorChain::new(FallbackPolicy::AdvanceOnError).with(spy.clone()),
            image: ExtractorChain::new(FallbackPolicy::AdvanceOnErrorOrEmpty).with(spy.clone()),
        };
        let result = extractors
            .extract(b"{}", "application/json", &ExtractOptions::default())
            .await;
        assert_eq!(result.status, ExtractionStatus::Unsupported);
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn default_chains_follow_config() {
        let mut cfg = Config::default();
        let ex = Extractors::from_config(&cfg).unwrap();
        assert_eq!(ex.pdf.backend_names(), ["pdf-extract", "lopdf"]);
        assert_eq!(ex.image.backend_names(), ["ocr-space", "tesseract"]);
        assert_eq!(ex.text.backend_names(), ["plain-text"]);

        cfg.ocr.primary = "disabled".to_string();
        let ex = Extractors::from_config(&cfg).unwrap();
        assert_eq!(ex.image.backend_names(), ["tesseract"]);
    }

    #[test]
    fn guesses_media_types() {
        assert_eq!(guess_media_type(Path::new("a/notes.TXT")), Some("text/plain"));
        assert_eq!(guess_media_type(Path::new("scan.jpeg")), Some("image/jpeg"));
        assert_eq!(guess_media_type(Path::new("report.pdf")), Some("application/pdf"));
        assert_eq!(guess_media_type(Path::new("data.json")), None);
        assert_eq!(guess_media_type(Path::new("README")), None);
    }
}
