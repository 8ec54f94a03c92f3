//! PDF text-layer backends.
//!
//! Two independent parsers read the embedded text layer page by page:
//! [`PdfExtractBackend`] (`pdf-extract`) is the primary mode, and
//! [`LopdfBackend`] (`lopdf`'s content-stream decoder) is the compatibility
//! mode the chain falls back to when the primary raises an error. Neither
//! performs OCR on scanned pages. Both load the file once and decode only
//! the pages within the page cap.
//!
//! Parsing is CPU-bound and may panic on malformed input, so both run on a
//! blocking thread under a timeout; a panic surfaces as a [`BackendError`].

use async_trait::async_trait;
use docqa_core::models::MediaKind;
use lopdf::Document;
use pdf_extract::PlainTextOutput;
use std::time::Duration;
use tracing::debug;

use crate::error::BackendError;
use crate::extract::{ExtractOptions, TextBackend};

/// Primary PDF mode backed by `pdf-extract`.
pub struct PdfExtractBackend {
    page_limit: usize,
    timeout: Duration,
}

impl PdfExtractBackend {
    pub fn new(page_limit: usize, timeout: Duration) -> Self {
        Self {
            page_limit,
            timeout,
        }
    }
}

#[async_trait]
impl TextBackend for PdfExtractBackend {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    async fn try_extract(
        &self,
        bytes: &[u8],
        _kind: &MediaKind,
        options: &ExtractOptions,
    ) -> Result<Option<String>, BackendError> {
        let cap = page_cap(self.page_limit, options);
        let bytes = bytes.to_vec();
        run_blocking(self.timeout, move || {
            let doc = load(&bytes)?;
            let numbers = page_numbers(&doc, cap);
            let mut pages = Vec::with_capacity(numbers.len());
            for number in numbers {
                let mut page = String::new();
                {
                    let mut output = PlainTextOutput::new(&mut page);
                    pdf_extract::output_doc_page(&doc, &mut output, number).map_err(|e| {
                        BackendError::Rejected(format!("page {} text failed: {}", number, e))
                    })?;
                }
                pages.push(page);
            }
            debug!(pages = pages.len(), "pdf-extract decoded pages");
            Ok(join_pages(pages))
        })
        .await
    }
}

/// Compatibility PDF mode backed by `lopdf`.
pub struct LopdfBackend {
    page_limit: usize,
    timeout: Duration,
}

impl LopdfBackend {
    pub fn new(page_limit: usize, timeout: Duration) -> Self {
        Self {
            page_limit,
            timeout,
        }
    }
}

#[async_trait]
impl TextBackend for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf"
    }

    async fn try_extract(
        &self,
        bytes: &[u8],
        _kind: &MediaKind,
        options: &ExtractOptions,
    ) -> Result<Option<String>, BackendError> {
        let cap = page_cap(self.page_limit, options);
        let bytes = bytes.to_vec();
        run_blocking(self.timeout, move || {
            let doc = load(&bytes)?;
            let numbers = page_numbers(&doc, cap);
            let mut pages = Vec::with_capacity(numbers.len());
            for number in numbers {
                let text = doc.extract_text(&[number]).map_err(|e| {
                    BackendError::Rejected(format!("page {} text failed: {}", number, e))
                })?;
                pages.push(text);
            }
            Ok(join_pages(pages))
        })
        .await
    }
}

/// `None` means "all pages".
fn page_cap(page_limit: usize, options: &ExtractOptions) -> Option<usize> {
    if options.process_full_document {
        None
    } else {
        Some(page_limit)
    }
}

/// Parse the document, decrypting it if it only has an empty user password.
fn load(bytes: &[u8]) -> Result<Document, BackendError> {
    let mut doc = Document::load_mem(bytes)
        .map_err(|e| BackendError::Rejected(format!("PDF load failed: {}", e)))?;
    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|e| BackendError::Rejected(format!("PDF is encrypted: {}", e)))?;
    }
    Ok(doc)
}

/// Page numbers in document order, at most `cap` of them.
fn page_numbers(doc: &Document, cap: Option<usize>) -> Vec<u32> {
    doc.get_pages()
        .keys()
        .copied()
        .take(cap.unwrap_or(usize::MAX))
        .collect()
}

/// Collapse whitespace within each page and join pages with newlines.
fn join_pages(pages: Vec<String>) -> Option<String> {
    let text = pages
        .iter()
        .map(|page| page.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

async fn run_blocking<F>(timeout: Duration, f: F) -> Result<Option<String>, BackendError>
where
    F: FnOnce() -> Result<Option<String>, BackendError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(BackendError::Rejected(format!(
            "PDF parser aborted: {}",
            join_err
        ))),
        Err(_) => Err(BackendError::Timeout(timeout)),
    }
}
