//! Core data models shared by the engine and its frontends.
//!
//! A [`Document`] is created once its text has been extracted and chunked,
//! and is replaced wholesale on the next upload. [`QueryTurn`]s form the
//! append-only audit trail of questions asked against it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// MIME type for plain text uploads.
pub const MIME_TEXT: &str = "text/plain";
/// MIME type for PDF uploads.
pub const MIME_PDF: &str = "application/pdf";

/// The extractor family selected by a declared media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "subtype", rename_all = "snake_case")]
pub enum MediaKind {
    PlainText,
    Pdf,
    /// `image/<subtype>`; the subtype is kept for the OCR request.
    Image(String),
    /// Anything else, carrying the normalized declared type.
    Unsupported(String),
}

impl MediaKind {
    /// Classify a declared media type.
    ///
    /// The type is lower-cased and any parameters (`; charset=utf-8`) are
    /// dropped before matching.
    ///
    /// ```rust
    /// use docqa_core::models::MediaKind;
    ///
    /// assert_eq!(MediaKind::parse("Text/Plain; charset=utf-8"), MediaKind::PlainText);
    /// assert_eq!(MediaKind::parse("image/png"), MediaKind::Image("png".into()));
    /// assert!(!MediaKind::parse("application/json").is_supported());
    /// ```
    pub fn parse(declared: &str) -> Self {
        let essence = essence(declared);
        match essence.as_str() {
            MIME_TEXT => MediaKind::PlainText,
            MIME_PDF => MediaKind::Pdf,
            other => match other.strip_prefix("image/") {
                Some(sub) if !sub.is_empty() => MediaKind::Image(sub.to_string()),
                _ => MediaKind::Unsupported(essence),
            },
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, MediaKind::Unsupported(_))
    }

    /// The normalized MIME string for this kind.
    pub fn mime(&self) -> String {
        match self {
            MediaKind::PlainText => MIME_TEXT.to_string(),
            MediaKind::Pdf => MIME_PDF.to_string(),
            MediaKind::Image(sub) => format!("image/{}", sub),
            MediaKind::Unsupported(t) => t.clone(),
        }
    }
}

fn essence(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// A chunk of a document's extracted text.
///
/// `start` and `end` are character offsets into the document text; `text`
/// is that span with leading and trailing whitespace trimmed.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub hash: String,
}

/// The active document of a session.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub text: String,
    pub chunks: Vec<Chunk>,
    /// SHA-256 of `text`, hex encoded.
    pub content_hash: String,
    /// Name of the extraction backend that produced `text`.
    pub extracted_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Allocate a fresh opaque document identifier.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Hex-encoded SHA-256 of a string.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// How a question was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum TurnOutcome {
    Answered(String),
    /// The QA backend failed; the message is kept for the conversation log.
    Failed(String),
}

/// One question/answer exchange. Never mutated after it is appended.
#[derive(Debug, Clone, Serialize)]
pub struct QueryTurn {
    pub question: String,
    pub citations: Vec<String>,
    pub outcome: TurnOutcome,
    pub asked_at: DateTime<Utc>,
}

impl QueryTurn {
    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Answered(a) => Some(a),
            TurnOutcome::Failed(_) => None,
        }
    }
}

/// Final classification of an extraction chain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Extracted,
    /// Every backend ran but none produced usable text.
    Empty,
    /// Every attempted backend raised an error.
    Failed,
    /// No extractor exists for the declared type; nothing was attempted.
    Unsupported,
}

/// What a single backend attempt produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Non-empty text, recorded as its character count.
    Text(usize),
    Empty,
    Error(String),
}

/// Diagnostic record of one backend attempt inside a chain.
#[derive(Debug, Clone, Serialize)]
pub struct BackendAttempt {
    pub backend: String,
    pub outcome: AttemptOutcome,
}

/// Result of running an extractor chain over a file.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub status: ExtractionStatus,
    /// Extracted text; empty unless `status` is `Extracted`.
    pub text: String,
    /// Backend that produced `text`.
    pub backend: Option<String>,
    pub attempts: Vec<BackendAttempt>,
}

impl ExtractionResult {
    pub fn success(&self) -> bool {
        self.status == ExtractionStatus::Extracted
    }

    pub fn unsupported() -> Self {
        Self {
            status: ExtractionStatus::Unsupported,
            text: String::new(),
            backend: None,
            attempts: Vec::new(),
        }
    }
}
