//! Error types.
//!
//! [`BackendError`] is what an individual extraction, OCR, or QA backend
//! reports. It never crosses the engine surface: the extractor chain and the
//! QA call site convert it into an [`EngineError`], the taxonomy the UI
//! layer sees.

use docqa_core::models::BackendAttempt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend answered but reported a processing error.
    #[error("{0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("backend disabled: {0}")]
    Disabled(&'static str),
}

/// Errors surfaced by [`Engine`](crate::engine::Engine) operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("no text could be extracted from this file; try a clearer file")]
    ExtractionEmpty { attempts: Vec<BackendAttempt> },

    #[error("text extraction failed at every backend; try a clearer file")]
    ExtractionFailed { attempts: Vec<BackendAttempt> },

    #[error("{}", describe_missing(.requested))]
    NoActiveDocument { requested: Option<String> },

    #[error("question must not be empty")]
    InvalidQuestion,

    #[error("answer service unavailable: {0}")]
    BackendUnavailable(String),
}

fn describe_missing(requested: &Option<String>) -> String {
    match requested {
        Some(id) => format!("document {} is not the active document", id),
        None => "no active document; upload a file first".to_string(),
    }
}

impl EngineError {
    /// Stable machine-readable code for the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::UnsupportedFormat(_) => "UNSUPPORTED_TYPE",
            EngineError::ExtractionEmpty { .. } => "EXTRACTION_EMPTY",
            EngineError::ExtractionFailed { .. } => "EXTRACTION_FAILED",
            EngineError::NoActiveDocument { .. } => "NO_ACTIVE_DOCUMENT",
            EngineError::InvalidQuestion => "INVALID_QUESTION",
            EngineError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            EngineError::UnsupportedFormat("application/json".into()).code(),
            "UNSUPPORTED_TYPE"
        );
        assert_eq!(
            EngineError::NoActiveDocument { requested: None }.code(),
            "NO_ACTIVE_DOCUMENT"
        );
        assert_eq!(
            EngineError::BackendUnavailable("down".into()).code(),
            "BACKEND_UNAVAILABLE"
        );
    }

    #[test]
    fn no_active_document_message_names_the_request() {
        let err = EngineError::NoActiveDocument {
            requested: Some("abc".into()),
        };
        assert_eq!(err.to_string(), "document abc is not the active document");
    }
}
