//! The question-answering engine: the surface the UI layer calls.
//!
//! ```text
//! upload: bytes ─▶ Extractors ─▶ text ─▶ chunk_text ─▶ Session::load
//! ask:    question ─▶ rank_chunks ─▶ assemble ─▶ QaBackend ─▶ Session::append_turn
//! ```
//!
//! # Concurrency
//!
//! Uploads are serialized by one async gate and questions by another, so
//! at most one extraction and one QA round trip are in flight per engine;
//! later callers queue in arrival order. The session itself sits behind a
//! `std::sync::RwLock` that is never held across an `.await`. A question
//! whose document is replaced or reset while its answer is pending has the
//! answer discarded.

use chrono::Utc;
use docqa_core::chunk::{chunk_text, ChunkParams};
use docqa_core::context::RetrievalParams;
use docqa_core::models::{
    sha256_hex, Document, ExtractionStatus, MediaKind, QueryTurn, TurnOutcome,
};
use docqa_core::search::rank_chunks;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::extract::{ExtractOptions, Extractors};
use crate::qa::{create_qa_backend, QaBackend};
use crate::session::{Session, SessionSnapshot};

/// Options accepted by [`Engine::upload`].
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Read every PDF page instead of stopping at the page limit.
    pub process_full_document: bool,
    /// Display name; defaults to `"upload"`.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub document_id: String,
    pub chunk_count: usize,
    pub char_count: usize,
    /// Extraction backend that produced the text.
    pub backend: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// The ranked chunk texts the answer was grounded in, best first.
    pub citations: Vec<String>,
}

pub struct Engine {
    extractors: Extractors,
    qa: Arc<dyn QaBackend>,
    chunking: ChunkParams,
    retrieval: RetrievalParams,
    qa_deadline: Duration,
    session: RwLock<Session>,
    upload_gate: Mutex<()>,
    ask_gate: Mutex<()>,
}

impl Engine {
    pub fn new(
        extractors: Extractors,
        qa: Arc<dyn QaBackend>,
        chunking: ChunkParams,
        retrieval: RetrievalParams,
    ) -> Self {
        Self {
            extractors,
            qa,
            chunking,
            retrieval,
            qa_deadline: Duration::from_secs(120),
            session: RwLock::new(Session::new()),
            upload_gate: Mutex::new(()),
            ask_gate: Mutex::new(()),
        }
    }

    /// Build the engine with the backends selected in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let extractors = Extractors::from_config(config)?;
        let qa: Arc<dyn QaBackend> = Arc::from(create_qa_backend(&config.qa)?);
        Ok(Self::new(
            extractors,
            qa,
            config.chunk_params()?,
            config.retrieval_params()?,
        )
        .with_qa_deadline(config.qa.deadline()))
    }

    /// Upper bound on one QA round trip, retries included.
    pub fn with_qa_deadline(mut self, deadline: Duration) -> Self {
        self.qa_deadline = deadline;
        self
    }

    fn session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_mut(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Extract, chunk, and activate a new document.
    ///
    /// On success the previous document and its history are discarded. On
    /// failure the session is left exactly as it was.
    pub async fn upload(
        &self,
        bytes: &[u8],
        declared_type: &str,
        options: UploadOptions,
    ) -> Result<UploadReceipt> {
        let kind = MediaKind::parse(declared_type);
        if !kind.is_supported() {
            warn!(declared_type, "rejecting unsupported upload");
            return Err(EngineError::UnsupportedFormat(kind.mime()));
        }

        let _gate = self.upload_gate.lock().await;

        let extract_options = ExtractOptions {
            process_full_document: options.process_full_document,
        };
        let result = self
            .extractors
            .extract(bytes, declared_type, &extract_options)
            .await;

        let backend = match result.status {
            ExtractionStatus::Extracted => result.backend.unwrap_or_default(),
            ExtractionStatus::Empty => {
                return Err(EngineError::ExtractionEmpty {
                    attempts: result.attempts,
                })
            }
            ExtractionStatus::Failed => {
                return Err(EngineError::ExtractionFailed {
                    attempts: result.attempts,
                })
            }
            ExtractionStatus::Unsupported => {
                return Err(EngineError::UnsupportedFormat(kind.mime()))
            }
        };

        let id = Document::new_id();
        let chunks = chunk_text(&id, &result.text, &self.chunking);
        let document = Document {
            id: id.clone(),
            name: options.name.unwrap_or_else(|| "upload".to_string()),
            media_type: kind.mime(),
            content_hash: sha256_hex(&result.text),
            chunks,
            text: result.text,
            extracted_by: backend.clone(),
            uploaded_at: Utc::now(),
        };
        let receipt = UploadReceipt {
            document_id: id,
            chunk_count: document.chunks.len(),
            char_count: document.char_count(),
            backend,
        };

        self.session_mut().load(document);
        Ok(receipt)
    }

    /// Answer a question about the active document.
    ///
    /// The turn is recorded whether or not the QA backend succeeds; a
    /// failed call is logged with an error marker and reported as
    /// [`EngineError::BackendUnavailable`].
    pub async fn ask(&self, document_id: &str, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::InvalidQuestion);
        }
        self.active_for(document_id)?;

        let _gate = self.ask_gate.lock().await;
        // The document may have been replaced while this call was queued.
        let (document, generation) = self.active_for(document_id)?;

        let ranked = rank_chunks(
            question,
            &document.chunks,
            &document.text,
            self.retrieval.top_k(),
        );
        let context = self.retrieval.assemble(&ranked);
        let citations: Vec<String> = ranked.into_iter().map(|r| r.text).collect();
        drop(document);

        info!(
            backend = self.qa.name(),
            context_chars = context.chars().count(),
            citations = citations.len(),
            "asking QA backend"
        );
        let pending = self.qa.answer(question, Some(context.as_str()));
        let outcome = match tokio::time::timeout(self.qa_deadline, pending).await {
            Ok(Ok(answer)) => TurnOutcome::Answered(answer),
            Ok(Err(e)) => {
                warn!(error = %e, "QA backend failed");
                TurnOutcome::Failed(e.to_string())
            }
            Err(_) => {
                warn!(deadline = ?self.qa_deadline, "QA backend timed out");
                TurnOutcome::Failed(format!("timed out after {:?}", self.qa_deadline))
            }
        };

        let turn = QueryTurn {
            question: question.to_string(),
            citations: citations.clone(),
            outcome: outcome.clone(),
            asked_at: Utc::now(),
        };
        if self.session_mut().append_turn(generation, turn).is_err() {
            return Err(EngineError::NoActiveDocument {
                requested: Some(document_id.to_string()),
            });
        }

        match outcome {
            TurnOutcome::Answered(answer) => Ok(Answer { answer, citations }),
            TurnOutcome::Failed(message) => Err(EngineError::BackendUnavailable(message)),
        }
    }

    fn active_for(&self, document_id: &str) -> Result<(Arc<Document>, u64)> {
        match self.session().active() {
            None => Err(EngineError::NoActiveDocument { requested: None }),
            Some((doc, _)) if doc.id != document_id => Err(EngineError::NoActiveDocument {
                requested: Some(document_id.to_string()),
            }),
            Some(active) => Ok(active),
        }
    }

    /// Release the active document, if any.
    pub fn reset(&self) {
        self.session_mut().reset();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session().snapshot()
    }

    pub fn active_document_id(&self) -> Option<String> {
        self.session().active().map(|(doc, _)| doc.id.clone())
    }

    /// Full extracted text of the active document.
    pub fn document_text(&self) -> Option<String> {
        self.session().active().map(|(doc, _)| doc.text.clone())
    }
}
