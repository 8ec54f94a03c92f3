//! Session state: at most one active document and its question history.
//!
//! ```text
//!            load(doc)                  load(doc')
//!   Empty ─────────────▶ Loaded(g) ─────────────▶ Loaded(g+1)
//!     ▲                     │
//!     └──────── reset ──────┘
//! ```
//!
//! Every transition into `Loaded` takes a fresh generation number. A turn
//! is appended only if it carries the generation of the current document,
//! so an answer computed for a replaced document is dropped instead of
//! landing in the new document's history.

use docqa_core::models::{Document, QueryTurn};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// The active document plus its append-only turn log.
#[derive(Debug)]
pub struct LoadedDocument {
    pub document: Arc<Document>,
    pub turns: Vec<QueryTurn>,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    Empty,
    Loaded(LoadedDocument),
}

/// Returned when a turn no longer matches the active document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleTurn;

#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    generations: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SessionState::Loaded(_))
    }

    /// Make `document` the active document, discarding any previous one.
    /// Returns the new generation.
    pub fn load(&mut self, document: Document) -> u64 {
        self.generations += 1;
        let generation = self.generations;
        if let SessionState::Loaded(prev) = &self.state {
            info!(
                previous = %prev.document.id,
                turns = prev.turns.len(),
                "replacing active document"
            );
        }
        info!(document = %document.id, chunks = document.chunks.len(), generation, "document loaded");
        self.state = SessionState::Loaded(LoadedDocument {
            document: Arc::new(document),
            turns: Vec::new(),
            generation,
        });
        generation
    }

    /// Drop the active document. Returns whether one was loaded.
    pub fn reset(&mut self) -> bool {
        let was_loaded = self.is_loaded();
        if was_loaded {
            info!("session reset");
        }
        self.state = SessionState::Empty;
        was_loaded
    }

    /// The active document and its generation.
    pub fn active(&self) -> Option<(Arc<Document>, u64)> {
        match &self.state {
            SessionState::Loaded(loaded) => Some((loaded.document.clone(), loaded.generation)),
            SessionState::Empty => None,
        }
    }

    /// Append a turn computed against `generation`.
    pub fn append_turn(&mut self, generation: u64, turn: QueryTurn) -> Result<(), StaleTurn> {
        match &mut self.state {
            SessionState::Loaded(loaded) if loaded.generation == generation => {
                loaded.turns.push(turn);
                Ok(())
            }
            _ => {
                debug!(generation, "discarding turn for a replaced document");
                Err(StaleTurn)
            }
        }
    }

    pub fn turns(&self) -> &[QueryTurn] {
        match &self.state {
            SessionState::Loaded(loaded) => &loaded.turns,
            SessionState::Empty => &[],
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.state {
            SessionState::Empty => SessionSnapshot {
                document: None,
                turns: Vec::new(),
            },
            SessionState::Loaded(loaded) => SessionSnapshot {
                document: Some(DocumentSummary::from(loaded.document.as_ref())),
                turns: loaded.turns.clone(),
            },
        }
    }
}

/// Lightweight description of the active document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub extracted_by: String,
    pub char_count: usize,
    pub chunk_count: usize,
    pub uploaded_at: String,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            media_type: doc.media_type.clone(),
            extracted_by: doc.extracted_by.clone(),
            char_count: doc.char_count(),
            chunk_count: doc.chunks.len(),
            uploaded_at: doc.uploaded_at.to_rfc3339(),
        }
    }
}

/// Read-only view of a session for display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub document: Option<DocumentSummary>,
    pub turns: Vec<QueryTurn>,
}
