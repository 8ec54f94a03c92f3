//! # docqa
//!
//! Grounded question answering over one uploaded document.
//!
//! A file (plain text, PDF, or image) is turned into text by a chain of
//! fallback extractors, split into overlapping chunks, and held as the
//! session's active document. Each question is ranked against the chunks
//! lexically; the best chunks become the context handed to a QA backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌──────────┐
//! │  Extractors  │──▶│ Chunker  │──▶│ Session  │
//! │ text/PDF/OCR │   │          │   │ 1 doc    │
//! └──────────────┘   └──────────┘   └────┬─────┘
//!                                        │ ask
//!                      ┌─────────────────┤
//!                      ▼                 ▼
//!                ┌──────────┐      ┌──────────┐
//!                │  Ranker  │─────▶│ QA (LLM) │
//!                └──────────┘      └──────────┘
//! ```
//!
//! The pure pieces (chunking, ranking, context assembly, data model) live
//! in the `docqa-core` crate; this crate adds the I/O-bound backends, the
//! session, and the CLI and HTTP surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Engine error taxonomy and backend errors |
//! | [`extract`] | Extractor chains and fallback policy |
//! | [`pdf`] | PDF text-layer backends |
//! | [`ocr`] | OCR backends for images |
//! | [`qa`] | Answer-generation backends |
//! | [`session`] | Active document and question history |
//! | [`engine`] | Upload / ask / reset orchestration |
//! | [`server`] | HTTP server |

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ocr;
pub mod pdf;
pub mod qa;
pub mod server;
pub mod session;
