//! # docqa core
//!
//! Pure, I/O-free logic for docqa: document and session models, the
//! overlapping fixed-window chunker, the term-frequency cosine ranker, and
//! the bounded context assembler.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. Apart
//! from generated ids, every function is deterministic given its inputs.

pub mod chunk;
pub mod context;
pub mod models;
pub mod search;
