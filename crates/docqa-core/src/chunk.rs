//! Overlapping fixed-window text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of at most `size`
//! characters, where consecutive chunks share `overlap` characters.
//!
//! # Algorithm
//!
//! With `step = size - overlap`, chunk `i` covers the character span
//! `[i * step, min(i * step + size, len))`. Chunking stops after the first
//! chunk whose span ends at `len`, so the last chunk ends exactly at the end
//! of the text, once. Offsets count Unicode scalar values, never bytes, so a
//! window never splits a multi-byte character.
//!
//! - `len == 0` yields no chunks.
//! - `len <= size` yields exactly one chunk holding the whole text.
//!
//! Each chunk's `text` is its span trimmed of surrounding whitespace; the
//! untrimmed span is recoverable from `start`/`end`.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(4, 1).unwrap();
//! let chunks = chunk_text("doc-1", "abcdefghij", &params);
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "defg", "ghij"]);
//! ```

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::models::{sha256_hex, Chunk};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 900;
/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Validated chunking parameters. Guarantees `0 <= overlap < size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Build parameters, rejecting `size == 0` and `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            bail!("chunk size must be > 0");
        }
        if overlap >= size {
            bail!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap,
                size
            );
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of consecutive chunks. Always `>= 1`.
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split text into overlapping windows.
///
/// Pure function of `(text, params)` apart from the random chunk IDs.
/// Chunks are returned left to right with contiguous indices from 0.
pub fn chunk_text(document_id: &str, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    // Byte offset of every char boundary, including the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;

    let mut chunks = Vec::new();
    if len == 0 {
        return chunks;
    }

    let mut start = 0;
    loop {
        let end = (start + params.size).min(len);
        let span = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(document_id, chunks.len(), start, end, span.trim()));
        if end == len {
            break;
        }
        start += params.step();
    }

    chunks
}

fn make_chunk(document_id: &str, index: usize, start: usize, end: usize, text: &str) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        start,
        end,
        text: text.to_string(),
        hash: sha256_hex(text),
    }
}
