//! Lexical chunk ranking by term-frequency cosine similarity.
//!
//! No embeddings and no IDF weighting: each text becomes a bag of
//! lower-cased ASCII alphanumeric tokens, and chunks are ordered by the
//! cosine of their term-frequency vector with the query's.
//!
//! # Scoring Algorithm
//!
//! 1. Normalize: lower-case, then replace every character outside
//!    `[a-z0-9]` and whitespace with a space.
//! 2. Tokenize on whitespace runs, dropping empty tokens.
//! 3. Count term frequencies for the query and each chunk.
//! 4. `cosine(A, B) = dot(A, B) / (‖A‖ · ‖B‖)`, or `0` if either is empty.
//! 5. Stable sort by score, descending, so ties keep chunk order.
//! 6. Truncate to `top_k`.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::Chunk;

/// Default number of chunks returned by [`rank_chunks`].
pub const DEFAULT_TOP_K: usize = 3;

/// Term → occurrence count.
pub type TermFrequencies = HashMap<String, u32>;

/// Lower-case and blank out everything except `[a-z0-9]` and whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect()
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn term_frequencies(text: &str) -> TermFrequencies {
    let mut tf = TermFrequencies::new();
    for token in tokenize(text) {
        *tf.entry(token).or_insert(0) += 1;
    }
    tf
}

/// Cosine similarity of two term-frequency maps, in `[0.0, 1.0]`.
///
/// Returns `0.0` when either map is empty.
pub fn cosine(a: &TermFrequencies, b: &TermFrequencies) -> f64 {
    let norm_sq = |m: &TermFrequencies| m.values().map(|&v| f64::from(v).powi(2)).sum::<f64>();
    let a2 = norm_sq(a);
    let b2 = norm_sq(b);
    if a2 == 0.0 || b2 == 0.0 {
        return 0.0;
    }

    // Iterate the smaller map; the dot product only needs shared terms.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(t, &x)| large.get(t).map(|&y| f64::from(x) * f64::from(y)))
        .sum();

    // sqrt(a2 * b2) rather than sqrt(a2) * sqrt(b2): exact for cosine(A, A).
    (dot / (a2 * b2).sqrt()).min(1.0)
}

/// Convenience: similarity between a query and a passage.
pub fn score_similarity(query: &str, passage: &str) -> f64 {
    cosine(&term_frequencies(query), &term_frequencies(passage))
}

/// A chunk selected by [`rank_chunks`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedChunk {
    /// Position in the original chunk list, or `None` for the synthetic
    /// whole-document chunk.
    pub chunk_index: Option<usize>,
    pub text: String,
    pub score: f64,
}

/// Rank chunks against a query and keep the best `top_k`.
///
/// When `chunks` is empty, a single synthetic chunk holding `full_text` is
/// ranked instead, so a document that produced no chunks can still be
/// questioned.
///
/// ```rust
/// use docqa_core::chunk::{chunk_text, ChunkParams};
/// use docqa_core::search::rank_chunks;
///
/// let text = "cats purr dogs bark";
/// let chunks = chunk_text("d", text, &ChunkParams::new(10, 0).unwrap());
/// let ranked = rank_chunks("why do dogs bark", &chunks, text, 1);
/// assert_eq!(ranked[0].text, "dogs bark");
/// ```
pub fn rank_chunks(query: &str, chunks: &[Chunk], full_text: &str, top_k: usize) -> Vec<RankedChunk> {
    let query_tf = term_frequencies(query);

    let mut ranked: Vec<RankedChunk> = if chunks.is_empty() {
        vec![RankedChunk {
            chunk_index: None,
            text: full_text.to_string(),
            score: cosine(&query_tf, &term_frequencies(full_text)),
        }]
    } else {
        chunks
            .iter()
            .map(|c| RankedChunk {
                chunk_index: Some(c.chunk_index),
                text: c.text.clone(),
                score: cosine(&query_tf, &term_frequencies(&c.text)),
            })
            .collect()
    };

    // `sort_by` is stable: equal scores keep their original order.
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_k);
    ranked
}
