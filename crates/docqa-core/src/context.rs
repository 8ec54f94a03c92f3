//! Bounded context assembly for the QA backend.
//!
//! Ranked chunk texts are joined with a delimiter that does not occur in
//! ordinary prose, then cut to a fixed character budget by plain prefix
//! truncation. The cut is not word-aware, which keeps the output a pure
//! function of its inputs.

use anyhow::{bail, Result};

use crate::search::{RankedChunk, DEFAULT_TOP_K};

/// Default character budget for an assembled context.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;
/// Default delimiter between chunks: a horizontal rule on its own line.
pub const DEFAULT_SEPARATOR: &str = "\n\n---\n\n";

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalParams {
    top_k: usize,
    max_context_chars: usize,
    separator: String,
}

impl RetrievalParams {
    pub fn new(top_k: usize, max_context_chars: usize, separator: impl Into<String>) -> Result<Self> {
        let separator = separator.into();
        if top_k == 0 {
            bail!("retrieval top_k must be >= 1");
        }
        if max_context_chars == 0 {
            bail!("retrieval max_context_chars must be >= 1");
        }
        if separator.is_empty() {
            bail!("retrieval separator must not be empty");
        }
        Ok(Self {
            top_k,
            max_context_chars,
            separator,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Assemble ranked chunks using these parameters.
    pub fn assemble(&self, ranked: &[RankedChunk]) -> String {
        assemble_context(
            ranked.iter().map(|r| r.text.as_str()),
            &self.separator,
            self.max_context_chars,
        )
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// Join `texts` with `separator` and keep at most `max_chars` characters.
///
/// ```rust
/// use docqa_core::context::assemble_context;
///
/// let ctx = assemble_context(["alpha", "beta"], " | ", 9);
/// assert_eq!(ctx, "alpha | b");
/// ```
pub fn assemble_context<'a, I>(texts: I, separator: &str, max_chars: usize) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = texts.into_iter().collect::<Vec<_>>().join(separator);
    truncate_chars(&joined, max_chars).to_string()
}

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
